//! 配置管理模块
//!
//! 提供渲染器配置的加载、解析和管理功能。
//! 支持从 TOML 配置文件加载，也支持命令行参数覆盖。
//!
//! # 配置文件格式 (config.toml)
//!
//! ```toml
//! [window]
//! width = 1024
//! height = 768
//! title = "Flying Rat Rendering 101"
//! resizable = true
//!
//! [graphics]
//! vsync = true
//! clear = true
//! clear_color = [0.0, 0.0, 0.0, 1.0]
//! debug_layer = true
//! shader_dir = "shaders"
//!
//! [logging]
//! level = "info"      # trace, debug, info, warn, error
//! file_output = false
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::error::{ConfigError, Result};

/// 渲染器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// 窗口配置
    #[serde(default)]
    pub window: WindowConfig,

    /// 图形配置
    #[serde(default)]
    pub graphics: GraphicsConfig,

    /// 日志配置
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// 窗口配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowConfig {
    /// 窗口宽度
    #[serde(default = "default_width")]
    pub width: u32,

    /// 窗口高度
    #[serde(default = "default_height")]
    pub height: u32,

    /// 窗口标题
    #[serde(default = "default_title")]
    pub title: String,

    /// 是否可调整大小
    #[serde(default = "default_resizable")]
    pub resizable: bool,
}

/// 图形配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphicsConfig {
    /// 垂直同步（Present 的 sync interval 为 1）
    #[serde(default = "default_vsync")]
    pub vsync: bool,

    /// 每帧开始时是否清屏
    #[serde(default = "default_clear")]
    pub clear: bool,

    /// 清屏颜色 (RGBA)
    #[serde(default = "default_clear_color")]
    pub clear_color: [f32; 4],

    /// 在创建设备之前启用 D3D12 调试层
    #[serde(default = "default_debug_layer")]
    pub debug_layer: bool,

    /// 着色器字节码目录
    #[serde(default = "default_shader_dir")]
    pub shader_dir: PathBuf,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// 日志级别
    #[serde(default = "default_log_level")]
    pub level: LogLevel,

    /// 是否输出到文件
    #[serde(default = "default_file_output")]
    pub file_output: bool,

    /// 日志文件路径
    #[serde(default = "default_log_file")]
    pub log_file: String,
}

/// 日志级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

// 默认值函数
fn default_width() -> u32 { 1024 }
fn default_height() -> u32 { 768 }
fn default_title() -> String { "Flying Rat Rendering 101".to_string() }
fn default_resizable() -> bool { true }
fn default_vsync() -> bool { true }
fn default_clear() -> bool { true }
fn default_clear_color() -> [f32; 4] { [0.0, 0.0, 0.0, 1.0] }
fn default_debug_layer() -> bool { cfg!(debug_assertions) }
fn default_shader_dir() -> PathBuf { PathBuf::from("shaders") }
fn default_log_level() -> LogLevel { LogLevel::Info }
fn default_file_output() -> bool { false }
fn default_log_file() -> String { "rendering101.log".to_string() }

impl Default for Config {
    fn default() -> Self {
        Self {
            window: WindowConfig::default(),
            graphics: GraphicsConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            title: default_title(),
            resizable: default_resizable(),
        }
    }
}

impl Default for GraphicsConfig {
    fn default() -> Self {
        Self {
            vsync: default_vsync(),
            clear: default_clear(),
            clear_color: default_clear_color(),
            debug_layer: default_debug_layer(),
            shader_dir: default_shader_dir(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file_output: default_file_output(),
            log_file: default_log_file(),
        }
    }
}

impl Config {
    /// 从配置文件加载
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_str = path.as_ref().to_string_lossy().to_string();

        let contents = std::fs::read_to_string(path)
            .map_err(|_| ConfigError::FileNotFound(path_str.clone()))?;

        Self::from_toml_str(&contents)
    }

    /// 从 TOML 字符串解析
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        toml::from_str(contents)
            .map_err(|e| ConfigError::ParseError(e.to_string()).into())
    }

    /// 从配置文件加载，如果文件不存在或无法解析则使用默认配置
    pub fn from_file_or_default<P: AsRef<Path>>(path: P) -> Self {
        Self::from_file(path).unwrap_or_default()
    }

    /// 从命令行参数覆盖配置
    ///
    /// 支持的参数：
    /// - `--width <value>` / `--height <value>`: 窗口尺寸
    /// - `--no-vsync`: Present 不等待垂直同步
    /// - `--no-clear`: 不清屏
    /// - `--debug-layer`: 强制启用 D3D12 调试层
    pub fn apply_args<I>(&mut self, args: I)
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let args: Vec<String> = args.into_iter().map(|s| s.as_ref().to_string()).collect();

        if args.iter().any(|a| a == "--no-vsync") {
            self.graphics.vsync = false;
        }

        if args.iter().any(|a| a == "--no-clear") {
            self.graphics.clear = false;
        }

        if args.iter().any(|a| a == "--debug-layer") {
            self.graphics.debug_layer = true;
        }

        if let Some(width) = value_after(&args, "--width") {
            self.window.width = width;
        }

        if let Some(height) = value_after(&args, "--height") {
            self.window.height = height;
        }
    }

    /// 验证配置的有效性
    pub fn validate(&self) -> Result<()> {
        if self.window.width == 0 || self.window.height == 0 {
            return Err(ConfigError::InvalidValue {
                field: "window.width/height".to_string(),
                reason: "Window dimensions must be greater than 0".to_string(),
            }.into());
        }

        if self.graphics.clear_color.iter().any(|c| !(0.0..=1.0).contains(c)) {
            return Err(ConfigError::InvalidValue {
                field: "graphics.clear_color".to_string(),
                reason: "Color components must be within [0, 1]".to_string(),
            }.into());
        }

        Ok(())
    }
}

impl GraphicsConfig {
    /// Present 使用的 sync interval
    pub fn sync_interval(&self) -> u32 {
        if self.vsync { 1 } else { 0 }
    }

    /// 清屏颜色；关闭清屏时返回 `None`
    pub fn clear_color(&self) -> Option<[f32; 4]> {
        self.clear.then_some(self.clear_color)
    }
}

fn value_after(args: &[String], flag: &str) -> Option<u32> {
    let idx = args.iter().position(|a| a == flag)?;
    args.get(idx + 1)?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.window.width, 1024);
        assert_eq!(config.window.height, 768);
        assert!(config.graphics.vsync);
        assert_eq!(config.graphics.sync_interval(), 1);
        assert_eq!(config.graphics.clear_color(), Some([0.0, 0.0, 0.0, 1.0]));
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        assert!(config.validate().is_ok());

        config.window.width = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.graphics.clear_color = [0.0, 2.0, 0.0, 1.0];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_apply_args() {
        let mut config = Config::default();
        config.apply_args(["app", "--width", "800", "--height", "600", "--no-vsync", "--no-clear"]);

        assert_eq!(config.window.width, 800);
        assert_eq!(config.window.height, 600);
        assert_eq!(config.graphics.sync_interval(), 0);
        assert_eq!(config.graphics.clear_color(), None);
    }

    #[test]
    fn test_apply_args_ignores_bad_numbers() {
        let mut config = Config::default();
        config.apply_args(["app", "--width", "wide", "--height"]);
        assert_eq!(config.window.width, 1024);
        assert_eq!(config.window.height, 768);
    }

    #[test]
    fn test_partial_toml() {
        let config = Config::from_toml_str(
            r#"
            [window]
            width = 640

            [graphics]
            vsync = false
            "#,
        )
        .unwrap();

        assert_eq!(config.window.width, 640);
        assert_eq!(config.window.height, 768);
        assert!(!config.graphics.vsync);
        assert_eq!(config.logging.level, LogLevel::Info);
    }

    #[test]
    fn test_invalid_toml() {
        assert!(Config::from_toml_str("[window\nwidth = ").is_err());
    }
}
