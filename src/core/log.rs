//! 日志系统模块
//!
//! 基于 `tracing` 提供结构化的日志记录功能。
//!
//! 日志器不再是全局单例：`main` 根据配置构建一次 subscriber，
//! 之后各组件通过自己的 target 记录日志：
//!
//! - `rendering_101::renderer`：帧生命周期、同步、尺寸变化
//! - `rendering_101::dx12`：设备、交换链、资源创建
//! - `rendering_101::scene`：场景图与实体
//!
//! # 使用示例
//!
//! ```no_run
//! use rendering_101::core::{log, config::LogLevel};
//!
//! log::init_logger(LogLevel::Info, false, None).unwrap();
//! rendering_101::renderer_info!(width = 800, height = 600, "Swap chain resized");
//! ```

use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    prelude::*,
    EnvFilter,
};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use std::path::Path;

use super::config::{LogLevel, LoggingConfig};
use super::error::{RenderError, Result};

/// 初始化日志系统
///
/// 只能调用一次；重复初始化返回 `RenderError::Log`。
/// `RUST_LOG` 环境变量存在时优先于配置中的级别。
///
/// # 参数
///
/// * `level` - 日志级别
/// * `file_output` - 是否同时输出到文件（按天滚动）
/// * `log_file_path` - 日志文件路径（可选，默认为 "rendering101.log"）
pub fn init_logger(level: LogLevel, file_output: bool, log_file_path: Option<&str>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directive(level)));

    if file_output {
        let log_path = log_file_path.unwrap_or("rendering101.log");
        let path = Path::new(log_path);
        let directory = path.parent().unwrap_or(Path::new("."));
        let filename = path.file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("rendering101.log");

        let file_appender = RollingFileAppender::new(Rotation::DAILY, directory, filename);

        let console_layer = fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_ansi(true);

        let file_layer = fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_ansi(false)  // 文件不需要 ANSI 颜色
            .with_writer(file_appender);

        tracing_subscriber::registry()
            .with(filter)
            .with(console_layer)
            .with(file_layer)
            .try_init()
            .map_err(|e| RenderError::Log(e.to_string()))
    } else {
        let fmt_layer = fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_span_events(FmtSpan::CLOSE)
            .with_ansi(true);

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .try_init()
            .map_err(|e| RenderError::Log(e.to_string()))
    }
}

/// 按配置文件中的 `[logging]` 段初始化
pub fn init_from_config(config: &LoggingConfig) -> Result<()> {
    init_logger(config.level, config.file_output, Some(&config.log_file))
}

fn filter_directive(level: LogLevel) -> &'static str {
    match level {
        LogLevel::Trace => "trace",
        LogLevel::Debug => "debug",
        LogLevel::Info => "info",
        LogLevel::Warn => "warn",
        LogLevel::Error => "error",
    }
}

/// 渲染器日志 - Info 级别
#[macro_export]
macro_rules! renderer_info {
    ($($arg:tt)*) => {
        tracing::info!(target: "rendering_101::renderer", $($arg)*)
    };
}

/// 渲染器日志 - Debug 级别
#[macro_export]
macro_rules! renderer_debug {
    ($($arg:tt)*) => {
        tracing::debug!(target: "rendering_101::renderer", $($arg)*)
    };
}

/// 渲染器日志 - Warn 级别
#[macro_export]
macro_rules! renderer_warn {
    ($($arg:tt)*) => {
        tracing::warn!(target: "rendering_101::renderer", $($arg)*)
    };
}

/// DX12 后端日志 - Info 级别
#[macro_export]
macro_rules! dx12_info {
    ($($arg:tt)*) => {
        tracing::info!(target: "rendering_101::dx12", $($arg)*)
    };
}

/// DX12 后端日志 - Warn 级别
#[macro_export]
macro_rules! dx12_warn {
    ($($arg:tt)*) => {
        tracing::warn!(target: "rendering_101::dx12", $($arg)*)
    };
}

/// DX12 后端日志 - Error 级别
#[macro_export]
macro_rules! dx12_error {
    ($($arg:tt)*) => {
        tracing::error!(target: "rendering_101::dx12", $($arg)*)
    };
}

/// 场景日志 - Info 级别
#[macro_export]
macro_rules! scene_info {
    ($($arg:tt)*) => {
        tracing::info!(target: "rendering_101::scene", $($arg)*)
    };
}

/// 场景日志 - Debug 级别
#[macro_export]
macro_rules! scene_debug {
    ($($arg:tt)*) => {
        tracing::debug!(target: "rendering_101::scene", $($arg)*)
    };
}

/// 日志级别转换
impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_conversion() {
        assert_eq!(Level::from(LogLevel::Info), Level::INFO);
        assert_eq!(Level::from(LogLevel::Error), Level::ERROR);
    }

    #[test]
    fn test_filter_directive() {
        assert_eq!(filter_directive(LogLevel::Trace), "trace");
        assert_eq!(filter_directive(LogLevel::Warn), "warn");
    }

    #[test]
    fn test_second_init_is_rejected() {
        // 先装一个只输出 warn 以上、写入测试捕获缓冲区的 subscriber
        let quiet = tracing_subscriber::registry()
            .with(EnvFilter::new("warn"))
            .with(fmt::layer().with_test_writer());
        let _ = tracing::subscriber::set_global_default(quiet);

        assert!(matches!(
            init_logger(LogLevel::Debug, false, None),
            Err(RenderError::Log(_))
        ));
    }
}
