//! 错误处理模块
//!
//! 定义了渲染器中使用的统一错误类型。
//!
//! # 错误分类
//!
//! - **致命错误**：设备、交换链、栅栏等创建失败，或 GPU 调用失败。
//!   这些错误沿调用链返回到 `main`，记录日志后以非零状态退出进程。
//! - **可恢复的跳帧**：不是错误。`Renderer::begin_frame` 返回 `Ok(None)`，
//!   调用方跳过本帧即可。
//! - **窗口最小化 / 尺寸为零**：只是一个状态标记（停止渲染），也不是错误。

use std::fmt;
use std::path::PathBuf;

/// 渲染器统一的 Result 类型
pub type Result<T> = std::result::Result<T, RenderError>;

/// 渲染器的错误类型
#[derive(Debug)]
pub enum RenderError {
    /// 配置错误
    Config(ConfigError),

    /// 图形 API 错误
    Graphics(GraphicsError),

    /// 着色器加载错误
    Shader(ShaderError),

    /// IO 错误
    Io(std::io::Error),

    /// 日志系统错误
    Log(String),
}

/// 配置相关的错误
#[derive(Debug)]
pub enum ConfigError {
    /// 配置文件未找到
    FileNotFound(String),

    /// 配置文件解析失败
    ParseError(String),

    /// 配置值无效
    InvalidValue { field: String, reason: String },
}

/// 图形 API 相关的错误
#[derive(Debug)]
pub enum GraphicsError {
    /// 没有可用的硬件适配器
    AdapterNotFound(String),

    /// 设备创建失败
    DeviceCreation(String),

    /// 交换链错误
    SwapchainError(String),

    /// 资源创建失败
    ResourceCreation(String),

    /// 命令记录或提交失败
    CommandExecution(String),

    /// 栅栏同步失败
    Synchronization(String),

    /// 设备被移除（GPU 仍在使用被释放的资源等）
    DeviceRemoved(String),

    /// 帧元数据与当前记录的帧不匹配
    InvalidFrame(String),
}

/// 着色器相关的错误
#[derive(Debug)]
pub enum ShaderError {
    /// 字节码文件和源文件都不存在
    FileNotFound(PathBuf),

    /// 字节码为空
    Empty(PathBuf),

    /// 运行时编译失败
    Compilation(String),
}

impl RenderError {
    /// 便捷构造：图形错误
    pub fn graphics(err: GraphicsError) -> Self {
        RenderError::Graphics(err)
    }

    /// 是否为需要终止进程的错误
    ///
    /// 配置和日志错误在窗口创建前就会出现，调用方可以选择回退到默认值；
    /// 其余错误都意味着图形环境不可用。
    pub fn is_fatal(&self) -> bool {
        !matches!(self, RenderError::Config(_) | RenderError::Log(_))
    }
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::Config(e) => write!(f, "Configuration error: {}", e),
            RenderError::Graphics(e) => write!(f, "Graphics error: {}", e),
            RenderError::Shader(e) => write!(f, "Shader error: {}", e),
            RenderError::Io(e) => write!(f, "IO error: {}", e),
            RenderError::Log(msg) => write!(f, "Log error: {}", msg),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::FileNotFound(path) => write!(f, "Config file not found: {}", path),
            ConfigError::ParseError(msg) => write!(f, "Failed to parse config: {}", msg),
            ConfigError::InvalidValue { field, reason } => {
                write!(f, "Invalid value for '{}': {}", field, reason)
            }
        }
    }
}

impl fmt::Display for GraphicsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GraphicsError::AdapterNotFound(msg) => write!(f, "No suitable adapter: {}", msg),
            GraphicsError::DeviceCreation(msg) => write!(f, "Device creation failed: {}", msg),
            GraphicsError::SwapchainError(msg) => write!(f, "Swapchain error: {}", msg),
            GraphicsError::ResourceCreation(msg) => write!(f, "Resource creation failed: {}", msg),
            GraphicsError::CommandExecution(msg) => write!(f, "Command execution failed: {}", msg),
            GraphicsError::Synchronization(msg) => write!(f, "Fence synchronization failed: {}", msg),
            GraphicsError::DeviceRemoved(msg) => write!(f, "Device removed: {}", msg),
            GraphicsError::InvalidFrame(msg) => write!(f, "Invalid frame: {}", msg),
        }
    }
}

impl fmt::Display for ShaderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderError::FileNotFound(path) => write!(f, "Shader not found: {}", path.display()),
            ShaderError::Empty(path) => write!(f, "Shader bytecode is empty: {}", path.display()),
            ShaderError::Compilation(msg) => write!(f, "Shader compilation failed: {}", msg),
        }
    }
}

impl std::error::Error for RenderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RenderError::Io(e) => Some(e),
            RenderError::Config(e) => Some(e),
            RenderError::Graphics(e) => Some(e),
            RenderError::Shader(e) => Some(e),
            _ => None,
        }
    }
}

impl std::error::Error for ConfigError {}
impl std::error::Error for GraphicsError {}
impl std::error::Error for ShaderError {}

impl From<std::io::Error> for RenderError {
    fn from(err: std::io::Error) -> Self {
        RenderError::Io(err)
    }
}

impl From<ConfigError> for RenderError {
    fn from(err: ConfigError) -> Self {
        RenderError::Config(err)
    }
}

impl From<GraphicsError> for RenderError {
    fn from(err: GraphicsError) -> Self {
        RenderError::Graphics(err)
    }
}

impl From<ShaderError> for RenderError {
    fn from(err: ShaderError) -> Self {
        RenderError::Shader(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_graphics_error_display() {
        let err: RenderError = GraphicsError::DeviceRemoved("resize while in flight".into()).into();
        assert_eq!(err.to_string(), "Graphics error: Device removed: resize while in flight");
    }

    #[test]
    fn test_fatal_classification() {
        let config: RenderError = ConfigError::ParseError("bad".into()).into();
        assert!(!config.is_fatal());

        let graphics = RenderError::graphics(GraphicsError::AdapterNotFound("none".into()));
        assert!(graphics.is_fatal());

        let shader: RenderError = ShaderError::Empty(PathBuf::from("a.cso")).into();
        assert!(shader.is_fatal());
    }

    #[test]
    fn test_error_source_chain() {
        use std::error::Error;
        let io = RenderError::from(std::io::Error::new(std::io::ErrorKind::NotFound, "missing"));
        assert!(io.source().is_some());
        assert!(RenderError::Log("x".into()).source().is_none());
    }
}
