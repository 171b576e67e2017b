//! 核心功能模块
//!
//! 本模块提供与图形 API 无关的基础设施：日志系统、配置管理和错误处理。
//!
//! # 模块组织
//!
//! - `log`：日志系统，按组件划分 target
//! - `config`：配置管理，支持配置文件和命令行参数
//! - `error`：错误处理，定义统一的错误类型
//! - `memory`：分配统计（`memory-stats` feature）

pub mod log;
pub mod config;
pub mod error;
pub mod memory;

pub use error::{Result, RenderError, GraphicsError};
pub use config::Config;
