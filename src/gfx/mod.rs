//! 图形后端模块
//!
//! - `backend`：帧生命周期使用的 `GraphicsBackend` / `GpuFence` 接口
//! - `recording`：在内存中记录调用序列的后端，用于测试帧同步协议
//! - `adapter`：适配器分类
//! - `dx12`：DirectX 12 实现（仅 Windows）

pub mod adapter;
pub mod backend;
pub mod recording;
#[cfg(target_os = "windows")]
pub mod dx12;

pub use adapter::GpuPerformanceClass;
pub use backend::{GpuFence, GraphicsBackend};
#[cfg(target_os = "windows")]
pub use dx12::Dx12Backend;
