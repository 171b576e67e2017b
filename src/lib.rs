//! Rendering 101 - DirectX 12 教程渲染器
//!
//! 核心是帧生命周期与 GPU 同步引擎：双缓冲交换链、每个缓冲区一个命令分配器、
//! 围栏驱动的 CPU/GPU 帧节奏、安全的窗口尺寸调整，以及一个极简的场景图。
//!
//! # 模块结构
//!
//! - `core`：配置、日志、错误处理
//! - `gfx`：图形后端接口、内存中的记录后端、DirectX 12 实现
//! - `renderer`：帧渲染器（对后端泛型）
//! - `scene`：实体约定与场景图
//! - `app`：winit 窗口层（仅 Windows）
//!
//! # 使用示例
//!
//! ```no_run
//! use rendering_101::gfx::recording::RecordingBackend;
//! use rendering_101::renderer::{Renderer, RendererSettings};
//!
//! let backend = RecordingBackend::new(1024, 768);
//! let mut renderer = Renderer::new(backend, 1024, 768, RendererSettings::default()).unwrap();
//!
//! if let Some(frame) = renderer.begin_frame().unwrap() {
//!     renderer.end_frame(frame).unwrap();
//! }
//! ```

pub mod core;
pub mod gfx;
pub mod renderer;
pub mod scene;

#[cfg(target_os = "windows")]
pub mod app;
