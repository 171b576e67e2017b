//! Rendering 101 - DirectX 12 教程渲染器
//!
//! # 使用方法
//!
//! ```bash
//! # 使用 config.toml（不存在时使用默认配置）
//! cargo run
//!
//! # 命令行覆盖
//! cargo run -- --width 1280 --height 720 --no-vsync --debug-layer
//! ```
//!
//! # 架构概览
//!
//! ```text
//! ┌─────────────┐
//! │   main.rs   │  配置、日志、退出码
//! └──────┬──────┘
//!        │
//! ┌──────▼──────┐
//! │     app     │  winit 事件循环
//! └──────┬──────┘
//!        │
//!   ┌────┴─────┐
//!   │          │
//! ┌─▼──────┐ ┌─▼─────┐
//! │Renderer│ │ Scene │  帧生命周期 / 场景图
//! └─┬──────┘ └───────┘
//!   │
//! ┌─▼──────┐
//! │  DX12  │  设备、交换链、围栏
//! └────────┘
//! ```

use rendering_101::core::{log, Config};
use tracing::{error, info};

/// 应用程序入口点
///
/// # 初始化流程
///
/// 1. 加载配置文件（config.toml）
/// 2. 应用命令行参数覆盖
/// 3. 验证配置
/// 4. 初始化日志系统
/// 5. 运行窗口事件循环
///
/// 任何致命错误都记录日志并以状态码 1 退出；正常关闭窗口退出码为 0。
fn main() {
    let mut config = Config::from_file_or_default("config.toml");
    config.apply_args(std::env::args());

    if let Err(e) = config.validate() {
        eprintln!("Invalid configuration: {}", e);
        std::process::exit(1);
    }

    if let Err(e) = log::init_from_config(&config.logging) {
        eprintln!("Failed to initialize logging: {}", e);
        std::process::exit(1);
    }

    info!(version = env!("CARGO_PKG_VERSION"), "Rendering 101 starting");
    info!(
        width = config.window.width,
        height = config.window.height,
        vsync = config.graphics.vsync,
        debug_layer = config.graphics.debug_layer,
        "Graphics configuration"
    );

    run(config);
}

#[cfg(target_os = "windows")]
fn run(config: Config) {
    if let Err(e) = rendering_101::app::run(config) {
        error!("Fatal error: {:#}", e);
        rendering_101::app::break_into_debugger();
        std::process::exit(1);
    }
}

#[cfg(not(target_os = "windows"))]
fn run(_config: Config) {
    error!("Rendering 101 requires Windows and DirectX 12");
    std::process::exit(1);
}
