//! 窗口层（仅 Windows）
//!
//! winit 事件循环驱动渲染器：
//!
//! - `Resized`：转发给 `Renderer::resize`，最小化或面积为零时暂停渲染
//! - `RedrawRequested`：开始一帧，场景 update/render，结束一帧
//! - `AboutToWait`：请求下一次重绘
//! - `CloseRequested`：等待 GPU，释放场景资源，关闭渲染器，退出

use anyhow::{anyhow, bail, Context};
use raw_window_handle::{HasWindowHandle, RawWindowHandle};
use tracing::{error, info};
use windows::Win32::Foundation::HWND;
use winit::dpi::LogicalSize;
use winit::event::{Event, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::window::{Window, WindowBuilder};

use crate::core::error::{RenderError, Result};
use crate::core::{memory, Config};
use crate::gfx::dx12::Dx12Backend;
use crate::renderer::Renderer;
use crate::scene::{DefaultSceneGraphFactory, ResourceInitMetadata, SceneGraph};

/// 创建窗口、渲染器和默认场景，运行事件循环直到窗口关闭
pub fn run(config: Config) -> anyhow::Result<()> {
    let event_loop = EventLoop::new().context("Failed to create event loop")?;
    let window = WindowBuilder::new()
        .with_title(config.window.title.as_str())
        .with_inner_size(LogicalSize::new(config.window.width, config.window.height))
        .with_resizable(config.window.resizable)
        .build(&event_loop)
        .context("Failed to create window")?;

    let hwnd = window_hwnd(&window)?;
    let size = window.inner_size();

    let mut renderer = Renderer::initialize(hwnd, size.width, size.height, &config.graphics)
        .context("Failed to initialize renderer")?;

    let context = renderer.backend().context();
    window.set_title(&format!(
        "{} - {} ({})",
        config.window.title,
        context.adapter_name(),
        context.performance_class()
    ));
    info!(
        adapter = context.adapter_name(),
        class = %context.performance_class(),
        debug_layer = context.debug_layer_enabled(),
        "Renderer ready"
    );

    let mut scene = DefaultSceneGraphFactory::make(&config.graphics.shader_dir);
    scene
        .on_resource_create(&ResourceInitMetadata {
            device: renderer.device(),
            back_buffer_count: renderer.back_buffer_count(),
        })
        .context("Failed to create scene resources")?;

    info!(width = size.width, height = size.height, "Entering main loop");

    let mut failure: Option<RenderError> = None;
    let failure_slot = &mut failure;

    event_loop.run(move |event, elwt| {
        if elwt.exiting() {
            return;
        }
        elwt.set_control_flow(ControlFlow::Poll);

        let result = match event {
            Event::WindowEvent { event, .. } => match event {
                WindowEvent::CloseRequested => {
                    info!("Close requested, shutting down");
                    let result = shutdown(&mut renderer, &mut scene);
                    elwt.exit();
                    result
                }
                WindowEvent::Resized(size) => {
                    let minimized = window.is_minimized().unwrap_or(false);
                    renderer.resize(size.width, size.height, minimized)
                }
                WindowEvent::RedrawRequested => render_frame(&mut renderer, &mut scene),
                _ => Ok(()),
            },
            Event::AboutToWait => {
                window.request_redraw();
                Ok(())
            }
            _ => Ok(()),
        };

        if let Err(e) = result {
            error!(fatal = e.is_fatal(), "{}", e);
            *failure_slot = Some(e);
            elwt.exit();
        }
    })?;

    match failure {
        Some(e) => Err(e.into()),
        None => {
            info!("Application exited normally");
            Ok(())
        }
    }
}

fn render_frame(renderer: &mut Renderer<Dx12Backend>, scene: &mut SceneGraph<Dx12Backend>) -> Result<()> {
    let Some(mut frame) = renderer.begin_frame()? else {
        return Ok(());
    };

    scene.update_and_render(&mut frame)?;
    renderer.end_frame(frame)
}

fn shutdown(renderer: &mut Renderer<Dx12Backend>, scene: &mut SceneGraph<Dx12Backend>) -> Result<()> {
    renderer.wait_for_gpu("shutdown")?;
    scene.on_shutdown();
    renderer.shutdown()?;
    memory::log_statistics();
    Ok(())
}

fn window_hwnd(window: &Window) -> anyhow::Result<HWND> {
    let handle = window
        .window_handle()
        .map_err(|e| anyhow!("Failed to get window handle: {}", e))?;

    match handle.as_raw() {
        RawWindowHandle::Win32(win32) => Ok(HWND(win32.hwnd.get() as *mut std::ffi::c_void)),
        other => bail!("Expected a Win32 window handle, got {:?}", other),
    }
}

/// 调试器已附加时中断（仅 Debug 构建）
pub fn break_into_debugger() {
    #[cfg(debug_assertions)]
    unsafe {
        use windows::Win32::System::Diagnostics::Debug::{DebugBreak, IsDebuggerPresent};

        if IsDebuggerPresent().as_bool() {
            DebugBreak();
        }
    }
}
