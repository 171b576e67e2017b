//! 渲染器模块
//!
//! 帧生命周期与 GPU 同步引擎。`Renderer` 对后端是泛型的：
//! 生产环境使用 `gfx::dx12::Dx12Backend`，测试使用 `gfx::recording::RecordingBackend`。
//!
//! # 每帧流程
//!
//! 1. `begin_frame`：重置当前槽位的命令分配器，打开命令列表，设置视口和裁剪矩形，
//!    Present→RenderTarget 屏障，绑定 RTV，按需清屏，返回 `FrameMetadata`
//! 2. 场景遍历：每个根节点先深度优先 update，再深度优先 render
//! 3. `end_frame`：RenderTarget→Present 屏障，关闭并提交，Present，
//!    等待下一个槽位可用，帧计数加一
//!
//! # 调整尺寸
//!
//! 尺寸不变时什么都不做。否则停止渲染，等待 GPU，释放 RTV 并重置围栏值，
//! `ResizeBuffers`，重建 RTV，重新读取后台缓冲区索引，恢复渲染。
//! 窗口最小化（或面积为零）时只停止渲染。

pub mod command;
pub mod descriptor;
pub mod sync;
pub mod vertex;

use crate::core::config::GraphicsConfig;
use crate::core::error::{GraphicsError, Result};
use crate::gfx::backend::GraphicsBackend;

use command::{FrameMetadata, RecorderState, ResourceState};
use descriptor::RenderTargetSet;
use sync::FrameSynchronizer;

/// 交换链缓冲区数量（双缓冲）
pub const BUFFER_COUNT: usize = 2;

/// 渲染器运行参数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RendererSettings {
    /// Present 的 sync interval
    pub sync_interval: u32,
    /// 清屏颜色；`None` 表示不清屏
    pub clear_color: Option<[f32; 4]>,
}

impl Default for RendererSettings {
    fn default() -> Self {
        Self {
            sync_interval: 1,
            clear_color: Some([0.0, 0.0, 0.0, 1.0]),
        }
    }
}

impl From<&GraphicsConfig> for RendererSettings {
    fn from(config: &GraphicsConfig) -> Self {
        Self {
            sync_interval: config.sync_interval(),
            clear_color: config.clear_color(),
        }
    }
}

/// 帧渲染器
pub struct Renderer<B: GraphicsBackend> {
    backend: B,
    render_targets: RenderTargetSet<B::RenderTarget>,
    sync: FrameSynchronizer<B::Fence>,
    settings: RendererSettings,
    width: u32,
    height: u32,
    back_buffer_index: usize,
    frame_counter: u64,
    state: RecorderState,
    should_render: bool,
}

impl<B: GraphicsBackend> Renderer<B> {
    /// 在已创建好设备和交换链的后端上初始化渲染器
    ///
    /// 创建 RTV 和帧围栏，并读取交换链当前的后台缓冲区索引。
    ///
    /// # 参数
    ///
    /// * `backend` - 图形后端
    /// * `width` / `height` - 交换链尺寸
    /// * `settings` - 运行参数
    pub fn new(mut backend: B, width: u32, height: u32, settings: RendererSettings) -> Result<Self> {
        let mut render_targets = RenderTargetSet::new();
        render_targets.create(&mut backend, BUFFER_COUNT)?;

        let fence = backend.create_fence()?;
        let back_buffer_index = backend.current_back_buffer_index();

        crate::renderer_info!(
            backend = backend.backend_name(),
            width,
            height,
            buffers = BUFFER_COUNT,
            vsync = settings.sync_interval != 0,
            "Renderer initialized"
        );

        Ok(Self {
            backend,
            render_targets,
            sync: FrameSynchronizer::new(fence),
            settings,
            width,
            height,
            back_buffer_index,
            frame_counter: 0,
            state: RecorderState::Idle,
            should_render: true,
        })
    }

    /// 开始一帧
    ///
    /// # 返回值
    ///
    /// - `Ok(Some(frame))`：命令列表已打开，交给场景录制
    /// - `Ok(None)`：渲染被暂停（调整尺寸、最小化）或上一帧尚未结束，调用方跳过本帧
    pub fn begin_frame(&mut self) -> Result<Option<FrameMetadata<B>>> {
        if self.state.is_shut_down() {
            crate::renderer_debug!("Frame skipped: renderer is shut down");
            return Ok(None);
        }

        if !self.should_render {
            crate::renderer_debug!("Frame skipped: rendering suspended");
            return Ok(None);
        }

        if let RecorderState::Recording { frame } = self.state {
            crate::renderer_warn!(frame, "begin_frame called while a frame is still recording");
            return Ok(None);
        }

        let index = self.back_buffer_index;

        // 先取 RTV：失败时命令列表还没有打开
        let view = self.render_targets.view(index)?;

        self.backend.reset_command_allocator(index)?;
        let mut command_list = self.backend.open_command_list(index)?;

        self.backend.set_viewport(&mut command_list, self.width, self.height);

        self.backend.transition_barrier(
            &mut command_list,
            &view.resource,
            ResourceState::Present,
            ResourceState::RenderTarget,
        );
        self.backend.bind_render_target(&mut command_list, view.handle);

        if let Some(color) = self.settings.clear_color {
            self.backend.clear_render_target(&mut command_list, view.handle, color);
        }

        self.state = RecorderState::Recording { frame: self.frame_counter };

        Ok(Some(FrameMetadata {
            frame: self.frame_counter,
            back_buffer_index: index,
            command_list,
        }))
    }

    /// 结束一帧：提交、呈现并切换到下一个后台缓冲区
    ///
    /// 不属于当前打开帧的元数据返回 `GraphicsError::InvalidFrame`。
    pub fn end_frame(&mut self, frame: FrameMetadata<B>) -> Result<()> {
        match self.state {
            RecorderState::Recording { frame: open }
                if open == frame.frame && frame.back_buffer_index == self.back_buffer_index => {}
            state => {
                return Err(GraphicsError::InvalidFrame(format!(
                    "end_frame for frame {} (buffer {}) but recorder is {:?}",
                    frame.frame, frame.back_buffer_index, state
                )).into());
            }
        }

        let FrameMetadata { back_buffer_index: index, mut command_list, .. } = frame;

        let view = self.render_targets.view(index)?;
        self.backend.transition_barrier(
            &mut command_list,
            &view.resource,
            ResourceState::RenderTarget,
            ResourceState::Present,
        );

        self.backend.execute(command_list)?;
        self.state = RecorderState::Idle;

        self.backend.present(self.settings.sync_interval)?;

        let next = self.backend.current_back_buffer_index();
        self.sync.wait_before_next_frame(index, next)?;
        self.back_buffer_index = next;

        self.frame_counter += 1;
        Ok(())
    }

    /// 窗口尺寸变化
    ///
    /// # 参数
    ///
    /// * `width` / `height` - 新的客户区尺寸
    /// * `minimized` - 窗口是否最小化；面积为零同样视为最小化
    pub fn resize(&mut self, width: u32, height: u32, minimized: bool) -> Result<()> {
        if self.state.is_shut_down() {
            crate::renderer_debug!(width, height, "Resize ignored: renderer is shut down");
            return Ok(());
        }

        if minimized || width == 0 || height == 0 {
            if self.should_render {
                crate::renderer_info!(width, height, "Window minimized, rendering suspended");
            }
            self.should_render = false;
            return Ok(());
        }

        if width == self.width && height == self.height {
            if !self.should_render {
                crate::renderer_info!(width, height, "Window restored, rendering resumed");
                self.should_render = true;
            }
            return Ok(());
        }

        if let RecorderState::Recording { frame } = self.state {
            return Err(GraphicsError::InvalidFrame(format!(
                "resize requested while frame {} is recording",
                frame
            )).into());
        }

        self.should_render = false;

        self.wait_for_gpu("resize")?;
        self.cleanup_render_target_views()?;

        self.backend.resize_buffers(width, height)?;
        self.width = width;
        self.height = height;

        self.render_targets.create(&mut self.backend, BUFFER_COUNT)?;
        self.back_buffer_index = self.backend.current_back_buffer_index();

        self.should_render = true;

        crate::renderer_info!(width, height, back_buffer = self.back_buffer_index, "Swap chain resized");
        Ok(())
    }

    /// 阻塞直到 GPU 完成所有已提交的工作
    pub fn wait_for_gpu(&mut self, reason: &str) -> Result<()> {
        self.sync.wait_for_gpu(reason, self.back_buffer_index)
    }

    /// 关闭渲染器
    ///
    /// 等待 GPU 空闲后释放交换链缓冲区的引用。
    /// 实体必须在此之前完成 `on_shutdown`。之后的 `begin_frame` 返回 `None`，
    /// `resize` 被忽略，重复调用 `shutdown` 什么都不做。
    pub fn shutdown(&mut self) -> Result<()> {
        match self.state {
            RecorderState::ShutDown => return Ok(()),
            RecorderState::Recording { frame } => {
                crate::renderer_warn!(frame, "Shutting down with an unfinished frame");
            }
            RecorderState::Idle => {}
        }

        self.should_render = false;
        self.wait_for_gpu("shutdown")?;
        self.render_targets.cleanup(&mut self.backend);
        self.state = RecorderState::ShutDown;

        crate::renderer_info!(frames = self.frame_counter, "Renderer shut down");
        Ok(())
    }

    fn cleanup_render_target_views(&mut self) -> Result<()> {
        self.render_targets.cleanup(&mut self.backend);
        self.sync.reset()
    }

    pub fn device(&self) -> &B::Device {
        self.backend.device()
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn back_buffer_count(&self) -> usize {
        BUFFER_COUNT
    }

    pub fn back_buffer_index(&self) -> usize {
        self.back_buffer_index
    }

    pub fn frame_counter(&self) -> u64 {
        self.frame_counter
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn should_render(&self) -> bool {
        self.should_render
    }

    pub fn is_recording(&self) -> bool {
        self.state.is_recording()
    }

    pub fn is_shut_down(&self) -> bool {
        self.state.is_shut_down()
    }

    /// 当前的渲染目标视图数量
    pub fn render_target_count(&self) -> usize {
        self.render_targets.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::recording::{GpuCall, RecordingBackend};

    fn renderer(width: u32, height: u32) -> Renderer<RecordingBackend> {
        Renderer::new(RecordingBackend::new(width, height), width, height, RendererSettings::default())
            .unwrap()
    }

    fn run_frame(renderer: &mut Renderer<RecordingBackend>) {
        let frame = renderer.begin_frame().unwrap().expect("frame should start");
        renderer.end_frame(frame).unwrap();
    }

    #[test]
    fn test_initial_state() {
        let renderer = renderer(1024, 768);
        assert_eq!(renderer.render_target_count(), 2);
        assert_eq!(renderer.frame_counter(), 0);
        assert!(renderer.should_render());
        assert!(!renderer.is_recording());
    }

    #[test]
    fn test_first_frame_uses_current_index() {
        let mut renderer = renderer(1024, 768);
        let expected = renderer.backend().current_back_buffer_index();

        let frame = renderer.begin_frame().unwrap().unwrap();
        assert_eq!(frame.back_buffer_index, expected);
        assert_eq!(frame.frame, 0);
        renderer.end_frame(frame).unwrap();
        assert_eq!(renderer.frame_counter(), 1);
    }

    #[test]
    fn test_barrier_round_trip() {
        let mut renderer = renderer(1024, 768);
        renderer.backend_mut().clear_calls();

        let frame = renderer.begin_frame().unwrap().unwrap();
        let index = frame.back_buffer_index;
        renderer.end_frame(frame).unwrap();

        let barriers: Vec<_> = renderer
            .backend()
            .calls()
            .into_iter()
            .filter(|c| matches!(c, GpuCall::Barrier { .. }))
            .collect();

        assert_eq!(
            barriers,
            vec![
                GpuCall::Barrier { buffer: index, before: ResourceState::Present, after: ResourceState::RenderTarget },
                GpuCall::Barrier { buffer: index, before: ResourceState::RenderTarget, after: ResourceState::Present },
            ]
        );
    }

    #[test]
    fn test_frame_call_order() {
        let mut renderer = renderer(1024, 768);
        renderer.backend_mut().clear_calls();

        run_frame(&mut renderer);

        let calls = renderer.backend().calls();
        let position = |pred: &dyn Fn(&GpuCall) -> bool| calls.iter().position(|c| pred(c)).unwrap();

        let reset = position(&|c: &GpuCall| matches!(c, GpuCall::ResetAllocator { .. }));
        let viewport = position(&|c: &GpuCall| matches!(c, GpuCall::SetViewport { width: 1024, height: 768 }));
        let bind = position(&|c: &GpuCall| matches!(c, GpuCall::BindRenderTarget { .. }));
        let clear = position(&|c: &GpuCall| matches!(c, GpuCall::Clear { .. }));
        let execute = position(&|c: &GpuCall| matches!(c, GpuCall::Execute { .. }));
        let present = position(&|c: &GpuCall| matches!(c, GpuCall::Present { sync_interval: 1, .. }));
        let signal = position(&|c: &GpuCall| matches!(c, GpuCall::Signal { .. }));

        assert!(reset < viewport);
        assert!(viewport < bind);
        assert!(bind < clear);
        assert!(clear < execute);
        assert!(execute < present);
        assert!(present < signal);
    }

    #[test]
    fn test_no_clear_when_disabled() {
        let settings = RendererSettings { sync_interval: 0, clear_color: None };
        let mut renderer = Renderer::new(RecordingBackend::new(640, 480), 640, 480, settings).unwrap();
        run_frame(&mut renderer);

        let calls = renderer.backend().calls();
        assert!(!calls.iter().any(|c| matches!(c, GpuCall::Clear { .. })));
        assert!(calls.iter().any(|c| matches!(c, GpuCall::Present { sync_interval: 0, .. })));
    }

    #[test]
    fn test_second_begin_without_end_is_rejected() {
        let mut renderer = renderer(1024, 768);
        let frame = renderer.begin_frame().unwrap().unwrap();

        assert!(renderer.begin_frame().unwrap().is_none());
        assert!(renderer.is_recording());

        renderer.end_frame(frame).unwrap();
        assert!(renderer.begin_frame().unwrap().is_some());
    }

    #[test]
    fn test_end_frame_rejects_foreign_metadata() {
        let mut renderer = renderer(1024, 768);
        let frame = renderer.begin_frame().unwrap().unwrap();

        let stale = FrameMetadata::<RecordingBackend> {
            frame: frame.frame + 7,
            back_buffer_index: frame.back_buffer_index,
            command_list: renderer.backend().detached_command_list(frame.back_buffer_index),
        };
        let err = renderer.end_frame(stale).unwrap_err();
        assert!(matches!(err, crate::core::RenderError::Graphics(GraphicsError::InvalidFrame(_))));

        renderer.end_frame(frame).unwrap();
    }

    #[test]
    fn test_end_frame_without_begin_is_rejected() {
        let mut renderer = renderer(1024, 768);
        let stale = FrameMetadata::<RecordingBackend> {
            frame: 0,
            back_buffer_index: 0,
            command_list: renderer.backend().detached_command_list(0),
        };
        assert!(renderer.end_frame(stale).is_err());
    }

    #[test]
    fn test_resize_same_size_is_noop() {
        let mut renderer = renderer(1024, 768);
        run_frame(&mut renderer);
        renderer.backend_mut().clear_calls();

        renderer.resize(1024, 768, false).unwrap();

        assert!(renderer.backend().calls().is_empty());
        assert_eq!(renderer.render_target_count(), 2);
        assert!(renderer.should_render());
    }

    #[test]
    fn test_minimized_suspends_rendering() {
        let mut renderer = renderer(1024, 768);
        renderer.backend_mut().clear_calls();

        renderer.resize(1024, 768, true).unwrap();
        assert!(!renderer.should_render());
        assert!(renderer.begin_frame().unwrap().is_none());

        renderer.resize(0, 0, false).unwrap();
        assert!(!renderer.should_render());

        let calls = renderer.backend().calls();
        assert!(!calls.iter().any(|c| matches!(c, GpuCall::ResizeBuffers { .. })));
        assert!(!calls.iter().any(|c| matches!(c, GpuCall::Present { .. })));

        // 恢复到原尺寸：不需要重建交换链
        renderer.resize(1024, 768, false).unwrap();
        assert!(renderer.should_render());
        assert!(!renderer.backend().calls().iter().any(|c| matches!(c, GpuCall::ResizeBuffers { .. })));
        run_frame(&mut renderer);
    }

    #[test]
    fn test_resize_mid_flight_waits_before_release() {
        let mut renderer = renderer(1024, 768);
        for _ in 0..3 {
            run_frame(&mut renderer);
        }
        assert!(renderer.backend().in_flight() > 0);
        renderer.backend_mut().clear_calls();

        renderer.resize(800, 600, false).unwrap();

        let calls = renderer.backend().calls();
        let wait = calls.iter().position(|c| matches!(c, GpuCall::Wait { .. })).unwrap();
        let release = calls.iter().position(|c| matches!(c, GpuCall::ReleaseRtvHeap)).unwrap();
        let resize = calls.iter().position(|c| matches!(c, GpuCall::ResizeBuffers { width: 800, height: 600 })).unwrap();
        assert!(wait < release);
        assert!(release < resize);

        assert_eq!(renderer.size(), (800, 600));
        assert_eq!(renderer.render_target_count(), 2);
        assert_eq!(renderer.back_buffer_index(), renderer.backend().current_back_buffer_index());

        run_frame(&mut renderer);
        assert!(renderer.backend().calls().iter().any(|c| matches!(c, GpuCall::SetViewport { width: 800, height: 600 })));
    }

    #[test]
    fn test_resize_resets_fence_values() {
        let mut renderer = renderer(1024, 768);
        for _ in 0..4 {
            run_frame(&mut renderer);
        }

        renderer.resize(640, 480, false).unwrap();
        assert_eq!(renderer.backend().completed_value(), 0);

        for _ in 0..4 {
            run_frame(&mut renderer);
        }
        assert_eq!(renderer.frame_counter(), 8);
    }

    #[test]
    fn test_many_frames_never_reuse_busy_allocator() {
        let mut renderer = renderer(1024, 768);
        for _ in 0..32 {
            run_frame(&mut renderer);
        }
        assert_eq!(renderer.frame_counter(), 32);
        assert!(renderer.backend().in_flight() <= 1);
    }

    #[test]
    fn test_shutdown_drains_gpu() {
        let mut renderer = renderer(1024, 768);
        run_frame(&mut renderer);
        run_frame(&mut renderer);

        renderer.shutdown().unwrap();
        assert_eq!(renderer.backend().in_flight(), 0);
        assert_eq!(renderer.render_target_count(), 0);
        assert!(renderer.begin_frame().unwrap().is_none());
    }

    #[test]
    fn test_shutdown_is_terminal() {
        let mut renderer = renderer(64, 64);
        run_frame(&mut renderer);
        renderer.shutdown().unwrap();
        renderer.backend_mut().clear_calls();

        // 同尺寸和新尺寸都不能让渲染器恢复
        renderer.resize(64, 64, false).unwrap();
        assert!(!renderer.should_render());
        renderer.resize(128, 96, false).unwrap();
        assert_eq!(renderer.size(), (64, 64));
        assert_eq!(renderer.render_target_count(), 0);

        assert!(renderer.begin_frame().unwrap().is_none());
        assert!(renderer.begin_frame().unwrap().is_none());
        assert!(renderer.is_shut_down());
        assert!(renderer.backend().calls().is_empty());

        renderer.shutdown().unwrap();
        assert!(renderer.backend().calls().is_empty());
    }

    #[test]
    fn test_missing_view_leaves_command_list_closed() {
        let mut renderer = renderer(64, 64);
        renderer.render_targets.cleanup(&mut renderer.backend);
        renderer.backend_mut().clear_calls();

        assert!(renderer.begin_frame().is_err());
        assert!(!renderer.is_recording());
        assert!(!renderer.backend().calls().iter().any(|c| matches!(c, GpuCall::ResetAllocator { .. })));

        renderer.render_targets.create(&mut renderer.backend, BUFFER_COUNT).unwrap();
        run_frame(&mut renderer);
    }
}
