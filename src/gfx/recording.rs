//! 内存中的验证后端
//!
//! 不访问任何 GPU，只记录每一次调用，并模拟 D3D12 调试层会报告的错误：
//!
//! - 屏障的 before 状态与缓冲区的实际状态不一致
//! - Present 时后台缓冲区不在 PRESENT 状态
//! - GPU 仍在使用某个命令分配器时重置它
//! - 仍持有缓冲区引用或 GPU 仍有未完成工作时 `ResizeBuffers`
//! - 等待一个永远不会被 Signal 的围栏值（死锁）
//!
//! # GPU 时间线模型
//!
//! 提交的工作和 Signal 按顺序进入队列。GPU 只在 CPU 等待围栏时
//! 向前推进（或测试显式调用 `complete_all`），所以测试结果是确定的。

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use crate::core::error::{GraphicsError, Result};
use crate::gfx::backend::{GpuFence, GraphicsBackend};
use crate::renderer::command::ResourceState;
use crate::renderer::descriptor::{CpuDescriptorHandle, DescriptorHeapInfo};
use crate::renderer::BUFFER_COUNT;

/// 记录下来的一次调用
#[derive(Debug, Clone, PartialEq)]
pub enum GpuCall {
    CreateRtvHeap { count: usize },
    ReleaseRtvHeap,
    CreateRenderTargetView { buffer: usize, handle: CpuDescriptorHandle },
    ResetAllocator { slot: usize },
    OpenList { slot: usize },
    SetViewport { width: u32, height: u32 },
    Barrier { buffer: usize, before: ResourceState, after: ResourceState },
    BindRenderTarget { handle: CpuDescriptorHandle },
    Clear { handle: CpuDescriptorHandle, color: [f32; 4] },
    /// 实体录制的绘制命令
    Draw { name: String, vertex_count: u32 },
    Execute { slot: usize },
    Present { buffer: usize, sync_interval: u32 },
    ResizeBuffers { width: u32, height: u32 },
    Signal { value: u64 },
    ArmEvent { value: u64 },
    Wait { value: u64 },
    FenceReset,
}

#[derive(Debug)]
enum Submission {
    Work { slot: usize },
    Signal(u64),
}

#[derive(Debug, Default)]
struct Timeline {
    queue: VecDeque<Submission>,
    completed: u64,
    calls: Vec<GpuCall>,
}

impl Timeline {
    /// GPU 执行完队列中的下一项
    fn step(&mut self) -> bool {
        match self.queue.pop_front() {
            Some(Submission::Work { .. }) => true,
            Some(Submission::Signal(value)) => {
                self.completed = value;
                true
            }
            None => false,
        }
    }

    fn in_flight(&self) -> usize {
        self.queue.iter().filter(|s| matches!(s, Submission::Work { .. })).count()
    }

    fn slot_busy(&self, slot: usize) -> bool {
        self.queue.iter().any(|s| matches!(s, Submission::Work { slot: busy } if *busy == slot))
    }
}

/// 交换链缓冲区
#[derive(Debug, PartialEq, Eq)]
pub struct RecordedBuffer {
    pub index: usize,
    /// 每次 `ResizeBuffers` 加一
    pub generation: u64,
}

/// 录制中的命令列表
#[derive(Debug)]
pub struct RecordedCommandList {
    slot: usize,
    barriers: Vec<(usize, ResourceState, ResourceState)>,
    calls: Rc<RefCell<Timeline>>,
    detached: bool,
}

impl RecordedCommandList {
    /// 命令列表所属的分配器槽位
    pub fn slot(&self) -> usize {
        self.slot
    }

    /// 录制一次绘制
    pub fn draw(&mut self, name: &str, vertex_count: u32) {
        self.calls.borrow_mut().calls.push(GpuCall::Draw {
            name: name.to_string(),
            vertex_count,
        });
    }
}

/// 验证后端的设备
///
/// 只统计实体创建了多少资源。
#[derive(Debug, Default)]
pub struct RecordingDevice {
    resources: RefCell<Vec<String>>,
}

impl RecordingDevice {
    pub fn create_resource(&self, name: &str) {
        self.resources.borrow_mut().push(name.to_string());
    }

    pub fn resources(&self) -> Vec<String> {
        self.resources.borrow().clone()
    }
}

/// 验证后端的围栏
#[derive(Debug)]
pub struct RecordingFence {
    timeline: Rc<RefCell<Timeline>>,
}

impl GpuFence for RecordingFence {
    fn signal(&mut self, value: u64) -> Result<()> {
        let mut timeline = self.timeline.borrow_mut();
        timeline.queue.push_back(Submission::Signal(value));
        timeline.calls.push(GpuCall::Signal { value });
        Ok(())
    }

    fn completed_value(&self) -> u64 {
        self.timeline.borrow().completed
    }

    fn wait_for(&mut self, value: u64) -> Result<()> {
        let mut timeline = self.timeline.borrow_mut();
        timeline.calls.push(GpuCall::ArmEvent { value });
        timeline.calls.push(GpuCall::Wait { value });

        while timeline.completed < value {
            if !timeline.step() {
                return Err(GraphicsError::Synchronization(format!(
                    "waiting for fence value {} that is never signaled (completed {})",
                    value, timeline.completed
                )).into());
            }
        }
        Ok(())
    }

    fn reset(&mut self) -> Result<()> {
        let mut timeline = self.timeline.borrow_mut();
        if !timeline.queue.is_empty() {
            return Err(GraphicsError::Synchronization(
                "fence reset while GPU work is pending".to_string(),
            ).into());
        }
        timeline.completed = 0;
        timeline.calls.push(GpuCall::FenceReset);
        Ok(())
    }
}

/// 内存中的验证后端
#[derive(Debug)]
pub struct RecordingBackend {
    device: RecordingDevice,
    timeline: Rc<RefCell<Timeline>>,
    buffers: Vec<Rc<RecordedBuffer>>,
    states: Vec<ResourceState>,
    current_index: usize,
    width: u32,
    height: u32,
    heap_alive: bool,
    heaps_created: usize,
    list_open: bool,
}

impl RecordingBackend {
    /// 描述符大小
    pub const RTV_INCREMENT: usize = 32;
    const HEAP_START: usize = 0x1000;

    pub fn new(width: u32, height: u32) -> Self {
        Self {
            device: RecordingDevice::default(),
            timeline: Rc::new(RefCell::new(Timeline::default())),
            buffers: Self::make_buffers(0),
            states: vec![ResourceState::Present; BUFFER_COUNT],
            current_index: 0,
            width,
            height,
            heap_alive: false,
            heaps_created: 0,
            list_open: false,
        }
    }

    fn make_buffers(generation: u64) -> Vec<Rc<RecordedBuffer>> {
        (0..BUFFER_COUNT)
            .map(|index| Rc::new(RecordedBuffer { index, generation }))
            .collect()
    }

    fn record(&self, call: GpuCall) {
        self.timeline.borrow_mut().calls.push(call);
    }

    /// 到目前为止的调用记录
    pub fn calls(&self) -> Vec<GpuCall> {
        self.timeline.borrow().calls.clone()
    }

    pub fn clear_calls(&mut self) {
        self.timeline.borrow_mut().calls.clear();
    }

    /// GPU 上尚未完成的命令列表数量
    pub fn in_flight(&self) -> usize {
        self.timeline.borrow().in_flight()
    }

    pub fn completed_value(&self) -> u64 {
        self.timeline.borrow().completed
    }

    /// 让 GPU 执行完队列中的所有工作
    pub fn complete_all(&mut self) {
        let mut timeline = self.timeline.borrow_mut();
        while timeline.step() {}
    }

    pub fn buffer_state(&self, index: usize) -> ResourceState {
        self.states[index]
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn rtv_heaps_created(&self) -> usize {
        self.heaps_created
    }

    /// 一个不属于任何已打开帧的命令列表，提交时会被拒绝
    pub fn detached_command_list(&self, slot: usize) -> RecordedCommandList {
        RecordedCommandList {
            slot,
            barriers: Vec::new(),
            calls: Rc::clone(&self.timeline),
            detached: true,
        }
    }
}

impl GraphicsBackend for RecordingBackend {
    type Device = RecordingDevice;
    type CommandList = RecordedCommandList;
    type RenderTarget = Rc<RecordedBuffer>;
    type Fence = RecordingFence;

    fn backend_name(&self) -> &str {
        "Recording"
    }

    fn device(&self) -> &Self::Device {
        &self.device
    }

    fn create_fence(&mut self) -> Result<Self::Fence> {
        Ok(RecordingFence { timeline: Rc::clone(&self.timeline) })
    }

    fn current_back_buffer_index(&self) -> usize {
        self.current_index
    }

    fn resize_buffers(&mut self, width: u32, height: u32) -> Result<()> {
        if self.timeline.borrow().in_flight() > 0 {
            return Err(GraphicsError::DeviceRemoved(
                "ResizeBuffers while the GPU still uses the back buffers".to_string(),
            ).into());
        }

        if self.buffers.iter().any(|b| Rc::strong_count(b) > 1) {
            return Err(GraphicsError::SwapchainError(
                "ResizeBuffers with outstanding back buffer references".to_string(),
            ).into());
        }

        let generation = self.buffers[0].generation + 1;
        self.buffers = Self::make_buffers(generation);
        self.states = vec![ResourceState::Present; BUFFER_COUNT];
        self.current_index = 0;
        self.width = width;
        self.height = height;

        self.record(GpuCall::ResizeBuffers { width, height });
        Ok(())
    }

    fn present(&mut self, sync_interval: u32) -> Result<()> {
        let buffer = self.current_index;
        if self.states[buffer] != ResourceState::Present {
            return Err(GraphicsError::SwapchainError(format!(
                "back buffer {} presented in state {:?}",
                buffer, self.states[buffer]
            )).into());
        }

        self.record(GpuCall::Present { buffer, sync_interval });
        self.current_index = (self.current_index + 1) % BUFFER_COUNT;
        Ok(())
    }

    fn create_rtv_heap(&mut self, count: usize) -> Result<DescriptorHeapInfo> {
        if self.heap_alive {
            return Err(GraphicsError::ResourceCreation("RTV heap already exists".to_string()).into());
        }

        self.heap_alive = true;
        self.heaps_created += 1;
        self.record(GpuCall::CreateRtvHeap { count });

        Ok(DescriptorHeapInfo {
            cpu_start: CpuDescriptorHandle::new(Self::HEAP_START),
            increment: Self::RTV_INCREMENT,
            capacity: count,
        })
    }

    fn release_rtv_heap(&mut self) {
        self.heap_alive = false;
        self.record(GpuCall::ReleaseRtvHeap);
    }

    fn back_buffer(&self, index: usize) -> Result<Self::RenderTarget> {
        self.buffers.get(index).cloned().ok_or_else(|| {
            GraphicsError::SwapchainError(format!("no back buffer {}", index)).into()
        })
    }

    fn create_render_target_view(&self, target: &Self::RenderTarget, handle: CpuDescriptorHandle) {
        self.record(GpuCall::CreateRenderTargetView { buffer: target.index, handle });
    }

    fn reset_command_allocator(&mut self, slot: usize) -> Result<()> {
        if self.timeline.borrow().slot_busy(slot) {
            return Err(GraphicsError::CommandExecution(format!(
                "command allocator {} reset while the GPU is executing it",
                slot
            )).into());
        }

        self.record(GpuCall::ResetAllocator { slot });
        Ok(())
    }

    fn open_command_list(&mut self, slot: usize) -> Result<Self::CommandList> {
        if self.list_open {
            return Err(GraphicsError::CommandExecution("command list is already open".to_string()).into());
        }

        self.list_open = true;
        self.record(GpuCall::OpenList { slot });

        Ok(RecordedCommandList {
            slot,
            barriers: Vec::new(),
            calls: Rc::clone(&self.timeline),
            detached: false,
        })
    }

    fn set_viewport(&self, _list: &mut Self::CommandList, width: u32, height: u32) {
        self.record(GpuCall::SetViewport { width, height });
    }

    fn transition_barrier(
        &self,
        list: &mut Self::CommandList,
        target: &Self::RenderTarget,
        before: ResourceState,
        after: ResourceState,
    ) {
        list.barriers.push((target.index, before, after));
        self.record(GpuCall::Barrier { buffer: target.index, before, after });
    }

    fn bind_render_target(&self, _list: &mut Self::CommandList, handle: CpuDescriptorHandle) {
        self.record(GpuCall::BindRenderTarget { handle });
    }

    fn clear_render_target(&self, _list: &mut Self::CommandList, handle: CpuDescriptorHandle, color: [f32; 4]) {
        self.record(GpuCall::Clear { handle, color });
    }

    fn execute(&mut self, list: Self::CommandList) -> Result<()> {
        if list.detached || !self.list_open {
            return Err(GraphicsError::CommandExecution("executing a command list that is not open".to_string()).into());
        }

        for (buffer, before, after) in &list.barriers {
            if self.states[*buffer] != *before {
                return Err(GraphicsError::CommandExecution(format!(
                    "barrier on buffer {} expects {:?} but resource is {:?}",
                    buffer, before, self.states[*buffer]
                )).into());
            }
            self.states[*buffer] = *after;
        }

        self.list_open = false;

        let mut timeline = self.timeline.borrow_mut();
        timeline.queue.push_back(Submission::Work { slot: list.slot });
        timeline.calls.push(GpuCall::Execute { slot: list.slot });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wait_on_unsignaled_value_is_a_deadlock() {
        let mut backend = RecordingBackend::new(64, 64);
        let mut fence = backend.create_fence().unwrap();
        assert!(fence.wait_for(1).is_err());

        fence.signal(1).unwrap();
        fence.wait_for(1).unwrap();
        assert_eq!(fence.completed_value(), 1);
    }

    #[test]
    fn test_present_advances_index() {
        let mut backend = RecordingBackend::new(64, 64);
        assert_eq!(backend.current_back_buffer_index(), 0);
        backend.present(1).unwrap();
        assert_eq!(backend.current_back_buffer_index(), 1);
        backend.present(1).unwrap();
        assert_eq!(backend.current_back_buffer_index(), 0);
    }

    #[test]
    fn test_wrong_barrier_rejected() {
        let mut backend = RecordingBackend::new(64, 64);
        let buffer = backend.back_buffer(0).unwrap();
        let mut list = backend.open_command_list(0).unwrap();
        backend.transition_barrier(&mut list, &buffer, ResourceState::RenderTarget, ResourceState::Present);
        assert!(backend.execute(list).is_err());
    }

    #[test]
    fn test_present_requires_present_state() {
        let mut backend = RecordingBackend::new(64, 64);
        let buffer = backend.back_buffer(0).unwrap();
        let mut list = backend.open_command_list(0).unwrap();
        backend.transition_barrier(&mut list, &buffer, ResourceState::Present, ResourceState::RenderTarget);
        backend.execute(list).unwrap();

        assert_eq!(backend.buffer_state(0), ResourceState::RenderTarget);
        assert!(backend.present(1).is_err());
    }

    #[test]
    fn test_resize_rejects_held_buffers() {
        let mut backend = RecordingBackend::new(64, 64);
        let held = backend.back_buffer(1).unwrap();
        assert!(backend.resize_buffers(128, 128).is_err());

        drop(held);
        backend.resize_buffers(128, 128).unwrap();
        assert_eq!(backend.size(), (128, 128));
        assert_eq!(backend.back_buffer(0).unwrap().generation, 1);
    }

    #[test]
    fn test_resize_with_work_in_flight_removes_device() {
        let mut backend = RecordingBackend::new(64, 64);
        let list = backend.open_command_list(0).unwrap();
        backend.execute(list).unwrap();

        let err = backend.resize_buffers(32, 32).unwrap_err();
        assert!(matches!(err, crate::core::RenderError::Graphics(GraphicsError::DeviceRemoved(_))));

        backend.complete_all();
        backend.resize_buffers(32, 32).unwrap();
    }

    #[test]
    fn test_busy_allocator_reset_rejected() {
        let mut backend = RecordingBackend::new(64, 64);
        let list = backend.open_command_list(1).unwrap();
        backend.execute(list).unwrap();

        assert!(backend.reset_command_allocator(1).is_err());
        assert!(backend.reset_command_allocator(0).is_ok());
    }

    #[test]
    fn test_fence_reset_requires_idle_queue() {
        let mut backend = RecordingBackend::new(64, 64);
        let mut fence = backend.create_fence().unwrap();
        fence.signal(5).unwrap();
        assert!(fence.reset().is_err());

        backend.complete_all();
        assert_eq!(fence.completed_value(), 5);
        fence.reset().unwrap();
        assert_eq!(fence.completed_value(), 0);
    }
}
