//! DirectX 12 图形后端
//!
//! 实现 `GraphicsBackend`：每个交换链缓冲区一个命令分配器，共用一个命令列表。
//! 命令列表创建后立即关闭，每帧以当前槽位的分配器重新打开。

use std::mem::ManuallyDrop;

use windows::Win32::Foundation::{HWND, RECT};
use windows::Win32::Graphics::Direct3D12::*;

use crate::core::error::{GraphicsError, Result};
use crate::gfx::backend::GraphicsBackend;
use crate::renderer::command::ResourceState;
use crate::renderer::descriptor::{CpuDescriptorHandle, DescriptorHeapInfo};
use crate::renderer::BUFFER_COUNT;

use super::context::DeviceContext;
use super::descriptor::{to_dx12_cpu_handle, Dx12DescriptorHeap};
use super::fence::Dx12Fence;
use super::swap_chain::SwapChain;
use super::{hr_error, set_debug_name};

/// 一帧内使用的命令列表
///
/// 由 `open_command_list` 打开，`execute` 关闭并提交。
pub struct Dx12CommandList {
    list: ID3D12GraphicsCommandList,
    slot: usize,
}

impl Dx12CommandList {
    /// 底层命令列表，实体在 `on_render` 中用它录制绘制命令
    pub fn raw(&self) -> &ID3D12GraphicsCommandList {
        &self.list
    }

    /// 使用的命令分配器槽位
    pub fn slot(&self) -> usize {
        self.slot
    }
}

/// DirectX 12 后端
pub struct Dx12Backend {
    command_list: ID3D12GraphicsCommandList,
    allocators: Vec<ID3D12CommandAllocator>,
    rtv_heap: Option<Dx12DescriptorHeap>,
    swap_chain: SwapChain,
    context: DeviceContext,
    list_open: bool,
}

impl Dx12Backend {
    /// 创建设备、命令队列、交换链和命令对象
    ///
    /// # 参数
    ///
    /// * `hwnd` - 交换链绑定的窗口
    /// * `width`, `height` - 初始缓冲区尺寸
    /// * `debug_layer` - 是否启用 D3D12 调试层
    pub fn new(hwnd: HWND, width: u32, height: u32, debug_layer: bool) -> Result<Self> {
        let context = DeviceContext::new(debug_layer)?;
        let swap_chain = SwapChain::new(&context, hwnd, width, height)?;
        let device = context.device();

        let mut allocators = Vec::with_capacity(BUFFER_COUNT);
        for i in 0..BUFFER_COUNT {
            let allocator: ID3D12CommandAllocator =
                unsafe { device.CreateCommandAllocator(D3D12_COMMAND_LIST_TYPE_DIRECT) }
                    .map_err(hr_error(GraphicsError::ResourceCreation, "Failed to create command allocator"))?;
            set_debug_name(&allocator, &format!("Command Allocator {}", i));
            allocators.push(allocator);
        }

        let command_list: ID3D12GraphicsCommandList = unsafe {
            device.CreateCommandList(0, D3D12_COMMAND_LIST_TYPE_DIRECT, &allocators[0], None)
        }
        .map_err(hr_error(GraphicsError::ResourceCreation, "Failed to create command list"))?;
        set_debug_name(&command_list, "Command List");

        // 新建的命令列表处于打开状态
        unsafe { command_list.Close() }
            .map_err(hr_error(GraphicsError::CommandExecution, "Failed to close command list"))?;

        crate::dx12_info!(allocators = BUFFER_COUNT, "Command objects created");

        Ok(Self {
            command_list,
            allocators,
            rtv_heap: None,
            swap_chain,
            context,
            list_open: false,
        })
    }

    /// 设备上下文（适配器信息等）
    pub fn context(&self) -> &DeviceContext {
        &self.context
    }

    fn allocator(&self, slot: usize) -> Result<&ID3D12CommandAllocator> {
        self.allocators.get(slot).ok_or_else(|| {
            GraphicsError::CommandExecution(format!("No command allocator for slot {}", slot)).into()
        })
    }
}

fn to_dx12_state(state: ResourceState) -> D3D12_RESOURCE_STATES {
    match state {
        ResourceState::Present => D3D12_RESOURCE_STATE_PRESENT,
        ResourceState::RenderTarget => D3D12_RESOURCE_STATE_RENDER_TARGET,
    }
}

impl GraphicsBackend for Dx12Backend {
    type Device = ID3D12Device;
    type CommandList = Dx12CommandList;
    type RenderTarget = ID3D12Resource;
    type Fence = Dx12Fence;

    fn backend_name(&self) -> &str {
        "DirectX 12"
    }

    fn device(&self) -> &ID3D12Device {
        self.context.device()
    }

    fn create_fence(&mut self) -> Result<Dx12Fence> {
        Dx12Fence::new(self.context.device(), self.context.queue())
    }

    fn current_back_buffer_index(&self) -> usize {
        self.swap_chain.current_back_buffer_index()
    }

    fn resize_buffers(&mut self, width: u32, height: u32) -> Result<()> {
        self.swap_chain.resize(width, height)
    }

    fn present(&mut self, sync_interval: u32) -> Result<()> {
        self.swap_chain.present(sync_interval)
    }

    fn create_rtv_heap(&mut self, count: usize) -> Result<DescriptorHeapInfo> {
        let heap = Dx12DescriptorHeap::new_rtv(self.context.device(), count)?;
        let info = heap.info();
        self.rtv_heap = Some(heap);
        Ok(info)
    }

    fn release_rtv_heap(&mut self) {
        self.rtv_heap = None;
    }

    fn back_buffer(&self, index: usize) -> Result<ID3D12Resource> {
        let buffer = self.swap_chain.buffer(index)?;
        set_debug_name(&buffer, &format!("Back Buffer {}", index));
        Ok(buffer)
    }

    fn create_render_target_view(&self, target: &ID3D12Resource, handle: CpuDescriptorHandle) {
        unsafe {
            self.context
                .device()
                .CreateRenderTargetView(target, None, to_dx12_cpu_handle(handle));
        }
    }

    fn reset_command_allocator(&mut self, slot: usize) -> Result<()> {
        unsafe { self.allocator(slot)?.Reset() }
            .map_err(hr_error(GraphicsError::CommandExecution, "Failed to reset command allocator"))
    }

    fn open_command_list(&mut self, slot: usize) -> Result<Dx12CommandList> {
        if self.list_open {
            return Err(GraphicsError::CommandExecution(
                "Command list is already open".to_string(),
            ).into());
        }

        let allocator = self.allocator(slot)?;
        unsafe { self.command_list.Reset(allocator, None) }
            .map_err(hr_error(GraphicsError::CommandExecution, "Failed to reset command list"))?;
        self.list_open = true;

        Ok(Dx12CommandList {
            list: self.command_list.clone(),
            slot,
        })
    }

    fn set_viewport(&self, list: &mut Dx12CommandList, width: u32, height: u32) {
        let viewport = D3D12_VIEWPORT {
            TopLeftX: 0.0,
            TopLeftY: 0.0,
            Width: width as f32,
            Height: height as f32,
            MinDepth: 0.0,
            MaxDepth: 1.0,
        };
        let scissor = RECT {
            left: 0,
            top: 0,
            right: width as i32,
            bottom: height as i32,
        };

        unsafe {
            list.list.RSSetViewports(&[viewport]);
            list.list.RSSetScissorRects(&[scissor]);
        }
    }

    fn transition_barrier(
        &self,
        list: &mut Dx12CommandList,
        target: &ID3D12Resource,
        before: ResourceState,
        after: ResourceState,
    ) {
        // 借用资源指针，不增加引用计数
        let barrier = D3D12_RESOURCE_BARRIER {
            Type: D3D12_RESOURCE_BARRIER_TYPE_TRANSITION,
            Flags: D3D12_RESOURCE_BARRIER_FLAG_NONE,
            Anonymous: D3D12_RESOURCE_BARRIER_0 {
                Transition: ManuallyDrop::new(D3D12_RESOURCE_TRANSITION_BARRIER {
                    pResource: unsafe { std::mem::transmute_copy(target) },
                    Subresource: D3D12_RESOURCE_BARRIER_ALL_SUBRESOURCES,
                    StateBefore: to_dx12_state(before),
                    StateAfter: to_dx12_state(after),
                }),
            },
        };

        unsafe { list.list.ResourceBarrier(&[barrier]) };
    }

    fn bind_render_target(&self, list: &mut Dx12CommandList, handle: CpuDescriptorHandle) {
        let handle = to_dx12_cpu_handle(handle);
        unsafe { list.list.OMSetRenderTargets(1, Some(&handle), false, None) };
    }

    fn clear_render_target(&self, list: &mut Dx12CommandList, handle: CpuDescriptorHandle, color: [f32; 4]) {
        unsafe { list.list.ClearRenderTargetView(to_dx12_cpu_handle(handle), &color, None) };
    }

    fn execute(&mut self, list: Dx12CommandList) -> Result<()> {
        self.list_open = false;

        unsafe { list.list.Close() }
            .map_err(hr_error(GraphicsError::CommandExecution, "Failed to close command list"))?;

        let lists = [Some(list.list.clone().into())];
        unsafe { self.context.queue().ExecuteCommandLists(&lists) };
        Ok(())
    }
}
