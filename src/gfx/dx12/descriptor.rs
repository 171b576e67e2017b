//! DirectX 12 描述符堆
//!
//! 只用于交换链缓冲区的 RTV：CPU 可见，不对着色器可见。

use windows::Win32::Graphics::Direct3D12::*;

use crate::core::error::{GraphicsError, Result};
use crate::renderer::descriptor::{CpuDescriptorHandle, DescriptorHeapInfo};

use super::{hr_error, set_debug_name};

/// RTV 描述符堆
pub struct Dx12DescriptorHeap {
    heap: ID3D12DescriptorHeap,
    increment: usize,
    capacity: usize,
}

impl Dx12DescriptorHeap {
    /// 创建恰好容纳 `count` 个 RTV 的描述符堆
    pub fn new_rtv(device: &ID3D12Device, count: usize) -> Result<Self> {
        if count == 0 {
            return Err(GraphicsError::ResourceCreation(
                "RTV heap must hold at least one descriptor".to_string(),
            ).into());
        }

        let desc = D3D12_DESCRIPTOR_HEAP_DESC {
            Type: D3D12_DESCRIPTOR_HEAP_TYPE_RTV,
            NumDescriptors: count as u32,
            Flags: D3D12_DESCRIPTOR_HEAP_FLAG_NONE,
            NodeMask: 0,
        };

        let heap: ID3D12DescriptorHeap = unsafe { device.CreateDescriptorHeap(&desc) }
            .map_err(hr_error(GraphicsError::ResourceCreation, "Failed to create RTV descriptor heap"))?;
        set_debug_name(&heap, "RTV Descriptor Heap");

        let increment =
            unsafe { device.GetDescriptorHandleIncrementSize(D3D12_DESCRIPTOR_HEAP_TYPE_RTV) } as usize;

        Ok(Self { heap, increment, capacity: count })
    }

    /// 堆的起始句柄、步长和容量
    pub fn info(&self) -> DescriptorHeapInfo {
        let start = unsafe { self.heap.GetCPUDescriptorHandleForHeapStart() };
        DescriptorHeapInfo {
            cpu_start: CpuDescriptorHandle::new(start.ptr),
            increment: self.increment,
            capacity: self.capacity,
        }
    }
}

/// 转换为 D3D12 CPU 描述符句柄
pub fn to_dx12_cpu_handle(handle: CpuDescriptorHandle) -> D3D12_CPU_DESCRIPTOR_HANDLE {
    D3D12_CPU_DESCRIPTOR_HANDLE { ptr: handle.ptr }
}
