//! DirectX 12 帧围栏
//!
//! 围栏值由 `FrameSynchronizer` 管理，这里只封装 Signal / 等待 / 重置，
//! 以及完成事件句柄的所有权。

use windows::Win32::Foundation::{CloseHandle, HANDLE, WAIT_OBJECT_0};
use windows::Win32::Graphics::Direct3D12::*;
use windows::Win32::System::Threading::{CreateEventA, WaitForSingleObject, INFINITE};

use crate::core::error::{GraphicsError, Result};
use crate::gfx::backend::GpuFence;

use super::{hr_error, set_debug_name};

/// 围栏完成事件
///
/// Drop 时关闭句柄。
struct FenceEvent(HANDLE);

impl FenceEvent {
    fn new() -> Result<Self> {
        let handle = unsafe { CreateEventA(None, false, false, None) }
            .map_err(hr_error(GraphicsError::Synchronization, "Failed to create fence event"))?;
        Ok(Self(handle))
    }
}

impl Drop for FenceEvent {
    fn drop(&mut self) {
        if !self.0.is_invalid() {
            let _ = unsafe { CloseHandle(self.0) };
        }
    }
}

/// 帧围栏
///
/// 持有命令队列的一个引用，Signal 总是追加在同一个队列上。
pub struct Dx12Fence {
    fence: ID3D12Fence,
    queue: ID3D12CommandQueue,
    event: FenceEvent,
}

impl Dx12Fence {
    /// 创建初始值为 0 的围栏
    pub fn new(device: &ID3D12Device, queue: &ID3D12CommandQueue) -> Result<Self> {
        let fence: ID3D12Fence = unsafe { device.CreateFence(0, D3D12_FENCE_FLAG_NONE) }
            .map_err(hr_error(GraphicsError::Synchronization, "Failed to create fence"))?;
        set_debug_name(&fence, "Frame Fence");

        Ok(Self {
            fence,
            queue: queue.clone(),
            event: FenceEvent::new()?,
        })
    }
}

impl GpuFence for Dx12Fence {
    fn signal(&mut self, value: u64) -> Result<()> {
        unsafe { self.queue.Signal(&self.fence, value) }
            .map_err(hr_error(GraphicsError::Synchronization, "Failed to signal fence"))
    }

    fn completed_value(&self) -> u64 {
        unsafe { self.fence.GetCompletedValue() }
    }

    fn wait_for(&mut self, value: u64) -> Result<()> {
        // 每次等待前重新登记事件
        unsafe { self.fence.SetEventOnCompletion(value, self.event.0) }
            .map_err(hr_error(GraphicsError::Synchronization, "Failed to set fence completion event"))?;

        let result = unsafe { WaitForSingleObject(self.event.0, INFINITE) };
        if result != WAIT_OBJECT_0 {
            return Err(GraphicsError::Synchronization(format!(
                "Waiting for fence value {} failed: {:?}",
                value, result
            )).into());
        }
        Ok(())
    }

    fn reset(&mut self) -> Result<()> {
        unsafe { self.fence.Signal(0) }
            .map_err(hr_error(GraphicsError::Synchronization, "Failed to reset fence"))
    }
}
