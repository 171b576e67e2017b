//! DirectX 12 交换链
//!
//! 翻转模型（FLIP_DISCARD），双缓冲，R8G8B8A8_UNORM。

use windows::Win32::Foundation::HWND;
use windows::Win32::Graphics::Direct3D12::ID3D12Resource;
use windows::Win32::Graphics::Dxgi::Common::*;
use windows::Win32::Graphics::Dxgi::*;
use windows::core::Interface;

use crate::core::error::{GraphicsError, Result};
use crate::renderer::BUFFER_COUNT;

use super::context::DeviceContext;
use super::hr_error;

/// 交换链缓冲区格式
pub const BACK_BUFFER_FORMAT: DXGI_FORMAT = DXGI_FORMAT_R8G8B8A8_UNORM;

/// 交换链
pub struct SwapChain {
    swap_chain: IDXGISwapChain3,
}

impl SwapChain {
    /// 在窗口上创建交换链
    ///
    /// # 参数
    ///
    /// * `context` - 设备上下文，交换链绑定到它的命令队列
    /// * `hwnd` - 目标窗口
    /// * `width`, `height` - 缓冲区尺寸
    pub fn new(context: &DeviceContext, hwnd: HWND, width: u32, height: u32) -> Result<Self> {
        let desc = DXGI_SWAP_CHAIN_DESC1 {
            Width: width,
            Height: height,
            Format: BACK_BUFFER_FORMAT,
            SampleDesc: DXGI_SAMPLE_DESC {
                Count: 1,
                ..Default::default()
            },
            BufferUsage: DXGI_USAGE_RENDER_TARGET_OUTPUT,
            BufferCount: BUFFER_COUNT as u32,
            SwapEffect: DXGI_SWAP_EFFECT_FLIP_DISCARD,
            ..Default::default()
        };

        let swap_chain: IDXGISwapChain1 = unsafe {
            context
                .factory()
                .CreateSwapChainForHwnd(context.queue(), hwnd, &desc, None, None)
        }
        .map_err(hr_error(GraphicsError::SwapchainError, "Failed to create swap chain"))?;

        let swap_chain: IDXGISwapChain3 = swap_chain
            .cast()
            .map_err(hr_error(GraphicsError::SwapchainError, "Failed to cast swap chain to IDXGISwapChain3"))?;

        crate::dx12_info!(width, height, buffers = BUFFER_COUNT, "Swap chain created");

        Ok(Self { swap_chain })
    }

    /// 当前后台缓冲区索引
    pub fn current_back_buffer_index(&self) -> usize {
        unsafe { self.swap_chain.GetCurrentBackBufferIndex() as usize }
    }

    /// 获取第 `index` 个缓冲区
    pub fn buffer(&self, index: usize) -> Result<ID3D12Resource> {
        unsafe { self.swap_chain.GetBuffer(index as u32) }
            .map_err(hr_error(GraphicsError::SwapchainError, "Failed to get swap chain buffer"))
    }

    /// 调整缓冲区尺寸
    ///
    /// 调用前必须释放所有缓冲区引用，并且 GPU 不能再使用它们。
    pub fn resize(&self, width: u32, height: u32) -> Result<()> {
        unsafe {
            self.swap_chain.ResizeBuffers(
                BUFFER_COUNT as u32,
                width,
                height,
                BACK_BUFFER_FORMAT,
                DXGI_SWAP_CHAIN_FLAG(0),
            )
        }
        .map_err(hr_error(GraphicsError::SwapchainError, "Failed to resize swap chain buffers"))?;

        crate::dx12_info!(width, height, "Swap chain resized");
        Ok(())
    }

    /// 呈现
    pub fn present(&self, sync_interval: u32) -> Result<()> {
        unsafe { self.swap_chain.Present(sync_interval, DXGI_PRESENT(0)) }
            .ok()
            .map_err(hr_error(GraphicsError::SwapchainError, "Present failed"))
    }
}
