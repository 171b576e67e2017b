//! DirectX 12 后端（仅 Windows）
//!
//! - `context`：适配器选择、调试层、设备、命令队列
//! - `swap_chain`：翻转模型交换链
//! - `descriptor`：RTV 描述符堆
//! - `fence`：帧围栏与完成事件
//! - `backend`：`GraphicsBackend` 实现
//! - `shader`：着色器字节码加载
//! - `triangle`：三角形实体

pub mod backend;
pub mod context;
pub mod descriptor;
pub mod fence;
pub mod shader;
pub mod swap_chain;
pub mod triangle;

pub use backend::{Dx12Backend, Dx12CommandList};
pub use context::DeviceContext;
pub use fence::Dx12Fence;

use windows::core::PCWSTR;
use windows::Win32::Foundation::HWND;
use windows::Win32::Graphics::Direct3D12::ID3D12Object;
use windows::Win32::Graphics::Dxgi::{DXGI_ERROR_DEVICE_REMOVED, DXGI_ERROR_DEVICE_RESET};

use crate::core::config::GraphicsConfig;
use crate::core::error::{GraphicsError, RenderError, Result};
use crate::renderer::{Renderer, RendererSettings};

/// 把 `windows` 错误转换为 `GraphicsError`
///
/// 设备移除和设备重置一律归为 `DeviceRemoved`，其余使用 `kind`。
pub(crate) fn hr_error<F>(kind: F, what: &'static str) -> impl FnOnce(windows::core::Error) -> RenderError
where
    F: FnOnce(String) -> GraphicsError,
{
    move |e| {
        let code = e.code();
        let message = format!("{}: {:?}", what, e);
        crate::dx12_error!(hresult = %format!("{:#010x}", code.0), "{}", message);

        if code == DXGI_ERROR_DEVICE_REMOVED || code == DXGI_ERROR_DEVICE_RESET {
            GraphicsError::DeviceRemoved(message).into()
        } else {
            kind(message).into()
        }
    }
}

/// 设置调试名称（仅 Debug 构建）
pub(crate) fn set_debug_name(object: &ID3D12Object, name: &str) {
    if cfg!(debug_assertions) {
        let wide: Vec<u16> = name.encode_utf16().chain(Some(0)).collect();
        let _ = unsafe { object.SetName(PCWSTR(wide.as_ptr())) };
    }
}

impl Renderer<Dx12Backend> {
    /// 在窗口上初始化 DirectX 12 渲染器
    ///
    /// 依次创建设备上下文、交换链、命令对象、RTV 和帧围栏。
    /// 任何一步失败都是致命错误。
    pub fn initialize(hwnd: HWND, width: u32, height: u32, config: &GraphicsConfig) -> Result<Self> {
        let backend = Dx12Backend::new(hwnd, width, height, config.debug_layer)?;
        Renderer::new(backend, width, height, RendererSettings::from(config))
    }
}
