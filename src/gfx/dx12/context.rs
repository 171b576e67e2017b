//! DirectX 12 设备上下文
//!
//! # 初始化流程
//!
//! 1. 启用调试层（必须在创建设备之前）
//! 2. 创建 DXGI 工厂
//! 3. 枚举适配器，跳过软件适配器，选择第一个能以 12_0 创建设备的适配器
//! 4. 创建 D3D12 设备
//! 5. 创建 DIRECT 命令队列

use windows::Win32::Graphics::Direct3D::D3D_FEATURE_LEVEL_12_0;
use windows::Win32::Graphics::Direct3D12::*;
use windows::Win32::Graphics::Dxgi::*;

use crate::core::error::{GraphicsError, Result};
use crate::gfx::adapter::{adapter_description, GpuPerformanceClass};

use super::{hr_error, set_debug_name};

/// 设备上下文
///
/// 持有工厂、设备和命令队列，以及所选适配器的描述，创建后不再改变。
/// 销毁顺序由字段顺序决定：队列先于设备释放。
pub struct DeviceContext {
    queue: ID3D12CommandQueue,
    device: ID3D12Device,
    factory: IDXGIFactory4,
    adapter_name: String,
    performance_class: GpuPerformanceClass,
    debug_layer: bool,
}

impl DeviceContext {
    /// 创建设备上下文
    ///
    /// # 参数
    ///
    /// * `debug_layer` - 是否启用 D3D12 调试层
    ///
    /// # 错误
    ///
    /// 没有可用的硬件适配器、设备或命令队列创建失败都是致命错误。
    pub fn new(debug_layer: bool) -> Result<Self> {
        let debug_layer = debug_layer && Self::enable_debug_layer();

        let factory_flags = if debug_layer {
            DXGI_CREATE_FACTORY_DEBUG
        } else {
            DXGI_CREATE_FACTORY_FLAGS(0)
        };
        let factory: IDXGIFactory4 = unsafe { CreateDXGIFactory2(factory_flags) }
            .map_err(hr_error(GraphicsError::DeviceCreation, "Failed to create DXGI factory"))?;

        let (adapter, desc) = Self::select_adapter(&factory)?;
        let adapter_name = adapter_description(&desc.Description);
        let performance_class = GpuPerformanceClass::from_vendor_id(desc.VendorId);

        crate::dx12_info!(
            adapter = %adapter_name,
            vendor_id = %format!("{:#06x}", desc.VendorId),
            class = %performance_class,
            video_memory_mb = desc.DedicatedVideoMemory / (1024 * 1024),
            "Adapter selected"
        );

        let mut device: Option<ID3D12Device> = None;
        unsafe { D3D12CreateDevice(&adapter, D3D_FEATURE_LEVEL_12_0, &mut device) }
            .map_err(hr_error(GraphicsError::DeviceCreation, "Failed to create D3D12 device"))?;
        let device = device.ok_or_else(|| {
            GraphicsError::DeviceCreation("D3D12CreateDevice returned no device".to_string())
        })?;
        set_debug_name(&device, "Device");

        let queue_desc = D3D12_COMMAND_QUEUE_DESC {
            Type: D3D12_COMMAND_LIST_TYPE_DIRECT,
            Flags: D3D12_COMMAND_QUEUE_FLAG_NONE,
            ..Default::default()
        };
        let queue: ID3D12CommandQueue = unsafe { device.CreateCommandQueue(&queue_desc) }
            .map_err(hr_error(GraphicsError::DeviceCreation, "Failed to create command queue"))?;
        set_debug_name(&queue, "Command Queue");

        crate::dx12_info!(debug_layer, "D3D12 device created");

        Ok(Self {
            queue,
            device,
            factory,
            adapter_name,
            performance_class,
            debug_layer,
        })
    }

    fn enable_debug_layer() -> bool {
        let mut debug: Option<ID3D12Debug> = None;
        match unsafe { D3D12GetDebugInterface(&mut debug) } {
            Ok(()) => match debug {
                Some(debug) => {
                    unsafe { debug.EnableDebugLayer() };
                    crate::dx12_info!("D3D12 debug layer enabled");
                    true
                }
                None => false,
            },
            Err(e) => {
                crate::dx12_warn!(error = ?e, "Failed to enable D3D12 debug layer");
                false
            }
        }
    }

    /// 选择第一个支持 12_0 的硬件适配器
    fn select_adapter(factory: &IDXGIFactory4) -> Result<(IDXGIAdapter1, DXGI_ADAPTER_DESC1)> {
        for i in 0.. {
            let adapter = match unsafe { factory.EnumAdapters1(i) } {
                Ok(adapter) => adapter,
                Err(_) => break,
            };
            let desc = unsafe { adapter.GetDesc1() }
                .map_err(hr_error(GraphicsError::AdapterNotFound, "Failed to query adapter"))?;

            if (desc.Flags & DXGI_ADAPTER_FLAG_SOFTWARE.0 as u32) != 0 {
                crate::dx12_info!(adapter = %adapter_description(&desc.Description), "Skipping software adapter");
                continue;
            }

            // 只检查能否创建设备，不实际创建
            let supported = unsafe {
                D3D12CreateDevice(
                    &adapter,
                    D3D_FEATURE_LEVEL_12_0,
                    std::ptr::null_mut::<Option<ID3D12Device>>(),
                )
            }
            .is_ok();

            if supported {
                return Ok((adapter, desc));
            }
        }

        Err(GraphicsError::AdapterNotFound(
            "No hardware adapter supports feature level 12_0".to_string(),
        ).into())
    }

    pub fn device(&self) -> &ID3D12Device {
        &self.device
    }

    pub fn queue(&self) -> &ID3D12CommandQueue {
        &self.queue
    }

    pub fn factory(&self) -> &IDXGIFactory4 {
        &self.factory
    }

    pub fn adapter_name(&self) -> &str {
        &self.adapter_name
    }

    pub fn performance_class(&self) -> GpuPerformanceClass {
        self.performance_class
    }

    pub fn debug_layer_enabled(&self) -> bool {
        self.debug_layer
    }
}
