//! 图形后端的统一抽象接口
//!
//! 帧生命周期（`Renderer`）只通过本模块的 trait 与 GPU 交互。
//! 生产环境下唯一的实现是 DirectX 12 后端；`recording` 后端在内存中
//! 模拟同样的调用序列，使帧同步协议可以在任何平台上测试。
//!
//! 这不是跨平台渲染抽象：接口直接照搬 D3D12 的概念
//! （命令分配器槽位、RTV 描述符堆、资源屏障、围栏）。

use crate::core::error::Result;
use crate::renderer::command::ResourceState;
use crate::renderer::descriptor::{CpuDescriptorHandle, DescriptorHeapInfo};

/// CPU 与 GPU 之间的围栏
///
/// 围栏值由调用方管理（见 `FrameSynchronizer`），这里只负责三个原语。
pub trait GpuFence {
    /// 在命令队列上追加一次 Signal，GPU 执行到此处时完成值变为 `value`
    fn signal(&mut self, value: u64) -> Result<()>;

    /// GPU 已完成的最大围栏值
    fn completed_value(&self) -> u64;

    /// 阻塞直到完成值不小于 `value`
    ///
    /// 实现必须在每次等待前重新登记完成事件（`SetEventOnCompletion`），
    /// 然后无限期等待。
    fn wait_for(&mut self, value: u64) -> Result<()>;

    /// 把完成值从 CPU 侧设回 0
    ///
    /// 只能在 GPU 空闲时调用（调整尺寸时围栏值重置为初始值）。
    fn reset(&mut self) -> Result<()>;
}

/// 图形后端的统一接口
///
/// # 关联类型
///
/// * `Device` - 交给实体创建 GPU 资源的设备
/// * `CommandList` - 一帧内录制命令的列表，实体在 `on_render` 中使用
/// * `RenderTarget` - 交换链后台缓冲区的引用；持有引用期间不能 `resize_buffers`
/// * `Fence` - 帧围栏
pub trait GraphicsBackend {
    type Device;
    type CommandList;
    type RenderTarget: Clone;
    type Fence: GpuFence;

    /// 获取后端的名称，用于日志输出
    fn backend_name(&self) -> &str;

    /// 获取设备
    fn device(&self) -> &Self::Device;

    /// 创建帧围栏（初始完成值为 0）
    fn create_fence(&mut self) -> Result<Self::Fence>;

    /// 交换链当前的后台缓冲区索引
    fn current_back_buffer_index(&self) -> usize;

    /// 调整交换链缓冲区尺寸，缓冲区数量保持不变
    fn resize_buffers(&mut self, width: u32, height: u32) -> Result<()>;

    /// 呈现当前后台缓冲区
    ///
    /// # 参数
    ///
    /// * `sync_interval` - 1 表示等待垂直同步，0 表示立即呈现
    fn present(&mut self, sync_interval: u32) -> Result<()>;

    /// 创建恰好容纳 `count` 个 RTV 的描述符堆
    fn create_rtv_heap(&mut self, count: usize) -> Result<DescriptorHeapInfo>;

    /// 释放 RTV 描述符堆
    fn release_rtv_heap(&mut self);

    /// 获取第 `index` 个交换链缓冲区
    fn back_buffer(&self, index: usize) -> Result<Self::RenderTarget>;

    /// 在 `handle` 处为 `target` 创建渲染目标视图
    fn create_render_target_view(&self, target: &Self::RenderTarget, handle: CpuDescriptorHandle);

    /// 重置 `slot` 对应的命令分配器
    ///
    /// 调用方必须保证该槽位上次提交的工作已经完成。
    fn reset_command_allocator(&mut self, slot: usize) -> Result<()>;

    /// 以 `slot` 对应的分配器打开命令列表
    fn open_command_list(&mut self, slot: usize) -> Result<Self::CommandList>;

    /// 设置视口和裁剪矩形为整个帧缓冲区
    fn set_viewport(&self, list: &mut Self::CommandList, width: u32, height: u32);

    /// 录制一个状态转换屏障
    fn transition_barrier(
        &self,
        list: &mut Self::CommandList,
        target: &Self::RenderTarget,
        before: ResourceState,
        after: ResourceState,
    );

    /// 绑定渲染目标
    fn bind_render_target(&self, list: &mut Self::CommandList, handle: CpuDescriptorHandle);

    /// 清除渲染目标
    fn clear_render_target(&self, list: &mut Self::CommandList, handle: CpuDescriptorHandle, color: [f32; 4]);

    /// 关闭命令列表并提交到命令队列
    fn execute(&mut self, list: Self::CommandList) -> Result<()>;
}
