//! 实体绘制约定
//!
//! 场景中每个可渲染对象都实现 `Entity`。生命周期：
//!
//! 1. `on_resource_create`：创建 GPU 资源，只调用一次
//! 2. 每帧 `on_update`（只修改 CPU 状态），然后 `on_render`（录制绘制命令）
//! 3. `on_shutdown`：在一次完整的 GPU 等待之后、设备销毁之前释放 GPU 资源

use crate::core::error::Result;
use crate::gfx::backend::GraphicsBackend;
use crate::renderer::command::FrameMetadata;

/// 资源创建时交给实体的信息
pub struct ResourceInitMetadata<'a, B: GraphicsBackend> {
    /// 设备
    pub device: &'a B::Device,
    /// 交换链缓冲区数量，按帧复制的资源（常量缓冲区等）需要这么多份
    pub back_buffer_count: usize,
}

/// 可渲染的实体
pub trait Entity<B: GraphicsBackend> {
    /// 实体名称，用于日志和调试名
    fn name(&self) -> &str;

    /// 创建 GPU 资源
    fn on_resource_create(&mut self, init: &ResourceInitMetadata<'_, B>) -> Result<()>;

    /// 每帧更新
    ///
    /// # 参数
    ///
    /// * `frame` - 渲染器的帧计数
    fn on_update(&mut self, frame: u64);

    /// 录制绘制命令
    ///
    /// 只能写入 `frame.back_buffer_index` 对应的那份按帧资源，
    /// 另一份可能仍在被 GPU 读取。
    fn on_render(&mut self, frame: &mut FrameMetadata<B>) -> Result<()>;

    /// 释放 GPU 资源
    fn on_shutdown(&mut self);
}
