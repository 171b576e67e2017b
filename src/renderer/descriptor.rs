//! 描述符管理模块
//!
//! 管理交换链缓冲区的渲染目标视图（RTV）。
//!
//! 描述符堆的容量恰好等于缓冲区数量，第 *i* 个视图位于
//! `heap_start + i * increment`。所有视图一起创建、一起销毁。

use crate::core::error::{GraphicsError, Result};
use crate::gfx::backend::GraphicsBackend;

/// CPU 描述符句柄
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CpuDescriptorHandle {
    pub ptr: usize,
}

impl CpuDescriptorHandle {
    pub fn new(ptr: usize) -> Self {
        Self { ptr }
    }

    /// 偏移 `index` 个描述符
    pub fn offset(self, index: usize, increment: usize) -> Self {
        Self { ptr: self.ptr + index * increment }
    }
}

/// 描述符堆信息
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescriptorHeapInfo {
    /// 堆起始位置
    pub cpu_start: CpuDescriptorHandle,
    /// 描述符大小（由设备决定）
    pub increment: usize,
    /// 描述符数量
    pub capacity: usize,
}

impl DescriptorHeapInfo {
    /// 第 `index` 个描述符的句柄
    pub fn handle(&self, index: usize) -> Result<CpuDescriptorHandle> {
        if index >= self.capacity {
            return Err(GraphicsError::ResourceCreation(format!(
                "descriptor index {} out of range (capacity {})",
                index, self.capacity
            )).into());
        }
        Ok(self.cpu_start.offset(index, self.increment))
    }
}

/// 渲染目标视图
#[derive(Debug, Clone)]
pub struct RenderTargetView<R> {
    /// 交换链缓冲区
    pub resource: R,
    /// 视图所在的描述符
    pub handle: CpuDescriptorHandle,
}

/// 渲染目标视图集合
///
/// 持有交换链缓冲区的引用；调整交换链尺寸之前必须 `cleanup`。
#[derive(Debug)]
pub struct RenderTargetSet<R> {
    heap: Option<DescriptorHeapInfo>,
    views: Vec<RenderTargetView<R>>,
}

impl<R: Clone> RenderTargetSet<R> {
    pub fn new() -> Self {
        Self { heap: None, views: Vec::new() }
    }

    /// 创建描述符堆并为每个缓冲区创建一个视图
    pub fn create<B>(&mut self, backend: &mut B, count: usize) -> Result<()>
    where
        B: GraphicsBackend<RenderTarget = R>,
    {
        if !self.views.is_empty() || self.heap.is_some() {
            return Err(GraphicsError::ResourceCreation(
                "render target views already exist".to_string(),
            ).into());
        }

        let heap = backend.create_rtv_heap(count)?;
        self.heap = Some(heap);

        for index in 0..count {
            let resource = backend.back_buffer(index)?;
            let handle = heap.handle(index)?;
            backend.create_render_target_view(&resource, handle);
            self.views.push(RenderTargetView { resource, handle });
        }

        crate::renderer_debug!(count, increment = heap.increment, "Render target views created");
        Ok(())
    }

    /// 释放所有缓冲区引用和描述符堆
    pub fn cleanup<B>(&mut self, backend: &mut B)
    where
        B: GraphicsBackend<RenderTarget = R>,
    {
        self.views.clear();
        if self.heap.take().is_some() {
            backend.release_rtv_heap();
        }
    }

    /// 第 `index` 个缓冲区的视图
    pub fn view(&self, index: usize) -> Result<&RenderTargetView<R>> {
        self.views.get(index).ok_or_else(|| {
            GraphicsError::InvalidFrame(format!(
                "no render target view for back buffer {} ({} views)",
                index,
                self.views.len()
            )).into()
        })
    }

    pub fn len(&self) -> usize {
        self.views.len()
    }

    pub fn is_empty(&self) -> bool {
        self.views.is_empty()
    }

    /// 所有视图的描述符句柄（按缓冲区索引排列）
    pub fn handles(&self) -> Vec<CpuDescriptorHandle> {
        self.views.iter().map(|v| v.handle).collect()
    }
}

impl<R: Clone> Default for RenderTargetSet<R> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::recording::{GpuCall, RecordingBackend};

    #[test]
    fn test_handle_offset() {
        let start = CpuDescriptorHandle::new(0x1000);
        assert_eq!(start.offset(0, 32).ptr, 0x1000);
        assert_eq!(start.offset(3, 32).ptr, 0x1000 + 96);
    }

    #[test]
    fn test_heap_handle_bounds() {
        let heap = DescriptorHeapInfo {
            cpu_start: CpuDescriptorHandle::new(64),
            increment: 8,
            capacity: 2,
        };
        assert_eq!(heap.handle(1).unwrap().ptr, 72);
        assert!(heap.handle(2).is_err());
    }

    #[test]
    fn test_views_at_increasing_offsets() {
        let mut backend = RecordingBackend::new(1024, 768);
        let mut set = RenderTargetSet::new();
        set.create(&mut backend, 2).unwrap();

        assert_eq!(set.len(), 2);
        let handles = set.handles();
        assert!(handles[0] < handles[1]);
        assert_eq!(handles[1].ptr - handles[0].ptr, RecordingBackend::RTV_INCREMENT);

        let created: Vec<_> = backend
            .calls()
            .into_iter()
            .filter(|c| matches!(c, GpuCall::CreateRenderTargetView { .. }))
            .collect();
        assert_eq!(created.len(), 2);
    }

    #[test]
    fn test_create_twice_rejected() {
        let mut backend = RecordingBackend::new(1024, 768);
        let mut set = RenderTargetSet::new();
        set.create(&mut backend, 2).unwrap();
        assert!(set.create(&mut backend, 2).is_err());

        set.cleanup(&mut backend);
        assert!(set.is_empty());
        assert!(set.view(0).is_err());
        set.create(&mut backend, 2).unwrap();
        assert_eq!(backend.rtv_heaps_created(), 2);
    }
}
