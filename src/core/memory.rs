//! 内存分配统计
//!
//! `TrackingAllocator` 包装 `std::alloc::System`，用原子计数器记录分配和释放的字节数。
//! 启用 `memory-stats` feature 时它被注册为全局分配器，关闭窗口时把统计写入日志：
//!
//! ```bash
//! cargo run --features memory-stats
//! ```
//!
//! 分配器内部不能记录日志（日志本身会分配内存），所以只累加计数，
//! 由 `log_statistics` 在调用方线程上读取快照再输出。

use std::alloc::{GlobalAlloc, Layout, System};
use std::sync::atomic::{AtomicUsize, Ordering};

/// 某一时刻的分配统计
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MemorySnapshot {
    /// 累计分配的字节数
    pub total_allocated: usize,
    /// 累计释放的字节数
    pub total_deallocated: usize,
    /// 分配次数
    pub allocations: usize,
    /// 释放次数
    pub deallocations: usize,
}

impl MemorySnapshot {
    /// 当前仍未释放的字节数
    pub fn current(&self) -> usize {
        self.total_allocated.saturating_sub(self.total_deallocated)
    }

    /// 自 `earlier` 以来的增量
    pub fn since(&self, earlier: &MemorySnapshot) -> MemorySnapshot {
        MemorySnapshot {
            total_allocated: self.total_allocated - earlier.total_allocated,
            total_deallocated: self.total_deallocated - earlier.total_deallocated,
            allocations: self.allocations - earlier.allocations,
            deallocations: self.deallocations - earlier.deallocations,
        }
    }
}

/// 统计分配量的分配器
pub struct TrackingAllocator {
    total_allocated: AtomicUsize,
    total_deallocated: AtomicUsize,
    allocations: AtomicUsize,
    deallocations: AtomicUsize,
}

impl TrackingAllocator {
    pub const fn new() -> Self {
        Self {
            total_allocated: AtomicUsize::new(0),
            total_deallocated: AtomicUsize::new(0),
            allocations: AtomicUsize::new(0),
            deallocations: AtomicUsize::new(0),
        }
    }

    pub fn snapshot(&self) -> MemorySnapshot {
        MemorySnapshot {
            total_allocated: self.total_allocated.load(Ordering::Relaxed),
            total_deallocated: self.total_deallocated.load(Ordering::Relaxed),
            allocations: self.allocations.load(Ordering::Relaxed),
            deallocations: self.deallocations.load(Ordering::Relaxed),
        }
    }

    fn record_allocation(&self, size: usize) {
        self.total_allocated.fetch_add(size, Ordering::Relaxed);
        self.allocations.fetch_add(1, Ordering::Relaxed);
    }

    fn record_deallocation(&self, size: usize) {
        self.total_deallocated.fetch_add(size, Ordering::Relaxed);
        self.deallocations.fetch_add(1, Ordering::Relaxed);
    }
}

impl Default for TrackingAllocator {
    fn default() -> Self {
        Self::new()
    }
}

unsafe impl GlobalAlloc for TrackingAllocator {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        let ptr = System.alloc(layout);
        if !ptr.is_null() {
            self.record_allocation(layout.size());
        }
        ptr
    }

    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        let ptr = System.alloc_zeroed(layout);
        if !ptr.is_null() {
            self.record_allocation(layout.size());
        }
        ptr
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        System.dealloc(ptr, layout);
        self.record_deallocation(layout.size());
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        let new_ptr = System.realloc(ptr, layout, new_size);
        // 失败时原内存块保持不变
        if !new_ptr.is_null() {
            self.record_deallocation(layout.size());
            self.record_allocation(new_size);
        }
        new_ptr
    }
}

#[cfg(feature = "memory-stats")]
#[global_allocator]
static GLOBAL: TrackingAllocator = TrackingAllocator::new();

/// 全局分配器的统计；未启用 `memory-stats` 时为 `None`
pub fn global_snapshot() -> Option<MemorySnapshot> {
    #[cfg(feature = "memory-stats")]
    {
        Some(GLOBAL.snapshot())
    }
    #[cfg(not(feature = "memory-stats"))]
    {
        None
    }
}

/// 把全局分配统计写入日志
pub fn log_statistics() {
    match global_snapshot() {
        Some(stats) => tracing::info!(
            target: "rendering_101::memory",
            total_allocated = stats.total_allocated,
            total_deallocated = stats.total_deallocated,
            current = stats.current(),
            allocations = stats.allocations,
            deallocations = stats.deallocations,
            "Memory statistics"
        ),
        None => tracing::debug!(
            target: "rendering_101::memory",
            "Memory statistics disabled (build with --features memory-stats)"
        ),
    }
}
