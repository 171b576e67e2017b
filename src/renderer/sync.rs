//! GPU 同步机制模块
//!
//! 基于单个围栏的帧同步协议（双缓冲）。
//!
//! # 协议
//!
//! 每个后台缓冲区槽位记录一个围栏值，初始为 1。
//!
//! - `wait_for_gpu`：以当前槽位的值 Signal，阻塞直到完成，然后该值加一。
//!   用于关闭和调整尺寸，之后 GPU 上不再有任何工作。
//! - `wait_before_next_frame`：以当前槽位的值 Signal，切换到交换链的新索引，
//!   只有新槽位记录的值尚未完成时才阻塞，然后把新槽位的值设为 `signaled + 1`。
//!
//! 槽位 *i* 的命令分配器只有在 `completed >= fence_values[i]` 之后才能重置。

use crate::core::error::Result;
use crate::gfx::backend::GpuFence;

use super::BUFFER_COUNT;

/// Fence 值
///
/// 用于CPU-GPU同步的单调递增值。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct FenceValue(u64);

impl FenceValue {
    /// 每个槽位的初始值
    pub const INITIAL: FenceValue = FenceValue(1);

    /// 创建新的Fence值
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    /// 获取内部值
    pub fn value(&self) -> u64 {
        self.0
    }

    /// 递增Fence值
    pub fn increment(&mut self) {
        self.0 += 1;
    }

    /// 下一个Fence值
    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }
}

/// 帧同步器
///
/// 拥有帧围栏和每个槽位的围栏值。
pub struct FrameSynchronizer<F: GpuFence> {
    fence: F,
    fence_values: [FenceValue; BUFFER_COUNT],
}

impl<F: GpuFence> FrameSynchronizer<F> {
    pub fn new(fence: F) -> Self {
        Self {
            fence,
            fence_values: [FenceValue::INITIAL; BUFFER_COUNT],
        }
    }

    /// 槽位当前记录的围栏值
    pub fn fence_value(&self, slot: usize) -> FenceValue {
        self.fence_values[slot]
    }

    /// GPU 已完成的围栏值
    pub fn completed_value(&self) -> FenceValue {
        FenceValue::new(self.fence.completed_value())
    }

    /// 槽位上次提交的工作是否已经完成
    pub fn is_slot_idle(&self, slot: usize) -> bool {
        self.completed_value() >= self.fence_values[slot]
    }

    /// 等待 GPU 完成所有已提交的工作
    ///
    /// # 参数
    ///
    /// * `reason` - 记录到日志中的等待原因（"resize"、"shutdown" 等）
    /// * `slot` - 当前后台缓冲区索引
    pub fn wait_for_gpu(&mut self, reason: &str, slot: usize) -> Result<()> {
        let value = self.fence_values[slot];

        crate::renderer_debug!(reason, slot, fence_value = value.value(), "Waiting for GPU");

        self.fence.signal(value.value())?;
        self.fence.wait_for(value.value())?;

        self.fence_values[slot].increment();
        Ok(())
    }

    /// 提交后切换到下一帧的槽位
    ///
    /// # 参数
    ///
    /// * `current` - 刚刚提交的槽位
    /// * `next` - 交换链在 Present 之后报告的新索引
    pub fn wait_before_next_frame(&mut self, current: usize, next: usize) -> Result<()> {
        let signaled = self.fence_values[current];
        self.fence.signal(signaled.value())?;

        let pending = self.fence_values[next];
        if self.fence.completed_value() < pending.value() {
            tracing::trace!(
                target: "rendering_101::renderer",
                slot = next,
                fence_value = pending.value(),
                "Back buffer still in flight, blocking"
            );
            self.fence.wait_for(pending.value())?;
        }

        self.fence_values[next] = signaled.next();
        Ok(())
    }

    /// 重置所有槽位的围栏值为初始值
    ///
    /// 只能在 `wait_for_gpu` 之后调用。围栏本身也回到 0，
    /// 否则旧的完成值会让重置后的第一次等待被错误地跳过。
    pub fn reset(&mut self) -> Result<()> {
        self.fence.reset()?;
        self.fence_values = [FenceValue::INITIAL; BUFFER_COUNT];
        Ok(())
    }
}
