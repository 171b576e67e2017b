//! 命令录制状态
//!
//! 每一帧的命令列表在 `begin_frame` 中打开，在 `end_frame` 中关闭并提交。
//!
//! # 状态机
//!
//! ```text
//! Idle --begin_frame--> Recording --end_frame--> Idle
//!   \                                          /
//!    +----------------shutdown---------------+--> ShutDown
//! ```
//!
//! 处于 `Recording` 时再次调用 `begin_frame` 会被拒绝（返回 `None`，调用方跳过本帧）。
//! `ShutDown` 是终止状态。

use std::fmt;

use crate::gfx::backend::GraphicsBackend;

/// 交换链缓冲区的资源状态
///
/// 每对 begin/end 恰好产生一次 Present→RenderTarget 和一次
/// RenderTarget→Present 转换，并且针对同一个资源。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceState {
    /// 可以被呈现
    Present,
    /// 可以作为渲染目标写入
    RenderTarget,
}

/// 帧录制器状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecorderState {
    /// 没有打开的命令列表
    Idle,
    /// 正在录制第 `frame` 帧
    Recording { frame: u64 },
    /// 已关闭，不再接受任何帧或尺寸变化
    ShutDown,
}

impl RecorderState {
    pub fn is_recording(&self) -> bool {
        matches!(self, RecorderState::Recording { .. })
    }

    pub fn is_shut_down(&self) -> bool {
        matches!(self, RecorderState::ShutDown)
    }
}

/// 帧元数据
///
/// 由 `begin_frame` 创建，交给场景中的实体录制绘制命令，
/// 最后由 `end_frame` 消费。
pub struct FrameMetadata<B: GraphicsBackend> {
    /// 帧计数
    pub frame: u64,
    /// 当前后台缓冲区索引
    pub back_buffer_index: usize,
    /// 已打开的命令列表
    pub command_list: B::CommandList,
}

impl<B: GraphicsBackend> fmt::Debug for FrameMetadata<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameMetadata")
            .field("frame", &self.frame)
            .field("back_buffer_index", &self.back_buffer_index)
            .finish_non_exhaustive()
    }
}
