use std::time::Duration;

use crate::error::FrameError;

use super::command::CommandBatch;
use super::fence::{Fence, WaitOutcome};
use super::transform::TransformUniform;

/// Event reported by the host surface between frames.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum HostEvent {
    None,
    CloseRequested,
}

/// Window-side collaborator of the frame loop.
pub trait HostSurface {
    /// Drains pending platform events; called once per loop iteration.
    fn poll_events(&mut self) -> HostEvent;
}

/// GPU-side collaborator of the frame loop: swap surface plus command queue.
pub trait FrameBackend {
    /// Number of back buffers in the swap surface.
    fn back_buffer_count(&self) -> usize;

    /// Size of the back buffers in physical pixels.
    fn back_buffer_extent(&self) -> (u32, u32);

    /// Returns the index of the back buffer available for this frame.
    fn acquire(&mut self) -> Result<usize, FrameError>;

    /// Executes a closed batch asynchronously.
    fn execute(&mut self, batch: &CommandBatch) -> Result<(), FrameError>;

    /// Asks the queue to complete `fence` at `value` once prior work finishes.
    fn signal(&mut self, fence: &Fence, value: u64) -> Result<(), FrameError>;

    /// Blocks until `fence` reaches `value` or `timeout` elapses.
    fn wait(
        &mut self,
        fence: &Fence,
        value: u64,
        timeout: Option<Duration>,
    ) -> Result<WaitOutcome, FrameError> {
        Ok(fence.wait(value, timeout))
    }

    /// Rewrites the transform constant buffer.
    fn write_transform(&mut self, transform: &TransformUniform) -> Result<(), FrameError>;

    /// Presents back buffer `index` with the given vertical-sync interval.
    fn present(&mut self, index: usize, sync_interval: u32) -> Result<(), FrameError>;
}
