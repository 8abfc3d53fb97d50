//! Frame execution pipeline.
//!
//! This module is responsible for:
//! - recording one frame of GPU commands with validated back-buffer transitions
//! - submitting the batch and synchronizing on a monotonic fence
//! - recycling the recorder and presenting the back buffer
//!
//! The pipeline is backend-agnostic; [`crate::device::WgpuBackend`] replays the
//! recorded batches through wgpu.

mod back_buffer;
mod backend;
mod command;
mod fence;
mod recorder;
mod sequencer;
mod transform;

#[cfg(test)]
pub(crate) mod testing;

pub use back_buffer::{BackBufferSet, BufferState, ResourceBarrier};
pub use backend::{FrameBackend, HostEvent, HostSurface};
pub use command::{Command, CommandBatch, DrawIndexed, ScissorRect, Viewport};
pub use fence::{Fence, FenceEvent, FenceSignal, WaitOutcome};
pub use recorder::{CommandAllocator, CommandRecorder, RecorderState};
pub use sequencer::{
    FramePhase, FrameReport, FrameResources, FrameSequencer, LoopControl, SequencerConfig,
};
pub use transform::{Camera, Rotation, TransformUniform};
