use std::time::Duration;

use crate::frame::{BufferState, FramePhase};

/// Broad error class used by the driver to decide how to report a failure.
///
/// Every class is fatal for the driver; the class only shapes diagnostics.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ErrorClass {
    /// Device, queue, surface, resource or pipeline creation.
    Initialization,
    /// Recording, submission, reset or present.
    PerFrame,
    /// Fence wait that did not complete.
    Synchronization,
}

/// Errors produced while recording commands into a [`crate::frame::CommandRecorder`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RecordError {
    #[error("recorder is closed; reset it before recording")]
    Closed,

    #[error("recorder is not closed; close it before submission")]
    NotClosed,

    #[error("allocator still in flight: submission {pending} not complete (fence at {completed})")]
    AllocatorInFlight { pending: u64, completed: u64 },

    #[error("back buffer {index} out of range (set has {count})")]
    BackBufferOutOfRange { index: usize, count: usize },

    #[error("back buffer {index} is {actual:?}, barrier expected {expected:?}")]
    IllegalTransition {
        index: usize,
        expected: BufferState,
        actual: BufferState,
    },

    #[error("back buffer {index} must be in RenderTarget state to be {action}")]
    NotRenderTarget { index: usize, action: &'static str },

    #[error("no render target bound")]
    NoRenderTarget,

    #[error("no pipeline state bound")]
    NoPipeline,

    #[error("no bind signature bound")]
    NoSignature,

    #[error("pipeline was built for signature {pipeline:?} but signature {bound:?} is bound")]
    SignatureMismatch { pipeline: u32, bound: u32 },

    #[error("descriptor table slot {slot} bound out of order (next expected slot {expected})")]
    TableOutOfOrder { slot: u32, expected: u32 },

    #[error("descriptor table for slot {table_slot} bound to slot {slot}")]
    TableSlotMismatch { slot: u32, table_slot: u32 },

    #[error("descriptor table belongs to signature {table:?}, bound signature is {bound:?}")]
    TableSignatureMismatch { table: u32, bound: u32 },

    #[error("draw requires {required} descriptor tables, {bound} bound")]
    TablesIncomplete { required: u32, bound: u32 },

    #[error("no {0} buffer bound")]
    MissingBuffer(&'static str),

    #[error("index range {first}..{end} exceeds bound index buffer ({available} indices)")]
    IndexRange { first: u32, end: u32, available: u32 },
}

/// Errors surfaced by the frame loop.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("command recording failed: {0}")]
    Recording(#[from] RecordError),

    #[error("submission failed: {0}")]
    Submission(String),

    #[error("present failed: {0}")]
    Present(String),

    #[error("surface acquisition failed: {0}")]
    Acquire(String),

    #[error("fence did not reach {target} within {timeout:?} (completed {completed}); GPU hang suspected")]
    FenceTimeout {
        target: u64,
        completed: u64,
        timeout: Duration,
    },

    #[error("fence wait failed: {0}")]
    Synchronization(String),

    #[error("frame phase {from:?} cannot advance to {to:?}")]
    PhaseOrder { from: FramePhase, to: FramePhase },
}

impl FrameError {
    pub fn class(&self) -> ErrorClass {
        match self {
            FrameError::FenceTimeout { .. } | FrameError::Synchronization(_) => {
                ErrorClass::Synchronization
            }
            _ => ErrorClass::PerFrame,
        }
    }
}
