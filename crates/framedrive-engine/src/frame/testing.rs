//! Simulated frame backend used by unit tests.

use std::thread;
use std::time::Duration;

use crate::binding::{DescriptorTable, SignatureHandle};
use crate::error::FrameError;
use crate::pipeline::PipelineHandle;
use crate::resource::{BufferId, IndexBufferView, PipelineId, SignatureId, TableId, VertexBufferView};

use super::backend::{FrameBackend, HostEvent, HostSurface};
use super::command::CommandBatch;
use super::fence::{Fence, WaitOutcome};
use super::sequencer::FrameResources;
use super::transform::TransformUniform;

/// When the simulated GPU completes a signaled fence value.
#[derive(Debug, Copy, Clone)]
pub enum Completion {
    /// At signal time.
    Immediate,
    /// From a worker thread after the delay.
    Deferred(Duration),
    /// Never; models a hung GPU.
    Never,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SimEvent {
    Acquire { index: usize },
    Execute { commands: usize },
    Signal { value: u64 },
    Wait { value: u64 },
    WriteTransform,
    Present { index: usize, sync_interval: u32 },
}

pub struct SimBackend {
    completion: Completion,
    buffer_count: usize,
    current: usize,
    forced_index: Option<usize>,
    fail_execute_at: Option<usize>,
    events: Vec<SimEvent>,
    batches: Vec<CommandBatch>,
    transforms: Vec<TransformUniform>,
    workers: Vec<thread::JoinHandle<()>>,
}

impl SimBackend {
    pub fn new(completion: Completion) -> Self {
        Self {
            completion,
            buffer_count: 2,
            current: 0,
            forced_index: None,
            fail_execute_at: None,
            events: Vec::new(),
            batches: Vec::new(),
            transforms: Vec::new(),
            workers: Vec::new(),
        }
    }

    /// Makes the `n`-th execute call (1-based) fail.
    pub fn fail_execute_at(&mut self, n: usize) {
        self.fail_execute_at = Some(n);
    }

    pub fn force_index(&mut self, index: usize) {
        self.forced_index = Some(index);
    }

    pub fn events(&self) -> &[SimEvent] {
        &self.events
    }

    pub fn batches(&self) -> &[CommandBatch] {
        &self.batches
    }

    pub fn transforms(&self) -> &[TransformUniform] {
        &self.transforms
    }

    pub fn signaled_values(&self) -> Vec<u64> {
        self.events
            .iter()
            .filter_map(|e| match e {
                SimEvent::Signal { value } => Some(*value),
                _ => None,
            })
            .collect()
    }
}

impl Drop for SimBackend {
    fn drop(&mut self) {
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

impl FrameBackend for SimBackend {
    fn back_buffer_count(&self) -> usize {
        self.buffer_count
    }

    fn back_buffer_extent(&self) -> (u32, u32) {
        (1280, 720)
    }

    fn acquire(&mut self) -> Result<usize, FrameError> {
        let index = self.forced_index.unwrap_or(self.current);
        self.events.push(SimEvent::Acquire { index });
        Ok(index)
    }

    fn execute(&mut self, batch: &CommandBatch) -> Result<(), FrameError> {
        if self.fail_execute_at == Some(self.batches.len() + 1) {
            return Err(FrameError::Submission("simulated device removal".into()));
        }
        self.events.push(SimEvent::Execute {
            commands: batch.len(),
        });
        self.batches.push(batch.clone());
        Ok(())
    }

    fn signal(&mut self, fence: &Fence, value: u64) -> Result<(), FrameError> {
        self.events.push(SimEvent::Signal { value });
        let handle = fence.signal_handle();
        match self.completion {
            Completion::Immediate => handle.complete(value),
            Completion::Deferred(delay) => {
                self.workers.push(thread::spawn(move || {
                    thread::sleep(delay);
                    handle.complete(value);
                }));
            }
            Completion::Never => {}
        }
        Ok(())
    }

    fn wait(
        &mut self,
        fence: &Fence,
        value: u64,
        timeout: Option<Duration>,
    ) -> Result<WaitOutcome, FrameError> {
        self.events.push(SimEvent::Wait { value });
        Ok(fence.wait(value, timeout))
    }

    fn write_transform(&mut self, transform: &TransformUniform) -> Result<(), FrameError> {
        self.events.push(SimEvent::WriteTransform);
        self.transforms.push(*transform);
        Ok(())
    }

    fn present(&mut self, index: usize, sync_interval: u32) -> Result<(), FrameError> {
        self.events.push(SimEvent::Present {
            index,
            sync_interval,
        });
        self.current = (self.current + 1) % self.buffer_count;
        Ok(())
    }
}

/// Host that reports close after a fixed number of polls.
pub struct ScriptedHost {
    open_polls: u64,
    polls: u64,
}

impl ScriptedHost {
    pub fn close_after(open_polls: u64) -> Self {
        Self {
            open_polls,
            polls: 0,
        }
    }

    pub fn polls(&self) -> u64 {
        self.polls
    }
}

impl HostSurface for ScriptedHost {
    fn poll_events(&mut self) -> HostEvent {
        self.polls += 1;
        if self.polls > self.open_polls {
            HostEvent::CloseRequested
        } else {
            HostEvent::None
        }
    }
}

/// Handles of a textured quad without any GPU objects behind them.
pub struct QuadBindings {
    pub pipeline: PipelineHandle,
    pub signature: SignatureHandle,
    pub texture_table: DescriptorTable,
    pub transform_table: DescriptorTable,
    pub vertex_buffer: VertexBufferView,
    pub index_buffer: IndexBufferView,
}

pub fn quad_bindings() -> QuadBindings {
    let signature = SignatureHandle {
        id: SignatureId(0),
        table_count: 2,
    };
    QuadBindings {
        pipeline: PipelineHandle {
            id: PipelineId(0),
            signature: signature.id,
        },
        signature,
        texture_table: DescriptorTable {
            id: TableId(0),
            signature: signature.id,
            slot: 0,
        },
        transform_table: DescriptorTable {
            id: TableId(1),
            signature: signature.id,
            slot: 1,
        },
        vertex_buffer: VertexBufferView {
            buffer: BufferId(0),
            size: 80,
            stride: 20,
        },
        index_buffer: IndexBufferView {
            buffer: BufferId(1),
            size: 12,
            format: wgpu::IndexFormat::Uint16,
        },
    }
}

pub fn quad_resources() -> FrameResources {
    let q = quad_bindings();
    FrameResources {
        pipeline: q.pipeline,
        signature: q.signature,
        texture_table: q.texture_table,
        transform_table: q.transform_table,
        vertex_buffer: q.vertex_buffer,
        index_buffer: q.index_buffer,
    }
}
