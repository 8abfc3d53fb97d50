use std::time::Duration;

use crate::binding::{DescriptorTable, SignatureHandle};
use crate::error::FrameError;
use crate::pipeline::PipelineHandle;
use crate::resource::{IndexBufferView, VertexBufferView};

use super::backend::{FrameBackend, HostEvent, HostSurface};
use super::command::{DrawIndexed, ScissorRect, Viewport};
use super::fence::{Fence, WaitOutcome};
use super::recorder::CommandRecorder;
use super::transform::{Camera, Rotation};
use super::{BackBufferSet, BufferState};

/// Steps of one frame, in execution order.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum FramePhase {
    /// No frame has started yet.
    Idle,
    Acquire,
    TransitionIn,
    BindAndClear,
    Draw,
    TransitionOut,
    Submit,
    FenceWait,
    Reset,
    Present,
    /// A step failed; the sequencer refuses further frames.
    Faulted,
}

impl FramePhase {
    /// The only phase allowed to follow `self`.
    pub fn next(self) -> FramePhase {
        match self {
            FramePhase::Idle | FramePhase::Present => FramePhase::Acquire,
            FramePhase::Acquire => FramePhase::TransitionIn,
            FramePhase::TransitionIn => FramePhase::BindAndClear,
            FramePhase::BindAndClear => FramePhase::Draw,
            FramePhase::Draw => FramePhase::TransitionOut,
            FramePhase::TransitionOut => FramePhase::Submit,
            FramePhase::Submit => FramePhase::FenceWait,
            FramePhase::FenceWait => FramePhase::Reset,
            FramePhase::Reset => FramePhase::Present,
            FramePhase::Faulted => FramePhase::Faulted,
        }
    }
}

/// Immutable GPU objects bound every frame.
#[derive(Debug, Copy, Clone)]
pub struct FrameResources {
    pub pipeline: PipelineHandle,
    pub signature: SignatureHandle,
    /// Slot 0: texture (pixel stage).
    pub texture_table: DescriptorTable,
    /// Slot 1: transform constant buffer (vertex stage).
    pub transform_table: DescriptorTable,
    pub vertex_buffer: VertexBufferView,
    pub index_buffer: IndexBufferView,
}

/// Per-frame behavior knobs.
#[derive(Debug, Clone)]
pub struct SequencerConfig {
    pub clear_color: [f32; 4],
    pub sync_interval: u32,
    /// `None` waits without bound.
    pub fence_timeout: Option<Duration>,
    /// Radians added to the rotation after every frame.
    pub rotation_step: f32,
    pub camera: Camera,
}

impl Default for SequencerConfig {
    fn default() -> Self {
        Self {
            clear_color: [1.0, 1.0, 0.0, 1.0],
            sync_interval: 1,
            fence_timeout: Some(Duration::from_secs(5)),
            rotation_step: 0.01,
            camera: Camera::default(),
        }
    }
}

/// What one call to [`FrameSequencer::render_frame`] did.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct FrameReport {
    pub frame: u64,
    pub back_buffer: usize,
    pub fence_value: u64,
    /// Whether the CPU had to block on the fence.
    pub waited: bool,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum LoopControl {
    Continue,
    Exit,
}

/// Drives the per-frame state machine against a [`FrameBackend`].
///
/// One submission is in flight at most: every frame waits on the fence before
/// the recorder, the transform buffer or the back buffer are touched again.
pub struct FrameSequencer<B: FrameBackend> {
    backend: B,
    resources: FrameResources,
    config: SequencerConfig,

    recorder: CommandRecorder,
    back_buffers: BackBufferSet,
    fence: Fence,
    fence_value: u64,

    rotation: Rotation,
    phase: FramePhase,
    frames: u64,
}

impl<B: FrameBackend> FrameSequencer<B> {
    /// Creates the sequencer and writes the initial transform.
    pub fn new(
        mut backend: B,
        resources: FrameResources,
        config: SequencerConfig,
    ) -> Result<Self, FrameError> {
        let back_buffers = BackBufferSet::new(backend.back_buffer_count());
        let rotation = Rotation::new(config.rotation_step);

        let (w, h) = backend.back_buffer_extent();
        backend.write_transform(&rotation.uniform(&config.camera, aspect(w, h)))?;

        Ok(Self {
            backend,
            resources,
            config,
            recorder: CommandRecorder::new(),
            back_buffers,
            fence: Fence::new(0),
            fence_value: 0,
            rotation,
            phase: FramePhase::Idle,
            frames: 0,
        })
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn fence(&self) -> &Fence {
        &self.fence
    }

    /// Last value the queue was asked to signal.
    pub fn fence_value(&self) -> u64 {
        self.fence_value
    }

    pub fn back_buffers(&self) -> &BackBufferSet {
        &self.back_buffers
    }

    pub fn recorder(&self) -> &CommandRecorder {
        &self.recorder
    }

    pub fn rotation(&self) -> &Rotation {
        &self.rotation
    }

    pub fn phase(&self) -> FramePhase {
        self.phase
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    fn enter(&mut self, to: FramePhase) -> Result<(), FrameError> {
        let from = self.phase;
        if from.next() != to {
            return Err(FrameError::PhaseOrder { from, to });
        }
        self.phase = to;
        log::trace!("frame {}: {:?}", self.frames, to);
        Ok(())
    }

    /// Polls the host once, then renders a frame unless close was requested.
    pub fn tick<H: HostSurface>(&mut self, host: &mut H) -> Result<LoopControl, FrameError> {
        if host.poll_events() == HostEvent::CloseRequested {
            return Ok(LoopControl::Exit);
        }
        self.render_frame()?;
        Ok(LoopControl::Continue)
    }

    /// Renders frames until the host requests close, then drains the GPU.
    ///
    /// Returns the number of frames rendered.
    pub fn run<H: HostSurface>(&mut self, host: &mut H) -> Result<u64, FrameError> {
        while self.tick(host)? == LoopControl::Continue {}
        self.shutdown()?;
        Ok(self.frames)
    }

    /// Renders one frame. Any error leaves the sequencer faulted.
    pub fn render_frame(&mut self) -> Result<FrameReport, FrameError> {
        match self.frame_steps() {
            Ok(report) => Ok(report),
            Err(e) => {
                log::error!("frame {} aborted in {:?}: {e}", self.frames, self.phase);
                self.phase = FramePhase::Faulted;
                Err(e)
            }
        }
    }

    fn frame_steps(&mut self) -> Result<FrameReport, FrameError> {
        self.enter(FramePhase::Acquire)?;
        let index = self.backend.acquire()?;

        self.enter(FramePhase::TransitionIn)?;
        self.recorder.resource_barrier(
            &mut self.back_buffers,
            index,
            BufferState::Present,
            BufferState::RenderTarget,
        )?;

        self.enter(FramePhase::BindAndClear)?;
        self.record_bindings(index)?;

        self.enter(FramePhase::Draw)?;
        self.recorder.draw_indexed(DrawIndexed {
            index_count: self.resources.index_buffer.index_count(),
            instance_count: 1,
            first_index: 0,
            base_vertex: 0,
            first_instance: 0,
        })?;

        self.enter(FramePhase::TransitionOut)?;
        self.recorder.resource_barrier(
            &mut self.back_buffers,
            index,
            BufferState::RenderTarget,
            BufferState::Present,
        )?;

        self.enter(FramePhase::Submit)?;
        let batch = self.recorder.close()?;
        self.backend.execute(batch)?;

        self.enter(FramePhase::FenceWait)?;
        self.fence_value += 1;
        let target = self.fence_value;
        self.backend.signal(&self.fence, target)?;
        self.recorder.mark_submitted(target);
        let waited = self.wait_for(target)?;

        // Submission `target` is complete, so the GPU no longer reads the transform.
        self.rotation.advance();
        let (w, h) = self.backend.back_buffer_extent();
        let transform = self.rotation.uniform(&self.config.camera, aspect(w, h));
        self.backend.write_transform(&transform)?;

        self.enter(FramePhase::Reset)?;
        self.recorder.reset(&self.fence)?;

        self.enter(FramePhase::Present)?;
        self.backend.present(index, self.config.sync_interval)?;

        let report = FrameReport {
            frame: self.frames,
            back_buffer: index,
            fence_value: target,
            waited,
        };
        self.frames += 1;
        Ok(report)
    }

    fn record_bindings(&mut self, index: usize) -> Result<(), FrameError> {
        let res = self.resources;
        let (w, h) = self.backend.back_buffer_extent();
        let rec = &mut self.recorder;

        rec.set_render_target(&self.back_buffers, index)?;
        rec.clear_render_target(&self.back_buffers, index, self.config.clear_color)?;
        rec.set_pipeline_state(&res.pipeline)?;
        rec.set_viewport(Viewport::covering(w, h))?;
        rec.set_scissor_rect(ScissorRect::covering(w, h))?;
        rec.set_vertex_buffer(&res.vertex_buffer)?;
        rec.set_index_buffer(&res.index_buffer)?;
        rec.set_bind_signature(&res.signature)?;
        // The cursor advances per table: texture first, then constants.
        rec.set_descriptor_table(0, &res.texture_table)?;
        rec.set_descriptor_table(1, &res.transform_table)?;
        Ok(())
    }

    /// Blocks until the fence reaches `target`; returns whether it had to wait.
    fn wait_for(&mut self, target: u64) -> Result<bool, FrameError> {
        if self.fence.completed_value() >= target {
            return Ok(false);
        }

        log::debug!("waiting for fence value {target}");
        let timeout = self.config.fence_timeout;
        match self.backend.wait(&self.fence, target, timeout)? {
            WaitOutcome::Signaled => Ok(true),
            WaitOutcome::TimedOut => Err(FrameError::FenceTimeout {
                target,
                completed: self.fence.completed_value(),
                timeout: timeout.unwrap_or_default(),
            }),
        }
    }

    /// Waits for the last signaled fence value so no GPU work outlives the resources.
    pub fn shutdown(&mut self) -> Result<(), FrameError> {
        let target = self.fence_value;
        if self.fence.completed_value() >= target {
            return Ok(());
        }
        log::debug!("draining GPU work through fence value {target}");
        self.wait_for(target).map(|_| ())
    }
}

fn aspect(width: u32, height: u32) -> f32 {
    width.max(1) as f32 / height.max(1) as f32
}
