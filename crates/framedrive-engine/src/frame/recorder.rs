use crate::binding::{DescriptorTable, SignatureHandle};
use crate::error::RecordError;
use crate::pipeline::PipelineHandle;
use crate::resource::{IndexBufferView, VertexBufferView};

use super::command::{Command, CommandBatch, DrawIndexed, ScissorRect, Viewport};
use super::{BackBufferSet, BufferState, Fence};

/// Backing storage for recorded commands.
///
/// Remembers the fence value of the last submission that used it so it is never
/// recycled while the GPU may still read from it.
#[derive(Debug, Default)]
pub struct CommandAllocator {
    in_flight: Option<u64>,
}

impl CommandAllocator {
    /// Fence value of the last submission, if not yet recycled.
    pub fn in_flight(&self) -> Option<u64> {
        self.in_flight
    }

    fn mark_submitted(&mut self, fence_value: u64) {
        self.in_flight = Some(fence_value);
    }

    fn reset(&mut self, fence: &Fence) -> Result<(), RecordError> {
        if let Some(pending) = self.in_flight {
            let completed = fence.completed_value();
            if completed < pending {
                return Err(RecordError::AllocatorInFlight { pending, completed });
            }
        }
        self.in_flight = None;
        Ok(())
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum RecorderState {
    Recording,
    Closed,
}

/// Bound state tracked while recording, used to reject invalid command streams.
#[derive(Debug, Default)]
struct Bindings {
    render_target: Option<usize>,
    pipeline: Option<PipelineHandle>,
    signature: Option<SignatureHandle>,
    next_table_slot: u32,
    vertex_buffer: Option<VertexBufferView>,
    index_buffer: Option<IndexBufferView>,
}

/// Records GPU operations into a replayable [`CommandBatch`].
///
/// A recorder starts open. After [`close`](Self::close) the batch can be
/// submitted; [`reset`](Self::reset) reopens it once the fence confirms the GPU
/// finished with the previous submission.
#[derive(Debug)]
pub struct CommandRecorder {
    allocator: CommandAllocator,
    batch: CommandBatch,
    state: RecorderState,
    bindings: Bindings,
}

impl Default for CommandRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandRecorder {
    pub fn new() -> Self {
        Self {
            allocator: CommandAllocator::default(),
            batch: CommandBatch::default(),
            state: RecorderState::Recording,
            bindings: Bindings::default(),
        }
    }

    pub fn state(&self) -> RecorderState {
        self.state
    }

    pub fn allocator(&self) -> &CommandAllocator {
        &self.allocator
    }

    /// Commands recorded so far, regardless of state.
    pub fn recorded(&self) -> &CommandBatch {
        &self.batch
    }

    fn push(&mut self, command: Command) -> Result<(), RecordError> {
        if self.state != RecorderState::Recording {
            return Err(RecordError::Closed);
        }
        self.batch.push(command);
        Ok(())
    }

    fn ensure_recording(&self) -> Result<(), RecordError> {
        match self.state {
            RecorderState::Recording => Ok(()),
            RecorderState::Closed => Err(RecordError::Closed),
        }
    }

    pub fn resource_barrier(
        &mut self,
        buffers: &mut BackBufferSet,
        index: usize,
        before: BufferState,
        after: BufferState,
    ) -> Result<(), RecordError> {
        self.ensure_recording()?;
        let barrier = buffers.transition(index, before, after)?;
        if after != BufferState::RenderTarget && self.bindings.render_target == Some(index) {
            self.bindings.render_target = None;
        }
        self.push(Command::Barrier(barrier))
    }

    pub fn set_render_target(
        &mut self,
        buffers: &BackBufferSet,
        index: usize,
    ) -> Result<(), RecordError> {
        self.ensure_recording()?;
        buffers.require_render_target(index, "bound as render target")?;
        self.bindings.render_target = Some(index);
        self.push(Command::SetRenderTarget { back_buffer: index })
    }

    pub fn clear_render_target(
        &mut self,
        buffers: &BackBufferSet,
        index: usize,
        color: [f32; 4],
    ) -> Result<(), RecordError> {
        self.ensure_recording()?;
        buffers.require_render_target(index, "cleared")?;
        self.push(Command::ClearRenderTarget {
            back_buffer: index,
            color,
        })
    }

    pub fn set_pipeline_state(&mut self, pipeline: &PipelineHandle) -> Result<(), RecordError> {
        self.ensure_recording()?;
        self.bindings.pipeline = Some(*pipeline);
        self.push(Command::SetPipelineState(*pipeline))
    }

    pub fn set_viewport(&mut self, viewport: Viewport) -> Result<(), RecordError> {
        self.push(Command::SetViewport(viewport))
    }

    pub fn set_scissor_rect(&mut self, rect: ScissorRect) -> Result<(), RecordError> {
        self.push(Command::SetScissorRect(rect))
    }

    pub fn set_vertex_buffer(&mut self, view: &VertexBufferView) -> Result<(), RecordError> {
        self.ensure_recording()?;
        self.bindings.vertex_buffer = Some(*view);
        self.push(Command::SetVertexBuffer(*view))
    }

    pub fn set_index_buffer(&mut self, view: &IndexBufferView) -> Result<(), RecordError> {
        self.ensure_recording()?;
        self.bindings.index_buffer = Some(*view);
        self.push(Command::SetIndexBuffer(*view))
    }

    /// Binds the signature and rewinds the descriptor cursor to slot 0.
    pub fn set_bind_signature(&mut self, signature: &SignatureHandle) -> Result<(), RecordError> {
        self.ensure_recording()?;
        self.bindings.signature = Some(*signature);
        self.bindings.next_table_slot = 0;
        self.push(Command::SetBindSignature(signature.id))
    }

    /// Binds a descriptor table at `slot`.
    ///
    /// Slots advance a shared cursor and must be bound in ascending order
    /// starting at 0 after the signature is set.
    pub fn set_descriptor_table(
        &mut self,
        slot: u32,
        table: &DescriptorTable,
    ) -> Result<(), RecordError> {
        self.ensure_recording()?;
        let signature = self.bindings.signature.ok_or(RecordError::NoSignature)?;

        if table.signature != signature.id {
            return Err(RecordError::TableSignatureMismatch {
                table: table.signature.raw(),
                bound: signature.id.raw(),
            });
        }
        if table.slot != slot {
            return Err(RecordError::TableSlotMismatch {
                slot,
                table_slot: table.slot,
            });
        }
        if slot != self.bindings.next_table_slot {
            return Err(RecordError::TableOutOfOrder {
                slot,
                expected: self.bindings.next_table_slot,
            });
        }

        self.bindings.next_table_slot += 1;
        self.push(Command::SetDescriptorTable {
            slot,
            table: *table,
        })
    }

    pub fn draw_indexed(&mut self, draw: DrawIndexed) -> Result<(), RecordError> {
        self.ensure_recording()?;
        let b = &self.bindings;

        b.render_target.ok_or(RecordError::NoRenderTarget)?;
        let pipeline = b.pipeline.ok_or(RecordError::NoPipeline)?;
        let signature = b.signature.ok_or(RecordError::NoSignature)?;

        if pipeline.signature != signature.id {
            return Err(RecordError::SignatureMismatch {
                pipeline: pipeline.signature.raw(),
                bound: signature.id.raw(),
            });
        }
        if b.next_table_slot < signature.table_count {
            return Err(RecordError::TablesIncomplete {
                required: signature.table_count,
                bound: b.next_table_slot,
            });
        }

        b.vertex_buffer.ok_or(RecordError::MissingBuffer("vertex"))?;
        let index_buffer = b.index_buffer.ok_or(RecordError::MissingBuffer("index"))?;

        let end = draw.first_index.saturating_add(draw.index_count);
        if end > index_buffer.index_count() {
            return Err(RecordError::IndexRange {
                first: draw.first_index,
                end,
                available: index_buffer.index_count(),
            });
        }

        self.push(Command::DrawIndexed(draw))
    }

    /// Closes the batch for submission.
    pub fn close(&mut self) -> Result<&CommandBatch, RecordError> {
        self.ensure_recording()?;
        self.state = RecorderState::Closed;
        Ok(&self.batch)
    }

    /// The closed batch; fails while still recording.
    pub fn closed_batch(&self) -> Result<&CommandBatch, RecordError> {
        match self.state {
            RecorderState::Closed => Ok(&self.batch),
            RecorderState::Recording => Err(RecordError::NotClosed),
        }
    }

    /// Ties the allocator to the fence value that guards the submitted batch.
    pub fn mark_submitted(&mut self, fence_value: u64) {
        self.allocator.mark_submitted(fence_value);
    }

    /// Recycles the allocator and reopens the recorder with an empty batch.
    ///
    /// Fails if the last submission is not yet complete according to `fence`.
    pub fn reset(&mut self, fence: &Fence) -> Result<(), RecordError> {
        self.allocator.reset(fence)?;
        self.batch.clear();
        self.bindings = Bindings::default();
        self.state = RecorderState::Recording;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::testing::{quad_bindings, QuadBindings};

    fn open_target(rec: &mut CommandRecorder, set: &mut BackBufferSet) {
        rec.resource_barrier(set, 0, BufferState::Present, BufferState::RenderTarget)
            .unwrap();
        rec.set_render_target(set, 0).unwrap();
    }

    fn bind_all(rec: &mut CommandRecorder, q: &QuadBindings) {
        rec.set_pipeline_state(&q.pipeline).unwrap();
        rec.set_vertex_buffer(&q.vertex_buffer).unwrap();
        rec.set_index_buffer(&q.index_buffer).unwrap();
        rec.set_bind_signature(&q.signature).unwrap();
        rec.set_descriptor_table(0, &q.texture_table).unwrap();
        rec.set_descriptor_table(1, &q.transform_table).unwrap();
    }

    fn quad_draw() -> DrawIndexed {
        DrawIndexed {
            index_count: 6,
            instance_count: 1,
            first_index: 0,
            base_vertex: 0,
            first_instance: 0,
        }
    }

    #[test]
    fn records_in_order() {
        let q = quad_bindings();
        let mut set = BackBufferSet::new(2);
        let mut rec = CommandRecorder::new();

        open_target(&mut rec, &mut set);
        bind_all(&mut rec, &q);
        rec.draw_indexed(quad_draw()).unwrap();

        let batch = rec.close().unwrap();
        assert_eq!(batch.table_bind_order(), vec![0, 1]);
        assert!(matches!(batch.commands()[0], Command::Barrier(_)));
        assert!(matches!(batch.commands().last(), Some(Command::DrawIndexed(_))));
    }

    #[test]
    fn constant_buffer_table_before_texture_table_is_rejected() {
        let q = quad_bindings();
        let mut rec = CommandRecorder::new();
        rec.set_bind_signature(&q.signature).unwrap();

        let err = rec.set_descriptor_table(1, &q.transform_table).unwrap_err();
        assert_eq!(err, RecordError::TableOutOfOrder { slot: 1, expected: 0 });
    }

    #[test]
    fn table_requires_signature() {
        let q = quad_bindings();
        let mut rec = CommandRecorder::new();
        let err = rec.set_descriptor_table(0, &q.texture_table).unwrap_err();
        assert_eq!(err, RecordError::NoSignature);
    }

    #[test]
    fn table_slot_must_match_declared_slot() {
        let q = quad_bindings();
        let mut rec = CommandRecorder::new();
        rec.set_bind_signature(&q.signature).unwrap();
        let err = rec.set_descriptor_table(0, &q.transform_table).unwrap_err();
        assert_eq!(err, RecordError::TableSlotMismatch { slot: 0, table_slot: 1 });
    }

    #[test]
    fn rebinding_signature_rewinds_cursor() {
        let q = quad_bindings();
        let mut rec = CommandRecorder::new();
        rec.set_bind_signature(&q.signature).unwrap();
        rec.set_descriptor_table(0, &q.texture_table).unwrap();
        rec.set_bind_signature(&q.signature).unwrap();
        assert!(rec.set_descriptor_table(0, &q.texture_table).is_ok());
    }

    #[test]
    fn draw_requires_all_tables() {
        let q = quad_bindings();
        let mut set = BackBufferSet::new(2);
        let mut rec = CommandRecorder::new();

        open_target(&mut rec, &mut set);
        rec.set_pipeline_state(&q.pipeline).unwrap();
        rec.set_vertex_buffer(&q.vertex_buffer).unwrap();
        rec.set_index_buffer(&q.index_buffer).unwrap();
        rec.set_bind_signature(&q.signature).unwrap();
        rec.set_descriptor_table(0, &q.texture_table).unwrap();

        let err = rec.draw_indexed(quad_draw()).unwrap_err();
        assert_eq!(err, RecordError::TablesIncomplete { required: 2, bound: 1 });
    }

    #[test]
    fn draw_without_render_target_is_rejected() {
        let q = quad_bindings();
        let mut rec = CommandRecorder::new();
        bind_all(&mut rec, &q);
        assert_eq!(rec.draw_indexed(quad_draw()).unwrap_err(), RecordError::NoRenderTarget);
    }

    #[test]
    fn draw_past_index_buffer_is_rejected() {
        let q = quad_bindings();
        let mut set = BackBufferSet::new(2);
        let mut rec = CommandRecorder::new();
        open_target(&mut rec, &mut set);
        bind_all(&mut rec, &q);

        let err = rec
            .draw_indexed(DrawIndexed { index_count: 7, ..quad_draw() })
            .unwrap_err();
        assert_eq!(err, RecordError::IndexRange { first: 0, end: 7, available: 6 });
    }

    #[test]
    fn clear_requires_render_target_state() {
        let set = BackBufferSet::new(2);
        let mut rec = CommandRecorder::new();
        let err = rec.clear_render_target(&set, 1, [0.0; 4]).unwrap_err();
        assert_eq!(
            err,
            RecordError::NotRenderTarget { index: 1, action: "cleared" }
        );
    }

    #[test]
    fn recording_after_close_is_rejected() {
        let mut rec = CommandRecorder::new();
        rec.close().unwrap();
        assert_eq!(
            rec.set_viewport(Viewport::covering(4, 4)).unwrap_err(),
            RecordError::Closed
        );
        assert_eq!(rec.close().unwrap_err(), RecordError::Closed);
    }

    #[test]
    fn closed_batch_requires_close() {
        let mut rec = CommandRecorder::new();
        assert_eq!(rec.closed_batch().unwrap_err(), RecordError::NotClosed);
        rec.close().unwrap();
        assert!(rec.closed_batch().is_ok());
    }

    #[test]
    fn reset_while_in_flight_is_rejected() {
        let fence = Fence::new(0);
        let mut rec = CommandRecorder::new();
        rec.close().unwrap();
        rec.mark_submitted(1);

        let err = rec.reset(&fence).unwrap_err();
        assert_eq!(err, RecordError::AllocatorInFlight { pending: 1, completed: 0 });
        assert_eq!(rec.state(), RecorderState::Closed);
    }

    #[test]
    fn reset_after_completion_yields_empty_batch() {
        let q = quad_bindings();
        let fence = Fence::new(0);
        let mut set = BackBufferSet::new(2);
        let mut rec = CommandRecorder::new();

        for frame in 1..=3u64 {
            open_target(&mut rec, &mut set);
            bind_all(&mut rec, &q);
            rec.draw_indexed(quad_draw()).unwrap();
            rec.resource_barrier(&mut set, 0, BufferState::RenderTarget, BufferState::Present)
                .unwrap();
            rec.close().unwrap();
            rec.mark_submitted(frame);

            fence.signal_handle().complete(frame);
            rec.reset(&fence).unwrap();

            assert_eq!(rec.state(), RecorderState::Recording);
            assert!(rec.recorded().is_empty());
            assert_eq!(rec.allocator().in_flight(), None);
            // Bound state does not leak into the next frame.
            assert_eq!(rec.draw_indexed(quad_draw()).unwrap_err(), RecordError::NoRenderTarget);
        }
    }
}
