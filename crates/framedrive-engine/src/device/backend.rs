use std::time::Duration;

use crate::error::FrameError;
use crate::frame::{Command, CommandBatch, Fence, FrameBackend, TransformUniform, WaitOutcome};
use crate::resource::{ConstantBufferView, ResourceArena};

use super::{present_mode_for, GpuContext, SwapSurface};

/// Frame backend that replays recorded batches through wgpu.
///
/// Owns the context, the surface and every GPU object; they drop together after
/// the sequencer has drained outstanding work.
pub struct WgpuBackend {
    surface: SwapSurface,
    arena: ResourceArena,
    transform: ConstantBufferView,
    last_submission: Option<wgpu::SubmissionIndex>,
    ctx: GpuContext,
}

impl WgpuBackend {
    pub fn new(
        ctx: GpuContext,
        surface: SwapSurface,
        arena: ResourceArena,
        transform: ConstantBufferView,
    ) -> Self {
        Self {
            surface,
            arena,
            transform,
            last_submission: None,
            ctx,
        }
    }

    pub fn context(&self) -> &GpuContext {
        &self.ctx
    }

    pub fn surface(&self) -> &SwapSurface {
        &self.surface
    }

    pub fn resize(&mut self, size: winit::dpi::PhysicalSize<u32>) {
        self.surface.resize(&self.ctx, size);
    }

    fn missing(what: &str) -> FrameError {
        FrameError::Submission(format!("{what} missing from resource arena"))
    }

    fn encode(&self, batch: &CommandBatch) -> Result<wgpu::CommandBuffer, FrameError> {
        let mut encoder = self
            .ctx
            .device()
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("framedrive frame encoder"),
            });

        let target = batch.commands().iter().find_map(|c| match c {
            Command::SetRenderTarget { back_buffer } => Some(*back_buffer),
            _ => None,
        });
        let clear = batch.commands().iter().find_map(|c| match c {
            Command::ClearRenderTarget { color, .. } => Some(*color),
            _ => None,
        });

        if let Some(index) = target {
            let view = self
                .surface
                .target_view(index)
                .ok_or_else(|| FrameError::Submission(format!("back buffer {index} is not acquired")))?;

            let load = match clear {
                Some([r, g, b, a]) => wgpu::LoadOp::Clear(wgpu::Color {
                    r: r as f64,
                    g: g as f64,
                    b: b as f64,
                    a: a as f64,
                }),
                None => wgpu::LoadOp::Load,
            };

            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("framedrive quad pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load,
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });

            for command in batch.commands() {
                match command {
                    // wgpu tracks image usage itself; barriers were validated at record time.
                    Command::Barrier(b) => {
                        log::trace!("barrier {:?} -> {:?} on {}", b.before, b.after, b.back_buffer)
                    }
                    Command::SetRenderTarget { .. } | Command::ClearRenderTarget { .. } => {}
                    // The layout is baked into the pipeline.
                    Command::SetBindSignature(_) => {}
                    Command::SetPipelineState(p) => {
                        let pipeline = self.arena.pipeline(p.id).ok_or_else(|| Self::missing("pipeline"))?;
                        pass.set_pipeline(pipeline);
                    }
                    Command::SetViewport(v) => {
                        pass.set_viewport(v.x, v.y, v.width, v.height, v.min_depth, v.max_depth)
                    }
                    Command::SetScissorRect(s) => pass.set_scissor_rect(s.x, s.y, s.width, s.height),
                    Command::SetVertexBuffer(v) => {
                        let buffer = self.arena.buffer(v.buffer).ok_or_else(|| Self::missing("vertex buffer"))?;
                        pass.set_vertex_buffer(0, buffer.slice(0..v.size));
                    }
                    Command::SetIndexBuffer(v) => {
                        let buffer = self.arena.buffer(v.buffer).ok_or_else(|| Self::missing("index buffer"))?;
                        pass.set_index_buffer(buffer.slice(0..v.size), v.format);
                    }
                    Command::SetDescriptorTable { slot, table } => {
                        let group = self.arena.table(table.id).ok_or_else(|| Self::missing("descriptor table"))?;
                        pass.set_bind_group(*slot, group, &[]);
                    }
                    Command::DrawIndexed(d) => pass.draw_indexed(
                        d.first_index..d.first_index + d.index_count,
                        d.base_vertex,
                        d.first_instance..d.first_instance + d.instance_count,
                    ),
                }
            }
        }

        Ok(encoder.finish())
    }
}

impl FrameBackend for WgpuBackend {
    fn back_buffer_count(&self) -> usize {
        self.surface.buffer_count()
    }

    fn back_buffer_extent(&self) -> (u32, u32) {
        self.surface.extent()
    }

    fn acquire(&mut self) -> Result<usize, FrameError> {
        self.surface.acquire(&self.ctx)
    }

    fn execute(&mut self, batch: &CommandBatch) -> Result<(), FrameError> {
        let commands = self.encode(batch)?;
        let index = self.ctx.queue().submit(std::iter::once(commands));
        log::trace!("submitted {} commands", batch.len());
        self.last_submission = Some(index);
        Ok(())
    }

    fn signal(&mut self, fence: &Fence, value: u64) -> Result<(), FrameError> {
        let handle = fence.signal_handle();
        self.ctx
            .queue()
            .on_submitted_work_done(move || handle.complete(value));
        Ok(())
    }

    fn wait(
        &mut self,
        fence: &Fence,
        value: u64,
        timeout: Option<Duration>,
    ) -> Result<WaitOutcome, FrameError> {
        let event = fence.event_on_completion(value);

        let poll = self.ctx.device().poll(wgpu::PollType::Wait {
            submission_index: self.last_submission.clone(),
            timeout,
        });
        match poll {
            Ok(_) => {}
            Err(wgpu::PollError::Timeout) => return Ok(WaitOutcome::TimedOut),
            Err(e) => return Err(FrameError::Synchronization(e.to_string())),
        }

        // Polling runs the completion callbacks, so the event is normally already set.
        Ok(event.wait(timeout))
    }

    fn write_transform(&mut self, transform: &TransformUniform) -> Result<(), FrameError> {
        let buffer = self
            .arena
            .buffer(self.transform.buffer)
            .ok_or_else(|| Self::missing("transform buffer"))?;
        self.ctx
            .queue()
            .write_buffer(buffer, 0, bytemuck::bytes_of(transform));
        Ok(())
    }

    fn present(&mut self, index: usize, sync_interval: u32) -> Result<(), FrameError> {
        check_sync_interval(self.surface.present_mode(), sync_interval)?;
        log::trace!("present back buffer {index} (interval {sync_interval})");
        self.surface.present(index)
    }
}

/// The interval is baked into the surface configuration; a frame cannot change it.
fn check_sync_interval(configured: wgpu::PresentMode, sync_interval: u32) -> Result<(), FrameError> {
    let requested = present_mode_for(sync_interval);
    if requested != configured {
        return Err(FrameError::Present(format!(
            "sync interval {sync_interval} needs {requested:?} but the surface presents with {configured:?}"
        )));
    }
    Ok(())
}
