use crate::binding::DescriptorTable;
use crate::pipeline::PipelineHandle;
use crate::resource::{IndexBufferView, SignatureId, VertexBufferView};

use super::ResourceBarrier;

/// Rasterizer viewport in physical pixels.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub min_depth: f32,
    pub max_depth: f32,
}

impl Viewport {
    /// Full-target viewport with the `[0, 1]` depth range.
    pub fn covering(width: u32, height: u32) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: width as f32,
            height: height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct ScissorRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl ScissorRect {
    pub fn covering(width: u32, height: u32) -> Self {
        Self {
            x: 0,
            y: 0,
            width,
            height,
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct DrawIndexed {
    pub index_count: u32,
    pub instance_count: u32,
    pub first_index: u32,
    pub base_vertex: i32,
    pub first_instance: u32,
}

/// One recorded GPU operation.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Barrier(ResourceBarrier),
    SetRenderTarget { back_buffer: usize },
    ClearRenderTarget { back_buffer: usize, color: [f32; 4] },
    SetPipelineState(PipelineHandle),
    SetViewport(Viewport),
    SetScissorRect(ScissorRect),
    SetVertexBuffer(VertexBufferView),
    SetIndexBuffer(IndexBufferView),
    SetBindSignature(SignatureId),
    SetDescriptorTable { slot: u32, table: DescriptorTable },
    DrawIndexed(DrawIndexed),
}

/// A closed sequence of commands ready for the queue.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandBatch {
    commands: Vec<Command>,
}

impl CommandBatch {
    pub(crate) fn push(&mut self, command: Command) {
        self.commands.push(command);
    }

    /// Drops all commands but keeps the allocation.
    pub(crate) fn clear(&mut self) {
        self.commands.clear();
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.commands.capacity()
    }

    /// Returns every recorded barrier in order.
    pub fn barriers(&self) -> impl Iterator<Item = &ResourceBarrier> {
        self.commands.iter().filter_map(|c| match c {
            Command::Barrier(b) => Some(b),
            _ => None,
        })
    }

    /// Returns the descriptor slots in the order they were bound.
    pub fn table_bind_order(&self) -> Vec<u32> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                Command::SetDescriptorTable { slot, .. } => Some(*slot),
                _ => None,
            })
            .collect()
    }
}
