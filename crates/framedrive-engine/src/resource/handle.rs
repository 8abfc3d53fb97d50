//! Lightweight handles into the [`super::ResourceArena`].
//!
//! Handles are plain data so they can be recorded into command batches and
//! compared in tests without touching GPU objects.

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct BufferId(pub(crate) u32);

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct TextureId(pub(crate) u32);

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct TableId(pub(crate) u32);

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct PipelineId(pub(crate) u32);

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct SignatureId(pub(crate) u32);

impl SignatureId {
    pub fn raw(self) -> u32 {
        self.0
    }
}

/// Read-only view of an uploaded vertex buffer.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct VertexBufferView {
    pub buffer: BufferId,
    /// Size in bytes of the vertex data.
    pub size: u64,
    /// Bytes per vertex.
    pub stride: u32,
}

impl VertexBufferView {
    pub fn vertex_count(&self) -> u32 {
        if self.stride == 0 {
            return 0;
        }
        (self.size / self.stride as u64) as u32
    }
}

/// Read-only view of an uploaded index buffer.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct IndexBufferView {
    pub buffer: BufferId,
    /// Size in bytes of the index data.
    pub size: u64,
    pub format: wgpu::IndexFormat,
}

impl IndexBufferView {
    pub fn index_count(&self) -> u32 {
        let stride = match self.format {
            wgpu::IndexFormat::Uint16 => 2,
            wgpu::IndexFormat::Uint32 => 4,
        };
        (self.size / stride) as u32
    }
}

/// View of a constant buffer.
///
/// `size` is the allocation size (aligned), `data_size` the bytes the shader reads.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct ConstantBufferView {
    pub buffer: BufferId,
    pub size: u64,
    pub data_size: u64,
}

/// Uploaded texture plus its shape.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct TextureHandle {
    pub id: TextureId,
    pub width: u32,
    pub height: u32,
    pub format: wgpu::TextureFormat,
}
