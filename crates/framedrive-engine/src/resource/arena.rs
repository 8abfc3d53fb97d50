use crate::binding::BindSignature;

use super::handle::{BufferId, PipelineId, SignatureId, TableId, TextureId};

/// Owner of every GPU object created at startup.
///
/// Objects are addressed by typed ids and released together when the arena drops.
#[derive(Default)]
pub struct ResourceArena {
    buffers: Vec<wgpu::Buffer>,
    textures: Vec<(wgpu::Texture, wgpu::TextureView)>,
    tables: Vec<wgpu::BindGroup>,
    pipelines: Vec<wgpu::RenderPipeline>,
    signatures: Vec<BindSignature>,
}

impl ResourceArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_buffer(&mut self, buffer: wgpu::Buffer) -> BufferId {
        self.buffers.push(buffer);
        BufferId(self.buffers.len() as u32 - 1)
    }

    pub fn insert_texture(&mut self, texture: wgpu::Texture, view: wgpu::TextureView) -> TextureId {
        self.textures.push((texture, view));
        TextureId(self.textures.len() as u32 - 1)
    }

    pub fn insert_table(&mut self, group: wgpu::BindGroup) -> TableId {
        self.tables.push(group);
        TableId(self.tables.len() as u32 - 1)
    }

    pub fn insert_pipeline(&mut self, pipeline: wgpu::RenderPipeline) -> PipelineId {
        self.pipelines.push(pipeline);
        PipelineId(self.pipelines.len() as u32 - 1)
    }

    pub fn insert_signature(&mut self, signature: BindSignature) -> SignatureId {
        self.signatures.push(signature);
        SignatureId(self.signatures.len() as u32 - 1)
    }

    pub fn buffer(&self, id: BufferId) -> Option<&wgpu::Buffer> {
        self.buffers.get(id.0 as usize)
    }

    pub fn texture(&self, id: TextureId) -> Option<&wgpu::Texture> {
        self.textures.get(id.0 as usize).map(|(t, _)| t)
    }

    pub fn texture_view(&self, id: TextureId) -> Option<&wgpu::TextureView> {
        self.textures.get(id.0 as usize).map(|(_, v)| v)
    }

    pub fn table(&self, id: TableId) -> Option<&wgpu::BindGroup> {
        self.tables.get(id.0 as usize)
    }

    pub fn pipeline(&self, id: PipelineId) -> Option<&wgpu::RenderPipeline> {
        self.pipelines.get(id.0 as usize)
    }

    pub fn signature(&self, id: SignatureId) -> Option<&BindSignature> {
        self.signatures.get(id.0 as usize)
    }
}
