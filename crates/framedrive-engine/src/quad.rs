//! Startup assembly of the textured quad.

use anyhow::{Context, Result};
use bytemuck::{Pod, Zeroable};

use crate::binding::{
    build_signature, create_table, BindSignatureDesc, TableResource, TEXTURE_SLOT, TRANSFORM_SLOT,
};
use crate::config::DriverConfig;
use crate::device::{GpuContext, SwapSurface, WgpuBackend};
use crate::frame::{FrameResources, FrameSequencer, Rotation};
use crate::pipeline::{build_pipeline, PipelineStateDesc, ShaderCompiler, ShaderStage};
use crate::resource::{ImageDecoder, ResourceArena, ResourceUploader};

/// Interleaved vertex matching [`crate::pipeline::InputLayout::position_uv`].
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct QuadVertex {
    pub position: [f32; 3],
    pub uv: [f32; 2],
}

pub const QUAD_VERTICES: [QuadVertex; 4] = [
    QuadVertex {
        position: [-1.0, -1.0, 0.0],
        uv: [0.0, 1.0],
    },
    QuadVertex {
        position: [-1.0, 1.0, 0.0],
        uv: [0.0, 0.0],
    },
    QuadVertex {
        position: [1.0, -1.0, 0.0],
        uv: [1.0, 1.0],
    },
    QuadVertex {
        position: [1.0, 1.0, 0.0],
        uv: [1.0, 0.0],
    },
];

pub const QUAD_INDICES: [u16; 6] = [0, 1, 2, 2, 1, 3];

/// Uploads resources, builds the signature, tables and pipeline, and hands
/// everything to a sequencer backed by wgpu.
pub fn assemble(
    ctx: GpuContext,
    surface: SwapSurface,
    config: &DriverConfig,
    compiler: &dyn ShaderCompiler,
    decoder: &dyn ImageDecoder,
) -> Result<FrameSequencer<WgpuBackend>> {
    let mut arena = ResourceArena::new();

    let (w, h) = surface.extent();
    let initial = Rotation::new(config.sequencer.rotation_step)
        .uniform(&config.sequencer.camera, w as f32 / h.max(1) as f32);

    let image = decoder
        .decode(&config.texture_path)
        .context("failed to load quad texture")?;

    let (vertex_buffer, index_buffer, texture, transform) = {
        let mut up = ResourceUploader::new(&ctx, &mut arena);
        let vb = up.upload_vertices(&QUAD_VERTICES).context("vertex buffer upload failed")?;
        let ib = up.upload_indices(&QUAD_INDICES).context("index buffer upload failed")?;
        let tex = up.upload_texture(&image).context("texture upload failed")?;
        let cb = up
            .create_constant_buffer(&initial)
            .context("transform buffer creation failed")?;
        (vb, ib, tex, cb)
    };

    let signature = build_signature(&ctx, &mut arena, &BindSignatureDesc::textured_quad())
        .context("bind signature creation failed")?;
    let texture_table = create_table(
        &ctx,
        &mut arena,
        signature,
        TEXTURE_SLOT,
        &[TableResource::Texture(texture.id)],
    )
    .context("texture table creation failed")?;
    let transform_table = create_table(
        &ctx,
        &mut arena,
        signature,
        TRANSFORM_SLOT,
        &[TableResource::ConstantBuffer(transform)],
    )
    .context("transform table creation failed")?;

    let vs = compiler
        .compile(&config.shader_path, &config.vertex_entry, ShaderStage::Vertex)
        .context("vertex shader compilation failed")?;
    let ps = compiler
        .compile(&config.shader_path, &config.pixel_entry, ShaderStage::Pixel)
        .context("pixel shader compilation failed")?;

    let pipeline = build_pipeline(
        &ctx,
        &mut arena,
        &PipelineStateDesc::textured_quad(&vs, &ps, signature, surface.format(), texture.format),
    )
    .context("pipeline creation failed")?;

    let resources = FrameResources {
        pipeline,
        signature,
        texture_table,
        transform_table,
        vertex_buffer,
        index_buffer,
    };

    let backend = WgpuBackend::new(ctx, surface, arena, transform);
    FrameSequencer::new(backend, resources, config.sequencer.clone())
        .context("initial transform write failed")
}
