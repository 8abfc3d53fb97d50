use std::borrow::Cow;

use crate::binding::{BindSignatureDesc, RangeKind, ShaderVisibility, SignatureHandle};
use crate::device::GpuContext;
use crate::resource::{PipelineId, ResourceArena, SignatureId};

use super::shader::{BindingKind, CompiledShader, ShaderStage};

/// Recordable reference to a pipeline and the signature it was built against.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct PipelineHandle {
    pub id: PipelineId,
    pub signature: SignatureId,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PipelineError {
    #[error("{label} is a {actual:?} shader, expected {expected:?}")]
    StageMismatch {
        label: String,
        expected: ShaderStage,
        actual: ShaderStage,
    },

    #[error("vertex input at location {location} is not declared in the input layout")]
    MissingInput { location: u32 },

    #[error("vertex input at location {location}: shader reads {shader:?}, layout supplies {layout:?}")]
    InputFormat {
        location: u32,
        shader: Option<wgpu::VertexFormat>,
        layout: wgpu::VertexFormat,
    },

    #[error("{stage:?} shader binds group {group} binding {binding}, which the signature does not declare")]
    UnboundResource {
        stage: ShaderStage,
        group: u32,
        binding: u32,
    },

    #[error("group {group} binding {binding}: shader expects {shader:?}, signature declares another kind")]
    KindMismatch {
        group: u32,
        binding: u32,
        shader: BindingKind,
    },

    #[error("group {group} binding {binding} is not visible to the {stage:?} stage")]
    Visibility {
        stage: ShaderStage,
        group: u32,
        binding: u32,
    },

    #[error("render target format {target:?} is not compatible with texture format {texture:?}")]
    FormatMismatch {
        target: wgpu::TextureFormat,
        texture: wgpu::TextureFormat,
    },

    #[error("pixel shader writes {output:?} to a {target:?} render target, which expects floats")]
    OutputKind {
        target: wgpu::TextureFormat,
        output: Option<naga::ScalarKind>,
    },

    #[error("multisampling is not supported (sample count {0})")]
    Multisample(u32),

    #[error("signature {0:?} not found")]
    UnknownSignature(SignatureId),

    #[error("device rejected the pipeline: {0}")]
    Device(String),
}

/// One vertex attribute.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct InputElement {
    pub location: u32,
    pub format: wgpu::VertexFormat,
    pub offset: u64,
}

/// Layout of the single interleaved vertex stream.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct InputLayout {
    pub stride: u64,
    pub elements: Vec<InputElement>,
}

impl InputLayout {
    /// 3-float position at location 0 followed by a 2-float texture coordinate.
    pub fn position_uv() -> Self {
        Self {
            stride: 20,
            elements: vec![
                InputElement {
                    location: 0,
                    format: wgpu::VertexFormat::Float32x3,
                    offset: 0,
                },
                InputElement {
                    location: 1,
                    format: wgpu::VertexFormat::Float32x2,
                    offset: 12,
                },
            ],
        }
    }

    fn attributes(&self) -> Vec<wgpu::VertexAttribute> {
        self.elements
            .iter()
            .map(|e| wgpu::VertexAttribute {
                format: e.format,
                offset: e.offset,
                shader_location: e.location,
            })
            .collect()
    }
}

/// Everything a pipeline is built from.
#[derive(Debug)]
pub struct PipelineStateDesc<'a> {
    pub vertex: &'a CompiledShader,
    pub pixel: &'a CompiledShader,
    pub input_layout: InputLayout,
    pub topology: wgpu::PrimitiveTopology,
    pub cull_mode: Option<wgpu::Face>,
    pub polygon_mode: wgpu::PolygonMode,
    pub sample_count: u32,
    pub blend: Option<wgpu::BlendState>,
    pub render_target_format: wgpu::TextureFormat,
    pub texture_format: wgpu::TextureFormat,
    pub signature: SignatureHandle,
}

impl<'a> PipelineStateDesc<'a> {
    /// Strip-topology quad: no culling, solid fill, single sample, no blending.
    pub fn textured_quad(
        vertex: &'a CompiledShader,
        pixel: &'a CompiledShader,
        signature: SignatureHandle,
        render_target_format: wgpu::TextureFormat,
        texture_format: wgpu::TextureFormat,
    ) -> Self {
        Self {
            vertex,
            pixel,
            input_layout: InputLayout::position_uv(),
            topology: wgpu::PrimitiveTopology::TriangleStrip,
            cull_mode: None,
            polygon_mode: wgpu::PolygonMode::Fill,
            sample_count: 1,
            blend: None,
            render_target_format,
            texture_format,
            signature,
        }
    }

    /// Checks shaders, input layout, formats and signature against each other.
    pub fn validate(&self, signature: &BindSignatureDesc) -> Result<(), PipelineError> {
        for (shader, expected) in [(self.vertex, ShaderStage::Vertex), (self.pixel, ShaderStage::Pixel)] {
            if shader.stage() != expected {
                return Err(PipelineError::StageMismatch {
                    label: shader.label().to_string(),
                    expected,
                    actual: shader.stage(),
                });
            }
        }

        if self.sample_count != 1 {
            return Err(PipelineError::Multisample(self.sample_count));
        }

        for input in self.vertex.vertex_inputs() {
            let element = self
                .input_layout
                .elements
                .iter()
                .find(|e| e.location == input.location)
                .ok_or(PipelineError::MissingInput {
                    location: input.location,
                })?;
            if input.format != Some(element.format) {
                return Err(PipelineError::InputFormat {
                    location: input.location,
                    shader: input.format,
                    layout: element.format,
                });
            }
        }

        for shader in [self.vertex, self.pixel] {
            check_bindings(shader, signature)?;
        }

        if !formats_compatible(self.render_target_format, self.texture_format) {
            return Err(PipelineError::FormatMismatch {
                target: self.render_target_format,
                texture: self.texture_format,
            });
        }

        let output = self.pixel.color_output_kind();
        if output != Some(naga::ScalarKind::Float) {
            return Err(PipelineError::OutputKind {
                target: self.render_target_format,
                output,
            });
        }

        Ok(())
    }

    fn strip_index_format(&self) -> Option<wgpu::IndexFormat> {
        match self.topology {
            wgpu::PrimitiveTopology::TriangleStrip | wgpu::PrimitiveTopology::LineStrip => {
                Some(wgpu::IndexFormat::Uint16)
            }
            _ => None,
        }
    }
}

fn check_bindings(shader: &CompiledShader, signature: &BindSignatureDesc) -> Result<(), PipelineError> {
    let stage = shader.stage();
    let wanted = match stage {
        ShaderStage::Vertex => ShaderVisibility::Vertex,
        ShaderStage::Pixel => ShaderVisibility::Pixel,
    };
    let visible = |v: ShaderVisibility| v == ShaderVisibility::All || v == wanted;

    for b in shader.bindings() {
        let unbound = PipelineError::UnboundResource {
            stage,
            group: b.group,
            binding: b.binding,
        };
        let Some(table) = signature.tables.get(b.group as usize) else {
            return Err(unbound);
        };

        let range = table
            .ranges
            .iter()
            .find(|r| b.binding >= r.binding && b.binding - r.binding < r.count);
        let sampler = signature
            .samplers
            .iter()
            .find(|s| s.table == b.group && s.binding == b.binding);

        let (declared_visibility, compatible) = match (range, sampler) {
            (Some(r), _) => (
                table.visibility,
                matches!(
                    (b.kind, r.kind),
                    (BindingKind::Texture, RangeKind::ShaderResource)
                        | (BindingKind::ConstantBuffer, RangeKind::ConstantBuffer)
                ),
            ),
            (None, Some(s)) => (s.visibility, b.kind == BindingKind::Sampler),
            (None, None) => return Err(unbound),
        };

        if !compatible {
            return Err(PipelineError::KindMismatch {
                group: b.group,
                binding: b.binding,
                shader: b.kind,
            });
        }
        if !visible(declared_visibility) {
            return Err(PipelineError::Visibility {
                stage,
                group: b.group,
                binding: b.binding,
            });
        }
    }
    Ok(())
}

/// Render target must be a 4-channel 8-bit normalized color format with the
/// texture's texel size.
pub fn formats_compatible(target: wgpu::TextureFormat, texture: wgpu::TextureFormat) -> bool {
    use wgpu::TextureFormat as F;
    let four_by_eight = matches!(
        target,
        F::Rgba8Unorm | F::Rgba8UnormSrgb | F::Bgra8Unorm | F::Bgra8UnormSrgb
    );
    four_by_eight && target.block_copy_size(None) == texture.block_copy_size(None)
}

/// Validates `desc` and creates an immutable render pipeline in the arena.
pub fn build_pipeline(
    ctx: &GpuContext,
    arena: &mut ResourceArena,
    desc: &PipelineStateDesc<'_>,
) -> Result<PipelineHandle, PipelineError> {
    let pipeline = {
        let signature = arena
            .signature(desc.signature.id)
            .ok_or(PipelineError::UnknownSignature(desc.signature.id))?;
        desc.validate(signature.desc())?;

        ctx.capture_validation(|device| {
            let vs = device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(desc.vertex.label()),
                source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(desc.vertex.source())),
            });
            let fs = device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(desc.pixel.label()),
                source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(desc.pixel.source())),
            });

            let attributes = desc.input_layout.attributes();

            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("framedrive quad pipeline"),
                layout: Some(signature.pipeline_layout()),
                vertex: wgpu::VertexState {
                    module: &vs,
                    entry_point: Some(desc.vertex.entry_point()),
                    compilation_options: Default::default(),
                    buffers: &[wgpu::VertexBufferLayout {
                        array_stride: desc.input_layout.stride,
                        step_mode: wgpu::VertexStepMode::Vertex,
                        attributes: &attributes,
                    }],
                },
                fragment: Some(wgpu::FragmentState {
                    module: &fs,
                    entry_point: Some(desc.pixel.entry_point()),
                    compilation_options: Default::default(),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: desc.render_target_format,
                        blend: desc.blend,
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                }),
                primitive: wgpu::PrimitiveState {
                    topology: desc.topology,
                    strip_index_format: desc.strip_index_format(),
                    front_face: wgpu::FrontFace::Ccw,
                    cull_mode: desc.cull_mode,
                    polygon_mode: desc.polygon_mode,
                    unclipped_depth: false,
                    conservative: false,
                },
                depth_stencil: None,
                multisample: wgpu::MultisampleState {
                    count: desc.sample_count,
                    mask: !0,
                    alpha_to_coverage_enabled: false,
                },
                multiview_mask: None,
                cache: None,
            })
        })
        .map_err(PipelineError::Device)?
    };

    let id = arena.insert_pipeline(pipeline);
    log::info!(
        "pipeline {id:?} built ({:?}, target {:?})",
        desc.topology,
        desc.render_target_format
    );
    Ok(PipelineHandle {
        id,
        signature: desc.signature.id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::shader::tests::{quad_shader, QUAD_WGSL};
    use crate::pipeline::shader::compile_source;
    use crate::binding::build_signature;
    use crate::resource::SignatureId;

    fn signature() -> SignatureHandle {
        SignatureHandle {
            id: SignatureId(0),
            table_count: 2,
        }
    }

    fn shaders() -> (CompiledShader, CompiledShader) {
        (
            quad_shader("vs_main", ShaderStage::Vertex),
            quad_shader("fs_main", ShaderStage::Pixel),
        )
    }

    #[test]
    fn quad_pipeline_validates() {
        let (vs, fs) = shaders();
        let desc = PipelineStateDesc::textured_quad(
            &vs,
            &fs,
            signature(),
            wgpu::TextureFormat::Bgra8Unorm,
            wgpu::TextureFormat::Rgba8Unorm,
        );
        assert_eq!(desc.topology, wgpu::PrimitiveTopology::TriangleStrip);
        assert_eq!(desc.strip_index_format(), Some(wgpu::IndexFormat::Uint16));
        assert_eq!(desc.cull_mode, None);
        assert_eq!(desc.blend, None);
        desc.validate(&BindSignatureDesc::textured_quad()).unwrap();
    }

    #[test]
    fn missing_input_location_fails() {
        let (vs, fs) = shaders();
        let mut desc = PipelineStateDesc::textured_quad(
            &vs,
            &fs,
            signature(),
            wgpu::TextureFormat::Rgba8Unorm,
            wgpu::TextureFormat::Rgba8Unorm,
        );
        desc.input_layout.elements.pop();
        assert_eq!(
            desc.validate(&BindSignatureDesc::textured_quad()),
            Err(PipelineError::MissingInput { location: 1 })
        );
    }

    #[test]
    fn input_format_must_match() {
        let (vs, fs) = shaders();
        let mut desc = PipelineStateDesc::textured_quad(
            &vs,
            &fs,
            signature(),
            wgpu::TextureFormat::Rgba8Unorm,
            wgpu::TextureFormat::Rgba8Unorm,
        );
        desc.input_layout.elements[0].format = wgpu::VertexFormat::Float32x4;
        assert!(matches!(
            desc.validate(&BindSignatureDesc::textured_quad()),
            Err(PipelineError::InputFormat { location: 0, .. })
        ));
    }

    #[test]
    fn shader_binding_missing_from_signature_fails() {
        let (vs, fs) = shaders();
        let desc = PipelineStateDesc::textured_quad(
            &vs,
            &fs,
            signature(),
            wgpu::TextureFormat::Rgba8Unorm,
            wgpu::TextureFormat::Rgba8Unorm,
        );
        let mut sig = BindSignatureDesc::textured_quad();
        sig.tables.pop();
        assert_eq!(
            desc.validate(&sig),
            Err(PipelineError::UnboundResource {
                stage: ShaderStage::Vertex,
                group: 1,
                binding: 0
            })
        );
    }

    #[test]
    fn binding_kind_must_match() {
        let (vs, fs) = shaders();
        let desc = PipelineStateDesc::textured_quad(
            &vs,
            &fs,
            signature(),
            wgpu::TextureFormat::Rgba8Unorm,
            wgpu::TextureFormat::Rgba8Unorm,
        );
        let mut sig = BindSignatureDesc::textured_quad();
        sig.tables[1].ranges[0].kind = RangeKind::ShaderResource;
        assert!(matches!(
            desc.validate(&sig),
            Err(PipelineError::KindMismatch {
                group: 1,
                binding: 0,
                shader: BindingKind::ConstantBuffer
            })
        ));
    }

    #[test]
    fn binding_must_be_visible_to_its_stage() {
        let (vs, fs) = shaders();
        let desc = PipelineStateDesc::textured_quad(
            &vs,
            &fs,
            signature(),
            wgpu::TextureFormat::Rgba8Unorm,
            wgpu::TextureFormat::Rgba8Unorm,
        );
        let mut sig = BindSignatureDesc::textured_quad();
        sig.tables[1].visibility = ShaderVisibility::Pixel;
        assert_eq!(
            desc.validate(&sig),
            Err(PipelineError::Visibility {
                stage: ShaderStage::Vertex,
                group: 1,
                binding: 0
            })
        );
    }

    #[test]
    fn swapped_stages_are_rejected() {
        let (vs, fs) = shaders();
        let desc = PipelineStateDesc::textured_quad(
            &fs,
            &vs,
            signature(),
            wgpu::TextureFormat::Rgba8Unorm,
            wgpu::TextureFormat::Rgba8Unorm,
        );
        assert!(matches!(
            desc.validate(&BindSignatureDesc::textured_quad()),
            Err(PipelineError::StageMismatch { expected: ShaderStage::Vertex, .. })
        ));
    }

    #[test]
    fn multisampling_is_rejected() {
        let (vs, fs) = shaders();
        let mut desc = PipelineStateDesc::textured_quad(
            &vs,
            &fs,
            signature(),
            wgpu::TextureFormat::Rgba8Unorm,
            wgpu::TextureFormat::Rgba8Unorm,
        );
        desc.sample_count = 4;
        assert_eq!(
            desc.validate(&BindSignatureDesc::textured_quad()),
            Err(PipelineError::Multisample(4))
        );
    }

    #[test]
    fn render_target_format_rules() {
        use wgpu::TextureFormat as F;
        assert!(formats_compatible(F::Rgba8Unorm, F::Rgba8Unorm));
        assert!(formats_compatible(F::Bgra8Unorm, F::Rgba8Unorm));
        assert!(formats_compatible(F::Rgba8UnormSrgb, F::Rgba8Unorm));
        assert!(!formats_compatible(F::Rgba16Float, F::Rgba8Unorm));
        assert!(!formats_compatible(F::R8Unorm, F::R8Unorm));
        assert!(!formats_compatible(F::Rgba8Unorm, F::Rgba16Float));
        assert!(!formats_compatible(F::Rgba8Uint, F::Rgba8Unorm));
        assert!(!formats_compatible(F::Rgba8Sint, F::Rgba8Unorm));
    }

    #[test]
    fn integer_target_fails_validation() {
        let (vs, fs) = shaders();
        let desc = PipelineStateDesc::textured_quad(
            &vs,
            &fs,
            signature(),
            wgpu::TextureFormat::Rgba8Uint,
            wgpu::TextureFormat::Rgba8Unorm,
        );
        assert_eq!(
            desc.validate(&BindSignatureDesc::textured_quad()),
            Err(PipelineError::FormatMismatch {
                target: wgpu::TextureFormat::Rgba8Uint,
                texture: wgpu::TextureFormat::Rgba8Unorm,
            })
        );
    }

    #[test]
    fn integer_pixel_output_fails_validation() {
        let src = QUAD_WGSL.replace(
            "-> @location(0) vec4<f32> {\n    return textureSample(quad_texture, quad_sampler, in.uv);",
            "-> @location(0) vec4<u32> {\n    return vec4<u32>(textureSample(quad_texture, quad_sampler, in.uv) * 255.0);",
        );
        let vs = quad_shader("vs_main", ShaderStage::Vertex);
        let fs = compile_source("quad.wgsl", src, "fs_main", ShaderStage::Pixel).unwrap();
        let desc = PipelineStateDesc::textured_quad(
            &vs,
            &fs,
            signature(),
            wgpu::TextureFormat::Rgba8Unorm,
            wgpu::TextureFormat::Rgba8Unorm,
        );
        assert_eq!(
            desc.validate(&BindSignatureDesc::textured_quad()),
            Err(PipelineError::OutputKind {
                target: wgpu::TextureFormat::Rgba8Unorm,
                output: Some(naga::ScalarKind::Uint),
            })
        );
    }

    #[test]
    fn incompatible_target_fails_validation() {
        let (vs, fs) = shaders();
        let desc = PipelineStateDesc::textured_quad(
            &vs,
            &fs,
            signature(),
            wgpu::TextureFormat::Rgba16Float,
            wgpu::TextureFormat::Rgba8Unorm,
        );
        assert!(matches!(
            desc.validate(&BindSignatureDesc::textured_quad()),
            Err(PipelineError::FormatMismatch { .. })
        ));
    }

    #[test]
    fn unused_globals_do_not_need_bindings() {
        let src = QUAD_WGSL.replace(
            "@group(1) @binding(0) var<uniform> transform: Transform;",
            "@group(1) @binding(0) var<uniform> transform: Transform;\n@group(3) @binding(7) var<uniform> unused: Transform;",
        );
        let vs = compile_source("quad.wgsl", src.clone(), "vs_main", ShaderStage::Vertex).unwrap();
        let fs = compile_source("quad.wgsl", src, "fs_main", ShaderStage::Pixel).unwrap();
        let desc = PipelineStateDesc::textured_quad(
            &vs,
            &fs,
            signature(),
            wgpu::TextureFormat::Rgba8Unorm,
            wgpu::TextureFormat::Rgba8Unorm,
        );
        assert!(desc.validate(&BindSignatureDesc::textured_quad()).is_ok());
    }

    #[test]
    fn quad_pipeline_builds_on_a_device() {
        let ctx = crate::device::noop_context();
        let mut arena = ResourceArena::new();
        let sig = build_signature(&ctx, &mut arena, &BindSignatureDesc::textured_quad()).unwrap();
        let (vs, fs) = shaders();
        let desc = PipelineStateDesc::textured_quad(
            &vs,
            &fs,
            sig,
            wgpu::TextureFormat::Rgba8Unorm,
            wgpu::TextureFormat::Rgba8Unorm,
        );
        let handle = build_pipeline(&ctx, &mut arena, &desc).unwrap();
        assert_eq!(handle.signature, sig.id);
        assert!(arena.pipeline(handle.id).is_some());
    }

    #[test]
    fn device_rejection_is_an_error_not_a_panic() {
        let ctx = crate::device::noop_context();
        let mut arena = ResourceArena::new();
        let sig = build_signature(&ctx, &mut arena, &BindSignatureDesc::textured_quad()).unwrap();
        let (vs, fs) = shaders();
        let mut desc = PipelineStateDesc::textured_quad(
            &vs,
            &fs,
            sig,
            wgpu::TextureFormat::Rgba8Unorm,
            wgpu::TextureFormat::Rgba8Unorm,
        );
        // Line fill needs a device feature that is never requested.
        desc.polygon_mode = wgpu::PolygonMode::Line;
        assert!(desc.validate(&BindSignatureDesc::textured_quad()).is_ok());

        let err = build_pipeline(&ctx, &mut arena, &desc).unwrap_err();
        assert!(matches!(err, PipelineError::Device(_)));
    }
}
