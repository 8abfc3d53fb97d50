use std::path::{Path, PathBuf};

use naga::valid::{Capabilities, ValidationFlags, Validator};

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ShaderStage {
    Vertex,
    Pixel,
}

impl ShaderStage {
    fn matches(self, stage: naga::ShaderStage) -> bool {
        matches!(
            (self, stage),
            (ShaderStage::Vertex, naga::ShaderStage::Vertex)
                | (ShaderStage::Pixel, naga::ShaderStage::Fragment)
        )
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ShaderError {
    #[error("failed to read shader {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("shader {label} failed to parse:\n{message}")]
    Parse { label: String, message: String },

    #[error("shader {label} failed validation: {message}")]
    Validation { label: String, message: String },

    #[error("shader {label} has no entry point '{entry}'")]
    MissingEntryPoint { label: String, entry: String },

    #[error("entry point '{entry}' in {label} is not a {expected:?} stage")]
    WrongStage {
        label: String,
        entry: String,
        expected: ShaderStage,
    },
}

/// Kind of a resource a shader binds.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum BindingKind {
    Texture,
    Sampler,
    ConstantBuffer,
    /// Storage buffers, storage textures and anything else the signature cannot express.
    Unsupported,
}

/// Resource referenced by an entry point.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct ShaderBinding {
    pub group: u32,
    pub binding: u32,
    pub kind: BindingKind,
}

/// Vertex-stage input at a location; `format` is `None` when it has no vertex format.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct VertexInput {
    pub location: u32,
    pub format: Option<wgpu::VertexFormat>,
}

/// Parsed and validated shader plus the entry point selected for one stage.
pub struct CompiledShader {
    label: String,
    source: String,
    module: naga::Module,
    info: naga::valid::ModuleInfo,
    entry_index: usize,
    stage: ShaderStage,
}

impl std::fmt::Debug for CompiledShader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledShader")
            .field("label", &self.label)
            .field("entry_point", &self.entry_point())
            .field("stage", &self.stage)
            .finish()
    }
}

impl CompiledShader {
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn stage(&self) -> ShaderStage {
        self.stage
    }

    pub fn entry_point(&self) -> &str {
        &self.module.entry_points[self.entry_index].name
    }

    /// Located inputs of the entry point, struct members flattened.
    pub fn vertex_inputs(&self) -> Vec<VertexInput> {
        let ep = &self.module.entry_points[self.entry_index];
        let mut out = Vec::new();
        for arg in &ep.function.arguments {
            match (&arg.binding, &self.module.types[arg.ty].inner) {
                (Some(binding), inner) => push_location(&mut out, binding, inner),
                (None, naga::TypeInner::Struct { members, .. }) => {
                    for m in members {
                        if let Some(binding) = &m.binding {
                            push_location(&mut out, binding, &self.module.types[m.ty].inner);
                        }
                    }
                }
                (None, _) => {}
            }
        }
        out.sort_by_key(|i| i.location);
        out
    }

    /// Resources the entry point actually uses.
    pub fn bindings(&self) -> Vec<ShaderBinding> {
        let func = self.info.get_entry_point(self.entry_index);
        let mut out = Vec::new();
        for (handle, var) in self.module.global_variables.iter() {
            let Some(rb) = &var.binding else {
                continue;
            };
            if func[handle].is_empty() {
                continue;
            }
            let kind = match (var.space, &self.module.types[var.ty].inner) {
                (naga::AddressSpace::Uniform, _) => BindingKind::ConstantBuffer,
                (naga::AddressSpace::Handle, naga::TypeInner::Sampler { .. }) => BindingKind::Sampler,
                (
                    naga::AddressSpace::Handle,
                    naga::TypeInner::Image {
                        class: naga::ImageClass::Sampled { .. },
                        ..
                    },
                ) => BindingKind::Texture,
                _ => BindingKind::Unsupported,
            };
            out.push(ShaderBinding {
                group: rb.group,
                binding: rb.binding,
                kind,
            });
        }
        out
    }

    /// Scalar kind written to color location 0, if the entry point writes one.
    pub fn color_output_kind(&self) -> Option<naga::ScalarKind> {
        let result = self.module.entry_points[self.entry_index].function.result.as_ref()?;
        let at_zero = |b: &Option<naga::Binding>| {
            matches!(b, Some(naga::Binding::Location { location: 0, .. }))
        };
        let ty = if at_zero(&result.binding) {
            result.ty
        } else {
            match &self.module.types[result.ty].inner {
                naga::TypeInner::Struct { members, .. } => {
                    members.iter().find(|m| at_zero(&m.binding))?.ty
                }
                _ => return None,
            }
        };
        match &self.module.types[ty].inner {
            naga::TypeInner::Scalar(s) => Some(s.kind),
            naga::TypeInner::Vector { scalar, .. } => Some(scalar.kind),
            _ => None,
        }
    }
}

fn push_location(out: &mut Vec<VertexInput>, binding: &naga::Binding, inner: &naga::TypeInner) {
    if let naga::Binding::Location { location, .. } = binding {
        out.push(VertexInput {
            location: *location,
            format: vertex_format(inner),
        });
    }
}

fn vertex_format(inner: &naga::TypeInner) -> Option<wgpu::VertexFormat> {
    use naga::{ScalarKind, TypeInner, VectorSize};
    match inner {
        TypeInner::Scalar(s) if s.kind == ScalarKind::Float && s.width == 4 => {
            Some(wgpu::VertexFormat::Float32)
        }
        TypeInner::Vector { size, scalar } if scalar.kind == ScalarKind::Float && scalar.width == 4 => {
            Some(match size {
                VectorSize::Bi => wgpu::VertexFormat::Float32x2,
                VectorSize::Tri => wgpu::VertexFormat::Float32x3,
                VectorSize::Quad => wgpu::VertexFormat::Float32x4,
            })
        }
        _ => None,
    }
}

/// Turns shader source into a [`CompiledShader`] for one stage.
pub trait ShaderCompiler {
    fn compile(
        &self,
        path: &Path,
        entry_point: &str,
        stage: ShaderStage,
    ) -> Result<CompiledShader, ShaderError>;
}

/// WGSL front end backed by naga.
#[derive(Debug, Default, Copy, Clone)]
pub struct WgslCompiler;

impl ShaderCompiler for WgslCompiler {
    fn compile(
        &self,
        path: &Path,
        entry_point: &str,
        stage: ShaderStage,
    ) -> Result<CompiledShader, ShaderError> {
        let source = std::fs::read_to_string(path).map_err(|source| ShaderError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let shader = compile_source(&path.display().to_string(), source, entry_point, stage)?;
        log::info!("compiled {}::{entry_point} ({stage:?})", path.display());
        Ok(shader)
    }
}

/// Parses, validates and selects `entry_point` from WGSL text.
pub fn compile_source(
    label: &str,
    source: String,
    entry_point: &str,
    stage: ShaderStage,
) -> Result<CompiledShader, ShaderError> {
    let module = naga::front::wgsl::parse_str(&source).map_err(|e| ShaderError::Parse {
        label: label.to_string(),
        message: e.emit_to_string(&source),
    })?;

    let info = Validator::new(ValidationFlags::all(), Capabilities::all())
        .validate(&module)
        .map_err(|e| ShaderError::Validation {
            label: label.to_string(),
            message: e.as_inner().to_string(),
        })?;

    let entry_index = module
        .entry_points
        .iter()
        .position(|ep| ep.name == entry_point)
        .ok_or_else(|| ShaderError::MissingEntryPoint {
            label: label.to_string(),
            entry: entry_point.to_string(),
        })?;

    if !stage.matches(module.entry_points[entry_index].stage) {
        return Err(ShaderError::WrongStage {
            label: label.to_string(),
            entry: entry_point.to_string(),
            expected: stage,
        });
    }

    Ok(CompiledShader {
        label: label.to_string(),
        source,
        module,
        info,
        entry_index,
        stage,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) const QUAD_WGSL: &str = r#"
struct Transform {
    world: mat4x4<f32>,
    view_proj: mat4x4<f32>,
};

@group(0) @binding(0) var quad_texture: texture_2d<f32>;
@group(0) @binding(1) var quad_sampler: sampler;
@group(1) @binding(0) var<uniform> transform: Transform;

struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) uv: vec2<f32>,
};

struct VertexOutput {
    @builtin(position) clip: vec4<f32>,
    @location(0) uv: vec2<f32>,
};

@vertex
fn vs_main(in: VertexInput) -> VertexOutput {
    var out: VertexOutput;
    out.clip = transform.view_proj * transform.world * vec4<f32>(in.position, 1.0);
    out.uv = in.uv;
    return out;
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    return textureSample(quad_texture, quad_sampler, in.uv);
}
"#;

    pub(crate) fn quad_shader(entry: &str, stage: ShaderStage) -> CompiledShader {
        compile_source("quad.wgsl", QUAD_WGSL.to_string(), entry, stage).unwrap()
    }

    #[test]
    fn vertex_inputs_are_reflected() {
        let vs = quad_shader("vs_main", ShaderStage::Vertex);
        assert_eq!(vs.entry_point(), "vs_main");
        assert_eq!(
            vs.vertex_inputs(),
            vec![
                VertexInput {
                    location: 0,
                    format: Some(wgpu::VertexFormat::Float32x3)
                },
                VertexInput {
                    location: 1,
                    format: Some(wgpu::VertexFormat::Float32x2)
                },
            ]
        );
    }

    #[test]
    fn bindings_are_per_entry_point() {
        let vs = quad_shader("vs_main", ShaderStage::Vertex);
        assert_eq!(
            vs.bindings(),
            vec![ShaderBinding {
                group: 1,
                binding: 0,
                kind: BindingKind::ConstantBuffer
            }]
        );

        let fs = quad_shader("fs_main", ShaderStage::Pixel);
        let mut b = fs.bindings();
        b.sort_by_key(|b| (b.group, b.binding));
        assert_eq!(
            b,
            vec![
                ShaderBinding {
                    group: 0,
                    binding: 0,
                    kind: BindingKind::Texture
                },
                ShaderBinding {
                    group: 0,
                    binding: 1,
                    kind: BindingKind::Sampler
                },
            ]
        );
    }

    #[test]
    fn color_output_kind_is_reflected() {
        let fs = quad_shader("fs_main", ShaderStage::Pixel);
        assert_eq!(fs.color_output_kind(), Some(naga::ScalarKind::Float));

        let uint = QUAD_WGSL.replace(
            "-> @location(0) vec4<f32> {\n    return textureSample(quad_texture, quad_sampler, in.uv);",
            "-> @location(0) vec4<u32> {\n    return vec4<u32>(textureSample(quad_texture, quad_sampler, in.uv) * 255.0);",
        );
        let fs = compile_source("quad.wgsl", uint, "fs_main", ShaderStage::Pixel).unwrap();
        assert_eq!(fs.color_output_kind(), Some(naga::ScalarKind::Uint));
    }

    #[test]
    fn missing_entry_point_is_reported() {
        let err = compile_source("quad.wgsl", QUAD_WGSL.to_string(), "main", ShaderStage::Vertex)
            .unwrap_err();
        assert!(matches!(err, ShaderError::MissingEntryPoint { ref entry, .. } if entry == "main"));
    }

    #[test]
    fn stage_must_match_entry_point() {
        let err = compile_source("quad.wgsl", QUAD_WGSL.to_string(), "fs_main", ShaderStage::Vertex)
            .unwrap_err();
        assert!(matches!(err, ShaderError::WrongStage { expected: ShaderStage::Vertex, .. }));
    }

    #[test]
    fn syntax_errors_carry_diagnostics() {
        let err = compile_source("bad.wgsl", "fn vs_main( {".to_string(), "vs_main", ShaderStage::Vertex)
            .unwrap_err();
        match err {
            ShaderError::Parse { label, message } => {
                assert_eq!(label, "bad.wgsl");
                assert!(!message.is_empty());
            }
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn unreadable_file_is_an_io_error() {
        let err = WgslCompiler
            .compile(Path::new("missing/quad.wgsl"), "vs_main", ShaderStage::Vertex)
            .unwrap_err();
        assert!(matches!(err, ShaderError::Io { .. }));
    }
}
