//! Shader compilation and pipeline state construction.
//!
//! All compatibility checks between shaders, input layout, bind signature and
//! formats run when the pipeline is built; draws never re-validate them.

mod shader;
mod state;

pub use shader::{
    compile_source, BindingKind, CompiledShader, ShaderBinding, ShaderCompiler, ShaderError,
    ShaderStage, VertexInput, WgslCompiler,
};
pub use state::{
    build_pipeline, formats_compatible, InputElement, InputLayout, PipelineError, PipelineHandle,
    PipelineStateDesc,
};
