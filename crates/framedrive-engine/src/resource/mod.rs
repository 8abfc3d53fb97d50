//! GPU resources created once at startup.
//!
//! This module is responsible for:
//! - decoding the quad texture from disk
//! - allocating and filling vertex, index, constant buffers and textures
//! - owning every GPU object behind typed ids

mod arena;
mod decode;
mod handle;
mod upload;

pub use arena::ResourceArena;
pub use decode::{DecodeError, DecodedImage, ImageDecoder, ImageMetadata, Rgba8Decoder};
pub use handle::{
    BufferId, ConstantBufferView, IndexBufferView, PipelineId, SignatureId, TableId,
    TextureHandle, TextureId, VertexBufferView,
};
pub use upload::{
    aligned_constant_size, check_buffer, plan_texture_write, ResourceUploader, TextureWrite,
    UploadError, CONSTANT_BUFFER_ALIGNMENT,
};
