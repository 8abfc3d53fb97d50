use bytemuck::Pod;
use wgpu::util::DeviceExt;

use crate::device::GpuContext;

use super::arena::ResourceArena;
use super::decode::DecodedImage;
use super::handle::{
    BufferId, ConstantBufferView, IndexBufferView, TextureHandle, VertexBufferView,
};

/// Constant buffers are allocated in multiples of this many bytes.
pub const CONSTANT_BUFFER_ALIGNMENT: u64 = 256;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum UploadError {
    #[error("{what}: {requested} bytes requested, device limit is {limit}")]
    Allocation {
        what: &'static str,
        requested: u64,
        limit: u64,
    },

    #[error("{len} bytes do not fit a buffer of {target} bytes")]
    Overflow { len: u64, target: u64 },

    #[error("texture row pitch {row_pitch} does not match {width} px * {bytes_per_pixel} B")]
    RowPitch {
        row_pitch: u32,
        width: u32,
        bytes_per_pixel: u32,
    },

    #[error("texture data is {actual} bytes, expected row pitch * height = {expected}")]
    TotalSize { actual: u64, expected: u64 },

    #[error("texture format {0:?} has no fixed texel size")]
    UnsupportedFormat(wgpu::TextureFormat),

    #[error("texture arrays are not supported (array size {0})")]
    ArraySize(u32),

    #[error("device rejected the upload: {0}")]
    Device(String),
}

/// Rounds `size` up to [`CONSTANT_BUFFER_ALIGNMENT`].
pub fn aligned_constant_size(size: u64) -> u64 {
    size.max(1).div_ceil(CONSTANT_BUFFER_ALIGNMENT) * CONSTANT_BUFFER_ALIGNMENT
}

/// Checks a buffer request against its target size and the device limit.
pub fn check_buffer(len: u64, target: u64, max_buffer_size: u64) -> Result<(), UploadError> {
    if target > max_buffer_size {
        return Err(UploadError::Allocation {
            what: "buffer",
            requested: target,
            limit: max_buffer_size,
        });
    }
    if len > target {
        return Err(UploadError::Overflow { len, target });
    }
    Ok(())
}

/// Layout handed to the direct texture write.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct TextureWrite {
    pub row_pitch: u32,
    pub rows: u32,
    pub total_size: u64,
}

/// Validates a decoded image against its own metadata and the device's 2D limit.
pub fn plan_texture_write(
    image: &DecodedImage,
    max_dimension: u32,
) -> Result<TextureWrite, UploadError> {
    let meta = &image.metadata;

    if meta.array_size != 1 {
        return Err(UploadError::ArraySize(meta.array_size));
    }

    let largest = meta.width.max(meta.height);
    if largest > max_dimension {
        return Err(UploadError::Allocation {
            what: "texture dimension",
            requested: largest as u64,
            limit: max_dimension as u64,
        });
    }

    let bytes_per_pixel = meta
        .format
        .block_copy_size(None)
        .ok_or(UploadError::UnsupportedFormat(meta.format))?;

    if image.row_pitch != meta.width * bytes_per_pixel {
        return Err(UploadError::RowPitch {
            row_pitch: image.row_pitch,
            width: meta.width,
            bytes_per_pixel,
        });
    }

    let expected = image.row_pitch as u64 * meta.height as u64;
    let actual = image.pixels.len() as u64;
    if actual != expected || image.slice_pitch as u64 != expected {
        return Err(UploadError::TotalSize { actual, expected });
    }

    Ok(TextureWrite {
        row_pitch: image.row_pitch,
        rows: meta.height,
        total_size: expected,
    })
}

/// Creates GPU buffers and textures and fills them from CPU memory.
pub struct ResourceUploader<'a> {
    ctx: &'a GpuContext,
    arena: &'a mut ResourceArena,
}

impl<'a> ResourceUploader<'a> {
    pub fn new(ctx: &'a GpuContext, arena: &'a mut ResourceArena) -> Self {
        Self { ctx, arena }
    }

    /// Allocates `target_size` bytes and copies `bytes` into the front.
    pub fn upload_buffer(
        &mut self,
        label: &str,
        bytes: &[u8],
        target_size: u64,
        usage: wgpu::BufferUsages,
    ) -> Result<BufferId, UploadError> {
        check_buffer(
            bytes.len() as u64,
            target_size,
            self.ctx.limits().max_buffer_size,
        )?;

        let mut contents = bytes.to_vec();
        contents.resize(target_size as usize, 0);

        let buffer = self
            .ctx
            .capture_validation(|device| {
                device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some(label),
                    contents: &contents,
                    usage,
                })
            })
            .map_err(UploadError::Device)?;

        log::debug!("uploaded buffer '{label}' ({} of {target_size} bytes)", bytes.len());
        Ok(self.arena.insert_buffer(buffer))
    }

    pub fn upload_vertices<V: Pod>(&mut self, vertices: &[V]) -> Result<VertexBufferView, UploadError> {
        let bytes: &[u8] = bytemuck::cast_slice(vertices);
        let size = bytes.len() as u64;
        let buffer = self.upload_buffer("vertex buffer", bytes, size, wgpu::BufferUsages::VERTEX)?;
        Ok(VertexBufferView {
            buffer,
            size,
            stride: std::mem::size_of::<V>() as u32,
        })
    }

    pub fn upload_indices(&mut self, indices: &[u16]) -> Result<IndexBufferView, UploadError> {
        let bytes: &[u8] = bytemuck::cast_slice(indices);
        let size = bytes.len() as u64;
        let buffer = self.upload_buffer("index buffer", bytes, size, wgpu::BufferUsages::INDEX)?;
        Ok(IndexBufferView {
            buffer,
            size,
            format: wgpu::IndexFormat::Uint16,
        })
    }

    /// Allocates an aligned uniform buffer holding `value`; it stays writable.
    pub fn create_constant_buffer<T: Pod>(&mut self, value: &T) -> Result<ConstantBufferView, UploadError> {
        let bytes = bytemuck::bytes_of(value);
        let data_size = bytes.len() as u64;
        let size = aligned_constant_size(data_size);
        let buffer = self.upload_buffer(
            "constant buffer",
            bytes,
            size,
            wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        )?;
        Ok(ConstantBufferView {
            buffer,
            size,
            data_size,
        })
    }

    /// Creates a sampled texture and writes the pixels without a staging buffer.
    pub fn upload_texture(&mut self, image: &DecodedImage) -> Result<TextureHandle, UploadError> {
        let layout = plan_texture_write(image, self.ctx.limits().max_texture_dimension_2d)?;
        let meta = image.metadata;

        let size = wgpu::Extent3d {
            width: meta.width,
            height: meta.height,
            depth_or_array_layers: 1,
        };

        let queue = self.ctx.queue();
        let (texture, view) = self
            .ctx
            .capture_validation(|device| {
                let texture = device.create_texture(&wgpu::TextureDescriptor {
                    label: Some("quad texture"),
                    size,
                    mip_level_count: 1,
                    sample_count: 1,
                    dimension: wgpu::TextureDimension::D2,
                    format: meta.format,
                    usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                    view_formats: &[],
                });

                queue.write_texture(
                    wgpu::TexelCopyTextureInfo {
                        texture: &texture,
                        mip_level: 0,
                        origin: wgpu::Origin3d::ZERO,
                        aspect: wgpu::TextureAspect::All,
                    },
                    &image.pixels,
                    wgpu::TexelCopyBufferLayout {
                        offset: 0,
                        bytes_per_row: Some(layout.row_pitch),
                        rows_per_image: Some(layout.rows),
                    },
                    size,
                );

                let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
                (texture, view)
            })
            .map_err(UploadError::Device)?;

        let id = self.arena.insert_texture(texture, view);

        log::debug!(
            "uploaded texture {}x{} {:?} (row pitch {}, {} bytes)",
            meta.width,
            meta.height,
            meta.format,
            layout.row_pitch,
            layout.total_size
        );

        Ok(TextureHandle {
            id,
            width: meta.width,
            height: meta.height,
            format: meta.format,
        })
    }
}
