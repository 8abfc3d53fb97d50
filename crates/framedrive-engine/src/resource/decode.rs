use std::path::{Path, PathBuf};

/// Shape of a decoded image.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct ImageMetadata {
    pub width: u32,
    pub height: u32,
    pub format: wgpu::TextureFormat,
    pub array_size: u32,
}

/// Pixel buffer produced by an [`ImageDecoder`].
#[derive(Debug, Clone)]
pub struct DecodedImage {
    pub metadata: ImageMetadata,
    pub pixels: Vec<u8>,
    /// Bytes per row of pixels.
    pub row_pitch: u32,
    /// Bytes per array slice.
    pub slice_pitch: u32,
}

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("failed to decode {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("{path} has zero extent")]
    Empty { path: PathBuf },
}

/// Loads image files into tightly packed pixel buffers.
pub trait ImageDecoder {
    fn decode(&self, path: &Path) -> Result<DecodedImage, DecodeError>;
}

/// Decodes any supported file to 8-bit RGBA.
#[derive(Debug, Default, Copy, Clone)]
pub struct Rgba8Decoder;

impl ImageDecoder for Rgba8Decoder {
    fn decode(&self, path: &Path) -> Result<DecodedImage, DecodeError> {
        let rgba = image::open(path)
            .map_err(|source| DecodeError::Image {
                path: path.to_path_buf(),
                source,
            })?
            .to_rgba8();

        let (width, height) = rgba.dimensions();
        if width == 0 || height == 0 {
            return Err(DecodeError::Empty {
                path: path.to_path_buf(),
            });
        }

        log::info!("decoded {} ({width}x{height} rgba8)", path.display());
        Ok(DecodedImage::rgba8(width, height, rgba.into_raw()))
    }
}

impl DecodedImage {
    /// Wraps tightly packed RGBA8 pixels.
    pub fn rgba8(width: u32, height: u32, pixels: Vec<u8>) -> Self {
        let row_pitch = width * 4;
        Self {
            metadata: ImageMetadata {
                width,
                height,
                format: wgpu::TextureFormat::Rgba8Unorm,
                array_size: 1,
            },
            pixels,
            row_pitch,
            slice_pitch: row_pitch * height,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rgba8_pitches() {
        let img = DecodedImage::rgba8(256, 256, vec![0; 256 * 256 * 4]);
        assert_eq!(img.row_pitch, 1024);
        assert_eq!(img.slice_pitch, 1024 * 256);
        assert_eq!(img.metadata.array_size, 1);
    }

    #[test]
    fn missing_file_reports_path() {
        let err = Rgba8Decoder
            .decode(Path::new("does/not/exist.png"))
            .unwrap_err();
        assert!(err.to_string().contains("does/not/exist.png"));
    }

    #[test]
    fn decodes_png_from_disk() {
        let dir = std::env::temp_dir().join("framedrive-decode-test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("checker.png");
        let img = image::RgbaImage::from_fn(4, 2, |x, _| {
            if x % 2 == 0 {
                image::Rgba([255, 0, 0, 255])
            } else {
                image::Rgba([0, 0, 255, 255])
            }
        });
        img.save(&path).unwrap();

        let decoded = Rgba8Decoder.decode(&path).unwrap();
        assert_eq!(decoded.metadata.width, 4);
        assert_eq!(decoded.metadata.height, 2);
        assert_eq!(decoded.row_pitch, 16);
        assert_eq!(decoded.pixels.len(), 32);
        assert_eq!(&decoded.pixels[..4], &[255, 0, 0, 255]);
    }
}
