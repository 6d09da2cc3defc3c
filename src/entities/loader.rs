//! Image loader backed by the `image` crate
//!
//! Two entry points, both via the `FrameDecoder` trait:
//! - `header()`: dimensions and metadata, pixel data is not decoded
//! - `decode()`: full decode into the requested `PixelFormat`, with optional downscale
//!
//! Supported formats are whatever the enabled `image` features cover
//! (EXR, PNG, JPEG, TIFF, TGA, HDR).

use half::f16 as F16;
use image::imageops::FilterType;
use image::{ColorType, DynamicImage, ImageDecoder, ImageReader};
use log::{debug, trace};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use super::descriptor::Dimensions;
use super::frame::{FrameError, ImageHandle, PixelBuffer, PixelFormat};
use super::metadata::Metadata;
use super::traits::{DecodeParams, FrameDecoder};

/// Default disk decoder
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageLoader;

impl ImageLoader {
    pub fn new() -> Self {
        Self
    }

    fn open(path: &Path) -> Result<ImageReader<BufReader<File>>, FrameError> {
        if !path.exists() {
            return Err(FrameError::NotFound(path.to_path_buf()));
        }

        ImageReader::open(path)
            .map_err(|e| FrameError::Io(format!("{}: {}", path.display(), e)))?
            .with_guessed_format()
            .map_err(|e| FrameError::Io(format!("{}: {}", path.display(), e)))
    }

    /// Convert decoded image into the requested RGBA layout
    fn to_buffer(img: DynamicImage, format: PixelFormat) -> PixelBuffer {
        match format {
            PixelFormat::Rgba8 => PixelBuffer::U8(img.to_rgba8().into_raw()),
            PixelFormat::RgbaF16 => {
                let pixels = img.to_rgba32f();
                PixelBuffer::F16(pixels.as_raw().iter().map(|&v| F16::from_f32(v)).collect())
            }
            PixelFormat::RgbaF32 => PixelBuffer::F32(img.to_rgba32f().into_raw()),
        }
    }
}

/// Channel count from color type (unknown layouts report 4)
fn channels(color: ColorType) -> u8 {
    match color {
        ColorType::L8 | ColorType::L16 => 1,
        ColorType::La8 | ColorType::La16 => 2,
        ColorType::Rgb8 | ColorType::Rgb16 | ColorType::Rgb32F => 3,
        _ => 4,
    }
}

impl FrameDecoder for ImageLoader {
    fn header(&self, path: &Path) -> Result<(Dimensions, Metadata), FrameError> {
        trace!("Reading header: {}", path.display());

        let reader = Self::open(path)?;
        let format = reader
            .format()
            .ok_or_else(|| FrameError::UnsupportedFormat(path.display().to_string()))?;

        let decoder = reader
            .into_decoder()
            .map_err(|e| FrameError::Image(format!("{}: {}", path.display(), e)))?;
        let (width, height) = decoder.dimensions();
        let color = decoder.color_type();

        let mut meta = Metadata::new();
        meta.set("format", format!("{:?}", format));
        meta.set("color_type", format!("{:?}", color));
        meta.set("channels", channels(color).to_string());
        meta.set("bits_per_pixel", color.bits_per_pixel().to_string());
        if let Ok(stat) = std::fs::metadata(path) {
            meta.set("file_size", stat.len().to_string());
        }
        if let Some(name) = path.file_name().and_then(|s| s.to_str()) {
            meta.set("file_name", name);
        }

        Ok((Dimensions::new(width, height), meta))
    }

    fn decode(&self, path: &Path, params: DecodeParams) -> Result<ImageHandle, FrameError> {
        debug!("Decoding {} ({:?}, 1/{})", path.display(), params.format, params.downscale);

        let mut img = Self::open(path)?
            .decode()
            .map_err(|e| FrameError::Image(format!("{}: {}", path.display(), e)))?;

        if params.downscale > 1 {
            let w = (img.width() / params.downscale).max(1);
            let h = (img.height() / params.downscale).max(1);
            img = img.resize_exact(w, h, FilterType::Triangle);
        }

        let width = img.width() as usize;
        let height = img.height() as usize;
        let buffer = Self::to_buffer(img, params.format);

        Ok(ImageHandle::from_buffer(buffer, width, height))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn write_png(dir: &Path, name: &str, w: u32, h: u32) -> std::path::PathBuf {
        let path = dir.join(name);
        RgbaImage::from_pixel(w, h, Rgba([255, 128, 0, 255]))
            .save(&path)
            .unwrap();
        path
    }

    #[test]
    fn test_header_reads_dimensions_and_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_png(dir.path(), "shot.0001.png", 8, 4);

        let (dims, meta) = ImageLoader::new().header(&path).unwrap();
        assert_eq!(dims, Dimensions::new(8, 4));
        assert_eq!(meta.get("format"), Some("Png"));
        assert_eq!(meta.get("channels"), Some("4"));
        assert_eq!(meta.get("file_name"), Some("shot.0001.png"));
        assert!(meta.contains_key("file_size"));
    }

    #[test]
    fn test_decode_layouts() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_png(dir.path(), "shot.0001.png", 8, 4);
        let loader = ImageLoader::new();

        let f32_img = loader.decode(&path, DecodeParams::default()).unwrap();
        assert_eq!((f32_img.width(), f32_img.height()), (8, 4));
        assert_eq!(f32_img.format(), PixelFormat::RgbaF32);
        match f32_img.buffer() {
            PixelBuffer::F32(v) => assert!((v[0] - 1.0).abs() < 1e-6),
            other => panic!("unexpected buffer {:?}", other.format()),
        }

        let half_params = DecodeParams { downscale: 2, format: PixelFormat::RgbaF16 };
        let half_img = loader.decode(&path, half_params).unwrap();
        assert_eq!((half_img.width(), half_img.height()), (4, 2));
        assert_eq!(half_img.mem(), 4 * 2 * 8);
    }

    #[test]
    fn test_missing_file() {
        let err = ImageLoader::new()
            .header(Path::new("/definitely/not/here.0001.exr"))
            .unwrap_err();
        assert!(matches!(err, FrameError::NotFound(_)));
    }

    #[test]
    fn test_garbage_file_fails_decode() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.png");
        std::fs::write(&path, b"not a png at all").unwrap();

        assert!(ImageLoader::new().decode(&path, DecodeParams::default()).is_err());
    }
}
