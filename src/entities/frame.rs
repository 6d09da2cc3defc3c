//! Decoded images with multi-format pixel buffers (U8, F16, F32)
//!
//! **Why**: Different decode layouts require different pixel representations:
//! - `PixelBuffer::U8`: 8-bit RGBA, 4 bytes/pixel (LDR previews)
//! - `PixelBuffer::F16`: half-float RGBA, 8 bytes/pixel
//! - `PixelBuffer::F32`: float RGBA, 16 bytes/pixel (linear viewer default)
//!
//! **Used by**: ImageStore (cached values), BackgroundLoader (decode target),
//! SequenceCache (Response payload)
//!
//! `ImageHandle` is an `Arc` around immutable pixel data, so handing the same
//! image to the store and to the caller is a pointer copy.

use half::f16 as F16;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

/// Pixel buffer format - stores different precision levels
#[derive(Debug, Clone)]
pub enum PixelBuffer {
    U8(Vec<u8>),
    F16(Vec<F16>),
    F32(Vec<f32>),
}

/// Pixel layout requested from the decoder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PixelFormat {
    Rgba8,
    RgbaF16,
    #[default]
    RgbaF32,
}

impl PixelFormat {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Rgba8 => 4,
            PixelFormat::RgbaF16 => 8,
            PixelFormat::RgbaF32 => 16,
        }
    }
}

impl PixelBuffer {
    pub fn format(&self) -> PixelFormat {
        match self {
            PixelBuffer::U8(_) => PixelFormat::Rgba8,
            PixelBuffer::F16(_) => PixelFormat::RgbaF16,
            PixelBuffer::F32(_) => PixelFormat::RgbaF32,
        }
    }

    /// Number of channel values (not pixels)
    pub fn len(&self) -> usize {
        match self {
            PixelBuffer::U8(v) => v.len(),
            PixelBuffer::F16(v) => v.len(),
            PixelBuffer::F32(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Size of the pixel data in bytes
    pub fn mem(&self) -> usize {
        match self {
            PixelBuffer::U8(v) => v.len(),
            PixelBuffer::F16(v) => v.len() * 2,
            PixelBuffer::F32(v) => v.len() * 4,
        }
    }
}

#[derive(Debug)]
struct ImageData {
    buffer: PixelBuffer,
    width: usize,
    height: usize,
}

/// Shared handle to a decoded RGBA image
#[derive(Debug, Clone)]
pub struct ImageHandle {
    data: Arc<ImageData>,
}

impl ImageHandle {
    /// Wrap a decoded buffer. The buffer must hold `width * height * 4` values.
    pub fn from_buffer(buffer: PixelBuffer, width: usize, height: usize) -> Self {
        debug_assert_eq!(buffer.len(), width * height * 4, "RGBA buffer size mismatch");
        Self {
            data: Arc::new(ImageData {
                buffer,
                width,
                height,
            }),
        }
    }

    pub fn width(&self) -> usize {
        self.data.width
    }

    pub fn height(&self) -> usize {
        self.data.height
    }

    pub fn format(&self) -> PixelFormat {
        self.data.buffer.format()
    }

    pub fn buffer(&self) -> &PixelBuffer {
        &self.data.buffer
    }

    /// Memory footprint of the pixel data (bytes)
    pub fn mem(&self) -> usize {
        self.data.buffer.mem()
    }

    /// True if both handles point at the same decoded pixels
    pub fn ptr_eq(a: &ImageHandle, b: &ImageHandle) -> bool {
        Arc::ptr_eq(&a.data, &b.data)
    }
}

/// Image loading errors
#[derive(Debug)]
pub enum FrameError {
    Io(String),
    Image(String),
    UnsupportedFormat(String),
    NotFound(PathBuf),
}

impl std::fmt::Display for FrameError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FrameError::Io(e) => write!(f, "IO error: {}", e),
            FrameError::Image(e) => write!(f, "Image error: {}", e),
            FrameError::UnsupportedFormat(e) => write!(f, "Unsupported format: {}", e),
            FrameError::NotFound(p) => write!(f, "File not found: {}", p.display()),
        }
    }
}

impl std::error::Error for FrameError {}
