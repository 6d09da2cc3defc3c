//! Abstract traits for dependency inversion.
//!
//! These traits define the capabilities `core` needs from infrastructure:
//! an image store, a decoder and a thread pool. The orchestration in
//! `core::sequence_cache` only talks to these, so tests can swap in fakes
//! that deterministically report containment.
//!
//! Default implementations: `core::image_store::DecodedImageStore`,
//! `entities::loader::ImageLoader`, `core::workers::Workers`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::descriptor::Dimensions;
use super::frame::{FrameError, ImageHandle, PixelFormat};
use super::metadata::Metadata;

/// Fixed decode parameters that are part of every store key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DecodeParams {
    /// Integer downscale factor (1 = full resolution)
    pub downscale: u32,
    /// Output pixel layout
    pub format: PixelFormat,
}

impl Default for DecodeParams {
    fn default() -> Self {
        Self {
            downscale: 1,
            format: PixelFormat::RgbaF32,
        }
    }
}

/// Store key: image identity plus decode parameters
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageKey {
    pub path: PathBuf,
    pub params: DecodeParams,
}

impl ImageKey {
    pub fn new(path: impl Into<PathBuf>, params: DecodeParams) -> Self {
        Self {
            path: path.into(),
            params,
        }
    }
}

/// Capacity-bounded image cache.
///
/// Must be safe for concurrent reads plus one writer: the interactive
/// thread and a background loader call into it at the same time.
pub trait ImageStore: Send + Sync {
    /// Check residency without touching eviction order.
    fn contains(&self, key: &ImageKey) -> bool;

    /// Fetch a resident image, or decode and insert it (blocking).
    fn get(&self, key: &ImageKey) -> Result<ImageHandle, FrameError>;

    /// Maximum number of resident entries.
    fn capacity(&self) -> usize;
}

/// Reads image headers and decodes pixels from disk.
pub trait FrameDecoder: Send + Sync {
    /// Dimensions and metadata without decoding pixel data.
    fn header(&self, path: &Path) -> Result<(Dimensions, Metadata), FrameError>;

    /// Full decode into the requested layout.
    fn decode(&self, path: &Path, params: DecodeParams) -> Result<ImageHandle, FrameError>;
}

/// Abstract worker pool interface.
///
/// Allows the cache to schedule background loads without knowing
/// the concrete thread pool implementation.
pub trait WorkerPool: Send + Sync {
    /// Run closure on a worker thread. Must not block the caller.
    fn execute(&self, job: Box<dyn FnOnce() + Send + 'static>);
}

/// Blanket impl: Arc<T> implements traits if T does
impl<T: ImageStore + ?Sized> ImageStore for Arc<T> {
    fn contains(&self, key: &ImageKey) -> bool {
        (**self).contains(key)
    }

    fn get(&self, key: &ImageKey) -> Result<ImageHandle, FrameError> {
        (**self).get(key)
    }

    fn capacity(&self) -> usize {
        (**self).capacity()
    }
}

impl<T: FrameDecoder + ?Sized> FrameDecoder for Arc<T> {
    fn header(&self, path: &Path) -> Result<(Dimensions, Metadata), FrameError> {
        (**self).header(path)
    }

    fn decode(&self, path: &Path, params: DecodeParams) -> Result<ImageHandle, FrameError> {
        (**self).decode(path, params)
    }
}

impl<T: WorkerPool + ?Sized> WorkerPool for Arc<T> {
    fn execute(&self, job: Box<dyn FnOnce() + Send + 'static>) {
        (**self).execute(job)
    }
}
