//! Per-frame record of a loaded sequence.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use super::metadata::Metadata;

/// Original image size in pixels (before any decode downscale)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Immutable description of one frame: file path, dimensions and header metadata.
///
/// Built once by `SequenceCatalog::set_sequence`, never modified afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameDescriptor {
    path: PathBuf,
    dimensions: Dimensions,
    metadata: Metadata,
}

impl FrameDescriptor {
    pub fn new(path: impl Into<PathBuf>, dimensions: Dimensions, metadata: Metadata) -> Self {
        Self {
            path: path.into(),
            dimensions,
            metadata,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }
}
