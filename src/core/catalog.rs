//! Ordered, indexed list of frames for the loaded sequence
//!
//! Frame index = position after sorting by path (byte-wise lexicographic).
//! Indices are only valid until the next `set_sequence`.

use log::{info, trace, warn};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use super::region::Region;
use crate::entities::{FrameDecoder, FrameDescriptor, FrameError};

/// What `set_sequence` does when one header cannot be read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum HeaderPolicy {
    /// Abort the whole call, keep the previous catalog
    #[default]
    Fail,
    /// Log and leave the frame out (shifts all later indices)
    Skip,
}

#[derive(Debug, Default)]
pub struct SequenceCatalog {
    frames: Vec<FrameDescriptor>,
    index: HashMap<PathBuf, usize>,
}

impl SequenceCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the catalog with `paths`.
    ///
    /// Headers are read synchronously through `decoder`. The new list is
    /// built aside and swapped in at the end, so a failed call leaves the
    /// previous catalog untouched. Duplicate paths are kept once.
    pub fn set_sequence<P: AsRef<Path>>(
        &mut self,
        paths: &[P],
        decoder: &dyn FrameDecoder,
        policy: HeaderPolicy,
    ) -> Result<(), FrameError> {
        let mut frames: Vec<FrameDescriptor> = Vec::with_capacity(paths.len());
        let mut seen: HashSet<&Path> = HashSet::with_capacity(paths.len());
        let mut skipped = 0usize;

        for path in paths {
            let path = path.as_ref();
            if !seen.insert(path) {
                trace!("Duplicate path ignored: {}", path.display());
                continue;
            }

            match decoder.header(path) {
                Ok((dimensions, metadata)) => {
                    frames.push(FrameDescriptor::new(path, dimensions, metadata));
                }
                Err(e) => match policy {
                    HeaderPolicy::Fail => return Err(e),
                    HeaderPolicy::Skip => {
                        warn!("Skipping {}: {}", path.display(), e);
                        skipped += 1;
                    }
                },
            }
        }

        frames.sort_by(|a, b| a.path().as_os_str().cmp(b.path().as_os_str()));

        let index = frames
            .iter()
            .enumerate()
            .map(|(i, d)| (d.path().to_path_buf(), i))
            .collect();

        self.frames = frames;
        self.index = index;

        info!(
            "Sequence set: {} frames ({} skipped)",
            self.frames.len(),
            skipped
        );
        Ok(())
    }

    pub fn frame_index_of(&self, path: &Path) -> Option<usize> {
        self.index.get(path).copied()
    }

    pub fn descriptor_at(&self, frame: usize) -> Option<&FrameDescriptor> {
        self.frames.get(frame)
    }

    /// Clones of the descriptors inside `region`, in frame order
    pub fn descriptors_in(&self, region: Region) -> Vec<FrameDescriptor> {
        match region.bounds() {
            Some((start, end)) if start < self.frames.len() => {
                let end = end.min(self.frames.len() - 1);
                self.frames[start..=end].to_vec()
            }
            _ => Vec::new(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &FrameDescriptor> {
        self.frames.iter()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::testing::{FakeDecoder, shot_paths};
    use crate::entities::Dimensions;

    #[test]
    fn test_sorted_by_path() {
        let mut paths = shot_paths(5);
        paths.reverse();

        let mut catalog = SequenceCatalog::new();
        catalog.set_sequence(&paths, &FakeDecoder::new(), HeaderPolicy::Fail).unwrap();

        assert_eq!(catalog.len(), 5);
        for (i, desc) in catalog.iter().enumerate() {
            assert_eq!(desc.path(), Path::new(&format!("/seq/shot.{:04}.exr", i)));
            assert_eq!(catalog.frame_index_of(desc.path()), Some(i));
        }
        assert_eq!(catalog.descriptor_at(2).unwrap().dimensions(), Dimensions::new(4, 2));
        assert!(catalog.descriptor_at(5).is_none());
    }

    #[test]
    fn test_set_sequence_idempotent() {
        let paths = shot_paths(20);
        let decoder = FakeDecoder::new();
        let mut catalog = SequenceCatalog::new();

        catalog.set_sequence(&paths, &decoder, HeaderPolicy::Fail).unwrap();
        let first: Vec<PathBuf> = catalog.iter().map(|d| d.path().to_path_buf()).collect();

        catalog.set_sequence(&paths, &decoder, HeaderPolicy::Fail).unwrap();
        let second: Vec<PathBuf> = catalog.iter().map(|d| d.path().to_path_buf()).collect();

        assert_eq!(first, second);
        assert_eq!(catalog.frame_index_of(Path::new("/seq/shot.0013.exr")), Some(13));
    }

    #[test]
    fn test_reset_replaces_previous() {
        let decoder = FakeDecoder::new();
        let mut catalog = SequenceCatalog::new();
        catalog.set_sequence(&shot_paths(10), &decoder, HeaderPolicy::Fail).unwrap();

        let other = vec![PathBuf::from("/other/a.png"), PathBuf::from("/other/b.png")];
        catalog.set_sequence(&other, &decoder, HeaderPolicy::Fail).unwrap();

        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.frame_index_of(Path::new("/seq/shot.0001.exr")), None);
        assert_eq!(catalog.frame_index_of(Path::new("/other/b.png")), Some(1));
    }

    #[test]
    fn test_header_failure_keeps_previous_catalog() {
        let decoder = FakeDecoder::new();
        let mut catalog = SequenceCatalog::new();
        catalog.set_sequence(&shot_paths(3), &decoder, HeaderPolicy::Fail).unwrap();

        let mut bad = shot_paths(5);
        bad.push(PathBuf::from("/seq/missing.0005.exr"));
        let err = catalog.set_sequence(&bad, &decoder, HeaderPolicy::Fail).unwrap_err();

        assert!(matches!(err, FrameError::NotFound(_)));
        assert_eq!(catalog.len(), 3);
    }

    #[test]
    fn test_header_failure_skipped() {
        let decoder = FakeDecoder::new();
        let mut catalog = SequenceCatalog::new();
        let paths = vec![
            PathBuf::from("/seq/a.0000.exr"),
            PathBuf::from("/seq/a.0001.missing.exr"),
            PathBuf::from("/seq/a.0002.exr"),
        ];
        catalog.set_sequence(&paths, &decoder, HeaderPolicy::Skip).unwrap();

        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.frame_index_of(Path::new("/seq/a.0002.exr")), Some(1));
    }

    #[test]
    fn test_duplicates_and_region_slice() {
        let mut paths = shot_paths(10);
        paths.extend(shot_paths(3));

        let mut catalog = SequenceCatalog::new();
        catalog.set_sequence(&paths, &FakeDecoder::new(), HeaderPolicy::Fail).unwrap();
        assert_eq!(catalog.len(), 10);

        let slice = catalog.descriptors_in(Region::new(2, 5));
        assert_eq!(slice.len(), 4);
        assert_eq!(slice[0].path(), Path::new("/seq/shot.0002.exr"));
        assert_eq!(slice[3].path(), Path::new("/seq/shot.0005.exr"));
        assert!(catalog.descriptors_in(Region::Empty).is_empty());
    }
}
