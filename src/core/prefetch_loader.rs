//! Background loader: decodes one prefetch window into the image store.
//!
//! A loader is created per window, runs once on a pool worker and reports
//! exactly once through a channel. There is no cancellation: a started
//! loader always walks its whole frame list.

use crossbeam_channel::Sender;
use log::{debug, trace, warn};
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use super::region::Region;
use crate::entities::{DecodeParams, FrameDescriptor, ImageKey, ImageStore, WorkerPool};

/// Immutable snapshot of the work for one loader
#[derive(Debug, Clone)]
pub struct LoadRequest {
    pub window: Region,
    /// In load order; the frame loaded last is the least likely to be evicted
    pub frames: Vec<FrameDescriptor>,
    pub params: DecodeParams,
    /// Catalog generation the frames were taken from
    pub generation: u64,
}

/// One frame that could not be loaded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameFailure {
    pub path: PathBuf,
    pub error: String,
}

/// Completion message sent back to the cache
#[derive(Debug, Clone)]
pub struct LoadReport {
    pub window: Region,
    pub generation: u64,
    pub loaded: usize,
    pub failures: Vec<FrameFailure>,
}

impl LoadReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

pub struct BackgroundLoader {
    store: Arc<dyn ImageStore>,
    request: LoadRequest,
    done: Sender<LoadReport>,
}

impl BackgroundLoader {
    pub fn new(store: Arc<dyn ImageStore>, request: LoadRequest, done: Sender<LoadReport>) -> Self {
        Self { store, request, done }
    }

    /// Hand the loader to `pool`. Never blocks.
    pub fn spawn(self, pool: &dyn WorkerPool) {
        pool.execute(Box::new(move || self.run()));
    }

    /// Load every frame, then send the report.
    ///
    /// A failing frame (error or panic inside the store) is recorded and the
    /// remaining frames are still attempted.
    pub fn run(self) {
        let started = Instant::now();
        let LoadRequest { window, frames, params, generation } = self.request;
        let mut loaded = 0usize;
        let mut failures = Vec::new();

        for desc in &frames {
            let key = ImageKey::new(desc.path(), params);
            let result = panic::catch_unwind(AssertUnwindSafe(|| self.store.get(&key)));

            match result {
                Ok(Ok(_)) => {
                    loaded += 1;
                    trace!("Prefetched {}", desc.path().display());
                }
                Ok(Err(e)) => {
                    warn!("Prefetch failed for {}: {}", desc.path().display(), e);
                    failures.push(FrameFailure {
                        path: desc.path().to_path_buf(),
                        error: e.to_string(),
                    });
                }
                Err(_) => {
                    warn!("Prefetch panicked for {}", desc.path().display());
                    failures.push(FrameFailure {
                        path: desc.path().to_path_buf(),
                        error: "decoder panicked".to_string(),
                    });
                }
            }
        }

        debug!(
            "Window {} loaded: {}/{} frames in {:.1}ms",
            window,
            loaded,
            frames.len(),
            started.elapsed().as_secs_f64() * 1000.0
        );

        let report = LoadReport { window, generation, loaded, failures };
        if self.done.send(report).is_err() {
            debug!("Load report dropped: cache no longer listening");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::cache_man::MemoryBudget;
    use crate::core::image_store::DecodedImageStore;
    use crate::core::testing::{FakeDecoder, ManualPool};
    use crate::entities::{Dimensions, Metadata};

    fn descriptors(names: &[&str]) -> Vec<FrameDescriptor> {
        names
            .iter()
            .map(|n| FrameDescriptor::new(*n, Dimensions::new(4, 2), Metadata::new()))
            .collect()
    }

    fn make_store() -> Arc<DecodedImageStore> {
        Arc::new(DecodedImageStore::new(
            64,
            Arc::new(MemoryBudget::with_limit(usize::MAX)),
            Arc::new(FakeDecoder::new()),
        ))
    }

    #[test]
    fn test_reports_once_after_loading_all() {
        let store = make_store();
        let (tx, rx) = crossbeam_channel::unbounded();
        let request = LoadRequest {
            window: Region::new(0, 2),
            frames: descriptors(&["/s/a.0.exr", "/s/a.1.exr", "/s/a.2.exr"]),
            params: DecodeParams::default(),
            generation: 7,
        };

        let pool = ManualPool::new();
        BackgroundLoader::new(store.clone(), request, tx).spawn(&pool);
        assert!(rx.try_recv().is_err(), "nothing runs before the pool does");

        assert_eq!(pool.run_all(), 1);
        let report = rx.try_recv().unwrap();
        assert!(rx.try_recv().is_err());

        assert_eq!(report.generation, 7);
        assert_eq!(report.loaded, 3);
        assert!(report.is_clean());
        assert!(store.contains(&ImageKey::new("/s/a.1.exr", DecodeParams::default())));
    }

    #[test]
    fn test_failure_does_not_abort() {
        let store = make_store();
        let (tx, rx) = crossbeam_channel::unbounded();
        let request = LoadRequest {
            window: Region::new(0, 2),
            frames: descriptors(&["/s/a.0.exr", "/s/broken.1.exr", "/s/a.2.exr"]),
            params: DecodeParams::default(),
            generation: 0,
        };

        BackgroundLoader::new(store.clone(), request, tx).run();
        let report = rx.try_recv().unwrap();

        assert_eq!(report.loaded, 2);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].path, PathBuf::from("/s/broken.1.exr"));
        assert!(store.contains(&ImageKey::new("/s/a.2.exr", DecodeParams::default())));
    }

    #[test]
    fn test_dropped_receiver_is_harmless() {
        let (tx, rx) = crossbeam_channel::unbounded();
        drop(rx);
        let request = LoadRequest {
            window: Region::new(0, 0),
            frames: descriptors(&["/s/a.0.exr"]),
            params: DecodeParams::default(),
            generation: 0,
        };
        BackgroundLoader::new(make_store(), request, tx).run();
    }
}
