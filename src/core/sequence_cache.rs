//! Windowed prefetch cache for an image sequence
//!
//! **Why**: The viewer thread must never wait on disk. Frames are decoded in
//! a window around the last request by a background loader; the viewer only
//! gets pixels for frames that window is known to have loaded.
//!
//! **Used by**: Viewer/UI layer (`request` every repaint), timeline (`cached_frames`)
//!
//! # Regions
//!
//! - *safe*: requests inside it never schedule work
//! - *prefetch*: frames the last **completed** load decoded; only these get pixels
//!
//! Both are replaced together when a load completes, never piecemeal.
//!
//! # State machine
//!
//! ```text
//! Idle    --request outside safe--> Loading { pending window }
//! Loading --any request-----------> Loading   (no second load)
//! Loading --LoadReport------------> Idle      (adopt window, emit RequestHandled)
//! ```
//!
//! The loader reports through a channel; the report is applied by `poll()`
//! on the thread that owns the cache, so regions need no locking.
//!
//! # Sequence changes
//!
//! `set_sequence` bumps a generation counter. A load started against the
//! previous catalog still completes into the store, but its window is not
//! adopted; it only returns the cache to `Idle` and emits `RequestHandled`.

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use log::{debug, info, trace, warn};
use std::cmp::Reverse;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::cache_events::{FramesFailed, RequestHandled, SequenceChanged};
use super::cache_man::MemoryBudget;
use super::catalog::{HeaderPolicy, SequenceCatalog};
use super::event_bus::EventBus;
use super::image_store::DecodedImageStore;
use super::prefetch_loader::{BackgroundLoader, LoadReport, LoadRequest};
use super::region::{Region, compute_region};
use super::workers::Workers;
use crate::config::CacheConfig;
use crate::entities::{
    DecodeParams, Dimensions, FrameDecoder, FrameError, ImageHandle, ImageKey, ImageLoader,
    ImageStore, Metadata, WorkerPool,
};

/// Prefetch/safe pair computed for a load that has not completed yet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingWindow {
    pub prefetch: Region,
    pub safe: Region,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheState {
    #[default]
    Idle,
    Loading {
        pending: PendingWindow,
        generation: u64,
    },
}

/// Answer to `request`. All fields are `None` when the frame is unknown or
/// not decoded yet.
#[derive(Debug, Clone, Default)]
pub struct Response {
    pub image: Option<ImageHandle>,
    pub dimensions: Option<Dimensions>,
    pub metadata: Option<Metadata>,
}

impl Response {
    pub fn is_empty(&self) -> bool {
        self.image.is_none()
    }
}

pub struct SequenceCache {
    catalog: SequenceCatalog,
    store: Arc<dyn ImageStore>,
    pool: Arc<dyn WorkerPool>,
    decoder: Arc<dyn FrameDecoder>,
    events: EventBus,

    state: CacheState,
    safe: Region,
    prefetch: Region,
    /// Frames of the adopted window that failed to decode; not reloaded
    failed: HashSet<usize>,
    generation: u64,

    prefetch_radius: usize,
    safe_radius: usize,
    params: DecodeParams,
    header_policy: HeaderPolicy,

    done_tx: Sender<LoadReport>,
    done_rx: Receiver<LoadReport>,
}

impl std::fmt::Debug for SequenceCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SequenceCache")
            .field("frames", &self.catalog.len())
            .field("state", &self.state)
            .field("safe", &self.safe)
            .field("prefetch", &self.prefetch)
            .field("generation", &self.generation)
            .finish()
    }
}

impl SequenceCache {
    /// Build a cache around injected capabilities.
    ///
    /// `config` is normalized first (safe radius clamped to prefetch radius).
    pub fn new(
        store: Arc<dyn ImageStore>,
        pool: Arc<dyn WorkerPool>,
        decoder: Arc<dyn FrameDecoder>,
        config: &CacheConfig,
    ) -> Self {
        let config = config.normalized();
        let (done_tx, done_rx) = crossbeam_channel::unbounded();

        debug!(
            "SequenceCache created: prefetch_radius={}, safe_radius={}, params={:?}",
            config.prefetch_radius, config.safe_radius, config.decode
        );

        Self {
            catalog: SequenceCatalog::new(),
            store,
            pool,
            decoder,
            events: EventBus::new(),
            state: CacheState::Idle,
            safe: Region::Empty,
            prefetch: Region::Empty,
            failed: HashSet::new(),
            generation: 0,
            prefetch_radius: config.prefetch_radius,
            safe_radius: config.safe_radius,
            params: config.decode,
            header_policy: config.header_policy,
            done_tx,
            done_rx,
        }
    }

    /// Cache with the default stack: `ImageLoader`, `DecodedImageStore`
    /// bounded by config, and a dedicated `Workers` pool.
    pub fn with_default_stack(config: &CacheConfig) -> std::io::Result<Self> {
        let decoder: Arc<dyn FrameDecoder> = Arc::new(ImageLoader::new());
        let budget = Arc::new(MemoryBudget::from_system(config.mem_fraction, config.reserve_gb));
        let store = Arc::new(DecodedImageStore::new(
            config.max_entries,
            budget,
            Arc::clone(&decoder),
        ));
        let pool = Arc::new(Workers::new(config.worker_threads())?);

        info!(
            "SequenceCache stack: {} workers, {} max entries",
            pool.num_threads(),
            config.max_entries
        );

        Ok(Self::new(store, pool, decoder, config))
    }

    /// Replace the sequence. Regions reset to empty; the window is computed
    /// on the next request that falls outside it.
    ///
    /// With `HeaderPolicy::Fail` an unreadable header aborts the call and
    /// leaves the previous sequence and regions in place.
    pub fn set_sequence<P: AsRef<Path>>(&mut self, paths: &[P]) -> Result<(), FrameError> {
        self.catalog
            .set_sequence(paths, self.decoder.as_ref(), self.header_policy)?;

        self.generation += 1;
        self.safe = Region::Empty;
        self.prefetch = Region::Empty;
        self.failed.clear();

        if let CacheState::Loading { pending, .. } = self.state {
            debug!(
                "Sequence replaced during load of {}; its window will be discarded",
                pending.prefetch
            );
        }

        self.events.emit(SequenceChanged {
            frames: self.catalog.len(),
        });
        Ok(())
    }

    /// Non-blocking frame lookup.
    ///
    /// 1. Unknown path → empty response, no side effects
    /// 2. Outside safe region while idle → schedule a load for the new window
    /// 3. Inside safe region but evicted from the store while idle → reload
    ///    the window around it (frames that failed to decode are not retried)
    /// 4. Inside the completed prefetch region and resident → image,
    ///    dimensions and metadata
    /// 5. Otherwise → empty response (retry after `RequestHandled`)
    pub fn request(&mut self, path: impl AsRef<Path>) -> Response {
        self.poll();

        let path = path.as_ref();
        let Some(frame) = self.catalog.frame_index_of(path) else {
            trace!("Request for unknown path {}", path.display());
            return Response::default();
        };

        let key = ImageKey::new(path, self.params);
        let resident = self.store.contains(&key);
        let evicted = self.safe.contains(frame) && !resident && !self.failed.contains(&frame);

        if (!self.safe.contains(frame) || evicted) && self.state == CacheState::Idle {
            if evicted {
                debug!("Frame {} evicted from store inside safe region {}", frame, self.safe);
            }
            self.start_load(frame);
        }

        // Never decode on this thread: only frames the store still holds answer
        if !self.prefetch.contains(frame) || !resident {
            trace!("Frame {} not available (prefetch region {})", frame, self.prefetch);
            return Response::default();
        }

        let Some(desc) = self.catalog.descriptor_at(frame) else {
            return Response::default();
        };

        match self.store.get(&key) {
            Ok(image) => Response {
                image: Some(image),
                dimensions: Some(desc.dimensions()),
                metadata: Some(desc.metadata().clone()),
            },
            Err(e) => {
                debug!("Frame {} unavailable: {}", frame, e);
                Response::default()
            }
        }
    }

    /// `request` by frame index
    pub fn request_frame(&mut self, frame: usize) -> Response {
        match self.catalog.descriptor_at(frame) {
            Some(desc) => {
                let path = desc.path().to_path_buf();
                self.request(path)
            }
            None => Response::default(),
        }
    }

    /// Frame indices currently resident in the store, ascending
    pub fn cached_frames(&self) -> Vec<usize> {
        self.catalog
            .iter()
            .enumerate()
            .filter(|(_, desc)| self.store.contains(&ImageKey::new(desc.path(), self.params)))
            .map(|(frame, _)| frame)
            .collect()
    }

    /// Apply finished loads. Call once per UI tick; `request` calls it too.
    ///
    /// Returns the number of load reports processed.
    pub fn poll(&mut self) -> usize {
        let mut processed = 0;
        while let Ok(report) = self.done_rx.try_recv() {
            self.on_load_complete(report);
            processed += 1;
        }
        processed
    }

    /// Block until no load is in flight or `timeout` elapses.
    ///
    /// For tools and tests; an interactive caller should use `poll`.
    pub fn wait_idle(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        self.poll();

        while self.is_loading() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.done_rx.recv_timeout(remaining) {
                Ok(report) => self.on_load_complete(report),
                Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {
                    return false;
                }
            }
        }
        true
    }

    fn start_load(&mut self, frame: usize) {
        let len = self.catalog.len();
        let pending = PendingWindow {
            prefetch: compute_region(frame, self.prefetch_radius, len),
            safe: compute_region(frame, self.safe_radius, len),
        };

        // Farthest frames first, the requested one last: when the window does
        // not fit the store, LRU eviction drops the frames far from it
        let mut ordered: Vec<_> = pending
            .prefetch
            .frames()
            .zip(self.catalog.descriptors_in(pending.prefetch))
            .collect();
        ordered.sort_by_key(|(i, _)| Reverse(i.abs_diff(frame)));
        let frames: Vec<_> = ordered.into_iter().map(|(_, desc)| desc).collect();

        let capacity = self.store.capacity();
        if frames.len() > capacity {
            warn!(
                "Window of {} frames exceeds store capacity {}, far frames get evicted",
                frames.len(),
                capacity
            );
        }

        debug!(
            "Frame {} requested (safe {}): loading {} ({} frames), next safe {}",
            frame,
            self.safe,
            pending.prefetch,
            frames.len(),
            pending.safe
        );

        self.state = CacheState::Loading {
            pending,
            generation: self.generation,
        };

        let request = LoadRequest {
            window: pending.prefetch,
            frames,
            params: self.params,
            generation: self.generation,
        };
        BackgroundLoader::new(Arc::clone(&self.store), request, self.done_tx.clone())
            .spawn(self.pool.as_ref());
    }

    fn on_load_complete(&mut self, report: LoadReport) {
        let CacheState::Loading { pending, generation } = self.state else {
            warn!("Load report for {} while idle, ignoring", report.window);
            return;
        };

        self.state = CacheState::Idle;

        if generation == self.generation {
            self.safe = pending.safe;
            self.prefetch = pending.prefetch;
            self.failed = report
                .failures
                .iter()
                .filter_map(|f| self.catalog.frame_index_of(&f.path))
                .collect();
            debug!(
                "Window adopted: prefetch {}, safe {} ({} loaded, {} failed)",
                self.prefetch,
                self.safe,
                report.loaded,
                report.failures.len()
            );
        } else {
            debug!(
                "Discarding window {} from generation {} (current {})",
                pending.prefetch, generation, self.generation
            );
        }

        if !report.is_clean() {
            warn!(
                "{} frame(s) failed to load in window {}",
                report.failures.len(),
                report.window
            );
            self.events.emit(FramesFailed {
                failures: report.failures,
            });
        }

        self.events.emit(RequestHandled);
    }

    pub fn state(&self) -> CacheState {
        self.state
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.state, CacheState::Loading { .. })
    }

    pub fn pending_window(&self) -> Option<PendingWindow> {
        match self.state {
            CacheState::Loading { pending, .. } => Some(pending),
            CacheState::Idle => None,
        }
    }

    pub fn safe_region(&self) -> Region {
        self.safe
    }

    pub fn prefetch_region(&self) -> Region {
        self.prefetch
    }

    pub fn catalog(&self) -> &SequenceCatalog {
        &self.catalog
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.events
    }

    pub fn store(&self) -> &Arc<dyn ImageStore> {
        &self.store
    }

    pub fn decode_params(&self) -> DecodeParams {
        self.params
    }

    /// (prefetch, safe)
    pub fn radii(&self) -> (usize, usize) {
        (self.prefetch_radius, self.safe_radius)
    }
}
