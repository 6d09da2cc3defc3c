//! Decoded image store with LRU eviction
//!
//! Default `ImageStore` implementation:
//! - `lru::LruCache` keyed by `ImageKey` (path + decode params)
//! - entry-count capacity (LruCache cap) plus a byte budget (`MemoryBudget`)
//! - decode on miss through the injected `FrameDecoder`, outside the lock
//!
//! `contains()` never touches LRU order, so scanning residency for the
//! timeline does not keep stale frames alive.

use log::{debug, trace};
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use super::cache_man::MemoryBudget;
use crate::entities::{FrameDecoder, FrameError, ImageHandle, ImageKey, ImageStore};

/// Cache statistics for monitoring performance
#[derive(Debug, Default)]
pub struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl CacheStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_eviction(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }

    pub fn hit_rate(&self) -> f64 {
        let total = self.hits() + self.misses();
        if total == 0 { 0.0 } else { self.hits() as f64 / total as f64 }
    }
}

pub struct DecodedImageStore {
    entries: Mutex<LruCache<ImageKey, ImageHandle>>,
    decoder: Arc<dyn FrameDecoder>,
    budget: Arc<MemoryBudget>,
    stats: Arc<CacheStats>,
}

impl std::fmt::Debug for DecodedImageStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecodedImageStore")
            .field("len", &self.len())
            .field("capacity", &self.capacity())
            .field("memory", &self.budget.mem())
            .finish()
    }
}

impl DecodedImageStore {
    /// # Arguments
    /// * `capacity` - Maximum resident images (min 1)
    /// * `budget` - Byte budget shared with whoever reports memory usage
    /// * `decoder` - Used on miss
    pub fn new(capacity: usize, budget: Arc<MemoryBudget>, decoder: Arc<dyn FrameDecoder>) -> Self {
        let cap = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        debug!("DecodedImageStore created: capacity={}, budget={:?}", cap, budget.mem());

        Self {
            entries: Mutex::new(LruCache::new(cap)),
            decoder,
            budget,
            stats: Arc::new(CacheStats::new()),
        }
    }

    /// Insert decoded image, evicting least recently used entries while over
    /// capacity or over the byte budget. The newest entry is never evicted.
    pub fn insert(&self, key: ImageKey, image: ImageHandle) {
        let size = image.mem();
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());

        // push() returns the replaced value or the capacity-evicted LRU entry
        if let Some((old_key, old)) = entries.push(key.clone(), image) {
            self.budget.free(old.mem());
            if old_key != key {
                self.stats.record_eviction();
                trace!("LRU evicted (capacity): {}", old_key.path.display());
            }
        }
        self.budget.add(size);

        while self.budget.exceeded() && entries.len() > 1 {
            match entries.pop_lru() {
                Some((evicted_key, evicted)) => {
                    self.budget.free(evicted.mem());
                    self.stats.record_eviction();
                    trace!(
                        "LRU evicted (memory): {} ({} MB)",
                        evicted_key.path.display(),
                        evicted.mem() / 1024 / 1024
                    );
                }
                None => break,
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        for (_, image) in entries.iter() {
            self.budget.free(image.mem());
        }
        entries.clear();
        debug!("Cleared image store");
    }

    pub fn stats(&self) -> Arc<CacheStats> {
        Arc::clone(&self.stats)
    }

    /// (usage, limit) in bytes
    pub fn memory(&self) -> (usize, usize) {
        self.budget.mem()
    }
}

impl ImageStore for DecodedImageStore {
    fn contains(&self, key: &ImageKey) -> bool {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(key)
    }

    fn get(&self, key: &ImageKey) -> Result<ImageHandle, FrameError> {
        // Lock released before decoding so readers aren't stalled by I/O
        {
            let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(image) = entries.get(key) {
                self.stats.record_hit();
                return Ok(image.clone());
            }
        }

        self.stats.record_miss();
        let image = self.decoder.decode(&key.path, key.params)?;
        self.insert(key.clone(), image.clone());
        Ok(image)
    }

    fn capacity(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .cap()
            .get()
    }
}
