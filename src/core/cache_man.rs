//! Memory budget for the decoded image store
//!
//! **Why**: Full-float RGBA frames are large (a 4K frame is ~128MB), so the
//! entry-count capacity alone can't keep the store from exhausting RAM.
//!
//! **Used by**: DecodedImageStore (add/free on insert/evict)

use log::{debug, info};
use std::sync::atomic::{AtomicUsize, Ordering};
use sysinfo::System;

/// Byte budget with lock-free usage tracking
#[derive(Debug)]
pub struct MemoryBudget {
    /// Tracked memory usage (bytes)
    usage: AtomicUsize,
    /// Maximum allowed memory (bytes)
    limit: usize,
}

/// Fraction of available memory minus a reserve, in bytes
fn limit_from_system(mem_fraction: f64, reserve_gb: f64) -> (usize, usize) {
    let mut sys = System::new();
    sys.refresh_memory();

    let available = sys.available_memory() as usize;
    let reserve = (reserve_gb * 1024.0 * 1024.0 * 1024.0) as usize;
    let usable = available.saturating_sub(reserve);
    let limit = (usable as f64 * mem_fraction.clamp(0.0, 1.0)) as usize;
    (available, limit)
}

impl MemoryBudget {
    /// Budget derived from currently available system memory
    ///
    /// # Arguments
    ///
    /// * `mem_fraction` - Fraction of available memory (0.0-1.0, e.g. 0.5 = 50%)
    /// * `reserve_gb` - Memory left to the system (GB, e.g. 2.0 = 2GB)
    pub fn from_system(mem_fraction: f64, reserve_gb: f64) -> Self {
        let (available, limit) = limit_from_system(mem_fraction, reserve_gb);

        info!(
            "MemoryBudget: available={} MB, reserve={} GB, limit={} MB ({}%)",
            available / 1024 / 1024,
            reserve_gb,
            limit / 1024 / 1024,
            (mem_fraction * 100.0) as u32
        );

        Self::with_limit(limit)
    }

    /// Fixed byte limit
    pub fn with_limit(limit_bytes: usize) -> Self {
        Self {
            usage: AtomicUsize::new(0),
            limit: limit_bytes,
        }
    }

    pub fn exceeded(&self) -> bool {
        self.usage.load(Ordering::Relaxed) > self.limit
    }

    /// (usage, limit) in bytes
    pub fn mem(&self) -> (usize, usize) {
        (self.usage.load(Ordering::Relaxed), self.limit)
    }

    /// Usage fraction (0.0-1.0, can exceed 1.0 briefly before eviction)
    pub fn usage_fraction(&self) -> f64 {
        let (usage, limit) = self.mem();
        if limit == 0 {
            0.0
        } else {
            usage as f64 / limit as f64
        }
    }

    pub fn add(&self, bytes: usize) {
        let new_usage = self.usage.fetch_add(bytes, Ordering::Relaxed) + bytes;
        if new_usage > self.limit {
            debug!(
                "Memory budget exceeded: {} MB / {} MB",
                new_usage / 1024 / 1024,
                self.limit / 1024 / 1024
            );
        }
    }

    /// Saturating: never underflows on double-free
    pub fn free(&self, bytes: usize) {
        let _ = self
            .usage
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |current| {
                Some(current.saturating_sub(bytes))
            });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_system_has_no_usage() {
        let budget = MemoryBudget::from_system(0.5, 1.0);
        let (usage, _limit) = budget.mem();
        assert_eq!(usage, 0);
    }

    #[test]
    fn test_memory_tracking() {
        let budget = MemoryBudget::with_limit(1024 * 1024);

        budget.add(768 * 1024);
        assert!(!budget.exceeded());
        assert_eq!(budget.usage_fraction(), 0.75);

        budget.add(512 * 1024);
        assert!(budget.exceeded());

        budget.free(1024 * 1024);
        assert_eq!(budget.mem().0, 256 * 1024);
    }

    #[test]
    fn test_free_saturates() {
        let budget = MemoryBudget::with_limit(100);
        budget.add(10);
        budget.free(50);
        assert_eq!(budget.mem().0, 0);
    }
}
