//! Core engine modules - window math, image store, loader, workers, events
//!
//! `sequence_cache` ties these together; everything here is independent of
//! any UI and talks to decoding only through the `entities` traits.

pub mod cache_events;
pub mod cache_man;
pub mod catalog;
pub mod event_bus;
pub mod image_store;
pub mod prefetch_loader;
pub mod region;
pub mod sequence_cache;
pub mod workers;

#[cfg(test)]
pub(crate) mod testing;

// Re-exports for convenience
pub use cache_events::{FramesFailed, RequestHandled, SequenceChanged};
pub use cache_man::MemoryBudget;
pub use catalog::{HeaderPolicy, SequenceCatalog};
pub use event_bus::EventBus;
pub use image_store::{CacheStats, DecodedImageStore};
pub use prefetch_loader::{BackgroundLoader, FrameFailure, LoadReport, LoadRequest};
pub use region::{Region, compute_region};
pub use sequence_cache::{CacheState, PendingWindow, Response, SequenceCache};
pub use workers::Workers;
