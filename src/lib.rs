//! seqcache - windowed prefetch cache for image sequence viewers
//!
//! Re-exports all modules for use by binary targets.

// Core engine (catalog, cache, loader, workers, events)
pub mod core;

// Data types and capability traits
pub mod entities;

// App modules
pub mod cli;
pub mod config;
pub mod utils;

// Re-export commonly used types from core
pub use crate::core::event_bus::{BoxedEvent, EventBus, downcast_event};
pub use crate::core::{
    CacheState, FramesFailed, HeaderPolicy, Region, RequestHandled, Response, SequenceCache,
    SequenceChanged,
};

// Re-export entities
pub use config::CacheConfig;
pub use entities::{
    DecodeParams, Dimensions, FrameDescriptor, FrameError, ImageHandle, Metadata, PixelFormat,
};
