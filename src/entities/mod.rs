//! Entities module - plain data types and the capability traits around them
//!
//! Nothing in here knows about threads or windows; `core` builds the cache
//! on top of these.

pub mod descriptor;
pub mod frame;
pub mod loader;
pub mod metadata;
pub mod traits;

pub use descriptor::{Dimensions, FrameDescriptor};
pub use frame::{FrameError, ImageHandle, PixelBuffer, PixelFormat};
pub use loader::ImageLoader;
pub use metadata::Metadata;
pub use traits::{DecodeParams, FrameDecoder, ImageKey, ImageStore, WorkerPool};
