//! Events published by `SequenceCache` on its `EventBus`.

use super::prefetch_loader::FrameFailure;

/// A background load finished; state changed, re-request any frame that
/// previously got an empty response.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RequestHandled;

/// Frames of the last completed window that failed to load.
///
/// Emitted before `RequestHandled` for the same load. These frames keep
/// answering empty until a later window includes them again.
#[derive(Clone, Debug)]
pub struct FramesFailed {
    pub failures: Vec<FrameFailure>,
}

/// Catalog was replaced; all previous frame indices are invalid.
#[derive(Clone, Debug)]
pub struct SequenceChanged {
    pub frames: usize,
}
