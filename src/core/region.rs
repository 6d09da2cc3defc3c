//! Inclusive frame-index windows and the window placement algorithm.

use std::fmt;
use std::ops::RangeInclusive;

/// Inclusive `(start, end)` frame window, or `Empty` for an empty catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Region {
    #[default]
    Empty,
    Span { start: usize, end: usize },
}

impl Region {
    pub fn new(start: usize, end: usize) -> Self {
        debug_assert!(start <= end, "inverted region {}..={}", start, end);
        Region::Span { start, end }
    }

    pub fn contains(&self, frame: usize) -> bool {
        match *self {
            Region::Empty => false,
            Region::Span { start, end } => frame >= start && frame <= end,
        }
    }

    /// Number of frames covered
    pub fn len(&self) -> usize {
        match *self {
            Region::Empty => 0,
            Region::Span { start, end } => end - start + 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Region::Empty)
    }

    pub fn bounds(&self) -> Option<(usize, usize)> {
        match *self {
            Region::Empty => None,
            Region::Span { start, end } => Some((start, end)),
        }
    }

    /// Frame indices in ascending order
    #[allow(clippy::reversed_empty_ranges)]
    pub fn frames(&self) -> RangeInclusive<usize> {
        match *self {
            Region::Empty => 1..=0,
            Region::Span { start, end } => start..=end,
        }
    }

    pub fn is_subset_of(&self, other: &Region) -> bool {
        match (*self, *other) {
            (Region::Empty, _) => true,
            (Region::Span { .. }, Region::Empty) => false,
            (Region::Span { start, end }, Region::Span { start: os, end: oe }) => {
                start >= os && end <= oe
            }
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Region::Empty => write!(f, "empty"),
            Region::Span { start, end } => write!(f, "({}, {})", start, end),
        }
    }
}

/// Window of `2 * extent + 1` frames centered on `frame` within `0..size`.
///
/// Near either boundary the window is shifted inward instead of shrunk, so the
/// width stays `min(size, 2 * extent + 1)`. The start clamp is evaluated
/// before the end clamp; a sequence shorter than the window yields `(0, size - 1)`.
pub fn compute_region(frame: usize, extent: usize, size: usize) -> Region {
    if size == 0 {
        return Region::Empty;
    }

    let last = size - 1;
    let width = extent.saturating_mul(2);

    if frame < extent {
        Region::new(0, last.min(width))
    } else if frame.saturating_add(extent) >= size {
        Region::new(last.saturating_sub(width), last)
    } else {
        Region::new(frame - extent, frame + extent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_width_is_constant_for_every_frame() {
        for size in [1usize, 2, 7, 10, 41, 61, 100, 257] {
            for extent in [0usize, 1, 5, 20, 30] {
                let expected = size.min(2 * extent + 1);
                for frame in 0..size {
                    let region = compute_region(frame, extent, size);
                    assert_eq!(
                        region.len(),
                        expected,
                        "size={} extent={} frame={} -> {}",
                        size,
                        extent,
                        frame,
                        region
                    );
                    assert!(region.contains(frame));
                    let (_, end) = region.bounds().unwrap();
                    assert!(end < size);
                }
            }
        }
    }

    #[test]
    fn test_centered_window() {
        assert_eq!(compute_region(50, 30, 100), Region::new(20, 80));
        assert_eq!(compute_region(50, 20, 100), Region::new(30, 70));
    }

    #[test]
    fn test_edges_shift_inward() {
        assert_eq!(compute_region(3, 20, 100), Region::new(0, 40));
        assert_eq!(compute_region(85, 30, 100), Region::new(39, 99));
        assert_eq!(compute_region(99, 20, 100), Region::new(59, 99));
    }

    #[test]
    fn test_short_sequence_collapses_to_whole() {
        for frame in 0..10 {
            assert_eq!(compute_region(frame, 30, 10), Region::new(0, 9));
        }
    }

    #[test]
    fn test_empty_sequence() {
        let region = compute_region(0, 30, 0);
        assert_eq!(region, Region::Empty);
        assert!(!region.contains(0));
        assert_eq!(region.frames().count(), 0);
    }

    #[test]
    fn test_subset() {
        let prefetch = Region::new(20, 80);
        assert!(Region::new(30, 70).is_subset_of(&prefetch));
        assert!(!Region::new(10, 70).is_subset_of(&prefetch));
        assert!(Region::Empty.is_subset_of(&prefetch));
        assert!(!prefetch.is_subset_of(&Region::Empty));
    }
}
