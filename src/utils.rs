//! Utility functions shared by the binary and library users
//!
//! **Used by**: `seqcache` binary (input expansion, log labels)

pub mod sequences;

pub use sequences::{
    describe_sequence, expand_inputs, format_frame_ranges, is_image, split_sequence_path,
};
