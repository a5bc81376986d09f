//! Segmentation primitives.
//!
//! - `points` - sync-aligned segment starts on the reference track
//! - `intervals` - per-track sample ranges for each segment
//! - `samples` - sample timing, flags, and bytes for a range

mod intervals;
mod points;
mod samples;

pub use intervals::{sample_intervals, SampleInterval};
pub use points::{segment_step, segmentation_points, SegmentationPoint};
pub use samples::{extract_samples, sample_flags, FullSample, SampleFlags};
