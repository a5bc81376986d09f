//! Segmentation points over the reference (video) timeline.

use std::time::Duration;

use crate::mp4::TrackInfo;
use crate::Result;

/// A sync sample that starts a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentationPoint {
    /// 1-based sample number in the reference track.
    pub sample_num: u32,
    /// Decode time in reference timescale units.
    pub decode_time: u64,
    /// Presentation time (decode time plus composition offset).
    pub presentation_time: u64,
}

/// Segment length in reference units; never below one unit.
pub fn segment_step(segment_duration: Duration, timescale: u32) -> u64 {
    let step = segment_duration.as_millis() as u64 * u64::from(timescale) / 1000;
    step.max(1)
}

/// Choose segment start points on the reference track.
///
/// Walks the sync samples in order and emits one the first time its
/// presentation time reaches the next boundary, then moves the boundary on
/// by one segment duration. The first sync sample always starts a segment.
pub fn segmentation_points(
    track: &TrackInfo,
    segment_duration: Duration,
) -> Result<Vec<SegmentationPoint>> {
    let table = &track.samples;
    let step = segment_step(segment_duration, track.timescale);

    let sync_samples: Vec<u32> = match &table.stss {
        Some(stss) => stss.samples.clone(),
        None => (1..=table.sample_count()).collect(),
    };

    let mut points = Vec::new();
    let mut next_boundary = 0u64;
    for nr in sync_samples {
        let decode_time = table.stts.time(nr)?;
        let presentation_time =
            (decode_time as i64 + i64::from(table.composition_offset(nr))).max(0) as u64;
        if points.is_empty() || presentation_time >= next_boundary {
            points.push(SegmentationPoint {
                sample_num: nr,
                decode_time,
                presentation_time,
            });
            next_boundary += step;
        }
    }

    Ok(points)
}
