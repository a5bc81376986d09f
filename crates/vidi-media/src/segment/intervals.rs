//! Per-track sample intervals aligned to the reference segmentation points.

use super::points::SegmentationPoint;
use crate::mp4::TrackInfo;

/// Inclusive 1-based sample range of one segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleInterval {
    pub start: u32,
    pub end: u32,
}

impl SampleInterval {
    /// An interval with no samples; the caller skips that segment.
    pub fn is_empty(&self) -> bool {
        self.start > self.end
    }

    pub fn len(&self) -> u32 {
        if self.is_empty() {
            0
        } else {
            self.end - self.start + 1
        }
    }
}

/// Map every segmentation point onto `track`'s samples.
///
/// Segment `i` starts where segment `i-1` stopped. Its end is the sample
/// just before the one found at the next point's decode time, translated
/// into the track's timescale. The final segment ends at
/// `sample_count - 1`.
pub fn sample_intervals(
    points: &[SegmentationPoint],
    reference_timescale: u32,
    track: &TrackInfo,
) -> Vec<SampleInterval> {
    let total = track.samples.sample_count();
    let mut intervals = Vec::with_capacity(points.len());
    let mut next_start = 1u32;

    for (i, _) in points.iter().enumerate() {
        let start = next_start;
        let end = match points.get(i + 1) {
            Some(next) => {
                let time = rescale(next.decode_time, reference_timescale, track.timescale);
                next_start = track.samples.stts.sample_at_time(time);
                next_start - 1
            }
            None => total.saturating_sub(1),
        };
        intervals.push(SampleInterval { start, end });
    }

    intervals
}

fn rescale(time: u64, from: u32, to: u32) -> u64 {
    if from == to || from == 0 {
        return time;
    }
    (u128::from(time) * u128::from(to) / u128::from(from)) as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::Mp4Fixture;
    use crate::mp4::{Mp4File, ParseMode};
    use crate::segment::points::segmentation_points;
    use std::io::Cursor;
    use std::time::Duration;

    fn parse(fixture: Mp4Fixture) -> Mp4File {
        Mp4File::parse(&mut Cursor::new(fixture.build()), ParseMode::Lazy).unwrap()
    }

    #[test]
    fn video_intervals_follow_points() {
        let mp4 = parse(Mp4Fixture::default());
        let video = mp4.reference_track().unwrap();
        let points = segmentation_points(video, Duration::from_secs(3)).unwrap();
        let intervals = sample_intervals(&points, video.timescale, video);

        assert_eq!(
            intervals,
            vec![
                SampleInterval { start: 1, end: 72 },
                SampleInterval { start: 73, end: 144 },
                SampleInterval { start: 145, end: 216 },
                SampleInterval { start: 217, end: 239 },
            ]
        );
    }

    #[test]
    fn audio_intervals_are_contiguous() {
        let mp4 = parse(Mp4Fixture::default());
        let video = mp4.reference_track().unwrap();
        let audio = &mp4.moov.tracks[1];
        let points = segmentation_points(video, Duration::from_secs(3)).unwrap();
        let intervals = sample_intervals(&points, video.timescale, audio);

        assert_eq!(intervals.len(), points.len());
        assert_eq!(intervals[0].start, 1);
        for pair in intervals.windows(2) {
            assert_eq!(pair[1].start, pair[0].end + 1);
        }
        // 3 s at 48 kHz is 140.625 frames of 1024, so sample 142 opens segment 2.
        assert_eq!(intervals[0].end, 141);
        assert_eq!(
            intervals.last().unwrap().end,
            audio.samples.sample_count() - 1
        );
    }

    #[test]
    fn empty_interval_detection() {
        let interval = SampleInterval { start: 5, end: 4 };
        assert!(interval.is_empty());
        assert_eq!(interval.len(), 0);
        assert_eq!(SampleInterval { start: 1, end: 3 }.len(), 3);
    }

    #[test]
    fn rescale_between_timescales() {
        assert_eq!(rescale(46080, 15360, 48000), 144000);
        assert_eq!(rescale(7, 1000, 1000), 7);
    }
}
