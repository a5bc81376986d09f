//! End-to-end segmentation of one progressive MP4.
//!
//! The segmenter picks the first video track as reference, splits its
//! timeline at sync samples, and writes for every video and audio track an
//! init segment (`<name>_init.mp4`) followed by its media segments
//! (`<name>_<n>.m4s`, `n` from 1) through a [`SegmentSink`].

use std::collections::HashMap;
use std::time::Duration;

use tracing::{debug, info, warn};
use vidi_common::{Codec, Meta, SegmentInfo, Track, AUDIO_MIME, INIT_SUFFIX, VIDEO_MIME};

use crate::codec::codec_for;
use crate::fmp4::{Encode, InitSegment, MediaSegment, OutputTrak};
use crate::mp4::{HandlerType, Mp4File, ReadSeek, TrackInfo};
use crate::segment::{extract_samples, sample_intervals, segment_step, segmentation_points};
use crate::Result;

/// Default target segment length.
pub const DEFAULT_SEGMENT_DURATION: Duration = Duration::from_secs(3);

/// Destination for encoded segments.
///
/// Returning an error aborts segmentation; `vidi_common::Error::Cancelled`
/// is how a cancelled run stops.
pub trait SegmentSink {
    fn store(&mut self, name: &str, artifact: &dyn Encode) -> vidi_common::Result<()>;
}

impl<F> SegmentSink for F
where
    F: FnMut(&str, &dyn Encode) -> vidi_common::Result<()>,
{
    fn store(&mut self, name: &str, artifact: &dyn Encode) -> vidi_common::Result<()> {
        self(name, artifact)
    }
}

/// Name of a track's init segment.
pub fn init_segment_name(track: &str) -> String {
    format!("{track}{INIT_SUFFIX}")
}

/// Name of a track's media segment `seg_num` (1-based).
pub fn media_segment_name(track: &str, seg_num: u32) -> String {
    format!("{track}_{seg_num}.m4s")
}

/// One retained source track and what was written for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputTrack {
    /// `<handler><n>`, e.g. `vide1`.
    pub name: String,
    pub handler: HandlerType,
    pub source_track_id: u32,
    /// Track described by the init segment; its id is used by every fragment.
    pub trak: OutputTrak,
    pub codec: Codec,
    /// Number of media segments stored.
    pub segments: u32,
}

/// Result of a segmentation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentOutput {
    pub tracks: Vec<OutputTrack>,
    /// Reference track timescale.
    pub timescale: u32,
    /// Reference track duration in `timescale` units.
    pub duration: u64,
}

impl SegmentOutput {
    /// Playback metadata for the written segments.
    pub fn meta(&self, segment_duration: Duration) -> Meta {
        let tracks = self
            .tracks
            .iter()
            .map(|track| Track {
                name: track.name.clone(),
                mime_type: if track.handler.is_video() {
                    VIDEO_MIME
                } else {
                    AUDIO_MIME
                }
                .to_string(),
                codec: track.codec.clone(),
                segment: SegmentInfo {
                    init: INIT_SUFFIX.to_string(),
                    start_number: 1,
                    duration: segment_step(segment_duration, track.trak.timescale),
                    timescale: track.trak.timescale,
                },
            })
            .collect();

        Meta {
            tracks,
            duration: if self.timescale == 0 {
                0
            } else {
                self.duration / u64::from(self.timescale)
            },
        }
    }
}

/// Segments MP4 files into DASH init and media segments.
#[derive(Debug, Clone, Copy)]
pub struct Segmenter {
    segment_duration: Duration,
}

impl Default for Segmenter {
    fn default() -> Self {
        Self::new(DEFAULT_SEGMENT_DURATION)
    }
}

struct Plan<'a> {
    source: &'a TrackInfo,
    name: String,
    init: InitSegment,
    codec: Codec,
}

impl Segmenter {
    pub fn new(segment_duration: Duration) -> Self {
        Self { segment_duration }
    }

    pub fn segment_duration(&self) -> Duration {
        self.segment_duration
    }

    /// Segment `file`, storing every artifact through `sink`.
    ///
    /// `source` supplies sample bytes when `file` was parsed lazily. Codec
    /// strings and init segments for all tracks are prepared before the
    /// first write, so an unsupported codec leaves the sink untouched. All
    /// init segments are stored before any media segment, and media
    /// segments go out in ascending order per track.
    pub fn segment<S: SegmentSink + ?Sized>(
        &self,
        file: &Mp4File,
        mut source: Option<&mut dyn ReadSeek>,
        sink: &mut S,
    ) -> Result<SegmentOutput> {
        let reference = file.reference_track()?;
        let points = segmentation_points(reference, self.segment_duration)?;
        debug!(
            reference_track = reference.track_id,
            points = points.len(),
            "Computed segmentation points"
        );

        let plans = self.plan(file, reference)?;

        for plan in &plans {
            let name = init_segment_name(&plan.name);
            sink.store(&name, &plan.init)?;
            debug!(track = %plan.name, "Stored init segment");
        }

        let mut tracks = Vec::with_capacity(plans.len());
        for plan in plans {
            let intervals = sample_intervals(&points, reference.timescale, plan.source);
            let mut written = 0;

            for (idx, interval) in intervals.into_iter().enumerate() {
                let seg_num = idx as u32 + 1;
                if interval.is_empty() {
                    debug!(track = %plan.name, seg_num, "No samples in segment, skipping");
                    continue;
                }
                let reader = source.as_mut().map(|s| &mut **s as &mut dyn ReadSeek);
                let samples = extract_samples(file, plan.source, interval, reader)?;
                let segment = MediaSegment::new(seg_num, plan.init.trak.track_id, samples);
                sink.store(&media_segment_name(&plan.name, seg_num), &segment)?;
                written += 1;
            }

            debug!(track = %plan.name, segments = written, "Stored media segments");
            tracks.push(OutputTrack {
                name: plan.name,
                handler: plan.source.handler,
                source_track_id: plan.source.track_id,
                trak: plan.init.trak,
                codec: plan.codec,
                segments: written,
            });
        }

        info!(
            tracks = tracks.len(),
            segments = points.len(),
            "Segmentation complete"
        );

        Ok(SegmentOutput {
            tracks,
            timescale: reference.timescale,
            duration: reference.duration,
        })
    }

    /// Retained tracks with their names, codecs and init segments.
    fn plan<'a>(&self, file: &'a Mp4File, reference: &TrackInfo) -> Result<Vec<Plan<'a>>> {
        let mut counters: HashMap<HandlerType, u32> = HashMap::new();
        let mut plans = Vec::new();

        for track in &file.moov.tracks {
            if !track.handler.is_video() && !track.handler.is_audio() {
                warn!(
                    track_id = track.track_id,
                    handler = %track.handler,
                    "Skipping track with unsupported handler"
                );
                continue;
            }

            let entry = track.sample_entry()?;
            let codec = codec_for(entry)?;
            let init = InitSegment::for_track(track, entry, reference.timescale, reference.duration);

            let n = counters.entry(track.handler).or_insert(0);
            *n += 1;
            plans.push(Plan {
                source: track,
                name: format!("{}{}", track.handler, n),
                init,
                codec,
            });
        }

        Ok(plans)
    }
}
