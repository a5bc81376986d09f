//! Vidi-Media: MP4 parsing, DASH segmentation, and MPD generation
//!
//! This crate turns a progressive MP4 into the artifacts a DASH player
//! needs: one init segment per track, time-aligned media segments, and the
//! manifest describing them.
//!
//! # Modules
//!
//! - `mp4` - MP4 container parsing (moov, sample tables, sample entries)
//! - `segment` - Segmentation points, per-track sample intervals, sample extraction
//! - `fmp4` - Fragmented MP4 serialization (init segment, styp/moof/mdat)
//! - `codec` - RFC 6381 codec strings for AVC and AAC
//! - `dash` - MPD rendering
//! - `segmenter` - The end-to-end flow over one file
//!
//! # Architecture
//!
//! Everything here is synchronous and works on `Read + Seek`. A file is
//! parsed either eagerly (mdat in memory) or lazily (mdat located only, sample
//! bytes read on demand from a caller-supplied reader). The segmenter then:
//!
//! 1. Chooses the first video track as the reference timeline
//! 2. Picks segment starts at sync samples, one per target duration
//! 3. Maps those starts onto every video and audio track's samples
//! 4. Writes init segments, then each track's media segments, to a sink

pub mod codec;
pub mod dash;
pub mod error;
pub mod fmp4;
pub mod mp4;
pub mod segment;
pub mod segmenter;

#[cfg(any(test, feature = "fixtures"))]
pub mod fixtures;

pub use codec::codec_for;
pub use dash::{render_mpd, Mpd, MPD_CONTENT_TYPE};
pub use error::{Error, Result};
pub use fmp4::{Encode, InitSegment, MediaSegment};
pub use mp4::{Mp4File, ParseMode, ReadSeek};
pub use segmenter::{
    init_segment_name, media_segment_name, OutputTrack, SegmentOutput, SegmentSink, Segmenter,
    DEFAULT_SEGMENT_DURATION,
};
