//! Playback metadata attached to a `ready` video.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// MIME type advertised for video adaptation sets.
pub const VIDEO_MIME: &str = "video/mp4";
/// MIME type advertised for audio adaptation sets.
pub const AUDIO_MIME: &str = "audio/mp4";
/// Suffix appended to a track name to form its init segment name.
pub const INIT_SUFFIX: &str = "_init.mp4";

/// Playback description of a segmented asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meta {
    pub tracks: Vec<Track>,
    /// Total duration in whole seconds.
    pub duration: u64,
}

/// One DASH representation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    /// Handler type plus ordinal, e.g. `vide1`.
    pub name: String,
    pub mime_type: String,
    pub codec: Codec,
    pub segment: SegmentInfo,
}

/// RFC 6381 codec description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Codec {
    pub profile: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample_rate: Option<u32>,
}

/// Segment template parameters for a track.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentInfo {
    pub init: String,
    pub start_number: u32,
    /// Nominal segment duration in `timescale` units.
    pub duration: u64,
    pub timescale: u32,
}

impl Track {
    pub fn is_video(&self) -> bool {
        self.mime_type == VIDEO_MIME
    }

    pub fn is_audio(&self) -> bool {
        self.mime_type == AUDIO_MIME
    }
}

impl Meta {
    /// Exactly one video track, and every track has a usable segment template.
    pub fn validate(&self) -> Result<()> {
        let videos = self.tracks.iter().filter(|t| t.is_video()).count();
        if videos != 1 {
            return Err(Error::invalid_input(format!(
                "playback meta needs exactly one video track, found {videos}"
            )));
        }
        for track in &self.tracks {
            if track.segment.timescale == 0 {
                return Err(Error::invalid_input(format!(
                    "track {} has zero timescale",
                    track.name
                )));
            }
            if track.segment.duration == 0 {
                return Err(Error::invalid_input(format!(
                    "track {} has zero segment duration",
                    track.name
                )));
            }
        }
        Ok(())
    }

    pub fn video_track(&self) -> Option<&Track> {
        self.tracks.iter().find(|t| t.is_video())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(name: &str, mime: &str, timescale: u32) -> Track {
        Track {
            name: name.into(),
            mime_type: mime.into(),
            codec: Codec {
                profile: "x".into(),
                sample_rate: None,
            },
            segment: SegmentInfo {
                init: INIT_SUFFIX.into(),
                start_number: 1,
                duration: 3 * u64::from(timescale),
                timescale,
            },
        }
    }

    #[test]
    fn validate_ok() {
        let meta = Meta {
            tracks: vec![track("vide1", VIDEO_MIME, 15360), track("soun1", AUDIO_MIME, 48000)],
            duration: 10,
        };
        meta.validate().unwrap();
        assert_eq!(meta.video_track().unwrap().name, "vide1");
    }

    #[test]
    fn validate_requires_single_video() {
        let meta = Meta {
            tracks: vec![track("soun1", AUDIO_MIME, 48000)],
            duration: 10,
        };
        assert!(meta.validate().is_err());

        let meta = Meta {
            tracks: vec![track("vide1", VIDEO_MIME, 1), track("vide2", VIDEO_MIME, 1)],
            duration: 10,
        };
        assert!(meta.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_timescale() {
        let meta = Meta {
            tracks: vec![track("vide1", VIDEO_MIME, 0)],
            duration: 10,
        };
        assert!(matches!(meta.validate(), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn codec_sample_rate_omitted_when_absent() {
        let json = serde_json::to_value(track("vide1", VIDEO_MIME, 1)).unwrap();
        assert!(json["codec"].get("sample_rate").is_none());
    }
}
