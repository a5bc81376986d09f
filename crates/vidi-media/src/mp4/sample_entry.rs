//! Sample description (stsd) entries.
//!
//! Entries are recognized by their four-character code and kept verbatim so
//! init segments can carry them unchanged.

use super::atoms::{be_u16, be_u32, AtomType};
use crate::{Error, Result};

/// Box header plus the fixed VisualSampleEntry fields.
const VISUAL_ENTRY_HEADER: usize = 8 + 78;
/// Box header plus the fixed AudioSampleEntry fields.
const AUDIO_ENTRY_HEADER: usize = 8 + 28;

/// Codec-specific view of a sample entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SampleEntryKind {
    /// `avc1`..`avc4` with the avcC payload when present.
    Avc {
        width: u16,
        height: u16,
        avcc: Option<Vec<u8>>,
    },
    /// `hvc1`/`hev1` family.
    Hevc { width: u16, height: u16 },
    /// `mp4a` with the esds payload (after version/flags) when present.
    Mp4a {
        channels: u16,
        sample_rate: u32,
        esds: Option<Vec<u8>>,
    },
    /// `ac-3`.
    Ac3,
    /// `ec-3`.
    Ec3,
    Unknown,
}

/// One entry of an stsd box.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleEntry {
    pub fourcc: AtomType,
    /// The complete entry box, header included.
    pub raw: Vec<u8>,
    pub kind: SampleEntryKind,
}

impl SampleEntry {
    /// Parse all entries of an stsd payload.
    pub fn parse_stsd(data: &[u8]) -> Result<Vec<SampleEntry>> {
        let count = be_u32(data, 4).ok_or_else(|| Error::invalid_mp4("stsd too short"))?;
        let mut entries = Vec::with_capacity(count.min(16) as usize);
        let mut pos = 8usize;
        for _ in 0..count {
            let size = be_u32(data, pos)
                .ok_or_else(|| Error::invalid_mp4("stsd entry header truncated"))?
                as usize;
            let raw = data
                .get(pos..pos + size)
                .filter(|_| size >= 8)
                .ok_or_else(|| Error::invalid_mp4("stsd entry truncated"))?;
            entries.push(Self::parse(raw.to_vec())?);
            pos += size;
        }
        Ok(entries)
    }

    /// Interpret a single entry box.
    pub fn parse(raw: Vec<u8>) -> Result<SampleEntry> {
        let code = raw
            .get(4..8)
            .ok_or_else(|| Error::invalid_mp4("sample entry shorter than its header"))?;
        let fourcc = AtomType([code[0], code[1], code[2], code[3]]);
        let kind = match &fourcc.0 {
            b"avc1" | b"avc2" | b"avc3" | b"avc4" => SampleEntryKind::Avc {
                width: be_u16(&raw, 8 + 24).unwrap_or(0),
                height: be_u16(&raw, 8 + 26).unwrap_or(0),
                avcc: find_child(&raw, VISUAL_ENTRY_HEADER, b"avcC").map(<[u8]>::to_vec),
            },
            b"hvc1" | b"hev1" | b"hvc2" | b"hev2" => SampleEntryKind::Hevc {
                width: be_u16(&raw, 8 + 24).unwrap_or(0),
                height: be_u16(&raw, 8 + 26).unwrap_or(0),
            },
            b"mp4a" => {
                // QuickTime sound entries v1/v2 carry extra fields before the children.
                let extra = match be_u16(&raw, 8 + 8).unwrap_or(0) {
                    1 => 16,
                    2 => 36,
                    _ => 0,
                };
                SampleEntryKind::Mp4a {
                    channels: be_u16(&raw, 8 + 16).unwrap_or(0),
                    sample_rate: be_u32(&raw, 8 + 24).unwrap_or(0) >> 16,
                    esds: find_child(&raw, AUDIO_ENTRY_HEADER + extra, b"esds")
                        .and_then(|payload| payload.get(4..))
                        .map(<[u8]>::to_vec),
                }
            }
            b"ac-3" => SampleEntryKind::Ac3,
            b"ec-3" => SampleEntryKind::Ec3,
            _ => SampleEntryKind::Unknown,
        };
        Ok(SampleEntry { fourcc, raw, kind })
    }
}

/// Payload of the first child box named `name`, scanning from `start`.
fn find_child<'a>(data: &'a [u8], start: usize, name: &[u8; 4]) -> Option<&'a [u8]> {
    let mut pos = start;
    while pos + 8 <= data.len() {
        let size = be_u32(data, pos)? as usize;
        if size < 8 || pos + size > data.len() {
            return None;
        }
        if &data[pos + 4..pos + 8] == name {
            return Some(&data[pos + 8..pos + size]);
        }
        pos += size;
    }
    None
}
