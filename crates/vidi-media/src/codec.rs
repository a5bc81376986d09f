//! RFC 6381 codec strings from sample entries.

use vidi_common::Codec;

use crate::mp4::{SampleEntry, SampleEntryKind};
use crate::{Error, Result};

const ES_DESCRIPTOR_TAG: u8 = 0x03;
const DECODER_CONFIG_TAG: u8 = 0x04;
const DEC_SPECIFIC_INFO_TAG: u8 = 0x05;

/// Codec description of a sample entry, as advertised in the manifest.
///
/// HEVC, AC-3 and E-AC-3 are recognized but rejected, as is anything
/// unknown.
pub fn codec_for(entry: &SampleEntry) -> Result<Codec> {
    match &entry.kind {
        SampleEntryKind::Avc { avcc, .. } => {
            let avcc = avcc.as_deref().ok_or(Error::MissingAtom("avcC"))?;
            Ok(Codec {
                profile: avc_profile(entry.fourcc.as_str(), avcc)?,
                sample_rate: None,
            })
        }
        SampleEntryKind::Mp4a {
            sample_rate, esds, ..
        } => {
            let esds = esds.as_deref().ok_or(Error::MissingAtom("esds"))?;
            let object_type = aac_object_type(esds)?;
            Ok(Codec {
                profile: mp4a_profile(object_type)?,
                sample_rate: Some(*sample_rate),
            })
        }
        SampleEntryKind::Hevc { .. } => Err(Error::unsupported(format!(
            "HEVC ({}) is not supported yet",
            entry.fourcc
        ))),
        SampleEntryKind::Ac3 => Err(Error::unsupported("AC-3 is not supported yet")),
        SampleEntryKind::Ec3 => Err(Error::unsupported("E-AC-3 is not supported yet")),
        SampleEntryKind::Unknown => Err(Error::unsupported(format!(
            "unknown sample entry {}",
            entry.fourcc
        ))),
    }
}

/// `avc1.PPCCLL` from the first bytes of an avcC payload.
pub fn avc_profile(fourcc: &str, avcc: &[u8]) -> Result<String> {
    match avcc {
        [_, profile, compatibility, level, ..] => Ok(format!(
            "{fourcc}.{profile:02x}{compatibility:02x}{level:02x}"
        )),
        _ => Err(Error::invalid_mp4("avcC too short")),
    }
}

/// `mp4a.40.N` for the supported AAC object types.
pub fn mp4a_profile(object_type: u8) -> Result<String> {
    match object_type {
        // AAC-LC, HE-AAC v1 (SBR), HE-AAC v2 (PS)
        2 | 5 | 29 => Ok(format!("mp4a.40.{object_type}")),
        other => Err(Error::unsupported(format!("AAC object type {other}"))),
    }
}

/// Audio object type from the AudioSpecificConfig inside an esds payload.
///
/// `esds` starts at the ES_Descriptor (version and flags already stripped).
pub fn aac_object_type(esds: &[u8]) -> Result<u8> {
    let (tag, es, _) = read_descriptor(esds)?;
    if tag != ES_DESCRIPTOR_TAG {
        return Err(Error::invalid_mp4(format!("esds starts with tag {tag:#x}")));
    }

    // ES_ID (2) and flags (1), then optional fields driven by the flags.
    let flags = *es.get(2).ok_or_else(|| Error::invalid_mp4("ES_Descriptor too short"))?;
    let mut pos = 3;
    if flags & 0x80 != 0 {
        pos += 2; // dependsOn_ES_ID
    }
    if flags & 0x40 != 0 {
        let url_len = *es.get(pos).ok_or_else(|| Error::invalid_mp4("ES_Descriptor URL"))?;
        pos += 1 + url_len as usize;
    }
    if flags & 0x20 != 0 {
        pos += 2; // OCR_ES_Id
    }

    let config = find_descriptor(es.get(pos..).unwrap_or_default(), DECODER_CONFIG_TAG)?
        .ok_or(Error::MissingAtom("DecoderConfigDescriptor"))?;
    // objectTypeIndication, streamType, bufferSizeDB, max and avg bitrate.
    let specific = find_descriptor(config.get(13..).unwrap_or_default(), DEC_SPECIFIC_INFO_TAG)?
        .ok_or(Error::MissingAtom("DecoderSpecificInfo"))?;

    audio_object_type(specific)
}

/// Leading audio object type of an AudioSpecificConfig.
fn audio_object_type(asc: &[u8]) -> Result<u8> {
    let first = *asc
        .first()
        .ok_or_else(|| Error::invalid_mp4("empty AudioSpecificConfig"))?;
    let object_type = first >> 3;
    if object_type != 31 {
        return Ok(object_type);
    }
    // Escape value: six more bits follow.
    let second = *asc
        .get(1)
        .ok_or_else(|| Error::invalid_mp4("truncated AudioSpecificConfig"))?;
    Ok(32 + (((first & 0x07) << 3) | (second >> 5)))
}

/// Read one descriptor: tag, body, and the bytes after it.
fn read_descriptor(data: &[u8]) -> Result<(u8, &[u8], &[u8])> {
    let tag = *data
        .first()
        .ok_or_else(|| Error::invalid_mp4("empty descriptor"))?;
    let mut len = 0usize;
    let mut pos = 1;
    // Up to four 7-bit length bytes with a continuation bit.
    loop {
        let byte = *data
            .get(pos)
            .ok_or_else(|| Error::invalid_mp4("truncated descriptor length"))?;
        len = (len << 7) | (byte & 0x7f) as usize;
        pos += 1;
        if byte & 0x80 == 0 || pos == 5 {
            break;
        }
    }
    let body = data
        .get(pos..pos + len)
        .ok_or_else(|| Error::invalid_mp4(format!("descriptor {tag:#x} overruns esds")))?;
    Ok((tag, body, &data[pos + len..]))
}

/// Body of the first descriptor with `tag` in a sequence of descriptors.
fn find_descriptor(mut data: &[u8], tag: u8) -> Result<Option<&[u8]>> {
    while !data.is_empty() {
        let (found, body, rest) = read_descriptor(data)?;
        if found == tag {
            return Ok(Some(body));
        }
        data = rest;
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{aac_esds, AVC_CONFIG};

    #[test]
    fn avc_profile_string() {
        assert_eq!(avc_profile("avc1", &AVC_CONFIG).unwrap(), "avc1.64001f");
        assert_eq!(avc_profile("avc3", &[1, 0x42, 0xc0, 0x1e]).unwrap(), "avc3.42c01e");
        assert!(avc_profile("avc1", &[1, 2]).is_err());
    }

    #[test]
    fn aac_object_types() {
        assert_eq!(aac_object_type(&aac_esds(2)).unwrap(), 2);
        assert_eq!(aac_object_type(&aac_esds(5)).unwrap(), 5);
        assert_eq!(aac_object_type(&aac_esds(29)).unwrap(), 29);
        assert_eq!(mp4a_profile(29).unwrap(), "mp4a.40.29");
        assert!(matches!(mp4a_profile(1), Err(Error::UnsupportedCodec(_))));
    }

    #[test]
    fn escaped_object_type() {
        // 31 escape followed by 6 bits = 10 -> 42
        let asc = [0b1111_1001, 0b0100_0000];
        assert_eq!(audio_object_type(&asc).unwrap(), 42);
    }

    #[test]
    fn long_form_lengths() {
        // Same descriptor chain with 4-byte lengths, as some muxers write.
        let esds = [
            0x03, 0x80, 0x80, 0x80, 0x1c, 0x00, 0x01, 0x00, //
            0x04, 0x80, 0x80, 0x80, 0x14, 0x40, 0x15, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, //
            0x05, 0x80, 0x80, 0x80, 0x02, 0x11, 0x90,
        ];
        assert_eq!(aac_object_type(&esds).unwrap(), 2);
    }

    #[test]
    fn malformed_esds() {
        assert!(aac_object_type(&[]).is_err());
        assert!(aac_object_type(&[0x04, 0x00]).is_err());
        assert!(aac_object_type(&[0x03, 0x10, 0x00]).is_err());
    }
}
