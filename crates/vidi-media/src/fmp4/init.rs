//! Per-track initialization segments (ftyp + moov with mvex).

use bytes::Bytes;
use std::io::{self, Write};

use super::boxes::{
    fullbox_header, write_box, write_container_box, write_type_box, UNITY_MATRIX,
};
use super::Encode;
use crate::mp4::{HandlerType, SampleEntry, SampleEntryKind, TrackInfo};

/// Track id every output init and fragment uses.
pub const OUTPUT_TRACK_ID: u32 = 1;

/// The single track described by an init segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputTrak {
    pub track_id: u32,
    pub handler: HandlerType,
    pub timescale: u32,
    pub language: u16,
}

/// Serialized initialization segment for one track.
#[derive(Debug, Clone)]
pub struct InitSegment {
    pub data: Bytes,
    pub trak: OutputTrak,
}

impl InitSegment {
    /// Build an init segment carrying one track cloned from `source`.
    ///
    /// The movie uses the reference timescale and advertises the whole
    /// reference duration in `mehd`. The track keeps the source timescale,
    /// handler and language and copies `entry` verbatim into its `stsd`.
    pub fn for_track(
        source: &TrackInfo,
        entry: &SampleEntry,
        reference_timescale: u32,
        reference_duration: u64,
    ) -> Self {
        let trak = OutputTrak {
            track_id: OUTPUT_TRACK_ID,
            handler: source.handler,
            timescale: source.timescale,
            language: source.language,
        };

        let ftyp = write_type_box(b"ftyp", b"iso6", &[b"iso6", b"cmfc", b"dash"]);
        let mvhd = write_mvhd(reference_timescale, trak.track_id + 1);
        let mvex = write_mvex(reference_duration, trak.track_id);
        let trak_box = write_trak(&trak, entry);
        let moov = write_container_box(b"moov", &[&mvhd, &mvex, &trak_box]);

        let mut data = Vec::with_capacity(ftyp.len() + moov.len());
        data.extend_from_slice(&ftyp);
        data.extend_from_slice(&moov);

        InitSegment {
            data: Bytes::from(data),
            trak,
        }
    }
}

impl Encode for InitSegment {
    fn size(&self) -> u64 {
        self.data.len() as u64
    }

    fn encode(&self, w: &mut dyn Write) -> io::Result<()> {
        w.write_all(&self.data)
    }
}

fn write_mvhd(timescale: u32, next_track_id: u32) -> Vec<u8> {
    let mut content = Vec::with_capacity(112);
    content.extend_from_slice(&fullbox_header(1, 0));
    content.extend_from_slice(&0u64.to_be_bytes()); // creation time
    content.extend_from_slice(&0u64.to_be_bytes()); // modification time
    content.extend_from_slice(&timescale.to_be_bytes());
    content.extend_from_slice(&0u64.to_be_bytes()); // duration lives in mehd
    content.extend_from_slice(&0x0001_0000u32.to_be_bytes()); // rate 1.0
    content.extend_from_slice(&0x0100u16.to_be_bytes()); // volume 1.0
    content.extend_from_slice(&[0; 10]); // reserved
    for v in UNITY_MATRIX {
        content.extend_from_slice(&v.to_be_bytes());
    }
    content.extend_from_slice(&[0; 24]); // pre_defined
    content.extend_from_slice(&next_track_id.to_be_bytes());
    write_box(b"mvhd", &content)
}

fn write_mvex(fragment_duration: u64, track_id: u32) -> Vec<u8> {
    let mut mehd = Vec::with_capacity(12);
    mehd.extend_from_slice(&fullbox_header(1, 0));
    mehd.extend_from_slice(&fragment_duration.to_be_bytes());
    let mehd = write_box(b"mehd", &mehd);

    let mut trex = Vec::with_capacity(24);
    trex.extend_from_slice(&fullbox_header(0, 0));
    trex.extend_from_slice(&track_id.to_be_bytes());
    trex.extend_from_slice(&1u32.to_be_bytes()); // sample description index
    trex.extend_from_slice(&0u32.to_be_bytes()); // default duration
    trex.extend_from_slice(&0u32.to_be_bytes()); // default size
    trex.extend_from_slice(&0u32.to_be_bytes()); // default flags
    let trex = write_box(b"trex", &trex);

    write_container_box(b"mvex", &[&mehd, &trex])
}

fn write_trak(trak: &OutputTrak, entry: &SampleEntry) -> Vec<u8> {
    let tkhd = write_tkhd(trak, entry);
    let mdia = write_mdia(trak, entry);
    write_container_box(b"trak", &[&tkhd, &mdia])
}

fn write_tkhd(trak: &OutputTrak, entry: &SampleEntry) -> Vec<u8> {
    let (width, height) = match entry.kind {
        SampleEntryKind::Avc { width, height, .. } | SampleEntryKind::Hevc { width, height } => {
            (u32::from(width), u32::from(height))
        }
        _ => (0, 0),
    };

    let mut content = Vec::with_capacity(96);
    content.extend_from_slice(&fullbox_header(1, 0x3)); // enabled, in movie
    content.extend_from_slice(&0u64.to_be_bytes());
    content.extend_from_slice(&0u64.to_be_bytes());
    content.extend_from_slice(&trak.track_id.to_be_bytes());
    content.extend_from_slice(&0u32.to_be_bytes()); // reserved
    content.extend_from_slice(&0u64.to_be_bytes()); // duration
    content.extend_from_slice(&[0; 8]); // reserved
    content.extend_from_slice(&0u16.to_be_bytes()); // layer
    content.extend_from_slice(&0u16.to_be_bytes()); // alternate group
    let volume: u16 = if trak.handler.is_audio() { 0x0100 } else { 0 };
    content.extend_from_slice(&volume.to_be_bytes());
    content.extend_from_slice(&0u16.to_be_bytes());
    for v in UNITY_MATRIX {
        content.extend_from_slice(&v.to_be_bytes());
    }
    content.extend_from_slice(&(width << 16).to_be_bytes());
    content.extend_from_slice(&(height << 16).to_be_bytes());
    write_box(b"tkhd", &content)
}

fn write_mdia(trak: &OutputTrak, entry: &SampleEntry) -> Vec<u8> {
    let mut mdhd = Vec::with_capacity(36);
    mdhd.extend_from_slice(&fullbox_header(1, 0));
    mdhd.extend_from_slice(&0u64.to_be_bytes());
    mdhd.extend_from_slice(&0u64.to_be_bytes());
    mdhd.extend_from_slice(&trak.timescale.to_be_bytes());
    mdhd.extend_from_slice(&0u64.to_be_bytes());
    mdhd.extend_from_slice(&trak.language.to_be_bytes());
    mdhd.extend_from_slice(&0u16.to_be_bytes());
    let mdhd = write_box(b"mdhd", &mdhd);

    let name: &[u8] = match trak.handler {
        HandlerType::Video => b"VideoHandler",
        HandlerType::Audio => b"SoundHandler",
        HandlerType::Other(_) => b"Handler",
    };
    let mut hdlr = Vec::with_capacity(25 + name.len());
    hdlr.extend_from_slice(&fullbox_header(0, 0));
    hdlr.extend_from_slice(&0u32.to_be_bytes()); // pre_defined
    hdlr.extend_from_slice(&trak.handler.fourcc());
    hdlr.extend_from_slice(&[0; 12]);
    hdlr.extend_from_slice(name);
    hdlr.push(0);
    let hdlr = write_box(b"hdlr", &hdlr);

    let minf = write_minf(trak, entry);
    write_container_box(b"mdia", &[&mdhd, &hdlr, &minf])
}

fn write_minf(trak: &OutputTrak, entry: &SampleEntry) -> Vec<u8> {
    let media_header = match trak.handler {
        HandlerType::Video => {
            let mut vmhd = fullbox_header(0, 1).to_vec();
            vmhd.extend_from_slice(&[0; 8]); // graphics mode + opcolor
            write_box(b"vmhd", &vmhd)
        }
        HandlerType::Audio => {
            let mut smhd = fullbox_header(0, 0).to_vec();
            smhd.extend_from_slice(&[0; 4]); // balance + reserved
            write_box(b"smhd", &smhd)
        }
        HandlerType::Other(_) => write_box(b"nmhd", &fullbox_header(0, 0)),
    };

    let url = write_box(b"url ", &fullbox_header(0, 1)); // self-contained
    let mut dref = fullbox_header(0, 0).to_vec();
    dref.extend_from_slice(&1u32.to_be_bytes());
    dref.extend_from_slice(&url);
    let dref = write_box(b"dref", &dref);
    let dinf = write_container_box(b"dinf", &[&dref]);

    let mut stsd = fullbox_header(0, 0).to_vec();
    stsd.extend_from_slice(&1u32.to_be_bytes());
    stsd.extend_from_slice(&entry.raw);
    let stsd = write_box(b"stsd", &stsd);

    let empty_table = |name: &[u8; 4]| {
        let mut content = fullbox_header(0, 0).to_vec();
        content.extend_from_slice(&0u32.to_be_bytes());
        write_box(name, &content)
    };
    let stts = empty_table(b"stts");
    let stsc = empty_table(b"stsc");
    let stco = empty_table(b"stco");
    let mut stsz = fullbox_header(0, 0).to_vec();
    stsz.extend_from_slice(&[0; 8]); // sample size + count
    let stsz = write_box(b"stsz", &stsz);

    let stbl = write_container_box(b"stbl", &[&stsd, &stts, &stsc, &stsz, &stco]);
    write_container_box(b"minf", &[&media_header, &dinf, &stbl])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::Mp4Fixture;
    use crate::mp4::{Mp4File, ParseMode};
    use std::io::Cursor;

    fn find(data: &[u8], path: &[&[u8; 4]]) -> Option<Vec<u8>> {
        let mut pos = 0;
        while pos + 8 <= data.len() {
            let size = u32::from_be_bytes([data[pos], data[pos + 1], data[pos + 2], data[pos + 3]]) as usize;
            let name = &data[pos + 4..pos + 8];
            if name == path[0] {
                let payload = &data[pos + 8..pos + size];
                return if path.len() == 1 {
                    Some(payload.to_vec())
                } else {
                    find(payload, &path[1..])
                };
            }
            pos += size;
        }
        None
    }

    fn init_for(track_index: usize) -> (InitSegment, Mp4File) {
        let bytes = Mp4Fixture::default().build();
        let mp4 = Mp4File::parse(&mut Cursor::new(bytes), ParseMode::Lazy).unwrap();
        let reference = mp4.reference_track().unwrap();
        let track = &mp4.moov.tracks[track_index];
        let init = InitSegment::for_track(
            track,
            track.sample_entry().unwrap(),
            reference.timescale,
            reference.duration,
        );
        (init, mp4)
    }

    #[test]
    fn init_is_parseable_and_carries_entry() {
        let (init, mp4) = init_for(1);
        assert_eq!(init.trak.track_id, OUTPUT_TRACK_ID);
        assert_eq!(init.trak.timescale, 48000);
        assert!(init.trak.handler.is_audio());

        let parsed = Mp4File::parse(&mut Cursor::new(init.data.to_vec()), ParseMode::Eager).unwrap();
        assert_eq!(parsed.moov.timescale, 15360);
        assert_eq!(parsed.moov.tracks.len(), 1);
        let track = &parsed.moov.tracks[0];
        assert_eq!(track.track_id, 1);
        assert_eq!(track.timescale, 48000);
        assert_eq!(track.samples.sample_count(), 0);
        assert_eq!(
            track.sample_entry().unwrap().raw,
            mp4.moov.tracks[1].sample_entry().unwrap().raw
        );
    }

    #[test]
    fn mehd_has_reference_duration() {
        let (init, _) = init_for(0);
        let mehd = find(&init.data, &[b"moov", b"mvex", b"mehd"]).unwrap();
        assert_eq!(mehd[0], 1);
        assert_eq!(u64::from_be_bytes(mehd[4..12].try_into().unwrap()), 153_600);
        let trex = find(&init.data, &[b"moov", b"mvex", b"trex"]).unwrap();
        assert_eq!(u32::from_be_bytes(trex[4..8].try_into().unwrap()), 1);
        assert!(find(&init.data, &[b"moov", b"trak", b"mdia", b"minf", b"vmhd"]).is_some());
    }

    #[test]
    fn encode_matches_size() {
        let (init, _) = init_for(0);
        let mut out = Vec::new();
        init.encode(&mut out).unwrap();
        assert_eq!(out.len() as u64, init.size());
        assert_eq!(&out[4..8], b"ftyp");
    }

    #[test]
    fn deterministic() {
        let (a, _) = init_for(0);
        let (b, _) = init_for(0);
        assert_eq!(a.data, b.data);
    }
}
