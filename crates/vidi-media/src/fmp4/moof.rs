//! Media segments: styp + moof + mdat for one track fragment.

use bytes::{BufMut, Bytes, BytesMut};
use std::io::{self, Write};

use super::boxes::write_type_box;
use super::Encode;
use crate::segment::FullSample;

// trun flags
const DATA_OFFSET_PRESENT: u32 = 0x000001;
const SAMPLE_DURATION_PRESENT: u32 = 0x000100;
const SAMPLE_SIZE_PRESENT: u32 = 0x000200;
const SAMPLE_FLAGS_PRESENT: u32 = 0x000400;
const SAMPLE_CTO_PRESENT: u32 = 0x000800;

// tfhd flags
const DEFAULT_BASE_IS_MOOF: u32 = 0x020000;

/// Builder for the moof box of one fragment.
pub struct MoofBuilder {
    sequence_number: u32,
    track_id: u32,
}

impl MoofBuilder {
    /// Create a new moof builder.
    pub fn new(sequence_number: u32, track_id: u32) -> Self {
        Self {
            sequence_number,
            track_id,
        }
    }

    /// Build the moof box followed by the mdat header for `samples`.
    pub fn build(&self, samples: &[FullSample]) -> Vec<u8> {
        let mut buf = BytesMut::with_capacity(256 + samples.len() * 16);
        let data_size: u64 = samples.iter().map(|s| u64::from(s.size())).sum();
        let mdat_header_size = if data_size + 8 > u64::from(u32::MAX) { 16 } else { 8 };

        self.write_moof(&mut buf, samples, mdat_header_size);
        write_mdat_header(&mut buf, data_size);

        buf.to_vec()
    }

    fn write_moof(&self, buf: &mut BytesMut, samples: &[FullSample], mdat_header_size: usize) {
        let moof_start = buf.len();
        buf.put_u32(0); // placeholder
        buf.put_slice(b"moof");

        buf.put_u32(16);
        buf.put_slice(b"mfhd");
        buf.put_u32(0); // version/flags
        buf.put_u32(self.sequence_number);

        let data_offset_pos = self.write_traf(buf, samples);

        let moof_size = buf.len() - moof_start;
        buf[moof_start..moof_start + 4].copy_from_slice(&(moof_size as u32).to_be_bytes());

        // default-base-is-moof: offset counts from the first byte of moof.
        let data_offset = (moof_size + mdat_header_size) as i32;
        buf[data_offset_pos..data_offset_pos + 4].copy_from_slice(&data_offset.to_be_bytes());
    }

    /// Write traf and return the position of the trun data offset field.
    fn write_traf(&self, buf: &mut BytesMut, samples: &[FullSample]) -> usize {
        let traf_start = buf.len();
        buf.put_u32(0);
        buf.put_slice(b"traf");

        buf.put_u32(16);
        buf.put_slice(b"tfhd");
        buf.put_u32(DEFAULT_BASE_IS_MOOF);
        buf.put_u32(self.track_id);

        buf.put_u32(20);
        buf.put_slice(b"tfdt");
        buf.put_u32(0x0100_0000); // version 1
        buf.put_u64(samples.first().map_or(0, |s| s.decode_time));

        let data_offset_pos = write_trun(buf, samples);

        let traf_size = buf.len() - traf_start;
        buf[traf_start..traf_start + 4].copy_from_slice(&(traf_size as u32).to_be_bytes());
        data_offset_pos
    }
}

fn write_trun(buf: &mut BytesMut, samples: &[FullSample]) -> usize {
    let flags = DATA_OFFSET_PRESENT
        | SAMPLE_DURATION_PRESENT
        | SAMPLE_SIZE_PRESENT
        | SAMPLE_FLAGS_PRESENT
        | SAMPLE_CTO_PRESENT;
    // Version 1 makes the composition offsets signed.
    let version: u32 = if samples.iter().any(|s| s.composition_offset < 0) {
        1
    } else {
        0
    };

    // header, version/flags, sample count, data offset
    let size = 8 + 4 + 4 + 4 + samples.len() * 16;
    buf.put_u32(size as u32);
    buf.put_slice(b"trun");
    buf.put_u32((version << 24) | flags);
    buf.put_u32(samples.len() as u32);

    let data_offset_pos = buf.len();
    buf.put_i32(0); // patched once moof size is known

    for sample in samples {
        buf.put_u32(sample.duration);
        buf.put_u32(sample.size());
        buf.put_u32(sample.flags.encode());
        buf.put_i32(sample.composition_offset);
    }

    data_offset_pos
}

fn write_mdat_header(buf: &mut BytesMut, data_size: u64) {
    if data_size + 8 > u64::from(u32::MAX) {
        buf.put_u32(1);
        buf.put_slice(b"mdat");
        buf.put_u64(data_size + 16);
    } else {
        buf.put_u32((data_size + 8) as u32);
        buf.put_slice(b"mdat");
    }
}

/// A media segment ready to be written: styp, moof and mdat with samples.
#[derive(Debug, Clone)]
pub struct MediaSegment {
    pub sequence_number: u32,
    header: Bytes,
    samples: Vec<FullSample>,
}

impl MediaSegment {
    /// Wrap `samples` in a single-fragment segment.
    pub fn new(sequence_number: u32, track_id: u32, samples: Vec<FullSample>) -> Self {
        let styp = write_type_box(b"styp", b"msdh", &[b"msdh"]);
        let moof = MoofBuilder::new(sequence_number, track_id).build(&samples);

        let mut header = BytesMut::with_capacity(styp.len() + moof.len());
        header.put_slice(&styp);
        header.put_slice(&moof);

        Self {
            sequence_number,
            header: header.freeze(),
            samples,
        }
    }

    pub fn samples(&self) -> &[FullSample] {
        &self.samples
    }
}

impl Encode for MediaSegment {
    fn size(&self) -> u64 {
        self.header.len() as u64 + self.samples.iter().map(|s| u64::from(s.size())).sum::<u64>()
    }

    fn encode(&self, w: &mut dyn Write) -> io::Result<()> {
        w.write_all(&self.header)?;
        for sample in &self.samples {
            w.write_all(&sample.data)?;
        }
        Ok(())
    }
}
