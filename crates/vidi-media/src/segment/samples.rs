//! Sample extraction: timing, flags, and bytes for a sample interval.

use super::intervals::SampleInterval;
use crate::mp4::{Mp4File, ReadSeek, TrackInfo};
use crate::Result;

/// ISO-BMFF sample flags as carried in `trun`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SampleFlags {
    pub is_leading: u8,
    pub depends_on: u8,
    pub is_depended_on: u8,
    pub has_redundancy: u8,
    pub non_sync: bool,
}

impl SampleFlags {
    /// Flags of a sync sample: depends on no other sample.
    pub const SYNC: Self = Self {
        is_leading: 0,
        depends_on: 2,
        is_depended_on: 0,
        has_redundancy: 0,
        non_sync: false,
    };

    /// Overlay the four two-bit fields of an sdtp entry.
    pub fn with_sdtp(mut self, entry: u8) -> Self {
        self.is_leading = (entry >> 6) & 0x3;
        self.depends_on = (entry >> 4) & 0x3;
        self.is_depended_on = (entry >> 2) & 0x3;
        self.has_redundancy = entry & 0x3;
        self
    }

    /// Packed 32-bit representation.
    pub fn encode(&self) -> u32 {
        (u32::from(self.is_leading & 0x3) << 26)
            | (u32::from(self.depends_on & 0x3) << 24)
            | (u32::from(self.is_depended_on & 0x3) << 22)
            | (u32::from(self.has_redundancy & 0x3) << 20)
            | (u32::from(self.non_sync) << 16)
    }
}

/// A sample with everything needed to place it in a fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FullSample {
    pub flags: SampleFlags,
    pub decode_time: u64,
    pub duration: u32,
    pub composition_offset: i32,
    pub data: Vec<u8>,
}

impl FullSample {
    pub fn size(&self) -> u32 {
        self.data.len() as u32
    }
}

/// Flags of sample `nr` from stss and sdtp.
pub fn sample_flags(track: &TrackInfo, nr: u32) -> SampleFlags {
    let table = &track.samples;
    let mut flags = match &table.stss {
        Some(stss) if stss.is_sync(nr) => SampleFlags::SYNC,
        Some(_) => SampleFlags {
            non_sync: true,
            ..SampleFlags::default()
        },
        None => SampleFlags::default(),
    };
    if let Some(entry) = table.sdtp.as_ref().and_then(|sdtp| sdtp.get(nr)) {
        flags = flags.with_sdtp(entry);
    }
    flags
}

/// Read every sample of `interval` from `track`.
pub fn extract_samples(
    file: &Mp4File,
    track: &TrackInfo,
    interval: SampleInterval,
    mut source: Option<&mut dyn ReadSeek>,
) -> Result<Vec<FullSample>> {
    let table = &track.samples;
    let chunk_count = table.chunk_offsets.chunk_count();
    let mut samples = Vec::with_capacity(interval.len() as usize);
    // (chunk, next sample number, offset of that sample)
    let mut cursor: Option<(u32, u32, u64)> = None;

    for nr in interval.start..=interval.end {
        let (chunk, _) = table.stsc.chunk_for_sample(nr, chunk_count)?;
        let offset = match cursor {
            Some((c, next, offset)) if c == chunk && next == nr => offset,
            _ => table.sample_offset(nr)?,
        };
        let size = table.stsz.size(nr)?;
        cursor = Some((chunk, nr + 1, offset + u64::from(size)));

        let (decode_time, duration) = table.stts.time_and_duration(nr)?;
        let reader = source.as_mut().map(|s| &mut **s as &mut dyn ReadSeek);
        let data = file.read_sample_data(reader, offset, size)?;

        samples.push(FullSample {
            flags: sample_flags(track, nr),
            decode_time,
            duration,
            composition_offset: table.composition_offset(nr),
            data,
        });
    }

    Ok(samples)
}
