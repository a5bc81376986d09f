//! MP4 sample table boxes and lookups.
//!
//! Sample numbers are 1-based throughout, as in the boxes themselves:
//! - stts: sample durations (decoding time)
//! - ctts: composition time offsets (for B-frames)
//! - stss: sync sample table (keyframes)
//! - stsc: sample-to-chunk mapping
//! - stsz: sample sizes
//! - stco/co64: chunk offsets
//! - sdtp: independent and disposable sample flags

use super::atoms::{be_u32, be_u64};
use super::sample_entry::SampleEntry;
use crate::{Error, Result};

/// Full box payload sanity: version/flags plus an entry count.
fn entry_count(data: &[u8], name: &str) -> Result<usize> {
    be_u32(data, 4)
        .map(|n| n as usize)
        .ok_or_else(|| Error::invalid_mp4(format!("{name} too short")))
}

fn truncated(name: &str) -> Error {
    Error::invalid_mp4(format!("{name} entries truncated"))
}

/// One run of samples sharing a duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SttsEntry {
    pub count: u32,
    pub delta: u32,
}

/// Decoding time to sample (stts).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TimeToSample {
    pub entries: Vec<SttsEntry>,
}

impl TimeToSample {
    pub fn parse(data: &[u8]) -> Result<Self> {
        let count = entry_count(data, "stts")?;
        let mut entries = Vec::with_capacity(count.min(1 << 16));
        for i in 0..count {
            let pos = 8 + i * 8;
            let (Some(count), Some(delta)) = (be_u32(data, pos), be_u32(data, pos + 4)) else {
                return Err(truncated("stts"));
            };
            entries.push(SttsEntry { count, delta });
        }
        Ok(Self { entries })
    }

    pub fn sample_count(&self) -> u32 {
        self.entries.iter().map(|e| e.count).sum()
    }

    /// Sum of all sample durations.
    pub fn total_duration(&self) -> u64 {
        self.entries
            .iter()
            .map(|e| u64::from(e.count) * u64::from(e.delta))
            .sum()
    }

    /// Decode time and duration of sample `nr`.
    pub fn time_and_duration(&self, nr: u32) -> Result<(u64, u32)> {
        if nr == 0 {
            return Err(Error::out_of_bounds("sample number 0"));
        }
        let mut first = 1u32;
        let mut base = 0u64;
        for entry in &self.entries {
            if nr < first + entry.count {
                let time = base + u64::from(nr - first) * u64::from(entry.delta);
                return Ok((time, entry.delta));
            }
            first += entry.count;
            base += u64::from(entry.count) * u64::from(entry.delta);
        }
        Err(Error::out_of_bounds(format!(
            "sample {nr} beyond stts ({} samples)",
            first - 1
        )))
    }

    /// Decode time of sample `nr`.
    pub fn time(&self, nr: u32) -> Result<u64> {
        self.time_and_duration(nr).map(|(time, _)| time)
    }

    /// First sample whose decode time is at or after `time`.
    ///
    /// Returns `sample_count + 1` when `time` lies past the last sample.
    pub fn sample_at_time(&self, time: u64) -> u32 {
        let mut first = 1u32;
        let mut base = 0u64;
        for entry in &self.entries {
            if entry.count == 0 {
                continue;
            }
            let delta = u64::from(entry.delta);
            let last_time = base + u64::from(entry.count - 1) * delta;
            if time <= last_time {
                let steps = if time <= base {
                    0
                } else {
                    (time - base).div_ceil(delta.max(1))
                };
                return first + steps as u32;
            }
            first += entry.count;
            base += u64::from(entry.count) * delta;
        }
        first
    }
}

/// Composition time to sample (ctts).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompositionOffsets {
    /// (sample count, offset) runs.
    pub entries: Vec<(u32, i32)>,
}

impl CompositionOffsets {
    pub fn parse(data: &[u8]) -> Result<Self> {
        let count = entry_count(data, "ctts")?;
        let mut entries = Vec::with_capacity(count.min(1 << 16));
        for i in 0..count {
            let pos = 8 + i * 8;
            let (Some(count), Some(raw)) = (be_u32(data, pos), be_u32(data, pos + 4)) else {
                return Err(truncated("ctts"));
            };
            // Version 0 stores the offset unsigned, but encoders routinely
            // write negative values there too.
            entries.push((count, raw as i32));
        }
        Ok(Self { entries })
    }

    /// Composition offset of sample `nr`; 0 past the table end.
    pub fn offset(&self, nr: u32) -> i32 {
        let mut first = 1u32;
        for &(count, offset) in &self.entries {
            if nr >= first && nr < first + count {
                return offset;
            }
            first += count;
        }
        0
    }
}

/// Sync sample table (stss).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncSamples {
    /// Sorted 1-based sample numbers.
    pub samples: Vec<u32>,
}

impl SyncSamples {
    pub fn parse(data: &[u8]) -> Result<Self> {
        let count = entry_count(data, "stss")?;
        let mut samples = Vec::with_capacity(count.min(1 << 16));
        for i in 0..count {
            samples.push(be_u32(data, 8 + i * 4).ok_or_else(|| truncated("stss"))?);
        }
        Ok(Self { samples })
    }

    pub fn is_sync(&self, nr: u32) -> bool {
        self.samples.binary_search(&nr).is_ok()
    }
}

/// One sample-to-chunk run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StscEntry {
    pub first_chunk: u32,
    pub samples_per_chunk: u32,
    pub sample_description_index: u32,
}

/// Sample to chunk (stsc).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SampleToChunk {
    pub entries: Vec<StscEntry>,
}

impl SampleToChunk {
    pub fn parse(data: &[u8]) -> Result<Self> {
        let count = entry_count(data, "stsc")?;
        let mut entries = Vec::with_capacity(count.min(1 << 16));
        for i in 0..count {
            let pos = 8 + i * 12;
            let (Some(first_chunk), Some(samples_per_chunk), Some(sample_description_index)) = (
                be_u32(data, pos),
                be_u32(data, pos + 4),
                be_u32(data, pos + 8),
            ) else {
                return Err(truncated("stsc"));
            };
            entries.push(StscEntry {
                first_chunk,
                samples_per_chunk,
                sample_description_index,
            });
        }
        Ok(Self { entries })
    }

    /// Chunk holding sample `nr` and the first sample number in that chunk.
    pub fn chunk_for_sample(&self, nr: u32, chunk_count: u32) -> Result<(u32, u32)> {
        let uncovered = || Error::out_of_bounds(format!("sample {nr} not covered by stsc"));
        let target = u64::from(nr);
        let mut run_first_sample = 1u64;
        for (i, entry) in self.entries.iter().enumerate() {
            let next_first_chunk = self
                .entries
                .get(i + 1)
                .map_or(u64::from(chunk_count) + 1, |next| u64::from(next.first_chunk));
            let per_chunk = u64::from(entry.samples_per_chunk);
            let chunks = next_first_chunk.saturating_sub(u64::from(entry.first_chunk));
            let run_samples = chunks * per_chunk;
            if per_chunk > 0 && target < run_first_sample.saturating_add(run_samples) {
                let chunk_in_run = (target - run_first_sample) / per_chunk;
                let chunk = u64::from(entry.first_chunk) + chunk_in_run;
                let first_in_chunk = run_first_sample + chunk_in_run * per_chunk;
                return match (u32::try_from(chunk), u32::try_from(first_in_chunk)) {
                    (Ok(chunk), Ok(first)) => Ok((chunk, first)),
                    _ => Err(uncovered()),
                };
            }
            run_first_sample = run_first_sample.saturating_add(run_samples);
        }
        Err(uncovered())
    }
}

/// Sample sizes (stsz).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SampleSizes {
    /// Non-zero when every sample has this size.
    pub uniform_size: u32,
    pub sample_count: u32,
    pub sizes: Vec<u32>,
}

impl SampleSizes {
    pub fn parse(data: &[u8]) -> Result<Self> {
        let (Some(uniform_size), Some(sample_count)) = (be_u32(data, 4), be_u32(data, 8)) else {
            return Err(Error::invalid_mp4("stsz too short"));
        };
        let mut sizes = Vec::new();
        if uniform_size == 0 {
            sizes.reserve((sample_count as usize).min(1 << 20));
            for i in 0..sample_count as usize {
                sizes.push(be_u32(data, 12 + i * 4).ok_or_else(|| truncated("stsz"))?);
            }
        }
        Ok(Self {
            uniform_size,
            sample_count,
            sizes,
        })
    }

    pub fn size(&self, nr: u32) -> Result<u32> {
        if nr == 0 || nr > self.sample_count {
            return Err(Error::out_of_bounds(format!(
                "sample {nr} of {}",
                self.sample_count
            )));
        }
        if self.uniform_size > 0 {
            return Ok(self.uniform_size);
        }
        self.sizes
            .get(nr as usize - 1)
            .copied()
            .ok_or_else(|| Error::out_of_bounds(format!("sample {nr} missing from stsz")))
    }
}

/// Chunk offsets from either stco or co64.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChunkOffsets {
    pub offsets: Vec<u64>,
}

impl ChunkOffsets {
    pub fn parse_stco(data: &[u8]) -> Result<Self> {
        let count = entry_count(data, "stco")?;
        let mut offsets = Vec::with_capacity(count.min(1 << 16));
        for i in 0..count {
            offsets.push(u64::from(
                be_u32(data, 8 + i * 4).ok_or_else(|| truncated("stco"))?,
            ));
        }
        Ok(Self { offsets })
    }

    pub fn parse_co64(data: &[u8]) -> Result<Self> {
        let count = entry_count(data, "co64")?;
        let mut offsets = Vec::with_capacity(count.min(1 << 16));
        for i in 0..count {
            offsets.push(be_u64(data, 8 + i * 8).ok_or_else(|| truncated("co64"))?);
        }
        Ok(Self { offsets })
    }

    pub fn chunk_count(&self) -> u32 {
        self.offsets.len() as u32
    }

    /// Offset of 1-based chunk `nr`.
    pub fn offset(&self, nr: u32) -> Result<u64> {
        nr.checked_sub(1)
            .and_then(|idx| self.offsets.get(idx as usize))
            .copied()
            .ok_or_else(|| {
                Error::out_of_bounds(format!("chunk {nr} of {}", self.offsets.len()))
            })
    }
}

/// Independent and disposable samples (sdtp), one byte per sample.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SampleDependencies {
    pub entries: Vec<u8>,
}

impl SampleDependencies {
    pub fn parse(data: &[u8]) -> Result<Self> {
        let entries = data
            .get(4..)
            .ok_or_else(|| Error::invalid_mp4("sdtp too short"))?
            .to_vec();
        Ok(Self { entries })
    }

    pub fn get(&self, nr: u32) -> Option<u8> {
        nr.checked_sub(1)
            .and_then(|idx| self.entries.get(idx as usize))
            .copied()
    }
}

/// All sample tables of one track.
#[derive(Debug, Clone, Default)]
pub struct SampleTable {
    pub descriptions: Vec<SampleEntry>,
    pub stts: TimeToSample,
    pub ctts: Option<CompositionOffsets>,
    pub stss: Option<SyncSamples>,
    pub stsc: SampleToChunk,
    pub stsz: SampleSizes,
    pub chunk_offsets: ChunkOffsets,
    pub sdtp: Option<SampleDependencies>,
}

impl SampleTable {
    pub fn sample_count(&self) -> u32 {
        self.stsz.sample_count
    }

    /// Whether sample `nr` is a sync sample; without stss every sample is.
    pub fn is_sync(&self, nr: u32) -> bool {
        self.stss.as_ref().map_or(true, |stss| stss.is_sync(nr))
    }

    /// Composition offset of sample `nr`, 0 without ctts.
    pub fn composition_offset(&self, nr: u32) -> i32 {
        self.ctts.as_ref().map_or(0, |ctts| ctts.offset(nr))
    }

    /// File offset of sample `nr`.
    pub fn sample_offset(&self, nr: u32) -> Result<u64> {
        let (chunk, first_in_chunk) = self
            .stsc
            .chunk_for_sample(nr, self.chunk_offsets.chunk_count())?;
        let mut offset = self.chunk_offsets.offset(chunk)?;
        for k in first_in_chunk..nr {
            offset += u64::from(self.stsz.size(k)?);
        }
        Ok(offset)
    }
}
