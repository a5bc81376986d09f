//! MP4 container parsing.
//!
//! This module decodes the parts of a progressive MP4 that segmentation
//! needs: the movie header, every track's media header, handler and sample
//! tables, and the location (or contents) of the media data.

mod atoms;
mod reader;
mod sample_entry;
mod sample_table;

pub use atoms::{Atom, AtomType, HandlerType};
pub use reader::Mp4Reader;
pub use sample_entry::{SampleEntry, SampleEntryKind};
pub use sample_table::{
    ChunkOffsets, CompositionOffsets, SampleDependencies, SampleSizes, SampleTable,
    SampleToChunk, StscEntry, SttsEntry, SyncSamples, TimeToSample,
};

use crate::{Error, Result};
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;

/// Anything sample bytes can be read from.
pub trait ReadSeek: Read + Seek {}

impl<T: Read + Seek + ?Sized> ReadSeek for T {}

/// How `mdat` is handled while parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseMode {
    /// Load media data into memory.
    Eager,
    /// Record only its position; samples are read through a reader later.
    Lazy,
}

/// Parsed MP4 file.
#[derive(Debug, Clone)]
pub struct Mp4File {
    /// Raw ftyp payload, if present.
    pub ftyp: Option<Vec<u8>>,
    pub moov: Moov,
    pub mdats: Vec<Mdat>,
}

/// Movie box contents.
#[derive(Debug, Clone, Default)]
pub struct Moov {
    /// Movie timescale (time units per second).
    pub timescale: u32,
    /// Duration in movie timescale units.
    pub duration: u64,
    pub tracks: Vec<TrackInfo>,
}

/// One trak box.
#[derive(Debug, Clone)]
pub struct TrackInfo {
    pub track_id: u32,
    pub handler: HandlerType,
    /// Media timescale (units per second for this track).
    pub timescale: u32,
    /// Track duration in media timescale.
    pub duration: u64,
    /// ISO-639-2/T language, packed as in mdhd.
    pub language: u16,
    pub samples: SampleTable,
}

/// A media data box.
#[derive(Debug, Clone)]
pub struct Mdat {
    /// File offset of the first payload byte.
    pub offset: u64,
    pub size: u64,
    /// Payload when parsed eagerly.
    pub data: Option<Vec<u8>>,
}

impl TrackInfo {
    /// Get duration in seconds.
    pub fn duration_secs(&self) -> f64 {
        if self.timescale == 0 {
            0.0
        } else {
            self.duration as f64 / self.timescale as f64
        }
    }

    /// First sample description of the track.
    pub fn sample_entry(&self) -> Result<&SampleEntry> {
        self.samples
            .descriptions
            .first()
            .ok_or(Error::MissingAtom("stsd entry"))
    }
}

impl Mp4File {
    /// Parse an MP4 file from the given path, loading media data.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        Self::parse(&mut reader, ParseMode::Eager)
    }

    /// Parse an MP4 file from a reader.
    pub fn parse<R: Read + Seek>(reader: &mut R, mode: ParseMode) -> Result<Self> {
        let mut mp4_reader = Mp4Reader::new(reader)?;
        mp4_reader.parse(mode)
    }

    /// The first track with a `vide` handler.
    pub fn reference_track(&self) -> Result<&TrackInfo> {
        self.moov
            .tracks
            .iter()
            .find(|t| t.handler.is_video())
            .ok_or(Error::NoVideoTrack)
    }

    /// Whether sample bytes must come from an external reader.
    pub fn is_lazy(&self) -> bool {
        self.mdats.iter().any(|m| m.data.is_none())
    }

    /// Read `size` bytes at absolute file `offset`.
    ///
    /// Eagerly parsed files slice the in-memory `mdat`; lazily parsed ones
    /// need `source`.
    pub fn read_sample_data(
        &self,
        source: Option<&mut dyn ReadSeek>,
        offset: u64,
        size: u32,
    ) -> Result<Vec<u8>> {
        let end = offset + u64::from(size);
        let mdat = self
            .mdats
            .iter()
            .find(|m| offset >= m.offset && end <= m.offset + m.size)
            .ok_or_else(|| {
                Error::out_of_bounds(format!("sample bytes {offset}..{end} outside mdat"))
            })?;

        match &mdat.data {
            Some(data) => {
                let start = (offset - mdat.offset) as usize;
                Ok(data[start..start + size as usize].to_vec())
            }
            None => {
                let source = source.ok_or(Error::LazyReaderMissing)?;
                source.seek(SeekFrom::Start(offset))?;
                let mut buf = vec![0u8; size as usize];
                source.read_exact(&mut buf)?;
                Ok(buf)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::Mp4Fixture;
    use std::io::Cursor;

    #[test]
    fn parses_fixture_tracks() {
        let bytes = Mp4Fixture::default().build();
        let mp4 = Mp4File::parse(&mut Cursor::new(&bytes), ParseMode::Eager).unwrap();

        assert_eq!(mp4.moov.tracks.len(), 2);
        let video = mp4.reference_track().unwrap();
        assert_eq!(video.track_id, 1);
        assert_eq!(video.timescale, 15360);
        assert_eq!(video.duration, 153_600);
        assert_eq!(video.samples.sample_count(), 240);
        assert!(matches!(
            video.sample_entry().unwrap().kind,
            SampleEntryKind::Avc { .. }
        ));
        assert!((video.duration_secs() - 10.0).abs() < 1e-9);

        let audio = &mp4.moov.tracks[1];
        assert!(audio.handler.is_audio());
        assert_eq!(audio.timescale, 48000);
    }

    #[test]
    fn eager_and_lazy_reads_agree() {
        let bytes = Mp4Fixture::default().build();
        let eager = Mp4File::parse(&mut Cursor::new(&bytes), ParseMode::Eager).unwrap();
        let lazy = Mp4File::parse(&mut Cursor::new(&bytes), ParseMode::Lazy).unwrap();
        assert!(!eager.is_lazy());
        assert!(lazy.is_lazy());

        let track = eager.reference_track().unwrap();
        let offset = track.samples.sample_offset(30).unwrap();
        let size = track.samples.stsz.size(30).unwrap();

        let from_memory = eager.read_sample_data(None, offset, size).unwrap();
        let mut source = Cursor::new(bytes.clone());
        let from_reader = lazy
            .read_sample_data(Some(&mut source), offset, size)
            .unwrap();
        assert_eq!(from_memory, from_reader);
        assert_eq!(from_memory, bytes[offset as usize..(offset + u64::from(size)) as usize]);
    }

    #[test]
    fn lazy_without_reader_fails() {
        let bytes = Mp4Fixture::default().build();
        let lazy = Mp4File::parse(&mut Cursor::new(&bytes), ParseMode::Lazy).unwrap();
        let track = lazy.reference_track().unwrap();
        let offset = track.samples.sample_offset(1).unwrap();
        assert!(matches!(
            lazy.read_sample_data(None, offset, 4),
            Err(Error::LazyReaderMissing)
        ));
    }

    #[test]
    fn audio_only_has_no_reference() {
        let bytes = Mp4Fixture::default().without_video().build();
        let mp4 = Mp4File::parse(&mut Cursor::new(&bytes), ParseMode::Eager).unwrap();
        assert!(matches!(mp4.reference_track(), Err(Error::NoVideoTrack)));
    }
}
