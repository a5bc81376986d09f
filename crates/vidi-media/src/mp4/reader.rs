//! MP4 file reader with box parsing.

use super::atoms::{be_u16, be_u32, be_u64};
use super::sample_table::{
    ChunkOffsets, CompositionOffsets, SampleDependencies, SampleSizes, SampleTable,
    SampleToChunk, SyncSamples, TimeToSample,
};
use super::{Atom, AtomType, HandlerType, Mdat, Moov, Mp4File, ParseMode, SampleEntry, TrackInfo};
use crate::{Error, Result};
use std::io::{Read, Seek, SeekFrom};
use tracing::trace;

/// Maximum allowed box payload size (64 MB) for metadata boxes.
const MAX_ATOM_DATA_SIZE: u64 = 64 * 1024 * 1024;

/// MP4 box tree reader.
pub struct Mp4Reader<R> {
    reader: R,
    file_size: u64,
}

impl<R: Read + Seek> Mp4Reader<R> {
    /// Create a new MP4 reader.
    pub fn new(mut reader: R) -> Result<Self> {
        let file_size = reader.seek(SeekFrom::End(0))?;
        reader.seek(SeekFrom::Start(0))?;
        Ok(Self { reader, file_size })
    }

    /// Parse the top-level boxes.
    ///
    /// In [`ParseMode::Lazy`] only the position of each `mdat` is recorded;
    /// sample bytes are read later through a caller-provided reader.
    pub fn parse(&mut self, mode: ParseMode) -> Result<Mp4File> {
        let atoms = self.read_atoms(0, self.file_size)?;

        let mut ftyp = None;
        let mut moov = None;
        let mut mdats = Vec::new();

        for atom in &atoms {
            match atom.atom_type {
                AtomType::FTYP => {
                    ftyp = Some(self.read_atom_data(atom)?);
                }
                AtomType::MOOV => {
                    moov = Some(self.parse_moov(atom)?);
                }
                AtomType::MDAT => {
                    let data = match mode {
                        ParseMode::Eager => Some(self.read_mdat(atom)?),
                        ParseMode::Lazy => None,
                    };
                    mdats.push(Mdat {
                        offset: atom.data_offset,
                        size: atom.data_size(),
                        data,
                    });
                }
                other => trace!(atom = %other, "Skipping top-level box"),
            }
        }

        let moov = moov.ok_or(Error::MissingAtom("moov"))?;
        Ok(Mp4File { ftyp, moov, mdats })
    }

    /// Read box headers between `start` and `end`.
    fn read_atoms(&mut self, start: u64, end: u64) -> Result<Vec<Atom>> {
        let mut atoms = Vec::new();
        let mut pos = start;

        while pos.saturating_add(8) <= end {
            self.reader.seek(SeekFrom::Start(pos))?;

            let mut header = [0u8; 8];
            self.reader.read_exact(&mut header)?;

            let size = u64::from(u32::from_be_bytes([header[0], header[1], header[2], header[3]]));
            let atom_type = AtomType([header[4], header[5], header[6], header[7]]);

            let (actual_size, header_size) = match size {
                1 => {
                    let mut ext = [0u8; 8];
                    self.reader.read_exact(&mut ext)?;
                    (u64::from_be_bytes(ext), 16u8)
                }
                0 => (end - pos, 8u8),
                _ => (size, 8u8),
            };

            let atom_end = pos
                .checked_add(actual_size)
                .filter(|e| actual_size >= u64::from(header_size) && *e <= end);
            let Some(atom_end) = atom_end else {
                return Err(Error::invalid_mp4(format!(
                    "box {atom_type} at {pos} has bad size {actual_size}"
                )));
            };

            atoms.push(Atom {
                atom_type,
                size: actual_size,
                data_offset: pos + u64::from(header_size),
                header_size,
            });

            pos = atom_end;
        }

        Ok(atoms)
    }

    fn children(&mut self, parent: &Atom) -> Result<Vec<Atom>> {
        self.read_atoms(parent.data_offset, parent.end())
    }

    /// Read and validate box payload, rejecting oversized boxes.
    fn read_atom_data(&mut self, atom: &Atom) -> Result<Vec<u8>> {
        let size = atom.data_size();
        if size > MAX_ATOM_DATA_SIZE {
            return Err(Error::invalid_mp4(format!(
                "box {} data size {} exceeds maximum {}",
                atom.atom_type, size, MAX_ATOM_DATA_SIZE
            )));
        }
        self.read_atom_payload(atom)
    }

    fn read_mdat(&mut self, atom: &Atom) -> Result<Vec<u8>> {
        usize::try_from(atom.data_size())
            .map_err(|_| Error::invalid_mp4("mdat too large to hold in memory"))?;
        self.read_atom_payload(atom)
    }

    fn read_atom_payload(&mut self, atom: &Atom) -> Result<Vec<u8>> {
        self.reader.seek(SeekFrom::Start(atom.data_offset))?;
        let mut data = vec![0u8; atom.data_size() as usize];
        self.reader.read_exact(&mut data)?;
        Ok(data)
    }

    fn parse_moov(&mut self, atom: &Atom) -> Result<Moov> {
        let mut moov = Moov::default();
        let mut has_mvhd = false;

        for child in self.children(atom)? {
            match child.atom_type {
                AtomType::MVHD => {
                    let data = self.read_atom_data(&child)?;
                    let (timescale, duration) = parse_header_times(&data, "mvhd")?;
                    moov.timescale = timescale;
                    moov.duration = duration;
                    has_mvhd = true;
                }
                AtomType::TRAK => {
                    moov.tracks.push(self.parse_trak(&child)?);
                }
                _ => {}
            }
        }

        if !has_mvhd {
            return Err(Error::MissingAtom("mvhd"));
        }
        Ok(moov)
    }

    fn parse_trak(&mut self, trak: &Atom) -> Result<TrackInfo> {
        let mut track_id = None;
        let mut media = None;

        for child in self.children(trak)? {
            match child.atom_type {
                AtomType::TKHD => {
                    let data = self.read_atom_data(&child)?;
                    let pos = if data.first() == Some(&1) { 20 } else { 12 };
                    track_id = Some(be_u32(&data, pos).ok_or_else(|| Error::invalid_mp4("tkhd too short"))?);
                }
                AtomType::MDIA => {
                    media = Some(self.parse_mdia(&child)?);
                }
                _ => {}
            }
        }

        let track_id = track_id.ok_or(Error::MissingAtom("tkhd"))?;
        let mut track = media.ok_or(Error::MissingAtom("mdia"))?;
        track.track_id = track_id;
        Ok(track)
    }

    fn parse_mdia(&mut self, mdia: &Atom) -> Result<TrackInfo> {
        let mut header = None;
        let mut handler = None;
        let mut samples = None;

        for child in self.children(mdia)? {
            match child.atom_type {
                AtomType::MDHD => {
                    let data = self.read_atom_data(&child)?;
                    let (timescale, duration) = parse_header_times(&data, "mdhd")?;
                    let lang_pos = if data.first() == Some(&1) { 32 } else { 20 };
                    let language = be_u16(&data, lang_pos).unwrap_or(0x55c4);
                    header = Some((timescale, duration, language));
                }
                AtomType::HDLR => {
                    let data = self.read_atom_data(&child)?;
                    let code = data
                        .get(8..12)
                        .ok_or_else(|| Error::invalid_mp4("hdlr too short"))?;
                    handler = Some(HandlerType::from_bytes([code[0], code[1], code[2], code[3]]));
                }
                AtomType::MINF => {
                    for grandchild in self.children(&child)? {
                        if grandchild.atom_type == AtomType::STBL {
                            samples = Some(self.parse_stbl(&grandchild)?);
                        }
                    }
                }
                _ => {}
            }
        }

        let (timescale, duration, language) = header.ok_or(Error::MissingAtom("mdhd"))?;
        Ok(TrackInfo {
            track_id: 0,
            handler: handler.ok_or(Error::MissingAtom("hdlr"))?,
            timescale,
            duration,
            language,
            samples: samples.ok_or(Error::MissingAtom("stbl"))?,
        })
    }

    fn parse_stbl(&mut self, stbl: &Atom) -> Result<SampleTable> {
        let mut stsd = None;
        let mut stts = None;
        let mut ctts = None;
        let mut stss = None;
        let mut stsc = None;
        let mut stsz = None;
        let mut chunk_offsets = None;
        let mut sdtp = None;

        for child in self.children(stbl)? {
            let parse_slot = child.atom_type;
            if !matches!(
                parse_slot,
                AtomType::STSD
                    | AtomType::STTS
                    | AtomType::CTTS
                    | AtomType::STSS
                    | AtomType::STSC
                    | AtomType::STSZ
                    | AtomType::STCO
                    | AtomType::CO64
                    | AtomType::SDTP
            ) {
                continue;
            }
            let data = self.read_atom_data(&child)?;
            match parse_slot {
                AtomType::STSD => stsd = Some(SampleEntry::parse_stsd(&data)?),
                AtomType::STTS => stts = Some(TimeToSample::parse(&data)?),
                AtomType::CTTS => ctts = Some(CompositionOffsets::parse(&data)?),
                AtomType::STSS => stss = Some(SyncSamples::parse(&data)?),
                AtomType::STSC => stsc = Some(SampleToChunk::parse(&data)?),
                AtomType::STSZ => stsz = Some(SampleSizes::parse(&data)?),
                AtomType::STCO => chunk_offsets = Some(ChunkOffsets::parse_stco(&data)?),
                AtomType::CO64 => chunk_offsets = Some(ChunkOffsets::parse_co64(&data)?),
                _ => sdtp = Some(SampleDependencies::parse(&data)?),
            }
        }

        Ok(SampleTable {
            descriptions: stsd.ok_or(Error::MissingAtom("stsd"))?,
            stts: stts.ok_or(Error::MissingAtom("stts"))?,
            ctts,
            stss,
            stsc: stsc.ok_or(Error::MissingAtom("stsc"))?,
            stsz: stsz.ok_or(Error::MissingAtom("stsz"))?,
            chunk_offsets: chunk_offsets.ok_or(Error::MissingAtom("stco"))?,
            sdtp,
        })
    }
}

/// Timescale and duration from an mvhd/mdhd payload, either version.
fn parse_header_times(data: &[u8], name: &str) -> Result<(u32, u64)> {
    let parsed = if data.first() == Some(&1) {
        be_u32(data, 20).zip(be_u64(data, 24))
    } else {
        be_u32(data, 12).zip(be_u32(data, 16).map(u64::from))
    };
    parsed.ok_or_else(|| Error::invalid_mp4(format!("{name} too short")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn boxed(fourcc: &[u8; 4], payload: &[u8]) -> Vec<u8> {
        let mut out = ((payload.len() + 8) as u32).to_be_bytes().to_vec();
        out.extend_from_slice(fourcc);
        out.extend_from_slice(payload);
        out
    }

    #[test]
    fn header_times_v0_and_v1() {
        let mut v0 = vec![0u8; 20];
        v0[12..16].copy_from_slice(&1000u32.to_be_bytes());
        v0[16..20].copy_from_slice(&5000u32.to_be_bytes());
        assert_eq!(parse_header_times(&v0, "mdhd").unwrap(), (1000, 5000));

        let mut v1 = vec![0u8; 32];
        v1[0] = 1;
        v1[20..24].copy_from_slice(&90000u32.to_be_bytes());
        v1[24..32].copy_from_slice(&(1u64 << 33).to_be_bytes());
        assert_eq!(parse_header_times(&v1, "mdhd").unwrap(), (90000, 1 << 33));

        assert!(parse_header_times(&[0; 8], "mvhd").is_err());
    }

    #[test]
    fn missing_moov() {
        let data = boxed(b"ftyp", b"isom\0\0\0\0");
        let mut reader = Mp4Reader::new(Cursor::new(data)).unwrap();
        assert!(matches!(
            reader.parse(ParseMode::Eager),
            Err(Error::MissingAtom("moov"))
        ));
    }

    #[test]
    fn bad_box_size() {
        let mut data = boxed(b"ftyp", b"isom\0\0\0\0");
        data[3] = 200;
        let mut reader = Mp4Reader::new(Cursor::new(data)).unwrap();
        assert!(matches!(
            reader.parse(ParseMode::Lazy),
            Err(Error::InvalidMp4(_))
        ));
    }

    #[test]
    fn huge_extended_box_size() {
        let mut data = boxed(b"ftyp", b"isom\0\0\0\0");
        data.extend_from_slice(&1u32.to_be_bytes());
        data.extend_from_slice(b"free");
        data.extend_from_slice(&(u64::MAX - 4).to_be_bytes());
        let mut reader = Mp4Reader::new(Cursor::new(data)).unwrap();
        assert!(matches!(
            reader.parse(ParseMode::Lazy),
            Err(Error::InvalidMp4(_))
        ));
    }
}
