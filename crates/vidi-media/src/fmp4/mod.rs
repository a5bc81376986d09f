//! Fragmented MP4 (fMP4) serialization.
//!
//! This module generates the CMAF-style outputs of segmentation:
//! - Init segment (ftyp + moov with one track and mvex)
//! - Media segment (styp + moof + mdat)

pub(crate) mod boxes;
mod init;
mod moof;

pub use init::{InitSegment, OutputTrak, OUTPUT_TRACK_ID};
pub use moof::{MediaSegment, MoofBuilder};

use std::io::{self, Write};

/// A box-structured artifact that can be streamed into a writer.
pub trait Encode {
    /// Exact number of bytes `encode` writes.
    fn size(&self) -> u64;

    /// Serialize into `w`.
    fn encode(&self, w: &mut dyn Write) -> io::Result<()>;

    /// Serialize into a fresh buffer.
    fn to_bytes(&self) -> io::Result<Vec<u8>> {
        let mut out = Vec::with_capacity(self.size() as usize);
        self.encode(&mut out)?;
        Ok(out)
    }
}
