//! Error types for vidi-media.

use std::io;
use thiserror::Error;

/// Result type for vidi-media operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for vidi-media operations.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Invalid MP4 file structure.
    #[error("Invalid MP4: {0}")]
    InvalidMp4(String),

    /// Missing required box in MP4 file.
    #[error("Missing required box: {0}")]
    MissingAtom(&'static str),

    /// Codec recognized but not supported, or unknown sample entry.
    #[error("Unsupported codec: {0}")]
    UnsupportedCodec(String),

    /// No track with a `vide` handler.
    #[error("No video track found")]
    NoVideoTrack,

    /// `mdat` was parsed lazily and no reader was supplied.
    #[error("Lazy mdat reader missing")]
    LazyReaderMissing,

    /// Chunk or sample number out of range.
    #[error("Out of bounds: {0}")]
    OutOfBounds(String),

    /// Failure reported by the segment store callback.
    #[error(transparent)]
    Store(vidi_common::Error),
}

impl Error {
    /// Create an invalid MP4 error.
    pub fn invalid_mp4(msg: impl Into<String>) -> Self {
        Self::InvalidMp4(msg.into())
    }

    /// Create an unsupported codec error.
    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::UnsupportedCodec(msg.into())
    }

    /// Create an out of bounds error.
    pub fn out_of_bounds(msg: impl Into<String>) -> Self {
        Self::OutOfBounds(msg.into())
    }
}

impl From<vidi_common::Error> for Error {
    fn from(err: vidi_common::Error) -> Self {
        Self::Store(err)
    }
}

impl From<Error> for vidi_common::Error {
    fn from(err: Error) -> Self {
        use vidi_common::Error as Common;
        match err {
            Error::Io(e) => Common::from_io(e),
            Error::InvalidMp4(msg) => Common::InvalidInput(format!("invalid mp4: {msg}")),
            Error::MissingAtom(name) => Common::InvalidInput(format!("missing box: {name}")),
            Error::UnsupportedCodec(msg) => Common::UnsupportedCodec(msg),
            Error::NoVideoTrack => Common::NoVideoTrack,
            Error::LazyReaderMissing => Common::LazyReaderMissing,
            Error::OutOfBounds(msg) => Common::OutOfBounds(msg),
            Error::Store(e) => e,
        }
    }
}
