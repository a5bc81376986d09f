//! Error kinds shared across vidi.
//!
//! Every failure in the processing core is funneled into [`Error`]. The
//! variants are semantic: callers branch on the kind (for example the
//! processor never reports [`Error::Cancelled`] as an asset failure).

/// Common error type for vidi.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An asset, track, or stored object is absent.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// The kind of entity (e.g. "video", "object").
        entity: String,
        /// The identifier that was looked up.
        id: String,
    },

    /// A status name or number outside the known enumeration.
    #[error("Incorrect status: {0}")]
    IncorrectStatus(String),

    /// Codec recognized but not implemented, or an unknown sample entry.
    #[error("Unsupported codec: {0}")]
    UnsupportedCodec(String),

    /// The media file has no `vide` handler track.
    #[error("No video track found")]
    NoVideoTrack,

    /// `mdat` was decoded lazily but no stream reader was provided.
    #[error("Lazy mdat reader missing")]
    LazyReaderMissing,

    /// Object store read/write failure or wrong byte count.
    #[error("Storage error: {0}")]
    Storage(String),

    /// A multi-part reader latched an earlier failure.
    #[error("Previous error: {0}")]
    PreviousError(String),

    /// Part, chunk, or sample number out of range.
    #[error("Out of bounds: {0}")]
    OutOfBounds(String),

    /// A location is required but absent.
    #[error("Empty location for video {0}")]
    EmptyLocation(String),

    /// Request or record data failed validation.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The operation was cancelled by its context.
    #[error("Operation cancelled")]
    Cancelled,

    /// An I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Anything else, wrapped with context.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Convenience constructor for [`Error::NotFound`].
    pub fn not_found(entity: impl Into<String>, id: impl std::fmt::Display) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    /// Convenience constructor for [`Error::Storage`].
    pub fn storage<S: Into<String>>(msg: S) -> Self {
        Self::Storage(msg.into())
    }

    /// Convenience constructor for [`Error::OutOfBounds`].
    pub fn out_of_bounds<S: Into<String>>(msg: S) -> Self {
        Self::OutOfBounds(msg.into())
    }

    /// Convenience constructor for [`Error::InvalidInput`].
    pub fn invalid_input<S: Into<String>>(msg: S) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Convenience constructor for [`Error::Internal`].
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether this error stems from cancellation rather than a failure.
    ///
    /// Cancellation may also arrive wrapped in an I/O error when it crossed a
    /// synchronous `Read`/`Write` boundary.
    pub fn is_cancelled(&self) -> bool {
        match self {
            Self::Cancelled => true,
            Self::Io(e) => e
                .get_ref()
                .and_then(|inner| inner.downcast_ref::<Error>())
                .is_some_and(Error::is_cancelled),
            _ => false,
        }
    }

    /// Unwrap an [`Error`] that was boxed inside an `io::Error`, keeping its kind.
    ///
    /// Synchronous reader adapters can only surface `io::Error`; this recovers
    /// the semantic kind (e.g. [`Error::PreviousError`]) on the other side.
    pub fn from_io(err: std::io::Error) -> Self {
        if err.get_ref().is_some_and(|inner| inner.is::<Error>()) {
            if let Some(inner) = err.into_inner() {
                if let Ok(e) = inner.downcast::<Error>() {
                    return *e;
                }
            }
            return Self::internal("unreadable wrapped error");
        }
        Self::Io(err)
    }
}

impl From<Error> for std::io::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::Io(e) => e,
            other => std::io::Error::other(other),
        }
    }
}

/// Result type alias using the common Error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::not_found("video", "abc");
        assert_eq!(err.to_string(), "video not found: abc");

        let err = Error::NoVideoTrack;
        assert_eq!(err.to_string(), "No video track found");

        let err = Error::storage("short write");
        assert_eq!(err.to_string(), "Storage error: short write");
    }

    #[test]
    fn test_cancelled_survives_io_roundtrip() {
        let io_err: std::io::Error = Error::Cancelled.into();
        let err = Error::Io(io_err);
        assert!(err.is_cancelled());
        assert!(!Error::NoVideoTrack.is_cancelled());
    }

    #[test]
    fn test_from_io_recovers_kind() {
        let io_err: std::io::Error = Error::PreviousError("boom".into()).into();
        let err = Error::from_io(io_err);
        assert!(matches!(err, Error::PreviousError(ref m) if m == "boom"));

        let plain = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "eof");
        assert!(matches!(Error::from_io(plain), Error::Io(_)));
    }

    #[test]
    fn test_io_error_passthrough() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let back: std::io::Error = Error::from(io_err).into();
        assert_eq!(back.kind(), std::io::ErrorKind::NotFound);
    }
}
