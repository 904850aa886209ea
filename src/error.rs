//! Library-wide error and result types.

use std::fmt;
use std::io;

/// Result alias used throughout ctrtex.
pub type Result<T> = std::result::Result<T, Error>;

/// All errors the library can produce.
///
/// Error messages are kept intentionally terse; callers that need richer
/// context should wrap `Error` in their own type.
#[derive(Debug)]
pub enum Error {
    /// Structural inconsistency: wrong magic, an entry count that does not
    /// fit the stream, or an offset that resolves outside it. The whole
    /// decode is aborted; no partial container is ever returned.
    MalformedContainer(&'static str),
    /// A pixel-format code with no entry in the codec table.
    UnsupportedFormat(u32),
    /// A declared or derived size exceeds the bytes actually available.
    TruncatedData,
    /// `replace_image` was called with a buffer whose geometry does not
    /// match the image it replaces. The container is left unchanged.
    DimensionMismatch {
        expected: (u32, u32),
        got: (u32, u32),
    },
    /// An underlying I/O operation failed.
    Io(io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::MalformedContainer(s) => write!(f, "malformed container: {s}"),
            Error::UnsupportedFormat(c) => write!(f, "unsupported pixel format code: {c}"),
            Error::TruncatedData => write!(f, "truncated data"),
            Error::DimensionMismatch { expected, got } => write!(
                f,
                "dimension mismatch: expected {}x{}, got {}x{}",
                expected.0, expected.1, got.0, got.1
            ),
            Error::Io(e) => write!(f, "I/O error: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        if let Error::Io(e) = self {
            Some(e)
        } else {
            None
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            Error::TruncatedData
        } else {
            Error::Io(e)
        }
    }
}
