//! ZIM Error Types

use derive_more::{Display, Error};
use std::io::Error as IoError;

/// A ZIM reading error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for ZIM reading operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("I/O error: {_0}")]
    Io(IoError),
    /// Not a ZIM file, or a version this reader does not understand.
    #[display("invalid ZIM header: {_0}")]
    InvalidHeader(#[error(not(source))] String),
    /// An offset, index or length inside the archive points somewhere it
    /// cannot. The archive is truncated or damaged.
    #[display("corrupt archive: {_0}")]
    Corrupt(#[error(not(source))] String),
    #[display("unsupported cluster compression: {_0}")]
    UnsupportedCompression(#[error(not(source))] u8),
    #[display("could not decompress cluster")]
    Decompression,
}
impl From<IoError> for ErrorKind {
    fn from(err: IoError) -> Self {
        Self::Io(err)
    }
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        // The archive may still be being written when first seen.
        matches!(self, Self::Io(_) | Self::Corrupt(_))
    }
}
