//! Purge Error Types

use derive_more::{Display, Error};

/// A purge error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for purge operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("could not build HTTP client")]
    Client,
    /// The cache could not be reached at all.
    #[display("cache unreachable at {_0}")]
    Unreachable(#[error(not(source))] String),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unreachable(_))
    }
}
