//! Readiness Error Types

use derive_more::{Display, Error};

/// A readiness error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for readiness operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The index could not be reached or queried. Nothing may be published
    /// against an unverified view of the archive tree.
    #[display("readiness index unavailable")]
    Unavailable,
    #[display("invalid readiness configuration: {_0}")]
    Config(#[error(not(source))] &'static str),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable)
    }
}
