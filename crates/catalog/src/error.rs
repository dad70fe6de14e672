//! Catalog Error Types

use derive_more::{Display, Error};

/// A catalog error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for catalog operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The previously published catalog could not be read or parsed.
    #[display("previous catalog is unreadable")]
    PreviousUnreadable,
    /// A rendered document is not a well-formed catalog.
    #[display("invalid catalog document: {_0}")]
    Validation(#[error(not(source))] String),
    /// A record has no archive identifier; books without an `id` break
    /// downstream consumers.
    #[display("catalog record for {_0} has no identifier")]
    MissingIdentifier(#[error(not(source))] String),
    #[display("could not serialise catalog")]
    Serialize,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::PreviousUnreadable)
    }
}
