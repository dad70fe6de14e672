//! Library Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction. Each stage of a run raises its own
//! kind on top of whatever the underlying crate reported.

use derive_more::{Display, Error};

/// A library error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for library operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// Listing the archive tree failed.
    #[display("could not scan the archive tree")]
    Scan,
    /// No archive survived scanning and filtering; nothing may be published.
    #[display("no archives found")]
    NoArchives,
    /// The readiness index could not confirm anything.
    #[display("readiness check failed")]
    Readiness,
    /// Metadata could not be read from an archive.
    #[display("could not read archive metadata")]
    Metadata,
    #[display("metadata cache failure")]
    Cache,
    /// Some retired archives could not be removed.
    #[display("retention failed for {_0} archive(s)")]
    Retention(#[error(not(source))] usize),
    #[display("could not publish redirect map")]
    Redirects,
    #[display("could not publish catalog")]
    Catalog,
    #[display("could not purge caches")]
    Purge,
    #[display("unknown action {_0:?}")]
    UnknownAction(#[error(not(source))] String),
    /// A collaborator could not be set up from configuration.
    #[display("could not set up {_0}")]
    Setup(#[error(not(source))] &'static str),
    /// One or more actions of a run failed; see the error tree.
    #[display("{_0} action(s) failed")]
    Run(#[error(not(source))] usize),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Readiness | Self::Cache | Self::Purge)
    }
}
