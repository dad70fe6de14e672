//! Naming Error Types
//!
//! Structured errors using `exn` for automatic location tracking and error
//! tree construction.

use derive_more::{Display, Error};

/// A naming error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for naming operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The stem matches neither the current nor the legacy filename format.
    /// Callers skip the file.
    #[display("non-standard archive filename: {_0}")]
    FilenameFormat(#[error(not(source))] String),
    /// A period component was out of range or not numeric.
    #[display("invalid period: {_0}")]
    InvalidPeriod(#[error(not(source))] String),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        // A filename is either valid or it isn't.
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_kind_display() {
        assert_eq!(
            ErrorKind::FilenameFormat("nope".to_string()).to_string(),
            "non-standard archive filename: nope"
        );
        assert!(!ErrorKind::InvalidPeriod("13".to_string()).is_retryable());
    }
}
