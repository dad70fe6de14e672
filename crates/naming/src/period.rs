use crate::error::{ErrorKind, Result};
use derive_more::Display;

/// The `(year, month)` pair encoding a version's recency.
///
/// Both parts are kept as fixed-width, zero-padded strings so that the
/// derived lexical ordering (year first, then month) is also the
/// chronological one.
#[derive(Debug, Display, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[display("{year}-{month}")]
pub struct Period {
    year: String,
    month: String,
}
impl Period {
    /// Builds a period from its textual parts.
    ///
    /// ```
    /// use zimshelf_naming::Period;
    /// assert_eq!(Period::new("2024", "03").unwrap().to_string(), "2024-03");
    /// assert!(Period::new("24", "03").is_err());
    /// assert!(Period::new("2024", "3").is_err());
    /// ```
    pub fn new(year: impl Into<String>, month: impl Into<String>) -> Result<Self> {
        let (year, month) = (year.into(), month.into());
        if !Self::is_fixed_digits(&year, 4) || !Self::is_fixed_digits(&month, 2) {
            exn::bail!(ErrorKind::InvalidPeriod(format!("{year}-{month}")));
        }
        Ok(Self { year, month })
    }

    pub fn year(&self) -> &str {
        &self.year
    }

    pub fn month(&self) -> &str {
        &self.month
    }

    fn is_fixed_digits(s: &str, width: usize) -> bool {
        s.len() == width && s.bytes().all(|b| b.is_ascii_digit())
    }
}
