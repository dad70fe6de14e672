//! Archive filename conventions.
//!
//! Archive files carry their identity in their name:
//!
//! ```text
//! project[_lang][_option]_YYYY-MM.zim      (current)
//! project[_lang][_option]_MM_YYYY.zim      (legacy)
//! ```
//!
//! This crate turns a file stem into a [`ParsedName`], derives the
//! version-independent [alias](alias_of) shared by every version of the same
//! content, and strips [periods](without_period) from raw stems.
//!
//! ```
//! use zimshelf_naming::{Format, parse};
//!
//! let parsed = parse("topic_fr_all_02_2020").unwrap();
//! assert_eq!(parsed.project, "topic");
//! assert_eq!(parsed.lang, "fr");
//! assert_eq!(parsed.option, "all");
//! assert_eq!(parsed.period.month(), "02");
//! assert_eq!(parsed.period.year(), "2020");
//! assert_eq!(parsed.format, Format::Legacy);
//! ```

mod alias;
mod consts;
pub mod error;
mod parse;
mod period;

pub use crate::alias::{alias_of, normalize, without_period};
pub use crate::parse::{DEFAULT_LANG, Format, ParsedName, parse};
pub use crate::period::Period;
