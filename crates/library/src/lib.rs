//! Reconciles a tree of versioned ZIM archives with the catalog published
//! for it.
//!
//! A run scans the tree, parses every archive name into an [`Entry`], puts
//! the entries in processing order and groups them by alias into a
//! [`Library`]. Everything else works from that library: retention of old
//! versions, the redirect map, the public and internal catalogs, and the
//! set of changed books whose cached pages must be purged.
//!
//! [`Maintainer`] ties the stages together for the command line.

mod candidates;
pub mod catalog;
pub mod changes;
mod entry;
pub mod error;
mod group;
mod maintain;
pub mod metadata;
mod readiness;
pub mod redirects;
pub mod retention;
pub mod scan;

pub use crate::candidates::{Candidates, Ordered, Unordered};
pub use crate::entry::Entry;
pub use crate::group::{AliasGroup, Library};
pub use crate::maintain::{Action, Actions, Maintainer, RunReport};
pub use crate::metadata::{MetadataReader, ZimMetadataReader};
pub use crate::readiness::retain_ready;
pub use crate::redirects::{RedirectMap, RedirectRule};
pub use crate::retention::Retention;
