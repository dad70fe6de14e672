//! The XML archive catalog.
//!
//! A catalog is a flat list of `<book>` elements under a single
//! `<library version="20110515">` root, one per exposed archive. Two flavours
//! are published from the same records:
//!
//! - the **public** catalog, consumed by content servers and their caches;
//! - the **internal** catalog, which additionally carries each archive's
//!   `path` on the serving host.
//!
//! The last published public catalog is read back at the start of a run as a
//! [`PreviousCatalog`] so that changed books can be purged from caches.

pub mod error;
mod previous;
mod record;
mod writer;

pub use crate::previous::PreviousCatalog;
pub use crate::record::{ATTRIBUTES, CatalogRecord, ComparableRecord, FAVICON_MIME_TYPE};
pub use crate::writer::{LIBRARY_VERSION, internal_path, render_internal, render_public, validate};
