//! Catalog metadata from ZIM archives.
//!
//! Only the small part of the format needed to describe an archive in a
//! catalog is implemented: the header (for the archive UUID), binary search
//! over directory entries, and cluster decompression (xz and zstd) for the
//! `M/` metadata entries, the counter and the 48x48 illustration.

mod archive;
mod cluster;
mod dirent;
pub mod error;
#[cfg(test)]
mod fixture;
mod header;
mod metadata;

pub use crate::archive::Archive;
pub use crate::cluster::Compression;
pub use crate::dirent::{Dirent, Target};
pub use crate::header::Header;
pub use crate::metadata::{ArchiveMetadata, ZimReader, read_metadata};
