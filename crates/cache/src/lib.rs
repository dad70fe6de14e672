//! SQLite cache of archive metadata.
//!
//! Reading metadata out of thousands of archives on every run is the slowest
//! part of a reconciliation. This crate remembers what was read, keyed by the
//! archive's path relative to the archive root and validated against its size
//! and modification time.
//!
//! The cache is never a source of truth: deleting the database only costs the
//! next run a re-read of every exposed archive.

mod db;
pub mod error;
mod models;
mod repo;

pub use crate::db::Database;
pub use crate::repo::Repository;
