//! Storage backend trait and implementations.
//!
//! The archive tree, and the quarantine area retired archives are moved into,
//! are both accessed through [`StorageBackend`].

mod local;
#[cfg(feature = "mock")]
mod mock;
mod ro;

pub use self::local::LocalBackend;
#[cfg(feature = "mock")]
pub use self::mock::MockBackend;
pub use self::ro::ReadOnlyBackend;
use crate::error::Result;
use crate::models::FileInfo;
use async_trait::async_trait;
use futures::Stream;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::pin::Pin;

type FileInfoStream<'a> = Pin<Box<dyn Stream<Item = Result<FileInfo>> + Send + 'a>>;
type BoxSyncRead = Box<dyn Read + Send + 'static>;
type BoxSyncWrite = Box<dyn Write + Send + 'static>;

/// Unified interface for storage backends.
///
/// # Path Handling
/// All paths are relative to the storage root and must be validated using
/// [`validate_path`](crate::validate_path) before use. Implementations
/// enforce this validation.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use zimshelf_storage::{backend::StorageBackend, error::Result};
///
/// async fn archive_size(backend: &dyn StorageBackend) -> Result<u64> {
///     let path = Path::new("wikipedia/wikipedia_en_all_2024-01.zim");
///     if backend.exists(path).await? {
///         Ok(backend.stat(path).await?.size)
///     } else {
///         Ok(0)
///     }
/// }
/// ```
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Name of the backend, for logging only.
    fn name(&self) -> &str;

    /// Absolute location of a relative path, for backends that live on the
    /// local filesystem. Readers that need random access (archive headers,
    /// directory entries) open files through this.
    fn local_path(&self, path: &Path) -> Option<PathBuf>;

    /// Stream file metadata matching an optional prefix.
    ///
    /// Backends configured with a [`ScanFilter`](crate::ScanFilter) only
    /// yield the entries it allows. The stream is finite and can be
    /// restarted by calling this method again.
    ///
    /// ```
    /// use futures::TryStreamExt;
    /// # use zimshelf_storage::{backend::StorageBackend, error::Result};
    /// # async fn example(backend: &dyn StorageBackend) -> Result<()> {
    /// let mut stream = backend.list_stream(None);
    /// while let Some(info) = stream.try_next().await? {
    ///     println!("{}: {} bytes", info.path.display(), info.size);
    /// }
    /// # Ok(())
    /// # }
    /// ```
    fn list_stream<'a>(&'a self, prefix: Option<&'a Path>) -> FileInfoStream<'a>;

    /// Check if a file exists.
    async fn exists(&self, path: &Path) -> Result<bool>;

    /// Read file contents.
    ///
    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) if the file
    /// does not exist.
    async fn read(&self, path: &Path) -> Result<Vec<u8>>;

    /// Open a file for streaming reads.
    ///
    /// Returns a `'static` boxed [`Read`] suitable for use inside
    /// [`spawn_blocking`](tokio::task::spawn_blocking); archives are far too
    /// large to hold in memory.
    async fn reader(&self, path: &Path) -> Result<BoxSyncRead>;

    /// Open a file for streaming writes, creating parent directories as
    /// needed. Callers should `flush()` before dropping.
    async fn writer(&self, path: &Path) -> Result<BoxSyncWrite>;

    /// Delete a file.
    ///
    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) if the file
    /// does not exist.
    async fn delete(&self, path: &Path) -> Result<()>;

    /// Get file metadata without reading contents.
    async fn stat(&self, path: &Path) -> Result<FileInfo>;
}
