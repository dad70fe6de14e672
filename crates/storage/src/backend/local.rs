//! Local filesystem storage backend.
//!
//! Files live under a configured root directory and are accessed through
//! `tokio::fs`.

use crate::backend::{BoxSyncRead, BoxSyncWrite, FileInfoStream};
use crate::error::ErrorKind;
use crate::{FileInfo, ScanFilter, StorageBackend, error::Result, path::validate as validate_path};
use async_stream::stream;
use async_trait::async_trait;
use std::collections::HashSet;
use std::fs::Metadata;
use std::path::{Path, PathBuf};
use tokio::fs::{self, DirEntry};

enum WalkEntry {
    File(FileInfo),
    Descend(PathBuf),
    Skip,
}

/// Local filesystem storage backend.
///
/// All paths are relative to the configured root directory. With a
/// [`ScanFilter`] attached, listings skip hidden, denylisted and
/// delete-marked entries and only yield files with the archive extension.
///
/// ```no_run
/// use zimshelf_storage::{ScanFilter, backend::LocalBackend};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = LocalBackend::new("zim", "/data/download/zim")?.with_filter(ScanFilter::default());
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct LocalBackend {
    name: String,
    root: PathBuf,
    filter: Option<ScanFilter>,
}
impl LocalBackend {
    /// Create a new local filesystem backend. A missing root is not created
    /// here: it lists as empty and appears with the first write.
    ///
    /// # Errors
    ///
    /// Returns an error if the path is not absolute or is not a directory.
    pub fn new(name: impl Into<String>, root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.is_absolute() || (root.exists() && !root.is_dir()) {
            exn::bail!(ErrorKind::InvalidPath(root));
        }
        Ok(Self { name: name.into(), root, filter: None })
    }

    pub fn with_filter(mut self, filter: ScanFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, relative: &Path) -> Result<PathBuf> {
        Ok(self.root.join(validate_path(relative)?))
    }

    /// Inverse of [`resolve`](Self::resolve), for paths found while walking.
    fn relativize(&self, found: &Path) -> Result<PathBuf> {
        let Ok(relative) = found.strip_prefix(&self.root) else {
            exn::bail!(ErrorKind::BackendError(format!(
                "walked outside of {}: {}",
                self.root.display(),
                found.display()
            )));
        };
        validate_path(relative)
    }

    /// Resolves `relative` and makes sure its parent directory exists.
    async fn prepare(&self, relative: &Path) -> Result<PathBuf> {
        let target = self.resolve(relative)?;
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await.map_err(io_error(relative))?;
        }
        Ok(target)
    }

    /// Classifies one directory entry. `siblings` holds every name in the
    /// entry's directory, for deletion marker lookups.
    async fn process_entry(
        &self,
        entry: &DirEntry,
        prefix: Option<&Path>,
        siblings: &HashSet<String>,
    ) -> Result<WalkEntry> {
        let path = entry.path();
        let metadata = entry.metadata().await.map_err(io_error(&path))?;
        let relative = self.relativize(&path)?;
        if let Some(pfx) = prefix
            && !relative.starts_with(pfx)
            && !pfx.starts_with(&relative)
        {
            return Ok(WalkEntry::Skip);
        }
        let Some(name) = entry.file_name().to_str().map(ToString::to_string) else {
            tracing::debug!(path = %path.display(), "Skipping entry with non UTF-8 name");
            return Ok(WalkEntry::Skip);
        };
        let has_sibling = |s: &str| siblings.contains(s);
        if metadata.is_dir() {
            return Ok(match &self.filter {
                Some(filter) if !filter.allows_dir(&name, has_sibling) => WalkEntry::Skip,
                _ => WalkEntry::Descend(path),
            });
        }
        if metadata.is_file() {
            if prefix.is_some_and(|pfx| !relative.starts_with(pfx)) {
                return Ok(WalkEntry::Skip);
            }
            return Ok(match &self.filter {
                Some(filter) if !filter.allows_file(&name, has_sibling) => WalkEntry::Skip,
                _ => WalkEntry::File(file_info(relative, &metadata)?),
            });
        }
        // Most likely a broken symlink.
        Ok(WalkEntry::Skip)
    }
}

#[async_trait]
impl StorageBackend for LocalBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn local_path(&self, path: &Path) -> Option<PathBuf> {
        self.resolve(path).ok()
    }

    fn list_stream<'a>(&'a self, prefix: Option<&'a Path>) -> FileInfoStream<'a> {
        let validated_prefix = match prefix.map(validate_path).transpose() {
            Ok(pfx) => pfx,
            Err(e) => return Box::pin(futures::stream::once(async { Result::Err(e) })),
        };
        // Always walk from the root so that every segment above the prefix
        // still goes through the filter.
        let mut stack = vec![self.root.clone()];

        Box::pin(stream! {
            'dirs: while let Some(current) = stack.pop() {
                let mut reader = match fs::read_dir(&current).await {
                    Ok(reader) => reader,
                    // Listing a directory that doesn't exist yields nothing.
                    Err(err) if err.kind() == std::io::ErrorKind::NotFound => continue,
                    Err(err) => {
                        yield Err(exn::Exn::from(io_error(&current)(err)));
                        continue 'dirs;
                    }
                };

                // Markers can only be checked once the whole directory is known.
                let mut entries = Vec::new();
                'entries: loop {
                    match reader.next_entry().await {
                        Ok(Some(entry)) => entries.push(entry),
                        Ok(None) => break 'entries,
                        Err(e) => { yield Err(exn::Exn::from(io_error(&current)(e))); continue 'dirs; },
                    }
                }
                let siblings: HashSet<String> =
                    entries.iter().filter_map(|e| e.file_name().to_str().map(ToString::to_string)).collect();

                for entry in &entries {
                    match self.process_entry(entry, validated_prefix.as_deref(), &siblings).await {
                        Ok(WalkEntry::File(f)) => yield Ok(f),
                        Ok(WalkEntry::Descend(d)) => stack.push(d),
                        Ok(WalkEntry::Skip) => {},
                        Err(e) => yield Err(e),
                    };
                }
            }
        })
    }

    async fn exists(&self, path: &Path) -> Result<bool> {
        Ok(fs::try_exists(self.resolve(path)?).await.map_err(ErrorKind::Io)?)
    }

    async fn read(&self, path: &Path) -> Result<Vec<u8>> {
        Ok(fs::read(self.resolve(path)?).await.map_err(io_error(path))?)
    }

    async fn reader(&self, path: &Path) -> Result<BoxSyncRead> {
        let archive = fs::File::open(self.resolve(path)?).await.map_err(io_error(path))?;
        Ok(Box::new(archive.into_std().await))
    }

    async fn writer(&self, path: &Path) -> Result<BoxSyncWrite> {
        let target = self.prepare(path).await?;
        let created = fs::File::create(target).await.map_err(io_error(path))?;
        Ok(Box::new(created.into_std().await))
    }

    async fn delete(&self, path: &Path) -> Result<()> {
        Ok(fs::remove_file(self.resolve(path)?).await.map_err(io_error(path))?)
    }

    async fn stat(&self, path: &Path) -> Result<FileInfo> {
        let metadata = fs::metadata(self.resolve(path)?).await.map_err(io_error(path))?;
        file_info(validate_path(path)?, &metadata)
    }
}

fn file_info(relative: PathBuf, metadata: &Metadata) -> Result<FileInfo> {
    let modified = metadata.modified().map_err(ErrorKind::Io)?;
    Ok(FileInfo::new(relative, metadata.len(), modified.into()))
}

/// Maps an I/O failure on `path` to the error kind callers act on.
fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> ErrorKind + '_ {
    move |e| match e.kind() {
        std::io::ErrorKind::NotFound => ErrorKind::NotFound(path.to_path_buf()),
        std::io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied(path.to_path_buf()),
        _ => ErrorKind::Io(e),
    }
}
