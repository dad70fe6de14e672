//! Metadata of exposed archives, read through the cache.

use crate::error::{ErrorKind, Result};
use crate::group::Library;
use async_trait::async_trait;
use exn::{OptionExt, ResultExt};
use futures::StreamExt;
use std::path::PathBuf;
use tracing::instrument;
use zimshelf_cache::Repository;
use zimshelf_storage::{BackendHandle, FileInfo};
use zimshelf_zim::{ArchiveMetadata, ZimReader};

/// Reads the metadata of one archive.
#[async_trait]
pub trait MetadataReader: Send + Sync {
    async fn read(&self, backend: &BackendHandle, file: &FileInfo) -> Result<ArchiveMetadata>;
}

/// Reads ZIM headers and metadata entries from local files on the blocking
/// pool.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZimMetadataReader(ZimReader);

#[async_trait]
impl MetadataReader for ZimMetadataReader {
    async fn read(&self, backend: &BackendHandle, file: &FileInfo) -> Result<ArchiveMetadata> {
        let path = backend.local_path(&file.path).ok_or_raise(|| ErrorKind::Metadata)?;
        let reader = self.0;
        tokio::task::spawn_blocking(move || reader.read(&path))
            .await
            .or_raise(|| ErrorKind::Metadata)?
            .or_raise(|| ErrorKind::Metadata)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetadataReport {
    pub cached: usize,
    pub read: usize,
    pub failed: usize,
}

enum Outcome {
    Cached(ArchiveMetadata),
    Read(ArchiveMetadata),
    Failed,
}

/// Attaches metadata to the first `exposed` entries of every group.
///
/// Cached metadata is used while the file's size and modification time still
/// match; everything else is read (at most `max_concurrency` at a time) and
/// written back to the cache. An archive that cannot be read is logged and
/// left without metadata.
#[instrument(skip(library, backend, reader, cache))]
pub async fn attach_metadata(
    library: &mut Library,
    exposed: usize,
    backend: &BackendHandle,
    reader: &dyn MetadataReader,
    cache: &Repository,
    max_concurrency: usize,
) -> MetadataReport {
    let files: Vec<FileInfo> = library.exposed(exposed).map(|entry| entry.file_info()).collect();
    let outcomes: Vec<Outcome> = futures::stream::iter(files)
        .map(|file| load(file, backend, reader, cache))
        .buffered(max_concurrency.max(1))
        .collect()
        .await;

    let mut report = MetadataReport::default();
    for (entry, outcome) in library.exposed_mut(exposed).zip(outcomes) {
        let metadata = match outcome {
            Outcome::Cached(metadata) => {
                report.cached += 1;
                metadata
            },
            Outcome::Read(metadata) => {
                report.read += 1;
                metadata
            },
            Outcome::Failed => {
                report.failed += 1;
                continue;
            },
        };
        entry.metadata = Some(with_title(metadata, &entry.core));
    }
    tracing::info!(cached = report.cached, read = report.read, failed = report.failed, "Attached archive metadata");
    report
}

async fn load(file: FileInfo, backend: &BackendHandle, reader: &dyn MetadataReader, cache: &Repository) -> Outcome {
    match cache.get(&file).await {
        Ok(Some(metadata)) => return Outcome::Cached(metadata),
        Ok(None) => {},
        Err(e) => tracing::warn!(path = %file.path.display(), error = ?e, "Metadata cache lookup failed"),
    }
    match reader.read(backend, &file).await {
        Ok(metadata) => {
            if let Err(e) = cache.upsert(&file, &metadata).await {
                tracing::warn!(path = %file.path.display(), error = ?e, "Could not cache archive metadata");
            }
            Outcome::Read(metadata)
        },
        Err(e) => {
            tracing::warn!(path = %file.path.display(), error = ?e, "Could not read archive metadata");
            Outcome::Failed
        },
    }
}

fn with_title(mut metadata: ArchiveMetadata, core: &str) -> ArchiveMetadata {
    if metadata.title.is_none() {
        metadata.title = Some(core.replace('_', " "));
    }
    metadata
}

/// Drops cache records for files that are no longer in the tree.
///
/// `present` is every archive found by the scan, including those held back
/// as not yet ready.
#[instrument(skip_all, fields(present = present.len()))]
pub async fn prune_cache(present: &[PathBuf], cache: &Repository) -> Result<u64> {
    let removed = cache.retain(present).await.or_raise(|| ErrorKind::Cache)?;
    tracing::debug!(removed, "Pruned metadata cache");
    Ok(removed)
}
