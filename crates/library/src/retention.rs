//! Removal of versions beyond the retention window.

use crate::entry::Entry;
use crate::error::{ErrorKind, Result};
use crate::group::Library;
use exn::ResultExt;
use std::io::{Write, copy};
use std::path::{Path, PathBuf};
use time::OffsetDateTime;
use tracing::instrument;
use zimshelf_storage::BackendHandle;

/// What happens to a retired archive.
#[derive(Clone)]
pub enum Retention {
    Delete,
    /// Moved into another backend under a timestamped name.
    Quarantine(BackendHandle),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetentionReport {
    pub candidates: usize,
    pub removed: usize,
    pub failed: usize,
}

/// Every version beyond the first `keep` of its group: the oldest ones.
pub fn candidates(library: &Library, keep: usize) -> Vec<&Entry> {
    library.retired(keep).collect()
}

/// Retires every [candidate](candidates) from `backend`.
///
/// Failures are logged and counted per file and never stop the others.
/// Directories are left in place even when emptied.
#[instrument(skip(library, backend, retention), fields(backend = backend.name()))]
pub async fn apply(library: &Library, keep: usize, backend: &BackendHandle, retention: &Retention) -> RetentionReport {
    let retired = candidates(library, keep);
    let mut report = RetentionReport { candidates: retired.len(), ..Default::default() };
    let stamp = OffsetDateTime::now_utc().unix_timestamp();
    for entry in retired {
        let outcome = match retention {
            Retention::Delete => backend.delete(entry.path()).await.or_raise(|| ErrorKind::Retention(1)),
            Retention::Quarantine(quarantine) => move_to(backend, quarantine, entry.path(), stamp).await,
        };
        match outcome {
            Ok(()) => {
                tracing::info!(path = %entry.path().display(), alias = entry.alias, "Retired archive");
                report.removed += 1;
            },
            Err(e) => {
                tracing::error!(path = %entry.path().display(), error = ?e, "Could not retire archive");
                report.failed += 1;
            },
        }
    }
    tracing::info!(candidates = report.candidates, removed = report.removed, failed = report.failed, "Retention done");
    report
}

fn quarantined_name(path: &Path, stamp: i64) -> PathBuf {
    let name = path.file_name().map(|name| name.to_string_lossy().into_owned()).unwrap_or_default();
    path.with_file_name(format!("{name}.{stamp}"))
}

async fn move_to(from: &BackendHandle, to: &BackendHandle, path: &Path, stamp: i64) -> Result<()> {
    let destination = quarantined_name(path, stamp);
    if to.exists(&destination).await.or_raise(|| ErrorKind::Retention(1))? {
        tracing::error!(to = %destination.display(), quarantine = to.name(), "Already quarantined under that name");
        exn::bail!(ErrorKind::Retention(1));
    }
    let expected = from.stat(path).await.or_raise(|| ErrorKind::Retention(1))?.size;
    let mut reader = from.reader(path).await.or_raise(|| ErrorKind::Retention(1))?;
    let mut writer = to.writer(&destination).await.or_raise(|| ErrorKind::Retention(1))?;
    let copied = tokio::task::spawn_blocking(move || {
        let copied = copy(&mut reader, &mut writer)?;
        writer.flush()?;
        Ok::<_, std::io::Error>(copied)
    })
    .await
    .or_raise(|| ErrorKind::Retention(1))?
    .or_raise(|| ErrorKind::Retention(1))?;
    if copied != expected {
        tracing::error!(from = %path.display(), copied, expected, "Short copy to quarantine; keeping the original");
        exn::bail!(ErrorKind::Retention(1));
    }
    tracing::debug!(from = %path.display(), to = %destination.display(), quarantine = to.name(), "Copied to quarantine");
    from.delete(path).await.or_raise(|| ErrorKind::Retention(1))
}
