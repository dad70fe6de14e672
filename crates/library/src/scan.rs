//! Discovery of candidate archives.

use crate::candidates::{Candidates, Unordered};
use crate::entry::Entry;
use crate::error::{ErrorKind, Result};
use async_stream::try_stream;
use exn::ResultExt;
use futures::{Stream, StreamExt};
use std::path::PathBuf;
use tracing::instrument;
use zimshelf_storage::BackendHandle;

pub enum ScanEvent {
    Started,
    /// A listed file whose name parsed.
    Discovered(Box<Entry>),
    /// A listed file whose name follows neither naming convention.
    Skipped { path: PathBuf },
    Complete { discovered: usize, skipped: usize },
}

/// Streams the archives of `backend`, filtered by whatever
/// [`ScanFilter`](zimshelf_storage::ScanFilter) the backend carries. The
/// stream is finite and calling this again starts a fresh walk.
pub fn scan<'a>(backend: &'a BackendHandle, download_url_root: &'a str) -> impl Stream<Item = Result<ScanEvent>> + 'a {
    try_stream! {
        yield ScanEvent::Started;
        let (mut discovered, mut skipped) = (0, 0);
        for await file in backend.list_stream(None) {
            let file = file.or_raise(|| ErrorKind::Scan)?;
            let path = file.path.clone();
            match Entry::from_file(file, download_url_root) {
                Ok(entry) => {
                    discovered += 1;
                    yield ScanEvent::Discovered(Box::new(entry));
                },
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Unrecognised archive name; skipping");
                    skipped += 1;
                    yield ScanEvent::Skipped { path };
                },
            }
        }
        yield ScanEvent::Complete { discovered, skipped };
    }
}

/// Runs a full scan and collects its entries.
#[instrument(skip_all, fields(backend = backend.name()))]
pub async fn discover(backend: &BackendHandle, download_url_root: &str) -> Result<Candidates<Unordered>> {
    let mut candidates = Candidates::default();
    let events = scan(backend, download_url_root);
    futures::pin_mut!(events);
    while let Some(event) = events.next().await {
        match event? {
            ScanEvent::Started => tracing::debug!("Scan started"),
            ScanEvent::Discovered(entry) => candidates.push(*entry),
            ScanEvent::Skipped { .. } => {},
            ScanEvent::Complete { discovered, skipped } => {
                tracing::info!(discovered, skipped, "Scan complete");
            },
        }
    }
    Ok(candidates)
}
