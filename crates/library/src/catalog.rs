//! Publication of the public and internal catalogs.

use crate::entry::Entry;
use crate::error::{ErrorKind, Result};
use crate::group::Library;
use exn::ResultExt;
use std::path::Path;
use tracing::instrument;
use zimshelf_catalog::{CatalogRecord, render_internal, render_public, validate};
use zimshelf_storage::Publisher;

/// The catalog record of an entry. Entries without metadata produce a record
/// without an `id`, which the catalog refuses to render.
pub fn record_of(entry: &Entry) -> CatalogRecord {
    CatalogRecord::new(entry.download_url.clone(), entry.size, &entry.metadata.clone().unwrap_or_default())
}

/// One record per exposed entry, group by group.
pub fn records(library: &Library, exposed: usize) -> Vec<CatalogRecord> {
    library.exposed(exposed).map(record_of).collect()
}

pub struct CatalogTargets<'a> {
    pub public: &'a Path,
    pub internal: &'a Path,
    pub download_url_root: &'a str,
    pub internal_root: &'a str,
}

/// Publishes both catalogs. Each is validated before it replaces the
/// published one, and a failure on one does not prevent the other.
#[instrument(skip_all, fields(public = %targets.public.display(), internal = %targets.internal.display()))]
pub async fn publish(
    library: &Library,
    exposed: usize,
    targets: &CatalogTargets<'_>,
    publisher: &Publisher,
) -> Vec<crate::error::Error> {
    let records = records(library, exposed);
    let mut failures = Vec::new();
    let public = render_public(&records).or_raise(|| ErrorKind::Catalog);
    if let Err(e) = publish_one(publisher, targets.public, public).await {
        tracing::error!(error = ?e, "Public catalog not published");
        failures.push(e);
    }
    let internal =
        render_internal(&records, targets.download_url_root, targets.internal_root).or_raise(|| ErrorKind::Catalog);
    if let Err(e) = publish_one(publisher, targets.internal, internal).await {
        tracing::error!(error = ?e, "Internal catalog not published");
        failures.push(e);
    }
    if failures.is_empty() {
        tracing::info!(books = records.len(), "Published catalogs");
    }
    failures
}

async fn publish_one(publisher: &Publisher, destination: &Path, document: Result<Vec<u8>>) -> Result<()> {
    publisher
        .publish(destination, document?, |staged| validate(staged).map(|_| ()).map_err(|e| e.to_string()))
        .await
        .or_raise(|| ErrorKind::Catalog)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candidates::tests::{URL_ROOT, entry};
    use crate::candidates::{Candidates, Unordered};
    use std::ops::Deref;
    use zimshelf_catalog::PreviousCatalog;
    use zimshelf_zim::ArchiveMetadata;

    fn library(paths: &[&str]) -> Library {
        let candidates: Candidates<Unordered> = paths.iter().copied().map(entry).collect();
        let mut library = Library::group(candidates.into_ordered());
        for e in library.exposed_mut(usize::MAX) {
            if !e.core.starts_with("anonymous") {
                e.metadata = Some(ArchiveMetadata { id: Some(format!("id-{}", e.core)), ..Default::default() });
            }
        }
        library
    }

    fn targets(dir: &Path) -> (std::path::PathBuf, std::path::PathBuf) {
        (dir.join("library_zim.xml"), dir.join("internal_library.xml"))
    }

    #[test]
    fn test_records_follow_exposure() {
        let library = library(&["w/w_en_2024-02.zim", "w/w_en_2024-01.zim", "t/t_en_2023-01.zim"]);
        let urls: Vec<_> = records(&library, 1).into_iter().map(|record| record.url).collect();
        assert_eq!(urls, [format!("{URL_ROOT}w/w_en_2024-02.zim.meta4"), format!("{URL_ROOT}t/t_en_2023-01.zim.meta4")]);
        assert_eq!(records(&library, 2).len(), 3);
    }

    #[tokio::test]
    async fn test_publish_both() {
        let dir = tempfile::tempdir().unwrap();
        let (public, internal) = targets(dir.path());
        let targets = CatalogTargets { public: &public, internal: &internal, download_url_root: URL_ROOT, internal_root: "/data" };
        let library = library(&["w/w_en_2024-02.zim", "t/t_en_2023-01.zim"]);
        let failures = publish(&library, 1, &targets, &Publisher::new(None)).await;
        assert!(failures.is_empty());

        let previous = PreviousCatalog::load(&public).await;
        assert_eq!(previous.len(), 2);
        assert_eq!(previous.alias_id("w_en"), Some("id-w_en_2024-02"));
        let internal = std::fs::read_to_string(&internal).unwrap();
        assert!(internal.contains("path=\"/data/w/w_en_2024-02.zim\""));
    }

    #[tokio::test]
    async fn test_missing_identifier_keeps_published_catalog() {
        let dir = tempfile::tempdir().unwrap();
        let (public, internal) = targets(dir.path());
        std::fs::write(&public, "previous").unwrap();
        let targets = CatalogTargets { public: &public, internal: &internal, download_url_root: URL_ROOT, internal_root: "/data" };
        let library = library(&["w/w_en_2024-02.zim", "anonymous_en_2024-01.zim"]);
        let failures = publish(&library, 1, &targets, &Publisher::new(None)).await;
        assert_eq!(failures.len(), 2);
        assert!(failures.iter().all(|e| matches!(e.deref(), ErrorKind::Catalog)));
        assert_eq!(std::fs::read_to_string(&public).unwrap(), "previous");
        assert!(!internal.exists());
    }

    #[tokio::test]
    async fn test_dry_run_publishes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let (public, internal) = targets(dir.path());
        let targets = CatalogTargets { public: &public, internal: &internal, download_url_root: URL_ROOT, internal_root: "/data" };
        let failures = publish(&library(&["w/w_en_2024-02.zim"]), 1, &targets, &Publisher::new(None).dry_run(true)).await;
        assert!(failures.is_empty());
        assert!(!public.exists());
    }
}
