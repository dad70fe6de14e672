use crate::catalog::record_of;
use crate::group::Library;
use tracing::instrument;
use zimshelf_catalog::PreviousCatalog;
use zimshelf_purge::InvalidationSet;

/// Latest versions whose published record changed since `previous`.
///
/// Only a book already published under the same core can change: new
/// aliases and new versions are not flagged, and nothing is flagged when the
/// previous catalog is unavailable.
#[instrument(skip_all, fields(available = previous.is_available()))]
pub fn detect(library: &Library, previous: &PreviousCatalog) -> InvalidationSet {
    let mut changed = InvalidationSet::default();
    if !previous.is_available() {
        return changed;
    }
    for entry in library.groups().iter().filter_map(|group| group.head()) {
        let Some(published) = previous.get(&entry.core) else {
            continue;
        };
        let record = record_of(entry);
        let current = record.comparable();
        let differences: Vec<_> = published.diff(&current).collect();
        if differences.is_empty() {
            continue;
        }
        tracing::debug!(alias = entry.alias, core = entry.core, ?differences, "Book changed since last publication");
        let id = record
            .id
            .filter(|id| !id.is_empty())
            .or_else(|| previous.alias_id(&entry.alias).map(str::to_string))
            .unwrap_or_default();
        changed.insert(&entry.alias, id, &entry.core);
    }
    tracing::info!(changed = changed.len(), "Compared with previous catalog");
    changed
}
