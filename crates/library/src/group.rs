//! Version grouping.

use crate::candidates::{Candidates, Ordered, processing_order};
use crate::entry::Entry;
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::instrument;

/// Every version of one alias, most recent first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasGroup {
    pub alias: String,
    entries: Vec<Entry>,
}
impl AliasGroup {
    fn new(alias: String) -> Self {
        Self { alias, entries: Vec::new() }
    }

    /// Inserts at the position that keeps the group sorted.
    fn insert(&mut self, entry: Entry) {
        let position = self.entries.partition_point(|existing| processing_order(existing, &entry).is_le());
        self.entries.insert(position, entry);
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn head(&self) -> Option<&Entry> {
        self.entries.first()
    }

    /// The first `count` versions; always at least the head.
    pub fn exposed(&self, count: usize) -> &[Entry] {
        &self.entries[..count.max(1).min(self.entries.len())]
    }

    /// Versions beyond the first `keep`.
    pub fn retired(&self, keep: usize) -> &[Entry] {
        &self.entries[keep.min(self.entries.len())..]
    }
}

/// All alias groups of a run, in order of first appearance in processing
/// order (so the group holding the most recent archive comes first).
#[derive(Debug, Clone, Default)]
pub struct Library {
    groups: Vec<AliasGroup>,
    index: HashMap<String, usize>,
}
impl Library {
    /// Groups ordered candidates by alias and marks each group's head as
    /// the latest version.
    ///
    /// Cores are unique across the library: a file whose stem was already
    /// seen elsewhere in the tree is logged and left out.
    #[instrument(skip_all, fields(candidates = candidates.len()))]
    pub fn group(candidates: Candidates<Ordered>) -> Self {
        let mut library = Self::default();
        let mut cores: HashMap<String, PathBuf> = HashMap::new();
        for entry in candidates.into_entries() {
            if let Some(kept) = cores.get(&entry.core) {
                tracing::warn!(
                    core = entry.core,
                    kept = %kept.display(),
                    skipped = %entry.path().display(),
                    "Duplicate archive name; keeping the first"
                );
                continue;
            }
            cores.insert(entry.core.clone(), entry.path().to_path_buf());
            let slot = match library.index.get(&entry.alias) {
                Some(slot) => *slot,
                None => {
                    library.index.insert(entry.alias.clone(), library.groups.len());
                    library.groups.push(AliasGroup::new(entry.alias.clone()));
                    library.groups.len() - 1
                },
            };
            library.groups[slot].insert(entry);
        }
        for group in &mut library.groups {
            for (position, entry) in group.entries.iter_mut().enumerate() {
                entry.is_latest = position == 0;
            }
        }
        tracing::info!(aliases = library.groups.len(), "Grouped archives by alias");
        library
    }

    pub fn groups(&self) -> &[AliasGroup] {
        &self.groups
    }

    pub fn group_of(&self, alias: &str) -> Option<&AliasGroup> {
        self.index.get(alias).map(|slot| &self.groups[*slot])
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn entry_count(&self) -> usize {
        self.groups.iter().map(|group| group.entries.len()).sum()
    }

    pub fn entries(&self) -> impl Iterator<Item = &Entry> {
        self.groups.iter().flat_map(|group| group.entries.iter())
    }

    /// Exposed entries of every group, group by group.
    pub fn exposed(&self, count: usize) -> impl Iterator<Item = &Entry> {
        self.groups.iter().flat_map(move |group| group.exposed(count).iter())
    }

    pub(crate) fn exposed_mut(&mut self, count: usize) -> impl Iterator<Item = &mut Entry> {
        self.groups.iter_mut().flat_map(move |group| {
            let end = count.max(1).min(group.entries.len());
            group.entries[..end].iter_mut()
        })
    }

    /// Entries beyond the first `keep` of every group.
    pub fn retired(&self, keep: usize) -> impl Iterator<Item = &Entry> {
        self.groups.iter().flat_map(move |group| group.retired(keep).iter())
    }
}
