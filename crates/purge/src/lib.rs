//! Cache invalidation.
//!
//! When a book's catalog entry changes, caches in front of the content
//! servers must drop both the cached catalog and anything cached for that
//! book. The set of changed books is an [`InvalidationSet`]; a [`Purger`]
//! carries it to the cache.

pub mod error;
mod http;

use crate::error::Result;
use async_trait::async_trait;
use std::collections::BTreeMap;

pub use crate::http::HttpPurger;

/// A book whose catalog entry changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invalidation<'a> {
    /// Version-independent name, e.g. `wikipedia_en_all`.
    pub alias: &'a str,
    pub id: &'a str,
    /// Versioned name, e.g. `wikipedia_en_all_2024-01`.
    pub core: &'a str,
}

/// Changed books keyed by alias. Each alias appears once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvalidationSet(BTreeMap<String, (String, String)>);
impl InvalidationSet {
    pub fn insert(&mut self, alias: impl Into<String>, id: impl Into<String>, core: impl Into<String>) {
        self.0.insert(alias.into(), (id.into(), core.into()));
    }

    pub fn iter(&self) -> impl Iterator<Item = Invalidation<'_>> {
        self.0.iter().map(|(alias, (id, core))| Invalidation { alias, id, core })
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Outcome of a purge; individual rejected requests are not errors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PurgeReport {
    pub sent: usize,
    pub failed: usize,
}

#[async_trait]
pub trait Purger: Send + Sync {
    /// Purges the catalog, then every book in `set`. Does nothing for an
    /// empty set.
    async fn purge(&self, set: &InvalidationSet) -> Result<PurgeReport>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_keeps_one_entry_per_alias() {
        let mut set = InvalidationSet::default();
        set.insert("wikipedia_en_all", "id-1", "wikipedia_en_all_2024-01");
        set.insert("ted_en", "id-2", "ted_en_2024-01");
        set.insert("wikipedia_en_all", "id-3", "wikipedia_en_all_2024-02");
        assert_eq!(set.len(), 2);
        assert_eq!(
            set.iter().collect::<Vec<_>>(),
            [
                Invalidation { alias: "ted_en", id: "id-2", core: "ted_en_2024-01" },
                Invalidation { alias: "wikipedia_en_all", id: "id-3", core: "wikipedia_en_all_2024-02" },
            ]
        );
    }
}
