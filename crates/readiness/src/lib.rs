//! Readiness gating.
//!
//! An archive that exists on disk is not necessarily distributable yet: the
//! mirror network may not have picked it up. A [`ReadinessIndex`] knows which
//! paths are safe to publish, and [`not_ready`] asks it about a whole archive
//! tree, in batches or one path at a time.

pub mod error;
mod index;

use crate::error::{ErrorKind, Result};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::instrument;

pub use crate::index::{MirrorIndex, ReadinessIndex, StaticIndex};

pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// How paths are looked up in the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    /// Set-membership queries of up to this many paths. A batch whose query
    /// fails is retried one path at a time.
    Batched(usize),
    /// One query per path.
    PerPath,
}
impl Default for Lookup {
    fn default() -> Self {
        Self::Batched(DEFAULT_BATCH_SIZE)
    }
}

/// Returns the subset of `paths` (absolute) that the index does not confirm
/// as present. Index keys are the paths relative to `root`.
///
/// Paths outside `root` can never be confirmed and are always returned.
#[instrument(skip(index, paths), fields(paths = paths.len(), root = %root.display()))]
pub async fn not_ready<I>(index: &I, paths: &[PathBuf], root: &Path, lookup: Lookup) -> Result<Vec<PathBuf>>
where
    I: ReadinessIndex + ?Sized,
{
    if lookup == Lookup::Batched(0) {
        exn::bail!(ErrorKind::Config("batch size must be at least 1"));
    }
    let keys: Vec<Option<String>> = paths
        .iter()
        .map(|path| path.strip_prefix(root).ok().and_then(Path::to_str).map(str::to_string))
        .collect();
    let queryable: Vec<String> = keys.iter().flatten().cloned().collect();
    let present = match lookup {
        Lookup::Batched(batch_size) => batched(index, &queryable, batch_size).await?,
        Lookup::PerPath => one_by_one(index, &queryable).await?,
    };

    let missing: Vec<PathBuf> = paths
        .iter()
        .zip(keys)
        .filter(|(path, key)| match key {
            Some(key) => !present.contains(key),
            None => {
                tracing::warn!(path = %path.display(), "Archive is outside the readiness root");
                true
            },
        })
        .map(|(path, _)| path.clone())
        .collect();
    tracing::info!(checked = paths.len(), not_ready = missing.len(), "Readiness check complete");
    Ok(missing)
}

async fn batched<I>(index: &I, keys: &[String], batch_size: usize) -> Result<HashSet<String>>
where
    I: ReadinessIndex + ?Sized,
{
    let mut present = HashSet::with_capacity(keys.len());
    for (number, batch) in keys.chunks(batch_size).enumerate() {
        let found = match index.present(batch).await {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!(batch = number, error = ?e, "Batch query failed; falling back to per-path queries");
                one_by_one(index, batch).await?
            },
        };
        tracing::debug!(batch = number, queried = batch.len(), found = found.len(), "Queried readiness index");
        present.extend(found);
    }
    Ok(present)
}

async fn one_by_one<I>(index: &I, keys: &[String]) -> Result<HashSet<String>>
where
    I: ReadinessIndex + ?Sized,
{
    let mut present = HashSet::new();
    for key in keys {
        if index.contains(key).await? {
            present.insert(key.clone());
        }
    }
    Ok(present)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use rstest::rstest;
    use std::ops::Deref;
    use std::sync::Mutex;

    /// Records the size of every batch and every single-path lookup.
    struct CountingIndex {
        inner: StaticIndex,
        batches: Mutex<Vec<usize>>,
        singles: Mutex<usize>,
        batches_fail: bool,
    }
    impl CountingIndex {
        fn new(batches_fail: bool) -> Self {
            Self {
                inner: StaticIndex::new(["zim/a_en_2024-01.zim", "zim/c_en_2024-01.zim"]),
                batches: Mutex::new(Vec::new()),
                singles: Mutex::new(0),
                batches_fail,
            }
        }
    }
    #[async_trait]
    impl ReadinessIndex for CountingIndex {
        async fn present(&self, paths: &[String]) -> Result<HashSet<String>> {
            self.batches.lock().unwrap().push(paths.len());
            if self.batches_fail {
                exn::bail!(ErrorKind::Unavailable);
            }
            self.inner.present(paths).await
        }

        async fn contains(&self, path: &str) -> Result<bool> {
            *self.singles.lock().unwrap() += 1;
            self.inner.contains(path).await
        }
    }

    fn tree() -> Vec<PathBuf> {
        paths(&[
            "zim/a_en_2024-01.zim",
            "zim/b_en_2024-01.zim",
            "zim/c_en_2024-01.zim",
            "zim/d_en_2024-01.zim",
            "zim/e_en_2024-01.zim",
        ])
    }

    fn expected_missing() -> Vec<PathBuf> {
        paths(&["zim/b_en_2024-01.zim", "zim/d_en_2024-01.zim", "zim/e_en_2024-01.zim"])
    }

    fn paths(names: &[&str]) -> Vec<PathBuf> {
        names.iter().map(|name| PathBuf::from("/data/download").join(name)).collect()
    }

    #[rstest]
    #[case(1, vec![1, 1, 1, 1, 1])]
    #[case(2, vec![2, 2, 1])]
    #[case(1000, vec![5])]
    #[tokio::test]
    async fn test_batches(#[case] batch_size: usize, #[case] expected: Vec<usize>) {
        let index = CountingIndex::new(false);
        let missing = not_ready(&index, &tree(), Path::new("/data/download"), Lookup::Batched(batch_size)).await.unwrap();
        assert_eq!(missing, expected_missing());
        assert_eq!(*index.batches.lock().unwrap(), expected);
        assert_eq!(*index.singles.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_per_path() {
        let index = CountingIndex::new(false);
        let missing = not_ready(&index, &tree(), Path::new("/data/download"), Lookup::PerPath).await.unwrap();
        assert_eq!(missing, expected_missing());
        assert!(index.batches.lock().unwrap().is_empty());
        assert_eq!(*index.singles.lock().unwrap(), 5);
    }

    #[tokio::test]
    async fn test_failed_batch_falls_back_to_per_path() {
        let index = CountingIndex::new(true);
        let missing = not_ready(&index, &tree(), Path::new("/data/download"), Lookup::Batched(2)).await.unwrap();
        assert_eq!(missing, expected_missing());
        assert_eq!(*index.batches.lock().unwrap(), [2, 2, 1]);
        assert_eq!(*index.singles.lock().unwrap(), 5);
    }

    #[tokio::test]
    async fn test_outside_root_is_not_ready() {
        let index = StaticIndex::new(["a_en_2024-01.zim"]);
        let all = vec![PathBuf::from("/elsewhere/a_en_2024-01.zim")];
        let missing = not_ready(&index, &all, Path::new("/data/download"), Lookup::default()).await.unwrap();
        assert_eq!(missing, all);
    }

    #[tokio::test]
    async fn test_zero_batch_size() {
        let err = not_ready(&StaticIndex::default(), &[], Path::new("/"), Lookup::Batched(0)).await.unwrap_err();
        assert!(matches!(err.deref(), ErrorKind::Config(_)));
    }
}
