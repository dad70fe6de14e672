use crate::candidates::Candidates;
use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::instrument;
use zimshelf_readiness::{Lookup, ReadinessIndex, not_ready};

/// Drops every candidate the readiness index does not confirm.
///
/// Applies to every version, not only the exposed ones: an alias whose
/// versions are all pending disappears from the run, and an alias with some
/// pending versions keeps only the confirmed ones. Returns how many
/// candidates were dropped.
#[instrument(skip(candidates, index), fields(candidates = candidates.len()))]
pub async fn retain_ready<S, I>(
    candidates: &mut Candidates<S>,
    index: &I,
    zim_root: &Path,
    readiness_root: &Path,
    lookup: Lookup,
) -> Result<usize>
where
    I: ReadinessIndex + ?Sized,
{
    let paths: Vec<PathBuf> = candidates.iter().map(|entry| zim_root.join(entry.path())).collect();
    let pending: HashSet<PathBuf> = not_ready(index, &paths, readiness_root, lookup)
        .await
        .or_raise(|| ErrorKind::Readiness)?
        .into_iter()
        .collect();
    if pending.is_empty() {
        return Ok(0);
    }
    for path in &pending {
        tracing::info!(path = %path.display(), "Not yet distributed; leaving out of this run");
    }
    let before = candidates.len();
    candidates.retain(|entry| !pending.contains(&zim_root.join(entry.path())));
    Ok(before - candidates.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candidates::tests::entry;
    use crate::candidates::{Candidates, Unordered};
    use crate::group::Library;
    use async_trait::async_trait;
    use std::ops::Deref;
    use zimshelf_readiness::StaticIndex;

    fn candidates() -> Candidates<Unordered> {
        ["wikipedia/w_en_2024-02.zim", "wikipedia/w_en_2024-01.zim", "ted/ted_en_2024-01.zim"]
            .into_iter()
            .map(entry)
            .collect()
    }

    #[tokio::test]
    async fn test_pending_versions_are_dropped() {
        let index = StaticIndex::new(["zim/wikipedia/w_en_2024-01.zim".to_string()]);
        let mut candidates = candidates();
        let dropped =
            retain_ready(&mut candidates, &index, Path::new("/data/download/zim"), Path::new("/data/download"), Lookup::Batched(10))
                .await
                .unwrap();
        assert_eq!(dropped, 2);
        let library = Library::group(candidates.into_ordered());
        assert_eq!(library.len(), 1);
        let w = library.group_of("w_en").unwrap();
        assert_eq!(w.entries().len(), 1);
        assert_eq!(w.entries()[0].core, "w_en_2024-01");
        assert!(w.entries()[0].is_latest);
    }

    #[tokio::test]
    async fn test_everything_ready() {
        let index = StaticIndex::new(
            ["wikipedia/w_en_2024-02.zim", "wikipedia/w_en_2024-01.zim", "ted/ted_en_2024-01.zim"].map(String::from),
        );
        let mut candidates = candidates();
        let dropped =
            retain_ready(&mut candidates, &index, Path::new("/srv"), Path::new("/srv"), Lookup::PerPath).await.unwrap();
        assert_eq!(dropped, 0);
        assert_eq!(candidates.len(), 3);
    }

    struct Down;
    #[async_trait]
    impl ReadinessIndex for Down {
        async fn present(&self, _: &[String]) -> zimshelf_readiness::error::Result<HashSet<String>> {
            exn::bail!(zimshelf_readiness::error::ErrorKind::Unavailable)
        }
    }

    #[tokio::test]
    async fn test_unreachable_index_fails() {
        let mut candidates = candidates();
        let err = retain_ready(&mut candidates, &Down, Path::new("/srv"), Path::new("/srv"), Lookup::Batched(100))
            .await
            .unwrap_err();
        assert!(matches!(err.deref(), ErrorKind::Readiness));
        assert_eq!(candidates.len(), 3);
    }
}
