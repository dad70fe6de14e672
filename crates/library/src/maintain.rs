//! One maintenance run over the archive tree.

use crate::candidates::Candidates;
use crate::catalog::{self, CatalogTargets};
use crate::changes;
use crate::error::{Error, ErrorKind, Result};
use crate::group::Library;
use crate::metadata::{self, MetadataReader, ZimMetadataReader};
use crate::readiness::retain_ready;
use crate::redirects::{self, RedirectMap};
use crate::retention::{self, Retention};
use crate::scan::discover;
use derive_more::Display;
use exn::{OptionExt, ResultExt};
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use tracing::instrument;
use zimshelf_cache::Repository;
use zimshelf_catalog::PreviousCatalog;
use zimshelf_config::{Config, RetentionPolicy};
use zimshelf_purge::{HttpPurger, Purger};
use zimshelf_readiness::{Lookup, MirrorIndex, ReadinessIndex};
use zimshelf_storage::backend::{LocalBackend, ReadOnlyBackend};
use zimshelf_storage::{BackendHandle, Publisher, ScanFilter};

/// Something a run can do. Scanning, readiness gating, grouping and reading
/// metadata always happen; the rest is opt-in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display)]
pub enum Action {
    #[display("read")]
    Read,
    #[display("retain")]
    Retain,
    #[display("redirects")]
    Redirects,
    #[display("catalogs")]
    Catalogs,
    #[display("purge")]
    Purge,
}
impl Action {
    pub const ALL: [Action; 5] = [Self::Read, Self::Retain, Self::Redirects, Self::Catalogs, Self::Purge];
}
impl FromStr for Action {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "read" => Ok(Self::Read),
            "retain" | "delete" => Ok(Self::Retain),
            "redirects" => Ok(Self::Redirects),
            "catalogs" | "libraries" => Ok(Self::Catalogs),
            "purge" => Ok(Self::Purge),
            _ => exn::bail!(ErrorKind::UnknownAction(s.to_string())),
        }
    }
}

/// The actions selected for a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Actions(BTreeSet<Action>);
impl Actions {
    pub fn all() -> Self {
        Self(Action::ALL.into_iter().collect())
    }

    /// Parses action names; each argument may hold several, separated by
    /// commas. `all` selects every action, and so does an empty list.
    pub fn parse<S: AsRef<str>>(args: impl IntoIterator<Item = S>) -> Result<Self> {
        let mut actions = BTreeSet::new();
        for arg in args {
            for name in arg.as_ref().split(',').filter(|name| !name.trim().is_empty()) {
                if name.trim().eq_ignore_ascii_case("all") {
                    return Ok(Self::all());
                }
                actions.insert(name.parse()?);
            }
        }
        match actions.is_empty() {
            true => Ok(Self::all()),
            false => Ok(Self(actions)),
        }
    }

    pub fn contains(&self, action: Action) -> bool {
        self.0.contains(&action)
    }
}
impl std::fmt::Display for Actions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<String> = self.0.iter().map(Action::to_string).collect();
        f.write_str(&names.join(","))
    }
}

/// What a successful run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub archives: usize,
    pub aliases: usize,
    pub not_ready: usize,
    pub metadata: metadata::MetadataReport,
    pub retention: Option<retention::RetentionReport>,
    pub redirects: Option<usize>,
    pub catalog_books: Option<usize>,
    pub invalidated: Option<usize>,
}

/// Runs the selected actions against the archive tree described by a
/// [`Config`].
pub struct Maintainer {
    config: Config,
    dry_run: bool,
    backend: BackendHandle,
    retention: Retention,
    reader: Arc<dyn MetadataReader>,
    cache: Repository,
    index: Option<Arc<dyn ReadinessIndex>>,
    purger: Option<Arc<dyn Purger>>,
    publisher: Publisher,
}
impl Maintainer {
    /// Sets up local storage and ZIM reading from `config`. Readiness gating
    /// and purging are off until configured with
    /// [`with_index`](Self::with_index) and [`with_purger`](Self::with_purger)
    /// (or [`connect`](Self::connect)).
    ///
    /// In dry-run mode the archive tree is wrapped read-only and artifacts
    /// are validated but never published.
    pub fn new(config: Config, cache: Repository, dry_run: bool) -> Result<Self> {
        let filter = ScanFilter {
            include_hidden: config.include_hidden,
            extension: config.extension.clone(),
            denylist: config.denylist.clone(),
        };
        let tree = LocalBackend::new("zim", &config.zim_root).or_raise(|| ErrorKind::Setup("archive tree"))?;
        let backend = read_only_if(Arc::new(tree.with_filter(filter)), dry_run);
        let retention = match config.retention.policy {
            RetentionPolicy::Delete => Retention::Delete,
            RetentionPolicy::Quarantine => {
                let dir = config.retention.quarantine.as_ref().ok_or_raise(|| ErrorKind::Setup("quarantine"))?;
                let quarantine = LocalBackend::new("quarantine", dir).or_raise(|| ErrorKind::Setup("quarantine"))?;
                Retention::Quarantine(read_only_if(Arc::new(quarantine), dry_run))
            },
        };
        let publisher = Publisher::new(config.catalog.staging_dir.clone()).dry_run(dry_run);
        Ok(Self {
            config,
            dry_run,
            backend,
            retention,
            reader: Arc::new(ZimMetadataReader::default()),
            cache,
            index: None,
            purger: None,
            publisher,
        })
    }

    /// [`new`](Self::new), plus the readiness index and purger named in the
    /// configuration.
    pub async fn connect(config: Config, cache: Repository, dry_run: bool) -> Result<Self> {
        let readiness_url = config.readiness.url.clone();
        let purge_url = config.purge.url.clone();
        let mut maintainer = Self::new(config, cache, dry_run)?;
        if let Some(url) = readiness_url {
            let index = MirrorIndex::connect(&url).await.or_raise(|| ErrorKind::Setup("readiness index"))?;
            maintainer = maintainer.with_index(index);
        }
        if let Some(url) = purge_url {
            maintainer = maintainer.with_purger(HttpPurger::new(url).or_raise(|| ErrorKind::Setup("purger"))?);
        }
        Ok(maintainer)
    }

    pub fn with_backend(mut self, backend: BackendHandle) -> Self {
        self.backend = read_only_if(backend, self.dry_run);
        self
    }

    pub fn with_retention(mut self, retention: Retention) -> Self {
        self.retention = retention;
        self
    }

    pub fn with_reader(mut self, reader: impl MetadataReader + 'static) -> Self {
        self.reader = Arc::new(reader);
        self
    }

    pub fn with_index(self, index: impl ReadinessIndex + 'static) -> Self {
        self.with_shared_index(Arc::new(index))
    }

    pub fn with_shared_index(mut self, index: Arc<dyn ReadinessIndex>) -> Self {
        self.index = Some(index);
        self
    }

    pub fn with_purger(mut self, purger: impl Purger + 'static) -> Self {
        self.purger = Some(Arc::new(purger));
        self
    }

    /// Runs `actions`.
    ///
    /// The whole tree is scanned, gated and grouped before anything is
    /// written. A scan or readiness failure, or an empty tree, aborts the run
    /// before any action; a failing action is logged and does not prevent
    /// the next ones, but fails the run.
    #[instrument(skip(self, actions), fields(actions = %actions, dry_run = self.dry_run))]
    pub async fn run(&self, actions: &Actions) -> Result<RunReport> {
        let config = &self.config;
        let exposed = config.retention.exposed.max(1);
        let previous = PreviousCatalog::load(&config.catalog.public).await;

        let mut candidates = discover(&self.backend, &config.download_url_root).await?;
        if candidates.is_empty() {
            exn::bail!(ErrorKind::NoArchives);
        }
        let discovered: Vec<PathBuf> = candidates.iter().map(|entry| entry.path().to_path_buf()).collect();
        let not_ready = self.gate(&mut candidates).await?;
        if candidates.is_empty() {
            exn::bail!(ErrorKind::NoArchives);
        }
        let mut library = Library::group(candidates.into_ordered());
        let mut report = RunReport {
            archives: library.entry_count(),
            aliases: library.len(),
            not_ready,
            ..Default::default()
        };

        let mut failures: Vec<Error> = Vec::new();
        report.metadata = metadata::attach_metadata(
            &mut library,
            exposed,
            &self.backend,
            self.reader.as_ref(),
            &self.cache,
            config.max_concurrency,
        )
        .await;
        if let Err(e) = metadata::prune_cache(&discovered, &self.cache).await {
            failures.push(e);
        }

        if actions.contains(Action::Retain) {
            let outcome = retention::apply(&library, config.retention.keep, &self.backend, &self.retention).await;
            if outcome.failed > 0 {
                failures.push(exn::Exn::from(ErrorKind::Retention(outcome.failed)));
            }
            report.retention = Some(outcome);
        }

        if actions.contains(Action::Redirects) {
            match self.write_redirects(&library).await {
                Ok(rules) => report.redirects = Some(rules),
                Err(e) => failures.push(e),
            }
        }

        if actions.contains(Action::Catalogs) {
            let targets = CatalogTargets {
                public: &config.catalog.public,
                internal: &config.catalog.internal,
                download_url_root: &config.download_url_root,
                internal_root: &config.catalog.internal_root,
            };
            let catalog_failures = catalog::publish(&library, exposed, &targets, &self.publisher).await;
            if catalog_failures.is_empty() {
                report.catalog_books = Some(library.exposed(exposed).count());
            }
            failures.extend(catalog_failures);
        }

        if actions.contains(Action::Purge) {
            match self.purge(&library, &previous).await {
                Ok(invalidated) => report.invalidated = Some(invalidated),
                Err(e) => failures.push(e),
            }
        }

        match failures.len() {
            0 => {
                tracing::info!(archives = report.archives, aliases = report.aliases, "Run complete");
                Ok(report)
            },
            count => {
                for failure in &failures {
                    tracing::error!(error = ?failure, "Action failed");
                }
                let mut failures = failures.into_iter();
                match failures.next() {
                    Some(first) => Err(first).or_raise(|| ErrorKind::Run(count)),
                    None => exn::bail!(ErrorKind::Run(count)),
                }
            },
        }
    }

    /// Releases the readiness index connection.
    pub async fn close(&self) {
        if let Some(index) = &self.index {
            index.close().await;
        }
    }

    async fn gate<S>(&self, candidates: &mut Candidates<S>) -> Result<usize> {
        let Some(index) = &self.index else {
            return Ok(0);
        };
        let readiness = &self.config.readiness;
        let lookup = match readiness.batched {
            true => Lookup::Batched(readiness.batch_size),
            false => Lookup::PerPath,
        };
        retain_ready(candidates, index.as_ref(), &self.config.zim_root, &readiness.root, lookup).await
    }

    async fn write_redirects(&self, library: &Library) -> Result<usize> {
        let config = &self.config.redirects;
        let map = RedirectMap::build(library, &self.config.zim_root, &config.root, &config.legacy_options)?;
        self.publisher.publish(&config.map, map.render(), redirects::validate).await.or_raise(|| ErrorKind::Redirects)?;
        tracing::info!(rules = map.len(), path = %config.map.display(), "Published redirect map");
        Ok(map.len())
    }

    async fn purge(&self, library: &Library, previous: &PreviousCatalog) -> Result<usize> {
        let changed = changes::detect(library, previous);
        let Some(purger) = &self.purger else {
            tracing::info!(changed = changed.len(), "No purge URL configured; not purging");
            return Ok(changed.len());
        };
        if self.dry_run {
            for book in changed.iter() {
                tracing::info!(alias = book.alias, id = book.id, core = book.core, "Would purge");
            }
            return Ok(changed.len());
        }
        let sent = purger.purge(&changed).await.or_raise(|| ErrorKind::Purge)?;
        tracing::info!(sent = sent.sent, failed = sent.failed, "Purged caches");
        Ok(changed.len())
    }
}

fn read_only_if(backend: BackendHandle, dry_run: bool) -> BackendHandle {
    match dry_run {
        true => Arc::new(ReadOnlyBackend::new(backend)),
        false => backend,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::tests::FakeReader;
    use async_trait::async_trait;
    use futures::TryStreamExt;
    use rstest::rstest;
    use std::collections::HashSet;
    use std::ops::Deref;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tempfile::TempDir;
    use zimshelf_cache::Database;
    use zimshelf_purge::{InvalidationSet, PurgeReport};
    use zimshelf_readiness::StaticIndex;
    use zimshelf_storage::backend::MockBackend;

    const FILES: [&str; 4] = [
        "wikipedia/w_en_all_2024-01.zim",
        "wikipedia/w_en_all_2023-12.zim",
        "wikipedia/w_en_all_2023-11.zim",
        "ted/ted_en_2024-01.zim",
    ];

    #[derive(Clone, Default)]
    struct RecordingPurger(Arc<Mutex<Vec<InvalidationSet>>>);
    #[async_trait]
    impl Purger for RecordingPurger {
        async fn purge(&self, set: &InvalidationSet) -> zimshelf_purge::error::Result<PurgeReport> {
            self.0.lock().unwrap().push(set.clone());
            Ok(PurgeReport { sent: set.len() + 1, failed: 0 })
        }
    }

    fn config(dir: &TempDir) -> Config {
        let mut config = Config::default();
        config.zim_root = dir.path().join("download/zim");
        config.download_url_root = "https://d.org/zim/".to_string();
        config.catalog.public = dir.path().join("download/library/library_zim.xml");
        config.catalog.internal = dir.path().join("library/internal_library.xml");
        config.redirects.root = dir.path().join("download");
        config.redirects.map = dir.path().join("maps/zim.map");
        config.readiness.root = dir.path().join("download");
        config.retention.keep = 2;
        config.cache.path = None;
        config
    }

    async fn maintainer(dir: &TempDir, dry_run: bool) -> (Maintainer, BackendHandle) {
        for sub in ["download/library", "library", "maps"] {
            std::fs::create_dir_all(dir.path().join(sub)).unwrap();
        }
        let cache = Repository::new(Database::connect_in_memory().await.unwrap().pool().clone(), dry_run);
        let tree: BackendHandle = Arc::new(MockBackend::with_files(FILES.map(|path| (path, b"ZIM".to_vec()))));
        let maintainer =
            Maintainer::new(config(dir), cache, dry_run).unwrap().with_backend(tree.clone()).with_reader(FakeReader::default());
        (maintainer, tree)
    }

    async fn listing(backend: &BackendHandle) -> Vec<PathBuf> {
        let mut paths: Vec<_> = backend.list_stream(None).map_ok(|file| file.path).try_collect().await.unwrap();
        paths.sort();
        paths
    }

    #[tokio::test]
    async fn test_full_run() {
        let dir = tempfile::tempdir().unwrap();
        let (maintainer, tree) = maintainer(&dir, false).await;
        let purger = RecordingPurger::default();
        let maintainer = maintainer.with_purger(purger.clone());
        let report = maintainer.run(&Actions::all()).await.unwrap();

        assert_eq!(report.archives, 4);
        assert_eq!(report.aliases, 2);
        assert_eq!(report.metadata.read, 2);
        assert_eq!(report.retention.unwrap().removed, 1);
        assert_eq!(report.redirects, Some(2));
        assert_eq!(report.catalog_books, Some(2));
        assert_eq!(report.invalidated, Some(0));
        assert!(!listing(&tree).await.contains(&PathBuf::from("wikipedia/w_en_all_2023-11.zim")));

        let map = std::fs::read_to_string(dir.path().join("maps/zim.map")).unwrap();
        assert!(map.contains("/zim/wikipedia/w_en_all.zim /zim/wikipedia/w_en_all_2024-01.zim\n"));
        let public = PreviousCatalog::load(dir.path().join("download/library/library_zim.xml")).await;
        assert_eq!(public.len(), 2);
        assert!(public.get("w_en_all_2024-01").is_some());
        let internal = std::fs::read_to_string(dir.path().join("library/internal_library.xml")).unwrap();
        assert!(internal.contains("path=\"/data/wikipedia/w_en_all_2024-01.zim\""));
        // Purging is skipped by the purger itself when nothing changed.
        assert_eq!(purger.0.lock().unwrap().len(), 1);
        assert!(purger.0.lock().unwrap()[0].is_empty());
    }

    #[tokio::test]
    async fn test_changed_book_is_purged() {
        let dir = tempfile::tempdir().unwrap();
        let (maintainer, _) = maintainer(&dir, false).await;
        let purger = RecordingPurger::default();
        let maintainer = maintainer.with_purger(purger.clone());
        std::fs::write(
            dir.path().join("download/library/library_zim.xml"),
            concat!(
                "<library version=\"20110515\">",
                "<book id=\"old\" url=\"https://d.org/zim/ted/ted_en_2024-01.zim.meta4\" title=\"Old\"/>",
                "<book id=\"gone\" url=\"https://d.org/zim/gone/gone_en_2024-01.zim.meta4\" title=\"Gone\"/>",
                "</library>",
            ),
        )
        .unwrap();
        let report = maintainer.run(&Actions::parse(["purge"]).unwrap()).await.unwrap();
        assert_eq!(report.invalidated, Some(1));
        assert_eq!(report.retention, None);
        let sets = purger.0.lock().unwrap();
        let book = sets[0].iter().next().unwrap();
        assert_eq!((book.alias, book.id, book.core), ("ted_en", "id-ted_en_2024-01", "ted_en_2024-01"));
    }

    #[tokio::test]
    async fn test_dry_run_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let (maintainer, tree) = maintainer(&dir, true).await;
        let purger = RecordingPurger::default();
        let report = maintainer.with_purger(purger.clone()).run(&Actions::all()).await.unwrap();
        assert_eq!(report.retention.unwrap().removed, 1);
        assert_eq!(listing(&tree).await.len(), FILES.len());
        assert!(!dir.path().join("maps/zim.map").exists());
        assert!(!dir.path().join("download/library/library_zim.xml").exists());
        assert!(purger.0.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_tree() {
        let dir = tempfile::tempdir().unwrap();
        let (maintainer, _) = maintainer(&dir, false).await;
        let empty: BackendHandle = Arc::new(MockBackend::with_files(Vec::<(&str, Vec<u8>)>::new()));
        let err = maintainer.with_backend(empty).run(&Actions::all()).await.unwrap_err();
        assert!(matches!(err.deref(), ErrorKind::NoArchives));
    }

    #[tokio::test]
    async fn test_nothing_ready() {
        let dir = tempfile::tempdir().unwrap();
        let (maintainer, _) = maintainer(&dir, false).await;
        let err = maintainer.with_index(StaticIndex::default()).run(&Actions::all()).await.unwrap_err();
        assert!(matches!(err.deref(), ErrorKind::NoArchives));
        assert!(!dir.path().join("maps/zim.map").exists());
    }

    #[tokio::test]
    async fn test_readiness_drops_pending_versions() {
        let dir = tempfile::tempdir().unwrap();
        let (maintainer, tree) = maintainer(&dir, false).await;
        let index = StaticIndex::new(["zim/wikipedia/w_en_all_2023-12.zim", "zim/ted/ted_en_2024-01.zim"]);
        let report = maintainer.with_index(index).run(&Actions::parse(["catalogs,retain"]).unwrap()).await.unwrap();
        assert_eq!(report.not_ready, 2);
        assert_eq!(report.retention.unwrap().candidates, 0);
        assert_eq!(listing(&tree).await.len(), FILES.len());
        let public = PreviousCatalog::load(dir.path().join("download/library/library_zim.xml")).await;
        assert!(public.get("w_en_all_2023-12").is_some());
        assert!(public.get("w_en_all_2024-01").is_none());
    }

    #[tokio::test]
    async fn test_pending_archives_keep_their_cache_rows() {
        let dir = tempfile::tempdir().unwrap();
        let (_, tree) = maintainer(&dir, false).await;
        let cache = Repository::from(&Database::connect_in_memory().await.unwrap());
        let new = |cache: Repository| {
            Maintainer::new(config(&dir), cache, false)
                .unwrap()
                .with_backend(tree.clone())
                .with_reader(FakeReader::default())
        };
        new(cache.clone()).run(&Actions::parse(["read"]).unwrap()).await.unwrap();
        assert_eq!(cache.count().await.unwrap(), 2);

        let index = StaticIndex::new(["zim/wikipedia/w_en_all_2023-12.zim", "zim/ted/ted_en_2024-01.zim"]);
        let report = new(cache.clone()).with_index(index).run(&Actions::parse(["read"]).unwrap()).await.unwrap();
        assert_eq!(report.not_ready, 2);
        assert_eq!(report.metadata.read, 1);
        assert_eq!(cache.count().await.unwrap(), 3);
    }

    #[derive(Default)]
    struct ClosingIndex(AtomicBool);
    #[async_trait]
    impl ReadinessIndex for ClosingIndex {
        async fn present(&self, paths: &[String]) -> zimshelf_readiness::error::Result<HashSet<String>> {
            Ok(paths.iter().cloned().collect())
        }

        async fn close(&self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_close_releases_index() {
        let dir = tempfile::tempdir().unwrap();
        let (maintainer, _) = maintainer(&dir, false).await;
        let index = Arc::new(ClosingIndex::default());
        let maintainer = maintainer.with_shared_index(index.clone());
        maintainer.run(&Actions::parse(["read"]).unwrap()).await.unwrap();
        assert!(!index.0.load(Ordering::SeqCst));
        maintainer.close().await;
        assert!(index.0.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_failed_catalog_does_not_stop_other_actions() {
        let dir = tempfile::tempdir().unwrap();
        let (maintainer, _) = maintainer(&dir, false).await;
        let maintainer = maintainer.with_reader(FakeReader::broken(&["ted/ted_en_2024-01.zim"]));
        let err = maintainer.run(&Actions::parse(["catalogs", "redirects"]).unwrap()).await.unwrap_err();
        assert!(matches!(err.deref(), ErrorKind::Run(2)));
        assert!(dir.path().join("maps/zim.map").exists());
        assert!(!dir.path().join("download/library/library_zim.xml").exists());
    }

    #[rstest]
    #[case(&["all"], Action::ALL.to_vec())]
    #[case(&[], Action::ALL.to_vec())]
    #[case(&["read,purge"], vec![Action::Read, Action::Purge])]
    #[case(&["catalogs", "REDIRECTS"], vec![Action::Redirects, Action::Catalogs])]
    #[case(&["retain,", "retain"], vec![Action::Retain])]
    fn test_parse_actions(#[case] args: &[&str], #[case] expected: Vec<Action>) {
        let actions = Actions::parse(args).unwrap();
        assert_eq!(actions, Actions(expected.into_iter().collect()));
    }

    #[test]
    fn test_unknown_action() {
        let err = Actions::parse(["read,write"]).unwrap_err();
        assert!(matches!(err.deref(), ErrorKind::UnknownAction(name) if name == "write"));
        assert_eq!(Actions::parse(["purge,read"]).unwrap().to_string(), "read,purge");
    }

    #[tokio::test]
    async fn test_quarantine_requires_directory() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config(&dir);
        config.retention.policy = RetentionPolicy::Quarantine;
        let cache = Database::connect_in_memory().await.unwrap();
        let err = Maintainer::new(config, Repository::from(&cache), false).err().unwrap();
        assert!(matches!(err.deref(), ErrorKind::Setup("quarantine")));
    }
}
