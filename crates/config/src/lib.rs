//! Layered configuration.
//!
//! Values are resolved from, lowest to highest priority:
//!
//! 1. built-in defaults;
//! 2. a configuration file (`--config PATH`, or `zimshelf.toml`/`zimshelf.yaml`
//!    in the platform configuration directory);
//! 3. `ZIMSHELF_`-prefixed environment variables, with `__` separating nested
//!    keys (`ZIMSHELF_RETENTION__KEEP=2`);
//! 4. command-line [`Overrides`].

pub mod error;
mod load;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub use crate::load::{ENV_PREFIX, Overrides, default_config_files};

pub(crate) const APPLICATION: &str = "zimshelf";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Root of the archive tree.
    pub zim_root: PathBuf,
    /// Also consider hidden files and directories.
    pub include_hidden: bool,
    pub extension: String,
    /// Files and directories starting with any of these are ignored.
    pub denylist: Vec<String>,
    /// Public URL prefix of the archive tree; book URLs are
    /// `{download_url_root}{relative path}.meta4`.
    pub download_url_root: String,
    pub catalog: CatalogConfig,
    pub redirects: RedirectsConfig,
    pub retention: RetentionConfig,
    pub readiness: ReadinessConfig,
    pub purge: PurgeConfig,
    pub cache: CacheConfig,
    /// Upper bound on concurrent archive metadata reads.
    pub max_concurrency: usize,
    pub log_level: String,
}
impl Default for Config {
    fn default() -> Self {
        Self {
            zim_root: PathBuf::from("/data/download/zim"),
            include_hidden: false,
            extension: "zim".to_string(),
            denylist: vec!["test_".to_string(), "bench_".to_string()],
            download_url_root: "https://download.kiwix.org/zim/".to_string(),
            catalog: CatalogConfig::default(),
            redirects: RedirectsConfig::default(),
            retention: RetentionConfig::default(),
            readiness: ReadinessConfig::default(),
            purge: PurgeConfig::default(),
            cache: CacheConfig::default(),
            max_concurrency: 16,
            log_level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Destination of the public catalog; also where the previous one is
    /// read from.
    pub public: PathBuf,
    pub internal: PathBuf,
    /// Replaces `download_url_root` in the internal catalog's `path`.
    pub internal_root: String,
    /// Where catalogs are staged before being swapped in. Defaults to each
    /// destination's own directory.
    pub staging_dir: Option<PathBuf>,
}
impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            public: PathBuf::from("/data/download/library/library_zim.xml"),
            internal: PathBuf::from("/data/library/internal_library.xml"),
            internal_root: "/data".to_string(),
            staging_dir: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RedirectsConfig {
    /// Directory the redirecting web server serves as `/`.
    pub root: PathBuf,
    /// Destination of the redirect map.
    pub map: PathBuf,
    /// Option names that used to be published under another name.
    pub legacy_options: Vec<LegacyOption>,
}
impl Default for RedirectsConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("/data/download"),
            map: PathBuf::from("/data/maps/zim.map"),
            legacy_options: Vec::new(),
        }
    }
}

/// Archives published with option `current` are also reachable under the
/// alias they would have had with option `deprecated`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyOption {
    pub current: String,
    pub deprecated: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetentionPolicy {
    #[default]
    Delete,
    Quarantine,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionConfig {
    /// Versions kept on disk per alias.
    pub keep: usize,
    /// Versions published in the catalog per alias.
    pub exposed: usize,
    pub policy: RetentionPolicy,
    /// Where retired archives go under [`RetentionPolicy::Quarantine`].
    pub quarantine: Option<PathBuf>,
}
impl Default for RetentionConfig {
    fn default() -> Self {
        Self { keep: 4, exposed: 1, policy: RetentionPolicy::Delete, quarantine: None }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadinessConfig {
    /// PostgreSQL URL of the mirror index. Readiness gating is off when unset.
    pub url: Option<String>,
    /// Index paths are relative to this directory.
    pub root: PathBuf,
    /// Query the index in batches of `batch_size` paths, or one path at a
    /// time when off.
    pub batched: bool,
    pub batch_size: usize,
}
impl Default for ReadinessConfig {
    fn default() -> Self {
        Self { url: None, root: PathBuf::from("/data/download"), batched: true, batch_size: 1000 }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PurgeConfig {
    /// Cache to send `PURGE` requests to. Purging is off when unset.
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// SQLite metadata cache. An in-memory cache is used when unset.
    pub path: Option<PathBuf>,
}
impl Default for CacheConfig {
    fn default() -> Self {
        let path = directories::ProjectDirs::from("", "", APPLICATION)
            .map(|dirs| dirs.cache_dir().join("metadata.sqlite"));
        Self { path }
    }
}
