use crate::error::{ErrorKind, Result};
use async_trait::async_trait;
use exn::ResultExt;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use std::collections::HashSet;
use std::time::Duration;
use tracing::instrument;

const BATCH_QUERY: &str = "SELECT path FROM filearr WHERE path = ANY($1)";
const PATH_QUERY: &str = "SELECT path FROM filearr WHERE path = $1";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Set-membership queries against a readiness index.
#[async_trait]
pub trait ReadinessIndex: Send + Sync {
    /// The subset of `paths` known to the index.
    async fn present(&self, paths: &[String]) -> Result<HashSet<String>>;

    /// Whether a single path is known to the index.
    async fn contains(&self, path: &str) -> Result<bool> {
        Ok(self.present(&[path.to_string()]).await?.contains(path))
    }

    /// Releases connections held by the index.
    async fn close(&self) {}
}

/// The file table of a mirror redirector's PostgreSQL database.
#[derive(Debug, Clone)]
pub struct MirrorIndex {
    pool: PgPool,
}
impl MirrorIndex {
    /// Connects eagerly so that an unreachable index fails the run before
    /// anything else happens.
    #[instrument(skip(url))]
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(1)
            .acquire_timeout(CONNECT_TIMEOUT)
            .connect(url)
            .await
            .or_raise(|| ErrorKind::Unavailable)?;
        Ok(Self { pool })
    }
}
#[async_trait]
impl ReadinessIndex for MirrorIndex {
    async fn present(&self, paths: &[String]) -> Result<HashSet<String>> {
        let found: Vec<String> = sqlx::query_scalar(BATCH_QUERY)
            .bind(paths)
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Unavailable)?;
        Ok(found.into_iter().collect())
    }

    async fn contains(&self, path: &str) -> Result<bool> {
        let found: Option<String> = sqlx::query_scalar(PATH_QUERY)
            .bind(path)
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Unavailable)?;
        Ok(found.is_some())
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

/// A fixed set of ready paths.
#[derive(Debug, Clone, Default)]
pub struct StaticIndex(HashSet<String>);
impl StaticIndex {
    pub fn new<S: Into<String>>(paths: impl IntoIterator<Item = S>) -> Self {
        Self(paths.into_iter().map(Into::into).collect())
    }
}
#[async_trait]
impl ReadinessIndex for StaticIndex {
    async fn present(&self, paths: &[String]) -> Result<HashSet<String>> {
        Ok(paths.iter().filter(|path| self.0.contains(*path)).cloned().collect())
    }

    async fn contains(&self, path: &str) -> Result<bool> {
        Ok(self.0.contains(path))
    }
}
