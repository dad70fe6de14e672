//! SQLite pool for the metadata cache.

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use sqlx::sqlite::{SqliteAutoVacuum, SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous};
use std::path::Path;
use std::time::Duration;
use tracing::instrument;

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

/// Concurrent metadata reads each look up and store one row.
const POOL_SIZE: u32 = 4;
const BUSY_TIMEOUT: Duration = Duration::from_millis(1500);

/// Handle on the cache database. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Opens (creating it and its directory when missing) the cache at
    /// `path` and brings its schema up to date.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub async fn connect(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).or_raise(|| ErrorKind::Database)?;
        }
        let options = options().filename(path).create_if_missing(true).journal_mode(SqliteJournalMode::Wal);
        Self::open(options, POOL_SIZE).await
    }

    /// A private, empty cache that disappears with the pool.
    ///
    /// Limited to a single connection: every connection to `:memory:` would
    /// otherwise see its own database. Available outside tests so that
    /// dependent crates can use it in theirs.
    pub async fn connect_in_memory() -> Result<Self> {
        Self::open(options().filename(":memory:"), 1).await
    }

    async fn open(options: SqliteConnectOptions, size: u32) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(size)
            .connect_with(options)
            .await
            .or_raise(|| ErrorKind::Database)?;
        MIGRATOR.run(&pool).await.or_raise(|| ErrorKind::Migration)?;
        tracing::debug!(connections = size, "Metadata cache ready");
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Waits for outstanding connections, then closes the pool.
    pub async fn close(&self) {
        _ = sqlx::query("PRAGMA optimize").execute(&self.pool).await;
        self.pool.close().await;
    }
}

fn options() -> SqliteConnectOptions {
    SqliteConnectOptions::new()
        .synchronous(SqliteSynchronous::Normal)
        .busy_timeout(BUSY_TIMEOUT)
        // Rows for retired archives are deleted every run.
        .auto_vacuum(SqliteAutoVacuum::Incremental)
        .pragma("temp_store", "MEMORY")
        .pragma("cache_size", "-4096")
}
