//! Repository for cached archive metadata.

use crate::Database;
use crate::error::{ErrorKind, Result};
use crate::models::ArchiveRow;
use exn::{OptionExt, ResultExt};
use sqlx::SqlitePool;
use std::path::Path;
use zimshelf_storage::FileInfo;
use zimshelf_zim::ArchiveMetadata;

/// Repository for reading and writing cached [`ArchiveMetadata`].
///
/// Rows are keyed by the archive's path relative to the archive root. A row
/// is only returned while the file's size and modification time (in whole
/// seconds) still match what was recorded.
#[derive(Debug, Clone)]
pub struct Repository {
    pool: SqlitePool,
    dry_run: bool,
}
impl From<&Database> for Repository {
    fn from(db: &Database) -> Self {
        Self { pool: db.pool().clone(), dry_run: false }
    }
}
impl Repository {
    pub fn new(pool: SqlitePool, dry_run: bool) -> Self {
        Self { pool, dry_run }
    }

    fn sqlx_hates_paths(path: impl AsRef<Path>) -> Result<String> {
        Ok(path.as_ref().to_str().ok_or_raise(|| ErrorKind::InvalidData("path"))?.to_string())
    }

    /// Cached metadata for `file`, if present and still valid.
    pub async fn get(&self, file: &FileInfo) -> Result<Option<ArchiveMetadata>> {
        let row: Option<ArchiveRow> = sqlx::query_as(include_str!("../queries/get_by_path.sql"))
            .bind(Self::sqlx_hates_paths(&file.path)?)
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        match row {
            Some(row) if row.matches(file) => Ok(Some(row.try_into()?)),
            Some(_) => {
                tracing::debug!(path = %file.path.display(), "Cached metadata is stale");
                Ok(None)
            },
            None => Ok(None),
        }
    }

    /// Record freshly read metadata for `file`, replacing any previous row.
    pub async fn upsert(&self, file: &FileInfo, metadata: &ArchiveMetadata) -> Result<()> {
        if self.dry_run {
            return Ok(());
        }
        let row = ArchiveRow::try_from((file, metadata))?;
        sqlx::query(include_str!("../queries/upsert.sql"))
            .bind(row.path)
            .bind(row.file_size)
            .bind(row.modified_at)
            .bind(row.id)
            .bind(row.media_count)
            .bind(row.article_count)
            .bind(row.favicon)
            .bind(row.title)
            .bind(row.description)
            .bind(row.language)
            .bind(row.creator)
            .bind(row.publisher)
            .bind(row.name)
            .bind(row.flavour)
            .bind(row.tags)
            .bind(row.date)
            .bind(row.read_at)
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(())
    }

    /// Delete every row whose path is not in `paths`. Returns the number of
    /// rows removed.
    pub async fn retain<P: AsRef<Path>>(&self, paths: impl IntoIterator<Item = P>) -> Result<u64> {
        let paths = paths.into_iter().map(Self::sqlx_hates_paths).collect::<Result<Vec<_>>>()?;
        if self.dry_run {
            return Ok(0);
        }
        let paths = serde_json::to_string(&paths).or_raise(|| ErrorKind::InvalidData("path list"))?;
        let result = sqlx::query(include_str!("../queries/retain_paths.sql"))
            .bind(paths)
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(result.rows_affected())
    }

    pub async fn count(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar(include_str!("../queries/count.sql"))
            .fetch_one(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        u64::try_from(count).or_raise(|| ErrorKind::InvalidData("row count"))
    }
}
