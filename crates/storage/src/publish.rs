//! Atomic publication of generated artifacts.
//!
//! An artifact is written to a temporary file in a staging directory, read
//! back and checked by a caller-supplied validator, and only then renamed
//! over its destination. Readers of the destination see either the previous
//! artifact or the new one, never a partial write.

use crate::error::{ErrorKind, Result};
use exn::{OptionExt, ResultExt};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::{NamedTempFile, PersistError};
use tracing::instrument;

#[cfg(unix)]
const PUBLISHED_MODE: u32 = 0o644;

/// Publishes artifacts to absolute filesystem destinations.
#[derive(Debug, Clone, Default)]
pub struct Publisher {
    staging_dir: Option<PathBuf>,
    dry_run: bool,
}
impl Publisher {
    /// Temporary files go into `staging_dir`, or next to each destination when
    /// `None`. Staging on the destination's filesystem keeps the final rename
    /// atomic.
    pub fn new(staging_dir: Option<PathBuf>) -> Self {
        Self { staging_dir, dry_run: false }
    }

    /// In dry-run mode artifacts are still staged and validated, but never
    /// moved into place.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Stages `contents`, validates the staged copy and swaps it into
    /// `destination`.
    ///
    /// A validation failure leaves the destination untouched and surfaces as
    /// [`ErrorKind::Validation`] under [`ErrorKind::Publish`].
    ///
    /// ```
    /// # #[tokio::main(flavor = "current_thread")]
    /// # async fn main() -> zimshelf_storage::error::Result<()> {
    /// use zimshelf_storage::Publisher;
    ///
    /// let dir = tempfile::tempdir().unwrap();
    /// let destination = dir.path().join("zim.map");
    /// Publisher::new(None)
    ///     .publish(&destination, b"/a.zim /a_2024-01.zim\n".to_vec(), |_| Ok(()))
    ///     .await?;
    /// assert!(destination.exists());
    /// # Ok(())
    /// # }
    /// ```
    #[instrument(skip(self, contents, validate), fields(destination = %destination.display(), bytes = contents.len()))]
    pub async fn publish<V>(&self, destination: &Path, contents: Vec<u8>, validate: V) -> Result<()>
    where
        V: FnOnce(&[u8]) -> std::result::Result<(), String> + Send + 'static,
    {
        let publish_err = || ErrorKind::Publish(destination.to_path_buf());
        let target = destination.to_path_buf();
        let staging = match &self.staging_dir {
            Some(dir) => dir.clone(),
            None => destination.parent().ok_or_raise(publish_err)?.to_path_buf(),
        };
        let dry_run = self.dry_run;
        tokio::task::spawn_blocking(move || stage_and_swap(&target, &staging, &contents, validate, dry_run))
            .await
            .or_raise(publish_err)?
            .or_raise(publish_err)
    }
}

fn stage_and_swap<V>(destination: &Path, staging: &Path, contents: &[u8], validate: V, dry_run: bool) -> Result<()>
where
    V: FnOnce(&[u8]) -> std::result::Result<(), String>,
{
    let file_name = destination.file_name().ok_or_raise(|| ErrorKind::InvalidPath(destination.to_path_buf()))?;
    let prefix = format!(".{}.", file_name.to_string_lossy());
    let mut builder = tempfile::Builder::new();
    builder.prefix(&prefix).suffix(".tmp");
    // Dry runs create no directories; validation then happens in the system temp dir.
    let mut staged = match dry_run && !staging.is_dir() {
        true => builder.tempfile(),
        false => {
            fs::create_dir_all(staging).map_err(ErrorKind::Io)?;
            builder.tempfile_in(staging)
        },
    }
    .map_err(ErrorKind::Io)?;
    staged.write_all(contents).map_err(ErrorKind::Io)?;
    staged.as_file().sync_all().map_err(ErrorKind::Io)?;

    // Validate what actually landed on disk, not what we meant to write.
    let written = fs::read(staged.path()).map_err(ErrorKind::Io)?;
    validate(&written).map_err(ErrorKind::Validation)?;

    if dry_run {
        tracing::info!(destination = %destination.display(), "Skipping publish during dry-run");
        return Ok(());
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(staged.path(), fs::Permissions::from_mode(PUBLISHED_MODE)).map_err(ErrorKind::Io)?;
    }
    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent).map_err(ErrorKind::Io)?;
    }
    swap(staged, destination)
}

fn swap(staged: NamedTempFile, destination: &Path) -> Result<()> {
    match staged.persist(destination) {
        Ok(_) => {
            tracing::debug!(destination = %destination.display(), "Published");
            Ok(())
        },
        Err(PersistError { error, file }) if error.kind() == std::io::ErrorKind::CrossesDevices => {
            tracing::warn!(
                destination = %destination.display(),
                staged = %file.path().display(),
                "Staging directory is on another filesystem; falling back to a copy, which is NOT atomic"
            );
            fs::copy(file.path(), destination).map_err(ErrorKind::Io)?;
            // Dropping the handle removes the staged copy.
            drop(file);
            Ok(())
        },
        Err(PersistError { error, .. }) => exn::bail!(ErrorKind::Io(error)),
    }
}
