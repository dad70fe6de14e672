use std::path::{Path, PathBuf};
use time::OffsetDateTime;
use zimshelf_naming::{ParsedName, alias_of, parse};
use zimshelf_storage::FileInfo;
use zimshelf_zim::ArchiveMetadata;

const META4_SUFFIX: &str = ".meta4";

/// One archive version found in the tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// File stem; unique across the tree.
    pub core: String,
    /// Version-independent identity shared by every version of the content.
    pub alias: String,
    pub name: ParsedName,
    /// Relative to the archive root.
    pub relative_path: PathBuf,
    pub size: u64,
    pub modified: OffsetDateTime,
    pub download_url: String,
    /// Only read for exposed entries.
    pub metadata: Option<ArchiveMetadata>,
    /// Head of its alias group.
    pub is_latest: bool,
}
impl Entry {
    /// Builds an entry from a listed file. Fails when the file name follows
    /// neither naming convention.
    pub fn from_file(file: FileInfo, download_url_root: &str) -> zimshelf_naming::error::Result<Self> {
        let core = file.stem().unwrap_or_default().to_string();
        let name = parse(&core)?;
        Ok(Self {
            alias: alias_of(&core),
            download_url: format!("{download_url_root}{}{META4_SUFFIX}", file.path.display()),
            core,
            name,
            relative_path: file.path,
            size: file.size,
            modified: file.modified,
            metadata: None,
            is_latest: false,
        })
    }

    /// The listing this entry was built from, for cache lookups and reads.
    pub fn file_info(&self) -> FileInfo {
        FileInfo::new(self.relative_path.clone(), self.size, self.modified)
    }

    pub fn path(&self) -> &Path {
        &self.relative_path
    }
}
