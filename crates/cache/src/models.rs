use crate::error::{Error, ErrorKind};
use exn::{OptionExt, ResultExt};
use time::OffsetDateTime;
use zimshelf_storage::FileInfo;
use zimshelf_zim::ArchiveMetadata;

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct ArchiveRow {
    pub(crate) path: String,
    pub(crate) file_size: i64,
    pub(crate) modified_at: i64,
    pub(crate) id: Option<String>,
    pub(crate) media_count: Option<i64>,
    pub(crate) article_count: Option<i64>,
    pub(crate) favicon: Option<String>,
    pub(crate) title: Option<String>,
    pub(crate) description: Option<String>,
    pub(crate) language: Option<String>,
    pub(crate) creator: Option<String>,
    pub(crate) publisher: Option<String>,
    pub(crate) name: Option<String>,
    pub(crate) flavour: Option<String>,
    pub(crate) tags: Option<String>,
    pub(crate) date: Option<String>,
    pub(crate) read_at: i64,
}
impl ArchiveRow {
    /// Whether the row still describes the file on disk.
    pub(crate) fn matches(&self, file: &FileInfo) -> bool {
        i64::try_from(file.size).is_ok_and(|size| size == self.file_size)
            && file.modified.unix_timestamp() == self.modified_at
    }
}
impl TryFrom<(&FileInfo, &ArchiveMetadata)> for ArchiveRow {
    type Error = Error;
    fn try_from((file, metadata): (&FileInfo, &ArchiveMetadata)) -> Result<Self, Self::Error> {
        let count = |value: Option<u64>, what: &'static str| {
            value.map(i64::try_from).transpose().or_raise(|| ErrorKind::InvalidData(what))
        };
        Ok(Self {
            path: file.path.to_str().ok_or_raise(|| ErrorKind::InvalidData("path"))?.to_string(),
            file_size: i64::try_from(file.size).or_raise(|| ErrorKind::InvalidData("file size"))?,
            modified_at: file.modified.unix_timestamp(),
            id: metadata.id.clone(),
            media_count: count(metadata.media_count, "media count")?,
            article_count: count(metadata.article_count, "article count")?,
            favicon: metadata.favicon.clone(),
            title: metadata.title.clone(),
            description: metadata.description.clone(),
            language: metadata.language.clone(),
            creator: metadata.creator.clone(),
            publisher: metadata.publisher.clone(),
            name: metadata.name.clone(),
            flavour: metadata.flavour.clone(),
            tags: metadata.tags.clone(),
            date: metadata.date.clone(),
            read_at: OffsetDateTime::now_utc().unix_timestamp(),
        })
    }
}
impl TryFrom<ArchiveRow> for ArchiveMetadata {
    type Error = Error;
    fn try_from(row: ArchiveRow) -> Result<Self, Self::Error> {
        let count = |value: Option<i64>, what: &'static str| {
            value.map(u64::try_from).transpose().or_raise(|| ErrorKind::InvalidData(what))
        };
        Ok(Self {
            id: row.id,
            media_count: count(row.media_count, "media count")?,
            article_count: count(row.article_count, "article count")?,
            favicon: row.favicon,
            title: row.title,
            description: row.description,
            language: row.language,
            creator: row.creator,
            publisher: row.publisher,
            name: row.name,
            flavour: row.flavour,
            tags: row.tags,
            date: row.date,
        })
    }
}
