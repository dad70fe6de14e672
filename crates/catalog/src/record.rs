use zimshelf_zim::ArchiveMetadata;

/// Attributes copied onto every `<book>`, in the order they are written.
///
/// These are also the attributes compared between runs to decide whether a
/// book changed.
pub const ATTRIBUTES: [&str; 15] = [
    "id",
    "size",
    "url",
    "mediaCount",
    "articleCount",
    "favicon",
    "title",
    "description",
    "language",
    "creator",
    "publisher",
    "name",
    "flavour",
    "tags",
    "date",
];
pub const FAVICON_MIME_TYPE: &str = "image/png";

/// One `<book>` of the catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogRecord {
    pub id: Option<String>,
    /// Whole KiB, rounded down.
    pub size: String,
    pub url: String,
    pub media_count: Option<String>,
    pub article_count: Option<String>,
    pub favicon: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub language: Option<String>,
    pub creator: Option<String>,
    pub publisher: Option<String>,
    pub name: Option<String>,
    pub flavour: Option<String>,
    pub tags: Option<String>,
    pub date: Option<String>,
}
impl CatalogRecord {
    pub fn new(url: impl Into<String>, size_bytes: u64, metadata: &ArchiveMetadata) -> Self {
        Self {
            id: metadata.id.clone(),
            size: (size_bytes / 1024).to_string(),
            url: url.into(),
            media_count: metadata.media_count.map(|count| count.to_string()),
            article_count: metadata.article_count.map(|count| count.to_string()),
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
        }
    }

    fn values(&self) -> [Option<&str>; 15] {
        [
            self.id.as_deref(),
            Some(self.size.as_str()),
            Some(self.url.as_str()),
            self.media_count.as_deref(),
            self.article_count.as_deref(),
            self.favicon.as_deref(),
            self.title.as_deref(),
            self.description.as_deref(),
            self.language.as_deref(),
            self.creator.as_deref(),
            self.publisher.as_deref(),
            self.name.as_deref(),
            self.flavour.as_deref(),
            self.tags.as_deref(),
            self.date.as_deref(),
        ]
    }

    /// Attributes as written to XML: empty values are omitted and the
    /// favicon MIME type is always present.
    pub fn attributes(&self) -> Vec<(&str, &str)> {
        let mut attributes = Vec::with_capacity(ATTRIBUTES.len() + 1);
        for (key, value) in ATTRIBUTES.into_iter().zip(self.values()) {
            if let Some(value) = value.filter(|v| !v.is_empty()) {
                attributes.push((key, value));
            }
        }
        attributes.push(("faviconMimeType", FAVICON_MIME_TYPE));
        attributes
    }

    pub fn comparable(&self) -> ComparableRecord {
        ComparableRecord::from(self)
    }
}

/// The subset of a book's attributes that decides whether it changed, with
/// absent attributes read as empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComparableRecord([String; 15]);
impl ComparableRecord {
    /// Builds a record from raw XML attributes. Unknown keys are ignored.
    pub fn from_attributes<K, V>(attributes: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut record = Self::default();
        for (key, value) in attributes {
            if let Some(index) = ATTRIBUTES.iter().position(|known| *known == key.as_ref()) {
                record.0[index] = value.into();
            }
        }
        record
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        ATTRIBUTES.iter().position(|known| *known == key).map(|index| self.0[index].as_str())
    }

    pub fn id(&self) -> &str {
        &self.0[0]
    }

    /// Names of the attributes whose values differ.
    pub fn diff<'a>(&'a self, other: &'a Self) -> impl Iterator<Item = &'static str> + 'a {
        ATTRIBUTES.into_iter().zip(self.0.iter().zip(other.0.iter())).filter(|(_, (a, b))| a != b).map(|(key, _)| key)
    }
}
impl From<&CatalogRecord> for ComparableRecord {
    fn from(record: &CatalogRecord) -> Self {
        Self(record.values().map(|value| value.unwrap_or_default().to_string()))
    }
}
