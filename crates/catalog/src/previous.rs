use crate::error::{ErrorKind, Result};
use crate::record::ComparableRecord;
use crate::writer::validate;
use exn::ResultExt;
use quick_xml::Reader;
use quick_xml::events::Event;
use std::collections::HashMap;
use std::path::Path;
use tracing::instrument;
use zimshelf_naming::alias_of;

const META4_SUFFIX: &str = ".meta4";

/// Snapshot of the last published public catalog.
///
/// Books are keyed by core (the archive's file stem, read from its URL).
/// When the catalog could not be read the snapshot is empty and
/// [unavailable](Self::is_available); nothing is ever reported as changed
/// against it.
#[derive(Debug, Clone, Default)]
pub struct PreviousCatalog {
    books: HashMap<String, ComparableRecord>,
    aliases: HashMap<String, String>,
    available: bool,
}
impl PreviousCatalog {
    pub fn unavailable() -> Self {
        Self::default()
    }

    /// Loads the catalog at `path`. Never fails: an unreadable catalog is
    /// logged and yields an unavailable snapshot.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub async fn load(path: impl AsRef<Path>) -> Self {
        let loaded = tokio::fs::read(path.as_ref())
            .await
            .or_raise(|| ErrorKind::PreviousUnreadable)
            .and_then(|document| Self::parse(&document));
        match loaded {
            Ok(catalog) => {
                tracing::info!(books = catalog.len(), aliases = catalog.aliases.len(), "Loaded previous catalog");
                catalog
            },
            Err(e) => {
                tracing::warn!(error = ?e, "Unable to read previous catalog; per-book purge disabled");
                Self::unavailable()
            },
        }
    }

    /// Parses a catalog, rejecting anything that is not a complete,
    /// well-formed `<library>` document.
    pub fn parse(document: &[u8]) -> Result<Self> {
        validate(document).or_raise(|| ErrorKind::PreviousUnreadable)?;
        let mut catalog = Self { available: true, ..Self::default() };
        let mut reader = Reader::from_reader(document);
        let mut buf = Vec::new();
        loop {
            match reader.read_event_into(&mut buf).or_raise(|| ErrorKind::PreviousUnreadable)? {
                Event::Start(element) | Event::Empty(element) if element.name().as_ref() == b"book" => {
                    let mut attributes = Vec::new();
                    for attribute in element.attributes() {
                        let attribute = attribute.or_raise(|| ErrorKind::PreviousUnreadable)?;
                        let key = String::from_utf8_lossy(attribute.key.as_ref()).into_owned();
                        let value = attribute.unescape_value().or_raise(|| ErrorKind::PreviousUnreadable)?;
                        attributes.push((key, value.into_owned()));
                    }
                    catalog.insert(ComparableRecord::from_attributes(attributes));
                },
                Event::Eof => break,
                _ => {},
            }
            buf.clear();
        }
        Ok(catalog)
    }

    fn insert(&mut self, record: ComparableRecord) {
        let Some(core) = record.get("url").and_then(core_from_url) else {
            tracing::warn!(id = record.id(), "Previous catalog book has no usable url; ignoring");
            return;
        };
        let alias = alias_of(&core);
        if !record.id().is_empty() {
            self.aliases.entry(alias).or_insert_with(|| record.id().to_string());
        }
        self.books.insert(core, record);
    }

    pub fn is_available(&self) -> bool {
        self.available
    }

    pub fn get(&self, core: &str) -> Option<&ComparableRecord> {
        self.books.get(core)
    }

    /// Identifier of the first book published under `alias`.
    pub fn alias_id(&self, alias: &str) -> Option<&str> {
        self.aliases.get(alias).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.books.len()
    }

    pub fn is_empty(&self) -> bool {
        self.books.is_empty()
    }
}

/// File stem of the path component of a download URL, ignoring a trailing
/// `.meta4`.
fn core_from_url(url: &str) -> Option<String> {
    let url = url.split(['?', '#']).next().unwrap_or_default();
    let url = url.strip_suffix(META4_SUFFIX).unwrap_or(url);
    let path = match url.split_once("://") {
        Some((_, rest)) => rest.find('/').map_or("", |start| &rest[start..]),
        None => url,
    };
    Path::new(path).file_stem().and_then(|stem| stem.to_str()).map(str::to_string)
}
