use crate::archive::Archive;
use crate::error::Result;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use std::io::{Read, Seek};
use std::path::Path;
use tracing::instrument;

const METADATA_NAMESPACE: u8 = b'M';
const LEGACY_NAMESPACE: u8 = b'-';
const ILLUSTRATION: &str = "Illustration_48x48@1";
const LEGACY_FAVICON: &str = "favicon";
const COUNTER: &str = "Counter";
const FRONT_ARTICLES: (u8, &str) = (b'X', "listing/titleOrdered/v1");
const ARTICLE_MIME: &str = "text/html";
const MEDIA_MIME_PREFIXES: [&str; 3] = ["image/", "video/", "audio/"];

/// Everything the catalog needs to know about one archive.
///
/// Every field is optional: archives in the wild routinely lack some of
/// them, and a field that could not be read is treated the same as a field
/// that is absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchiveMetadata {
    /// Archive UUID, hyphenated lowercase.
    pub id: Option<String>,
    pub media_count: Option<u64>,
    pub article_count: Option<u64>,
    /// Base64 of the 48x48 PNG illustration.
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

/// Reads [`ArchiveMetadata`] from ZIM files on disk.
///
/// Blocking; callers on an async runtime should wrap it in
/// `spawn_blocking`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZimReader;
impl ZimReader {
    /// Fails only when the file cannot be opened or is not a ZIM archive.
    /// Individual fields that cannot be read are logged and left empty.
    #[instrument(skip(self, path), fields(path = %path.display()))]
    pub fn read(&self, path: &Path) -> Result<ArchiveMetadata> {
        let mut archive = Archive::open(path)?;
        Ok(read_metadata(&mut archive))
    }
}

pub fn read_metadata<R: Read + Seek>(archive: &mut Archive<R>) -> ArchiveMetadata {
    let mut text = |name: &str| {
        field(archive, METADATA_NAMESPACE, name)
            .map(|bytes| String::from_utf8_lossy(&bytes).trim().to_string())
            .filter(|value| !value.is_empty())
    };
    let mut metadata = ArchiveMetadata {
        title: text("Title"),
        description: text("Description"),
        language: text("Language"),
        creator: text("Creator"),
        publisher: text("Publisher"),
        name: text("Name"),
        flavour: text("Flavour"),
        tags: text("Tags"),
        date: text("Date"),
        ..ArchiveMetadata::default()
    };
    metadata.id = Some(archive.header().uuid.hyphenated().to_string());

    let counters = field(archive, METADATA_NAMESPACE, COUNTER)
        .map(|bytes| parse_counter(&String::from_utf8_lossy(&bytes)))
        .unwrap_or_default();
    metadata.media_count = counters
        .iter()
        .filter(|(mime, _)| MEDIA_MIME_PREFIXES.iter().any(|prefix| mime.starts_with(prefix)))
        .map(|(_, count)| *count)
        .reduce(|a, b| a + b);
    metadata.article_count = match archive.header().has_new_namespace_scheme() {
        true => field(archive, FRONT_ARTICLES.0, FRONT_ARTICLES.1).map(|listing| (listing.len() / 4) as u64),
        false => None,
    }
    .or_else(|| {
        counters.iter().filter(|(mime, _)| mime.starts_with(ARTICLE_MIME)).map(|(_, count)| *count).reduce(|a, b| a + b)
    });

    metadata.favicon = field(archive, METADATA_NAMESPACE, ILLUSTRATION)
        .or_else(|| field(archive, LEGACY_NAMESPACE, LEGACY_FAVICON))
        .filter(|png| !png.is_empty())
        .map(|png| BASE64.encode(png));
    metadata
}

fn field<R: Read + Seek>(archive: &mut Archive<R>, namespace: u8, name: &str) -> Option<Vec<u8>> {
    match archive.content(namespace, name) {
        Ok(content) => content,
        Err(e) => {
            tracing::warn!(namespace = %char::from(namespace), entry = name, error = ?e, "Could not read archive entry");
            None
        },
    }
}

/// Parses `mime=count;mime=count` counters. Mime types may themselves
/// carry `;`-separated parameters (`text/html;raw=true=12`).
fn parse_counter(raw: &str) -> Vec<(String, u64)> {
    let mut counters = Vec::new();
    let mut pending = String::new();
    for piece in raw.split(';') {
        match piece.rsplit_once('=').and_then(|(key, value)| value.trim().parse::<u64>().ok().map(|v| (key, v))) {
            Some((key, count)) => {
                pending.push_str(key);
                counters.push((std::mem::take(&mut pending).trim().to_string(), count));
            },
            None => {
                pending.push_str(piece);
                pending.push(';');
            },
        }
    }
    counters
}
