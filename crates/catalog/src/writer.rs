//! Catalog serialisation and validation.

use crate::error::{ErrorKind, Result};
use crate::record::CatalogRecord;
use exn::ResultExt;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use tracing::instrument;

pub const LIBRARY_VERSION: &str = "20110515";
const DECLARATION: &[u8] = b"<?xml version=\"1.0\" encoding=\"UTF-8\" ?>\n";
const ROOT: &str = "library";
const BOOK: &str = "book";
const META4_SUFFIX: &str = ".meta4";

/// Renders the public catalog.
///
/// Refuses to render anything if a record lacks an `id`.
#[instrument(skip_all, fields(books = records.len()))]
pub fn render_public(records: &[CatalogRecord]) -> Result<Vec<u8>> {
    render(records, |_| None)
}

/// Renders the internal catalog: the public catalog plus a `path` attribute
/// locating each archive on the serving host.
#[instrument(skip_all, fields(books = records.len()))]
pub fn render_internal(records: &[CatalogRecord], download_url_root: &str, internal_root: &str) -> Result<Vec<u8>> {
    render(records, |record| Some(internal_path(&record.url, download_url_root, internal_root)))
}

/// Maps a public download URL to its path under `internal_root`.
///
/// `{download_url_root}{relative}.meta4` becomes `{internal_root}/{relative}`;
/// URLs not of that shape are returned unchanged.
pub fn internal_path(url: &str, download_url_root: &str, internal_root: &str) -> String {
    match url.strip_prefix(download_url_root).and_then(|rest| rest.strip_suffix(META4_SUFFIX)) {
        Some(relative) if !relative.is_empty() => {
            format!("{}/{}", internal_root.trim_end_matches('/'), relative)
        },
        _ => url.to_string(),
    }
}

fn render(records: &[CatalogRecord], path: impl Fn(&CatalogRecord) -> Option<String>) -> Result<Vec<u8>> {
    if let Some(record) = records.iter().find(|record| record.id.as_deref().is_none_or(str::is_empty)) {
        exn::bail!(ErrorKind::MissingIdentifier(record.url.clone()));
    }
    let mut writer = Writer::new(Vec::from(DECLARATION));
    let newline = || Event::Text(BytesText::new("\n"));
    writer
        .write_event(Event::Start(BytesStart::new(ROOT).with_attributes([("version", LIBRARY_VERSION)])))
        .or_raise(|| ErrorKind::Serialize)?;
    writer.write_event(newline()).or_raise(|| ErrorKind::Serialize)?;
    for record in records {
        let mut book = BytesStart::new(BOOK).with_attributes(record.attributes());
        if let Some(path) = path(record) {
            book.push_attribute(("path", path.as_str()));
        }
        writer.write_event(Event::Empty(book)).or_raise(|| ErrorKind::Serialize)?;
        writer.write_event(newline()).or_raise(|| ErrorKind::Serialize)?;
    }
    writer.write_event(Event::End(BytesEnd::new(ROOT))).or_raise(|| ErrorKind::Serialize)?;
    writer.write_event(newline()).or_raise(|| ErrorKind::Serialize)?;
    Ok(writer.into_inner())
}

/// Checks that `document` is a well-formed catalog and returns its number of
/// books.
pub fn validate(document: &[u8]) -> Result<usize> {
    let invalid = |reason: String| exn::Exn::from(ErrorKind::Validation(reason));
    let mut reader = Reader::from_reader(document);
    let mut buf = Vec::new();
    let mut depth = 0usize;
    let mut root_closed = false;
    let mut books = 0;
    loop {
        let position = reader.buffer_position();
        let event = reader.read_event_into(&mut buf).map_err(|e| invalid(format!("at byte {position}: {e}")))?;
        match event {
            Event::Start(ref element) | Event::Empty(ref element) => {
                if root_closed {
                    return Err(invalid("content after the root element".to_string()));
                }
                let name = element.name();
                match depth {
                    0 if name.as_ref() != ROOT.as_bytes() => {
                        return Err(invalid(format!("unexpected root <{}>", String::from_utf8_lossy(name.as_ref()))));
                    },
                    1 if name.as_ref() == BOOK.as_bytes() => books += 1,
                    _ => {},
                }
                for attribute in element.attributes() {
                    let attribute = attribute.map_err(|e| invalid(format!("at byte {position}: {e}")))?;
                    attribute.unescape_value().map_err(|e| invalid(format!("at byte {position}: {e}")))?;
                }
                match event {
                    Event::Start(_) => depth += 1,
                    _ if depth == 0 => root_closed = true,
                    _ => {},
                }
            },
            Event::End(_) => {
                depth = depth.checked_sub(1).ok_or_else(|| invalid("unbalanced closing tag".to_string()))?;
                root_closed = depth == 0;
            },
            Event::Eof => break,
            _ => {},
        }
        buf.clear();
    }
    match (depth, root_closed) {
        (0, true) => Ok(books),
        (0, false) => Err(invalid("no root element".to_string())),
        _ => Err(invalid("document ends inside an element".to_string())),
    }
}
