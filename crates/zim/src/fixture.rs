//! In-memory ZIM files for tests.

use crate::cluster::{self, Compression};
use crate::dirent::{self, Dirent, Target};
use crate::header::{HEADER_LEN, MAGIC};

const MIME_LIST: &[u8] = b"text/plain\0\0";
const NO_PAGE: u32 = u32::MAX;

enum Data {
    Content(Vec<u8>),
    Redirect(u8, String),
}

/// Builds a minimal but well-formed archive: one cluster holding every
/// content entry, version 6.1.
pub(crate) struct ZimBuilder {
    uuid: [u8; 16],
    compression: Compression,
    entries: Vec<(u8, String, Data)>,
}
impl Default for ZimBuilder {
    fn default() -> Self {
        Self {
            uuid: *b"\x12\x34\x56\x78\x9a\xbc\xde\xf0\x12\x34\x56\x78\x9a\xbc\xde\xf0",
            compression: Compression::None,
            entries: Vec::new(),
        }
    }
}
impl ZimBuilder {
    pub(crate) fn uuid(mut self, uuid: [u8; 16]) -> Self {
        self.uuid = uuid;
        self
    }

    pub(crate) fn compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    pub(crate) fn entry(mut self, namespace: u8, path: &str, content: impl AsRef<[u8]>) -> Self {
        self.entries.push((namespace, path.to_string(), Data::Content(content.as_ref().to_vec())));
        self
    }

    pub(crate) fn redirect(mut self, namespace: u8, path: &str, to_namespace: u8, to_path: &str) -> Self {
        self.entries.push((namespace, path.to_string(), Data::Redirect(to_namespace, to_path.to_string())));
        self
    }

    pub(crate) fn build(mut self) -> Vec<u8> {
        self.entries.sort_by(|a, b| (a.0, &a.1).cmp(&(b.0, &b.1)));
        let index_of = |namespace: u8, path: &str| {
            self.entries.iter().position(|(ns, p, _)| *ns == namespace && p == path).unwrap() as u32
        };

        let mut blobs: Vec<&[u8]> = Vec::new();
        let mut dirents = Vec::new();
        for (namespace, path, data) in &self.entries {
            let (mime_type, target) = match data {
                Data::Content(bytes) => {
                    blobs.push(bytes);
                    (0, Target::Blob { cluster: 0, blob: blobs.len() as u32 - 1 })
                },
                Data::Redirect(ns, p) => (0xFFFF, Target::Redirect(index_of(*ns, p))),
            };
            dirents.push(dirent::encode(&Dirent {
                mime_type,
                namespace: *namespace,
                path: path.clone(),
                title: String::new(),
                target,
            }));
        }
        let cluster = cluster::encode(&blobs, self.compression);

        let entry_count = dirents.len() as u64;
        let mut body = Vec::from(MIME_LIST);
        let mut dirent_positions = Vec::new();
        for encoded in &dirents {
            dirent_positions.push((HEADER_LEN + body.len()) as u64);
            body.extend_from_slice(encoded);
        }
        let path_ptr_pos = (HEADER_LEN + body.len()) as u64;
        for position in &dirent_positions {
            body.extend_from_slice(&position.to_le_bytes());
        }
        let title_ptr_pos = (HEADER_LEN + body.len()) as u64;
        for index in 0..entry_count as u32 {
            body.extend_from_slice(&index.to_le_bytes());
        }
        let cluster_ptr_pos = (HEADER_LEN + body.len()) as u64;
        let cluster_pos = cluster_ptr_pos + 8;
        body.extend_from_slice(&cluster_pos.to_le_bytes());
        body.extend_from_slice(&cluster);
        let checksum_pos = (HEADER_LEN + body.len()) as u64;
        body.extend_from_slice(&[0u8; 16]);

        let mut out = Vec::with_capacity(HEADER_LEN + body.len());
        out.extend_from_slice(&MAGIC.to_le_bytes());
        out.extend_from_slice(&6u16.to_le_bytes());
        out.extend_from_slice(&1u16.to_le_bytes());
        out.extend_from_slice(&self.uuid);
        out.extend_from_slice(&(entry_count as u32).to_le_bytes());
        out.extend_from_slice(&1u32.to_le_bytes());
        out.extend_from_slice(&path_ptr_pos.to_le_bytes());
        out.extend_from_slice(&title_ptr_pos.to_le_bytes());
        out.extend_from_slice(&cluster_ptr_pos.to_le_bytes());
        out.extend_from_slice(&(HEADER_LEN as u64).to_le_bytes());
        out.extend_from_slice(&NO_PAGE.to_le_bytes());
        out.extend_from_slice(&NO_PAGE.to_le_bytes());
        out.extend_from_slice(&checksum_pos.to_le_bytes());
        out.extend(body);
        out
    }
}
