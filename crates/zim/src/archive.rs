use crate::cluster::Cluster;
use crate::dirent::{Dirent, Target, read_u64};
use crate::error::{ErrorKind, Result};
use crate::header::Header;
use exn::ResultExt;
use std::cmp::Ordering;
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;

const MAX_REDIRECTS: usize = 8;
// Metadata and illustrations live in small clusters; anything bigger than
// this is a damaged pointer, not a cluster worth reading.
const MAX_CLUSTER_LEN: u64 = 256 * 1024 * 1024;

/// Random-access view of one ZIM file.
///
/// Entries are located by binary search over the path pointer list, so only
/// the handful of directory entries and clusters actually needed are read.
pub struct Archive<R> {
    reader: R,
    header: Header,
}
impl Archive<BufReader<File>> {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path).map_err(ErrorKind::Io)?;
        Self::new(BufReader::new(file))
    }
}
impl<R: Read + Seek> Archive<R> {
    pub fn new(mut reader: R) -> Result<Self> {
        reader.seek(SeekFrom::Start(0)).map_err(ErrorKind::Io)?;
        let header = Header::read(&mut reader)?;
        Ok(Self { reader, header })
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Finds the entry stored under `namespace`/`path`.
    pub fn find(&mut self, namespace: u8, path: &str) -> Result<Option<(u32, Dirent)>> {
        let (mut low, mut high) = (0u32, self.header.entry_count);
        while low < high {
            let middle = low + (high - low) / 2;
            let dirent = self.dirent(middle)?;
            let ordering = dirent.key().cmp(&(namespace, path));
            match ordering {
                Ordering::Equal => return Ok(Some((middle, dirent))),
                Ordering::Less => low = middle + 1,
                Ordering::Greater => high = middle,
            }
        }
        Ok(None)
    }

    /// Data of the entry stored under `namespace`/`path`, following
    /// redirects. `None` when there is no such entry.
    pub fn content(&mut self, namespace: u8, path: &str) -> Result<Option<Vec<u8>>> {
        let Some((_, mut dirent)) = self.find(namespace, path)? else {
            return Ok(None);
        };
        for _ in 0..MAX_REDIRECTS {
            let index = match dirent.target {
                Target::Blob { cluster, blob } => return self.blob(cluster, blob).map(Some),
                Target::Redirect(index) => index,
                Target::Nothing => return Ok(None),
            };
            dirent = self.dirent(index)?;
        }
        exn::bail!(ErrorKind::Corrupt(format!("redirect chain from {}/{path} too long", char::from(namespace))))
    }

    fn dirent(&mut self, index: u32) -> Result<Dirent> {
        if index >= self.header.entry_count {
            exn::bail!(ErrorKind::Corrupt(format!("entry {index} out of range")));
        }
        let offset = self.pointer(self.header.path_ptr_pos, index)?;
        self.reader.seek(SeekFrom::Start(offset)).map_err(ErrorKind::Io)?;
        Dirent::read(&mut self.reader).or_raise(|| ErrorKind::Corrupt(format!("unreadable entry {index}")))
    }

    fn blob(&mut self, cluster: u32, blob: u32) -> Result<Vec<u8>> {
        if cluster >= self.header.cluster_count {
            exn::bail!(ErrorKind::Corrupt(format!("cluster {cluster} out of range")));
        }
        let start = self.pointer(self.header.cluster_ptr_pos, cluster)?;
        let end = match cluster + 1 < self.header.cluster_count {
            true => self.pointer(self.header.cluster_ptr_pos, cluster + 1)?,
            false => self.header.checksum_pos,
        };
        let len = end.checked_sub(start).filter(|len| *len <= MAX_CLUSTER_LEN).ok_or_else(|| {
            exn::Exn::from(ErrorKind::Corrupt(format!("cluster {cluster} spans {start}..{end}")))
        })?;
        let mut raw = vec![0u8; len as usize];
        self.reader.seek(SeekFrom::Start(start)).map_err(ErrorKind::Io)?;
        self.reader.read_exact(&mut raw).map_err(ErrorKind::Io)?;
        let decoded = Cluster::decode(&raw)?;
        Ok(decoded.blob(blob as usize)?.to_vec())
    }

    fn pointer(&mut self, list_pos: u64, index: u32) -> Result<u64> {
        self.reader.seek(SeekFrom::Start(list_pos + 8 * u64::from(index))).map_err(ErrorKind::Io)?;
        read_u64(&mut self.reader)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::Compression;
    use crate::fixture::ZimBuilder;
    use rstest::rstest;
    use std::io::Cursor;
    use std::ops::Deref;

    #[rstest]
    #[case(Compression::None)]
    #[case(Compression::Xz)]
    #[case(Compression::Zstd)]
    fn test_content_lookup(#[case] compression: Compression) {
        let bytes = ZimBuilder::default()
            .compression(compression)
            .entry(b'M', "Title", "Encyclopedia")
            .entry(b'M', "Language", "eng")
            .entry(b'C', "index.html", "<html/>")
            .build();
        let mut archive = Archive::new(Cursor::new(bytes)).unwrap();
        assert_eq!(archive.content(b'M', "Title").unwrap().unwrap(), b"Encyclopedia");
        assert_eq!(archive.content(b'M', "Language").unwrap().unwrap(), b"eng");
        assert_eq!(archive.content(b'C', "index.html").unwrap().unwrap(), b"<html/>");
        assert!(archive.content(b'M', "Creator").unwrap().is_none());
        assert!(archive.content(b'X', "Title").unwrap().is_none());
    }

    #[test]
    fn test_follows_redirects() {
        let bytes = ZimBuilder::default()
            .entry(b'-', "favicon", "png bytes")
            .redirect(b'M', "Illustration_48x48@1", b'-', "favicon")
            .build();
        let mut archive = Archive::new(Cursor::new(bytes)).unwrap();
        assert_eq!(archive.content(b'M', "Illustration_48x48@1").unwrap().unwrap(), b"png bytes");
    }

    #[test]
    fn test_find_across_many_entries() {
        let mut builder = ZimBuilder::default();
        for i in 0..100 {
            builder = builder.entry(b'C', &format!("page{i:03}.html"), &format!("page {i}"));
        }
        let mut archive = Archive::new(Cursor::new(builder.build())).unwrap();
        for i in [0, 1, 50, 98, 99] {
            let (_, dirent) = archive.find(b'C', &format!("page{i:03}.html")).unwrap().unwrap();
            assert_eq!(dirent.path, format!("page{i:03}.html"));
        }
        assert!(archive.find(b'C', "page100.html").unwrap().is_none());
    }

    #[test]
    fn test_not_a_zim_file() {
        let err = Archive::new(Cursor::new(vec![0u8; 200])).err().unwrap();
        assert!(matches!(err.deref(), ErrorKind::InvalidHeader(_)));
    }

    #[test]
    fn test_truncated_file() {
        let mut bytes = ZimBuilder::default().entry(b'M', "Title", "Encyclopedia").build();
        bytes.truncate(120);
        let mut archive = Archive::new(Cursor::new(bytes)).unwrap();
        assert!(archive.content(b'M', "Title").is_err());
    }
}
