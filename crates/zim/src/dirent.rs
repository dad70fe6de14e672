use crate::error::{ErrorKind, Result};
use std::io::Read;

const REDIRECT_MIME: u16 = 0xFFFF;
const LINK_TARGET_MIME: u16 = 0xFFFE;
const DELETED_MIME: u16 = 0xFFFD;
const MAX_STRING_LEN: usize = 64 * 1024;

/// Where a directory entry's data lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Blob { cluster: u32, blob: u32 },
    /// Index (in path order) of the entry this one redirects to.
    Redirect(u32),
    /// Link targets and deleted entries carry no data.
    Nothing,
}

/// A directory entry: one item of the archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dirent {
    pub mime_type: u16,
    pub namespace: u8,
    pub path: String,
    pub title: String,
    pub target: Target,
}
impl Dirent {
    pub(crate) fn read(reader: &mut impl Read) -> Result<Self> {
        let mut fixed = [0u8; 8];
        reader.read_exact(&mut fixed).map_err(ErrorKind::Io)?;
        let mime_type = u16::from_le_bytes([fixed[0], fixed[1]]);
        let parameter_len = usize::from(fixed[2]);
        let namespace = fixed[3];
        let target = match mime_type {
            REDIRECT_MIME => Target::Redirect(read_u32(reader)?),
            LINK_TARGET_MIME | DELETED_MIME => Target::Nothing,
            _ => Target::Blob { cluster: read_u32(reader)?, blob: read_u32(reader)? },
        };
        let path = read_cstring(reader)?;
        let title = read_cstring(reader)?;
        let mut parameters = vec![0u8; parameter_len];
        reader.read_exact(&mut parameters).map_err(ErrorKind::Io)?;
        Ok(Self { mime_type, namespace, path, title, target })
    }

    /// Sort key of the path pointer list.
    pub(crate) fn key(&self) -> (u8, &str) {
        (self.namespace, &self.path)
    }
}

pub(crate) fn read_u32(reader: &mut impl Read) -> Result<u32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf).map_err(ErrorKind::Io)?;
    Ok(u32::from_le_bytes(buf))
}

pub(crate) fn read_u64(reader: &mut impl Read) -> Result<u64> {
    let mut buf = [0u8; 8];
    reader.read_exact(&mut buf).map_err(ErrorKind::Io)?;
    Ok(u64::from_le_bytes(buf))
}

fn read_cstring(reader: &mut impl Read) -> Result<String> {
    let mut bytes = Vec::new();
    let mut byte = [0u8; 1];
    loop {
        reader.read_exact(&mut byte).map_err(ErrorKind::Io)?;
        if byte[0] == 0 {
            break;
        }
        if bytes.len() >= MAX_STRING_LEN {
            exn::bail!(ErrorKind::Corrupt("unterminated string in directory entry".to_string()));
        }
        bytes.push(byte[0]);
    }
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Serialises a directory entry. Only used to build fixtures.
#[cfg(test)]
pub(crate) fn encode(dirent: &Dirent) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&dirent.mime_type.to_le_bytes());
    out.push(0);
    out.push(dirent.namespace);
    out.extend_from_slice(&0u32.to_le_bytes());
    match dirent.target {
        Target::Blob { cluster, blob } => {
            out.extend_from_slice(&cluster.to_le_bytes());
            out.extend_from_slice(&blob.to_le_bytes());
        },
        Target::Redirect(index) => out.extend_from_slice(&index.to_le_bytes()),
        Target::Nothing => {},
    }
    for s in [&dirent.path, &dirent.title] {
        out.extend_from_slice(s.as_bytes());
        out.push(0);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::io::Cursor;

    #[rstest]
    #[case(Target::Blob { cluster: 3, blob: 7 }, 0)]
    #[case(Target::Redirect(12), REDIRECT_MIME)]
    #[case(Target::Nothing, DELETED_MIME)]
    fn test_read(#[case] target: Target, #[case] mime_type: u16) {
        let dirent = Dirent {
            mime_type,
            namespace: b'M',
            path: "Title".to_string(),
            title: String::new(),
            target,
        };
        let mut bytes = encode(&dirent);
        bytes.extend_from_slice(b"trailing");
        let mut cursor = Cursor::new(bytes);
        assert_eq!(Dirent::read(&mut cursor).unwrap(), dirent);
        assert_eq!(cursor.position() as usize, encode(&dirent).len());
    }

    #[test]
    fn test_truncated() {
        let mut bytes = encode(&Dirent {
            mime_type: 0,
            namespace: b'C',
            path: "index.html".to_string(),
            title: "Index".to_string(),
            target: Target::Blob { cluster: 0, blob: 0 },
        });
        bytes.pop();
        assert!(Dirent::read(&mut Cursor::new(bytes)).is_err());
    }
}
