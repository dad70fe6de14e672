//! Cluster decoding.
//!
//! A cluster is one info byte followed by a (possibly compressed) payload.
//! The payload starts with a table of blob offsets, relative to the payload
//! start, and the first offset doubles as the table's length.

use crate::error::{ErrorKind, Result};
use derive_more::Display;
use exn::{OptionExt, ResultExt};
use std::io::Read;

const COMPRESSION_MASK: u8 = 0x0F;
const EXTENDED_FLAG: u8 = 0x10;

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    #[display("none")]
    None,
    #[display("xz")]
    Xz,
    #[display("zstd")]
    Zstd,
}
impl Compression {
    /// Tags as stored in the low nibble of the cluster info byte.
    pub(crate) fn tag(&self) -> u8 {
        match self {
            Compression::None => 1,
            Compression::Xz => 4,
            Compression::Zstd => 5,
        }
    }

    pub fn decompress(&self, input: &[u8]) -> Result<Vec<u8>> {
        let mut output = Vec::new();
        match self {
            Compression::None => output.extend_from_slice(input),
            Compression::Xz => {
                xz2::read::XzDecoder::new(input).read_to_end(&mut output).or_raise(|| ErrorKind::Decompression)?;
            },
            Compression::Zstd => {
                output = zstd::stream::decode_all(input).or_raise(|| ErrorKind::Decompression)?;
            },
        }
        Ok(output)
    }
}
impl TryFrom<u8> for Compression {
    type Error = crate::error::Error;

    fn try_from(info: u8) -> Result<Self> {
        match info & COMPRESSION_MASK {
            // 0 was written by very old writers and means the same as 1.
            0 | 1 => Ok(Compression::None),
            4 => Ok(Compression::Xz),
            5 => Ok(Compression::Zstd),
            other => exn::bail!(ErrorKind::UnsupportedCompression(other)),
        }
    }
}

/// A decompressed cluster.
pub(crate) struct Cluster {
    data: Vec<u8>,
    extended: bool,
}
impl Cluster {
    /// `raw` is the cluster exactly as stored, info byte included.
    pub(crate) fn decode(raw: &[u8]) -> Result<Self> {
        let (&info, payload) = raw.split_first().ok_or_raise(|| ErrorKind::Corrupt("empty cluster".to_string()))?;
        let compression = Compression::try_from(info)?;
        Ok(Self { data: compression.decompress(payload)?, extended: info & EXTENDED_FLAG != 0 })
    }

    fn offset(&self, index: usize) -> Option<usize> {
        let width = self.offset_width();
        let bytes = self.data.get(index * width..(index + 1) * width)?;
        let value = match self.extended {
            true => u64::from_le_bytes(bytes.try_into().ok()?),
            false => u64::from(u32::from_le_bytes(bytes.try_into().ok()?)),
        };
        usize::try_from(value).ok()
    }

    fn offset_width(&self) -> usize {
        if self.extended { 8 } else { 4 }
    }

    pub(crate) fn blob_count(&self) -> usize {
        self.offset(0).map(|first| (first / self.offset_width()).saturating_sub(1)).unwrap_or(0)
    }

    pub(crate) fn blob(&self, index: usize) -> Result<&[u8]> {
        if index >= self.blob_count() {
            exn::bail!(ErrorKind::Corrupt(format!("blob {index} out of range ({} blobs)", self.blob_count())));
        }
        let (start, end) = self
            .offset(index)
            .zip(self.offset(index + 1))
            .ok_or_raise(|| ErrorKind::Corrupt(format!("unreadable offsets for blob {index}")))?;
        self.data.get(start..end).ok_or_raise(|| ErrorKind::Corrupt(format!("blob {index} spans {start}..{end}")))
    }
}

/// Serialises blobs into a raw cluster (info byte included). Only used to
/// build fixtures.
#[cfg(test)]
pub(crate) fn encode(blobs: &[&[u8]], compression: Compression) -> Vec<u8> {
    let mut payload = Vec::new();
    let mut offset = (blobs.len() + 1) * 4;
    payload.extend_from_slice(&(offset as u32).to_le_bytes());
    for blob in blobs {
        offset += blob.len();
        payload.extend_from_slice(&(offset as u32).to_le_bytes());
    }
    for blob in blobs {
        payload.extend_from_slice(blob);
    }
    let payload = match compression {
        Compression::None => payload,
        Compression::Xz => {
            let mut out = Vec::new();
            xz2::read::XzEncoder::new(payload.as_slice(), 6).read_to_end(&mut out).unwrap();
            out
        },
        Compression::Zstd => zstd::stream::encode_all(payload.as_slice(), 3).unwrap(),
    };
    let mut raw = vec![compression.tag()];
    raw.extend(payload);
    raw
}
