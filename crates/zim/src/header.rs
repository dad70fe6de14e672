use crate::error::{ErrorKind, Result};
use std::io::Read;
use uuid::Uuid;

pub(crate) const MAGIC: u32 = 72_173_914;
pub(crate) const HEADER_LEN: usize = 80;
const SUPPORTED_MAJOR: [u16; 2] = [5, 6];

/// The fixed-size header at the start of every ZIM file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub major_version: u16,
    pub minor_version: u16,
    pub uuid: Uuid,
    pub entry_count: u32,
    pub cluster_count: u32,
    pub path_ptr_pos: u64,
    pub title_ptr_pos: u64,
    pub cluster_ptr_pos: u64,
    pub mime_list_pos: u64,
    pub main_page: u32,
    pub layout_page: u32,
    pub checksum_pos: u64,
}
impl Header {
    pub(crate) fn read(reader: &mut impl Read) -> Result<Self> {
        let mut buf = [0u8; HEADER_LEN];
        reader.read_exact(&mut buf).map_err(ErrorKind::Io)?;
        Self::parse(&buf)
    }

    pub(crate) fn parse(buf: &[u8; HEADER_LEN]) -> Result<Self> {
        let u16_at = |at: usize| u16::from_le_bytes([buf[at], buf[at + 1]]);
        let u32_at = |at: usize| u32::from_le_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]]);
        let u64_at = |at: usize| u64::from(u32_at(at)) | (u64::from(u32_at(at + 4)) << 32);

        let magic = u32_at(0);
        if magic != MAGIC {
            exn::bail!(ErrorKind::InvalidHeader(format!("bad magic number {magic:#010x}")));
        }
        let major_version = u16_at(4);
        if !SUPPORTED_MAJOR.contains(&major_version) {
            exn::bail!(ErrorKind::InvalidHeader(format!("unsupported major version {major_version}")));
        }
        let mut uuid = [0u8; 16];
        uuid.copy_from_slice(&buf[8..24]);
        Ok(Self {
            major_version,
            minor_version: u16_at(6),
            uuid: Uuid::from_bytes(uuid),
            entry_count: u32_at(24),
            cluster_count: u32_at(28),
            path_ptr_pos: u64_at(32),
            title_ptr_pos: u64_at(40),
            cluster_ptr_pos: u64_at(48),
            mime_list_pos: u64_at(56),
            main_page: u32_at(64),
            layout_page: u32_at(68),
            checksum_pos: u64_at(72),
        })
    }

    /// Archives from major version 6.1 on keep metadata, content and
    /// front-article listings in separate namespaces.
    pub fn has_new_namespace_scheme(&self) -> bool {
        self.major_version >= 6 && self.minor_version >= 1
    }
}
