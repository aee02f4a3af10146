//! On-disk records of the pack container
//!
//! Packs are stored ZIP archives: every member is one quiz, the member name
//! is the answer and the member content is the question payload. Only the
//! subset of the format the engine needs is modelled here:
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ Local header "PK\x03\x04" + name + extra    │ ┐
//! │ Quiz data (stored, uncompressed)            │ ┘ one per quiz
//! ├─────────────────────────────────────────────┤
//! │ Central directory "PK\x01\x02" entries      │  names, sizes, CRC-32,
//! │                                             │  local header offsets
//! ├─────────────────────────────────────────────┤
//! │ End of central directory "PK\x05\x06"       │  entry count, directory
//! │  + optional comment (pack title)            │  offset and size
//! └─────────────────────────────────────────────┘
//! ```
//!
//! All integers are little-endian.

use crate::buffer_pool::PageCache;
use crate::error::{LotooError, Result};

pub const EOCD_SIGNATURE: u32 = 0x0605_4b50;
pub const CENTRAL_SIGNATURE: u32 = 0x0201_4b50;
pub const LOCAL_SIGNATURE: u32 = 0x0403_4b50;

/// Fixed part of the end of central directory record
pub const EOCD_SIZE: usize = 22;
/// Fixed part of a central directory entry
pub const CENTRAL_ENTRY_SIZE: usize = 46;
/// Fixed part of a local file header
pub const LOCAL_HEADER_SIZE: usize = 30;
/// Longest archive comment the format allows
pub const MAX_COMMENT_LEN: usize = u16::MAX as usize;

/// Compression method for stored (uncompressed) members
pub const METHOD_STORED: u16 = 0;
/// Version written by [`PackWriter`](crate::writer::PackWriter): 2.0
pub const VERSION_NEEDED: u16 = 20;

const FLAG_ENCRYPTED: u16 = 0x0001;
/// General purpose flag marking UTF-8 names
pub const FLAG_UTF8: u16 = 0x0800;

pub(crate) fn read_u16(bytes: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([bytes[at], bytes[at + 1]])
}

pub(crate) fn read_u32(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

/// End of central directory record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndOfCentralDirectory {
    pub disk_number: u16,
    pub directory_disk: u16,
    pub entries_on_disk: u16,
    pub total_entries: u16,
    pub directory_size: u32,
    pub directory_offset: u32,
    pub comment: Vec<u8>,
}

impl EndOfCentralDirectory {
    /// Find the record by scanning backwards from the end of the source
    ///
    /// Returns the record and its absolute offset. `search_limit` bounds how
    /// many trailing bytes are scanned. A record whose comment ends exactly
    /// at the end of the source wins over one followed by stray bytes.
    pub fn locate(cache: &PageCache, search_limit: usize) -> Result<(u64, Self)> {
        let total = cache.total_size();
        if total < EOCD_SIZE as u64 {
            return Err(LotooError::InvalidMagic);
        }

        // Packs without an archive comment end with the bare record
        let last = cache.fetch(total - EOCD_SIZE as u64, EOCD_SIZE)?;
        if read_u32(&last, 0) == EOCD_SIGNATURE && read_u16(&last, 20) == 0 {
            return Ok((total - EOCD_SIZE as u64, Self::from_bytes(&last)?));
        }

        let window = total.min(search_limit.max(EOCD_SIZE) as u64);
        let window_start = total - window;
        let tail = cache.fetch(window_start, window as usize)?;

        // A signature inside the comment is only trusted if no record ends
        // exactly at the end of the source
        let mut loose = None;
        for pos in (0..=tail.len() - EOCD_SIZE).rev() {
            if read_u32(&tail, pos) != EOCD_SIGNATURE {
                continue;
            }
            let record_end = pos + EOCD_SIZE + read_u16(&tail, pos + 20) as usize;
            if record_end == tail.len() {
                return Ok((window_start + pos as u64, Self::from_bytes(&tail[pos..])?));
            }
            if record_end < tail.len() && loose.is_none() {
                loose = Some(pos);
            }
        }

        match loose {
            Some(pos) => Ok((window_start + pos as u64, Self::from_bytes(&tail[pos..])?)),
            None => Err(LotooError::InvalidMagic),
        }
    }

    /// Parse the record from bytes starting at its signature
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < EOCD_SIZE || read_u32(bytes, 0) != EOCD_SIGNATURE {
            return Err(LotooError::InvalidMagic);
        }

        let comment_len = read_u16(bytes, 20) as usize;
        let comment_end = EOCD_SIZE + comment_len;
        if bytes.len() < comment_end {
            return Err(LotooError::InvalidEntry(
                "archive comment runs past the end of the pack".to_string(),
            ));
        }

        let record = EndOfCentralDirectory {
            disk_number: read_u16(bytes, 4),
            directory_disk: read_u16(bytes, 6),
            entries_on_disk: read_u16(bytes, 8),
            total_entries: read_u16(bytes, 10),
            directory_size: read_u32(bytes, 12),
            directory_offset: read_u32(bytes, 16),
            comment: bytes[EOCD_SIZE..comment_end].to_vec(),
        };
        record.validate()?;

        Ok(record)
    }

    /// Reject archive features the engine does not read
    pub fn validate(&self) -> Result<()> {
        if self.disk_number != 0
            || self.directory_disk != 0
            || self.entries_on_disk != self.total_entries
        {
            return Err(LotooError::InvalidEntry(
                "multi-disk archives are not supported".to_string(),
            ));
        }

        if self.total_entries == u16::MAX
            || self.directory_size == u32::MAX
            || self.directory_offset == u32::MAX
        {
            return Err(LotooError::InvalidEntry(
                "zip64 archives are not supported".to_string(),
            ));
        }

        Ok(())
    }

    /// Serialize the record (including its comment)
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(EOCD_SIZE + self.comment.len());
        bytes.extend_from_slice(&EOCD_SIGNATURE.to_le_bytes());
        bytes.extend_from_slice(&self.disk_number.to_le_bytes());
        bytes.extend_from_slice(&self.directory_disk.to_le_bytes());
        bytes.extend_from_slice(&self.entries_on_disk.to_le_bytes());
        bytes.extend_from_slice(&self.total_entries.to_le_bytes());
        bytes.extend_from_slice(&self.directory_size.to_le_bytes());
        bytes.extend_from_slice(&self.directory_offset.to_le_bytes());
        bytes.extend_from_slice(&(self.comment.len() as u16).to_le_bytes());
        bytes.extend_from_slice(&self.comment);
        bytes
    }
}

/// One central directory entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CentralEntry {
    pub flags: u16,
    pub method: u16,
    pub crc32: u32,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
    pub local_header_offset: u32,
    /// Length of the name field as stored, before decoding
    pub name_len: u16,
    pub file_name: String,
}

impl CentralEntry {
    /// Parse the entry at the start of `bytes`
    ///
    /// Returns the entry and the number of bytes it occupies.
    pub fn from_bytes(bytes: &[u8]) -> Result<(Self, usize)> {
        if bytes.len() < CENTRAL_ENTRY_SIZE {
            return Err(LotooError::InvalidEntry(
                "central directory entry overruns the directory".to_string(),
            ));
        }
        if read_u32(bytes, 0) != CENTRAL_SIGNATURE {
            return Err(LotooError::InvalidEntry(format!(
                "bad central directory signature {:#010x}",
                read_u32(bytes, 0)
            )));
        }

        let name_len = read_u16(bytes, 28) as usize;
        let extra_len = read_u16(bytes, 30) as usize;
        let comment_len = read_u16(bytes, 32) as usize;
        let consumed = CENTRAL_ENTRY_SIZE + name_len + extra_len + comment_len;
        if bytes.len() < consumed {
            return Err(LotooError::InvalidEntry(
                "central directory entry overruns the directory".to_string(),
            ));
        }

        let name_bytes = &bytes[CENTRAL_ENTRY_SIZE..CENTRAL_ENTRY_SIZE + name_len];
        let flags = read_u16(bytes, 8);
        let file_name = if flags & FLAG_UTF8 != 0 {
            String::from_utf8(name_bytes.to_vec()).map_err(|e| {
                LotooError::InvalidEntry(format!(
                    "entry name is flagged UTF-8 but is not ({})",
                    e.utf8_error()
                ))
            })?
        } else {
            // Legacy code page names: keep what decodes
            String::from_utf8_lossy(name_bytes).into_owned()
        };
        let entry = CentralEntry {
            flags,
            method: read_u16(bytes, 10),
            crc32: read_u32(bytes, 16),
            compressed_size: read_u32(bytes, 20),
            uncompressed_size: read_u32(bytes, 24),
            local_header_offset: read_u32(bytes, 42),
            name_len: name_len as u16,
            file_name,
        };

        Ok((entry, consumed))
    }

    /// Directory members carry no quiz
    pub fn is_directory(&self) -> bool {
        self.file_name.ends_with('/')
    }

    /// Check that the member can be served as a quiz payload
    pub fn validate(&self) -> Result<()> {
        if self.flags & FLAG_ENCRYPTED != 0 {
            return Err(LotooError::InvalidEntry(format!(
                "entry '{}' is encrypted",
                self.file_name
            )));
        }
        if self.method != METHOD_STORED {
            return Err(LotooError::UnsupportedCompression {
                entry: self.file_name.clone(),
                method: self.method,
            });
        }
        if self.compressed_size != self.uncompressed_size {
            return Err(LotooError::InvalidEntry(format!(
                "stored entry '{}' declares {} bytes compressed but {} uncompressed",
                self.file_name, self.compressed_size, self.uncompressed_size
            )));
        }
        Ok(())
    }

    /// Quiz name: file name without directories or final extension
    pub fn quiz_name(&self) -> Result<String> {
        let base = self.file_name.rsplit('/').next().unwrap_or(&self.file_name);
        let stem = match base.rfind('.') {
            Some(dot) if dot > 0 => &base[..dot],
            _ => base,
        };
        if stem.is_empty() {
            return Err(LotooError::InvalidEntry(format!(
                "entry '{}' has an empty name",
                self.file_name
            )));
        }
        Ok(stem.to_string())
    }

    /// Serialize the entry
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(CENTRAL_ENTRY_SIZE + self.file_name.len());
        bytes.extend_from_slice(&CENTRAL_SIGNATURE.to_le_bytes());
        bytes.extend_from_slice(&VERSION_NEEDED.to_le_bytes()); // version made by
        bytes.extend_from_slice(&VERSION_NEEDED.to_le_bytes());
        bytes.extend_from_slice(&self.flags.to_le_bytes());
        bytes.extend_from_slice(&self.method.to_le_bytes());
        bytes.extend_from_slice(&0u16.to_le_bytes()); // mod time
        bytes.extend_from_slice(&0x0021u16.to_le_bytes()); // mod date: 1980-01-01
        bytes.extend_from_slice(&self.crc32.to_le_bytes());
        bytes.extend_from_slice(&self.compressed_size.to_le_bytes());
        bytes.extend_from_slice(&self.uncompressed_size.to_le_bytes());
        bytes.extend_from_slice(&(self.file_name.len() as u16).to_le_bytes());
        bytes.extend_from_slice(&0u16.to_le_bytes()); // extra
        bytes.extend_from_slice(&0u16.to_le_bytes()); // comment
        bytes.extend_from_slice(&0u16.to_le_bytes()); // disk start
        bytes.extend_from_slice(&0u16.to_le_bytes()); // internal attributes
        bytes.extend_from_slice(&0u32.to_le_bytes()); // external attributes
        bytes.extend_from_slice(&self.local_header_offset.to_le_bytes());
        bytes.extend_from_slice(self.file_name.as_bytes());
        bytes
    }
}

/// Local file header preceding each member's data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalHeader {
    pub name_len: u16,
    pub extra_len: u16,
}

impl LocalHeader {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < LOCAL_HEADER_SIZE || read_u32(bytes, 0) != LOCAL_SIGNATURE {
            return Err(LotooError::InvalidEntry(
                "bad local file header signature".to_string(),
            ));
        }

        Ok(LocalHeader {
            name_len: read_u16(bytes, 26),
            extra_len: read_u16(bytes, 28),
        })
    }

    /// Bytes between the start of the header and the member data
    pub fn data_offset(&self) -> u64 {
        (LOCAL_HEADER_SIZE + self.name_len as usize + self.extra_len as usize) as u64
    }

    /// Serialize a header for a stored member
    pub fn to_bytes(entry: &CentralEntry) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(LOCAL_HEADER_SIZE + entry.file_name.len());
        bytes.extend_from_slice(&LOCAL_SIGNATURE.to_le_bytes());
        bytes.extend_from_slice(&VERSION_NEEDED.to_le_bytes());
        bytes.extend_from_slice(&entry.flags.to_le_bytes());
        bytes.extend_from_slice(&entry.method.to_le_bytes());
        bytes.extend_from_slice(&0u16.to_le_bytes());
        bytes.extend_from_slice(&0x0021u16.to_le_bytes());
        bytes.extend_from_slice(&entry.crc32.to_le_bytes());
        bytes.extend_from_slice(&entry.compressed_size.to_le_bytes());
        bytes.extend_from_slice(&entry.uncompressed_size.to_le_bytes());
        bytes.extend_from_slice(&(entry.file_name.len() as u16).to_le_bytes());
        bytes.extend_from_slice(&0u16.to_le_bytes());
        bytes.extend_from_slice(entry.file_name.as_bytes());
        bytes
    }
}
