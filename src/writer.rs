//! In-memory pack builder
//!
//! Produces stored ZIP archives in the layout described in [`crate::header`]:
//! one member per quiz, named after the answer, holding the question.

use crate::error::{LotooError, Result};
use crate::header::{
    CentralEntry, EndOfCentralDirectory, LocalHeader, FLAG_UTF8, METHOD_STORED,
};

/// Builder for pack archives
#[derive(Debug, Default)]
pub struct PackWriter {
    body: Vec<u8>,
    entries: Vec<CentralEntry>,
    title: Vec<u8>,
}

impl PackWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the archive comment shown as the pack title
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into().into_bytes();
        self
    }

    /// Append one quiz member
    ///
    /// `file_name` becomes the answer once its extension is stripped; `data`
    /// is the question payload.
    pub fn add_quiz(&mut self, file_name: &str, data: impl AsRef<[u8]>) -> Result<()> {
        let data = data.as_ref();
        if file_name.is_empty() || file_name.len() > u16::MAX as usize {
            return Err(LotooError::InvalidEntry(format!(
                "file name length {} out of range",
                file_name.len()
            )));
        }
        if self.entries.len() >= (u16::MAX - 1) as usize {
            return Err(LotooError::InvalidEntry(
                "too many entries for a non-zip64 archive".to_string(),
            ));
        }

        let local_header_offset = self.offset_u32(self.body.len())?;
        let size = self.offset_u32(data.len())?;

        let entry = CentralEntry {
            flags: FLAG_UTF8,
            method: METHOD_STORED,
            crc32: crc32fast::hash(data),
            compressed_size: size,
            uncompressed_size: size,
            local_header_offset,
            name_len: file_name.len() as u16,
            file_name: file_name.to_string(),
        };

        self.body.extend_from_slice(&LocalHeader::to_bytes(&entry));
        self.body.extend_from_slice(data);
        self.entries.push(entry);

        Ok(())
    }

    /// Number of members added so far
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Write the central directory and return the archive bytes
    pub fn finish(self) -> Result<Vec<u8>> {
        if self.title.len() > u16::MAX as usize {
            return Err(LotooError::InvalidEntry(
                "pack title longer than 65535 bytes".to_string(),
            ));
        }

        let mut bytes = self.body;
        let directory_offset = u32::try_from(bytes.len()).map_err(|_| too_large())?;

        for entry in &self.entries {
            bytes.extend_from_slice(&entry.to_bytes());
        }
        let directory_size =
            u32::try_from(bytes.len() - directory_offset as usize).map_err(|_| too_large())?;

        let count = self.entries.len() as u16;
        let eocd = EndOfCentralDirectory {
            disk_number: 0,
            directory_disk: 0,
            entries_on_disk: count,
            total_entries: count,
            directory_size,
            directory_offset,
            comment: self.title,
        };
        bytes.extend_from_slice(&eocd.to_bytes());

        Ok(bytes)
    }

    fn offset_u32(&self, value: usize) -> Result<u32> {
        u32::try_from(value).map_err(|_| too_large())
    }
}

fn too_large() -> LotooError {
    LotooError::InvalidEntry("pack exceeds 4 GiB without zip64".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::{read_u32, EOCD_SIGNATURE, EOCD_SIZE, LOCAL_SIGNATURE};

    #[test]
    fn test_empty_pack() {
        let bytes = PackWriter::new().finish().unwrap();
        assert_eq!(bytes.len(), EOCD_SIZE);
        assert_eq!(read_u32(&bytes, 0), EOCD_SIGNATURE);
    }

    #[test]
    fn test_layout() {
        let mut writer = PackWriter::new();
        writer.add_quiz("answer000.txt", "question000").unwrap();
        writer.add_quiz("answer001.txt", "question001").unwrap();
        assert_eq!(writer.len(), 2);

        let bytes = writer.finish().unwrap();
        assert_eq!(read_u32(&bytes, 0), LOCAL_SIGNATURE);

        let eocd = EndOfCentralDirectory::from_bytes(&bytes[bytes.len() - EOCD_SIZE..]).unwrap();
        assert_eq!(eocd.total_entries, 2);

        let directory = &bytes[eocd.directory_offset as usize..];
        let (first, consumed) = CentralEntry::from_bytes(directory).unwrap();
        assert_eq!(first.file_name, "answer000.txt");
        assert_eq!(first.local_header_offset, 0);
        assert_eq!(first.crc32, crc32fast::hash(b"question000"));

        let (second, _) = CentralEntry::from_bytes(&directory[consumed..]).unwrap();
        assert_eq!(second.local_header_offset as usize, 30 + 13 + 11);
    }

    #[test]
    fn test_rejects_empty_name() {
        let mut writer = PackWriter::new();
        assert!(writer.add_quiz("", "data").is_err());
        assert!(writer.is_empty());
    }
}
