//! Byte sources that packs are loaded from
//!
//! The engine never assumes a stream cursor: every read names its own offset,
//! so the same source can be shared by the page cache of one pack across
//! threads. Short reads are allowed; a zero-length read before
//! [`ByteSource::total_size`] is treated as a transport failure by the cache.

use crate::error::Result;
use memmap2::{Mmap, MmapOptions};
use parking_lot::Mutex;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Read-by-offset capability
pub trait ByteSource: Send + Sync {
    /// Read up to `buf.len()` bytes starting at `offset`
    ///
    /// Returns the number of bytes read. Zero means end of data.
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize>;

    /// Declared size of the source in bytes
    fn total_size(&self) -> u64;
}

/// In-memory byte source
///
/// `max_read` caps how many bytes a single call returns, which lets tests
/// exercise the cache's short-read handling.
#[derive(Debug, Clone)]
pub struct MemorySource {
    bytes: Arc<[u8]>,
    max_read: usize,
}

impl MemorySource {
    pub fn new(bytes: impl Into<Arc<[u8]>>) -> Self {
        MemorySource {
            bytes: bytes.into(),
            max_read: usize::MAX,
        }
    }

    /// Limit each `read_at` call to at most `max_read` bytes
    pub fn with_max_read(mut self, max_read: usize) -> Self {
        self.max_read = max_read.max(1);
        self
    }
}

impl ByteSource for MemorySource {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        let len = self.bytes.len() as u64;
        if offset >= len {
            return Ok(0);
        }
        let start = offset as usize;
        let n = buf.len().min(self.bytes.len() - start).min(self.max_read);
        buf[..n].copy_from_slice(&self.bytes[start..start + n]);
        Ok(n)
    }

    fn total_size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// File-backed byte source
///
/// The file handle sits behind a mutex so positioned reads stay atomic when
/// the pack is queried from several threads.
#[derive(Debug)]
pub struct FileSource {
    file: Mutex<File>,
    path: PathBuf,
    total_size: u64,
}

impl FileSource {
    /// Open a pack file for reading
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(&path)?;
        let total_size = file.metadata()?.len();

        Ok(FileSource {
            file: Mutex::new(file),
            path: path.as_ref().to_path_buf(),
            total_size,
        })
    }

    /// Get file path
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ByteSource for FileSource {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(offset))?;
        Ok(file.read(buf)?)
    }

    fn total_size(&self) -> u64 {
        self.total_size
    }
}

/// Memory-mapped file source
#[derive(Debug)]
pub struct MmapSource {
    mmap: Mmap,
}

impl MmapSource {
    /// Map a pack file read-only
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(&path)?;

        // SAFETY: read-only mapping; the pack file is not modified while loaded
        let mmap = unsafe { MmapOptions::new().map(&file)? };

        Ok(MmapSource { mmap })
    }
}

impl ByteSource for MmapSource {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        let len = self.mmap.len() as u64;
        if offset >= len {
            return Ok(0);
        }
        let start = offset as usize;
        let n = buf.len().min(self.mmap.len() - start);
        buf[..n].copy_from_slice(&self.mmap[start..start + n]);
        Ok(n)
    }

    fn total_size(&self) -> u64 {
        self.mmap.len() as u64
    }
}
