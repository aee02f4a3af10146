//! Loaded quiz packs
//!
//! Loading a pack reads only the container's directory through the page
//! cache. Quiz names are kept in memory because cards and games are built
//! from them; quiz payloads stay in the source and are fetched (and
//! checksum-verified) when [`Pack::quiz`] asks for them.

use crate::buffer_pool::{PageCache, PageCacheStats};
use crate::card::{Card, CardType};
use crate::config::ContextConfig;
use crate::error::{LotooError, Result};
use crate::header::{CentralEntry, EndOfCentralDirectory, LocalHeader, LOCAL_HEADER_SIZE};
use crate::io::ByteSource;
use crate::page::PageAllocator;
use ahash::AHashSet;
use serde::Serialize;
use std::sync::{Arc, OnceLock};
use tracing::{debug, info, warn};
use xxhash_rust::xxh3::xxh3_64;

/// Content identifier of a pack (xxh3-64 of its central directory)
pub type PackId = u64;

/// One question/answer unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Quiz {
    /// Answer shown on card squares
    pub name: Arc<str>,
    /// Question payload (opaque bytes)
    pub data: Vec<u8>,
}

impl Quiz {
    pub fn data_len(&self) -> usize {
        self.data.len()
    }
}

/// Directory record of one quiz
#[derive(Debug)]
struct QuizEntry {
    name: Arc<str>,
    local_header_offset: u64,
    data_len: u32,
    crc32: u32,
    /// Absolute data offset, resolved from the local header on first read
    data_offset: OnceLock<u64>,
}

/// A loaded, read-only pack
#[derive(Debug)]
pub struct Pack {
    id: PackId,
    title: String,
    cache: PageCache,
    entries: Vec<QuizEntry>,
    /// First occurrence of every distinct quiz name, in pack order
    distinct_names: Vec<Arc<str>>,
    verify_checksums: bool,
}

impl Pack {
    /// Parse a pack from `source`, caching its pages through `allocator`
    pub fn load(
        source: Box<dyn ByteSource>,
        allocator: Arc<dyn PageAllocator>,
        config: &ContextConfig,
    ) -> Result<Self> {
        let cache = PageCache::new(source, allocator, config.resident_page_cap());
        let total_size = cache.total_size();

        let (eocd_offset, eocd) =
            EndOfCentralDirectory::locate(&cache, config.eocd_search_limit)?;

        let directory_offset = eocd.directory_offset as u64;
        let directory_end = directory_offset + eocd.directory_size as u64;
        if directory_end > eocd_offset {
            return Err(LotooError::Truncated {
                what: "central directory",
                offset: directory_offset,
                end: directory_end,
                total_size,
            });
        }

        let directory = cache.fetch(directory_offset, eocd.directory_size as usize)?;
        let id = xxh3_64(&directory);

        let mut entries = Vec::with_capacity(eocd.total_entries as usize);
        let mut seen = AHashSet::new();
        let mut distinct_names = Vec::new();
        let mut pos = 0usize;

        for _ in 0..eocd.total_entries {
            let (entry, consumed) = CentralEntry::from_bytes(&directory[pos..])?;
            pos += consumed;

            if entry.is_directory() {
                continue;
            }
            entry.validate()?;

            let local = entry.local_header_offset as u64;
            let header_end = local + LOCAL_HEADER_SIZE as u64 + entry.name_len as u64;
            let data_end = header_end + entry.compressed_size as u64;
            if data_end > directory_offset {
                return Err(LotooError::Truncated {
                    what: "quiz data",
                    offset: local,
                    end: data_end,
                    total_size,
                });
            }

            let name: Arc<str> = Arc::from(entry.quiz_name()?);
            if seen.insert(Arc::clone(&name)) {
                distinct_names.push(Arc::clone(&name));
            }

            entries.push(QuizEntry {
                name,
                local_header_offset: local,
                data_len: entry.compressed_size,
                crc32: entry.crc32,
                data_offset: OnceLock::new(),
            });
        }

        let title = String::from_utf8_lossy(&eocd.comment).into_owned();

        info!(
            "Loaded pack {:016x} ({} quizzes, {} distinct names, {} bytes)",
            id,
            entries.len(),
            distinct_names.len(),
            total_size
        );

        Ok(Pack {
            id,
            title,
            cache,
            entries,
            distinct_names,
            verify_checksums: config.verify_checksums,
        })
    }

    /// Content identifier
    pub fn id(&self) -> PackId {
        self.id
    }

    /// Archive comment, used as the pack's display title
    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn quiz_count(&self) -> u32 {
        self.entries.len() as u32
    }

    /// Number of distinct quiz names available to cards
    pub fn distinct_name_count(&self) -> usize {
        self.distinct_names.len()
    }

    /// Name of quiz `index` without touching its payload
    pub fn quiz_name(&self, index: u32) -> Result<&Arc<str>> {
        self.entry(index).map(|entry| &entry.name)
    }

    /// Read quiz `index` (name and payload)
    pub fn quiz(&self, index: u32) -> Result<Quiz> {
        let entry = self.entry(index)?;
        let offset = self.data_offset(entry)?;
        let data = self.cache.fetch(offset, entry.data_len as usize)?.to_vec();

        if self.verify_checksums && crc32fast::hash(&data) != entry.crc32 {
            warn!("CRC-32 mismatch for quiz {} ('{}')", index, entry.name);
            return Err(LotooError::ChecksumMismatch {
                name: entry.name.to_string(),
            });
        }

        Ok(Quiz {
            name: Arc::clone(&entry.name),
            data,
        })
    }

    /// Derive card `index` of the given type
    pub fn card(&self, card_type: CardType, index: u32) -> Result<Card> {
        let card = Card::generate(self.id, &self.distinct_names, card_type, index)?;
        debug!("Generated {:?} card {} from pack {:016x}", card_type, index, self.id);
        Ok(card)
    }

    /// Fault in every page of the source
    ///
    /// After this, reads no longer reach the byte source (unless a
    /// resident-page cap forces evictions).
    pub fn prewarm(&self) -> Result<()> {
        self.cache.prewarm(0, self.cache.total_size() as usize)
    }

    pub fn cache_stats(&self) -> PageCacheStats {
        self.cache.stats()
    }

    /// Release all cached pages; they are refetched on demand
    pub fn release_pages(&self) {
        self.cache.clear();
    }

    pub(crate) fn names(&self) -> impl Iterator<Item = &Arc<str>> {
        self.entries.iter().map(|entry| &entry.name)
    }

    fn entry(&self, index: u32) -> Result<&QuizEntry> {
        self.entries
            .get(index as usize)
            .ok_or(LotooError::IndexOutOfRange {
                index,
                count: self.quiz_count(),
            })
    }

    fn data_offset(&self, entry: &QuizEntry) -> Result<u64> {
        if let Some(offset) = entry.data_offset.get() {
            return Ok(*offset);
        }

        let bytes = self
            .cache
            .fetch(entry.local_header_offset, LOCAL_HEADER_SIZE)?;
        let header = LocalHeader::from_bytes(&bytes)?;
        let offset = entry.local_header_offset + header.data_offset();

        let end = offset + entry.data_len as u64;
        if end > self.cache.total_size() {
            return Err(LotooError::Truncated {
                what: "quiz data",
                offset,
                end,
                total_size: self.cache.total_size(),
            });
        }

        Ok(*entry.data_offset.get_or_init(|| offset))
    }
}
