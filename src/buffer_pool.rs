//! Lazily-faulted page cache over a [`ByteSource`]
//!
//! Reads are split into page-aligned chunks. A chunk that is not resident is
//! faulted in by allocating one page from the [`PageAllocator`] and filling
//! it from the source at the chunk's aligned offset, retrying on short reads
//! until the page is full or the source ends.
//!
//! By default pages stay resident for the lifetime of the cache. When a
//! resident-page cap is configured, least-recently-used pages are evicted
//! and transparently refetched on the next access.

use crate::error::{LotooError, Result};
use crate::io::ByteSource;
use crate::page::{Page, PageAllocator};
use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::ops::Deref;
use std::sync::Arc;
use tracing::debug;

/// Page cache statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageCacheStats {
    /// Page lookups served from resident pages
    pub hits: u64,
    /// Page lookups that required a fault
    pub misses: u64,
    /// Source reads issued while faulting (includes short-read retries)
    pub source_reads: u64,
    /// Pages dropped to honor the resident-page cap
    pub evictions: u64,
    /// Pages currently resident
    pub resident_pages: usize,
    /// Page size of the backing allocator
    pub page_size: usize,
}

impl PageCacheStats {
    /// Calculate hit rate as a percentage
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }
}

/// Bytes returned by [`PageCache::fetch`]
///
/// A range inside one page borrows that page; a range crossing a page
/// boundary is copied into a scratch buffer.
#[derive(Debug, Clone)]
pub enum CacheView {
    Page {
        page: Arc<Page>,
        start: usize,
        end: usize,
    },
    Scratch(Vec<u8>),
}

impl Deref for CacheView {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            CacheView::Page { page, start, end } => &page.data()[*start..*end],
            CacheView::Scratch(bytes) => bytes,
        }
    }
}

impl AsRef<[u8]> for CacheView {
    fn as_ref(&self) -> &[u8] {
        self
    }
}

struct CacheState {
    pages: LruCache<u64, Arc<Page>>,
    hits: u64,
    misses: u64,
    source_reads: u64,
    evictions: u64,
}

/// Paged cache over one byte source
pub struct PageCache {
    source: Box<dyn ByteSource>,
    allocator: Arc<dyn PageAllocator>,
    page_size: usize,
    total_size: u64,
    state: Mutex<CacheState>,
}

impl PageCache {
    /// Create a cache; `max_resident_pages = None` keeps every faulted page
    pub fn new(
        source: Box<dyn ByteSource>,
        allocator: Arc<dyn PageAllocator>,
        max_resident_pages: Option<NonZeroUsize>,
    ) -> Self {
        let page_size = allocator.page_size();
        let total_size = source.total_size();
        let pages = match max_resident_pages {
            Some(cap) => LruCache::new(cap),
            None => LruCache::unbounded(),
        };

        PageCache {
            source,
            allocator,
            page_size,
            total_size,
            state: Mutex::new(CacheState {
                pages,
                hits: 0,
                misses: 0,
                source_reads: 0,
                evictions: 0,
            }),
        }
    }

    /// Declared size of the underlying source
    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Read `len` bytes at `offset`
    ///
    /// Fails with [`LotooError::Truncated`] when the range runs past the
    /// source's declared size.
    pub fn fetch(&self, offset: u64, len: usize) -> Result<CacheView> {
        let end = self.check_range("read", offset, len)?;
        if len == 0 {
            return Ok(CacheView::Scratch(Vec::new()));
        }

        let page_size = self.page_size as u64;
        let first_page = offset / page_size;
        let last_page = (end - 1) / page_size;

        if first_page == last_page {
            let page = self.page(first_page)?;
            let start = (offset - first_page * page_size) as usize;
            return Ok(CacheView::Page {
                page,
                start,
                end: start + len,
            });
        }

        let mut scratch = Vec::with_capacity(len);
        for page_id in first_page..=last_page {
            let page = self.page(page_id)?;
            let page_start = page_id * page_size;
            let from = offset.max(page_start) - page_start;
            let to = end.min(page_start + page_size) - page_start;
            scratch.extend_from_slice(&page.data()[from as usize..to as usize]);
        }

        Ok(CacheView::Scratch(scratch))
    }

    /// Copy `buf.len()` bytes at `offset` into `buf`
    pub fn read_into(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        let view = self.fetch(offset, buf.len())?;
        buf.copy_from_slice(&view);
        Ok(())
    }

    /// Fault in every page covering the range without returning its bytes
    pub fn prewarm(&self, offset: u64, len: usize) -> Result<()> {
        let end = self.check_range("prewarm", offset, len)?;
        if len == 0 {
            return Ok(());
        }
        let page_size = self.page_size as u64;
        for page_id in offset / page_size..=(end - 1) / page_size {
            self.page(page_id)?;
        }
        Ok(())
    }

    /// Get cache statistics
    pub fn stats(&self) -> PageCacheStats {
        let state = self.state.lock();
        PageCacheStats {
            hits: state.hits,
            misses: state.misses,
            source_reads: state.source_reads,
            evictions: state.evictions,
            resident_pages: state.pages.len(),
            page_size: self.page_size,
        }
    }

    /// Release every resident page back to the allocator
    pub fn clear(&self) {
        let mut state = self.state.lock();
        let released = state.pages.len();
        state.pages.clear();
        debug!("Released {} cached pages", released);
    }

    fn check_range(&self, what: &'static str, offset: u64, len: usize) -> Result<u64> {
        match offset.checked_add(len as u64) {
            Some(end) if end <= self.total_size => Ok(end),
            _ => Err(LotooError::Truncated {
                what,
                offset,
                end: offset.saturating_add(len as u64),
                total_size: self.total_size,
            }),
        }
    }

    /// Get a resident page, faulting it in on a miss
    fn page(&self, page_id: u64) -> Result<Arc<Page>> {
        let mut state = self.state.lock();

        if let Some(page) = state.pages.get(&page_id) {
            let page = Arc::clone(page);
            state.hits += 1;
            return Ok(page);
        }

        state.misses += 1;
        let (page, reads) = self.fault(page_id)?;
        state.source_reads += reads;

        let page = Arc::new(page);
        if let Some((evicted_id, _)) = state.pages.push(page_id, Arc::clone(&page)) {
            if evicted_id != page_id {
                state.evictions += 1;
                debug!("Evicted page {} to make room for page {}", evicted_id, page_id);
            }
        }

        Ok(page)
    }

    /// Allocate a page and fill it from the source
    fn fault(&self, page_id: u64) -> Result<(Page, u64)> {
        let start = page_id * self.page_size as u64;
        let want = (self.total_size - start).min(self.page_size as u64) as usize;

        let mut page = Page::allocate(&self.allocator)?;
        let mut filled = 0usize;
        let mut reads = 0u64;

        {
            let block = page.block_mut();
            while filled < want {
                let offset = start + filled as u64;
                let n = self.source.read_at(offset, &mut block[filled..want])?;
                reads += 1;
                if n == 0 {
                    return Err(LotooError::SourceRead {
                        offset,
                        total_size: self.total_size,
                    });
                }
                filled += n;
            }
        }
        page.set_len(filled);

        debug!(
            "Faulted page {} ({} bytes at offset {}, {} reads)",
            page_id, filled, start, reads
        );

        Ok((page, reads))
    }
}

impl std::fmt::Debug for PageCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageCache")
            .field("page_size", &self.page_size)
            .field("total_size", &self.total_size)
            .field("stats", &self.stats())
            .finish()
    }
}
