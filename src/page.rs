//! Page blocks and the page allocation capability
//!
//! Every byte the page cache keeps resident lives in a [`Page`], a block
//! obtained from a caller-supplied [`PageAllocator`]. Pages hand their block
//! back to the allocator when dropped, so tearing down a pack (or the whole
//! context) releases all of its memory through the same capability that
//! produced it.

use crate::error::{LotooError, Result};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Page size used by [`HeapPageAllocator::default`]
pub const DEFAULT_PAGE_SIZE: usize = 4096;

/// Page allocation capability
///
/// The page size is fixed for the allocator's lifetime. `allocate` must return
/// a block of at least `size` bytes, where `size` is always a multiple of
/// [`page_size`](PageAllocator::page_size).
pub trait PageAllocator: Send + Sync {
    /// Granularity of every allocation (a power of two)
    fn page_size(&self) -> usize;

    /// Allocate a zeroed block of `size` bytes
    fn allocate(&self, size: usize) -> Result<Box<[u8]>>;

    /// Return a block previously produced by `allocate`
    fn free(&self, block: Box<[u8]>);
}

/// Round `size` up to the next multiple of `page_size`
pub fn round_to_page(size: usize, page_size: usize) -> usize {
    debug_assert!(page_size.is_power_of_two());
    (size + page_size - 1) & !(page_size - 1)
}

/// Check that an allocator's page size is usable
pub fn validate_page_size(page_size: usize) -> Result<()> {
    if page_size == 0 || !page_size.is_power_of_two() {
        return Err(LotooError::Config(format!(
            "page size must be a positive power of two, got {}",
            page_size
        )));
    }
    Ok(())
}

/// General-purpose heap allocator used when the caller supplies none
#[derive(Debug)]
pub struct HeapPageAllocator {
    page_size: usize,
    live_blocks: AtomicUsize,
}

impl HeapPageAllocator {
    /// Create a heap allocator with a custom page size
    pub fn new(page_size: usize) -> Result<Self> {
        validate_page_size(page_size)?;
        Ok(HeapPageAllocator {
            page_size,
            live_blocks: AtomicUsize::new(0),
        })
    }

    /// Number of blocks handed out and not yet freed
    pub fn live_blocks(&self) -> usize {
        self.live_blocks.load(Ordering::Relaxed)
    }
}

impl Default for HeapPageAllocator {
    fn default() -> Self {
        HeapPageAllocator {
            page_size: DEFAULT_PAGE_SIZE,
            live_blocks: AtomicUsize::new(0),
        }
    }
}

impl PageAllocator for HeapPageAllocator {
    fn page_size(&self) -> usize {
        self.page_size
    }

    fn allocate(&self, size: usize) -> Result<Box<[u8]>> {
        let rounded = round_to_page(size, self.page_size);
        if rounded == 0 {
            return Err(LotooError::Allocation(
                "zero-sized page allocation".to_string(),
            ));
        }
        self.live_blocks.fetch_add(1, Ordering::Relaxed);
        Ok(vec![0u8; rounded].into_boxed_slice())
    }

    fn free(&self, block: Box<[u8]>) {
        self.live_blocks.fetch_sub(1, Ordering::Relaxed);
        drop(block);
    }
}

/// One resident page of source bytes
///
/// `len` is the number of valid bytes; it is only shorter than the block for
/// the final page of a source.
pub struct Page {
    block: Option<Box<[u8]>>,
    len: usize,
    allocator: Arc<dyn PageAllocator>,
}

impl Page {
    /// Allocate one empty page from `allocator`
    pub fn allocate(allocator: &Arc<dyn PageAllocator>) -> Result<Self> {
        let page_size = allocator.page_size();
        let block = allocator.allocate(page_size)?;
        if block.len() < page_size {
            let got = block.len();
            allocator.free(block);
            return Err(LotooError::Allocation(format!(
                "allocator returned {} bytes for a {} byte page",
                got, page_size
            )));
        }

        Ok(Page {
            block: Some(block),
            len: 0,
            allocator: Arc::clone(allocator),
        })
    }

    /// Valid bytes of the page
    pub fn data(&self) -> &[u8] {
        match &self.block {
            Some(block) => &block[..self.len],
            None => &[],
        }
    }

    /// Whole writable block, used while faulting the page in
    pub(crate) fn block_mut(&mut self) -> &mut [u8] {
        match &mut self.block {
            Some(block) => &mut block[..],
            None => &mut [],
        }
    }

    pub(crate) fn set_len(&mut self, len: usize) {
        self.len = len.min(self.capacity());
    }

    /// Number of valid bytes
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Size of the underlying block
    pub fn capacity(&self) -> usize {
        self.block.as_ref().map_or(0, |b| b.len())
    }
}

impl Drop for Page {
    fn drop(&mut self) {
        if let Some(block) = self.block.take() {
            self.allocator.free(block);
        }
    }
}

impl std::fmt::Debug for Page {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Page")
            .field("len", &self.len)
            .field("capacity", &self.capacity())
            .finish()
    }
}
