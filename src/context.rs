//! Engine context: owner of packs, games and the page allocator
//!
//! Packs and games are addressed by opaque handles. Handles are never
//! reused, so a handle that outlives its object is reported as
//! [`LotooError::StaleHandle`] instead of reaching another object.

use crate::card::CardType;
use crate::config::ContextConfig;
use crate::error::{LotooError, Result};
use crate::game::{Game, Seed};
use crate::io::{ByteSource, FileSource};
use crate::pack::Pack;
use crate::page::{validate_page_size, HeapPageAllocator, PageAllocator};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Handle to a pack owned by a [`Context`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PackHandle(u64);

/// Handle to a game owned by a [`Context`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GameHandle(u64);

impl PackHandle {
    pub fn id(self) -> u64 {
        self.0
    }
}

impl GameHandle {
    pub fn id(self) -> u64 {
        self.0
    }
}

impl fmt::Display for PackHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pack#{}", self.0)
    }
}

impl fmt::Display for GameHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "game#{}", self.0)
    }
}

/// Live object counts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ContextStats {
    pub packs: usize,
    pub games: usize,
    /// Pages resident across all packs
    pub resident_pages: usize,
}

struct GameSlot {
    game: Game,
    pack: PackHandle,
}

/// Engine context
///
/// Owns every pack and game created through it; dropping or
/// [closing](Context::close) the context releases them and all their pages.
pub struct Context {
    config: ContextConfig,
    allocator: Arc<dyn PageAllocator>,
    packs: HashMap<PackHandle, Arc<Pack>>,
    games: HashMap<GameHandle, GameSlot>,
    next_handle: u64,
}

impl Context {
    /// Create a context with the default heap allocator and configuration
    pub fn new() -> Self {
        Context {
            config: ContextConfig::default(),
            allocator: Arc::new(HeapPageAllocator::default()),
            packs: HashMap::new(),
            games: HashMap::new(),
            next_handle: 1,
        }
    }

    /// Create a context over a caller-supplied page allocator
    pub fn with_allocator(allocator: Arc<dyn PageAllocator>) -> Result<Self> {
        Self::with_config(ContextConfig::default(), Some(allocator))
    }

    /// Create a context with explicit configuration
    ///
    /// `allocator = None` selects the default heap allocator.
    pub fn with_config(
        config: ContextConfig,
        allocator: Option<Arc<dyn PageAllocator>>,
    ) -> Result<Self> {
        config.validate()?;
        let allocator = match allocator {
            Some(allocator) => allocator,
            None => Arc::new(HeapPageAllocator::default()),
        };
        validate_page_size(allocator.page_size())?;

        info!(
            "Creating context (page size {}, resident page cap {:?})",
            allocator.page_size(),
            config.max_resident_pages
        );

        Ok(Context {
            config,
            allocator,
            packs: HashMap::new(),
            games: HashMap::new(),
            next_handle: 1,
        })
    }

    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    /// Load a pack from any byte source
    pub fn load_pack<S>(&mut self, source: S) -> Result<PackHandle>
    where
        S: ByteSource + 'static,
    {
        let pack = Pack::load(Box::new(source), Arc::clone(&self.allocator), &self.config)?;
        let handle = PackHandle(self.allocate_handle());
        info!("Registered pack {:016x} as {}", pack.id(), handle);
        self.packs.insert(handle, Arc::new(pack));
        Ok(handle)
    }

    /// Load a pack file from disk
    pub fn load_pack_file<P: AsRef<Path>>(&mut self, path: P) -> Result<PackHandle> {
        info!("Loading pack file {:?}", path.as_ref());
        let source = FileSource::open(path)?;
        self.load_pack(source)
    }

    /// Get a live pack
    pub fn pack(&self, handle: PackHandle) -> Result<&Pack> {
        self.packs
            .get(&handle)
            .map(|pack| pack.as_ref())
            .ok_or(LotooError::StaleHandle(handle.0))
    }

    /// Release a pack and its pages
    ///
    /// Fails with [`LotooError::PackInUse`] while games started from the
    /// pack are still live.
    pub fn unload_pack(&mut self, handle: PackHandle) -> Result<()> {
        if !self.packs.contains_key(&handle) {
            return Err(LotooError::StaleHandle(handle.0));
        }
        if self.games.values().any(|slot| slot.pack == handle) {
            return Err(LotooError::PackInUse(handle.0));
        }

        self.packs.remove(&handle);
        info!("Unloaded {}", handle);
        Ok(())
    }

    /// Start a game over a live pack
    pub fn start_game(
        &mut self,
        pack: PackHandle,
        card_type: CardType,
        seed: Seed,
    ) -> Result<GameHandle> {
        let game = {
            let pack_ref = self
                .packs
                .get(&pack)
                .ok_or(LotooError::StaleHandle(pack.0))?;
            Game::start(pack_ref, card_type, seed)
        };

        let handle = GameHandle(self.allocate_handle());
        debug!("Registered {} over {}", handle, pack);
        self.games.insert(handle, GameSlot { game, pack });
        Ok(handle)
    }

    /// Get a live game
    pub fn game(&self, handle: GameHandle) -> Result<&Game> {
        self.games
            .get(&handle)
            .map(|slot| &slot.game)
            .ok_or(LotooError::StaleHandle(handle.0))
    }

    /// End a game; its pack is unaffected
    pub fn end_game(&mut self, handle: GameHandle) -> Result<()> {
        if self.games.remove(&handle).is_none() {
            return Err(LotooError::StaleHandle(handle.0));
        }
        debug!("Ended {}", handle);
        Ok(())
    }

    pub fn stats(&self) -> ContextStats {
        ContextStats {
            packs: self.packs.len(),
            games: self.games.len(),
            resident_pages: self
                .packs
                .values()
                .map(|pack| pack.cache_stats().resident_pages)
                .sum(),
        }
    }

    /// Tear down the context, releasing every game, pack and page
    pub fn close(mut self) {
        self.release_all();
    }

    fn release_all(&mut self) {
        if self.packs.is_empty() && self.games.is_empty() {
            return;
        }
        let stats = self.stats();
        self.games.clear();
        self.packs.clear();
        info!(
            "Released {} games, {} packs and {} pages",
            stats.games, stats.packs, stats.resident_pages
        );
    }

    fn allocate_handle(&mut self) -> u64 {
        let handle = self.next_handle;
        self.next_handle += 1;
        handle
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Context {
    fn drop(&mut self) {
        self.release_all();
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("config", &self.config)
            .field("page_size", &self.allocator.page_size())
            .field("stats", &self.stats())
            .finish()
    }
}
