//! Map echo: minimap summaries of chunks that are not resident.
//!
//! The echo keeps, per chunk, one color and one explored flag per tile. It
//! is filled two ways: in the background from saved chunk files, and
//! directly from a live chunk when the world map evicts it. It never reads
//! or writes the world map itself.

use std::sync::Arc;

use ahash::{AHashMap, AHashSet};
use hinterland_common::{ChunkKey, TilePos};
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::chunk::{Chunk, ChunkError, ChunkResult};
use crate::pool::WorkerPool;
use crate::record::ChunkRecord;
use crate::store::ChunkStore;
use crate::world_map::WorldMap;

/// One tile of an echo chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EchoTile {
    /// Minimap color of the terrain
    pub color: [u8; 3],
    /// Whether the player has seen the tile
    pub explored: bool,
}

/// Reduced copy of a chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EchoChunk {
    key: ChunkKey,
    size: u16,
    tiles: Vec<EchoTile>,
}

impl EchoChunk {
    /// Summarizes a live chunk.
    #[must_use]
    pub fn from_chunk(chunk: &Chunk) -> Self {
        Self {
            key: chunk.key(),
            size: chunk.size(),
            tiles: chunk
                .tiles()
                .iter()
                .map(|tile| EchoTile {
                    color: tile.terrain().color(),
                    explored: tile.is_explored(),
                })
                .collect(),
        }
    }

    /// Summarizes a persisted record without rebuilding the chunk.
    pub fn from_record(record: &ChunkRecord, size: u16) -> ChunkResult<Self> {
        let expected = usize::from(size) * usize::from(size);
        if record.tiles.len() != expected {
            return Err(ChunkError::TileCount {
                expected,
                found: record.tiles.len(),
            });
        }

        let mut tiles: Vec<Option<EchoTile>> = vec![None; expected];
        for tile in &record.tiles {
            let pos = tile.position;
            if pos.row >= size || pos.col >= size {
                return Err(ChunkError::Malformed(format!(
                    "tile {pos:?} outside a {size}x{size} grid"
                )));
            }
            tiles[pos.to_index(size)] = Some(EchoTile {
                color: tile.terrain.color(),
                explored: tile.is_explored,
            });
        }

        let tiles: Vec<EchoTile> = tiles.into_iter().flatten().collect();
        if tiles.len() != expected {
            return Err(ChunkError::Malformed(format!(
                "chunk {} repeats tile positions",
                record.id
            )));
        }
        Ok(Self {
            key: record.id,
            size,
            tiles,
        })
    }

    /// Returns the chunk key.
    #[must_use]
    pub const fn key(&self) -> ChunkKey {
        self.key
    }

    /// Returns the tiles per edge.
    #[must_use]
    pub const fn size(&self) -> u16 {
        self.size
    }

    /// Returns all tiles in row-major order.
    #[must_use]
    pub fn tiles(&self) -> &[EchoTile] {
        &self.tiles
    }

    /// Gets a tile by grid position.
    #[must_use]
    pub fn tile(&self, pos: TilePos) -> Option<EchoTile> {
        if pos.row >= self.size || pos.col >= self.size {
            return None;
        }
        self.tiles.get(pos.to_index(self.size)).copied()
    }

    /// Number of explored tiles.
    #[must_use]
    pub fn explored_count(&self) -> usize {
        self.tiles.iter().filter(|tile| tile.explored).count()
    }
}

#[derive(Debug, Default)]
struct EchoState {
    chunks: AHashMap<ChunkKey, Arc<EchoChunk>>,
    loading: AHashSet<ChunkKey>,
}

/// Shadow store of chunk summaries for the minimap.
#[derive(Debug, Clone)]
pub struct MapEcho {
    state: Arc<Mutex<EchoState>>,
    store: Arc<ChunkStore>,
    pool: Arc<WorkerPool>,
    chunk_size: u16,
}

impl MapEcho {
    /// Creates an echo and starts loading every saved chunk not in `resident`.
    pub fn new(
        store: Arc<ChunkStore>,
        pool: Arc<WorkerPool>,
        chunk_size: u16,
        resident: &[ChunkKey],
    ) -> Self {
        let echo = Self {
            state: Arc::new(Mutex::new(EchoState::default())),
            store,
            pool,
            chunk_size,
        };
        let started = echo.rescan(resident);
        debug!(started, "Map echo created");
        echo
    }

    /// Creates an echo sharing a world map's store and pool.
    #[must_use]
    pub fn for_world(world: &WorldMap) -> Self {
        Self::new(
            Arc::clone(world.store()),
            Arc::clone(world.pool()),
            world.config().chunk_size,
            &world.resident_keys(),
        )
    }

    /// Starts background loads for saved chunks that are neither resident,
    /// tracked nor already loading. Returns the number of loads started.
    ///
    /// Keys that do not fit in the worker queue are left for the next rescan.
    pub fn rescan(&self, resident: &[ChunkKey]) -> usize {
        let keys = match self.store.keys() {
            Ok(keys) => keys,
            Err(e) => {
                warn!("Map echo could not list saved chunks: {e}");
                return 0;
            },
        };
        let resident: AHashSet<ChunkKey> = resident.iter().copied().collect();

        let mut started = 0;
        for key in keys {
            if resident.contains(&key) || !self.begin_loading(key) {
                continue;
            }
            if self.spawn_load(key) {
                started += 1;
            } else {
                self.state.lock().loading.remove(&key);
                break;
            }
        }
        started
    }

    fn begin_loading(&self, key: ChunkKey) -> bool {
        let mut state = self.state.lock();
        !state.chunks.contains_key(&key) && state.loading.insert(key)
    }

    fn spawn_load(&self, key: ChunkKey) -> bool {
        let state = Arc::clone(&self.state);
        let store = Arc::clone(&self.store);
        let size = self.chunk_size;
        self.pool.try_submit(move || {
            let loaded = store.load(key).and_then(|record| match record {
                Some(record) => EchoChunk::from_record(&record, size).map(Some),
                None => Ok(None),
            });

            let mut state = state.lock();
            // A key dropped from `loading` meanwhile was superseded by a live chunk.
            if !state.loading.remove(&key) {
                return;
            }
            match loaded {
                Ok(Some(echo)) => {
                    state.chunks.entry(key).or_insert_with(|| Arc::new(echo));
                },
                Ok(None) => {},
                Err(e) => warn!(%key, "Skipping echo for chunk: {e}"),
            }
        })
    }

    /// Stores the summary of a chunk leaving the world map.
    pub fn add_chunk(&self, chunk: &Chunk) {
        let echo = Arc::new(EchoChunk::from_chunk(chunk));
        let mut state = self.state.lock();
        state.loading.remove(&chunk.key());
        state.chunks.insert(chunk.key(), echo);
    }

    /// Drops the summary of a chunk, typically because it became resident.
    pub fn remove_chunk(&self, key: ChunkKey) -> Option<Arc<EchoChunk>> {
        let mut state = self.state.lock();
        state.loading.remove(&key);
        state.chunks.remove(&key)
    }

    /// Gets a chunk summary.
    #[must_use]
    pub fn get(&self, key: ChunkKey) -> Option<Arc<EchoChunk>> {
        self.state.lock().chunks.get(&key).cloned()
    }

    /// Whether a summary is stored for the key.
    #[must_use]
    pub fn contains(&self, key: ChunkKey) -> bool {
        self.state.lock().chunks.contains_key(&key)
    }

    /// Whether a background load for the key is in flight.
    #[must_use]
    pub fn is_loading(&self, key: ChunkKey) -> bool {
        self.state.lock().loading.contains(&key)
    }

    /// Number of background loads in flight.
    #[must_use]
    pub fn loading_count(&self) -> usize {
        self.state.lock().loading.len()
    }

    /// Number of stored summaries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().chunks.len()
    }

    /// Whether no summary is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.lock().chunks.is_empty()
    }

    /// Keys of stored summaries, sorted.
    #[must_use]
    pub fn keys(&self) -> Vec<ChunkKey> {
        let mut keys: Vec<_> = self.state.lock().chunks.keys().copied().collect();
        keys.sort_unstable();
        keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::WorldGenerator;
    use std::fs;
    use std::time::Duration;
    use tempfile::TempDir;

    fn saved_world(dir: &TempDir, keys: &[ChunkKey]) -> (Arc<ChunkStore>, WorldGenerator) {
        let store = Arc::new(ChunkStore::new(dir.path()));
        let gen = WorldGenerator::with_seed(11);
        for key in keys {
            let mut chunk = gen.generate_chunk(*key);
            chunk.tile_mut(TilePos::new(0, 0)).expect("in range").mark_explored();
            store.save(&chunk.to_record()).expect("save");
        }
        (store, gen)
    }

    #[test]
    fn test_loads_saved_chunks_except_resident() {
        let dir = TempDir::new().expect("temp dir");
        let a = ChunkKey::ORIGIN;
        let b = ChunkKey::containing(512, 0, 512);
        let c = ChunkKey::containing(-512, 0, 512);
        let (store, _) = saved_world(&dir, &[a, b, c]);
        let pool = Arc::new(WorkerPool::new(2, 16).expect("pool"));

        let echo = MapEcho::new(store, Arc::clone(&pool), 16, &[b]);
        assert!(pool.wait_idle(Duration::from_secs(30)));

        assert_eq!(echo.keys(), vec![c, a]);
        assert_eq!(echo.loading_count(), 0);
        let summary = echo.get(a).expect("loaded");
        assert_eq!(summary.tiles().len(), 256);
        assert_eq!(summary.explored_count(), 1);
        assert!(summary.tile(TilePos::new(0, 0)).expect("in range").explored);

        assert_eq!(echo.rescan(&[b]), 0);
    }

    #[test]
    fn test_corrupt_files_are_skipped() {
        let dir = TempDir::new().expect("temp dir");
        let (store, _) = saved_world(&dir, &[ChunkKey::ORIGIN]);
        let bad = ChunkKey::containing(512, 512, 512);
        fs::write(store.path(bad), b"[]").expect("write");
        let pool = Arc::new(WorkerPool::new(1, 16).expect("pool"));

        let echo = MapEcho::new(store, Arc::clone(&pool), 16, &[]);
        assert!(pool.wait_idle(Duration::from_secs(30)));
        assert_eq!(echo.keys(), vec![ChunkKey::ORIGIN]);
        assert!(!echo.is_loading(bad));
    }

    #[test]
    fn test_add_and_remove_live_chunks() {
        let dir = TempDir::new().expect("temp dir");
        let store = Arc::new(ChunkStore::new(dir.path()));
        let pool = Arc::new(WorkerPool::new(1, 4).expect("pool"));
        let echo = MapEcho::new(store, pool, 16, &[]);
        assert!(echo.is_empty());

        let gen = WorldGenerator::with_seed(11);
        let chunk = gen.generate_chunk(ChunkKey::ORIGIN);
        echo.add_chunk(&chunk);
        let summary = echo.get(ChunkKey::ORIGIN).expect("added");
        assert_eq!(*summary, EchoChunk::from_chunk(&chunk));
        let first = &chunk.tiles()[0];
        assert_eq!(summary.tiles()[0].color, first.terrain().color());

        assert!(echo.remove_chunk(ChunkKey::ORIGIN).is_some());
        assert!(!echo.contains(ChunkKey::ORIGIN));
        assert_eq!(echo.len(), 0);
    }

    #[test]
    fn test_summary_from_record_matches_live_chunk() {
        let gen = WorldGenerator::with_seed(11);
        let chunk = gen.generate_chunk(ChunkKey::containing(0, -512, 512));
        let from_record = EchoChunk::from_record(&chunk.to_record(), 16).expect("summary");
        assert_eq!(from_record, EchoChunk::from_chunk(&chunk));

        let mut record = chunk.to_record();
        record.tiles[3].position = record.tiles[4].position;
        assert!(EchoChunk::from_record(&record, 16).is_err());
    }
}
