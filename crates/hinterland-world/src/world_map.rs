//! The world map: streams chunks in and out around the player.
//!
//! ```text
//! Absent ──update──▶ Generating ──worker──▶ Resident ──evict──▶ Absent
//!                        │
//!                        └──load error──▶ Absent (+ ChunkLoadFailure)
//! ```
//!
//! The registry is the only locked structure. Loading, generation and
//! deserialization run on the worker pool outside the lock; a worker takes
//! the lock once, to move its key from `Generating` to `Resident`.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use ahash::AHashSet;
use hinterland_common::{ChunkKey, WorldCoord, WorldRect};
use parking_lot::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

use crate::chunk::{Chunk, ChunkError, ChunkResult};
use crate::config::WorldConfig;
use crate::generation::WorldGenerator;
use crate::map_echo::MapEcho;
use crate::object::WorldObject;
use crate::pool::WorkerPool;
use crate::registry::{ChunkLoadFailure, ChunkRegistry, ChunkState};
use crate::store::ChunkStore;

/// What one call to [`WorldMap::resolve_pending`] did.
#[derive(Debug, Default)]
pub struct FrameReport {
    /// Resident chunks after the call
    pub resident: usize,
    /// Keys still in flight
    pub generating: usize,
    /// Textures resolved by edge reconciliation
    pub textures_resolved: usize,
    /// Loads that failed since the previous call
    pub failures: Vec<ChunkLoadFailure>,
}

/// What one call to [`WorldMap::evict_distant`] did.
#[derive(Debug, Default)]
pub struct EvictionReport {
    /// Chunks saved and unloaded
    pub evicted: Vec<ChunkKey>,
    /// Persistent actors handed back from unloaded chunks
    pub survivors: Vec<WorldObject>,
    /// Chunks kept resident because saving them failed
    pub failed_saves: Vec<ChunkKey>,
}

/// Chunk streaming around the player.
#[derive(Debug)]
pub struct WorldMap {
    config: Arc<WorldConfig>,
    generator: Arc<WorldGenerator>,
    store: Arc<ChunkStore>,
    registry: Arc<Mutex<ChunkRegistry>>,
    pool: Arc<WorkerPool>,
}

impl WorldMap {
    /// Creates a world map for a save directory. The config is validated first.
    pub fn new(mut config: WorldConfig, save_dir: impl AsRef<Path>) -> ChunkResult<Self> {
        config.validate();
        let config = Arc::new(config);
        let pool = WorkerPool::new(config.worker_threads, config.queue_capacity)?;
        let store = ChunkStore::new(save_dir);

        info!(
            seed = config.seed,
            chunk_size = config.chunk_size,
            tile_size = config.tile_size,
            dir = %store.dir().display(),
            "World map created"
        );

        Ok(Self {
            registry: Arc::new(Mutex::new(ChunkRegistry::new(config.span(), config.tile_px()))),
            generator: Arc::new(WorldGenerator::new(Arc::clone(&config))),
            store: Arc::new(store),
            pool: Arc::new(pool),
            config,
        })
    }

    /// Returns the validated configuration.
    #[must_use]
    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    /// Returns the shared generator.
    #[must_use]
    pub fn generator(&self) -> &Arc<WorldGenerator> {
        &self.generator
    }

    /// Returns the chunk store.
    #[must_use]
    pub fn store(&self) -> &Arc<ChunkStore> {
        &self.store
    }

    /// Returns the worker pool.
    #[must_use]
    pub fn pool(&self) -> &Arc<WorkerPool> {
        &self.pool
    }

    /// Locks the registry for reading or editing resident chunks.
    ///
    /// Hold the guard briefly: workers need it to publish finished chunks.
    pub fn registry(&self) -> MutexGuard<'_, ChunkRegistry> {
        self.registry.lock()
    }

    /// Top-left corner of the chunk containing `(x, y)`.
    #[must_use]
    pub fn get_chunk_coords(&self, x: i64, y: i64) -> WorldCoord {
        self.get_chunk_key(x, y).origin()
    }

    /// Key of the chunk containing `(x, y)`.
    #[must_use]
    pub fn get_chunk_key(&self, x: i64, y: i64) -> ChunkKey {
        ChunkKey::containing(x, y, self.config.span())
    }

    /// Current state of a key.
    #[must_use]
    pub fn state(&self, key: ChunkKey) -> ChunkState {
        self.registry.lock().state(key)
    }

    /// Keys of all resident chunks.
    #[must_use]
    pub fn resident_keys(&self) -> Vec<ChunkKey> {
        self.registry.lock().keys().collect()
    }

    /// The screen-sized rectangle centered on the player.
    #[must_use]
    pub fn viewport(&self, player: WorldCoord) -> WorldRect {
        WorldRect::from_center(
            player,
            i64::from(self.config.window_width),
            i64::from(self.config.window_height),
        )
    }

    /// Keys of every chunk intersecting the viewport grown by `buffer` pixels.
    ///
    /// Row-major, top-left first.
    #[must_use]
    pub fn get_visible_chunks(&self, player: WorldCoord, buffer: i64) -> Vec<ChunkKey> {
        keys_covering(self.viewport(player).expanded(buffer), self.config.span())
    }

    /// Requests every visible absent chunk. Never blocks.
    ///
    /// Returns the number of jobs submitted.
    pub fn update(&self, player: WorldCoord) -> usize {
        self.get_visible_chunks(player, self.config.visibility_buffer)
            .into_iter()
            .filter(|key| self.request(*key))
            .count()
    }

    /// Starts loading or generating a chunk if it is absent.
    ///
    /// Returns `true` if this call submitted a job. When the worker queue is
    /// full the key goes back to `Absent` and a later call retries it.
    pub fn request(&self, key: ChunkKey) -> bool {
        if !self.registry.lock().begin_generating(key) {
            return false;
        }

        let generator = Arc::clone(&self.generator);
        let store = Arc::clone(&self.store);
        let registry = Arc::clone(&self.registry);
        let submitted = self.pool.try_submit(move || {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| produce(&generator, &store, key)))
                .unwrap_or_else(|payload| Err(ChunkError::Panicked(panic_message(&*payload))));
            let mut registry = registry.lock();
            match outcome {
                Ok(chunk) => {
                    registry.complete(chunk);
                },
                Err(error) => registry.fail(key, error),
            }
        });

        if submitted {
            debug!(%key, "Chunk requested");
        } else {
            self.registry.lock().abandon(key);
            debug!(%key, "Worker queue full, retrying later");
        }
        submitted
    }

    /// Per-frame bookkeeping: reconciles textures along the edges of newly
    /// resident chunks and drains load failures.
    pub fn resolve_pending(&self) -> FrameReport {
        let mut registry = self.registry.lock();
        let textures_resolved = registry.resolve_deferred();
        FrameReport {
            resident: registry.len(),
            generating: registry.generating_count(),
            textures_resolved,
            failures: registry.take_failures(),
        }
    }

    /// Marks the tiles under the viewport explored. Returns tiles newly explored.
    pub fn explore(&self, player: WorldCoord) -> usize {
        let view = self.viewport(player);
        self.registry.lock().explore(view)
    }

    /// Saves and unloads resident chunks outside the keep-alive area.
    ///
    /// The keep-alive area is the loaded area grown by `eviction_distance`,
    /// so a chunk is never evicted while it is still visible. Removal
    /// happens under the lock; saving and unloading happen outside it.
    /// A chunk whose save fails is put back and reported. Call from the main
    /// loop, never concurrently with [`request`](Self::request) for the same
    /// keys.
    pub fn evict_distant(&self, player: WorldCoord, echo: Option<&MapEcho>) -> EvictionReport {
        let keep: AHashSet<ChunkKey> = self
            .get_visible_chunks(
                player,
                self.config.visibility_buffer + self.config.eviction_distance,
            )
            .into_iter()
            .collect();

        let removed: Vec<Chunk> = {
            let mut registry = self.registry.lock();
            registry
                .keys_outside(&keep)
                .into_iter()
                .filter_map(|key| registry.remove(key))
                .collect()
        };

        let mut report = EvictionReport::default();
        for chunk in removed {
            let key = chunk.key();
            if chunk.is_dirty() {
                if let Err(e) = self.store.save(&chunk.to_record()) {
                    warn!(%key, "Failed to save evicted chunk: {e}");
                    self.registry.lock().restore(chunk);
                    report.failed_saves.push(key);
                    continue;
                }
            }
            if let Some(echo) = echo {
                echo.add_chunk(&chunk);
            }
            report.survivors.extend(chunk.unload());
            report.evicted.push(key);
        }

        if !report.evicted.is_empty() {
            debug!(evicted = report.evicted.len(), "Evicted distant chunks");
        }
        report
    }

    /// Persists every dirty resident chunk. Returns the number saved.
    ///
    /// Records are taken under the lock and written outside it.
    pub fn save_all(&self) -> ChunkResult<usize> {
        let records: Vec<_> = {
            let registry = self.registry.lock();
            registry
                .iter()
                .filter(|chunk| chunk.is_dirty())
                .map(Chunk::to_record)
                .collect()
        };

        let mut saved = 0;
        let mut first_error = None;
        for record in records {
            match self.store.save(&record) {
                Ok(()) => {
                    if let Some(chunk) = self.registry.lock().get_mut(record.id) {
                        chunk.mark_clean();
                    }
                    saved += 1;
                },
                Err(e) => {
                    warn!(key = %record.id, "Failed to save chunk: {e}");
                    first_error.get_or_insert(e);
                },
            }
        }

        info!("Saved {saved} chunks");
        match first_error {
            Some(e) => Err(e),
            None => Ok(saved),
        }
    }

    /// Blocks until no background job is queued or running, up to `timeout`.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        self.pool.wait_idle(timeout)
    }
}

/// Keys of the chunks overlapping a rectangle, row-major.
#[must_use]
pub fn keys_covering(rect: WorldRect, span: i64) -> Vec<ChunkKey> {
    if rect.width <= 0 || rect.height <= 0 {
        return Vec::new();
    }
    let first = ChunkKey::containing(rect.x, rect.y, span);
    let last = ChunkKey::containing(rect.right() - 1, rect.bottom() - 1, span);
    let (x0, y0) = first.grid(span);
    let (x1, y1) = last.grid(span);

    let mut keys = Vec::new();
    for gy in y0..=y1 {
        for gx in x0..=x1 {
            keys.push(first.offset(gx - x0, gy - y0, span));
        }
    }
    keys
}

fn produce(generator: &WorldGenerator, store: &ChunkStore, key: ChunkKey) -> ChunkResult<Chunk> {
    match store.load(key)? {
        Some(record) => {
            if record.id != key {
                return Err(ChunkError::Malformed(format!(
                    "file for {key} holds chunk {}",
                    record.id
                )));
            }
            generator.load_chunk(record)
        },
        None => Ok(generator.generate_chunk(key)),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn world(dir: &TempDir) -> WorldMap {
        WorldMap::new(WorldConfig::with_seed(42), dir.path()).expect("world map")
    }

    #[test]
    fn test_chunk_key_floor_semantics() {
        let dir = TempDir::new().expect("temp dir");
        let map = world(&dir);
        assert_eq!(map.get_chunk_key(0, 0), ChunkKey::ORIGIN);
        assert_eq!(map.get_chunk_key(511, 511), ChunkKey::ORIGIN);
        assert_eq!(map.get_chunk_key(-1, 0).to_string(), "-512,0");
        assert_eq!(map.get_chunk_coords(-513, 1030), WorldCoord::new(-1024, 1024));
    }

    #[test]
    fn test_visible_chunks_around_origin() {
        let dir = TempDir::new().expect("temp dir");
        let map = world(&dir);
        let keys: Vec<String> = map
            .get_visible_chunks(WorldCoord::new(0, 0), 64)
            .iter()
            .map(ToString::to_string)
            .collect();

        assert!(keys.contains(&"0,0".to_string()));
        assert!(keys.contains(&"-1024,-512".to_string()));
        assert!(keys.contains(&"512,0".to_string()));
        assert!(!keys.contains(&"1024,0".to_string()));
        assert_eq!(keys.len(), 4 * 2);
    }

    #[test]
    fn test_keys_covering_is_inclusive() {
        let keys = keys_covering(WorldRect::new(0, 0, 512, 512), 512);
        assert_eq!(keys, vec![ChunkKey::ORIGIN]);
        let keys = keys_covering(WorldRect::new(-1, 0, 2, 1), 512);
        assert_eq!(keys.len(), 2);
        assert!(keys_covering(WorldRect::new(0, 0, 0, 10), 512).is_empty());
    }

    #[test]
    fn test_update_generates_and_evicts() {
        let dir = TempDir::new().expect("temp dir");
        let map = world(&dir);

        let submitted = map.update(WorldCoord::new(0, 0));
        assert!(submitted > 0);
        assert!(map.wait_idle(Duration::from_secs(30)));
        let report = map.resolve_pending();
        assert!(report.failures.is_empty());
        assert_eq!(report.resident, 8);
        assert_eq!(report.generating, 0);
        assert_eq!(map.update(WorldCoord::new(0, 0)), 0);

        let far = WorldCoord::new(100_000, 100_000);
        let eviction = map.evict_distant(far, None);
        assert_eq!(eviction.evicted.len(), 8);
        assert!(eviction.failed_saves.is_empty());
        assert!(eviction
            .survivors
            .iter()
            .all(|o| o.kind() != crate::object::ObjectKind::Camp));
        assert!(map.registry().is_empty());
        assert_eq!(map.store().keys().expect("keys").len(), 8);
    }

    #[test]
    fn test_nearby_chunks_survive_eviction() {
        let dir = TempDir::new().expect("temp dir");
        let map = world(&dir);
        map.update(WorldCoord::new(0, 0));
        assert!(map.wait_idle(Duration::from_secs(30)));
        map.resolve_pending();

        let report = map.evict_distant(WorldCoord::new(600, 0), None);
        assert!(report.evicted.is_empty());
        assert_eq!(map.registry().len(), 8);
    }

    #[test]
    fn test_reload_restores_explored_tiles() {
        let dir = TempDir::new().expect("temp dir");
        {
            let map = world(&dir);
            map.update(WorldCoord::new(0, 0));
            assert!(map.wait_idle(Duration::from_secs(30)));
            map.resolve_pending();
            assert!(map.explore(WorldCoord::new(0, 0)) > 0);
            assert_eq!(map.save_all().expect("save"), 8);
            assert_eq!(map.save_all().expect("nothing dirty"), 0);
        }

        let map = world(&dir);
        assert!(map.request(ChunkKey::ORIGIN));
        assert!(map.wait_idle(Duration::from_secs(30)));
        assert!(map.resolve_pending().failures.is_empty());

        let registry = map.registry();
        let chunk = registry.get(ChunkKey::ORIGIN).expect("resident");
        assert_eq!(chunk.provenance(), crate::chunk::Provenance::Loaded);
        assert!(registry
            .tile_at(WorldCoord::new(0, 0))
            .expect("resident")
            .is_explored());
    }
}
