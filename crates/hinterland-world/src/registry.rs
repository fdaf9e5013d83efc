//! The chunk registry: resident chunks plus the set of keys in flight.
//!
//! One registry lives behind the world map's mutex. Chunks are stored in a
//! flat map keyed by [`ChunkKey`]; tiles never point at their chunk or at
//! each other, neighbors are found by coordinate arithmetic through here.

use ahash::{AHashMap, AHashSet};
use hinterland_common::{ChunkKey, EntityId, TilePos, WorldCoord, WorldRect};
use tracing::{debug, trace, warn};

use crate::autotile::{self, TextureDescriptor};
use crate::chunk::{Chunk, ChunkError};
use crate::object::WorldObject;
use crate::terrain::Terrain;
use crate::tile::{Direction, Tile};

/// Lifecycle state of a chunk key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkState {
    /// Not in memory and not being produced
    Absent,
    /// A background job is loading or generating it
    Generating,
    /// In memory
    Resident,
}

/// A chunk that could not be loaded.
#[derive(Debug)]
pub struct ChunkLoadFailure {
    /// The chunk that failed
    pub key: ChunkKey,
    /// Why it failed
    pub error: ChunkError,
}

/// Resident chunks and in-flight keys. A key is never in both.
#[derive(Debug)]
pub struct ChunkRegistry {
    chunks: AHashMap<ChunkKey, Chunk>,
    generating: AHashSet<ChunkKey>,
    span: i64,
    tile_size: i64,
    pending_edges: Vec<ChunkKey>,
    failures: Vec<ChunkLoadFailure>,
}

impl ChunkRegistry {
    /// Creates an empty registry for chunks of `span` pixels made of `tile_size` pixel tiles.
    #[must_use]
    pub fn new(span: i64, tile_size: i64) -> Self {
        Self {
            chunks: AHashMap::new(),
            generating: AHashSet::new(),
            span,
            tile_size,
            pending_edges: Vec::new(),
            failures: Vec::new(),
        }
    }

    /// Chunk edge in pixels.
    #[must_use]
    pub const fn span(&self) -> i64 {
        self.span
    }

    /// Tile edge in pixels.
    #[must_use]
    pub const fn tile_size(&self) -> i64 {
        self.tile_size
    }

    /// Returns the state of a key.
    #[must_use]
    pub fn state(&self, key: ChunkKey) -> ChunkState {
        if self.chunks.contains_key(&key) {
            ChunkState::Resident
        } else if self.generating.contains(&key) {
            ChunkState::Generating
        } else {
            ChunkState::Absent
        }
    }

    /// Whether a chunk is resident.
    #[must_use]
    pub fn contains(&self, key: ChunkKey) -> bool {
        self.chunks.contains_key(&key)
    }

    /// Number of resident chunks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// Whether no chunk is resident.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Number of keys in flight.
    #[must_use]
    pub fn generating_count(&self) -> usize {
        self.generating.len()
    }

    /// Keys of resident chunks, in no particular order.
    pub fn keys(&self) -> impl Iterator<Item = ChunkKey> + '_ {
        self.chunks.keys().copied()
    }

    /// Resident chunks, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &Chunk> {
        self.chunks.values()
    }

    /// Mutable resident chunks, in no particular order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Chunk> {
        self.chunks.values_mut()
    }

    /// Gets a resident chunk.
    #[must_use]
    pub fn get(&self, key: ChunkKey) -> Option<&Chunk> {
        self.chunks.get(&key)
    }

    /// Gets a mutable resident chunk.
    pub fn get_mut(&mut self, key: ChunkKey) -> Option<&mut Chunk> {
        self.chunks.get_mut(&key)
    }

    /// Moves an absent key to `Generating`. Returns `false` for any other state.
    pub fn begin_generating(&mut self, key: ChunkKey) -> bool {
        if self.chunks.contains_key(&key) {
            return false;
        }
        self.generating.insert(key)
    }

    /// Returns a `Generating` key to `Absent` without producing a chunk.
    pub fn abandon(&mut self, key: ChunkKey) -> bool {
        self.generating.remove(&key)
    }

    /// Makes a finished chunk resident and queues its edges for reconciliation.
    ///
    /// Leaving `Generating` and entering the resident map happen together
    /// under the caller's lock. A chunk whose key was not in flight is
    /// dropped. Border objects of the newcomer that overlap objects of
    /// chunks already resident are removed.
    pub fn complete(&mut self, chunk: Chunk) -> bool {
        let key = chunk.key();
        if !self.generating.remove(&key) {
            warn!(%key, "Dropping chunk that was not being generated");
            return false;
        }
        self.chunks.insert(key, chunk);
        self.settle_border_objects(key);
        self.pending_edges.push(key);
        trace!(%key, "Chunk resident");
        true
    }

    /// Records a failed load and returns the key to `Absent`.
    pub fn fail(&mut self, key: ChunkKey, error: ChunkError) {
        self.generating.remove(&key);
        warn!(%key, "Chunk load failed: {error}");
        self.failures.push(ChunkLoadFailure { key, error });
    }

    /// Drains the failures recorded since the last call.
    pub fn take_failures(&mut self) -> Vec<ChunkLoadFailure> {
        std::mem::take(&mut self.failures)
    }

    /// Removes a resident chunk.
    pub fn remove(&mut self, key: ChunkKey) -> Option<Chunk> {
        self.pending_edges.retain(|pending| *pending != key);
        self.chunks.remove(&key)
    }

    /// Re-inserts a chunk that was removed but could not be disposed of.
    pub fn restore(&mut self, chunk: Chunk) {
        let key = chunk.key();
        self.generating.remove(&key);
        self.chunks.insert(key, chunk);
    }

    /// Chunk key and grid position of the tile containing a world pixel.
    #[must_use]
    pub fn locate(&self, coord: WorldCoord) -> (ChunkKey, TilePos) {
        let key = coord.to_chunk_key(self.span);
        let row = (coord.y - key.y()).div_euclid(self.tile_size);
        let col = (coord.x - key.x()).div_euclid(self.tile_size);
        // Both lie in 0..chunk_size because the key contains the coordinate.
        let pos = TilePos::new(
            u16::try_from(row).unwrap_or(u16::MAX),
            u16::try_from(col).unwrap_or(u16::MAX),
        );
        (key, pos)
    }

    /// Tile containing a world pixel, if its chunk is resident.
    #[must_use]
    pub fn tile_at(&self, coord: WorldCoord) -> Option<&Tile> {
        let (key, pos) = self.locate(coord);
        self.chunks.get(&key)?.tile(pos)
    }

    /// Mutable tile containing a world pixel, if its chunk is resident.
    ///
    /// The chunk is marked dirty, so whatever the caller changes is saved.
    pub fn tile_at_mut(&mut self, coord: WorldCoord) -> Option<&mut Tile> {
        let (key, pos) = self.locate(coord);
        let chunk = self.chunks.get_mut(&key)?;
        chunk.mark_dirty();
        chunk.tile_mut(pos)
    }

    /// Like [`tile_at_mut`](Self::tile_at_mut) without dirtying; for
    /// derived state such as textures resolved from neighbors.
    fn tile_slot(&mut self, coord: WorldCoord) -> Option<&mut Tile> {
        let (key, pos) = self.locate(coord);
        self.chunks.get_mut(&key)?.tile_mut(pos)
    }

    /// Removes and returns the objects on the tile at `coord`.
    ///
    /// Empty when the tile is not resident or holds nothing.
    pub fn take_objects(&mut self, coord: WorldCoord) -> Vec<WorldObject> {
        if self.tile_at(coord).map_or(true, |tile| tile.objects().is_empty()) {
            return Vec::new();
        }
        self.tile_at_mut(coord)
            .map(Tile::take_objects)
            .unwrap_or_default()
    }

    /// Removes one object from the tile at `coord`.
    pub fn remove_object(&mut self, coord: WorldCoord, id: EntityId) -> Option<WorldObject> {
        if !self.tile_at(coord)?.objects().iter().any(|o| o.id() == id) {
            return None;
        }
        self.tile_at_mut(coord)?.remove_object(id)
    }

    /// Places an object on the tile at `coord`. Returns `false`, dropping
    /// nothing, when the tile is not resident.
    pub fn push_object(&mut self, coord: WorldCoord, object: WorldObject) -> bool {
        match self.tile_at_mut(coord) {
            Some(tile) => {
                tile.push_object(object);
                true
            },
            None => false,
        }
    }

    /// Terrain at a world pixel, if its chunk is resident.
    #[must_use]
    pub fn terrain_at(&self, coord: WorldCoord) -> Option<Terrain> {
        self.tile_at(coord).map(Tile::terrain)
    }

    /// The neighbor of the tile at `coord`, crossing chunk borders.
    ///
    /// `None` when the neighbor's chunk is not resident.
    #[must_use]
    pub fn neighbor(&self, coord: WorldCoord, direction: Direction) -> Option<&Tile> {
        self.tile_at(self.step(coord, direction))
    }

    fn step(&self, coord: WorldCoord, direction: Direction) -> WorldCoord {
        let (d_col, d_row) = direction.offset();
        coord.offset(d_col * self.tile_size, d_row * self.tile_size)
    }

    /// Texture the tile at `coord` should have, if all its corners are known.
    #[must_use]
    pub fn texture_for(&self, coord: WorldCoord) -> Option<TextureDescriptor> {
        let here = self.terrain_at(coord)?;
        let right = self.neighbor(coord, Direction::Right)?.terrain();
        let bottom = self.neighbor(coord, Direction::Bottom)?.terrain();
        let bottom_right = self.neighbor(coord, Direction::BottomRight)?.terrain();
        Some(autotile::resolve([here, right, bottom, bottom_right]))
    }

    /// Recomputes the texture of the tile at `coord`.
    ///
    /// Returns `false`, leaving the texture untouched, when the tile or any
    /// of its right, bottom and bottom-right neighbors is not resident.
    pub fn recompute_texture(&mut self, coord: WorldCoord) -> bool {
        let Some(texture) = self.texture_for(coord) else {
            return false;
        };
        match self.tile_slot(coord) {
            Some(tile) => {
                tile.set_texture(texture);
                true
            },
            None => false,
        }
    }

    /// Changes the terrain at `coord` and refreshes every texture that samples it.
    ///
    /// A texture that cannot be recomputed because a sampled chunk is not
    /// resident is cleared, so the deferred pass resolves it once that chunk
    /// returns. Returns `false` when the tile is not resident.
    pub fn set_terrain(&mut self, coord: WorldCoord, terrain: Terrain) -> bool {
        let Some(tile) = self.tile_at_mut(coord) else {
            return false;
        };
        tile.set_terrain(terrain);

        self.recompute_texture(coord);
        for direction in Direction::UPSTREAM {
            let neighbor = self.step(coord, direction);
            if self.recompute_texture(neighbor) {
                let (neighbor_key, _) = self.locate(neighbor);
                if let Some(chunk) = self.chunks.get_mut(&neighbor_key) {
                    chunk.mark_dirty();
                }
            } else if let Some(tile) = self.tile_at_mut(neighbor) {
                tile.clear_texture();
            }
        }
        true
    }

    /// Removes collidable objects on the border tiles of `key` that overlap
    /// collidable objects across the border. Returns objects removed.
    ///
    /// Chunks generate without seeing their neighbors, so the chunk that
    /// became resident last gives way. Persistent actors are never removed.
    pub fn settle_border_objects(&mut self, key: ChunkKey) -> usize {
        let Some(chunk) = self.chunks.get(&key) else {
            return 0;
        };
        let last = chunk.size().saturating_sub(1);

        let mut doomed: Vec<(TilePos, EntityId)> = Vec::new();
        for tile in chunk.tiles() {
            let pos = tile.pos();
            let on_border = pos.row == 0 || pos.col == 0 || pos.row == last || pos.col == last;
            if !on_border || tile.objects().is_empty() {
                continue;
            }
            let origin = chunk.tile_origin(pos);
            let foreign: Vec<&WorldObject> = Direction::ALL
                .into_iter()
                .map(|direction| self.step(origin, direction))
                .filter(|coord| self.locate(*coord).0 != key)
                .filter_map(|coord| self.tile_at(coord))
                .flat_map(Tile::objects)
                .collect();
            if foreign.is_empty() {
                continue;
            }
            for object in tile.objects() {
                let kind = object.kind();
                if !kind.is_collidable() || kind.is_persistent_actor() {
                    continue;
                }
                let (x, y) = object.position();
                let radius = kind.collision_radius();
                if foreign.iter().any(|other| other.blocks(x, y, radius, 0.0)) {
                    doomed.push((pos, object.id()));
                }
            }
        }

        if doomed.is_empty() {
            return 0;
        }
        let Some(chunk) = self.chunks.get_mut(&key) else {
            return 0;
        };
        for (pos, id) in &doomed {
            if let Some(tile) = chunk.tile_mut(*pos) {
                tile.remove_object(*id);
            }
        }
        chunk.mark_dirty();
        debug!(%key, removed = doomed.len(), "Removed objects overlapping neighbor chunks");
        doomed.len()
    }

    /// Resolves unresolved tiles of a chunk and of the chunks whose edge
    /// textures sample it (top, left and top-left). Returns textures resolved.
    pub fn reconcile_edges(&mut self, key: ChunkKey) -> usize {
        let affected = [
            key,
            key.offset(0, -1, self.span),
            key.offset(-1, 0, self.span),
            key.offset(-1, -1, self.span),
        ];

        let mut coords = Vec::new();
        for affected_key in affected {
            if let Some(chunk) = self.chunks.get(&affected_key) {
                coords.extend(chunk.unresolved().map(|pos| chunk.tile_origin(pos)));
            }
        }

        let resolved = coords
            .into_iter()
            .filter(|coord| self.recompute_texture(*coord))
            .count();
        if resolved > 0 {
            trace!(%key, resolved, "Reconciled chunk edges");
        }
        resolved
    }

    /// Reconciles the edges of every chunk that became resident since the last call.
    pub fn resolve_deferred(&mut self) -> usize {
        let pending = std::mem::take(&mut self.pending_edges);
        pending.into_iter().map(|key| self.reconcile_edges(key)).sum()
    }

    /// Marks every tile intersecting `view` explored. Returns tiles newly explored.
    pub fn explore(&mut self, view: WorldRect) -> usize {
        let mut explored = 0;
        for chunk in self.chunks.values_mut() {
            if !chunk.rect().intersects(&view) {
                continue;
            }
            let positions: Vec<TilePos> = chunk
                .tiles()
                .iter()
                .map(Tile::pos)
                .filter(|pos| chunk.tile_rect(*pos).intersects(&view))
                .collect();
            let mut changed = 0;
            for pos in positions {
                if chunk.tile_mut(pos).is_some_and(Tile::mark_explored) {
                    changed += 1;
                }
            }
            if changed > 0 {
                chunk.mark_dirty();
                explored += changed;
            }
        }
        explored
    }

    /// Resident keys not in `keep`.
    #[must_use]
    pub fn keys_outside(&self, keep: &AHashSet<ChunkKey>) -> Vec<ChunkKey> {
        self.chunks
            .keys()
            .filter(|key| !keep.contains(key))
            .copied()
            .collect()
    }
}
