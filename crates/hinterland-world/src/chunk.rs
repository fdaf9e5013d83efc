//! Chunk data structure, construction and persistence.

use hinterland_common::{ChunkKey, CoordError, SchemaVersion, TilePos, WorldCoord, WorldRect};
use thiserror::Error;
use tracing::{debug, trace};

use crate::autotile::{self, TextureDescriptor};
use crate::generation::WorldGenerator;
use crate::object::{ObjectKind, WorldObject};
use crate::record::{ChunkRecord, CHUNK_TAG, TILE_TAG};
use crate::spawn;
use crate::terrain::{Biome, Terrain};
use crate::tile::{Direction, Tile};

/// Chunk errors.
#[derive(Debug, Error)]
pub enum ChunkError {
    /// Reading or writing a chunk file failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// The chunk file is not valid JSON for a chunk record
    #[error("Invalid chunk JSON: {0}")]
    Json(#[from] serde_json::Error),
    /// The record is structurally inconsistent
    #[error("Malformed chunk record: {0}")]
    Malformed(String),
    /// An object tag has no constructor
    #[error("Unknown object type: {0:?}")]
    UnknownObject(String),
    /// Wrong number of tiles
    #[error("Expected {expected} tiles, found {found}")]
    TileCount {
        /// Tiles a chunk must hold
        expected: usize,
        /// Tiles in the record
        found: usize,
    },
    /// Version mismatch
    #[error("Version mismatch: expected {expected}, got {actual}")]
    VersionMismatch {
        /// Expected version
        expected: String,
        /// Actual version
        actual: String,
    },
    /// The chunk key is malformed or misaligned
    #[error(transparent)]
    Key(#[from] CoordError),
    /// A background job died before producing a chunk
    #[error("Chunk job panicked: {0}")]
    Panicked(String),
}

/// Result type for chunk operations.
pub type ChunkResult<T> = Result<T, ChunkError>;

/// How a chunk came into memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provenance {
    /// Built from noise
    Generated,
    /// Rebuilt from a persisted record
    Loaded,
}

/// A square grid of tiles.
#[derive(Debug)]
pub struct Chunk {
    /// Chunk key (top-left corner)
    key: ChunkKey,
    /// Tiles per edge
    size: u16,
    /// Tile edge in pixels
    tile_size: i64,
    /// Row-major tiles, exactly `size * size`
    tiles: Vec<Tile>,
    /// Generated or loaded
    provenance: Provenance,
    /// Whether chunk has been modified since last save
    dirty: bool,
}

impl Chunk {
    /// Builds a chunk from noise.
    ///
    /// Tiles are classified from the climate at their top-left corner. The
    /// origin chunk additionally gets a sand clearing around its center and
    /// the Camp. Textures that only need in-chunk neighbors are resolved
    /// before returning.
    #[must_use]
    pub fn generate(key: ChunkKey, generator: &WorldGenerator) -> Self {
        let config = generator.config();
        let size = config.chunk_size;
        let tile_size = config.tile_px();

        let tiles = (0..config.tiles_per_chunk())
            .map(|index| {
                let pos = TilePos::from_index(index, size);
                let origin = key.origin().offset(
                    i64::from(pos.col) * tile_size,
                    i64::from(pos.row) * tile_size,
                );
                let (biome, terrain) = generator.classify_at(origin);
                Tile::new(pos, terrain, biome, false, None)
            })
            .collect();

        let mut chunk = Self {
            key,
            size,
            tile_size,
            tiles,
            provenance: Provenance::Generated,
            dirty: true,
        };

        if key == ChunkKey::ORIGIN {
            chunk.carve_clearing();
        }

        if config.load_objects {
            for index in 0..chunk.tiles.len() {
                chunk.spawn_tile(index, generator);
            }
        }

        if key == ChunkKey::ORIGIN {
            chunk.place_camp();
        }

        let resolved = chunk.resolve_local_textures();
        debug!(%key, resolved, "Generated chunk");
        chunk
    }

    /// Rebuilds a chunk from its persisted record.
    ///
    /// The record must be internally consistent: `"Chunk"` type, a readable
    /// version, `id` agreeing with `position` and aligned to the chunk span,
    /// and every grid position present exactly once. Tiles without an object
    /// list, and all water tiles, get their objects respawned.
    pub fn from_record(record: ChunkRecord, generator: &WorldGenerator) -> ChunkResult<Self> {
        let config = generator.config();
        let size = config.chunk_size;
        let expected = config.tiles_per_chunk();

        if record.kind != CHUNK_TAG {
            return Err(ChunkError::Malformed(format!(
                "record type is {:?}, expected {CHUNK_TAG:?}",
                record.kind
            )));
        }
        if !SchemaVersion::CHUNK_RECORD.can_read(&record.version) {
            return Err(ChunkError::VersionMismatch {
                expected: SchemaVersion::CHUNK_RECORD.to_string(),
                actual: record.version.to_string(),
            });
        }

        let [x, y] = record.position;
        let key = ChunkKey::aligned(x, y, config.span())?;
        if key != record.id {
            return Err(ChunkError::Malformed(format!(
                "id {} does not match position {x},{y}",
                record.id
            )));
        }
        if record.tiles.len() != expected {
            return Err(ChunkError::TileCount {
                expected,
                found: record.tiles.len(),
            });
        }

        let mut slots: Vec<Option<Tile>> = vec![None; expected];
        let mut respawn = Vec::new();
        for tile_record in record.tiles {
            let pos = tile_record.position;
            if tile_record.kind != TILE_TAG {
                return Err(ChunkError::Malformed(format!(
                    "tile {pos:?} has type {:?}",
                    tile_record.kind
                )));
            }
            if pos.row >= size || pos.col >= size {
                return Err(ChunkError::Malformed(format!(
                    "tile {pos:?} outside a {size}x{size} grid"
                )));
            }
            let index = pos.to_index(size);
            if slots[index].is_some() {
                return Err(ChunkError::Malformed(format!("tile {pos:?} appears twice")));
            }
            if tile_record.objects.is_none() || tile_record.terrain == Terrain::Water {
                respawn.push(index);
            }
            let mut tile = Tile::from_record(tile_record)?;
            if !config.load_objects {
                tile.take_objects();
            }
            slots[index] = Some(tile);
        }

        // Count and uniqueness hold, so every slot is filled.
        let tiles: Vec<Tile> = slots.into_iter().flatten().collect();

        let mut chunk = Self {
            key,
            size,
            tile_size: config.tile_px(),
            tiles,
            provenance: Provenance::Loaded,
            dirty: false,
        };

        if config.load_objects {
            respawn.sort_unstable();
            for index in respawn {
                chunk.tiles[index].take_objects();
                chunk.spawn_tile(index, generator);
            }
        }

        let resolved = chunk.resolve_local_textures();
        debug!(%key, resolved, "Loaded chunk");
        Ok(chunk)
    }

    /// Persisted form.
    #[must_use]
    pub fn to_record(&self) -> ChunkRecord {
        ChunkRecord {
            kind: CHUNK_TAG.to_string(),
            version: SchemaVersion::CHUNK_RECORD,
            id: self.key,
            position: [self.key.x(), self.key.y()],
            tiles: self.tiles.iter().map(Tile::to_record).collect(),
        }
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

    /// Returns the tile edge in pixels.
    #[must_use]
    pub const fn tile_size(&self) -> i64 {
        self.tile_size
    }

    /// Returns the chunk edge in pixels.
    #[must_use]
    pub const fn span(&self) -> i64 {
        self.size as i64 * self.tile_size
    }

    /// World-space rectangle of the chunk.
    #[must_use]
    pub const fn rect(&self) -> WorldRect {
        self.key.rect(self.span())
    }

    /// Returns whether the chunk was generated or loaded.
    #[must_use]
    pub const fn provenance(&self) -> Provenance {
        self.provenance
    }

    /// Returns whether the chunk is dirty.
    #[must_use]
    pub const fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Marks the chunk as dirty.
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Marks the chunk as clean.
    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }

    /// Returns a slice of all tiles in row-major order.
    #[must_use]
    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    /// Gets a tile by grid position.
    #[must_use]
    pub fn tile(&self, pos: TilePos) -> Option<&Tile> {
        if pos.row >= self.size || pos.col >= self.size {
            return None;
        }
        self.tiles.get(pos.to_index(self.size))
    }

    /// Gets a mutable tile by grid position.
    pub fn tile_mut(&mut self, pos: TilePos) -> Option<&mut Tile> {
        if pos.row >= self.size || pos.col >= self.size {
            return None;
        }
        self.tiles.get_mut(pos.to_index(self.size))
    }

    /// Converts signed grid indices to a position inside this chunk.
    #[must_use]
    pub fn local_pos(&self, row: i64, col: i64) -> Option<TilePos> {
        let row = u16::try_from(row).ok()?;
        let col = u16::try_from(col).ok()?;
        (row < self.size && col < self.size).then_some(TilePos::new(row, col))
    }

    /// Grid position of the tile containing a world pixel, if it is in this chunk.
    #[must_use]
    pub fn pos_at(&self, coord: WorldCoord) -> Option<TilePos> {
        self.local_pos(
            (coord.y - self.key.y()).div_euclid(self.tile_size),
            (coord.x - self.key.x()).div_euclid(self.tile_size),
        )
    }

    /// Top-left world pixel of a tile.
    #[must_use]
    pub const fn tile_origin(&self, pos: TilePos) -> WorldCoord {
        self.key.origin().offset(
            pos.col as i64 * self.tile_size,
            pos.row as i64 * self.tile_size,
        )
    }

    /// World-space rectangle of a tile.
    #[must_use]
    pub const fn tile_rect(&self, pos: TilePos) -> WorldRect {
        let origin = self.tile_origin(pos);
        WorldRect::new(origin.x, origin.y, self.tile_size, self.tile_size)
    }

    /// Neighbor inside this chunk, `None` when it lies across the border.
    #[must_use]
    pub fn local_neighbor(&self, pos: TilePos, direction: Direction) -> Option<&Tile> {
        let (d_col, d_row) = direction.offset();
        let pos = self.local_pos(i64::from(pos.row) + d_row, i64::from(pos.col) + d_col)?;
        self.tile(pos)
    }

    /// Positions of tiles whose texture is still unknown.
    pub fn unresolved(&self) -> impl Iterator<Item = TilePos> + '_ {
        self.tiles
            .iter()
            .filter(|tile| tile.texture().is_none())
            .map(Tile::pos)
    }

    /// Resolves every texture whose downstream neighbors are inside this chunk.
    ///
    /// Returns the number of textures resolved. Tiles on the right and
    /// bottom edges stay unresolved until the neighboring chunks are resident.
    pub fn resolve_local_textures(&mut self) -> usize {
        let mut resolved = 0;
        for index in 0..self.tiles.len() {
            if self.tiles[index].texture().is_some() {
                continue;
            }
            let pos = self.tiles[index].pos();
            if let Some(texture) = self.local_texture(pos) {
                self.tiles[index].set_texture(texture);
                resolved += 1;
            }
        }
        resolved
    }

    fn local_texture(&self, pos: TilePos) -> Option<TextureDescriptor> {
        let here = self.tile(pos)?.terrain();
        let right = self.local_neighbor(pos, Direction::Right)?.terrain();
        let bottom = self.local_neighbor(pos, Direction::Bottom)?.terrain();
        let bottom_right = self.local_neighbor(pos, Direction::BottomRight)?.terrain();
        Some(autotile::resolve([here, right, bottom, bottom_right]))
    }

    /// Kills every object and returns the persistent actors that must leave
    /// with the caller.
    ///
    /// Persistent actors that are saved with their tile, such as the Camp,
    /// stay owned by the chunk file and come back when it is reloaded; only
    /// unsaved ones, such as the Player, are handed back. Consumes the
    /// chunk, releasing its tile grid.
    #[must_use]
    pub fn unload(self) -> Vec<WorldObject> {
        let key = self.key;
        let mut killed = 0usize;
        let survivors: Vec<WorldObject> = self
            .tiles
            .into_iter()
            .flat_map(|mut tile| tile.take_objects())
            .filter(|object| {
                let kind = object.kind();
                let keep = kind.is_persistent_actor() && !kind.is_saved();
                killed += usize::from(!keep);
                keep
            })
            .collect();
        trace!(%key, killed, survivors = survivors.len(), "Unloaded chunk");
        survivors
    }

    fn carve_clearing(&mut self) {
        let center = spawn::center_tile(self.size);
        for d_row in -1..=1 {
            for d_col in -1..=1 {
                let pos = self.local_pos(i64::from(center.row) + d_row, i64::from(center.col) + d_col);
                if let Some(tile) = pos.and_then(|pos| self.tile_mut(pos)) {
                    *tile = Tile::new(tile.pos(), Terrain::Sand, Biome::Desert, false, None);
                }
            }
        }
    }

    fn place_camp(&mut self) {
        let pos = spawn::camp_tile(self.size);
        let rect = self.tile_rect(pos);
        let center = rect.center();
        if let Some(tile) = self.tile_mut(pos) {
            tile.push_object(WorldObject::new(
                ObjectKind::Camp,
                center.x as f32,
                center.y as f32,
            ));
        }
    }

    /// Rolls one tile's spawn slot against objects on the tile and on the
    /// neighbors that precede it in row-major order.
    ///
    /// Only preceding neighbors count so a respawn at load time sees exactly
    /// the objects that existed when the tile was first generated.
    fn spawn_tile(&mut self, index: usize, generator: &WorldGenerator) {
        let tile = &self.tiles[index];
        let pos = tile.pos();
        let spawned = {
            let mut blockers: Vec<&WorldObject> = tile.objects().iter().collect();
            for direction in Direction::PRECEDING {
                if let Some(neighbor) = self.local_neighbor(pos, direction) {
                    blockers.extend(neighbor.objects());
                }
            }
            spawn::spawn_for_tile(
                generator.config(),
                self.key,
                pos,
                tile.terrain(),
                self.tile_origin(pos),
                &blockers,
            )
        };
        for object in spawned {
            self.tiles[index].push_object(object);
        }
    }
}
