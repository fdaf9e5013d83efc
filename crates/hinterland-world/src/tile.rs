//! Tiles: single grid cells of a chunk.

use hinterland_common::{EntityId, TilePos, WorldCoord, WorldRect};

use crate::autotile::TextureDescriptor;
use crate::chunk::ChunkResult;
use crate::object::WorldObject;
use crate::record::{TileRecord, TILE_TAG};
use crate::terrain::{Biome, Terrain};

/// The eight neighbor directions of a tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Row above
    Top,
    /// Row below
    Bottom,
    /// Column to the left
    Left,
    /// Column to the right
    Right,
    /// Up and left
    TopLeft,
    /// Up and right
    TopRight,
    /// Down and left
    BottomLeft,
    /// Down and right
    BottomRight,
}

impl Direction {
    /// All directions.
    pub const ALL: [Self; 8] = [
        Self::Top,
        Self::Bottom,
        Self::Left,
        Self::Right,
        Self::TopLeft,
        Self::TopRight,
        Self::BottomLeft,
        Self::BottomRight,
    ];

    /// Neighbors whose corner textures include this tile.
    pub const UPSTREAM: [Self; 3] = [Self::Top, Self::Left, Self::TopLeft];

    /// Neighbors that come before a tile in row-major order.
    pub const PRECEDING: [Self; 4] = [Self::TopLeft, Self::Top, Self::TopRight, Self::Left];

    /// Neighbors this tile's texture is built from.
    pub const DOWNSTREAM: [Self; 3] = [Self::Right, Self::Bottom, Self::BottomRight];

    /// Offset as `(d_col, d_row)` in tiles.
    #[must_use]
    pub const fn offset(self) -> (i64, i64) {
        match self {
            Self::Top => (0, -1),
            Self::Bottom => (0, 1),
            Self::Left => (-1, 0),
            Self::Right => (1, 0),
            Self::TopLeft => (-1, -1),
            Self::TopRight => (1, -1),
            Self::BottomLeft => (-1, 1),
            Self::BottomRight => (1, 1),
        }
    }
}

/// A single grid cell.
#[derive(Debug, Clone, PartialEq)]
pub struct Tile {
    pos: TilePos,
    terrain: Terrain,
    biome: Biome,
    explored: bool,
    texture: Option<TextureDescriptor>,
    objects: Vec<WorldObject>,
}

impl Tile {
    /// Creates a tile without objects.
    #[must_use]
    pub const fn new(
        pos: TilePos,
        terrain: Terrain,
        biome: Biome,
        explored: bool,
        texture: Option<TextureDescriptor>,
    ) -> Self {
        Self {
            pos,
            terrain,
            biome,
            explored,
            texture,
            objects: Vec::new(),
        }
    }

    /// Rebuilds a tile from its record, consuming any persisted objects.
    pub fn from_record(record: TileRecord) -> ChunkResult<Self> {
        let mut tile = Self::new(
            record.position,
            record.terrain,
            record.biome,
            record.is_explored,
            record.texture,
        );
        if let Some(objects) = record.objects {
            tile.objects = objects
                .iter()
                .map(WorldObject::from_record)
                .collect::<ChunkResult<_>>()?;
        }
        Ok(tile)
    }

    /// Persisted form. Water tiles leave `objects` out.
    #[must_use]
    pub fn to_record(&self) -> TileRecord {
        let objects = (self.terrain != Terrain::Water)
            .then(|| self.objects.iter().filter_map(WorldObject::to_record).collect());
        TileRecord {
            kind: TILE_TAG.to_string(),
            position: self.pos,
            objects,
            is_explored: self.explored,
            texture: self.texture,
            terrain: self.terrain,
            biome: self.biome,
        }
    }

    /// Grid position within the chunk.
    #[must_use]
    pub const fn pos(&self) -> TilePos {
        self.pos
    }

    /// Ground terrain.
    #[must_use]
    pub const fn terrain(&self) -> Terrain {
        self.terrain
    }

    /// Replaces the terrain and drops the now stale texture.
    ///
    /// Neighbor textures are the caller's concern; see
    /// [`ChunkRegistry::set_terrain`](crate::registry::ChunkRegistry::set_terrain).
    pub fn set_terrain(&mut self, terrain: Terrain) {
        self.terrain = terrain;
        self.texture = None;
    }

    /// Biome chosen at generation.
    #[must_use]
    pub const fn biome(&self) -> Biome {
        self.biome
    }

    /// Whether the player has seen this tile.
    #[must_use]
    pub const fn is_explored(&self) -> bool {
        self.explored
    }

    /// Marks the tile explored. Returns `true` if it was not before.
    pub fn mark_explored(&mut self) -> bool {
        !std::mem::replace(&mut self.explored, true)
    }

    /// Composite texture, `None` until the downstream neighbors are known.
    #[must_use]
    pub const fn texture(&self) -> Option<TextureDescriptor> {
        self.texture
    }

    /// Stores a resolved texture.
    pub fn set_texture(&mut self, texture: TextureDescriptor) {
        self.texture = Some(texture);
    }

    /// Forgets the texture until the next deferred pass resolves it.
    pub fn clear_texture(&mut self) {
        self.texture = None;
    }

    /// Objects on the tile, in spawn order.
    #[must_use]
    pub fn objects(&self) -> &[WorldObject] {
        &self.objects
    }

    /// Adds an object to the tile.
    pub fn push_object(&mut self, object: WorldObject) {
        self.objects.push(object);
    }

    /// Removes one object by id.
    pub fn remove_object(&mut self, id: EntityId) -> Option<WorldObject> {
        let index = self.objects.iter().position(|object| object.id() == id)?;
        Some(self.objects.remove(index))
    }

    /// Removes and returns every object on the tile.
    pub fn take_objects(&mut self) -> Vec<WorldObject> {
        std::mem::take(&mut self.objects)
    }

    /// Top-left corner in world pixels, given the owning chunk origin.
    #[must_use]
    pub const fn origin(&self, chunk_origin: WorldCoord, tile_size: i64) -> WorldCoord {
        chunk_origin.offset(
            self.pos.col as i64 * tile_size,
            self.pos.row as i64 * tile_size,
        )
    }

    /// World-space rectangle, given the owning chunk origin.
    #[must_use]
    pub const fn rect(&self, chunk_origin: WorldCoord, tile_size: i64) -> WorldRect {
        let origin = self.origin(chunk_origin, tile_size);
        WorldRect::new(origin.x, origin.y, tile_size, tile_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::ChunkError;
    use crate::object::ObjectKind;
    use crate::record::ObjectRecord;

    fn grass_tile() -> Tile {
        Tile::new(
            TilePos::new(1, 2),
            Terrain::Grass,
            Biome::Forest,
            false,
            None,
        )
    }

    #[test]
    fn test_rect_from_chunk_origin() {
        let tile = grass_tile();
        let rect = tile.rect(WorldCoord::new(-512, 512), 32);
        assert_eq!(rect, WorldRect::new(-448, 544, 32, 32));
    }

    #[test]
    fn test_mark_explored_reports_change() {
        let mut tile = grass_tile();
        assert!(tile.mark_explored());
        assert!(!tile.mark_explored());
        assert!(tile.is_explored());
    }

    #[test]
    fn test_set_terrain_invalidates_texture() {
        let mut tile = grass_tile();
        tile.set_texture(TextureDescriptor::Uniform {
            terrain: Terrain::Grass,
        });
        tile.set_terrain(Terrain::Dirt);
        assert_eq!(tile.terrain(), Terrain::Dirt);
        assert!(tile.texture().is_none());
    }

    #[test]
    fn test_remove_object_by_id() {
        let mut tile = grass_tile();
        let tree = WorldObject::new(ObjectKind::Tree, 80.0, 48.0);
        let id = tree.id();
        tile.push_object(WorldObject::new(ObjectKind::Rock, 70.0, 40.0));
        tile.push_object(tree);

        let removed = tile.remove_object(id).expect("present");
        assert_eq!(removed.kind(), ObjectKind::Tree);
        assert_eq!(tile.objects().len(), 1);
        assert!(tile.remove_object(id).is_none());
    }

    #[test]
    fn test_record_roundtrip_keeps_objects() {
        let mut tile = grass_tile();
        tile.mark_explored();
        tile.set_texture(TextureDescriptor::Uniform {
            terrain: Terrain::Grass,
        });
        tile.push_object(WorldObject::new(ObjectKind::Tree, 80.0, 48.0));
        tile.push_object(WorldObject::new(ObjectKind::Player, 81.0, 49.0));

        let record = tile.to_record();
        assert_eq!(record.objects.as_ref().map(Vec::len), Some(1));

        let back = Tile::from_record(record).expect("valid record");
        assert!(back.is_explored());
        assert_eq!(back.texture(), tile.texture());
        assert_eq!(back.objects().len(), 1);
        assert_eq!(back.objects()[0].kind(), ObjectKind::Tree);
    }

    #[test]
    fn test_water_record_has_no_objects() {
        let mut tile = Tile::new(TilePos::new(0, 0), Terrain::Water, Biome::River, false, None);
        tile.push_object(WorldObject::new(ObjectKind::Fish, 16.0, 16.0));
        assert!(tile.to_record().objects.is_none());
    }

    #[test]
    fn test_unknown_object_fails_tile() {
        let mut record = grass_tile().to_record();
        record.objects = Some(vec![ObjectRecord {
            kind: "unicorn".into(),
            position: [0.0, 0.0],
        }]);
        assert!(matches!(
            Tile::from_record(record),
            Err(ChunkError::UnknownObject(_))
        ));
    }

    #[test]
    fn test_direction_offsets_are_distinct() {
        let mut offsets: Vec<_> = Direction::ALL.iter().map(|d| d.offset()).collect();
        offsets.sort_unstable();
        offsets.dedup();
        assert_eq!(offsets.len(), 8);
        assert!(!offsets.contains(&(0, 0)));
    }
}
