//! Object spawning rules.
//!
//! Each tile gets one spawn slot. The slot fires with the terrain's density,
//! picks a kind from the terrain's weighted table and then tries a few
//! positions inside the tile, rejecting any that crowd a collidable object
//! already placed on the tile or its neighbors. The RNG is seeded from the
//! world seed, chunk key and tile position, so regenerating a tile yields the
//! same objects.

use hinterland_common::{ChunkKey, TilePos, WorldCoord};

use crate::config::WorldConfig;
use crate::object::{ObjectKind, WorldObject};
use crate::terrain::Terrain;

/// Weighted kind tables per terrain.
#[must_use]
pub const fn spawn_weights(terrain: Terrain) -> &'static [(ObjectKind, u32)] {
    match terrain {
        Terrain::Grass => &[
            (ObjectKind::Tree, 50),
            (ObjectKind::Rock, 8),
            (ObjectKind::SkillPoint, 4),
            (ObjectKind::Rabbit, 16),
            (ObjectKind::Deer, 10),
            (ObjectKind::Wolf, 6),
            (ObjectKind::Slime, 6),
        ],
        Terrain::Sand => &[
            (ObjectKind::Rock, 40),
            (ObjectKind::SkillPoint, 10),
            (ObjectKind::Slime, 30),
            (ObjectKind::Rabbit, 20),
        ],
        Terrain::Clay => &[
            (ObjectKind::Tree, 30),
            (ObjectKind::Rock, 20),
            (ObjectKind::Slime, 40),
            (ObjectKind::SkillPoint, 10),
        ],
        Terrain::Water => &[(ObjectKind::Fish, 1)],
        Terrain::Snow => &[
            (ObjectKind::Rock, 40),
            (ObjectKind::Tree, 20),
            (ObjectKind::Wolf, 25),
            (ObjectKind::Deer, 10),
            (ObjectKind::SkillPoint, 5),
        ],
        Terrain::Dirt => &[
            (ObjectKind::Rock, 50),
            (ObjectKind::Rabbit, 30),
            (ObjectKind::SkillPoint, 20),
        ],
    }
}

/// Picks a kind from a weighted table with a roll in `0..total`.
fn pick_weighted(table: &[(ObjectKind, u32)], mut roll: u32) -> Option<ObjectKind> {
    for &(kind, weight) in table {
        if roll < weight {
            return Some(kind);
        }
        roll -= weight;
    }
    None
}

/// Deterministic per-tile RNG.
#[must_use]
pub fn tile_rng(seed: u32, key: ChunkKey, pos: TilePos) -> fastrand::Rng {
    let mut state = u64::from(seed);
    for part in [key.x() as u64, key.y() as u64, u64::from(pos.row), u64::from(pos.col)] {
        state = splitmix(state ^ part);
    }
    fastrand::Rng::with_seed(state)
}

fn splitmix(mut z: u64) -> u64 {
    z = z.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Center tile of a chunk, `((n - 1) / 2, (n - 1) / 2)`.
#[must_use]
pub const fn center_tile(chunk_size: u16) -> TilePos {
    let center = (chunk_size - 1) / 2;
    TilePos::new(center, center)
}

/// Tile that hosts the Camp in the origin chunk.
#[must_use]
pub const fn camp_tile(chunk_size: u16) -> TilePos {
    let center = center_tile(chunk_size);
    TilePos::new(center.row, center.col + 1)
}

/// Whether a tile lies in the spawn-safe zone around the origin chunk center.
#[must_use]
pub fn in_safe_zone(key: ChunkKey, pos: TilePos, config: &WorldConfig) -> bool {
    if key != ChunkKey::ORIGIN {
        return false;
    }
    let center = center_tile(config.chunk_size);
    let radius = config.spawn.safe_radius;
    pos.row.abs_diff(center.row) <= radius && pos.col.abs_diff(center.col) <= radius
}

/// Rolls the spawn slot of one tile.
///
/// `origin` is the tile's top-left corner in world pixels; `blockers` are
/// the objects already placed on the tile and its neighbors. Returns an
/// empty list when the slot does not fire or no clear position is found.
#[must_use]
pub fn spawn_for_tile(
    config: &WorldConfig,
    key: ChunkKey,
    pos: TilePos,
    terrain: Terrain,
    origin: WorldCoord,
    blockers: &[&WorldObject],
) -> Vec<WorldObject> {
    if in_safe_zone(key, pos, config) {
        return Vec::new();
    }

    let mut rng = tile_rng(config.seed, key, pos);
    if rng.f32() >= config.spawn.densities.for_terrain(terrain) {
        return Vec::new();
    }

    let table = spawn_weights(terrain);
    let total: u32 = table.iter().map(|(_, weight)| weight).sum();
    if total == 0 {
        return Vec::new();
    }
    let Some(kind) = pick_weighted(table, rng.u32(0..total)) else {
        return Vec::new();
    };

    let tile = config.tile_size as f32;
    let radius = kind.collision_radius().min(tile / 2.0);
    let (left, top) = (origin.x as f32, origin.y as f32);

    for _ in 0..config.spawn.attempts {
        let x = left + radius + rng.f32() * (tile - radius * 2.0);
        let y = top + radius + rng.f32() * (tile - radius * 2.0);
        let clear = blockers
            .iter()
            .all(|other| !other.blocks(x, y, radius, config.spawn.buffer));
        if clear {
            tracing::trace!(%key, row = pos.row, col = pos.col, ?kind, "spawned object");
            return vec![WorldObject::new(kind, x, y)];
        }
    }

    Vec::new()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dense_config() -> WorldConfig {
        let mut config = WorldConfig::with_seed(9);
        config.spawn.densities.grass = 1.0;
        config.spawn.densities.water = 1.0;
        config
    }

    #[test]
    fn test_weighted_pick_covers_table() {
        let table = spawn_weights(Terrain::Sand);
        assert_eq!(pick_weighted(table, 0), Some(ObjectKind::Rock));
        assert_eq!(pick_weighted(table, 39), Some(ObjectKind::Rock));
        assert_eq!(pick_weighted(table, 40), Some(ObjectKind::SkillPoint));
        assert_eq!(pick_weighted(table, 99), Some(ObjectKind::Rabbit));
        assert_eq!(pick_weighted(table, 100), None);
    }

    #[test]
    fn test_tables_only_hold_persisted_kinds() {
        for terrain in Terrain::ALL {
            for (kind, weight) in spawn_weights(terrain) {
                assert!(*weight > 0);
                assert_ne!(*kind, ObjectKind::Player);
                assert_ne!(*kind, ObjectKind::Camp);
            }
        }
        assert_eq!(spawn_weights(Terrain::Water), &[(ObjectKind::Fish, 1)]);
    }

    #[test]
    fn test_spawn_is_deterministic() {
        let config = dense_config();
        let key = ChunkKey::containing(1024, -512, config.span());
        let pos = TilePos::new(3, 4);
        let origin = WorldCoord::new(1024 + 4 * 32, -512 + 3 * 32);

        let a = spawn_for_tile(&config, key, pos, Terrain::Grass, origin, &[]);
        let b = spawn_for_tile(&config, key, pos, Terrain::Grass, origin, &[]);
        assert_eq!(a.len(), 1);
        assert_eq!(a[0].kind(), b[0].kind());
        assert_eq!(a[0].position(), b[0].position());

        let (x, y) = a[0].position();
        assert!(x >= origin.x as f32 && x < (origin.x + 32) as f32);
        assert!(y >= origin.y as f32 && y < (origin.y + 32) as f32);
    }

    #[test]
    fn test_water_spawns_fish() {
        let config = dense_config();
        let spawned = spawn_for_tile(
            &config,
            ChunkKey::containing(5000, 5000, config.span()),
            TilePos::new(0, 0),
            Terrain::Water,
            WorldCoord::new(5120, 5120),
            &[],
        );
        assert_eq!(spawned.len(), 1);
        assert_eq!(spawned[0].kind(), ObjectKind::Fish);
    }

    #[test]
    fn test_zero_density_spawns_nothing() {
        let mut config = dense_config();
        config.spawn.densities.grass = 0.0;
        let spawned = spawn_for_tile(
            &config,
            ChunkKey::containing(512, 0, config.span()),
            TilePos::new(0, 0),
            Terrain::Grass,
            WorldCoord::new(512, 0),
            &[],
        );
        assert!(spawned.is_empty());
    }

    #[test]
    fn test_crowded_tile_spawns_nothing() {
        let config = dense_config();
        let origin = WorldCoord::new(512, 0);
        let camp = WorldObject::new(ObjectKind::Camp, 528.0, 16.0);
        let spawned = spawn_for_tile(
            &config,
            ChunkKey::containing(512, 0, config.span()),
            TilePos::new(0, 0),
            Terrain::Grass,
            origin,
            &[&camp],
        );
        assert!(spawned.is_empty());
    }

    #[test]
    fn test_safe_zone_only_in_origin_chunk() {
        let config = dense_config();
        let center = center_tile(config.chunk_size);
        assert_eq!(center, TilePos::new(7, 7));
        assert_eq!(camp_tile(config.chunk_size), TilePos::new(7, 8));

        assert!(in_safe_zone(ChunkKey::ORIGIN, center, &config));
        assert!(in_safe_zone(ChunkKey::ORIGIN, TilePos::new(9, 5), &config));
        assert!(!in_safe_zone(ChunkKey::ORIGIN, TilePos::new(10, 7), &config));
        let other = ChunkKey::containing(512, 0, config.span());
        assert!(!in_safe_zone(other, center, &config));
    }
}
