//! Persisted chunk records.
//!
//! One JSON document per chunk:
//!
//! ```json
//! {"type": "Chunk", "version": {...}, "id": "512,0", "position": [512, 0],
//!  "tiles": [{"type": "Tile", "position": [0, 0], "objects": [...],
//!             "is_explored": false, "texture": {...},
//!             "terrain": "grass", "biome": "forest"}, ...]}
//! ```
//!
//! Water tiles omit `objects`; their inhabitants are regenerated on load.

use hinterland_common::{ChunkKey, SchemaVersion, TilePos};
use serde::{Deserialize, Serialize};

use crate::autotile::TextureDescriptor;
use crate::terrain::{Biome, Terrain};

/// Record type tag of a chunk document.
pub const CHUNK_TAG: &str = "Chunk";

/// Record type tag of a tile entry.
pub const TILE_TAG: &str = "Tile";

/// A persisted chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkRecord {
    /// Record type, always `"Chunk"`
    #[serde(rename = "type")]
    pub kind: String,
    /// Schema version the record was written with
    #[serde(default)]
    pub version: SchemaVersion,
    /// Chunk key string
    pub id: ChunkKey,
    /// Top-left corner in world pixels; must agree with `id`
    pub position: [i64; 2],
    /// Row-major tiles
    pub tiles: Vec<TileRecord>,
}

/// A persisted tile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileRecord {
    /// Record type, always `"Tile"`
    #[serde(rename = "type")]
    pub kind: String,
    /// Grid position `[row, col]`
    pub position: TilePos,
    /// Objects on the tile; absent when they should be regenerated
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub objects: Option<Vec<ObjectRecord>>,
    /// Whether the player has seen the tile
    #[serde(default)]
    pub is_explored: bool,
    /// Resolved texture, if it was known when saved
    #[serde(default)]
    pub texture: Option<TextureDescriptor>,
    /// Ground terrain
    pub terrain: Terrain,
    /// Biome chosen at generation
    pub biome: Biome,
}

/// A persisted object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectRecord {
    /// Object tag, e.g. `"tree"`
    #[serde(rename = "type")]
    pub kind: String,
    /// World-pixel center
    pub position: [f32; 2],
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tile_record_json_shape() {
        let record = TileRecord {
            kind: TILE_TAG.into(),
            position: TilePos::new(2, 3),
            objects: Some(vec![ObjectRecord {
                kind: "rock".into(),
                position: [80.0, 112.0],
            }]),
            is_explored: true,
            texture: Some(TextureDescriptor::Uniform {
                terrain: Terrain::Sand,
            }),
            terrain: Terrain::Sand,
            biome: Biome::Desert,
        };

        let value = serde_json::to_value(&record).expect("serialize");
        assert_eq!(value["type"], "Tile");
        assert_eq!(value["position"], serde_json::json!([2, 3]));
        assert_eq!(value["objects"][0]["type"], "rock");
        assert_eq!(value["texture"]["kind"], "uniform");
        assert_eq!(value["terrain"], "sand");
        assert_eq!(value["biome"], "desert");
    }

    #[test]
    fn test_water_tile_omits_objects() {
        let record = TileRecord {
            kind: TILE_TAG.into(),
            position: TilePos::new(0, 0),
            objects: None,
            is_explored: false,
            texture: None,
            terrain: Terrain::Water,
            biome: Biome::River,
        };
        let value = serde_json::to_value(&record).expect("serialize");
        assert!(value.get("objects").is_none());
        assert!(value["texture"].is_null());
    }

    #[test]
    fn test_chunk_record_rejects_bad_key() {
        let json = r#"{"type":"Chunk","id":"nope","position":[0,0],"tiles":[]}"#;
        assert!(serde_json::from_str::<ChunkRecord>(json).is_err());
    }

    #[test]
    fn test_missing_version_defaults_to_current() {
        let json = r#"{"type":"Chunk","id":"0,-512","position":[0,-512],"tiles":[]}"#;
        let record: ChunkRecord = serde_json::from_str(json).expect("parse");
        assert_eq!(record.version, SchemaVersion::CHUNK_RECORD);
        assert_eq!(record.id.y(), -512);
    }
}
