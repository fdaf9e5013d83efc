//! Terrain classes, biomes, and the noise-to-biome decision table.

use serde::{Deserialize, Serialize};

use crate::config::TerrainThresholds;

/// Ground material of a tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Terrain {
    /// Grass
    Grass,
    /// Sand
    Sand,
    /// Clay
    Clay,
    /// Water
    Water,
    /// Snow
    Snow,
    /// Dirt
    Dirt,
}

impl Terrain {
    /// All terrains.
    pub const ALL: [Self; 6] = [
        Self::Grass,
        Self::Sand,
        Self::Clay,
        Self::Water,
        Self::Snow,
        Self::Dirt,
    ];

    /// Minimap color.
    #[must_use]
    pub const fn color(self) -> [u8; 3] {
        match self {
            Self::Grass => [86, 152, 62],
            Self::Sand => [222, 204, 140],
            Self::Clay => [160, 98, 70],
            Self::Water => [52, 110, 190],
            Self::Snow => [236, 242, 248],
            Self::Dirt => [120, 88, 56],
        }
    }

    /// Whether this terrain has a dedicated shoreline tileset against water.
    #[must_use]
    pub const fn is_shore(self) -> bool {
        matches!(self, Self::Grass | Self::Sand | Self::Clay)
    }

    /// Whether this terrain is drawn as an overlay instead of a base corner.
    #[must_use]
    pub const fn is_overlay(self) -> bool {
        matches!(self, Self::Grass | Self::Snow)
    }
}

/// Biome (tile type) picked by the decision table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Biome {
    /// High and wet
    Tundra,
    /// High and dry
    Mountain,
    /// Low and wet
    Swamp,
    /// Low and dry
    Desert,
    /// Temperate, very wet
    Rainforest,
    /// Temperate, wet
    Forest,
    /// Temperate, dry
    Grassland,
    /// River channel override
    River,
}

impl Biome {
    /// Terrain the biome paints by default.
    #[must_use]
    pub const fn terrain(self) -> Terrain {
        match self {
            Self::Tundra | Self::Mountain => Terrain::Snow,
            Self::Swamp => Terrain::Clay,
            Self::Desert => Terrain::Sand,
            Self::Rainforest | Self::Forest | Self::Grassland => Terrain::Grass,
            Self::River => Terrain::Water,
        }
    }
}

/// The three noise samples taken at a tile.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClimateSample {
    /// Altitude channel
    pub altitude: f64,
    /// Rainfall channel
    pub rainfall: f64,
    /// River channel
    pub river: f64,
}

/// Classifies a climate sample into a biome and its terrain.
///
/// The river band takes precedence over every biome.
#[must_use]
pub fn classify(sample: ClimateSample, thresholds: &TerrainThresholds) -> (Biome, Terrain) {
    if sample.river.abs() < thresholds.river_band {
        return (Biome::River, Terrain::Water);
    }

    let wet = sample.rainfall > thresholds.wet_rainfall;
    let biome = if sample.altitude > thresholds.high_altitude {
        if wet {
            Biome::Tundra
        } else {
            Biome::Mountain
        }
    } else if sample.altitude < thresholds.low_altitude {
        if wet {
            Biome::Swamp
        } else {
            Biome::Desert
        }
    } else if sample.rainfall > thresholds.rainforest_rainfall {
        Biome::Rainforest
    } else if wet {
        Biome::Forest
    } else {
        Biome::Grassland
    };

    (biome, biome.terrain())
}
