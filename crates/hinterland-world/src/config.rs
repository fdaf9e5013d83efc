//! World configuration.
//!
//! All magic numbers of terrain generation, spawning and streaming live
//! here so they can be tuned from the engine's TOML file.

use serde::{Deserialize, Serialize};

use crate::terrain::Terrain;

/// Noise thresholds for the biome decision table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerrainThresholds {
    /// Altitude above which the mountain family (snow) is chosen
    pub high_altitude: f64,
    /// Altitude below which the lowland family (clay/sand) is chosen
    pub low_altitude: f64,
    /// Rainfall above which a family picks its wet variant
    pub wet_rainfall: f64,
    /// Rainfall above which temperate land becomes rainforest
    pub rainforest_rainfall: f64,
    /// Half-width of the band around zero where the river channel forces water
    pub river_band: f64,
}

impl Default for TerrainThresholds {
    fn default() -> Self {
        Self {
            high_altitude: 0.3,
            low_altitude: -0.3,
            wet_rainfall: 0.0,
            rainforest_rainfall: 0.3,
            river_band: 0.05,
        }
    }
}

/// Per-terrain probability that a tile gets a spawn roll.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpawnDensities {
    /// Grass tiles
    pub grass: f32,
    /// Sand tiles
    pub sand: f32,
    /// Clay tiles
    pub clay: f32,
    /// Water tiles
    pub water: f32,
    /// Snow tiles
    pub snow: f32,
    /// Dirt tiles
    pub dirt: f32,
}

impl Default for SpawnDensities {
    fn default() -> Self {
        Self {
            grass: 0.18,
            sand: 0.06,
            clay: 0.12,
            water: 0.04,
            snow: 0.08,
            dirt: 0.05,
        }
    }
}

impl SpawnDensities {
    /// Returns the density for a terrain.
    #[must_use]
    pub const fn for_terrain(&self, terrain: Terrain) -> f32 {
        match terrain {
            Terrain::Grass => self.grass,
            Terrain::Sand => self.sand,
            Terrain::Clay => self.clay,
            Terrain::Water => self.water,
            Terrain::Snow => self.snow,
            Terrain::Dirt => self.dirt,
        }
    }
}

/// Object spawning parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpawnConfig {
    /// Spawn densities per terrain
    pub densities: SpawnDensities,
    /// Placement attempts per spawn slot before giving up
    pub attempts: u32,
    /// Extra clearance (pixels) kept between collidable objects
    pub buffer: f32,
    /// Radius in tiles of the spawn-safe zone around the origin chunk center
    pub safe_radius: u16,
}

impl Default for SpawnConfig {
    fn default() -> Self {
        Self {
            densities: SpawnDensities::default(),
            attempts: 4,
            buffer: 6.0,
            safe_radius: 2,
        }
    }
}

/// World generation and streaming configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// World seed
    pub seed: u32,
    /// Tile edge length in world pixels
    pub tile_size: u32,
    /// Tiles per chunk edge
    pub chunk_size: u16,
    /// Scale applied to world pixels before sampling altitude and rainfall
    pub noise_scale: f64,
    /// Scale applied to world pixels before sampling the river channel
    pub river_scale: f64,
    /// Biome decision thresholds
    pub thresholds: TerrainThresholds,
    /// Viewport width in pixels
    pub window_width: u32,
    /// Viewport height in pixels
    pub window_height: u32,
    /// Pixels added around the viewport when deciding what to load
    pub visibility_buffer: i64,
    /// Pixels beyond the loaded area after which chunks are evicted
    pub eviction_distance: i64,
    /// Background worker threads for generation and loading
    pub worker_threads: usize,
    /// Maximum queued background jobs
    pub queue_capacity: usize,
    /// Whether chunks spawn and restore objects
    pub load_objects: bool,
    /// Object spawning parameters
    pub spawn: SpawnConfig,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            tile_size: 32,
            chunk_size: 16,
            noise_scale: 0.0008,
            river_scale: 0.0015,
            thresholds: TerrainThresholds::default(),
            window_width: 1280,
            window_height: 720,
            visibility_buffer: 64,
            eviction_distance: 512,
            worker_threads: 4,
            queue_capacity: 64,
            load_objects: true,
            spawn: SpawnConfig::default(),
        }
    }
}

impl WorldConfig {
    /// Creates a config with the given seed and defaults elsewhere.
    #[must_use]
    pub fn with_seed(seed: u32) -> Self {
        Self {
            seed,
            ..Default::default()
        }
    }

    /// Chunk edge length in world pixels.
    #[must_use]
    pub const fn span(&self) -> i64 {
        self.chunk_size as i64 * self.tile_size as i64
    }

    /// Tiles per chunk.
    #[must_use]
    pub const fn tiles_per_chunk(&self) -> usize {
        self.chunk_size as usize * self.chunk_size as usize
    }

    /// Tile edge length as a signed pixel distance.
    #[must_use]
    pub const fn tile_px(&self) -> i64 {
        self.tile_size as i64
    }

    /// Validate and clamp configuration values to sensible ranges.
    pub fn validate(&mut self) {
        self.tile_size = self.tile_size.clamp(4, 256);
        self.chunk_size = self.chunk_size.clamp(4, 128);
        self.window_width = self.window_width.clamp(320, 7680);
        self.window_height = self.window_height.clamp(240, 4320);
        self.visibility_buffer = self.visibility_buffer.max(0);
        self.eviction_distance = self.eviction_distance.max(self.tile_px());
        self.worker_threads = self.worker_threads.clamp(1, 32);
        self.queue_capacity = self.queue_capacity.max(1);
        self.spawn.attempts = self.spawn.attempts.clamp(1, 32);
        self.spawn.buffer = self.spawn.buffer.max(0.0);
        self.spawn.safe_radius = self.spawn.safe_radius.min(self.chunk_size / 2);

        let thresholds = &mut self.thresholds;
        if thresholds.low_altitude > thresholds.high_altitude {
            std::mem::swap(&mut thresholds.low_altitude, &mut thresholds.high_altitude);
        }
        thresholds.river_band = thresholds.river_band.abs();
    }
}
