//! Procedural world generation.

use std::sync::Arc;

use hinterland_common::{ChunkKey, WorldCoord};

use crate::chunk::{Chunk, ChunkResult};
use crate::config::WorldConfig;
use crate::noise_field::{NoiseChannel, NoiseField};
use crate::record::ChunkRecord;
use crate::terrain::{classify, Biome, ClimateSample, Terrain};

/// Procedural world generator.
///
/// Immutable once built; worker threads share it through an `Arc`.
#[derive(Debug, Clone)]
pub struct WorldGenerator {
    /// Configuration
    config: Arc<WorldConfig>,
    /// Climate noise
    noise: NoiseField,
}

impl WorldGenerator {
    /// Creates a new generator with the given config.
    ///
    /// Out-of-range values are clamped the way [`WorldConfig::validate`]
    /// does; an already valid config is shared as is.
    #[must_use]
    pub fn new(config: Arc<WorldConfig>) -> Self {
        let mut checked = WorldConfig::clone(&config);
        checked.validate();
        let config = if checked == *config {
            config
        } else {
            Arc::new(checked)
        };
        let noise = NoiseField::new(config.seed, config.noise_scale, config.river_scale);
        Self { config, noise }
    }

    /// Creates a generator with default config.
    #[must_use]
    pub fn with_seed(seed: u32) -> Self {
        Self::new(Arc::new(WorldConfig::with_seed(seed)))
    }

    /// Returns the generator configuration.
    #[must_use]
    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    /// Returns the noise field.
    #[must_use]
    pub const fn noise(&self) -> &NoiseField {
        &self.noise
    }

    /// Samples all climate channels at a world pixel.
    #[must_use]
    pub fn climate_at(&self, coord: WorldCoord) -> ClimateSample {
        let (x, y) = (coord.x as f64, coord.y as f64);
        ClimateSample {
            altitude: self.noise.sample(x, y, NoiseChannel::Altitude),
            rainfall: self.noise.sample(x, y, NoiseChannel::Rainfall),
            river: self.noise.sample(x, y, NoiseChannel::River),
        }
    }

    /// Biome and terrain at a world pixel.
    #[must_use]
    pub fn classify_at(&self, coord: WorldCoord) -> (Biome, Terrain) {
        classify(self.climate_at(coord), &self.config.thresholds)
    }

    /// Generates a chunk at the given key.
    #[must_use]
    pub fn generate_chunk(&self, key: ChunkKey) -> Chunk {
        Chunk::generate(key, self)
    }

    /// Rebuilds a chunk from a persisted record.
    pub fn load_chunk(&self, record: ChunkRecord) -> ChunkResult<Chunk> {
        Chunk::from_record(record, self)
    }
}
