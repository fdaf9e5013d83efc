//! Seeded coherent noise with independent climate channels.

use std::fmt;
use std::str::FromStr;

use noise::{NoiseFn, OpenSimplex};

/// A named noise channel sampled during terrain generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NoiseChannel {
    /// Elevation; selects the biome family
    Altitude,
    /// Moisture; refines the biome within a family
    Rainfall,
    /// River network; a narrow band around zero becomes water
    River,
}

impl NoiseChannel {
    /// All channels in sampling order.
    pub const ALL: [Self; 3] = [Self::Altitude, Self::Rainfall, Self::River];

    const fn index(self) -> usize {
        match self {
            Self::Altitude => 0,
            Self::Rainfall => 1,
            Self::River => 2,
        }
    }

    /// Channel name as used in configuration and logs.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Altitude => "altitude",
            Self::Rainfall => "rainfall",
            Self::River => "river",
        }
    }
}

impl fmt::Display for NoiseChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for NoiseChannel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|channel| channel.name() == s)
            .ok_or_else(|| format!("unknown noise channel: {s}"))
    }
}

/// Deterministic 2D noise source shared by all generation tasks.
///
/// Each channel is its own `OpenSimplex` instance seeded from the world seed
/// plus the channel index, so the channels are uncorrelated but fully
/// reproducible from the seed alone.
#[derive(Debug, Clone)]
pub struct NoiseField {
    seed: u32,
    scale: f64,
    river_scale: f64,
    channels: [OpenSimplex; 3],
}

impl NoiseField {
    /// Creates a noise field for a world seed.
    #[must_use]
    pub fn new(seed: u32, scale: f64, river_scale: f64) -> Self {
        Self {
            seed,
            scale,
            river_scale,
            channels: [
                OpenSimplex::new(seed),
                OpenSimplex::new(seed.wrapping_add(1)),
                OpenSimplex::new(seed.wrapping_add(2)),
            ],
        }
    }

    /// Returns the world seed.
    #[must_use]
    pub const fn seed(&self) -> u32 {
        self.seed
    }

    /// Samples a channel at a world-pixel position.
    ///
    /// The result is continuous and lies roughly in `[-1, 1]`.
    #[must_use]
    pub fn sample(&self, x: f64, y: f64, channel: NoiseChannel) -> f64 {
        let scale = match channel {
            NoiseChannel::River => self.river_scale,
            NoiseChannel::Altitude | NoiseChannel::Rainfall => self.scale,
        };
        self.channels[channel.index()].get([x * scale, y * scale])
    }
}
