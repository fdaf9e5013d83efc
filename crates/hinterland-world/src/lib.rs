//! # Hinterland World
//!
//! The chunked procedural world engine.
//!
//! This crate handles:
//! - Seeded climate noise and biome classification
//! - Autotile texture resolution from neighboring terrains
//! - Chunk generation, object spawning and JSON persistence
//! - Background chunk streaming around the player
//! - The map echo used by the minimap

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod autotile;
pub mod chunk;
pub mod config;
pub mod generation;
pub mod map_echo;
pub mod noise_field;
pub mod object;
pub mod pool;
pub mod record;
pub mod registry;
pub mod spawn;
pub mod store;
pub mod terrain;
pub mod tile;
pub mod world_map;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::autotile::{resolve, CornerConfig, OverlayConfig, ShoreTerrain, TextureDescriptor};
    pub use crate::chunk::*;
    pub use crate::config::*;
    pub use crate::generation::*;
    pub use crate::map_echo::*;
    pub use crate::noise_field::*;
    pub use crate::object::*;
    pub use crate::pool::*;
    pub use crate::record::*;
    pub use crate::registry::*;
    pub use crate::store::*;
    pub use crate::terrain::*;
    pub use crate::tile::*;
    pub use crate::world_map::*;
}

pub use prelude::*;
