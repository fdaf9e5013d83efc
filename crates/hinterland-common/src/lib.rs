//! # Hinterland Common
//!
//! Common types shared by the Hinterland world engine:
//! - Coordinate types (world pixels, chunk keys, tile positions, rectangles)
//! - Entity IDs
//! - Schema versions for persisted chunks
//! - Coordinate error types

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod coords;
pub mod error;
pub mod ids;
pub mod version;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::coords::*;
    pub use crate::error::*;
    pub use crate::ids::*;
    pub use crate::version::*;
}

pub use prelude::*;
