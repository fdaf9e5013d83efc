//! Coordinate types for world pixels, chunk keys, and tile positions.
//!
//! Everything in the world is addressed in world-pixel units. A chunk spans
//! `chunk_size * tile_size` pixels per axis; its [`ChunkKey`] is the
//! chunk-aligned top-left corner of that square.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoordError;

/// World coordinate in pixels (global position).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct WorldCoord {
    /// X coordinate in world space
    pub x: i64,
    /// Y coordinate in world space
    pub y: i64,
}

impl WorldCoord {
    /// Creates a new world coordinate.
    #[must_use]
    pub const fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }

    /// Converts to the key of the chunk containing this coordinate.
    #[must_use]
    pub const fn to_chunk_key(self, span: i64) -> ChunkKey {
        ChunkKey::containing(self.x, self.y, span)
    }

    /// Snaps the coordinate down to the tile grid.
    #[must_use]
    pub const fn snap_to_tile(self, tile_size: i64) -> Self {
        Self {
            x: self.x.div_euclid(tile_size) * tile_size,
            y: self.y.div_euclid(tile_size) * tile_size,
        }
    }

    /// Returns this coordinate moved by the given pixel offsets.
    #[must_use]
    pub const fn offset(self, dx: i64, dy: i64) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }
}

/// Identifies a chunk by the world-pixel position of its top-left corner.
///
/// The string form is `"{x},{y}"`; it is used for registry keys and
/// persisted file names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct ChunkKey {
    x: i64,
    y: i64,
}

impl ChunkKey {
    /// Key of the chunk that contains the world origin.
    pub const ORIGIN: Self = Self { x: 0, y: 0 };

    /// Returns the key of the chunk containing world position `(x, y)`.
    ///
    /// Uses floor division so negative coordinates land in the chunk to
    /// their upper-left, never in the chunk at zero.
    #[must_use]
    pub const fn containing(x: i64, y: i64, span: i64) -> Self {
        Self {
            x: x.div_euclid(span) * span,
            y: y.div_euclid(span) * span,
        }
    }

    /// Builds a key from an already aligned corner, checking alignment.
    pub fn aligned(x: i64, y: i64, span: i64) -> Result<Self, CoordError> {
        if x.rem_euclid(span) != 0 || y.rem_euclid(span) != 0 {
            return Err(CoordError::Misaligned {
                key: format!("{x},{y}"),
                span,
            });
        }
        Ok(Self { x, y })
    }

    /// Left edge in world pixels.
    #[must_use]
    pub const fn x(self) -> i64 {
        self.x
    }

    /// Top edge in world pixels.
    #[must_use]
    pub const fn y(self) -> i64 {
        self.y
    }

    /// Returns the top-left corner as a world coordinate.
    #[must_use]
    pub const fn origin(self) -> WorldCoord {
        WorldCoord::new(self.x, self.y)
    }

    /// Returns the key `dx`/`dy` chunks away from this one.
    #[must_use]
    pub const fn offset(self, dx: i64, dy: i64, span: i64) -> Self {
        Self {
            x: self.x + dx * span,
            y: self.y + dy * span,
        }
    }

    /// Returns the chunk-grid index (key divided by the span).
    #[must_use]
    pub const fn grid(self, span: i64) -> (i64, i64) {
        (self.x.div_euclid(span), self.y.div_euclid(span))
    }

    /// Returns the world-space rectangle covered by this chunk.
    #[must_use]
    pub const fn rect(self, span: i64) -> WorldRect {
        WorldRect::new(self.x, self.y, span, span)
    }
}

impl fmt::Display for ChunkKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.x, self.y)
    }
}

impl FromStr for ChunkKey {
    type Err = CoordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || CoordError::MalformedKey(s.to_string());
        let (x, y) = s.split_once(',').ok_or_else(malformed)?;
        let x = x.trim().parse().map_err(|_| malformed())?;
        let y = y.trim().parse().map_err(|_| malformed())?;
        Ok(Self { x, y })
    }
}

impl From<ChunkKey> for String {
    fn from(key: ChunkKey) -> Self {
        key.to_string()
    }
}

impl TryFrom<String> for ChunkKey {
    type Error = CoordError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Grid-local tile position within a chunk.
///
/// Serialized as a `[row, col]` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "(u16, u16)", into = "(u16, u16)")]
pub struct TilePos {
    /// Row index (y axis)
    pub row: u16,
    /// Column index (x axis)
    pub col: u16,
}

impl TilePos {
    /// Creates a new tile position.
    #[must_use]
    pub const fn new(row: u16, col: u16) -> Self {
        Self { row, col }
    }

    /// Converts to linear index for row-major array access.
    #[must_use]
    pub const fn to_index(self, chunk_size: u16) -> usize {
        (self.row as usize) * (chunk_size as usize) + (self.col as usize)
    }

    /// Creates from a row-major linear index.
    #[must_use]
    pub const fn from_index(index: usize, chunk_size: u16) -> Self {
        let size = chunk_size as usize;
        Self {
            row: (index / size) as u16,
            col: (index % size) as u16,
        }
    }
}

impl From<(u16, u16)> for TilePos {
    fn from((row, col): (u16, u16)) -> Self {
        Self { row, col }
    }
}

impl From<TilePos> for (u16, u16) {
    fn from(pos: TilePos) -> Self {
        (pos.row, pos.col)
    }
}

/// Axis-aligned rectangle in world pixels, half-open on the right and bottom.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WorldRect {
    /// X coordinate of the left edge.
    pub x: i64,
    /// Y coordinate of the top edge.
    pub y: i64,
    /// Width of the rectangle.
    pub width: i64,
    /// Height of the rectangle.
    pub height: i64,
}

impl WorldRect {
    /// Creates a new rectangle.
    #[must_use]
    pub const fn new(x: i64, y: i64, width: i64, height: i64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Creates a rectangle from a center point and size.
    #[must_use]
    pub const fn from_center(center: WorldCoord, width: i64, height: i64) -> Self {
        Self {
            x: center.x - width / 2,
            y: center.y - height / 2,
            width,
            height,
        }
    }

    /// Returns the right edge x coordinate (exclusive).
    #[must_use]
    pub const fn right(&self) -> i64 {
        self.x + self.width
    }

    /// Returns the bottom edge y coordinate (exclusive).
    #[must_use]
    pub const fn bottom(&self) -> i64 {
        self.y + self.height
    }

    /// Returns the center point of the rectangle.
    #[must_use]
    pub const fn center(&self) -> WorldCoord {
        WorldCoord::new(self.x + self.width / 2, self.y + self.height / 2)
    }

    /// Checks if the rectangle contains a point.
    #[must_use]
    pub const fn contains(&self, point: WorldCoord) -> bool {
        point.x >= self.x && point.x < self.right() && point.y >= self.y && point.y < self.bottom()
    }

    /// Checks if this rectangle intersects with another.
    #[must_use]
    pub const fn intersects(&self, other: &Self) -> bool {
        self.x < other.right()
            && self.right() > other.x
            && self.y < other.bottom()
            && self.bottom() > other.y
    }

    /// Returns the rectangle grown by `amount` pixels on every side.
    #[must_use]
    pub const fn expanded(&self, amount: i64) -> Self {
        Self {
            x: self.x - amount,
            y: self.y - amount,
            width: self.width + amount * 2,
            height: self.height + amount * 2,
        }
    }
}
