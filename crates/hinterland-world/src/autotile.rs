//! Autotile resolution.
//!
//! A tile's texture depicts the corner point it shares with its right,
//! bottom and bottom-right neighbors, so it is chosen from the terrains of
//! those four tiles:
//!
//! ```text
//! TL (self)    TR (right)
//! BL (bottom)  BR (bottom-right)
//! ```
//!
//! ## Corner Layout
//!
//! Which corners hold a given terrain is a 4-bit mask (TL=1, TR=2, BL=4,
//! BR=8). The 14 partial masks index a 5×3 block of atlas cells; the center
//! cell `(1, 1)` holds the fully covered variant used by overlays:
//!
//! ```text
//!        col 0              col 1              col 2
//! row 0  OuterTopLeft       EdgeTop            OuterTopRight
//! row 1  EdgeLeft           (Full)             EdgeRight
//! row 2  OuterBottomLeft    EdgeBottom         OuterBottomRight
//! row 3  InnerBottomRight   InnerBottomLeft    DiagonalMain
//! row 4  InnerTopRight      InnerTopLeft       DiagonalAnti
//! ```
//!
//! Shorelines stack one block per shore terrain (grass rows 0-4, sand
//! 5-9, clay 10-14).

use serde::{Deserialize, Serialize};

use crate::terrain::Terrain;

/// Terrains at the four sampled corners: `[self, right, bottom, bottom_right]`.
pub type CornerTerrains = [Terrain; 4];

/// Rows per configuration block in the atlas.
pub const BLOCK_ROWS: u8 = 5;

/// Set of corners, as a 4-bit mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CornerMask(u8);

impl CornerMask {
    /// Top-left corner (the tile itself).
    pub const TL: u8 = 1;
    /// Top-right corner (right neighbor).
    pub const TR: u8 = 2;
    /// Bottom-left corner (bottom neighbor).
    pub const BL: u8 = 4;
    /// Bottom-right corner (bottom-right neighbor).
    pub const BR: u8 = 8;

    /// No corners.
    pub const NONE: Self = Self(0);
    /// All four corners.
    pub const ALL: Self = Self(15);

    /// Creates a mask from raw bits; bits above the fourth are dropped.
    #[must_use]
    pub const fn new(bits: u8) -> Self {
        Self(bits & 15)
    }

    /// Builds the mask of corners whose terrain satisfies `pred`.
    #[must_use]
    pub fn matching(corners: &CornerTerrains, pred: impl Fn(Terrain) -> bool) -> Self {
        let bits = corners
            .iter()
            .enumerate()
            .filter(|(_, terrain)| pred(**terrain))
            .fold(0u8, |acc, (i, _)| acc | (1 << i));
        Self(bits)
    }

    /// Raw bits.
    #[must_use]
    pub const fn bits(self) -> u8 {
        self.0
    }
}

/// One of the 14 partial corner arrangements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CornerConfig {
    /// Only BR covered
    OuterTopLeft,
    /// BL and BR covered
    EdgeTop,
    /// Only BL covered
    OuterTopRight,
    /// TR and BR covered
    EdgeLeft,
    /// TL and BL covered
    EdgeRight,
    /// Only TR covered
    OuterBottomLeft,
    /// TL and TR covered
    EdgeBottom,
    /// Only TL covered
    OuterBottomRight,
    /// All but BR covered
    InnerBottomRight,
    /// All but BL covered
    InnerBottomLeft,
    /// TL and BR covered
    DiagonalMain,
    /// All but TR covered
    InnerTopRight,
    /// All but TL covered
    InnerTopLeft,
    /// TR and BL covered
    DiagonalAnti,
}

impl CornerConfig {
    /// All configurations in id order.
    pub const ALL: [Self; 14] = [
        Self::OuterTopLeft,
        Self::EdgeTop,
        Self::OuterTopRight,
        Self::EdgeLeft,
        Self::EdgeRight,
        Self::OuterBottomLeft,
        Self::EdgeBottom,
        Self::OuterBottomRight,
        Self::InnerBottomRight,
        Self::InnerBottomLeft,
        Self::DiagonalMain,
        Self::InnerTopRight,
        Self::InnerTopLeft,
        Self::DiagonalAnti,
    ];

    /// Stable configuration id (0-13).
    #[must_use]
    pub const fn id(self) -> u8 {
        self as u8
    }

    /// Covered corners.
    #[must_use]
    pub const fn mask(self) -> CornerMask {
        const TL: u8 = CornerMask::TL;
        const TR: u8 = CornerMask::TR;
        const BL: u8 = CornerMask::BL;
        const BR: u8 = CornerMask::BR;
        CornerMask(match self {
            Self::OuterTopLeft => BR,
            Self::EdgeTop => BL | BR,
            Self::OuterTopRight => BL,
            Self::EdgeLeft => TR | BR,
            Self::EdgeRight => TL | BL,
            Self::OuterBottomLeft => TR,
            Self::EdgeBottom => TL | TR,
            Self::OuterBottomRight => TL,
            Self::InnerBottomRight => TL | TR | BL,
            Self::InnerBottomLeft => TL | TR | BR,
            Self::DiagonalMain => TL | BR,
            Self::InnerTopRight => TL | BL | BR,
            Self::InnerTopLeft => TR | BL | BR,
            Self::DiagonalAnti => TR | BL,
        })
    }

    /// Looks up the configuration for an exact mask.
    ///
    /// Returns `None` for the empty and the full mask.
    #[must_use]
    pub fn from_mask(mask: CornerMask) -> Option<Self> {
        Self::ALL.into_iter().find(|config| config.mask() == mask)
    }

    /// `(row_offset, col)` of this configuration inside its atlas block.
    #[must_use]
    pub const fn cell(self) -> (u8, u8) {
        match self {
            Self::OuterTopLeft => (0, 0),
            Self::EdgeTop => (0, 1),
            Self::OuterTopRight => (0, 2),
            Self::EdgeLeft => (1, 0),
            Self::EdgeRight => (1, 2),
            Self::OuterBottomLeft => (2, 0),
            Self::EdgeBottom => (2, 1),
            Self::OuterBottomRight => (2, 2),
            Self::InnerBottomRight => (3, 0),
            Self::InnerBottomLeft => (3, 1),
            Self::DiagonalMain => (3, 2),
            Self::InnerTopRight => (4, 0),
            Self::InnerTopLeft => (4, 1),
            Self::DiagonalAnti => (4, 2),
        }
    }
}

/// Overlay coverage: one of the partial configurations or the full tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlayConfig {
    /// All four corners covered
    Full,
    /// Partial coverage
    Partial(CornerConfig),
}

impl OverlayConfig {
    /// Overlay for a mask; `None` when no corner is covered.
    #[must_use]
    pub fn from_mask(mask: CornerMask) -> Option<Self> {
        match mask {
            CornerMask::NONE => None,
            CornerMask::ALL => Some(Self::Full),
            partial => CornerConfig::from_mask(partial).map(Self::Partial),
        }
    }

    /// `(row_offset, col)` inside the overlay atlas block.
    #[must_use]
    pub const fn cell(self) -> (u8, u8) {
        match self {
            Self::Full => (1, 1),
            Self::Partial(config) => config.cell(),
        }
    }
}

/// Land terrain that has a shoreline tileset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShoreTerrain {
    /// Grass meeting water
    Grass,
    /// Sand meeting water
    Sand,
    /// Clay meeting water
    Clay,
}

impl ShoreTerrain {
    /// Maps a terrain to its shoreline set, if it has one.
    #[must_use]
    pub const fn from_terrain(terrain: Terrain) -> Option<Self> {
        match terrain {
            Terrain::Grass => Some(Self::Grass),
            Terrain::Sand => Some(Self::Sand),
            Terrain::Clay => Some(Self::Clay),
            Terrain::Water | Terrain::Snow | Terrain::Dirt => None,
        }
    }

    /// First atlas row of this shoreline block.
    #[must_use]
    pub const fn start_row(self) -> u8 {
        match self {
            Self::Grass => 0,
            Self::Sand => BLOCK_ROWS,
            Self::Clay => BLOCK_ROWS * 2,
        }
    }
}

/// Composite texture of a tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TextureDescriptor {
    /// All four corners share one terrain
    Uniform {
        /// The shared terrain
        terrain: Terrain,
    },
    /// Land meeting water; `config` describes where the land is
    Shoreline {
        /// Land terrain
        shore: ShoreTerrain,
        /// Corners covered by land
        config: CornerConfig,
    },
    /// Any other mix, drawn as base corners plus grass and snow overlays
    Blended {
        /// Base texture per corner; `None` where grass or snow is drawn by overlay
        corners: [Option<Terrain>; 4],
        /// Coverage of grass-or-snow corners, composited first
        grass_overlay: Option<OverlayConfig>,
        /// Coverage of snow corners, composited second
        snow_overlay: Option<OverlayConfig>,
    },
}

impl TextureDescriptor {
    /// Atlas cell of a shoreline texture.
    #[must_use]
    pub const fn shoreline_cell(&self) -> Option<(u8, u8)> {
        match self {
            Self::Shoreline { shore, config } => {
                let (row, col) = config.cell();
                Some((shore.start_row() + row, col))
            },
            Self::Uniform { .. } | Self::Blended { .. } => None,
        }
    }
}

/// Resolves the texture for the corner terrains `[self, right, bottom, bottom_right]`.
#[must_use]
pub fn resolve(corners: CornerTerrains) -> TextureDescriptor {
    let first = corners[0];
    if corners.iter().all(|t| *t == first) {
        return TextureDescriptor::Uniform { terrain: first };
    }

    if let Some(texture) = resolve_shoreline(&corners) {
        return texture;
    }

    TextureDescriptor::Blended {
        corners: corners.map(|t| (!t.is_overlay()).then_some(t)),
        grass_overlay: OverlayConfig::from_mask(CornerMask::matching(&corners, Terrain::is_overlay)),
        snow_overlay: OverlayConfig::from_mask(CornerMask::matching(&corners, |t| {
            t == Terrain::Snow
        })),
    }
}

/// Exactly water plus one shore terrain; anything else is not a shoreline.
fn resolve_shoreline(corners: &CornerTerrains) -> Option<TextureDescriptor> {
    if !corners.contains(&Terrain::Water) {
        return None;
    }
    let land = *corners.iter().find(|t| **t != Terrain::Water)?;
    if corners.iter().any(|t| *t != Terrain::Water && *t != land) {
        return None;
    }
    let shore = ShoreTerrain::from_terrain(land)?;
    let config = CornerConfig::from_mask(CornerMask::matching(corners, |t| t == land))?;
    Some(TextureDescriptor::Shoreline { shore, config })
}
