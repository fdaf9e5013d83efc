//! Objects that live on tiles: resources, pickups, ambient NPCs, landmarks.

use hinterland_common::EntityId;
use serde::{Deserialize, Serialize};

use crate::chunk::{ChunkError, ChunkResult};
use crate::record::ObjectRecord;

/// Kind of a world object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKind {
    /// Harvestable tree
    Tree,
    /// Harvestable rock
    Rock,
    /// Skill point pickup
    SkillPoint,
    /// Ambient NPC
    Rabbit,
    /// Ambient NPC
    Deer,
    /// Hostile NPC
    Wolf,
    /// Hostile NPC
    Slime,
    /// Ambient water NPC
    Fish,
    /// The starting camp landmark
    Camp,
    /// The player character
    Player,
}

impl ObjectKind {
    /// Kinds that may be restored from a persisted tile.
    pub const PERSISTED: [Self; 9] = [
        Self::Tree,
        Self::Rock,
        Self::SkillPoint,
        Self::Rabbit,
        Self::Deer,
        Self::Wolf,
        Self::Slime,
        Self::Fish,
        Self::Camp,
    ];

    /// Tag written to disk.
    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            Self::Tree => "tree",
            Self::Rock => "rock",
            Self::SkillPoint => "skill_point",
            Self::Rabbit => "rabbit",
            Self::Deer => "deer",
            Self::Wolf => "wolf",
            Self::Slime => "slime",
            Self::Fish => "fish",
            Self::Camp => "camp",
            Self::Player => "player",
        }
    }

    /// Looks up a persisted kind by tag. The player is never persisted.
    #[must_use]
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::PERSISTED.into_iter().find(|kind| kind.tag() == tag)
    }

    /// Collision radius in pixels; zero for objects you can walk through.
    #[must_use]
    pub const fn collision_radius(self) -> f32 {
        match self {
            Self::Tree => 12.0,
            Self::Rock => 10.0,
            Self::Camp => 24.0,
            Self::Player => 10.0,
            Self::Deer | Self::Wolf => 8.0,
            Self::Rabbit | Self::Slime => 6.0,
            Self::SkillPoint | Self::Fish => 0.0,
        }
    }

    /// Whether the object blocks movement and spawning.
    #[must_use]
    pub fn is_collidable(self) -> bool {
        self.collision_radius() > 0.0
    }

    /// Actors that outlive the chunk they stand in.
    #[must_use]
    pub const fn is_persistent_actor(self) -> bool {
        matches!(self, Self::Player | Self::Camp)
    }

    /// Whether the kind is written to its tile's record.
    #[must_use]
    pub const fn is_saved(self) -> bool {
        !matches!(self, Self::Player)
    }

    /// Whether the kind is an NPC.
    #[must_use]
    pub const fn is_npc(self) -> bool {
        matches!(
            self,
            Self::Rabbit | Self::Deer | Self::Wolf | Self::Slime | Self::Fish
        )
    }
}

/// A spawned object placed in world space.
#[derive(Debug, Clone, PartialEq)]
pub struct WorldObject {
    id: EntityId,
    kind: ObjectKind,
    position: (f32, f32),
}

impl WorldObject {
    /// Creates an object centered at a world-pixel position.
    #[must_use]
    pub fn new(kind: ObjectKind, x: f32, y: f32) -> Self {
        Self {
            id: EntityId::new(),
            kind,
            position: (x, y),
        }
    }

    /// Rebuilds an object from its persisted record.
    pub fn from_record(record: &ObjectRecord) -> ChunkResult<Self> {
        let kind = ObjectKind::from_tag(&record.kind)
            .ok_or_else(|| ChunkError::UnknownObject(record.kind.clone()))?;
        let [x, y] = record.position;
        if !x.is_finite() || !y.is_finite() {
            return Err(ChunkError::Malformed(format!(
                "{} has non-finite position",
                record.kind
            )));
        }
        Ok(Self::new(kind, x, y))
    }

    /// Persisted form; `None` for objects that are never saved.
    #[must_use]
    pub fn to_record(&self) -> Option<ObjectRecord> {
        self.kind.is_saved().then(|| ObjectRecord {
            kind: self.kind.tag().to_string(),
            position: [self.position.0, self.position.1],
        })
    }

    /// Returns the object's unique id.
    #[must_use]
    pub const fn id(&self) -> EntityId {
        self.id
    }

    /// Returns the object kind.
    #[must_use]
    pub const fn kind(&self) -> ObjectKind {
        self.kind
    }

    /// Returns the world-pixel center.
    #[must_use]
    pub const fn position(&self) -> (f32, f32) {
        self.position
    }

    /// Moves the object.
    pub fn set_position(&mut self, x: f32, y: f32) {
        self.position = (x, y);
    }

    /// Whether placing something of `radius` at `(x, y)` would come within
    /// `buffer` pixels of this object. Non-collidable objects never block.
    #[must_use]
    pub fn blocks(&self, x: f32, y: f32, radius: f32, buffer: f32) -> bool {
        if !self.kind.is_collidable() {
            return false;
        }
        let dx = self.position.0 - x;
        let dy = self.position.1 - y;
        let reach = self.kind.collision_radius() + radius + buffer;
        dx * dx + dy * dy < reach * reach
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tags_roundtrip() {
        for kind in ObjectKind::PERSISTED {
            assert_eq!(ObjectKind::from_tag(kind.tag()), Some(kind));
        }
        assert_eq!(ObjectKind::from_tag("player"), None);
        assert_eq!(ObjectKind::from_tag("dragon"), None);
    }

    #[test]
    fn test_unknown_record_is_fatal() {
        let record = ObjectRecord {
            kind: "dragon".into(),
            position: [1.0, 2.0],
        };
        assert!(matches!(
            WorldObject::from_record(&record),
            Err(ChunkError::UnknownObject(tag)) if tag == "dragon"
        ));
    }

    #[test]
    fn test_record_roundtrip_keeps_kind_and_position() {
        let tree = WorldObject::new(ObjectKind::Tree, 40.0, 72.5);
        let record = tree.to_record().expect("tree is persisted");
        let back = WorldObject::from_record(&record).expect("valid record");
        assert_eq!(back.kind(), ObjectKind::Tree);
        assert_eq!(back.position(), (40.0, 72.5));
        assert_ne!(back.id(), tree.id());
    }

    #[test]
    fn test_player_is_never_persisted() {
        let player = WorldObject::new(ObjectKind::Player, 0.0, 0.0);
        assert!(player.to_record().is_none());
        assert!(ObjectKind::Player.is_persistent_actor());
        assert!(ObjectKind::Camp.is_persistent_actor());
        assert!(!ObjectKind::Tree.is_persistent_actor());
        assert!(ObjectKind::Camp.is_saved());
        assert!(!ObjectKind::Player.is_saved());
    }

    #[test]
    fn test_blocking_distance() {
        let rock = WorldObject::new(ObjectKind::Rock, 0.0, 0.0);
        assert!(rock.blocks(15.0, 0.0, 6.0, 0.0));
        assert!(!rock.blocks(17.0, 0.0, 6.0, 0.0));
        assert!(rock.blocks(17.0, 0.0, 6.0, 2.0));

        let point = WorldObject::new(ObjectKind::SkillPoint, 0.0, 0.0);
        assert!(!point.blocks(0.0, 0.0, 12.0, 10.0));
    }
}
