use std::fmt;

use serde::{Deserialize, Serialize};

use crate::geometry::Point;

/// Stable character key shared by a `Character` and all its placements.
/// Never use a raw `String` where an NpcId is meant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NpcId(pub String);

impl NpcId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NpcId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NpcId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Number of canned lines every character carries.
pub const LINES_PER_CHARACTER: usize = 3;

/// Identity and canned content for one NPC. Replaced wholesale when a new
/// conversation is applied, never patched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Character {
    pub id: NpcId,
    pub name: String,
    /// Job title shown under the name.
    #[serde(default)]
    pub position: String,
    pub dialogues: [String; LINES_PER_CHARACTER],
}

impl Character {
    /// Default conversation: one authored line repeated for every streak step.
    pub fn with_single_line(
        id: NpcId,
        name: impl Into<String>,
        position: impl Into<String>,
        line: impl Into<String>,
    ) -> Self {
        let line = line.into();
        Self {
            id,
            name: name.into(),
            position: position.into(),
            dialogues: [line.clone(), line.clone(), line],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Facing {
    #[default]
    Left,
    Right,
}

impl Facing {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "left" => Some(Facing::Left),
            "right" => Some(Facing::Right),
            _ => None,
        }
    }
}

/// Cosmetic animation tag for standing NPCs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NpcAction {
    #[default]
    Idle,
    Walking,
    Sitting,
    Talking,
}

impl NpcAction {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "idle" => Some(NpcAction::Idle),
            "walking" => Some(NpcAction::Walking),
            "sitting" => Some(NpcAction::Sitting),
            "talking" => Some(NpcAction::Talking),
            _ => None,
        }
    }
}

/// A sprite NPC standing at a fixed data-space point (bottom-centre of the
/// sprite frame).
#[derive(Debug, Clone, PartialEq)]
pub struct StandingPlacement {
    pub character_id: NpcId,
    pub at: Point,
    pub facing: Facing,
    pub action: NpcAction,
    pub style_id: String,
}

/// A circular click zone painted into the background (e.g. seats around a
/// table). Offsets and gap are in data-space units.
#[derive(Debug, Clone, PartialEq)]
pub struct HotspotPlacement {
    pub character_id: NpcId,
    pub at: Point,
    pub radius: f32,
    pub bubble_offset_x: Option<f32>,
    pub bubble_offset_y: Option<f32>,
    pub bubble_gap: Option<f32>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Placement {
    Standing(StandingPlacement),
    Hotspot(HotspotPlacement),
}

impl Placement {
    pub fn character_id(&self) -> &NpcId {
        match self {
            Placement::Standing(s) => &s.character_id,
            Placement::Hotspot(h) => &h.character_id,
        }
    }

    pub fn data_position(&self) -> Point {
        match self {
            Placement::Standing(s) => s.at,
            Placement::Hotspot(h) => h.at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_line_is_replicated() {
        let c = Character::with_single_line(NpcId::new("lee"), "Lee", "Engineer", "hello");
        assert_eq!(c.dialogues, ["hello", "hello", "hello"]);
    }

    #[test]
    fn character_parses_from_json_triple() {
        let json = r#"{"id":"lee","name":"Lee","position":"PM","dialogues":["a","b","c"]}"#;
        let c: Character = serde_json::from_str(json).expect("valid character");
        assert_eq!(c.id, NpcId::new("lee"));
        assert_eq!(c.dialogues[2], "c");
    }

    #[test]
    fn character_rejects_two_lines() {
        let json = r#"{"id":"lee","name":"Lee","dialogues":["a","b"]}"#;
        assert!(serde_json::from_str::<Character>(json).is_err());
    }

    #[test]
    fn facing_and_action_parse() {
        assert_eq!(Facing::parse("right"), Some(Facing::Right));
        assert_eq!(Facing::parse("up"), None);
        assert_eq!(NpcAction::parse("sitting"), Some(NpcAction::Sitting));
        assert_eq!(NpcAction::parse("dancing"), None);
    }
}
