use std::collections::HashSet;

use crate::components::*;
use crate::error::{self, LoadError, Result};
use crate::geometry::Point;

/// Characters and where they sit, as authored in the scene KDL file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SceneLayout {
    pub characters: Vec<Character>,
    pub placements: Vec<Placement>,
}

impl SceneLayout {
    pub fn character(&self, id: &NpcId) -> Option<&Character> {
        self.characters.iter().find(|c| &c.id == id)
    }

    pub fn hotspots(&self) -> impl Iterator<Item = &HotspotPlacement> {
        self.placements.iter().filter_map(|p| match p {
            Placement::Hotspot(h) => Some(h),
            Placement::Standing(_) => None,
        })
    }

    pub fn standing(&self) -> impl Iterator<Item = &StandingPlacement> {
        self.placements.iter().filter_map(|p| match p {
            Placement::Standing(s) => Some(s),
            Placement::Hotspot(_) => None,
        })
    }
}

/// Helper to get a string value from a child node's first argument.
fn child_str<'a>(children: &'a kdl::KdlDocument, key: &str) -> Option<&'a str> {
    children.get_arg(key)?.as_string()
}

/// Helper to get an f32 from a child node's first argument.
/// Accepts both float and integer values.
fn child_f32(children: &kdl::KdlDocument, key: &str) -> Option<f32> {
    let val = children.get_arg(key)?;
    val.as_float()
        .or_else(|| val.as_integer().map(|i| i as f64))
        .map(|v| v as f32)
}

/// Node id from the first argument, e.g. `hotspot "round_table_host"`.
fn node_id(node: &kdl::KdlNode) -> Option<NpcId> {
    node.get(0).and_then(|v| v.as_string()).map(NpcId::from)
}

fn parse_character(id: NpcId, children: Option<&kdl::KdlDocument>) -> Result<Character> {
    let Some(children) = children else {
        return Err(LoadError::malformed(format!("character '{}' has no body", id)));
    };
    let name = child_str(children, "name").unwrap_or(id.as_str()).to_string();
    let position = child_str(children, "position").unwrap_or_default().to_string();

    // Positional arguments only; properties on the node are ignored.
    let lines: Vec<&str> = children
        .get("lines")
        .map(|node| {
            node.entries()
                .iter()
                .filter(|e| e.name().is_none())
                .filter_map(|e| e.value().as_string())
                .collect()
        })
        .unwrap_or_default();
    if !lines.is_empty() {
        let [a, b, c] = lines.as_slice() else {
            return Err(LoadError::malformed(format!(
                "character '{}' needs exactly {} lines, got {}",
                id,
                LINES_PER_CHARACTER,
                lines.len()
            )));
        };
        return Ok(Character {
            id,
            name,
            position,
            dialogues: [a.to_string(), b.to_string(), c.to_string()],
        });
    }

    match child_str(children, "dialogue") {
        Some(line) => Ok(Character::with_single_line(id, name, position, line)),
        None => Err(LoadError::malformed(format!("character '{}' has no dialogue", id))),
    }
}

fn parse_standing(id: NpcId, children: &kdl::KdlDocument) -> Option<StandingPlacement> {
    let (Some(x), Some(y)) = (child_f32(children, "x"), child_f32(children, "y")) else {
        log::warn!("standing '{}' is missing x/y, skipped", id);
        return None;
    };
    let facing = match child_str(children, "facing") {
        Some(s) => Facing::parse(s).unwrap_or_else(|| {
            log::warn!("standing '{}' has unknown facing '{}'", id, s);
            Facing::default()
        }),
        None => Facing::default(),
    };
    let action = match child_str(children, "action") {
        Some(s) => NpcAction::parse(s).unwrap_or_else(|| {
            log::warn!("standing '{}' has unknown action '{}'", id, s);
            NpcAction::default()
        }),
        None => NpcAction::default(),
    };
    Some(StandingPlacement {
        character_id: id,
        at: Point::new(x, y),
        facing,
        action,
        style_id: child_str(children, "style").unwrap_or("default").to_string(),
    })
}

fn parse_hotspot(id: NpcId, children: &kdl::KdlDocument) -> Option<HotspotPlacement> {
    let (Some(x), Some(y), Some(radius)) = (
        child_f32(children, "x"),
        child_f32(children, "y"),
        child_f32(children, "radius"),
    ) else {
        log::warn!("hotspot '{}' is missing x/y/radius, skipped", id);
        return None;
    };
    if radius <= 0.0 {
        log::warn!("hotspot '{}' has non-positive radius {}, skipped", id, radius);
        return None;
    }
    Some(HotspotPlacement {
        character_id: id,
        at: Point::new(x, y),
        radius,
        bubble_offset_x: child_f32(children, "bubble_offset_x"),
        bubble_offset_y: child_f32(children, "bubble_offset_y"),
        bubble_gap: child_f32(children, "bubble_gap"),
    })
}

/// Parse a scene layout document.
///
/// A malformed character is an error. Placements that are incomplete or
/// name an unknown character are dropped with a warning.
pub fn parse_scene_layout(content: &str) -> Result<SceneLayout> {
    let doc: kdl::KdlDocument = content.parse()?;
    let mut layout = SceneLayout::default();

    for node in doc.nodes() {
        if node.name().to_string() != "character" {
            continue;
        }
        let Some(id) = node_id(node) else {
            log::warn!("character node without an id, skipped");
            continue;
        };
        let character = parse_character(id, node.children())?;
        if layout.character(&character.id).is_some() {
            return Err(LoadError::malformed(format!(
                "duplicate character '{}'",
                character.id
            )));
        }
        layout.characters.push(character);
    }

    let known: HashSet<NpcId> = layout.characters.iter().map(|c| c.id.clone()).collect();
    for node in doc.nodes() {
        let kind = node.name().to_string();
        if kind != "standing" && kind != "hotspot" {
            continue;
        }
        let Some(id) = node_id(node) else {
            log::warn!("{} node without a character id, skipped", kind);
            continue;
        };
        if !known.contains(&id) {
            log::warn!("{} references unknown character '{}', dropped", kind, id);
            continue;
        }
        let Some(children) = node.children() else {
            log::warn!("{} '{}' has no body, skipped", kind, id);
            continue;
        };
        let placement = if kind == "standing" {
            parse_standing(id, children).map(Placement::Standing)
        } else {
            parse_hotspot(id, children).map(Placement::Hotspot)
        };
        layout.placements.extend(placement);
    }

    Ok(layout)
}

/// Load the scene layout from a KDL file. Logs a warning and returns an
/// empty scene on failure.
pub fn load_scene_layout(path: &str) -> SceneLayout {
    let parsed = error::read_to_string(path).and_then(|content| parse_scene_layout(&content));
    match parsed {
        Ok(layout) => {
            log::info!(
                "loaded {} characters and {} placements from {}",
                layout.characters.len(),
                layout.placements.len(),
                path
            );
            layout
        }
        Err(e) => {
            log::warn!("failed to load scene {}: {}", path, e);
            SceneLayout::default()
        }
    }
}
