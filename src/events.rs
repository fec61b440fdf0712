use std::collections::VecDeque;

use crate::components::NpcId;
use crate::dialogue::BubbleMode;

/// A click on an NPC, already resolved to world space.
///
/// `radius` present means the anchor is a circular hotspot; absent means a
/// standing sprite whose head is at `(x, y)`.
#[derive(Debug, Clone, PartialEq)]
pub struct DialogueRequest {
    pub npc_id: NpcId,
    pub name: String,
    pub x: f32,
    pub y: f32,
    pub radius: Option<f32>,
    pub bubble_offset_x: Option<f32>,
    pub bubble_offset_y: Option<f32>,
    pub bubble_gap: Option<f32>,
}

impl DialogueRequest {
    /// Request anchored on a standing sprite.
    pub fn standing(npc_id: NpcId, name: impl Into<String>, x: f32, y: f32) -> Self {
        Self {
            npc_id,
            name: name.into(),
            x,
            y,
            radius: None,
            bubble_offset_x: None,
            bubble_offset_y: None,
            bubble_gap: None,
        }
    }

    /// Request anchored on a circular hotspot.
    pub fn hotspot(npc_id: NpcId, name: impl Into<String>, x: f32, y: f32, radius: f32) -> Self {
        Self {
            radius: Some(radius),
            ..Self::standing(npc_id, name, x, y)
        }
    }
}

/// Notification routed from the dialogue core to the highlight controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DialogueNotice {
    Shown(NpcId),
    Hidden(NpcId),
}

impl DialogueNotice {
    pub fn npc_id(&self) -> &NpcId {
        match self {
            DialogueNotice::Shown(id) | DialogueNotice::Hidden(id) => id,
        }
    }
}

/// Everything observable the scene did, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum SceneEvent {
    DialogueRequested {
        npc: NpcId,
    },
    /// Request for an NPC with no seeded dialogue.
    DialogueIgnored {
        npc: NpcId,
    },
    DialogueShown {
        npc: NpcId,
        index: usize,
        mode: BubbleMode,
    },
    DialogueHidden {
        npc: NpcId,
    },
    ConversationApplied {
        topic: Option<String>,
        characters: usize,
    },
    ConversationFailed {
        topic: String,
        reason: String,
    },
    ClickCountsReset,
}

/// Trail of recent scene events, oldest first. Past `limit` entries the
/// oldest are dropped.
pub struct EventLog {
    events: VecDeque<SceneEvent>,
    limit: usize,
}

impl EventLog {
    pub const DEFAULT_LIMIT: usize = 256;

    pub fn with_limit(limit: usize) -> Self {
        let limit = limit.max(1);
        Self {
            events: VecDeque::with_capacity(limit),
            limit,
        }
    }

    pub fn push(&mut self, event: SceneEvent) {
        log::trace!("scene event {:?}", event);
        if self.events.len() == self.limit {
            self.events.pop_front();
        }
        self.events.push_back(event);
    }

    pub fn iter(&self) -> impl Iterator<Item = &SceneEvent> {
        self.events.iter()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::with_limit(Self::DEFAULT_LIMIT)
    }
}
