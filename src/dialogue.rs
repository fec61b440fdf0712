//! Per-NPC dialogue progression: which line to show next, in which mode, for
//! how long.
//!
//! Each NPC carries a streak position in `0..=2`. Repeated clicks on the same
//! NPC walk the streak forward and saturate on the third line, which is shown
//! as a thought. Clicking a different NPC while another one's bubble is live
//! restarts the newly focused NPC at its first line. Other NPCs keep their
//! positions.

use std::collections::HashMap;
use std::time::Duration;

use crate::components::{Character, LINES_PER_CHARACTER, NpcId};
use crate::ui::Easing;

/// Highest streak index; reaching it switches to thought mode.
pub const MAX_STREAK: u8 = (LINES_PER_CHARACTER - 1) as u8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BubbleMode {
    Normal,
    Thought,
}

impl BubbleMode {
    pub fn for_index(index: usize) -> Self {
        if index >= MAX_STREAK as usize {
            BubbleMode::Thought
        } else {
            BubbleMode::Normal
        }
    }

    /// How long the bubble stays up before auto-hiding.
    pub fn display_duration(self) -> Duration {
        match self {
            BubbleMode::Normal => Duration::from_millis(4000),
            BubbleMode::Thought => Duration::from_millis(6000),
        }
    }

    /// Show transition: a short pop for speech, a slow reveal for thoughts.
    pub fn show_transition(self) -> (Duration, Easing) {
        match self {
            BubbleMode::Normal => (Duration::from_millis(200), Easing::BackOut),
            BubbleMode::Thought => (Duration::from_millis(800), Easing::SineOut),
        }
    }

    pub fn is_thought(self) -> bool {
        self == BubbleMode::Thought
    }
}

/// What the progression decided to show for one request.
#[derive(Debug, Clone, PartialEq)]
pub struct DialogueSelection {
    pub npc: NpcId,
    pub index: usize,
    pub message: String,
    pub mode: BubbleMode,
    pub duration: Duration,
}

/// Seeded dialogue lines plus the click ledger.
#[derive(Debug, Default)]
pub struct DialogueProgression {
    dialogues: HashMap<NpcId, [String; LINES_PER_CHARACTER]>,
    ledger: HashMap<NpcId, u8>,
}

impl DialogueProgression {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace every NPC's lines and re-seed the ledger at zero.
    pub fn set_character_dialogues(&mut self, characters: &[Character]) {
        self.dialogues.clear();
        self.ledger.clear();
        for c in characters {
            if self.dialogues.contains_key(&c.id) {
                log::warn!("duplicate character '{}', keeping the last one", c.id);
            }
            self.dialogues.insert(c.id.clone(), c.dialogues.clone());
            self.ledger.insert(c.id.clone(), 0);
        }
        log::debug!("seeded dialogue for {} characters", self.dialogues.len());
    }

    pub fn has_dialogue(&self, npc: &NpcId) -> bool {
        self.dialogues.contains_key(npc)
    }

    /// Advance `npc`'s streak and pick its line.
    ///
    /// `active` is the owner of the live bubble, if any. Returns `None` for an
    /// NPC without seeded dialogue; nothing is recorded in that case.
    pub fn select(&mut self, npc: &NpcId, active: Option<&NpcId>) -> Option<DialogueSelection> {
        let Some(lines) = self.dialogues.get(npc) else {
            log::debug!("no dialogue seeded for '{}', ignoring", npc);
            return None;
        };

        let count = self.ledger.entry(npc.clone()).or_insert(0);
        if let Some(previous) = active
            && previous != npc
        {
            log::debug!("focus switched from '{}' to '{}'", previous, npc);
            *count = 0;
        }

        let index = usize::from((*count).min(MAX_STREAK));
        if *count < MAX_STREAK {
            *count += 1;
        }

        let mode = BubbleMode::for_index(index);
        Some(DialogueSelection {
            npc: npc.clone(),
            index,
            message: lines[index].clone(),
            mode,
            duration: mode.display_duration(),
        })
    }

    pub fn click_count(&self, npc: &NpcId) -> Option<u8> {
        self.ledger.get(npc).copied()
    }

    /// Every ledger entry, sorted by id.
    pub fn click_counts(&self) -> Vec<(NpcId, u8)> {
        let mut counts: Vec<_> = self
            .ledger
            .iter()
            .map(|(id, count)| (id.clone(), *count))
            .collect();
        counts.sort();
        counts
    }

    pub fn reset_all(&mut self) {
        self.ledger.values_mut().for_each(|c| *c = 0);
    }

    pub fn character_count(&self) -> usize {
        self.dialogues.len()
    }
}
