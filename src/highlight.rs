use std::collections::HashMap;

use crate::components::NpcId;
use crate::events::DialogueNotice;

/// Why an NPC's name label is up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HighlightState {
    pub hovering: bool,
    pub dialogue_active: bool,
}

impl HighlightState {
    pub fn label_visible(&self) -> bool {
        self.hovering || self.dialogue_active
    }
}

/// Per-NPC hover and dialogue-active flags, driven by pointer movement and
/// dialogue notices.
#[derive(Debug, Default)]
pub struct HighlightController {
    states: HashMap<NpcId, HighlightState>,
}

impl HighlightController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking `npc`. Re-registering keeps its current flags.
    pub fn register(&mut self, npc: NpcId) {
        self.states.entry(npc).or_default();
    }

    /// Point hover at `hovered`, clearing it everywhere else.
    pub fn set_hover(&mut self, hovered: Option<&NpcId>) {
        for (id, state) in self.states.iter_mut() {
            state.hovering = hovered == Some(id);
        }
    }

    pub fn apply(&mut self, notice: &DialogueNotice) {
        let Some(state) = self.states.get_mut(notice.npc_id()) else {
            log::debug!("highlight notice for unregistered '{}'", notice.npc_id());
            return;
        };
        state.dialogue_active = matches!(notice, DialogueNotice::Shown(_));
    }

    pub fn state(&self, npc: &NpcId) -> Option<HighlightState> {
        self.states.get(npc).copied()
    }

    pub fn label_visible(&self, npc: &NpcId) -> bool {
        self.states.get(npc).is_some_and(HighlightState::label_visible)
    }

    pub fn is_hovering(&self, npc: &NpcId) -> bool {
        self.states.get(npc).is_some_and(|s| s.hovering)
    }

    pub fn hovered(&self) -> Option<&NpcId> {
        self.states
            .iter()
            .find_map(|(id, s)| s.hovering.then_some(id))
    }

    /// Drop every flag, e.g. on scene teardown.
    pub fn clear_all(&mut self) {
        self.states
            .values_mut()
            .for_each(|s| *s = HighlightState::default());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controller() -> HighlightController {
        let mut c = HighlightController::new();
        c.register(NpcId::new("lee"));
        c.register(NpcId::new("wang"));
        c
    }

    #[test]
    fn label_follows_hover_or_dialogue() {
        let mut c = controller();
        let lee = NpcId::new("lee");
        assert!(!c.label_visible(&lee));

        c.set_hover(Some(&lee));
        assert!(c.label_visible(&lee));
        c.apply(&DialogueNotice::Shown(lee.clone()));
        c.set_hover(None);
        assert!(c.label_visible(&lee));
        c.apply(&DialogueNotice::Hidden(lee.clone()));
        assert!(!c.label_visible(&lee));
    }

    #[test]
    fn hover_moves_between_npcs() {
        let mut c = controller();
        let lee = NpcId::new("lee");
        let wang = NpcId::new("wang");
        c.set_hover(Some(&lee));
        c.set_hover(Some(&wang));
        assert!(!c.is_hovering(&lee));
        assert_eq!(c.hovered(), Some(&wang));
    }

    #[test]
    fn unregistered_notices_are_ignored() {
        let mut c = controller();
        c.apply(&DialogueNotice::Shown(NpcId::new("ghost")));
        assert_eq!(c.state(&NpcId::new("ghost")), None);
    }

    #[test]
    fn hidden_for_other_npc_does_not_clear() {
        let mut c = controller();
        let lee = NpcId::new("lee");
        c.apply(&DialogueNotice::Shown(lee.clone()));
        c.apply(&DialogueNotice::Hidden(NpcId::new("wang")));
        assert!(c.label_visible(&lee));
    }
}
