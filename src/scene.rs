//! The office scene: owns the transform, the dialogue progression, the bubble
//! manager and the highlight controller, and routes notices between them.

use std::collections::HashMap;
use std::time::Instant;

use crate::bubble::{Bubble, BubbleManager};
use crate::components::{Character, HotspotPlacement, NpcId, Placement, StandingPlacement};
use crate::config::SceneConfig;
use crate::conversation::{FetchResult, TopicConversation};
use crate::dialogue::DialogueProgression;
use crate::error::LoadError;
use crate::events::{DialogueNotice, DialogueRequest, EventLog, SceneEvent};
use crate::geometry::{Circle, Point, Rect, Size};
use crate::highlight::HighlightController;
use crate::loading::SceneLayout;
use crate::text::TextMeasure;
use crate::transform::BackgroundTransform;

/// Gap between a name label and the top of what it names, in screen pixels.
const LABEL_GAP: f32 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastKind {
    Loading,
    Error,
}

/// Transient status line ("Loading...", "Failed to load ...").
#[derive(Debug, Clone, PartialEq)]
pub struct StatusToast {
    pub message: String,
    pub kind: ToastKind,
    expires_at: Option<Instant>,
}

/// A hotspot resolved to screen space.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedHotspot {
    pub npc: NpcId,
    pub zone: Circle,
}

/// A standing sprite resolved to screen space.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedStanding {
    pub npc: NpcId,
    /// Sprite frame, bottom-centred on the feet.
    pub frame: Rect,
    /// Top-centre of the frame; dialogue anchors here.
    pub head: Point,
}

pub struct OfficeScene {
    config: SceneConfig,
    layout: SceneLayout,
    characters: HashMap<NpcId, Character>,
    natural: Size,
    transform: BackgroundTransform,
    progression: DialogueProgression,
    bubbles: BubbleManager,
    highlights: HighlightController,
    measurer: Box<dyn TextMeasure>,
    events: EventLog,
    topic: Option<String>,
    toast: Option<StatusToast>,
    auto_show: Option<(NpcId, Instant)>,
    show_hotspots: bool,
}

impl OfficeScene {
    pub fn new(
        config: SceneConfig,
        layout: SceneLayout,
        viewport: Size,
        measurer: Box<dyn TextMeasure>,
    ) -> Self {
        let natural = config.background.natural_size();
        let mut progression = DialogueProgression::new();
        progression.set_character_dialogues(&layout.characters);

        let mut highlights = HighlightController::new();
        for placement in &layout.placements {
            highlights.register(placement.character_id().clone());
        }

        let characters = layout
            .characters
            .iter()
            .map(|c| (c.id.clone(), c.clone()))
            .collect();

        let transform = BackgroundTransform::fit(natural, viewport);
        Self {
            bubbles: BubbleManager::new(config.bubble.clone(), config.dialogue.to_world(&transform)),
            transform,
            config,
            layout,
            characters,
            natural,
            progression,
            highlights,
            measurer,
            events: EventLog::default(),
            topic: None,
            toast: None,
            auto_show: None,
            show_hotspots: false,
        }
    }

    // -- Layout ---------------------------------------------------------

    /// Refit the background and rescale placement tuning. Zero-area viewports
    /// are ignored; an unchanged viewport changes nothing. A live bubble
    /// follows its owner.
    pub fn resize(&mut self, viewport: Size) {
        if viewport.is_empty() {
            log::debug!("ignoring resize to {}x{}", viewport.width, viewport.height);
            return;
        }
        let fitted = BackgroundTransform::fit(self.natural, viewport);
        if fitted == self.transform {
            return;
        }
        self.transform = fitted;
        self.bubbles
            .set_placement(self.config.dialogue.to_world(&self.transform));

        if let Some(owner) = self.bubbles.active_owner().cloned()
            && let Some(request) = self.request_for(&owner)
        {
            self.bubbles.reanchor(&request);
        }
    }

    fn resolve_hotspot(&self, h: &HotspotPlacement) -> ResolvedHotspot {
        ResolvedHotspot {
            npc: h.character_id.clone(),
            zone: Circle {
                center: self.transform.data_to_world(h.at),
                radius: self.transform.scale_radius(h.radius),
            },
        }
    }

    fn resolve_standing(&self, s: &StandingPlacement) -> ResolvedStanding {
        let feet = self.transform.data_to_world(s.at);
        let scale = self.transform.fit_scale();
        let size = Size::new(
            self.config.standing_sprite.width * scale,
            self.config.standing_sprite.height * scale,
        );
        let frame = Rect {
            x: feet.x - size.width / 2.0,
            y: feet.y - size.height,
            width: size.width,
            height: size.height,
        };
        ResolvedStanding {
            npc: s.character_id.clone(),
            frame,
            head: Point::new(feet.x, frame.y),
        }
    }

    /// Every hotspot in screen space, in layout order.
    pub fn hotspots(&self) -> Vec<ResolvedHotspot> {
        self.layout
            .hotspots()
            .map(|h| self.resolve_hotspot(h))
            .collect()
    }

    /// Every standing sprite in screen space, back to front.
    pub fn standing(&self) -> Vec<ResolvedStanding> {
        let mut sprites: Vec<_> = self
            .layout
            .standing()
            .map(|s| self.resolve_standing(s))
            .collect();
        sprites.sort_by(|a, b| a.head.y.total_cmp(&b.head.y));
        sprites
    }

    /// Where `npc`'s name label sits (bottom-centre), in screen space.
    pub fn label_anchor(&self, npc: &NpcId) -> Option<Point> {
        match self.placement(npc)? {
            Placement::Hotspot(h) => {
                let r = self.resolve_hotspot(h);
                Some(Point::new(
                    r.zone.center.x,
                    r.zone.center.y - r.zone.radius - LABEL_GAP,
                ))
            }
            Placement::Standing(s) => {
                let r = self.resolve_standing(s);
                Some(Point::new(r.head.x, r.head.y - LABEL_GAP))
            }
        }
    }

    fn placement(&self, npc: &NpcId) -> Option<&Placement> {
        self.layout
            .placements
            .iter()
            .find(|p| p.character_id() == npc)
    }

    /// Build the dialogue request a click on `npc` would produce.
    pub fn request_for(&self, npc: &NpcId) -> Option<DialogueRequest> {
        let name = self.character_name(npc).to_string();
        match self.placement(npc)? {
            Placement::Hotspot(h) => {
                let r = self.resolve_hotspot(h);
                let mut request = DialogueRequest::hotspot(
                    npc.clone(),
                    name,
                    r.zone.center.x,
                    r.zone.center.y,
                    r.zone.radius,
                );
                request.bubble_offset_x = h.bubble_offset_x.map(|dx| self.transform.scale_dx(dx));
                request.bubble_offset_y = h.bubble_offset_y.map(|dy| self.transform.scale_dy(dy));
                request.bubble_gap = h.bubble_gap.map(|g| self.transform.scale_radius(g));
                Some(request)
            }
            Placement::Standing(s) => {
                let r = self.resolve_standing(s);
                let mut request = DialogueRequest::standing(npc.clone(), name, r.head.x, r.head.y);
                request.bubble_offset_y = Some(
                    self.transform
                        .scale_dy(self.config.dialogue.standing.extra_offset_y),
                );
                Some(request)
            }
        }
    }

    /// NPC under `p`. Hotspots win over sprites; among sprites the one
    /// nearest the viewer (lowest on screen) wins.
    pub fn hit_test(&self, p: Point) -> Option<NpcId> {
        if let Some(h) = self
            .layout
            .hotspots()
            .map(|h| self.resolve_hotspot(h))
            .find(|h| h.zone.contains(p.x, p.y))
        {
            return Some(h.npc);
        }
        self.standing()
            .into_iter()
            .rev()
            .find(|s| s.frame.contains(p.x, p.y))
            .map(|s| s.npc)
    }

    // -- Input ----------------------------------------------------------

    /// Update hover state. Returns the NPC under the pointer.
    pub fn pointer_moved(&mut self, p: Point) -> Option<NpcId> {
        let hit = self.hit_test(p);
        self.highlights.set_hover(hit.as_ref());
        hit
    }

    /// Click at `p`. Returns the NPC whose dialogue was shown.
    pub fn pointer_down(&mut self, p: Point, now: Instant) -> Option<NpcId> {
        let npc = self.hit_test(p)?;
        let request = self.request_for(&npc)?;
        self.auto_show = None;
        self.request_dialogue(&request, now).then_some(npc)
    }

    /// Run one dialogue request through the progression and the bubble
    /// manager. Returns false if the NPC has no dialogue.
    pub fn request_dialogue(&mut self, request: &DialogueRequest, now: Instant) -> bool {
        let npc = request.npc_id.clone();
        self.events
            .push(SceneEvent::DialogueRequested { npc: npc.clone() });

        let active = self.bubbles.active_owner().cloned();
        let Some(selection) = self.progression.select(&npc, active.as_ref()) else {
            self.events.push(SceneEvent::DialogueIgnored { npc });
            return false;
        };

        let (index, mode) = (selection.index, selection.mode);
        let notices = self
            .bubbles
            .show(selection, request, self.measurer.as_mut(), now);
        for notice in notices {
            if let DialogueNotice::Shown(id) = &notice {
                self.events.push(SceneEvent::DialogueShown {
                    npc: id.clone(),
                    index,
                    mode,
                });
                self.highlights.apply(&notice);
            } else {
                self.route(notice);
            }
        }
        true
    }

    fn route(&mut self, notice: DialogueNotice) {
        self.highlights.apply(&notice);
        if let DialogueNotice::Hidden(npc) = notice {
            self.events.push(SceneEvent::DialogueHidden { npc });
        }
    }

    // -- Conversations --------------------------------------------------

    /// A fetch for `topic` has started.
    pub fn begin_loading(&mut self, topic: &str) {
        self.toast = Some(StatusToast {
            message: format!("Loading {}…", topic),
            kind: ToastKind::Loading,
            expires_at: None,
        });
    }

    /// Replace every character's lines with `conversation`'s and re-seed the
    /// ledger. A live bubble from the old conversation is taken down and
    /// cached text layouts are dropped.
    pub fn apply_conversation(&mut self, conversation: TopicConversation, now: Instant) {
        if let Some(hidden) = self.bubbles.destroy() {
            self.route(hidden);
        }
        // Old lines will not be measured again.
        self.measurer.clear_cache();
        self.progression
            .set_character_dialogues(&conversation.characters);
        self.characters = conversation
            .characters
            .iter()
            .map(|c| (c.id.clone(), c.clone()))
            .collect();
        for c in &conversation.characters {
            if self.placement(&c.id).is_none() {
                log::debug!("topic character '{}' has no placement", c.id);
            }
        }

        log::info!(
            "applied topic '{}' with {} characters",
            conversation.topic,
            conversation.characters.len()
        );
        self.events.push(SceneEvent::ConversationApplied {
            topic: Some(conversation.topic.clone()),
            characters: conversation.characters.len(),
        });
        self.topic = Some(conversation.topic);
        self.toast = None;

        self.auto_show = self
            .config
            .auto_show
            .character
            .clone()
            .filter(|id| self.progression.has_dialogue(id))
            .map(|id| (id, now + self.config.auto_show.delay()));
    }

    /// A fetch failed. Characters and ledger are left untouched.
    pub fn conversation_failed(&mut self, topic: &str, error: &LoadError, now: Instant) {
        log::warn!("failed to load topic '{}': {}", topic, error);
        self.events.push(SceneEvent::ConversationFailed {
            topic: topic.to_string(),
            reason: error.to_string(),
        });
        self.toast = Some(StatusToast {
            message: format!("Failed to load {}", topic),
            kind: ToastKind::Error,
            expires_at: Some(now + self.config.status_toast()),
        });
    }

    pub fn handle_fetch(&mut self, fetched: FetchResult, now: Instant) {
        match fetched.result {
            Ok(conversation) => self.apply_conversation(conversation, now),
            Err(e) => self.conversation_failed(&fetched.topic, &e, now),
        }
    }

    // -- Frame ----------------------------------------------------------

    /// Advance timers: bubble auto-hide, toast expiry, pending auto-show.
    pub fn update(&mut self, now: Instant) {
        if let Some(hidden) = self.bubbles.update(now) {
            self.route(hidden);
        }

        if self
            .toast
            .as_ref()
            .and_then(|t| t.expires_at)
            .is_some_and(|at| now >= at)
        {
            self.toast = None;
        }

        if let Some((npc, at)) = self.auto_show.take() {
            if now < at {
                self.auto_show = Some((npc, at));
            } else if let Some(request) = self.request_for(&npc) {
                log::debug!("auto-showing '{}'", npc);
                self.request_dialogue(&request, now);
            }
        }
    }

    pub fn reset_click_counts(&mut self) {
        self.progression.reset_all();
        self.events.push(SceneEvent::ClickCountsReset);
    }

    /// Take down the bubble, drop pending timers and cached layouts.
    pub fn teardown(&mut self) {
        if let Some(hidden) = self.bubbles.destroy() {
            self.route(hidden);
        }
        self.auto_show = None;
        self.toast = None;
        self.highlights.clear_all();
        self.measurer.clear_cache();
    }

    // -- Inspection -----------------------------------------------------

    pub fn click_count(&self, npc: &NpcId) -> Option<u8> {
        self.progression.click_count(npc)
    }

    pub fn click_counts(&self) -> Vec<(NpcId, u8)> {
        self.progression.click_counts()
    }

    pub fn transform(&self) -> &BackgroundTransform {
        &self.transform
    }

    pub fn config(&self) -> &SceneConfig {
        &self.config
    }

    pub fn bubble(&self) -> Option<&Bubble> {
        self.bubbles.current()
    }

    pub fn bubbles(&self) -> &BubbleManager {
        &self.bubbles
    }

    pub fn highlights(&self) -> &HighlightController {
        &self.highlights
    }

    pub fn events(&self) -> &EventLog {
        &self.events
    }

    pub fn topic(&self) -> Option<&str> {
        self.topic.as_deref()
    }

    pub fn toast(&self) -> Option<&StatusToast> {
        self.toast.as_ref()
    }

    pub fn character_name<'a>(&'a self, npc: &'a NpcId) -> &'a str {
        self.characters
            .get(npc)
            .map_or(npc.as_str(), |c| c.name.as_str())
    }

    pub fn character(&self, npc: &NpcId) -> Option<&Character> {
        self.characters.get(npc)
    }

    pub fn auto_show_pending(&self) -> Option<(&NpcId, Instant)> {
        self.auto_show.as_ref().map(|(id, at)| (id, *at))
    }

    pub fn show_hotspots(&self) -> bool {
        self.show_hotspots
    }

    pub fn toggle_hotspots(&mut self) -> bool {
        self.show_hotspots = !self.show_hotspots;
        self.show_hotspots
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{Facing, NpcAction};
    use crate::text::MonospaceMeasure;
    use std::time::Duration;

    fn layout() -> SceneLayout {
        SceneLayout {
            characters: vec![
                Character::with_single_line(NpcId::new("host"), "Ada", "Host", "welcome"),
                Character::with_single_line(NpcId::new("front"), "Front", "", "hey"),
                Character::with_single_line(NpcId::new("back"), "Back", "", "yo"),
            ],
            placements: vec![
                Placement::Hotspot(HotspotPlacement {
                    character_id: NpcId::new("host"),
                    at: Point::new(500.0, 500.0),
                    radius: 40.0,
                    bubble_offset_x: None,
                    bubble_offset_y: Some(-100.0),
                    bubble_gap: None,
                }),
                Placement::Standing(StandingPlacement {
                    character_id: NpcId::new("back"),
                    at: Point::new(300.0, 700.0),
                    facing: Facing::Left,
                    action: NpcAction::Idle,
                    style_id: "default".into(),
                }),
                Placement::Standing(StandingPlacement {
                    character_id: NpcId::new("front"),
                    at: Point::new(300.0, 720.0),
                    facing: Facing::Right,
                    action: NpcAction::Idle,
                    style_id: "default".into(),
                }),
            ],
        }
    }

    fn scene() -> OfficeScene {
        OfficeScene::new(
            SceneConfig::default(),
            layout(),
            Size::new(1024.0, 1024.0),
            Box::new(MonospaceMeasure::new(8.0, 18.0)),
        )
    }

    #[test]
    fn hotspot_hit_and_label() {
        let s = scene();
        assert_eq!(s.hit_test(Point::new(510.0, 510.0)), Some(NpcId::new("host")));
        assert_eq!(s.hit_test(Point::new(10.0, 10.0)), None);
        assert_eq!(
            s.label_anchor(&NpcId::new("host")),
            Some(Point::new(500.0, 450.0))
        );
    }

    #[test]
    fn overlapping_sprites_pick_nearest_viewer() {
        let s = scene();
        // Both frames cover (300, 650); front's feet are lower on screen.
        assert_eq!(s.hit_test(Point::new(300.0, 650.0)), Some(NpcId::new("front")));
        // Only back covers (300, 610).
        assert_eq!(s.hit_test(Point::new(300.0, 610.0)), Some(NpcId::new("back")));
    }

    #[test]
    fn standing_request_anchors_at_head() {
        let s = scene();
        let r = s.request_for(&NpcId::new("front")).expect("placed");
        assert_eq!((r.x, r.y), (300.0, 627.0));
        assert_eq!(r.radius, None);
        assert_eq!(r.bubble_offset_y, Some(-20.0));
        assert_eq!(r.name, "Front");
    }

    #[test]
    fn hotspot_offsets_scale_with_background() {
        let mut s = scene();
        s.resize(Size::new(512.0, 512.0));
        let r = s.request_for(&NpcId::new("host")).expect("placed");
        assert_eq!((r.x, r.y), (250.0, 250.0));
        assert_eq!(r.radius, Some(20.0));
        assert_eq!(r.bubble_offset_y, Some(-50.0));
    }

    /// Monospace layout that counts cache clears.
    struct CountingMeasure {
        inner: MonospaceMeasure,
        clears: std::rc::Rc<std::cell::Cell<usize>>,
    }

    impl TextMeasure for CountingMeasure {
        fn measure(&mut self, text: &str, wrap_width: f32) -> Size {
            self.inner.measure(text, wrap_width)
        }

        fn clear_cache(&mut self) {
            self.clears.set(self.clears.get() + 1);
        }
    }

    #[test]
    fn applying_a_topic_drops_cached_layouts() {
        let clears = std::rc::Rc::new(std::cell::Cell::new(0));
        let mut s = OfficeScene::new(
            SceneConfig::default(),
            layout(),
            Size::new(1024.0, 1024.0),
            Box::new(CountingMeasure {
                inner: MonospaceMeasure::new(8.0, 18.0),
                clears: clears.clone(),
            }),
        );
        let conversation = TopicConversation {
            topic: "standup".into(),
            characters: vec![Character::with_single_line(
                NpcId::new("host"),
                "Ada",
                "Host",
                "morning",
            )],
        };
        s.apply_conversation(conversation, Instant::now());
        assert_eq!(clears.get(), 1);
    }

    #[test]
    fn hover_drives_labels() {
        let mut s = scene();
        let host = NpcId::new("host");
        s.pointer_moved(Point::new(500.0, 500.0));
        assert!(s.highlights().label_visible(&host));
        s.pointer_moved(Point::new(0.0, 0.0));
        assert!(!s.highlights().label_visible(&host));
    }

    #[test]
    fn click_shows_and_timeout_hides() {
        let mut s = scene();
        let t0 = Instant::now();
        let host = NpcId::new("host");
        assert_eq!(s.pointer_down(Point::new(500.0, 500.0), t0), Some(host.clone()));
        assert!(s.highlights().label_visible(&host));
        s.update(t0 + Duration::from_millis(4150));
        assert!(s.bubble().is_none());
        assert!(!s.highlights().label_visible(&host));
    }

    #[test]
    fn failed_load_keeps_state_and_toast_expires() {
        let mut s = scene();
        let t0 = Instant::now();
        let host = NpcId::new("host");
        s.pointer_down(Point::new(500.0, 500.0), t0);
        s.begin_loading("launch");
        assert_eq!(s.toast().map(|t| t.kind), Some(ToastKind::Loading));

        s.conversation_failed("launch", &LoadError::UnknownTopic("launch".into()), t0);
        assert_eq!(s.click_count(&host), Some(1));
        assert_eq!(s.toast().map(|t| t.kind), Some(ToastKind::Error));
        s.update(t0 + Duration::from_millis(1999));
        assert!(s.toast().is_some());
        s.update(t0 + Duration::from_millis(2000));
        assert!(s.toast().is_none());
    }

    #[test]
    fn zero_viewport_keeps_transform() {
        let mut s = scene();
        let before = *s.transform();
        s.resize(Size::new(0.0, 300.0));
        assert_eq!(*s.transform(), before);
    }

    #[test]
    fn hotspot_overlay_toggles() {
        let mut s = scene();
        assert!(s.toggle_hotspots());
        assert!(!s.toggle_hotspots());
    }
}
