//! The single live speech bubble and its lifecycle.
//!
//! A bubble walks `Constructed -> Measuring -> Placed -> Visible -> Hiding ->
//! Destroyed`. At most one bubble is ever live. Showing a new one tears the
//! old one down synchronously, and every bubble that was shown produces
//! exactly one `Hidden` notice, whether it timed out or was pre-empted.

use std::time::{Duration, Instant};

use slotmap::{SlotMap, new_key_type};
use smallvec::SmallVec;

use crate::components::NpcId;
use crate::config::{BubbleStyle, DialogueConfig};
use crate::dialogue::{BubbleMode, DialogueSelection};
use crate::events::{DialogueNotice, DialogueRequest};
use crate::geometry::{Point, Rect, Size};
use crate::placement::{self, BubbleMetrics};
use crate::text::TextMeasure;
use crate::ui::{Animator, Easing};

new_key_type! {
    /// Handle to a bubble. Stale once the bubble is destroyed.
    pub struct BubbleId;
}

pub const HIDE_DURATION: Duration = Duration::from_millis(150);
/// Scale a hiding bubble shrinks to while it fades.
pub const HIDE_SCALE: f32 = 0.8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BubblePhase {
    Constructed,
    Measuring,
    Placed,
    Visible,
    Hiding,
    Destroyed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Channel {
    Scale,
    Alpha,
}

/// Notices produced by one `show` call, in firing order.
pub type Notices = SmallVec<[DialogueNotice; 2]>;

#[derive(Debug, Clone)]
pub struct Bubble {
    owner: NpcId,
    name: String,
    message: String,
    mode: BubbleMode,
    index: usize,
    duration: Duration,
    request: DialogueRequest,
    text_size: Size,
    size: Size,
    tail_size: f32,
    position: Point,
    phase: BubblePhase,
    hide_at: Option<Instant>,
    hide_started: Option<Instant>,
    animator: Animator<Channel>,
}

impl Bubble {
    fn construct(selection: DialogueSelection, request: &DialogueRequest) -> Self {
        Self {
            owner: selection.npc,
            name: request.name.clone(),
            message: selection.message,
            mode: selection.mode,
            index: selection.index,
            duration: selection.duration,
            request: request.clone(),
            text_size: Size::default(),
            size: Size::default(),
            tail_size: 0.0,
            position: Point::default(),
            phase: BubblePhase::Constructed,
            hide_at: None,
            hide_started: None,
            animator: Animator::new(),
        }
    }

    fn measure(&mut self, measurer: &mut dyn TextMeasure, style: &BubbleStyle) {
        self.phase = BubblePhase::Measuring;
        self.text_size = measurer.measure(&self.message, style.wrap_width);
        self.size = Size::new(
            (self.text_size.width + style.padding * 2.0).max(style.min_width),
            self.text_size.height + style.padding * 2.0,
        );
        self.tail_size = style.tail_size;
    }

    fn place(&mut self, config: &DialogueConfig) {
        self.position = placement::resolve_bubble_position(&self.request, self.metrics(), config);
        self.phase = BubblePhase::Placed;
    }

    fn reveal(&mut self, now: Instant) {
        let (duration, easing) = self.mode.show_transition();
        self.animator.start(Channel::Scale, 0.0, 1.0, duration, easing, now);
        self.animator.start(Channel::Alpha, 0.0, 1.0, duration, easing, now);
        self.hide_at = Some(now + self.duration);
        self.phase = BubblePhase::Visible;
    }

    fn begin_hide(&mut self, at: Instant) {
        let scale = self.scale(at);
        let alpha = self.alpha(at);
        self.animator
            .start(Channel::Scale, scale, HIDE_SCALE, HIDE_DURATION, Easing::CubicIn, at);
        self.animator
            .start(Channel::Alpha, alpha, 0.0, HIDE_DURATION, Easing::CubicIn, at);
        self.hide_started = Some(at);
        self.hide_at = None;
        self.phase = BubblePhase::Hiding;
    }

    pub fn metrics(&self) -> BubbleMetrics {
        BubbleMetrics {
            height: self.size.height,
            tail_size: self.tail_size,
        }
    }

    pub fn owner(&self) -> &NpcId {
        &self.owner
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn mode(&self) -> BubbleMode {
        self.mode
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn phase(&self) -> BubblePhase {
        self.phase
    }

    /// Centre of the bubble body in screen pixels.
    pub fn position(&self) -> Point {
        self.position
    }

    /// Body size, tail excluded.
    pub fn size(&self) -> Size {
        self.size
    }

    pub fn text_size(&self) -> Size {
        self.text_size
    }

    pub fn tail_size(&self) -> f32 {
        self.tail_size
    }

    pub fn body_rect(&self) -> Rect {
        Rect::centered(self.position, self.size)
    }

    /// Anchor the bubble was last placed against.
    pub fn request(&self) -> &DialogueRequest {
        &self.request
    }

    /// When the auto-hide fires, if still pending.
    pub fn hide_deadline(&self) -> Option<Instant> {
        self.hide_at
    }

    pub fn scale(&self, now: Instant) -> f32 {
        self.animator.get(&Channel::Scale, now).unwrap_or(1.0)
    }

    pub fn alpha(&self, now: Instant) -> f32 {
        self.animator.get(&Channel::Alpha, now).unwrap_or(1.0)
    }
}

/// Owns the one live bubble.
pub struct BubbleManager {
    bubbles: SlotMap<BubbleId, Bubble>,
    current: Option<BubbleId>,
    style: BubbleStyle,
    placement: DialogueConfig,
}

impl BubbleManager {
    pub fn new(style: BubbleStyle, placement: DialogueConfig) -> Self {
        Self {
            bubbles: SlotMap::with_key(),
            current: None,
            style,
            placement,
        }
    }

    pub fn style(&self) -> &BubbleStyle {
        &self.style
    }

    /// Swap in placement tuning for a new window size. Takes effect on the
    /// next `show` or `reanchor`.
    pub fn set_placement(&mut self, placement: DialogueConfig) {
        self.placement = placement;
    }

    /// Tear down any live bubble, then construct, measure, place and reveal a
    /// new one. The previous owner's `Hidden` comes before the new `Shown`.
    pub fn show(
        &mut self,
        selection: DialogueSelection,
        request: &DialogueRequest,
        measurer: &mut dyn TextMeasure,
        now: Instant,
    ) -> Notices {
        let mut notices = Notices::new();
        if let Some(hidden) = self.destroy() {
            notices.push(hidden);
        }

        let mut bubble = Bubble::construct(selection, request);
        bubble.measure(measurer, &self.style);
        bubble.place(&self.placement);
        bubble.reveal(now);
        log::debug!(
            "bubble for '{}' at ({:.1}, {:.1}) size {:.0}x{:.0} {:?}",
            bubble.owner,
            bubble.position.x,
            bubble.position.y,
            bubble.size.width,
            bubble.size.height,
            bubble.mode,
        );

        let owner = bubble.owner.clone();
        self.current = Some(self.bubbles.insert(bubble));
        notices.push(DialogueNotice::Shown(owner));
        notices
    }

    /// Advance timers. Returns the `Hidden` notice when the bubble finishes
    /// hiding and is destroyed.
    pub fn update(&mut self, now: Instant) -> Option<DialogueNotice> {
        let id = self.current?;
        let bubble = self.bubbles.get_mut(id)?;

        if bubble.phase == BubblePhase::Visible
            && let Some(deadline) = bubble.hide_at
            && now >= deadline
        {
            log::debug!("auto-hiding bubble for '{}'", bubble.owner);
            bubble.begin_hide(deadline);
        }

        if bubble.phase == BubblePhase::Hiding
            && let Some(started) = bubble.hide_started
            && now.saturating_duration_since(started) >= HIDE_DURATION
        {
            return self.destroy();
        }
        None
    }

    /// Remove the live bubble, whatever its phase. Returns its pending
    /// `Hidden` notice; nothing is left scheduled.
    pub fn destroy(&mut self) -> Option<DialogueNotice> {
        let id = self.current.take()?;
        let mut bubble = self.bubbles.remove(id)?;
        bubble.phase = BubblePhase::Destroyed;
        bubble.animator.clear();
        log::debug!("bubble for '{}' destroyed", bubble.owner);
        Some(DialogueNotice::Hidden(bubble.owner))
    }

    /// Re-resolve the live bubble's position against a fresh anchor for its
    /// owner. Measured size is kept.
    pub fn reanchor(&mut self, request: &DialogueRequest) {
        let Some(bubble) = self.current.and_then(|id| self.bubbles.get_mut(id)) else {
            return;
        };
        if bubble.owner != request.npc_id {
            return;
        }
        bubble.request = request.clone();
        bubble.position =
            placement::resolve_bubble_position(&bubble.request, bubble.metrics(), &self.placement);
    }

    pub fn current(&self) -> Option<&Bubble> {
        self.current.and_then(|id| self.bubbles.get(id))
    }

    pub fn current_id(&self) -> Option<BubbleId> {
        self.current
    }

    /// Phase of a bubble by handle. Handles of removed bubbles read as
    /// `Destroyed`.
    pub fn phase(&self, id: BubbleId) -> BubblePhase {
        self.bubbles
            .get(id)
            .map_or(BubblePhase::Destroyed, |b| b.phase)
    }

    /// Owner of the live bubble, including one that is mid-hide.
    pub fn active_owner(&self) -> Option<&NpcId> {
        self.current().map(|b| &b.owner)
    }

    /// Number of bubbles not yet destroyed. Never more than one.
    pub fn live_count(&self) -> usize {
        self.bubbles.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text::MonospaceMeasure;

    fn selection(npc: &str, index: usize) -> DialogueSelection {
        let mode = BubbleMode::for_index(index);
        DialogueSelection {
            npc: NpcId::new(npc),
            index,
            message: format!("{} line {}", npc, index),
            mode,
            duration: mode.display_duration(),
        }
    }

    fn request(npc: &str) -> DialogueRequest {
        DialogueRequest::hotspot(NpcId::new(npc), npc, 500.0, 500.0, 40.0)
    }

    fn manager() -> BubbleManager {
        BubbleManager::new(BubbleStyle::default(), DialogueConfig::default())
    }

    #[test]
    fn show_measures_and_places() {
        let mut m = manager();
        let mut measure = MonospaceMeasure::new(8.0, 18.0);
        let t0 = Instant::now();
        let notices = m.show(selection("lee", 0), &request("lee"), &mut measure, t0);
        assert_eq!(notices.as_slice(), &[DialogueNotice::Shown(NpcId::new("lee"))]);

        let b = m.current().expect("bubble is live");
        assert_eq!(b.phase(), BubblePhase::Visible);
        // "lee line 0" is 10 chars: 80 + 24 padding, one line + 24 padding.
        assert_eq!(b.size(), Size::new(104.0, 42.0));
        // 500 - 40 - 12 - 21 - 12
        assert_eq!(b.position(), Point::new(500.0, 415.0));
    }

    #[test]
    fn short_text_gets_min_width() {
        let mut m = manager();
        let mut measure = MonospaceMeasure::new(8.0, 18.0);
        let mut sel = selection("lee", 0);
        sel.message = "hi".into();
        m.show(sel, &request("lee"), &mut measure, Instant::now());
        assert_eq!(m.current().map(|b| b.size().width), Some(80.0));
    }

    #[test]
    fn preemption_hides_previous_first() {
        let mut m = manager();
        let mut measure = MonospaceMeasure::new(8.0, 18.0);
        let t0 = Instant::now();
        m.show(selection("lee", 0), &request("lee"), &mut measure, t0);
        let first = m.current_id().expect("live");
        let notices = m.show(selection("wang", 0), &request("wang"), &mut measure, t0);
        assert_eq!(
            notices.as_slice(),
            &[
                DialogueNotice::Hidden(NpcId::new("lee")),
                DialogueNotice::Shown(NpcId::new("wang")),
            ]
        );
        assert_eq!(m.phase(first), BubblePhase::Destroyed);
        assert_eq!(m.live_count(), 1);
    }

    #[test]
    fn auto_hide_after_duration_plus_transition() {
        let mut m = manager();
        let mut measure = MonospaceMeasure::new(8.0, 18.0);
        let t0 = Instant::now();
        m.show(selection("lee", 0), &request("lee"), &mut measure, t0);

        assert_eq!(m.update(t0 + Duration::from_millis(3999)), None);
        assert_eq!(m.update(t0 + Duration::from_millis(4000)), None);
        assert_eq!(m.current().map(|b| b.phase()), Some(BubblePhase::Hiding));
        assert_eq!(m.active_owner(), Some(&NpcId::new("lee")));

        let hidden = m.update(t0 + Duration::from_millis(4150));
        assert_eq!(hidden, Some(DialogueNotice::Hidden(NpcId::new("lee"))));
        assert!(m.current().is_none());
        assert_eq!(m.update(t0 + Duration::from_millis(9000)), None);
    }

    #[test]
    fn thought_stays_longer() {
        let mut m = manager();
        let mut measure = MonospaceMeasure::new(8.0, 18.0);
        let t0 = Instant::now();
        m.show(selection("lee", 2), &request("lee"), &mut measure, t0);
        assert_eq!(m.update(t0 + Duration::from_millis(4200)), None);
        assert_eq!(m.current().map(|b| b.phase()), Some(BubblePhase::Visible));
        assert!(m.update(t0 + Duration::from_millis(6150)).is_some());
    }

    #[test]
    fn late_update_hides_in_one_step() {
        let mut m = manager();
        let mut measure = MonospaceMeasure::new(8.0, 18.0);
        let t0 = Instant::now();
        m.show(selection("lee", 0), &request("lee"), &mut measure, t0);
        assert!(m.update(t0 + Duration::from_secs(60)).is_some());
    }

    #[test]
    fn preempting_a_hiding_bubble_still_notifies() {
        let mut m = manager();
        let mut measure = MonospaceMeasure::new(8.0, 18.0);
        let t0 = Instant::now();
        m.show(selection("lee", 0), &request("lee"), &mut measure, t0);
        let mid_hide = t0 + Duration::from_millis(4050);
        m.update(mid_hide);
        let notices = m.show(selection("wang", 0), &request("wang"), &mut measure, mid_hide);
        assert_eq!(notices[0], DialogueNotice::Hidden(NpcId::new("lee")));
        assert_eq!(m.update(mid_hide + Duration::from_millis(200)), None);
    }

    #[test]
    fn destroy_is_idempotent() {
        let mut m = manager();
        let mut measure = MonospaceMeasure::new(8.0, 18.0);
        m.show(selection("lee", 0), &request("lee"), &mut measure, Instant::now());
        assert_eq!(m.destroy(), Some(DialogueNotice::Hidden(NpcId::new("lee"))));
        assert_eq!(m.destroy(), None);
        assert_eq!(m.live_count(), 0);
    }

    #[test]
    fn show_transition_pops_then_settles() {
        let mut m = manager();
        let mut measure = MonospaceMeasure::new(8.0, 18.0);
        let t0 = Instant::now();
        m.show(selection("lee", 0), &request("lee"), &mut measure, t0);
        let b = m.current().expect("live");
        assert!(b.scale(t0).abs() < 1e-5);
        assert_eq!(b.alpha(t0 + Duration::from_millis(200)), 1.0);
        assert_eq!(b.scale(t0 + Duration::from_secs(1)), 1.0);
    }

    #[test]
    fn hide_shrinks_and_fades() {
        let mut m = manager();
        let mut measure = MonospaceMeasure::new(8.0, 18.0);
        let t0 = Instant::now();
        m.show(selection("lee", 0), &request("lee"), &mut measure, t0);
        m.update(t0 + Duration::from_millis(4000));
        let b = m.current().expect("hiding");
        // Cubic ease-in: an eighth of the way at the midpoint.
        assert!((b.alpha(t0 + Duration::from_millis(4075)) - 0.875).abs() < 1e-3);
        let end = t0 + Duration::from_millis(4149);
        assert!(b.alpha(end) < 0.05);
        assert!((b.scale(end) - HIDE_SCALE).abs() < 0.01);
    }

    #[test]
    fn new_placement_applies_on_reanchor() {
        let mut m = manager();
        let mut measure = MonospaceMeasure::new(8.0, 18.0);
        let mut far = request("lee");
        far.x = 1000.0;
        m.show(selection("lee", 0), &far, &mut measure, Instant::now());
        assert_eq!(m.current().map(|b| b.position().x), Some(904.0));

        let mut narrow = DialogueConfig::default();
        narrow.bounds.max_x = 600.0;
        m.set_placement(narrow);
        m.reanchor(&far);
        assert_eq!(m.current().map(|b| b.position().x), Some(600.0));
    }

    #[test]
    fn reanchor_moves_only_owner() {
        let mut m = manager();
        let mut measure = MonospaceMeasure::new(8.0, 18.0);
        m.show(selection("lee", 0), &request("lee"), &mut measure, Instant::now());

        let mut other = request("wang");
        other.x = 300.0;
        m.reanchor(&other);
        assert_eq!(m.current().map(|b| b.position().x), Some(500.0));

        let mut moved = request("lee");
        moved.x = 300.0;
        moved.y = 600.0;
        m.reanchor(&moved);
        assert_eq!(
            m.current().map(|b| b.position()),
            Some(Point::new(300.0, 515.0))
        );
    }
}
