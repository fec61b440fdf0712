use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

/// Easing curve applied to linear progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Easing {
    /// Constant speed interpolation.
    Linear,
    /// Cubic ease-out: fast start, slow end.
    EaseOut,
    /// Overshoots the target slightly before settling ("pop").
    BackOut,
    /// Sine ease-out: gentle deceleration ("calm").
    SineOut,
    /// Cubic ease-in: slow start, used for exits.
    CubicIn,
}

/// A single active animation interpolating an f32 value over time.
#[derive(Debug, Clone)]
struct Animation {
    from: f32,
    to: f32,
    start: Instant,
    duration: Duration,
    easing: Easing,
}

impl Animation {
    fn value(&self, now: Instant) -> f32 {
        let elapsed = now.saturating_duration_since(self.start);
        if self.duration.is_zero() || elapsed >= self.duration {
            return self.to;
        }
        let t = elapsed.as_secs_f32() / self.duration.as_secs_f32();
        self.from + (self.to - self.from) * ease(t, self.easing)
    }

    fn finished(&self, now: Instant) -> bool {
        self.duration.is_zero() || now.saturating_duration_since(self.start) >= self.duration
    }
}

/// Time-driven f32 interpolation keyed by channel.
///
/// Animations tick on wall-clock `Instant`s supplied by the caller, so tests
/// can step time without sleeping.
#[derive(Debug, Clone)]
pub struct Animator<K> {
    animations: HashMap<K, Animation>,
}

impl<K: Eq + Hash> Default for Animator<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Eq + Hash> Animator<K> {
    pub fn new() -> Self {
        Self {
            animations: HashMap::new(),
        }
    }

    /// Start (or restart) an animation, replacing any on the same key.
    pub fn start(
        &mut self,
        key: K,
        from: f32,
        to: f32,
        duration: Duration,
        easing: Easing,
        now: Instant,
    ) {
        self.animations.insert(
            key,
            Animation {
                from,
                to,
                start: now,
                duration,
                easing,
            },
        );
    }

    /// Current interpolated value, `None` if the key was never started.
    /// Holds the `to` value once complete.
    pub fn get(&self, key: &K, now: Instant) -> Option<f32> {
        self.animations.get(key).map(|a| a.value(now))
    }

    /// True if the animation exists and has not yet completed.
    pub fn is_active(&self, key: &K, now: Instant) -> bool {
        self.animations.get(key).is_some_and(|a| !a.finished(now))
    }

    /// True once every animation has reached its target.
    pub fn all_finished(&self, now: Instant) -> bool {
        self.animations.values().all(|a| a.finished(now))
    }

    pub fn target(&self, key: &K) -> Option<f32> {
        self.animations.get(key).map(|a| a.to)
    }

    pub fn remove(&mut self, key: &K) {
        self.animations.remove(key);
    }

    pub fn clear(&mut self) {
        self.animations.clear();
    }
}

/// Apply an easing function to a linear progress value `t` in [0, 1].
pub fn ease(t: f32, easing: Easing) -> f32 {
    let t = t.clamp(0.0, 1.0);
    match easing {
        Easing::Linear => t,
        Easing::EaseOut => {
            let f = 1.0 - t;
            1.0 - f * f * f
        }
        Easing::BackOut => {
            const C1: f32 = 1.70158;
            const C3: f32 = C1 + 1.0;
            let f = t - 1.0;
            1.0 + C3 * f * f * f + C1 * f * f
        }
        Easing::SineOut => (t * std::f32::consts::FRAC_PI_2).sin(),
        Easing::CubicIn => t * t * t,
    }
}
