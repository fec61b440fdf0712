//! Where a speech bubble goes, given its anchor and its measured size.
//!
//! Bubble height depends on wrapped text, so callers construct and measure a
//! bubble first and only then ask for its position.

use serde::{Deserialize, Serialize};

use crate::config::DialogueConfig;
use crate::events::DialogueRequest;
use crate::geometry::Point;
use crate::transform::BackgroundTransform;

/// Bubble size as measured after text layout.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BubbleMetrics {
    /// Body height, tail excluded.
    pub height: f32,
    pub tail_size: f32,
}

/// Margins a bubble centre must respect, in background data space. There is
/// no bottom bound.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlacementBounds {
    pub min_x: f32,
    pub max_x: f32,
    pub min_y: f32,
}

impl Default for PlacementBounds {
    fn default() -> Self {
        Self {
            min_x: 120.0,
            max_x: 904.0,
            min_y: 80.0,
        }
    }
}

impl PlacementBounds {
    /// Swap inverted horizontal bounds. Returns true if a repair was needed.
    pub fn normalize(&mut self) -> bool {
        if self.min_x > self.max_x {
            std::mem::swap(&mut self.min_x, &mut self.max_x);
            true
        } else {
            false
        }
    }

    /// The same margins in screen space under `transform`.
    pub fn to_world(&self, transform: &BackgroundTransform) -> Self {
        let min = transform.data_to_world(Point::new(self.min_x, self.min_y));
        let max = transform.data_to_world(Point::new(self.max_x, self.min_y));
        Self {
            min_x: min.x,
            max_x: max.x,
            min_y: min.y,
        }
    }

    pub fn clamp(&self, target: Point) -> Point {
        Point::new(target.x.min(self.max_x).max(self.min_x), target.y.max(self.min_y))
    }
}

/// Unclamped bubble centre for `request`.
///
/// Hotspot anchors (radius present) put the tail tip `gap` pixels outside the
/// circle. Standing anchors use a fixed offset above the sprite's head.
pub fn target_position(
    request: &DialogueRequest,
    metrics: BubbleMetrics,
    config: &DialogueConfig,
) -> Point {
    let offset_x = request.bubble_offset_x.unwrap_or(0.0);
    let offset_y = request.bubble_offset_y.unwrap_or(0.0);

    let target_y = match request.radius {
        Some(radius) => {
            let gap = request.bubble_gap.unwrap_or(config.hotspot_gap);
            let base_y = request.y - radius - metrics.tail_size - metrics.height / 2.0 - gap;
            base_y + offset_y
        }
        None => request.y + config.standing.base_offset_y + offset_y,
    };

    Point::new(request.x + offset_x, target_y)
}

/// Final bubble centre: the target clamped into the configured bounds.
pub fn resolve_bubble_position(
    request: &DialogueRequest,
    metrics: BubbleMetrics,
    config: &DialogueConfig,
) -> Point {
    config
        .bounds
        .clamp(target_position(request, metrics, config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::NpcId;

    fn open_bounds() -> DialogueConfig {
        DialogueConfig {
            bounds: PlacementBounds {
                min_x: -10_000.0,
                max_x: 10_000.0,
                min_y: -10_000.0,
            },
            ..DialogueConfig::default()
        }
    }

    fn metrics() -> BubbleMetrics {
        BubbleMetrics {
            height: 60.0,
            tail_size: 12.0,
        }
    }

    #[test]
    fn hotspot_places_tail_outside_circle() {
        let mut req = DialogueRequest::hotspot(NpcId::new("host"), "Host", 500.0, 500.0, 40.0);
        req.bubble_gap = Some(12.0);
        req.bubble_offset_y = Some(0.0);
        let p = resolve_bubble_position(&req, metrics(), &open_bounds());
        assert_eq!(p, Point::new(500.0, 406.0));
    }

    #[test]
    fn hotspot_gap_defaults_to_config() {
        let req = DialogueRequest::hotspot(NpcId::new("host"), "Host", 500.0, 500.0, 40.0);
        let p = resolve_bubble_position(&req, metrics(), &open_bounds());
        // Default gap is 12.
        assert_eq!(p.y, 406.0);
    }

    #[test]
    fn hotspot_offset_nudges_both_axes() {
        let mut req = DialogueRequest::hotspot(NpcId::new("host"), "Host", 500.0, 500.0, 40.0);
        req.bubble_offset_x = Some(-25.0);
        req.bubble_offset_y = Some(-100.0);
        let p = resolve_bubble_position(&req, metrics(), &open_bounds());
        assert_eq!(p, Point::new(475.0, 306.0));
    }

    #[test]
    fn standing_uses_base_offset() {
        let mut req = DialogueRequest::standing(NpcId::new("lee"), "Lee", 300.0, 400.0);
        req.bubble_offset_y = Some(-20.0);
        let p = resolve_bubble_position(&req, metrics(), &open_bounds());
        // -150 base, -20 extra; measured height plays no part.
        assert_eq!(p, Point::new(300.0, 230.0));
    }

    #[test]
    fn clamps_to_bounds() {
        let config = DialogueConfig::default();
        let left = DialogueRequest::hotspot(NpcId::new("a"), "A", 5.0, 10.0, 40.0);
        let p = resolve_bubble_position(&left, metrics(), &config);
        assert_eq!(p.x, config.bounds.min_x);
        assert_eq!(p.y, config.bounds.min_y);

        let right = DialogueRequest::standing(NpcId::new("b"), "B", 5000.0, 900.0);
        let p = resolve_bubble_position(&right, metrics(), &config);
        assert_eq!(p.x, config.bounds.max_x);
        assert_eq!(p.y, 750.0);
    }

    #[test]
    fn clamp_holds_for_many_anchors() {
        let config = DialogueConfig::default();
        let b = config.bounds;
        for ix in -5..25 {
            for iy in -5..25 {
                let x = ix as f32 * 53.0;
                let y = iy as f32 * 47.0;
                let mut req = DialogueRequest::hotspot(NpcId::new("n"), "N", x, y, 30.0);
                req.bubble_offset_x = Some((ix * 7) as f32 - 60.0);
                req.bubble_offset_y = Some((iy * 11) as f32 - 200.0);
                let p = resolve_bubble_position(&req, metrics(), &config);
                assert!(p.x >= b.min_x && p.x <= b.max_x, "x {} out of bounds", p.x);
                assert!(p.y >= b.min_y, "y {} above top margin", p.y);

                let standing = DialogueRequest::standing(NpcId::new("n"), "N", x, y);
                let p = resolve_bubble_position(&standing, metrics(), &config);
                assert!(p.x >= b.min_x && p.x <= b.max_x);
                assert!(p.y >= b.min_y);
            }
        }
    }

    #[test]
    fn bounds_follow_the_letterbox() {
        let natural = crate::geometry::Size::new(1024.0, 1024.0);
        let bounds = PlacementBounds::default();

        let small = BackgroundTransform::fit(natural, crate::geometry::Size::new(600.0, 600.0));
        let b = bounds.to_world(&small);
        assert!((b.min_x - 70.3125).abs() < 1e-3);
        assert!((b.max_x - 529.6875).abs() < 1e-3);
        assert!((b.min_y - 46.875).abs() < 1e-3);

        // Pillarboxed: bounds shift by the horizontal offset.
        let wide = BackgroundTransform::fit(natural, crate::geometry::Size::new(1920.0, 1080.0));
        let b = bounds.to_world(&wide);
        assert!((b.min_x - (420.0 + 120.0 * 1.0546875)).abs() < 1e-3);
        assert!((b.max_x - (420.0 + 904.0 * 1.0546875)).abs() < 1e-3);
    }

    #[test]
    fn normalize_swaps_inverted_bounds() {
        let mut b = PlacementBounds {
            min_x: 900.0,
            max_x: 100.0,
            min_y: 0.0,
        };
        assert!(b.normalize());
        assert_eq!((b.min_x, b.max_x), (100.0, 900.0));
        assert!(!b.normalize());
    }
}
