//! Cross-module invariants: streak saturation, thought mode, the single live
//! bubble, coordinate round trips and placement clamping.

use std::time::{Duration, Instant};

use deskchat::components::{Character, HotspotPlacement, NpcId, Placement};
use deskchat::config::{DialogueConfig, SceneConfig};
use deskchat::dialogue::BubbleMode;
use deskchat::events::{DialogueRequest, SceneEvent};
use deskchat::geometry::{Point, Size};
use deskchat::loading::SceneLayout;
use deskchat::placement::{self, BubbleMetrics};
use deskchat::scene::OfficeScene;
use deskchat::text::MonospaceMeasure;
use deskchat::transform::BackgroundTransform;

fn character(id: &str) -> Character {
    Character {
        id: NpcId::new(id),
        name: id.to_uppercase(),
        position: String::new(),
        dialogues: [
            format!("{id} one"),
            format!("{id} two"),
            format!("{id} three..."),
        ],
    }
}

fn hotspot(id: &str, x: f32, y: f32) -> Placement {
    Placement::Hotspot(HotspotPlacement {
        character_id: NpcId::new(id),
        at: Point::new(x, y),
        radius: 40.0,
        bubble_offset_x: None,
        bubble_offset_y: None,
        bubble_gap: None,
    })
}

/// Three seated NPCs on an unscaled 1024x1024 background.
fn test_scene() -> OfficeScene {
    let layout = SceneLayout {
        characters: vec![character("a"), character("b"), character("c")],
        placements: vec![
            hotspot("a", 300.0, 500.0),
            hotspot("b", 500.0, 500.0),
            hotspot("c", 700.0, 500.0),
        ],
    };
    OfficeScene::new(
        SceneConfig::default(),
        layout,
        Size::new(1024.0, 1024.0),
        Box::new(MonospaceMeasure::new(8.0, 18.0)),
    )
}

fn shown(scene: &OfficeScene) -> Vec<(NpcId, usize, BubbleMode)> {
    scene
        .events()
        .iter()
        .filter_map(|e| match e {
            SceneEvent::DialogueShown { npc, index, mode } => Some((npc.clone(), *index, *mode)),
            _ => None,
        })
        .collect()
}

#[test]
fn streak_saturates_at_two() {
    let mut scene = test_scene();
    let t0 = Instant::now();
    for i in 0..8 {
        scene.pointer_down(Point::new(500.0, 500.0), t0 + Duration::from_millis(i * 100));
    }
    let indices: Vec<usize> = shown(&scene).into_iter().map(|(_, i, _)| i).collect();
    assert_eq!(indices, vec![0, 1, 2, 2, 2, 2, 2, 2]);
    assert_eq!(scene.click_count(&NpcId::new("b")), Some(2));
}

#[test]
fn streak_never_decreases_without_switch() {
    let mut scene = test_scene();
    let t0 = Instant::now();
    let mut last = 0;
    for i in 0..6 {
        scene.pointer_down(Point::new(300.0, 500.0), t0 + Duration::from_millis(i * 50));
        let count = scene.click_count(&NpcId::new("a")).unwrap_or(0);
        assert!(count >= last);
        assert!(count <= 2);
        last = count;
    }
}

#[test]
fn thought_mode_iff_third_line() {
    let mut scene = test_scene();
    let t0 = Instant::now();
    let clicks = [
        Point::new(300.0, 500.0),
        Point::new(300.0, 500.0),
        Point::new(300.0, 500.0),
        Point::new(300.0, 500.0),
        Point::new(500.0, 500.0),
        Point::new(500.0, 500.0),
        Point::new(500.0, 500.0),
    ];
    for (i, p) in clicks.iter().enumerate() {
        let now = t0 + Duration::from_millis(i as u64 * 10);
        scene.pointer_down(*p, now);

        let bubble = scene.bubble().expect("a bubble is live after a click");
        let expected = if bubble.index() == 2 {
            (BubbleMode::Thought, Duration::from_millis(6000))
        } else {
            (BubbleMode::Normal, Duration::from_millis(4000))
        };
        assert_eq!(bubble.mode(), expected.0);
        assert_eq!(bubble.hide_deadline(), Some(now + expected.1));
    }
    for (_, index, mode) in shown(&scene) {
        assert_eq!(mode == BubbleMode::Thought, index == 2);
    }
}

#[test]
fn at_most_one_live_bubble() {
    let mut scene = test_scene();
    let t0 = Instant::now();
    let targets = [300.0, 500.0, 700.0, 700.0, 300.0, 500.0];
    for (i, x) in targets.iter().enumerate() {
        let now = t0 + Duration::from_millis(i as u64 * 200);
        scene.update(now);
        scene.pointer_down(Point::new(*x, 500.0), now);
        assert_eq!(scene.bubbles().live_count(), 1);
    }
}

#[test]
fn previous_bubble_hides_before_next_shows() {
    let mut scene = test_scene();
    let t0 = Instant::now();
    scene.pointer_down(Point::new(300.0, 500.0), t0);
    scene.pointer_down(Point::new(500.0, 500.0), t0);
    scene.pointer_down(Point::new(500.0, 500.0), t0);

    let trail: Vec<&SceneEvent> = scene
        .events()
        .iter()
        .filter(|e| !matches!(e, SceneEvent::DialogueRequested { .. }))
        .collect();
    let a = NpcId::new("a");
    let b = NpcId::new("b");
    assert_eq!(
        trail,
        vec![
            &SceneEvent::DialogueShown { npc: a.clone(), index: 0, mode: BubbleMode::Normal },
            &SceneEvent::DialogueHidden { npc: a },
            &SceneEvent::DialogueShown { npc: b.clone(), index: 0, mode: BubbleMode::Normal },
            &SceneEvent::DialogueHidden { npc: b.clone() },
            &SceneEvent::DialogueShown { npc: b, index: 1, mode: BubbleMode::Normal },
        ]
    );
}

#[test]
fn preempting_a_hiding_bubble_still_hides_once() {
    let mut scene = test_scene();
    let t0 = Instant::now();
    scene.pointer_down(Point::new(300.0, 500.0), t0);
    // Mid-way through the hide transition.
    scene.update(t0 + Duration::from_millis(4050));
    scene.pointer_down(Point::new(500.0, 500.0), t0 + Duration::from_millis(4060));
    scene.update(t0 + Duration::from_millis(4300));

    let hidden_a = scene
        .events()
        .iter()
        .filter(|e| matches!(e, SceneEvent::DialogueHidden { npc } if npc.as_str() == "a"))
        .count();
    assert_eq!(hidden_a, 1);
    assert_eq!(scene.bubbles().live_count(), 1);
}

#[test]
fn transform_round_trips() {
    let natural = Size::new(1024.0, 1024.0);
    let viewports = [
        Size::new(1024.0, 1024.0),
        Size::new(800.0, 600.0),
        Size::new(1920.0, 1080.0),
        Size::new(333.0, 777.0),
    ];
    for viewport in viewports {
        let t = BackgroundTransform::fit(natural, viewport);
        let mut x = 0.0;
        while x <= viewport.width {
            let mut y = 0.0;
            while y <= viewport.height {
                let p = Point::new(x, y);
                let back = t.data_to_world(t.world_to_data(p));
                assert!((back.x - p.x).abs() < 1e-3, "{:?} -> {:?}", p, back);
                assert!((back.y - p.y).abs() < 1e-3, "{:?} -> {:?}", p, back);
                y += viewport.height / 7.0;
            }
            x += viewport.width / 7.0;
        }
    }
}

#[test]
fn resolved_positions_respect_bounds() {
    let config = DialogueConfig::default();
    let bounds = config.bounds;
    let metrics = BubbleMetrics {
        height: 60.0,
        tail_size: 12.0,
    };
    let anchors = [-200.0, 0.0, 100.0, 512.0, 900.0, 1500.0];
    let offsets = [-400.0, -150.0, 0.0, 150.0, 400.0];
    for &ax in &anchors {
        for &ay in &anchors {
            for &off in &offsets {
                let mut hot = DialogueRequest::hotspot(NpcId::new("n"), "N", ax, ay, 40.0);
                hot.bubble_offset_x = Some(off);
                hot.bubble_offset_y = Some(off);
                let mut standing = DialogueRequest::standing(NpcId::new("n"), "N", ax, ay);
                standing.bubble_offset_x = Some(-off);
                standing.bubble_offset_y = Some(off);

                for request in [hot, standing] {
                    let p = placement::resolve_bubble_position(&request, metrics, &config);
                    assert!(p.x >= bounds.min_x && p.x <= bounds.max_x, "{:?}", p);
                    assert!(p.y >= bounds.min_y, "{:?}", p);
                }
            }
        }
    }
}

#[test]
fn hotspot_target_matches_worked_example() {
    let mut request = DialogueRequest::hotspot(NpcId::new("n"), "N", 500.0, 500.0, 40.0);
    request.bubble_gap = Some(12.0);
    request.bubble_offset_y = Some(0.0);
    let metrics = BubbleMetrics {
        height: 60.0,
        tail_size: 12.0,
    };
    let target = placement::target_position(&request, metrics, &DialogueConfig::default());
    assert_eq!(target, Point::new(500.0, 406.0));
}
