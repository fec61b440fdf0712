//! Scene state to draw commands. Read-only with respect to the scene.

use std::time::Instant;

use crate::bubble::Bubble;
use crate::config::BubbleStyle;
use crate::dialogue::BubbleMode;
use crate::geometry::Point;
use crate::scene::{OfficeScene, ToastKind};
use crate::ui::{DrawList, PanelCommand, TextAlign, TextCommand, Theme, TriangleCommand};

/// Trailing circles under a thought bubble: (distance below the body's
/// bottom edge, radius).
const THOUGHT_DOTS: [(f32, f32); 2] = [(18.0, 8.0), (32.0, 5.0)];

/// Bubble text is held back until the pop has grown the body enough to
/// contain it.
const TEXT_MIN_SCALE: f32 = 0.6;

/// Build the full frame for `scene` at `now`, back to front.
pub fn build_draw_list(scene: &OfficeScene, now: Instant, theme: &Theme) -> DrawList {
    let mut list = DrawList::new();

    let bg = scene.transform().display_rect();
    list.panels.push(PanelCommand {
        x: bg.x,
        y: bg.y,
        width: bg.width,
        height: bg.height,
        corner_radius: 0.0,
        bg_color: theme.floor,
        border_color: theme.floor,
        border_width: 0.0,
    });

    if scene.show_hotspots() {
        for h in scene.hotspots() {
            list.panels.push(PanelCommand::circle(
                h.zone.center.x,
                h.zone.center.y,
                h.zone.radius,
                theme.hotspot_overlay,
                theme.hotspot_overlay_border,
                1.0,
            ));
        }
    }

    for s in scene.standing() {
        let fill = if scene.highlights().is_hovering(&s.npc) {
            theme.sprite_hover
        } else {
            theme.sprite_fill
        };
        list.panels.push(PanelCommand {
            x: s.frame.x,
            y: s.frame.y,
            width: s.frame.width,
            height: s.frame.height,
            corner_radius: (s.frame.width * 0.25).min(12.0),
            bg_color: fill,
            border_color: theme.sprite_border,
            border_width: 1.0,
        });
    }

    push_labels(&mut list, scene, theme);

    if let Some(bubble) = scene.bubble() {
        push_bubble(&mut list, bubble, scene.config().bubble.clone(), now, theme);
    }

    push_status(&mut list, scene, theme);
    list
}

fn push_labels(list: &mut DrawList, scene: &OfficeScene, theme: &Theme) {
    let hotspot_ids = scene.hotspots().into_iter().map(|h| h.npc);
    let standing_ids = scene.standing().into_iter().map(|s| s.npc);
    let overlay = scene.show_hotspots();

    for npc in hotspot_ids.chain(standing_ids) {
        if !(overlay || scene.highlights().label_visible(&npc)) {
            continue;
        }
        let Some(anchor) = scene.label_anchor(&npc) else {
            continue;
        };
        list.texts.push(TextCommand {
            text: scene.character_name(&npc).to_string(),
            x: anchor.x,
            y: anchor.y - theme.label_line_height,
            color: theme.label_text,
            font_size: theme.label_font_size,
            line_height: theme.label_line_height,
            wrap_width: None,
            align: TextAlign::Center,
        });
    }
}

fn push_bubble(
    list: &mut DrawList,
    bubble: &Bubble,
    style: BubbleStyle,
    now: Instant,
    theme: &Theme,
) {
    let alpha = bubble.alpha(now);
    let scale = bubble.scale(now).max(0.0);
    if alpha <= 0.0 || scale <= 0.0 {
        return;
    }

    let center = bubble.position();
    let size = bubble.size();
    let (w, h) = (size.width * scale, size.height * scale);
    let fill = match bubble.mode() {
        BubbleMode::Normal => theme.bubble_fill,
        BubbleMode::Thought => theme.thought_fill,
    };
    let fill = Theme::faded(fill, alpha);
    let border = Theme::faded(theme.bubble_border, alpha);

    list.panels.push(PanelCommand {
        x: center.x - w / 2.0,
        y: center.y - h / 2.0,
        width: w,
        height: h,
        corner_radius: style.corner_radius * scale,
        bg_color: fill,
        border_color: border,
        border_width: theme.bubble_border_width,
    });

    let bottom = center.y + h / 2.0;
    match bubble.mode() {
        BubbleMode::Normal => {
            let half = style.tail_width * scale / 2.0;
            // Tuck the base under the border so the seam does not show.
            let base_y = bottom - theme.bubble_border_width;
            list.triangles.push(TriangleCommand {
                points: [
                    [center.x - half, base_y],
                    [center.x + half, base_y],
                    [center.x, bottom + bubble.tail_size() * scale],
                ],
                color: fill,
            });
        }
        BubbleMode::Thought => {
            for (below, radius) in THOUGHT_DOTS {
                let dot = Point::new(center.x, bottom + below * scale);
                list.panels.push(PanelCommand::circle(
                    dot.x,
                    dot.y,
                    radius * scale,
                    fill,
                    border,
                    theme.bubble_border_width * 0.5,
                ));
            }
        }
    }

    if scale >= TEXT_MIN_SCALE {
        let text = bubble.text_size();
        let color = match bubble.mode() {
            BubbleMode::Normal => theme.bubble_text,
            BubbleMode::Thought => theme.thought_text,
        };
        list.texts.push(TextCommand {
            text: bubble.message().to_string(),
            x: center.x,
            y: center.y - text.height / 2.0,
            color: Theme::faded(color, alpha),
            font_size: style.font_size,
            line_height: style.line_height,
            wrap_width: Some(style.wrap_width),
            align: TextAlign::Center,
        });
    }
}

/// Lines for the status strip, paired with whether they are errors.
pub fn status_lines(scene: &OfficeScene) -> Vec<(String, bool)> {
    let mut lines = Vec::new();
    if let Some(toast) = scene.toast() {
        lines.push((toast.message.clone(), toast.kind == ToastKind::Error));
    }
    if let Some(topic) = scene.topic() {
        lines.push((format!("Topic: {}", topic), false));
    }
    if scene.show_hotspots() {
        let counts: Vec<String> = scene
            .click_counts()
            .iter()
            .map(|(id, n)| format!("{} {}", id, n))
            .collect();
        lines.push((format!("Clicks: {}", counts.join(", ")), false));
    }
    lines
}

fn push_status(list: &mut DrawList, scene: &OfficeScene, theme: &Theme) {
    let lines = status_lines(scene);
    if lines.is_empty() {
        return;
    }
    let viewport = scene.transform().viewport();
    let height = lines.len() as f32 * theme.status_line_height + theme.status_padding * 2.0;
    let top = viewport.height - height;
    list.panels.push(PanelCommand {
        x: 0.0,
        y: top,
        width: viewport.width,
        height,
        corner_radius: 0.0,
        bg_color: theme.status_bg,
        border_color: theme.status_bg,
        border_width: 0.0,
    });
    for (i, (line, is_error)) in lines.into_iter().enumerate() {
        list.texts.push(TextCommand {
            text: line,
            x: theme.status_padding,
            y: top + theme.status_padding + i as f32 * theme.status_line_height,
            color: if is_error {
                theme.status_error
            } else {
                theme.status_text
            },
            font_size: theme.status_font_size,
            line_height: theme.status_line_height,
            wrap_width: None,
            align: TextAlign::Left,
        });
    }
}
