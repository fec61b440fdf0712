/// Centralized visual style constants.
///
/// Single theme, no runtime switching. The draw-list builder reads from
/// Theme instead of hardcoding colors.
#[derive(Debug, Clone)]
pub struct Theme {
    // -- Scene --
    /// Window clear color outside the letterboxed background.
    pub letterbox: [f32; 4],
    /// Stand-in fill for the background image: #E8DCC8
    pub floor: [f32; 4],

    // -- Bubbles --
    pub bubble_fill: [f32; 4],
    pub bubble_border: [f32; 4],
    pub bubble_border_width: f32,
    /// Thought bubbles read softer.
    pub thought_fill: [f32; 4],
    pub bubble_text: [f32; 4],
    pub thought_text: [f32; 4],

    // -- NPCs --
    pub sprite_fill: [f32; 4],
    /// Sprite fill while the pointer is over it.
    pub sprite_hover: [f32; 4],
    pub sprite_border: [f32; 4],
    pub hotspot_overlay: [f32; 4],
    pub hotspot_overlay_border: [f32; 4],

    // -- Labels --
    pub label_text: [f32; 4],
    pub label_font_size: f32,
    pub label_line_height: f32,

    // -- Status line --
    pub status_bg: [f32; 4],
    pub status_text: [f32; 4],
    pub status_error: [f32; 4],
    pub status_font_size: f32,
    pub status_line_height: f32,
    pub status_padding: f32,
}

/// Convert a hex color (#RRGGBB) to sRGB [f32; 4] with alpha 1.0.
const fn hex(r: u8, g: u8, b: u8) -> [f32; 4] {
    [r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0, 1.0]
}

/// Convert a hex color with custom alpha.
const fn hex_a(r: u8, g: u8, b: u8, a: f32) -> [f32; 4] {
    [r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0, a]
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            letterbox: hex(0x20, 0x22, 0x26),
            floor: hex(0xE8, 0xDC, 0xC8),

            bubble_fill: hex(0xFF, 0xFF, 0xFF),
            bubble_border: hex(0x33, 0x33, 0x33),
            bubble_border_width: 2.0,
            thought_fill: hex(0xF2, 0xF2, 0xF7),
            bubble_text: hex(0x22, 0x22, 0x22),
            thought_text: hex(0x55, 0x55, 0x66),

            sprite_fill: hex(0x6A, 0x8C, 0xAF),
            sprite_hover: hex(0x8F, 0xB3, 0xD9),
            sprite_border: hex(0x2E, 0x3D, 0x4F),
            hotspot_overlay: hex_a(0xFF, 0xC8, 0x40, 0.25),
            hotspot_overlay_border: hex_a(0xFF, 0xA0, 0x00, 0.8),

            label_text: hex(0x1A, 0x1A, 0x1A),
            label_font_size: 12.0,
            label_line_height: 16.0,

            status_bg: hex_a(0x10, 0x10, 0x10, 0.8),
            status_text: hex(0xF0, 0xF0, 0xF0),
            status_error: hex(0xE0, 0x50, 0x50),
            status_font_size: 13.0,
            status_line_height: 18.0,
            status_padding: 8.0,
        }
    }
}

impl Theme {
    /// `color` with its alpha multiplied by `alpha`.
    pub fn faded(color: [f32; 4], alpha: f32) -> [f32; 4] {
        [color[0], color[1], color[2], color[3] * alpha.clamp(0.0, 1.0)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_conversion() {
        let white = hex(0xFF, 0xFF, 0xFF);
        assert!(white.iter().all(|c| (c - 1.0).abs() < 0.001));

        let half_alpha = hex_a(0x80, 0x80, 0x80, 0.5);
        assert!((half_alpha[3] - 0.5).abs() < 0.001);
    }

    #[test]
    fn overlays_are_semi_transparent() {
        let t = Theme::default();
        assert!(t.hotspot_overlay[3] > 0.0 && t.hotspot_overlay[3] < 1.0);
        assert!(t.status_bg[3] < 1.0);
    }

    #[test]
    fn faded_scales_alpha_only() {
        let c = Theme::faded([0.2, 0.4, 0.6, 0.5], 0.5);
        assert_eq!(c, [0.2, 0.4, 0.6, 0.25]);
        assert_eq!(Theme::faded(c, 2.0)[3], 0.25);
    }
}
