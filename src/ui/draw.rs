/// Rounded rectangle (or circle, when `corner_radius` is half the smaller
/// side). Consumed by `PanelRenderer::add_panel()`.
#[derive(Debug, Clone, PartialEq)]
pub struct PanelCommand {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub corner_radius: f32,
    pub bg_color: [f32; 4],     // sRGB RGBA
    pub border_color: [f32; 4], // sRGB RGBA
    pub border_width: f32,
}

impl PanelCommand {
    /// Filled circle with an optional outline.
    pub fn circle(
        cx: f32,
        cy: f32,
        radius: f32,
        bg_color: [f32; 4],
        border_color: [f32; 4],
        border_width: f32,
    ) -> Self {
        Self {
            x: cx - radius,
            y: cy - radius,
            width: radius * 2.0,
            height: radius * 2.0,
            corner_radius: radius,
            bg_color,
            border_color,
            border_width,
        }
    }
}

/// Solid triangle, e.g. a bubble tail. Consumed by
/// `PanelRenderer::add_triangle()`.
#[derive(Debug, Clone, PartialEq)]
pub struct TriangleCommand {
    pub points: [[f32; 2]; 3],
    pub color: [f32; 4],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextAlign {
    /// `x` is the left edge.
    Left,
    /// `x` is the horizontal centre of the widest line.
    Center,
}

/// Intermediate draw command for a text run.
/// Consumed by `FontRenderer::prepare_text()`.
#[derive(Debug, Clone, PartialEq)]
pub struct TextCommand {
    pub text: String,
    pub x: f32,
    /// Top of the first line.
    pub y: f32,
    pub color: [f32; 4], // sRGB RGBA
    pub font_size: f32,
    pub line_height: f32,
    /// Wrap at this width in pixels; `None` never wraps.
    pub wrap_width: Option<f32>,
    pub align: TextAlign,
}

/// Collects draw commands for one frame, back to front.
/// Decouples scene state from GPU renderers.
#[derive(Debug, Default)]
pub struct DrawList {
    pub panels: Vec<PanelCommand>,
    pub triangles: Vec<TriangleCommand>,
    pub texts: Vec<TextCommand>,
}

impl DrawList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.panels.clear();
        self.triangles.clear();
        self.texts.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.panels.is_empty() && self.triangles.is_empty() && self.texts.is_empty()
    }
}
