use crate::geometry::{Point, Rect, Size};

/// Letterbox fit of the background image into the viewport.
///
/// Placements are authored in "data space" (pixels of the background at its
/// natural size). Everything the user sees and clicks lives in "world space"
/// (window pixels). This is the only place the two are related.
///
/// Scales are tracked per axis even though a letterbox fit makes them equal,
/// so that a stretched background keeps working without touching callers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackgroundTransform {
    natural: Size,
    viewport: Size,
    fit_scale: f32,
    scale_x: f32,
    scale_y: f32,
    offset_x: f32,
    offset_y: f32,
    display: Size,
}

impl BackgroundTransform {
    /// Fit `natural` into `viewport`, preserving aspect ratio and centring.
    ///
    /// A degenerate natural size yields the identity transform.
    pub fn fit(natural: Size, viewport: Size) -> Self {
        if natural.is_empty() {
            return Self::identity(viewport);
        }

        let fit_scale = (viewport.width / natural.width).min(viewport.height / natural.height);
        let display = Size::new(natural.width * fit_scale, natural.height * fit_scale);
        let offset_x = (viewport.width - display.width) / 2.0;
        let offset_y = (viewport.height - display.height) / 2.0;

        Self {
            natural,
            viewport,
            fit_scale,
            scale_x: display.width / natural.width,
            scale_y: display.height / natural.height,
            offset_x,
            offset_y,
            display,
        }
    }

    /// Data space and world space coincide.
    pub fn identity(viewport: Size) -> Self {
        Self {
            natural: viewport,
            viewport,
            fit_scale: 1.0,
            scale_x: 1.0,
            scale_y: 1.0,
            offset_x: 0.0,
            offset_y: 0.0,
            display: viewport,
        }
    }

    pub fn natural(&self) -> Size {
        self.natural
    }

    pub fn viewport(&self) -> Size {
        self.viewport
    }

    pub fn fit_scale(&self) -> f32 {
        self.fit_scale
    }

    /// Effective horizontal scale. A zero scale falls back to 1 so the
    /// inverse stays defined.
    pub fn scale_x(&self) -> f32 {
        if self.scale_x > 0.0 { self.scale_x } else { 1.0 }
    }

    /// Effective vertical scale, same fallback as `scale_x`.
    pub fn scale_y(&self) -> f32 {
        if self.scale_y > 0.0 { self.scale_y } else { 1.0 }
    }

    pub fn offset(&self) -> Point {
        Point::new(self.offset_x, self.offset_y)
    }

    /// Where the background image is drawn, in world space.
    pub fn display_rect(&self) -> Rect {
        Rect {
            x: self.offset_x,
            y: self.offset_y,
            width: self.display.width,
            height: self.display.height,
        }
    }

    pub fn data_to_world(&self, p: Point) -> Point {
        Point::new(
            p.x * self.scale_x() + self.offset_x,
            p.y * self.scale_y() + self.offset_y,
        )
    }

    pub fn world_to_data(&self, p: Point) -> Point {
        Point::new(
            (p.x - self.offset_x) / self.scale_x(),
            (p.y - self.offset_y) / self.scale_y(),
        )
    }

    /// Scale a radius-like length. Uses the larger axis so a circle never
    /// under-covers its intended region under uneven scaling.
    pub fn scale_radius(&self, r: f32) -> f32 {
        r * self.scale_x().max(self.scale_y())
    }

    pub fn scale_dx(&self, dx: f32) -> f32 {
        dx * self.scale_x()
    }

    pub fn scale_dy(&self, dy: f32) -> f32 {
        dy * self.scale_y()
    }
}
