//! Text measurement for bubble layout.
//!
//! Bubbles need their wrapped text size before they can be placed, so
//! measurement is a seam: the binary measures with cosmic-text against the
//! real font, tests use a fixed-advance monospace model.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use cosmic_text::{Attrs, Buffer, Family, FontSystem, Metrics, Shaping, Wrap};

use crate::error::LoadError;
use crate::geometry::Size;

/// Measures laid-out text.
pub trait TextMeasure {
    /// Size of `text` wrapped at `wrap_width` pixels.
    fn measure(&mut self, text: &str, wrap_width: f32) -> Size;

    /// Drop any cached layouts.
    fn clear_cache(&mut self) {}
}

/// Fixed-advance layout with greedy word wrap. Deterministic, needs no font.
#[derive(Debug, Clone, Copy)]
pub struct MonospaceMeasure {
    pub advance: f32,
    pub line_height: f32,
}

impl MonospaceMeasure {
    pub fn new(advance: f32, line_height: f32) -> Self {
        Self {
            advance,
            line_height,
        }
    }

    /// Split `text` into lines no wider than `wrap_width`. Words longer than a
    /// line are broken at the character limit.
    pub fn wrap(&self, text: &str, wrap_width: f32) -> Vec<String> {
        let max_chars = if self.advance > 0.0 {
            ((wrap_width / self.advance).floor() as usize).max(1)
        } else {
            usize::MAX
        };

        let mut lines = Vec::new();
        for paragraph in text.split('\n') {
            let mut line = String::new();
            for word in paragraph.split_whitespace() {
                let mut word: Vec<char> = word.chars().collect();
                loop {
                    let line_len = line.chars().count();
                    let needed = if line.is_empty() { word.len() } else { line_len + 1 + word.len() };
                    if needed <= max_chars {
                        if !line.is_empty() {
                            line.push(' ');
                        }
                        line.extend(word.iter());
                        break;
                    }
                    if !line.is_empty() {
                        lines.push(std::mem::take(&mut line));
                        continue;
                    }
                    // Overlong word on an empty line: hard break.
                    let rest = word.split_off(max_chars);
                    lines.push(word.into_iter().collect());
                    word = rest;
                    if word.is_empty() {
                        break;
                    }
                }
            }
            lines.push(line);
        }
        lines
    }
}

impl TextMeasure for MonospaceMeasure {
    fn measure(&mut self, text: &str, wrap_width: f32) -> Size {
        let lines = self.wrap(text, wrap_width);
        let widest = lines.iter().map(|l| l.chars().count()).max().unwrap_or(0);
        Size::new(
            widest as f32 * self.advance,
            lines.len() as f32 * self.line_height,
        )
    }
}

/// cosmic-text layout against a single loaded font.
pub struct CosmicMeasure {
    font_system: FontSystem,
    family: String,
    metrics: Metrics,
    cache: HashMap<(String, u32), Size>,
}

impl CosmicMeasure {
    pub fn new(font_bytes: Vec<u8>, font_size: f32, line_height: f32) -> Self {
        let mut db = cosmic_text::fontdb::Database::new();
        db.load_font_data(font_bytes);
        let family = db
            .faces()
            .find_map(|face| face.families.first().map(|(name, _)| name.clone()))
            .unwrap_or_else(|| "sans-serif".to_string());
        let font_system = FontSystem::new_with_locale_and_db("en-US".to_string(), db);
        Self {
            font_system,
            family,
            metrics: Metrics::new(font_size, line_height),
            cache: HashMap::new(),
        }
    }

    pub fn from_path(path: &Path, font_size: f32, line_height: f32) -> Result<Self, LoadError> {
        let bytes = std::fs::read(path).map_err(|e| LoadError::io(path, e))?;
        Ok(Self::new(bytes, font_size, line_height))
    }

    pub fn family(&self) -> &str {
        &self.family
    }
}

impl TextMeasure for CosmicMeasure {
    fn measure(&mut self, text: &str, wrap_width: f32) -> Size {
        let key = (text.to_string(), wrap_width.to_bits());
        if let Some(size) = self.cache.get(&key) {
            return *size;
        }

        let mut buffer = Buffer::new(&mut self.font_system, self.metrics);
        buffer.set_wrap(&mut self.font_system, Wrap::WordOrGlyph);
        buffer.set_size(&mut self.font_system, Some(wrap_width), None);
        let attrs = Attrs::new().family(Family::Name(&self.family));
        buffer.set_text(&mut self.font_system, text, &attrs, Shaping::Advanced, None);
        buffer.shape_until_scroll(&mut self.font_system, false);

        let mut width: f32 = 0.0;
        let mut lines = 0usize;
        for run in buffer.layout_runs() {
            width = width.max(run.line_w);
            lines += 1;
        }
        let size = Size::new(width.ceil(), lines.max(1) as f32 * self.metrics.line_height);
        self.cache.insert(key, size);
        size
    }

    fn clear_cache(&mut self) {
        self.cache.clear();
    }
}

/// Places fonts are commonly installed, tried in order when no font is
/// configured.
const SYSTEM_FONTS: &[&str] = &[
    "fonts/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

/// Resolve the font to use: the configured path if it exists, otherwise the
/// first system font found.
pub fn find_font(configured: Option<&str>) -> Option<PathBuf> {
    if let Some(path) = configured {
        let path = PathBuf::from(path);
        if path.exists() {
            return Some(path);
        }
        log::warn!("configured font {} not found, searching system fonts", path.display());
    }
    SYSTEM_FONTS
        .iter()
        .map(PathBuf::from)
        .find(|p| p.exists())
}

/// Load the font bytes for `configured`, or fail with the path tried.
pub fn load_font_bytes(configured: Option<&str>) -> Result<(PathBuf, Vec<u8>), LoadError> {
    let path = find_font(configured)
        .ok_or_else(|| LoadError::malformed("no usable font found"))?;
    let bytes = std::fs::read(&path).map_err(|e| LoadError::io(&path, e))?;
    Ok((path, bytes))
}
