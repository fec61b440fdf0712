use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::components::NpcId;
use crate::error::{self, LoadError};
use crate::geometry::Size;
use crate::placement::PlacementBounds;
use crate::transform::BackgroundTransform;

/// Everything tunable about the scene, loaded from `data/config.ron`.
/// Every section falls back to its defaults when omitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    pub background: BackgroundConfig,
    pub window: WindowConfig,
    pub dialogue: DialogueConfig,
    pub bubble: BubbleStyle,
    pub standing_sprite: SpriteFrame,
    pub auto_show: AutoShowConfig,
    /// How long the error indicator stays up after a failed load.
    pub status_toast_ms: u64,
    /// Font used for measuring and drawing text. Searched in common system
    /// locations when absent.
    pub font_path: Option<String>,
    /// KDL file with characters and placements.
    pub scene_path: String,
    /// Directory of `<topic>.json` conversations.
    pub topics_dir: String,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            background: BackgroundConfig::default(),
            window: WindowConfig::default(),
            dialogue: DialogueConfig::default(),
            bubble: BubbleStyle::default(),
            standing_sprite: SpriteFrame::default(),
            auto_show: AutoShowConfig::default(),
            status_toast_ms: 2000,
            font_path: None,
            scene_path: "data/scene.kdl".to_string(),
            topics_dir: "data/topics".to_string(),
        }
    }
}

impl SceneConfig {
    pub fn status_toast(&self) -> Duration {
        Duration::from_millis(self.status_toast_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackgroundConfig {
    /// PNG whose header, when readable, overrides the natural size below.
    pub image_path: Option<String>,
    pub natural_width: f32,
    pub natural_height: f32,
}

impl Default for BackgroundConfig {
    fn default() -> Self {
        Self {
            image_path: None,
            natural_width: 1024.0,
            natural_height: 1024.0,
        }
    }
}

impl BackgroundConfig {
    /// Natural pixel size of the background, preferring the image file.
    pub fn natural_size(&self) -> Size {
        if let Some(path) = &self.image_path {
            match image::image_dimensions(path) {
                Ok((w, h)) => return Size::new(w as f32, h as f32),
                Err(e) => log::warn!("failed to read background {}: {}", path, e),
            }
        }
        Size::new(self.natural_width, self.natural_height)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    pub width: f32,
    pub height: f32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "Deskchat".to_string(),
            width: 1024.0,
            height: 1024.0,
        }
    }
}

/// Bubble placement tuning (see `placement`), in background data space.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DialogueConfig {
    pub standing: StandingDialogueConfig,
    /// Gap between a hotspot circle and the tail tip when the hotspot has no
    /// override.
    pub hotspot_gap: f32,
    pub bounds: PlacementBounds,
}

impl Default for DialogueConfig {
    fn default() -> Self {
        Self {
            standing: StandingDialogueConfig::default(),
            hotspot_gap: 12.0,
            bounds: PlacementBounds::default(),
        }
    }
}

impl DialogueConfig {
    /// Lengths and bounds here are in background data space. Scale them to
    /// the current window.
    pub fn to_world(&self, transform: &BackgroundTransform) -> Self {
        Self {
            standing: StandingDialogueConfig {
                base_offset_y: transform.scale_dy(self.standing.base_offset_y),
                extra_offset_y: transform.scale_dy(self.standing.extra_offset_y),
            },
            hotspot_gap: transform.scale_radius(self.hotspot_gap),
            bounds: self.bounds.to_world(transform),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StandingDialogueConfig {
    /// Distance from a standing sprite's head to the bubble centre.
    pub base_offset_y: f32,
    /// Extra nudge carried by every standing click request.
    pub extra_offset_y: f32,
}

impl Default for StandingDialogueConfig {
    fn default() -> Self {
        Self {
            base_offset_y: -150.0,
            extra_offset_y: -20.0,
        }
    }
}

/// Bubble box layout, in screen pixels.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BubbleStyle {
    pub padding: f32,
    pub corner_radius: f32,
    pub tail_size: f32,
    /// Width of the tail where it meets the bubble body.
    pub tail_width: f32,
    pub wrap_width: f32,
    pub min_width: f32,
    pub font_size: f32,
    pub line_height: f32,
}

impl Default for BubbleStyle {
    fn default() -> Self {
        Self {
            padding: 12.0,
            corner_radius: 8.0,
            tail_size: 12.0,
            tail_width: 16.0,
            wrap_width: 200.0,
            min_width: 80.0,
            font_size: 14.0,
            line_height: 18.0,
        }
    }
}

/// Standing sprite frame size in data-space pixels.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct SpriteFrame {
    pub width: f32,
    pub height: f32,
}

impl Default for SpriteFrame {
    fn default() -> Self {
        Self {
            width: 78.0,
            height: 93.0,
        }
    }
}

/// After a topic is applied, optionally pop one character's first line.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoShowConfig {
    pub character: Option<NpcId>,
    pub delay_ms: u64,
}

impl Default for AutoShowConfig {
    fn default() -> Self {
        Self {
            character: None,
            delay_ms: 500,
        }
    }
}

impl AutoShowConfig {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

/// Parse a RON config string, repairing inverted bounds.
pub fn parse_config(content: &str) -> Result<SceneConfig, LoadError> {
    let mut config: SceneConfig = ron::from_str(content)?;
    if config.dialogue.bounds.normalize() {
        log::warn!("dialogue bounds had min_x > max_x, swapped");
    }
    Ok(config)
}

/// Load scene config from a RON file, falling back to defaults.
pub fn load_config(path: &str) -> SceneConfig {
    let content = match error::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            log::warn!("{}, using default config", e);
            return SceneConfig::default();
        }
    };
    match parse_config(&content) {
        Ok(config) => config,
        Err(e) => {
            log::warn!("failed to parse RON {}: {}, using default config", path, e);
            SceneConfig::default()
        }
    }
}
