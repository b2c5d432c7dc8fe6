//! Overlay configuration structures and TOML loading.


use std::path::Path;

use serde::{Deserialize, Serialize};

/// Top-level overlay configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayConfig {
    pub font: FontConfig,
    pub text: TextConfig,
}

/// Font handling configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FontConfig {
    /// Smallest pixel height a text object may request. Requests below are clamped.
    pub min_height: u32,
    /// Largest pixel height a text object may request. Requests above are clamped.
    pub max_height: u32,
    /// Families tried in order when the requested family resolves to nothing.
    pub fallbacks: Vec<String>,
}

impl Default for FontConfig {
    fn default() -> Self {
        Self {
            min_height: 4,
            max_height: 128,
            fallbacks: vec!["DejaVu Sans".to_owned(), "Liberation Sans".to_owned()],
        }
    }
}

/// Text drawing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TextConfig {
    /// Shadow displacement in device pixels, applied in the four cardinal
    /// directions beneath the main pass.
    pub shadow_offset: i32,
    /// Sample glyph textures with linear filtering instead of point sampling.
    pub filtered: bool,
}

impl Default for TextConfig {
    fn default() -> Self {
        Self {
            shadow_offset: 1,
            filtered: false,
        }
    }
}

impl OverlayConfig {
    /// Parse a configuration from TOML text. Missing sections and fields
    /// fall back to their defaults via `#[serde(default)]`.
    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Load a configuration file, falling back to defaults when the file is
    /// missing or malformed. A malformed file is logged, not fatal.
    pub fn load(path: &Path) -> Self {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(_) => return Self::default(),
        };
        match Self::from_toml(&text) {
            Ok(config) => config,
            Err(err) => {
                log::warn!("config: failed to parse {}: {err}", path.display());
                Self::default()
            }
        }
    }

    /// Clamp a requested font pixel height into the configured range.
    pub fn clamp_font_height(&self, height: u32) -> u32 {
        height.clamp(self.font.min_height, self.font.max_height)
    }
}
