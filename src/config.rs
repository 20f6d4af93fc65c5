use serde::{Deserialize, Serialize};
use thiserror::Error;

// ==================== Defaults ====================
// Mirrors the canvas the host page reserves for the game (800x600 container).
mod defaults {
    pub const CONTAINER_ID: &str = "game-container";
    pub const WIDTH: u32 = 800;
    pub const HEIGHT: u32 = 600;
    pub const BACKGROUND_COLOR: &str = "#028af8";
    pub const GRAVITY_Y: f32 = 800.0;
    pub const DEBUG_KEY: &str = "O";
    pub const TILE_SIZE: u32 = 32;
    pub const ATLAS_COLUMNS: u32 = 16;
    pub const WATER_FRAME_MS: f64 = 180.0;
}

// Keeps the composited atlas well inside browser canvas limits
const MAX_TILE_SIZE: u32 = 256;
const MAX_ATLAS_COLUMNS: u32 = 64;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("'{0}' must be greater than zero")]
    NotPositive(&'static str),
    #[error("'{field}' must be at most {max}, got {value}")]
    TooLarge {
        field: &'static str,
        max: u32,
        value: u32,
    },
    #[error("asset base path must be empty or start with '/', got '{0}'")]
    RelativeBasePath(String),
    #[error("expected an absolute asset path starting with '/', got '{0}'")]
    RelativeAssetPath(String),
    #[error("debug key must not be empty")]
    EmptyDebugKey,
}

/// Runtime settings handed over by the host page.
///
/// Every field is optional on the JS side, so `new CatAdventure()` and
/// `CatAdventure.withConfig({ debug: true })` both work.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GameConfig {
    /// id of the element used when `start()` is called without a mount
    pub container_id: String,
    pub width: u32,
    pub height: u32,
    pub background_color: String,
    /// pixels per second squared
    pub gravity_y: f32,
    /// start every gameplay scene with the physics debug layer visible
    pub debug: bool,
    pub debug_key: String,
    /// sub-path the site is hosted under ("" = domain root)
    pub asset_base_path: String,
    pub tile_size: u32,
    pub atlas_columns: u32,
    pub water_frame_ms: f64,
}

impl Default for GameConfig {
    fn default() -> Self {
        GameConfig {
            container_id: defaults::CONTAINER_ID.to_string(),
            width: defaults::WIDTH,
            height: defaults::HEIGHT,
            background_color: defaults::BACKGROUND_COLOR.to_string(),
            gravity_y: defaults::GRAVITY_Y,
            debug: false,
            debug_key: defaults::DEBUG_KEY.to_string(),
            asset_base_path: String::new(),
            tile_size: defaults::TILE_SIZE,
            atlas_columns: defaults::ATLAS_COLUMNS,
            water_frame_ms: defaults::WATER_FRAME_MS,
        }
    }
}

impl GameConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("width", self.width),
            ("height", self.height),
            ("tileSize", self.tile_size),
            ("atlasColumns", self.atlas_columns),
        ];
        if let Some((field, _)) = positive.iter().find(|(_, value)| *value == 0) {
            return Err(ConfigError::NotPositive(*field));
        }
        let bounded = [
            ("tileSize", self.tile_size, MAX_TILE_SIZE),
            ("atlasColumns", self.atlas_columns, MAX_ATLAS_COLUMNS),
        ];
        if let Some((field, value, max)) = bounded.iter().find(|(_, value, max)| value > max) {
            return Err(ConfigError::TooLarge {
                field: *field,
                max: *max,
                value: *value,
            });
        }
        if !(self.water_frame_ms > 0.0) {
            return Err(ConfigError::NotPositive("waterFrameMs"));
        }
        if self.debug_key.trim().is_empty() {
            return Err(ConfigError::EmptyDebugKey);
        }
        if !self.asset_base_path.is_empty() && !self.asset_base_path.starts_with('/') {
            return Err(ConfigError::RelativeBasePath(self.asset_base_path.clone()));
        }
        Ok(())
    }

    /// Prefix an absolute asset path with the configured base path
    /// - "" base        : "/assets/cat.png" -> "/assets/cat.png"
    /// - "/portfolio/"  : "/assets/cat.png" -> "/portfolio/assets/cat.png"
    pub fn with_base_path(&self, path: &str) -> Result<String, ConfigError> {
        if !path.starts_with('/') {
            return Err(ConfigError::RelativeAssetPath(path.to_string()));
        }
        let base = self.asset_base_path.trim_end_matches('/');
        Ok(format!("{base}{path}"))
    }
}
