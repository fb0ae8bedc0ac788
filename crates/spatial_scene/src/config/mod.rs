//! Configuration system
//!
//! [`SceneConfig`] carries the tunables of the scene graph and the input
//! layer. Any config type can be loaded from or saved to TOML or RON through
//! the [`Config`] trait.

pub use serde::{Deserialize, Serialize};

/// Configuration trait
pub trait Config: Serialize + for<'de> Deserialize<'de> + Default {
    /// Load configuration from file
    fn load_from_file(path: &str) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(ConfigError::Io)?;

        if path.ends_with(".toml") {
            toml::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))
        } else if path.ends_with(".ron") {
            ron::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))
        } else {
            Err(ConfigError::UnsupportedFormat(path.to_string()))
        }
    }

    /// Save configuration to file
    fn save_to_file(&self, path: &str) -> Result<(), ConfigError> {
        let contents = if path.ends_with(".toml") {
            toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?
        } else if path.ends_with(".ron") {
            ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
                .map_err(|e| ConfigError::Serialize(e.to_string()))?
        } else {
            return Err(ConfigError::UnsupportedFormat(path.to_string()));
        };

        std::fs::write(path, contents).map_err(ConfigError::Io)
    }
}

/// Configuration errors
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Parse error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialize(String),

    /// Unsupported format
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// A value is out of its valid range
    #[error("Invalid value for {field}: {reason}")]
    Invalid {
        /// Offending field
        field: &'static str,
        /// Why it was rejected
        reason: String,
    },
}

/// # Scene Configuration
///
/// Tunables shared by every node of a scene and by the touch router.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    /// Max pointer travel in pixels for a press/release pair to still count as a tap
    pub touch_slop: f32,
    /// Pose-following rate of anchors, in 1/s; the per-frame lerp factor is `dt * rate` clamped to 1
    pub anchor_smoothing_factor: f32,
    /// `|look · up|` above which the automatic look direction swaps its up hint to +Z
    pub look_direction_up_epsilon: f32,
    /// env_logger filter used by the demo driver
    pub log_filter: String,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            touch_slop: 8.0,
            anchor_smoothing_factor: 12.0,
            look_direction_up_epsilon: 0.99,
            log_filter: "info".to_string(),
        }
    }
}

impl Config for SceneConfig {}

impl SceneConfig {
    /// Set the tap slop
    pub fn with_touch_slop(mut self, touch_slop: f32) -> Self {
        self.touch_slop = touch_slop;
        self
    }

    /// Set the anchor smoothing rate
    pub fn with_anchor_smoothing(mut self, factor: f32) -> Self {
        self.anchor_smoothing_factor = factor;
        self
    }

    /// Set the logging filter
    pub fn with_log_filter(mut self, filter: impl Into<String>) -> Self {
        self.log_filter = filter.into();
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.touch_slop >= 0.0) {
            return Err(ConfigError::Invalid {
                field: "touch_slop",
                reason: format!("must be non-negative, got {}", self.touch_slop),
            });
        }

        if !(self.anchor_smoothing_factor >= 0.0) {
            return Err(ConfigError::Invalid {
                field: "anchor_smoothing_factor",
                reason: format!("must be non-negative, got {}", self.anchor_smoothing_factor),
            });
        }

        if !(0.0..=1.0).contains(&self.look_direction_up_epsilon) {
            return Err(ConfigError::Invalid {
                field: "look_direction_up_epsilon",
                reason: format!("must lie in [0, 1], got {}", self.look_direction_up_epsilon),
            });
        }

        Ok(())
    }
}
