//! Configuration system
//!
//! Serializable configuration for the renderer core. Supports TOML and RON
//! config files through the [`Config`] trait.

use serde::{Deserialize, Serialize};

use crate::render::MAX_FRAMES_IN_FLIGHT;

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
            ron::ser::to_string_pretty(self, Default::default())
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

    /// Configuration value out of range
    #[error("Invalid config value: {0}")]
    Invalid(String),
}

/// Renderer configuration
///
/// Covers the knobs the frame loop consumes directly. Pipeline, shader, and
/// window configuration belong to the embedding application.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RendererConfig {
    /// Clear color for the geometry pass attachments (RGBA)
    pub clear_color: [f32; 4],

    /// Number of frames the CPU may record ahead of the GPU
    pub frames_in_flight: usize,

    /// Fence wait timeout in nanoseconds
    pub fence_timeout_ns: u64,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            clear_color: [0.0, 0.0, 0.0, 1.0],
            frames_in_flight: MAX_FRAMES_IN_FLIGHT,
            fence_timeout_ns: u64::MAX,
        }
    }
}

impl Config for RendererConfig {}

impl RendererConfig {
    /// Validate the configuration against engine limits
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.frames_in_flight == 0 || self.frames_in_flight > MAX_FRAMES_IN_FLIGHT {
            return Err(ConfigError::Invalid(format!(
                "frames_in_flight must be in 1..={}, got {}",
                MAX_FRAMES_IN_FLIGHT, self.frames_in_flight
            )));
        }
        Ok(())
    }
}
