//! # Engine Configuration
//!
//! Configuration structures for the engine core, the renderer and the asset
//! loader, grouped under [`ApplicationConfig`]. Every struct can be loaded
//! from TOML or RON through the [`Config`] trait.

use serde::{Serialize, Deserialize};

pub use crate::config::{Config, ConfigError};

/// Largest frames-in-flight count the renderer accepts
pub const MAX_FRAMES_IN_FLIGHT: usize = 8;

/// # Renderer Configuration
///
/// Frame pipelining settings for the Vulkan backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Number of frames the CPU may prepare while the GPU still reads earlier ones
    pub frames_in_flight: usize,
}

impl RendererConfig {
    /// Create a renderer configuration with double buffering
    pub fn new() -> Self {
        Self { frames_in_flight: 2 }
    }

    /// Set frames in flight
    pub fn with_frames_in_flight(mut self, frames: usize) -> Self {
        self.frames_in_flight = frames;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.frames_in_flight == 0 {
            return Err("Frames in flight must be at least 1".to_string());
        }

        if self.frames_in_flight > MAX_FRAMES_IN_FLIGHT {
            return Err(format!(
                "Frames in flight should not exceed {}, got {}",
                MAX_FRAMES_IN_FLIGHT, self.frames_in_flight
            ));
        }

        Ok(())
    }
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// # Engine Configuration
///
/// Core behavior shared by every subsystem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Default `env_logger` filter, overridden by `RUST_LOG`
    pub log_level: String,
}

impl EngineConfig {
    /// Create a new engine configuration
    pub fn new() -> Self {
        Self { log_level: "info".to_string() }
    }

    /// Set log level
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.log_level.trim().is_empty() {
            return Err("Log level must not be empty".to_string());
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// # Asset Configuration
///
/// Where models live and how their vertex data is decoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetConfig {
    /// Base directory for relative model paths
    pub assets_dir: String,
    /// Worker threads used to decode primitive batches
    pub loader_threads: usize,
    /// Primitives handed to a worker per batch
    pub vertex_batch_size: usize,
}

impl AssetConfig {
    /// Create a new asset configuration
    pub fn new() -> Self {
        Self {
            assets_dir: "resources".to_string(),
            loader_threads: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
                .min(8),
            vertex_batch_size: 16,
        }
    }

    /// Set assets directory
    pub fn with_assets_dir(mut self, dir: impl Into<String>) -> Self {
        self.assets_dir = dir.into();
        self
    }

    /// Set the number of decode workers
    pub fn with_loader_threads(mut self, threads: usize) -> Self {
        self.loader_threads = threads;
        self
    }

    /// Set the number of primitives per decode batch
    pub fn with_vertex_batch_size(mut self, size: usize) -> Self {
        self.vertex_batch_size = size;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.loader_threads == 0 {
            return Err("Loader threads must be at least 1".to_string());
        }
        if self.vertex_batch_size == 0 {
            return Err("Vertex batch size must be at least 1".to_string());
        }
        Ok(())
    }
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// # Complete Application Configuration
///
/// Top-level configuration that encompasses all engine subsystems.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationConfig {
    /// Engine core configuration
    pub engine: EngineConfig,
    /// Rendering system configuration
    pub renderer: RendererConfig,
    /// Asset system configuration
    pub assets: AssetConfig,
}

impl ApplicationConfig {
    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), String> {
        self.engine.validate()?;
        self.renderer.validate()?;
        self.assets.validate()?;
        Ok(())
    }

    /// Load a configuration file and validate it
    pub fn load_validated(path: &str) -> Result<Self, ConfigError> {
        let config = Self::load_from_file(path)?;
        config.validate().map_err(ConfigError::Invalid)?;
        Ok(config)
    }
}

impl Config for ApplicationConfig {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(ApplicationConfig::default().validate().is_ok());
    }

    #[test]
    fn test_frames_in_flight_bounds() {
        assert!(RendererConfig::new().with_frames_in_flight(0).validate().is_err());
        assert!(RendererConfig::new().with_frames_in_flight(1).validate().is_ok());
        assert!(RendererConfig::new().with_frames_in_flight(MAX_FRAMES_IN_FLIGHT).validate().is_ok());
        assert!(RendererConfig::new().with_frames_in_flight(MAX_FRAMES_IN_FLIGHT + 1).validate().is_err());
    }

    #[test]
    fn test_asset_config_rejects_zero_workers() {
        assert!(AssetConfig::new().with_loader_threads(0).validate().is_err());
        assert!(AssetConfig::new().with_vertex_batch_size(0).validate().is_err());
    }

    #[test]
    fn test_toml_partial_file_uses_defaults() {
        let text = "[renderer]\nframes_in_flight = 3\n";
        let config = ApplicationConfig::from_str_with_format(text, "app.toml").unwrap();

        assert_eq!(config.renderer.frames_in_flight, 3);
        assert_eq!(config.engine, EngineConfig::default());
    }

    #[test]
    fn test_engine_log_level_from_toml() {
        let text = "[engine]\nlog_level = \"scene_engine=debug\"\n";
        let config = ApplicationConfig::from_str_with_format(text, "app.toml").unwrap();

        assert_eq!(config.engine.log_level, "scene_engine=debug");
        assert!(config.validate().is_ok());
        assert!(EngineConfig::new().with_log_level(" ").validate().is_err());
    }

    #[test]
    fn test_ron_round_trip() {
        let config = ApplicationConfig {
            assets: AssetConfig::new().with_loader_threads(3).with_vertex_batch_size(4),
            ..ApplicationConfig::default()
        };

        let text = config.to_string_with_format("app.ron").unwrap();
        let parsed = ApplicationConfig::from_str_with_format(&text, "app.ron").unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_unsupported_extension_is_rejected() {
        let result = ApplicationConfig::from_str_with_format("", "app.json");
        assert!(matches!(result, Err(ConfigError::UnsupportedFormat(_))));
    }
}
