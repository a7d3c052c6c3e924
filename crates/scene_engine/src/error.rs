//! Crate-level error type

use crate::animation::AnimationError;
use crate::assets::AssetError;
use crate::config::ConfigError;
use crate::render::vulkan::VulkanError;
use crate::scene::SceneError;

/// Any error the engine core can report
#[derive(thiserror::Error, Debug)]
pub enum EngineError {
    /// Scene graph or skin error
    #[error("Scene error: {0}")]
    Scene(#[from] SceneError),

    /// Animation error
    #[error("Animation error: {0}")]
    Animation(#[from] AnimationError),

    /// GPU resource or binding error
    #[error("Vulkan error: {0}")]
    Vulkan(#[from] VulkanError),

    /// Asset loading error
    #[error("Asset error: {0}")]
    Asset(#[from] AssetError),

    /// Configuration error
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;
