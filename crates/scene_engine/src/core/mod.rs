//! Core engine types
//!
//! Configuration shared by the loader, the renderer and applications.

pub mod config;

pub use config::{
    ApplicationConfig, AssetConfig, EngineConfig, RendererConfig, MAX_FRAMES_IN_FLIGHT,
};
