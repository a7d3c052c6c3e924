//! # Scene Engine
//!
//! Scene graph, skeletal animation and per-frame GPU resource binding for a
//! Vulkan renderer.
//!
//! ## Features
//!
//! - **Scene Graph**: Arena-allocated node hierarchy with pull-based global matrices
//! - **Skinning**: Joint palettes from skins and inverse-bind matrices
//! - **Animation**: LINEAR, STEP and CUBICSPLINE keyframe sampling
//! - **Frame Binder**: One uniform slot per node binding and frame in flight
//! - **Asset Loading**: glTF 2.0 and OBJ with parallel geometry decode
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use scene_engine::prelude::*;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AssetConfig::default();
//!     let mut model = load_model("resources/test_models/skinned.gltf", &config)?;
//!
//!     let (ctx, _host) = RenderContext::headless(2)?;
//!     model.prepare_gpu_resources(&ctx)?;
//!     model.set_active_animation(Some(0))?;
//!
//!     for frame in 0..10 {
//!         model.update(&ctx, frame % ctx.frames_in_flight(), 1.0 / 60.0)?;
//!         let _commands = record_draws(&model, frame % ctx.frames_in_flight())?;
//!     }
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod core;
pub mod config;
pub mod foundation;

pub mod animation;
pub mod assets;
pub mod render;
pub mod scene;

mod error;
mod model;

pub use error::{EngineError, EngineResult};
pub use model::{Model, ModelParts};

/// Common imports for engine users
pub mod prelude {
    pub use crate::{
        EngineError, EngineResult, Model, ModelParts,
        foundation::math::{Mat4, Quat, Vec3, Vec4},
        scene::{Node, NodeIndex, SceneGraph, Skin},
        animation::{Animation, Interpolation},
        assets::{load_model, GltfLoader, ObjLoader, Vertex},
        render::{record_draws, DrawCommand, RenderContext},
        render::vulkan::{GpuAllocator, HostAllocator, TextureBinding},
        core::config::{ApplicationConfig, AssetConfig, RendererConfig},
        config::Config,
    };
}
