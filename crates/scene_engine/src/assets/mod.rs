//! Asset loading
//!
//! Loaders turn files into [`ModelParts`](crate::ModelParts) and validate
//! them into a [`Model`]. Geometry decode runs on a scoped worker pool (see
//! [`batch`]).

pub mod batch;
pub mod gltf_loader;
pub mod obj_loader;
pub mod vertex;

pub use batch::decode_batches;
pub use gltf_loader::GltfLoader;
pub use obj_loader::ObjLoader;
pub use vertex::Vertex;

use std::path::Path;

use crate::animation::AnimationError;
use crate::core::config::AssetConfig;
use crate::model::Model;
use crate::scene::{PrimitiveIndex, SceneError};

/// Asset loading errors
#[derive(thiserror::Error, Debug)]
pub enum AssetError {
    /// glTF parse, validation or buffer import failure
    #[error("glTF error: {0}")]
    Gltf(#[from] gltf::Error),

    /// File access failure
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// An accessor's byte stride disagrees with its element size
    #[error("Accessor {accessor}: byte stride {stride} is smaller than element size {element_size}")]
    InvalidStride {
        /// Accessor index
        accessor: usize,
        /// Declared stride
        stride: usize,
        /// Size of one element
        element_size: usize,
    },

    /// A primitive or channel lacks required data
    #[error("Mesh {mesh} primitive {primitive}: missing {attribute}")]
    MissingAttribute {
        /// Mesh index, or animation index for channel data
        mesh: usize,
        /// Primitive index within the mesh, or channel index
        primitive: usize,
        /// What is missing
        attribute: String,
    },

    /// Malformed text asset
    #[error("Parse error at line {line}: {message}")]
    Parse {
        /// 1-based line number
        line: usize,
        /// Description
        message: String,
    },

    /// Invalid hierarchy, skin or mesh reference
    #[error("Scene error: {0}")]
    Scene(#[from] SceneError),

    /// Invalid animation data
    #[error("Animation error: {0}")]
    Animation(#[from] AnimationError),

    /// A primitive's range exceeds the merged geometry
    #[error("Primitive {primitive} range exceeds the vertex or index data")]
    PrimitiveOutOfRange {
        /// Primitive index
        primitive: PrimitiveIndex,
    },

    /// A primitive names a material that does not exist
    #[error("Primitive {primitive} refers to missing material {material}")]
    MaterialNotFound {
        /// Primitive index
        primitive: PrimitiveIndex,
        /// Missing material
        material: usize,
    },

    /// A decode worker panicked
    #[error("Geometry decode worker panicked")]
    WorkerPanicked,

    /// File extension has no loader
    #[error("Unsupported model format: {0}")]
    UnsupportedFormat(String),
}

/// Load a model, choosing the loader by file extension
pub fn load_model<P: AsRef<Path>>(path: P, config: &AssetConfig) -> Result<Model, AssetError> {
    let path = path.as_ref();
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    match extension.as_str() {
        "gltf" | "glb" => GltfLoader::load(path, config),
        "obj" => ObjLoader::load(path),
        _ => Err(AssetError::UnsupportedFormat(path.display().to_string())),
    }
}
