//! Meshes, primitives and materials
//!
//! A primitive is a range into the model's merged vertex and index arrays.

use crate::foundation::math::Vec4;

/// Index of a primitive in the model's primitive pool
pub type PrimitiveIndex = usize;

/// A named group of primitives attached to nodes
#[derive(Debug, Clone, Default)]
pub struct Mesh {
    /// Mesh name
    pub name: String,
    /// Primitives in the model's primitive pool
    pub primitives: Vec<PrimitiveIndex>,
}

/// Vertex and index range of one draw
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Primitive {
    /// First vertex in the merged vertex array
    pub first_vertex: u32,
    /// Number of vertices
    pub vertex_count: u32,
    /// First index in the merged index array
    pub first_index: u32,
    /// Number of indices
    pub index_count: u32,
    /// Material used by this primitive
    pub material: Option<usize>,
}

impl Primitive {
    /// Range handed to the draw call
    pub fn draw_range(&self) -> DrawRange {
        DrawRange {
            first_vertex: self.first_vertex,
            vertex_count: self.vertex_count,
            first_index: self.first_index,
            index_count: self.index_count,
        }
    }
}

/// Parameters of an indexed draw
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawRange {
    /// Added to every index (vertex offset)
    pub first_vertex: u32,
    /// Vertices referenced by the draw
    pub vertex_count: u32,
    /// First index to read
    pub first_index: u32,
    /// Indices to draw
    pub index_count: u32,
}

/// Material binding metadata
#[derive(Debug, Clone)]
pub struct Material {
    /// Material name
    pub name: String,
    /// Base colour factor (RGBA)
    pub base_color_factor: Vec4,
    /// Texture bound to the base colour sampler
    pub base_color_texture: Option<usize>,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            base_color_factor: Vec4::new(1.0, 1.0, 1.0, 1.0),
            base_color_texture: None,
        }
    }
}
