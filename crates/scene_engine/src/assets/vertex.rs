//! Vertex format shared by every loader

use bytemuck::{Pod, Zeroable};

/// Skinned vertex as laid out in the vertex buffer
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct Vertex {
    /// Object-space position
    pub position: [f32; 3],
    /// Object-space normal
    pub normal: [f32; 3],
    /// First texture coordinate set
    pub uv: [f32; 2],
    /// Palette indices of the four influencing joints
    pub joints: [u16; 4],
    /// Weights of the four influencing joints
    pub weights: [f32; 4],
}

impl Vertex {
    /// Unskinned vertex
    pub fn new(position: [f32; 3], normal: [f32; 3], uv: [f32; 2]) -> Self {
        Self { position, normal, uv, joints: [0; 4], weights: [0.0; 4] }
    }
}
