//! Per-node uniform data and the node descriptor set layout
//!
//! Set 1 of the skinning pipeline belongs to nodes:
//! binding 0 is [`NodeUniform`], binding 1 the joint palette and binding 2
//! the base colour texture when the node's material has one.

use ash::vk;
use bytemuck::{Pod, Zeroable};

use crate::foundation::math::{to_cols_array, Mat4};
use crate::scene::MAX_JOINTS;
use super::vulkan::{BindingDecl, BindingKind, DescriptorSetDecl};

/// Descriptor set index of per-node resources
pub const NODE_DESCRIPTOR_SET: u32 = 1;
/// Binding of [`NodeUniform`]
pub const NODE_UNIFORM_BINDING: u32 = 0;
/// Binding of the joint palette
pub const JOINT_UNIFORM_BINDING: u32 = 1;
/// Binding of the base colour texture
pub const BASE_COLOR_TEXTURE_BINDING: u32 = 2;

/// Size of the joint palette buffer: `MAX_JOINTS` column-major 4×4 matrices
pub const JOINT_UNIFORM_SIZE: vk::DeviceSize = (MAX_JOINTS * std::mem::size_of::<[[f32; 4]; 4]>()) as vk::DeviceSize;

/// Per-node uniform buffer contents (std140)
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct NodeUniform {
    /// Global matrix of the node
    pub model_matrix: [[f32; 4]; 4],
    /// Inverse-transpose of the model matrix's upper 3×3, one vec4 per column
    pub normal_matrix: [[f32; 4]; 3],
    /// Joints used by the palette, 0 for rigid nodes
    pub joint_count: u32,
    /// Pad to a 16-byte multiple
    pub _padding: [u32; 3],
}

impl NodeUniform {
    /// Build the uniform for a node with the given global matrix
    pub fn new(model_matrix: &Mat4, joint_count: usize) -> Self {
        let upper = model_matrix.fixed_view::<3, 3>(0, 0).into_owned();
        let normal = upper.try_inverse().map_or(upper, |inverse| inverse.transpose());

        let mut normal_matrix = [[0.0; 4]; 3];
        for (column, out) in normal_matrix.iter_mut().enumerate() {
            for row in 0..3 {
                out[row] = normal[(row, column)];
            }
        }

        Self {
            model_matrix: to_cols_array(model_matrix),
            normal_matrix,
            joint_count: u32::try_from(joint_count).unwrap_or(u32::MAX),
            _padding: [0; 3],
        }
    }

    /// Buffer size of the uniform
    pub const fn size() -> vk::DeviceSize {
        std::mem::size_of::<Self>() as vk::DeviceSize
    }
}

/// Joint palette as column-major arrays, ready for upload
pub fn joint_palette_data(palette: &[Mat4]) -> Vec<[[f32; 4]; 4]> {
    palette.iter().map(to_cols_array).collect()
}

/// Descriptor set layout of a mesh node
pub fn node_set_decl(base_color_texture: Option<usize>) -> DescriptorSetDecl {
    let mut bindings = vec![
        BindingDecl {
            binding: NODE_UNIFORM_BINDING,
            kind: BindingKind::UniformBuffer { size: NodeUniform::size() },
            stages: vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT,
        },
        BindingDecl {
            binding: JOINT_UNIFORM_BINDING,
            kind: BindingKind::UniformBuffer { size: JOINT_UNIFORM_SIZE },
            stages: vk::ShaderStageFlags::VERTEX,
        },
    ];
    if let Some(texture) = base_color_texture {
        bindings.push(BindingDecl {
            binding: BASE_COLOR_TEXTURE_BINDING,
            kind: BindingKind::CombinedImageSampler { texture },
            stages: vk::ShaderStageFlags::FRAGMENT,
        });
    }

    DescriptorSetDecl { set: NODE_DESCRIPTOR_SET, bindings }
}
