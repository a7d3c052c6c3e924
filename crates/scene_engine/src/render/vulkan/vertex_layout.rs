//! Vulkan vertex input description for [`Vertex`]

use ash::vk;

use crate::assets::Vertex;

/// Vulkan vertex layout implementation for the engine's Vertex type
pub struct VulkanVertexLayout;

impl VulkanVertexLayout {
    /// Binding description: one interleaved buffer advanced per vertex
    pub fn binding_description() -> vk::VertexInputBindingDescription {
        vk::VertexInputBindingDescription {
            binding: 0,
            stride: std::mem::size_of::<Vertex>() as u32,
            input_rate: vk::VertexInputRate::VERTEX,
        }
    }

    /// Attribute descriptions, locations 0 to 4
    pub fn attribute_descriptions() -> [vk::VertexInputAttributeDescription; 5] {
        [
            // Position (location = 0)
            vk::VertexInputAttributeDescription {
                binding: 0,
                location: 0,
                format: vk::Format::R32G32B32_SFLOAT,
                offset: 0,
            },
            // Normal (location = 1)
            vk::VertexInputAttributeDescription {
                binding: 0,
                location: 1,
                format: vk::Format::R32G32B32_SFLOAT,
                offset: 12,
            },
            // UV (location = 2)
            vk::VertexInputAttributeDescription {
                binding: 0,
                location: 2,
                format: vk::Format::R32G32_SFLOAT,
                offset: 24,
            },
            // Joint indices (location = 3)
            vk::VertexInputAttributeDescription {
                binding: 0,
                location: 3,
                format: vk::Format::R16G16B16A16_UINT,
                offset: 32,
            },
            // Joint weights (location = 4)
            vk::VertexInputAttributeDescription {
                binding: 0,
                location: 4,
                format: vk::Format::R32G32B32A32_SFLOAT,
                offset: 40,
            },
        ]
    }

    /// Binding and attributes together, for pipeline creation
    pub fn input_state() -> (vk::VertexInputBindingDescription, [vk::VertexInputAttributeDescription; 5]) {
        (Self::binding_description(), Self::attribute_descriptions())
    }
}
