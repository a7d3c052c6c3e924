//! Vulkan backend
//!
//! Error types, the allocator seam with its device and headless
//! implementations, descriptor handling and the vertex input layout.

pub mod allocator;
pub mod descriptor_set;
pub mod error;
pub mod host;
pub mod vertex_layout;

pub use allocator::{find_memory_type, DescriptorPool, GpuAllocator, VulkanAllocator};
pub use descriptor_set::{
    BindingDecl, BindingKind, DescriptorResource, DescriptorSetDecl, DescriptorSetLayout,
    DescriptorSetLayoutBuilder, DescriptorSetWriter, DescriptorWrite, TextureBinding,
};
pub use error::{VulkanError, VulkanResult};
pub use host::HostAllocator;
pub use vertex_layout::VulkanVertexLayout;
