//! Rendering core
//!
//! The explicit [`RenderContext`], GPU buffers, the per-frame binder, node
//! uniform layout and draw submission, over the Vulkan backend in
//! [`vulkan`].

pub mod binder;
pub mod buffer;
pub mod context;
pub mod object_data;
pub mod submission;
pub mod vulkan;

pub use binder::{FrameBinder, UniformSlot};
pub use buffer::{GeometryBuffers, GpuBuffer};
pub use context::RenderContext;
pub use object_data::{
    node_set_decl, NodeUniform, BASE_COLOR_TEXTURE_BINDING, JOINT_UNIFORM_BINDING, JOINT_UNIFORM_SIZE,
    NODE_DESCRIPTOR_SET, NODE_UNIFORM_BINDING,
};
pub use submission::{record_draws, DrawCommand, VulkanCommandRecorder};
