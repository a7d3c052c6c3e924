//! Errors raised by the GPU resource layer and the per-frame binder

use ash::vk;

/// Vulkan-specific errors
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum VulkanError {
    /// General Vulkan API error with result code
    #[error("Vulkan API error: {0:?}")]
    Api(vk::Result),

    /// No uniform slot was allocated for the requested keys
    #[error("Uniform binding not found: node {node}, set {set}, binding {binding}, frame {frame}")]
    BindingNotFound {
        /// Node that was queried
        node: usize,
        /// Descriptor set index
        set: u32,
        /// Binding index within the set
        binding: u32,
        /// Frame-in-flight index
        frame: usize,
    },

    /// No descriptor set was allocated for the requested keys
    #[error("Descriptor set not found: node {node}, set {set}, frame {frame}")]
    DescriptorSetNotFound {
        /// Node that was queried
        node: usize,
        /// Descriptor set index
        set: u32,
        /// Frame-in-flight index
        frame: usize,
    },

    /// A combined image sampler refers to a texture that was never supplied
    #[error("Texture not found: {index}")]
    TextureNotFound {
        /// Texture index requested by the material
        index: usize,
    },

    /// Frame index beyond the configured frames in flight
    #[error("Frame index {frame} out of range ({frames_in_flight} frames in flight)")]
    FrameIndexOutOfRange {
        /// Requested frame index
        frame: usize,
        /// Configured frames in flight
        frames_in_flight: usize,
    },

    /// Invalid operation attempted
    #[error("Invalid operation: {reason}")]
    InvalidOperation {
        /// Description of why the operation is invalid
        reason: String,
    },

    /// Memory allocation failed
    #[error("Out of memory: {requested} bytes")]
    OutOfMemory {
        /// Number of bytes that were requested
        requested: usize,
    },

    /// No suitable memory type found for allocation
    #[error("No suitable memory type found")]
    NoSuitableMemoryType,
}

/// Result type for Vulkan operations
pub type VulkanResult<T> = Result<T, VulkanError>;
