//! Buffers owned through the allocator
//!
//! [`GpuBuffer`] pairs a buffer with its memory and releases both on drop.

use std::sync::Arc;

use ash::vk;

use super::vulkan::{GpuAllocator, VulkanError, VulkanResult};

/// Buffer wrapper with memory management
pub struct GpuBuffer {
    allocator: Arc<dyn GpuAllocator>,
    buffer: vk::Buffer,
    memory: vk::DeviceMemory,
    size: vk::DeviceSize,
}

impl GpuBuffer {
    /// Create a host-visible, host-coherent buffer
    pub fn new(allocator: &Arc<dyn GpuAllocator>, size: vk::DeviceSize, usage: vk::BufferUsageFlags) -> VulkanResult<Self> {
        let (buffer, memory) = allocator.create_buffer(
            size,
            usage,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        )?;

        Ok(Self { allocator: Arc::clone(allocator), buffer, memory, size })
    }

    /// Create a buffer sized for `data` and fill it
    pub fn with_data(allocator: &Arc<dyn GpuAllocator>, data: &[u8], usage: vk::BufferUsageFlags) -> VulkanResult<Self> {
        let buffer = Self::new(allocator, data.len() as vk::DeviceSize, usage)?;
        buffer.write(data)?;
        Ok(buffer)
    }

    /// Copy `data` to the start of the buffer
    pub fn write(&self, data: &[u8]) -> VulkanResult<()> {
        if data.len() as vk::DeviceSize > self.size {
            return Err(VulkanError::InvalidOperation {
                reason: format!("write of {} bytes into buffer of {}", data.len(), self.size),
            });
        }
        self.allocator.map_and_copy(self.memory, 0, data)
    }

    /// Get buffer handle
    pub fn handle(&self) -> vk::Buffer {
        self.buffer
    }

    /// Get memory handle
    pub fn memory(&self) -> vk::DeviceMemory {
        self.memory
    }

    /// Get size
    pub fn size(&self) -> vk::DeviceSize {
        self.size
    }
}

impl std::fmt::Debug for GpuBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GpuBuffer")
            .field("buffer", &self.buffer)
            .field("memory", &self.memory)
            .field("size", &self.size)
            .finish()
    }
}

impl Drop for GpuBuffer {
    fn drop(&mut self) {
        self.allocator.destroy_buffer(self.buffer);
        self.allocator.free_memory(self.memory);
    }
}

/// Vertex and index buffers of a model
#[derive(Debug)]
pub struct GeometryBuffers {
    /// Interleaved vertices
    pub vertices: GpuBuffer,
    /// 32-bit indices
    pub indices: GpuBuffer,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::vulkan::HostAllocator;

    #[test]
    fn test_buffer_released_on_drop() {
        let host = HostAllocator::new();
        let allocator: Arc<dyn GpuAllocator> = Arc::new(host.clone());

        let buffer = GpuBuffer::with_data(&allocator, &[1, 2, 3, 4], vk::BufferUsageFlags::VERTEX_BUFFER).unwrap();
        assert_eq!(host.read_memory(buffer.memory()).unwrap(), vec![1, 2, 3, 4]);
        assert_eq!(host.live_buffer_count(), 1);

        drop(buffer);
        assert_eq!(host.live_buffer_count(), 0);
        assert_eq!(host.live_memory_count(), 0);
    }

    #[test]
    fn test_oversized_write_rejected() {
        let allocator: Arc<dyn GpuAllocator> = Arc::new(HostAllocator::new());
        let buffer = GpuBuffer::new(&allocator, 4, vk::BufferUsageFlags::UNIFORM_BUFFER).unwrap();
        assert!(matches!(buffer.write(&[0; 5]), Err(VulkanError::InvalidOperation { .. })));
    }
}
