//! GPU resource allocation
//!
//! Everything the core needs from the device goes through [`GpuAllocator`]:
//! buffers with bound memory, host writes, descriptor set layouts and
//! descriptor sets. [`VulkanAllocator`] implements it on an `ash` device.

use ash::{vk, Device, Instance};

use crate::foundation::logging::{debug, warn};
use super::{DescriptorSetWriter, DescriptorWrite, VulkanError, VulkanResult};

/// Device-side resource operations used by the binder and the model
///
/// Every failure is returned to the caller; nothing is retried.
pub trait GpuAllocator {
    /// Create a buffer and bind freshly allocated memory to it
    fn create_buffer(
        &self,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
        properties: vk::MemoryPropertyFlags,
    ) -> VulkanResult<(vk::Buffer, vk::DeviceMemory)>;

    /// Map `memory`, copy `data` to `offset`, then unmap
    fn map_and_copy(&self, memory: vk::DeviceMemory, offset: vk::DeviceSize, data: &[u8]) -> VulkanResult<()>;

    /// Destroy a buffer created by [`create_buffer`](Self::create_buffer)
    fn destroy_buffer(&self, buffer: vk::Buffer);

    /// Free memory returned by [`create_buffer`](Self::create_buffer)
    fn free_memory(&self, memory: vk::DeviceMemory);

    /// Create a descriptor set layout
    fn create_descriptor_set_layout(
        &self,
        bindings: &[vk::DescriptorSetLayoutBinding],
    ) -> VulkanResult<vk::DescriptorSetLayout>;

    /// Destroy a descriptor set layout
    fn destroy_descriptor_set_layout(&self, layout: vk::DescriptorSetLayout);

    /// Allocate `count` descriptor sets sharing one layout
    fn allocate_descriptor_sets(
        &self,
        layout: vk::DescriptorSetLayout,
        count: usize,
    ) -> VulkanResult<Vec<vk::DescriptorSet>>;

    /// Return descriptor sets to their pool
    fn free_descriptor_sets(&self, sets: &[vk::DescriptorSet]);

    /// Apply descriptor writes
    fn update_descriptor_sets(&self, writes: &[DescriptorWrite]);
}

/// Find memory type with required properties
pub fn find_memory_type(
    memory_properties: &vk::PhysicalDeviceMemoryProperties,
    type_filter: u32,
    properties: vk::MemoryPropertyFlags,
) -> VulkanResult<u32> {
    (0..memory_properties.memory_type_count)
        .find(|&i| {
            (type_filter & (1 << i)) != 0
                && memory_properties.memory_types[i as usize].property_flags.contains(properties)
        })
        .ok_or(VulkanError::NoSuitableMemoryType)
}

fn map_allocation_error(result: vk::Result, requested: vk::DeviceSize) -> VulkanError {
    match result {
        vk::Result::ERROR_OUT_OF_DEVICE_MEMORY | vk::Result::ERROR_OUT_OF_HOST_MEMORY => VulkanError::OutOfMemory {
            requested: usize::try_from(requested).unwrap_or(usize::MAX),
        },
        other => VulkanError::Api(other),
    }
}

/// Descriptor pool for allocating descriptor sets
pub struct DescriptorPool {
    pool: vk::DescriptorPool,
    device: Device,
}

impl DescriptorPool {
    /// Create a pool sized for `max_sets` node sets
    pub fn new(device: Device, max_sets: u32) -> VulkanResult<Self> {
        // Node sets hold two uniform buffers and at most one texture.
        let pool_sizes = [
            vk::DescriptorPoolSize::builder()
                .ty(vk::DescriptorType::UNIFORM_BUFFER)
                .descriptor_count(max_sets * 2)
                .build(),
            vk::DescriptorPoolSize::builder()
                .ty(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
                .descriptor_count(max_sets)
                .build(),
        ];

        let pool_info = vk::DescriptorPoolCreateInfo::builder()
            .flags(vk::DescriptorPoolCreateFlags::FREE_DESCRIPTOR_SET)
            .max_sets(max_sets)
            .pool_sizes(&pool_sizes);

        let pool = unsafe { device.create_descriptor_pool(&pool_info, None) }
            .map_err(VulkanError::Api)?;

        Ok(Self { pool, device })
    }

    /// Get the pool handle
    pub fn handle(&self) -> vk::DescriptorPool {
        self.pool
    }
}

impl Drop for DescriptorPool {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_descriptor_pool(self.pool, None);
        }
    }
}

/// [`GpuAllocator`] backed by a Vulkan logical device
pub struct VulkanAllocator {
    device: Device,
    memory_properties: vk::PhysicalDeviceMemoryProperties,
    descriptor_pool: DescriptorPool,
}

impl VulkanAllocator {
    /// Create an allocator for `device`, with a descriptor pool holding `max_sets` sets
    pub fn new(
        instance: &Instance,
        physical_device: vk::PhysicalDevice,
        device: Device,
        max_sets: u32,
    ) -> VulkanResult<Self> {
        let memory_properties = unsafe { instance.get_physical_device_memory_properties(physical_device) };
        let descriptor_pool = DescriptorPool::new(device.clone(), max_sets)?;

        Ok(Self { device, memory_properties, descriptor_pool })
    }

    /// The logical device
    pub fn device(&self) -> &Device {
        &self.device
    }
}

impl GpuAllocator for VulkanAllocator {
    fn create_buffer(
        &self,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
        properties: vk::MemoryPropertyFlags,
    ) -> VulkanResult<(vk::Buffer, vk::DeviceMemory)> {
        if size == 0 {
            return Err(VulkanError::InvalidOperation { reason: "buffer size must be non-zero".to_string() });
        }

        let buffer_info = vk::BufferCreateInfo::builder()
            .size(size)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let buffer = unsafe { self.device.create_buffer(&buffer_info, None) }
            .map_err(|e| map_allocation_error(e, size))?;

        let requirements = unsafe { self.device.get_buffer_memory_requirements(buffer) };

        let memory_type_index = match find_memory_type(&self.memory_properties, requirements.memory_type_bits, properties) {
            Ok(index) => index,
            Err(e) => {
                unsafe { self.device.destroy_buffer(buffer, None) };
                return Err(e);
            }
        };

        let alloc_info = vk::MemoryAllocateInfo::builder()
            .allocation_size(requirements.size)
            .memory_type_index(memory_type_index);

        let memory = match unsafe { self.device.allocate_memory(&alloc_info, None) } {
            Ok(memory) => memory,
            Err(e) => {
                unsafe { self.device.destroy_buffer(buffer, None) };
                return Err(map_allocation_error(e, requirements.size));
            }
        };

        if let Err(e) = unsafe { self.device.bind_buffer_memory(buffer, memory, 0) } {
            unsafe {
                self.device.destroy_buffer(buffer, None);
                self.device.free_memory(memory, None);
            }
            return Err(VulkanError::Api(e));
        }

        debug!("Created buffer {:?} ({} bytes, {:?})", buffer, size, usage);
        Ok((buffer, memory))
    }

    fn map_and_copy(&self, memory: vk::DeviceMemory, offset: vk::DeviceSize, data: &[u8]) -> VulkanResult<()> {
        if data.is_empty() {
            return Ok(());
        }

        let size = data.len() as vk::DeviceSize;
        let ptr = unsafe { self.device.map_memory(memory, offset, size, vk::MemoryMapFlags::empty()) }
            .map_err(VulkanError::Api)?;

        unsafe {
            std::ptr::copy_nonoverlapping(data.as_ptr(), ptr.cast::<u8>(), data.len());
            self.device.unmap_memory(memory);
        }
        Ok(())
    }

    fn destroy_buffer(&self, buffer: vk::Buffer) {
        unsafe { self.device.destroy_buffer(buffer, None) };
    }

    fn free_memory(&self, memory: vk::DeviceMemory) {
        unsafe { self.device.free_memory(memory, None) };
    }

    fn create_descriptor_set_layout(
        &self,
        bindings: &[vk::DescriptorSetLayoutBinding],
    ) -> VulkanResult<vk::DescriptorSetLayout> {
        let layout_info = vk::DescriptorSetLayoutCreateInfo::builder().bindings(bindings);

        unsafe { self.device.create_descriptor_set_layout(&layout_info, None) }
            .map_err(VulkanError::Api)
    }

    fn destroy_descriptor_set_layout(&self, layout: vk::DescriptorSetLayout) {
        unsafe { self.device.destroy_descriptor_set_layout(layout, None) };
    }

    fn allocate_descriptor_sets(
        &self,
        layout: vk::DescriptorSetLayout,
        count: usize,
    ) -> VulkanResult<Vec<vk::DescriptorSet>> {
        let layouts = vec![layout; count];
        let alloc_info = vk::DescriptorSetAllocateInfo::builder()
            .descriptor_pool(self.descriptor_pool.handle())
            .set_layouts(&layouts);

        unsafe { self.device.allocate_descriptor_sets(&alloc_info) }
            .map_err(VulkanError::Api)
    }

    fn free_descriptor_sets(&self, sets: &[vk::DescriptorSet]) {
        if sets.is_empty() {
            return;
        }
        if let Err(e) = unsafe { self.device.free_descriptor_sets(self.descriptor_pool.handle(), sets) } {
            warn!("Failed to free {} descriptor sets: {:?}", sets.len(), e);
        }
    }

    fn update_descriptor_sets(&self, writes: &[DescriptorWrite]) {
        let writer = DescriptorSetWriter::new(writes);
        unsafe { self.device.update_descriptor_sets(writer.writes(), &[]) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_properties() -> vk::PhysicalDeviceMemoryProperties {
        let mut properties = vk::PhysicalDeviceMemoryProperties {
            memory_type_count: 3,
            ..Default::default()
        };
        properties.memory_types[0].property_flags = vk::MemoryPropertyFlags::DEVICE_LOCAL;
        properties.memory_types[1].property_flags = vk::MemoryPropertyFlags::HOST_VISIBLE;
        properties.memory_types[2].property_flags =
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT;
        properties
    }

    #[test]
    fn test_find_memory_type_respects_filter_and_flags() {
        let properties = memory_properties();
        let host = vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT;

        assert_eq!(find_memory_type(&properties, 0b111, vk::MemoryPropertyFlags::DEVICE_LOCAL), Ok(0));
        assert_eq!(find_memory_type(&properties, 0b111, host), Ok(2));
        assert_eq!(find_memory_type(&properties, 0b110, vk::MemoryPropertyFlags::HOST_VISIBLE), Ok(1));
    }

    #[test]
    fn test_find_memory_type_reports_no_match() {
        let properties = memory_properties();
        let result = find_memory_type(&properties, 0b001, vk::MemoryPropertyFlags::HOST_VISIBLE);
        assert_eq!(result, Err(VulkanError::NoSuitableMemoryType));
    }

    #[test]
    fn test_device_memory_errors_become_out_of_memory() {
        assert_eq!(
            map_allocation_error(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY, 64),
            VulkanError::OutOfMemory { requested: 64 }
        );
        assert_eq!(
            map_allocation_error(vk::Result::ERROR_DEVICE_LOST, 64),
            VulkanError::Api(vk::Result::ERROR_DEVICE_LOST)
        );
    }
}
