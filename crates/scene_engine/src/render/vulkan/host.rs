//! Headless allocator
//!
//! [`HostAllocator`] satisfies [`GpuAllocator`] with CPU memory and
//! counter-generated handles. It keeps live-allocation counts so callers can
//! check for leaks and double allocations without a device.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use ash::vk::{self, Handle};

use crate::foundation::logging::trace;
use super::{DescriptorWrite, GpuAllocator, TextureBinding, VulkanError, VulkanResult};

#[derive(Debug, Default)]
struct HostState {
    next_handle: u64,
    allocated_bytes: u64,
    buffers: HashSet<u64>,
    memory: HashMap<u64, Vec<u8>>,
    layouts: HashSet<u64>,
    descriptor_sets: HashSet<u64>,
    descriptor_writes: Vec<DescriptorWrite>,
}

impl HostState {
    fn next(&mut self) -> u64 {
        self.next_handle += 1;
        self.next_handle
    }
}

/// CPU-memory [`GpuAllocator`] for headless runs and tests
///
/// Clones share state, so a test can keep one clone for inspection while
/// the render context owns another.
#[derive(Debug, Clone, Default)]
pub struct HostAllocator {
    state: Arc<Mutex<HostState>>,
    capacity: Option<u64>,
}

impl HostAllocator {
    /// Create an allocator without a memory limit
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an allocator that reports out-of-memory past `bytes`
    pub fn with_capacity(bytes: u64) -> Self {
        Self { capacity: Some(bytes), ..Self::default() }
    }

    fn state(&self) -> MutexGuard<'_, HostState> {
        // A panic while holding the lock leaves plain data behind; keep using it.
        self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Buffers created and not yet destroyed
    pub fn live_buffer_count(&self) -> usize {
        self.state().buffers.len()
    }

    /// Memory allocations not yet freed
    pub fn live_memory_count(&self) -> usize {
        self.state().memory.len()
    }

    /// Descriptor sets allocated and not yet freed
    pub fn live_descriptor_set_count(&self) -> usize {
        self.state().descriptor_sets.len()
    }

    /// Descriptor set layouts not yet destroyed
    pub fn live_layout_count(&self) -> usize {
        self.state().layouts.len()
    }

    /// Bytes currently allocated
    pub fn allocated_bytes(&self) -> u64 {
        self.state().allocated_bytes
    }

    /// Every descriptor write applied so far
    pub fn descriptor_writes(&self) -> Vec<DescriptorWrite> {
        self.state().descriptor_writes.clone()
    }

    /// Copy of an allocation's contents
    pub fn read_memory(&self, memory: vk::DeviceMemory) -> Option<Vec<u8>> {
        self.state().memory.get(&memory.as_raw()).cloned()
    }

    /// Handles standing in for an uploaded texture
    pub fn create_texture(&self) -> TextureBinding {
        let mut state = self.state();
        TextureBinding {
            sampler: vk::Sampler::from_raw(state.next()),
            view: vk::ImageView::from_raw(state.next()),
            layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        }
    }
}

impl GpuAllocator for HostAllocator {
    fn create_buffer(
        &self,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
        _properties: vk::MemoryPropertyFlags,
    ) -> VulkanResult<(vk::Buffer, vk::DeviceMemory)> {
        if size == 0 {
            return Err(VulkanError::InvalidOperation { reason: "buffer size must be non-zero".to_string() });
        }

        let mut state = self.state();
        let out_of_memory = || VulkanError::OutOfMemory { requested: usize::try_from(size).unwrap_or(usize::MAX) };
        let total = state.allocated_bytes.checked_add(size).ok_or_else(out_of_memory)?;
        if self.capacity.is_some_and(|capacity| total > capacity) {
            return Err(out_of_memory());
        }

        let len = usize::try_from(size).map_err(|_| VulkanError::OutOfMemory { requested: usize::MAX })?;
        let buffer = state.next();
        let memory = state.next();
        state.buffers.insert(buffer);
        state.memory.insert(memory, vec![0; len]);
        state.allocated_bytes = total;

        trace!("Host buffer {} / memory {} ({} bytes, {:?})", buffer, memory, size, usage);
        Ok((vk::Buffer::from_raw(buffer), vk::DeviceMemory::from_raw(memory)))
    }

    fn map_and_copy(&self, memory: vk::DeviceMemory, offset: vk::DeviceSize, data: &[u8]) -> VulkanResult<()> {
        let mut state = self.state();
        let bytes = state
            .memory
            .get_mut(&memory.as_raw())
            .ok_or_else(|| VulkanError::InvalidOperation { reason: format!("memory {:?} is not allocated", memory) })?;

        let start = usize::try_from(offset).unwrap_or(usize::MAX);
        let end = start.checked_add(data.len()).filter(|&end| end <= bytes.len()).ok_or_else(|| {
            VulkanError::InvalidOperation {
                reason: format!("write of {} bytes at {} exceeds allocation of {}", data.len(), offset, bytes.len()),
            }
        })?;

        bytes[start..end].copy_from_slice(data);
        Ok(())
    }

    fn destroy_buffer(&self, buffer: vk::Buffer) {
        self.state().buffers.remove(&buffer.as_raw());
    }

    fn free_memory(&self, memory: vk::DeviceMemory) {
        let mut state = self.state();
        if let Some(bytes) = state.memory.remove(&memory.as_raw()) {
            state.allocated_bytes -= bytes.len() as u64;
        }
    }

    fn create_descriptor_set_layout(
        &self,
        _bindings: &[vk::DescriptorSetLayoutBinding],
    ) -> VulkanResult<vk::DescriptorSetLayout> {
        let mut state = self.state();
        let layout = state.next();
        state.layouts.insert(layout);
        Ok(vk::DescriptorSetLayout::from_raw(layout))
    }

    fn destroy_descriptor_set_layout(&self, layout: vk::DescriptorSetLayout) {
        self.state().layouts.remove(&layout.as_raw());
    }

    fn allocate_descriptor_sets(
        &self,
        layout: vk::DescriptorSetLayout,
        count: usize,
    ) -> VulkanResult<Vec<vk::DescriptorSet>> {
        let mut state = self.state();
        if !state.layouts.contains(&layout.as_raw()) {
            return Err(VulkanError::InvalidOperation { reason: format!("layout {:?} does not exist", layout) });
        }

        Ok((0..count)
            .map(|_| {
                let set = state.next();
                state.descriptor_sets.insert(set);
                vk::DescriptorSet::from_raw(set)
            })
            .collect())
    }

    fn free_descriptor_sets(&self, sets: &[vk::DescriptorSet]) {
        let mut state = self.state();
        for set in sets {
            state.descriptor_sets.remove(&set.as_raw());
        }
    }

    fn update_descriptor_sets(&self, writes: &[DescriptorWrite]) {
        self.state().descriptor_writes.extend_from_slice(writes);
    }
}
