//! Descriptor set layouts, declarations and writes
//!
//! Layouts are declared per node as a [`DescriptorSetDecl`]; the builder
//! turns a declaration into Vulkan layout bindings and [`DescriptorWrite`]
//! records what the binder wants written, independent of any device.

use std::sync::Arc;

use ash::vk;

use super::{GpuAllocator, VulkanResult};

/// Descriptor set layout builder for creating reusable layouts
#[derive(Debug, Default)]
pub struct DescriptorSetLayoutBuilder {
    bindings: Vec<vk::DescriptorSetLayoutBinding>,
}

impl DescriptorSetLayoutBuilder {
    /// Create a new descriptor set layout builder
    pub fn new() -> Self {
        Self { bindings: Vec::new() }
    }

    /// Add a uniform buffer binding
    pub fn add_uniform_buffer(self, binding: u32, stage_flags: vk::ShaderStageFlags) -> Self {
        self.add(binding, vk::DescriptorType::UNIFORM_BUFFER, stage_flags)
    }

    /// Add a combined image sampler binding
    pub fn add_combined_image_sampler(self, binding: u32, stage_flags: vk::ShaderStageFlags) -> Self {
        self.add(binding, vk::DescriptorType::COMBINED_IMAGE_SAMPLER, stage_flags)
    }

    fn add(mut self, binding: u32, descriptor_type: vk::DescriptorType, stage_flags: vk::ShaderStageFlags) -> Self {
        self.bindings.push(
            vk::DescriptorSetLayoutBinding::builder()
                .binding(binding)
                .descriptor_type(descriptor_type)
                .descriptor_count(1)
                .stage_flags(stage_flags)
                .build(),
        );
        self
    }

    /// Bindings collected so far
    pub fn bindings(&self) -> &[vk::DescriptorSetLayoutBinding] {
        &self.bindings
    }

    /// Build the descriptor set layout
    pub fn build(self, allocator: &Arc<dyn GpuAllocator>) -> VulkanResult<DescriptorSetLayout> {
        let layout = allocator.create_descriptor_set_layout(&self.bindings)?;

        Ok(DescriptorSetLayout {
            layout,
            allocator: Arc::clone(allocator),
            bindings: self.bindings,
        })
    }
}

/// Descriptor set layout wrapper with automatic cleanup
pub struct DescriptorSetLayout {
    layout: vk::DescriptorSetLayout,
    allocator: Arc<dyn GpuAllocator>,
    bindings: Vec<vk::DescriptorSetLayoutBinding>,
}

impl DescriptorSetLayout {
    /// Get the Vulkan descriptor set layout handle
    pub fn handle(&self) -> vk::DescriptorSetLayout {
        self.layout
    }

    /// Get the bindings used in this layout
    pub fn bindings(&self) -> &[vk::DescriptorSetLayoutBinding] {
        &self.bindings
    }
}

impl std::fmt::Debug for DescriptorSetLayout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DescriptorSetLayout")
            .field("layout", &self.layout)
            .field("bindings", &self.bindings.len())
            .finish()
    }
}

impl Drop for DescriptorSetLayout {
    fn drop(&mut self) {
        self.allocator.destroy_descriptor_set_layout(self.layout);
    }
}

/// What a binding slot holds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingKind {
    /// One uniform buffer per frame in flight, `size` bytes each
    UniformBuffer {
        /// Buffer size in bytes
        size: vk::DeviceSize,
    },
    /// A shared texture, identical for every frame
    CombinedImageSampler {
        /// Index into the model's texture bindings
        texture: usize,
    },
}

/// One binding of a node's descriptor set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BindingDecl {
    /// Binding index within the set
    pub binding: u32,
    /// Resource held by the binding
    pub kind: BindingKind,
    /// Shader stages reading the binding
    pub stages: vk::ShaderStageFlags,
}

/// Declared layout of one descriptor set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescriptorSetDecl {
    /// Set index used when binding
    pub set: u32,
    /// Bindings in the set
    pub bindings: Vec<BindingDecl>,
}

impl DescriptorSetDecl {
    /// Layout builder holding every declared binding
    pub fn layout_builder(&self) -> DescriptorSetLayoutBuilder {
        self.bindings.iter().fold(DescriptorSetLayoutBuilder::new(), |builder, decl| match decl.kind {
            BindingKind::UniformBuffer { .. } => builder.add_uniform_buffer(decl.binding, decl.stages),
            BindingKind::CombinedImageSampler { .. } => builder.add_combined_image_sampler(decl.binding, decl.stages),
        })
    }

    /// Uniform buffer bindings and their sizes
    pub fn uniform_buffers(&self) -> impl Iterator<Item = (u32, vk::DeviceSize)> + '_ {
        self.bindings.iter().filter_map(|decl| match decl.kind {
            BindingKind::UniformBuffer { size } => Some((decl.binding, size)),
            BindingKind::CombinedImageSampler { .. } => None,
        })
    }
}

/// Sampler and view of an uploaded texture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureBinding {
    /// Sampler handle
    pub sampler: vk::Sampler,
    /// Image view handle
    pub view: vk::ImageView,
    /// Layout the image is in when sampled
    pub layout: vk::ImageLayout,
}

/// Resource referenced by a descriptor write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptorResource {
    /// A range of a uniform buffer
    Buffer {
        /// Buffer handle
        buffer: vk::Buffer,
        /// Start of the range
        offset: vk::DeviceSize,
        /// Length of the range
        range: vk::DeviceSize,
    },
    /// A combined image sampler
    Image(TextureBinding),
}

/// One descriptor to write into a set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescriptorWrite {
    /// Destination set
    pub dst_set: vk::DescriptorSet,
    /// Destination binding
    pub binding: u32,
    /// Resource written
    pub resource: DescriptorResource,
}

/// Vulkan write structures built from [`DescriptorWrite`]s
///
/// Owns the buffer and image info arrays the writes point into, so it must
/// outlive any use of [`writes`](Self::writes).
pub struct DescriptorSetWriter {
    writes: Vec<vk::WriteDescriptorSet>,
    _buffer_infos: Vec<vk::DescriptorBufferInfo>,
    _image_infos: Vec<vk::DescriptorImageInfo>,
}

impl DescriptorSetWriter {
    /// Convert descriptor writes into Vulkan structures
    pub fn new(writes: &[DescriptorWrite]) -> Self {
        let mut buffer_infos = Vec::new();
        let mut image_infos = Vec::new();
        let mut slots = Vec::with_capacity(writes.len());

        for write in writes {
            match write.resource {
                DescriptorResource::Buffer { buffer, offset, range } => {
                    slots.push(buffer_infos.len());
                    buffer_infos.push(
                        vk::DescriptorBufferInfo::builder()
                            .buffer(buffer)
                            .offset(offset)
                            .range(range)
                            .build(),
                    );
                }
                DescriptorResource::Image(texture) => {
                    slots.push(image_infos.len());
                    image_infos.push(
                        vk::DescriptorImageInfo::builder()
                            .sampler(texture.sampler)
                            .image_view(texture.view)
                            .image_layout(texture.layout)
                            .build(),
                    );
                }
            }
        }

        // Info arrays are complete, so the pointers taken below stay valid.
        let vk_writes = writes
            .iter()
            .zip(slots)
            .map(|(write, slot)| {
                let builder = vk::WriteDescriptorSet::builder()
                    .dst_set(write.dst_set)
                    .dst_binding(write.binding)
                    .dst_array_element(0);
                match write.resource {
                    DescriptorResource::Buffer { .. } => builder
                        .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
                        .buffer_info(std::slice::from_ref(&buffer_infos[slot]))
                        .build(),
                    DescriptorResource::Image(_) => builder
                        .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
                        .image_info(std::slice::from_ref(&image_infos[slot]))
                        .build(),
                }
            })
            .collect();

        Self {
            writes: vk_writes,
            _buffer_infos: buffer_infos,
            _image_infos: image_infos,
        }
    }

    /// Write structures ready for `vkUpdateDescriptorSets`
    pub fn writes(&self) -> &[vk::WriteDescriptorSet] {
        &self.writes
    }
}
