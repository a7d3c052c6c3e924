//! Per-frame resource binder
//!
//! Each node owns, per (descriptor set, binding), one uniform buffer for
//! every frame in flight, plus one descriptor set per frame for every set it
//! declares. Slot `i` always belongs to frame `i`, so the CPU can write the
//! slot of the frame it is preparing while the GPU reads the others.

use std::collections::HashMap;
use std::sync::Arc;

use ash::vk;

use crate::foundation::logging::{debug, trace};
use crate::scene::NodeIndex;
use super::buffer::GpuBuffer;
use super::context::RenderContext;
use super::vulkan::{
    BindingKind, DescriptorResource, DescriptorSetDecl, DescriptorWrite, GpuAllocator, TextureBinding,
    VulkanError, VulkanResult,
};

/// One frame's uniform buffer for a (node, set, binding)
pub type UniformSlot = GpuBuffer;

/// Descriptor sets of one (node, set), freed on drop
struct DescriptorSets {
    allocator: Arc<dyn GpuAllocator>,
    layout: vk::DescriptorSetLayout,
    sets: Vec<vk::DescriptorSet>,
}

impl Drop for DescriptorSets {
    fn drop(&mut self) {
        self.allocator.free_descriptor_sets(&self.sets);
    }
}

#[derive(Default)]
struct NodeBindings {
    uniforms: HashMap<(u32, u32), Vec<UniformSlot>>,
    descriptor_sets: HashMap<u32, DescriptorSets>,
}

/// GPU binding state of every node of a model
#[derive(Default)]
pub struct FrameBinder {
    nodes: HashMap<NodeIndex, NodeBindings>,
}

impl FrameBinder {
    /// Create an empty binder
    pub fn new() -> Self {
        Self::default()
    }

    /// Make sure `node` has a `size`-byte uniform buffer for every frame in flight
    ///
    /// Calling this again for the same (node, set, binding) allocates only
    /// the slots that are missing.
    pub fn add_uniform_buffer_to_descriptor_set(
        &mut self,
        ctx: &RenderContext,
        node: NodeIndex,
        set: u32,
        binding: u32,
        size: vk::DeviceSize,
    ) -> VulkanResult<()> {
        let slots = self
            .nodes
            .entry(node)
            .or_default()
            .uniforms
            .entry((set, binding))
            .or_default();

        if let Some(existing) = slots.first() {
            if existing.size() != size {
                return Err(VulkanError::InvalidOperation {
                    reason: format!(
                        "node {} set {} binding {} already holds {}-byte buffers, requested {}",
                        node, set, binding, existing.size(), size
                    ),
                });
            }
        }

        let missing = ctx.frames_in_flight().saturating_sub(slots.len());
        if missing == 0 {
            trace!("Uniform slots for node {} set {} binding {} already allocated", node, set, binding);
            return Ok(());
        }

        for _ in 0..missing {
            slots.push(GpuBuffer::new(&ctx.allocator, size, vk::BufferUsageFlags::UNIFORM_BUFFER)?);
        }
        debug!(
            "Allocated {} uniform slots ({} bytes) for node {} set {} binding {}",
            missing, size, node, set, binding
        );
        Ok(())
    }

    /// Make sure `node` has one descriptor set per frame in flight for `set`
    ///
    /// Every call for the same (node, set) must pass the layout the sets were
    /// first allocated with.
    pub fn allocate_descriptor_sets(
        &mut self,
        ctx: &RenderContext,
        node: NodeIndex,
        set: u32,
        layout: vk::DescriptorSetLayout,
    ) -> VulkanResult<()> {
        let bindings = self.nodes.entry(node).or_default();
        let sets = bindings.descriptor_sets.entry(set).or_insert_with(|| DescriptorSets {
            allocator: Arc::clone(&ctx.allocator),
            layout,
            sets: Vec::new(),
        });

        if sets.layout != layout {
            return Err(VulkanError::InvalidOperation {
                reason: format!(
                    "node {} set {} was allocated with layout {:?}, requested {:?}",
                    node, set, sets.layout, layout
                ),
            });
        }

        let missing = ctx.frames_in_flight().saturating_sub(sets.sets.len());
        if missing == 0 {
            trace!("Descriptor sets for node {} set {} already allocated", node, set);
            return Ok(());
        }

        let allocated = ctx.allocator.allocate_descriptor_sets(layout, missing)?;
        sets.sets.extend(allocated);
        debug!("Allocated {} descriptor sets for node {} set {}", missing, node, set);
        Ok(())
    }

    /// Uniform buffer of one frame
    pub fn uniform_slot(&self, node: NodeIndex, set: u32, binding: u32, frame: usize) -> VulkanResult<&UniformSlot> {
        self.nodes
            .get(&node)
            .and_then(|bindings| bindings.uniforms.get(&(set, binding)))
            .and_then(|slots| slots.get(frame))
            .ok_or(VulkanError::BindingNotFound { node, set, binding, frame })
    }

    /// Number of frame slots held for a (node, set, binding)
    pub fn slot_count(&self, node: NodeIndex, set: u32, binding: u32) -> usize {
        self.nodes
            .get(&node)
            .and_then(|bindings| bindings.uniforms.get(&(set, binding)))
            .map_or(0, Vec::len)
    }

    /// Copy `data` into the slot of `frame`
    ///
    /// The caller guarantees the GPU is no longer reading that slot.
    pub fn update(&self, node: NodeIndex, set: u32, binding: u32, frame: usize, data: &[u8]) -> VulkanResult<()> {
        self.uniform_slot(node, set, binding, frame)?.write(data)
    }

    /// Descriptor set of one frame
    pub fn descriptor_set(&self, node: NodeIndex, set: u32, frame: usize) -> VulkanResult<vk::DescriptorSet> {
        self.nodes
            .get(&node)
            .and_then(|bindings| bindings.descriptor_sets.get(&set))
            .and_then(|sets| sets.sets.get(frame).copied())
            .ok_or(VulkanError::DescriptorSetNotFound { node, set, frame })
    }

    /// Writes filling every frame's descriptor set of `node` for `decl`
    ///
    /// Uniform bindings point at that frame's slot; texture bindings point at
    /// the same shared texture for every frame.
    pub fn descriptor_writes(
        &self,
        node: NodeIndex,
        decl: &DescriptorSetDecl,
        textures: &[TextureBinding],
    ) -> VulkanResult<Vec<DescriptorWrite>> {
        let frames = self
            .nodes
            .get(&node)
            .and_then(|bindings| bindings.descriptor_sets.get(&decl.set))
            .map_or(0, |sets| sets.sets.len());
        if frames == 0 {
            return Err(VulkanError::DescriptorSetNotFound { node, set: decl.set, frame: 0 });
        }

        let mut writes = Vec::with_capacity(frames * decl.bindings.len());
        for frame in 0..frames {
            let dst_set = self.descriptor_set(node, decl.set, frame)?;
            for binding in &decl.bindings {
                let resource = match binding.kind {
                    BindingKind::UniformBuffer { .. } => {
                        let slot = self.uniform_slot(node, decl.set, binding.binding, frame)?;
                        DescriptorResource::Buffer { buffer: slot.handle(), offset: 0, range: slot.size() }
                    }
                    BindingKind::CombinedImageSampler { texture } => {
                        let texture = textures
                            .get(texture)
                            .ok_or(VulkanError::TextureNotFound { index: texture })?;
                        DescriptorResource::Image(*texture)
                    }
                };
                writes.push(DescriptorWrite { dst_set, binding: binding.binding, resource });
            }
        }
        Ok(writes)
    }

    /// Drop every slot and descriptor set of `node`; returns whether it had any
    pub fn release_node(&mut self, node: NodeIndex) -> bool {
        let released = self.nodes.remove(&node).is_some();
        if released {
            debug!("Released GPU bindings of node {}", node);
        }
        released
    }

    /// Nodes holding GPU bindings
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }
}

impl std::fmt::Debug for FrameBinder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameBinder").field("nodes", &self.nodes.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::vulkan::{BindingDecl, HostAllocator};

    fn decl() -> DescriptorSetDecl {
        DescriptorSetDecl {
            set: 1,
            bindings: vec![
                BindingDecl {
                    binding: 0,
                    kind: BindingKind::UniformBuffer { size: 64 },
                    stages: vk::ShaderStageFlags::VERTEX,
                },
                BindingDecl {
                    binding: 2,
                    kind: BindingKind::CombinedImageSampler { texture: 0 },
                    stages: vk::ShaderStageFlags::FRAGMENT,
                },
            ],
        }
    }

    fn setup(frames: usize) -> (RenderContext, HostAllocator, FrameBinder, vk::DescriptorSetLayout) {
        let (ctx, host) = RenderContext::headless(frames).unwrap();
        let layout = ctx.allocator.create_descriptor_set_layout(&[]).unwrap();
        let mut binder = FrameBinder::new();
        binder.add_uniform_buffer_to_descriptor_set(&ctx, 3, 1, 0, 64).unwrap();
        binder.allocate_descriptor_sets(&ctx, 3, 1, layout).unwrap();
        (ctx, host, binder, layout)
    }

    #[test]
    fn test_uniform_setup_is_idempotent() {
        let (ctx, host, mut binder, layout) = setup(3);
        assert_eq!(binder.slot_count(3, 1, 0), 3);
        assert_eq!(host.live_buffer_count(), 3);

        binder.add_uniform_buffer_to_descriptor_set(&ctx, 3, 1, 0, 64).unwrap();
        binder.allocate_descriptor_sets(&ctx, 3, 1, layout).unwrap();
        assert_eq!(binder.slot_count(3, 1, 0), 3);
        assert_eq!(host.live_buffer_count(), 3);
        assert_eq!(host.live_descriptor_set_count(), 3);
    }

    #[test]
    fn test_size_change_rejected() {
        let (ctx, _, mut binder, _) = setup(2);
        let result = binder.add_uniform_buffer_to_descriptor_set(&ctx, 3, 1, 0, 128);
        assert!(matches!(result, Err(VulkanError::InvalidOperation { .. })));
    }

    #[test]
    fn test_layout_change_rejected() {
        let (ctx, host, mut binder, _) = setup(2);
        let other = ctx.allocator.create_descriptor_set_layout(&[]).unwrap();

        let result = binder.allocate_descriptor_sets(&ctx, 3, 1, other);
        assert!(matches!(result, Err(VulkanError::InvalidOperation { .. })));
        assert_eq!(host.live_descriptor_set_count(), 2);

        // A different set of the same node may use its own layout.
        binder.allocate_descriptor_sets(&ctx, 3, 2, other).unwrap();
        assert_eq!(host.live_descriptor_set_count(), 4);
    }

    #[test]
    fn test_missing_binding_reports_keys() {
        let (_, _, binder, _) = setup(2);
        assert_eq!(
            binder.uniform_slot(3, 1, 5, 0).err(),
            Some(VulkanError::BindingNotFound { node: 3, set: 1, binding: 5, frame: 0 })
        );
        assert_eq!(
            binder.uniform_slot(3, 1, 0, 2).err(),
            Some(VulkanError::BindingNotFound { node: 3, set: 1, binding: 0, frame: 2 })
        );
        assert_eq!(
            binder.descriptor_set(9, 1, 0),
            Err(VulkanError::DescriptorSetNotFound { node: 9, set: 1, frame: 0 })
        );
    }

    #[test]
    fn test_update_touches_only_its_frame() {
        let (_, host, binder, _) = setup(2);
        binder.update(3, 1, 0, 1, &[7; 16]).unwrap();

        let frame0 = host.read_memory(binder.uniform_slot(3, 1, 0, 0).unwrap().memory()).unwrap();
        let frame1 = host.read_memory(binder.uniform_slot(3, 1, 0, 1).unwrap().memory()).unwrap();
        assert!(frame0.iter().all(|&b| b == 0));
        assert_eq!(&frame1[..16], &[7; 16]);

        assert!(binder.update(3, 1, 0, 0, &[0; 65]).is_err());
    }

    #[test]
    fn test_descriptor_writes_cover_every_frame_and_binding() {
        let (_, host, binder, _) = setup(2);
        let texture = host.create_texture();
        let writes = binder.descriptor_writes(3, &decl(), &[texture]).unwrap();

        assert_eq!(writes.len(), 4);
        for frame in 0..2 {
            let set = binder.descriptor_set(3, 1, frame).unwrap();
            let slot = binder.uniform_slot(3, 1, 0, frame).unwrap();
            let frame_writes: Vec<_> = writes.iter().filter(|w| w.dst_set == set).collect();

            assert_eq!(frame_writes.len(), 2);
            assert_eq!(
                frame_writes[0].resource,
                DescriptorResource::Buffer { buffer: slot.handle(), offset: 0, range: 64 }
            );
            assert_eq!(frame_writes[1].resource, DescriptorResource::Image(texture));
        }
    }

    #[test]
    fn test_descriptor_writes_need_texture() {
        let (_, _, binder, _) = setup(2);
        assert_eq!(
            binder.descriptor_writes(3, &decl(), &[]),
            Err(VulkanError::TextureNotFound { index: 0 })
        );
    }

    #[test]
    fn test_release_node_frees_resources() {
        let (_, host, mut binder, _) = setup(2);
        assert!(binder.release_node(3));
        assert!(!binder.release_node(3));
        assert_eq!(host.live_buffer_count(), 0);
        assert_eq!(host.live_descriptor_set_count(), 0);
        assert_eq!(binder.node_count(), 0);
    }
}
