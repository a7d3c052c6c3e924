//! Loaded models and the per-frame pipeline
//!
//! A [`Model`] is what a loader hands over: the scene graph, meshes,
//! primitives, skins, animations and merged geometry. Topology is fixed after
//! load; only transforms, playheads and GPU buffer contents change.
//!
//! Per frame the order is strict: advance the active animation, recompute
//! joint palettes, write node and joint uniforms into the frame's slots, then
//! record draws.

use std::collections::{HashMap, HashSet};

use ash::vk;

use crate::animation::{Animation, AnimationError};
use crate::assets::{AssetError, Vertex};
use crate::error::EngineResult;
use crate::foundation::logging::{debug, info, trace};
use crate::foundation::math::Mat4;
use crate::render::binder::FrameBinder;
use crate::render::buffer::{GeometryBuffers, GpuBuffer};
use crate::render::context::RenderContext;
use crate::render::object_data::{
    joint_palette_data, node_set_decl, NodeUniform, JOINT_UNIFORM_BINDING, NODE_DESCRIPTOR_SET,
    NODE_UNIFORM_BINDING,
};
use crate::render::vulkan::{DescriptorSetLayout, TextureBinding, VulkanError};
use crate::scene::{
    DrawRange, Material, Mesh, Node, NodeIndex, Primitive, PrimitiveIndex, SceneError, SceneGraph, Skin, SkinIndex,
};

/// Everything a loader produces, before validation
#[derive(Debug, Clone, Default)]
pub struct ModelParts {
    /// Model name
    pub name: String,
    /// Node arena with children lists filled in
    pub nodes: Vec<Node>,
    /// Scene roots; empty means every parentless node
    pub roots: Vec<NodeIndex>,
    /// Meshes
    pub meshes: Vec<Mesh>,
    /// Primitive pool
    pub primitives: Vec<Primitive>,
    /// Materials
    pub materials: Vec<Material>,
    /// Skins
    pub skins: Vec<Skin>,
    /// Animations
    pub animations: Vec<Animation>,
    /// Merged vertices
    pub vertices: Vec<Vertex>,
    /// Merged indices, relative to each primitive's first vertex
    pub indices: Vec<u32>,
    /// Number of textures materials may refer to
    pub texture_count: usize,
}

/// GPU state created by [`Model::prepare_gpu_resources`]
#[derive(Default)]
struct GpuState {
    binder: FrameBinder,
    geometry: Option<GeometryBuffers>,
    layouts: HashMap<bool, DescriptorSetLayout>,
    written: HashSet<NodeIndex>,
}

/// A loaded, animatable model
pub struct Model {
    /// Model name
    pub name: String,
    graph: SceneGraph,
    meshes: Vec<Mesh>,
    primitives: Vec<Primitive>,
    materials: Vec<Material>,
    skins: Vec<Skin>,
    animations: Vec<Animation>,
    vertices: Vec<Vertex>,
    indices: Vec<u32>,
    texture_count: usize,
    textures: Vec<TextureBinding>,
    active_animation: Option<usize>,
    gpu: Option<GpuState>,
}

impl Model {
    /// Validate loader output and build the model
    pub fn from_parts(parts: ModelParts) -> Result<Self, AssetError> {
        let graph = SceneGraph::new(parts.nodes, parts.roots, &parts.meshes)?;
        graph.validate_skins(&parts.skins)?;
        for animation in &parts.animations {
            animation.validate_targets(graph.len())?;
        }

        for mesh in &parts.meshes {
            if let Some(&missing) = mesh.primitives.iter().find(|&&p| p >= parts.primitives.len()) {
                return Err(SceneError::PrimitiveNotFound(missing).into());
            }
        }
        for (index, primitive) in parts.primitives.iter().enumerate() {
            let vertex_end = u64::from(primitive.first_vertex) + u64::from(primitive.vertex_count);
            let index_end = u64::from(primitive.first_index) + u64::from(primitive.index_count);
            if vertex_end > parts.vertices.len() as u64 || index_end > parts.indices.len() as u64 {
                return Err(AssetError::PrimitiveOutOfRange { primitive: index });
            }
            if let Some(material) = primitive.material {
                if material >= parts.materials.len() {
                    return Err(AssetError::MaterialNotFound { primitive: index, material });
                }
            }
        }

        info!(
            "Model '{}': {} nodes, {} meshes, {} primitives, {} skins, {} animations, {} vertices, {} indices",
            parts.name,
            graph.len(),
            parts.meshes.len(),
            parts.primitives.len(),
            parts.skins.len(),
            parts.animations.len(),
            parts.vertices.len(),
            parts.indices.len()
        );

        Ok(Self {
            name: parts.name,
            graph,
            meshes: parts.meshes,
            primitives: parts.primitives,
            materials: parts.materials,
            skins: parts.skins,
            animations: parts.animations,
            vertices: parts.vertices,
            indices: parts.indices,
            texture_count: parts.texture_count,
            textures: Vec::new(),
            active_animation: None,
            gpu: None,
        })
    }

    /// Scene graph
    pub fn graph(&self) -> &SceneGraph {
        &self.graph
    }

    /// Scene graph, for driving node transforms directly
    pub fn graph_mut(&mut self) -> &mut SceneGraph {
        &mut self.graph
    }

    /// Meshes
    pub fn meshes(&self) -> &[Mesh] {
        &self.meshes
    }

    /// Primitive pool
    pub fn primitives(&self) -> &[Primitive] {
        &self.primitives
    }

    /// Materials
    pub fn materials(&self) -> &[Material] {
        &self.materials
    }

    /// Skins
    pub fn skins(&self) -> &[Skin] {
        &self.skins
    }

    /// Animations
    pub fn animations(&self) -> &[Animation] {
        &self.animations
    }

    /// Merged vertices
    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    /// Merged indices
    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    /// Number of textures materials may refer to
    pub fn texture_count(&self) -> usize {
        self.texture_count
    }

    /// Get an animation
    pub fn animation(&self, index: usize) -> Result<&Animation, AnimationError> {
        self.animations.get(index).ok_or(AnimationError::AnimationNotFound(index))
    }

    /// Animation played by [`update`](Self::update)
    pub fn active_animation(&self) -> Option<usize> {
        self.active_animation
    }

    /// Choose the animation played by [`update`](Self::update)
    pub fn set_active_animation(&mut self, animation: Option<usize>) -> Result<(), AnimationError> {
        if let Some(index) = animation {
            self.animation(index)?;
        }
        self.active_animation = animation;
        Ok(())
    }

    /// Supply uploaded textures, indexed like material texture references
    ///
    /// Must happen before [`prepare_gpu_resources`](Self::prepare_gpu_resources)
    /// for nodes whose materials are textured.
    pub fn set_texture_bindings(&mut self, textures: Vec<TextureBinding>) {
        self.textures = textures;
    }

    /// Advance an animation by `dt` seconds and apply it to the graph
    pub fn advance(&mut self, animation: usize, dt: f32) -> Result<(), AnimationError> {
        self.animations
            .get_mut(animation)
            .ok_or(AnimationError::AnimationNotFound(animation))?
            .advance(dt, &mut self.graph)
    }

    /// Recompute every skinned node's joint palette
    pub fn update_joints(&mut self) -> Result<(), SceneError> {
        self.graph.update_joints(&self.skins)
    }

    /// Visit every reachable node in pre-order
    pub fn for_each_node<F>(&self, f: F)
    where
        F: FnMut(NodeIndex, &Node),
    {
        self.graph.for_each_node(f);
    }

    /// Global matrix of a node
    pub fn global_matrix(&self, node: NodeIndex) -> Result<Mat4, SceneError> {
        self.graph.global_matrix(node)
    }

    /// Flattened joint palette of a skin
    pub fn joint_matrices(&self, skin: SkinIndex) -> Result<Vec<f32>, SceneError> {
        self.graph.flattened_joint_matrices(skin)
    }

    /// Draw parameters of a primitive
    pub fn draw_range(&self, primitive: PrimitiveIndex) -> Result<DrawRange, SceneError> {
        self.primitives
            .get(primitive)
            .map(Primitive::draw_range)
            .ok_or(SceneError::PrimitiveNotFound(primitive))
    }

    /// Descriptor set bound for a node in `frame`
    pub fn descriptor_set(&self, node: NodeIndex, set: u32, frame: usize) -> Result<vk::DescriptorSet, VulkanError> {
        self.gpu
            .as_ref()
            .ok_or(VulkanError::DescriptorSetNotFound { node, set, frame })?
            .binder
            .descriptor_set(node, set, frame)
    }

    /// Per-frame binding state, once prepared
    pub fn binder(&self) -> Option<&FrameBinder> {
        self.gpu.as_ref().map(|gpu| &gpu.binder)
    }

    /// Uploaded vertex and index buffers, once prepared
    pub fn geometry(&self) -> Option<&GeometryBuffers> {
        self.gpu.as_ref().and_then(|gpu| gpu.geometry.as_ref())
    }

    /// Reachable mesh nodes in pre-order, with the texture bound to their set
    fn mesh_nodes(&self) -> Vec<(NodeIndex, Option<usize>)> {
        let mut nodes = Vec::new();
        self.graph.for_each_node(|index, node| {
            if node.mesh.is_some() {
                let texture = self
                    .graph
                    .primitives(index)
                    .iter()
                    .filter_map(|&p| self.primitives[p].material)
                    .find_map(|m| self.materials[m].base_color_texture);
                nodes.push((index, texture));
            }
        });
        nodes
    }

    /// Create geometry buffers, node uniforms and descriptor sets
    ///
    /// Only missing resources are created, so calling this again allocates
    /// nothing.
    pub fn prepare_gpu_resources(&mut self, ctx: &RenderContext) -> EngineResult<()> {
        let mesh_nodes = self.mesh_nodes();
        let frames = ctx.frames_in_flight();
        let gpu = self.gpu.get_or_insert_with(GpuState::default);

        if gpu.geometry.is_none() && !self.vertices.is_empty() && !self.indices.is_empty() {
            gpu.geometry = Some(GeometryBuffers {
                vertices: GpuBuffer::with_data(
                    &ctx.allocator,
                    bytemuck::cast_slice(&self.vertices),
                    vk::BufferUsageFlags::VERTEX_BUFFER,
                )?,
                indices: GpuBuffer::with_data(
                    &ctx.allocator,
                    bytemuck::cast_slice(&self.indices),
                    vk::BufferUsageFlags::INDEX_BUFFER,
                )?,
            });
        }

        let mut writes = Vec::new();
        let mut bound = Vec::new();
        for (node, texture) in mesh_nodes {
            let decl = node_set_decl(texture);

            let complete = decl
                .uniform_buffers()
                .all(|(binding, _)| gpu.binder.slot_count(node, decl.set, binding) >= frames)
                && gpu.binder.descriptor_set(node, decl.set, frames - 1).is_ok()
                && gpu.written.contains(&node);
            if complete {
                trace!("Node {} already prepared", node);
                continue;
            }

            let layout = match gpu.layouts.get(&texture.is_some()) {
                Some(layout) => layout.handle(),
                None => {
                    let layout = decl.layout_builder().build(&ctx.allocator)?;
                    let handle = layout.handle();
                    gpu.layouts.insert(texture.is_some(), layout);
                    handle
                }
            };

            for (binding, size) in decl.uniform_buffers() {
                gpu.binder.add_uniform_buffer_to_descriptor_set(ctx, node, decl.set, binding, size)?;
            }
            gpu.binder.allocate_descriptor_sets(ctx, node, decl.set, layout)?;
            writes.extend(gpu.binder.descriptor_writes(node, &decl, &self.textures)?);
            bound.push(node);
        }

        if !writes.is_empty() {
            ctx.allocator.update_descriptor_sets(&writes);
        }
        gpu.written.extend(bound);
        debug!(
            "GPU resources of '{}' prepared: {} nodes bound, {} descriptor writes",
            self.name,
            gpu.binder.node_count(),
            writes.len()
        );
        Ok(())
    }

    /// Run one frame: animation, joints, then uniform writes into slot `frame`
    pub fn update(&mut self, ctx: &RenderContext, frame: usize, dt: f32) -> EngineResult<()> {
        ctx.check_frame(frame)?;
        let gpu = self.gpu.as_ref().ok_or_else(|| VulkanError::InvalidOperation {
            reason: format!("GPU resources of '{}' not prepared", self.name),
        })?;

        if let Some(active) = self.active_animation {
            self.animations[active].advance(dt, &mut self.graph)?;
        }

        self.graph.update_joints(&self.skins)?;

        for &index in self.graph.node_lookup() {
            let node = &self.graph.nodes()[index];
            if node.mesh.is_none() {
                continue;
            }

            let global = self.graph.global_matrix(index)?;
            let palette = node.joint_matrices();
            let uniform = NodeUniform::new(&global, palette.len());

            gpu.binder
                .update(index, NODE_DESCRIPTOR_SET, NODE_UNIFORM_BINDING, frame, bytemuck::bytes_of(&uniform))?;
            gpu.binder.update(
                index,
                NODE_DESCRIPTOR_SET,
                JOINT_UNIFORM_BINDING,
                frame,
                bytemuck::cast_slice(&joint_palette_data(palette)),
            )?;
        }

        trace!("Model '{}' updated for frame {}", self.name, frame);
        Ok(())
    }

    /// Drop every GPU resource the model holds
    pub fn release_gpu_resources(&mut self) {
        if self.gpu.take().is_some() {
            debug!("Released GPU resources of '{}'", self.name);
        }
    }
}

impl std::fmt::Debug for Model {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Model")
            .field("name", &self.name)
            .field("nodes", &self.graph.len())
            .field("primitives", &self.primitives.len())
            .field("skins", &self.skins.len())
            .field("animations", &self.animations.len())
            .field("gpu_prepared", &self.gpu.is_some())
            .finish()
    }
}
