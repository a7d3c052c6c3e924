//! Render submission
//!
//! [`record_draws`] walks a model in pre-order and produces a flat command
//! list; [`VulkanCommandRecorder`] replays such a list into a command buffer.

use ash::{vk, Device};

use crate::error::EngineResult;
use crate::model::Model;
use crate::scene::DrawRange;
use super::object_data::NODE_DESCRIPTOR_SET;

/// One recorded step of a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawCommand {
    /// Bind the model's vertex and index buffers
    BindGeometry {
        /// Vertex buffer
        vertex_buffer: vk::Buffer,
        /// 32-bit index buffer
        index_buffer: vk::Buffer,
    },
    /// Bind a node's descriptor set
    BindDescriptorSet {
        /// Set index
        set: u32,
        /// Descriptor set of the current frame
        descriptor_set: vk::DescriptorSet,
    },
    /// Draw one primitive
    DrawIndexed(DrawRange),
}

/// Commands drawing every mesh node of `model` with the resources of `frame`
pub fn record_draws(model: &Model, frame: usize) -> EngineResult<Vec<DrawCommand>> {
    let mut commands = Vec::new();

    if let Some(geometry) = model.geometry() {
        commands.push(DrawCommand::BindGeometry {
            vertex_buffer: geometry.vertices.handle(),
            index_buffer: geometry.indices.handle(),
        });
    }

    let graph = model.graph();
    for &node in graph.node_lookup() {
        let primitives = graph.primitives(node);
        if primitives.is_empty() {
            continue;
        }

        commands.push(DrawCommand::BindDescriptorSet {
            set: NODE_DESCRIPTOR_SET,
            descriptor_set: model.descriptor_set(node, NODE_DESCRIPTOR_SET, frame)?,
        });
        for &primitive in primitives {
            commands.push(DrawCommand::DrawIndexed(model.draw_range(primitive)?));
        }
    }

    Ok(commands)
}

/// Replays [`DrawCommand`]s into a command buffer in the recording state
pub struct VulkanCommandRecorder<'a> {
    device: &'a Device,
    command_buffer: vk::CommandBuffer,
    pipeline_layout: vk::PipelineLayout,
}

impl<'a> VulkanCommandRecorder<'a> {
    /// Create a recorder for a command buffer bound to a graphics pipeline
    pub fn new(device: &'a Device, command_buffer: vk::CommandBuffer, pipeline_layout: vk::PipelineLayout) -> Self {
        Self { device, command_buffer, pipeline_layout }
    }

    /// Record every command in order
    pub fn record(&self, commands: &[DrawCommand]) {
        for command in commands {
            self.record_one(command);
        }
    }

    fn record_one(&self, command: &DrawCommand) {
        match *command {
            DrawCommand::BindGeometry { vertex_buffer, index_buffer } => unsafe {
                self.device.cmd_bind_vertex_buffers(self.command_buffer, 0, &[vertex_buffer], &[0]);
                self.device.cmd_bind_index_buffer(self.command_buffer, index_buffer, 0, vk::IndexType::UINT32);
            },
            DrawCommand::BindDescriptorSet { set, descriptor_set } => unsafe {
                self.device.cmd_bind_descriptor_sets(
                    self.command_buffer,
                    vk::PipelineBindPoint::GRAPHICS,
                    self.pipeline_layout,
                    set,
                    &[descriptor_set],
                    &[],
                );
            },
            DrawCommand::DrawIndexed(range) => unsafe {
                self.device.cmd_draw_indexed(
                    self.command_buffer,
                    range.index_count,
                    1,
                    range.first_index,
                    i32::try_from(range.first_vertex).unwrap_or(i32::MAX),
                    0,
                );
            },
        }
    }
}
