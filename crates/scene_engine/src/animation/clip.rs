//! Animation clips
//!
//! A clip owns its samplers and channels and a playhead. Advancing the
//! playhead and applying the channels to a [`SceneGraph`] are separate
//! steps so callers can scrub without re-evaluating.

use crate::foundation::logging::{trace, warn};
use crate::foundation::math::Vec3;
use crate::scene::SceneGraph;
use super::{AnimationError, Channel, ChannelPath, Sampler};

/// A named set of channels sharing one timeline
#[derive(Debug, Clone)]
pub struct Animation {
    /// Clip name
    pub name: String,
    samplers: Vec<Sampler>,
    channels: Vec<Channel>,
    current_time: f32,
    start_time: f32,
    end_time: f32,
}

impl Animation {
    /// Create a clip; every channel must reference an existing sampler
    pub fn new(name: impl Into<String>, samplers: Vec<Sampler>, channels: Vec<Channel>) -> Result<Self, AnimationError> {
        for (index, channel) in channels.iter().enumerate() {
            if channel.sampler >= samplers.len() {
                return Err(AnimationError::SamplerOutOfRange {
                    channel: index,
                    sampler: channel.sampler,
                    count: samplers.len(),
                });
            }
        }

        let start_time = samplers
            .iter()
            .filter_map(Sampler::first_time)
            .reduce(f32::min)
            .unwrap_or(0.0);
        let end_time = samplers
            .iter()
            .filter_map(Sampler::last_time)
            .reduce(f32::max)
            .unwrap_or(0.0);

        Ok(Self {
            name: name.into(),
            samplers,
            channels,
            current_time: 0.0,
            start_time,
            end_time,
        })
    }

    /// Samplers in source order
    pub fn samplers(&self) -> &[Sampler] {
        &self.samplers
    }

    /// Channels in source order
    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    /// Playhead position in seconds
    pub fn current_time(&self) -> f32 {
        self.current_time
    }

    /// Earliest key time across all samplers
    pub fn start_time(&self) -> f32 {
        self.start_time
    }

    /// Latest key time across all samplers
    pub fn end_time(&self) -> f32 {
        self.end_time
    }

    /// Move the playhead back to zero
    pub fn reset(&mut self) {
        self.current_time = 0.0;
    }

    /// Check that every channel targets a node of a graph with `node_count` nodes
    pub fn validate_targets(&self, node_count: usize) -> Result<(), AnimationError> {
        for (index, channel) in self.channels.iter().enumerate() {
            if channel.node >= node_count {
                return Err(AnimationError::MissingTargetNode { channel: index, node: channel.node });
            }
        }
        Ok(())
    }

    /// Advance the playhead by `dt` seconds
    ///
    /// The time wraps by subtracting `end_time` once. A `dt` longer than the
    /// clip leaves the playhead past the end; that case is logged, not fixed.
    pub fn advance_time(&mut self, dt: f32) {
        self.current_time += dt;

        if self.end_time > 0.0 && self.current_time >= self.end_time {
            self.current_time -= self.end_time;
            if self.current_time >= self.end_time {
                warn!(
                    "Animation '{}' advanced by {}s, more than one loop of {}s; playhead left at {}",
                    self.name, dt, self.end_time, self.current_time
                );
            }
        }
    }

    /// Write every channel's value at the current time into the graph
    ///
    /// Channels whose keys do not enclose the current time leave their node
    /// untouched.
    pub fn apply(&self, graph: &mut SceneGraph) -> Result<(), AnimationError> {
        let time = self.current_time;

        for (index, channel) in self.channels.iter().enumerate() {
            let sampler = &self.samplers[channel.sampler];
            let Some((key, u)) = sampler.bracket(time) else {
                continue;
            };

            let node = graph
                .node_mut(channel.node)
                .map_err(|_| AnimationError::MissingTargetNode { channel: index, node: channel.node })?;

            match channel.path {
                ChannelPath::Translation => {
                    let value = sampler.sample_vec4(key, u);
                    node.set_translation(Vec3::new(value.x, value.y, value.z));
                }
                ChannelPath::Rotation => {
                    node.set_rotation(&sampler.sample_rotation(key, u));
                }
                ChannelPath::Scale => {
                    let value = sampler.sample_vec4(key, u);
                    node.set_scale(Vec3::new(value.x, value.y, value.z));
                }
            }
        }

        trace!("Animation '{}' applied at t={}", self.name, time);
        Ok(())
    }

    /// Advance the playhead and apply the channels
    pub fn advance(&mut self, dt: f32, graph: &mut SceneGraph) -> Result<(), AnimationError> {
        self.advance_time(dt);
        self.apply(graph)
    }
}
