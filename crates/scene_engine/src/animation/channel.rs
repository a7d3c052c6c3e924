//! Animation channels

use std::str::FromStr;

use crate::scene::NodeIndex;
use super::AnimationError;

/// Node property driven by a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelPath {
    /// Local translation (xyz of the sampled vec4)
    Translation,
    /// Local rotation (quaternion stored as x, y, z, w)
    Rotation,
    /// Local scale (xyz of the sampled vec4)
    Scale,
}

impl FromStr for ChannelPath {
    type Err = AnimationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "translation" => Ok(Self::Translation),
            "rotation" => Ok(Self::Rotation),
            "scale" => Ok(Self::Scale),
            other => Err(AnimationError::UnsupportedPath(other.to_string())),
        }
    }
}

/// Binds one sampler to one node property
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Channel {
    /// Property written
    pub path: ChannelPath,
    /// Target node
    pub node: NodeIndex,
    /// Index into the animation's samplers
    pub sampler: usize,
}
