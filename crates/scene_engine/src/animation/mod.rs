//! Keyframe animation
//!
//! Samplers hold key tables, channels bind samplers to node properties and
//! an [`Animation`] advances a playhead and writes sampled values into the
//! scene graph.

pub mod channel;
pub mod clip;
pub mod sampler;

pub use channel::{Channel, ChannelPath};
pub use clip::Animation;
pub use sampler::{Interpolation, Sampler};

/// Animation construction and lookup errors
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum AnimationError {
    /// Interpolation name not recognized
    #[error("Unsupported interpolation: {0}")]
    UnsupportedInterpolation(String),

    /// Channel target path not supported (e.g. morph weights)
    #[error("Unsupported channel path: {0}")]
    UnsupportedPath(String),

    /// A channel names a sampler the clip does not have
    #[error("Channel {channel} uses sampler {sampler}, clip has {count}")]
    SamplerOutOfRange {
        /// Channel index
        channel: usize,
        /// Requested sampler
        sampler: usize,
        /// Samplers in the clip
        count: usize,
    },

    /// Sampler output count does not match its key count
    #[error("Sampler expects {expected} outputs, got {actual}")]
    OutputLengthMismatch {
        /// Outputs implied by the keys and interpolation
        expected: usize,
        /// Outputs supplied
        actual: usize,
    },

    /// Sampler key times decrease somewhere
    #[error("Sampler key times are not sorted")]
    InputsNotSorted,

    /// A channel targets a node that does not exist
    #[error("Channel {channel} targets missing node {node}")]
    MissingTargetNode {
        /// Channel index
        channel: usize,
        /// Missing node
        node: usize,
    },

    /// Animation index out of range
    #[error("Animation not found: {0}")]
    AnimationNotFound(usize),
}
