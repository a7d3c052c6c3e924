//! Render context
//!
//! Everything GPU-touching receives a [`RenderContext`] explicitly instead of
//! reaching for a global device.

use std::sync::Arc;

use crate::core::config::{RendererConfig, MAX_FRAMES_IN_FLIGHT};
use super::vulkan::{GpuAllocator, HostAllocator, VulkanError, VulkanResult};

/// Allocator plus frame pipelining depth
#[derive(Clone)]
pub struct RenderContext {
    /// Resource allocator
    pub allocator: Arc<dyn GpuAllocator>,
    frames_in_flight: usize,
}

impl RenderContext {
    /// Create a context; `frames_in_flight` must be in `1..=MAX_FRAMES_IN_FLIGHT`
    pub fn new(allocator: Arc<dyn GpuAllocator>, frames_in_flight: usize) -> VulkanResult<Self> {
        if frames_in_flight == 0 || frames_in_flight > MAX_FRAMES_IN_FLIGHT {
            return Err(VulkanError::InvalidOperation {
                reason: format!("frames in flight must be 1..={}, got {}", MAX_FRAMES_IN_FLIGHT, frames_in_flight),
            });
        }
        Ok(Self { allocator, frames_in_flight })
    }

    /// Create a context from renderer configuration
    pub fn from_config(allocator: Arc<dyn GpuAllocator>, config: &RendererConfig) -> VulkanResult<Self> {
        Self::new(allocator, config.frames_in_flight)
    }

    /// Context over a fresh [`HostAllocator`], returned alongside it
    pub fn headless(frames_in_flight: usize) -> VulkanResult<(Self, HostAllocator)> {
        let host = HostAllocator::new();
        let context = Self::new(Arc::new(host.clone()), frames_in_flight)?;
        Ok((context, host))
    }

    /// Frames the CPU may prepare ahead of the GPU
    pub fn frames_in_flight(&self) -> usize {
        self.frames_in_flight
    }

    /// Fail unless `frame` indexes a frame-in-flight slot
    pub fn check_frame(&self, frame: usize) -> VulkanResult<()> {
        if frame >= self.frames_in_flight {
            return Err(VulkanError::FrameIndexOutOfRange { frame, frames_in_flight: self.frames_in_flight });
        }
        Ok(())
    }
}

impl std::fmt::Debug for RenderContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderContext")
            .field("frames_in_flight", &self.frames_in_flight)
            .finish_non_exhaustive()
    }
}
