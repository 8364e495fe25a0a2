// SPDX-License-Identifier: CEPL-1.0
//! Backend-neutral presentation core.
//!
//! [`PresentationEngine`] drives the per-frame cycle (wait slot, acquire,
//! claim, record, submit, present, advance) against any [`GpuDevice`]
//! and keeps the image chain alive across resizes, minimization and
//! out-of-date surfaces.

mod chain;
mod config;
mod device;
mod engine;
mod error;
mod frame;
mod geometry;
mod in_flight;
mod memory;
mod overlay;
mod recorder;
mod upload;
mod uniforms;
mod window;

#[cfg(test)]
mod testing;

pub use chain::{
    choose_extent, choose_image_count, choose_present_mode, choose_surface_format, ImageChain,
};
pub use config::{PresentConfig, VsyncMode};
pub use device::{
    AcquiredImage, BufferUsage, ColorSpace, GpuDevice, ImageAspect, PipelineVariant, PixelFormat,
    PresentMode, PresentStatus, Submission, SurfaceCapabilities, SurfaceFormat, SwapchainDesc,
    Viewport, WAIT_FOREVER,
};
pub use engine::{FrameOutcome, FrameStats, FrameStep, PresentationEngine, RecreateHandle, SkipReason};
pub use error::{GpuError, GpuResult, RenderError};
pub use frame::{FrameSlot, FrameSlotRing, MAX_FRAMES_IN_FLIGHT};
pub use geometry::{validate_geometry, InstanceBuffer, UploadedGeometry, VERTEX_STRIDE};
pub use in_flight::ImagesInFlightTable;
pub use memory::{create_buffer, find_memory_type, DeviceBuffer, MemoryProperties, MemoryRequirements};
pub use overlay::{UiFrameState, UiOverlay};
pub use recorder::{DrawSummary, FrameConstants, MaterialConstants};
pub use upload::upload_to_device_local;
pub use window::WindowTarget;

/// Drawable size in physical pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct RenderSize {
    pub width: u32,
    pub height: u32,
}

impl RenderSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// A minimized window reports a zero dimension; nothing can be presented to it.
    pub fn is_zero(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn aspect(&self) -> f32 {
        if self.height == 0 {
            1.0
        } else {
            self.width as f32 / self.height as f32
        }
    }
}
