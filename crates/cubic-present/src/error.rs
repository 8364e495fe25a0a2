// SPDX-License-Identifier: CEPL-1.0
use thiserror::Error;

use crate::memory::MemoryProperties;

pub type GpuResult<T> = Result<T, GpuError>;

/// Failure reported by a [`GpuDevice`](crate::GpuDevice) call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GpuError {
    #[error("image chain is out of date with the surface")]
    OutOfDate,
    #[error("device lost")]
    DeviceLost,
    #[error("surface lost")]
    SurfaceLost,
    #[error("out of host memory")]
    OutOfHostMemory,
    #[error("out of device memory")]
    OutOfDeviceMemory,
    #[error("no memory type in {type_bits:#034b} provides {required:?}")]
    NoSuitableMemoryType {
        type_bits: u32,
        required: MemoryProperties,
    },
    #[error("wait timed out")]
    Timeout,
    #[error("not ready")]
    NotReady,
    #[error("{0}")]
    Unexpected(String),
}

impl GpuError {
    /// Fatal errors leave nothing to retry against: the caller must shut down.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            GpuError::DeviceLost
                | GpuError::SurfaceLost
                | GpuError::OutOfHostMemory
                | GpuError::OutOfDeviceMemory
                | GpuError::NoSuitableMemoryType { .. }
        )
    }
}

/// Failure surfaced by [`PresentationEngine`](crate::PresentationEngine).
///
/// Per-frame problems that can be retried are not errors; they come back
/// as [`FrameOutcome::Aborted`](crate::FrameOutcome::Aborted).
#[derive(Debug, Error)]
pub enum RenderError {
    #[error(transparent)]
    Gpu(#[from] GpuError),
    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),
    #[error(
        "image chain bookkeeping diverged: {images} images, {views} views, \
         {framebuffers} framebuffers, {in_flight} in-flight entries"
    )]
    ChainInvariant {
        images: usize,
        views: usize,
        framebuffers: usize,
        in_flight: usize,
    },
    #[error("presentation engine has been shut down")]
    ShutDown,
}

impl RenderError {
    pub fn is_fatal(&self) -> bool {
        match self {
            RenderError::Gpu(e) => e.is_fatal(),
            RenderError::InvalidGeometry(_) => false,
            RenderError::ChainInvariant { .. } | RenderError::ShutDown => true,
        }
    }
}
