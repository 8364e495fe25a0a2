// SPDX-License-Identifier: CEPL-1.0
use crate::device::{ColorSpace, PixelFormat, SurfaceFormat};

/// Which vsync'd present mode to prefer when vsync is on.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum VsyncMode {
    /// Strict vsync, always available.
    Fifo,
    /// Low-latency vsync when supported, FIFO otherwise.
    #[default]
    Mailbox,
}

/// Knobs the engine reads at init and on every chain rebuild.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PresentConfig {
    pub clear_color: [f32; 4],
    pub vsync: bool,
    pub vsync_mode: VsyncMode,
    pub preferred_format: SurfaceFormat,
}

impl Default for PresentConfig {
    fn default() -> Self {
        Self {
            clear_color: [0.02, 0.02, 0.04, 1.0],
            vsync: true,
            vsync_mode: VsyncMode::Mailbox,
            preferred_format: SurfaceFormat {
                format: PixelFormat::Bgra8Srgb,
                color_space: ColorSpace::SrgbNonlinear,
            },
        }
    }
}
