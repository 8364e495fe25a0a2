// SPDX-License-Identifier: CEPL-1.0
//! Scene-side data the presentation core consumes once per frame: the camera
//! matrices and the light list, plus the fixed-size GPU layout for lights.
mod camera;
mod light;

pub use camera::{Camera, ViewSource};
pub use light::{GpuLight, Light, LightBlock, LightKind, LightSource, LightingRig, MAX_LIGHTS};

pub use glam;
