// SPDX-License-Identifier: CEPL-1.0
#![deny(unsafe_op_in_unsafe_fn)]
//! Process-wide setup shared by the binaries.

use std::time::{Duration, Instant};

/// Compact fmt subscriber filtered by `RUST_LOG`. Safe to call twice.
pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};
    let _ = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .try_init();
}

/// Frames-per-second over one-second windows.
#[derive(Clone, Copy, Debug)]
pub struct FpsCounter {
    frames: u32,
    window_start: Instant,
}

impl FpsCounter {
    const WINDOW: Duration = Duration::from_secs(1);

    pub fn new(now: Instant) -> Self {
        Self {
            frames: 0,
            window_start: now,
        }
    }

    /// Count one presented frame. Returns the rate when a window closes.
    pub fn tick(&mut self, now: Instant) -> Option<u32> {
        self.frames = self.frames.saturating_add(1);
        if now.duration_since(self.window_start) < Self::WINDOW {
            return None;
        }
        let fps = self.frames;
        self.reset(now);
        tracing::info!("fps ~ {fps}");
        Some(fps)
    }

    /// Drop the partial window, e.g. after a stall while minimized.
    pub fn reset(&mut self, now: Instant) {
        self.frames = 0;
        self.window_start = now;
    }
}
