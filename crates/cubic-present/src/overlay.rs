// SPDX-License-Identifier: CEPL-1.0
use tracing::trace;

use crate::device::GpuDevice;
use crate::error::GpuResult;

/// An immediate-mode UI drawn on top of the scene, inside the frame's render pass.
///
/// Every `begin_frame` is matched by exactly one `end_frame` on every path
/// through the frame, aborted ones included.
pub trait UiOverlay<D: GpuDevice> {
    fn begin_frame(&mut self);
    /// Finalize the frame's draw list.
    fn end_frame(&mut self);
    /// Record the finalized draw list. Called at most once per ended frame.
    fn render(&mut self, device: &D, cmd: D::CommandBuffer) -> GpuResult<()>;
}

/// Where the overlay is in its begin/end cycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum UiFrameState {
    #[default]
    NoFrame,
    FrameOpen,
    FrameClosed,
}

pub(crate) struct OverlayHost<D: GpuDevice> {
    overlay: Option<Box<dyn UiOverlay<D> + Send>>,
    state: UiFrameState,
}

impl<D: GpuDevice> OverlayHost<D> {
    pub(crate) fn new() -> Self {
        Self {
            overlay: None,
            state: UiFrameState::NoFrame,
        }
    }

    pub(crate) fn install(&mut self, overlay: Option<Box<dyn UiOverlay<D> + Send>>) {
        self.abort();
        self.overlay = overlay;
    }

    pub(crate) fn state(&self) -> UiFrameState {
        self.state
    }

    pub(crate) fn begin(&mut self) {
        let Some(overlay) = self.overlay.as_mut() else {
            return;
        };
        if self.state == UiFrameState::FrameOpen {
            overlay.end_frame();
        }
        overlay.begin_frame();
        self.state = UiFrameState::FrameOpen;
    }

    pub(crate) fn close(&mut self) {
        if self.state != UiFrameState::FrameOpen {
            return;
        }
        if let Some(overlay) = self.overlay.as_mut() {
            overlay.end_frame();
        }
        self.state = UiFrameState::FrameClosed;
    }

    /// Record a closed frame's draw list. The list is consumed either way.
    pub(crate) fn render(&mut self, device: &D, cmd: D::CommandBuffer) -> GpuResult<()> {
        if self.state != UiFrameState::FrameClosed {
            return Ok(());
        }
        self.state = UiFrameState::NoFrame;
        match self.overlay.as_mut() {
            Some(overlay) => overlay.render(device, cmd),
            None => Ok(()),
        }
    }

    /// Cleanup path: end an open frame and drop whatever was pending.
    pub(crate) fn abort(&mut self) {
        if self.state == UiFrameState::FrameOpen {
            trace!("force-ending open UI frame");
            if let Some(overlay) = self.overlay.as_mut() {
                overlay.end_frame();
            }
        }
        self.state = UiFrameState::NoFrame;
    }
}
