// SPDX-License-Identifier: CEPL-1.0
use crate::RenderSize;

/// The window the engine presents into, as far as presentation cares.
pub trait WindowTarget {
    /// Current drawable size in pixels; zero in either dimension while minimized.
    fn framebuffer_size(&self) -> RenderSize;

    /// Block until at least one platform event has been delivered.
    fn wait_events(&self);

    fn set_fullscreen(&self, fullscreen: bool);

    /// Fullscreen state at engine creation.
    fn is_fullscreen(&self) -> bool {
        false
    }

    /// True once the user asked the window to close. Lets a minimized wait bail out.
    fn closing(&self) -> bool {
        false
    }
}
