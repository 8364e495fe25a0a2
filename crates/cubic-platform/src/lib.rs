// SPDX-License-Identifier: CEPL-1.0
#![deny(unsafe_op_in_unsafe_fn)]
//! winit glue: the event-loop thread publishes window state into
//! [`WindowSignals`], the render thread reads it through [`PlatformWindow`].

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

use anyhow::{Context, Result};
use cubic_present::{RenderSize, WindowTarget};
use tracing::{debug, info};
use winit::dpi::PhysicalSize;
use winit::event_loop::ActiveEventLoop;
use winit::window::{Fullscreen, Window};

pub use winit;

#[derive(Debug, Default)]
struct SignalState {
    size: RenderSize,
    /// Bumped on every delivered event.
    generation: u64,
    closing: bool,
    fullscreen_toggle: bool,
}

/// Window state shared between the event-loop thread and the render thread.
#[derive(Clone, Debug, Default)]
pub struct WindowSignals {
    inner: Arc<(Mutex<SignalState>, Condvar)>,
}

impl WindowSignals {
    pub fn new(size: RenderSize) -> Self {
        let signals = Self::default();
        signals.lock().size = size;
        signals
    }

    fn lock(&self) -> MutexGuard<'_, SignalState> {
        self.inner.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, update: impl FnOnce(&mut SignalState)) {
        let mut state = self.lock();
        update(&mut state);
        state.generation = state.generation.wrapping_add(1);
        drop(state);
        self.inner.1.notify_all();
    }

    pub fn resized(&self, size: RenderSize) {
        self.publish(|s| s.size = size);
    }

    /// Any other event that should wake a blocked waiter.
    pub fn poke(&self) {
        self.publish(|_| {});
    }

    pub fn request_close(&self) {
        self.publish(|s| s.closing = true);
    }

    /// Ask the render thread to flip fullscreen on its next frame.
    pub fn request_fullscreen_toggle(&self) {
        self.publish(|s| s.fullscreen_toggle = true);
    }

    /// Consume a pending fullscreen toggle request.
    pub fn take_fullscreen_toggle(&self) -> bool {
        std::mem::take(&mut self.lock().fullscreen_toggle)
    }

    pub fn size(&self) -> RenderSize {
        self.lock().size
    }

    pub fn is_closing(&self) -> bool {
        self.lock().closing
    }

    /// Block until the next event after this call, or until close.
    pub fn wait_for_event(&self) {
        let state = self.lock();
        let seen = state.generation;
        let _state = self
            .inner
            .1
            .wait_while(state, |s| s.generation == seen && !s.closing)
            .unwrap_or_else(PoisonError::into_inner);
    }
}

/// A winit window as seen by the presentation engine.
#[derive(Clone, Debug)]
pub struct PlatformWindow {
    window: Arc<Window>,
    signals: WindowSignals,
}

impl PlatformWindow {
    pub fn new(window: Arc<Window>, signals: WindowSignals) -> Self {
        Self { window, signals }
    }

    pub fn window(&self) -> &Arc<Window> {
        &self.window
    }

    pub fn signals(&self) -> &WindowSignals {
        &self.signals
    }
}

impl WindowTarget for PlatformWindow {
    fn framebuffer_size(&self) -> RenderSize {
        self.signals.size()
    }

    fn wait_events(&self) {
        debug!("render thread waiting on platform events");
        self.signals.wait_for_event();
    }

    fn set_fullscreen(&self, fullscreen: bool) {
        self.window
            .set_fullscreen(fullscreen.then_some(Fullscreen::Borderless(None)));
    }

    fn is_fullscreen(&self) -> bool {
        self.window.fullscreen().is_some()
    }

    fn closing(&self) -> bool {
        self.signals.is_closing()
    }
}

pub fn render_size(size: PhysicalSize<u32>) -> RenderSize {
    RenderSize::new(size.width, size.height)
}

/// Create the main window and the signals that mirror it.
pub fn create_window(
    event_loop: &ActiveEventLoop,
    title: &str,
    fullscreen: bool,
) -> Result<PlatformWindow> {
    let mut attrs = Window::default_attributes()
        .with_title(title)
        .with_inner_size(PhysicalSize::new(1280u32, 720u32));
    if fullscreen {
        attrs = attrs.with_fullscreen(Some(Fullscreen::Borderless(None)));
    }
    let window = event_loop.create_window(attrs).context("create_window")?;
    let size = render_size(window.inner_size());
    info!(width = size.width, height = size.height, "window created");
    Ok(PlatformWindow::new(Arc::new(window), WindowSignals::new(size)))
}
