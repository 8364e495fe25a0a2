// SPDX-License-Identifier: CEPL-1.0
use std::sync::Arc;
use std::time::Instant;

use cubic_math::glam::Mat4;
use cubic_math::{LightBlock, LightSource, ViewSource, MAX_LIGHTS};
use portable_atomic::{AtomicBool, Ordering};
use tracing::{debug, error, info, warn};

use crate::chain::ImageChain;
use crate::config::PresentConfig;
use crate::device::{GpuDevice, PresentStatus, Submission, WAIT_FOREVER};
use crate::error::{GpuError, RenderError};
use crate::frame::{FrameSlotRing, MAX_FRAMES_IN_FLIGHT};
use crate::geometry::{validate_geometry, InstanceBuffer, UploadedGeometry};
use crate::in_flight::ImagesInFlightTable;
use crate::overlay::{OverlayHost, UiFrameState, UiOverlay};
use crate::recorder::{record_frame, DrawSummary, FrameConstants, FrameRecording, MaterialConstants};
use crate::uniforms::LightUniforms;
use crate::window::WindowTarget;
use crate::RenderSize;


/// Shareable "rebuild the image chain before the next frame" flag.
///
/// Setting it any number of times between frames causes one rebuild.
#[derive(Clone, Debug, Default)]
pub struct RecreateHandle(Arc<AtomicBool>);

impl RecreateHandle {
    pub fn request(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_pending(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    fn take(&self) -> bool {
        self.0.swap(false, Ordering::AcqRel)
    }

    fn clear(&self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Stage of the frame cycle, used to report where a frame was abandoned.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameStep {
    WaitSlot,
    AcquireImage,
    ClaimImage,
    Record,
    Submit,
    Present,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkipReason {
    /// The chain was rebuilt instead of drawing.
    ChainRecreated,
    /// The window closed while minimized.
    WindowClosed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameOutcome {
    Presented { slot: usize, image_index: u32 },
    Skipped(SkipReason),
    /// The frame was dropped after a recoverable error; try again next frame.
    Aborted(FrameStep),
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FrameStats {
    pub frames_presented: u64,
    pub frames_skipped: u64,
    pub frames_aborted: u64,
    pub recreates: u64,
    pub last_frame_ms: f32,
}

struct FrameFailure {
    step: FrameStep,
    error: GpuError,
}

trait AtStep<T> {
    fn at(self, step: FrameStep) -> Result<T, FrameFailure>;
}

impl<T> AtStep<T> for Result<T, GpuError> {
    fn at(self, step: FrameStep) -> Result<T, FrameFailure> {
        self.map_err(|error| FrameFailure { step, error })
    }
}

/// How far the current frame got; drives cleanup when it is abandoned.
#[derive(Default)]
struct FrameProgress {
    acquired: Option<u32>,
    fence_reset: bool,
    submitted: bool,
}

/// Owns the image chain, frame slots and scene buffers, and presents one
/// frame per [`render_frame`](Self::render_frame) call.
pub struct PresentationEngine<D: GpuDevice, W: WindowTarget> {
    device: D,
    window: W,
    config: PresentConfig,
    chain: ImageChain<D>,
    ring: FrameSlotRing<D>,
    images_in_flight: ImagesInFlightTable<D>,
    lights: LightUniforms<D>,
    geometry: Option<UploadedGeometry<D>>,
    instances: Option<InstanceBuffer<D>>,
    material: MaterialConstants,
    overlay: OverlayHost<D>,
    recreate: RecreateHandle,
    stats: FrameStats,
    last_draw: Option<DrawSummary>,
    lights_dropped: usize,
    shut_down: bool,
}

impl<D: GpuDevice, W: WindowTarget> PresentationEngine<D, W> {
    /// Build the chain and per-frame state for `window`. Blocks while the
    /// window is minimized.
    pub fn new(device: D, window: W, config: PresentConfig) -> Result<Self, RenderError> {
        Self::with_recreate_handle(device, window, config, RecreateHandle::default())
    }

    /// Like [`new`](Self::new), but rebuild requests go through `recreate`,
    /// which may already have been handed to another thread. A request made
    /// before construction is honored by the first frame.
    pub fn with_recreate_handle(
        mut device: D,
        window: W,
        config: PresentConfig,
        recreate: RecreateHandle,
    ) -> Result<Self, RenderError> {
        let size = match drawable_size(&window) {
            Some(s) => s,
            None => return Err(RenderError::ShutDown),
        };

        let mut chain = ImageChain::create(&mut device, size, &config, None)?;
        let ring = match FrameSlotRing::create(&device) {
            Ok(r) => r,
            Err(e) => {
                chain.destroy(&device);
                return Err(e.into());
            }
        };
        let lights = match LightUniforms::create(&device, MAX_FRAMES_IN_FLIGHT) {
            Ok(l) => l,
            Err(e) => {
                let mut ring = ring;
                ring.destroy(&device);
                chain.destroy(&device);
                return Err(e.into());
            }
        };

        let mut engine = Self {
            images_in_flight: ImagesInFlightTable::new(chain.image_count()),
            device,
            window,
            config,
            chain,
            ring,
            lights,
            geometry: None,
            instances: None,
            material: MaterialConstants::default(),
            overlay: OverlayHost::new(),
            recreate,
            stats: FrameStats::default(),
            last_draw: None,
            lights_dropped: 0,
            shut_down: false,
        };
        engine.heal_chain(size)?;
        info!(
            slots = MAX_FRAMES_IN_FLIGHT,
            images = engine.chain.image_count(),
            "presentation engine ready"
        );
        Ok(engine)
    }

    /// Run one frame: wait slot, acquire, claim, record, submit, present, advance.
    ///
    /// Recoverable failures come back as `Ok(Aborted)` or `Ok(Skipped)`; the
    /// slot index only moves on `Ok(Presented)`. `Err` is fatal.
    pub fn render_frame(
        &mut self,
        view: &dyn ViewSource,
        lights: &dyn LightSource,
    ) -> Result<FrameOutcome, RenderError> {
        if self.shut_down {
            return Err(RenderError::ShutDown);
        }
        let started = Instant::now();

        if self.recreate.take() {
            if let Some(outcome) = self.recreate_chain()? {
                self.stats.frames_skipped += 1;
                return Ok(outcome);
            }
        }

        let mut progress = FrameProgress::default();
        let outcome = match self.run_frame(view, lights, &mut progress) {
            Ok(outcome) => outcome,
            Err(failure) => self.abandon_frame(failure, &progress)?,
        };

        match outcome {
            FrameOutcome::Presented { .. } => self.stats.frames_presented += 1,
            FrameOutcome::Skipped(_) => self.stats.frames_skipped += 1,
            FrameOutcome::Aborted(_) => self.stats.frames_aborted += 1,
        }
        self.stats.last_frame_ms = started.elapsed().as_secs_f32() * 1000.0;
        Ok(outcome)
    }

    fn run_frame(
        &mut self,
        view: &dyn ViewSource,
        lights: &dyn LightSource,
        progress: &mut FrameProgress,
    ) -> Result<FrameOutcome, FrameFailure> {
        let slot_index = self.ring.current_index();
        let slot = self.ring.current();
        let (cmd, image_available, render_finished, fence) = (
            slot.command_buffer,
            slot.image_available,
            slot.render_finished,
            slot.in_flight,
        );

        self.device
            .wait_fence(fence, WAIT_FOREVER)
            .at(FrameStep::WaitSlot)?;
        self.overlay.begin();

        let acquired = self
            .device
            .acquire_next_image(self.chain.swapchain(), image_available, WAIT_FOREVER)
            .at(FrameStep::AcquireImage)?;
        let image_index = acquired.index;
        progress.acquired = Some(image_index);
        if acquired.suboptimal {
            debug!(image_index, "acquired suboptimal image; rebuilding after this frame");
            self.recreate.request();
        }

        self.images_in_flight
            .claim(&self.device, image_index, fence)
            .at(FrameStep::ClaimImage)?;
        self.device.reset_fence(fence).at(FrameStep::ClaimImage)?;
        progress.fence_reset = true;

        let (block, dropped) = LightBlock::pack(lights.lights());
        if dropped != self.lights_dropped {
            if dropped > 0 {
                warn!(dropped, max = MAX_LIGHTS, "light list truncated");
            }
            self.lights_dropped = dropped;
        }
        self.lights
            .write(&self.device, slot_index, &block)
            .at(FrameStep::Record)?;

        let framebuffer = self.chain.framebuffer(image_index).ok_or_else(|| FrameFailure {
            step: FrameStep::Record,
            error: GpuError::Unexpected(format!("no framebuffer for image {image_index}")),
        })?;
        self.overlay.close();
        let extent = self.chain.extent();
        let view_projection = view.view_projection_for(extent.width, extent.height);
        let recording = FrameRecording {
            framebuffer,
            extent,
            clear_color: self.config.clear_color,
            lights: self.lights.set(slot_index),
            geometry: self.geometry.as_ref(),
            instances: self.instances.as_ref(),
            constants: FrameConstants::new(view_projection, &self.material),
        };
        let drawn = record_frame(&self.device, cmd, &recording, &mut self.overlay)
            .at(FrameStep::Record)?;

        self.device
            .submit(&Submission {
                command_buffer: cmd,
                wait: Some(image_available),
                signal: Some(render_finished),
                fence: Some(fence),
            })
            .at(FrameStep::Submit)?;
        progress.submitted = true;
        self.last_draw = drawn;

        match self
            .device
            .present(self.chain.swapchain(), image_index, render_finished)
            .at(FrameStep::Present)?
        {
            PresentStatus::Optimal => {}
            status => {
                debug!(?status, "present reports chain mismatch; rebuilding next frame");
                self.recreate.request();
            }
        }

        self.ring.advance();
        Ok(FrameOutcome::Presented {
            slot: slot_index,
            image_index,
        })
    }

    /// Single cleanup path for a frame that did not reach Advance.
    fn abandon_frame(
        &mut self,
        failure: FrameFailure,
        progress: &FrameProgress,
    ) -> Result<FrameOutcome, RenderError> {
        self.overlay.abort();

        if failure.error.is_fatal() {
            error!(step = ?failure.step, error = %failure.error, "fatal device error");
            return Err(failure.error.into());
        }

        if failure.step == FrameStep::AcquireImage && failure.error == GpuError::OutOfDate {
            info!("image chain out of date at acquire; rebuilding");
            return Ok(self
                .recreate_chain()?
                .unwrap_or(FrameOutcome::Skipped(SkipReason::ChainRecreated)));
        }

        warn!(step = ?failure.step, error = %failure.error, "frame aborted");
        if progress.acquired.is_some() {
            // The acquired image never reached present; only retiring the
            // chain hands it back. The slot's semaphores may be left signaled
            // with no waiter, and its fence reset with nothing to signal it.
            let rebuilt = self.recreate_chain()?;
            let replace_fence = progress.fence_reset && !progress.submitted;
            if let Some(retired) = self.ring.rearm_current(&self.device, replace_fence)? {
                self.images_in_flight.forget(retired);
            }
            if let Some(outcome) = rebuilt {
                return Ok(outcome);
            }
        }
        Ok(FrameOutcome::Aborted(failure.step))
    }

    /// Rebuild the chain for the current window size. Returns a skip outcome
    /// when the window closed while we waited for it to become drawable.
    fn recreate_chain(&mut self) -> Result<Option<FrameOutcome>, RenderError> {
        self.device.wait_idle()?;
        let Some(size) = drawable_size(&self.window) else {
            info!("window closed while minimized");
            return Ok(Some(FrameOutcome::Skipped(SkipReason::WindowClosed)));
        };

        self.rebuild(size)?;
        self.heal_chain(size)?;
        self.recreate.clear();
        Ok(None)
    }

    /// Reconcile the bookkeeping with the chain. If it still disagrees the
    /// chain is rebuilt once; a second disagreement is fatal.
    fn heal_chain(&mut self, size: RenderSize) -> Result<(), RenderError> {
        if let Err(err) = self.check_chain() {
            warn!(%err, "rebuilding image chain once more");
            self.rebuild(size)?;
            self.check_chain()?;
        }
        Ok(())
    }

    fn rebuild(&mut self, size: RenderSize) -> Result<(), RenderError> {
        self.chain.recreate(&mut self.device, size, &self.config)?;
        self.images_in_flight.reset(self.chain.image_count());
        self.stats.recreates += 1;
        Ok(())
    }

    fn check_chain(&mut self) -> Result<(), RenderError> {
        self.chain.reconcile(&mut self.images_in_flight)
    }

    /// Replace the mesh. Empty input removes it; frames then only clear.
    pub fn set_geometry(&mut self, vertex_bytes: &[u8], indices: &[u32]) -> Result<(), RenderError> {
        self.ensure_live()?;
        validate_geometry(vertex_bytes, indices)?;
        self.device.wait_idle()?;
        if let Some(old) = self.geometry.take() {
            old.destroy(&self.device);
        }
        if vertex_bytes.is_empty() || indices.is_empty() {
            debug!("geometry cleared");
            return Ok(());
        }
        self.geometry = Some(UploadedGeometry::upload(&self.device, vertex_bytes, indices)?);
        Ok(())
    }

    /// Replace the per-instance transforms. Empty input goes back to a
    /// single non-instanced draw.
    pub fn set_instances(&mut self, transforms: &[Mat4]) -> Result<(), RenderError> {
        self.ensure_live()?;
        self.device.wait_idle()?;
        if let Some(old) = self.instances.take() {
            old.destroy(&self.device);
        }
        if transforms.is_empty() {
            debug!("instancing disabled");
            return Ok(());
        }
        self.instances = Some(InstanceBuffer::upload(&self.device, transforms)?);
        Ok(())
    }

    pub fn set_material(&mut self, material: MaterialConstants) {
        self.material = material;
    }

    pub fn material(&self) -> MaterialConstants {
        self.material
    }

    pub fn set_clear_color(&mut self, rgba: [f32; 4]) {
        self.config.clear_color = rgba;
    }

    /// Takes effect at the next chain rebuild, which this schedules.
    pub fn set_vsync(&mut self, on: bool) {
        if self.config.vsync != on {
            self.config.vsync = on;
            self.request_recreate();
        }
    }

    pub fn set_overlay(&mut self, overlay: Box<dyn UiOverlay<D> + Send>) {
        self.overlay.install(Some(overlay));
    }

    pub fn clear_overlay(&mut self) {
        self.overlay.install(None);
    }

    pub fn request_recreate(&self) {
        self.recreate.request();
    }

    /// A handle other threads can use to request a rebuild.
    pub fn recreate_handle(&self) -> RecreateHandle {
        self.recreate.clone()
    }

    /// Flip fullscreen relative to the window's actual state and schedule a
    /// rebuild. Returns the requested state.
    pub fn toggle_fullscreen(&mut self) -> bool {
        let fullscreen = !self.window.is_fullscreen();
        info!(fullscreen, "toggling fullscreen");
        self.window.set_fullscreen(fullscreen);
        self.request_recreate();
        fullscreen
    }

    pub fn current_frame_index(&self) -> usize {
        self.ring.current_index()
    }

    pub fn extent(&self) -> RenderSize {
        self.chain.extent()
    }

    pub fn image_count(&self) -> usize {
        self.chain.image_count()
    }

    pub fn stats(&self) -> FrameStats {
        self.stats
    }

    pub fn last_draw(&self) -> Option<DrawSummary> {
        self.last_draw
    }

    pub fn ui_state(&self) -> UiFrameState {
        self.overlay.state()
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn window(&self) -> &W {
        &self.window
    }

    fn ensure_live(&self) -> Result<(), RenderError> {
        if self.shut_down {
            Err(RenderError::ShutDown)
        } else {
            Ok(())
        }
    }

    /// Wait for the GPU and release everything in reverse creation order.
    pub fn shutdown(mut self) -> Result<(), RenderError> {
        self.teardown()
    }

    fn teardown(&mut self) -> Result<(), RenderError> {
        if self.shut_down {
            return Ok(());
        }
        self.shut_down = true;
        self.overlay.install(None);
        let idle = self.device.wait_idle();
        if let Err(e) = &idle {
            error!(error = %e, "wait_idle failed during shutdown; releasing anyway");
        }

        if let Some(g) = self.instances.take() {
            g.destroy(&self.device);
        }
        if let Some(g) = self.geometry.take() {
            g.destroy(&self.device);
        }
        self.lights.destroy(&self.device);
        self.ring.destroy(&self.device);
        self.images_in_flight.reset(0);
        self.chain.destroy(&self.device);
        info!(
            presented = self.stats.frames_presented,
            recreates = self.stats.recreates,
            "presentation engine shut down"
        );
        idle.map_err(Into::into)
    }
}

impl<D: GpuDevice, W: WindowTarget> Drop for PresentationEngine<D, W> {
    fn drop(&mut self) {
        let _ = self.teardown();
    }
}

/// The window's drawable size, blocking on platform events while it is
/// minimized. `None` if the window closes first.
fn drawable_size<W: WindowTarget>(window: &W) -> Option<RenderSize> {
    let mut size = window.framebuffer_size();
    if size.is_zero() {
        info!("window minimized; waiting for a drawable size");
    }
    while size.is_zero() {
        if window.closing() {
            return None;
        }
        window.wait_events();
        size = window.framebuffer_size();
    }
    Some(size)
}
