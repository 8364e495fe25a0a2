// SPDX-License-Identifier: CEPL-1.0
#![deny(unsafe_op_in_unsafe_fn)]
mod config;
mod scene;

use std::thread::{self, JoinHandle};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use cubic_core::{init_tracing, FpsCounter};
use cubic_math::LightingRig;
use cubic_platform::{create_window, render_size, PlatformWindow};
use cubic_present::{
    FrameOutcome, MaterialConstants, PresentConfig, PresentationEngine, RecreateHandle,
    RenderError, SkipReason,
};
use cubic_present_vk::VkGpu;
use tracing::{debug, error, info};

use cubic_platform::winit::{
    application::ApplicationHandler,
    event::{ElementState, KeyEvent, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop, EventLoopProxy},
    keyboard::{KeyCode, PhysicalKey},
    window::WindowId,
};

use config::{AppCfg, Args};

/// Orbit speed of the demo camera, radians per second.
const ORBIT_SPEED: f32 = 0.4;
const GRID_SPACING: f32 = 2.0;

/// What the render thread needs to set up its scene.
struct SceneSetup {
    config: PresentConfig,
    material: MaterialConstants,
    instances: u32,
}

struct RenderThread {
    handle: JoinHandle<Result<()>>,
    /// Shared with the engine; requests made before it exists still count.
    recreate: RecreateHandle,
}

struct App {
    args: Args,
    cfg: AppCfg,
    window: Option<PlatformWindow>,
    render: Option<RenderThread>,
    /// Wakes the event loop when the render thread exits on its own.
    proxy: EventLoopProxy<()>,
    failure: Option<anyhow::Error>,
}

impl App {
    fn start(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let window = create_window(event_loop, "cubic", self.args.fullscreen)?;
        let gpu = {
            let w = window.window().as_ref();
            VkGpu::new(w, w, &self.cfg.render.shader_source()).context("vulkan init")?
        };

        let setup = SceneSetup {
            config: self.cfg.render.present_config(),
            material: self.cfg.render.material(),
            instances: self.args.instances,
        };
        info!(
            vsync = setup.config.vsync,
            mode = ?setup.config.vsync_mode,
            instances = setup.instances,
            "starting render thread"
        );

        let recreate = RecreateHandle::default();
        let engine_recreate = recreate.clone();
        let target = window.clone();
        let proxy = self.proxy.clone();
        let handle = thread::Builder::new()
            .name("render".into())
            .spawn(move || {
                let result = render_loop(gpu, target, setup, engine_recreate);
                let _ = proxy.send_event(());
                result
            })
            .context("spawn render thread")?;

        self.window = Some(window);
        self.render = Some(RenderThread { handle, recreate });
        Ok(())
    }

    /// Close the window signals, join the render thread, then drop the window.
    fn stop(&mut self) {
        if let Some(w) = &self.window {
            w.signals().request_close();
        }
        if let Some(render) = self.render.take() {
            match render.handle.join() {
                Ok(Ok(())) => info!("render thread stopped"),
                Ok(Err(e)) => {
                    error!("render thread failed: {e:#}");
                    self.failure = Some(e);
                }
                Err(_) => {
                    error!("render thread panicked");
                    self.failure = Some(anyhow::anyhow!("render thread panicked"));
                }
            }
        }
        self.window = None;
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        event_loop.set_control_flow(ControlFlow::Wait);
        if self.window.is_some() {
            return;
        }
        if let Err(e) = self.start(event_loop) {
            error!("startup failed: {e:#}");
            self.failure = Some(e);
            self.stop();
            event_loop.exit();
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        window_id: WindowId,
        event: WindowEvent,
    ) {
        let Some(window) = &self.window else {
            return;
        };
        if window_id != window.window().id() {
            return;
        }
        let signals = window.signals().clone();

        match event {
            WindowEvent::CloseRequested => {
                info!("CloseRequested");
                self.stop();
                event_loop.exit();
            }

            WindowEvent::Resized(new_size) => {
                let size = render_size(new_size);
                debug!("Resized → {}x{}", size.width, size.height);
                signals.resized(size);
                if let Some(render) = &self.render {
                    render.recreate.request();
                }
            }

            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(KeyCode::F11),
                        state: ElementState::Pressed,
                        repeat: false,
                        ..
                    },
                ..
            } => signals.request_fullscreen_toggle(),

            WindowEvent::RedrawRequested => {}

            _ => signals.poke(),
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        let finished = self
            .render
            .as_ref()
            .is_some_and(|r| r.handle.is_finished());
        if finished {
            self.stop();
            event_loop.exit();
        }
    }
}

fn render_loop(
    gpu: VkGpu,
    window: PlatformWindow,
    setup: SceneSetup,
    recreate: RecreateHandle,
) -> Result<()> {
    let signals = window.signals().clone();
    let mut engine = match PresentationEngine::with_recreate_handle(gpu, window, setup.config, recreate) {
        Ok(e) => e,
        // closed before the window ever became drawable
        Err(RenderError::ShutDown) => return Ok(()),
        Err(e) => return Err(e).context("create presentation engine"),
    };

    engine.set_material(setup.material);
    engine.set_geometry(&scene::cube_vertex_bytes(), &scene::CUBE_INDICES)?;
    engine.set_instances(&scene::instance_grid(setup.instances, GRID_SPACING))?;

    let mut camera = scene::demo_camera(setup.instances, GRID_SPACING);
    let rig = LightingRig::studio();
    let mut fps = FpsCounter::new(Instant::now());
    let mut last = Instant::now();

    while !signals.is_closing() {
        if signals.take_fullscreen_toggle() {
            engine.toggle_fullscreen();
        }

        let now = Instant::now();
        camera.orbit(now.duration_since(last).as_secs_f32() * ORBIT_SPEED);
        last = now;

        match engine.render_frame(&camera, &rig)? {
            FrameOutcome::Presented { .. } => {
                fps.tick(now);
            }
            FrameOutcome::Skipped(SkipReason::WindowClosed) => break,
            FrameOutcome::Skipped(SkipReason::ChainRecreated) => fps.reset(Instant::now()),
            FrameOutcome::Aborted(step) => debug!(?step, "frame aborted"),
        }
    }

    let stats = engine.stats();
    info!(
        presented = stats.frames_presented,
        skipped = stats.frames_skipped,
        aborted = stats.frames_aborted,
        recreates = stats.recreates,
        "render loop finished"
    );
    engine.shutdown()?;
    Ok(())
}

fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();
    let cfg = config::load_cfg(&args.config);
    let event_loop: EventLoop<()> = EventLoop::new()?;

    let mut app = App {
        args,
        cfg,
        window: None,
        render: None,
        proxy: event_loop.create_proxy(),
        failure: None,
    };

    event_loop.run_app(&mut app)?;
    app.stop();
    match app.failure {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
