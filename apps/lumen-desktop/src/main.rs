use anyhow::{Context, Result};
use clap::Parser;
use lumen_camera::{Camera, CameraBindings};
use lumen_common::{FrameStats, FrameSummary, LumenConfig, RenderMode, Viewport};
use lumen_input::{Action, ActionMap, Key, KeyState};
use lumen_lights::LightPopulation;
use lumen_render::{DemoScene, FrameInput, RenderError, RenderSequencer};
use lumen_render_wgpu::{BackendOptions, WgpuBackend};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing_subscriber::EnvFilter;
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::{KeyEvent, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowId};

/// Longest step fed to camera control after a stall, in seconds.
const MAX_CONTROL_STEP: f32 = 0.1;

#[derive(Parser)]
#[command(name = "lumen-desktop", about = "Forward and deferred lighting viewer")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// YAML configuration file; defaults apply when absent
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn map_key(code: KeyCode) -> Option<Key> {
    let key = match code {
        KeyCode::ArrowUp => Key::Up,
        KeyCode::ArrowDown => Key::Down,
        KeyCode::ArrowLeft => Key::Left,
        KeyCode::ArrowRight => Key::Right,
        KeyCode::KeyW => Key::W,
        KeyCode::KeyA => Key::A,
        KeyCode::KeyS => Key::S,
        KeyCode::KeyD => Key::D,
        KeyCode::Backspace => Key::Backspace,
        KeyCode::Escape => Key::Escape,
        KeyCode::Space => Key::Space,
        _ => return None,
    };
    Some(key)
}

/// Simulation state, independent of the window and GPU.
struct AppState {
    config: LumenConfig,
    camera: Camera,
    bindings: CameraBindings,
    lights: LightPopulation,
    keys: KeyState,
    actions: ActionMap,
    mode: RenderMode,
    stats: FrameStats,
    last_frame: Instant,
}

impl AppState {
    fn new(config: LumenConfig) -> Self {
        let viewport = Viewport::new(config.window.width, config.window.height);
        Self {
            camera: Camera::from_config(&config.camera, viewport.aspect()),
            bindings: CameraBindings::default(),
            lights: LightPopulation::new(&config.lights),
            keys: KeyState::new(),
            actions: ActionMap::default(),
            mode: config.render.start_mode,
            stats: FrameStats::new(config.render.stats_period),
            last_frame: Instant::now(),
            config,
        }
    }

    /// Advance input, camera and lights by one frame. Returns `false` when
    /// the user asked to quit.
    fn update(&mut self, dt: f32) -> bool {
        let mut keep_running = true;
        for action in self.actions.triggered(&self.keys) {
            match action {
                Action::ToggleRenderMode => {
                    self.mode.toggle();
                    tracing::info!(mode = self.mode.label(), "render mode toggled");
                }
                Action::Quit => keep_running = false,
            }
        }
        // Only camera motion is clamped; lights see the real elapsed time
        self.camera
            .control(dt.min(MAX_CONTROL_STEP), &self.keys, &self.bindings);
        self.camera.update_matrices();
        self.lights.update(dt);
        keep_running
    }

    fn summary(&self) -> FrameSummary {
        FrameSummary {
            mode: self.mode,
            light_count: self.lights.count(),
            average_frame_time: self.stats.average(),
        }
    }
}

/// Everything that exists only while a window is open.
struct Gpu {
    window: Arc<Window>,
    backend: WgpuBackend,
    sequencer: RenderSequencer,
    scene: DemoScene,
}

struct LumenApp {
    state: AppState,
    gpu: Option<Gpu>,
}

impl LumenApp {
    fn new(config: LumenConfig) -> Self {
        Self {
            state: AppState::new(config),
            gpu: None,
        }
    }

    fn init_gpu(&self, event_loop: &ActiveEventLoop) -> Result<Gpu> {
        let window_config = &self.state.config.window;
        let attrs = Window::default_attributes()
            .with_title(window_config.title.clone())
            .with_inner_size(PhysicalSize::new(window_config.width, window_config.height));
        let window = Arc::new(
            event_loop
                .create_window(attrs)
                .context("creating window")?,
        );

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });
        let surface = instance
            .create_surface(window.clone())
            .context("creating surface")?;

        let size = window.inner_size();
        let options = BackendOptions {
            viewport: Viewport::new(size.width, size.height),
            light_capacity: self.state.lights.capacity(),
            vsync: window_config.vsync,
        };
        let mut backend = pollster::block_on(WgpuBackend::new(&instance, surface, options))
            .context("initialising wgpu backend")?;
        let sequencer = RenderSequencer::new(&mut backend, self.state.config.render.ambient_color)
            .context("allocating G-buffer")?;
        let scene = DemoScene::upload(&mut backend).context("uploading scene")?;

        Ok(Gpu {
            window,
            backend,
            sequencer,
            scene,
        })
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        let now = Instant::now();
        let dt = (now - self.state.last_frame).as_secs_f32();
        self.state.last_frame = now;

        if !self.state.update(dt) {
            event_loop.exit();
            return;
        }

        let Some(gpu) = self.gpu.as_mut() else {
            return;
        };
        let opaque = gpu.scene.opaque();
        let background = gpu.scene.background();
        let frame = FrameInput {
            camera: &self.state.camera,
            mode: self.state.mode,
            lights: self.state.lights.lights().as_slice(),
            opaque: &opaque,
            background: &background,
        };
        match gpu.sequencer.render_frame(&mut gpu.backend, &frame) {
            Ok(report) => tracing::trace!(
                lights = report.light_count,
                draws = report.draw_calls,
                "frame rendered"
            ),
            Err(RenderError::Surface(reason)) => {
                tracing::warn!("frame dropped: {reason}");
            }
            Err(e) => {
                tracing::error!("render failed: {e}");
                event_loop.exit();
                return;
            }
        }

        if self.state.stats.record(dt) {
            gpu.window.set_title(&self.state.summary().to_string());
        }
        self.state.keys.end_frame();
    }
}

impl ApplicationHandler for LumenApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.gpu.is_some() {
            return;
        }
        match self.init_gpu(event_loop) {
            Ok(gpu) => {
                let size = gpu.window.inner_size();
                self.state
                    .camera
                    .set_aspect(Viewport::new(size.width, size.height).aspect());
                self.gpu = Some(gpu);
                tracing::info!("GPU initialized");
            }
            Err(e) => {
                tracing::error!("initialisation failed: {e:#}");
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::Resized(size) => {
                let viewport = Viewport::new(size.width, size.height);
                self.state.camera.set_aspect(viewport.aspect());
                if let Some(gpu) = self.gpu.as_mut() {
                    gpu.backend.resize(viewport);
                }
            }
            WindowEvent::Focused(false) => self.state.keys.release_all(),
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(code),
                        state,
                        ..
                    },
                ..
            } => {
                if let Some(key) = map_key(code) {
                    self.state.keys.handle_key(key, state.is_pressed());
                }
            }
            WindowEvent::RedrawRequested => self.redraw(event_loop),
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(gpu) = &self.gpu {
            gpu.window.request_redraw();
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    let config =
        LumenConfig::load_or_default(cli.config.as_deref()).context("loading configuration")?;
    tracing::info!(
        capacity = config.lights.capacity,
        mode = config.render.start_mode.label(),
        "lumen-desktop starting"
    );

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = LumenApp::new(config);
    event_loop.run_app(&mut app)?;

    Ok(())
}
