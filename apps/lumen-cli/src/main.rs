use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use glam::{Mat4, Vec4};
use lumen_camera::Camera;
use lumen_common::{FrameSummary, LumenConfig, RenderMode, StereoMode, Viewport};
use lumen_lights::{HostLightBuffer, LightPopulation};
use lumen_mesh::shapes;
use lumen_render::{DemoScene, FrameInput, RenderSequencer, SoftwareBackend};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "lumen-cli", about = "Headless tooling for the lumen renderer")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// YAML configuration file; defaults apply when absent
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    Forward,
    Deferred,
}

impl From<ModeArg> for RenderMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Forward => RenderMode::Forward,
            ModeArg::Deferred => RenderMode::Deferred,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Print version, effective settings and scene size
    Info,
    /// Print the effective configuration as YAML
    Config {
        /// Also write it to this file
        #[arg(short, long)]
        write: Option<PathBuf>,
    },
    /// Run the light population for a number of fixed-length frames
    Simulate {
        #[arg(short, long, default_value = "600")]
        frames: u32,
        /// Frame time in seconds
        #[arg(long, default_value = "0.016")]
        dt: f32,
        /// Report every N frames
        #[arg(long, default_value = "60")]
        every: u32,
    },
    /// Print camera matrices for the mono and stereo eyes
    Camera,
    /// Render one frame on the CPU backend
    Render {
        #[arg(long, default_value = "160")]
        width: u32,
        #[arg(long, default_value = "120")]
        height: u32,
        #[arg(short, long, value_enum, default_value = "deferred")]
        mode: ModeArg,
        /// Light simulation frames to run before rendering
        #[arg(long, default_value = "30")]
        warmup: u32,
        /// Write the frame as a binary PPM image
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    let config =
        LumenConfig::load_or_default(cli.config.as_deref()).context("loading configuration")?;

    match cli.command {
        Commands::Info => info(&config)?,
        Commands::Config { write } => {
            print!("{}", config.to_yaml_string()?);
            if let Some(path) = write {
                config
                    .save(&path)
                    .with_context(|| format!("writing {}", path.display()))?;
                println!("# written to {}", path.display());
            }
        }
        Commands::Simulate { frames, dt, every } => simulate(&config, frames, dt, every)?,
        Commands::Camera => camera(&config),
        Commands::Render {
            width,
            height,
            mode,
            warmup,
            output,
        } => render(&config, Viewport::new(width, height), mode.into(), warmup, output.as_deref())?,
    }

    Ok(())
}

fn info(config: &LumenConfig) -> anyhow::Result<()> {
    println!("lumen-cli v{}", env!("CARGO_PKG_VERSION"));
    println!(
        "window: {}x{} \"{}\"",
        config.window.width, config.window.height, config.window.title
    );
    println!(
        "lights: capacity={}, spawn={}/s, seed={:#x}",
        config.lights.capacity, config.lights.spawn_frequency, config.lights.rng_seed
    );
    println!("start mode: {}", config.render.start_mode.label());
    let level = shapes::level()?;
    let bounds = level.bounds();
    println!(
        "level: {} sub-meshes, {} vertices, {} triangles, radius {:.1}",
        level.sub_meshes().len(),
        level.num_vertices(),
        level.num_triangles(),
        bounds.radius
    );
    Ok(())
}

fn simulate(config: &LumenConfig, frames: u32, dt: f32, every: u32) -> anyhow::Result<()> {
    let mut population = LightPopulation::new(&config.lights);
    let mut buffer = HostLightBuffer::new(population.capacity());
    let every = every.max(1);
    println!("Simulating {frames} frames at dt={dt}s");
    for frame in 1..=frames {
        population.update(dt);
        population
            .upload(&mut buffer)
            .with_context(|| format!("uploading lights on frame {frame}"))?;
        if frame % every == 0 || frame == frames {
            let stats = population.stats();
            println!(
                "frame {frame:>6}: lights={:>6}/{} spawned={:>3}{}",
                stats.count,
                stats.capacity,
                stats.spawned_last_update,
                if stats.full { " (full)" } else { "" }
            );
        }
    }
    println!(
        "Uploaded {} lights in {} writes",
        buffer.lights().len(),
        buffer.upload_count()
    );
    Ok(())
}

fn print_matrix(name: &str, m: Mat4) {
    println!("  {name}:");
    for row in 0..4 {
        let r: Vec4 = m.row(row);
        println!("    [{:>10.4} {:>10.4} {:>10.4} {:>10.4}]", r.x, r.y, r.z, r.w);
    }
}

fn camera(config: &LumenConfig) {
    let viewport = Viewport::new(config.window.width, config.window.height);
    let mut camera = Camera::from_config(&config.camera, viewport.aspect());
    camera.update_matrices();
    let iod = config.stereo.interocular;
    let screen = config.stereo.screen_distance;
    for stereo in [StereoMode::Monoscopic, StereoMode::Left, StereoMode::Right] {
        let p = camera.position(stereo, iod);
        println!("{stereo:?}: position ({:.3}, {:.3}, {:.3})", p.x, p.y, p.z);
        print_matrix("view", camera.view_matrix(stereo, iod));
        print_matrix("projection", camera.projection_matrix(stereo, iod, screen));
        print_matrix(
            "view-projection",
            camera.view_projection_matrix(stereo, iod, screen),
        );
    }
}

fn render(
    config: &LumenConfig,
    viewport: Viewport,
    mode: RenderMode,
    warmup: u32,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    let mut population = LightPopulation::new(&config.lights);
    for _ in 0..warmup {
        population.update(1.0 / 60.0);
    }

    let mut camera = Camera::from_config(&config.camera, viewport.aspect());
    camera.update_matrices();

    let mut backend = SoftwareBackend::new(viewport, population.capacity());
    let mut sequencer = RenderSequencer::new(&mut backend, config.render.ambient_color)?;
    let scene = DemoScene::upload(&mut backend)?;
    let opaque = scene.opaque();
    let background = scene.background();
    let frame = FrameInput {
        camera: &camera,
        mode,
        lights: population.lights().as_slice(),
        opaque: &opaque,
        background: &background,
    };
    let report = sequencer.render_frame(&mut backend, &frame)?;

    let summary = FrameSummary {
        mode: report.mode,
        light_count: report.light_count,
        average_frame_time: None,
    };
    println!("{summary}");
    println!(
        "{}x{}: {} draw calls",
        viewport.width, viewport.height, report.draw_calls
    );

    if let Some(path) = output {
        std::fs::write(path, encode_ppm(viewport, backend.front_buffer()))
            .with_context(|| format!("writing {}", path.display()))?;
        println!("wrote {}", path.display());
    }
    Ok(())
}

/// Binary PPM (P6), colour clamped to [0, 1].
fn encode_ppm(viewport: Viewport, pixels: &[Vec4]) -> Vec<u8> {
    let mut bytes = format!("P6\n{} {}\n255\n", viewport.width, viewport.height).into_bytes();
    bytes.reserve(pixels.len() * 3);
    for p in pixels {
        let rgb = p.truncate().clamp(glam::Vec3::ZERO, glam::Vec3::ONE) * 255.0;
        bytes.extend_from_slice(&[rgb.x.round() as u8, rgb.y.round() as u8, rgb.z.round() as u8]);
    }
    bytes
}
