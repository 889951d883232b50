// SPDX-License-Identifier: CEPL-1.0
#![deny(unsafe_op_in_unsafe_fn)]
use std::f32::consts::TAU;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::Parser;
use prism_core::init_tracing;
use prism_math::{vec2, vec3, Transform2d};
use prism_platform::{PlatformWindow, WindowConfig};
use prism_render::scene::{sierpinski, triangle, MAX_SIERPINSKI_DEPTH};
use prism_render::{MeshArena, ObjectRegistry, Renderer, SimpleRenderSystem, SurfaceProvider};
use prism_render_vk::{GeometryBuffer, ShaderBinaries, VkBackend, VkVsyncMode};
use serde::Deserialize;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the TOML config file
    #[arg(long, default_value = "prism.toml")]
    config: PathBuf,
    /// Overrides `render.vsync_mode` from the config
    #[arg(long, value_enum)]
    vsync_mode: Option<VsyncMode>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
enum VsyncMode {
    Fifo,
    #[default]
    Mailbox,
}

impl From<VsyncMode> for VkVsyncMode {
    fn from(mode: VsyncMode) -> Self {
        match mode {
            VsyncMode::Fifo => VkVsyncMode::Fifo,
            VsyncMode::Mailbox => VkVsyncMode::Mailbox,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
struct WindowCfg {
    #[serde(default = "default_title")]
    title: String,
    #[serde(default = "default_width")]
    width: u32,
    #[serde(default = "default_height")]
    height: u32,
}

#[derive(Debug, Deserialize, Clone, Copy)]
struct RenderCfg {
    #[serde(default = "default_clear")]
    clear_color: [f32; 4],
    #[serde(default)]
    vsync_mode: VsyncMode,
    #[serde(default)]
    sierpinski_depth: u32,
}

#[derive(Debug, Deserialize, Clone, Default)]
struct ShaderCfg {
    vertex: Option<PathBuf>,
    fragment: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default)]
struct AppCfg {
    #[serde(default)]
    window: WindowCfg,
    #[serde(default)]
    render: RenderCfg,
    #[serde(default)]
    shaders: ShaderCfg,
}

impl Default for WindowCfg {
    fn default() -> Self {
        WindowCfg {
            title: default_title(),
            width: default_width(),
            height: default_height(),
        }
    }
}

impl Default for RenderCfg {
    fn default() -> Self {
        RenderCfg {
            clear_color: default_clear(),
            vsync_mode: VsyncMode::Mailbox,
            sierpinski_depth: 0,
        }
    }
}

fn default_title() -> String {
    "prism".into()
}
fn default_width() -> u32 {
    800
}
fn default_height() -> u32 {
    600
}
fn default_clear() -> [f32; 4] {
    [0.01, 0.01, 0.01, 1.0]
}

fn load_cfg(path: &Path) -> AppCfg {
    match fs::read_to_string(path) {
        Ok(s) => match toml::from_str::<AppCfg>(&s) {
            Ok(cfg) => cfg,
            Err(e) => {
                warn!("invalid config {}: {e}; using defaults", path.display());
                AppCfg::default()
            }
        },
        Err(e) => {
            warn!("cannot read config {}: {e}; using defaults", path.display());
            AppCfg::default()
        }
    }
}

impl ShaderCfg {
    fn binaries(&self) -> Result<ShaderBinaries> {
        match (&self.vertex, &self.fragment) {
            (None, None) => Ok(ShaderBinaries::embedded()?),
            (Some(vert), Some(frag)) => {
                info!("loading shaders {} + {}", vert.display(), frag.display());
                Ok(ShaderBinaries::load(vert, frag)?)
            }
            _ => bail!("[shaders] needs both `vertex` and `fragment`, or neither"),
        }
    }
}

fn spawn_scene(
    backend: &VkBackend,
    depth: u32,
    registry: &mut ObjectRegistry,
) -> Result<MeshArena<GeometryBuffer>> {
    let depth = if depth > MAX_SIERPINSKI_DEPTH {
        warn!("sierpinski_depth {depth} clamped to {MAX_SIERPINSKI_DEPTH}");
        MAX_SIERPINSKI_DEPTH
    } else {
        depth
    };
    let corners = triangle();
    let vertices = sierpinski(depth, corners[2], corners[1], corners[0]);

    let mut meshes = MeshArena::new();
    let mesh = meshes.insert(
        backend
            .create_mesh(&vertices)
            .context("uploading the shared mesh")?,
    );

    let scale = vec2(2.0, 0.5);
    for (x, turn, colour) in [
        (0.2, 0.25, vec3(0.1, 0.8, 0.1)),
        (-0.2, 0.5, vec3(0.8, 0.1, 0.1)),
        (-0.7, 0.75, vec3(0.1, 0.1, 0.8)),
    ] {
        registry.spawn(mesh, colour, Transform2d::new(vec2(x, 0.0), scale, turn * TAU));
    }
    info!(
        "scene: {} objects sharing one mesh of {} vertices",
        registry.len(),
        vertices.len()
    );
    Ok(meshes)
}

fn run(args: Args) -> Result<()> {
    let cfg = load_cfg(&args.config);
    let vsync_mode = args.vsync_mode.unwrap_or(cfg.render.vsync_mode);
    info!("vsync_mode = {vsync_mode:?}");

    let mut window = PlatformWindow::new(WindowConfig {
        title: cfg.window.title.clone(),
        width: cfg.window.width,
        height: cfg.window.height,
    })
    .context("creating the window")?;

    let shaders = cfg.shaders.binaries().context("loading shaders")?;
    let backend =
        VkBackend::new(&window, shaders, vsync_mode.into()).context("vulkan init")?;

    let mut registry = ObjectRegistry::new();
    let meshes = spawn_scene(&backend, cfg.render.sierpinski_depth, &mut registry)?;

    let mut renderer = Renderer::new(backend, &mut window).context("building the swapchain")?;
    renderer.set_clear_colour(cfg.render.clear_color);

    let system = SimpleRenderSystem::new();
    let mut frames: u32 = 0;
    let mut last_fps_instant = Instant::now();

    while !window.should_close() {
        window.poll_events();

        if let Some(cmd) = renderer.begin_frame(&mut window)? {
            renderer.begin_render_pass(cmd);
            system.render_objects(&renderer, cmd, registry.objects_mut(), &meshes);
            renderer.end_render_pass(cmd);
            renderer.end_frame(&mut window)?;
            frames = frames.saturating_add(1);
        }

        let now = Instant::now();
        if now.duration_since(last_fps_instant).as_secs_f32() >= 1.0 {
            info!("fps ~ {}", frames);
            frames = 0;
            last_fps_instant = now;
        }
    }

    info!("close requested after {} swapchain rebuilds", renderer.rebuild_count());
    renderer.wait_idle().context("waiting for the device")?;

    // Meshes keep the device context alive; release them and the renderer
    // before the window the surface was created from.
    registry.clear();
    drop(meshes);
    drop(renderer);
    drop(window);
    Ok(())
}

fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();
    run(args).inspect_err(|e| error!("fatal: {e:#}"))
}
