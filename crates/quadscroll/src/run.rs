use anyhow::{bail, Context, Result};
use renderer::{
    colored_quad, scrolling_texture, ClearColor, DecodedImage, RenderPolicy, Renderer,
    RendererConfig, SceneSpec, ScrollAnimation,
};
use sceneconfig::{SceneConfig, SceneKind};
use tracing_subscriber::EnvFilter;

use crate::cli::Cli;
use crate::loader::{load_image, load_shader};

const DEFAULT_FILTER: &str = "warn,quadscroll=info,renderer=info,naga=error,wgpu=error,wgpu_core=error,wgpu_hal=error";
const DEFAULT_SURFACE: (u32, u32) = (400, 300);

pub fn initialise_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

pub fn run(args: Cli) -> Result<()> {
    let file = match &args.config {
        Some(path) => SceneConfig::load(path)
            .with_context(|| format!("failed to load scene file {}", path.display()))?,
        None => SceneConfig::default(),
    };
    let config = renderer_config(&args, merge(&args, file)?)?;
    let mut renderer = Renderer::new(config);

    if args.check {
        renderer.check().context("shader check failed")?;
        println!("{}: shaders compiled and linked", renderer.config().scene.name);
        return Ok(());
    }
    renderer.run()
}

/// Command-line flags layered over the scene file. The merged result is
/// checked as a whole, so either source may supply the image.
fn merge(args: &Cli, file: SceneConfig) -> Result<SceneConfig> {
    let image = args.image.clone().or(file.image);
    let scene = args
        .scene
        .or(file.scene)
        .or_else(|| image.as_ref().map(|_| SceneKind::ScrollingTexture));
    if let (Some(SceneKind::ColoredQuad), Some(path)) = (scene, &image) {
        bail!(
            "image {} cannot be used with scene '{}'",
            path.display(),
            SceneKind::ColoredQuad
        );
    }
    let merged = SceneConfig {
        scene,
        image,
        vertex_shader: args.vertex.clone().or(file.vertex_shader),
        fragment_shader: args.fragment.clone().or(file.fragment_shader),
        time_scale: args.time_scale.or(file.time_scale),
        scroll: file.scroll,
        clear_color: file.clear_color,
        fps: args.fps.or(file.fps),
        size: args.size.or(file.size),
        title: file.title,
    };
    if args.check {
        merged.validate_fields()?;
    } else {
        merged.validate()?;
    }
    Ok(merged)
}

fn renderer_config(args: &Cli, settings: SceneConfig) -> Result<RendererConfig> {
    let kind = settings.scene_kind();
    let scene = match kind {
        SceneKind::ColoredQuad => colored_quad(),
        SceneKind::ScrollingTexture => {
            let image = match &settings.image {
                Some(path) => load_image(path)?,
                None if args.check => placeholder_image()?,
                None => bail!("scene '{kind}' requires --image or an image in the scene file"),
            };
            scrolling_texture(image, animation(&settings))
        }
    };
    let scene = customise(scene, &settings)?;

    let surface_size = settings
        .size
        .or_else(|| {
            scene
                .texture
                .as_ref()
                .map(|input| (input.image.width(), input.image.height()))
        })
        .unwrap_or(DEFAULT_SURFACE);
    let target_fps = settings.fps.filter(|fps| *fps > 0.0);
    let policy = match args.still_time {
        Some(time_ms) => RenderPolicy::Still { time_ms },
        None => RenderPolicy::Animate { target_fps },
    };

    tracing::debug!(
        scene = %kind,
        width = surface_size.0,
        height = surface_size.1,
        ?policy,
        "resolved renderer configuration"
    );

    Ok(RendererConfig {
        surface_size,
        title: settings
            .title
            .clone()
            .unwrap_or_else(|| format!("quadscroll: {kind}")),
        scene,
        policy,
        power: args.gpu_power,
        color_space: args.color_space,
    })
}

fn animation(settings: &SceneConfig) -> ScrollAnimation {
    let defaults = ScrollAnimation::default();
    ScrollAnimation {
        time_scale: settings
            .time_scale
            .map_or(defaults.time_scale, |scale| scale as f32),
        axes: settings
            .scroll
            .map_or(defaults.axes, |axes| axes.map(|axis| axis as f32)),
        ..defaults
    }
}

fn customise(scene: SceneSpec, settings: &SceneConfig) -> Result<SceneSpec> {
    let vertex = settings
        .vertex_shader
        .as_deref()
        .map(load_shader)
        .transpose()?;
    let fragment = settings
        .fragment_shader
        .as_deref()
        .map(load_shader)
        .transpose()?;
    let scene = scene.with_shaders(vertex, fragment);
    Ok(match settings.clear_color {
        Some(rgba) => scene.with_clear_color(ClearColor::from_rgba8(rgba)),
        None => scene,
    })
}

/// Stand-in texture for `--check`, which never samples it.
fn placeholder_image() -> Result<DecodedImage> {
    Ok(DecodedImage::new(1, 1, vec![0, 0, 0, 255])?)
}
