use std::path::PathBuf;

use clap::Parser;
use renderer::{ColorSpaceMode, GpuPowerPreference};
use sceneconfig::{parse_size, SceneKind};

#[derive(Parser, Debug)]
#[command(
    name = "quadscroll",
    author,
    version,
    about = "Draws a colored quad or a scrolling texture with wgpu"
)]
pub struct Cli {
    /// Scene to draw: `colored-quad` or `scrolling-texture`.
    #[arg(long, value_name = "SCENE", value_parser = parse_scene, env = "QUADSCROLL_SCENE")]
    pub scene: Option<SceneKind>,

    /// Image to scroll; implies `--scene scrolling-texture` when no scene is given.
    #[arg(long, value_name = "PATH", env = "QUADSCROLL_IMAGE")]
    pub image: Option<PathBuf>,

    /// TOML scene file; flags given on the command line take precedence.
    #[arg(long, value_name = "FILE", env = "QUADSCROLL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Window size (e.g. `800x600`). Defaults to the image size or 400x300.
    #[arg(long, value_name = "WIDTHxHEIGHT", value_parser = parse_size)]
    pub size: Option<(u32, u32)>,

    /// Optional FPS cap (0=uncapped).
    #[arg(long, value_name = "FPS")]
    pub fps: Option<f32>,

    /// Scroll speed in texture widths per millisecond.
    #[arg(long, value_name = "SCALE")]
    pub time_scale: Option<f64>,

    /// Freeze animation time at this many milliseconds.
    #[arg(long, value_name = "MILLISECONDS")]
    pub still_time: Option<f64>,

    /// GLSL file replacing the scene's vertex shader.
    #[arg(long, value_name = "FILE")]
    pub vertex: Option<PathBuf>,

    /// GLSL file replacing the scene's fragment shader.
    #[arg(long, value_name = "FILE")]
    pub fragment: Option<PathBuf>,

    /// Adapter preference: `low` or `high`.
    #[arg(
        long,
        value_name = "POWER",
        value_parser = parse_gpu_power,
        default_value = "low",
        env = "QUADSCROLL_GPU_POWER"
    )]
    pub gpu_power: GpuPowerPreference,

    /// Output color space handling: `gamma` or `linear`.
    #[arg(
        long,
        value_name = "MODE",
        value_parser = parse_color_space,
        default_value = "gamma"
    )]
    pub color_space: ColorSpaceMode,

    /// Compile and link the shaders, report the result and exit without
    /// opening a window.
    #[arg(long)]
    pub check: bool,
}

pub fn parse() -> Cli {
    Cli::parse()
}

fn parse_scene(value: &str) -> Result<SceneKind, String> {
    match value.trim().to_ascii_lowercase().as_str() {
        "colored-quad" | "quad" => Ok(SceneKind::ColoredQuad),
        "scrolling-texture" | "texture" => Ok(SceneKind::ScrollingTexture),
        other => Err(format!(
            "invalid scene '{other}'; expected 'colored-quad' or 'scrolling-texture'"
        )),
    }
}

fn parse_gpu_power(value: &str) -> Result<GpuPowerPreference, String> {
    match value.trim().to_ascii_lowercase().as_str() {
        "low" | "low-power" => Ok(GpuPowerPreference::Low),
        "high" | "high-performance" => Ok(GpuPowerPreference::High),
        other => Err(format!(
            "invalid GPU power preference '{other}'; expected 'low' or 'high'"
        )),
    }
}

fn parse_color_space(value: &str) -> Result<ColorSpaceMode, String> {
    match value.trim().to_ascii_lowercase().as_str() {
        "gamma" => Ok(ColorSpaceMode::Gamma),
        "linear" => Ok(ColorSpaceMode::Linear),
        other => Err(format!(
            "invalid color space '{other}'; expected 'gamma' or 'linear'"
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_scene_aliases() {
        assert_eq!(parse_scene("Colored-Quad"), Ok(SceneKind::ColoredQuad));
        assert_eq!(parse_scene("texture"), Ok(SceneKind::ScrollingTexture));
        assert!(parse_scene("cube").is_err());
    }

    #[test]
    fn parses_full_command_line() {
        let cli = Cli::try_parse_from([
            "quadscroll",
            "--scene",
            "scrolling-texture",
            "--image",
            "leaves.png",
            "--size",
            "640x480",
            "--time-scale",
            "0.001",
            "--check",
        ])
        .expect("valid arguments");
        assert_eq!(cli.scene, Some(SceneKind::ScrollingTexture));
        assert_eq!(cli.size, Some((640, 480)));
        assert_eq!(cli.time_scale, Some(0.001));
        assert_eq!(cli.gpu_power, GpuPowerPreference::Low);
        assert!(cli.check);
    }

    #[test]
    fn rejects_bad_size() {
        assert!(Cli::try_parse_from(["quadscroll", "--size", "huge"]).is_err());
    }
}
