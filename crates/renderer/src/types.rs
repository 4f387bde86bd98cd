use crate::runtime::RenderPolicy;
use crate::scene::{colored_quad, SceneSpec};

/// Adapter selection preference forwarded to wgpu.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GpuPowerPreference {
    #[default]
    Low,
    High,
}

/// Output color handling for the surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorSpaceMode {
    /// Shader outputs are written to a non-sRGB surface unchanged.
    #[default]
    Gamma,
    /// Shader outputs are treated as linear and encoded by an sRGB surface.
    Linear,
}

/// Immutable configuration passed to the renderer at start-up.
///
/// `RendererConfig` mirrors CLI and scene-file settings: which scene to draw,
/// how large the window should be and how time advances.
#[derive(Debug, Clone)]
pub struct RendererConfig {
    /// Window size in physical pixels.
    pub surface_size: (u32, u32),
    /// Window title.
    pub title: String,
    /// Shaders, geometry and uniforms to draw.
    pub scene: SceneSpec,
    /// High-level render behaviour requested by the caller.
    pub policy: RenderPolicy,
    pub power: GpuPowerPreference,
    pub color_space: ColorSpaceMode,
}

impl Default for RendererConfig {
    /// A 400x300 window showing the colored quad.
    fn default() -> Self {
        Self {
            surface_size: (400, 300),
            title: "quadscroll".to_owned(),
            scene: colored_quad(),
            policy: RenderPolicy::default(),
            power: GpuPowerPreference::default(),
            color_space: ColorSpaceMode::default(),
        }
    }
}
