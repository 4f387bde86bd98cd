//! Renderer crate for quadscroll.
//!
//! A small programmable pipeline over `wgpu`: GLSL stages are compiled and
//! linked with naga, vertex streams and textures are uploaded once, and a
//! frame driver replays the same draw every tick with fresh uniforms.
//!
//! ```text
//!   CLI / scene file
//!          │ RendererConfig
//!          ▼
//!   Renderer::run ──▶ Session::build ──▶ winit event loop
//!                           │                   │ FrameTick
//!                           ▼                   ▼
//!                     RenderDevice ◀── FrameDriver::on_frame ─▶ FramePlan
//! ```
//!
//! Everything above [`device::RenderDevice`] is plain data and runs without a
//! GPU; the `gpu` module is the only place that touches wgpu objects.

pub mod attributes;
pub mod device;
pub mod frame;
pub mod geometry;
mod gpu;
pub mod program;
pub mod reference;
pub mod runtime;
pub mod scene;
pub mod shader;
pub mod texture;
pub mod types;
pub mod uniforms;
mod window;

use anyhow::Result;

pub use frame::{build_pipeline, FrameDriver, FramePlan, FrameState, FrameTick, Session};
pub use runtime::RenderPolicy;
pub use scene::{colored_quad, scrolling_texture, ClearColor, SceneSpec, ScrollAnimation};
pub use shader::{ShaderSource, ShaderStage};
pub use texture::DecodedImage;
pub use types::{ColorSpaceMode, GpuPowerPreference, RendererConfig};

/// High-level entry point that owns the chosen configuration.
pub struct Renderer {
    config: RendererConfig,
}

impl Renderer {
    pub fn new(config: RendererConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    /// Compiles and links the scene's shaders without opening a window.
    pub fn check(&self) -> Result<()> {
        let scene = &self.config.scene;
        build_pipeline(&scene.vertex, &scene.fragment)?;
        tracing::info!(scene = %scene.name, "shaders compiled and linked");
        Ok(())
    }

    /// Opens the window and renders until it is closed.
    ///
    /// Returns an error when the window, device or scene fails to
    /// initialise; per-frame surface errors are logged and retried.
    pub fn run(&mut self) -> Result<()> {
        tracing::info!(
            scene = %self.config.scene.name,
            width = self.config.surface_size.0,
            height = self.config.surface_size.1,
            "starting renderer"
        );
        window::run(&self.config)
    }
}
