//! wgpu implementation of [`RenderDevice`](crate::device::RenderDevice).
//!
//! - `context` owns instance/device/surface wiring and reconfigures the
//!   swapchain when the window resizes.
//! - `resources` turns uploads into device buffers, textures and samplers.
//! - `pipeline` builds the render pipeline and its bind group layouts from
//!   the linked program's reflection.
//! - `state` keeps the handle tables and replays each frame plan into a
//!   render pass.

mod context;
mod pipeline;
mod resources;
mod state;

pub(crate) use state::GpuState;
