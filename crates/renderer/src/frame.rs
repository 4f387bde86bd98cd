//! Session startup and the per-frame driver.
//!
//! [`Session::build`] runs the whole startup sequence against a
//! [`RenderDevice`]. Once built, a [`FrameDriver`] turns every tick into a
//! [`FramePlan`]: a flat list of device commands plus the request for the next
//! tick. Time is carried in an explicit [`FrameState`] that the caller passes
//! in and gets back.

use crate::attributes::{AttributeBinder, BindError};
use crate::device::{
    BindingsHandle, BufferHandle, DeviceError, PipelineHandle, RenderDevice, TextureBinding,
};
use crate::geometry::{upload_indices, upload_vertices, GeometryError, IndexBuffer, IndexWidth};
use crate::program::{link, LinkError, Pipeline, ResourceKind};
use crate::scene::{ClearColor, ScrollAnimation, SceneSpec};
use crate::shader::{compile_source, CompileError, ShaderSource};
use crate::texture::{upload_texture, TextureError};
use crate::uniforms::{UniformBinder, UniformError, UniformValue};

/// Time carried from one tick to the next.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameState {
    elapsed_ms: f64,
    last_timestamp_ms: Option<f64>,
    frame_index: u64,
}

impl FrameState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fresh state with `elapsed_ms` of animation time already accumulated.
    pub fn starting_at(elapsed_ms: f64) -> Self {
        Self {
            elapsed_ms,
            ..Self::default()
        }
    }

    /// Accumulated animation time in milliseconds.
    pub fn elapsed_ms(&self) -> f64 {
        self.elapsed_ms
    }

    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    pub fn last_timestamp_ms(&self) -> Option<f64> {
        self.last_timestamp_ms
    }

    /// State after a frame stamped `timestamp_ms`. The first frame
    /// contributes no time; a clock that runs backwards contributes none
    /// either.
    pub fn advance(self, timestamp_ms: f64) -> Self {
        let delta = self
            .last_timestamp_ms
            .map_or(0.0, |last| (timestamp_ms - last).max(0.0));
        Self {
            elapsed_ms: self.elapsed_ms + delta,
            last_timestamp_ms: Some(timestamp_ms),
            frame_index: self.frame_index + 1,
        }
    }
}

/// Input for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameTick {
    pub timestamp_ms: f64,
    pub surface_size: [u32; 2],
}

/// Device work for one frame, in execution order.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderCommand {
    Clear(ClearColor),
    UsePipeline(PipelineHandle),
    BindAttribute {
        slot: u32,
        buffer: BufferHandle,
    },
    BindResources(BindingsHandle),
    WriteUniforms {
        bindings: BindingsHandle,
        group: u32,
        binding: u32,
        bytes: Vec<u8>,
    },
    SetIndexBuffer {
        buffer: BufferHandle,
        width: IndexWidth,
    },
    DrawIndexed {
        count: u32,
    },
    Draw {
        count: u32,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextTick {
    Requested,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FramePlan {
    pub commands: Vec<RenderCommand>,
    pub next: NextTick,
}

impl FramePlan {
    pub fn clear_color(&self) -> Option<ClearColor> {
        self.commands.iter().find_map(|command| match command {
            RenderCommand::Clear(color) => Some(*color),
            _ => None,
        })
    }
}

/// The single draw call a session issues every frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawCall {
    Indexed(IndexBuffer),
    Arrays { count: u32 },
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Compile(#[from] CompileError),
    #[error(transparent)]
    Link(#[from] LinkError),
    #[error("geometry upload failed: {0}")]
    Geometry(#[from] GeometryError),
    #[error("texture upload failed: {0}")]
    Texture(#[from] TextureError),
    #[error("attribute binding failed: {0}")]
    Bind(#[from] BindError),
    #[error("device setup failed: {0}")]
    Device(#[from] DeviceError),
    #[error("scene `{scene}` declares no attribute streams")]
    NoAttributes { scene: String },
    #[error("pipeline has no texture slot named `{0}`")]
    MissingTextureSlot(String),
}

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("frame driver has not been started")]
    NotStarted,
    #[error("frame driver is already rendering")]
    AlreadyRendering,
    #[error(transparent)]
    Uniform(#[from] UniformError),
}

/// Compiles and links a vertex/fragment pair.
///
/// The intermediate stages are dropped before returning; the pipeline keeps
/// its own copy.
pub fn build_pipeline(
    vertex: &ShaderSource,
    fragment: &ShaderSource,
) -> Result<Pipeline, SessionError> {
    let vertex = compile_source(vertex)?;
    let fragment = compile_source(fragment)?;
    Ok(link(&vertex, &fragment)?)
}

/// Everything one scene needs on the device, resolved once.
#[derive(Debug)]
pub struct Session {
    name: String,
    pipeline: Pipeline,
    device_pipeline: PipelineHandle,
    bindings: BindingsHandle,
    attributes: AttributeBinder,
    uniforms: UniformBinder,
    draw: DrawCall,
    resolution_uniform: Option<String>,
    animation: Option<ScrollAnimation>,
    clear_color: ClearColor,
}

impl Session {
    pub fn build<D: RenderDevice + ?Sized>(
        device: &mut D,
        scene: &SceneSpec,
    ) -> Result<Self, SessionError> {
        let pipeline = build_pipeline(&scene.vertex, &scene.fragment)?;
        if scene.attributes.is_empty() {
            return Err(SessionError::NoAttributes {
                scene: scene.name.clone(),
            });
        }

        let mut attributes = AttributeBinder::new();
        for stream in &scene.attributes {
            let buffer = upload_vertices(device, &stream.name, &stream.data)?;
            attributes.resolve(&pipeline, &stream.name, buffer, stream.layout)?;
        }

        let vertex_count = scene.vertex_count();
        let draw = match &scene.indices {
            Some(indices) => {
                DrawCall::Indexed(upload_indices(device, "indices", indices, vertex_count)?)
            }
            None => DrawCall::Arrays {
                count: vertex_count,
            },
        };

        let mut texture_bindings = Vec::new();
        if let Some(input) = &scene.texture {
            let slot = pipeline
                .texture_slots()
                .find(|slot| slot.name == input.texture)
                .ok_or_else(|| SessionError::MissingTextureSlot(input.texture.clone()))?;
            let sampler_slot = input
                .sampler
                .as_deref()
                .and_then(|name| pipeline.resource(name))
                .filter(|slot| slot.kind == ResourceKind::Sampler)
                .map(|slot| (slot.group, slot.binding));
            let handle = upload_texture(device, &input.texture, &input.image)?;
            texture_bindings.push(TextureBinding {
                texture: handle,
                texture_slot: (slot.group, slot.binding),
                sampler_slot,
            });
        }

        let device_pipeline = device.create_pipeline(&pipeline, attributes.descriptors())?;
        let bindings = device.create_bindings(device_pipeline, &texture_bindings)?;
        let uniforms = UniformBinder::for_pipeline(&pipeline);

        tracing::info!(
            scene = %scene.name,
            attributes = attributes.active().count(),
            uniforms = uniforms.descriptors().len(),
            draw = ?draw,
            "session ready"
        );

        Ok(Self {
            name: scene.name.clone(),
            pipeline,
            device_pipeline,
            bindings,
            attributes,
            uniforms,
            draw,
            resolution_uniform: scene.resolution_uniform.clone(),
            animation: scene.animation.clone(),
            clear_color: scene.clear_color,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub fn attributes(&self) -> &AttributeBinder {
        &self.attributes
    }

    pub fn uniforms(&self) -> &UniformBinder {
        &self.uniforms
    }

    pub fn draw(&self) -> DrawCall {
        self.draw
    }

    fn frame(&mut self, state: &FrameState, tick: &FrameTick) -> Result<FramePlan, FrameError> {
        if let Some(name) = &self.resolution_uniform {
            let [width, height] = tick.surface_size;
            self.uniforms
                .set(name, UniformValue::Vec2([width as f32, height as f32]))?;
        }
        if let Some(animation) = &self.animation {
            let offset = animation.offset_at(state.elapsed_ms());
            self.uniforms
                .set(&animation.uniform, UniformValue::Vec2(offset))?;
        }

        let mut commands = vec![
            RenderCommand::Clear(self.clear_color),
            RenderCommand::UsePipeline(self.device_pipeline),
        ];
        commands.extend(self.attributes.bind_commands());
        commands.push(RenderCommand::BindResources(self.bindings));
        commands.extend(self.uniforms.blocks().iter().map(|block| {
            RenderCommand::WriteUniforms {
                bindings: self.bindings,
                group: block.group,
                binding: block.binding,
                bytes: block.bytes.clone(),
            }
        }));
        match self.draw {
            DrawCall::Indexed(index) => {
                commands.push(RenderCommand::SetIndexBuffer {
                    buffer: index.handle,
                    width: index.width,
                });
                commands.push(RenderCommand::DrawIndexed { count: index.count });
            }
            DrawCall::Arrays { count } => commands.push(RenderCommand::Draw { count }),
        }

        Ok(FramePlan {
            commands,
            next: NextTick::Requested,
        })
    }
}

/// Drives a [`Session`] one frame at a time.
#[derive(Debug, Default)]
pub enum FrameDriver {
    #[default]
    Idle,
    Rendering(Box<Session>),
}

impl FrameDriver {
    pub fn new() -> Self {
        Self::Idle
    }

    pub fn start(&mut self, session: Session) -> Result<(), FrameError> {
        match self {
            FrameDriver::Idle => {
                tracing::debug!(scene = session.name(), "frame driver started");
                *self = FrameDriver::Rendering(Box::new(session));
                Ok(())
            }
            FrameDriver::Rendering(_) => Err(FrameError::AlreadyRendering),
        }
    }

    pub fn is_rendering(&self) -> bool {
        matches!(self, FrameDriver::Rendering(_))
    }

    /// Builds the plan for one tick and returns the state for the next.
    ///
    /// Uniforms are computed from the incoming `state`; the returned state
    /// has the tick's time folded in.
    pub fn on_frame(
        &mut self,
        state: FrameState,
        tick: FrameTick,
    ) -> Result<(FrameState, FramePlan), FrameError> {
        let FrameDriver::Rendering(session) = self else {
            return Err(FrameError::NotStarted);
        };
        let plan = session.frame(&state, &tick)?;
        Ok((state.advance(tick.timestamp_ms), plan))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::recording::RecordingDevice;
    use crate::device::BufferKind;
    use crate::scene::{colored_quad, scrolling_texture};
    use crate::texture::DecodedImage;

    fn tick(timestamp_ms: f64) -> FrameTick {
        FrameTick {
            timestamp_ms,
            surface_size: [400, 300],
        }
    }

    fn checker() -> DecodedImage {
        let (black, white) = ([0, 0, 0, 255], [255, 255, 255, 255]);
        DecodedImage::new(2, 2, [black, white, white, black].concat()).expect("valid image")
    }

    fn uniform_vec2(plan: &FramePlan, offset: usize) -> [f32; 2] {
        let bytes = plan
            .commands
            .iter()
            .find_map(|command| match command {
                RenderCommand::WriteUniforms { bytes, .. } => Some(bytes),
                _ => None,
            })
            .expect("uniform write");
        let read =
            |at: usize| f32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]]);
        [read(offset), read(offset + 4)]
    }

    #[test]
    fn state_accumulates_tick_deltas() {
        let state = FrameState::new().advance(1000.0);
        assert_eq!(state.elapsed_ms(), 0.0);
        assert_eq!(state.frame_index(), 1);

        let state = state.advance(1016.0).advance(1032.0);
        assert_eq!(state.elapsed_ms(), 32.0);
        assert_eq!(state.frame_index(), 3);

        let state = state.advance(1000.0);
        assert_eq!(state.elapsed_ms(), 32.0);
    }

    #[test]
    fn idle_driver_refuses_frames() {
        let mut driver = FrameDriver::new();
        assert!(!driver.is_rendering());
        let result = driver.on_frame(FrameState::new(), tick(0.0));
        assert!(matches!(result, Err(FrameError::NotStarted)));
    }

    #[test]
    fn colored_quad_plan_follows_fixed_order() {
        let mut device = RecordingDevice::new(400, 300);
        let session = Session::build(&mut device, &colored_quad()).expect("builds");
        let mut driver = FrameDriver::new();
        driver.start(session).expect("starts");

        let (state, plan) = driver.on_frame(FrameState::new(), tick(0.0)).expect("frame");
        assert_eq!(state.frame_index(), 1);
        assert_eq!(plan.next, NextTick::Requested);
        assert_eq!(plan.clear_color(), Some(ClearColor::OPAQUE_BLACK));

        let commands = &plan.commands;
        assert!(matches!(commands[0], RenderCommand::Clear(_)));
        assert!(matches!(commands[1], RenderCommand::UsePipeline(_)));
        assert!(matches!(commands[2], RenderCommand::BindAttribute { slot: 0, .. }));
        assert!(matches!(commands[3], RenderCommand::BindAttribute { slot: 1, .. }));
        assert!(matches!(commands[4], RenderCommand::BindResources(_)));
        assert!(matches!(
            commands[5],
            RenderCommand::SetIndexBuffer {
                width: IndexWidth::U8,
                ..
            }
        ));
        assert_eq!(commands[6], RenderCommand::DrawIndexed { count: 6 });
        assert_eq!(commands.len(), 7);

        assert_eq!(device.buffers.len(), 3);
        assert_eq!(device.buffers[2].1, BufferKind::Index(IndexWidth::U8));
    }

    #[test]
    fn every_frame_rebinds_and_requests_another() {
        let mut device = RecordingDevice::new(400, 300);
        let session = Session::build(&mut device, &colored_quad()).expect("builds");
        let mut driver = FrameDriver::new();
        driver.start(session).expect("starts");

        let mut state = FrameState::new();
        for frame in 0..3 {
            let (next, plan) = driver
                .on_frame(state, tick(f64::from(frame) * 16.0))
                .expect("frame");
            let binds = plan
                .commands
                .iter()
                .filter(|command| matches!(command, RenderCommand::BindAttribute { .. }))
                .count();
            assert_eq!(binds, 2);
            assert_eq!(plan.next, NextTick::Requested);
            state = next;
        }
        assert_eq!(state.frame_index(), 3);
    }

    #[test]
    fn scrolling_texture_draws_six_vertices_with_uniforms() {
        let mut device = RecordingDevice::new(400, 300);
        let scene = scrolling_texture(checker(), ScrollAnimation::default());
        let session = Session::build(&mut device, &scene).expect("builds");
        assert_eq!(session.draw(), DrawCall::Arrays { count: 6 });
        assert_eq!(device.textures.len(), 1);
        let (_, textures) = &device.bindings[0];
        assert_eq!(textures[0].texture_slot, (1, 0));
        assert_eq!(textures[0].sampler_slot, Some((1, 1)));

        let mut driver = FrameDriver::new();
        driver.start(session).expect("starts");
        let (state, plan) = driver.on_frame(FrameState::new(), tick(0.0)).expect("frame");
        assert_eq!(plan.commands.last(), Some(&RenderCommand::Draw { count: 6 }));
        assert_eq!(uniform_vec2(&plan, 0), [400.0, 300.0]);
        assert_eq!(uniform_vec2(&plan, 8), [0.0, 0.0]);

        let (state, _) = driver.on_frame(state, tick(1000.0)).expect("frame");
        let (_, plan) = driver.on_frame(state, tick(1016.0)).expect("frame");
        let [u, v] = uniform_vec2(&plan, 8);
        assert!((u - 0.5).abs() < 1e-5);
        assert_eq!(u, v);
    }

    #[test]
    fn planned_frames_reach_the_device() {
        let mut device = RecordingDevice::new(640, 480);
        let scene = scrolling_texture(checker(), ScrollAnimation::default());
        let session = Session::build(&mut device, &scene).expect("builds");
        let mut driver = FrameDriver::new();
        driver.start(session).expect("starts");
        assert!(driver.is_rendering());

        let mut state = FrameState::new();
        for frame in 0..2 {
            let tick = FrameTick {
                timestamp_ms: f64::from(frame) * 16.0,
                surface_size: device.surface_size(),
            };
            let (next, plan) = driver.on_frame(state, tick).expect("frame");
            device.submit(&plan).expect("submit");
            state = next;
        }

        assert_eq!(device.frames.len(), 2);
        assert_eq!(uniform_vec2(&device.frames[0], 0), [640.0, 480.0]);
        let [u, _] = uniform_vec2(&device.frames[1], 8);
        assert_eq!(u, 0.0);
        let [u, v] = uniform_vec2(&driver.on_frame(state, tick(48.0)).expect("frame").1, 8);
        assert!(u > 0.0 && u == v);
    }

    #[test]
    fn broken_shader_aborts_the_build() {
        let mut device = RecordingDevice::new(400, 300);
        let scene = colored_quad().with_shaders(None, Some("void main( {".to_owned()));
        let err = Session::build(&mut device, &scene).expect_err("compile failure");
        assert!(matches!(err, SessionError::Compile(_)));
        assert!(device.buffers.is_empty());
        assert!(device.pipelines.is_empty());
    }

    #[test]
    fn starting_twice_is_rejected() {
        let mut device = RecordingDevice::new(400, 300);
        let mut driver = FrameDriver::new();
        driver
            .start(Session::build(&mut device, &colored_quad()).expect("builds"))
            .expect("starts");
        let second = Session::build(&mut device, &colored_quad()).expect("builds");
        assert!(matches!(
            driver.start(second),
            Err(FrameError::AlreadyRendering)
        ));
    }
}
