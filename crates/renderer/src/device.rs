//! The seam between the pipeline core and a concrete graphics device.
//!
//! The core only ever talks to a [`RenderDevice`]: it asks for buffers,
//! textures, a pipeline and its bind groups once at startup, then hands over a
//! [`FramePlan`] every tick. `gpu::GpuState` implements it over wgpu; tests
//! implement it with a recorder.

use crate::attributes::AttributeDescriptor;
use crate::frame::FramePlan;
use crate::geometry::IndexWidth;
use crate::program::Pipeline;
use crate::texture::{DecodedImage, Sampling};

macro_rules! handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name(u32);

        impl $name {
            pub fn new(index: u32) -> Self {
                Self(index)
            }

            pub fn index(self) -> u32 {
                self.0
            }
        }
    };
}

handle!(
    /// Device-resident vertex or index buffer.
    BufferHandle
);
handle!(
    /// Device-resident 2D texture with its sampler.
    TextureHandle
);
handle!(
    /// Device pipeline object built from a linked [`Pipeline`].
    PipelineHandle
);
handle!(
    /// Bind groups (uniform buffers, textures, samplers) for one pipeline.
    BindingsHandle
);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferKind {
    Vertex,
    Index(IndexWidth),
}

/// Static buffer contents to place in device memory.
#[derive(Debug, Clone, Copy)]
pub struct BufferUpload<'a> {
    pub label: &'a str,
    pub kind: BufferKind,
    pub contents: &'a [u8],
}

/// Texture and sampler a pipeline's resource slots should see.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureBinding {
    pub texture: TextureHandle,
    pub texture_slot: (u32, u32),
    pub sampler_slot: Option<(u32, u32)>,
}

#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("surface error: {0}")]
    Surface(#[from] wgpu::SurfaceError),
    #[error("unknown {kind} handle #{index}")]
    UnknownHandle { kind: &'static str, index: u32 },
    #[error("device rejected {what}: {reason}")]
    Rejected { what: String, reason: String },
}

pub trait RenderDevice {
    fn create_buffer(&mut self, upload: BufferUpload<'_>) -> Result<BufferHandle, DeviceError>;

    fn create_texture(
        &mut self,
        label: &str,
        image: &DecodedImage,
        sampling: Sampling,
    ) -> Result<TextureHandle, DeviceError>;

    /// Builds the device pipeline. `attributes` lists every resolved vertex
    /// input; entries whose location is not found are ignored.
    fn create_pipeline(
        &mut self,
        pipeline: &Pipeline,
        attributes: &[AttributeDescriptor],
    ) -> Result<PipelineHandle, DeviceError>;

    /// Allocates uniform buffers and bind groups for `pipeline`.
    fn create_bindings(
        &mut self,
        pipeline: PipelineHandle,
        textures: &[TextureBinding],
    ) -> Result<BindingsHandle, DeviceError>;

    /// Pixel size of the current drawing surface.
    fn surface_size(&self) -> [u32; 2];

    /// Executes one frame's commands.
    fn submit(&mut self, plan: &FramePlan) -> Result<(), DeviceError>;
}

#[cfg(test)]
pub(crate) mod recording {
    //! In-memory device used by the unit tests.

    use super::*;

    #[derive(Debug, Default)]
    pub(crate) struct RecordingDevice {
        pub buffers: Vec<(String, BufferKind, Vec<u8>)>,
        pub textures: Vec<(String, u32, u32, Sampling)>,
        pub pipelines: Vec<Vec<AttributeDescriptor>>,
        pub bindings: Vec<(PipelineHandle, Vec<TextureBinding>)>,
        pub frames: Vec<FramePlan>,
        pub size: [u32; 2],
    }

    impl RecordingDevice {
        pub(crate) fn new(width: u32, height: u32) -> Self {
            Self {
                size: [width, height],
                ..Self::default()
            }
        }
    }

    impl RenderDevice for RecordingDevice {
        fn create_buffer(
            &mut self,
            upload: BufferUpload<'_>,
        ) -> Result<BufferHandle, DeviceError> {
            self.buffers.push((
                upload.label.to_owned(),
                upload.kind,
                upload.contents.to_vec(),
            ));
            Ok(BufferHandle::new(self.buffers.len() as u32 - 1))
        }

        fn create_texture(
            &mut self,
            label: &str,
            image: &DecodedImage,
            sampling: Sampling,
        ) -> Result<TextureHandle, DeviceError> {
            self.textures
                .push((label.to_owned(), image.width(), image.height(), sampling));
            Ok(TextureHandle::new(self.textures.len() as u32 - 1))
        }

        fn create_pipeline(
            &mut self,
            _pipeline: &Pipeline,
            attributes: &[AttributeDescriptor],
        ) -> Result<PipelineHandle, DeviceError> {
            self.pipelines.push(attributes.to_vec());
            Ok(PipelineHandle::new(self.pipelines.len() as u32 - 1))
        }

        fn create_bindings(
            &mut self,
            pipeline: PipelineHandle,
            textures: &[TextureBinding],
        ) -> Result<BindingsHandle, DeviceError> {
            self.bindings.push((pipeline, textures.to_vec()));
            Ok(BindingsHandle::new(self.bindings.len() as u32 - 1))
        }

        fn surface_size(&self) -> [u32; 2] {
            self.size
        }

        fn submit(&mut self, plan: &FramePlan) -> Result<(), DeviceError> {
            self.frames.push(plan.clone());
            Ok(())
        }
    }
}
