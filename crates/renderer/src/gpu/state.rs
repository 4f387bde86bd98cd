use anyhow::Result;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use winit::dpi::PhysicalSize;

use crate::attributes::AttributeDescriptor;
use crate::device::{
    BindingsHandle, BufferHandle, BufferUpload, DeviceError, PipelineHandle, RenderDevice,
    TextureBinding, TextureHandle,
};
use crate::frame::{FramePlan, RenderCommand};
use crate::program::{Pipeline, ResourceKind};
use crate::texture::{DecodedImage, Sampling};
use crate::types::{ColorSpaceMode, GpuPowerPreference};

use super::context::GpuContext;
use super::pipeline::{create_pipeline, GpuPipeline};
use super::resources::{create_buffer, create_texture, GpuBuffer, GpuTexture};

struct GpuBindings {
    groups: Vec<wgpu::BindGroup>,
    uniform_buffers: Vec<((u32, u32), wgpu::Buffer)>,
}

/// Owns every device object the session created.
///
/// Handles handed out through [`RenderDevice`] index into the tables below;
/// everything is released when the state drops.
pub(crate) struct GpuState {
    context: GpuContext,
    buffers: Vec<GpuBuffer>,
    textures: Vec<GpuTexture>,
    pipelines: Vec<GpuPipeline>,
    bindings: Vec<GpuBindings>,
}

impl GpuState {
    pub(crate) fn new<T>(
        target: &T,
        size: PhysicalSize<u32>,
        color_space: ColorSpaceMode,
        power: GpuPowerPreference,
    ) -> Result<Self>
    where
        T: HasDisplayHandle + HasWindowHandle,
    {
        let context = GpuContext::new(target, size, color_space, power)?;
        Ok(Self {
            context,
            buffers: Vec::new(),
            textures: Vec::new(),
            pipelines: Vec::new(),
            bindings: Vec::new(),
        })
    }

    pub(crate) fn size(&self) -> PhysicalSize<u32> {
        self.context.size
    }

    pub(crate) fn resize(&mut self, new_size: PhysicalSize<u32>) {
        self.context.resize(new_size);
    }

    /// Runs `create` inside a validation error scope so device rejections
    /// come back as errors instead of reaching the uncaptured handler.
    fn validated<R>(
        &self,
        what: &str,
        create: impl FnOnce(&wgpu::Device) -> R,
    ) -> Result<R, DeviceError> {
        self.context
            .device
            .push_error_scope(wgpu::ErrorFilter::Validation);
        let value = create(&self.context.device);
        match pollster::block_on(self.context.device.pop_error_scope()) {
            None => Ok(value),
            Some(error) => {
                tracing::error!(what, %error, "device rejected resource");
                Err(DeviceError::Rejected {
                    what: what.to_owned(),
                    reason: error.to_string(),
                })
            }
        }
    }

    fn buffer(&self, handle: BufferHandle) -> Result<&GpuBuffer, DeviceError> {
        self.buffers
            .get(handle.index() as usize)
            .ok_or(DeviceError::UnknownHandle {
                kind: "buffer",
                index: handle.index(),
            })
    }

    fn texture(&self, handle: TextureHandle) -> Result<&GpuTexture, DeviceError> {
        self.textures
            .get(handle.index() as usize)
            .ok_or(DeviceError::UnknownHandle {
                kind: "texture",
                index: handle.index(),
            })
    }

    fn pipeline(&self, handle: PipelineHandle) -> Result<&GpuPipeline, DeviceError> {
        self.pipelines
            .get(handle.index() as usize)
            .ok_or(DeviceError::UnknownHandle {
                kind: "pipeline",
                index: handle.index(),
            })
    }

    fn bindings(&self, handle: BindingsHandle) -> Result<&GpuBindings, DeviceError> {
        self.bindings
            .get(handle.index() as usize)
            .ok_or(DeviceError::UnknownHandle {
                kind: "bindings",
                index: handle.index(),
            })
    }

    fn write_uniforms(&self, plan: &FramePlan) -> Result<(), DeviceError> {
        for command in &plan.commands {
            let RenderCommand::WriteUniforms {
                bindings,
                group,
                binding,
                bytes,
            } = command
            else {
                continue;
            };
            let target = self
                .bindings(*bindings)?
                .uniform_buffers
                .iter()
                .find(|(slot, _)| *slot == (*group, *binding))
                .map(|(_, buffer)| buffer)
                .ok_or(DeviceError::UnknownHandle {
                    kind: "uniform buffer",
                    index: *binding,
                })?;
            self.context.queue.write_buffer(target, 0, bytes);
        }
        Ok(())
    }

    fn encode(
        &self,
        plan: &FramePlan,
        encoder: &mut wgpu::CommandEncoder,
        view: &wgpu::TextureView,
    ) -> Result<(), DeviceError> {
        let load = match plan.clear_color() {
            Some(color) => wgpu::LoadOp::Clear(wgpu::Color {
                r: color.r,
                g: color.g,
                b: color.b,
                a: color.a,
            }),
            None => wgpu::LoadOp::Load,
        };
        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("scene pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view,
                depth_slice: None,
                resolve_target: None,
                ops: wgpu::Operations {
                    load,
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            occlusion_query_set: None,
            timestamp_writes: None,
        });

        for command in &plan.commands {
            match command {
                RenderCommand::UsePipeline(handle) => {
                    render_pass.set_pipeline(&self.pipeline(*handle)?.pipeline);
                }
                RenderCommand::BindAttribute { slot, buffer } => {
                    render_pass.set_vertex_buffer(*slot, self.buffer(*buffer)?.buffer.slice(..));
                }
                RenderCommand::BindResources(handle) => {
                    for (group, bind_group) in self.bindings(*handle)?.groups.iter().enumerate() {
                        render_pass.set_bind_group(group as u32, bind_group, &[]);
                    }
                }
                RenderCommand::SetIndexBuffer { buffer, .. } => {
                    let buffer = self.buffer(*buffer)?;
                    let format = buffer.index_format.unwrap_or(wgpu::IndexFormat::Uint16);
                    render_pass.set_index_buffer(buffer.buffer.slice(..), format);
                }
                RenderCommand::DrawIndexed { count } => {
                    render_pass.draw_indexed(0..*count, 0, 0..1);
                }
                RenderCommand::Draw { count } => {
                    render_pass.draw(0..*count, 0..1);
                }
                // applied at pass start and before encoding
                RenderCommand::Clear(_) | RenderCommand::WriteUniforms { .. } => {}
            }
        }
        Ok(())
    }
}

impl RenderDevice for GpuState {
    fn create_buffer(&mut self, upload: BufferUpload<'_>) -> Result<BufferHandle, DeviceError> {
        let buffer = self.validated(upload.label, |device| {
            create_buffer(device, upload.label, upload.kind, upload.contents)
        })?;
        self.buffers.push(buffer);
        Ok(BufferHandle::new(self.buffers.len() as u32 - 1))
    }

    fn create_texture(
        &mut self,
        label: &str,
        image: &DecodedImage,
        sampling: Sampling,
    ) -> Result<TextureHandle, DeviceError> {
        let format = self.context.texture_format;
        let texture = self.validated(label, |device| {
            create_texture(device, &self.context.queue, label, image, format, sampling)
        })?;
        self.textures.push(texture);
        Ok(TextureHandle::new(self.textures.len() as u32 - 1))
    }

    fn create_pipeline(
        &mut self,
        pipeline: &Pipeline,
        attributes: &[AttributeDescriptor],
    ) -> Result<PipelineHandle, DeviceError> {
        let format = self.context.surface_format;
        let gpu_pipeline = self.validated("render pipeline", |device| {
            create_pipeline(device, format, pipeline, attributes)
        })?;
        self.pipelines.push(gpu_pipeline);
        Ok(PipelineHandle::new(self.pipelines.len() as u32 - 1))
    }

    fn create_bindings(
        &mut self,
        pipeline: PipelineHandle,
        textures: &[TextureBinding],
    ) -> Result<BindingsHandle, DeviceError> {
        let gpu_pipeline = self.pipeline(pipeline)?;

        let uniform_buffers: Vec<((u32, u32), wgpu::Buffer)> = gpu_pipeline
            .uniform_blocks
            .iter()
            .map(|block| {
                let buffer = self.context.device.create_buffer(&wgpu::BufferDescriptor {
                    label: Some(&format!("uniforms {}.{}", block.group, block.binding)),
                    size: u64::from(block.size.max(16)),
                    usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                    mapped_at_creation: false,
                });
                ((block.group, block.binding), buffer)
            })
            .collect();

        let mut groups = Vec::with_capacity(gpu_pipeline.group_layouts.len());
        for (group, layout) in gpu_pipeline.group_layouts.iter().enumerate() {
            let group = group as u32;
            let mut entries = Vec::new();
            for ((block_group, binding), buffer) in &uniform_buffers {
                if *block_group == group {
                    entries.push(wgpu::BindGroupEntry {
                        binding: *binding,
                        resource: buffer.as_entire_binding(),
                    });
                }
            }
            for slot in gpu_pipeline.resources.iter().filter(|slot| slot.group == group) {
                let key = (slot.group, slot.binding);
                let bound = textures.iter().find(|binding| match slot.kind {
                    ResourceKind::Texture => binding.texture_slot == key,
                    ResourceKind::Sampler => binding.sampler_slot == Some(key),
                });
                let Some(bound) = bound else {
                    return Err(DeviceError::Rejected {
                        what: format!("bind group #{group}"),
                        reason: format!("nothing bound to `{}`", slot.name),
                    });
                };
                let texture = self.texture(bound.texture)?;
                let resource = match slot.kind {
                    ResourceKind::Texture => wgpu::BindingResource::TextureView(&texture.view),
                    ResourceKind::Sampler => wgpu::BindingResource::Sampler(&texture.sampler),
                };
                entries.push(wgpu::BindGroupEntry {
                    binding: slot.binding,
                    resource,
                });
            }
            let bind_group = self.validated("bind group", |device| {
                device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some(&format!("bind group #{group}")),
                    layout,
                    entries: &entries,
                })
            })?;
            groups.push(bind_group);
        }

        self.bindings.push(GpuBindings {
            groups,
            uniform_buffers,
        });
        Ok(BindingsHandle::new(self.bindings.len() as u32 - 1))
    }

    fn surface_size(&self) -> [u32; 2] {
        [self.context.config.width, self.context.config.height]
    }

    fn submit(&mut self, plan: &FramePlan) -> Result<(), DeviceError> {
        let frame = self.context.surface.get_current_texture()?;
        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        self.write_uniforms(plan)?;
        let mut encoder =
            self.context
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("frame encoder"),
                });
        self.encode(plan, &mut encoder, &view)?;
        self.context.queue.submit(Some(encoder.finish()));
        frame.present();
        Ok(())
    }
}
