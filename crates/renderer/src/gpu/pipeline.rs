use std::borrow::Cow;

use wgpu::naga::ShaderStage;

use crate::attributes::AttributeDescriptor;
use crate::program::{Pipeline, ResourceKind, ResourceSlot, UniformBlock, Visibility};
use crate::shader::CompiledShader;

/// Device pipeline plus the reflection needed to build its bind groups.
pub(crate) struct GpuPipeline {
    pub pipeline: wgpu::RenderPipeline,
    pub group_layouts: Vec<wgpu::BindGroupLayout>,
    pub uniform_blocks: Vec<UniformBlock>,
    pub resources: Vec<ResourceSlot>,
}

pub(crate) fn create_pipeline(
    device: &wgpu::Device,
    surface_format: wgpu::TextureFormat,
    pipeline: &Pipeline,
    attributes: &[AttributeDescriptor],
) -> GpuPipeline {
    let vertex_module = create_module(device, pipeline.vertex(), ShaderStage::Vertex);
    let fragment_module = create_module(device, pipeline.fragment(), ShaderStage::Fragment);

    let group_layouts: Vec<wgpu::BindGroupLayout> = (0..pipeline.bind_group_count())
        .map(|group| {
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some(&format!("bind group layout #{group}")),
                entries: &build_layout_entries(pipeline, group),
            })
        })
        .collect();
    let layout_refs: Vec<&wgpu::BindGroupLayout> = group_layouts.iter().collect();
    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("scene pipeline layout"),
        bind_group_layouts: &layout_refs,
        push_constant_ranges: &[],
    });

    let mut active: Vec<&AttributeDescriptor> = attributes
        .iter()
        .filter(|descriptor| descriptor.is_active())
        .collect();
    active.sort_by_key(|descriptor| descriptor.slot);
    let vertex_attributes: Vec<[wgpu::VertexAttribute; 1]> = active
        .iter()
        .map(|descriptor| {
            [wgpu::VertexAttribute {
                format: descriptor.format,
                offset: u64::from(descriptor.layout.offset),
                shader_location: descriptor.location.index().unwrap_or_default(),
            }]
        })
        .collect();
    let vertex_buffers: Vec<wgpu::VertexBufferLayout<'_>> = active
        .iter()
        .zip(&vertex_attributes)
        .map(|(descriptor, attribute)| wgpu::VertexBufferLayout {
            array_stride: u64::from(descriptor.layout.effective_stride()),
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: attribute,
        })
        .collect();

    let render_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("scene pipeline"),
        layout: Some(&pipeline_layout),
        vertex: wgpu::VertexState {
            module: &vertex_module,
            entry_point: Some("main"),
            buffers: &vertex_buffers,
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        },
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: None,
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        fragment: Some(wgpu::FragmentState {
            module: &fragment_module,
            entry_point: Some("main"),
            targets: &[Some(wgpu::ColorTargetState {
                format: surface_format,
                blend: Some(wgpu::BlendState::REPLACE),
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        }),
        multiview: None,
        cache: None,
    });

    GpuPipeline {
        pipeline: render_pipeline,
        group_layouts,
        uniform_blocks: pipeline.uniform_blocks().to_vec(),
        resources: pipeline.resources().to_vec(),
    }
}

fn create_module(
    device: &wgpu::Device,
    shader: &CompiledShader,
    stage: ShaderStage,
) -> wgpu::ShaderModule {
    device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(&format!("{} stage", shader.stage())),
        source: wgpu::ShaderSource::Glsl {
            shader: Cow::Borrowed(shader.source()),
            stage,
            defines: &[],
        },
    })
}

fn stages(visibility: Visibility) -> wgpu::ShaderStages {
    let mut stages = wgpu::ShaderStages::NONE;
    if visibility.vertex {
        stages |= wgpu::ShaderStages::VERTEX;
    }
    if visibility.fragment {
        stages |= wgpu::ShaderStages::FRAGMENT;
    }
    stages
}

fn build_layout_entries(pipeline: &Pipeline, group: u32) -> Vec<wgpu::BindGroupLayoutEntry> {
    let uniforms = pipeline
        .uniform_blocks()
        .iter()
        .filter(|block| block.group == group)
        .map(|block| wgpu::BindGroupLayoutEntry {
            binding: block.binding,
            visibility: stages(block.visibility),
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        });
    let resources = pipeline
        .resources()
        .iter()
        .filter(|slot| slot.group == group)
        .map(|slot| wgpu::BindGroupLayoutEntry {
            binding: slot.binding,
            visibility: stages(slot.visibility),
            ty: match slot.kind {
                ResourceKind::Texture => wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                ResourceKind::Sampler => {
                    wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering)
                }
            },
            count: None,
        });
    uniforms.chain(resources).collect()
}
