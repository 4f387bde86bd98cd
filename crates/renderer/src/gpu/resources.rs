use wgpu::util::{DeviceExt, TextureDataOrder};

use crate::device::BufferKind;
use crate::geometry::IndexWidth;
use crate::texture::{DecodedImage, Sampling};

pub(crate) struct GpuBuffer {
    pub buffer: wgpu::Buffer,
    pub index_format: Option<wgpu::IndexFormat>,
}

pub(crate) struct GpuTexture {
    pub _texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub sampler: wgpu::Sampler,
}

pub(crate) fn create_buffer(
    device: &wgpu::Device,
    label: &str,
    kind: BufferKind,
    contents: &[u8],
) -> GpuBuffer {
    let (usage, index_format, contents) = match kind {
        BufferKind::Vertex => (wgpu::BufferUsages::VERTEX, None, contents.to_vec()),
        BufferKind::Index(IndexWidth::U8) => (
            wgpu::BufferUsages::INDEX,
            Some(wgpu::IndexFormat::Uint16),
            widen_u8_indices(contents),
        ),
        BufferKind::Index(IndexWidth::U16) => (
            wgpu::BufferUsages::INDEX,
            Some(wgpu::IndexFormat::Uint16),
            contents.to_vec(),
        ),
        BufferKind::Index(IndexWidth::U32) => (
            wgpu::BufferUsages::INDEX,
            Some(wgpu::IndexFormat::Uint32),
            contents.to_vec(),
        ),
    };
    let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some(label),
        contents: &contents,
        usage,
    });
    GpuBuffer {
        buffer,
        index_format,
    }
}

/// No 8-bit index format exists on the device; store each index as 16 bits.
fn widen_u8_indices(contents: &[u8]) -> Vec<u8> {
    contents
        .iter()
        .flat_map(|&index| u16::from(index).to_le_bytes())
        .collect()
}

pub(crate) fn create_texture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    label: &str,
    image: &DecodedImage,
    format: wgpu::TextureFormat,
    sampling: Sampling,
) -> GpuTexture {
    let texture = device.create_texture_with_data(
        queue,
        &wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width: image.width(),
                height: image.height(),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        },
        TextureDataOrder::LayerMajor,
        image.pixels(),
    );

    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some(label),
        address_mode_u: sampling.address_mode,
        address_mode_v: sampling.address_mode,
        address_mode_w: sampling.address_mode,
        mag_filter: sampling.filter,
        min_filter: sampling.filter,
        mipmap_filter: wgpu::FilterMode::Nearest,
        ..Default::default()
    });

    GpuTexture {
        _texture: texture,
        view,
        sampler,
    }
}
