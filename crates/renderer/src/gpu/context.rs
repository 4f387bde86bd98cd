use anyhow::{anyhow, Context as AnyhowContext, Result};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use winit::dpi::PhysicalSize;

use crate::types::{ColorSpaceMode, GpuPowerPreference};

/// Instance, surface, device and queue for one window.
pub(crate) struct GpuContext {
    pub _instance: wgpu::Instance,
    pub surface: wgpu::Surface<'static>,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub config: wgpu::SurfaceConfiguration,
    pub size: PhysicalSize<u32>,
    pub surface_format: wgpu::TextureFormat,
    pub texture_format: wgpu::TextureFormat,
}

impl GpuContext {
    pub(crate) fn new<T>(
        target: &T,
        initial_size: PhysicalSize<u32>,
        color_space: ColorSpaceMode,
        gpu_power: GpuPowerPreference,
    ) -> Result<Self>
    where
        T: HasDisplayHandle + HasWindowHandle,
    {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            flags: wgpu::InstanceFlags::default(),
            memory_budget_thresholds: wgpu::MemoryBudgetThresholds::default(),
            backend_options: wgpu::BackendOptions::default(),
        });

        let window_handle = target
            .window_handle()
            .map_err(|err| anyhow!("failed to acquire window handle: {err}"))?;
        let display_handle = target
            .display_handle()
            .map_err(|err| anyhow!("failed to acquire display handle: {err}"))?;

        // The window outlives the context: both are owned by the event loop
        // closure and the context is dropped first.
        let surface = unsafe {
            instance.create_surface_unsafe(wgpu::SurfaceTargetUnsafe::RawHandle {
                raw_display_handle: display_handle.as_raw(),
                raw_window_handle: window_handle.as_raw(),
            })
        }
        .context("failed to create rendering surface")?;

        let power_preference = match gpu_power {
            GpuPowerPreference::Low => wgpu::PowerPreference::LowPower,
            GpuPowerPreference::High => wgpu::PowerPreference::HighPerformance,
        };
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference,
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))
        .context("failed to find a suitable GPU adapter")?;

        let adapter_info = adapter.get_info();
        tracing::debug!(
            name = %adapter_info.name,
            backend = ?adapter_info.backend,
            device_type = ?adapter_info.device_type,
            "selected GPU adapter"
        );

        let limits = adapter.limits();
        let max_dimension = limits.max_texture_dimension_2d;
        let requested_width = initial_size.width.max(1);
        let requested_height = initial_size.height.max(1);
        if requested_width > max_dimension || requested_height > max_dimension {
            anyhow::bail!(
                "GPU max texture dimension is {max_dimension}, requested surface is {requested_width}x{requested_height}"
            );
        }

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = pick_surface_format(&surface_caps.formats, color_space)
            .ok_or_else(|| anyhow!("surface reports no supported formats"))?;
        let texture_format = texture_format_for(color_space);

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("quadscroll device"),
            required_features: wgpu::Features::empty(),
            required_limits: limits,
            memory_hints: wgpu::MemoryHints::MemoryUsage,
            trace: wgpu::Trace::default(),
        }))
        .context("failed to create GPU device")?;

        let present_mode = pick_present_mode(&surface_caps.present_modes);
        let alpha_mode = surface_caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);
        tracing::debug!(?present_mode, ?surface_format, "configuring surface");

        let size = PhysicalSize::new(requested_width, requested_height);
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width,
            height: size.height,
            present_mode,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        Ok(Self {
            _instance: instance,
            surface,
            device,
            queue,
            config,
            size,
            surface_format,
            texture_format,
        })
    }

    pub(crate) fn resize(&mut self, new_size: PhysicalSize<u32>) {
        if new_size.width == 0 || new_size.height == 0 {
            return;
        }

        self.size = new_size;
        self.config.width = new_size.width;
        self.config.height = new_size.height;
        self.surface.configure(&self.device, &self.config);
    }
}

/// First surface format whose sRGB-ness matches `color_space`, else the
/// surface's preferred format.
fn pick_surface_format(
    formats: &[wgpu::TextureFormat],
    color_space: ColorSpaceMode,
) -> Option<wgpu::TextureFormat> {
    let want_srgb = color_space == ColorSpaceMode::Linear;
    let matching = formats.iter().copied().find(|format| format.is_srgb() == want_srgb);
    if matching.is_none() {
        tracing::warn!(
            ?color_space,
            available = ?formats,
            "preferred surface color space unavailable; falling back"
        );
    }
    matching.or_else(|| formats.first().copied())
}

/// Format sampled textures are stored in. Linear output decodes sRGB texels
/// on fetch so the surface re-encodes them once.
fn texture_format_for(color_space: ColorSpaceMode) -> wgpu::TextureFormat {
    match color_space {
        ColorSpaceMode::Gamma => wgpu::TextureFormat::Rgba8Unorm,
        ColorSpaceMode::Linear => wgpu::TextureFormat::Rgba8UnormSrgb,
    }
}

fn pick_present_mode(modes: &[wgpu::PresentMode]) -> wgpu::PresentMode {
    if modes.contains(&wgpu::PresentMode::Fifo) {
        wgpu::PresentMode::Fifo
    } else {
        wgpu::PresentMode::AutoVsync
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wgpu::TextureFormat as F;

    #[test]
    fn gamma_prefers_non_srgb_surface() {
        let formats = [F::Bgra8UnormSrgb, F::Bgra8Unorm];
        assert_eq!(
            pick_surface_format(&formats, ColorSpaceMode::Gamma),
            Some(F::Bgra8Unorm)
        );
        assert_eq!(
            pick_surface_format(&formats, ColorSpaceMode::Linear),
            Some(F::Bgra8UnormSrgb)
        );
    }

    #[test]
    fn falls_back_to_first_format() {
        assert_eq!(
            pick_surface_format(&[F::Rgba8UnormSrgb], ColorSpaceMode::Gamma),
            Some(F::Rgba8UnormSrgb)
        );
        assert_eq!(pick_surface_format(&[], ColorSpaceMode::Gamma), None);
    }

    #[test]
    fn fifo_is_preferred_when_offered() {
        let modes = [wgpu::PresentMode::Mailbox, wgpu::PresentMode::Fifo];
        assert_eq!(pick_present_mode(&modes), wgpu::PresentMode::Fifo);
        assert_eq!(pick_present_mode(&[]), wgpu::PresentMode::AutoVsync);
    }

    #[test]
    fn textures_follow_color_space() {
        assert!(!texture_format_for(ColorSpaceMode::Gamma).is_srgb());
        assert!(texture_format_for(ColorSpaceMode::Linear).is_srgb());
    }
}
