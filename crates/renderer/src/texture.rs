//! Decoded images and their upload into a single sampled texture.

use crate::device::{DeviceError, RenderDevice, TextureHandle};

/// Tightly packed RGBA8 pixels, row-major from the top-left corner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    width: u32,
    height: u32,
    rgba: Vec<u8>,
}

impl DecodedImage {
    pub fn new(width: u32, height: u32, rgba: Vec<u8>) -> Result<Self, TextureError> {
        if width == 0 || height == 0 {
            return Err(TextureError::EmptyImage { width, height });
        }
        let expected = width as usize * height as usize * 4;
        if rgba.len() != expected {
            return Err(TextureError::PixelCountMismatch {
                width,
                height,
                expected,
                actual: rgba.len(),
            });
        }
        Ok(Self {
            width,
            height,
            rgba,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn size(&self) -> [u32; 2] {
        [self.width, self.height]
    }

    pub fn pixels(&self) -> &[u8] {
        &self.rgba
    }

    /// Texel at `(x, y)`, clamped to the edge.
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let x = x.min(self.width - 1) as usize;
        let y = y.min(self.height - 1) as usize;
        let start = (y * self.width as usize + x) * 4;
        [
            self.rgba[start],
            self.rgba[start + 1],
            self.rgba[start + 2],
            self.rgba[start + 3],
        ]
    }

    /// Nearest-texel lookup with clamp-to-edge addressing, matching
    /// [`Sampling::CLAMP_NEAREST`].
    pub fn sample_nearest(&self, [u, v]: [f32; 2]) -> [u8; 4] {
        self.pixel(texel_index(u, self.width), texel_index(v, self.height))
    }
}

fn texel_index(coordinate: f32, extent: u32) -> u32 {
    let scaled = (coordinate * extent as f32).floor();
    if scaled.is_nan() || scaled <= 0.0 {
        0
    } else {
        (scaled as u32).min(extent - 1)
    }
}

/// Sampler state fixed at texture creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sampling {
    pub address_mode: wgpu::AddressMode,
    pub filter: wgpu::FilterMode,
}

impl Sampling {
    pub const CLAMP_NEAREST: Sampling = Sampling {
        address_mode: wgpu::AddressMode::ClampToEdge,
        filter: wgpu::FilterMode::Nearest,
    };
}

impl Default for Sampling {
    fn default() -> Self {
        Self::CLAMP_NEAREST
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TextureError {
    #[error("image has no pixels ({width}x{height})")]
    EmptyImage { width: u32, height: u32 },
    #[error("{width}x{height} image needs {expected} bytes of RGBA, got {actual}")]
    PixelCountMismatch {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },
    #[error(transparent)]
    Device(#[from] DeviceError),
}

/// Creates one device texture from `image` with clamp-to-edge, nearest
/// sampling and no mip chain.
pub fn upload_texture<D: RenderDevice + ?Sized>(
    device: &mut D,
    label: &str,
    image: &DecodedImage,
) -> Result<TextureHandle, TextureError> {
    let handle = device.create_texture(label, image, Sampling::CLAMP_NEAREST)?;
    tracing::debug!(
        label,
        width = image.width(),
        height = image.height(),
        "uploaded texture"
    );
    Ok(handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::recording::RecordingDevice;
    use crate::reference::fract_wrap2;

    const BLACK: [u8; 4] = [0, 0, 0, 255];
    const WHITE: [u8; 4] = [255, 255, 255, 255];

    fn stripes() -> DecodedImage {
        let mut rgba = Vec::new();
        for texel in [BLACK, WHITE, BLACK, WHITE] {
            rgba.extend_from_slice(&texel);
        }
        DecodedImage::new(4, 1, rgba).expect("valid image")
    }

    #[test]
    fn rejects_partial_images() {
        let err = DecodedImage::new(2, 2, vec![0; 12]).expect_err("short buffer");
        assert!(matches!(err, TextureError::PixelCountMismatch { expected: 16, .. }));
        assert!(DecodedImage::new(0, 4, Vec::new()).is_err());
    }

    #[test]
    fn nearest_sampling_clamps_to_edge() {
        let image = stripes();
        assert_eq!(image.sample_nearest([0.0, 0.5]), BLACK);
        assert_eq!(image.sample_nearest([0.3, 0.5]), WHITE);
        assert_eq!(image.sample_nearest([0.99, 0.5]), WHITE);
        assert_eq!(image.sample_nearest([1.5, 0.5]), WHITE);
        assert_eq!(image.sample_nearest([-0.5, 0.5]), BLACK);
    }

    #[test]
    fn scrolling_offset_shifts_then_tiles() {
        let image = stripes();
        let sample =
            |uv: [f32; 2], off: f32| image.sample_nearest(fract_wrap2([uv[0] + off, uv[1] + off]));
        let uv = [0.1, 0.5];

        assert_eq!(sample(uv, 0.0), BLACK);
        assert_eq!(sample(uv, 0.25), WHITE);
        assert_eq!(sample(uv, 0.5), BLACK);
        assert_eq!(sample(uv, 1.0), sample(uv, 0.0));
        assert_eq!(sample(uv, 1.25), sample(uv, 0.25));
    }

    #[test]
    fn upload_uses_fixed_sampling() {
        let mut device = RecordingDevice::new(1, 1);
        upload_texture(&mut device, "image", &stripes()).expect("uploads");
        assert_eq!(
            device.textures,
            vec![("image".to_owned(), 4, 1, Sampling::CLAMP_NEAREST)]
        );
    }
}
