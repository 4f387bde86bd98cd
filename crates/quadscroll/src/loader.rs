use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use renderer::DecodedImage;

/// Decodes `path` into tightly packed RGBA8, first row at the top.
pub fn load_image(path: &Path) -> Result<DecodedImage> {
    let image = image::open(path)
        .with_context(|| format!("failed to open image at {}", path.display()))?;
    let rgba = image.to_rgba8();
    let (width, height) = rgba.dimensions();
    tracing::debug!(path = %path.display(), width, height, "decoded image");
    DecodedImage::new(width, height, rgba.into_raw())
        .with_context(|| format!("image at {} has no usable pixels", path.display()))
}

pub fn load_shader(path: &Path) -> Result<String> {
    fs::read_to_string(path)
        .with_context(|| format!("failed to read shader at {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_files_report_their_path() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("absent.png");
        let err = load_image(&path).unwrap_err();
        assert!(format!("{err}").contains("absent.png"));

        let err = load_shader(&dir.path().join("absent.frag")).unwrap_err();
        assert!(format!("{err}").contains("absent.frag"));
    }

    #[test]
    fn decodes_png_rows_top_first() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("stripes.png");
        let mut source = image::RgbaImage::new(1, 2);
        source.put_pixel(0, 0, image::Rgba([255, 0, 0, 255]));
        source.put_pixel(0, 1, image::Rgba([0, 0, 255, 255]));
        source.save(&path).expect("write png");

        let decoded = load_image(&path).expect("decode");
        assert_eq!(decoded.size(), [1, 2]);
        assert_eq!(decoded.pixel(0, 0), [255, 0, 0, 255]);
        assert_eq!(decoded.pixel(0, 1), [0, 0, 255, 255]);
    }
}
