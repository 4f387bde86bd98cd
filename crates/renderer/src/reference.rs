//! CPU mirror of the fixed-function and shader math the pipeline relies on.
//!
//! These are the same formulas the device applies (normalized vertex fetch,
//! GLSL `fract`, the pixel → clip transform in the textured vertex stage). The
//! renderer uses them to pre-wrap animated offsets and to normalize byte
//! colors; tests use them to pin the expected behaviour down.

/// Maps an 8-bit unsigned component to `[0, 1]` the way a normalized
/// `Unorm8` vertex fetch does.
pub fn normalize_u8(value: u8) -> f32 {
    f32::from(value) / 255.0
}

/// GLSL `fract`: `x - floor(x)`, always in `[0, 1)`.
pub fn fract_wrap(value: f32) -> f32 {
    let wrapped = value - value.floor();
    // x - floor(x) rounds up to 1.0 for tiny negative inputs
    if wrapped >= 1.0 {
        0.0
    } else {
        wrapped
    }
}

/// Wraps both components of a UV coordinate.
pub fn fract_wrap2([u, v]: [f32; 2]) -> [f32; 2] {
    [fract_wrap(u), fract_wrap(v)]
}

/// Converts a pixel-space position into clip space for a target of
/// `resolution` pixels, flipping y so `(0, 0)` is the top-left corner.
pub fn pixel_to_clip(position: [f32; 2], resolution: [f32; 2]) -> [f32; 2] {
    let zero_to_one = [position[0] / resolution[0], position[1] / resolution[1]];
    let clip = [zero_to_one[0] * 2.0 - 1.0, zero_to_one[1] * 2.0 - 1.0];
    [clip[0], -clip[1]]
}

/// Signed area of a 2D triangle; positive for counter-clockwise winding.
pub fn triangle_area(a: [f32; 2], b: [f32; 2], c: [f32; 2]) -> f32 {
    0.5 * ((b[0] - a[0]) * (c[1] - a[1]) - (c[0] - a[0]) * (b[1] - a[1]))
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f32 = 1e-6;

    #[test]
    fn normalize_maps_byte_range_to_unit_interval() {
        assert_eq!(normalize_u8(255), 1.0);
        assert_eq!(normalize_u8(0), 0.0);
        assert!((normalize_u8(127) - 0.498_039_2).abs() < EPSILON);
    }

    #[test]
    fn fract_is_identity_inside_unit_interval() {
        for value in [0.0_f32, 0.25, 0.5, 0.999] {
            assert_eq!(fract_wrap(value), value);
        }
    }

    #[test]
    fn fract_wraps_outside_unit_interval() {
        assert!((fract_wrap(1.3) - 0.3).abs() < 1e-5);
        assert!((fract_wrap(-0.1) - 0.9).abs() < 1e-5);
        assert!((fract_wrap(-1.1) - 0.9).abs() < 1e-5);
        assert_eq!(fract_wrap(2.0), 0.0);
    }

    #[test]
    fn fract_never_returns_one() {
        let wrapped = fract_wrap(-f32::EPSILON * 0.25);
        assert!((0.0..1.0).contains(&wrapped));
    }

    #[test]
    fn fract_wrap2_wraps_each_component() {
        let [u, v] = fract_wrap2([1.25, -0.75]);
        assert!((u - 0.25).abs() < EPSILON);
        assert!((v - 0.25).abs() < EPSILON);
    }

    #[test]
    fn top_left_pixel_maps_to_upper_left_clip_corner() {
        assert_eq!(pixel_to_clip([0.0, 0.0], [400.0, 300.0]), [-1.0, 1.0]);
        assert_eq!(pixel_to_clip([400.0, 300.0], [400.0, 300.0]), [1.0, -1.0]);
        assert_eq!(pixel_to_clip([200.0, 150.0], [400.0, 300.0]), [0.0, 0.0]);
    }

    #[test]
    fn triangle_area_tracks_winding() {
        let ccw = triangle_area([0.0, 0.0], [1.0, 0.0], [0.0, 1.0]);
        let cw = triangle_area([0.0, 0.0], [0.0, 1.0], [1.0, 0.0]);
        assert!((ccw - 0.5).abs() < EPSILON);
        assert!((cw + 0.5).abs() < EPSILON);
    }
}
