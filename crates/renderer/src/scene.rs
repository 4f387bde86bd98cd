//! Scene descriptions and the two built-in scenes.
//!
//! A [`SceneSpec`] is everything `Session::build` needs: the two shader
//! stages, the attribute streams, optional index data, an optional texture
//! and the uniforms the frame driver refreshes every tick.

use crate::attributes::AttributeLayout;
use crate::geometry::{IndexData, VertexData};
use crate::reference::{fract_wrap2, normalize_u8};
use crate::shader::ShaderSource;
use crate::texture::DecodedImage;

pub const COLORED_QUAD_VERTEX: &str = r"#version 450
layout(location = 0) in vec2 a_position;
layout(location = 1) in vec4 a_color;

layout(location = 0) out vec4 v_color;

void main() {
    v_color = a_color;
    gl_Position = vec4(a_position, 0.0, 1.0);
}
";

pub const COLORED_QUAD_FRAGMENT: &str = r"#version 450
layout(location = 0) in vec4 v_color;

layout(location = 0) out vec4 outColor;

void main() {
    outColor = v_color;
}
";

pub const SCROLLING_TEXTURE_VERTEX: &str = r"#version 450
layout(location = 0) in vec2 a_position;
layout(location = 1) in vec2 a_texCoord;

layout(set = 0, binding = 0) uniform Globals {
    vec2 u_resolution;
    vec2 u_off;
} globals;

layout(location = 0) out vec2 v_texCoord;

void main() {
    vec2 zeroToOne = a_position / globals.u_resolution;
    vec2 zeroToTwo = zeroToOne * 2.0;
    vec2 clipSpace = zeroToTwo - 1.0;
    gl_Position = vec4(clipSpace * vec2(1.0, -1.0), 0.0, 1.0);
    v_texCoord = a_texCoord;
}
";

pub const SCROLLING_TEXTURE_FRAGMENT: &str = r"#version 450
layout(location = 0) in vec2 v_texCoord;

layout(set = 0, binding = 0) uniform Globals {
    vec2 u_resolution;
    vec2 u_off;
} globals;

layout(set = 1, binding = 0) uniform texture2D u_image;
layout(set = 1, binding = 1) uniform sampler u_sampler;

layout(location = 0) out vec4 outColor;

void main() {
    vec2 uv = fract(v_texCoord + globals.u_off);
    outColor = texture(sampler2D(u_image, u_sampler), uv);
}
";

/// Uniform names the built-in scenes use.
pub const RESOLUTION_UNIFORM: &str = "u_resolution";
pub const OFFSET_UNIFORM: &str = "u_off";

/// Default scroll speed, in UV units per millisecond.
pub const DEFAULT_TIME_SCALE: f32 = 0.0005;

/// Framebuffer clear color with components in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClearColor {
    pub r: f64,
    pub g: f64,
    pub b: f64,
    pub a: f64,
}

impl ClearColor {
    pub const OPAQUE_BLACK: ClearColor = ClearColor {
        r: 0.0,
        g: 0.0,
        b: 0.0,
        a: 1.0,
    };

    /// Normalizes 8-bit channels.
    pub fn from_rgba8([r, g, b, a]: [u8; 4]) -> Self {
        Self {
            r: f64::from(normalize_u8(r)),
            g: f64::from(normalize_u8(g)),
            b: f64::from(normalize_u8(b)),
            a: f64::from(normalize_u8(a)),
        }
    }
}

impl Default for ClearColor {
    fn default() -> Self {
        Self::OPAQUE_BLACK
    }
}

/// Time-driven UV offset.
#[derive(Debug, Clone, PartialEq)]
pub struct ScrollAnimation {
    pub uniform: String,
    /// UV units per millisecond.
    pub time_scale: f32,
    /// Per-axis multiplier; `(1, 1)` scrolls diagonally.
    pub axes: [f32; 2],
}

impl ScrollAnimation {
    /// Offset after `elapsed_ms`, wrapped into `[0, 1)`.
    pub fn offset_at(&self, elapsed_ms: f64) -> [f32; 2] {
        // wrap in f64 first so long sessions keep their precision
        let travelled = elapsed_ms * f64::from(self.time_scale);
        fract_wrap2(
            self.axes
                .map(|axis| (travelled * f64::from(axis)).rem_euclid(1.0) as f32),
        )
    }
}

impl Default for ScrollAnimation {
    fn default() -> Self {
        Self {
            uniform: OFFSET_UNIFORM.to_owned(),
            time_scale: DEFAULT_TIME_SCALE,
            axes: [1.0, 1.0],
        }
    }
}

/// One vertex attribute and the data that feeds it.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeStream {
    pub name: String,
    pub data: VertexData,
    pub layout: AttributeLayout,
}

impl AttributeStream {
    pub fn new(name: impl Into<String>, data: VertexData, layout: AttributeLayout) -> Self {
        Self {
            name: name.into(),
            data,
            layout,
        }
    }

    pub fn vertex_count(&self) -> u32 {
        self.layout.vertex_count(self.data.byte_len())
    }
}

/// Image bound to a texture slot, and optionally the sampler slot next to it.
#[derive(Debug, Clone, PartialEq)]
pub struct TextureInput {
    pub image: DecodedImage,
    pub texture: String,
    pub sampler: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SceneSpec {
    pub name: String,
    pub vertex: ShaderSource,
    pub fragment: ShaderSource,
    pub attributes: Vec<AttributeStream>,
    pub indices: Option<IndexData>,
    pub texture: Option<TextureInput>,
    /// Uniform that receives the surface size in pixels every frame.
    pub resolution_uniform: Option<String>,
    pub animation: Option<ScrollAnimation>,
    pub clear_color: ClearColor,
}

impl SceneSpec {
    /// Vertices available to a draw: the shortest attribute stream.
    pub fn vertex_count(&self) -> u32 {
        self.attributes
            .iter()
            .map(AttributeStream::vertex_count)
            .min()
            .unwrap_or(0)
    }

    pub fn with_shaders(mut self, vertex: Option<String>, fragment: Option<String>) -> Self {
        if let Some(text) = vertex {
            self.vertex = ShaderSource::vertex(text);
        }
        if let Some(text) = fragment {
            self.fragment = ShaderSource::fragment(text);
        }
        self
    }

    pub fn with_clear_color(mut self, color: ClearColor) -> Self {
        self.clear_color = color;
        self
    }
}

/// Indexed quad in clip space with a normalized byte color per corner.
pub fn colored_quad() -> SceneSpec {
    let positions = vec![0.0, 0.0, 0.0, 0.5, 0.7, 0.0, 0.7, 0.5];
    let colors = vec![
        255, 0, 127, 255, //
        127, 255, 0, 255, //
        0, 127, 255, 255, //
        255, 127, 127, 255,
    ];
    SceneSpec {
        name: "colored-quad".to_owned(),
        vertex: ShaderSource::vertex(COLORED_QUAD_VERTEX),
        fragment: ShaderSource::fragment(COLORED_QUAD_FRAGMENT),
        attributes: vec![
            AttributeStream::new(
                "a_position",
                VertexData::F32(positions),
                AttributeLayout::float(2),
            ),
            AttributeStream::new(
                "a_color",
                VertexData::U8(colors),
                AttributeLayout::normalized_u8(4),
            ),
        ],
        indices: Some(IndexData::new(vec![0, 1, 2, 2, 1, 3])),
        texture: None,
        resolution_uniform: None,
        animation: None,
        clear_color: ClearColor::OPAQUE_BLACK,
    }
}

/// Pixel-space rectangle the size of `image`, sampled through a scrolling,
/// wrapping UV offset.
pub fn scrolling_texture(image: DecodedImage, animation: ScrollAnimation) -> SceneSpec {
    let (w, h) = (image.width() as f32, image.height() as f32);
    SceneSpec {
        name: "scrolling-texture".to_owned(),
        vertex: ShaderSource::vertex(SCROLLING_TEXTURE_VERTEX),
        fragment: ShaderSource::fragment(SCROLLING_TEXTURE_FRAGMENT),
        attributes: vec![
            AttributeStream::new(
                "a_position",
                VertexData::F32(rectangle(0.0, 0.0, w, h)),
                AttributeLayout::float(2),
            ),
            AttributeStream::new(
                "a_texCoord",
                VertexData::F32(rectangle(0.0, 0.0, 1.0, 1.0)),
                AttributeLayout::float(2),
            ),
        ],
        indices: None,
        texture: Some(TextureInput {
            image,
            texture: "u_image".to_owned(),
            sampler: Some("u_sampler".to_owned()),
        }),
        resolution_uniform: Some(RESOLUTION_UNIFORM.to_owned()),
        animation: Some(animation),
        clear_color: ClearColor::OPAQUE_BLACK,
    }
}

/// Two triangles covering `(x, y) .. (x + width, y + height)`.
fn rectangle(x: f32, y: f32, width: f32, height: f32) -> Vec<f32> {
    let (x1, x2, y1, y2) = (x, x + width, y, y + height);
    vec![x1, y1, x2, y1, x1, y2, x1, y2, x2, y1, x2, y2]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::{pixel_to_clip, triangle_area};

    fn image(width: u32, height: u32) -> DecodedImage {
        DecodedImage::new(width, height, vec![255; (width * height * 4) as usize])
            .expect("valid image")
    }

    #[test]
    fn colored_quad_has_four_vertices_and_six_indices() {
        let scene = colored_quad();
        assert_eq!(scene.vertex_count(), 4);
        assert_eq!(scene.indices.as_ref().map(IndexData::len), Some(6));
        assert_eq!(scene.clear_color, ClearColor::OPAQUE_BLACK);
    }

    #[test]
    fn scrolling_texture_covers_the_image_rectangle() {
        let scene = scrolling_texture(image(200, 100), ScrollAnimation::default());
        assert_eq!(scene.vertex_count(), 6);
        assert!(scene.indices.is_none());

        let VertexData::F32(positions) = &scene.attributes[0].data else {
            panic!("positions are f32");
        };
        let corners: Vec<[f32; 2]> = positions.chunks_exact(2).map(|p| [p[0], p[1]]).collect();
        let area: f32 = corners
            .chunks_exact(3)
            .map(|t| triangle_area(t[0], t[1], t[2]).abs())
            .sum();
        assert_eq!(area, 200.0 * 100.0);
        assert_eq!(pixel_to_clip(corners[0], [400.0, 300.0]), [-1.0, 1.0]);
    }

    #[test]
    fn clear_color_bytes_normalize() {
        assert_eq!(ClearColor::from_rgba8([0, 0, 0, 255]), ClearColor::OPAQUE_BLACK);
    }

    #[test]
    fn offset_advances_then_wraps() {
        let animation = ScrollAnimation::default();
        assert_eq!(animation.offset_at(0.0), [0.0, 0.0]);
        let [u, v] = animation.offset_at(1000.0);
        assert!((u - 0.5).abs() < 1e-6);
        assert_eq!(u, v);
        let [u, _] = animation.offset_at(2000.0);
        assert!(u < 1e-6);
        let [u, _] = animation.offset_at(2500.0);
        assert!((u - 0.25).abs() < 1e-6);
    }

    #[test]
    fn offset_follows_configured_axes() {
        let animation = ScrollAnimation {
            axes: [1.0, 0.0],
            ..ScrollAnimation::default()
        };
        let [u, v] = animation.offset_at(500.0);
        assert!((u - 0.25).abs() < 1e-6);
        assert_eq!(v, 0.0);
    }

    #[test]
    fn shader_overrides_replace_sources() {
        let scene = colored_quad().with_shaders(None, Some("void main() {}".to_owned()));
        assert_eq!(scene.vertex.text, COLORED_QUAD_VERTEX);
        assert_eq!(scene.fragment.text, "void main() {}");
    }
}
