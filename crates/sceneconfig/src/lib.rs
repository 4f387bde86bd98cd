use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SceneKind {
    #[default]
    ColoredQuad,
    ScrollingTexture,
}

impl SceneKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SceneKind::ColoredQuad => "colored-quad",
            SceneKind::ScrollingTexture => "scrolling-texture",
        }
    }
}

impl fmt::Display for SceneKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scene file contents. Every field is optional; command-line flags fill in
/// or override whatever the file leaves out.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SceneConfig {
    #[serde(default)]
    pub scene: Option<SceneKind>,
    #[serde(default)]
    pub image: Option<PathBuf>,
    #[serde(default)]
    pub vertex_shader: Option<PathBuf>,
    #[serde(default)]
    pub fragment_shader: Option<PathBuf>,
    /// Texture widths scrolled per millisecond.
    #[serde(default)]
    pub time_scale: Option<f64>,
    /// Per-axis multiplier on the scroll offset.
    #[serde(default)]
    pub scroll: Option<[f64; 2]>,
    /// Clear color as RGBA bytes.
    #[serde(default)]
    pub clear_color: Option<[u8; 4]>,
    #[serde(default)]
    pub fps: Option<f32>,
    #[serde(
        default,
        deserialize_with = "deserialize_size_opt",
        serialize_with = "serialize_size_opt"
    )]
    pub size: Option<(u32, u32)>,
    #[serde(default)]
    pub title: Option<String>,
}

/// Parses a `WIDTHxHEIGHT` surface size such as `800x600`.
pub fn parse_size(raw: &str) -> Result<(u32, u32), String> {
    let normalized = raw.trim().to_ascii_lowercase();
    let (width, height) = normalized
        .split_once('x')
        .ok_or_else(|| format!("invalid size '{raw}'; expected WIDTHxHEIGHT"))?;
    let width: u32 = width
        .trim()
        .parse()
        .map_err(|err| format!("invalid width in '{raw}': {err}"))?;
    let height: u32 = height
        .trim()
        .parse()
        .map_err(|err| format!("invalid height in '{raw}': {err}"))?;
    if width == 0 || height == 0 {
        return Err(format!("size '{raw}' must be non-zero in both dimensions"));
    }
    Ok((width, height))
}

fn deserialize_size_opt<'de, D>(deserializer: D) -> Result<Option<(u32, u32)>, D::Error>
where
    D: Deserializer<'de>,
{
    struct Visitor;
    impl<'de> de::Visitor<'de> for Visitor {
        type Value = Option<(u32, u32)>;

        fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
            formatter.write_str("a size such as \"800x600\" or [800, 600]")
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            parse_size(v).map(Some).map_err(E::custom)
        }

        fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
        where
            A: de::SeqAccess<'de>,
        {
            let width: u32 = seq
                .next_element()?
                .ok_or_else(|| de::Error::invalid_length(0, &self))?;
            let height: u32 = seq
                .next_element()?
                .ok_or_else(|| de::Error::invalid_length(1, &self))?;
            if seq.next_element::<u32>()?.is_some() {
                return Err(de::Error::invalid_length(3, &self));
            }
            Ok(Some((width, height)))
        }

        fn visit_none<E>(self) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(None)
        }

        fn visit_unit<E>(self) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(None)
        }
    }

    deserializer.deserialize_any(Visitor)
}

fn serialize_size_opt<S>(size: &Option<(u32, u32)>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    match size {
        Some((width, height)) => serializer.serialize_str(&format!("{width}x{height}")),
        None => serializer.serialize_none(),
    }
}

impl SceneConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let raw: SceneConfig = toml::from_str(input)?;
        raw.validate_fields()?;
        Ok(raw)
    }

    /// Reads `path` and range-checks its fields. Relative file references
    /// inside it are resolved against the file's directory. Completeness is
    /// left to [`SceneConfig::validate`] once flags have been layered on top.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&text)?;
        Ok(match path.parent() {
            Some(base) => config.relative_to(base),
            None => config,
        })
    }

    pub fn scene_kind(&self) -> SceneKind {
        self.scene.unwrap_or_default()
    }

    /// Rewrites relative `image` and shader paths to sit under `base`.
    pub fn relative_to(mut self, base: &Path) -> Self {
        for path in [
            &mut self.image,
            &mut self.vertex_shader,
            &mut self.fragment_shader,
        ]
        .into_iter()
        .flatten()
        {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
        self
    }

    /// Full check of a merged configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.scene_kind() == SceneKind::ScrollingTexture && self.image.is_none() {
            return Err(ConfigError::Invalid(
                "scene 'scrolling-texture' requires an image".into(),
            ));
        }
        self.validate_fields()
    }

    /// Checks each field on its own, ignoring what other fields are absent.
    pub fn validate_fields(&self) -> Result<(), ConfigError> {
        if let Some(time_scale) = self.time_scale {
            if !time_scale.is_finite() || time_scale < 0.0 {
                return Err(ConfigError::Invalid(
                    "time_scale must be a finite value >= 0".into(),
                ));
            }
        }

        if let Some(scroll) = self.scroll {
            if scroll.iter().any(|axis| !axis.is_finite()) {
                return Err(ConfigError::Invalid("scroll axes must be finite".into()));
            }
        }

        if let Some(fps) = self.fps {
            if !fps.is_finite() || fps < 0.0 {
                return Err(ConfigError::Invalid("fps must be >= 0".into()));
            }
        }

        if let Some((width, height)) = self.size {
            if width == 0 || height == 0 {
                return Err(ConfigError::Invalid(
                    "size must be non-zero in both dimensions".into(),
                ));
            }
        }

        for (field, path) in [
            ("vertex_shader", &self.vertex_shader),
            ("fragment_shader", &self.fragment_shader),
            ("image", &self.image),
        ] {
            if path.as_ref().is_some_and(|path| path.as_os_str().is_empty()) {
                return Err(ConfigError::Invalid(format!("{field} may not be empty")));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
scene = "scrolling-texture"
image = "textures/leaves.png"
fragment_shader = "shaders/scroll.frag"
time_scale = 0.001
scroll = [1.0, 0.0]
clear_color = [16, 16, 32, 255]
fps = 30
size = "640x480"
"#;

    #[test]
    fn parses_sample_config() {
        let config = SceneConfig::from_toml_str(SAMPLE).expect("parse config");
        assert_eq!(config.scene_kind(), SceneKind::ScrollingTexture);
        assert_eq!(config.image.as_deref(), Some(Path::new("textures/leaves.png")));
        assert_eq!(config.time_scale, Some(0.001));
        assert_eq!(config.scroll, Some([1.0, 0.0]));
        assert_eq!(config.clear_color, Some([16, 16, 32, 255]));
        assert_eq!(config.fps, Some(30.0));
        assert_eq!(config.size, Some((640, 480)));
        assert!(config.vertex_shader.is_none());
    }

    #[test]
    fn empty_file_defaults_to_colored_quad() {
        let config = SceneConfig::from_toml_str("").expect("parse config");
        assert_eq!(config.scene_kind(), SceneKind::ColoredQuad);
        assert_eq!(config, SceneConfig::default());
    }

    #[test]
    fn size_accepts_arrays() {
        let config = SceneConfig::from_toml_str("size = [800, 600]").expect("parse config");
        assert_eq!(config.size, Some((800, 600)));
    }

    #[test]
    fn texture_scene_without_image_parses_but_is_incomplete() {
        let config =
            SceneConfig::from_toml_str(r#"scene = "scrolling-texture""#).expect("parse config");
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let completed = SceneConfig {
            image: Some(PathBuf::from("leaves.png")),
            ..config
        };
        assert!(completed.validate().is_ok());
    }

    #[test]
    fn rejects_negative_time_scale() {
        let err = SceneConfig::from_toml_str("time_scale = -1.0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_unknown_scene_and_fields() {
        let err = SceneConfig::from_toml_str(r#"scene = "cube""#).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        let err = SceneConfig::from_toml_str("antialias = 4").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn rejects_malformed_size() {
        assert!(SceneConfig::from_toml_str(r#"size = "800""#).is_err());
        assert!(SceneConfig::from_toml_str(r#"size = "0x600""#).is_err());
        assert!(SceneConfig::from_toml_str("size = [1, 2, 3]").is_err());
    }

    #[test]
    fn parse_size_is_lenient_about_case_and_spaces() {
        assert_eq!(parse_size(" 1920X1080 "), Ok((1920, 1080)));
        assert!(parse_size("widexhigh").is_err());
    }

    #[test]
    fn load_resolves_paths_next_to_the_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("scene.toml");
        fs::write(&path, SAMPLE).expect("write config");

        let config = SceneConfig::load(&path).expect("load config");
        assert_eq!(config.image, Some(dir.path().join("textures/leaves.png")));
        assert_eq!(
            config.fragment_shader,
            Some(dir.path().join("shaders/scroll.frag"))
        );
    }

    #[test]
    fn load_reports_missing_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = SceneConfig::load(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
