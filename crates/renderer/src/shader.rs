//! GLSL stage compilation.
//!
//! Sources are parsed with naga's GLSL frontend (the same one `wgpu` uses for
//! `ShaderSource::Glsl`) and validated before they are handed out, so a
//! [`CompiledShader`] always holds a module the device will accept. Failures
//! carry the rendered diagnostic and are reported on the tracing sink.

use std::fmt;

use wgpu::naga;
use wgpu::naga::front::glsl;
use wgpu::naga::valid::{Capabilities, ValidationFlags, Validator};

/// Programmable pipeline stage a source is written for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl ShaderStage {
    pub(crate) fn to_naga(self) -> naga::ShaderStage {
        match self {
            ShaderStage::Vertex => naga::ShaderStage::Vertex,
            ShaderStage::Fragment => naga::ShaderStage::Fragment,
        }
    }

    fn from_naga(stage: naga::ShaderStage) -> Option<Self> {
        match stage {
            naga::ShaderStage::Vertex => Some(ShaderStage::Vertex),
            naga::ShaderStage::Fragment => Some(ShaderStage::Fragment),
            _ => None,
        }
    }
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderStage::Vertex => f.write_str("vertex"),
            ShaderStage::Fragment => f.write_str("fragment"),
        }
    }
}

/// Immutable shader text tagged with its stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderSource {
    pub stage: ShaderStage,
    pub text: String,
}

impl ShaderSource {
    pub fn new(stage: ShaderStage, text: impl Into<String>) -> Self {
        Self {
            stage,
            text: text.into(),
        }
    }

    pub fn vertex(text: impl Into<String>) -> Self {
        Self::new(ShaderStage::Vertex, text)
    }

    pub fn fragment(text: impl Into<String>) -> Self {
        Self::new(ShaderStage::Fragment, text)
    }
}

/// Raised when a stage fails to parse or validate.
///
/// `log` is the human-readable diagnostic including the offending line.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{stage} shader failed to compile:\n{log}")]
pub struct CompileError {
    pub stage: ShaderStage,
    pub log: String,
}

/// A validated shader stage.
///
/// Holds the naga module together with the text it came from; the text is what
/// the device compiles when the pipeline is created.
#[derive(Debug, Clone)]
pub struct CompiledShader {
    stage: ShaderStage,
    source: String,
    module: naga::Module,
}

impl CompiledShader {
    pub fn stage(&self) -> ShaderStage {
        self.stage
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub(crate) fn module(&self) -> &naga::Module {
        &self.module
    }

    pub(crate) fn entry_point(&self) -> &naga::EntryPoint {
        // compile() guarantees exactly one entry point
        &self.module.entry_points[0]
    }
}

/// Compiles `source` as a stage of type `stage`.
pub fn compile(stage: ShaderStage, source: &str) -> Result<CompiledShader, CompileError> {
    let result = parse_and_validate(stage, source);
    match result {
        Ok(module) => {
            tracing::debug!(
                %stage,
                globals = module.global_variables.len(),
                functions = module.functions.len(),
                "compiled shader stage"
            );
            Ok(CompiledShader {
                stage,
                source: source.to_owned(),
                module,
            })
        }
        Err(log) => {
            tracing::error!(%stage, "shader compilation failed:\n{log}");
            Err(CompileError { stage, log })
        }
    }
}

/// Convenience wrapper over [`compile`] for a tagged source.
pub fn compile_source(source: &ShaderSource) -> Result<CompiledShader, CompileError> {
    compile(source.stage, &source.text)
}

fn parse_and_validate(
    stage: ShaderStage,
    source: &str,
) -> Result<naga::Module, String> {
    let mut frontend = glsl::Frontend::default();
    let options = glsl::Options::from(stage.to_naga());
    let module = frontend
        .parse(&options, source)
        .map_err(|errors| non_empty(errors.emit_to_string(source), "parse error"))?;

    match module.entry_points.as_slice() {
        [entry] => match ShaderStage::from_naga(entry.stage) {
            Some(found) if found == stage => {}
            found => {
                return Err(format!(
                    "entry point `{}` is a {} stage, expected {stage}",
                    entry.name,
                    found.map_or_else(|| format!("{:?}", entry.stage), |s| s.to_string())
                ));
            }
        },
        [] => return Err(format!("no `main` entry point found for {stage} stage")),
        many => {
            return Err(format!(
                "expected a single entry point, found {}",
                many.len()
            ))
        }
    }

    let mut validator = Validator::new(ValidationFlags::all(), Capabilities::all());
    validator
        .validate(&module)
        .map_err(|error| non_empty(error.emit_to_string(source), "validation error"))?;
    Ok(module)
}

fn non_empty(log: String, fallback: &str) -> String {
    if log.trim().is_empty() {
        fallback.to_owned()
    } else {
        log
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VERTEX: &str = r"#version 450
layout(location = 0) in vec2 a_position;
void main() {
    gl_Position = vec4(a_position, 0.0, 1.0);
}
";

    const FRAGMENT: &str = r"#version 450
layout(location = 0) out vec4 outColor;
void main() {
    outColor = vec4(1.0, 0.0, 0.0, 1.0);
}
";

    #[test]
    fn compiles_valid_vertex_stage() {
        let shader = compile(ShaderStage::Vertex, VERTEX).expect("vertex compiles");
        assert_eq!(shader.stage(), ShaderStage::Vertex);
        assert_eq!(shader.source(), VERTEX);
    }

    #[test]
    fn compiles_valid_fragment_stage() {
        let shader = compile(ShaderStage::Fragment, FRAGMENT).expect("fragment compiles");
        assert_eq!(shader.stage(), ShaderStage::Fragment);
    }

    #[test]
    fn unmatched_brace_reports_log() {
        let broken = r"#version 450
layout(location = 0) out vec4 outColor;
void main() {
    outColor = vec4(1.0);
";
        let err = compile(ShaderStage::Fragment, broken).expect_err("missing brace must fail");
        assert_eq!(err.stage, ShaderStage::Fragment);
        assert!(!err.log.trim().is_empty());
        assert!(err.to_string().contains("fragment shader failed to compile"));
    }

    #[test]
    fn undeclared_identifier_reports_log() {
        let broken = r"#version 450
layout(location = 0) out vec4 outColor;
void main() {
    outColor = missing_value;
}
";
        let err = compile(ShaderStage::Fragment, broken).expect_err("unknown identifier");
        assert!(!err.log.is_empty());
    }

    #[test]
    fn compile_source_uses_stage_tag() {
        let source = ShaderSource::vertex(VERTEX);
        let shader = compile_source(&source).expect("compiles");
        assert_eq!(shader.stage(), ShaderStage::Vertex);
    }
}
