//! Per-frame uniform values.
//!
//! [`UniformBinder`] mirrors every uniform block of a pipeline as a CPU
//! staging buffer. Values are written at the member offsets reflected at link
//! time and the staging bytes are uploaded once per frame.

use crate::program::{Location, Pipeline, UniformKind};

/// A value destined for a uniform member.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    Float(f32),
    Vec2([f32; 2]),
    Vec3([f32; 3]),
    Vec4([f32; 4]),
    Int(i32),
    Uint(u32),
    Mat4([[f32; 4]; 4]),
}

impl UniformValue {
    pub fn kind(&self) -> UniformKind {
        match self {
            UniformValue::Float(_) => UniformKind::Float,
            UniformValue::Vec2(_) => UniformKind::Vec2,
            UniformValue::Vec3(_) => UniformKind::Vec3,
            UniformValue::Vec4(_) => UniformKind::Vec4,
            UniformValue::Int(_) => UniformKind::Int,
            UniformValue::Uint(_) => UniformKind::Uint,
            UniformValue::Mat4(_) => UniformKind::Mat4,
        }
    }

    fn write_to(&self, dst: &mut [u8]) {
        match self {
            UniformValue::Float(value) => dst.copy_from_slice(bytemuck::bytes_of(value)),
            UniformValue::Vec2(value) => dst.copy_from_slice(bytemuck::cast_slice(value)),
            UniformValue::Vec3(value) => dst.copy_from_slice(bytemuck::cast_slice(value)),
            UniformValue::Vec4(value) => dst.copy_from_slice(bytemuck::cast_slice(value)),
            UniformValue::Int(value) => dst.copy_from_slice(bytemuck::bytes_of(value)),
            UniformValue::Uint(value) => dst.copy_from_slice(bytemuck::bytes_of(value)),
            UniformValue::Mat4(value) => dst.copy_from_slice(bytemuck::cast_slice(value)),
        }
    }
}

/// Outcome of [`UniformBinder::set`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binding {
    Written,
    /// The pipeline does not use the name.
    Skipped,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum UniformError {
    #[error("uniform `{name}` is a {expected:?}, cannot set it from a {actual:?}")]
    KindMismatch {
        name: String,
        expected: UniformKind,
        actual: UniformKind,
    },
}

/// A uniform member resolved against a pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformDescriptor {
    pub name: String,
    /// Byte offset of the member inside its block.
    pub location: Location,
    pub kind: UniformKind,
    pub block: (u32, u32),
}

/// CPU copy of one uniform buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformStaging {
    pub group: u32,
    pub binding: u32,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Default)]
pub struct UniformBinder {
    descriptors: Vec<UniformDescriptor>,
    blocks: Vec<UniformStaging>,
}

impl UniformBinder {
    /// Resolves every member of every uniform block of `pipeline` and
    /// allocates zeroed staging buffers for them.
    pub fn for_pipeline(pipeline: &Pipeline) -> Self {
        let mut descriptors = Vec::new();
        let mut blocks = Vec::new();
        for block in pipeline.uniform_blocks() {
            for member in &block.members {
                descriptors.push(UniformDescriptor {
                    name: member.name.clone(),
                    location: Location::Found(member.offset),
                    kind: member.kind,
                    block: (block.group, block.binding),
                });
            }
            blocks.push(UniformStaging {
                group: block.group,
                binding: block.binding,
                bytes: vec![0; block.size as usize],
            });
        }
        Self {
            descriptors,
            blocks,
        }
    }

    pub fn location(&self, name: &str) -> Location {
        self.descriptor(name)
            .map_or(Location::NotFound, |descriptor| descriptor.location)
    }

    pub fn descriptor(&self, name: &str) -> Option<&UniformDescriptor> {
        self.descriptors.iter().find(|descriptor| descriptor.name == name)
    }

    pub fn descriptors(&self) -> &[UniformDescriptor] {
        &self.descriptors
    }

    /// Writes `value` into the staging copy of the block that holds `name`.
    pub fn set(&mut self, name: &str, value: UniformValue) -> Result<Binding, UniformError> {
        let Some(descriptor) = self.descriptors.iter().find(|descriptor| descriptor.name == name)
        else {
            tracing::debug!(uniform = name, "uniform not used by pipeline; skipping");
            return Ok(Binding::Skipped);
        };
        let Location::Found(offset) = descriptor.location else {
            return Ok(Binding::Skipped);
        };
        if descriptor.kind != value.kind() {
            return Err(UniformError::KindMismatch {
                name: name.to_owned(),
                expected: descriptor.kind,
                actual: value.kind(),
            });
        }

        let (group, binding) = descriptor.block;
        let Some(staging) = self
            .blocks
            .iter_mut()
            .find(|block| block.group == group && block.binding == binding)
        else {
            return Ok(Binding::Skipped);
        };
        let start = offset as usize;
        let end = start + value.kind().size();
        let Some(dst) = staging.bytes.get_mut(start..end) else {
            return Ok(Binding::Skipped);
        };
        value.write_to(dst);
        Ok(Binding::Written)
    }

    pub fn blocks(&self) -> &[UniformStaging] {
        &self.blocks
    }
}
