//! Vertex attribute resolution and binding.
//!
//! Attributes are resolved by name against the linked pipeline once, at
//! session build time. Each resolved attribute gets its own vertex buffer
//! slot; the device pipeline bakes the format, stride and offset in, and the
//! buffers themselves are re-bound every frame.

use crate::device::BufferHandle;
use crate::frame::RenderCommand;
use crate::program::{Location, NumericClass, Pipeline};

/// Scalar type of one attribute component as stored in the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentType {
    F32,
    U8,
    I8,
    U16,
    I16,
    U32,
    I32,
}

impl ComponentType {
    pub fn size(self) -> u32 {
        match self {
            ComponentType::U8 | ComponentType::I8 => 1,
            ComponentType::U16 | ComponentType::I16 => 2,
            ComponentType::F32 | ComponentType::U32 | ComponentType::I32 => 4,
        }
    }
}

/// How an attribute's components are laid out in its buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributeLayout {
    pub components: u8,
    pub component_type: ComponentType,
    /// Integer components are mapped to `[0, 1]` (`[-1, 1]` when signed).
    pub normalize: bool,
    /// Bytes between consecutive records; 0 means tightly packed.
    pub stride: u32,
    /// Byte position of the first component within a record.
    pub offset: u32,
}

impl AttributeLayout {
    pub const fn float(components: u8) -> Self {
        Self {
            components,
            component_type: ComponentType::F32,
            normalize: false,
            stride: 0,
            offset: 0,
        }
    }

    pub const fn normalized_u8(components: u8) -> Self {
        Self {
            components,
            component_type: ComponentType::U8,
            normalize: true,
            stride: 0,
            offset: 0,
        }
    }

    pub fn packed_size(&self) -> u32 {
        u32::from(self.components) * self.component_type.size()
    }

    pub fn effective_stride(&self) -> u32 {
        if self.stride == 0 {
            self.packed_size()
        } else {
            self.stride
        }
    }

    /// Records that fit in a buffer of `byte_len` bytes.
    pub fn vertex_count(&self, byte_len: usize) -> u32 {
        let (offset, size) = (self.offset as usize, self.packed_size() as usize);
        let stride = self.effective_stride() as usize;
        if stride == 0 || byte_len < offset + size {
            return 0;
        }
        ((byte_len - offset - size) / stride + 1) as u32
    }

    /// Device vertex format for this layout.
    pub fn vertex_format(&self) -> Result<wgpu::VertexFormat, BindError> {
        use wgpu::VertexFormat as F;
        use ComponentType as C;

        let format = match (self.component_type, self.normalize, self.components) {
            (C::F32, _, 1) => F::Float32,
            (C::F32, _, 2) => F::Float32x2,
            (C::F32, _, 3) => F::Float32x3,
            (C::F32, _, 4) => F::Float32x4,
            (C::U8, true, 2) => F::Unorm8x2,
            (C::U8, true, 4) => F::Unorm8x4,
            (C::U8, false, 2) => F::Uint8x2,
            (C::U8, false, 4) => F::Uint8x4,
            (C::I8, true, 2) => F::Snorm8x2,
            (C::I8, true, 4) => F::Snorm8x4,
            (C::I8, false, 2) => F::Sint8x2,
            (C::I8, false, 4) => F::Sint8x4,
            (C::U16, true, 2) => F::Unorm16x2,
            (C::U16, true, 4) => F::Unorm16x4,
            (C::U16, false, 2) => F::Uint16x2,
            (C::U16, false, 4) => F::Uint16x4,
            (C::I16, true, 2) => F::Snorm16x2,
            (C::I16, true, 4) => F::Snorm16x4,
            (C::I16, false, 2) => F::Sint16x2,
            (C::I16, false, 4) => F::Sint16x4,
            (C::U32, false, 1) => F::Uint32,
            (C::U32, false, 2) => F::Uint32x2,
            (C::U32, false, 3) => F::Uint32x3,
            (C::U32, false, 4) => F::Uint32x4,
            (C::I32, false, 1) => F::Sint32,
            (C::I32, false, 2) => F::Sint32x2,
            (C::I32, false, 3) => F::Sint32x3,
            (C::I32, false, 4) => F::Sint32x4,
            _ => return Err(BindError::UnsupportedLayout(*self)),
        };
        Ok(format)
    }

    /// Numeric class the shader sees after fetch.
    fn fetched_class(&self) -> NumericClass {
        match (self.component_type, self.normalize) {
            (ComponentType::F32, _) | (_, true) => NumericClass::Float,
            (ComponentType::U8 | ComponentType::U16 | ComponentType::U32, false) => {
                NumericClass::Uint
            }
            (ComponentType::I8 | ComponentType::I16 | ComponentType::I32, false) => {
                NumericClass::Sint
            }
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum BindError {
    #[error("unsupported attribute layout {0:?}")]
    UnsupportedLayout(AttributeLayout),
    #[error("attribute `{name}` is declared as {declared:?} but its buffer fetches {fetched:?}")]
    ClassMismatch {
        name: String,
        declared: NumericClass,
        fetched: NumericClass,
    },
}

/// A named attribute resolved against a pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeDescriptor {
    pub name: String,
    pub location: Location,
    pub layout: AttributeLayout,
    pub format: wgpu::VertexFormat,
    /// Vertex buffer slot; only resolved attributes get one.
    pub slot: Option<u32>,
    pub buffer: BufferHandle,
}

impl AttributeDescriptor {
    pub fn is_active(&self) -> bool {
        self.slot.is_some()
    }
}

/// Attribute table for one pipeline.
#[derive(Debug, Clone, Default)]
pub struct AttributeBinder {
    descriptors: Vec<AttributeDescriptor>,
}

impl AttributeBinder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves `name` and records how `buffer` feeds it.
    ///
    /// A name the pipeline does not use resolves to [`Location::NotFound`];
    /// the descriptor is kept but never bound.
    pub fn resolve(
        &mut self,
        pipeline: &Pipeline,
        name: &str,
        buffer: BufferHandle,
        layout: AttributeLayout,
    ) -> Result<&AttributeDescriptor, BindError> {
        let format = layout.vertex_format()?;
        let location = pipeline.attribute_location(name);
        if let Some(input) = pipeline.vertex_input(name) {
            let fetched = layout.fetched_class();
            if input.class != fetched {
                return Err(BindError::ClassMismatch {
                    name: name.to_owned(),
                    declared: input.class,
                    fetched,
                });
            }
        }

        let slot = match location {
            Location::Found(_) => Some(self.active().count() as u32),
            Location::NotFound => {
                tracing::debug!(attribute = name, "attribute not used by pipeline; skipping");
                None
            }
        };
        self.descriptors.push(AttributeDescriptor {
            name: name.to_owned(),
            location,
            layout,
            format,
            slot,
            buffer,
        });
        let index = self.descriptors.len() - 1;
        Ok(&self.descriptors[index])
    }

    pub fn descriptors(&self) -> &[AttributeDescriptor] {
        &self.descriptors
    }

    pub fn get(&self, name: &str) -> Option<&AttributeDescriptor> {
        self.descriptors.iter().find(|descriptor| descriptor.name == name)
    }

    /// Descriptors with a resolved location, in slot order.
    pub fn active(&self) -> impl Iterator<Item = &AttributeDescriptor> {
        self.descriptors.iter().filter(|descriptor| descriptor.is_active())
    }

    /// One `BindAttribute` per resolved attribute.
    pub fn bind_commands(&self) -> impl Iterator<Item = RenderCommand> + '_ {
        self.descriptors.iter().filter_map(|descriptor| {
            descriptor.slot.map(|slot| RenderCommand::BindAttribute {
                slot,
                buffer: descriptor.buffer,
            })
        })
    }
}
