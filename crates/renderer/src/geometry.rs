//! Static vertex and index data.

use crate::device::{BufferHandle, BufferKind, BufferUpload, DeviceError, RenderDevice};

/// Per-vertex component stream as supplied by a scene.
#[derive(Debug, Clone, PartialEq)]
pub enum VertexData {
    F32(Vec<f32>),
    U8(Vec<u8>),
}

impl VertexData {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            VertexData::F32(values) => bytemuck::cast_slice(values),
            VertexData::U8(values) => values,
        }
    }

    pub fn byte_len(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.byte_len() == 0
    }
}

/// Storage width of one index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum IndexWidth {
    U8,
    U16,
    U32,
}

impl IndexWidth {
    /// Smallest width able to hold `max_index`.
    pub fn smallest_for(max_index: u32) -> Self {
        if max_index <= u32::from(u8::MAX) {
            IndexWidth::U8
        } else if max_index <= u32::from(u16::MAX) {
            IndexWidth::U16
        } else {
            IndexWidth::U32
        }
    }

    pub fn max_value(self) -> u32 {
        match self {
            IndexWidth::U8 => u32::from(u8::MAX),
            IndexWidth::U16 => u32::from(u16::MAX),
            IndexWidth::U32 => u32::MAX,
        }
    }

    pub fn byte_size(self) -> usize {
        match self {
            IndexWidth::U8 => 1,
            IndexWidth::U16 => 2,
            IndexWidth::U32 => 4,
        }
    }
}

/// Element indices with the width they are stored at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexData {
    width: IndexWidth,
    indices: Vec<u32>,
}

impl IndexData {
    /// Stores `indices` at the smallest width that represents them.
    pub fn new(indices: Vec<u32>) -> Self {
        let max = indices.iter().copied().max().unwrap_or(0);
        Self {
            width: IndexWidth::smallest_for(max),
            indices,
        }
    }

    /// Stores `indices` at an explicit width; checked on upload.
    pub fn with_width(indices: Vec<u32>, width: IndexWidth) -> Self {
        Self { width, indices }
    }

    pub fn width(&self) -> IndexWidth {
        self.width
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn max_index(&self) -> Option<u32> {
        self.indices.iter().copied().max()
    }

    /// Checks the indices against a vertex buffer of `vertex_count` entries.
    pub fn validate(&self, vertex_count: u32) -> Result<(), GeometryError> {
        if let Some((position, &index)) = self
            .indices
            .iter()
            .enumerate()
            .find(|(_, index)| **index >= vertex_count)
        {
            return Err(GeometryError::IndexOutOfRange {
                position,
                index,
                vertex_count,
            });
        }
        let Some(max) = self.max_index() else {
            return Ok(());
        };
        if max > self.width.max_value() {
            return Err(GeometryError::IndexWidthTooNarrow {
                width: self.width,
                max_index: max,
            });
        }
        let smallest = IndexWidth::smallest_for(max);
        if self.width > smallest {
            tracing::debug!(
                width = ?self.width,
                smallest = ?smallest,
                "index width is wider than required"
            );
        }
        Ok(())
    }

    /// Little-endian packing at the stored width.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.indices.len() * self.width.byte_size());
        for &index in &self.indices {
            match self.width {
                IndexWidth::U8 => bytes.push(index as u8),
                IndexWidth::U16 => bytes.extend_from_slice(&(index as u16).to_le_bytes()),
                IndexWidth::U32 => bytes.extend_from_slice(&index.to_le_bytes()),
            }
        }
        bytes
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GeometryError {
    #[error("index {index} at position {position} is out of range for {vertex_count} vertices")]
    IndexOutOfRange {
        position: usize,
        index: u32,
        vertex_count: u32,
    },
    #[error("index {max_index} does not fit in {width:?} indices")]
    IndexWidthTooNarrow { width: IndexWidth, max_index: u32 },
    #[error("vertex buffer `{0}` is empty")]
    EmptyVertexData(String),
    #[error(transparent)]
    Device(#[from] DeviceError),
}

/// An uploaded index buffer plus what a draw needs to know about it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexBuffer {
    pub handle: BufferHandle,
    pub width: IndexWidth,
    pub count: u32,
}

pub fn upload_vertices<D: RenderDevice + ?Sized>(
    device: &mut D,
    label: &str,
    data: &VertexData,
) -> Result<BufferHandle, GeometryError> {
    if data.is_empty() {
        return Err(GeometryError::EmptyVertexData(label.to_owned()));
    }
    let handle = device.create_buffer(BufferUpload {
        label,
        kind: BufferKind::Vertex,
        contents: data.as_bytes(),
    })?;
    tracing::debug!(label, bytes = data.byte_len(), "uploaded vertex buffer");
    Ok(handle)
}

pub fn upload_indices<D: RenderDevice + ?Sized>(
    device: &mut D,
    label: &str,
    data: &IndexData,
    vertex_count: u32,
) -> Result<IndexBuffer, GeometryError> {
    data.validate(vertex_count)?;
    let contents = data.to_bytes();
    let handle = device.create_buffer(BufferUpload {
        label,
        kind: BufferKind::Index(data.width()),
        contents: &contents,
    })?;
    tracing::debug!(label, count = data.len(), width = ?data.width(), "uploaded index buffer");
    Ok(IndexBuffer {
        handle,
        width: data.width(),
        count: data.len() as u32,
    })
}

/// Groups a triangle-list index stream into triangles; a trailing partial
/// triangle is dropped the way the device drops it.
pub fn triangles(indices: &[u32]) -> Vec<[u32; 3]> {
    indices
        .chunks_exact(3)
        .map(|chunk| [chunk[0], chunk[1], chunk[2]])
        .collect()
}
