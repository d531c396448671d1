//! Vertex buffers and their GPU residency
//!
//! A [`VertexBuffer`] owns interleaved vertex data plus an index list on the
//! CPU side, and optionally a GPU handle mirroring it. The handle exists only
//! between [`VertexBuffer::create_gpu`] and [`VertexBuffer::destroy_gpu`];
//! CPU data survives both so a lost context can be restored without going
//! back to storage.

use std::ops::Range;

use bytemuck::{Pod, Zeroable};

use crate::backend::{BufferDescriptor, BufferUsage, GpuBufferHandle, GpuDevice, GpuResult, IndexFormat};
use crate::error::{RenderError, RenderResult};
use crate::assets::AssetError;

/// Vertex with position, texture coordinate and color
///
/// `#[repr(C)]` with only `f32` fields, so the layout has no padding and the
/// whole slice can be handed to the GPU as bytes.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    /// Position in model space
    pub position: [f32; 3],

    /// Texture coordinates
    pub tex_coord: [f32; 2],

    /// Per-vertex RGBA color
    pub color: [f32; 4],
}

impl Vertex {
    /// Opaque white
    pub const WHITE: [f32; 4] = [1.0, 1.0, 1.0, 1.0];

    /// Create a new vertex
    pub fn new(position: [f32; 3], tex_coord: [f32; 2], color: [f32; 4]) -> Self {
        Self {
            position,
            tex_coord,
            color,
        }
    }

    /// Create a white vertex
    pub fn textured(position: [f32; 3], tex_coord: [f32; 2]) -> Self {
        Self::new(position, tex_coord, Self::WHITE)
    }
}

/// Semantic of a vertex attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexAttributeKind {
    /// Model-space position
    Position,
    /// Texture coordinate
    TexCoord,
    /// Vertex color
    Color,
}

/// Component format of a vertex attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexFormat {
    /// Two 32-bit floats
    Float2,
    /// Three 32-bit floats
    Float3,
    /// Four 32-bit floats
    Float4,
}

impl VertexFormat {
    /// Size of the attribute in bytes
    pub const fn byte_size(self) -> usize {
        match self {
            Self::Float2 => 8,
            Self::Float3 => 12,
            Self::Float4 => 16,
        }
    }
}

/// One attribute inside an interleaved vertex
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexAttribute {
    /// Attribute semantic
    pub kind: VertexAttributeKind,
    /// Component format
    pub format: VertexFormat,
    /// Byte offset from the start of the vertex
    pub offset: usize,
}

/// Stride and attribute list of an interleaved vertex
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VertexLayout {
    /// Bytes between consecutive vertices
    pub stride: usize,
    /// Attributes in offset order
    pub attributes: Vec<VertexAttribute>,
}

impl VertexLayout {
    /// Layout matching [`Vertex`]
    pub fn standard() -> Self {
        Self {
            stride: std::mem::size_of::<Vertex>(),
            attributes: vec![
                VertexAttribute {
                    kind: VertexAttributeKind::Position,
                    format: VertexFormat::Float3,
                    offset: 0,
                },
                VertexAttribute {
                    kind: VertexAttributeKind::TexCoord,
                    format: VertexFormat::Float2,
                    offset: 12,
                },
                VertexAttribute {
                    kind: VertexAttributeKind::Color,
                    format: VertexFormat::Float4,
                    offset: 20,
                },
            ],
        }
    }
}

/// Primitive assembly mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PrimitiveTopology {
    /// Independent triangles
    #[default]
    Triangles,
    /// Independent line segments
    Lines,
}

impl PrimitiveTopology {
    /// Number of indices consumed per primitive
    pub const fn vertices_per_primitive(self) -> usize {
        match self {
            Self::Triangles => 3,
            Self::Lines => 2,
        }
    }
}

/// Index list stored at the narrowest width that fits
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexData {
    /// 16-bit indices
    U16(Vec<u16>),
    /// 32-bit indices
    U32(Vec<u32>),
}

impl IndexData {
    /// Pack indices as `u16` when every value fits
    pub fn from_indices(indices: Vec<u32>) -> Self {
        if indices.iter().all(|&index| index <= u32::from(u16::MAX)) {
            Self::U16(indices.into_iter().map(|index| index as u16).collect())
        } else {
            Self::U32(indices)
        }
    }

    /// Number of indices
    pub fn len(&self) -> usize {
        match self {
            Self::U16(indices) => indices.len(),
            Self::U32(indices) => indices.len(),
        }
    }

    /// Whether there are no indices
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Width of each index
    pub fn format(&self) -> IndexFormat {
        match self {
            Self::U16(_) => IndexFormat::U16,
            Self::U32(_) => IndexFormat::U32,
        }
    }

    /// Raw bytes for upload
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::U16(indices) => bytemuck::cast_slice(indices),
            Self::U32(indices) => bytemuck::cast_slice(indices),
        }
    }

    fn max_index(&self) -> Option<u32> {
        match self {
            Self::U16(indices) => indices.iter().max().map(|&index| u32::from(index)),
            Self::U32(indices) => indices.iter().max().copied(),
        }
    }
}

/// CPU vertex/index data with an optional GPU mirror
#[derive(Debug)]
pub struct VertexBuffer {
    label: String,
    vertices: Vec<Vertex>,
    indices: IndexData,
    layout: VertexLayout,
    topology: PrimitiveTopology,
    usage: BufferUsage,
    gpu_handle: Option<GpuBufferHandle>,
    dirty: Option<Range<usize>>,
}

impl VertexBuffer {
    /// Create a buffer, validating indices against the vertex count and topology
    pub fn new(
        label: impl Into<String>,
        vertices: Vec<Vertex>,
        indices: Vec<u32>,
        topology: PrimitiveTopology,
        usage: BufferUsage,
    ) -> Result<Self, AssetError> {
        let label = label.into();

        if vertices.is_empty() {
            return Err(AssetError::InvalidData(format!("'{label}' has no vertices")));
        }

        let per_primitive = topology.vertices_per_primitive();
        if indices.len() % per_primitive != 0 {
            return Err(AssetError::InvalidData(format!(
                "'{label}' has {} indices, not a multiple of {per_primitive}",
                indices.len()
            )));
        }

        let indices = IndexData::from_indices(indices);
        if let Some(max) = indices.max_index() {
            if max as usize >= vertices.len() {
                return Err(AssetError::InvalidData(format!(
                    "'{label}' index {max} out of range for {} vertices",
                    vertices.len()
                )));
            }
        }

        let vertex_count = vertices.len();
        Ok(Self {
            label,
            vertices,
            indices,
            layout: VertexLayout::standard(),
            topology,
            usage,
            gpu_handle: None,
            dirty: Some(0..vertex_count),
        })
    }

    /// Debug label
    pub fn label(&self) -> &str {
        &self.label
    }

    /// CPU vertex data
    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    /// Number of vertices
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// CPU index data
    pub fn indices(&self) -> &IndexData {
        &self.indices
    }

    /// Vertex layout descriptor
    pub fn layout(&self) -> &VertexLayout {
        &self.layout
    }

    /// Primitive topology
    pub fn topology(&self) -> PrimitiveTopology {
        self.topology
    }

    /// Update frequency
    pub fn usage(&self) -> BufferUsage {
        self.usage
    }

    /// GPU handle, present only while resident
    pub fn gpu_handle(&self) -> Option<GpuBufferHandle> {
        self.gpu_handle
    }

    /// Whether a GPU copy exists
    pub fn is_resident(&self) -> bool {
        self.gpu_handle.is_some()
    }

    /// Whether CPU data differs from the GPU copy
    pub fn is_dirty(&self) -> bool {
        self.dirty.is_some()
    }

    /// Vertex range awaiting upload
    pub fn dirty_range(&self) -> Option<Range<usize>> {
        self.dirty.clone()
    }

    /// Allocate the GPU buffer and upload everything
    ///
    /// A buffer that is already resident is left untouched.
    pub fn create_gpu(&mut self, device: &mut dyn GpuDevice) -> GpuResult<GpuBufferHandle> {
        if let Some(handle) = self.gpu_handle {
            return Ok(handle);
        }

        let descriptor = BufferDescriptor {
            label: &self.label,
            vertex_data: bytemuck::cast_slice(&self.vertices),
            index_data: self.indices.as_bytes(),
            layout: &self.layout,
            index_format: self.indices.format(),
            usage: self.usage,
        };
        let handle = device.create_buffer(&descriptor)?;

        self.gpu_handle = Some(handle);
        self.dirty = None;
        Ok(handle)
    }

    /// Release the GPU copy, keeping CPU data
    pub fn destroy_gpu(&mut self, device: &mut dyn GpuDevice) {
        if let Some(handle) = self.gpu_handle.take() {
            device.destroy_buffer(handle);
            self.dirty = Some(0..self.vertices.len());
        }
    }

    /// Forget the GPU handle without calling the device
    ///
    /// Used when the context is already gone and the driver has released
    /// everything on its own.
    pub fn invalidate_gpu(&mut self) {
        if self.gpu_handle.take().is_some() {
            self.dirty = Some(0..self.vertices.len());
        }
    }

    /// Overwrite vertices starting at `offset` and mark them for upload
    pub fn write_vertices(&mut self, offset: usize, vertices: &[Vertex]) -> RenderResult<()> {
        if self.usage == BufferUsage::Static {
            return Err(RenderError::ImmutableMesh(self.label.clone()));
        }

        let end = offset
            .checked_add(vertices.len())
            .filter(|end| *end <= self.vertices.len())
            .ok_or(RenderError::VertexRangeOutOfBounds {
                offset,
                count: vertices.len(),
                capacity: self.vertices.len(),
            })?;

        if vertices.is_empty() {
            return Ok(());
        }

        self.vertices[offset..end].copy_from_slice(vertices);
        self.dirty = Some(match self.dirty.take() {
            Some(range) => range.start.min(offset)..range.end.max(end),
            None => offset..end,
        });
        Ok(())
    }

    /// Re-upload the dirty range to the GPU copy
    ///
    /// Does nothing when not resident: the next [`create_gpu`](Self::create_gpu)
    /// uploads everything anyway. Returns the number of vertices uploaded.
    pub fn flush(&mut self, device: &mut dyn GpuDevice) -> GpuResult<usize> {
        let Some(handle) = self.gpu_handle else {
            return Ok(0);
        };
        let Some(range) = self.dirty.clone() else {
            return Ok(0);
        };

        let stride = self.layout.stride;
        let bytes: &[u8] = bytemuck::cast_slice(&self.vertices[range.clone()]);
        device.update_buffer(handle, range.start * stride, bytes)?;

        self.dirty = None;
        Ok(range.len())
    }
}

impl Drop for VertexBuffer {
    fn drop(&mut self) {
        if let Some(handle) = self.gpu_handle {
            log::warn!(
                "Vertex buffer '{}' dropped while GPU buffer {:?} is still allocated",
                self.label,
                handle
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{DeviceCommand, RecordingDevice};

    fn quad(usage: BufferUsage) -> VertexBuffer {
        let vertices = vec![
            Vertex::textured([-1.0, -1.0, 0.0], [0.0, 0.0]),
            Vertex::textured([1.0, -1.0, 0.0], [1.0, 0.0]),
            Vertex::textured([1.0, 1.0, 0.0], [1.0, 1.0]),
            Vertex::textured([-1.0, 1.0, 0.0], [0.0, 1.0]),
        ];
        VertexBuffer::new("quad", vertices, vec![0, 1, 2, 2, 3, 0], PrimitiveTopology::Triangles, usage).unwrap()
    }

    #[test]
    fn test_vertex_layout_matches_struct() {
        let layout = VertexLayout::standard();
        assert_eq!(layout.stride, 36);
        let last = layout.attributes.last().unwrap();
        assert_eq!(last.offset + last.format.byte_size(), layout.stride);
    }

    #[test]
    fn test_index_packing() {
        assert_eq!(IndexData::from_indices(vec![0, 1, 2]).format(), IndexFormat::U16);
        assert_eq!(IndexData::from_indices(vec![0, 70_000, 2]).format(), IndexFormat::U32);
        assert_eq!(IndexData::from_indices(vec![0, 1, 2]).as_bytes().len(), 6);
    }

    #[test]
    fn test_rejects_partial_primitive() {
        let vertices = vec![Vertex::textured([0.0; 3], [0.0; 2]); 3];
        let result = VertexBuffer::new("bad", vertices, vec![0, 1], PrimitiveTopology::Triangles, BufferUsage::Static);
        assert!(matches!(result, Err(AssetError::InvalidData(_))));
    }

    #[test]
    fn test_lines_accept_pairs() {
        let vertices = vec![Vertex::textured([0.0; 3], [0.0; 2]); 2];
        assert!(VertexBuffer::new("line", vertices, vec![0, 1], PrimitiveTopology::Lines, BufferUsage::Static).is_ok());
    }

    #[test]
    fn test_rejects_out_of_range_index() {
        let vertices = vec![Vertex::textured([0.0; 3], [0.0; 2]); 3];
        let result = VertexBuffer::new("bad", vertices, vec![0, 1, 3], PrimitiveTopology::Triangles, BufferUsage::Static);
        assert!(result.is_err());
    }

    #[test]
    fn test_handle_tracks_lifecycle() {
        let mut device = RecordingDevice::new();
        let mut buffer = quad(BufferUsage::Static);
        assert!(!buffer.is_resident());
        assert!(buffer.is_dirty());

        let handle = buffer.create_gpu(&mut device).unwrap();
        assert_eq!(buffer.gpu_handle(), Some(handle));
        assert!(!buffer.is_dirty());

        // Second create is a no-op
        assert_eq!(buffer.create_gpu(&mut device).unwrap(), handle);
        assert_eq!(device.live_buffer_count(), 1);

        buffer.destroy_gpu(&mut device);
        assert!(!buffer.is_resident());
        assert!(buffer.is_dirty());
        assert_eq!(device.live_buffer_count(), 0);
        assert_eq!(buffer.vertex_count(), 4);
    }

    #[test]
    fn test_static_buffers_reject_writes() {
        let mut buffer = quad(BufferUsage::Static);
        let result = buffer.write_vertices(0, &[Vertex::textured([0.0; 3], [0.0; 2])]);
        assert!(matches!(result, Err(RenderError::ImmutableMesh(_))));
    }

    #[test]
    fn test_partial_upload_covers_dirty_range() {
        let mut device = RecordingDevice::new();
        let mut buffer = quad(BufferUsage::Dynamic);
        let handle = buffer.create_gpu(&mut device).unwrap();

        let red = Vertex::new([5.0, 5.0, 0.0], [0.0, 0.0], [1.0, 0.0, 0.0, 1.0]);
        buffer.write_vertices(1, &[red]).unwrap();
        buffer.write_vertices(2, &[red]).unwrap();
        assert_eq!(buffer.dirty_range(), Some(1..3));

        assert_eq!(buffer.flush(&mut device).unwrap(), 2);
        assert!(!buffer.is_dirty());
        assert!(matches!(
            device.commands().last(),
            Some(DeviceCommand::UpdateBuffer { offset: 36, bytes: 72, .. })
        ));

        let uploaded = &device.buffer_contents(handle).unwrap().vertex_data;
        assert_eq!(&uploaded[36..72], bytemuck::bytes_of(&red));

        buffer.destroy_gpu(&mut device);
    }

    #[test]
    fn test_write_out_of_range() {
        let mut buffer = quad(BufferUsage::Dynamic);
        let vertices = vec![Vertex::textured([0.0; 3], [0.0; 2]); 2];
        assert!(matches!(
            buffer.write_vertices(3, &vertices),
            Err(RenderError::VertexRangeOutOfBounds { .. })
        ));
    }

    #[test]
    fn test_flush_without_gpu_copy_is_noop() {
        let mut device = RecordingDevice::new();
        let mut buffer = quad(BufferUsage::Dynamic);
        assert_eq!(buffer.flush(&mut device).unwrap(), 0);
        assert!(device.commands().is_empty());
        assert!(buffer.is_dirty());
    }
}
