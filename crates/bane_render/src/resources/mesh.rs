//! Mesh assets
//!
//! A [`Mesh`] is a named asset that exclusively owns one [`VertexBuffer`].
//! Loaded meshes are immutable: every accessor is read-only and the only
//! vertex writes allowed go through dynamic meshes built from runtime data
//! (label glyph strips, for instance).
//!
//! Decoding and GPU upload are separate steps. [`Mesh::load`] only touches
//! the CPU; the buffer reaches the GPU when the render manager creates
//! buffers.

use super::vertex_buffer::{PrimitiveTopology, VertexBuffer};
use crate::assets::{decode_mesh, AssetError, MeshData, MeshSource};
use crate::backend::{BufferUsage, IndexFormat};

/// Named geometry asset owning one vertex buffer
#[derive(Debug)]
pub struct Mesh {
    name: String,
    vertex_buffer: VertexBuffer,
}

impl Mesh {
    /// Load mesh `name` stored as `format` from a source
    ///
    /// Fails without leaving anything behind if the asset is missing,
    /// malformed or in an unknown format.
    pub fn load(name: &str, format: &str, source: &dyn MeshSource) -> Result<Self, AssetError> {
        let bytes = source.read(name, format)?;
        let data = decode_mesh(format, &bytes)?;
        let mesh = Self::from_data(name, data, BufferUsage::Static)?;

        log::debug!(
            "Loaded mesh '{}' ({} vertices, {} indices)",
            name,
            mesh.vertex_buffer.vertex_count(),
            mesh.vertex_index_length()
        );
        Ok(mesh)
    }

    /// Build a mesh from already decoded data
    pub fn from_data(name: impl Into<String>, data: MeshData, usage: BufferUsage) -> Result<Self, AssetError> {
        let name = name.into();
        let vertex_buffer = VertexBuffer::new(
            name.clone(),
            data.vertices,
            data.indices,
            PrimitiveTopology::Triangles,
            usage,
        )?;

        Ok(Self { name, vertex_buffer })
    }

    /// Asset name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The owned vertex buffer
    pub fn vertex_buffer(&self) -> &VertexBuffer {
        &self.vertex_buffer
    }

    /// Raw index bytes
    pub fn vertex_index_data(&self) -> &[u8] {
        self.vertex_buffer.indices().as_bytes()
    }

    /// Number of indices
    pub fn vertex_index_length(&self) -> usize {
        self.vertex_buffer.indices().len()
    }

    /// Width of each index in [`vertex_index_data`](Self::vertex_index_data)
    pub fn index_format(&self) -> IndexFormat {
        self.vertex_buffer.indices().format()
    }

    /// Whether vertices may be rewritten after load
    pub fn is_dynamic(&self) -> bool {
        self.vertex_buffer.usage() == BufferUsage::Dynamic
    }

    pub(crate) fn vertex_buffer_mut(&mut self) -> &mut VertexBuffer {
        &mut self.vertex_buffer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::MemoryMeshSource;

    const TRIANGLE: &str = "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n";

    #[test]
    fn test_load_from_source() {
        let source = MemoryMeshSource::new().with("tri", "obj", TRIANGLE);
        let mesh = Mesh::load("tri", "obj", &source).unwrap();

        assert_eq!(mesh.name(), "tri");
        assert_eq!(mesh.vertex_index_length(), 3);
        assert_eq!(mesh.index_format(), IndexFormat::U16);
        assert_eq!(mesh.vertex_index_data(), &[0, 0, 1, 0, 2, 0]);
        assert!(!mesh.vertex_buffer().is_resident());
        assert!(!mesh.is_dynamic());
    }

    #[test]
    fn test_missing_asset() {
        let source = MemoryMeshSource::new();
        assert!(matches!(
            Mesh::load("tri", "obj", &source),
            Err(AssetError::NotFound(_))
        ));
    }

    #[test]
    fn test_malformed_asset() {
        let source = MemoryMeshSource::new().with("tri", "obj", "v 0 0 0\nf 1 2 3\n");
        assert!(matches!(
            Mesh::load("tri", "obj", &source),
            Err(AssetError::InvalidData(_))
        ));
    }

    #[test]
    fn test_unknown_format() {
        let source = MemoryMeshSource::new().with("tri", "dae", TRIANGLE);
        assert!(matches!(
            Mesh::load("tri", "dae", &source),
            Err(AssetError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_from_data_dynamic() {
        let mesh = Mesh::from_data("label", MeshData::glyph_strip(2), BufferUsage::Dynamic).unwrap();
        assert!(mesh.is_dynamic());
        assert_eq!(mesh.vertex_index_length(), 12);
    }
}
