//! Mesh asset sources and decoding
//!
//! The render core does not care where geometry comes from. A [`MeshSource`]
//! hands back raw bytes for a `(name, format)` pair and [`decode_mesh`] turns
//! them into a [`MeshData`] triple of vertices, indices and index count.

pub mod obj_loader;

pub use obj_loader::ObjLoader;

use std::collections::HashMap;
use std::path::PathBuf;

use thiserror::Error;

use crate::resources::Vertex;

/// Asset loading errors
#[derive(Error, Debug)]
pub enum AssetError {
    /// Asset not found
    #[error("Asset not found: {0}")]
    NotFound(String),

    /// Invalid asset data
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Unsupported asset format
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// IO error during asset loading
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Decoded geometry ready to become a vertex buffer
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MeshData {
    /// Vertex attributes
    pub vertices: Vec<Vertex>,
    /// Triangle indices
    pub indices: Vec<u32>,
}

impl MeshData {
    /// Create mesh data
    pub fn new(vertices: Vec<Vertex>, indices: Vec<u32>) -> Self {
        Self { vertices, indices }
    }

    /// Number of indices
    pub fn index_count(&self) -> usize {
        self.indices.len()
    }

    /// Unit quad in the XY plane, two triangles, counter-clockwise
    pub fn quad() -> Self {
        let vertices = vec![
            Vertex::textured([-0.5, -0.5, 0.0], [0.0, 0.0]),
            Vertex::textured([0.5, -0.5, 0.0], [1.0, 0.0]),
            Vertex::textured([0.5, 0.5, 0.0], [1.0, 1.0]),
            Vertex::textured([-0.5, 0.5, 0.0], [0.0, 1.0]),
        ];
        Self::new(vertices, vec![0, 1, 2, 2, 3, 0])
    }

    /// `count` independent quads laid out side by side, one per glyph
    pub fn glyph_strip(count: usize) -> Self {
        let mut data = Self::default();
        for glyph in 0..count {
            let x = glyph as f32;
            let base = data.vertices.len() as u32;
            data.vertices.extend([
                Vertex::textured([x, 0.0, 0.0], [0.0, 0.0]),
                Vertex::textured([x + 1.0, 0.0, 0.0], [1.0, 0.0]),
                Vertex::textured([x + 1.0, 1.0, 0.0], [1.0, 1.0]),
                Vertex::textured([x, 1.0, 0.0], [0.0, 1.0]),
            ]);
            data.indices
                .extend([base, base + 1, base + 2, base + 2, base + 3, base]);
        }
        data
    }
}

/// Provider of raw mesh bytes
pub trait MeshSource {
    /// Read the bytes of mesh `name` stored in `format`
    fn read(&self, name: &str, format: &str) -> Result<Vec<u8>, AssetError>;
}

/// Reads `<dir>/<name>.<format>` from the first matching search path
#[derive(Debug, Clone, Default)]
pub struct FileMeshSource {
    search_paths: Vec<PathBuf>,
}

impl FileMeshSource {
    /// Create a source over the given directories, searched in order
    pub fn new<I, P>(search_paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            search_paths: search_paths.into_iter().map(Into::into).collect(),
        }
    }

    /// Directories searched, in order
    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }
}

impl MeshSource for FileMeshSource {
    fn read(&self, name: &str, format: &str) -> Result<Vec<u8>, AssetError> {
        let file_name = format!("{name}.{format}");

        let path = self
            .search_paths
            .iter()
            .map(|dir| dir.join(&file_name))
            .find(|candidate| candidate.is_file())
            .ok_or_else(|| AssetError::NotFound(file_name.clone()))?;

        log::debug!("Reading mesh '{}' from {}", name, path.display());
        Ok(std::fs::read(path)?)
    }
}

/// In-memory mesh storage keyed by name and format
#[derive(Debug, Clone, Default)]
pub struct MemoryMeshSource {
    entries: HashMap<(String, String), Vec<u8>>,
}

impl MemoryMeshSource {
    /// Create an empty source
    pub fn new() -> Self {
        Self::default()
    }

    /// Store bytes for a mesh
    pub fn insert(&mut self, name: impl Into<String>, format: &str, bytes: impl Into<Vec<u8>>) {
        self.entries
            .insert((name.into(), format.to_ascii_lowercase()), bytes.into());
    }

    /// Builder-style [`insert`](Self::insert)
    pub fn with(mut self, name: impl Into<String>, format: &str, bytes: impl Into<Vec<u8>>) -> Self {
        self.insert(name, format, bytes);
        self
    }
}

impl MeshSource for MemoryMeshSource {
    fn read(&self, name: &str, format: &str) -> Result<Vec<u8>, AssetError> {
        self.entries
            .get(&(name.to_string(), format.to_ascii_lowercase()))
            .cloned()
            .ok_or_else(|| AssetError::NotFound(format!("{name}.{format}")))
    }
}

/// Decode raw bytes of the given format
///
/// Format names are case-insensitive. Only Wavefront OBJ is built in.
pub fn decode_mesh(format: &str, bytes: &[u8]) -> Result<MeshData, AssetError> {
    match format.to_ascii_lowercase().as_str() {
        "obj" => ObjLoader::parse(bytes),
        other => Err(AssetError::UnsupportedFormat(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_source_lookup() {
        let source = MemoryMeshSource::new().with("cube", "OBJ", b"v 0 0 0".to_vec());
        assert!(source.read("cube", "obj").is_ok());
        assert!(matches!(source.read("sphere", "obj"), Err(AssetError::NotFound(_))));
    }

    #[test]
    fn test_file_source_missing_file() {
        let source = FileMeshSource::new([std::env::temp_dir()]);
        let result = source.read("definitely_not_a_mesh_bane", "obj");
        assert!(matches!(result, Err(AssetError::NotFound(_))));
    }

    #[test]
    fn test_file_source_reads_from_search_path() {
        let dir = std::env::temp_dir();
        let name = format!("bane_mesh_{}", std::process::id());
        std::fs::write(dir.join(format!("{name}.obj")), b"v 0 0 0\n").unwrap();

        let source = FileMeshSource::new([PathBuf::from("does/not/exist"), dir.clone()]);
        let bytes = source.read(&name, "obj").unwrap();
        let _ = std::fs::remove_file(dir.join(format!("{name}.obj")));

        assert_eq!(bytes, b"v 0 0 0\n");
    }

    #[test]
    fn test_unknown_format() {
        assert!(matches!(
            decode_mesh("fbx", b""),
            Err(AssetError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_glyph_strip_shape() {
        let strip = MeshData::glyph_strip(3);
        assert_eq!(strip.vertices.len(), 12);
        assert_eq!(strip.index_count(), 18);
        assert_eq!(strip.indices[6], 4);
    }
}
