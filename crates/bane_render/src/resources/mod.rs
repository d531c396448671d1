//! GPU-backed resources
//!
//! - [`VertexBuffer`]: CPU vertex/index data with an optional GPU copy
//! - [`Mesh`]: named asset owning one vertex buffer
//! - [`MeshRegistry`]: shared ownership of meshes by handle

pub mod mesh;
pub mod registry;
pub mod vertex_buffer;

pub use mesh::Mesh;
pub use registry::{BufferReport, MeshHandle, MeshRegistry};
pub use vertex_buffer::{
    IndexData, PrimitiveTopology, Vertex, VertexAttribute, VertexAttributeKind, VertexBuffer, VertexFormat,
    VertexLayout,
};
