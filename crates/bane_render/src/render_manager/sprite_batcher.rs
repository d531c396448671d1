//! Sprite batching
//!
//! A run of opaque sprites sharing one material is drawn with a single call.
//! Each sprite's quad is transformed and tinted on the CPU into a dynamic
//! vertex buffer holding `capacity` quads; the written range is re-uploaded
//! and drawn as one index range with an identity transform.
//!
//! Only quad meshes (four corners in ring order, six indices) whose own
//! buffer is resident take part. Anything else is drawn on its own.

use crate::assets::{AssetError, MeshData};
use crate::backend::{BufferUsage, GpuBufferHandle, GpuDevice, GpuResult, IndexFormat};
use crate::error::{RenderError, RenderResult};
use crate::foundation::math::{Mat4, Point3};
use crate::resources::{Mesh, PrimitiveTopology, Vertex, VertexBuffer};
use crate::scene::SpriteDraw;

/// Corners of a sprite quad
pub const QUAD_VERTICES: usize = 4;

/// Indices of a sprite quad
pub const QUAD_INDICES: usize = 6;

/// Quads written and uploaded for one batched draw
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreparedBatch {
    /// Buffer to draw from
    pub buffer: GpuBufferHandle,
    /// Number of indices covering the written quads
    pub index_count: u32,
    /// Index width of the batch buffer
    pub index_format: IndexFormat,
    /// Vertices re-uploaded for this batch
    pub vertices_uploaded: usize,
}

/// CPU-side quad merger over one dynamic vertex buffer
#[derive(Debug)]
pub struct SpriteBatcher {
    buffer: VertexBuffer,
    capacity: usize,
    scratch: Vec<Vertex>,
}

impl SpriteBatcher {
    /// Debug label of the batch buffer
    pub const LABEL: &'static str = "sprite batch";

    /// Create a batcher holding up to `capacity` quads per draw
    pub fn new(capacity: usize) -> Result<Self, AssetError> {
        let capacity = capacity.max(1);
        let data = MeshData::glyph_strip(capacity);
        let buffer = VertexBuffer::new(
            Self::LABEL,
            data.vertices,
            data.indices,
            PrimitiveTopology::Triangles,
            BufferUsage::Dynamic,
        )?;

        Ok(Self {
            buffer,
            capacity,
            scratch: Vec::with_capacity(capacity * QUAD_VERTICES),
        })
    }

    /// Quads per batched draw
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// The batch buffer
    pub fn vertex_buffer(&self) -> &VertexBuffer {
        &self.buffer
    }

    /// Whether the batch buffer has a GPU copy
    pub fn is_resident(&self) -> bool {
        self.buffer.is_resident()
    }

    /// Whether sprites drawn with `mesh` can be merged
    pub fn accepts(mesh: &Mesh) -> bool {
        let buffer = mesh.vertex_buffer();
        buffer.is_resident()
            && buffer.vertex_count() == QUAD_VERTICES
            && mesh.vertex_index_length() == QUAD_INDICES
            && buffer.topology() == PrimitiveTopology::Triangles
    }

    /// Allocate the batch buffer
    pub fn create_gpu(&mut self, device: &mut dyn GpuDevice) -> GpuResult<GpuBufferHandle> {
        self.buffer.create_gpu(device)
    }

    /// Release the batch buffer
    pub fn destroy_gpu(&mut self, device: &mut dyn GpuDevice) {
        self.buffer.destroy_gpu(device);
    }

    /// Forget the batch buffer after a context loss
    pub fn invalidate_gpu(&mut self) {
        self.buffer.invalidate_gpu();
    }

    /// Write up to `capacity` sprites into the buffer and upload them
    ///
    /// Sprites past the capacity are ignored; callers split runs first.
    pub fn prepare(&mut self, sprites: &[(&SpriteDraw, &Mesh)], device: &mut dyn GpuDevice) -> RenderResult<PreparedBatch> {
        let handle = self
            .buffer
            .gpu_handle()
            .ok_or_else(|| RenderError::NotResident(Self::LABEL.to_string()))?;

        self.scratch.clear();
        for (sprite, mesh) in sprites.iter().take(self.capacity) {
            let corners = mesh.vertex_buffer().vertices();
            self.scratch
                .extend(corners.iter().map(|corner| place(corner, &sprite.transform, sprite.tint)));
        }

        self.buffer.write_vertices(0, &self.scratch)?;
        let vertices_uploaded = self.buffer.flush(device)?;
        let quads = self.scratch.len() / QUAD_VERTICES;

        Ok(PreparedBatch {
            buffer: handle,
            index_count: u32::try_from(quads * QUAD_INDICES).unwrap_or(u32::MAX),
            index_format: self.buffer.indices().format(),
            vertices_uploaded,
        })
    }
}

/// Move a model-space corner into world space and apply the tint
fn place(corner: &Vertex, transform: &Mat4, tint: [f32; 4]) -> Vertex {
    let position = transform.transform_point(&Point3::from(corner.position));
    let mut color = corner.color;
    for (channel, factor) in color.iter_mut().zip(tint) {
        *channel *= factor;
    }
    Vertex::new([position.x, position.y, position.z], corner.tex_coord, color)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::RecordingDevice;
    use crate::foundation::math::Vec3;
    use crate::resources::MeshHandle;
    use crate::scene::{MaterialKey, NodeId};
    use approx::assert_relative_eq;
    use slotmap::KeyData;

    fn quad_mesh(device: &mut RecordingDevice) -> Mesh {
        let mut mesh = Mesh::from_data("quad", MeshData::glyph_strip(1), BufferUsage::Static).unwrap();
        mesh.vertex_buffer_mut().create_gpu(device).unwrap();
        mesh
    }

    fn sprite(x: f32, tint: [f32; 4]) -> SpriteDraw {
        SpriteDraw {
            node: NodeId(1),
            mesh: MeshHandle::from(KeyData::from_ffi(1)),
            material: MaterialKey::default(),
            transform: Mat4::new_translation(&Vec3::new(x, 0.0, -2.0)),
            tint,
            force_transparent: false,
        }
    }

    #[test]
    fn test_accepts_only_resident_quads() {
        let mut device = RecordingDevice::new();
        let mut quad = quad_mesh(&mut device);
        assert!(SpriteBatcher::accepts(&quad));

        let strip = Mesh::from_data("strip", MeshData::glyph_strip(2), BufferUsage::Static).unwrap();
        assert!(!SpriteBatcher::accepts(&strip));

        quad.vertex_buffer_mut().destroy_gpu(&mut device);
        assert!(!SpriteBatcher::accepts(&quad));
    }

    #[test]
    fn test_prepare_requires_gpu_copy() {
        let mut device = RecordingDevice::new();
        let quad = quad_mesh(&mut device);
        let mut batcher = SpriteBatcher::new(4).unwrap();
        let first = sprite(0.0, [1.0; 4]);

        assert!(matches!(
            batcher.prepare(&[(&first, &quad)], &mut device),
            Err(RenderError::NotResident(_))
        ));
        release(quad, &mut device);
    }

    #[test]
    fn test_prepare_writes_world_space_tinted_quads() {
        let mut device = RecordingDevice::new();
        let quad = quad_mesh(&mut device);
        let mut batcher = SpriteBatcher::new(4).unwrap();
        batcher.create_gpu(&mut device).unwrap();

        let first = sprite(0.0, [1.0; 4]);
        let second = sprite(10.0, [0.5, 1.0, 1.0, 1.0]);
        let prepared = batcher.prepare(&[(&first, &quad), (&second, &quad)], &mut device).unwrap();

        assert_eq!(prepared.index_count, 12);
        assert_eq!(prepared.vertices_uploaded, 8);
        assert_eq!(prepared.index_format, IndexFormat::U16);

        let written = &batcher.vertex_buffer().vertices()[4..8];
        assert_relative_eq!(written[0].position[0], 10.0);
        assert_relative_eq!(written[0].position[2], -2.0);
        assert_relative_eq!(written[0].color[0], 0.5);

        let uploaded = &device.buffer_contents(prepared.buffer).unwrap().vertex_data;
        assert_eq!(&uploaded[..8 * 36], bytemuck::cast_slice::<Vertex, u8>(&batcher.vertex_buffer().vertices()[..8]));

        batcher.destroy_gpu(&mut device);
        release(quad, &mut device);
    }

    #[test]
    fn test_prepare_caps_at_capacity() {
        let mut device = RecordingDevice::new();
        let quad = quad_mesh(&mut device);
        let mut batcher = SpriteBatcher::new(2).unwrap();
        batcher.create_gpu(&mut device).unwrap();

        let sprites: Vec<SpriteDraw> = (0..3).map(|i| sprite(i as f32, [1.0; 4])).collect();
        let pairs: Vec<(&SpriteDraw, &Mesh)> = sprites.iter().map(|s| (s, &quad)).collect();
        assert_eq!(batcher.prepare(&pairs, &mut device).unwrap().index_count, 12);

        batcher.destroy_gpu(&mut device);
        release(quad, &mut device);
    }

    fn release(mut quad: Mesh, device: &mut RecordingDevice) {
        quad.vertex_buffer_mut().destroy_gpu(device);
    }
}
