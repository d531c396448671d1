//! Scene nodes the render core knows how to draw
//!
//! These are owned by the scene graph. The render manager only ever sees the
//! [`DrawCandidate`] snapshot each node produces, so nodes can be mutated,
//! moved or dropped freely between frames.

use super::candidate::{DrawCandidate, LabelDraw, ModelDraw, SpriteDraw};
use super::material::{BlendMode, MaterialKey};
use crate::foundation::math::Mat4;
use crate::resources::{MeshHandle, Vertex};

/// Indices emitted per glyph quad
pub const INDICES_PER_GLYPH: u32 = 6;

/// Vertices emitted per glyph quad
pub const VERTICES_PER_GLYPH: usize = 4;

/// Scene-graph identity of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u64);

/// Textured quad, usually sharing one quad mesh with every other sprite
#[derive(Debug, Clone, PartialEq)]
pub struct Sprite {
    /// Node identity
    pub id: NodeId,
    /// Quad geometry
    pub mesh: MeshHandle,
    /// Shader and texture
    pub material: MaterialKey,
    /// World transform
    pub transform: Mat4,
    /// RGBA tint; alpha below one makes the sprite transparent
    pub color: [f32; 4],
    /// Blend even when fully opaque (textures with alpha)
    pub force_transparent: bool,
}

impl Sprite {
    /// Create an opaque white sprite
    pub fn new(id: NodeId, mesh: MeshHandle, material: MaterialKey, transform: Mat4) -> Self {
        Self {
            id,
            mesh,
            material,
            transform,
            color: Vertex::WHITE,
            force_transparent: false,
        }
    }

    /// Set the tint color
    pub fn with_color(mut self, color: [f32; 4]) -> Self {
        self.color = color;
        self
    }

    /// Always route through the transparent path
    pub fn with_force_transparent(mut self, force: bool) -> Self {
        self.force_transparent = force;
        self
    }

    /// Current blend classification; recomputed on every call
    pub fn blend_mode(&self) -> BlendMode {
        BlendMode::classify(self.force_transparent, self.color[3])
    }

    /// Snapshot for this frame
    pub fn candidate(&self) -> DrawCandidate {
        DrawCandidate::Sprite(SpriteDraw {
            node: self.id,
            mesh: self.mesh,
            material: self.material,
            transform: self.transform,
            tint: self.color,
            force_transparent: self.force_transparent,
        })
    }
}

/// Node drawing a loaded model mesh
#[derive(Debug, Clone, PartialEq)]
pub struct ModelNode {
    /// Node identity
    pub id: NodeId,
    /// Model geometry
    pub mesh: MeshHandle,
    /// Shader and texture
    pub material: MaterialKey,
    /// World transform
    pub transform: Mat4,
    /// Overall opacity; below one makes the model transparent
    pub opacity: f32,
}

impl ModelNode {
    /// Create a fully opaque model node
    pub fn new(id: NodeId, mesh: MeshHandle, material: MaterialKey, transform: Mat4) -> Self {
        Self {
            id,
            mesh,
            material,
            transform,
            opacity: 1.0,
        }
    }

    /// Set the opacity
    pub fn with_opacity(mut self, opacity: f32) -> Self {
        self.opacity = opacity;
        self
    }

    /// Current blend classification; recomputed on every call
    pub fn blend_mode(&self) -> BlendMode {
        BlendMode::classify(false, self.opacity)
    }

    /// Snapshot for this frame
    pub fn candidate(&self) -> DrawCandidate {
        DrawCandidate::ModelNode(ModelDraw {
            node: self.id,
            mesh: self.mesh,
            material: self.material,
            transform: self.transform,
            tint: [1.0, 1.0, 1.0, self.opacity],
        })
    }
}

/// Text drawn from a dynamic glyph-strip mesh
///
/// The mesh holds `capacity` glyph quads; only as many as the text has
/// characters are drawn.
#[derive(Debug, Clone, PartialEq)]
pub struct Label {
    /// Node identity
    pub id: NodeId,
    /// Text to display
    pub text: String,
    /// Dynamic glyph-strip mesh
    pub mesh: MeshHandle,
    /// Glyph quads available in the mesh
    pub capacity: usize,
    /// Font shader and atlas texture
    pub material: MaterialKey,
    /// World transform
    pub transform: Mat4,
    /// Text color
    pub color: [f32; 4],
}

impl Label {
    /// Atlas cells per row; the font atlas is a 16 × 16 grid indexed by code point
    pub const ATLAS_COLUMNS: u32 = 16;

    /// Create a white label
    pub fn new(
        id: NodeId,
        text: impl Into<String>,
        mesh: MeshHandle,
        capacity: usize,
        material: MaterialKey,
        transform: Mat4,
    ) -> Self {
        Self {
            id,
            text: text.into(),
            mesh,
            capacity,
            material,
            transform,
            color: Vertex::WHITE,
        }
    }

    /// Number of glyphs that fit and will be drawn
    pub fn glyph_count(&self) -> usize {
        self.text.chars().count().min(self.capacity)
    }

    /// Quad vertices for the visible glyphs, one unit wide each
    ///
    /// Characters outside the atlas map to cell 0.
    pub fn glyph_vertices(&self) -> Vec<Vertex> {
        let cell = 1.0 / Self::ATLAS_COLUMNS as f32;
        let mut vertices = Vec::with_capacity(self.glyph_count() * VERTICES_PER_GLYPH);

        for (i, ch) in self.text.chars().take(self.capacity).enumerate() {
            let code = u32::from(ch);
            let code = if code < Self::ATLAS_COLUMNS * Self::ATLAS_COLUMNS { code } else { 0 };
            let u = (code % Self::ATLAS_COLUMNS) as f32 * cell;
            let v = (code / Self::ATLAS_COLUMNS) as f32 * cell;
            let x = i as f32;

            vertices.extend([
                Vertex::new([x, 0.0, 0.0], [u, v + cell], self.color),
                Vertex::new([x + 1.0, 0.0, 0.0], [u + cell, v + cell], self.color),
                Vertex::new([x + 1.0, 1.0, 0.0], [u + cell, v], self.color),
                Vertex::new([x, 1.0, 0.0], [u, v], self.color),
            ]);
        }
        vertices
    }

    /// Snapshot for this frame
    pub fn candidate(&self) -> DrawCandidate {
        DrawCandidate::Label(LabelDraw {
            node: self.id,
            mesh: self.mesh,
            material: self.material,
            transform: self.transform,
            tint: self.color,
            glyph_count: u32::try_from(self.glyph_count()).unwrap_or(u32::MAX),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::KeyData;

    fn handle() -> MeshHandle {
        MeshHandle::from(KeyData::from_ffi(1))
    }

    #[test]
    fn test_sprite_classification_follows_alpha() {
        let mut sprite = Sprite::new(NodeId(1), handle(), MaterialKey::default(), Mat4::identity());
        assert_eq!(sprite.blend_mode(), BlendMode::Opaque);

        sprite.color[3] = 0.5;
        assert_eq!(sprite.blend_mode(), BlendMode::Transparent);

        sprite.color[3] = 1.0;
        assert_eq!(sprite.blend_mode(), BlendMode::Opaque);

        let forced = sprite.with_force_transparent(true);
        assert_eq!(forced.blend_mode(), BlendMode::Transparent);
    }

    #[test]
    fn test_model_opacity() {
        let model = ModelNode::new(NodeId(2), handle(), MaterialKey::default(), Mat4::identity());
        assert_eq!(model.blend_mode(), BlendMode::Opaque);
        assert_eq!(model.with_opacity(0.2).blend_mode(), BlendMode::Transparent);
    }

    #[test]
    fn test_label_glyphs_clamped_to_capacity() {
        let label = Label::new(NodeId(3), "hello", handle(), 3, MaterialKey::default(), Mat4::identity());
        assert_eq!(label.glyph_count(), 3);
        assert_eq!(label.glyph_vertices().len(), 12);

        match label.candidate() {
            DrawCandidate::Label(draw) => assert_eq!(draw.glyph_count, 3),
            other => panic!("unexpected candidate {other:?}"),
        }
    }

    #[test]
    fn test_label_atlas_coordinates() {
        let label = Label::new(NodeId(4), "A", handle(), 4, MaterialKey::default(), Mat4::identity());
        let vertices = label.glyph_vertices();
        // 'A' is 65: column 1, row 4
        assert_eq!(vertices[3].tex_coord, [1.0 / 16.0, 4.0 / 16.0]);
    }
}
