//! Per-frame draw candidates
//!
//! One tagged enum covers every drawable node kind, so the render manager
//! has a single enqueue path that switches on the tag instead of one entry
//! point per node type.

use std::ops::Range;

use super::material::{BlendMode, MaterialKey};
use super::nodes::{NodeId, INDICES_PER_GLYPH};
use crate::foundation::math::{Mat4, Mat4Ext, Point3};
use crate::resources::MeshHandle;

/// Sprite snapshot
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpriteDraw {
    /// Source node
    pub node: NodeId,
    /// Quad geometry
    pub mesh: MeshHandle,
    /// Shader and texture
    pub material: MaterialKey,
    /// World transform
    pub transform: Mat4,
    /// RGBA tint
    pub tint: [f32; 4],
    /// Blend even when the tint is fully opaque
    pub force_transparent: bool,
}

/// Model snapshot
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelDraw {
    /// Source node
    pub node: NodeId,
    /// Model geometry
    pub mesh: MeshHandle,
    /// Shader and texture
    pub material: MaterialKey,
    /// World transform
    pub transform: Mat4,
    /// RGBA tint; alpha carries the model opacity
    pub tint: [f32; 4],
}

/// Label snapshot
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LabelDraw {
    /// Source node
    pub node: NodeId,
    /// Glyph-strip geometry
    pub mesh: MeshHandle,
    /// Font shader and atlas
    pub material: MaterialKey,
    /// World transform
    pub transform: Mat4,
    /// Text color
    pub tint: [f32; 4],
    /// Glyph quads to draw from the start of the strip
    pub glyph_count: u32,
}

/// A visible item collected for the current frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DrawCandidate {
    /// A sprite quad
    Sprite(SpriteDraw),
    /// A model mesh
    ModelNode(ModelDraw),
    /// A text label
    Label(LabelDraw),
}

impl DrawCandidate {
    /// Node that produced the candidate
    pub fn node(&self) -> NodeId {
        match self {
            Self::Sprite(draw) => draw.node,
            Self::ModelNode(draw) => draw.node,
            Self::Label(draw) => draw.node,
        }
    }

    /// Geometry to draw
    pub fn mesh(&self) -> MeshHandle {
        match self {
            Self::Sprite(draw) => draw.mesh,
            Self::ModelNode(draw) => draw.mesh,
            Self::Label(draw) => draw.mesh,
        }
    }

    /// Shader/texture binding, the opaque sort key
    pub fn material(&self) -> MaterialKey {
        match self {
            Self::Sprite(draw) => draw.material,
            Self::ModelNode(draw) => draw.material,
            Self::Label(draw) => draw.material,
        }
    }

    /// World transform
    pub fn transform(&self) -> &Mat4 {
        match self {
            Self::Sprite(draw) => &draw.transform,
            Self::ModelNode(draw) => &draw.transform,
            Self::Label(draw) => &draw.transform,
        }
    }

    /// Per-draw color multiplier
    pub fn tint(&self) -> [f32; 4] {
        match self {
            Self::Sprite(draw) => draw.tint,
            Self::ModelNode(draw) => draw.tint,
            Self::Label(draw) => draw.tint,
        }
    }

    /// Blend classification, evaluated from the snapshot each time
    ///
    /// Labels always blend; glyph edges are antialiased in the atlas.
    pub fn blend_mode(&self) -> BlendMode {
        match self {
            Self::Sprite(draw) => BlendMode::classify(draw.force_transparent, draw.tint[3]),
            Self::ModelNode(draw) => BlendMode::classify(false, draw.tint[3]),
            Self::Label(_) => BlendMode::Transparent,
        }
    }

    /// World-space origin used for depth sorting
    pub fn world_position(&self) -> Point3 {
        self.transform().world_position()
    }

    /// Index range to draw, given the mesh's total index count
    ///
    /// Labels draw only their visible glyphs; everything else draws the
    /// whole mesh.
    pub fn index_range(&self, mesh_index_count: u32) -> Range<u32> {
        match self {
            Self::Label(draw) => 0..draw.glyph_count.saturating_mul(INDICES_PER_GLYPH).min(mesh_index_count),
            Self::Sprite(_) | Self::ModelNode(_) => 0..mesh_index_count,
        }
    }

    /// Short name of the variant, for logs
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Sprite(_) => "sprite",
            Self::ModelNode(_) => "model",
            Self::Label(_) => "label",
        }
    }
}
