//! Material identity and blend classification

/// Compiled shader program identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShaderId(pub u32);

impl ShaderId {
    /// Default sprite shader: texture color × vertex color × ambient color.
    /// No normals, a single sampler.
    pub const DEFAULT_AMBIENT: Self = Self(0);
}

/// Texture identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(pub u32);

/// GPU state a draw needs bound: shader program plus texture
///
/// Draws sharing a key can be submitted back to back without rebinding, so
/// this is the opaque sort key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MaterialKey {
    /// Shader program
    pub shader: ShaderId,
    /// Bound texture, if any
    pub texture: Option<TextureId>,
}

impl MaterialKey {
    /// Create a key
    pub const fn new(shader: ShaderId, texture: Option<TextureId>) -> Self {
        Self { shader, texture }
    }

    /// Default ambient shader with a texture
    pub const fn textured(texture: TextureId) -> Self {
        Self::new(ShaderId::DEFAULT_AMBIENT, Some(texture))
    }
}

impl Default for MaterialKey {
    fn default() -> Self {
        Self::new(ShaderId::DEFAULT_AMBIENT, None)
    }
}

/// Whether a draw needs alpha blending
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BlendMode {
    /// Depth tested, no blending
    #[default]
    Opaque,
    /// Blended, must be drawn back to front
    Transparent,
}

impl BlendMode {
    /// Classify from an explicit flag and the alpha that will reach the framebuffer
    pub fn classify(force_transparent: bool, alpha: f32) -> Self {
        if force_transparent || alpha < 1.0 {
            Self::Transparent
        } else {
            Self::Opaque
        }
    }
}
