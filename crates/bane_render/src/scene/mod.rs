//! Scene-side inputs to the render core
//!
//! The scene graph owns its nodes and decides visibility. For each visible
//! node it hands the render manager a [`DrawCandidate`]: a small, copyable
//! snapshot holding handles and per-draw parameters, never the node itself.

pub mod camera;
pub mod candidate;
pub mod material;
pub mod nodes;

pub use camera::Camera;
pub use candidate::{DrawCandidate, LabelDraw, ModelDraw, SpriteDraw};
pub use material::{BlendMode, MaterialKey, ShaderId, TextureId};
pub use nodes::{Label, ModelNode, NodeId, Sprite};
