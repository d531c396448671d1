//! # Bane Render
//!
//! Render management core for a mobile 2D/3D engine.
//!
//! ## Features
//!
//! - **Draw Ordering**: opaque draws grouped by material, transparent draws
//!   strictly back to front
//! - **Batching**: consecutive draws sharing a material bind it once, and
//!   opaque quad sprites in such a run merge into a single draw
//! - **Buffer Lifecycle**: explicit create/tear-down around GPU context loss,
//!   with CPU mesh data kept for a reload-free restore
//! - **Device Seam**: everything reaches the driver through [`backend::GpuDevice`];
//!   [`backend::RecordingDevice`] runs headless
//!
//! ## Quick Start
//!
//! ```rust
//! use bane_render::prelude::*;
//!
//! let source = MemoryMeshSource::new().with("quad", "obj", "v 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\nf 1 2 3 4\n");
//!
//! let mut manager = RenderManager::new(RecordingDevice::new(), RenderConfig::default()).unwrap();
//! let quad = manager.load_mesh("quad", "obj", &source).unwrap();
//! let _ = manager.create_buffers();
//!
//! let sprite = Sprite::new(NodeId(1), quad, MaterialKey::default(), Mat4::identity());
//! manager.render_sprite(&sprite);
//! manager.render();
//!
//! assert_eq!(manager.device().draws().len(), 1);
//! manager.tear_down_buffers();
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(
    clippy::module_name_repetitions,
    clippy::similar_names,
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::must_use_candidate
)]

pub mod assets;
pub mod backend;
pub mod config;
pub mod error;
pub mod foundation;
pub mod render_manager;
pub mod resources;
pub mod scene;
pub mod sorting;

pub use error::{ContractViolation, RenderError, RenderResult};
pub use render_manager::RenderManager;

/// Common imports for render core users
pub mod prelude {
    pub use crate::{
        assets::{AssetError, FileMeshSource, MemoryMeshSource, MeshData, MeshSource},
        backend::{BufferUsage, GpuDevice, GpuError, RecordingDevice, RenderFlags},
        config::{Config, ConfigError, RenderConfig},
        error::{ContractViolation, RenderError, RenderResult},
        foundation::math::{Mat4, Point3, Vec3},
        render_manager::{DebugStats, FrameStats, LifecycleState, RenderManager, SpriteBatcher},
        resources::{BufferReport, Mesh, MeshHandle, MeshRegistry, Vertex},
        scene::{BlendMode, Camera, DrawCandidate, Label, MaterialKey, ModelNode, NodeId, ShaderId, Sprite, TextureId},
    };
}
