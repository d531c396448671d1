//! Per-frame draw ordering
//!
//! Two sorters with different goals:
//!
//! - [`OpaqueSorter`]: groups by material to minimise state changes
//! - [`TransparentSorter`]: strict back-to-front order for blending
//!
//! Both are owned by the render manager, filled during the scene walk and
//! cleared by every `render()`.

pub mod batch;
pub mod opaque;
pub mod transparent;

pub use batch::{coalesce_batches, Batch};
pub use opaque::OpaqueSorter;
pub use transparent::{DepthEntry, TransparentSorter};
