//! Error types for the render core
//!
//! Recoverable failures (asset loading, GPU allocation, per-draw errors) are
//! plain `Result` values. Lifecycle misuse is a [`ContractViolation`] routed
//! through [`report_violation`], which panics in strict mode and degrades to a
//! logged no-op otherwise.

use thiserror::Error;

use crate::assets::AssetError;
use crate::backend::GpuError;
use crate::render_manager::LifecycleState;

/// Crate-level error for recoverable render core failures
#[derive(Error, Debug)]
pub enum RenderError {
    /// The GPU device rejected an operation
    #[error("GPU error: {0}")]
    Gpu(#[from] GpuError),

    /// A mesh asset could not be loaded
    #[error("Asset error: {0}")]
    Asset(#[from] AssetError),

    /// A mesh handle does not refer to a registered mesh
    #[error("Unknown mesh handle")]
    UnknownMesh,

    /// A buffer was used before it reached the GPU
    #[error("Buffer '{0}' has no GPU copy")]
    NotResident(String),

    /// Attempted to modify vertex data of a static mesh
    #[error("Mesh '{0}' is static and cannot be modified after loading")]
    ImmutableMesh(String),

    /// A vertex write fell outside the buffer
    #[error("Vertex write out of range: offset {offset} + {count} > {capacity}")]
    VertexRangeOutOfBounds {
        /// First vertex written
        offset: usize,
        /// Number of vertices written
        count: usize,
        /// Vertex count of the buffer
        capacity: usize,
    },
}

/// Result type for render core operations
pub type RenderResult<T> = Result<T, RenderError>;

/// Lifecycle contract violations
///
/// These are programming errors in the platform-integration layer, never
/// runtime conditions.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContractViolation {
    /// A draw call arrived while no GPU context was active
    #[error("draw enqueued while the render manager is {state:?}")]
    EnqueueOutsideContext {
        /// Lifecycle state at the time of the call
        state: LifecycleState,
    },

    /// `render` was called while no GPU context was active
    #[error("render called while the render manager is {state:?}")]
    RenderOutsideContext {
        /// Lifecycle state at the time of the call
        state: LifecycleState,
    },

    /// `render` was called twice without an enqueue phase in between
    #[error("render called twice without an intervening enqueue phase")]
    RenderWithoutEnqueue,

    /// `tear_down_buffers` was called before any `create_buffers`
    #[error("tear_down_buffers called before create_buffers")]
    TearDownBeforeCreate,
}

/// Report a contract violation
///
/// Panics when `strict` is set; otherwise logs at error level and returns so
/// the caller can turn the offending call into a no-op.
#[track_caller]
pub fn report_violation(violation: ContractViolation, strict: bool) {
    if strict {
        panic!("render contract violated: {violation}");
    }
    log::error!("render contract violated (ignored): {violation}");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lenient_violation_returns() {
        report_violation(ContractViolation::RenderWithoutEnqueue, false);
    }

    #[test]
    #[should_panic(expected = "render contract violated")]
    fn test_strict_violation_panics() {
        report_violation(ContractViolation::TearDownBeforeCreate, true);
    }

    #[test]
    fn test_violation_messages_name_state() {
        let message = ContractViolation::EnqueueOutsideContext {
            state: LifecycleState::TornDown,
        }
        .to_string();
        assert!(message.contains("TornDown"));
    }
}
