//! GPU resource lifecycle and frame phase tracking
//!
//! ```text
//!                 create_buffers            tear_down_buffers
//! Uninitialized ───────────────► Ready ───────────────────► TornDown
//!                                 ▲  │ create_buffers (retry)   │  │ tear_down_buffers
//!                                 │  └──────────────┘           │  └──────┘
//!                                 └─────────────────────────────┘
//!                                        create_buffers
//! ```
//!
//! Draws and `render` are only legal in `Ready`. Tearing down before any
//! create is the one illegal transition.

use crate::error::ContractViolation;

/// Whether GPU resources exist
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LifecycleState {
    /// No context has been available yet
    #[default]
    Uninitialized,
    /// Buffers created; draws and renders are accepted
    Ready,
    /// Buffers released after a context loss; CPU data kept
    TornDown,
}

impl LifecycleState {
    /// Whether a GPU context is active
    pub fn has_context(self) -> bool {
        self == Self::Ready
    }

    /// State after `create_buffers`; legal from every state
    pub fn after_create(self) -> Self {
        Self::Ready
    }

    /// State after `tear_down_buffers`
    pub fn after_tear_down(self) -> Result<Self, ContractViolation> {
        match self {
            Self::Uninitialized => Err(ContractViolation::TearDownBeforeCreate),
            Self::Ready | Self::TornDown => Ok(Self::TornDown),
        }
    }
}

/// Where the current frame is between enqueue and render
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum FramePhase {
    /// Nothing happened since buffers were (re)created
    #[default]
    Idle,
    /// Draws are being collected
    Enqueueing,
    /// `render` ran; the next frame has not started
    Rendered,
}

impl FramePhase {
    pub(crate) fn check_render(self) -> Result<(), ContractViolation> {
        match self {
            Self::Rendered => Err(ContractViolation::RenderWithoutEnqueue),
            Self::Idle | Self::Enqueueing => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legal_transitions() {
        let state = LifecycleState::default();
        assert!(!state.has_context());

        let state = state.after_create();
        assert_eq!(state, LifecycleState::Ready);
        assert_eq!(state.after_create(), LifecycleState::Ready);

        let state = state.after_tear_down().unwrap();
        assert_eq!(state, LifecycleState::TornDown);
        assert_eq!(state.after_tear_down(), Ok(LifecycleState::TornDown));
        assert_eq!(state.after_create(), LifecycleState::Ready);
    }

    #[test]
    fn test_tear_down_before_create() {
        assert_eq!(
            LifecycleState::Uninitialized.after_tear_down(),
            Err(ContractViolation::TearDownBeforeCreate)
        );
    }

    #[test]
    fn test_render_twice() {
        assert!(FramePhase::Idle.check_render().is_ok());
        assert!(FramePhase::Enqueueing.check_render().is_ok());
        assert_eq!(
            FramePhase::Rendered.check_render(),
            Err(ContractViolation::RenderWithoutEnqueue)
        );
    }
}
