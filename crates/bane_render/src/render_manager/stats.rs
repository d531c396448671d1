//! Render statistics

use std::fmt;

use super::lifecycle::LifecycleState;

/// Counters for one `render` call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Frame number, starting at 1
    pub frame: u64,
    /// Opaque candidates consumed
    pub opaque_items: usize,
    /// Transparent candidates consumed
    pub transparent_items: usize,
    /// Draw calls accepted by the device
    pub draw_calls: usize,
    /// Batches formed across both passes
    pub batch_count: usize,
    /// Material binds issued
    pub state_changes: usize,
    /// Sprites drawn through a merged sprite batch
    pub batched_sprites: usize,
    /// Candidates skipped because their mesh was released or not resident
    pub skipped: usize,
    /// Draws or binds the device rejected
    pub device_errors: usize,
    /// Vertices re-uploaded for dynamic meshes and sprite batches
    pub vertices_uploaded: usize,
    /// Time spent submitting (microseconds)
    pub submission_time_us: u64,
}

impl FrameStats {
    /// Candidates consumed in both passes
    pub fn total_items(&self) -> usize {
        self.opaque_items + self.transparent_items
    }

    /// Calculate average draws per batch
    pub fn avg_draws_per_batch(&self) -> f32 {
        if self.batch_count == 0 {
            0.0
        } else {
            self.draw_calls as f32 / self.batch_count as f32
        }
    }
}

/// Snapshot returned by `print_debug_stats`
#[derive(Debug, Clone, PartialEq)]
pub struct DebugStats {
    /// Lifecycle state at the time of the snapshot
    pub state: LifecycleState,
    /// Frames rendered since creation
    pub frames_rendered: u64,
    /// The most recent frame
    pub last_frame: FrameStats,
    /// Draw calls across all frames
    pub total_draw_calls: u64,
    /// Skipped candidates across all frames
    pub total_skipped: u64,
    /// Opaque candidates waiting for the next `render`
    pub pending_opaque: usize,
    /// Transparent candidates waiting for the next `render`
    pub pending_transparent: usize,
    /// Meshes held by the registry
    pub meshes: usize,
    /// Meshes with a GPU copy
    pub resident_meshes: usize,
}

impl fmt::Display for DebugStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Render Stats ({:?}) ===", self.state)?;
        writeln!(
            f,
            "Frame {}: {} draw calls in {} batches ({:.1} per batch), {} state changes",
            self.last_frame.frame,
            self.last_frame.draw_calls,
            self.last_frame.batch_count,
            self.last_frame.avg_draws_per_batch(),
            self.last_frame.state_changes
        )?;
        writeln!(
            f,
            "  items: {} opaque, {} transparent, {} batched sprites, {} skipped, {} device errors",
            self.last_frame.opaque_items,
            self.last_frame.transparent_items,
            self.last_frame.batched_sprites,
            self.last_frame.skipped,
            self.last_frame.device_errors
        )?;
        writeln!(
            f,
            "  pending: {} opaque, {} transparent",
            self.pending_opaque, self.pending_transparent
        )?;
        writeln!(
            f,
            "  meshes: {} loaded, {} resident",
            self.meshes, self.resident_meshes
        )?;
        write!(
            f,
            "  totals: {} frames, {} draw calls, {} skipped",
            self.frames_rendered, self.total_draw_calls, self.total_skipped
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_avg_draws_per_batch() {
        let mut stats = FrameStats::default();
        assert_relative_eq!(stats.avg_draws_per_batch(), 0.0);

        stats.draw_calls = 9;
        stats.batch_count = 3;
        assert_relative_eq!(stats.avg_draws_per_batch(), 3.0);
    }

    #[test]
    fn test_display_mentions_counters() {
        let stats = DebugStats {
            state: LifecycleState::Ready,
            frames_rendered: 2,
            last_frame: FrameStats {
                frame: 2,
                draw_calls: 5,
                batch_count: 2,
                ..FrameStats::default()
            },
            total_draw_calls: 8,
            total_skipped: 1,
            pending_opaque: 0,
            pending_transparent: 0,
            meshes: 3,
            resident_meshes: 3,
        };
        let text = stats.to_string();
        assert!(text.contains("5 draw calls in 2 batches"));
        assert!(text.contains("Ready"));
    }
}
