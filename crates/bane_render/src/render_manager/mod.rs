//! # Render Manager
//!
//! Orchestrates one frame of drawing and the GPU buffer lifecycle.
//!
//! ## Frame flow
//!
//! ```text
//! scene walk ──► draw_* / render_* / enqueue ──► OpaqueSorter / TransparentSorter
//!                                                          │
//! render():  flush dynamic meshes ─► opaque pass ─► transparent pass ─► clear sorters
//! ```
//!
//! The opaque pass draws material groups with depth test and depth write on
//! and blending off. Within a group, quad sprites are merged into one draw by
//! the [`SpriteBatcher`]. The transparent pass draws strictly back to front
//! with a read-only depth test and blending on.
//!
//! ## Buffer lifecycle
//!
//! The platform layer calls [`RenderManager::create_buffers`] whenever a GPU
//! context becomes available and [`RenderManager::tear_down_buffers`] before
//! it goes away. Mesh data stays on the CPU across the pair, so a restore
//! never reloads assets. See [`lifecycle`] for the state machine.
//!
//! ## Misuse
//!
//! Drawing or rendering without a context, rendering twice without a new
//! enqueue phase, and tearing down before the first create are contract
//! violations: they panic in strict mode and are logged and ignored
//! otherwise (see [`RenderConfig::strict_contracts`]).

pub mod lifecycle;
pub mod sprite_batcher;
pub mod stats;


pub use lifecycle::LifecycleState;
pub use sprite_batcher::{PreparedBatch, SpriteBatcher};
pub use stats::{DebugStats, FrameStats};

use std::time::Instant;

use lifecycle::FramePhase;

use crate::assets::{FileMeshSource, MeshSource};
use crate::backend::{DrawSubmission, GpuDevice, RenderFlags};
use crate::config::{ConfigError, RenderConfig};
use crate::error::{report_violation, ContractViolation, RenderResult};
use crate::foundation::math::Mat4;
use crate::resources::{BufferReport, Mesh, MeshHandle, MeshRegistry, Vertex};
use crate::scene::{BlendMode, Camera, DrawCandidate, Label, MaterialKey, ModelNode, Sprite};
use crate::sorting::{Batch, OpaqueSorter, TransparentSorter};

/// Frame orchestrator and owner of GPU-resident mesh buffers
pub struct RenderManager<D: GpuDevice> {
    device: D,
    registry: MeshRegistry,
    opaque: OpaqueSorter,
    transparent: TransparentSorter,
    batcher: Option<SpriteBatcher>,
    camera: Camera,
    state: LifecycleState,
    phase: FramePhase,
    config: RenderConfig,
    strict: bool,
    frames_rendered: u64,
    last_frame: FrameStats,
    total_draw_calls: u64,
    total_skipped: u64,
}

impl<D: GpuDevice> RenderManager<D> {
    /// Create a manager over a device
    ///
    /// The manager starts `Uninitialized`; call
    /// [`create_buffers`](Self::create_buffers) once the context is up.
    pub fn new(device: D, config: RenderConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let strict = config.contracts_are_strict();

        let batcher = if config.sprite_batching {
            let batcher = SpriteBatcher::new(config.max_batch_size)
                .map_err(|e| ConfigError::Invalid(format!("cannot size sprite batch buffer: {e}")))?;
            Some(batcher)
        } else {
            None
        };

        log::info!(
            "Creating render manager (batch size {}, sprite batching {}, depth tolerance {}, strict contracts: {})",
            config.max_batch_size,
            config.sprite_batching,
            config.depth_tolerance,
            strict
        );

        Ok(Self {
            device,
            registry: MeshRegistry::new(),
            opaque: OpaqueSorter::with_capacity(config.initial_capacity),
            transparent: TransparentSorter::new(config.depth_tolerance, config.initial_capacity),
            batcher,
            camera: Camera::default(),
            state: LifecycleState::Uninitialized,
            phase: FramePhase::Idle,
            config,
            strict,
            frames_rendered: 0,
            last_frame: FrameStats::default(),
            total_draw_calls: 0,
            total_skipped: 0,
        })
    }

    /// The GPU device
    pub fn device(&self) -> &D {
        &self.device
    }

    /// Mutable access to the GPU device
    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    /// Active configuration
    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    /// Loaded meshes
    pub fn registry(&self) -> &MeshRegistry {
        &self.registry
    }

    /// Current lifecycle state
    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// Camera used for transparent depth
    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    /// Replace the camera; affects candidates enqueued afterwards
    pub fn set_camera(&mut self, camera: Camera) {
        self.camera = camera;
    }

    /// Opaque candidates pending for this frame
    pub fn opaque_sorter(&self) -> &OpaqueSorter {
        &self.opaque
    }

    /// Transparent candidates pending for this frame
    pub fn transparent_sorter(&self) -> &TransparentSorter {
        &self.transparent
    }

    /// Sprite batcher, when batching is enabled
    pub fn sprite_batcher(&self) -> Option<&SpriteBatcher> {
        self.batcher.as_ref()
    }

    /// Counters of the most recent `render`
    pub fn last_frame_stats(&self) -> &FrameStats {
        &self.last_frame
    }

    // ---------------------------------------------------------------------
    // Mesh management
    // ---------------------------------------------------------------------

    /// File source over the configured search paths
    pub fn file_mesh_source(&self) -> FileMeshSource {
        FileMeshSource::new(self.config.mesh_search_paths.iter())
    }

    /// Load (or re-reference) mesh `name` and upload it if a context is active
    ///
    /// Load errors are returned and leave nothing behind. An upload failure is
    /// logged; the mesh stays loaded and the next
    /// [`create_buffers`](Self::create_buffers) retries it.
    pub fn load_mesh(&mut self, name: &str, format: &str, source: &dyn MeshSource) -> RenderResult<MeshHandle> {
        let handle = self.registry.acquire(name, format, source)?;
        self.upload_if_ready(handle)?;
        Ok(handle)
    }

    /// Register a mesh built at runtime, uploading it if a context is active
    pub fn insert_mesh(&mut self, mesh: Mesh) -> RenderResult<MeshHandle> {
        let handle = self.registry.insert(mesh);
        self.upload_if_ready(handle)?;
        Ok(handle)
    }

    /// Drop a reference to a mesh; returns the remaining count
    pub fn release_mesh(&mut self, handle: MeshHandle) -> RenderResult<usize> {
        self.registry.release(handle, &mut self.device)
    }

    /// Rewrite vertices of a dynamic mesh; uploaded on the next `render`
    pub fn update_dynamic_mesh(&mut self, handle: MeshHandle, offset: usize, vertices: &[Vertex]) -> RenderResult<()> {
        self.registry.update_dynamic(handle, offset, vertices)
    }

    /// Rebuild a label's glyph quads from its current text
    pub fn update_label(&mut self, label: &Label) -> RenderResult<()> {
        let vertices = label.glyph_vertices();
        self.registry.update_dynamic(label.mesh, 0, &vertices)
    }

    fn upload_if_ready(&mut self, handle: MeshHandle) -> RenderResult<()> {
        if self.state.has_context() {
            let report = self.registry.create_one(handle, &mut self.device)?;
            for (name, error) in &report.failed {
                log::error!("Mesh '{}' loaded but not uploaded: {}", name, error);
            }
        }
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Enqueue phase
    // ---------------------------------------------------------------------

    /// Start collecting draws for a new frame
    ///
    /// Optional when the frame enqueues at least one draw; needed to render
    /// an empty frame right after another `render`.
    pub fn begin_frame(&mut self) {
        self.accept_draws();
    }

    /// Route a candidate by its current blend classification
    pub fn enqueue(&mut self, candidate: DrawCandidate) {
        if !self.accept_draws() {
            return;
        }
        match candidate.blend_mode() {
            BlendMode::Opaque => self.opaque.enqueue(candidate),
            BlendMode::Transparent => self.push_transparent(candidate),
        }
    }

    /// Draw a sprite in the opaque pass regardless of its alpha
    pub fn draw_opaque_sprite(&mut self, sprite: &Sprite) {
        if self.accept_draws() {
            self.opaque.enqueue(sprite.candidate());
        }
    }

    /// Draw a sprite in the transparent pass
    pub fn draw_transparent_sprite(&mut self, sprite: &Sprite) {
        if self.accept_draws() {
            self.push_transparent(sprite.candidate());
        }
    }

    /// Draw a label in the transparent pass
    pub fn draw_transparent_label(&mut self, label: &Label) {
        if self.accept_draws() {
            self.push_transparent(label.candidate());
        }
    }

    /// Draw a model, classified by its current opacity
    pub fn render_model(&mut self, model: &ModelNode) {
        self.enqueue(model.candidate());
    }

    /// Draw a sprite, classified by its current color and flags
    pub fn render_sprite(&mut self, sprite: &Sprite) {
        self.enqueue(sprite.candidate());
    }

    fn push_transparent(&mut self, candidate: DrawCandidate) {
        let depth = self.camera.view_depth(&candidate.world_position());
        self.transparent.enqueue(candidate, depth);
    }

    fn accept_draws(&mut self) -> bool {
        if !self.state.has_context() {
            report_violation(ContractViolation::EnqueueOutsideContext { state: self.state }, self.strict);
            return false;
        }
        self.phase = FramePhase::Enqueueing;
        true
    }

    // ---------------------------------------------------------------------
    // Submission
    // ---------------------------------------------------------------------

    /// Submit the frame and clear both sorters
    ///
    /// Candidates whose mesh was released or has no GPU buffer are skipped;
    /// device errors on a single draw are logged and the frame continues.
    pub fn render(&mut self) {
        if !self.state.has_context() {
            report_violation(ContractViolation::RenderOutsideContext { state: self.state }, self.strict);
            return;
        }
        if let Err(violation) = self.phase.check_render() {
            report_violation(violation, self.strict);
            return;
        }

        let start = Instant::now();
        let mut frame = FrameStats {
            frame: self.frames_rendered + 1,
            opaque_items: self.opaque.len(),
            transparent_items: self.transparent.len(),
            ..FrameStats::default()
        };

        frame.vertices_uploaded = self.registry.flush_dynamic(&mut self.device);

        let max_batch_size = self.config.max_batch_size;

        let opaque_batches = self.opaque.batches(max_batch_size);
        let opaque: Vec<&DrawCandidate> = self.opaque.ordered().collect();
        submit_pass(
            &mut self.device,
            &self.registry,
            self.batcher.as_mut(),
            RenderFlags::OPAQUE,
            &opaque,
            &opaque_batches,
            &mut frame,
        );

        self.transparent.sort();
        let transparent_batches = self.transparent.batches(max_batch_size);
        let transparent: Vec<&DrawCandidate> = self.transparent.ordered().iter().map(|entry| &entry.candidate).collect();
        submit_pass(
            &mut self.device,
            &self.registry,
            None,
            RenderFlags::TRANSPARENT,
            &transparent,
            &transparent_batches,
            &mut frame,
        );

        self.opaque.clear();
        self.transparent.clear();
        self.phase = FramePhase::Rendered;

        if frame.skipped > 0 {
            log::warn!("Frame {}: skipped {} draws without a GPU buffer", frame.frame, frame.skipped);
        }

        frame.submission_time_us = u64::try_from(start.elapsed().as_micros()).unwrap_or(u64::MAX);
        self.frames_rendered = frame.frame;
        self.total_draw_calls += frame.draw_calls as u64;
        self.total_skipped += frame.skipped as u64;
        self.last_frame = frame;

        if let Some(interval) = self.config.stats_log_interval {
            if self.frames_rendered % u64::from(interval) == 0 {
                let _ = self.print_debug_stats();
            }
        }
    }

    // ---------------------------------------------------------------------
    // Buffer lifecycle
    // ---------------------------------------------------------------------

    /// Upload every loaded mesh that has no GPU buffer yet
    ///
    /// Call when a GPU context becomes available. Calling it again while
    /// ready retries meshes whose allocation failed. Failures are logged and
    /// returned; affected meshes are skipped by `render` until a later call
    /// succeeds.
    pub fn create_buffers(&mut self) -> BufferReport {
        let report = self.registry.create_all(&mut self.device);
        if let Some(batcher) = self.batcher.as_mut() {
            if let Err(e) = batcher.create_gpu(&mut self.device) {
                log::warn!("Sprite batch buffer not allocated, sprites draw one by one: {}", e);
            }
        }
        self.state = self.state.after_create();
        if self.phase == FramePhase::Rendered {
            self.phase = FramePhase::Idle;
        }

        if report.is_complete() {
            log::info!(
                "Buffers ready: {} created, {} already resident",
                report.created,
                report.already_resident
            );
        } else {
            log::error!(
                "Buffers partially ready: {} created, {} failed",
                report.created,
                report.failed.len()
            );
        }
        report
    }

    /// Release every GPU buffer, keeping mesh data for the next create
    ///
    /// Call before the GPU context goes away. Pending draws are dropped.
    pub fn tear_down_buffers(&mut self) {
        let next = match self.state.after_tear_down() {
            Ok(next) => next,
            Err(violation) => {
                report_violation(violation, self.strict);
                return;
            }
        };

        self.drop_pending("tear down");
        let released = self.registry.tear_down_all(&mut self.device);
        if let Some(batcher) = self.batcher.as_mut() {
            batcher.destroy_gpu(&mut self.device);
        }
        self.state = next;
        self.phase = FramePhase::Idle;
        log::info!("Tore down {} GPU buffers", released);
    }

    /// The context vanished without a tear down; forget every GPU handle
    ///
    /// The driver already freed the buffers, so nothing is sent to the device.
    pub fn context_lost(&mut self) {
        log::warn!("GPU context lost while {:?}", self.state);
        self.drop_pending("context loss");
        self.registry.invalidate_all();
        if let Some(batcher) = self.batcher.as_mut() {
            batcher.invalidate_gpu();
        }
        if self.state == LifecycleState::Ready {
            self.state = LifecycleState::TornDown;
        }
        self.phase = FramePhase::Idle;
    }

    fn drop_pending(&mut self, reason: &str) {
        let pending = self.opaque.len() + self.transparent.len();
        if pending > 0 {
            log::warn!("Dropping {} pending draws on {}", pending, reason);
            self.opaque.clear();
            self.transparent.clear();
        }
    }

    // ---------------------------------------------------------------------
    // Diagnostics
    // ---------------------------------------------------------------------

    /// Current counters without logging them
    pub fn debug_stats(&self) -> DebugStats {
        DebugStats {
            state: self.state,
            frames_rendered: self.frames_rendered,
            last_frame: self.last_frame,
            total_draw_calls: self.total_draw_calls,
            total_skipped: self.total_skipped,
            pending_opaque: self.opaque.len(),
            pending_transparent: self.transparent.len(),
            meshes: self.registry.len(),
            resident_meshes: self.registry.resident_count(),
        }
    }

    /// Log the counters at info level and return them
    pub fn print_debug_stats(&self) -> DebugStats {
        let stats = self.debug_stats();
        for line in stats.to_string().lines() {
            log::info!("{}", line);
        }
        stats
    }
}

impl<D: GpuDevice> Drop for RenderManager<D> {
    fn drop(&mut self) {
        let released = self.registry.tear_down_all(&mut self.device);
        if let Some(batcher) = self.batcher.as_mut() {
            batcher.destroy_gpu(&mut self.device);
        }
        if released > 0 {
            log::debug!("Released {} GPU buffers on shutdown", released);
        }
    }
}

/// Submit one pass: set state, then bind once per material change and draw
///
/// A batch whose candidates all lack a GPU buffer is skipped before binding.
fn submit_pass<D: GpuDevice>(
    device: &mut D,
    registry: &MeshRegistry,
    mut batcher: Option<&mut SpriteBatcher>,
    flags: RenderFlags,
    candidates: &[&DrawCandidate],
    batches: &[Batch],
    frame: &mut FrameStats,
) {
    if candidates.is_empty() {
        return;
    }
    device.set_render_flags(flags);

    let mut bound: Option<MaterialKey> = None;
    for batch in batches {
        let run = &candidates[batch.range.clone()];

        if !run.iter().any(|candidate| is_drawable(registry, candidate)) {
            for candidate in run {
                submit_draw(device, registry, flags, candidate, frame);
            }
            continue;
        }
        frame.batch_count += 1;

        if bound != Some(batch.key) {
            if let Err(e) = device.bind_material(batch.key) {
                log::warn!("Failed to bind material {:?}: {}", batch.key, e);
                frame.device_errors += batch.len();
                bound = None;
                continue;
            }
            bound = Some(batch.key);
            frame.state_changes += 1;
        }

        let mut merged = vec![false; run.len()];
        if let Some(batcher) = batcher.as_deref_mut() {
            submit_sprite_batch(device, registry, batcher, flags, batch.key, run, &mut merged, frame);
        }

        for (candidate, _) in run.iter().zip(&merged).filter(|(_, merged)| !**merged) {
            submit_draw(device, registry, flags, candidate, frame);
        }
    }
}

fn is_drawable(registry: &MeshRegistry, candidate: &DrawCandidate) -> bool {
    registry
        .get(candidate.mesh())
        .is_some_and(|mesh| mesh.vertex_buffer().is_resident())
}

/// Merge the quad sprites of one run into a single draw
///
/// Marks the merged positions in `merged`. Fewer than two sprites, or a
/// failed upload, leaves everything to per-candidate draws.
fn submit_sprite_batch<D: GpuDevice>(
    device: &mut D,
    registry: &MeshRegistry,
    batcher: &mut SpriteBatcher,
    flags: RenderFlags,
    material: MaterialKey,
    run: &[&DrawCandidate],
    merged: &mut [bool],
    frame: &mut FrameStats,
) {
    if !batcher.is_resident() {
        return;
    }

    let mut positions = Vec::with_capacity(run.len());
    let mut sprites = Vec::with_capacity(run.len());
    for (position, candidate) in run.iter().enumerate() {
        if let DrawCandidate::Sprite(sprite) = candidate {
            if let Some(mesh) = registry.get(sprite.mesh).filter(|mesh| SpriteBatcher::accepts(mesh)) {
                positions.push(position);
                sprites.push((sprite, mesh));
            }
        }
    }
    if sprites.len() < 2 {
        return;
    }

    let prepared = match batcher.prepare(&sprites, device) {
        Ok(prepared) => prepared,
        Err(e) => {
            log::warn!("Sprite batch upload failed, drawing {} sprites one by one: {}", sprites.len(), e);
            return;
        }
    };
    frame.vertices_uploaded += prepared.vertices_uploaded;

    let submission = DrawSubmission {
        buffer: prepared.buffer,
        material,
        first_index: 0,
        index_count: prepared.index_count,
        index_format: prepared.index_format,
        transform: Mat4::identity(),
        tint: Vertex::WHITE,
        flags,
    };
    match device.draw_indexed(&submission) {
        Ok(()) => {
            frame.draw_calls += 1;
            frame.batched_sprites += sprites.len();
        }
        Err(e) => {
            log::warn!("Batched draw of {} sprites failed: {}", sprites.len(), e);
            frame.device_errors += 1;
        }
    }

    for position in positions {
        merged[position] = true;
    }
}

fn submit_draw<D: GpuDevice>(
    device: &mut D,
    registry: &MeshRegistry,
    flags: RenderFlags,
    candidate: &DrawCandidate,
    frame: &mut FrameStats,
) {
    let Some(mesh) = registry.get(candidate.mesh()) else {
        log::debug!("Skipping {} {:?}: mesh was released", candidate.kind_name(), candidate.node());
        frame.skipped += 1;
        return;
    };
    let Some(buffer) = mesh.vertex_buffer().gpu_handle() else {
        log::debug!(
            "Skipping {} {:?}: mesh '{}' has no GPU buffer",
            candidate.kind_name(),
            candidate.node(),
            mesh.name()
        );
        frame.skipped += 1;
        return;
    };

    let index_count = u32::try_from(mesh.vertex_index_length()).unwrap_or(u32::MAX);
    let range = candidate.index_range(index_count);
    if range.is_empty() {
        return;
    }

    let submission = DrawSubmission {
        buffer,
        material: candidate.material(),
        first_index: range.start,
        index_count: range.end - range.start,
        index_format: mesh.index_format(),
        transform: *candidate.transform(),
        tint: candidate.tint(),
        flags,
    };

    match device.draw_indexed(&submission) {
        Ok(()) => frame.draw_calls += 1,
        Err(e) => {
            log::warn!("Draw of {} {:?} failed: {}", candidate.kind_name(), candidate.node(), e);
            frame.device_errors += 1;
        }
    }
}
