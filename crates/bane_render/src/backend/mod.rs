//! GPU device abstraction
//!
//! This module defines the trait the render core submits through. The core
//! never talks to a graphics API directly: buffer allocation, state changes
//! and indexed draws all go through [`GpuDevice`], which a platform layer
//! implements on top of its driver.
//!
//! [`RecordingDevice`] is a headless implementation that records every
//! command, used by tests and the demo binary.

pub mod recording;

pub use recording::{BufferContents, DeviceCommand, RecordingDevice};

use std::num::NonZeroU64;

use bitflags::bitflags;
use thiserror::Error;

use crate::foundation::math::Mat4;
use crate::resources::VertexLayout;
use crate::scene::MaterialKey;

/// Result type for device operations
pub type GpuResult<T> = Result<T, GpuError>;

/// Errors reported by a GPU device
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GpuError {
    /// The device could not satisfy an allocation
    #[error("out of GPU memory allocating {requested} bytes for '{label}'")]
    OutOfMemory {
        /// Debug label of the buffer
        label: String,
        /// Total bytes requested
        requested: usize,
    },

    /// The rendering context is gone (e.g. the app was backgrounded)
    #[error("GPU context lost")]
    ContextLost,

    /// The handle does not name a live buffer
    #[error("unknown GPU buffer {0:?}")]
    UnknownBuffer(GpuBufferHandle),

    /// An update wrote past the end of a buffer
    #[error("buffer update out of bounds: {offset} + {len} > {size}")]
    OutOfBounds {
        /// Byte offset of the write
        offset: usize,
        /// Length of the write in bytes
        len: usize,
        /// Size of the vertex region in bytes
        size: usize,
    },
}

/// Opaque handle to a GPU-resident vertex/index buffer pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GpuBufferHandle(pub NonZeroU64);

/// Width of each index in an index buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexFormat {
    /// 16-bit indices
    U16,
    /// 32-bit indices
    U32,
}

impl IndexFormat {
    /// Size of one index in bytes
    pub const fn byte_size(self) -> usize {
        match self {
            Self::U16 => 2,
            Self::U32 => 4,
        }
    }
}

/// Whether a buffer is written once or updated at runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BufferUsage {
    /// Uploaded once after load
    #[default]
    Static,
    /// Vertex data may be rewritten and partially re-uploaded
    Dynamic,
}

bitflags! {
    /// Fixed-function state for a block of draws
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct RenderFlags: u8 {
        /// Depth test enabled
        const DEPTH_TEST = 1;
        /// Depth writes enabled
        const DEPTH_WRITE = 1 << 1;
        /// Alpha blending enabled
        const BLEND = 1 << 2;
    }
}

impl RenderFlags {
    /// Opaque pass: depth test and write, no blending
    pub const OPAQUE: Self = Self::DEPTH_TEST.union(Self::DEPTH_WRITE);

    /// Transparent pass: read-only depth test with blending
    pub const TRANSPARENT: Self = Self::DEPTH_TEST.union(Self::BLEND);
}

/// Everything needed to allocate and fill one GPU buffer
#[derive(Debug, Clone, Copy)]
pub struct BufferDescriptor<'a> {
    /// Debug label, usually the mesh name
    pub label: &'a str,
    /// Interleaved vertex bytes
    pub vertex_data: &'a [u8],
    /// Raw index bytes
    pub index_data: &'a [u8],
    /// Layout of one vertex
    pub layout: &'a VertexLayout,
    /// Width of each index
    pub index_format: IndexFormat,
    /// Update frequency hint
    pub usage: BufferUsage,
}

impl BufferDescriptor<'_> {
    /// Total bytes requested from the device
    pub fn byte_size(&self) -> usize {
        self.vertex_data.len() + self.index_data.len()
    }
}

/// One indexed draw issued to the device
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawSubmission {
    /// Buffer holding vertices and indices
    pub buffer: GpuBufferHandle,
    /// Shader/texture binding in effect
    pub material: MaterialKey,
    /// First index to draw
    pub first_index: u32,
    /// Number of indices to draw
    pub index_count: u32,
    /// Width of each index
    pub index_format: IndexFormat,
    /// Model transform
    pub transform: Mat4,
    /// Per-draw color multiplier
    pub tint: [f32; 4],
    /// Fixed-function state the draw expects
    pub flags: RenderFlags,
}

/// Interface to the GPU driver
///
/// Implementations are used from the render thread only. All calls are
/// fire-and-forget; errors are reported per call and never block.
pub trait GpuDevice {
    /// Allocate a buffer and upload its full contents
    fn create_buffer(&mut self, descriptor: &BufferDescriptor<'_>) -> GpuResult<GpuBufferHandle>;

    /// Overwrite part of the vertex region of a live buffer
    fn update_buffer(&mut self, buffer: GpuBufferHandle, byte_offset: usize, data: &[u8]) -> GpuResult<()>;

    /// Release a buffer; unknown handles are ignored
    fn destroy_buffer(&mut self, buffer: GpuBufferHandle);

    /// Set depth/blend state for subsequent draws
    fn set_render_flags(&mut self, flags: RenderFlags);

    /// Bind the shader program and texture for subsequent draws
    fn bind_material(&mut self, material: MaterialKey) -> GpuResult<()>;

    /// Issue one indexed draw
    fn draw_indexed(&mut self, draw: &DrawSubmission) -> GpuResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pass_presets() {
        assert!(RenderFlags::OPAQUE.contains(RenderFlags::DEPTH_WRITE));
        assert!(!RenderFlags::OPAQUE.contains(RenderFlags::BLEND));
        assert!(RenderFlags::TRANSPARENT.contains(RenderFlags::BLEND | RenderFlags::DEPTH_TEST));
        assert!(!RenderFlags::TRANSPARENT.contains(RenderFlags::DEPTH_WRITE));
    }

    #[test]
    fn test_index_format_sizes() {
        assert_eq!(IndexFormat::U16.byte_size(), 2);
        assert_eq!(IndexFormat::U32.byte_size(), 4);
    }
}
