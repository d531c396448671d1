//! Headless GPU device that records commands
//!
//! Keeps the contents of every live buffer so callers can compare what was
//! uploaded before and after a context loss, and can be told to fail
//! allocations to exercise the error paths of the render core.

use std::collections::{HashMap, HashSet};
use std::num::NonZeroU64;

use super::{BufferDescriptor, DrawSubmission, GpuBufferHandle, GpuDevice, GpuError, GpuResult, RenderFlags};
use crate::scene::MaterialKey;

/// A command observed by the recording device
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceCommand {
    /// A buffer was allocated
    CreateBuffer {
        /// Handle handed out
        handle: GpuBufferHandle,
        /// Debug label
        label: String,
        /// Total bytes uploaded
        bytes: usize,
    },
    /// Part of a buffer was re-uploaded
    UpdateBuffer {
        /// Target buffer
        handle: GpuBufferHandle,
        /// Byte offset into the vertex region
        offset: usize,
        /// Bytes written
        bytes: usize,
    },
    /// A buffer was released
    DestroyBuffer(GpuBufferHandle),
    /// Fixed-function state changed
    SetRenderFlags(RenderFlags),
    /// A material was bound
    BindMaterial(MaterialKey),
    /// An indexed draw was issued
    Draw(DrawSubmission),
}

/// Contents of a live buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferContents {
    /// Debug label
    pub label: String,
    /// Vertex bytes as currently stored on the "GPU"
    pub vertex_data: Vec<u8>,
    /// Index bytes
    pub index_data: Vec<u8>,
}

/// GPU device that records instead of rendering
#[derive(Debug)]
pub struct RecordingDevice {
    commands: Vec<DeviceCommand>,
    buffers: HashMap<GpuBufferHandle, BufferContents>,
    next_handle: u64,
    fail_next: usize,
    failing_labels: HashSet<String>,
    context_lost: bool,
    memory_budget: Option<usize>,
}

impl RecordingDevice {
    /// Create a device with an empty command log
    pub fn new() -> Self {
        Self {
            commands: Vec::new(),
            buffers: HashMap::new(),
            next_handle: 1,
            fail_next: 0,
            failing_labels: HashSet::new(),
            context_lost: false,
            memory_budget: None,
        }
    }

    /// Make the next `count` allocations fail with out-of-memory
    pub fn fail_next_allocations(&mut self, count: usize) {
        self.fail_next = count;
    }

    /// Make every allocation with this label fail until cleared
    pub fn fail_allocations_for(&mut self, label: impl Into<String>) {
        self.failing_labels.insert(label.into());
    }

    /// Stop failing allocations
    pub fn clear_failures(&mut self) {
        self.fail_next = 0;
        self.failing_labels.clear();
    }

    /// Limit total bytes held by live buffers
    pub fn set_memory_budget(&mut self, bytes: Option<usize>) {
        self.memory_budget = bytes;
    }

    /// Simulate the platform destroying the context: every handle becomes invalid
    pub fn lose_context(&mut self) {
        self.context_lost = true;
        self.buffers.clear();
    }

    /// Simulate a fresh context becoming available
    pub fn restore_context(&mut self) {
        self.context_lost = false;
    }

    /// All commands recorded so far
    pub fn commands(&self) -> &[DeviceCommand] {
        &self.commands
    }

    /// Draws recorded so far, in submission order
    pub fn draws(&self) -> Vec<&DrawSubmission> {
        self.commands
            .iter()
            .filter_map(|command| match command {
                DeviceCommand::Draw(draw) => Some(draw),
                _ => None,
            })
            .collect()
    }

    /// Number of material binds recorded
    pub fn material_bind_count(&self) -> usize {
        self.commands
            .iter()
            .filter(|command| matches!(command, DeviceCommand::BindMaterial(_)))
            .count()
    }

    /// Forget recorded commands, keeping buffers alive
    pub fn clear_commands(&mut self) {
        self.commands.clear();
    }

    /// Number of buffers currently allocated
    pub fn live_buffer_count(&self) -> usize {
        self.buffers.len()
    }

    /// Contents of a live buffer
    pub fn buffer_contents(&self, handle: GpuBufferHandle) -> Option<&BufferContents> {
        self.buffers.get(&handle)
    }

    /// Contents of the live buffer with the given label
    pub fn buffer_contents_by_label(&self, label: &str) -> Option<&BufferContents> {
        self.buffers.values().find(|contents| contents.label == label)
    }

    fn bytes_in_use(&self) -> usize {
        self.buffers
            .values()
            .map(|contents| contents.vertex_data.len() + contents.index_data.len())
            .sum()
    }

    fn check_context(&self) -> GpuResult<()> {
        if self.context_lost {
            Err(GpuError::ContextLost)
        } else {
            Ok(())
        }
    }
}

impl Default for RecordingDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl GpuDevice for RecordingDevice {
    fn create_buffer(&mut self, descriptor: &BufferDescriptor<'_>) -> GpuResult<GpuBufferHandle> {
        self.check_context()?;

        let requested = descriptor.byte_size();
        let over_budget = self
            .memory_budget
            .is_some_and(|budget| self.bytes_in_use() + requested > budget);

        // Label and budget failures do not use up a counted failure
        let failing = if over_budget || self.failing_labels.contains(descriptor.label) {
            true
        } else if self.fail_next > 0 {
            self.fail_next -= 1;
            true
        } else {
            false
        };
        if failing {
            return Err(GpuError::OutOfMemory {
                label: descriptor.label.to_string(),
                requested,
            });
        }

        let id = NonZeroU64::new(self.next_handle).ok_or(GpuError::ContextLost)?;
        self.next_handle += 1;
        let handle = GpuBufferHandle(id);

        self.buffers.insert(
            handle,
            BufferContents {
                label: descriptor.label.to_string(),
                vertex_data: descriptor.vertex_data.to_vec(),
                index_data: descriptor.index_data.to_vec(),
            },
        );
        self.commands.push(DeviceCommand::CreateBuffer {
            handle,
            label: descriptor.label.to_string(),
            bytes: requested,
        });

        Ok(handle)
    }

    fn update_buffer(&mut self, buffer: GpuBufferHandle, byte_offset: usize, data: &[u8]) -> GpuResult<()> {
        self.check_context()?;

        let contents = self.buffers.get_mut(&buffer).ok_or(GpuError::UnknownBuffer(buffer))?;
        let size = contents.vertex_data.len();
        let end = byte_offset
            .checked_add(data.len())
            .filter(|end| *end <= size)
            .ok_or(GpuError::OutOfBounds {
                offset: byte_offset,
                len: data.len(),
                size,
            })?;

        contents.vertex_data[byte_offset..end].copy_from_slice(data);
        self.commands.push(DeviceCommand::UpdateBuffer {
            handle: buffer,
            offset: byte_offset,
            bytes: data.len(),
        });
        Ok(())
    }

    fn destroy_buffer(&mut self, buffer: GpuBufferHandle) {
        if self.buffers.remove(&buffer).is_some() {
            self.commands.push(DeviceCommand::DestroyBuffer(buffer));
        }
    }

    fn set_render_flags(&mut self, flags: RenderFlags) {
        self.commands.push(DeviceCommand::SetRenderFlags(flags));
    }

    fn bind_material(&mut self, material: MaterialKey) -> GpuResult<()> {
        self.check_context()?;
        self.commands.push(DeviceCommand::BindMaterial(material));
        Ok(())
    }

    fn draw_indexed(&mut self, draw: &DrawSubmission) -> GpuResult<()> {
        self.check_context()?;
        if !self.buffers.contains_key(&draw.buffer) {
            return Err(GpuError::UnknownBuffer(draw.buffer));
        }
        self.commands.push(DeviceCommand::Draw(*draw));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BufferUsage, IndexFormat};
    use crate::resources::VertexLayout;

    fn descriptor<'a>(label: &'a str, vertices: &'a [u8], layout: &'a VertexLayout) -> BufferDescriptor<'a> {
        BufferDescriptor {
            label,
            vertex_data: vertices,
            index_data: &[0, 0, 1, 0, 2, 0],
            layout,
            index_format: IndexFormat::U16,
            usage: BufferUsage::Static,
        }
    }

    #[test]
    fn test_create_and_destroy() {
        let layout = VertexLayout::standard();
        let mut device = RecordingDevice::new();
        let handle = device.create_buffer(&descriptor("quad", &[1, 2, 3, 4], &layout)).unwrap();

        assert_eq!(device.live_buffer_count(), 1);
        assert_eq!(device.buffer_contents(handle).unwrap().vertex_data, vec![1, 2, 3, 4]);

        device.destroy_buffer(handle);
        assert_eq!(device.live_buffer_count(), 0);
        assert!(matches!(device.commands().last(), Some(DeviceCommand::DestroyBuffer(h)) if *h == handle));
    }

    #[test]
    fn test_injected_failures() {
        let layout = VertexLayout::standard();
        let mut device = RecordingDevice::new();
        device.fail_next_allocations(1);
        assert!(matches!(
            device.create_buffer(&descriptor("a", &[0; 4], &layout)),
            Err(GpuError::OutOfMemory { .. })
        ));
        assert!(device.create_buffer(&descriptor("a", &[0; 4], &layout)).is_ok());

        device.fail_allocations_for("b");
        assert!(device.create_buffer(&descriptor("b", &[0; 4], &layout)).is_err());
        device.clear_failures();
        assert!(device.create_buffer(&descriptor("b", &[0; 4], &layout)).is_ok());
    }

    #[test]
    fn test_label_failure_keeps_counted_failures() {
        let layout = VertexLayout::standard();
        let mut device = RecordingDevice::new();
        device.fail_next_allocations(1);
        device.fail_allocations_for("b");

        assert!(device.create_buffer(&descriptor("b", &[0; 4], &layout)).is_err());
        assert!(device.create_buffer(&descriptor("a", &[0; 4], &layout)).is_err());
        assert!(device.create_buffer(&descriptor("a", &[0; 4], &layout)).is_ok());
    }

    #[test]
    fn test_budget_failure_keeps_counted_failures() {
        let layout = VertexLayout::standard();
        let mut device = RecordingDevice::new();
        device.set_memory_budget(Some(8));
        device.fail_next_allocations(1);

        assert!(device.create_buffer(&descriptor("big", &[0; 4], &layout)).is_err());
        device.set_memory_budget(None);
        assert!(device.create_buffer(&descriptor("a", &[0; 4], &layout)).is_err());
        assert!(device.create_buffer(&descriptor("a", &[0; 4], &layout)).is_ok());
    }

    #[test]
    fn test_memory_budget() {
        let layout = VertexLayout::standard();
        let mut device = RecordingDevice::new();
        device.set_memory_budget(Some(12));
        assert!(device.create_buffer(&descriptor("a", &[0; 4], &layout)).is_ok());
        assert!(device.create_buffer(&descriptor("b", &[0; 4], &layout)).is_err());
    }

    #[test]
    fn test_update_bounds() {
        let layout = VertexLayout::standard();
        let mut device = RecordingDevice::new();
        let handle = device.create_buffer(&descriptor("a", &[0; 4], &layout)).unwrap();

        device.update_buffer(handle, 2, &[9, 9]).unwrap();
        assert_eq!(device.buffer_contents(handle).unwrap().vertex_data, vec![0, 0, 9, 9]);
        assert!(matches!(
            device.update_buffer(handle, 3, &[1, 1]),
            Err(GpuError::OutOfBounds { .. })
        ));
    }

    #[test]
    fn test_lost_context_invalidates_buffers() {
        let layout = VertexLayout::standard();
        let mut device = RecordingDevice::new();
        device.create_buffer(&descriptor("a", &[0; 4], &layout)).unwrap();

        device.lose_context();
        assert_eq!(device.live_buffer_count(), 0);
        assert_eq!(
            device.create_buffer(&descriptor("a", &[0; 4], &layout)),
            Err(GpuError::ContextLost)
        );

        device.restore_context();
        assert!(device.create_buffer(&descriptor("a", &[0; 4], &layout)).is_ok());
    }
}
