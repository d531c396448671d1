//! Mesh registry - shared mesh ownership and GPU residency
//!
//! Meshes are shared between scene nodes. Instead of ambient reference
//! counting, the registry owns every mesh in a `slotmap` arena and hands out
//! [`MeshHandle`]s. Nodes take a reference with [`MeshRegistry::acquire`] or
//! [`MeshRegistry::retain`] and give it back with [`MeshRegistry::release`];
//! the mesh (and its GPU buffer) goes away when the last reference does.
//!
//! Loaded meshes are cached by name and source format, so the same name in
//! two formats yields two meshes. The registry is also where buffer creation
//! and teardown fan out to every loaded mesh.

use std::collections::HashMap;

use slotmap::{new_key_type, SlotMap};

use super::mesh::Mesh;
use super::vertex_buffer::Vertex;
use crate::assets::MeshSource;
use crate::backend::{GpuDevice, GpuError};
use crate::error::{RenderError, RenderResult};

new_key_type! {
    /// Handle to a mesh stored in a [`MeshRegistry`]
    pub struct MeshHandle;
}

/// Outcome of a buffer creation pass
#[derive(Debug, Default, Clone, PartialEq)]
#[must_use]
pub struct BufferReport {
    /// Buffers newly allocated in this pass
    pub created: usize,
    /// Buffers that were already resident
    pub already_resident: usize,
    /// Meshes whose allocation failed, with the device error
    pub failed: Vec<(String, GpuError)>,
}

impl BufferReport {
    /// Whether every buffer is resident
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    pub(crate) fn merge(&mut self, other: Self) {
        self.created += other.created;
        self.already_resident += other.already_resident;
        self.failed.extend(other.failed);
    }
}

#[derive(Debug)]
struct MeshEntry {
    mesh: Mesh,
    ref_count: usize,
    format: Option<String>,
}

impl MeshEntry {
    fn lookup_key(&self) -> LookupKey {
        lookup_key(self.mesh.name(), self.format.as_deref())
    }
}

/// Name plus lowercased source format; runtime meshes have no format
type LookupKey = (String, Option<String>);

fn lookup_key(name: &str, format: Option<&str>) -> LookupKey {
    (name.to_string(), format.map(str::to_ascii_lowercase))
}

/// Arena of shared meshes keyed by handle, indexed by name and format
#[derive(Debug, Default)]
pub struct MeshRegistry {
    meshes: SlotMap<MeshHandle, MeshEntry>,
    by_name: HashMap<LookupKey, MeshHandle>,
}

impl MeshRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a reference to mesh `name` stored as `format`, loading it on first use
    ///
    /// The format is matched case-insensitively.
    pub fn acquire(&mut self, name: &str, format: &str, source: &dyn MeshSource) -> RenderResult<MeshHandle> {
        if let Some(handle) = self.handle_of(name, Some(format)) {
            self.retain(handle)?;
            return Ok(handle);
        }

        if self.by_name.keys().any(|(cached, _)| cached == name) {
            log::warn!("Mesh '{}' already loaded in another format; loading '{}' separately", name, format);
        }

        let mesh = Mesh::load(name, format, source)?;
        Ok(self.insert_entry(mesh, Some(format)))
    }

    /// Take ownership of a runtime mesh with a reference count of one
    ///
    /// A mesh with the same name replaces the name lookup but the older
    /// handle stays valid until released.
    pub fn insert(&mut self, mesh: Mesh) -> MeshHandle {
        self.insert_entry(mesh, None)
    }

    fn insert_entry(&mut self, mesh: Mesh, format: Option<&str>) -> MeshHandle {
        let entry = MeshEntry {
            mesh,
            ref_count: 1,
            format: format.map(str::to_ascii_lowercase),
        };
        let key = entry.lookup_key();
        let handle = self.meshes.insert(entry);
        if let Some(previous) = self.by_name.insert(key, handle) {
            log::warn!(
                "Mesh name '{}' registered twice; lookups now return the newer mesh (older: {:?})",
                self.meshes[handle].mesh.name(),
                previous
            );
        }
        handle
    }

    /// Add a reference to an existing mesh
    pub fn retain(&mut self, handle: MeshHandle) -> RenderResult<usize> {
        let entry = self.meshes.get_mut(handle).ok_or(RenderError::UnknownMesh)?;
        entry.ref_count += 1;
        Ok(entry.ref_count)
    }

    /// Drop a reference, destroying the mesh and its GPU buffer at zero
    ///
    /// Returns the remaining reference count.
    pub fn release(&mut self, handle: MeshHandle, device: &mut dyn GpuDevice) -> RenderResult<usize> {
        let entry = self.meshes.get_mut(handle).ok_or(RenderError::UnknownMesh)?;
        entry.ref_count -= 1;
        if entry.ref_count > 0 {
            return Ok(entry.ref_count);
        }

        if let Some(mut entry) = self.meshes.remove(handle) {
            entry.mesh.vertex_buffer_mut().destroy_gpu(device);
            let key = entry.lookup_key();
            if self.by_name.get(&key) == Some(&handle) {
                self.by_name.remove(&key);
            }
            log::debug!("Released mesh '{}'", entry.mesh.name());
        }
        Ok(0)
    }

    /// Look up a mesh
    pub fn get(&self, handle: MeshHandle) -> Option<&Mesh> {
        self.meshes.get(handle).map(|entry| &entry.mesh)
    }

    /// Handle of the mesh registered under `name`
    ///
    /// `format` is the source format for loaded meshes and `None` for meshes
    /// inserted at runtime.
    pub fn handle_of(&self, name: &str, format: Option<&str>) -> Option<MeshHandle> {
        self.by_name.get(&lookup_key(name, format)).copied()
    }

    /// Current reference count of a mesh
    pub fn ref_count(&self, handle: MeshHandle) -> Option<usize> {
        self.meshes.get(handle).map(|entry| entry.ref_count)
    }

    /// Number of meshes held
    pub fn len(&self) -> usize {
        self.meshes.len()
    }

    /// Whether no meshes are held
    pub fn is_empty(&self) -> bool {
        self.meshes.is_empty()
    }

    /// Number of meshes with a GPU copy
    pub fn resident_count(&self) -> usize {
        self.meshes
            .values()
            .filter(|entry| entry.mesh.vertex_buffer().is_resident())
            .count()
    }

    /// Iterate over all meshes
    pub fn iter(&self) -> impl Iterator<Item = (MeshHandle, &Mesh)> {
        self.meshes.iter().map(|(handle, entry)| (handle, &entry.mesh))
    }

    /// Upload one mesh if it is not resident yet
    pub fn create_one(&mut self, handle: MeshHandle, device: &mut dyn GpuDevice) -> RenderResult<BufferReport> {
        let entry = self.meshes.get_mut(handle).ok_or(RenderError::UnknownMesh)?;
        Ok(Self::create_entry(entry, device))
    }

    /// Upload every mesh that is not resident
    ///
    /// Failures are collected, logged and leave that mesh without a handle;
    /// the pass continues with the remaining meshes.
    pub fn create_all(&mut self, device: &mut dyn GpuDevice) -> BufferReport {
        let mut report = BufferReport::default();
        for entry in self.meshes.values_mut() {
            report.merge(Self::create_entry(entry, device));
        }
        report
    }

    /// Release every GPU copy, keeping CPU data
    pub fn tear_down_all(&mut self, device: &mut dyn GpuDevice) -> usize {
        let mut released = 0;
        for entry in self.meshes.values_mut() {
            let buffer = entry.mesh.vertex_buffer_mut();
            if buffer.is_resident() {
                buffer.destroy_gpu(device);
                released += 1;
            }
        }
        released
    }

    /// Forget every GPU handle after the context was lost behind our back
    pub fn invalidate_all(&mut self) {
        for entry in self.meshes.values_mut() {
            entry.mesh.vertex_buffer_mut().invalidate_gpu();
        }
    }

    /// Rewrite vertices of a dynamic mesh
    pub fn update_dynamic(&mut self, handle: MeshHandle, offset: usize, vertices: &[Vertex]) -> RenderResult<()> {
        let entry = self.meshes.get_mut(handle).ok_or(RenderError::UnknownMesh)?;
        entry.mesh.vertex_buffer_mut().write_vertices(offset, vertices)
    }

    /// Re-upload dirty ranges of resident dynamic meshes
    ///
    /// Returns the number of vertices uploaded. A failed upload is logged and
    /// leaves that mesh dirty so the next frame retries.
    pub fn flush_dynamic(&mut self, device: &mut dyn GpuDevice) -> usize {
        let mut uploaded = 0;
        for entry in self.meshes.values_mut() {
            let buffer = entry.mesh.vertex_buffer_mut();
            if !buffer.is_dirty() || !buffer.is_resident() {
                continue;
            }
            match buffer.flush(device) {
                Ok(count) => uploaded += count,
                Err(e) => log::warn!("Failed to re-upload '{}': {}", buffer.label(), e),
            }
        }
        uploaded
    }

    fn create_entry(entry: &mut MeshEntry, device: &mut dyn GpuDevice) -> BufferReport {
        let mut report = BufferReport::default();
        let buffer = entry.mesh.vertex_buffer_mut();

        if buffer.is_resident() {
            report.already_resident += 1;
            return report;
        }

        match buffer.create_gpu(device) {
            Ok(_) => report.created += 1,
            Err(e) => {
                log::error!("Failed to create GPU buffer for mesh '{}': {}", entry.mesh.name(), e);
                report.failed.push((entry.mesh.name().to_string(), e));
            }
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::{AssetError, MemoryMeshSource, MeshData};
    use crate::backend::{BufferUsage, RecordingDevice};

    fn source() -> MemoryMeshSource {
        MemoryMeshSource::new()
            .with("tri", "obj", "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n")
            .with("quad", "obj", "v 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\nf 1 2 3 4\n")
    }

    #[test]
    fn test_acquire_loads_once() {
        let source = source();
        let mut registry = MeshRegistry::new();

        let first = registry.acquire("tri", "obj", &source).unwrap();
        let second = registry.acquire("tri", "obj", &source).unwrap();

        assert_eq!(first, second);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.ref_count(first), Some(2));
    }

    #[test]
    fn test_acquire_keys_on_format() {
        let source = source().with("tri", "dae", "<COLLADA/>");
        let mut registry = MeshRegistry::new();

        let obj = registry.acquire("tri", "obj", &source).unwrap();
        assert_eq!(registry.acquire("tri", "OBJ", &source).unwrap(), obj);
        assert_eq!(registry.ref_count(obj), Some(2));

        // Same name, other format: not served from the obj cache
        assert!(matches!(
            registry.acquire("tri", "dae", &source),
            Err(RenderError::Asset(AssetError::UnsupportedFormat(_)))
        ));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.handle_of("tri", Some("obj")), Some(obj));
        assert_eq!(registry.handle_of("tri", None), None);
    }

    #[test]
    fn test_runtime_meshes_have_no_format() {
        let mut registry = MeshRegistry::new();
        let mesh = Mesh::from_data("hud", MeshData::glyph_strip(1), BufferUsage::Dynamic).unwrap();
        let handle = registry.insert(mesh);
        assert_eq!(registry.handle_of("hud", None), Some(handle));
        assert_eq!(registry.handle_of("hud", Some("obj")), None);
    }

    #[test]
    fn test_failed_acquire_leaves_nothing() {
        let mut registry = MeshRegistry::new();
        assert!(registry.acquire("missing", "obj", &source()).is_err());
        assert!(registry.is_empty());
        assert_eq!(registry.handle_of("missing", Some("obj")), None);
    }

    #[test]
    fn test_release_frees_at_zero() {
        let source = source();
        let mut device = RecordingDevice::new();
        let mut registry = MeshRegistry::new();

        let handle = registry.acquire("tri", "obj", &source).unwrap();
        registry.retain(handle).unwrap();
        let _ = registry.create_all(&mut device);
        assert_eq!(device.live_buffer_count(), 1);

        assert_eq!(registry.release(handle, &mut device).unwrap(), 1);
        assert!(registry.get(handle).is_some());

        assert_eq!(registry.release(handle, &mut device).unwrap(), 0);
        assert!(registry.get(handle).is_none());
        assert_eq!(registry.handle_of("tri", Some("obj")), None);
        assert_eq!(device.live_buffer_count(), 0);

        assert!(matches!(registry.release(handle, &mut device), Err(RenderError::UnknownMesh)));
    }

    #[test]
    fn test_create_reports_failures_and_continues() {
        let source = source();
        let mut device = RecordingDevice::new();
        let mut registry = MeshRegistry::new();
        let tri = registry.acquire("tri", "obj", &source).unwrap();
        let quad = registry.acquire("quad", "obj", &source).unwrap();

        device.fail_allocations_for("tri");
        let report = registry.create_all(&mut device);

        assert_eq!(report.created, 1);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "tri");
        assert!(!registry.get(tri).unwrap().vertex_buffer().is_resident());
        assert!(registry.get(quad).unwrap().vertex_buffer().is_resident());

        device.clear_failures();
        let retry = registry.create_all(&mut device);
        assert_eq!(retry.created, 1);
        assert_eq!(retry.already_resident, 1);
        assert!(retry.is_complete());

        registry.tear_down_all(&mut device);
    }

    #[test]
    fn test_tear_down_keeps_cpu_data() {
        let source = source();
        let mut device = RecordingDevice::new();
        let mut registry = MeshRegistry::new();
        let handle = registry.acquire("quad", "obj", &source).unwrap();

        let _ = registry.create_all(&mut device);
        assert_eq!(registry.tear_down_all(&mut device), 1);

        let mesh = registry.get(handle).unwrap();
        assert!(!mesh.vertex_buffer().is_resident());
        assert_eq!(mesh.vertex_index_length(), 6);
        assert_eq!(registry.resident_count(), 0);
    }

    #[test]
    fn test_dynamic_updates_flush() {
        let mut device = RecordingDevice::new();
        let mut registry = MeshRegistry::new();
        let mesh = Mesh::from_data("label", MeshData::glyph_strip(2), BufferUsage::Dynamic).unwrap();
        let handle = registry.insert(mesh);
        let _ = registry.create_all(&mut device);

        let vertex = Vertex::textured([9.0, 9.0, 0.0], [0.0, 0.0]);
        registry.update_dynamic(handle, 4, &[vertex, vertex]).unwrap();
        assert_eq!(registry.flush_dynamic(&mut device), 2);
        assert_eq!(registry.flush_dynamic(&mut device), 0);

        registry.tear_down_all(&mut device);
    }

    #[test]
    fn test_static_meshes_reject_updates() {
        let source = source();
        let mut registry = MeshRegistry::new();
        let handle = registry.acquire("tri", "obj", &source).unwrap();
        let vertex = Vertex::textured([0.0; 3], [0.0; 2]);
        assert!(matches!(
            registry.update_dynamic(handle, 0, &[vertex]),
            Err(RenderError::ImmutableMesh(_))
        ));
    }
}
