//! Append-only vertex/index storage for one frame.
//!
//! Primitives write into CPU-side staging that mirrors the mapped device
//! buffers. At every flush the range written since the last map is handed
//! to the device, which may then reuse the consumed part of its buffers
//! only after the frame ends.

use crate::device::{DeviceError, GeometryUpload, GpuDevice, MapMode};

use super::vertex::SceneVertex;

/// Bounded writer for one primitive.
///
/// Capacity was checked when the writer was handed out, so writes through it
/// can never run past the end of the buffers.
pub struct GeometryWriter<'a> {
    base_vertex: u32,
    vertices: &'a mut [SceneVertex],
    indices: &'a mut [u32],
}

impl GeometryWriter<'_> {
    /// Buffer index of the first reserved vertex.
    pub fn base_vertex(&self) -> u32 {
        self.base_vertex
    }

    pub fn vertices(&mut self) -> &mut [SceneVertex] {
        &mut *self.vertices
    }

    pub fn indices(&mut self) -> &mut [u32] {
        &mut *self.indices
    }

    /// Copy vertices and polygon-local indices, rebasing the indices onto
    /// the reserved range.
    pub fn write(&mut self, vertices: &[SceneVertex], local_indices: &[u32]) {
        self.vertices.copy_from_slice(vertices);
        for (dst, &index) in self.indices.iter_mut().zip(local_indices) {
            *dst = self.base_vertex + index;
        }
    }
}

/// Frame geometry buffers and their write cursors.
pub struct GeometryAllocator {
    vertices: Vec<SceneVertex>,
    indices: Vec<u32>,
    vertex_capacity: usize,
    index_capacity: usize,
    /// Vertices already handed to the device this frame
    committed_vertices: usize,
    committed_indices: usize,
    mapped: bool,
}

impl GeometryAllocator {
    pub fn new(vertex_capacity: usize, index_capacity: usize) -> Self {
        Self {
            vertices: Vec::with_capacity(vertex_capacity),
            indices: Vec::with_capacity(index_capacity),
            vertex_capacity,
            index_capacity,
            committed_vertices: 0,
            committed_indices: 0,
            mapped: false,
        }
    }

    /// Reset the cursors and map the buffers, discarding old contents.
    ///
    /// A failed map here means the device is unusable.
    pub fn begin_frame<D: GpuDevice>(&mut self, device: &mut D) -> Result<(), DeviceError> {
        self.reset();
        device.map_geometry(MapMode::Discard)?;
        self.mapped = true;
        Ok(())
    }

    /// Reserve room for one primitive.
    ///
    /// Returns `None` while the buffers are unmapped. Running out of capacity
    /// is a caller bug: it asserts in debug builds and drops the primitive
    /// otherwise.
    pub fn reserve(&mut self, vertex_count: usize, index_count: usize) -> Option<GeometryWriter<'_>> {
        if !self.mapped {
            return None;
        }

        let vertex_start = self.vertices.len();
        let index_start = self.indices.len();
        let fits = vertex_start + vertex_count <= self.vertex_capacity
            && index_start + index_count <= self.index_capacity;
        debug_assert!(
            fits,
            "geometry buffers overflowed: {} + {} vertices (capacity {}), {} + {} indices (capacity {})",
            vertex_start,
            vertex_count,
            self.vertex_capacity,
            index_start,
            index_count,
            self.index_capacity
        );
        if !fits {
            return None;
        }

        self.vertices
            .resize(vertex_start + vertex_count, SceneVertex::default());
        self.indices.resize(index_start + index_count, 0);

        Some(GeometryWriter {
            base_vertex: vertex_start as u32,
            vertices: &mut self.vertices[vertex_start..],
            indices: &mut self.indices[index_start..],
        })
    }

    /// Unmap the buffers, handing over everything written since the last map.
    pub fn unmap<D: GpuDevice>(&mut self, device: &mut D) {
        if !self.mapped {
            return;
        }
        let upload = GeometryUpload {
            first_vertex: self.committed_vertices as u32,
            vertices: &self.vertices[self.committed_vertices..],
            first_index: self.committed_indices as u32,
            indices: &self.indices[self.committed_indices..],
        };
        device.unmap_geometry(upload);
        self.committed_vertices = self.vertices.len();
        self.committed_indices = self.indices.len();
        self.mapped = false;
    }

    /// Map again after a submission without touching submitted data.
    ///
    /// Failure leaves the buffers unmapped, so the rest of the frame's
    /// primitives are dropped.
    pub fn remap<D: GpuDevice>(&mut self, device: &mut D) {
        match device.map_geometry(MapMode::NoOverwrite) {
            Ok(()) => self.mapped = true,
            Err(e) => {
                tracing::warn!("Geometry remap failed, dropping remaining primitives: {}", e);
                self.mapped = false;
            }
        }
    }

    /// Unmap and rewind both cursors to zero.
    pub fn end_frame<D: GpuDevice>(&mut self, device: &mut D) {
        self.unmap(device);
        self.reset();
    }

    fn reset(&mut self) {
        self.vertices.clear();
        self.indices.clear();
        self.committed_vertices = 0;
        self.committed_indices = 0;
    }

    pub fn is_mapped(&self) -> bool {
        self.mapped
    }

    pub fn vertex_cursor(&self) -> u32 {
        self.vertices.len() as u32
    }

    pub fn index_cursor(&self) -> u32 {
        self.indices.len() as u32
    }

    pub fn vertex_capacity(&self) -> usize {
        self.vertex_capacity
    }

    pub fn index_capacity(&self) -> usize {
        self.index_capacity
    }
}
