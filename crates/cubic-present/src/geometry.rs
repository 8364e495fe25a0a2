// SPDX-License-Identifier: CEPL-1.0
use cubic_math::glam::Mat4;
use tracing::debug;

use crate::device::{BufferUsage, GpuDevice};
use crate::error::RenderError;
use crate::memory::DeviceBuffer;
use crate::upload::upload_to_device_local;

/// Bytes per vertex: position (3 f32), normal (3 f32), uv (2 f32).
pub const VERTEX_STRIDE: usize = 32;

/// Interleaved vertex bytes must be whole vertices and every index must
/// point at one of them.
pub fn validate_geometry(vertex_bytes: &[u8], indices: &[u32]) -> Result<(), RenderError> {
    if vertex_bytes.len() % VERTEX_STRIDE != 0 {
        return Err(RenderError::InvalidGeometry(format!(
            "{} vertex bytes is not a multiple of the {VERTEX_STRIDE}-byte stride",
            vertex_bytes.len()
        )));
    }
    let vertex_count = (vertex_bytes.len() / VERTEX_STRIDE) as u64;
    if let Some(bad) = indices.iter().find(|&&i| u64::from(i) >= vertex_count) {
        return Err(RenderError::InvalidGeometry(format!(
            "index {bad} out of range for {vertex_count} vertices"
        )));
    }
    if indices.len() > u32::MAX as usize {
        return Err(RenderError::InvalidGeometry("too many indices".into()));
    }
    Ok(())
}

/// Mesh in device-local memory.
pub struct UploadedGeometry<D: GpuDevice> {
    pub vertices: DeviceBuffer<D>,
    pub indices: DeviceBuffer<D>,
    pub index_count: u32,
}

impl<D: GpuDevice> UploadedGeometry<D> {
    pub fn upload(device: &D, vertex_bytes: &[u8], indices: &[u32]) -> Result<Self, RenderError> {
        validate_geometry(vertex_bytes, indices)?;
        let vertices = upload_to_device_local(device, vertex_bytes, BufferUsage::VERTEX)?;
        let index_buffer =
            match upload_to_device_local(device, bytemuck::cast_slice(indices), BufferUsage::INDEX) {
                Ok(b) => b,
                Err(e) => {
                    vertices.destroy(device);
                    return Err(e.into());
                }
            };
        debug!(
            vertices = vertex_bytes.len() / VERTEX_STRIDE,
            indices = indices.len(),
            "geometry uploaded"
        );
        Ok(Self {
            vertices,
            indices: index_buffer,
            index_count: indices.len() as u32,
        })
    }

    pub fn destroy(self, device: &D) {
        self.vertices.destroy(device);
        self.indices.destroy(device);
    }
}

/// Per-instance model matrices, column-major, bound at vertex binding 1.
pub struct InstanceBuffer<D: GpuDevice> {
    pub buffer: DeviceBuffer<D>,
    pub count: u32,
}

impl<D: GpuDevice> InstanceBuffer<D> {
    pub fn upload(device: &D, transforms: &[Mat4]) -> Result<Self, RenderError> {
        let columns: Vec<[f32; 16]> = transforms.iter().map(Mat4::to_cols_array).collect();
        let buffer = upload_to_device_local(device, bytemuck::cast_slice(&columns), BufferUsage::VERTEX)?;
        debug!(instances = transforms.len(), "instance transforms uploaded");
        Ok(Self {
            buffer,
            count: transforms.len() as u32,
        })
    }

    pub fn destroy(self, device: &D) {
        self.buffer.destroy(device);
    }
}
