// SPDX-License-Identifier: CEPL-1.0
use bitflags::bitflags;
use tracing::debug;

use crate::device::{BufferUsage, GpuDevice};
use crate::error::{GpuError, GpuResult};

bitflags! {
    /// Property flags of a memory type. Bit positions follow Vulkan's.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct MemoryProperties: u32 {
        const DEVICE_LOCAL = 1 << 0;
        const HOST_VISIBLE = 1 << 1;
        const HOST_COHERENT = 1 << 2;
        const HOST_CACHED = 1 << 3;
        const LAZILY_ALLOCATED = 1 << 4;
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MemoryRequirements {
    pub size: u64,
    /// Bit `i` set means memory type `i` may back the resource.
    pub type_bits: u32,
}

/// First memory type allowed by `type_bits` whose flags contain `required`.
pub fn find_memory_type(
    types: &[MemoryProperties],
    type_bits: u32,
    required: MemoryProperties,
) -> GpuResult<u32> {
    types
        .iter()
        .take(32)
        .enumerate()
        .find(|(i, props)| type_bits & (1 << i) != 0 && props.contains(required))
        .map(|(i, _)| i as u32)
        .ok_or(GpuError::NoSuitableMemoryType {
            type_bits,
            required,
        })
}

/// Allocate memory satisfying `req` with at least `required` properties.
pub(crate) fn allocate_for<D: GpuDevice>(
    device: &D,
    req: MemoryRequirements,
    required: MemoryProperties,
) -> GpuResult<D::Memory> {
    let index = find_memory_type(device.memory_types(), req.type_bits, required)?;
    device.allocate_memory(req.size, index)
}

/// A buffer together with the allocation bound to it.
pub struct DeviceBuffer<D: GpuDevice> {
    pub buffer: D::Buffer,
    pub memory: D::Memory,
    pub size: u64,
}

impl<D: GpuDevice> DeviceBuffer<D> {
    pub fn destroy(self, device: &D) {
        device.destroy_buffer(self.buffer);
        device.free_memory(self.memory);
    }
}

/// Create a buffer, allocate matching memory and bind it.
/// Nothing is left behind on failure.
pub fn create_buffer<D: GpuDevice>(
    device: &D,
    size: u64,
    usage: BufferUsage,
    required: MemoryProperties,
) -> GpuResult<DeviceBuffer<D>> {
    let buffer = device.create_buffer(size, usage)?;
    let req = device.buffer_memory_requirements(buffer);
    let memory = match allocate_for(device, req, required) {
        Ok(m) => m,
        Err(e) => {
            device.destroy_buffer(buffer);
            return Err(e);
        }
    };
    if let Err(e) = device.bind_buffer_memory(buffer, memory) {
        device.destroy_buffer(buffer);
        device.free_memory(memory);
        return Err(e);
    }
    debug!(size, ?usage, ?required, "buffer created");
    Ok(DeviceBuffer {
        buffer,
        memory,
        size,
    })
}
