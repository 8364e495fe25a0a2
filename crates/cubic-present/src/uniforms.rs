// SPDX-License-Identifier: CEPL-1.0
use cubic_math::LightBlock;

use crate::device::{BufferUsage, GpuDevice};
use crate::error::GpuResult;
use crate::memory::{create_buffer, DeviceBuffer, MemoryProperties};

/// One host-visible light block per frame slot, each behind its own uniform set.
///
/// A slot's block is only rewritten after that slot's fence has been waited
/// on, so the GPU never reads a half-written block.
pub(crate) struct LightUniforms<D: GpuDevice> {
    slots: Vec<(DeviceBuffer<D>, D::UniformSet)>,
}

impl<D: GpuDevice> LightUniforms<D> {
    pub(crate) fn create(device: &D, count: usize) -> GpuResult<Self> {
        let mut this = Self {
            slots: Vec::with_capacity(count),
        };
        let size = std::mem::size_of::<LightBlock>() as u64;
        for _ in 0..count {
            let buf = match create_buffer(
                device,
                size,
                BufferUsage::UNIFORM,
                MemoryProperties::HOST_VISIBLE | MemoryProperties::HOST_COHERENT,
            ) {
                Ok(b) => b,
                Err(e) => {
                    this.destroy(device);
                    return Err(e);
                }
            };
            let set = device
                .write_memory(buf.memory, 0, LightBlock::default().as_bytes())
                .and_then(|()| device.create_uniform_set(buf.buffer, size));
            match set {
                Ok(set) => this.slots.push((buf, set)),
                Err(e) => {
                    buf.destroy(device);
                    this.destroy(device);
                    return Err(e);
                }
            }
        }
        Ok(this)
    }

    pub(crate) fn write(&self, device: &D, slot: usize, block: &LightBlock) -> GpuResult<()> {
        device.write_memory(self.slots[slot].0.memory, 0, block.as_bytes())
    }

    pub(crate) fn set(&self, slot: usize) -> D::UniformSet {
        self.slots[slot].1
    }

    #[cfg(test)]
    pub(crate) fn buffer(&self, slot: usize) -> D::Buffer {
        self.slots[slot].0.buffer
    }

    pub(crate) fn destroy(&mut self, device: &D) {
        for (buf, set) in self.slots.drain(..) {
            device.destroy_uniform_set(set);
            buf.destroy(device);
        }
    }
}
