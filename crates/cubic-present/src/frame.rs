// SPDX-License-Identifier: CEPL-1.0
use tracing::debug;

use crate::device::GpuDevice;
use crate::error::{GpuError, GpuResult};

/// How many frames the CPU may record ahead of the GPU.
pub const MAX_FRAMES_IN_FLIGHT: usize = 2;

/// Per-frame command buffer and synchronization.
pub struct FrameSlot<D: GpuDevice> {
    pub command_buffer: D::CommandBuffer,
    /// Signaled by acquire, waited on by the submit.
    pub image_available: D::Semaphore,
    /// Signaled by the submit, waited on by present.
    pub render_finished: D::Semaphore,
    /// Signaled when this slot's last submission completes. Created signaled.
    pub in_flight: D::Fence,
}

impl<D: GpuDevice> FrameSlot<D> {
    fn destroy_sync(&self, device: &D) {
        device.destroy_semaphore(self.image_available);
        device.destroy_semaphore(self.render_finished);
        device.destroy_fence(self.in_flight);
    }
}

fn create_semaphore_pair<D: GpuDevice>(device: &D) -> GpuResult<(D::Semaphore, D::Semaphore)> {
    let first = device.create_semaphore()?;
    match device.create_semaphore() {
        Ok(second) => Ok((first, second)),
        Err(e) => {
            device.destroy_semaphore(first);
            Err(e)
        }
    }
}

fn create_slot<D: GpuDevice>(device: &D, command_buffer: D::CommandBuffer) -> GpuResult<FrameSlot<D>> {
    let (image_available, render_finished) = create_semaphore_pair(device)?;
    match device.create_fence(true) {
        Ok(in_flight) => Ok(FrameSlot {
            command_buffer,
            image_available,
            render_finished,
            in_flight,
        }),
        Err(e) => {
            device.destroy_semaphore(image_available);
            device.destroy_semaphore(render_finished);
            Err(e)
        }
    }
}

/// The [`MAX_FRAMES_IN_FLIGHT`] slots and the index of the current one.
pub struct FrameSlotRing<D: GpuDevice> {
    slots: Vec<FrameSlot<D>>,
    current: usize,
}

impl<D: GpuDevice> FrameSlotRing<D> {
    pub fn create(device: &D) -> GpuResult<Self> {
        let cmds = device.allocate_command_buffers(MAX_FRAMES_IN_FLIGHT as u32)?;
        if cmds.len() != MAX_FRAMES_IN_FLIGHT {
            device.free_command_buffers(&cmds);
            return Err(GpuError::Unexpected(format!(
                "asked for {MAX_FRAMES_IN_FLIGHT} command buffers, got {}",
                cmds.len()
            )));
        }

        let mut slots = Vec::with_capacity(MAX_FRAMES_IN_FLIGHT);
        for &cmd in &cmds {
            match create_slot(device, cmd) {
                Ok(slot) => slots.push(slot),
                Err(e) => {
                    for slot in &slots {
                        slot.destroy_sync(device);
                    }
                    device.free_command_buffers(&cmds);
                    return Err(e);
                }
            }
        }
        debug!(slots = slots.len(), "frame slots created");
        Ok(Self { slots, current: 0 })
    }

    pub fn current(&self) -> &FrameSlot<D> {
        &self.slots[self.current]
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn slots(&self) -> &[FrameSlot<D>] {
        &self.slots
    }

    /// Move to the next slot. Only a presented frame advances.
    pub fn advance(&mut self) {
        self.current = (self.current + 1) % self.slots.len();
    }

    /// Put the current slot back into its "ready" state after an aborted
    /// frame. The device must be idle.
    ///
    /// Both semaphores are replaced since an abort can leave either one
    /// signaled with no waiter. With `replace_fence` the fence (reset but
    /// never submitted) is replaced by a signaled one and the old handle is
    /// returned so stale references to it can be dropped.
    pub fn rearm_current(&mut self, device: &D, replace_fence: bool) -> GpuResult<Option<D::Fence>> {
        let (image_available, render_finished) = create_semaphore_pair(device)?;
        let fence = if replace_fence {
            match device.create_fence(true) {
                Ok(f) => Some(f),
                Err(e) => {
                    device.destroy_semaphore(image_available);
                    device.destroy_semaphore(render_finished);
                    return Err(e);
                }
            }
        } else {
            None
        };

        let slot = &mut self.slots[self.current];
        device.destroy_semaphore(std::mem::replace(&mut slot.image_available, image_available));
        device.destroy_semaphore(std::mem::replace(&mut slot.render_finished, render_finished));
        let retired = fence.map(|f| std::mem::replace(&mut slot.in_flight, f));
        if let Some(old) = retired {
            device.destroy_fence(old);
        }
        debug!(slot = self.current, fence_replaced = replace_fence, "frame slot re-armed");
        Ok(retired)
    }

    /// Device must be idle.
    pub fn destroy(&mut self, device: &D) {
        for slot in &self.slots {
            slot.destroy_sync(device);
        }
        let cmds: Vec<_> = self.slots.drain(..).map(|s| s.command_buffer).collect();
        if !cmds.is_empty() {
            device.free_command_buffers(&cmds);
        }
        self.current = 0;
    }
}
