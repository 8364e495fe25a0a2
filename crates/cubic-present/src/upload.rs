// SPDX-License-Identifier: CEPL-1.0
use tracing::debug;

use crate::device::{BufferUsage, GpuDevice, Submission, WAIT_FOREVER};
use crate::error::{GpuError, GpuResult};
use crate::memory::{create_buffer, DeviceBuffer, MemoryProperties};

/// Copy `bytes` into a new device-local buffer through a host-visible staging
/// buffer and a one-shot command buffer. Blocks until the copy completes;
/// the staging buffer, command buffer and fence are gone when this returns.
pub fn upload_to_device_local<D: GpuDevice>(
    device: &D,
    bytes: &[u8],
    usage: BufferUsage,
) -> GpuResult<DeviceBuffer<D>> {
    if bytes.is_empty() {
        return Err(GpuError::Unexpected("refusing a zero-sized upload".into()));
    }
    let staging = create_buffer(
        device,
        bytes.len() as u64,
        BufferUsage::TRANSFER_SRC,
        MemoryProperties::HOST_VISIBLE | MemoryProperties::HOST_COHERENT,
    )?;
    let result = stage_and_copy(device, &staging, bytes, usage);
    staging.destroy(device);
    result
}

fn stage_and_copy<D: GpuDevice>(
    device: &D,
    staging: &DeviceBuffer<D>,
    bytes: &[u8],
    usage: BufferUsage,
) -> GpuResult<DeviceBuffer<D>> {
    device.write_memory(staging.memory, 0, bytes)?;
    let dst = create_buffer(
        device,
        staging.size,
        usage | BufferUsage::TRANSFER_DST,
        MemoryProperties::DEVICE_LOCAL,
    )?;
    match one_shot_copy(device, staging.buffer, dst.buffer, staging.size) {
        Ok(()) => {
            debug!(bytes = staging.size, ?usage, "uploaded to device-local memory");
            Ok(dst)
        }
        Err(e) => {
            dst.destroy(device);
            Err(e)
        }
    }
}

fn one_shot_copy<D: GpuDevice>(device: &D, src: D::Buffer, dst: D::Buffer, size: u64) -> GpuResult<()> {
    let cmd = device
        .allocate_command_buffers(1)?
        .into_iter()
        .next()
        .ok_or_else(|| GpuError::Unexpected("command pool returned no buffers".into()))?;
    let fence = match device.create_fence(false) {
        Ok(f) => f,
        Err(e) => {
            device.free_command_buffers(&[cmd]);
            return Err(e);
        }
    };

    let result = (|| -> GpuResult<()> {
        device.begin_command_buffer(cmd, true)?;
        device.cmd_copy_buffer(cmd, src, dst, size);
        device.end_command_buffer(cmd)?;
        device.submit(&Submission {
            command_buffer: cmd,
            wait: None,
            signal: None,
            fence: Some(fence),
        })?;
        device.wait_fence(fence, WAIT_FOREVER)
    })();

    if result.is_err() {
        // the copy may still be queued; nothing below may be freed under it
        let _ = device.wait_idle();
    }
    device.destroy_fence(fence);
    device.free_command_buffers(&[cmd]);
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{DeviceEvent, MockDevice};
    use crate::RenderSize;

    #[test]
    fn lands_in_device_local_memory() {
        let (device, _) = MockDevice::with_window(RenderSize::new(64, 64));
        let bytes: Vec<u8> = (0..96u8).collect();

        let buf = upload_to_device_local(&device, &bytes, BufferUsage::VERTEX).unwrap();

        let ty = device.memory_type_of(buf.memory).unwrap();
        assert!(device.memory_types()[ty as usize].contains(MemoryProperties::DEVICE_LOCAL));
        assert_eq!(device.buffer_contents(buf.buffer).unwrap(), bytes);
        assert!(device.events().iter().any(|e| matches!(e, DeviceEvent::WaitFence(_))));

        // staging buffer, its memory, the fence and command buffer are gone
        let live = device.live_objects();
        assert_eq!(live.len(), 2, "{live:?}");
        buf.destroy(&device);
        assert!(device.live_objects().is_empty());
        assert!(device.violations().is_empty(), "{:?}", device.violations());
    }

    #[test]
    fn failed_submit_leaves_nothing_behind() {
        let (device, _) = MockDevice::with_window(RenderSize::new(64, 64));
        device.fail_next_submit(GpuError::OutOfDeviceMemory);

        let err = upload_to_device_local(&device, &[1, 2, 3, 4], BufferUsage::INDEX)
            .err()
            .unwrap();
        assert_eq!(err, GpuError::OutOfDeviceMemory);
        assert!(device.live_objects().is_empty());
    }

    #[test]
    fn empty_upload_is_rejected() {
        let (device, _) = MockDevice::with_window(RenderSize::new(64, 64));
        assert!(upload_to_device_local(&device, &[], BufferUsage::VERTEX).is_err());
    }
}
