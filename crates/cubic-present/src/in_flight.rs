// SPDX-License-Identifier: CEPL-1.0
use tracing::trace;

use crate::device::{GpuDevice, WAIT_FOREVER};
use crate::error::{GpuError, GpuResult};

/// For every chain image, the fence of the last frame slot that used it.
///
/// Before a slot records into an image it waits on the fence stored here,
/// so no two submissions targeting the same image are ever outstanding.
pub struct ImagesInFlightTable<D: GpuDevice> {
    entries: Vec<Option<D::Fence>>,
}

impl<D: GpuDevice> ImagesInFlightTable<D> {
    pub fn new(image_count: usize) -> Self {
        Self {
            entries: vec![None; image_count],
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, image_index: usize) -> Option<D::Fence> {
        self.entries.get(image_index).copied().flatten()
    }

    /// Resize to `image_count` entries, all empty.
    pub fn reset(&mut self, image_count: usize) {
        self.entries.clear();
        self.entries.resize(image_count, None);
    }

    /// Wait for whoever last used `image_index`, then record `fence` as its owner.
    pub fn claim(&mut self, device: &D, image_index: u32, fence: D::Fence) -> GpuResult<()> {
        let len = self.entries.len();
        let slot = self.entries.get_mut(image_index as usize).ok_or_else(|| {
            GpuError::Unexpected(format!("acquired image {image_index} outside a chain of {len}"))
        })?;
        if let Some(previous) = *slot {
            trace!(image_index, ?previous, "waiting on previous user of image");
            device.wait_fence(previous, WAIT_FOREVER)?;
        }
        *slot = Some(fence);
        Ok(())
    }

    /// Drop every reference to `fence`, used when that fence is destroyed.
    pub fn forget(&mut self, fence: D::Fence) {
        for entry in &mut self.entries {
            if *entry == Some(fence) {
                *entry = None;
            }
        }
    }
}
