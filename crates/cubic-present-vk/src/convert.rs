// SPDX-License-Identifier: CEPL-1.0
//! Mapping between ash types and the backend-neutral types of `cubic_present`.

use ash::prelude::VkResult;
use ash::vk;
use cubic_present::{
    AcquiredImage, BufferUsage, ColorSpace, GpuError, GpuResult, MemoryProperties,
    MemoryRequirements, PixelFormat, PresentMode, PresentStatus, RenderSize, SurfaceCapabilities,
    SurfaceFormat,
};

pub(crate) fn gpu_err(r: vk::Result) -> GpuError {
    match r {
        vk::Result::ERROR_OUT_OF_DATE_KHR => GpuError::OutOfDate,
        vk::Result::ERROR_DEVICE_LOST => GpuError::DeviceLost,
        vk::Result::ERROR_SURFACE_LOST_KHR => GpuError::SurfaceLost,
        vk::Result::ERROR_OUT_OF_HOST_MEMORY => GpuError::OutOfHostMemory,
        vk::Result::ERROR_OUT_OF_DEVICE_MEMORY => GpuError::OutOfDeviceMemory,
        vk::Result::TIMEOUT => GpuError::Timeout,
        vk::Result::NOT_READY => GpuError::NotReady,
        other => GpuError::Unexpected(format!("{other:?}")),
    }
}

/// Bring-up helpers report through anyhow; keep the Vulkan code when there is one.
pub(crate) fn anyhow_to_gpu(e: anyhow::Error) -> GpuError {
    match e.downcast_ref::<vk::Result>() {
        Some(r) => gpu_err(*r),
        None => GpuError::Unexpected(format!("{e:#}")),
    }
}

pub(crate) fn acquired(r: VkResult<(u32, bool)>) -> GpuResult<AcquiredImage> {
    r.map(|(index, suboptimal)| AcquiredImage { index, suboptimal })
        .map_err(gpu_err)
}

/// Out-of-date at present is a status, not a failure: the frame was still
/// consumed and the caller only needs to rebuild.
pub(crate) fn present_status(r: VkResult<bool>) -> GpuResult<PresentStatus> {
    match r {
        Ok(false) => Ok(PresentStatus::Optimal),
        Ok(true) => Ok(PresentStatus::Suboptimal),
        Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(PresentStatus::OutOfDate),
        Err(e) => Err(gpu_err(e)),
    }
}

pub(crate) fn pixel_format_to_vk(f: PixelFormat) -> vk::Format {
    match f {
        PixelFormat::Bgra8Srgb => vk::Format::B8G8R8A8_SRGB,
        PixelFormat::Bgra8Unorm => vk::Format::B8G8R8A8_UNORM,
        PixelFormat::Rgba8Srgb => vk::Format::R8G8B8A8_SRGB,
        PixelFormat::Rgba8Unorm => vk::Format::R8G8B8A8_UNORM,
        PixelFormat::D32Sfloat => vk::Format::D32_SFLOAT,
        PixelFormat::D24UnormS8 => vk::Format::D24_UNORM_S8_UINT,
        PixelFormat::D16Unorm => vk::Format::D16_UNORM,
        PixelFormat::Other(raw) => vk::Format::from_raw(raw),
    }
}

pub(crate) fn pixel_format_from_vk(f: vk::Format) -> PixelFormat {
    match f {
        vk::Format::B8G8R8A8_SRGB => PixelFormat::Bgra8Srgb,
        vk::Format::B8G8R8A8_UNORM => PixelFormat::Bgra8Unorm,
        vk::Format::R8G8B8A8_SRGB => PixelFormat::Rgba8Srgb,
        vk::Format::R8G8B8A8_UNORM => PixelFormat::Rgba8Unorm,
        vk::Format::D32_SFLOAT => PixelFormat::D32Sfloat,
        vk::Format::D24_UNORM_S8_UINT => PixelFormat::D24UnormS8,
        vk::Format::D16_UNORM => PixelFormat::D16Unorm,
        other => PixelFormat::Other(other.as_raw()),
    }
}

pub(crate) fn color_space_to_vk(cs: ColorSpace) -> vk::ColorSpaceKHR {
    match cs {
        ColorSpace::SrgbNonlinear => vk::ColorSpaceKHR::SRGB_NONLINEAR,
        ColorSpace::Other(raw) => vk::ColorSpaceKHR::from_raw(raw),
    }
}

pub(crate) fn surface_format_from_vk(f: vk::SurfaceFormatKHR) -> SurfaceFormat {
    SurfaceFormat {
        format: pixel_format_from_vk(f.format),
        color_space: match f.color_space {
            vk::ColorSpaceKHR::SRGB_NONLINEAR => ColorSpace::SrgbNonlinear,
            other => ColorSpace::Other(other.as_raw()),
        },
    }
}

pub(crate) fn present_mode_to_vk(m: PresentMode) -> vk::PresentModeKHR {
    match m {
        PresentMode::Immediate => vk::PresentModeKHR::IMMEDIATE,
        PresentMode::Mailbox => vk::PresentModeKHR::MAILBOX,
        PresentMode::Fifo => vk::PresentModeKHR::FIFO,
        PresentMode::FifoRelaxed => vk::PresentModeKHR::FIFO_RELAXED,
    }
}

/// Modes the engine never asks for are dropped.
pub(crate) fn present_mode_from_vk(m: vk::PresentModeKHR) -> Option<PresentMode> {
    match m {
        vk::PresentModeKHR::IMMEDIATE => Some(PresentMode::Immediate),
        vk::PresentModeKHR::MAILBOX => Some(PresentMode::Mailbox),
        vk::PresentModeKHR::FIFO => Some(PresentMode::Fifo),
        vk::PresentModeKHR::FIFO_RELAXED => Some(PresentMode::FifoRelaxed),
        _ => None,
    }
}

pub(crate) fn extent_to_vk(size: RenderSize) -> vk::Extent2D {
    vk::Extent2D {
        width: size.width,
        height: size.height,
    }
}

fn extent_from_vk(e: vk::Extent2D) -> RenderSize {
    RenderSize::new(e.width, e.height)
}

/// `current_extent` of `u32::MAX` means the swapchain picks the size.
pub(crate) fn capabilities_from_vk(caps: &vk::SurfaceCapabilitiesKHR) -> SurfaceCapabilities {
    let current_extent =
        (caps.current_extent.width != u32::MAX).then(|| extent_from_vk(caps.current_extent));
    SurfaceCapabilities {
        min_image_count: caps.min_image_count,
        max_image_count: caps.max_image_count,
        current_extent,
        min_extent: extent_from_vk(caps.min_image_extent),
        max_extent: extent_from_vk(caps.max_image_extent),
    }
}

// BufferUsage and MemoryProperties share Vulkan's bit positions.
pub(crate) fn buffer_usage_to_vk(usage: BufferUsage) -> vk::BufferUsageFlags {
    vk::BufferUsageFlags::from_raw(usage.bits())
}

pub(crate) fn memory_properties_from_vk(flags: vk::MemoryPropertyFlags) -> MemoryProperties {
    MemoryProperties::from_bits_truncate(flags.as_raw())
}

pub(crate) fn requirements_from_vk(req: vk::MemoryRequirements) -> MemoryRequirements {
    MemoryRequirements {
        size: req.size,
        type_bits: req.memory_type_bits,
    }
}
