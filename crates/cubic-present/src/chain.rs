// SPDX-License-Identifier: CEPL-1.0
use tracing::{debug, info};

use crate::config::{PresentConfig, VsyncMode};
use crate::device::{
    GpuDevice, ImageAspect, PixelFormat, PresentMode, SurfaceCapabilities, SurfaceFormat,
    SwapchainDesc,
};
use crate::error::{GpuError, GpuResult, RenderError};
use crate::in_flight::ImagesInFlightTable;
use crate::memory::{allocate_for, MemoryProperties};
use crate::RenderSize;

/// Exact preferred pair if offered, otherwise the surface's first format.
pub fn choose_surface_format(
    formats: &[SurfaceFormat],
    preferred: SurfaceFormat,
) -> GpuResult<SurfaceFormat> {
    formats
        .iter()
        .copied()
        .find(|f| *f == preferred)
        .or_else(|| formats.first().copied())
        .ok_or_else(|| GpuError::Unexpected("surface reports no formats".into()))
}

/// Vsync off tries immediate then mailbox. Vsync on follows the configured
/// preference. FIFO is always the fallback since every surface supports it.
pub fn choose_present_mode(modes: &[PresentMode], vsync: bool, pref: VsyncMode) -> PresentMode {
    let order: &[PresentMode] = if !vsync {
        &[PresentMode::Immediate, PresentMode::Mailbox]
    } else {
        match pref {
            VsyncMode::Mailbox => &[PresentMode::Mailbox],
            VsyncMode::Fifo => &[],
        }
    };
    order
        .iter()
        .copied()
        .find(|m| modes.contains(m))
        .unwrap_or(PresentMode::Fifo)
}

/// The surface's fixed extent when it has one, else the window size clamped
/// into the supported range.
pub fn choose_extent(caps: &SurfaceCapabilities, window: RenderSize) -> RenderSize {
    match caps.current_extent {
        Some(extent) => extent,
        None => RenderSize {
            width: window
                .width
                .clamp(caps.min_extent.width, caps.max_extent.width),
            height: window
                .height
                .clamp(caps.min_extent.height, caps.max_extent.height),
        },
    }
}

/// One more than the minimum so acquire rarely blocks, capped by the maximum.
pub fn choose_image_count(caps: &SurfaceCapabilities) -> u32 {
    let wanted = caps.min_image_count + 1;
    if caps.max_image_count > 0 {
        wanted.min(caps.max_image_count)
    } else {
        wanted
    }
}

struct DepthTarget<D: GpuDevice> {
    image: D::Image,
    memory: D::Memory,
    view: D::ImageView,
}

impl<D: GpuDevice> DepthTarget<D> {
    fn create(device: &D, extent: RenderSize, format: PixelFormat) -> GpuResult<Self> {
        let image = device.create_depth_image(extent, format)?;
        let req = device.image_memory_requirements(image);
        let memory = match allocate_for(device, req, MemoryProperties::DEVICE_LOCAL) {
            Ok(m) => m,
            Err(e) => {
                device.destroy_image(image);
                return Err(e);
            }
        };
        let view = device
            .bind_image_memory(image, memory)
            .and_then(|()| device.create_image_view(image, format, ImageAspect::Depth));
        match view {
            Ok(view) => Ok(Self {
                image,
                memory,
                view,
            }),
            Err(e) => {
                device.destroy_image(image);
                device.free_memory(memory);
                Err(e)
            }
        }
    }

    fn destroy(self, device: &D) {
        device.destroy_image_view(self.view);
        device.destroy_image(self.image);
        device.free_memory(self.memory);
    }
}

/// The presentable image chain and everything sized to it: one view and
/// one framebuffer per image, plus a shared depth target.
pub struct ImageChain<D: GpuDevice> {
    swapchain: D::Swapchain,
    format: SurfaceFormat,
    present_mode: PresentMode,
    extent: RenderSize,
    images: Vec<D::Image>,
    views: Vec<D::ImageView>,
    framebuffers: Vec<D::Framebuffer>,
    depth: Option<DepthTarget<D>>,
}

impl<D: GpuDevice> ImageChain<D> {
    /// Build a chain for `window_size`. `old` is handed to the platform as the
    /// predecessor; the caller still owns it and destroys it afterwards.
    pub fn create(
        device: &mut D,
        window_size: RenderSize,
        config: &PresentConfig,
        old: Option<D::Swapchain>,
    ) -> GpuResult<Self> {
        let caps = device.surface_capabilities()?;
        let format = choose_surface_format(&device.surface_formats()?, config.preferred_format)?;
        let present_mode =
            choose_present_mode(&device.present_modes()?, config.vsync, config.vsync_mode);
        let extent = choose_extent(&caps, window_size);
        let min_image_count = choose_image_count(&caps);

        let swapchain = device.create_swapchain(&SwapchainDesc {
            min_image_count,
            format,
            extent,
            present_mode,
            old,
        })?;

        let mut chain = Self {
            swapchain,
            format,
            present_mode,
            extent,
            images: Vec::new(),
            views: Vec::new(),
            framebuffers: Vec::new(),
            depth: None,
        };
        if let Err(e) = chain.build_dependents(device) {
            chain.destroy(device);
            return Err(e);
        }

        info!(
            images = chain.images.len(),
            width = extent.width,
            height = extent.height,
            format = ?format.format,
            mode = ?present_mode,
            "image chain ready"
        );
        Ok(chain)
    }

    fn build_dependents(&mut self, device: &mut D) -> GpuResult<()> {
        self.images = device.swapchain_images(self.swapchain)?;
        for &image in &self.images {
            self.views
                .push(device.create_image_view(image, self.format.format, ImageAspect::Color)?);
        }

        let depth_format = device.depth_format();
        let depth = DepthTarget::create(device, self.extent, depth_format)?;
        let depth_view = depth.view;
        self.depth = Some(depth);

        device.prepare_render_targets(self.format.format, depth_format)?;
        for &view in &self.views {
            self.framebuffers
                .push(device.create_framebuffer(view, depth_view, self.extent)?);
        }
        Ok(())
    }

    /// Framebuffers, then views, then depth. The chain itself stays.
    fn destroy_dependents(&mut self, device: &D) {
        for fb in self.framebuffers.drain(..) {
            device.destroy_framebuffer(fb);
        }
        for view in self.views.drain(..) {
            device.destroy_image_view(view);
        }
        if let Some(depth) = self.depth.take() {
            depth.destroy(device);
        }
        // presentable images belong to the chain object
        self.images.clear();
    }

    /// Rebuild for a new window size. The device must be idle.
    ///
    /// On failure the retired chain handle is kept so `destroy` still
    /// releases it, but the chain has no images and must not be used.
    pub fn recreate(&mut self, device: &mut D, window_size: RenderSize, config: &PresentConfig) -> GpuResult<()> {
        self.destroy_dependents(device);
        let next = Self::create(device, window_size, config, Some(self.swapchain))?;
        let old = std::mem::replace(self, next);
        device.destroy_swapchain(old.swapchain);
        debug!("retired previous image chain");
        Ok(())
    }

    /// Device must be idle.
    pub fn destroy(&mut self, device: &D) {
        self.destroy_dependents(device);
        device.destroy_swapchain(self.swapchain);
    }

    pub fn swapchain(&self) -> D::Swapchain {
        self.swapchain
    }

    pub fn format(&self) -> SurfaceFormat {
        self.format
    }

    pub fn present_mode(&self) -> PresentMode {
        self.present_mode
    }

    pub fn extent(&self) -> RenderSize {
        self.extent
    }

    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    pub fn images(&self) -> &[D::Image] {
        &self.images
    }

    pub fn framebuffer(&self, image_index: u32) -> Option<D::Framebuffer> {
        self.framebuffers.get(image_index as usize).copied()
    }

    /// Images, views, framebuffers and in-flight entries must all agree.
    /// A table of the wrong length is rebuilt; anything else is an error
    /// the caller answers with a rebuild of the chain.
    pub(crate) fn reconcile(&self, table: &mut ImagesInFlightTable<D>) -> Result<(), RenderError> {
        let images = self.images.len();
        if table.len() != images {
            tracing::warn!(table = table.len(), images, "resizing images-in-flight table");
            table.reset(images);
        }
        if self.views.len() != images || self.framebuffers.len() != images || images == 0 {
            return Err(RenderError::ChainInvariant {
                images,
                views: self.views.len(),
                framebuffers: self.framebuffers.len(),
                in_flight: table.len(),
            });
        }
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn drop_last_framebuffer(&mut self, device: &D) {
        if let Some(fb) = self.framebuffers.pop() {
            device.destroy_framebuffer(fb);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::ColorSpace;
    use crate::testing::{DeviceEvent, MockDevice};

    fn caps(min: u32, max: u32, current: Option<RenderSize>) -> SurfaceCapabilities {
        SurfaceCapabilities {
            min_image_count: min,
            max_image_count: max,
            current_extent: current,
            min_extent: RenderSize::new(16, 16),
            max_extent: RenderSize::new(4096, 2048),
        }
    }

    #[test]
    fn image_count_policy() {
        assert_eq!(choose_image_count(&caps(2, 0, None)), 3);
        assert_eq!(choose_image_count(&caps(2, 8, None)), 3);
        assert_eq!(choose_image_count(&caps(3, 3, None)), 3);
    }

    #[test]
    fn extent_policy() {
        let fixed = caps(2, 0, Some(RenderSize::new(800, 600)));
        assert_eq!(choose_extent(&fixed, RenderSize::new(1, 1)), RenderSize::new(800, 600));

        let free = caps(2, 0, None);
        assert_eq!(choose_extent(&free, RenderSize::new(1280, 720)), RenderSize::new(1280, 720));
        assert_eq!(choose_extent(&free, RenderSize::new(8, 9000)), RenderSize::new(16, 2048));
    }

    #[test]
    fn format_policy() {
        let srgb = SurfaceFormat {
            format: PixelFormat::Bgra8Srgb,
            color_space: ColorSpace::SrgbNonlinear,
        };
        let unorm = SurfaceFormat {
            format: PixelFormat::Bgra8Unorm,
            color_space: ColorSpace::SrgbNonlinear,
        };
        assert_eq!(choose_surface_format(&[unorm, srgb], srgb).unwrap(), srgb);
        assert_eq!(choose_surface_format(&[unorm], srgb).unwrap(), unorm);
        assert!(choose_surface_format(&[], srgb).is_err());
    }

    #[test]
    fn present_mode_policy() {
        use PresentMode::*;
        let all = [Fifo, Mailbox, Immediate];
        assert_eq!(choose_present_mode(&all, false, VsyncMode::Mailbox), Immediate);
        assert_eq!(choose_present_mode(&[Fifo, Mailbox], false, VsyncMode::Fifo), Mailbox);
        assert_eq!(choose_present_mode(&all, true, VsyncMode::Mailbox), Mailbox);
        assert_eq!(choose_present_mode(&all, true, VsyncMode::Fifo), Fifo);
        assert_eq!(choose_present_mode(&[Fifo], true, VsyncMode::Mailbox), Fifo);
    }

    #[test]
    fn create_builds_one_view_and_framebuffer_per_image() {
        let (mut device, _) = MockDevice::with_window(RenderSize::new(640, 480));
        let mut chain = ImageChain::create(&mut device, RenderSize::new(640, 480), &PresentConfig::default(), None).unwrap();

        assert_eq!(chain.image_count(), 3);
        assert_eq!(chain.views.len(), 3);
        assert_eq!(chain.framebuffers.len(), 3);
        assert_eq!(chain.extent(), RenderSize::new(640, 480));
        assert_eq!(device.prepared_targets(), 1);

        let mut table = ImagesInFlightTable::new(0);
        chain.reconcile(&mut table).unwrap();
        assert_eq!(table.len(), 3);

        chain.destroy(&device);
        assert!(device.live_objects().is_empty(), "{:?}", device.live_objects());
        assert!(device.violations().is_empty(), "{:?}", device.violations());
    }

    #[test]
    fn recreate_hands_over_then_retires_predecessor() {
        let (mut device, window) = MockDevice::with_window(RenderSize::new(640, 480));
        let config = PresentConfig::default();
        let mut chain = ImageChain::create(&mut device, RenderSize::new(640, 480), &config, None).unwrap();
        let first = chain.swapchain();

        window.set_size(RenderSize::new(1024, 768));
        chain.recreate(&mut device, RenderSize::new(1024, 768), &config).unwrap();
        assert_ne!(chain.swapchain(), first);
        assert_eq!(chain.extent(), RenderSize::new(1024, 768));

        let events = device.events();
        let created = events
            .iter()
            .position(|e| matches!(e, DeviceEvent::CreateSwapchain { old: Some(o), .. } if *o == first))
            .expect("successor created with predecessor");
        let retired = events
            .iter()
            .position(|e| *e == DeviceEvent::DestroySwapchain(first))
            .expect("predecessor destroyed");
        assert!(created < retired);

        chain.destroy(&device);
        assert!(device.live_objects().is_empty());
        assert!(device.violations().is_empty(), "{:?}", device.violations());
    }

    #[test]
    fn reconcile_reports_view_framebuffer_mismatch() {
        let (mut device, _) = MockDevice::with_window(RenderSize::new(64, 64));
        let mut chain = ImageChain::create(&mut device, RenderSize::new(64, 64), &PresentConfig::default(), None).unwrap();
        chain.drop_last_framebuffer(&device);

        let mut table = ImagesInFlightTable::new(3);
        let err = chain.reconcile(&mut table).unwrap_err();
        assert!(matches!(
            err,
            RenderError::ChainInvariant {
                images: 3,
                views: 3,
                framebuffers: 2,
                in_flight: 3
            }
        ));
        chain.destroy(&device);
    }
}
