// SPDX-License-Identifier: CEPL-1.0
#![deny(unsafe_op_in_unsafe_fn)]
//! Vulkan implementation of [`cubic_present::GpuDevice`] on top of ash.
//!
//! `VkGpu` owns the instance, surface, device, queue, command pool and the
//! format-dependent render pass and mesh pipelines. Every other object is
//! created and destroyed on request of the presentation core.

mod convert;
mod instance;
mod pipeline;

use anyhow::{Context, Result};
use ash::khr::{surface, swapchain};
use ash::{vk, Entry, Instance};
use cubic_present::{
    AcquiredImage, BufferUsage, GpuDevice, GpuError, GpuResult, ImageAspect, MemoryProperties,
    MemoryRequirements, PipelineVariant, PixelFormat, PresentMode, PresentStatus, RenderSize,
    Submission, SurfaceCapabilities, SurfaceFormat, SwapchainDesc, Viewport,
};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use tracing::{debug, info};

use convert::*;
use instance::DebugState;
use pipeline::{RenderTargets, ShaderCode, PUSH_STAGES};

pub use pipeline::ShaderSource;

/// Uniform sets the descriptor pool can hand out at once.
const MAX_UNIFORM_SETS: u32 = 16;

pub struct VkGpu {
    entry: Entry,
    instance: Instance,
    debug: DebugState,
    surface_loader: surface::Instance,
    surface: vk::SurfaceKHR,

    phys: vk::PhysicalDevice,
    device: ash::Device,
    queue: vk::Queue,
    swapchain_loader: swapchain::Device,

    cmd_pool: vk::CommandPool,
    set_layout: vk::DescriptorSetLayout,
    desc_pool: vk::DescriptorPool,
    pipeline_layout: vk::PipelineLayout,
    shaders: ShaderCode,
    /// Built on the first `prepare_render_targets`.
    targets: Option<RenderTargets>,

    depth_format: vk::Format,
    memory_types: Vec<MemoryProperties>,
}

impl VkGpu {
    pub fn new(
        window: &dyn HasWindowHandle,
        display: &dyn HasDisplayHandle,
        shaders: &ShaderSource,
    ) -> Result<Self> {
        let shaders = ShaderCode::load(shaders).context("load mesh shaders")?;
        unsafe { build_gpu(window, display, shaders) }
    }

    fn targets(&self) -> Option<&RenderTargets> {
        self.targets.as_ref()
    }
}

unsafe fn build_gpu(
    window: &dyn HasWindowHandle,
    display: &dyn HasDisplayHandle,
    shaders: ShaderCode,
) -> Result<VkGpu> {
    // 1) Instance + surface
    let bundle = unsafe { instance::init_instance_and_surface(window, display) }?;
    let instance = &bundle.instance;

    // 2) Physical device + queue family able to present to the surface
    let (phys, queue_family) = unsafe {
        instance::pick_device_and_queue(instance, &bundle.surface_loader, bundle.surface)
    }?;

    // 3) Logical device and everything that lives as long as it
    let (device, queue) = unsafe { instance::create_device(instance, phys, queue_family) }?;
    let swapchain_loader = swapchain::Device::new(instance, &device);
    let cmd_pool = unsafe { instance::create_command_pool(&device, queue_family) }
        .context("create_command_pool")?;
    let set_layout = unsafe { pipeline::create_light_set_layout(&device) }
        .context("create_light_set_layout")?;
    let desc_pool = unsafe { pipeline::create_descriptor_pool(&device, MAX_UNIFORM_SETS) }
        .context("create_descriptor_pool")?;
    let pipeline_layout = unsafe { pipeline::create_pipeline_layout(&device, set_layout) }
        .context("create_pipeline_layout")?;

    let depth_format = unsafe { instance::pick_depth_format(instance, phys) };
    let mem = unsafe { instance.get_physical_device_memory_properties(phys) };
    let memory_types: Vec<MemoryProperties> = mem.memory_types[..mem.memory_type_count as usize]
        .iter()
        .map(|t| memory_properties_from_vk(t.property_flags))
        .collect();
    info!(
        depth_format = ?depth_format,
        memory_types = memory_types.len(),
        "vulkan device ready"
    );

    let instance::InstanceBundle {
        entry,
        instance,
        surface_loader,
        surface,
        debug,
    } = bundle;

    Ok(VkGpu {
        entry,
        instance,
        debug,
        surface_loader,
        surface,
        phys,
        device,
        queue,
        swapchain_loader,
        cmd_pool,
        set_layout,
        desc_pool,
        pipeline_layout,
        shaders,
        targets: None,
        depth_format,
        memory_types,
    })
}

// STRICT TEARDOWN ORDER:
// - device_wait_idle()
// - Pipelines and render pass, then the layouts they were built against
// - Descriptor pool BEFORE the set layout; command pool BEFORE device
// - Destroy surface AFTER device; debug messenger and instance last.
// Everything the presentation core created is already gone by now.
impl Drop for VkGpu {
    fn drop(&mut self) {
        unsafe {
            let d = &self.device;
            d.device_wait_idle().ok();

            if let Some(targets) = self.targets.take() {
                targets.destroy(d);
            }
            d.destroy_pipeline_layout(self.pipeline_layout, None);
            d.destroy_descriptor_pool(self.desc_pool, None);
            d.destroy_descriptor_set_layout(self.set_layout, None);
            d.destroy_command_pool(self.cmd_pool, None);

            d.destroy_device(None);
            self.surface_loader.destroy_surface(self.surface, None);
            instance::destroy_debug_messenger(&self.entry, &self.instance, self.debug);
            self.instance.destroy_instance(None);
        }
    }
}

impl GpuDevice for VkGpu {
    type Fence = vk::Fence;
    type Semaphore = vk::Semaphore;
    type CommandBuffer = vk::CommandBuffer;
    type Swapchain = vk::SwapchainKHR;
    type Image = vk::Image;
    type ImageView = vk::ImageView;
    type Framebuffer = vk::Framebuffer;
    type Buffer = vk::Buffer;
    type Memory = vk::DeviceMemory;
    type UniformSet = vk::DescriptorSet;

    fn memory_types(&self) -> &[MemoryProperties] {
        &self.memory_types
    }

    fn surface_capabilities(&self) -> GpuResult<SurfaceCapabilities> {
        let caps = unsafe {
            self.surface_loader
                .get_physical_device_surface_capabilities(self.phys, self.surface)
        }
        .map_err(gpu_err)?;
        Ok(capabilities_from_vk(&caps))
    }

    fn surface_formats(&self) -> GpuResult<Vec<SurfaceFormat>> {
        let formats = unsafe {
            self.surface_loader
                .get_physical_device_surface_formats(self.phys, self.surface)
        }
        .map_err(gpu_err)?;
        Ok(formats.into_iter().map(surface_format_from_vk).collect())
    }

    fn present_modes(&self) -> GpuResult<Vec<PresentMode>> {
        let modes = unsafe {
            self.surface_loader
                .get_physical_device_surface_present_modes(self.phys, self.surface)
        }
        .map_err(gpu_err)?;
        Ok(modes.into_iter().filter_map(present_mode_from_vk).collect())
    }

    fn depth_format(&self) -> PixelFormat {
        pixel_format_from_vk(self.depth_format)
    }

    fn wait_idle(&self) -> GpuResult<()> {
        unsafe { self.device.device_wait_idle() }.map_err(gpu_err)
    }

    fn create_fence(&self, signaled: bool) -> GpuResult<vk::Fence> {
        let ci = vk::FenceCreateInfo {
            s_type: vk::StructureType::FENCE_CREATE_INFO,
            flags: if signaled {
                vk::FenceCreateFlags::SIGNALED
            } else {
                vk::FenceCreateFlags::empty()
            },
            ..Default::default()
        };
        unsafe { self.device.create_fence(&ci, None) }.map_err(gpu_err)
    }

    fn destroy_fence(&self, fence: vk::Fence) {
        unsafe { self.device.destroy_fence(fence, None) };
    }

    fn wait_fence(&self, fence: vk::Fence, timeout_ns: u64) -> GpuResult<()> {
        unsafe { self.device.wait_for_fences(&[fence], true, timeout_ns) }.map_err(gpu_err)
    }

    fn reset_fence(&self, fence: vk::Fence) -> GpuResult<()> {
        unsafe { self.device.reset_fences(&[fence]) }.map_err(gpu_err)
    }

    fn create_semaphore(&self) -> GpuResult<vk::Semaphore> {
        let ci = vk::SemaphoreCreateInfo {
            s_type: vk::StructureType::SEMAPHORE_CREATE_INFO,
            ..Default::default()
        };
        unsafe { self.device.create_semaphore(&ci, None) }.map_err(gpu_err)
    }

    fn destroy_semaphore(&self, semaphore: vk::Semaphore) {
        unsafe { self.device.destroy_semaphore(semaphore, None) };
    }

    fn create_swapchain(&self, desc: &SwapchainDesc<vk::SwapchainKHR>) -> GpuResult<vk::SwapchainKHR> {
        let caps = unsafe {
            self.surface_loader
                .get_physical_device_surface_capabilities(self.phys, self.surface)
        }
        .map_err(gpu_err)?;

        // Prefer IDENTITY if supported, otherwise use current to avoid extra blits.
        let pre_transform = if caps
            .supported_transforms
            .contains(vk::SurfaceTransformFlagsKHR::IDENTITY)
        {
            vk::SurfaceTransformFlagsKHR::IDENTITY
        } else {
            caps.current_transform
        };

        let swap_info = vk::SwapchainCreateInfoKHR {
            s_type: vk::StructureType::SWAPCHAIN_CREATE_INFO_KHR,
            surface: self.surface,
            min_image_count: desc.min_image_count,
            image_format: pixel_format_to_vk(desc.format.format),
            image_color_space: color_space_to_vk(desc.format.color_space),
            image_extent: extent_to_vk(desc.extent),
            image_array_layers: 1,
            image_usage: vk::ImageUsageFlags::COLOR_ATTACHMENT,
            image_sharing_mode: vk::SharingMode::EXCLUSIVE,
            pre_transform,
            composite_alpha: vk::CompositeAlphaFlagsKHR::OPAQUE,
            present_mode: present_mode_to_vk(desc.present_mode),
            clipped: vk::TRUE,
            old_swapchain: desc.old.unwrap_or_default(),
            ..Default::default()
        };
        let sc = unsafe { self.swapchain_loader.create_swapchain(&swap_info, None) }.map_err(gpu_err)?;
        debug!(retired = desc.old.is_some(), "swapchain created");
        Ok(sc)
    }

    fn swapchain_images(&self, swapchain: vk::SwapchainKHR) -> GpuResult<Vec<vk::Image>> {
        unsafe { self.swapchain_loader.get_swapchain_images(swapchain) }.map_err(gpu_err)
    }

    fn destroy_swapchain(&self, swapchain: vk::SwapchainKHR) {
        unsafe { self.swapchain_loader.destroy_swapchain(swapchain, None) };
    }

    fn acquire_next_image(
        &self,
        swapchain: vk::SwapchainKHR,
        signal: vk::Semaphore,
        timeout_ns: u64,
    ) -> GpuResult<AcquiredImage> {
        acquired(unsafe {
            self.swapchain_loader
                .acquire_next_image(swapchain, timeout_ns, signal, vk::Fence::null())
        })
    }

    fn present(
        &self,
        swapchain: vk::SwapchainKHR,
        image_index: u32,
        wait: vk::Semaphore,
    ) -> GpuResult<PresentStatus> {
        let present = vk::PresentInfoKHR {
            s_type: vk::StructureType::PRESENT_INFO_KHR,
            wait_semaphore_count: 1,
            p_wait_semaphores: &wait,
            swapchain_count: 1,
            p_swapchains: &swapchain,
            p_image_indices: &image_index,
            ..Default::default()
        };
        present_status(unsafe { self.swapchain_loader.queue_present(self.queue, &present) })
    }

    fn create_depth_image(&self, extent: RenderSize, format: PixelFormat) -> GpuResult<vk::Image> {
        let img_ci = vk::ImageCreateInfo {
            s_type: vk::StructureType::IMAGE_CREATE_INFO,
            image_type: vk::ImageType::TYPE_2D,
            format: pixel_format_to_vk(format),
            extent: vk::Extent3D {
                width: extent.width,
                height: extent.height,
                depth: 1,
            },
            mip_levels: 1,
            array_layers: 1,
            samples: vk::SampleCountFlags::TYPE_1,
            tiling: vk::ImageTiling::OPTIMAL,
            usage: vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
            sharing_mode: vk::SharingMode::EXCLUSIVE,
            initial_layout: vk::ImageLayout::UNDEFINED,
            ..Default::default()
        };
        unsafe { self.device.create_image(&img_ci, None) }.map_err(gpu_err)
    }

    fn image_memory_requirements(&self, image: vk::Image) -> MemoryRequirements {
        requirements_from_vk(unsafe { self.device.get_image_memory_requirements(image) })
    }

    fn bind_image_memory(&self, image: vk::Image, memory: vk::DeviceMemory) -> GpuResult<()> {
        unsafe { self.device.bind_image_memory(image, memory, 0) }.map_err(gpu_err)
    }

    fn destroy_image(&self, image: vk::Image) {
        unsafe { self.device.destroy_image(image, None) };
    }

    fn create_image_view(
        &self,
        image: vk::Image,
        format: PixelFormat,
        aspect: ImageAspect,
    ) -> GpuResult<vk::ImageView> {
        let aspect_mask = match aspect {
            ImageAspect::Color => vk::ImageAspectFlags::COLOR,
            ImageAspect::Depth => vk::ImageAspectFlags::DEPTH,
        };
        let view_ci = vk::ImageViewCreateInfo {
            s_type: vk::StructureType::IMAGE_VIEW_CREATE_INFO,
            image,
            view_type: vk::ImageViewType::TYPE_2D,
            format: pixel_format_to_vk(format),
            subresource_range: vk::ImageSubresourceRange {
                aspect_mask,
                base_mip_level: 0,
                level_count: 1,
                base_array_layer: 0,
                layer_count: 1,
            },
            ..Default::default()
        };
        unsafe { self.device.create_image_view(&view_ci, None) }.map_err(gpu_err)
    }

    fn destroy_image_view(&self, view: vk::ImageView) {
        unsafe { self.device.destroy_image_view(view, None) };
    }

    fn prepare_render_targets(&mut self, color: PixelFormat, depth: PixelFormat) -> GpuResult<()> {
        let (color, depth) = (pixel_format_to_vk(color), pixel_format_to_vk(depth));
        if self
            .targets()
            .is_some_and(|t| t.color == color && t.depth == depth)
        {
            return Ok(());
        }
        // Only reached between frames, after the core has waited for idle.
        let fresh = unsafe {
            RenderTargets::create(&self.device, self.pipeline_layout, &self.shaders, color, depth)
        }
        .map_err(anyhow_to_gpu)?;
        if let Some(old) = self.targets.replace(fresh) {
            unsafe { old.destroy(&self.device) };
        }
        info!(color = ?color, depth = ?depth, "render pass and mesh pipelines built");
        Ok(())
    }

    fn create_framebuffer(
        &self,
        color: vk::ImageView,
        depth: vk::ImageView,
        extent: RenderSize,
    ) -> GpuResult<vk::Framebuffer> {
        let targets = self
            .targets()
            .ok_or_else(|| GpuError::Unexpected("framebuffer before render targets".into()))?;
        let attachments = [color, depth];
        let ci = vk::FramebufferCreateInfo {
            s_type: vk::StructureType::FRAMEBUFFER_CREATE_INFO,
            render_pass: targets.render_pass,
            attachment_count: attachments.len() as u32,
            p_attachments: attachments.as_ptr(),
            width: extent.width,
            height: extent.height,
            layers: 1,
            ..Default::default()
        };
        unsafe { self.device.create_framebuffer(&ci, None) }.map_err(gpu_err)
    }

    fn destroy_framebuffer(&self, framebuffer: vk::Framebuffer) {
        unsafe { self.device.destroy_framebuffer(framebuffer, None) };
    }

    fn allocate_memory(&self, size: u64, memory_type_index: u32) -> GpuResult<vk::DeviceMemory> {
        let alloc = vk::MemoryAllocateInfo {
            s_type: vk::StructureType::MEMORY_ALLOCATE_INFO,
            allocation_size: size,
            memory_type_index,
            ..Default::default()
        };
        unsafe { self.device.allocate_memory(&alloc, None) }.map_err(gpu_err)
    }

    fn free_memory(&self, memory: vk::DeviceMemory) {
        unsafe { self.device.free_memory(memory, None) };
    }

    fn write_memory(&self, memory: vk::DeviceMemory, offset: u64, bytes: &[u8]) -> GpuResult<()> {
        // Host-coherent memory only: no flush after the copy.
        unsafe {
            let ptr = self
                .device
                .map_memory(memory, offset, bytes.len() as u64, vk::MemoryMapFlags::empty())
                .map_err(gpu_err)?;
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), ptr.cast::<u8>(), bytes.len());
            self.device.unmap_memory(memory);
        }
        Ok(())
    }

    fn create_buffer(&self, size: u64, usage: BufferUsage) -> GpuResult<vk::Buffer> {
        let bci = vk::BufferCreateInfo {
            s_type: vk::StructureType::BUFFER_CREATE_INFO,
            size,
            usage: buffer_usage_to_vk(usage),
            sharing_mode: vk::SharingMode::EXCLUSIVE,
            ..Default::default()
        };
        unsafe { self.device.create_buffer(&bci, None) }.map_err(gpu_err)
    }

    fn buffer_memory_requirements(&self, buffer: vk::Buffer) -> MemoryRequirements {
        requirements_from_vk(unsafe { self.device.get_buffer_memory_requirements(buffer) })
    }

    fn bind_buffer_memory(&self, buffer: vk::Buffer, memory: vk::DeviceMemory) -> GpuResult<()> {
        unsafe { self.device.bind_buffer_memory(buffer, memory, 0) }.map_err(gpu_err)
    }

    fn destroy_buffer(&self, buffer: vk::Buffer) {
        unsafe { self.device.destroy_buffer(buffer, None) };
    }

    fn create_uniform_set(&self, buffer: vk::Buffer, range: u64) -> GpuResult<vk::DescriptorSet> {
        let alloc = vk::DescriptorSetAllocateInfo {
            s_type: vk::StructureType::DESCRIPTOR_SET_ALLOCATE_INFO,
            descriptor_pool: self.desc_pool,
            descriptor_set_count: 1,
            p_set_layouts: &self.set_layout,
            ..Default::default()
        };
        let set = unsafe { self.device.allocate_descriptor_sets(&alloc) }.map_err(gpu_err)?[0];

        let info = vk::DescriptorBufferInfo {
            buffer,
            offset: 0,
            range,
        };
        let write = vk::WriteDescriptorSet {
            s_type: vk::StructureType::WRITE_DESCRIPTOR_SET,
            dst_set: set,
            dst_binding: 0,
            descriptor_count: 1,
            descriptor_type: vk::DescriptorType::UNIFORM_BUFFER,
            p_buffer_info: &info,
            ..Default::default()
        };
        unsafe { self.device.update_descriptor_sets(&[write], &[]) };
        Ok(set)
    }

    fn destroy_uniform_set(&self, set: vk::DescriptorSet) {
        unsafe { self.device.free_descriptor_sets(self.desc_pool, &[set]) }.ok();
    }

    fn allocate_command_buffers(&self, count: u32) -> GpuResult<Vec<vk::CommandBuffer>> {
        let alloc_info = vk::CommandBufferAllocateInfo {
            s_type: vk::StructureType::COMMAND_BUFFER_ALLOCATE_INFO,
            command_pool: self.cmd_pool,
            level: vk::CommandBufferLevel::PRIMARY,
            command_buffer_count: count,
            ..Default::default()
        };
        unsafe { self.device.allocate_command_buffers(&alloc_info) }.map_err(gpu_err)
    }

    fn free_command_buffers(&self, buffers: &[vk::CommandBuffer]) {
        if !buffers.is_empty() {
            unsafe { self.device.free_command_buffers(self.cmd_pool, buffers) };
        }
    }

    fn reset_command_buffer(&self, cmd: vk::CommandBuffer) -> GpuResult<()> {
        unsafe {
            self.device
                .reset_command_buffer(cmd, vk::CommandBufferResetFlags::empty())
        }
        .map_err(gpu_err)
    }

    fn begin_command_buffer(&self, cmd: vk::CommandBuffer, one_time: bool) -> GpuResult<()> {
        let begin = vk::CommandBufferBeginInfo {
            s_type: vk::StructureType::COMMAND_BUFFER_BEGIN_INFO,
            flags: if one_time {
                vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT
            } else {
                vk::CommandBufferUsageFlags::empty()
            },
            ..Default::default()
        };
        unsafe { self.device.begin_command_buffer(cmd, &begin) }.map_err(gpu_err)
    }

    fn end_command_buffer(&self, cmd: vk::CommandBuffer) -> GpuResult<()> {
        unsafe { self.device.end_command_buffer(cmd) }.map_err(gpu_err)
    }

    fn submit(&self, submission: &Submission<Self>) -> GpuResult<()> {
        let waits = submission.wait.as_slice();
        let signals = submission.signal.as_slice();
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let submit = vk::SubmitInfo {
            s_type: vk::StructureType::SUBMIT_INFO,
            wait_semaphore_count: waits.len() as u32,
            p_wait_semaphores: waits.as_ptr(),
            p_wait_dst_stage_mask: wait_stages.as_ptr(),
            command_buffer_count: 1,
            p_command_buffers: &submission.command_buffer,
            signal_semaphore_count: signals.len() as u32,
            p_signal_semaphores: signals.as_ptr(),
            ..Default::default()
        };
        unsafe {
            self.device.queue_submit(
                self.queue,
                &[submit],
                submission.fence.unwrap_or_default(),
            )
        }
        .map_err(gpu_err)
    }

    fn cmd_copy_buffer(&self, cmd: vk::CommandBuffer, src: vk::Buffer, dst: vk::Buffer, size: u64) {
        let region = vk::BufferCopy {
            src_offset: 0,
            dst_offset: 0,
            size,
        };
        unsafe { self.device.cmd_copy_buffer(cmd, src, dst, &[region]) };
    }

    fn cmd_begin_render_pass(
        &self,
        cmd: vk::CommandBuffer,
        framebuffer: vk::Framebuffer,
        extent: RenderSize,
        clear_color: [f32; 4],
    ) {
        let Some(targets) = self.targets() else {
            return;
        };
        let clears = [
            vk::ClearValue {
                color: vk::ClearColorValue {
                    float32: clear_color,
                },
            },
            vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue {
                    depth: 1.0,
                    stencil: 0,
                },
            },
        ];
        let begin = vk::RenderPassBeginInfo {
            s_type: vk::StructureType::RENDER_PASS_BEGIN_INFO,
            render_pass: targets.render_pass,
            framebuffer,
            render_area: vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent: extent_to_vk(extent),
            },
            clear_value_count: clears.len() as u32,
            p_clear_values: clears.as_ptr(),
            ..Default::default()
        };
        unsafe {
            self.device
                .cmd_begin_render_pass(cmd, &begin, vk::SubpassContents::INLINE)
        };
    }

    fn cmd_end_render_pass(&self, cmd: vk::CommandBuffer) {
        unsafe { self.device.cmd_end_render_pass(cmd) };
    }

    fn cmd_set_viewport(&self, cmd: vk::CommandBuffer, viewport: Viewport) {
        let vp = vk::Viewport {
            x: viewport.x,
            y: viewport.y,
            width: viewport.width,
            height: viewport.height,
            min_depth: viewport.min_depth,
            max_depth: viewport.max_depth,
        };
        unsafe { self.device.cmd_set_viewport(cmd, 0, &[vp]) };
    }

    fn cmd_set_scissor(&self, cmd: vk::CommandBuffer, extent: RenderSize) {
        let scissor = vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent: extent_to_vk(extent),
        };
        unsafe { self.device.cmd_set_scissor(cmd, 0, &[scissor]) };
    }

    fn cmd_bind_pipeline(&self, cmd: vk::CommandBuffer, variant: PipelineVariant) {
        if let Some(targets) = self.targets() {
            unsafe {
                self.device.cmd_bind_pipeline(
                    cmd,
                    vk::PipelineBindPoint::GRAPHICS,
                    targets.pipeline(variant),
                )
            };
        }
    }

    // Both variants share one pipeline layout.
    fn cmd_bind_uniform_set(&self, cmd: vk::CommandBuffer, _variant: PipelineVariant, set: vk::DescriptorSet) {
        unsafe {
            self.device.cmd_bind_descriptor_sets(
                cmd,
                vk::PipelineBindPoint::GRAPHICS,
                self.pipeline_layout,
                0,
                &[set],
                &[],
            )
        };
    }

    fn cmd_bind_vertex_buffer(&self, cmd: vk::CommandBuffer, binding: u32, buffer: vk::Buffer) {
        unsafe { self.device.cmd_bind_vertex_buffers(cmd, binding, &[buffer], &[0]) };
    }

    fn cmd_bind_index_buffer(&self, cmd: vk::CommandBuffer, buffer: vk::Buffer) {
        unsafe {
            self.device
                .cmd_bind_index_buffer(cmd, buffer, 0, vk::IndexType::UINT32)
        };
    }

    fn cmd_push_constants(&self, cmd: vk::CommandBuffer, _variant: PipelineVariant, bytes: &[u8]) {
        unsafe {
            self.device
                .cmd_push_constants(cmd, self.pipeline_layout, PUSH_STAGES, 0, bytes)
        };
    }

    fn cmd_draw_indexed(&self, cmd: vk::CommandBuffer, index_count: u32, instance_count: u32) {
        unsafe {
            self.device
                .cmd_draw_indexed(cmd, index_count, instance_count, 0, 0, 0)
        };
    }
}
