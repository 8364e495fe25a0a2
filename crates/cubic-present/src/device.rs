// SPDX-License-Identifier: CEPL-1.0
//! The seam between the presentation core and a concrete graphics API.

use std::fmt::Debug;
use std::hash::Hash;

use bitflags::bitflags;

use crate::error::GpuResult;
use crate::memory::{MemoryProperties, MemoryRequirements};
use crate::RenderSize;

/// Timeout value for "block until signaled".
pub const WAIT_FOREVER: u64 = u64::MAX;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    Bgra8Srgb,
    Bgra8Unorm,
    Rgba8Srgb,
    Rgba8Unorm,
    D32Sfloat,
    D24UnormS8,
    D16Unorm,
    /// Any format the core has no opinion about, by raw API value.
    Other(i32),
}

impl PixelFormat {
    pub fn is_depth(self) -> bool {
        matches!(
            self,
            PixelFormat::D32Sfloat | PixelFormat::D24UnormS8 | PixelFormat::D16Unorm
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ColorSpace {
    SrgbNonlinear,
    Other(i32),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SurfaceFormat {
    pub format: PixelFormat,
    pub color_space: ColorSpace,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PresentMode {
    Immediate,
    Mailbox,
    Fifo,
    FifoRelaxed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SurfaceCapabilities {
    pub min_image_count: u32,
    /// Zero means no upper bound.
    pub max_image_count: u32,
    /// `None` when the surface lets the swapchain decide its size.
    pub current_extent: Option<RenderSize>,
    pub min_extent: RenderSize,
    pub max_extent: RenderSize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SwapchainDesc<S> {
    pub min_image_count: u32,
    pub format: SurfaceFormat,
    pub extent: RenderSize,
    pub present_mode: PresentMode,
    /// Predecessor chain being retired, if any.
    pub old: Option<S>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImageAspect {
    Color,
    Depth,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AcquiredImage {
    pub index: u32,
    /// Image is usable but the chain no longer matches the surface exactly.
    pub suboptimal: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PresentStatus {
    Optimal,
    Suboptimal,
    OutOfDate,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PipelineVariant {
    /// Per-vertex input only.
    Single,
    /// Per-vertex input on binding 0, one model matrix per instance on binding 1.
    Instanced,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub min_depth: f32,
    pub max_depth: f32,
}

impl Viewport {
    pub fn covering(extent: RenderSize) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: extent.width as f32,
            height: extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        }
    }
}

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct BufferUsage: u32 {
        const TRANSFER_SRC = 1 << 0;
        const TRANSFER_DST = 1 << 1;
        const UNIFORM = 1 << 4;
        const INDEX = 1 << 6;
        const VERTEX = 1 << 7;
    }
}

/// One queue submission: wait on `wait` at color output, signal `signal`
/// and `fence` when the command buffer completes.
pub struct Submission<D: GpuDevice + ?Sized> {
    pub command_buffer: D::CommandBuffer,
    pub wait: Option<D::Semaphore>,
    pub signal: Option<D::Semaphore>,
    pub fence: Option<D::Fence>,
}

/// Everything the presentation core needs from a graphics device.
///
/// Handles are plain copyable ids; ownership is tracked by the core, which
/// destroys every handle it creates exactly once. Command recording calls
/// (`cmd_*`) cannot fail; the failure surfaces at `end_command_buffer`.
pub trait GpuDevice {
    type Fence: Copy + Eq + Hash + Debug;
    type Semaphore: Copy + Eq + Hash + Debug;
    type CommandBuffer: Copy + Eq + Hash + Debug;
    type Swapchain: Copy + Eq + Hash + Debug;
    type Image: Copy + Eq + Hash + Debug;
    type ImageView: Copy + Eq + Hash + Debug;
    type Framebuffer: Copy + Eq + Hash + Debug;
    type Buffer: Copy + Eq + Hash + Debug;
    type Memory: Copy + Eq + Hash + Debug;
    type UniformSet: Copy + Eq + Hash + Debug;

    // device / surface queries
    fn memory_types(&self) -> &[MemoryProperties];
    fn surface_capabilities(&self) -> GpuResult<SurfaceCapabilities>;
    fn surface_formats(&self) -> GpuResult<Vec<SurfaceFormat>>;
    fn present_modes(&self) -> GpuResult<Vec<PresentMode>>;
    fn depth_format(&self) -> PixelFormat;
    fn wait_idle(&self) -> GpuResult<()>;

    // synchronization
    fn create_fence(&self, signaled: bool) -> GpuResult<Self::Fence>;
    fn destroy_fence(&self, fence: Self::Fence);
    fn wait_fence(&self, fence: Self::Fence, timeout_ns: u64) -> GpuResult<()>;
    fn reset_fence(&self, fence: Self::Fence) -> GpuResult<()>;
    fn create_semaphore(&self) -> GpuResult<Self::Semaphore>;
    fn destroy_semaphore(&self, semaphore: Self::Semaphore);

    // presentable image chain
    fn create_swapchain(&self, desc: &SwapchainDesc<Self::Swapchain>) -> GpuResult<Self::Swapchain>;
    fn swapchain_images(&self, swapchain: Self::Swapchain) -> GpuResult<Vec<Self::Image>>;
    fn destroy_swapchain(&self, swapchain: Self::Swapchain);
    fn acquire_next_image(
        &self,
        swapchain: Self::Swapchain,
        signal: Self::Semaphore,
        timeout_ns: u64,
    ) -> GpuResult<AcquiredImage>;
    fn present(
        &self,
        swapchain: Self::Swapchain,
        image_index: u32,
        wait: Self::Semaphore,
    ) -> GpuResult<PresentStatus>;

    // images and render targets
    fn create_depth_image(&self, extent: RenderSize, format: PixelFormat) -> GpuResult<Self::Image>;
    fn image_memory_requirements(&self, image: Self::Image) -> MemoryRequirements;
    fn bind_image_memory(&self, image: Self::Image, memory: Self::Memory) -> GpuResult<()>;
    fn destroy_image(&self, image: Self::Image);
    fn create_image_view(
        &self,
        image: Self::Image,
        format: PixelFormat,
        aspect: ImageAspect,
    ) -> GpuResult<Self::ImageView>;
    fn destroy_image_view(&self, view: Self::ImageView);
    /// Make render-pass-compatible state (render pass, pipelines) match the
    /// chain's color and depth formats. Called before framebuffers are built.
    fn prepare_render_targets(&mut self, color: PixelFormat, depth: PixelFormat) -> GpuResult<()>;
    fn create_framebuffer(
        &self,
        color: Self::ImageView,
        depth: Self::ImageView,
        extent: RenderSize,
    ) -> GpuResult<Self::Framebuffer>;
    fn destroy_framebuffer(&self, framebuffer: Self::Framebuffer);

    // memory and buffers
    fn allocate_memory(&self, size: u64, memory_type_index: u32) -> GpuResult<Self::Memory>;
    fn free_memory(&self, memory: Self::Memory);
    /// Copy `bytes` into host-visible memory at `offset`.
    fn write_memory(&self, memory: Self::Memory, offset: u64, bytes: &[u8]) -> GpuResult<()>;
    fn create_buffer(&self, size: u64, usage: BufferUsage) -> GpuResult<Self::Buffer>;
    fn buffer_memory_requirements(&self, buffer: Self::Buffer) -> MemoryRequirements;
    fn bind_buffer_memory(&self, buffer: Self::Buffer, memory: Self::Memory) -> GpuResult<()>;
    fn destroy_buffer(&self, buffer: Self::Buffer);
    /// Bind a uniform buffer range to the set the mesh pipelines read at set 0.
    fn create_uniform_set(&self, buffer: Self::Buffer, range: u64) -> GpuResult<Self::UniformSet>;
    fn destroy_uniform_set(&self, set: Self::UniformSet);

    // command buffers
    fn allocate_command_buffers(&self, count: u32) -> GpuResult<Vec<Self::CommandBuffer>>;
    fn free_command_buffers(&self, buffers: &[Self::CommandBuffer]);
    fn reset_command_buffer(&self, cmd: Self::CommandBuffer) -> GpuResult<()>;
    fn begin_command_buffer(&self, cmd: Self::CommandBuffer, one_time: bool) -> GpuResult<()>;
    fn end_command_buffer(&self, cmd: Self::CommandBuffer) -> GpuResult<()>;
    fn submit(&self, submission: &Submission<Self>) -> GpuResult<()>;

    // recording
    fn cmd_copy_buffer(&self, cmd: Self::CommandBuffer, src: Self::Buffer, dst: Self::Buffer, size: u64);
    fn cmd_begin_render_pass(
        &self,
        cmd: Self::CommandBuffer,
        framebuffer: Self::Framebuffer,
        extent: RenderSize,
        clear_color: [f32; 4],
    );
    fn cmd_end_render_pass(&self, cmd: Self::CommandBuffer);
    fn cmd_set_viewport(&self, cmd: Self::CommandBuffer, viewport: Viewport);
    fn cmd_set_scissor(&self, cmd: Self::CommandBuffer, extent: RenderSize);
    fn cmd_bind_pipeline(&self, cmd: Self::CommandBuffer, variant: PipelineVariant);
    fn cmd_bind_uniform_set(&self, cmd: Self::CommandBuffer, variant: PipelineVariant, set: Self::UniformSet);
    fn cmd_bind_vertex_buffer(&self, cmd: Self::CommandBuffer, binding: u32, buffer: Self::Buffer);
    /// Indices are always 32-bit.
    fn cmd_bind_index_buffer(&self, cmd: Self::CommandBuffer, buffer: Self::Buffer);
    fn cmd_push_constants(&self, cmd: Self::CommandBuffer, variant: PipelineVariant, bytes: &[u8]);
    fn cmd_draw_indexed(&self, cmd: Self::CommandBuffer, index_count: u32, instance_count: u32);
}
