// SPDX-License-Identifier: CEPL-1.0
//! In-memory [`GpuDevice`] and [`WindowTarget`] for tests.
//!
//! Submissions run lazily: one completes only when a wait on its fence (or
//! on the whole device) forces it, together with everything queued before
//! it. Misuse of the synchronization protocol does not panic; it is
//! collected in [`MockDevice::violations`] so tests can assert on it.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::rc::Rc;
use std::sync::{Arc, Mutex};

use crate::device::{
    AcquiredImage, BufferUsage, ColorSpace, GpuDevice, ImageAspect, PipelineVariant, PixelFormat,
    PresentMode, PresentStatus, Submission, SurfaceCapabilities, SurfaceFormat, SwapchainDesc,
    Viewport,
};
use crate::error::{GpuError, GpuResult};
use crate::memory::{MemoryProperties, MemoryRequirements};
use crate::overlay::UiOverlay;
use crate::window::WindowTarget;
use crate::RenderSize;

macro_rules! handles {
    ($($name:ident),* $(,)?) => {$(
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u64);
    )*};
}

handles!(Fence, Semaphore, Cmd, Swapchain, Image, View, Framebuffer, Buffer, Memory, SetId);

const MEMORY_TYPES: [MemoryProperties; 3] = [
    MemoryProperties::HOST_VISIBLE.union(MemoryProperties::HOST_COHERENT),
    MemoryProperties::DEVICE_LOCAL,
    MemoryProperties::DEVICE_LOCAL
        .union(MemoryProperties::HOST_VISIBLE)
        .union(MemoryProperties::HOST_COHERENT),
];

/// Queue- and chain-level calls, in call order.
#[derive(Clone, Debug, PartialEq)]
pub enum DeviceEvent {
    WaitIdle,
    WaitFence(Fence),
    ResetFence(Fence),
    Acquire(Option<u32>),
    Submit { cmd: Cmd, fence: Option<Fence> },
    Present(u32),
    CreateSwapchain {
        extent: RenderSize,
        images: u32,
        old: Option<Swapchain>,
    },
    DestroySwapchain(Swapchain),
}

/// Commands recorded into a command buffer.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    Copy { src: Buffer, dst: Buffer, size: u64 },
    BeginRenderPass { framebuffer: Framebuffer, extent: RenderSize, clear: [f32; 4] },
    EndRenderPass,
    Viewport(Viewport),
    Scissor(RenderSize),
    BindPipeline(PipelineVariant),
    BindUniformSet(SetId),
    BindVertexBuffer { binding: u32, buffer: Buffer },
    BindIndexBuffer(Buffer),
    PushConstants(Vec<u8>),
    DrawIndexed { index_count: u32, instance_count: u32 },
    OverlayDraw,
}

/// Override for the next `acquire_next_image`.
#[derive(Clone, Debug)]
pub enum AcquireScript {
    Image(u32),
    Suboptimal(u32),
    Fail(GpuError),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum FenceState {
    Signaled,
    Unsignaled,
    Pending(usize),
}

struct Submitted {
    fence: Option<Fence>,
    commands: Vec<Command>,
    done: bool,
}

struct SurfaceModel {
    size: RenderSize,
    pending_sizes: VecDeque<RenderSize>,
    closing: bool,
    wait_calls: usize,
    fullscreen: Vec<bool>,
    is_fullscreen: bool,
    fixed_extent: bool,
    min_images: u32,
}

#[derive(Default)]
struct State {
    next_id: u64,
    live: BTreeMap<u64, &'static str>,
    fences: HashMap<Fence, FenceState>,
    semaphores: HashMap<Semaphore, bool>,
    recording: HashMap<Cmd, Vec<Command>>,
    open: HashMap<Cmd, bool>,
    submissions: Vec<Submitted>,
    last_use_of_cmd: HashMap<Cmd, usize>,
    last_use_of_image: HashMap<Image, usize>,
    swapchains: HashMap<Swapchain, Vec<Image>>,
    held: HashMap<Swapchain, BTreeSet<u32>>,
    empty_swapchains: u32,
    view_image: HashMap<View, Image>,
    framebuffer_view: HashMap<Framebuffer, View>,
    memory: HashMap<Memory, (u32, Vec<u8>)>,
    buffers: HashMap<Buffer, (u64, Option<Memory>)>,
    set_buffer: HashMap<SetId, Buffer>,
    acquire_script: VecDeque<AcquireScript>,
    present_script: VecDeque<GpuResult<PresentStatus>>,
    fail_submit: Option<GpuError>,
    next_image: u32,
    prepared: usize,
    events: Vec<DeviceEvent>,
    violations: Vec<String>,
}

impl State {
    fn alloc(&mut self, kind: &'static str) -> u64 {
        self.next_id += 1;
        self.live.insert(self.next_id, kind);
        self.next_id
    }

    fn release(&mut self, id: u64, kind: &'static str) {
        if self.live.remove(&id).is_none() {
            self.violations
                .push(format!("destroyed unknown or already destroyed {kind} {id}"));
        }
    }

    fn complete_through(&mut self, last: usize) {
        for i in 0..=last {
            if self.submissions[i].done {
                continue;
            }
            self.submissions[i].done = true;
            let commands = self.submissions[i].commands.clone();
            for c in commands {
                if let Command::Copy { src, dst, size } = c {
                    self.apply_copy(src, dst, size);
                }
            }
            if let Some(f) = self.submissions[i].fence {
                self.fences.insert(f, FenceState::Signaled);
            }
        }
    }

    fn complete_all(&mut self) {
        if !self.submissions.is_empty() {
            self.complete_through(self.submissions.len() - 1);
        }
    }

    fn apply_copy(&mut self, src: Buffer, dst: Buffer, size: u64) {
        let src_mem = self.buffers.get(&src).and_then(|b| b.1);
        let dst_mem = self.buffers.get(&dst).and_then(|b| b.1);
        let (Some(src_mem), Some(dst_mem)) = (src_mem, dst_mem) else {
            self.violations.push("copy between unbound buffers".into());
            return;
        };
        let bytes = self.memory[&src_mem].1[..size as usize].to_vec();
        if let Some((_, data)) = self.memory.get_mut(&dst_mem) {
            data[..bytes.len()].copy_from_slice(&bytes);
        }
    }

    fn pending(&self) -> impl Iterator<Item = &Submitted> {
        self.submissions.iter().filter(|s| !s.done)
    }

    fn cmd_busy(&self, cmd: Cmd) -> bool {
        self.last_use_of_cmd
            .get(&cmd)
            .is_some_and(|&k| !self.submissions[k].done)
    }

    fn record(&mut self, cmd: Cmd, command: Command) {
        if !self.open.get(&cmd).copied().unwrap_or(false) {
            self.violations
                .push(format!("{command:?} recorded outside begin/end on {cmd:?}"));
        }
        self.recording.entry(cmd).or_default().push(command);
    }

    fn target_image(&self, commands: &[Command]) -> Option<Image> {
        commands.iter().find_map(|c| match c {
            Command::BeginRenderPass { framebuffer, .. } => self
                .framebuffer_view
                .get(framebuffer)
                .and_then(|v| self.view_image.get(v))
                .copied(),
            _ => None,
        })
    }
}

/// See the module docs.
pub struct MockDevice {
    state: RefCell<State>,
    surface: Rc<RefCell<SurfaceModel>>,
}

/// The window half of the mock; shares its size with the device's surface.
#[derive(Clone)]
pub struct MockWindow {
    surface: Rc<RefCell<SurfaceModel>>,
}

impl MockDevice {
    pub fn with_window(size: RenderSize) -> (MockDevice, MockWindow) {
        let surface = Rc::new(RefCell::new(SurfaceModel {
            size,
            pending_sizes: VecDeque::new(),
            closing: false,
            wait_calls: 0,
            fullscreen: Vec::new(),
            is_fullscreen: false,
            fixed_extent: true,
            min_images: 2,
        }));
        let device = MockDevice {
            state: RefCell::new(State::default()),
            surface: surface.clone(),
        };
        (device, MockWindow { surface })
    }

    pub fn events(&self) -> Vec<DeviceEvent> {
        self.state.borrow().events.clone()
    }

    pub fn clear_events(&self) {
        self.state.borrow_mut().events.clear();
    }

    pub fn violations(&self) -> Vec<String> {
        self.state.borrow().violations.clone()
    }

    /// Every object created and not yet destroyed, as `kind#id`.
    pub fn live_objects(&self) -> Vec<String> {
        self.state
            .borrow()
            .live
            .iter()
            .map(|(id, kind)| format!("{kind}#{id}"))
            .collect()
    }

    pub fn memory_type_of(&self, memory: Memory) -> Option<u32> {
        self.state.borrow().memory.get(&memory).map(|m| m.0)
    }

    pub fn buffer_memory(&self, buffer: Buffer) -> Option<Memory> {
        self.state.borrow().buffers.get(&buffer).and_then(|b| b.1)
    }

    pub fn buffer_contents(&self, buffer: Buffer) -> Option<Vec<u8>> {
        let st = self.state.borrow();
        let (size, memory) = st.buffers.get(&buffer)?;
        let data = &st.memory.get(&(*memory)?)?.1;
        Some(data[..*size as usize].to_vec())
    }

    pub fn is_live_buffer(&self, buffer: Buffer) -> bool {
        self.state.borrow().buffers.contains_key(&buffer)
    }

    pub fn prepared_targets(&self) -> usize {
        self.state.borrow().prepared
    }

    pub fn script_acquire(&self, script: AcquireScript) {
        self.state.borrow_mut().acquire_script.push_back(script);
    }

    pub fn script_present(&self, result: GpuResult<PresentStatus>) {
        self.state.borrow_mut().present_script.push_back(result);
    }

    pub fn fail_next_submit(&self, error: GpuError) {
        self.state.borrow_mut().fail_submit = Some(error);
    }

    /// The next `count` swapchains come back with no images.
    pub fn empty_next_swapchains(&self, count: u32) {
        self.state.borrow_mut().empty_swapchains = count;
    }

    /// Images acquired from `swapchain` and not yet presented.
    pub fn held_images(&self, swapchain: Swapchain) -> Vec<u32> {
        self.state
            .borrow()
            .held
            .get(&swapchain)
            .map(|h| h.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Minimum image count the surface reports from now on.
    pub fn set_min_images(&self, count: u32) {
        self.surface.borrow_mut().min_images = count;
    }

    /// Let the swapchain pick its own extent from the window size.
    pub fn set_undefined_extent(&self) {
        self.surface.borrow_mut().fixed_extent = false;
    }

    /// Commands of the most recent submission that drew into a framebuffer.
    pub fn last_frame_commands(&self) -> Vec<Command> {
        self.state
            .borrow()
            .submissions
            .iter()
            .rev()
            .find(|s| {
                s.commands
                    .iter()
                    .any(|c| matches!(c, Command::BeginRenderPass { .. }))
            })
            .map(|s| s.commands.clone())
            .unwrap_or_default()
    }

    pub fn swapchain_image_count(&self, swapchain: Swapchain) -> usize {
        self.state
            .borrow()
            .swapchains
            .get(&swapchain)
            .map_or(0, Vec::len)
    }

    /// What an overlay backend would record into the open render pass.
    pub fn record_overlay(&self, cmd: Cmd) {
        self.state.borrow_mut().record(cmd, Command::OverlayDraw);
    }
}

impl MockWindow {
    pub fn set_size(&self, size: RenderSize) {
        self.surface.borrow_mut().size = size;
    }

    /// Sizes delivered one per `wait_events` call.
    pub fn queue_sizes(&self, sizes: impl IntoIterator<Item = RenderSize>) {
        self.surface.borrow_mut().pending_sizes.extend(sizes);
    }

    pub fn set_closing(&self, closing: bool) {
        self.surface.borrow_mut().closing = closing;
    }

    pub fn wait_calls(&self) -> usize {
        self.surface.borrow().wait_calls
    }

    pub fn fullscreen_history(&self) -> Vec<bool> {
        self.surface.borrow().fullscreen.clone()
    }

    /// The platform leaves fullscreen without being asked.
    pub fn leave_fullscreen_externally(&self) {
        self.surface.borrow_mut().is_fullscreen = false;
    }
}

impl WindowTarget for MockWindow {
    fn framebuffer_size(&self) -> RenderSize {
        self.surface.borrow().size
    }

    fn wait_events(&self) {
        let mut s = self.surface.borrow_mut();
        s.wait_calls += 1;
        let next = s
            .pending_sizes
            .pop_front()
            .expect("wait_events with no queued platform event would block forever");
        s.size = next;
    }

    fn set_fullscreen(&self, fullscreen: bool) {
        let mut s = self.surface.borrow_mut();
        s.fullscreen.push(fullscreen);
        s.is_fullscreen = fullscreen;
    }

    fn is_fullscreen(&self) -> bool {
        self.surface.borrow().is_fullscreen
    }

    fn closing(&self) -> bool {
        self.surface.borrow().closing
    }
}

impl GpuDevice for MockDevice {
    type Fence = Fence;
    type Semaphore = Semaphore;
    type CommandBuffer = Cmd;
    type Swapchain = Swapchain;
    type Image = Image;
    type ImageView = View;
    type Framebuffer = Framebuffer;
    type Buffer = Buffer;
    type Memory = Memory;
    type UniformSet = SetId;

    fn memory_types(&self) -> &[MemoryProperties] {
        &MEMORY_TYPES
    }

    fn surface_capabilities(&self) -> GpuResult<SurfaceCapabilities> {
        let s = self.surface.borrow();
        Ok(SurfaceCapabilities {
            min_image_count: s.min_images,
            max_image_count: 0,
            current_extent: s.fixed_extent.then_some(s.size),
            min_extent: RenderSize::new(1, 1),
            max_extent: RenderSize::new(16384, 16384),
        })
    }

    fn surface_formats(&self) -> GpuResult<Vec<SurfaceFormat>> {
        Ok(vec![
            SurfaceFormat {
                format: PixelFormat::Bgra8Unorm,
                color_space: ColorSpace::SrgbNonlinear,
            },
            SurfaceFormat {
                format: PixelFormat::Bgra8Srgb,
                color_space: ColorSpace::SrgbNonlinear,
            },
        ])
    }

    fn present_modes(&self) -> GpuResult<Vec<PresentMode>> {
        Ok(vec![PresentMode::Fifo, PresentMode::Mailbox])
    }

    fn depth_format(&self) -> PixelFormat {
        PixelFormat::D32Sfloat
    }

    fn wait_idle(&self) -> GpuResult<()> {
        let mut st = self.state.borrow_mut();
        st.events.push(DeviceEvent::WaitIdle);
        st.complete_all();
        Ok(())
    }

    fn create_fence(&self, signaled: bool) -> GpuResult<Fence> {
        let mut st = self.state.borrow_mut();
        let f = Fence(st.alloc("fence"));
        let state = if signaled {
            FenceState::Signaled
        } else {
            FenceState::Unsignaled
        };
        st.fences.insert(f, state);
        Ok(f)
    }

    fn destroy_fence(&self, fence: Fence) {
        let mut st = self.state.borrow_mut();
        if let Some(FenceState::Pending(_)) = st.fences.remove(&fence) {
            st.violations.push(format!("{fence:?} destroyed while pending"));
        }
        st.release(fence.0, "fence");
    }

    fn wait_fence(&self, fence: Fence, _timeout_ns: u64) -> GpuResult<()> {
        let mut st = self.state.borrow_mut();
        st.events.push(DeviceEvent::WaitFence(fence));
        match st.fences.get(&fence).copied() {
            Some(FenceState::Signaled) => Ok(()),
            Some(FenceState::Pending(k)) => {
                st.complete_through(k);
                Ok(())
            }
            Some(FenceState::Unsignaled) => {
                st.violations
                    .push(format!("wait on {fence:?} which nothing will signal"));
                Err(GpuError::Timeout)
            }
            None => {
                st.violations.push(format!("wait on unknown {fence:?}"));
                Err(GpuError::Unexpected("unknown fence".into()))
            }
        }
    }

    fn reset_fence(&self, fence: Fence) -> GpuResult<()> {
        let mut st = self.state.borrow_mut();
        st.events.push(DeviceEvent::ResetFence(fence));
        if let Some(FenceState::Pending(_)) = st.fences.get(&fence) {
            st.violations.push(format!("reset of pending {fence:?}"));
        }
        st.fences.insert(fence, FenceState::Unsignaled);
        Ok(())
    }

    fn create_semaphore(&self) -> GpuResult<Semaphore> {
        let mut st = self.state.borrow_mut();
        let s = Semaphore(st.alloc("semaphore"));
        st.semaphores.insert(s, false);
        Ok(s)
    }

    fn destroy_semaphore(&self, semaphore: Semaphore) {
        let mut st = self.state.borrow_mut();
        st.semaphores.remove(&semaphore);
        st.release(semaphore.0, "semaphore");
    }

    fn create_swapchain(&self, desc: &SwapchainDesc<Swapchain>) -> GpuResult<Swapchain> {
        let mut st = self.state.borrow_mut();
        if let Some(old) = desc.old {
            if !st.swapchains.contains_key(&old) {
                st.violations.push(format!("predecessor {old:?} is not alive"));
            }
        }
        let sc = Swapchain(st.alloc("swapchain"));
        let count = if st.empty_swapchains > 0 {
            st.empty_swapchains -= 1;
            0
        } else {
            desc.min_image_count
        };
        let images: Vec<Image> = (0..count)
            .map(|_| {
                st.next_id += 1;
                Image(st.next_id)
            })
            .collect();
        st.swapchains.insert(sc, images);
        st.events.push(DeviceEvent::CreateSwapchain {
            extent: desc.extent,
            images: desc.min_image_count,
            old: desc.old,
        });
        Ok(sc)
    }

    fn swapchain_images(&self, swapchain: Swapchain) -> GpuResult<Vec<Image>> {
        self.state
            .borrow()
            .swapchains
            .get(&swapchain)
            .cloned()
            .ok_or(GpuError::SurfaceLost)
    }

    fn destroy_swapchain(&self, swapchain: Swapchain) {
        let mut st = self.state.borrow_mut();
        let images = st.swapchains.remove(&swapchain).unwrap_or_default();
        st.held.remove(&swapchain);
        if st.view_image.values().any(|i| images.contains(i)) {
            st.violations
                .push(format!("{swapchain:?} destroyed before views of its images"));
        }
        st.events.push(DeviceEvent::DestroySwapchain(swapchain));
        st.release(swapchain.0, "swapchain");
    }

    fn acquire_next_image(&self, swapchain: Swapchain, signal: Semaphore, _timeout_ns: u64) -> GpuResult<AcquiredImage> {
        let mut st = self.state.borrow_mut();
        let count = st.swapchains.get(&swapchain).map_or(0, Vec::len) as u32;
        if count == 0 {
            st.violations.push(format!("acquire from dead {swapchain:?}"));
            return Err(GpuError::SurfaceLost);
        }
        if st.semaphores.get(&signal).copied().unwrap_or(false) {
            st.violations
                .push(format!("acquire would signal already signaled {signal:?}"));
        }
        let (index, suboptimal) = match st.acquire_script.pop_front() {
            Some(AcquireScript::Fail(e)) => {
                st.events.push(DeviceEvent::Acquire(None));
                return Err(e);
            }
            Some(AcquireScript::Image(i)) => (i, false),
            Some(AcquireScript::Suboptimal(i)) => (i, true),
            None => {
                let i = st.next_image % count;
                st.next_image += 1;
                (i, false)
            }
        };
        // an unbounded acquire is only valid while the app holds at most
        // `count - min_image_count` images
        let held = st.held.get(&swapchain).map_or(0, BTreeSet::len) as u32;
        let min = self.surface.borrow().min_images;
        if held > count.saturating_sub(min) {
            st.violations
                .push(format!("acquire from {swapchain:?} while holding {held} of {count} images"));
        }
        st.held.entry(swapchain).or_default().insert(index);
        st.semaphores.insert(signal, true);
        st.events.push(DeviceEvent::Acquire(Some(index)));
        Ok(AcquiredImage { index, suboptimal })
    }

    fn present(&self, swapchain: Swapchain, image_index: u32, wait: Semaphore) -> GpuResult<PresentStatus> {
        let mut st = self.state.borrow_mut();
        let status = match st.present_script.pop_front() {
            Some(Err(e)) => return Err(e),
            Some(Ok(status)) => status,
            None => PresentStatus::Optimal,
        };
        if !st.semaphores.get(&wait).copied().unwrap_or(false) {
            st.violations
                .push(format!("present waits on unsignaled {wait:?}"));
        }
        st.semaphores.insert(wait, false);
        if let Some(held) = st.held.get_mut(&swapchain) {
            held.remove(&image_index);
        }
        st.events.push(DeviceEvent::Present(image_index));
        Ok(status)
    }

    fn create_depth_image(&self, _extent: RenderSize, format: PixelFormat) -> GpuResult<Image> {
        assert!(format.is_depth());
        Ok(Image(self.state.borrow_mut().alloc("image")))
    }

    fn image_memory_requirements(&self, _image: Image) -> MemoryRequirements {
        MemoryRequirements {
            size: 4096,
            type_bits: 0b110,
        }
    }

    fn bind_image_memory(&self, _image: Image, _memory: Memory) -> GpuResult<()> {
        Ok(())
    }

    fn destroy_image(&self, image: Image) {
        let mut st = self.state.borrow_mut();
        if st.view_image.values().any(|i| *i == image) {
            st.violations
                .push(format!("{image:?} destroyed before its view"));
        }
        st.release(image.0, "image");
    }

    fn create_image_view(&self, image: Image, _format: PixelFormat, _aspect: ImageAspect) -> GpuResult<View> {
        let mut st = self.state.borrow_mut();
        let v = View(st.alloc("image view"));
        st.view_image.insert(v, image);
        Ok(v)
    }

    fn destroy_image_view(&self, view: View) {
        let mut st = self.state.borrow_mut();
        if st.framebuffer_view.values().any(|v| *v == view) {
            st.violations
                .push(format!("{view:?} destroyed before its framebuffer"));
        }
        st.view_image.remove(&view);
        st.release(view.0, "image view");
    }

    fn prepare_render_targets(&mut self, color: PixelFormat, depth: PixelFormat) -> GpuResult<()> {
        assert!(!color.is_depth() && depth.is_depth());
        self.state.get_mut().prepared += 1;
        Ok(())
    }

    fn create_framebuffer(&self, color: View, _depth: View, _extent: RenderSize) -> GpuResult<Framebuffer> {
        let mut st = self.state.borrow_mut();
        let fb = Framebuffer(st.alloc("framebuffer"));
        st.framebuffer_view.insert(fb, color);
        Ok(fb)
    }

    fn destroy_framebuffer(&self, framebuffer: Framebuffer) {
        let mut st = self.state.borrow_mut();
        let in_use = st.pending().any(|s| {
            s.commands.iter().any(|c| {
                matches!(c, Command::BeginRenderPass { framebuffer: f, .. } if *f == framebuffer)
            })
        });
        if in_use {
            st.violations
                .push(format!("{framebuffer:?} destroyed while in use"));
        }
        st.framebuffer_view.remove(&framebuffer);
        st.release(framebuffer.0, "framebuffer");
    }

    fn allocate_memory(&self, size: u64, memory_type_index: u32) -> GpuResult<Memory> {
        let mut st = self.state.borrow_mut();
        let m = Memory(st.alloc("memory"));
        st.memory
            .insert(m, (memory_type_index, vec![0; size as usize]));
        Ok(m)
    }

    fn free_memory(&self, memory: Memory) {
        let mut st = self.state.borrow_mut();
        st.memory.remove(&memory);
        st.release(memory.0, "memory");
    }

    fn write_memory(&self, memory: Memory, offset: u64, bytes: &[u8]) -> GpuResult<()> {
        let mut st = self.state.borrow_mut();
        let Some(&(ty, _)) = st.memory.get(&memory) else {
            st.violations.push(format!("write to unknown {memory:?}"));
            return Err(GpuError::Unexpected("unknown memory".into()));
        };
        if !MEMORY_TYPES[ty as usize].contains(MemoryProperties::HOST_VISIBLE) {
            st.violations
                .push(format!("host write to device-only {memory:?}"));
        }
        let in_use = st.pending().any(|s| {
            s.commands.iter().any(|c| match c {
                Command::BindUniformSet(set) => st
                    .set_buffer
                    .get(set)
                    .and_then(|b| st.buffers.get(b))
                    .is_some_and(|b| b.1 == Some(memory)),
                _ => false,
            })
        });
        if in_use {
            st.violations
                .push(format!("host write to {memory:?} while the GPU may read it"));
        }
        let data = &mut st
            .memory
            .get_mut(&memory)
            .ok_or_else(|| GpuError::Unexpected("unknown memory".into()))?
            .1;
        let start = offset as usize;
        data[start..start + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    fn create_buffer(&self, size: u64, _usage: BufferUsage) -> GpuResult<Buffer> {
        let mut st = self.state.borrow_mut();
        let b = Buffer(st.alloc("buffer"));
        st.buffers.insert(b, (size, None));
        Ok(b)
    }

    fn buffer_memory_requirements(&self, buffer: Buffer) -> MemoryRequirements {
        let size = self.state.borrow().buffers.get(&buffer).map_or(0, |b| b.0);
        MemoryRequirements {
            size,
            type_bits: 0b111,
        }
    }

    fn bind_buffer_memory(&self, buffer: Buffer, memory: Memory) -> GpuResult<()> {
        let mut st = self.state.borrow_mut();
        match st.buffers.get_mut(&buffer) {
            Some(b) => {
                b.1 = Some(memory);
                Ok(())
            }
            None => Err(GpuError::Unexpected("unknown buffer".into())),
        }
    }

    fn destroy_buffer(&self, buffer: Buffer) {
        let mut st = self.state.borrow_mut();
        let in_use = st.pending().any(|s| {
            s.commands.iter().any(|c| match c {
                Command::BindVertexBuffer { buffer: b, .. } | Command::BindIndexBuffer(b) => *b == buffer,
                Command::Copy { src, dst, .. } => *src == buffer || *dst == buffer,
                _ => false,
            })
        });
        if in_use {
            st.violations
                .push(format!("{buffer:?} destroyed while in use"));
        }
        st.buffers.remove(&buffer);
        st.release(buffer.0, "buffer");
    }

    fn create_uniform_set(&self, buffer: Buffer, _range: u64) -> GpuResult<SetId> {
        let mut st = self.state.borrow_mut();
        let s = SetId(st.alloc("uniform set"));
        st.set_buffer.insert(s, buffer);
        Ok(s)
    }

    fn destroy_uniform_set(&self, set: SetId) {
        let mut st = self.state.borrow_mut();
        st.set_buffer.remove(&set);
        st.release(set.0, "uniform set");
    }

    fn allocate_command_buffers(&self, count: u32) -> GpuResult<Vec<Cmd>> {
        let mut st = self.state.borrow_mut();
        Ok((0..count).map(|_| Cmd(st.alloc("command buffer"))).collect())
    }

    fn free_command_buffers(&self, buffers: &[Cmd]) {
        let mut st = self.state.borrow_mut();
        for &cmd in buffers {
            if st.cmd_busy(cmd) {
                st.violations.push(format!("{cmd:?} freed while pending"));
            }
            st.recording.remove(&cmd);
            st.release(cmd.0, "command buffer");
        }
    }

    fn reset_command_buffer(&self, cmd: Cmd) -> GpuResult<()> {
        let mut st = self.state.borrow_mut();
        if st.cmd_busy(cmd) {
            st.violations
                .push(format!("{cmd:?} reset while its submission is pending"));
        }
        st.recording.remove(&cmd);
        Ok(())
    }

    fn begin_command_buffer(&self, cmd: Cmd, _one_time: bool) -> GpuResult<()> {
        let mut st = self.state.borrow_mut();
        if st.cmd_busy(cmd) {
            st.violations
                .push(format!("{cmd:?} re-recorded while its submission is pending"));
        }
        st.recording.insert(cmd, Vec::new());
        st.open.insert(cmd, true);
        Ok(())
    }

    fn end_command_buffer(&self, cmd: Cmd) -> GpuResult<()> {
        let mut st = self.state.borrow_mut();
        if st.open.insert(cmd, false) != Some(true) {
            st.violations.push(format!("{cmd:?} ended without begin"));
        }
        Ok(())
    }

    fn submit(&self, submission: &Submission<Self>) -> GpuResult<()> {
        let mut st = self.state.borrow_mut();
        if let Some(e) = st.fail_submit.take() {
            return Err(e);
        }
        let cmd = submission.command_buffer;
        if st.open.get(&cmd).copied().unwrap_or(false) {
            st.violations.push(format!("{cmd:?} submitted while recording"));
        }
        if let Some(wait) = submission.wait {
            if !st.semaphores.get(&wait).copied().unwrap_or(false) {
                st.violations
                    .push(format!("submit waits on unsignaled {wait:?}"));
            }
            st.semaphores.insert(wait, false);
        }
        if let Some(signal) = submission.signal {
            if st.semaphores.get(&signal).copied().unwrap_or(false) {
                st.violations
                    .push(format!("submit signals already signaled {signal:?}"));
            }
            st.semaphores.insert(signal, true);
        }

        let commands = st.recording.get(&cmd).cloned().unwrap_or_default();
        let index = st.submissions.len();
        if let Some(image) = st.target_image(&commands) {
            if let Some(&prev) = st.last_use_of_image.get(&image) {
                if !st.submissions[prev].done {
                    st.violations.push(format!(
                        "{image:?} targeted while submission {prev} still renders into it"
                    ));
                }
            }
            st.last_use_of_image.insert(image, index);
        }
        if let Some(fence) = submission.fence {
            if st.fences.get(&fence) != Some(&FenceState::Unsignaled) {
                st.violations
                    .push(format!("submit with {fence:?} not in the unsignaled state"));
            }
            st.fences.insert(fence, FenceState::Pending(index));
        }
        st.submissions.push(Submitted {
            fence: submission.fence,
            commands,
            done: false,
        });
        st.last_use_of_cmd.insert(cmd, index);
        st.events.push(DeviceEvent::Submit {
            cmd,
            fence: submission.fence,
        });
        Ok(())
    }

    fn cmd_copy_buffer(&self, cmd: Cmd, src: Buffer, dst: Buffer, size: u64) {
        self.state
            .borrow_mut()
            .record(cmd, Command::Copy { src, dst, size });
    }

    fn cmd_begin_render_pass(&self, cmd: Cmd, framebuffer: Framebuffer, extent: RenderSize, clear_color: [f32; 4]) {
        self.state.borrow_mut().record(
            cmd,
            Command::BeginRenderPass {
                framebuffer,
                extent,
                clear: clear_color,
            },
        );
    }

    fn cmd_end_render_pass(&self, cmd: Cmd) {
        self.state.borrow_mut().record(cmd, Command::EndRenderPass);
    }

    fn cmd_set_viewport(&self, cmd: Cmd, viewport: Viewport) {
        self.state
            .borrow_mut()
            .record(cmd, Command::Viewport(viewport));
    }

    fn cmd_set_scissor(&self, cmd: Cmd, extent: RenderSize) {
        self.state.borrow_mut().record(cmd, Command::Scissor(extent));
    }

    fn cmd_bind_pipeline(&self, cmd: Cmd, variant: PipelineVariant) {
        self.state
            .borrow_mut()
            .record(cmd, Command::BindPipeline(variant));
    }

    fn cmd_bind_uniform_set(&self, cmd: Cmd, _variant: PipelineVariant, set: SetId) {
        self.state
            .borrow_mut()
            .record(cmd, Command::BindUniformSet(set));
    }

    fn cmd_bind_vertex_buffer(&self, cmd: Cmd, binding: u32, buffer: Buffer) {
        self.state
            .borrow_mut()
            .record(cmd, Command::BindVertexBuffer { binding, buffer });
    }

    fn cmd_bind_index_buffer(&self, cmd: Cmd, buffer: Buffer) {
        self.state
            .borrow_mut()
            .record(cmd, Command::BindIndexBuffer(buffer));
    }

    fn cmd_push_constants(&self, cmd: Cmd, _variant: PipelineVariant, bytes: &[u8]) {
        self.state
            .borrow_mut()
            .record(cmd, Command::PushConstants(bytes.to_vec()));
    }

    fn cmd_draw_indexed(&self, cmd: Cmd, index_count: u32, instance_count: u32) {
        self.state.borrow_mut().record(
            cmd,
            Command::DrawIndexed {
                index_count,
                instance_count,
            },
        );
    }
}

/// Shared log of overlay calls.
#[derive(Clone, Default)]
pub struct OverlayLog(Arc<Mutex<Vec<&'static str>>>);

impl OverlayLog {
    fn push(&self, entry: &'static str) {
        self.0.lock().unwrap().push(entry);
    }

    pub fn take(&self) -> Vec<&'static str> {
        std::mem::take(&mut *self.0.lock().unwrap())
    }
}

/// Overlay that logs its calls and draws a marker command.
pub struct RecordingOverlay {
    log: OverlayLog,
}

impl RecordingOverlay {
    pub fn new() -> (Self, OverlayLog) {
        let log = OverlayLog::default();
        (Self { log: log.clone() }, log)
    }
}

impl UiOverlay<MockDevice> for RecordingOverlay {
    fn begin_frame(&mut self) {
        self.log.push("begin");
    }

    fn end_frame(&mut self) {
        self.log.push("end");
    }

    fn render(&mut self, device: &MockDevice, cmd: Cmd) -> GpuResult<()> {
        self.log.push("render");
        device.record_overlay(cmd);
        Ok(())
    }
}
