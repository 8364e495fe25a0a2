// SPDX-License-Identifier: CEPL-1.0
//! Instance, surface and device bring-up.

use anyhow::{anyhow, Context, Result};
#[cfg(debug_assertions)]
use ash::ext::debug_utils as ext_debug;
use ash::khr::{surface, swapchain};
use ash::{vk, Entry, Instance};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle, RawDisplayHandle};
use tracing::info;

#[cfg(debug_assertions)]
pub(crate) type DebugState = vk::DebugUtilsMessengerEXT;
#[cfg(not(debug_assertions))]
pub(crate) type DebugState = ();

#[cfg(debug_assertions)]
unsafe extern "system" fn debug_callback(
    severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    _types: vk::DebugUtilsMessageTypeFlagsEXT,
    data: *const vk::DebugUtilsMessengerCallbackDataEXT<'_>,
    _user: *mut std::os::raw::c_void,
) -> vk::Bool32 {
    if data.is_null() {
        return vk::FALSE;
    }
    // SAFETY: the loader hands us a valid callback payload for the duration of the call.
    let msg = unsafe { std::ffi::CStr::from_ptr((*data).p_message) }.to_string_lossy();
    if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
        tracing::error!(target: "vulkan", "{msg}");
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
        tracing::warn!(target: "vulkan", "{msg}");
    } else {
        tracing::trace!(target: "vulkan", "{msg}");
    }
    vk::FALSE
}

#[cfg(debug_assertions)]
unsafe fn create_debug_messenger(entry: &Entry, instance: &Instance) -> Result<DebugState> {
    let debug_loader = ext_debug::Instance::new(entry, instance);
    let ci = vk::DebugUtilsMessengerCreateInfoEXT {
        s_type: vk::StructureType::DEBUG_UTILS_MESSENGER_CREATE_INFO_EXT,
        message_severity: vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE
            | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
            | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
        message_type: vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
            | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
            | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
        pfn_user_callback: Some(debug_callback),
        ..Default::default()
    };
    unsafe { Ok(debug_loader.create_debug_utils_messenger(&ci, None)?) }
}

#[cfg(not(debug_assertions))]
unsafe fn create_debug_messenger(_entry: &Entry, _instance: &Instance) -> Result<DebugState> {
    Ok(())
}

#[cfg(debug_assertions)]
pub(crate) unsafe fn destroy_debug_messenger(entry: &Entry, instance: &Instance, dbg: DebugState) {
    let loader = ext_debug::Instance::new(entry, instance);
    unsafe { loader.destroy_debug_utils_messenger(dbg, None) };
}

#[cfg(not(debug_assertions))]
pub(crate) unsafe fn destroy_debug_messenger(_entry: &Entry, _instance: &Instance, _dbg: DebugState) {}

unsafe fn create_instance(entry: &Entry, display_raw: RawDisplayHandle) -> Result<Instance> {
    let app = c"CubicEngine";

    let app_info = vk::ApplicationInfo {
        s_type: vk::StructureType::APPLICATION_INFO,
        p_application_name: app.as_ptr(),
        application_version: 0,
        p_engine_name: app.as_ptr(),
        engine_version: 0,
        api_version: vk::API_VERSION_1_0,
        ..Default::default()
    };

    let ext_slice = ash_window::enumerate_required_extensions(display_raw)
        .context("enumerate_required_extensions")?;

    #[cfg(debug_assertions)]
    let ext_vec = {
        let mut v = ext_slice.to_vec();
        v.push(ext_debug::NAME.as_ptr());
        v
    };
    #[cfg(not(debug_assertions))]
    let ext_vec = ext_slice.to_vec();

    #[cfg(debug_assertions)]
    let layers = [c"VK_LAYER_KHRONOS_validation".as_ptr()];
    #[cfg(not(debug_assertions))]
    let layers: [*const std::ffi::c_char; 0] = [];

    let create_info = vk::InstanceCreateInfo {
        s_type: vk::StructureType::INSTANCE_CREATE_INFO,
        p_application_info: &app_info,
        enabled_extension_count: ext_vec.len() as u32,
        pp_enabled_extension_names: ext_vec.as_ptr(),
        enabled_layer_count: layers.len() as u32,
        pp_enabled_layer_names: layers.as_ptr(),
        ..Default::default()
    };

    unsafe { Ok(entry.create_instance(&create_info, None)?) }
}

pub(crate) struct InstanceBundle {
    pub entry: Entry,
    pub instance: Instance,
    pub surface_loader: surface::Instance,
    pub surface: vk::SurfaceKHR,
    pub debug: DebugState,
}

pub(crate) unsafe fn init_instance_and_surface(
    window: &dyn HasWindowHandle,
    display: &dyn HasDisplayHandle,
) -> Result<InstanceBundle> {
    // STRICT ORDER:
    // 1) Create VkInstance (platform WSI + debug ext)
    // 2) Create VkSurfaceKHR FROM THIS INSTANCE
    // 3) Query physical devices/queues AGAINST THIS SURFACE (present support)
    let dh = display
        .display_handle()
        .map_err(|e| anyhow!("{e}"))?
        .as_raw();
    let wh = window
        .window_handle()
        .map_err(|e| anyhow!("{e}"))?
        .as_raw();

    let entry = Entry::linked();
    let instance = unsafe { create_instance(&entry, dh) }.context("create_instance")?;

    let surface_loader = surface::Instance::new(&entry, &instance);
    let surface = match unsafe { ash_window::create_surface(&entry, &instance, dh, wh, None) } {
        Ok(s) => s,
        Err(e) => {
            unsafe { instance.destroy_instance(None) };
            return Err(anyhow!(e).context("ash_window::create_surface"));
        }
    };

    let debug = match unsafe { create_debug_messenger(&entry, &instance) } {
        Ok(d) => d,
        Err(e) => {
            unsafe {
                surface_loader.destroy_surface(surface, None);
                instance.destroy_instance(None);
            }
            return Err(e.context("create_debug_messenger"));
        }
    };

    Ok(InstanceBundle {
        entry,
        instance,
        surface_loader,
        surface,
        debug,
    })
}

/// First device with a queue family that does graphics and can present to `surface`.
pub(crate) unsafe fn pick_device_and_queue(
    instance: &Instance,
    surf_i: &surface::Instance,
    surface: vk::SurfaceKHR,
) -> Result<(vk::PhysicalDevice, u32)> {
    for phys in unsafe { instance.enumerate_physical_devices()? } {
        let qprops = unsafe { instance.get_physical_device_queue_family_properties(phys) };

        for (i, q) in qprops.iter().enumerate() {
            let presents = unsafe {
                surf_i
                    .get_physical_device_surface_support(phys, i as u32, surface)
                    .unwrap_or(false)
            };
            if q.queue_flags.contains(vk::QueueFlags::GRAPHICS) && presents {
                let props = unsafe { instance.get_physical_device_properties(phys) };
                let name = props
                    .device_name_as_c_str()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                info!(device = %name, queue_family = i, "picked physical device");
                return Ok((phys, i as u32));
            }
        }
    }
    Err(anyhow!("no suitable physical device/queue family"))
}

pub(crate) unsafe fn create_device(
    instance: &Instance,
    phys: vk::PhysicalDevice,
    queue_family: u32,
) -> Result<(ash::Device, vk::Queue)> {
    let priorities = [1.0_f32];
    let qinfo = vk::DeviceQueueCreateInfo {
        s_type: vk::StructureType::DEVICE_QUEUE_CREATE_INFO,
        queue_family_index: queue_family,
        queue_count: 1,
        p_queue_priorities: priorities.as_ptr(),
        ..Default::default()
    };

    let device_exts = [swapchain::NAME.as_ptr()];
    let dinfo = vk::DeviceCreateInfo {
        s_type: vk::StructureType::DEVICE_CREATE_INFO,
        queue_create_info_count: 1,
        p_queue_create_infos: &qinfo,
        enabled_extension_count: device_exts.len() as u32,
        pp_enabled_extension_names: device_exts.as_ptr(),
        ..Default::default()
    };

    let device = unsafe { instance.create_device(phys, &dinfo, None) }.context("create_device")?;
    let queue = unsafe { device.get_device_queue(queue_family, 0) };
    Ok((device, queue))
}

pub(crate) unsafe fn pick_depth_format(instance: &Instance, phys: vk::PhysicalDevice) -> vk::Format {
    // Prefer 32f → 24+S8 → 16
    let candidates = [
        vk::Format::D32_SFLOAT,
        vk::Format::D24_UNORM_S8_UINT,
        vk::Format::D16_UNORM,
    ];
    for &fmt in &candidates {
        let props = unsafe { instance.get_physical_device_format_properties(phys, fmt) };
        if props
            .optimal_tiling_features
            .contains(vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT)
        {
            return fmt;
        }
    }
    vk::Format::D32_SFLOAT
}

pub(crate) unsafe fn create_command_pool(
    device: &ash::Device,
    queue_family: u32,
) -> Result<vk::CommandPool> {
    let pool_info = vk::CommandPoolCreateInfo {
        s_type: vk::StructureType::COMMAND_POOL_CREATE_INFO,
        queue_family_index: queue_family,
        flags: vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER,
        ..Default::default()
    };
    unsafe { Ok(device.create_command_pool(&pool_info, None)?) }
}
