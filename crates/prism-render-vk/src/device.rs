// SPDX-License-Identifier: CEPL-1.0
use std::ffi::{c_void, CStr, CString};

use ash::ext::debug_utils;
use ash::khr::{surface, swapchain};
use ash::{vk, Entry, Instance};
use prism_core::{RenderError, RenderResult};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle, RawDisplayHandle};
use tracing::{debug, error, info, warn};

use crate::vk_err;

const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";

type DebugState = Option<(debug_utils::Instance, vk::DebugUtilsMessengerEXT)>;

/// Instance, window surface, logical device and the one queue used for both
/// graphics and present. Shared by everything that owns device objects.
pub struct DeviceContext {
    entry: Entry,
    instance: Instance,
    debug: DebugState,
    surface_loader: surface::Instance,
    surface: vk::SurfaceKHR,

    phys: vk::PhysicalDevice,
    device: ash::Device,
    queue_family: u32,
    queue: vk::Queue,

    swapchain_loader: swapchain::Device,
    command_pool: vk::CommandPool,
}

unsafe extern "system" fn debug_callback(
    severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    _types: vk::DebugUtilsMessageTypeFlagsEXT,
    data: *const vk::DebugUtilsMessengerCallbackDataEXT<'_>,
    _user: *mut c_void,
) -> vk::Bool32 {
    if data.is_null() || (*data).p_message.is_null() {
        return vk::FALSE;
    }
    let msg = CStr::from_ptr((*data).p_message).to_string_lossy();
    if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
        error!("[vulkan] {msg}");
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
        warn!("[vulkan] {msg}");
    } else {
        debug!("[vulkan] {msg}");
    }
    vk::FALSE
}

unsafe fn has_layer(entry: &Entry, name: &CStr) -> bool {
    entry
        .enumerate_instance_layer_properties()
        .unwrap_or_default()
        .iter()
        .any(|l| CStr::from_ptr(l.layer_name.as_ptr()) == name)
}

unsafe fn create_instance(
    entry: &Entry,
    display: RawDisplayHandle,
    app_name: &str,
    validation: bool,
) -> RenderResult<Instance> {
    let app = CString::new(app_name).unwrap_or_else(|_| c"prism".to_owned());

    let app_info = vk::ApplicationInfo {
        s_type: vk::StructureType::APPLICATION_INFO,
        p_application_name: app.as_ptr(),
        application_version: 0,
        p_engine_name: app.as_ptr(),
        engine_version: 0,
        api_version: vk::API_VERSION_1_0,
        ..Default::default()
    };

    let mut exts = ash_window::enumerate_required_extensions(display)
        .map_err(vk_err(RenderError::Device, "enumerate_required_extensions"))?
        .to_vec();
    if validation {
        exts.push(debug_utils::NAME.as_ptr());
    }

    let layers = [VALIDATION_LAYER.as_ptr()];
    let (enabled_layer_count, pp_enabled_layer_names) = if validation {
        (layers.len() as u32, layers.as_ptr())
    } else {
        (0, std::ptr::null())
    };

    let create_info = vk::InstanceCreateInfo {
        s_type: vk::StructureType::INSTANCE_CREATE_INFO,
        p_application_info: &app_info,
        enabled_extension_count: exts.len() as u32,
        pp_enabled_extension_names: exts.as_ptr(),
        enabled_layer_count,
        pp_enabled_layer_names,
        ..Default::default()
    };

    entry
        .create_instance(&create_info, None)
        .map_err(vk_err(RenderError::Device, "create_instance"))
}

unsafe fn create_debug_messenger(entry: &Entry, instance: &Instance) -> RenderResult<DebugState> {
    let loader = debug_utils::Instance::new(entry, instance);
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
    let messenger = loader
        .create_debug_utils_messenger(&ci, None)
        .map_err(vk_err(RenderError::Device, "create_debug_utils_messenger"))?;
    Ok(Some((loader, messenger)))
}

unsafe fn pick_device_and_queue(
    instance: &Instance,
    surf_i: &surface::Instance,
    surface: vk::SurfaceKHR,
) -> RenderResult<(vk::PhysicalDevice, u32)> {
    let devices = instance
        .enumerate_physical_devices()
        .map_err(vk_err(RenderError::Device, "enumerate_physical_devices"))?;

    for phys in devices {
        let has_swapchain = instance
            .enumerate_device_extension_properties(phys)
            .unwrap_or_default()
            .iter()
            .any(|e| CStr::from_ptr(e.extension_name.as_ptr()) == swapchain::NAME);
        if !has_swapchain {
            continue;
        }

        let qprops = instance.get_physical_device_queue_family_properties(phys);
        for (i, q) in qprops.iter().enumerate() {
            if q.queue_flags.contains(vk::QueueFlags::GRAPHICS)
                && surf_i
                    .get_physical_device_surface_support(phys, i as u32, surface)
                    .unwrap_or(false)
            {
                return Ok((phys, i as u32));
            }
        }
    }
    Err(RenderError::Device(
        "no physical device with a graphics+present queue and swapchain support".into(),
    ))
}

unsafe fn create_device(
    instance: &Instance,
    phys: vk::PhysicalDevice,
    queue_family: u32,
) -> RenderResult<ash::Device> {
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
    instance
        .create_device(phys, &dinfo, None)
        .map_err(vk_err(RenderError::Device, "create_device"))
}

/// Index of the first memory type allowed by `type_bits` that has all of `flags`.
pub(crate) fn find_memory_type_index(
    props: &vk::PhysicalDeviceMemoryProperties,
    type_bits: u32,
    flags: vk::MemoryPropertyFlags,
) -> Option<u32> {
    (0..props.memory_type_count).find(|&i| {
        type_bits & (1 << i) != 0
            && props.memory_types[i as usize]
                .property_flags
                .contains(flags)
    })
}

impl DeviceContext {
    pub fn new<W: HasWindowHandle + HasDisplayHandle>(
        window: &W,
        app_name: &str,
    ) -> RenderResult<Self> {
        unsafe { Self::create(window, app_name) }
    }

    // STRICT ORDER:
    // 1) instance (WSI + optional debug ext)
    // 2) surface from THIS instance
    // 3) physical device/queue chosen against the surface (present support)
    // 4) device, queue, swapchain loader, command pool
    unsafe fn create<W: HasWindowHandle + HasDisplayHandle>(
        window: &W,
        app_name: &str,
    ) -> RenderResult<Self> {
        let display = window
            .display_handle()
            .map_err(|e| RenderError::Device(format!("display handle: {e}")))?
            .as_raw();
        let win = window
            .window_handle()
            .map_err(|e| RenderError::Device(format!("window handle: {e}")))?
            .as_raw();

        let entry =
            Entry::load().map_err(|e| RenderError::Device(format!("loading Vulkan: {e}")))?;

        let validation = cfg!(debug_assertions) && has_layer(&entry, VALIDATION_LAYER);
        if cfg!(debug_assertions) && !validation {
            warn!("validation layer not available; running without it");
        }

        let instance = create_instance(&entry, display, app_name, validation)?;
        let debug = if validation {
            create_debug_messenger(&entry, &instance)?
        } else {
            None
        };

        let surface_loader = surface::Instance::new(&entry, &instance);
        let surface = ash_window::create_surface(&entry, &instance, display, win, None)
            .map_err(vk_err(RenderError::Device, "ash_window::create_surface"))?;

        let (phys, queue_family) = pick_device_and_queue(&instance, &surface_loader, surface)?;
        let device = create_device(&instance, phys, queue_family)?;
        let queue = device.get_device_queue(queue_family, 0);
        let swapchain_loader = swapchain::Device::new(&instance, &device);

        let pool_info = vk::CommandPoolCreateInfo {
            s_type: vk::StructureType::COMMAND_POOL_CREATE_INFO,
            queue_family_index: queue_family,
            flags: vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER
                | vk::CommandPoolCreateFlags::TRANSIENT,
            ..Default::default()
        };
        let command_pool = device
            .create_command_pool(&pool_info, None)
            .map_err(vk_err(RenderError::Device, "create_command_pool"))?;

        let props = instance.get_physical_device_properties(phys);
        let name = CStr::from_ptr(props.device_name.as_ptr()).to_string_lossy();
        info!("device: {name} (queue family {queue_family}, validation={validation})");

        Ok(Self {
            entry,
            instance,
            debug,
            surface_loader,
            surface,
            phys,
            device,
            queue_family,
            queue,
            swapchain_loader,
            command_pool,
        })
    }

    pub fn entry(&self) -> &Entry {
        &self.entry
    }

    pub fn instance(&self) -> &Instance {
        &self.instance
    }

    pub fn device(&self) -> &ash::Device {
        &self.device
    }

    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.phys
    }

    pub fn queue(&self) -> vk::Queue {
        self.queue
    }

    pub fn queue_family(&self) -> u32 {
        self.queue_family
    }

    pub fn surface(&self) -> vk::SurfaceKHR {
        self.surface
    }

    pub fn surface_loader(&self) -> &surface::Instance {
        &self.surface_loader
    }

    pub fn swapchain_loader(&self) -> &swapchain::Device {
        &self.swapchain_loader
    }

    pub fn command_pool(&self) -> vk::CommandPool {
        self.command_pool
    }

    pub fn find_memory_type(
        &self,
        type_bits: u32,
        flags: vk::MemoryPropertyFlags,
    ) -> RenderResult<u32> {
        let props = unsafe { self.instance.get_physical_device_memory_properties(self.phys) };
        find_memory_type_index(&props, type_bits, flags).ok_or_else(|| {
            RenderError::Allocation(format!("no memory type with {flags:?} in {type_bits:#b}"))
        })
    }

    /// Creates a buffer and binds freshly allocated memory to it.
    pub fn create_buffer(
        &self,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
        flags: vk::MemoryPropertyFlags,
    ) -> RenderResult<(vk::Buffer, vk::DeviceMemory)> {
        let d = &self.device;
        let info = vk::BufferCreateInfo {
            s_type: vk::StructureType::BUFFER_CREATE_INFO,
            size,
            usage,
            sharing_mode: vk::SharingMode::EXCLUSIVE,
            ..Default::default()
        };
        unsafe {
            let buffer = d
                .create_buffer(&info, None)
                .map_err(vk_err(RenderError::Allocation, "create_buffer"))?;

            let req = d.get_buffer_memory_requirements(buffer);
            let memory = self
                .find_memory_type(req.memory_type_bits, flags)
                .and_then(|memory_type_index| {
                    let alloc = vk::MemoryAllocateInfo {
                        s_type: vk::StructureType::MEMORY_ALLOCATE_INFO,
                        allocation_size: req.size,
                        memory_type_index,
                        ..Default::default()
                    };
                    d.allocate_memory(&alloc, None)
                        .map_err(vk_err(RenderError::Allocation, "allocate_memory"))
                });
            let memory = match memory {
                Ok(m) => m,
                Err(e) => {
                    d.destroy_buffer(buffer, None);
                    return Err(e);
                }
            };

            if let Err(e) = d.bind_buffer_memory(buffer, memory, 0) {
                d.destroy_buffer(buffer, None);
                d.free_memory(memory, None);
                return Err(RenderError::Allocation(format!("bind_buffer_memory: {e}")));
            }
            Ok((buffer, memory))
        }
    }

    pub fn wait_idle(&self) -> RenderResult<()> {
        unsafe { self.device.device_wait_idle() }
            .map_err(vk_err(RenderError::Device, "device_wait_idle"))
    }
}

// STRICT TEARDOWN ORDER:
// - command pool before device
// - device before surface
// - debug messenger and surface before instance; instance last.
impl Drop for DeviceContext {
    fn drop(&mut self) {
        unsafe {
            self.device.device_wait_idle().ok();
            self.device.destroy_command_pool(self.command_pool, None);
            self.device.destroy_device(None);
            self.surface_loader.destroy_surface(self.surface, None);
            if let Some((loader, messenger)) = self.debug.take() {
                loader.destroy_debug_utils_messenger(messenger, None);
            }
            self.instance.destroy_instance(None);
        }
    }
}
