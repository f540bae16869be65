//! GPU context management.

use std::ffi::c_char;
use std::sync::Arc;

use ash::vk;

use crate::capabilities::{GpuCapabilities, RequiredCapabilities};
use crate::error::{GpuError, Result};
use crate::instance::{create_instance, select_physical_device, DebugMessenger};
use crate::surface::{SurfaceContext, SurfaceProvider};

/// Queue family indices used by the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueFamilies {
    /// First family with graphics and present support.
    pub graphics: u32,
    /// First family with transfer but without graphics, if any.
    pub transfer: Option<u32>,
}

/// Pick queue families from a device's family list.
///
/// `present_support[i]` tells whether family `i` can present to the target
/// surface. Returns `None` when no family does both graphics and present.
pub fn find_queue_families(
    families: &[vk::QueueFamilyProperties],
    present_support: &[bool],
) -> Option<QueueFamilies> {
    let graphics = families.iter().enumerate().position(|(i, family)| {
        family.queue_count > 0
            && family.queue_flags.contains(vk::QueueFlags::GRAPHICS)
            && present_support.get(i).copied().unwrap_or(false)
    })?;

    let transfer = families.iter().position(|family| {
        family.queue_count > 0
            && family.queue_flags.contains(vk::QueueFlags::TRANSFER)
            && !family.queue_flags.contains(vk::QueueFlags::GRAPHICS)
    });

    Some(QueueFamilies {
        graphics: graphics as u32,
        transfer: transfer.map(|index| index as u32),
    })
}

/// Main GPU context holding Vulkan resources.
///
/// Immutable after construction. Everything else in the renderer borrows
/// from it or holds an `Arc` to it.
pub struct GpuContext {
    // Keeps the loader library alive for every function table below.
    entry: ash::Entry,
    instance: ash::Instance,
    debug_messenger: Option<DebugMessenger>,
    surface: SurfaceContext,
    physical_device: vk::PhysicalDevice,
    device: Arc<ash::Device>,
    swapchain_loader: ash::khr::swapchain::Device,
    memory_properties: vk::PhysicalDeviceMemoryProperties,
    capabilities: GpuCapabilities,

    queue_families: QueueFamilies,
    graphics_queue: vk::Queue,
    transfer_queue: Option<vk::Queue>,
}

impl GpuContext {
    /// Get the Vulkan entry point.
    pub fn entry(&self) -> &ash::Entry {
        &self.entry
    }

    /// Get the Vulkan instance handle.
    pub fn instance(&self) -> &ash::Instance {
        &self.instance
    }

    /// Get the Vulkan device handle.
    pub fn device(&self) -> &ash::Device {
        &self.device
    }

    /// Shared handle for resources that destroy themselves.
    pub fn device_arc(&self) -> Arc<ash::Device> {
        Arc::clone(&self.device)
    }

    /// Get the physical device handle.
    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.physical_device
    }

    /// Get the presentation surface.
    pub fn surface(&self) -> &SurfaceContext {
        &self.surface
    }

    /// Swapchain extension functions.
    pub fn swapchain_loader(&self) -> &ash::khr::swapchain::Device {
        &self.swapchain_loader
    }

    /// Memory types and heaps of the selected device.
    pub fn memory_properties(&self) -> &vk::PhysicalDeviceMemoryProperties {
        &self.memory_properties
    }

    /// Get GPU capabilities.
    pub fn capabilities(&self) -> &GpuCapabilities {
        &self.capabilities
    }

    pub fn queue_families(&self) -> QueueFamilies {
        self.queue_families
    }

    /// Get the graphics queue. It is also the present queue.
    pub fn graphics_queue(&self) -> vk::Queue {
        self.graphics_queue
    }

    /// Get the graphics queue family index.
    pub fn graphics_queue_family(&self) -> u32 {
        self.queue_families.graphics
    }

    /// Dedicated transfer queue, if the device has one.
    pub fn transfer_queue(&self) -> Option<vk::Queue> {
        self.transfer_queue
    }

    /// Queue and family uploads are submitted to.
    pub fn upload_queue(&self) -> (vk::Queue, u32) {
        match (self.transfer_queue, self.queue_families.transfer) {
            (Some(queue), Some(family)) => (queue, family),
            _ => (self.graphics_queue, self.queue_families.graphics),
        }
    }

    /// Wait for device to be idle.
    pub fn wait_idle(&self) -> Result<()> {
        unsafe {
            self.device.device_wait_idle()?;
        }
        Ok(())
    }
}

impl Drop for GpuContext {
    fn drop(&mut self) {
        unsafe {
            let _ = self.device.device_wait_idle();
            self.device.destroy_device(None);
            self.surface.destroy();
            if let Some(messenger) = self.debug_messenger.as_mut() {
                messenger.destroy();
            }
            self.instance.destroy_instance(None);
        }
    }
}

/// Builder for creating a GPU context.
pub struct GpuContextBuilder {
    app_name: String,
    enable_validation: bool,
}

impl Default for GpuContextBuilder {
    fn default() -> Self {
        Self {
            app_name: "Invert".to_string(),
            enable_validation: cfg!(debug_assertions),
        }
    }
}

impl GpuContextBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the application name.
    pub fn app_name(mut self, name: impl Into<String>) -> Self {
        self.app_name = name.into();
        self
    }

    /// Enable or disable validation layers.
    pub fn validation(mut self, enable: bool) -> Self {
        self.enable_validation = enable;
        self
    }

    /// Build the GPU context presenting to `provider`'s drawable.
    pub fn build(self, provider: &dyn SurfaceProvider) -> Result<GpuContext> {
        let entry =
            unsafe { ash::Entry::load() }.map_err(|e| GpuError::Loading(e.to_string()))?;

        let required =
            RequiredCapabilities::new(provider.required_extensions()?, self.enable_validation);

        let created = unsafe { create_instance(&entry, &self.app_name, &required)? };
        let instance = created.instance;

        let mut debug_messenger = if created.debug_utils {
            match unsafe { DebugMessenger::new(&entry, &instance) } {
                Ok(messenger) => Some(messenger),
                Err(e) => {
                    tracing::warn!("Debug messenger unavailable: {e}");
                    None
                }
            }
        } else {
            None
        };

        let mut surface = match unsafe { SurfaceContext::new(&entry, &instance, provider) } {
            Ok(surface) => surface,
            Err(e) => {
                unsafe { destroy_partial(&instance, None, debug_messenger.as_mut()) };
                return Err(e);
            }
        };

        match unsafe { open_device(&instance, &surface, &required) } {
            Ok(opened) => {
                let swapchain_loader = ash::khr::swapchain::Device::new(&instance, &opened.device);
                let memory_properties = unsafe {
                    instance.get_physical_device_memory_properties(opened.physical_device)
                };
                let capabilities = unsafe {
                    GpuCapabilities::query(
                        &instance,
                        opened.physical_device,
                        opened.families.graphics,
                        opened.families.transfer,
                    )
                };
                tracing::info!("Selected GPU: {}", capabilities.summary());

                Ok(GpuContext {
                    entry,
                    instance,
                    debug_messenger,
                    surface,
                    physical_device: opened.physical_device,
                    device: Arc::new(opened.device),
                    swapchain_loader,
                    memory_properties,
                    capabilities,
                    queue_families: opened.families,
                    graphics_queue: opened.graphics_queue,
                    transfer_queue: opened.transfer_queue,
                })
            }
            Err(e) => {
                unsafe { destroy_partial(&instance, Some(&mut surface), debug_messenger.as_mut()) };
                Err(e)
            }
        }
    }
}

unsafe fn destroy_partial(
    instance: &ash::Instance,
    surface: Option<&mut SurfaceContext>,
    messenger: Option<&mut DebugMessenger>,
) {
    unsafe {
        if let Some(surface) = surface {
            surface.destroy();
        }
        if let Some(messenger) = messenger {
            messenger.destroy();
        }
        instance.destroy_instance(None);
    }
}

struct OpenedDevice {
    physical_device: vk::PhysicalDevice,
    device: ash::Device,
    families: QueueFamilies,
    graphics_queue: vk::Queue,
    transfer_queue: Option<vk::Queue>,
}

/// Select a physical device and create the logical device and its queues.
unsafe fn open_device(
    instance: &ash::Instance,
    surface: &SurfaceContext,
    required: &RequiredCapabilities,
) -> Result<OpenedDevice> {
    let (physical_device, graphics) = unsafe {
        select_physical_device(instance, &surface.loader, surface.surface, required)?
    };

    let family_properties =
        unsafe { instance.get_physical_device_queue_family_properties(physical_device) };
    // Present support only matters for the graphics family chosen above.
    let mut present_support = vec![false; family_properties.len()];
    if let Some(slot) = present_support.get_mut(graphics as usize) {
        *slot = true;
    }
    let families = find_queue_families(&family_properties, &present_support)
        .ok_or_else(|| GpuError::InvalidState("graphics family vanished after selection".into()))?;

    let queue_priority = [1.0_f32];
    let mut queue_create_infos = vec![vk::DeviceQueueCreateInfo::default()
        .queue_family_index(families.graphics)
        .queue_priorities(&queue_priority)];
    if let Some(transfer) = families.transfer {
        queue_create_infos.push(
            vk::DeviceQueueCreateInfo::default()
                .queue_family_index(transfer)
                .queue_priorities(&queue_priority),
        );
    }

    let extension_names: Vec<*const c_char> = required
        .device_extensions
        .iter()
        .map(|ext| ext.as_ptr())
        .collect();

    let mut vulkan_1_3_features = vk::PhysicalDeviceVulkan13Features::default()
        .dynamic_rendering(true)
        .synchronization2(true);
    let mut vulkan_1_1_features =
        vk::PhysicalDeviceVulkan11Features::default().shader_draw_parameters(true);
    let mut features2 = vk::PhysicalDeviceFeatures2::default()
        .push_next(&mut vulkan_1_3_features)
        .push_next(&mut vulkan_1_1_features);

    let device_create_info = vk::DeviceCreateInfo::default()
        .queue_create_infos(&queue_create_infos)
        .enabled_extension_names(&extension_names)
        .push_next(&mut features2);

    let device = unsafe { instance.create_device(physical_device, &device_create_info, None)? };

    let graphics_queue = unsafe { device.get_device_queue(families.graphics, 0) };
    let transfer_queue = families
        .transfer
        .map(|family| unsafe { device.get_device_queue(family, 0) });

    Ok(OpenedDevice {
        physical_device,
        device,
        families,
        graphics_queue,
        transfer_queue,
    })
}
