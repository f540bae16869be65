//! Vulkan instance creation, validation messages and physical device selection.

use std::borrow::Cow;
use std::ffi::{c_char, c_void, CStr, CString};

use ash::vk;

use crate::capabilities::{
    device_name, evaluate_candidate, missing_names, DeviceRejection, RequiredCapabilities,
};
use crate::error::{GpuError, Result};

/// A created instance and whether debug utils made it onto the enabled list.
pub struct CreatedInstance {
    pub instance: ash::Instance,
    pub debug_utils: bool,
}

/// Create a Vulkan instance.
///
/// Missing layers and extensions are logged and dropped from the request,
/// except the surface extensions, whose absence is fatal.
///
/// # Safety
/// The entry must be a valid Vulkan entry point.
pub unsafe fn create_instance(
    entry: &ash::Entry,
    app_name: &str,
    required: &RequiredCapabilities,
) -> Result<CreatedInstance> {
    let app_name = CString::new(app_name)
        .map_err(|_| GpuError::Other("application name contains a NUL byte".to_string()))?;

    let app_info = vk::ApplicationInfo::default()
        .application_name(&app_name)
        .application_version(vk::make_api_version(0, 0, 1, 0))
        .engine_name(c"Invert")
        .engine_version(vk::make_api_version(0, 0, 1, 0))
        .api_version(required.min_api_version);

    let available_layers = unsafe { entry.enumerate_instance_layer_properties()? };
    let available_layers: Vec<&CStr> = available_layers
        .iter()
        .filter_map(|props| props.layer_name_as_c_str().ok())
        .collect();
    let missing_layers = missing_names(&available_layers, &required.instance_layers);
    for layer in &missing_layers {
        tracing::warn!(
            "Instance layer {} not available, continuing without it",
            layer.to_string_lossy()
        );
    }

    let available_extensions = unsafe { entry.enumerate_instance_extension_properties(None)? };
    let available_extensions: Vec<&CStr> = available_extensions
        .iter()
        .filter_map(|props| props.extension_name_as_c_str().ok())
        .collect();
    let missing_extensions = missing_names(&available_extensions, &required.instance_extensions);
    for extension in &missing_extensions {
        if required.is_load_bearing(extension) {
            return Err(GpuError::ExtensionNotSupported(
                extension.to_string_lossy().into_owned(),
            ));
        }
        tracing::warn!(
            "Instance extension {} not available, continuing without it",
            extension.to_string_lossy()
        );
    }

    let layers: Vec<*const c_char> = required
        .instance_layers
        .iter()
        .filter(|name| !missing_layers.contains(name))
        .map(|name| name.as_ptr())
        .collect();
    let enabled_extensions: Vec<&CStr> = required
        .instance_extensions
        .iter()
        .copied()
        .filter(|name| !missing_extensions.contains(name))
        .collect();
    let extension_names: Vec<*const c_char> =
        enabled_extensions.iter().map(|n| n.as_ptr()).collect();
    let debug_utils = enabled_extensions.contains(&ash::ext::debug_utils::NAME);

    // Required for MoltenVK on macOS
    #[cfg(target_os = "macos")]
    let create_flags = vk::InstanceCreateFlags::ENUMERATE_PORTABILITY_KHR;
    #[cfg(not(target_os = "macos"))]
    let create_flags = vk::InstanceCreateFlags::empty();

    // Chained so instance creation and destruction are covered as well.
    let mut messenger_info = messenger_create_info();
    let mut create_info = vk::InstanceCreateInfo::default()
        .application_info(&app_info)
        .enabled_layer_names(&layers)
        .enabled_extension_names(&extension_names)
        .flags(create_flags);
    if debug_utils {
        create_info = create_info.push_next(&mut messenger_info);
    }

    let instance = unsafe { entry.create_instance(&create_info, None)? };
    tracing::debug!(
        layers = layers.len(),
        extensions = extension_names.len(),
        "Vulkan instance created"
    );

    Ok(CreatedInstance {
        instance,
        debug_utils,
    })
}

fn messenger_create_info() -> vk::DebugUtilsMessengerCreateInfoEXT<'static> {
    vk::DebugUtilsMessengerCreateInfoEXT::default()
        .message_severity(
            vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
        )
        .message_type(
            vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
        )
        .pfn_user_callback(Some(debug_callback))
}

/// Routes validation layer output into `tracing`.
pub struct DebugMessenger {
    loader: ash::ext::debug_utils::Instance,
    messenger: vk::DebugUtilsMessengerEXT,
}

impl DebugMessenger {
    /// # Safety
    /// The instance must have been created with `VK_EXT_debug_utils` enabled.
    pub unsafe fn new(entry: &ash::Entry, instance: &ash::Instance) -> Result<Self> {
        let loader = ash::ext::debug_utils::Instance::new(entry, instance);
        let messenger =
            unsafe { loader.create_debug_utils_messenger(&messenger_create_info(), None)? };
        Ok(Self { loader, messenger })
    }

    /// # Safety
    /// Must be called once, before the instance is destroyed.
    pub unsafe fn destroy(&mut self) {
        if self.messenger != vk::DebugUtilsMessengerEXT::null() {
            unsafe {
                self.loader
                    .destroy_debug_utils_messenger(self.messenger, None);
            }
            self.messenger = vk::DebugUtilsMessengerEXT::null();
        }
    }
}

unsafe extern "system" fn debug_callback(
    severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT<'_>,
    _user_data: *mut c_void,
) -> vk::Bool32 {
    let message = if callback_data.is_null() {
        Cow::Borrowed("<no message>")
    } else {
        let data = unsafe { &*callback_data };
        if data.p_message.is_null() {
            Cow::Borrowed("<no message>")
        } else {
            unsafe { CStr::from_ptr(data.p_message) }.to_string_lossy()
        }
    };

    let kind = message_type_name(message_type);
    if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
        tracing::error!(target: "vulkan", kind, "{message}");
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
        tracing::warn!(target: "vulkan", kind, "{message}");
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::INFO) {
        tracing::info!(target: "vulkan", kind, "{message}");
    } else {
        tracing::trace!(target: "vulkan", kind, "{message}");
    }

    vk::FALSE
}

fn message_type_name(message_type: vk::DebugUtilsMessageTypeFlagsEXT) -> &'static str {
    if message_type.contains(vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION) {
        "validation"
    } else if message_type.contains(vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE) {
        "performance"
    } else {
        "general"
    }
}

/// Pick the first physical device, in enumeration order, that satisfies
/// `required` and can present to `surface`.
///
/// Returns the device and its graphics+present queue family.
///
/// # Safety
/// The instance and surface must be valid.
pub unsafe fn select_physical_device(
    instance: &ash::Instance,
    surface_loader: &ash::khr::surface::Instance,
    surface: vk::SurfaceKHR,
    required: &RequiredCapabilities,
) -> Result<(vk::PhysicalDevice, u32)> {
    let devices = unsafe { instance.enumerate_physical_devices()? };
    let mut rejections = Vec::new();

    for device in devices {
        let properties = unsafe { instance.get_physical_device_properties(device) };
        let families = unsafe { instance.get_physical_device_queue_family_properties(device) };
        let present_support = (0..families.len() as u32)
            .map(|index| unsafe {
                surface_loader
                    .get_physical_device_surface_support(device, index, surface)
                    .unwrap_or(false)
            })
            .collect::<Vec<_>>();
        let extensions = unsafe { instance.enumerate_device_extension_properties(device)? };
        let extensions: Vec<&CStr> = extensions
            .iter()
            .filter_map(|props| props.extension_name_as_c_str().ok())
            .collect();

        match evaluate_candidate(
            properties.api_version,
            &families,
            &present_support,
            &extensions,
            required,
        ) {
            Ok(graphics_family) => return Ok((device, graphics_family)),
            Err(reasons) => {
                let rejection = DeviceRejection {
                    device_name: device_name(&properties),
                    reasons,
                };
                tracing::warn!("Skipping GPU: {rejection}");
                rejections.push(rejection);
            }
        }
    }

    Err(GpuError::NoSuitableDevice(rejections))
}
