//! Capability negotiation: what the host offers versus what the renderer needs.

use std::ffi::CStr;
use std::fmt;

use ash::vk;

use crate::context::find_queue_families;

/// Validation layer requested when validation is enabled.
pub const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";

/// Minimum Vulkan version: dynamic rendering and synchronization2 are core in 1.3.
pub const MIN_API_VERSION: u32 = vk::API_VERSION_1_3;

/// Layers, extensions and API version the renderer asks for.
#[derive(Debug, Clone)]
pub struct RequiredCapabilities {
    /// Instance layers. Missing layers only degrade diagnostics.
    pub instance_layers: Vec<&'static CStr>,
    /// Instance extensions. Missing entries are dropped with a warning unless
    /// they are also listed in `surface_extensions`.
    pub instance_extensions: Vec<&'static CStr>,
    /// Instance extensions without which no presentable surface can exist.
    pub surface_extensions: Vec<&'static CStr>,
    /// Device extensions every candidate must expose.
    pub device_extensions: Vec<&'static CStr>,
    /// Minimum `apiVersion` a candidate must report.
    pub min_api_version: u32,
}

impl RequiredCapabilities {
    /// Requirements for presenting through a surface that needs
    /// `surface_extensions`.
    pub fn new(surface_extensions: Vec<&'static CStr>, validation: bool) -> Self {
        let mut instance_extensions = surface_extensions.clone();
        let mut instance_layers = Vec::new();
        if validation {
            instance_layers.push(VALIDATION_LAYER);
            instance_extensions.push(ash::ext::debug_utils::NAME);
        }

        Self {
            instance_layers,
            instance_extensions,
            surface_extensions,
            device_extensions: vec![ash::khr::swapchain::NAME],
            min_api_version: MIN_API_VERSION,
        }
    }

    /// True when `name` must be present for instance creation to make sense.
    pub fn is_load_bearing(&self, name: &CStr) -> bool {
        self.surface_extensions.contains(&name)
    }
}

/// Names from `required` that are absent from `available`, in request order.
pub fn missing_names<'a>(available: &[&CStr], required: &[&'a CStr]) -> Vec<&'a CStr> {
    required
        .iter()
        .copied()
        .filter(|name| !available.contains(name))
        .collect()
}

/// Why a physical device was not selected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectionReason {
    ApiVersionTooLow { found: u32, required: u32 },
    NoGraphicsPresentQueue,
    MissingExtensions(Vec<String>),
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ApiVersionTooLow { found, required } => write!(
                f,
                "supports Vulkan {} but {} is required",
                format_version(*found),
                format_version(*required)
            ),
            Self::NoGraphicsPresentQueue => {
                f.write_str("does not expose a queue with both graphics and present support")
            }
            Self::MissingExtensions(names) => {
                write!(f, "lacks device extensions [{}]", names.join(", "))
            }
        }
    }
}

/// A rejected candidate and every predicate it failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceRejection {
    pub device_name: String,
    pub reasons: Vec<RejectionReason>,
}

impl fmt::Display for DeviceRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reasons = self
            .reasons
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        write!(f, "{} {}", self.device_name, reasons)
    }
}

/// Apply the selection predicate to one candidate.
///
/// Returns the graphics+present queue family on success. On failure every
/// failing predicate is reported, not just the first.
pub fn evaluate_candidate(
    api_version: u32,
    queue_families: &[vk::QueueFamilyProperties],
    present_support: &[bool],
    available_extensions: &[&CStr],
    required: &RequiredCapabilities,
) -> Result<u32, Vec<RejectionReason>> {
    let mut reasons = Vec::new();

    if api_version < required.min_api_version {
        reasons.push(RejectionReason::ApiVersionTooLow {
            found: api_version,
            required: required.min_api_version,
        });
    }

    let families = find_queue_families(queue_families, present_support);
    if families.is_none() {
        reasons.push(RejectionReason::NoGraphicsPresentQueue);
    }

    let missing = missing_names(available_extensions, &required.device_extensions);
    if !missing.is_empty() {
        reasons.push(RejectionReason::MissingExtensions(
            missing
                .iter()
                .map(|name| name.to_string_lossy().into_owned())
                .collect(),
        ));
    }

    match families {
        Some(families) if reasons.is_empty() => Ok(families.graphics),
        _ => Err(reasons),
    }
}

/// Properties of the selected device, kept for logging.
#[derive(Debug, Clone)]
pub struct GpuCapabilities {
    /// Device name
    pub device_name: String,
    /// Vulkan API version
    pub api_version: u32,
    /// Driver version
    pub driver_version: u32,
    /// Discrete, integrated, virtual...
    pub device_type: vk::PhysicalDeviceType,
    /// Graphics+present family
    pub graphics_queue_family: u32,
    /// Dedicated transfer family, if any
    pub transfer_queue_family: Option<u32>,
}

impl GpuCapabilities {
    /// Query capabilities from a physical device.
    ///
    /// # Safety
    /// The instance and physical device must be valid.
    pub unsafe fn query(
        instance: &ash::Instance,
        physical_device: vk::PhysicalDevice,
        graphics_queue_family: u32,
        transfer_queue_family: Option<u32>,
    ) -> Self {
        let properties = unsafe { instance.get_physical_device_properties(physical_device) };

        Self {
            device_name: device_name(&properties),
            api_version: properties.api_version,
            driver_version: properties.driver_version,
            device_type: properties.device_type,
            graphics_queue_family,
            transfer_queue_family,
        }
    }

    /// Get a human-readable summary of capabilities.
    pub fn summary(&self) -> String {
        let transfer = self
            .transfer_queue_family
            .map_or_else(|| "shared".to_string(), |family| family.to_string());
        format!(
            "{} ({:?}) - Vulkan {} - graphics family {}, transfer family {}",
            self.device_name,
            self.device_type,
            format_version(self.api_version),
            self.graphics_queue_family,
            transfer,
        )
    }
}

pub(crate) fn device_name(properties: &vk::PhysicalDeviceProperties) -> String {
    properties
        .device_name_as_c_str()
        .map_or_else(|_| "<unnamed device>".to_string(), |n| n.to_string_lossy().into_owned())
}

/// `major.minor.patch` for a packed Vulkan version.
pub fn format_version(version: u32) -> String {
    format!(
        "{}.{}.{}",
        vk::api_version_major(version),
        vk::api_version_minor(version),
        vk::api_version_patch(version)
    )
}
