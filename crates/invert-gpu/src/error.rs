//! GPU error types.

use ash::vk;
use thiserror::Error;

use crate::capabilities::DeviceRejection;

/// GPU-related errors.
#[derive(Error, Debug)]
pub enum GpuError {
    /// Vulkan error.
    #[error("Vulkan error: {0}")]
    Vulkan(#[from] vk::Result),

    /// The Vulkan loader could not be found or initialized.
    #[error("Failed to load Vulkan: {0}")]
    Loading(String),

    /// No physical device satisfied the capability predicate.
    #[error("No suitable GPU found: {}", format_rejections(.0))]
    NoSuitableDevice(Vec<DeviceRejection>),

    /// Required extension not supported.
    #[error("Required extension not supported: {0}")]
    ExtensionNotSupported(String),

    /// No memory type matches the resource requirements and property flags.
    #[error("No memory type matches bits {type_bits:#b} with properties {properties:?}")]
    NoSuitableMemoryType {
        type_bits: u32,
        properties: vk::MemoryPropertyFlags,
    },

    /// Surface creation failed.
    #[error("Surface creation failed: {0}")]
    SurfaceCreation(String),

    /// Swapchain creation failed.
    #[error("Swapchain creation failed: {0}")]
    SwapchainCreation(String),

    /// Shader binary missing or malformed.
    #[error("Shader load failed for {path}: {reason}")]
    ShaderLoad { path: String, reason: String },

    /// Pipeline creation failed.
    #[error("Pipeline creation failed: {0}")]
    PipelineCreation(String),

    /// Invalid state.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Other error.
    #[error("{0}")]
    Other(String),
}

fn format_rejections(rejections: &[DeviceRejection]) -> String {
    if rejections.is_empty() {
        return "no physical devices enumerated".to_string();
    }
    rejections
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, GpuError>;
