//! Render error types.

use invert_gpu::GpuError;
use thiserror::Error;

/// Errors raised while building or driving the renderer.
#[derive(Error, Debug)]
pub enum RenderError {
    /// GPU layer failure.
    #[error(transparent)]
    Gpu(#[from] GpuError),

    /// Mesh could not be read or is inconsistent.
    #[error("Mesh error: {0}")]
    Mesh(#[from] invert_core::Error),

    /// Invalid renderer configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl From<ash::vk::Result> for RenderError {
    fn from(result: ash::vk::Result) -> Self {
        Self::Gpu(GpuError::Vulkan(result))
    }
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, RenderError>;
