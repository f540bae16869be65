//! Windowing collaborator for the Invert renderer.
//!
//! Turns a winit window into a [`SurfaceProvider`] so the GPU layer never
//! depends on winit directly.

use std::ffi::CStr;
use std::sync::Arc;

use ash::vk;
use invert_core::Extent;
use invert_gpu::surface::{create_window_surface, window_surface_extensions};
use invert_gpu::SurfaceProvider;
use thiserror::Error;
use winit::dpi::PhysicalSize;
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::window::{Window, WindowAttributes};

#[derive(Error, Debug)]
pub enum PlatformError {
    #[error("Window creation failed: {0}")]
    WindowCreation(String),
    #[error("Event loop error: {0}")]
    EventLoop(String),
}

pub type Result<T> = std::result::Result<T, PlatformError>;

/// Platform configuration.
#[derive(Debug, Clone)]
pub struct PlatformConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub resizable: bool,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            title: "Invert".to_string(),
            width: 1280,
            height: 720,
            resizable: true,
        }
    }
}

impl PlatformConfig {
    /// Window attributes for this configuration.
    pub fn window_attributes(&self) -> WindowAttributes {
        Window::default_attributes()
            .with_title(&self.title)
            .with_inner_size(PhysicalSize::new(self.width, self.height))
            .with_resizable(self.resizable)
    }
}

/// Create the event loop. Must be called on the main thread.
pub fn create_event_loop() -> Result<EventLoop<()>> {
    EventLoop::new().map_err(|e| PlatformError::EventLoop(e.to_string()))
}

/// Create a window from `config`.
pub fn create_window(
    event_loop: &ActiveEventLoop,
    config: &PlatformConfig,
) -> Result<Arc<Window>> {
    let window = event_loop
        .create_window(config.window_attributes())
        .map_err(|e| PlatformError::WindowCreation(e.to_string()))?;
    Ok(Arc::new(window))
}

/// Convert a winit size into a drawable extent.
pub fn extent_from_size(size: PhysicalSize<u32>) -> Extent {
    Extent::new(size.width, size.height)
}

/// A winit window handed to the GPU layer.
///
/// The window is shared with the event thread; it must stay alive until the
/// device context built from it has been dropped.
#[derive(Clone)]
pub struct WinitSurface {
    window: Arc<Window>,
}

impl WinitSurface {
    pub fn new(window: Arc<Window>) -> Self {
        Self { window }
    }
}

impl SurfaceProvider for WinitSurface {
    fn required_extensions(&self) -> invert_gpu::Result<Vec<&'static CStr>> {
        window_surface_extensions(self.window.as_ref())
    }

    unsafe fn create_surface(
        &self,
        entry: &ash::Entry,
        instance: &ash::Instance,
    ) -> invert_gpu::Result<vk::SurfaceKHR> {
        let surface = unsafe { create_window_surface(entry, instance, self.window.as_ref())? };
        tracing::debug!(window = ?self.window.id(), "Window surface created");
        Ok(surface)
    }

    fn drawable_extent(&self) -> Extent {
        extent_from_size(self.window.inner_size())
    }
}
