//! Presentable surfaces.
//!
//! The renderer never talks to the windowing system directly. It is handed a
//! [`SurfaceProvider`] that knows which instance extensions it needs, how to
//! turn its native handles into a `VkSurfaceKHR`, and how large its drawable
//! area currently is.

use std::ffi::CStr;

use ash::vk;
use invert_core::Extent;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};

use crate::error::{GpuError, Result};

/// The windowing collaborator.
pub trait SurfaceProvider {
    /// Instance extensions needed to create a surface for this drawable.
    fn required_extensions(&self) -> Result<Vec<&'static CStr>>;

    /// Create the surface. Called exactly once per device context.
    ///
    /// # Safety
    /// The instance must have been created with [`Self::required_extensions`]
    /// enabled and must outlive the returned surface.
    unsafe fn create_surface(
        &self,
        entry: &ash::Entry,
        instance: &ash::Instance,
    ) -> Result<vk::SurfaceKHR>;

    /// Current drawable size in pixels.
    fn drawable_extent(&self) -> Extent;
}

/// Instance extensions `ash-window` needs for `window`'s display.
pub fn window_surface_extensions<W: HasDisplayHandle>(window: &W) -> Result<Vec<&'static CStr>> {
    let display = window
        .display_handle()
        .map_err(|e| GpuError::SurfaceCreation(format!("Failed to get display handle: {e}")))?;
    let names = ash_window::enumerate_required_extensions(display.as_raw())?;

    // SAFETY: ash-window hands out pointers into 'static extension name constants.
    Ok(names
        .iter()
        .map(|&ptr| unsafe { CStr::from_ptr(ptr) })
        .collect())
}

/// Create a surface for any window exposing raw handles.
///
/// # Safety
/// See [`SurfaceProvider::create_surface`].
pub unsafe fn create_window_surface<W>(
    entry: &ash::Entry,
    instance: &ash::Instance,
    window: &W,
) -> Result<vk::SurfaceKHR>
where
    W: HasDisplayHandle + HasWindowHandle,
{
    let display = window
        .display_handle()
        .map_err(|e| GpuError::SurfaceCreation(format!("Failed to get display handle: {e}")))?;
    let window_handle = window
        .window_handle()
        .map_err(|e| GpuError::SurfaceCreation(format!("Failed to get window handle: {e}")))?;

    unsafe {
        ash_window::create_surface(
            entry,
            instance,
            display.as_raw(),
            window_handle.as_raw(),
            None,
        )
    }
    .map_err(|e| GpuError::SurfaceCreation(e.to_string()))
}

/// Surface handle plus the instance-level surface functions.
pub struct SurfaceContext {
    /// The Vulkan surface handle.
    pub surface: vk::SurfaceKHR,
    /// Surface extension loader.
    pub loader: ash::khr::surface::Instance,
}

impl SurfaceContext {
    /// Create the surface through `provider`.
    ///
    /// # Safety
    /// See [`SurfaceProvider::create_surface`].
    pub unsafe fn new(
        entry: &ash::Entry,
        instance: &ash::Instance,
        provider: &dyn SurfaceProvider,
    ) -> Result<Self> {
        let surface = unsafe { provider.create_surface(entry, instance)? };
        let loader = ash::khr::surface::Instance::new(entry, instance);
        Ok(Self { surface, loader })
    }

    /// Query surface capabilities for `physical_device`.
    pub fn capabilities(&self, physical_device: vk::PhysicalDevice) -> Result<SurfaceCapabilities> {
        unsafe {
            let capabilities = self
                .loader
                .get_physical_device_surface_capabilities(physical_device, self.surface)?;
            let formats = self
                .loader
                .get_physical_device_surface_formats(physical_device, self.surface)?;

            Ok(SurfaceCapabilities {
                capabilities,
                formats,
            })
        }
    }

    /// Destroy the surface. Idempotent.
    ///
    /// # Safety
    /// No swapchain may still reference the surface.
    pub unsafe fn destroy(&mut self) {
        if self.surface != vk::SurfaceKHR::null() {
            unsafe { self.loader.destroy_surface(self.surface, None) };
            self.surface = vk::SurfaceKHR::null();
        }
    }
}

/// Surface capabilities query result.
pub struct SurfaceCapabilities {
    /// Raw surface capabilities.
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    /// Supported surface formats.
    pub formats: Vec<vk::SurfaceFormatKHR>,
}
