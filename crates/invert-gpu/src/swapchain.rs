//! Swapchain management.
//!
//! [`SwapchainManager`] owns the presentable images, their views and the
//! depth buffer that shares their extent. Its lifecycle is tracked by the
//! pure [`SwapchainLifecycle`] table so illegal sequences surface as errors
//! instead of leaked or double-freed handles.

use std::sync::Arc;
use std::time::Duration;

use ash::vk;
use invert_core::Extent;

use crate::context::GpuContext;
use crate::error::{GpuError, Result};
use crate::memory::GpuImage;

/// Format the swapchain asks for first.
pub const PREFERRED_SURFACE_FORMAT: vk::SurfaceFormatKHR = vk::SurfaceFormatKHR {
    format: vk::Format::B8G8R8A8_SRGB,
    color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
};

/// Depth attachment format.
pub const DEPTH_FORMAT: vk::Format = vk::Format::D32_SFLOAT;

/// Lifecycle states of the swapchain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapchainState {
    Uninitialized,
    Live,
    Recreating,
    Destroyed,
}

/// Pure transition table for [`SwapchainState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapchainLifecycle {
    state: SwapchainState,
}

impl Default for SwapchainLifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl SwapchainLifecycle {
    pub const fn new() -> Self {
        Self {
            state: SwapchainState::Uninitialized,
        }
    }

    pub const fn state(&self) -> SwapchainState {
        self.state
    }

    /// Creation produced a usable swapchain.
    pub fn created(&mut self) -> Result<SwapchainState> {
        match self.state {
            SwapchainState::Live => Err(self.illegal("create")),
            _ => self.enter(SwapchainState::Live),
        }
    }

    /// Creation was skipped because the extent was degenerate. The state
    /// does not change.
    pub fn deferred(&mut self) -> Result<SwapchainState> {
        match self.state {
            SwapchainState::Live => Err(self.illegal("defer")),
            state => Ok(state),
        }
    }

    /// Recreation started; handles are about to be torn down.
    pub fn begin_recreate(&mut self) -> Result<SwapchainState> {
        match self.state {
            SwapchainState::Recreating => Err(self.illegal("recreate")),
            _ => self.enter(SwapchainState::Recreating),
        }
    }

    /// Recreation gave up before a new swapchain existed.
    pub fn cancelled(&mut self) -> Result<SwapchainState> {
        match self.state {
            SwapchainState::Recreating => self.enter(SwapchainState::Destroyed),
            _ => Err(self.illegal("cancel")),
        }
    }

    /// All handles released. Always legal.
    pub fn destroyed(&mut self) -> SwapchainState {
        self.state = SwapchainState::Destroyed;
        self.state
    }

    fn enter(&mut self, next: SwapchainState) -> Result<SwapchainState> {
        tracing::trace!(from = ?self.state, to = ?next, "swapchain state");
        self.state = next;
        Ok(next)
    }

    fn illegal(&self, operation: &str) -> GpuError {
        GpuError::InvalidState(format!("cannot {operation} a swapchain in state {:?}", self.state))
    }
}

/// Pick the surface format: the preferred sRGB BGRA pair, else any sRGB
/// format in the sRGB nonlinear color space, else the first reported one.
pub fn select_surface_format(available: &[vk::SurfaceFormatKHR]) -> Option<vk::SurfaceFormatKHR> {
    available
        .iter()
        .find(|f| **f == PREFERRED_SURFACE_FORMAT)
        .or_else(|| {
            available.iter().find(|f| {
                f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR && is_srgb(f.format)
            })
        })
        .or_else(|| available.first())
        .copied()
}

fn is_srgb(format: vk::Format) -> bool {
    matches!(
        format,
        vk::Format::B8G8R8A8_SRGB
            | vk::Format::R8G8B8A8_SRGB
            | vk::Format::A8B8G8R8_SRGB_PACK32
            | vk::Format::B8G8R8_SRGB
            | vk::Format::R8G8B8_SRGB
    )
}

/// One image more than the minimum, clamped to the maximum (0 = no limit).
pub fn choose_image_count(capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let desired = capabilities.min_image_count + 1;
    if capabilities.max_image_count > 0 {
        desired.min(capabilities.max_image_count)
    } else {
        desired
    }
}

/// Swapchain extent for `capabilities`.
///
/// A current width of `u32::MAX` means the surface leaves the size to the
/// swapchain, so the drawable size is used, clamped to the supported range.
/// `None` when either dimension would be zero.
pub fn resolve_extent(
    capabilities: &vk::SurfaceCapabilitiesKHR,
    drawable: Extent,
) -> Option<vk::Extent2D> {
    let extent = if capabilities.current_extent.width == u32::MAX {
        // Zero would clamp up to min_image_extent.
        if drawable.is_degenerate() {
            return None;
        }
        let min = capabilities.min_image_extent;
        let max = capabilities.max_image_extent;
        vk::Extent2D {
            width: drawable.width.clamp(min.width, max.width.max(min.width)),
            height: drawable.height.clamp(min.height, max.height.max(min.height)),
        }
    } else {
        capabilities.current_extent
    };

    (extent.width > 0 && extent.height > 0).then_some(extent)
}

/// Waits between creation attempts: 1 ms, doubling, capped at 64 ms.
#[derive(Debug, Clone)]
pub struct Backoff {
    next: Duration,
}

impl Backoff {
    pub const INITIAL: Duration = Duration::from_millis(1);
    pub const MAX: Duration = Duration::from_millis(64);

    pub const fn new() -> Self {
        Self {
            next: Self::INITIAL,
        }
    }

    /// Delay before the next attempt.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.next;
        self.next = (self.next * 2).min(Self::MAX);
        delay
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new()
    }
}

/// Call `attempt` until it reports success or `cancel` returns true,
/// handing each [`Backoff`] delay to `sleep` in between.
///
/// `cancel` is checked only after a failed attempt. Returns `Ok(false)` when
/// cancelled; errors from `attempt` end the loop immediately.
pub fn retry_with_backoff(
    mut attempt: impl FnMut() -> Result<bool>,
    cancel: &dyn Fn() -> bool,
    mut sleep: impl FnMut(Duration),
) -> Result<bool> {
    let mut backoff = Backoff::new();
    loop {
        if attempt()? {
            return Ok(true);
        }
        if cancel() {
            return Ok(false);
        }
        sleep(backoff.next_delay());
    }
}

/// Result of acquiring a swapchain image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireOutcome {
    Acquired { image_index: u32, suboptimal: bool },
    OutOfDate,
}

/// Result of presenting a swapchain image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentOutcome {
    Presented,
    /// Out of date or suboptimal: the swapchain should be recreated.
    Stale,
    Failed(vk::Result),
}

impl PresentOutcome {
    /// Map a `vkQueuePresentKHR` result.
    pub fn from_result(result: std::result::Result<bool, vk::Result>) -> Self {
        match result {
            Ok(false) => Self::Presented,
            Ok(true) | Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Self::Stale,
            Err(e) => Self::Failed(e),
        }
    }
}

/// D32 depth image with a full-image depth view.
pub struct DepthBuffer {
    device: Arc<ash::Device>,
    view: vk::ImageView,
    image: GpuImage,
}

impl DepthBuffer {
    pub fn new(ctx: &GpuContext, extent: vk::Extent2D) -> Result<Self> {
        let create_info = vk::ImageCreateInfo::default()
            .image_type(vk::ImageType::TYPE_2D)
            .format(DEPTH_FORMAT)
            .extent(vk::Extent3D {
                width: extent.width,
                height: extent.height,
                depth: 1,
            })
            .mip_levels(1)
            .array_layers(1)
            .samples(vk::SampleCountFlags::TYPE_1)
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED);

        let image =
            GpuImage::allocate_and_bind(ctx, &create_info, vk::MemoryPropertyFlags::DEVICE_LOCAL)?;

        let view_info = vk::ImageViewCreateInfo::default()
            .image(image.handle())
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(DEPTH_FORMAT)
            .subresource_range(
                vk::ImageSubresourceRange::default()
                    .aspect_mask(vk::ImageAspectFlags::DEPTH)
                    .base_mip_level(0)
                    .level_count(1)
                    .base_array_layer(0)
                    .layer_count(1),
            );
        let view = unsafe { ctx.device().create_image_view(&view_info, None)? };

        Ok(Self {
            device: ctx.device_arc(),
            view,
            image,
        })
    }

    pub fn image(&self) -> vk::Image {
        self.image.handle()
    }

    pub fn view(&self) -> vk::ImageView {
        self.view
    }
}

impl Drop for DepthBuffer {
    fn drop(&mut self) {
        unsafe { self.device.destroy_image_view(self.view, None) };
    }
}

/// Owns the swapchain, its image views and the depth buffer.
pub struct SwapchainManager {
    ctx: Arc<GpuContext>,
    lifecycle: SwapchainLifecycle,
    swapchain: vk::SwapchainKHR,
    images: Vec<vk::Image>,
    image_views: Vec<vk::ImageView>,
    format: vk::SurfaceFormatKHR,
    extent: vk::Extent2D,
    depth: Option<DepthBuffer>,
}

impl SwapchainManager {
    /// A manager with no swapchain yet.
    pub fn new(ctx: Arc<GpuContext>) -> Self {
        Self {
            ctx,
            lifecycle: SwapchainLifecycle::new(),
            swapchain: vk::SwapchainKHR::null(),
            images: Vec::new(),
            image_views: Vec::new(),
            format: PREFERRED_SURFACE_FORMAT,
            extent: vk::Extent2D::default(),
            depth: None,
        }
    }

    pub fn state(&self) -> SwapchainState {
        self.lifecycle.state()
    }

    pub fn handle(&self) -> vk::SwapchainKHR {
        self.swapchain
    }

    pub fn format(&self) -> vk::Format {
        self.format.format
    }

    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    pub fn image(&self, index: u32) -> vk::Image {
        self.images[index as usize]
    }

    pub fn image_view(&self, index: u32) -> vk::ImageView {
        self.image_views[index as usize]
    }

    pub fn depth(&self) -> Option<&DepthBuffer> {
        self.depth.as_ref()
    }

    /// Create the swapchain for the surface's current extent.
    ///
    /// Returns `Ok(false)` and leaves the state unchanged when the extent is
    /// degenerate; the caller is expected to retry.
    pub fn create(&mut self, drawable: Extent) -> Result<bool> {
        if self.lifecycle.state() == SwapchainState::Live {
            return Err(GpuError::InvalidState(
                "swapchain is already live, recreate it instead".to_string(),
            ));
        }
        let surface = self.ctx.surface();
        let caps = surface.capabilities(self.ctx.physical_device())?;

        let Some(extent) = resolve_extent(&caps.capabilities, drawable) else {
            self.lifecycle.deferred()?;
            tracing::debug!(?drawable, "Degenerate surface extent, deferring swapchain creation");
            return Ok(false);
        };
        let format = select_surface_format(&caps.formats).ok_or_else(|| {
            GpuError::SwapchainCreation("surface reports no formats".to_string())
        })?;
        let image_count = choose_image_count(&caps.capabilities);

        let queue_families = [self.ctx.graphics_queue_family()];
        let create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(surface.surface)
            .min_image_count(image_count)
            .image_format(format.format)
            .image_color_space(format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
            .queue_family_indices(&queue_families)
            .pre_transform(caps.capabilities.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(vk::PresentModeKHR::FIFO)
            .clipped(true);

        let loader = self.ctx.swapchain_loader();
        self.swapchain = unsafe { loader.create_swapchain(&create_info, None) }
            .map_err(|e| GpuError::SwapchainCreation(e.to_string()))?;
        self.format = format;
        self.extent = extent;

        // From here on every handle is tracked by `self`, so a failure
        // can be cleaned up by `destroy_handles`.
        if let Err(e) = self.create_views_and_depth() {
            self.destroy_handles();
            return Err(e);
        }

        self.lifecycle.created()?;
        tracing::info!(
            "Swapchain created: {}x{}, {} images, {:?}",
            extent.width,
            extent.height,
            self.images.len(),
            format.format
        );
        Ok(true)
    }

    fn create_views_and_depth(&mut self) -> Result<()> {
        let device = self.ctx.device();
        self.images = unsafe { self.ctx.swapchain_loader().get_swapchain_images(self.swapchain)? };

        for &image in &self.images {
            let view_info = vk::ImageViewCreateInfo::default()
                .image(image)
                .view_type(vk::ImageViewType::TYPE_2D)
                .format(self.format.format)
                .components(vk::ComponentMapping::default())
                .subresource_range(
                    vk::ImageSubresourceRange::default()
                        .aspect_mask(vk::ImageAspectFlags::COLOR)
                        .base_mip_level(0)
                        .level_count(1)
                        .base_array_layer(0)
                        .layer_count(1),
                );
            let view = unsafe { device.create_image_view(&view_info, None)? };
            self.image_views.push(view);
        }

        self.depth = Some(DepthBuffer::new(&self.ctx, self.extent)?);
        Ok(())
    }

    fn destroy_handles(&mut self) {
        self.depth = None;
        let device = self.ctx.device();
        for view in self.image_views.drain(..) {
            unsafe { device.destroy_image_view(view, None) };
        }
        self.images.clear();
        if self.swapchain != vk::SwapchainKHR::null() {
            unsafe {
                self.ctx
                    .swapchain_loader()
                    .destroy_swapchain(self.swapchain, None);
            }
            self.swapchain = vk::SwapchainKHR::null();
        }
    }

    /// Release depth buffer, views and swapchain. Safe to call repeatedly.
    ///
    /// The caller must ensure the device no longer uses the images.
    pub fn destroy(&mut self) {
        self.destroy_handles();
        self.lifecycle.destroyed();
    }

    /// Tear down and build again, retrying with backoff while the extent is
    /// degenerate.
    ///
    /// `drawable` is re-read before each attempt. Returns `Ok(false)` when
    /// `cancel` stopped the retries; the swapchain is then Destroyed.
    pub fn recreate(
        &mut self,
        drawable: &dyn Fn() -> Extent,
        cancel: &dyn Fn() -> bool,
    ) -> Result<bool> {
        self.lifecycle.begin_recreate()?;
        self.ctx.wait_idle()?;
        self.destroy_handles();

        let created = retry_with_backoff(|| self.create(drawable()), cancel, std::thread::sleep)?;
        if !created {
            self.lifecycle.cancelled()?;
            tracing::debug!("Swapchain recreation cancelled");
        }
        Ok(created)
    }

    /// Acquire the next image, signaling `semaphore` when it is ready.
    pub fn acquire_next_image(&self, semaphore: vk::Semaphore) -> Result<AcquireOutcome> {
        let result = unsafe {
            self.ctx.swapchain_loader().acquire_next_image(
                self.swapchain,
                u64::MAX,
                semaphore,
                vk::Fence::null(),
            )
        };

        match result {
            Ok((image_index, suboptimal)) => Ok(AcquireOutcome::Acquired {
                image_index,
                suboptimal,
            }),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(AcquireOutcome::OutOfDate),
            Err(e) => Err(e.into()),
        }
    }

    /// Present `image_index` once `wait` is signaled.
    pub fn present(
        &self,
        queue: vk::Queue,
        image_index: u32,
        wait: vk::Semaphore,
    ) -> PresentOutcome {
        let wait_semaphores = [wait];
        let swapchains = [self.swapchain];
        let image_indices = [image_index];
        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        PresentOutcome::from_result(unsafe {
            self.ctx.swapchain_loader().queue_present(queue, &present_info)
        })
    }
}

impl Drop for SwapchainManager {
    fn drop(&mut self) {
        self.destroy();
    }
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};
    use std::collections::VecDeque;

    use super::*;

    fn caps(min: u32, max: u32) -> vk::SurfaceCapabilitiesKHR {
        vk::SurfaceCapabilitiesKHR {
            min_image_count: min,
            max_image_count: max,
            current_extent: vk::Extent2D {
                width: 800,
                height: 600,
            },
            min_image_extent: vk::Extent2D {
                width: 1,
                height: 1,
            },
            max_image_extent: vk::Extent2D {
                width: 4096,
                height: 4096,
            },
            ..Default::default()
        }
    }

    #[test]
    fn image_count_is_min_plus_one_clamped() {
        assert_eq!(choose_image_count(&caps(2, 3)), 3);
        assert_eq!(choose_image_count(&caps(3, 3)), 3);
        assert_eq!(choose_image_count(&caps(2, 0)), 3);
        assert_eq!(choose_image_count(&caps(1, 8)), 2);
    }

    #[test]
    fn current_extent_wins_when_defined() {
        let extent = resolve_extent(&caps(2, 3), Extent::new(1920, 1080)).unwrap();
        assert_eq!((extent.width, extent.height), (800, 600));
    }

    #[test]
    fn indeterminate_extent_falls_back_to_drawable() {
        let mut c = caps(2, 3);
        c.current_extent = vk::Extent2D {
            width: u32::MAX,
            height: u32::MAX,
        };

        let extent = resolve_extent(&c, Extent::new(1280, 720)).unwrap();
        assert_eq!((extent.width, extent.height), (1280, 720));

        let clamped = resolve_extent(&c, Extent::new(10_000, 720)).unwrap();
        assert_eq!(clamped.width, 4096);
    }

    #[test]
    fn degenerate_extent_is_none() {
        let mut c = caps(2, 3);
        c.current_extent = vk::Extent2D {
            width: 0,
            height: 600,
        };
        assert_eq!(resolve_extent(&c, Extent::new(800, 600)), None);

        c.current_extent.width = u32::MAX;
        assert_eq!(resolve_extent(&c, Extent::new(0, 0)), None);
    }

    #[test]
    fn surface_format_preference_order() {
        let unorm = vk::SurfaceFormatKHR {
            format: vk::Format::B8G8R8A8_UNORM,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        };
        let rgba_srgb = vk::SurfaceFormatKHR {
            format: vk::Format::R8G8B8A8_SRGB,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        };

        assert_eq!(
            select_surface_format(&[unorm, rgba_srgb, PREFERRED_SURFACE_FORMAT]),
            Some(PREFERRED_SURFACE_FORMAT)
        );
        assert_eq!(select_surface_format(&[unorm, rgba_srgb]), Some(rgba_srgb));
        assert_eq!(select_surface_format(&[unorm]), Some(unorm));
        assert_eq!(select_surface_format(&[]), None);
    }

    #[test]
    fn lifecycle_create_destroy() {
        let mut lifecycle = SwapchainLifecycle::new();
        assert_eq!(lifecycle.deferred().unwrap(), SwapchainState::Uninitialized);
        assert_eq!(lifecycle.created().unwrap(), SwapchainState::Live);
        assert!(lifecycle.created().is_err());
        assert_eq!(lifecycle.destroyed(), SwapchainState::Destroyed);
        assert_eq!(lifecycle.destroyed(), SwapchainState::Destroyed);
    }

    #[test]
    fn lifecycle_recreate_paths() {
        let mut lifecycle = SwapchainLifecycle::new();
        lifecycle.created().unwrap();

        assert_eq!(lifecycle.begin_recreate().unwrap(), SwapchainState::Recreating);
        assert!(lifecycle.begin_recreate().is_err());
        assert_eq!(lifecycle.deferred().unwrap(), SwapchainState::Recreating);
        assert_eq!(lifecycle.created().unwrap(), SwapchainState::Live);

        lifecycle.begin_recreate().unwrap();
        assert_eq!(lifecycle.cancelled().unwrap(), SwapchainState::Destroyed);
        assert!(lifecycle.cancelled().is_err());
    }

    #[test]
    fn backoff_doubles_up_to_cap() {
        let mut backoff = Backoff::new();
        let delays: Vec<u64> = (0..9)
            .map(|_| backoff.next_delay().as_millis() as u64)
            .collect();
        assert_eq!(delays, vec![1, 2, 4, 8, 16, 32, 64, 64, 64]);
    }

    fn indeterminate_caps() -> vk::SurfaceCapabilitiesKHR {
        let mut c = caps(2, 3);
        c.current_extent = vk::Extent2D {
            width: u32::MAX,
            height: u32::MAX,
        };
        c
    }

    #[test]
    fn retry_waits_out_a_degenerate_drawable() {
        let caps = indeterminate_caps();
        let drawables = RefCell::new(VecDeque::from([
            Extent::new(0, 0),
            Extent::new(1280, 0),
            Extent::new(1280, 720),
        ]));
        let mut built = None;
        let mut sleeps = Vec::new();

        let created = retry_with_backoff(
            || {
                let drawable = drawables.borrow_mut().pop_front().unwrap();
                built = resolve_extent(&caps, drawable);
                Ok(built.is_some())
            },
            &|| false,
            |delay| sleeps.push(delay),
        )
        .unwrap();

        assert!(created);
        assert_eq!(built.map(|e| (e.width, e.height)), Some((1280, 720)));
        assert_eq!(sleeps, vec![Duration::from_millis(1), Duration::from_millis(2)]);
    }

    #[test]
    fn retry_delays_follow_capped_backoff() {
        let checks = Cell::new(0);
        let mut sleeps = Vec::new();

        let created = retry_with_backoff(
            || Ok(false),
            &|| {
                checks.set(checks.get() + 1);
                checks.get() > 9
            },
            |delay| sleeps.push(delay.as_millis() as u64),
        )
        .unwrap();

        assert!(!created);
        assert_eq!(sleeps, vec![1, 2, 4, 8, 16, 32, 64, 64, 64]);
    }

    #[test]
    fn cancel_during_wait_stops_without_another_attempt() {
        let stop = Cell::new(false);
        let mut attempts = 0;
        let mut sleeps = 0;

        let created = retry_with_backoff(
            || {
                attempts += 1;
                Ok(false)
            },
            &|| stop.get(),
            |_| {
                sleeps += 1;
                // Shutdown arrives while the thread sleeps.
                if sleeps == 2 {
                    stop.set(true);
                }
            },
        )
        .unwrap();

        assert!(!created);
        assert_eq!(attempts, 3);
        assert_eq!(sleeps, 2);
    }

    #[test]
    fn retry_propagates_attempt_errors() {
        let mut sleeps = 0;
        let result = retry_with_backoff(
            || Err(GpuError::SwapchainCreation("surface lost".to_string())),
            &|| false,
            |_| sleeps += 1,
        );
        assert!(matches!(result, Err(GpuError::SwapchainCreation(_))));
        assert_eq!(sleeps, 0);
    }

    #[test]
    fn present_results_map_to_outcomes() {
        assert_eq!(PresentOutcome::from_result(Ok(false)), PresentOutcome::Presented);
        assert_eq!(PresentOutcome::from_result(Ok(true)), PresentOutcome::Stale);
        assert_eq!(
            PresentOutcome::from_result(Err(vk::Result::ERROR_OUT_OF_DATE_KHR)),
            PresentOutcome::Stale
        );
        assert_eq!(
            PresentOutcome::from_result(Err(vk::Result::ERROR_DEVICE_LOST)),
            PresentOutcome::Failed(vk::Result::ERROR_DEVICE_LOST)
        );
    }
}
