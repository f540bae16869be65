//! Device-level tests against a real Vulkan driver.
//!
//! A headless surface stands in for a window. All tests need a GPU (or a
//! software rasterizer exposing `VK_EXT_headless_surface`) and are ignored
//! by default.
//!
//! Run with: cargo test -p invert-gpu --test gpu_tests -- --ignored

use std::ffi::CStr;
use std::sync::Arc;

use ash::vk;
use invert_core::Extent;
use invert_gpu::{
    GpuContext, GpuContextBuilder, Result, SurfaceProvider, SwapchainManager, SwapchainState,
    UploadStrategy, Uploader,
};

struct HeadlessSurface {
    extent: Extent,
}

impl SurfaceProvider for HeadlessSurface {
    fn required_extensions(&self) -> Result<Vec<&'static CStr>> {
        Ok(vec![ash::khr::surface::NAME, ash::ext::headless_surface::NAME])
    }

    unsafe fn create_surface(
        &self,
        entry: &ash::Entry,
        instance: &ash::Instance,
    ) -> Result<vk::SurfaceKHR> {
        let loader = ash::ext::headless_surface::Instance::new(entry, instance);
        let info = vk::HeadlessSurfaceCreateInfoEXT::default();
        Ok(unsafe { loader.create_headless_surface(&info, None)? })
    }

    fn drawable_extent(&self) -> Extent {
        self.extent
    }
}

fn headless_context() -> Arc<GpuContext> {
    let surface = HeadlessSurface {
        extent: Extent::new(800, 600),
    };
    let ctx = GpuContextBuilder::new()
        .app_name("invert-gpu tests")
        .validation(false)
        .build(&surface)
        .unwrap();
    Arc::new(ctx)
}

#[test]
#[ignore = "Requires GPU hardware"]
fn context_selects_a_graphics_family() {
    let ctx = headless_context();
    let families = ctx.queue_families();
    assert_eq!(ctx.graphics_queue_family(), families.graphics);
    assert_eq!(ctx.transfer_queue().is_some(), families.transfer.is_some());
    assert!(!ctx.capabilities().summary().is_empty());
}

#[test]
#[ignore = "Requires GPU hardware"]
fn swapchain_destroy_twice_leaves_null_handles() {
    let ctx = headless_context();
    let mut swapchain = SwapchainManager::new(Arc::clone(&ctx));

    assert!(swapchain.create(Extent::new(800, 600)).unwrap());
    assert_eq!(swapchain.state(), SwapchainState::Live);
    assert!(swapchain.image_count() > 0);
    assert!(swapchain.depth().is_some());

    ctx.wait_idle().unwrap();
    swapchain.destroy();
    swapchain.destroy();

    assert_eq!(swapchain.state(), SwapchainState::Destroyed);
    assert_eq!(swapchain.handle(), vk::SwapchainKHR::null());
    assert_eq!(swapchain.image_count(), 0);
    assert!(swapchain.depth().is_none());
}

#[test]
#[ignore = "Requires GPU hardware"]
fn recreate_returns_to_live() {
    let ctx = headless_context();
    let mut swapchain = SwapchainManager::new(Arc::clone(&ctx));
    assert!(swapchain.create(Extent::new(800, 600)).unwrap());

    let recreated = swapchain
        .recreate(&|| Extent::new(1024, 768), &|| false)
        .unwrap();
    assert!(recreated);
    assert_eq!(swapchain.state(), SwapchainState::Live);
}

#[test]
#[ignore = "Requires GPU hardware"]
fn both_upload_strategies_produce_buffers() {
    let ctx = headless_context();
    let uploader = Uploader::new(Arc::clone(&ctx)).unwrap();
    let indices: Vec<u32> = (0..36).collect();

    for strategy in [UploadStrategy::Direct, UploadStrategy::Staged] {
        let buffer = uploader
            .upload(&indices, vk::BufferUsageFlags::INDEX_BUFFER, strategy)
            .unwrap();
        assert_eq!(buffer.size(), 144);
    }
}
