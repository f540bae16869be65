//! Synchronization primitives.

use std::sync::Arc;

use ash::vk;

use crate::error::Result;

/// Create a semaphore.
///
/// # Safety
/// The device must be valid.
pub unsafe fn create_semaphore(device: &ash::Device) -> Result<vk::Semaphore> {
    let create_info = vk::SemaphoreCreateInfo::default();
    let semaphore = unsafe { device.create_semaphore(&create_info, None)? };
    Ok(semaphore)
}

/// Create a fence.
///
/// # Safety
/// The device must be valid.
pub unsafe fn create_fence(device: &ash::Device, signaled: bool) -> Result<vk::Fence> {
    let flags = if signaled {
        vk::FenceCreateFlags::SIGNALED
    } else {
        vk::FenceCreateFlags::empty()
    };

    let create_info = vk::FenceCreateInfo::default().flags(flags);
    let fence = unsafe { device.create_fence(&create_info, None)? };
    Ok(fence)
}

/// Block until `fence` is signaled. A single call with an unbounded timeout.
///
/// # Safety
/// The device and fence must be valid.
pub unsafe fn wait_for_fence(device: &ash::Device, fence: vk::Fence) -> Result<()> {
    unsafe { device.wait_for_fences(&[fence], true, u64::MAX)? };
    Ok(())
}

/// Reset a fence to unsignaled state.
///
/// # Safety
/// The device and fence must be valid.
pub unsafe fn reset_fence(device: &ash::Device, fence: vk::Fence) -> Result<()> {
    unsafe { device.reset_fences(&[fence])? };
    Ok(())
}

/// One in-flight fence per frame slot, created signaled so the first wait
/// on each slot returns immediately.
pub struct FrameFences {
    device: Arc<ash::Device>,
    fences: Vec<vk::Fence>,
}

impl FrameFences {
    pub fn new(device: Arc<ash::Device>, frames_in_flight: usize) -> Result<Self> {
        let mut fences = Self {
            device,
            fences: Vec::with_capacity(frames_in_flight),
        };
        for _ in 0..frames_in_flight {
            let fence = unsafe { create_fence(&fences.device, true)? };
            fences.fences.push(fence);
        }
        Ok(fences)
    }

    pub fn get(&self, frame: usize) -> vk::Fence {
        self.fences[frame]
    }
}

impl Drop for FrameFences {
    fn drop(&mut self) {
        for fence in self.fences.drain(..) {
            unsafe { self.device.destroy_fence(fence, None) };
        }
    }
}

/// "Image acquired" and "render finished" semaphores, one pair per
/// swapchain image.
///
/// Sized to the image count, not the frame count: presentation waits are
/// keyed by image index.
pub struct ImageSemaphores {
    device: Arc<ash::Device>,
    image_acquired: Vec<vk::Semaphore>,
    render_finished: Vec<vk::Semaphore>,
}

impl ImageSemaphores {
    pub fn new(device: Arc<ash::Device>, image_count: usize) -> Result<Self> {
        let mut set = Self {
            device,
            image_acquired: Vec::with_capacity(image_count),
            render_finished: Vec::with_capacity(image_count),
        };
        for _ in 0..image_count {
            let acquired = unsafe { create_semaphore(&set.device)? };
            set.image_acquired.push(acquired);
            let finished = unsafe { create_semaphore(&set.device)? };
            set.render_finished.push(finished);
        }
        Ok(set)
    }

    pub fn image_acquired(&self, index: usize) -> vk::Semaphore {
        self.image_acquired[index]
    }

    pub fn render_finished(&self, index: usize) -> vk::Semaphore {
        self.render_finished[index]
    }
}

impl Drop for ImageSemaphores {
    fn drop(&mut self) {
        for semaphore in self
            .image_acquired
            .drain(..)
            .chain(self.render_finished.drain(..))
        {
            unsafe { self.device.destroy_semaphore(semaphore, None) };
        }
    }
}
