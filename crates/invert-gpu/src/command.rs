//! Command buffer management.

use std::sync::Arc;

use ash::vk;

use crate::error::Result;

/// Command pool for allocating command buffers. Destroyed on drop, which
/// also frees every buffer allocated from it.
pub struct CommandPool {
    device: Arc<ash::Device>,
    pool: vk::CommandPool,
    queue_family: u32,
}

impl CommandPool {
    /// Create a pool whose buffers can be reset individually.
    pub fn new(device: Arc<ash::Device>, queue_family: u32) -> Result<Self> {
        let create_info = vk::CommandPoolCreateInfo::default()
            .queue_family_index(queue_family)
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);

        let pool = unsafe { device.create_command_pool(&create_info, None)? };

        Ok(Self {
            device,
            pool,
            queue_family,
        })
    }

    /// Get the raw pool handle.
    pub fn handle(&self) -> vk::CommandPool {
        self.pool
    }

    /// Get the queue family index.
    pub fn queue_family(&self) -> u32 {
        self.queue_family
    }

    /// Allocate `count` primary command buffers.
    pub fn allocate(&self, count: u32) -> Result<Vec<vk::CommandBuffer>> {
        let alloc_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(self.pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(count);

        Ok(unsafe { self.device.allocate_command_buffers(&alloc_info)? })
    }
}

impl Drop for CommandPool {
    fn drop(&mut self) {
        unsafe { self.device.destroy_command_pool(self.pool, None) };
    }
}

/// Reset and begin recording a command buffer.
///
/// # Safety
/// The command buffer must not be pending execution.
pub unsafe fn begin_command_buffer(
    device: &ash::Device,
    cmd: vk::CommandBuffer,
    flags: vk::CommandBufferUsageFlags,
) -> Result<()> {
    let begin_info = vk::CommandBufferBeginInfo::default().flags(flags);
    unsafe {
        device.reset_command_buffer(cmd, vk::CommandBufferResetFlags::empty())?;
        device.begin_command_buffer(cmd, &begin_info)?;
    }
    Ok(())
}

/// End recording a command buffer.
///
/// # Safety
/// The command buffer must be in the recording state.
pub unsafe fn end_command_buffer(device: &ash::Device, cmd: vk::CommandBuffer) -> Result<()> {
    unsafe { device.end_command_buffer(cmd)? };
    Ok(())
}

/// Semaphore dependencies of one submission.
#[derive(Debug, Default, Clone, Copy)]
pub struct SubmitSync {
    /// Semaphore to wait on and the stage that waits.
    pub wait: Option<(vk::Semaphore, vk::PipelineStageFlags2)>,
    /// Semaphore signaled when all commands have completed.
    pub signal: Option<vk::Semaphore>,
}

/// Submit one command buffer with `vkQueueSubmit2`.
///
/// # Safety
/// All handles must be valid and `fence` unsignaled (or null).
pub unsafe fn submit(
    device: &ash::Device,
    queue: vk::Queue,
    cmd: vk::CommandBuffer,
    sync: SubmitSync,
    fence: vk::Fence,
) -> Result<()> {
    let command_buffers = [vk::CommandBufferSubmitInfo::default().command_buffer(cmd)];
    let wait: Vec<_> = sync
        .wait
        .map(|(semaphore, stage)| {
            vk::SemaphoreSubmitInfo::default()
                .semaphore(semaphore)
                .stage_mask(stage)
        })
        .into_iter()
        .collect();
    let signal: Vec<_> = sync
        .signal
        .map(|semaphore| {
            vk::SemaphoreSubmitInfo::default()
                .semaphore(semaphore)
                .stage_mask(vk::PipelineStageFlags2::ALL_COMMANDS)
        })
        .into_iter()
        .collect();

    let submit_info = vk::SubmitInfo2::default()
        .command_buffer_infos(&command_buffers)
        .wait_semaphore_infos(&wait)
        .signal_semaphore_infos(&signal);

    unsafe { device.queue_submit2(queue, &[submit_info], fence)? };
    Ok(())
}

/// Image layout transition recorded with `vkCmdPipelineBarrier2`.
#[derive(Debug, Clone, Copy)]
pub struct ImageTransition {
    pub old_layout: vk::ImageLayout,
    pub new_layout: vk::ImageLayout,
    pub src_stage: vk::PipelineStageFlags2,
    pub src_access: vk::AccessFlags2,
    pub dst_stage: vk::PipelineStageFlags2,
    pub dst_access: vk::AccessFlags2,
    pub aspect: vk::ImageAspectFlags,
}

impl ImageTransition {
    /// Swapchain image before rendering: contents are discarded.
    ///
    /// The source stage matches the acquire semaphore's wait stage so the
    /// layout change is ordered after the image is actually available.
    pub const fn to_color_attachment() -> Self {
        Self {
            old_layout: vk::ImageLayout::UNDEFINED,
            new_layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            src_stage: vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT,
            src_access: vk::AccessFlags2::NONE,
            dst_stage: vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT,
            dst_access: vk::AccessFlags2::COLOR_ATTACHMENT_WRITE,
            aspect: vk::ImageAspectFlags::COLOR,
        }
    }

    /// Depth buffer before rendering.
    pub const fn to_depth_attachment() -> Self {
        Self {
            old_layout: vk::ImageLayout::UNDEFINED,
            new_layout: vk::ImageLayout::DEPTH_ATTACHMENT_OPTIMAL,
            src_stage: vk::PipelineStageFlags2::from_raw(
                vk::PipelineStageFlags2::EARLY_FRAGMENT_TESTS.as_raw()
                    | vk::PipelineStageFlags2::LATE_FRAGMENT_TESTS.as_raw(),
            ),
            src_access: vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_WRITE,
            dst_stage: vk::PipelineStageFlags2::from_raw(
                vk::PipelineStageFlags2::EARLY_FRAGMENT_TESTS.as_raw()
                    | vk::PipelineStageFlags2::LATE_FRAGMENT_TESTS.as_raw(),
            ),
            dst_access: vk::AccessFlags2::from_raw(
                vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_READ.as_raw()
                    | vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_WRITE.as_raw(),
            ),
            aspect: vk::ImageAspectFlags::DEPTH,
        }
    }

    /// Rendered swapchain image handed to the presentation engine.
    pub const fn to_present() -> Self {
        Self {
            old_layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            new_layout: vk::ImageLayout::PRESENT_SRC_KHR,
            src_stage: vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT,
            src_access: vk::AccessFlags2::COLOR_ATTACHMENT_WRITE,
            dst_stage: vk::PipelineStageFlags2::BOTTOM_OF_PIPE,
            dst_access: vk::AccessFlags2::NONE,
            aspect: vk::ImageAspectFlags::COLOR,
        }
    }
}

/// Record `transition` for every mip and layer of `image`.
///
/// # Safety
/// `cmd` must be recording.
pub unsafe fn transition_image(
    device: &ash::Device,
    cmd: vk::CommandBuffer,
    image: vk::Image,
    transition: ImageTransition,
) {
    let barrier = vk::ImageMemoryBarrier2::default()
        .src_stage_mask(transition.src_stage)
        .src_access_mask(transition.src_access)
        .dst_stage_mask(transition.dst_stage)
        .dst_access_mask(transition.dst_access)
        .old_layout(transition.old_layout)
        .new_layout(transition.new_layout)
        .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .image(image)
        .subresource_range(
            vk::ImageSubresourceRange::default()
                .aspect_mask(transition.aspect)
                .base_mip_level(0)
                .level_count(vk::REMAINING_MIP_LEVELS)
                .base_array_layer(0)
                .layer_count(vk::REMAINING_ARRAY_LAYERS),
        );

    let barriers = [barrier];
    let dependency = vk::DependencyInfo::default().image_memory_barriers(&barriers);
    unsafe { device.cmd_pipeline_barrier2(cmd, &dependency) };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn color_transitions_bracket_rendering() {
        let before = ImageTransition::to_color_attachment();
        let after = ImageTransition::to_present();
        assert_eq!(before.new_layout, after.old_layout);
        assert_eq!(before.old_layout, vk::ImageLayout::UNDEFINED);
        assert_eq!(after.new_layout, vk::ImageLayout::PRESENT_SRC_KHR);
        assert_eq!(before.dst_stage, after.src_stage);
        assert_eq!(
            before.src_stage,
            vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT
        );
    }

    #[test]
    fn depth_transition_covers_both_fragment_test_stages() {
        let depth = ImageTransition::to_depth_attachment();
        assert!(depth
            .dst_stage
            .contains(vk::PipelineStageFlags2::EARLY_FRAGMENT_TESTS));
        assert!(depth
            .dst_stage
            .contains(vk::PipelineStageFlags2::LATE_FRAGMENT_TESTS));
        assert_eq!(depth.aspect, vk::ImageAspectFlags::DEPTH);
    }
}
