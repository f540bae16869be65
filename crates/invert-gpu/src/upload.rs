//! Host-to-device uploads for static geometry.
//!
//! Two paths: a direct write into host-visible coherent memory, and a
//! staging copy into device-local memory on the transfer queue. The staged
//! path blocks until the copy has finished, so it belongs to initialization,
//! never to the per-frame loop.

use std::sync::Arc;

use ash::vk;
use bytemuck::Pod;

use crate::command::{begin_command_buffer, end_command_buffer, submit, CommandPool, SubmitSync};
use crate::context::GpuContext;
use crate::error::{GpuError, Result};
use crate::memory::GpuBuffer;
use crate::sync::{create_fence, reset_fence, wait_for_fence};

/// How static buffers reach the GPU.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UploadStrategy {
    /// Host-visible, host-coherent buffer written through a mapping.
    #[default]
    Direct,
    /// Device-local buffer filled from a staging buffer on the transfer queue.
    Staged,
}

/// Uploads buffers using one long-lived command buffer and fence.
pub struct Uploader {
    ctx: Arc<GpuContext>,
    // Owns `cmd`.
    #[allow(dead_code)]
    pool: CommandPool,
    cmd: vk::CommandBuffer,
    fence: vk::Fence,
    queue: vk::Queue,
}

impl Uploader {
    pub fn new(ctx: Arc<GpuContext>) -> Result<Self> {
        let (queue, family) = ctx.upload_queue();
        let pool = CommandPool::new(ctx.device_arc(), family)?;
        let cmd = pool
            .allocate(1)?
            .into_iter()
            .next()
            .ok_or_else(|| GpuError::Other("no upload command buffer allocated".to_string()))?;
        let fence = unsafe { create_fence(ctx.device(), false)? };

        tracing::debug!(family, "Uploader ready");
        Ok(Self {
            ctx,
            pool,
            cmd,
            fence,
            queue,
        })
    }

    /// Upload `data` with `strategy`.
    pub fn upload<T: Pod>(
        &self,
        data: &[T],
        usage: vk::BufferUsageFlags,
        strategy: UploadStrategy,
    ) -> Result<GpuBuffer> {
        match strategy {
            UploadStrategy::Direct => self.upload_direct(data, usage),
            UploadStrategy::Staged => self.upload_staged(data, usage),
        }
    }

    /// Host-visible coherent buffer written through a temporary mapping.
    pub fn upload_direct<T: Pod>(
        &self,
        data: &[T],
        usage: vk::BufferUsageFlags,
    ) -> Result<GpuBuffer> {
        let size = byte_size(data)?;
        let buffer = GpuBuffer::allocate_and_bind(
            &self.ctx,
            size,
            usage,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
            &[],
        )?;
        buffer.write(data)?;
        Ok(buffer)
    }

    /// Device-local buffer filled by a queue copy from a staging buffer.
    ///
    /// When the transfer and graphics families differ the destination is
    /// shared concurrently between them, so no ownership transfer is needed.
    pub fn upload_staged<T: Pod>(
        &self,
        data: &[T],
        usage: vk::BufferUsageFlags,
    ) -> Result<GpuBuffer> {
        let size = byte_size(data)?;
        let staging = GpuBuffer::allocate_and_bind(
            &self.ctx,
            size,
            vk::BufferUsageFlags::TRANSFER_SRC,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
            &[],
        )?;
        staging.write(data)?;

        let families = self.ctx.queue_families();
        let sharing: Vec<u32> = match families.transfer {
            Some(transfer) if transfer != families.graphics => vec![families.graphics, transfer],
            _ => Vec::new(),
        };
        let destination = GpuBuffer::allocate_and_bind(
            &self.ctx,
            size,
            usage | vk::BufferUsageFlags::TRANSFER_DST,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
            &sharing,
        )?;

        let device = self.ctx.device();
        unsafe {
            begin_command_buffer(device, self.cmd, vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT)?;
            let region = vk::BufferCopy::default().size(size);
            device.cmd_copy_buffer(self.cmd, staging.handle(), destination.handle(), &[region]);
            end_command_buffer(device, self.cmd)?;

            submit(device, self.queue, self.cmd, SubmitSync::default(), self.fence)?;
            wait_for_fence(device, self.fence)?;
            reset_fence(device, self.fence)?;
        }

        tracing::debug!(bytes = size, "Staged upload complete");
        Ok(destination)
    }
}

impl Drop for Uploader {
    fn drop(&mut self) {
        unsafe {
            let _ = self.ctx.device().queue_wait_idle(self.queue);
            self.ctx.device().destroy_fence(self.fence, None);
        }
    }
}

fn byte_size<T: Pod>(data: &[T]) -> Result<vk::DeviceSize> {
    if data.is_empty() {
        return Err(GpuError::InvalidState("refusing to upload an empty buffer".to_string()));
    }
    Ok(std::mem::size_of_val(data) as vk::DeviceSize)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direct_is_the_default() {
        assert_eq!(UploadStrategy::default(), UploadStrategy::Direct);
    }

    #[test]
    fn byte_size_counts_elements() {
        assert_eq!(byte_size(&[0u32; 36]).unwrap(), 144);
        assert_eq!(byte_size(&[[0.0f32; 3]; 2]).unwrap(), 24);
        assert!(byte_size::<u32>(&[]).is_err());
    }
}
