//! GPU memory management.
//!
//! Every buffer and image gets its own `VkDeviceMemory` block, chosen by
//! walking the device's memory type table.

use std::ffi::c_void;
use std::ptr::NonNull;
use std::sync::Arc;

use ash::vk;
use bytemuck::Pod;

use crate::context::GpuContext;
use crate::error::{GpuError, Result};

/// First memory type allowed by `type_bits` whose flags include `required`.
pub fn find_memory_type(
    properties: &vk::PhysicalDeviceMemoryProperties,
    type_bits: u32,
    required: vk::MemoryPropertyFlags,
) -> Option<u32> {
    let count = properties.memory_type_count.min(vk::MAX_MEMORY_TYPES as u32);
    (0..count).find(|&index| {
        type_bits & (1 << index) != 0
            && properties.memory_types[index as usize]
                .property_flags
                .contains(required)
    })
}

unsafe fn allocate_memory(
    ctx: &GpuContext,
    requirements: vk::MemoryRequirements,
    properties: vk::MemoryPropertyFlags,
) -> Result<vk::DeviceMemory> {
    let memory_type = find_memory_type(
        ctx.memory_properties(),
        requirements.memory_type_bits,
        properties,
    )
    .ok_or(GpuError::NoSuitableMemoryType {
        type_bits: requirements.memory_type_bits,
        properties,
    })?;

    let allocate_info = vk::MemoryAllocateInfo::default()
        .allocation_size(requirements.size)
        .memory_type_index(memory_type);

    Ok(unsafe { ctx.device().allocate_memory(&allocate_info, None)? })
}

/// A buffer bound to its own memory block.
pub struct GpuBuffer {
    device: Arc<ash::Device>,
    buffer: vk::Buffer,
    memory: vk::DeviceMemory,
    size: vk::DeviceSize,
    mapped: Option<NonNull<c_void>>,
}

impl GpuBuffer {
    /// Create a buffer, select a memory type for it, allocate and bind.
    ///
    /// More than one entry in `queue_families` makes the buffer
    /// `CONCURRENT` across those families.
    pub fn allocate_and_bind(
        ctx: &GpuContext,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
        properties: vk::MemoryPropertyFlags,
        queue_families: &[u32],
    ) -> Result<Self> {
        let device = ctx.device();
        let mut buffer_info = vk::BufferCreateInfo::default()
            .size(size.max(1))
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);
        if queue_families.len() > 1 {
            buffer_info = buffer_info
                .sharing_mode(vk::SharingMode::CONCURRENT)
                .queue_family_indices(queue_families);
        }

        let buffer = unsafe { device.create_buffer(&buffer_info, None)? };
        let requirements = unsafe { device.get_buffer_memory_requirements(buffer) };

        let memory = match unsafe { allocate_memory(ctx, requirements, properties) } {
            Ok(memory) => memory,
            Err(e) => {
                unsafe { device.destroy_buffer(buffer, None) };
                return Err(e);
            }
        };

        if let Err(e) = unsafe { device.bind_buffer_memory(buffer, memory, 0) } {
            unsafe {
                device.destroy_buffer(buffer, None);
                device.free_memory(memory, None);
            }
            return Err(e.into());
        }

        Ok(Self {
            device: ctx.device_arc(),
            buffer,
            memory,
            size,
            mapped: None,
        })
    }

    pub fn handle(&self) -> vk::Buffer {
        self.buffer
    }

    pub fn size(&self) -> vk::DeviceSize {
        self.size
    }

    pub fn is_mapped(&self) -> bool {
        self.mapped.is_some()
    }

    /// Map the whole buffer for the rest of its lifetime.
    ///
    /// The memory must be host-visible.
    pub fn map_persistent(&mut self) -> Result<()> {
        if self.mapped.is_none() {
            let ptr = unsafe {
                self.device
                    .map_memory(self.memory, 0, vk::WHOLE_SIZE, vk::MemoryMapFlags::empty())?
            };
            self.mapped = NonNull::new(ptr);
        }
        Ok(())
    }

    /// Copy `data` to the start of the buffer.
    ///
    /// Uses the persistent mapping when there is one, otherwise maps, copies
    /// and unmaps. No flush is issued, so the memory must be host-coherent.
    pub fn write<T: Pod>(&self, data: &[T]) -> Result<()> {
        let bytes: &[u8] = bytemuck::cast_slice(data);
        if bytes.len() as vk::DeviceSize > self.size {
            return Err(GpuError::InvalidState(format!(
                "{} bytes do not fit a {} byte buffer",
                bytes.len(),
                self.size
            )));
        }

        unsafe {
            match self.mapped {
                Some(ptr) => {
                    std::ptr::copy_nonoverlapping(bytes.as_ptr(), ptr.as_ptr().cast(), bytes.len());
                }
                None => {
                    let ptr = self.device.map_memory(
                        self.memory,
                        0,
                        self.size,
                        vk::MemoryMapFlags::empty(),
                    )?;
                    std::ptr::copy_nonoverlapping(bytes.as_ptr(), ptr.cast(), bytes.len());
                    self.device.unmap_memory(self.memory);
                }
            }
        }

        Ok(())
    }
}

impl Drop for GpuBuffer {
    fn drop(&mut self) {
        unsafe {
            if self.mapped.take().is_some() {
                self.device.unmap_memory(self.memory);
            }
            self.device.destroy_buffer(self.buffer, None);
            self.device.free_memory(self.memory, None);
        }
    }
}

/// An image bound to its own memory block.
pub struct GpuImage {
    device: Arc<ash::Device>,
    image: vk::Image,
    memory: vk::DeviceMemory,
    pub format: vk::Format,
    pub extent: vk::Extent3D,
}

impl GpuImage {
    /// Create an image, select a memory type for it, allocate and bind.
    pub fn allocate_and_bind(
        ctx: &GpuContext,
        create_info: &vk::ImageCreateInfo<'_>,
        properties: vk::MemoryPropertyFlags,
    ) -> Result<Self> {
        let device = ctx.device();
        let image = unsafe { device.create_image(create_info, None)? };
        let requirements = unsafe { device.get_image_memory_requirements(image) };

        let memory = match unsafe { allocate_memory(ctx, requirements, properties) } {
            Ok(memory) => memory,
            Err(e) => {
                unsafe { device.destroy_image(image, None) };
                return Err(e);
            }
        };

        if let Err(e) = unsafe { device.bind_image_memory(image, memory, 0) } {
            unsafe {
                device.destroy_image(image, None);
                device.free_memory(memory, None);
            }
            return Err(e.into());
        }

        Ok(Self {
            device: ctx.device_arc(),
            image,
            memory,
            format: create_info.format,
            extent: create_info.extent,
        })
    }

    pub fn handle(&self) -> vk::Image {
        self.image
    }
}

impl Drop for GpuImage {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_image(self.image, None);
            self.device.free_memory(self.memory, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(flags: &[vk::MemoryPropertyFlags]) -> vk::PhysicalDeviceMemoryProperties {
        let mut props = vk::PhysicalDeviceMemoryProperties {
            memory_type_count: flags.len() as u32,
            ..Default::default()
        };
        for (slot, &property_flags) in props.memory_types.iter_mut().zip(flags) {
            slot.property_flags = property_flags;
        }
        props
    }

    const HOST: vk::MemoryPropertyFlags = vk::MemoryPropertyFlags::from_raw(
        vk::MemoryPropertyFlags::HOST_VISIBLE.as_raw()
            | vk::MemoryPropertyFlags::HOST_COHERENT.as_raw(),
    );

    #[test]
    fn picks_first_allowed_type_with_all_flags() {
        let props = table(&[
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
            vk::MemoryPropertyFlags::HOST_VISIBLE,
            HOST,
            HOST | vk::MemoryPropertyFlags::HOST_CACHED,
        ]);

        assert_eq!(find_memory_type(&props, 0b1111, HOST), Some(2));
        assert_eq!(find_memory_type(&props, 0b1000, HOST), Some(3));
        assert_eq!(
            find_memory_type(&props, 0b1111, vk::MemoryPropertyFlags::DEVICE_LOCAL),
            Some(0)
        );
    }

    #[test]
    fn type_bits_restrict_the_search() {
        let props = table(&[HOST, HOST]);
        assert_eq!(find_memory_type(&props, 0b10, HOST), Some(1));
        assert_eq!(find_memory_type(&props, 0, HOST), None);
    }

    #[test]
    fn no_match_is_none() {
        let props = table(&[vk::MemoryPropertyFlags::DEVICE_LOCAL]);
        assert_eq!(find_memory_type(&props, u32::MAX, HOST), None);
    }

    #[test]
    fn entries_past_the_count_are_ignored() {
        let mut props = table(&[vk::MemoryPropertyFlags::DEVICE_LOCAL]);
        props.memory_types[1].property_flags = HOST;
        assert_eq!(find_memory_type(&props, 0b11, HOST), None);
    }

    #[test]
    fn empty_requirement_matches_first_allowed() {
        let props = table(&[HOST, vk::MemoryPropertyFlags::DEVICE_LOCAL]);
        assert_eq!(
            find_memory_type(&props, 0b10, vk::MemoryPropertyFlags::empty()),
            Some(1)
        );
    }
}
