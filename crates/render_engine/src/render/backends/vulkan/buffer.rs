//! GPU buffer management
//!
//! RAII-based buffer wrappers for the Vulkan backend: device-local buffers
//! with staged uploads, host-visible buffers with direct writes, and the
//! memory-type selection behind both.

use ash::{vk, Device};
use std::mem;

use super::commands::CommandPool;
use super::device::{RenderDevice, VulkanError, VulkanResult};

/// GPU buffer wrapper with automatic memory management
///
/// Each buffer owns its device memory and frees it on drop. Memory type
/// selection is driven by the requested property flags.
pub struct Buffer {
    device: Device,
    buffer: vk::Buffer,
    memory: vk::DeviceMemory,
    size: vk::DeviceSize,
}

impl Buffer {
    /// Create a buffer with freshly allocated memory
    pub fn new(
        device: &RenderDevice,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
        properties: vk::MemoryPropertyFlags,
    ) -> VulkanResult<Self> {
        if size == 0 {
            return Err(VulkanError::InvalidOperation {
                reason: "cannot create a zero-sized buffer".to_string(),
            });
        }

        let buffer_info = vk::BufferCreateInfo::builder()
            .size(size)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let buffer = unsafe {
            device
                .device()
                .create_buffer(&buffer_info, None)
                .map_err(VulkanError::Api)?
        };

        let mem_requirements = unsafe { device.device().get_buffer_memory_requirements(buffer) };

        let memory_type_index = match device.find_memory_type(
            mem_requirements.memory_type_bits,
            properties,
        ) {
            Ok(index) => index,
            Err(e) => {
                unsafe { device.device().destroy_buffer(buffer, None) };
                return Err(e);
            }
        };

        let alloc_info = vk::MemoryAllocateInfo::builder()
            .allocation_size(mem_requirements.size)
            .memory_type_index(memory_type_index);

        let memory = match unsafe { device.device().allocate_memory(&alloc_info, None) } {
            Ok(memory) => memory,
            Err(e) => {
                unsafe { device.device().destroy_buffer(buffer, None) };
                return Err(VulkanError::Api(e));
            }
        };

        unsafe {
            if let Err(e) = device.device().bind_buffer_memory(buffer, memory, 0) {
                device.device().destroy_buffer(buffer, None);
                device.device().free_memory(memory, None);
                return Err(VulkanError::Api(e));
            }
        }

        Ok(Self {
            device: device.device().clone(),
            buffer,
            memory,
            size,
        })
    }

    /// Create a host-visible, host-coherent buffer
    ///
    /// Suitable for staging arrays that the CPU rewrites every frame.
    pub fn new_host_visible(
        device: &RenderDevice,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
    ) -> VulkanResult<Self> {
        Self::new(
            device,
            size,
            usage,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        )
    }

    /// Create a device-local buffer and upload initial data through a
    /// temporary staging buffer and a one-shot transfer submission
    pub fn new_device_local_with_data<T: Copy>(
        device: &RenderDevice,
        transfer_pool: &CommandPool,
        usage: vk::BufferUsageFlags,
        data: &[T],
    ) -> VulkanResult<Self> {
        let size = (data.len() * mem::size_of::<T>()) as vk::DeviceSize;

        let staging = Self::new_host_visible(device, size, vk::BufferUsageFlags::TRANSFER_SRC)?;
        staging.write_data(data)?;

        let buffer = Self::new(
            device,
            size,
            usage | vk::BufferUsageFlags::TRANSFER_DST,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        )?;

        transfer_pool.submit_one_time(|raw_device, cmd| {
            let copy_region = vk::BufferCopy::builder().size(size).build();
            unsafe {
                raw_device.cmd_copy_buffer(cmd, staging.handle(), buffer.handle(), &[copy_region]);
            }
        })?;

        Ok(buffer)
    }

    /// Map memory for writing
    pub fn map_memory(&self) -> VulkanResult<*mut std::ffi::c_void> {
        unsafe {
            self.device
                .map_memory(self.memory, 0, self.size, vk::MemoryMapFlags::empty())
                .map_err(VulkanError::Api)
        }
    }

    /// Unmap memory
    pub fn unmap_memory(&self) {
        unsafe {
            self.device.unmap_memory(self.memory);
        }
    }

    /// Write a slice into the buffer, starting at offset zero
    ///
    /// Only valid for host-visible buffers. A write larger than the buffer
    /// is rejected; callers size buffers at creation.
    pub fn write_data<T: Copy>(&self, data: &[T]) -> VulkanResult<()> {
        let byte_len = data.len() * mem::size_of::<T>();
        if byte_len as vk::DeviceSize > self.size {
            return Err(VulkanError::InvalidOperation {
                reason: format!(
                    "write of {byte_len} bytes exceeds buffer size {}",
                    self.size
                ),
            });
        }

        let data_ptr = self.map_memory()?;

        unsafe {
            let src_ptr = data.as_ptr() as *const std::ffi::c_void;
            std::ptr::copy_nonoverlapping(src_ptr, data_ptr, byte_len);
        }

        self.unmap_memory();
        Ok(())
    }

    /// Buffer handle
    pub fn handle(&self) -> vk::Buffer {
        self.buffer
    }

    /// Buffer size in bytes
    pub fn size(&self) -> vk::DeviceSize {
        self.size
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_buffer(self.buffer, None);
            self.device.free_memory(self.memory, None);
        }
    }
}
