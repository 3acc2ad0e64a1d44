//! Command pool and one-shot transfer submission

use ash::{vk, Device};

use super::device::{RenderDevice, VulkanError, VulkanResult};

/// Command pool wrapper with RAII cleanup
pub struct CommandPool {
    device: Device,
    pool: vk::CommandPool,
    queue: vk::Queue,
}

impl CommandPool {
    /// Create a command pool on the graphics queue family
    ///
    /// Uses `RESET_COMMAND_BUFFER` so per-frame buffers can be reset
    /// individually rather than through the whole pool.
    pub fn new(device: &RenderDevice) -> VulkanResult<Self> {
        let pool_info = vk::CommandPoolCreateInfo::builder()
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER)
            .queue_family_index(device.graphics_queue_family());

        let pool = unsafe {
            device
                .device()
                .create_command_pool(&pool_info, None)
                .map_err(VulkanError::Api)?
        };

        Ok(Self {
            device: device.device().clone(),
            pool,
            queue: device.graphics_queue(),
        })
    }

    /// Pool handle
    pub fn handle(&self) -> vk::CommandPool {
        self.pool
    }

    /// Allocate primary command buffers from this pool
    pub fn allocate_command_buffers(&self, count: u32) -> VulkanResult<Vec<vk::CommandBuffer>> {
        let alloc_info = vk::CommandBufferAllocateInfo::builder()
            .command_pool(self.pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(count);

        unsafe {
            self.device
                .allocate_command_buffers(&alloc_info)
                .map_err(VulkanError::Api)
        }
    }

    /// Record and submit a one-shot command buffer, waiting for completion
    ///
    /// Used for staged uploads at load time; per-frame work goes through
    /// the frame recorder instead.
    pub fn submit_one_time<F>(&self, record: F) -> VulkanResult<()>
    where
        F: FnOnce(&Device, vk::CommandBuffer),
    {
        let command_buffer = self.allocate_command_buffers(1)?[0];

        let begin_info = vk::CommandBufferBeginInfo::builder()
            .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);

        unsafe {
            self.device
                .begin_command_buffer(command_buffer, &begin_info)
                .map_err(VulkanError::Api)?;
        }

        record(&self.device, command_buffer);

        let result = unsafe {
            let command_buffers = [command_buffer];
            let submit_info = vk::SubmitInfo::builder().command_buffers(&command_buffers);

            self.device
                .end_command_buffer(command_buffer)
                .and_then(|()| {
                    self.device
                        .queue_submit(self.queue, &[submit_info.build()], vk::Fence::null())
                })
                .and_then(|()| self.device.queue_wait_idle(self.queue))
                .map_err(VulkanError::Api)
        };

        unsafe {
            self.device.free_command_buffers(self.pool, &[command_buffer]);
        }

        result
    }
}

impl Drop for CommandPool {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_command_pool(self.pool, None);
        }
    }
}
