//! Synchronization primitives for GPU/CPU frame coordination
//!
//! RAII wrappers for semaphores and fences, the per-frame bundle the frame
//! recorder cycles through, and the buffer barrier that orders indirect
//! command uploads against their consumption.

use ash::{vk, Device};

use super::device::{RenderDevice, VulkanError, VulkanResult};

/// GPU-GPU synchronization primitive with automatic cleanup
pub struct Semaphore {
    device: Device,
    semaphore: vk::Semaphore,
}

impl Semaphore {
    /// Create a new binary semaphore
    pub fn new(device: &RenderDevice) -> VulkanResult<Self> {
        let create_info = vk::SemaphoreCreateInfo::builder();

        let semaphore = unsafe {
            device
                .device()
                .create_semaphore(&create_info, None)
                .map_err(VulkanError::Api)?
        };

        Ok(Self {
            device: device.device().clone(),
            semaphore,
        })
    }

    /// Semaphore handle
    pub fn handle(&self) -> vk::Semaphore {
        self.semaphore
    }
}

impl Drop for Semaphore {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_semaphore(self.semaphore, None);
        }
    }
}

/// Fence wrapper with RAII cleanup
pub struct Fence {
    device: Device,
    fence: vk::Fence,
}

impl Fence {
    /// Create a new fence, optionally in the signaled state
    pub fn new(device: &RenderDevice, signaled: bool) -> VulkanResult<Self> {
        let flags = if signaled {
            vk::FenceCreateFlags::SIGNALED
        } else {
            vk::FenceCreateFlags::empty()
        };

        let create_info = vk::FenceCreateInfo::builder().flags(flags);

        let fence = unsafe {
            device
                .device()
                .create_fence(&create_info, None)
                .map_err(VulkanError::Api)?
        };

        Ok(Self {
            device: device.device().clone(),
            fence,
        })
    }

    /// Wait for the fence to signal
    pub fn wait(&self, timeout: u64) -> VulkanResult<()> {
        unsafe {
            self.device
                .wait_for_fences(&[self.fence], true, timeout)
                .map_err(VulkanError::Api)
        }
    }

    /// Reset the fence to unsignaled
    pub fn reset(&self) -> VulkanResult<()> {
        unsafe {
            self.device
                .reset_fences(&[self.fence])
                .map_err(VulkanError::Api)
        }
    }

    /// Fence handle
    pub fn handle(&self) -> vk::Fence {
        self.fence
    }
}

impl Drop for Fence {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_fence(self.fence, None);
        }
    }
}

/// Synchronization objects for one in-flight frame slot
pub struct FrameSync {
    /// Signaled when the acquired swapchain image becomes available
    pub image_available: Semaphore,
    /// Signaled when the frame's rendering completes
    pub render_finished: Semaphore,
    /// Guards the slot's command buffer and staging data against reuse
    /// while the GPU is still consuming them
    pub in_flight: Fence,
}

impl FrameSync {
    /// Create the sync objects for one frame slot
    ///
    /// The fence starts signaled so the first wait on a never-submitted
    /// slot returns immediately.
    pub fn new(device: &RenderDevice) -> VulkanResult<Self> {
        let image_available = Semaphore::new(device)?;
        let render_finished = Semaphore::new(device)?;
        let in_flight = Fence::new(device, true)?;

        Ok(Self {
            image_available,
            render_finished,
            in_flight,
        })
    }
}

/// Record a transfer-write to indirect-read barrier for a buffer region
///
/// Orders the staging copy of indirect commands before their consumption by
/// `cmd_draw_indexed_indirect` in the GPU's execution timeline; no CPU wait
/// is involved.
pub fn indirect_read_barrier(
    device: &Device,
    cmd: vk::CommandBuffer,
    buffer: vk::Buffer,
    size: vk::DeviceSize,
) {
    let barrier = vk::BufferMemoryBarrier::builder()
        .src_access_mask(vk::AccessFlags::TRANSFER_WRITE)
        .dst_access_mask(vk::AccessFlags::INDIRECT_COMMAND_READ)
        .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .buffer(buffer)
        .offset(0)
        .size(size)
        .build();

    unsafe {
        device.cmd_pipeline_barrier(
            cmd,
            vk::PipelineStageFlags::TRANSFER,
            vk::PipelineStageFlags::DRAW_INDIRECT,
            vk::DependencyFlags::empty(),
            &[],
            &[barrier],
            &[],
        );
    }
}
