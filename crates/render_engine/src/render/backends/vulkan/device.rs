//! Device handle bundle and Vulkan error types
//!
//! The engine core does not create the instance or logical device; the
//! embedding application initializes Vulkan and hands the core this narrow
//! bundle of handles. `ash::Device` and `ash::Instance` are internally
//! reference counted, so clones are cheap and every RAII wrapper keeps its
//! own copy for destruction.

use ash::{vk, Device, Instance};

/// Errors from Vulkan backend operations
#[derive(thiserror::Error, Debug)]
pub enum VulkanError {
    /// General Vulkan API error with result code
    #[error("Vulkan API error: {0:?}")]
    Api(vk::Result),

    /// Invalid operation attempted
    #[error("Invalid operation: {reason}")]
    InvalidOperation {
        /// Description of why the operation is invalid
        reason: String,
    },

    /// No suitable memory type found for allocation
    #[error("No suitable memory type found")]
    NoSuitableMemoryType,
}

/// Result type for Vulkan operations
pub type VulkanResult<T> = Result<T, VulkanError>;

/// Handles the embedding application supplies to the renderer core
#[derive(Clone)]
pub struct RenderDevice {
    instance: Instance,
    device: Device,
    physical_device: vk::PhysicalDevice,
    graphics_queue: vk::Queue,
    graphics_queue_family: u32,
}

impl RenderDevice {
    /// Bundle externally-created Vulkan handles
    ///
    /// The caller retains responsibility for destroying the instance and
    /// logical device after every object created through this bundle has
    /// been dropped.
    pub fn from_raw(
        instance: Instance,
        device: Device,
        physical_device: vk::PhysicalDevice,
        graphics_queue: vk::Queue,
        graphics_queue_family: u32,
    ) -> Self {
        Self {
            instance,
            device,
            physical_device,
            graphics_queue,
            graphics_queue_family,
        }
    }

    /// The logical device
    pub fn device(&self) -> &Device {
        &self.device
    }

    /// The instance the device was created from
    pub fn instance(&self) -> &Instance {
        &self.instance
    }

    /// The physical device
    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.physical_device
    }

    /// The graphics queue
    pub fn graphics_queue(&self) -> vk::Queue {
        self.graphics_queue
    }

    /// Queue family index of the graphics queue
    pub fn graphics_queue_family(&self) -> u32 {
        self.graphics_queue_family
    }

    /// Block until the device is idle
    pub fn wait_idle(&self) -> VulkanResult<()> {
        unsafe { self.device.device_wait_idle().map_err(VulkanError::Api) }
    }

    /// Find a memory type with the required properties
    pub fn find_memory_type(
        &self,
        type_filter: u32,
        properties: vk::MemoryPropertyFlags,
    ) -> VulkanResult<u32> {
        let mem_properties = unsafe {
            self.instance
                .get_physical_device_memory_properties(self.physical_device)
        };

        for i in 0..mem_properties.memory_type_count {
            if (type_filter & (1 << i)) != 0
                && (mem_properties.memory_types[i as usize].property_flags & properties)
                    == properties
            {
                return Ok(i);
            }
        }

        Err(VulkanError::NoSuitableMemoryType)
    }
}
