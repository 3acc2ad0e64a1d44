//! Vulkan backend primitives
//!
//! Thin RAII layer over the handles the embedding application supplies:
//! buffers, command pools, and synchronization objects. Instance, device,
//! and surface creation live outside the core.

pub mod buffer;
pub mod commands;
pub mod device;
pub mod sync;

pub use buffer::Buffer;
pub use commands::CommandPool;
pub use device::{RenderDevice, VulkanError, VulkanResult};
pub use sync::{indirect_read_barrier, Fence, FrameSync, Semaphore};
