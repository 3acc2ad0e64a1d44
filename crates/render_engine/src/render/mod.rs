//! Rendering core
//!
//! Draw batching, frustum culling, and the four-pass deferred frame
//! protocol, over a thin Vulkan backend layer.

pub mod api;
pub mod backends;
pub mod batch;
pub mod culling;
pub mod frame;
pub mod material;
pub mod primitives;

/// Maximum frames the CPU may prepare while the GPU is still rendering
///
/// Every per-frame-mutable GPU resource (staging and indirect command
/// arrays, command buffers, sync objects) is duplicated this many times;
/// slot `f % MAX_FRAMES_IN_FLIGHT` is reusable once its fence signals.
pub const MAX_FRAMES_IN_FLIGHT: usize = 2;

pub use api::{
    AcquiredImage, CameraMatrices, FrameOutcome, NullOverlay, OverlayRenderer, PresentStatus,
    PresentTarget,
};
pub use backends::vulkan::{
    Buffer, CommandPool, Fence, FrameSync, RenderDevice, Semaphore, VulkanError, VulkanResult,
};
pub use batch::{DrawDescriptor, MaterialBatch, INDIRECT_COMMAND_STRIDE};
pub use culling::{Frustum, Plane};
pub use frame::{
    FrameDescriptors, FramePasses, FrameRecorder, OverlayPassResources, PassResources,
    GBUFFER_COLOR_ATTACHMENTS,
};
pub use material::{
    Material, MaterialFlags, MaterialKey, MaterialPushConstants, MaterialRegistry,
};
pub use primitives::{Aabb, MeshData, SubMesh, Vertex};
