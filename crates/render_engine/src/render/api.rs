//! Seams to the out-of-scope collaborators
//!
//! The frame loop consumes the swapchain, camera, and overlay UI through
//! these narrow interfaces; their implementations (window/surface plumbing,
//! camera controllers, editor panels) live in the embedding application.

use ash::{vk, Device};

use crate::foundation::math::{Mat4, Vec3};
use crate::render::backends::vulkan::VulkanResult;

/// Camera inputs consumed read-only once per frame
#[derive(Debug, Clone, Copy)]
pub struct CameraMatrices {
    /// Combined view-projection matrix
    pub view_proj: Mat4,
    /// Camera position in world space
    pub position: Vec3,
}

/// Result of acquiring the next presentation image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquiredImage {
    /// Image index to render into this frame
    Index(u32),
    /// The swapchain no longer matches the surface; the frame must be
    /// abandoned and the target recreated
    OutOfDate,
}

/// Result of presenting a rendered image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentStatus {
    /// Image was queued for presentation
    Presented,
    /// The swapchain went stale at present time
    OutOfDate,
}

/// Swapchain/target provider
///
/// Supplies the per-frame target image and its extent. On an out-of-date
/// signal the provider must recreate the swapchain and every resource that
/// embeds the surface extent (G-buffer, framebuffers) before the next call
/// to [`FrameRecorder::draw_frame`](crate::render::frame::FrameRecorder::draw_frame).
pub trait PresentTarget {
    /// Acquire the next target image, signaling `image_available` when the
    /// image is ready for rendering
    fn acquire(&mut self, image_available: vk::Semaphore) -> VulkanResult<AcquiredImage>;

    /// Queue `image_index` for presentation after `render_finished` signals
    fn present(
        &mut self,
        render_finished: vk::Semaphore,
        image_index: u32,
    ) -> VulkanResult<PresentStatus>;

    /// Current target extent
    fn extent(&self) -> vk::Extent2D;
}

/// UI overlay hook invoked inside the overlay pass
///
/// The core has no dependency on the overlay's content; it only opens the
/// render pass and hands over the command buffer.
pub trait OverlayRenderer {
    /// Record the overlay's draw commands
    fn render(&mut self, device: &Device, cmd: vk::CommandBuffer);
}

/// Overlay implementation that draws nothing
pub struct NullOverlay;

impl OverlayRenderer for NullOverlay {
    fn render(&mut self, _device: &Device, _cmd: vk::CommandBuffer) {}
}

/// Outcome of one pass through the frame state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// Frame was recorded, submitted, and queued for presentation
    Presented,
    /// Frame was abandoned (or presented against a stale swapchain); the
    /// caller must run its recreation sequence before the next frame
    SwapchainOutOfDate,
}
