//! Frame recording and the per-frame state machine
//!
//! One [`FrameRecorder`] owns the command pool, one primary command buffer
//! per in-flight frame, and the synchronization objects that bound how far
//! the CPU may run ahead of the GPU. Each frame is recorded as four passes
//! with strict ordering: G-buffer fill, deferred lighting resolve, forward
//! transparency, overlay.

use ash::vk;
use log::warn;

use crate::config::RendererConfig;
use crate::render::api::{
    AcquiredImage, CameraMatrices, FrameOutcome, OverlayRenderer, PresentStatus, PresentTarget,
};
use crate::render::backends::vulkan::{
    CommandPool, FrameSync, RenderDevice, VulkanError, VulkanResult,
};
use crate::render::batch::{MaterialBatch, INDIRECT_COMMAND_STRIDE};
use crate::render::material::{default_push_constants, MaterialKey, MaterialRegistry};
use crate::scene::Scene;

/// Color attachments in the G-buffer: albedo, normal, roughness
pub const GBUFFER_COLOR_ATTACHMENTS: usize = 3;

/// Pipeline and target handles for one render pass
///
/// Render passes, framebuffers, and pipelines embed surface and shader
/// state the core does not own; the provider rebuilds them on resize and
/// passes fresh handles every frame.
#[derive(Clone, Copy)]
pub struct PassResources<'a> {
    /// Render pass the pipeline was built against
    pub render_pass: vk::RenderPass,
    /// One framebuffer per swapchain image
    pub framebuffers: &'a [vk::Framebuffer],
    /// Graphics pipeline bound for the pass
    pub pipeline: vk::Pipeline,
    /// Layout used for descriptor and push-constant binding
    pub pipeline_layout: vk::PipelineLayout,
}

/// Render pass and framebuffers for the overlay pass
///
/// The overlay collaborator brings its own pipelines.
#[derive(Clone, Copy)]
pub struct OverlayPassResources<'a> {
    /// Render pass the overlay draws in
    pub render_pass: vk::RenderPass,
    /// One framebuffer per swapchain image
    pub framebuffers: &'a [vk::Framebuffer],
}

/// Descriptor sets shared across passes for the current frame
#[derive(Clone, Copy)]
pub struct FrameDescriptors {
    /// Camera uniform set (set 0)
    pub camera: vk::DescriptorSet,
    /// G-buffer sampler set for the lighting pass (set 1)
    pub gbuffer: vk::DescriptorSet,
    /// Light uniform set (set 2)
    pub light: vk::DescriptorSet,
}

/// Everything external the four passes consume for one frame
#[derive(Clone, Copy)]
pub struct FramePasses<'a> {
    /// G-buffer fill pass
    pub geometry: PassResources<'a>,
    /// Deferred lighting resolve pass
    pub lighting: PassResources<'a>,
    /// Forward transparency pass
    pub forward: PassResources<'a>,
    /// Overlay/UI pass
    pub overlay: OverlayPassResources<'a>,
    /// Per-frame descriptor sets
    pub descriptors: FrameDescriptors,
}

/// Records one command buffer per in-flight frame and drives submission
pub struct FrameRecorder {
    device: RenderDevice,
    command_pool: CommandPool,
    command_buffers: Vec<vk::CommandBuffer>,
    frame_sync: Vec<FrameSync>,
    frames_in_flight: usize,
    current_frame: usize,
    clear_color: [f32; 4],
    fence_timeout_ns: u64,
}

impl FrameRecorder {
    /// Create the recorder with its pool, buffers, and sync objects
    pub fn new(device: &RenderDevice, config: &RendererConfig) -> VulkanResult<Self> {
        config
            .validate()
            .map_err(|e| VulkanError::InvalidOperation {
                reason: e.to_string(),
            })?;

        let command_pool = CommandPool::new(device)?;
        let command_buffers =
            command_pool.allocate_command_buffers(config.frames_in_flight as u32)?;

        let mut frame_sync = Vec::with_capacity(config.frames_in_flight);
        for _ in 0..config.frames_in_flight {
            frame_sync.push(FrameSync::new(device)?);
        }

        Ok(Self {
            device: device.clone(),
            command_pool,
            command_buffers,
            frame_sync,
            frames_in_flight: config.frames_in_flight,
            current_frame: 0,
            clear_color: config.clear_color,
            fence_timeout_ns: config.fence_timeout_ns,
        })
    }

    /// Frame slot the next `draw_frame` call will use
    pub fn current_frame(&self) -> usize {
        self.current_frame
    }

    /// Command pool used for per-frame recording and one-shot transfers
    pub fn transfer_pool(&self) -> &CommandPool {
        &self.command_pool
    }

    /// Run the full state machine for one frame
    ///
    /// WAIT on the slot's fence, ACQUIRE an image, RESET the slot's command
    /// buffer, RECORD the indirect-command copies and the four passes,
    /// SUBMIT signaling the fence and render-finished semaphore, PRESENT.
    /// An out-of-date signal at acquire abandons the frame with nothing
    /// submitted; at present the frame was already submitted. Either way
    /// the caller must recreate the target (and every extent-dependent
    /// resource) before calling again.
    pub fn draw_frame(
        &mut self,
        target: &mut dyn PresentTarget,
        scene: &mut Scene,
        materials: &MaterialRegistry,
        camera: &CameraMatrices,
        passes: &FramePasses,
        overlay: &mut dyn OverlayRenderer,
    ) -> VulkanResult<FrameOutcome> {
        let frame = self.current_frame;

        // The fence guarantees the GPU is done with this slot's command
        // buffer and staging data from N frames ago.
        self.frame_sync[frame].in_flight.wait(self.fence_timeout_ns)?;

        let image_index = match target.acquire(self.frame_sync[frame].image_available.handle())? {
            AcquiredImage::Index(index) => index,
            AcquiredImage::OutOfDate => {
                warn!("Swapchain out of date at acquire; abandoning frame");
                return Ok(FrameOutcome::SwapchainOutOfDate);
            }
        };

        self.frame_sync[frame].in_flight.reset()?;

        // Write this frame slot's visible subsets before recording the
        // copies that consume them.
        scene.update_culling(&camera.view_proj, frame)?;

        let cmd = self.command_buffers[frame];
        let raw = self.device.device();

        unsafe {
            raw.reset_command_buffer(cmd, vk::CommandBufferResetFlags::empty())
                .map_err(VulkanError::Api)?;

            let begin_info = vk::CommandBufferBeginInfo::builder();
            raw.begin_command_buffer(cmd, &begin_info)
                .map_err(VulkanError::Api)?;
        }

        // Staging to device-local copies plus barriers must land before the
        // geometry pass reads the indirect buffers.
        scene.record_indirect_copies(raw, cmd, frame);

        self.record_passes(
            cmd,
            image_index,
            target.extent(),
            scene,
            materials,
            camera,
            passes,
            overlay,
            frame,
        );

        unsafe {
            raw.end_command_buffer(cmd).map_err(VulkanError::Api)?;
        }

        self.submit(cmd, frame)?;

        let outcome = match target.present(
            self.frame_sync[frame].render_finished.handle(),
            image_index,
        )? {
            PresentStatus::Presented => FrameOutcome::Presented,
            PresentStatus::OutOfDate => {
                warn!("Swapchain out of date at present");
                FrameOutcome::SwapchainOutOfDate
            }
        };

        self.current_frame = (self.current_frame + 1) % self.frames_in_flight;
        Ok(outcome)
    }

    fn submit(&self, cmd: vk::CommandBuffer, frame: usize) -> VulkanResult<()> {
        let sync = &self.frame_sync[frame];

        let wait_semaphores = [sync.image_available.handle()];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let command_buffers = [cmd];
        let signal_semaphores = [sync.render_finished.handle()];

        let submit_info = vk::SubmitInfo::builder()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        unsafe {
            self.device
                .device()
                .queue_submit(
                    self.device.graphics_queue(),
                    &[submit_info.build()],
                    sync.in_flight.handle(),
                )
                .map_err(VulkanError::Api)
        }
    }

    /// Record the four passes into an already-begun command buffer
    ///
    /// The indirect-command copies for `frame` must already be recorded
    /// ahead of this call.
    pub fn record_passes(
        &self,
        cmd: vk::CommandBuffer,
        image_index: u32,
        extent: vk::Extent2D,
        scene: &Scene,
        materials: &MaterialRegistry,
        camera: &CameraMatrices,
        passes: &FramePasses,
        overlay: &mut dyn OverlayRenderer,
        frame: usize,
    ) {
        self.record_geometry_pass(cmd, image_index, extent, scene, materials, passes, frame);
        self.record_lighting_pass(cmd, image_index, extent, passes);
        self.record_forward_pass(cmd, image_index, extent, scene, materials, camera, passes, frame);
        self.record_overlay_pass(cmd, image_index, extent, passes, overlay);
    }

    /// Pass 1: fill the G-buffer from every opaque batch's visible subset
    fn record_geometry_pass(
        &self,
        cmd: vk::CommandBuffer,
        image_index: u32,
        extent: vk::Extent2D,
        scene: &Scene,
        materials: &MaterialRegistry,
        passes: &FramePasses,
        frame: usize,
    ) {
        let raw = self.device.device();
        let pass = &passes.geometry;

        let mut clear_values = [vk::ClearValue {
            color: vk::ClearColorValue {
                float32: [0.0, 0.0, 0.0, 1.0],
            },
        }; GBUFFER_COLOR_ATTACHMENTS + 1];
        clear_values[0] = vk::ClearValue {
            color: vk::ClearColorValue {
                float32: self.clear_color,
            },
        };
        clear_values[GBUFFER_COLOR_ATTACHMENTS] = vk::ClearValue {
            depth_stencil: vk::ClearDepthStencilValue {
                depth: 1.0,
                stencil: 0,
            },
        };

        let begin_info = vk::RenderPassBeginInfo::builder()
            .render_pass(pass.render_pass)
            .framebuffer(pass.framebuffers[image_index as usize])
            .render_area(vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent,
            })
            .clear_values(&clear_values);

        unsafe {
            raw.cmd_begin_render_pass(cmd, &begin_info, vk::SubpassContents::INLINE);
            raw.cmd_bind_pipeline(cmd, vk::PipelineBindPoint::GRAPHICS, pass.pipeline);
            raw.cmd_bind_descriptor_sets(
                cmd,
                vk::PipelineBindPoint::GRAPHICS,
                pass.pipeline_layout,
                0,
                &[passes.descriptors.camera],
                &[],
            );
        }

        self.set_viewport_and_scissor(cmd, extent);

        if scene.has_unified_buffers() {
            scene.bind_unified_buffers(raw, cmd);

            for (key, batch) in scene.opaque_batches() {
                self.record_batch_draw(cmd, pass.pipeline_layout, materials, *key, batch, frame);
            }
        }

        unsafe {
            raw.cmd_end_render_pass(cmd);
        }
    }

    /// Pass 2: resolve lighting from the G-buffer with one fullscreen draw
    fn record_lighting_pass(
        &self,
        cmd: vk::CommandBuffer,
        image_index: u32,
        extent: vk::Extent2D,
        passes: &FramePasses,
    ) {
        let raw = self.device.device();
        let pass = &passes.lighting;

        let clear_values = [vk::ClearValue {
            color: vk::ClearColorValue {
                float32: [0.0, 0.0, 0.0, 1.0],
            },
        }];

        let begin_info = vk::RenderPassBeginInfo::builder()
            .render_pass(pass.render_pass)
            .framebuffer(pass.framebuffers[image_index as usize])
            .render_area(vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent,
            })
            .clear_values(&clear_values);

        unsafe {
            raw.cmd_begin_render_pass(cmd, &begin_info, vk::SubpassContents::INLINE);
            raw.cmd_bind_pipeline(cmd, vk::PipelineBindPoint::GRAPHICS, pass.pipeline);
            raw.cmd_bind_descriptor_sets(
                cmd,
                vk::PipelineBindPoint::GRAPHICS,
                pass.pipeline_layout,
                0,
                &[
                    passes.descriptors.camera,
                    passes.descriptors.gbuffer,
                    passes.descriptors.light,
                ],
                &[],
            );
        }

        self.set_viewport_and_scissor(cmd, extent);

        unsafe {
            // Fullscreen triangle; no per-object iteration in this pass.
            raw.cmd_draw(cmd, 3, 1, 0, 0);
            raw.cmd_end_render_pass(cmd);
        }
    }

    /// Pass 3: draw transparent batches back-to-front
    fn record_forward_pass(
        &self,
        cmd: vk::CommandBuffer,
        image_index: u32,
        extent: vk::Extent2D,
        scene: &Scene,
        materials: &MaterialRegistry,
        camera: &CameraMatrices,
        passes: &FramePasses,
        frame: usize,
    ) {
        let raw = self.device.device();
        let pass = &passes.forward;

        let begin_info = vk::RenderPassBeginInfo::builder()
            .render_pass(pass.render_pass)
            .framebuffer(pass.framebuffers[image_index as usize])
            .render_area(vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent,
            });

        unsafe {
            raw.cmd_begin_render_pass(cmd, &begin_info, vk::SubpassContents::INLINE);
        }

        if scene.has_transparent_objects() && scene.has_unified_buffers() {
            unsafe {
                raw.cmd_bind_pipeline(cmd, vk::PipelineBindPoint::GRAPHICS, pass.pipeline);
                raw.cmd_bind_descriptor_sets(
                    cmd,
                    vk::PipelineBindPoint::GRAPHICS,
                    pass.pipeline_layout,
                    0,
                    &[passes.descriptors.camera],
                    &[],
                );
                raw.cmd_bind_descriptor_sets(
                    cmd,
                    vk::PipelineBindPoint::GRAPHICS,
                    pass.pipeline_layout,
                    2,
                    &[passes.descriptors.light],
                    &[],
                );
            }

            self.set_viewport_and_scissor(cmd, extent);
            scene.bind_unified_buffers(raw, cmd);

            for (key, batch) in scene.sorted_transparent_batches(&camera.view_proj) {
                self.record_batch_draw(cmd, pass.pipeline_layout, materials, key, batch, frame);
            }
        }

        unsafe {
            raw.cmd_end_render_pass(cmd);
        }
    }

    /// Pass 4: hand the command buffer to the overlay collaborator
    fn record_overlay_pass(
        &self,
        cmd: vk::CommandBuffer,
        image_index: u32,
        extent: vk::Extent2D,
        passes: &FramePasses,
        overlay: &mut dyn OverlayRenderer,
    ) {
        let raw = self.device.device();
        let pass = &passes.overlay;

        let begin_info = vk::RenderPassBeginInfo::builder()
            .render_pass(pass.render_pass)
            .framebuffer(pass.framebuffers[image_index as usize])
            .render_area(vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent,
            });

        unsafe {
            raw.cmd_begin_render_pass(cmd, &begin_info, vk::SubpassContents::INLINE);
        }

        overlay.render(raw, cmd);

        unsafe {
            raw.cmd_end_render_pass(cmd);
        }
    }

    /// Bind one batch's material state and issue its indirect draw
    fn record_batch_draw(
        &self,
        cmd: vk::CommandBuffer,
        pipeline_layout: vk::PipelineLayout,
        materials: &MaterialRegistry,
        key: Option<MaterialKey>,
        batch: &MaterialBatch,
        frame: usize,
    ) {
        let visible = batch.visible_count(frame);
        if visible == 0 {
            return;
        }
        let Some(indirect_buffer) = batch.indirect_buffer(frame) else {
            return;
        };

        let raw = self.device.device();

        let push_constants = match key.and_then(|k| materials.get(k)) {
            Some(material) => {
                if material.descriptor_set != vk::DescriptorSet::null() {
                    unsafe {
                        raw.cmd_bind_descriptor_sets(
                            cmd,
                            vk::PipelineBindPoint::GRAPHICS,
                            pipeline_layout,
                            1,
                            &[material.descriptor_set],
                            &[],
                        );
                    }
                }
                material.push_constants()
            }
            None => default_push_constants(),
        };

        unsafe {
            raw.cmd_push_constants(
                cmd,
                pipeline_layout,
                vk::ShaderStageFlags::FRAGMENT,
                0,
                bytemuck::bytes_of(&push_constants),
            );

            // One indirect draw covering exactly the visible subset, never
            // the full capacity.
            raw.cmd_draw_indexed_indirect(
                cmd,
                indirect_buffer,
                0,
                visible,
                INDIRECT_COMMAND_STRIDE,
            );
        }
    }

    /// Flipped viewport so world-space Y points up on screen
    fn set_viewport_and_scissor(&self, cmd: vk::CommandBuffer, extent: vk::Extent2D) {
        let raw = self.device.device();

        let viewport = vk::Viewport {
            x: 0.0,
            y: extent.height as f32,
            width: extent.width as f32,
            height: -(extent.height as f32),
            min_depth: 0.0,
            max_depth: 1.0,
        };
        let scissor = vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent,
        };

        unsafe {
            raw.cmd_set_viewport(cmd, 0, &[viewport]);
            raw.cmd_set_scissor(cmd, 0, &[scissor]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gbuffer_clear_value_count() {
        // Albedo, normal, roughness, depth.
        assert_eq!(GBUFFER_COLOR_ATTACHMENTS + 1, 4);
    }

    #[test]
    fn test_indirect_stride_matches_vulkan_layout() {
        // Five u32/i32 fields.
        assert_eq!(INDIRECT_COMMAND_STRIDE, 20);
    }
}
