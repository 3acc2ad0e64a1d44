//! Per-material indirect draw batches
//!
//! Each batch groups every draw that shares one material and owns the GPU
//! side of the visibility scheme: one host-visible staging array and one
//! device-local indirect command array per in-flight frame. Culling writes
//! the surviving subset into the staging slot; the frame recorder copies it
//! to the device-local array with a barrier and issues a single indirect
//! draw over it.

use ash::{vk, Device};
use log::warn;

use super::backends::vulkan::{
    indirect_read_barrier, Buffer, RenderDevice, VulkanResult,
};
use super::material::MaterialKey;
use super::primitives::MeshData;

/// Byte stride of one indirect command
pub const INDIRECT_COMMAND_STRIDE: u32 = std::mem::size_of::<vk::DrawIndexedIndirectCommand>() as u32;

/// One renderable unit inside a batch
///
/// The command is precomputed at batch-build time with the unified buffer's
/// global offsets baked in; culling appends it verbatim when the draw
/// survives. The model back-reference is an index, not a pointer: any
/// model-list mutation forces a full batch rebuild, so it can never dangle.
#[derive(Debug, Clone, Copy)]
pub struct DrawDescriptor {
    /// Index of the owning model in the scene's model list
    pub model_index: usize,

    /// Submesh within the owning model's mesh
    pub submesh_index: u32,

    /// Precomputed indexed-draw command
    pub command: vk::DrawIndexedIndirectCommand,
}

/// GPU-resident state, created once geometry is finalized
struct BatchBuffers {
    /// Fixed command capacity, equal to the descriptor count at build time
    capacity: u32,
    /// One (staging, device-local) pair per in-flight frame
    slots: Vec<FrameSlot>,
}

struct FrameSlot {
    staging: Buffer,
    device_local: Buffer,
}

/// All draws sharing one material, plus their double-buffered visibility data
pub struct MaterialBatch {
    material: Option<MaterialKey>,
    draws: Vec<DrawDescriptor>,
    buffers: Option<BatchBuffers>,
    visible_counts: Vec<u32>,
}

impl MaterialBatch {
    /// Create an empty batch for a material (None = default appearance)
    pub fn new(material: Option<MaterialKey>, frames_in_flight: usize) -> Self {
        Self {
            material,
            draws: Vec::new(),
            buffers: None,
            visible_counts: vec![0; frames_in_flight],
        }
    }

    /// Material key this batch is grouped under
    pub fn material(&self) -> Option<MaterialKey> {
        self.material
    }

    /// Draw descriptors in insertion order
    pub fn draws(&self) -> &[DrawDescriptor] {
        &self.draws
    }

    /// Total number of draw descriptors
    pub fn draw_count(&self) -> u32 {
        self.draws.len() as u32
    }

    /// Visible commands recorded for a frame slot
    pub fn visible_count(&self, frame_index: usize) -> u32 {
        self.visible_counts[frame_index]
    }

    /// Device-local indirect buffer for a frame slot, if allocated
    pub fn indirect_buffer(&self, frame_index: usize) -> Option<vk::Buffer> {
        self.buffers
            .as_ref()
            .map(|b| b.slots[frame_index].device_local.handle())
    }

    /// Append one draw descriptor
    ///
    /// The indexed-draw command's first index is the submesh's local offset
    /// plus the caller's global index offset (the mesh's placement in the
    /// unified index buffer); the base vertex is the global vertex offset.
    /// CPU-side only; GPU resources are created later by
    /// [`allocate_buffers`](Self::allocate_buffers).
    ///
    /// Panics if `submesh_index` is out of range for `mesh`; that is a
    /// batch/model desynchronization bug.
    pub fn add_draw_with_offsets(
        &mut self,
        mesh: &MeshData,
        submesh_index: u32,
        model_index: usize,
        global_vertex_offset: u32,
        global_index_offset: u32,
    ) {
        let submesh = mesh.submesh(submesh_index);

        let command = vk::DrawIndexedIndirectCommand {
            index_count: submesh.index_count,
            instance_count: 1,
            first_index: submesh.index_offset + global_index_offset,
            vertex_offset: global_vertex_offset as i32,
            first_instance: 0,
        };

        self.draws.push(DrawDescriptor {
            model_index,
            submesh_index,
            command,
        });
    }

    /// Allocate the per-frame staging and device-local command arrays
    ///
    /// Called once per build pass after all draws are added. Capacity is
    /// fixed to the descriptor count (the maximum possible visible set),
    /// so visibility updates never reallocate. A batch with zero draws
    /// allocates nothing and is skipped during rendering.
    pub fn allocate_buffers(&mut self, device: &RenderDevice) -> VulkanResult<()> {
        let capacity = self.draws.len() as u32;
        if capacity == 0 {
            self.buffers = None;
            return Ok(());
        }

        let size = vk::DeviceSize::from(capacity * INDIRECT_COMMAND_STRIDE);
        let mut slots = Vec::with_capacity(self.visible_counts.len());
        for _ in 0..self.visible_counts.len() {
            let staging =
                Buffer::new_host_visible(device, size, vk::BufferUsageFlags::TRANSFER_SRC)?;
            let device_local = Buffer::new(
                device,
                size,
                vk::BufferUsageFlags::INDIRECT_BUFFER | vk::BufferUsageFlags::TRANSFER_DST,
                vk::MemoryPropertyFlags::DEVICE_LOCAL,
            )?;
            slots.push(FrameSlot {
                staging,
                device_local,
            });
        }

        self.buffers = Some(BatchBuffers { capacity, slots });
        self.visible_counts.fill(0);
        Ok(())
    }

    /// Write the culled command list into a frame's staging slot
    ///
    /// Requests beyond the allocated capacity are clamped; capacity is
    /// fixed at build time and already covers every descriptor, so a larger
    /// request can only come from a stale caller. Zero commands record a
    /// visible count of zero and the batch contributes nothing that frame.
    /// Before [`allocate_buffers`](Self::allocate_buffers) has run the
    /// visible count is silently zeroed: a batch without geometry has
    /// nothing to draw.
    pub fn update_visible_commands(
        &mut self,
        frame_index: usize,
        commands: &[vk::DrawIndexedIndirectCommand],
    ) -> VulkanResult<()> {
        let Some(buffers) = self.buffers.as_ref() else {
            self.visible_counts[frame_index] = 0;
            return Ok(());
        };

        let mut count = commands.len();
        if count > buffers.capacity as usize {
            warn!(
                "visible command list ({count}) exceeds batch capacity ({}); clamping",
                buffers.capacity
            );
            count = buffers.capacity as usize;
        }

        if count > 0 {
            buffers.slots[frame_index]
                .staging
                .write_data(&commands[..count])?;
        }

        self.visible_counts[frame_index] = count as u32;
        Ok(())
    }

    /// Record the staging to device-local copy for a frame
    ///
    /// Copies exactly the visible subset, not the full capacity, then
    /// issues a transfer-write to indirect-read barrier over the copied
    /// region. A zero visible count records nothing at all.
    pub fn record_buffer_copy(&self, device: &Device, cmd: vk::CommandBuffer, frame_index: usize) {
        let visible = self.visible_counts[frame_index];
        if visible == 0 {
            return;
        }

        let Some(buffers) = self.buffers.as_ref() else {
            return;
        };
        let slot = &buffers.slots[frame_index];
        let size = vk::DeviceSize::from(visible * INDIRECT_COMMAND_STRIDE);

        let copy_region = vk::BufferCopy::builder().size(size).build();
        unsafe {
            device.cmd_copy_buffer(
                cmd,
                slot.staging.handle(),
                slot.device_local.handle(),
                &[copy_region],
            );
        }

        indirect_read_barrier(device, cmd, slot.device_local.handle(), size);
    }

    /// Drop GPU resources and descriptors ahead of a rebuild
    pub fn clear(&mut self) {
        self.buffers = None;
        self.draws.clear();
        self.visible_counts.fill(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::primitives::{SubMesh, Vertex};

    fn mesh_with_submeshes(submeshes: Vec<SubMesh>) -> MeshData {
        let vertices = vec![Vertex::new([0.0; 3], [0.0, 1.0, 0.0], [0.0; 2]); 4];
        MeshData::new(vertices, vec![0, 1, 2, 2, 3, 0], submeshes)
    }

    #[test]
    fn test_add_draw_bakes_global_offsets() {
        let mesh = mesh_with_submeshes(vec![SubMesh::new(6, 12, "stone")]);
        let mut batch = MaterialBatch::new(None, 2);

        batch.add_draw_with_offsets(&mesh, 0, 3, 300, 600);

        assert_eq!(batch.draw_count(), 1);
        let draw = &batch.draws()[0];
        assert_eq!(draw.model_index, 3);
        assert_eq!(draw.submesh_index, 0);
        assert_eq!(draw.command.index_count, 12);
        assert_eq!(draw.command.first_index, 606);
        assert_eq!(draw.command.vertex_offset, 300);
        assert_eq!(draw.command.instance_count, 1);
        assert_eq!(draw.command.first_instance, 0);
    }

    #[test]
    fn test_update_before_allocation_records_zero() {
        let mut batch = MaterialBatch::new(None, 2);

        let command = vk::DrawIndexedIndirectCommand {
            index_count: 3,
            instance_count: 1,
            first_index: 0,
            vertex_offset: 0,
            first_instance: 0,
        };

        batch.update_visible_commands(0, &[command]).unwrap();
        assert_eq!(batch.visible_count(0), 0);
        assert_eq!(batch.visible_count(1), 0);
    }

    #[test]
    fn test_frame_slots_track_counts_independently() {
        let mut batch = MaterialBatch::new(None, 2);
        assert_eq!(batch.visible_counts.len(), 2);

        // Without allocation both slots stay pinned at zero regardless of
        // which one is written.
        batch.update_visible_commands(1, &[]).unwrap();
        assert_eq!(batch.visible_count(0), 0);
        assert_eq!(batch.visible_count(1), 0);
    }

    #[test]
    #[should_panic]
    fn test_add_draw_with_bad_submesh_panics() {
        let mesh = mesh_with_submeshes(vec![SubMesh::new(0, 6, "stone")]);
        let mut batch = MaterialBatch::new(None, 2);
        batch.add_draw_with_offsets(&mesh, 5, 0, 0, 0);
    }
}
