//! Scene ownership and per-frame culling
//!
//! The scene owns every loaded model, the unified geometry buffers their
//! meshes are merged into, and the opaque/transparent batch maps keyed by
//! material. Model-list mutations always trigger a full batch rebuild; the
//! per-frame work is the culling pass that writes each batch's visible
//! subset into the current frame's staging slot.

mod model;
mod plan;

pub use model::Model;
pub use plan::{BatchPlan, DrawSource, GeometryLayout, ModelOffsets};

use std::collections::HashMap;

use ash::{vk, Device};
use log::{debug, info};

use crate::foundation::math::{Mat4, Vec3, Vec4};
use crate::render::backends::vulkan::{Buffer, CommandPool, RenderDevice, VulkanResult};
use crate::render::batch::MaterialBatch;
use crate::render::culling::Frustum;
use crate::render::material::{MaterialKey, MaterialRegistry};
use crate::render::primitives::Vertex;

/// Errors from scene-level asset handling
///
/// All of these are recoverable: the offending model is not added and the
/// scene keeps operating on its prior state.
#[derive(thiserror::Error, Debug)]
pub enum SceneError {
    /// Loader produced a mesh without renderable geometry
    #[error("model '{name}' has no renderable geometry")]
    EmptyMesh {
        /// Name of the rejected model
        name: String,
    },

    /// A submesh range does not fit the mesh's index buffer
    #[error("model '{name}' submesh {submesh} range exceeds the index buffer")]
    InvalidSubmeshRange {
        /// Name of the rejected model
        name: String,
        /// Offending submesh
        submesh: u32,
    },

    /// An index references a vertex past the end of the vertex array
    #[error("model '{name}' submesh {submesh} indexes past the vertex array")]
    IndexOutOfBounds {
        /// Name of the rejected model
        name: String,
        /// Offending submesh
        submesh: u32,
    },
}

/// Tested/visible draw counters for one culling pass
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CullingStats {
    /// Draw descriptors tested against the frustum
    pub tested: u32,
    /// Descriptors that survived, before capacity clamping
    pub visible: u32,
}

/// Transparent depth sort samples at most this many vertices per batch
const DEPTH_SAMPLE_COUNT: usize = 10;

/// Owner of all loaded models and their material batches
pub struct Scene {
    models: Vec<Model>,
    opaque_batches: HashMap<Option<MaterialKey>, MaterialBatch>,
    transparent_batches: HashMap<Option<MaterialKey>, MaterialBatch>,

    unified_vertex_buffer: Option<Buffer>,
    unified_index_buffer: Option<Buffer>,

    frames_in_flight: usize,
    stats: Vec<CullingStats>,
}

impl Scene {
    /// Create an empty scene
    pub fn new(frames_in_flight: usize) -> Self {
        Self {
            models: Vec::new(),
            opaque_batches: HashMap::new(),
            transparent_batches: HashMap::new(),
            unified_vertex_buffer: None,
            unified_index_buffer: None,
            frames_in_flight,
            stats: vec![CullingStats::default(); frames_in_flight],
        }
    }

    /// Number of loaded models
    pub fn model_count(&self) -> usize {
        self.models.len()
    }

    /// Model by index
    pub fn model(&self, index: usize) -> Option<&Model> {
        self.models.get(index)
    }

    /// Whether a model with this name is loaded
    pub fn is_model_loaded(&self, name: &str) -> bool {
        self.models.iter().any(|m| m.name == name)
    }

    /// Place a model in the world
    ///
    /// Transforms feed culling and sorting every frame; they do not affect
    /// batch contents, so no rebuild happens here.
    pub fn set_model_transform(&mut self, name: &str, transform: Mat4) -> bool {
        match self.models.iter_mut().find(|m| m.name == name) {
            Some(model) => {
                model.set_transform(transform);
                true
            }
            None => false,
        }
    }

    /// Add a loaded model and rebuild the batches
    pub fn add_model(
        &mut self,
        device: &RenderDevice,
        transfer_pool: &CommandPool,
        materials: &MaterialRegistry,
        model: Model,
    ) -> VulkanResult<()> {
        info!(
            "Loading model '{}' from {} ({} submeshes)",
            model.name,
            model.source_path.display(),
            model.mesh.submesh_count()
        );

        self.models.push(model);
        info!("Model loaded (total models: {})", self.models.len());

        self.build_material_batches(device, transfer_pool, materials)
    }

    /// Remove a model by name and rebuild the batches
    ///
    /// Returns false when no model with this name is loaded.
    pub fn remove_model(
        &mut self,
        device: &RenderDevice,
        transfer_pool: &CommandPool,
        materials: &MaterialRegistry,
        name: &str,
    ) -> VulkanResult<bool> {
        let Some(position) = self.models.iter().position(|m| m.name == name) else {
            debug!("Model not found: {name}");
            return Ok(false);
        };

        self.models.remove(position);
        info!(
            "Removed model '{name}' (remaining models: {})",
            self.models.len()
        );

        self.build_material_batches(device, transfer_pool, materials)?;
        Ok(true)
    }

    /// Drop every model, batch, and unified buffer
    pub fn clear(&mut self) {
        self.opaque_batches.clear();
        self.transparent_batches.clear();
        self.unified_vertex_buffer = None;
        self.unified_index_buffer = None;
        self.models.clear();
        self.stats.fill(CullingStats::default());
        info!("Scene cleared");
    }

    /// Rebuild all batches and unified buffers from the current model list
    ///
    /// Always a full rebuild: existing batches and buffers are destroyed,
    /// per-model offsets are prefix-summed in model-list order, geometry is
    /// concatenated into fresh unified buffers, every submesh is routed
    /// into an opaque or transparent batch by its resolved material's
    /// transparency flag, and every resulting batch gets its per-frame
    /// indirect arrays.
    pub fn build_material_batches(
        &mut self,
        device: &RenderDevice,
        transfer_pool: &CommandPool,
        materials: &MaterialRegistry,
    ) -> VulkanResult<()> {
        let layout = self.rebuild_cpu(materials);

        if layout.is_empty() {
            debug!("No geometry to batch");
            return Ok(());
        }

        self.build_unified_buffers(device, transfer_pool, &layout)?;

        for batch in self
            .opaque_batches
            .values_mut()
            .chain(self.transparent_batches.values_mut())
        {
            batch.allocate_buffers(device)?;
        }

        info!(
            "Built {} opaque / {} transparent batches ({} vertices, {} indices)",
            self.opaque_batches.len(),
            self.transparent_batches.len(),
            layout.total_vertices,
            layout.total_indices
        );
        Ok(())
    }

    /// CPU half of a rebuild: tear down, re-plan, and rebuild descriptors
    ///
    /// Returns the geometry layout so the caller can upload the unified
    /// buffers when there is anything to upload.
    fn rebuild_cpu(&mut self, materials: &MaterialRegistry) -> GeometryLayout {
        self.opaque_batches.clear();
        self.transparent_batches.clear();
        self.unified_vertex_buffer = None;
        self.unified_index_buffer = None;

        let layout = plan::layout_models(&self.models);
        if layout.is_empty() {
            return layout;
        }

        let routing = plan::plan_batches(&self.models, materials);

        for (map, routed) in [
            (&mut self.opaque_batches, routing.opaque),
            (&mut self.transparent_batches, routing.transparent),
        ] {
            for (key, sources) in routed {
                let mut batch = MaterialBatch::new(key, self.frames_in_flight);
                for source in sources {
                    let offsets = layout.offsets[source.model_index];
                    batch.add_draw_with_offsets(
                        &self.models[source.model_index].mesh,
                        source.submesh_index,
                        source.model_index,
                        offsets.vertex_offset,
                        offsets.index_offset,
                    );
                }
                map.insert(key, batch);
            }
        }

        layout
    }

    /// Concatenate every model's geometry and upload the unified buffers
    fn build_unified_buffers(
        &mut self,
        device: &RenderDevice,
        transfer_pool: &CommandPool,
        layout: &GeometryLayout,
    ) -> VulkanResult<()> {
        let mut all_vertices: Vec<Vertex> = Vec::with_capacity(layout.total_vertices as usize);
        let mut all_indices: Vec<u32> = Vec::with_capacity(layout.total_indices as usize);

        for model in &self.models {
            all_vertices.extend_from_slice(&model.mesh.vertices);
            all_indices.extend_from_slice(&model.mesh.indices);
        }

        self.unified_vertex_buffer = Some(Buffer::new_device_local_with_data(
            device,
            transfer_pool,
            vk::BufferUsageFlags::VERTEX_BUFFER,
            &all_vertices,
        )?);
        self.unified_index_buffer = Some(Buffer::new_device_local_with_data(
            device,
            transfer_pool,
            vk::BufferUsageFlags::INDEX_BUFFER,
            &all_indices,
        )?);

        debug!(
            "Created unified buffers: {} vertices, {} indices",
            all_vertices.len(),
            all_indices.len()
        );
        Ok(())
    }

    /// Whether the unified buffers are currently allocated
    pub fn has_unified_buffers(&self) -> bool {
        self.unified_vertex_buffer.is_some()
    }

    /// Bind the unified vertex/index buffer pair
    ///
    /// Precondition for any draw; called once per pass. There is no
    /// per-batch geometry binding: every draw indexes into these two
    /// buffers.
    pub fn bind_unified_buffers(&self, device: &Device, cmd: vk::CommandBuffer) {
        let (Some(vertex_buffer), Some(index_buffer)) =
            (&self.unified_vertex_buffer, &self.unified_index_buffer)
        else {
            return;
        };

        unsafe {
            device.cmd_bind_vertex_buffers(cmd, 0, &[vertex_buffer.handle()], &[0]);
            device.cmd_bind_index_buffer(cmd, index_buffer.handle(), 0, vk::IndexType::UINT32);
        }
    }

    /// Opaque batches keyed by material
    pub fn opaque_batches(&self) -> &HashMap<Option<MaterialKey>, MaterialBatch> {
        &self.opaque_batches
    }

    /// Transparent batches keyed by material
    pub fn transparent_batches(&self) -> &HashMap<Option<MaterialKey>, MaterialBatch> {
        &self.transparent_batches
    }

    /// Whether any transparent batch exists
    pub fn has_transparent_objects(&self) -> bool {
        !self.transparent_batches.is_empty()
    }

    /// Culling counters recorded for a frame slot
    pub fn culling_stats(&self, frame_index: usize) -> CullingStats {
        self.stats[frame_index]
    }

    /// Run the frustum culling pass for one frame slot
    ///
    /// Extracts the frustum once, tests every draw descriptor's submesh
    /// bounds under the owning model's current transform (opaque batches
    /// first, then transparent), and hands each batch its surviving command
    /// list. Ordering within a batch is descriptor insertion order.
    pub fn update_culling(&mut self, view_proj: &Mat4, frame_index: usize) -> VulkanResult<()> {
        let frustum = Frustum::from_view_proj(view_proj);

        let mut tested = 0u32;
        let mut visible_total = 0u32;

        let models = &self.models;
        for batch in self
            .opaque_batches
            .values_mut()
            .chain(self.transparent_batches.values_mut())
        {
            let mut visible = Vec::with_capacity(batch.draws().len());
            for draw in batch.draws() {
                tested += 1;
                let model = &models[draw.model_index];
                let bounds = &model.submesh_bounds[draw.submesh_index as usize];
                if frustum.test_aabb(bounds, &model.transform) {
                    visible.push(draw.command);
                }
            }

            visible_total += visible.len() as u32;
            batch.update_visible_commands(frame_index, &visible)?;
        }

        self.stats[frame_index] = CullingStats {
            tested,
            visible: visible_total,
        };
        Ok(())
    }

    /// Record every batch's staging to device-local copy for a frame
    ///
    /// Must be recorded before the geometry pass consumes the indirect
    /// buffers; batches with a zero visible count record nothing.
    pub fn record_indirect_copies(
        &self,
        device: &Device,
        cmd: vk::CommandBuffer,
        frame_index: usize,
    ) {
        for batch in self
            .opaque_batches
            .values()
            .chain(self.transparent_batches.values())
        {
            batch.record_buffer_copy(device, cmd, frame_index);
        }
    }

    /// Transparent batches ordered back-to-front
    ///
    /// The sort key is an approximate depth: up to ten evenly spaced
    /// vertices of the batch's first draw's submesh, averaged, taken to
    /// world space and projected; clip-space z/w, decreasing. This is a
    /// batch-granularity ordering; a single material spanning widely
    /// separated transparent objects can sort wrong, which is accepted.
    pub fn sorted_transparent_batches(
        &self,
        view_proj: &Mat4,
    ) -> Vec<(Option<MaterialKey>, &MaterialBatch)> {
        let mut entries: Vec<_> = self
            .transparent_batches
            .iter()
            .filter_map(|(key, batch)| {
                self.batch_depth(batch, view_proj)
                    .map(|depth| (*key, batch, depth))
            })
            .collect();

        entries.sort_by(|a, b| b.2.total_cmp(&a.2));
        entries
            .into_iter()
            .map(|(key, batch, _)| (key, batch))
            .collect()
    }

    /// Approximate clip-space depth of a batch's first draw
    fn batch_depth(&self, batch: &MaterialBatch, view_proj: &Mat4) -> Option<f32> {
        let draw = batch.draws().first()?;
        let model = &self.models[draw.model_index];
        let submesh = model.mesh.submesh(draw.submesh_index);

        let start = submesh.index_offset as usize;
        let end = start + submesh.index_count as usize;
        let indices = &model.mesh.indices[start..end];
        if indices.is_empty() {
            return None;
        }

        let step = (indices.len() / DEPTH_SAMPLE_COUNT).max(1);
        let mut sum = Vec3::zeros();
        let mut samples = 0usize;
        let mut i = 0usize;
        while i < indices.len() && samples < DEPTH_SAMPLE_COUNT {
            sum += Vec3::from(model.mesh.vertices[indices[i] as usize].position);
            samples += 1;
            i += step;
        }

        let centroid = sum / samples as f32;
        let world = model.transform * Vec4::new(centroid.x, centroid.y, centroid.z, 1.0);
        let clip = view_proj * world;

        Some(if clip.w.abs() > f32::EPSILON {
            clip.z / clip.w
        } else {
            clip.z
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::material::Material;
    use crate::render::primitives::{MeshData, SubMesh, Vertex};
    use crate::render::MAX_FRAMES_IN_FLIGHT;

    fn quad_at(z: f32, material: &str) -> MeshData {
        let vertices = vec![
            Vertex::new([-1.0, -1.0, z], [0.0, 0.0, 1.0], [0.0, 0.0]),
            Vertex::new([1.0, -1.0, z], [0.0, 0.0, 1.0], [1.0, 0.0]),
            Vertex::new([1.0, 1.0, z], [0.0, 0.0, 1.0], [1.0, 1.0]),
            Vertex::new([-1.0, 1.0, z], [0.0, 0.0, 1.0], [0.0, 1.0]),
        ];
        MeshData::new(
            vertices,
            vec![0, 1, 2, 2, 3, 0],
            vec![SubMesh::new(0, 6, material)],
        )
    }

    /// Rebuild descriptors without a device; batches stay unallocated so
    /// visible counts are pinned at zero, but planning, routing, sorting,
    /// and the culling scan are all exercised for real.
    fn scene_with_models(models: Vec<Model>, materials: &MaterialRegistry) -> Scene {
        let mut scene = Scene::new(MAX_FRAMES_IN_FLIGHT);
        scene.models = models;
        scene.rebuild_cpu(materials);
        scene
    }

    #[test]
    fn test_empty_scene_culls_nothing_without_faulting() {
        let mut scene = Scene::new(MAX_FRAMES_IN_FLIGHT);

        scene.update_culling(&Mat4::identity(), 0).unwrap();

        assert_eq!(scene.culling_stats(0), CullingStats::default());
        assert!(scene.opaque_batches().is_empty());
        assert!(scene.transparent_batches().is_empty());
        assert!(!scene.has_unified_buffers());
        assert!(!scene.has_transparent_objects());
    }

    #[test]
    fn test_culling_counts_only_boxes_in_frustum() {
        let materials = MaterialRegistry::new();

        let near = Model::new("near", "assets/near", quad_at(0.0, "default")).unwrap();
        let mut far = Model::new("far", "assets/far", quad_at(0.0, "default")).unwrap();
        // Push the second quad far outside a [-10, 10] ortho volume.
        far.set_transform(Mat4::new_translation(&Vec3::new(100.0, 0.0, 0.0)));

        let mut scene = scene_with_models(vec![near, far], &materials);

        let view_proj = Mat4::new_orthographic(-10.0, 10.0, -10.0, 10.0, -10.0, 10.0);
        scene.update_culling(&view_proj, 0).unwrap();

        let stats = scene.culling_stats(0);
        assert_eq!(stats.tested, 2);
        assert_eq!(stats.visible, 1);
    }

    #[test]
    fn test_visible_never_exceeds_tested() {
        let materials = MaterialRegistry::new();
        let models = (0..5)
            .map(|i| Model::new(format!("m{i}"), "assets/m", quad_at(0.0, "default")).unwrap())
            .collect();

        let mut scene = scene_with_models(models, &materials);
        let view_proj = Mat4::new_orthographic(-10.0, 10.0, -10.0, 10.0, -10.0, 10.0);
        scene.update_culling(&view_proj, 1).unwrap();

        let stats = scene.culling_stats(1);
        assert_eq!(stats.tested, 5);
        assert!(stats.visible <= stats.tested);

        // Slot 0 was never culled this run and keeps its own counters.
        assert_eq!(scene.culling_stats(0), CullingStats::default());
    }

    #[test]
    fn test_batches_partition_all_submeshes() {
        let mut materials = MaterialRegistry::new();
        materials.insert(Material::new("stone"));
        materials.insert(Material::new("glass").with_dissolve(0.5));

        let mesh = MeshData::new(
            quad_at(0.0, "stone").vertices,
            vec![0, 1, 2, 2, 3, 0],
            vec![SubMesh::new(0, 3, "stone"), SubMesh::new(3, 3, "glass")],
        );
        let model = Model::new("mixed", "assets/mixed", mesh).unwrap();
        let scene = scene_with_models(vec![model], &materials);

        let opaque: u32 = scene.opaque_batches().values().map(MaterialBatch::draw_count).sum();
        let transparent: u32 = scene
            .transparent_batches()
            .values()
            .map(MaterialBatch::draw_count)
            .sum();

        assert_eq!(opaque, 1);
        assert_eq!(transparent, 1);
        assert!(scene.has_transparent_objects());
    }

    #[test]
    fn test_transparent_batches_sort_back_to_front() {
        let mut materials = MaterialRegistry::new();
        let a = materials.insert(Material::new("a").with_dissolve(0.5));
        let b = materials.insert(Material::new("b").with_dissolve(0.5));
        let c = materials.insert(Material::new("c").with_dissolve(0.5));

        // Identity view-projection: clip z/w is just the quad's z.
        let models = vec![
            Model::new("a", "assets/a", quad_at(0.3, "a")).unwrap(),
            Model::new("b", "assets/b", quad_at(0.9, "b")).unwrap(),
            Model::new("c", "assets/c", quad_at(0.6, "c")).unwrap(),
        ];
        let scene = scene_with_models(models, &materials);

        let sorted = scene.sorted_transparent_batches(&Mat4::identity());
        let order: Vec<_> = sorted.iter().map(|(key, _)| *key).collect();

        // Farther first: depths 0.9, 0.6, 0.3.
        assert_eq!(order, vec![Some(b), Some(c), Some(a)]);
    }

    #[test]
    fn test_rebuild_is_idempotent() {
        let materials = MaterialRegistry::new();
        let models = vec![
            Model::new("a", "assets/a", quad_at(0.0, "default")).unwrap(),
            Model::new("b", "assets/b", quad_at(1.0, "default")).unwrap(),
        ];
        let mut scene = scene_with_models(models, &materials);

        let first: Vec<u32> = scene.opaque_batches().values().map(MaterialBatch::draw_count).collect();
        let first_layout = plan::layout_models(&scene.models);

        scene.rebuild_cpu(&materials);

        let second: Vec<u32> = scene.opaque_batches().values().map(MaterialBatch::draw_count).collect();
        let second_layout = plan::layout_models(&scene.models);

        assert_eq!(first, second);
        assert_eq!(first_layout, second_layout);
    }

    #[test]
    fn test_clear_resets_everything() {
        let materials = MaterialRegistry::new();
        let model = Model::new("a", "assets/a", quad_at(0.0, "default")).unwrap();
        let mut scene = scene_with_models(vec![model], &materials);
        assert_eq!(scene.model_count(), 1);

        scene.clear();

        assert_eq!(scene.model_count(), 0);
        assert!(scene.opaque_batches().is_empty());
        assert!(scene.transparent_batches().is_empty());
        assert!(!scene.has_unified_buffers());
    }

    #[test]
    fn test_set_model_transform_by_name() {
        let materials = MaterialRegistry::new();
        let model = Model::new("crate", "assets/crate", quad_at(0.0, "default")).unwrap();
        let mut scene = scene_with_models(vec![model], &materials);

        let placed = Mat4::new_translation(&Vec3::new(3.0, 0.0, 0.0));
        assert!(scene.set_model_transform("crate", placed));
        assert!(!scene.set_model_transform("missing", placed));
        assert_eq!(scene.model(0).unwrap().transform, placed);
    }
}
