//! Pure planning step of a batch rebuild
//!
//! Computes unified-buffer offsets and the material routing for the current
//! model list without touching the GPU. The scene applies the plan by
//! building descriptor lists and allocating buffers; keeping this step pure
//! makes offset math and batch partitioning directly testable.

use std::collections::HashMap;

use crate::render::material::{MaterialKey, MaterialRegistry};

use super::model::Model;

/// Start offsets of one model's geometry in the unified buffers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelOffsets {
    /// First vertex of the model in the unified vertex buffer
    pub vertex_offset: u32,
    /// First index of the model in the unified index buffer
    pub index_offset: u32,
}

/// Prefix-summed layout of every model in the unified buffers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeometryLayout {
    /// Per-model start offsets, in model-list order
    pub offsets: Vec<ModelOffsets>,
    /// Total vertex count across all models
    pub total_vertices: u32,
    /// Total index count across all models
    pub total_indices: u32,
}

impl GeometryLayout {
    /// Whether there is any geometry to batch
    pub fn is_empty(&self) -> bool {
        self.total_vertices == 0 || self.total_indices == 0
    }
}

/// Compute unified-buffer offsets by prefix-summing geometry sizes in
/// model-list order
pub fn layout_models(models: &[Model]) -> GeometryLayout {
    let mut offsets = Vec::with_capacity(models.len());
    let mut total_vertices = 0u32;
    let mut total_indices = 0u32;

    for model in models {
        offsets.push(ModelOffsets {
            vertex_offset: total_vertices,
            index_offset: total_indices,
        });
        total_vertices += model.mesh.vertex_count();
        total_indices += model.mesh.index_count();
    }

    GeometryLayout {
        offsets,
        total_vertices,
        total_indices,
    }
}

/// One submesh routed into a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawSource {
    /// Index of the owning model in the scene's model list
    pub model_index: usize,
    /// Submesh within the owning model's mesh
    pub submesh_index: u32,
}

/// Material routing for every submesh of every model
///
/// Each submesh lands in exactly one of the two maps, decided solely by the
/// resolved material's transparency flag; unresolved names fall back to the
/// `None` key (default appearance, opaque). Within a batch, sources keep
/// model-list order then submesh order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BatchPlan {
    /// Submeshes rendered in the G-buffer pass
    pub opaque: HashMap<Option<MaterialKey>, Vec<DrawSource>>,
    /// Submeshes rendered in the forward transparency pass
    pub transparent: HashMap<Option<MaterialKey>, Vec<DrawSource>>,
}

/// Route every submesh into an opaque or transparent batch
pub fn plan_batches(models: &[Model], materials: &MaterialRegistry) -> BatchPlan {
    let mut plan = BatchPlan::default();

    for (model_index, model) in models.iter().enumerate() {
        for submesh_index in 0..model.mesh.submesh_count() {
            let name = model.mesh.material_name(submesh_index);
            let key = materials.resolve(name);

            let map = if materials.is_transparent(key) {
                &mut plan.transparent
            } else {
                &mut plan.opaque
            };

            map.entry(key).or_default().push(DrawSource {
                model_index,
                submesh_index,
            });
        }
    }

    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::material::Material;
    use crate::render::primitives::{MeshData, SubMesh, Vertex};

    fn flat_mesh(vertex_count: u32, index_count: u32, material: &str) -> MeshData {
        let vertices =
            vec![Vertex::new([0.0; 3], [0.0, 1.0, 0.0], [0.0; 2]); vertex_count as usize];
        let indices: Vec<u32> = (0..index_count).map(|i| i % vertex_count).collect();
        MeshData::new(vertices, indices, vec![SubMesh::new(0, index_count, material)])
    }

    fn model(name: &str, mesh: MeshData) -> Model {
        Model::new(name, format!("assets/{name}"), mesh).unwrap()
    }

    #[test]
    fn test_layout_prefix_sums_in_load_order() {
        let models = vec![
            model("a", flat_mesh(300, 600, "stone")),
            model("b", flat_mesh(150, 300, "stone")),
        ];

        let layout = layout_models(&models);
        assert_eq!(layout.offsets.len(), 2);
        assert_eq!(
            layout.offsets[0],
            ModelOffsets {
                vertex_offset: 0,
                index_offset: 0
            }
        );
        // B starts exactly where A's geometry ends.
        assert_eq!(
            layout.offsets[1],
            ModelOffsets {
                vertex_offset: 300,
                index_offset: 600
            }
        );
        assert_eq!(layout.total_vertices, 450);
        assert_eq!(layout.total_indices, 900);
    }

    #[test]
    fn test_layout_empty_model_list() {
        let layout = layout_models(&[]);
        assert!(layout.is_empty());
        assert!(layout.offsets.is_empty());
    }

    #[test]
    fn test_partition_by_transparency_flag() {
        let mut materials = MaterialRegistry::new();
        let stone = materials.insert(Material::new("stone"));
        let glass = materials.insert(Material::new("glass").with_dissolve(0.5));

        let mesh = MeshData::new(
            flat_mesh(4, 6, "stone").vertices,
            vec![0, 1, 2, 2, 3, 0, 0, 2, 3],
            vec![
                SubMesh::new(0, 6, "stone"),
                SubMesh::new(6, 3, "glass"),
                SubMesh::new(6, 3, "unknown"),
            ],
        );
        let models = vec![model("a", mesh)];

        let plan = plan_batches(&models, &materials);

        // Every submesh lands in exactly one map.
        let opaque_draws: usize = plan.opaque.values().map(Vec::len).sum();
        let transparent_draws: usize = plan.transparent.values().map(Vec::len).sum();
        assert_eq!(opaque_draws + transparent_draws, 3);

        assert_eq!(plan.opaque[&Some(stone)].len(), 1);
        assert_eq!(plan.transparent[&Some(glass)].len(), 1);
        // Unresolved names fall back to the default key, opaque side.
        assert_eq!(plan.opaque[&None].len(), 1);
        assert!(!plan.transparent.contains_key(&None));
    }

    #[test]
    fn test_planning_is_idempotent() {
        let mut materials = MaterialRegistry::new();
        materials.insert(Material::new("stone"));
        materials.insert(Material::new("glass").with_dissolve(0.5));

        let models = vec![
            model("a", flat_mesh(300, 600, "stone")),
            model("b", flat_mesh(150, 300, "glass")),
        ];

        let first = (layout_models(&models), plan_batches(&models, &materials));
        let second = (layout_models(&models), plan_batches(&models, &materials));

        assert_eq!(first.0, second.0);
        assert_eq!(first.1, second.1);
    }
}
