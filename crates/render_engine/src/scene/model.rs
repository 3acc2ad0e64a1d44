//! Loaded model instances

use std::path::PathBuf;

use crate::foundation::math::Mat4;
use crate::render::primitives::{Aabb, MeshData};

use super::SceneError;

/// One loaded asset instance, owned by the scene
///
/// Carries the CPU geometry the loader produced, a per-submesh list of
/// local-space bounding boxes for culling, and the model's world transform
/// (identity until the model is explicitly placed).
#[derive(Debug, Clone)]
pub struct Model {
    /// CPU geometry supplied by the external loader
    pub mesh: MeshData,

    /// Model name, unique within a scene
    pub name: String,

    /// Path the asset was loaded from
    pub source_path: PathBuf,

    /// Local-space bounding box per submesh, computed from raw geometry
    pub submesh_bounds: Vec<Aabb>,

    /// World transform
    pub transform: Mat4,
}

impl Model {
    /// Build a model from loader output, validating the geometry
    ///
    /// Bounding boxes are computed here, once, from the raw vertex data;
    /// culling re-bounds them under the current transform every frame.
    /// Malformed geometry (no vertices/indices, a submesh range outside the
    /// index buffer, or an index outside the vertex array) fails the load
    /// without touching the scene.
    pub fn new(
        name: impl Into<String>,
        source_path: impl Into<PathBuf>,
        mesh: MeshData,
    ) -> Result<Self, SceneError> {
        let name = name.into();

        if mesh.is_empty() {
            return Err(SceneError::EmptyMesh { name });
        }

        let mut submesh_bounds = Vec::with_capacity(mesh.submeshes.len());
        for (i, submesh) in mesh.submeshes.iter().enumerate() {
            let start = submesh.index_offset as usize;
            let end = start + submesh.index_count as usize;
            if end > mesh.indices.len() || submesh.index_count == 0 {
                return Err(SceneError::InvalidSubmeshRange {
                    name,
                    submesh: i as u32,
                });
            }

            let range = &mesh.indices[start..end];
            if range.iter().any(|&idx| idx as usize >= mesh.vertices.len()) {
                return Err(SceneError::IndexOutOfBounds {
                    name,
                    submesh: i as u32,
                });
            }

            // Range checked non-empty above, so bounds always exist.
            let bounds = Aabb::from_indexed_range(&mesh.vertices, range).ok_or_else(|| {
                SceneError::InvalidSubmeshRange {
                    name: name.clone(),
                    submesh: i as u32,
                }
            })?;
            submesh_bounds.push(bounds);
        }

        Ok(Self {
            mesh,
            name,
            source_path: source_path.into(),
            submesh_bounds,
            transform: Mat4::identity(),
        })
    }

    /// Place the model in the world
    pub fn set_transform(&mut self, transform: Mat4) {
        self.transform = transform;
    }
}
