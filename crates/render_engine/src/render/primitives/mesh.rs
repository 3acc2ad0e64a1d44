//! CPU-side mesh data supplied by the asset loader
//!
//! The engine never parses model files itself; loaders hand over a
//! [`MeshData`] with vertex/index arrays and per-submesh material names,
//! and the scene takes it from there.

use super::vertex::Vertex;

/// A contiguous index range within a mesh sharing one material
///
/// Immutable once parsed; offsets are local to the owning mesh's index
/// buffer and are rebased when the scene builds its unified buffers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubMesh {
    /// First index of the range, relative to the mesh's own index buffer
    pub index_offset: u32,

    /// Number of indices in the range
    pub index_count: u32,

    /// Material name to resolve against the material registry
    pub material: String,
}

impl SubMesh {
    /// Create a submesh range
    pub fn new(index_offset: u32, index_count: u32, material: impl Into<String>) -> Self {
        Self {
            index_offset,
            index_count,
            material: material.into(),
        }
    }
}

/// Geometry for one loaded model
#[derive(Debug, Clone, Default)]
pub struct MeshData {
    /// Vertex data
    pub vertices: Vec<Vertex>,

    /// Index data for triangles
    pub indices: Vec<u32>,

    /// Submesh ranges, each bound to one material
    pub submeshes: Vec<SubMesh>,
}

impl MeshData {
    /// Create a mesh from raw arrays
    pub fn new(vertices: Vec<Vertex>, indices: Vec<u32>, submeshes: Vec<SubMesh>) -> Self {
        Self {
            vertices,
            indices,
            submeshes,
        }
    }

    /// Number of vertices
    pub fn vertex_count(&self) -> u32 {
        self.vertices.len() as u32
    }

    /// Total number of indices across all submeshes
    pub fn index_count(&self) -> u32 {
        self.indices.len() as u32
    }

    /// Number of submeshes
    pub fn submesh_count(&self) -> u32 {
        self.submeshes.len() as u32
    }

    /// Submesh by index
    ///
    /// Panics if `index` is out of range; an out-of-range submesh index
    /// indicates a batch/model desynchronization bug, not a recoverable
    /// condition.
    pub fn submesh(&self, index: u32) -> &SubMesh {
        &self.submeshes[index as usize]
    }

    /// Material name bound to a submesh
    pub fn material_name(&self, submesh_index: u32) -> &str {
        &self.submeshes[submesh_index as usize].material
    }

    /// Whether the mesh carries any renderable geometry
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty() || self.indices.is_empty()
    }

    /// Test cube centered at the origin with one submesh
    ///
    /// Unit half-extent, outward normals, one material over all six faces.
    /// Intended for tests and debugging.
    pub fn cube(material: &str) -> Self {
        let vertices = vec![
            // Front face
            Vertex::new([-1.0, -1.0, 1.0], [0.0, 0.0, 1.0], [0.0, 0.0]),
            Vertex::new([1.0, -1.0, 1.0], [0.0, 0.0, 1.0], [1.0, 0.0]),
            Vertex::new([1.0, 1.0, 1.0], [0.0, 0.0, 1.0], [1.0, 1.0]),
            Vertex::new([-1.0, 1.0, 1.0], [0.0, 0.0, 1.0], [0.0, 1.0]),
            // Back face
            Vertex::new([-1.0, -1.0, -1.0], [0.0, 0.0, -1.0], [1.0, 0.0]),
            Vertex::new([-1.0, 1.0, -1.0], [0.0, 0.0, -1.0], [1.0, 1.0]),
            Vertex::new([1.0, 1.0, -1.0], [0.0, 0.0, -1.0], [0.0, 1.0]),
            Vertex::new([1.0, -1.0, -1.0], [0.0, 0.0, -1.0], [0.0, 0.0]),
        ];

        let indices = vec![
            // Front
            0, 1, 2, 2, 3, 0, //
            // Back
            4, 5, 6, 6, 7, 4, //
            // Left
            4, 0, 3, 3, 5, 4, //
            // Right
            1, 7, 6, 6, 2, 1, //
            // Top
            3, 2, 6, 6, 5, 3, //
            // Bottom
            4, 7, 1, 1, 0, 4,
        ];

        let index_count = indices.len() as u32;
        Self::new(vertices, indices, vec![SubMesh::new(0, index_count, material)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cube_counts() {
        let cube = MeshData::cube("default");
        assert_eq!(cube.vertex_count(), 8);
        assert_eq!(cube.index_count(), 36);
        assert_eq!(cube.submesh_count(), 1);
        assert_eq!(cube.material_name(0), "default");
    }

    #[test]
    fn test_submesh_range_lookup() {
        let mesh = MeshData::new(
            Vec::new(),
            Vec::new(),
            vec![
                SubMesh::new(0, 30, "stone"),
                SubMesh::new(30, 12, "glass"),
            ],
        );

        assert_eq!(mesh.submesh(1).index_offset, 30);
        assert_eq!(mesh.submesh(1).index_count, 12);
        assert_eq!(mesh.material_name(1), "glass");
    }

    #[test]
    #[should_panic]
    fn test_submesh_out_of_range_panics() {
        let mesh = MeshData::default();
        let _ = mesh.submesh(0);
    }
}
