//! Vertex layout shared by every mesh in the unified geometry buffers

/// 3D vertex with position, normal, color, texture coordinates, and tangent
///
/// The `#[repr(C)]` layout matches the vertex input binding the geometry
/// pipeline declares; all meshes share this single layout so their geometry
/// can be concatenated into one vertex buffer.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vertex {
    /// Position in model space
    pub position: [f32; 3],

    /// Normal vector
    pub normal: [f32; 3],

    /// Vertex color
    pub color: [f32; 3],

    /// Texture coordinates
    pub tex_coord: [f32; 2],

    /// Tangent direction, w component carries handedness (+1 or -1)
    pub tangent: [f32; 4],
}

// Only f32 fields, no padding bytes observable through the public layout.
unsafe impl bytemuck::Pod for Vertex {}
unsafe impl bytemuck::Zeroable for Vertex {}

impl Vertex {
    /// Create a vertex with a default white color and zero tangent
    pub fn new(position: [f32; 3], normal: [f32; 3], tex_coord: [f32; 2]) -> Self {
        Self {
            position,
            normal,
            color: [1.0, 1.0, 1.0],
            tex_coord,
            tangent: [0.0, 0.0, 0.0, 1.0],
        }
    }

    /// Create a vertex with an explicit tangent
    pub fn new_with_tangent(
        position: [f32; 3],
        normal: [f32; 3],
        tex_coord: [f32; 2],
        tangent: [f32; 4],
    ) -> Self {
        Self {
            position,
            normal,
            color: [1.0, 1.0, 1.0],
            tex_coord,
            tangent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vertex_is_tightly_packed() {
        // 3 + 3 + 3 + 2 + 4 floats
        assert_eq!(std::mem::size_of::<Vertex>(), 15 * 4);
    }

    #[test]
    fn test_vertex_pod_cast() {
        let vertices = [Vertex::new([1.0, 2.0, 3.0], [0.0, 1.0, 0.0], [0.5, 0.5])];
        let bytes: &[u8] = bytemuck::cast_slice(&vertices);
        assert_eq!(bytes.len(), std::mem::size_of::<Vertex>());
    }
}
