//! Axis-aligned bounding boxes for culling

use crate::foundation::math::{Mat4, Vec3, Vec4};

use super::vertex::Vertex;

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    /// Minimum corner
    pub min: Vec3,
    /// Maximum corner
    pub max: Vec3,
}

impl Aabb {
    /// Create a box from explicit corners
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Smallest box enclosing the given points
    ///
    /// Returns `None` for an empty point set.
    pub fn from_points(points: impl IntoIterator<Item = Vec3>) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = iter.next()?;

        let mut min = first;
        let mut max = first;
        for p in iter {
            min = min.inf(&p);
            max = max.sup(&p);
        }
        Some(Self { min, max })
    }

    /// Smallest box enclosing the positions of the given vertices
    pub fn from_vertices(vertices: &[Vertex]) -> Option<Self> {
        Self::from_points(vertices.iter().map(|v| Vec3::from(v.position)))
    }

    /// Smallest box enclosing the vertices addressed by an index range
    ///
    /// Used to bound a single submesh without copying its geometry.
    pub fn from_indexed_range(vertices: &[Vertex], indices: &[u32]) -> Option<Self> {
        Self::from_points(
            indices
                .iter()
                .map(|&i| Vec3::from(vertices[i as usize].position)),
        )
    }

    /// Center of the box
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// The eight corners of the box
    pub fn corners(&self) -> [Vec3; 8] {
        [
            Vec3::new(self.min.x, self.min.y, self.min.z),
            Vec3::new(self.max.x, self.min.y, self.min.z),
            Vec3::new(self.min.x, self.max.y, self.min.z),
            Vec3::new(self.max.x, self.max.y, self.min.z),
            Vec3::new(self.min.x, self.min.y, self.max.z),
            Vec3::new(self.max.x, self.min.y, self.max.z),
            Vec3::new(self.min.x, self.max.y, self.max.z),
            Vec3::new(self.max.x, self.max.y, self.max.z),
        ]
    }

    /// Conservative world-space re-bound under a model matrix
    ///
    /// Transforms all eight corners and takes the axis-aligned bounds of the
    /// result. The box never under-estimates the transformed extent, so a
    /// culling test against it can never reject geometry that is actually
    /// visible; near diagonal rotations it is loose.
    pub fn transformed(&self, matrix: &Mat4) -> Self {
        let corners = self.corners();

        let mut min = Vec3::new(f32::MAX, f32::MAX, f32::MAX);
        let mut max = Vec3::new(f32::MIN, f32::MIN, f32::MIN);

        for corner in corners {
            let world = matrix * Vec4::new(corner.x, corner.y, corner.z, 1.0);
            let world = world.xyz();
            min = min.inf(&world);
            max = max.sup(&world);
        }

        Self { min, max }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const EPSILON: f32 = 1e-5;

    #[test]
    fn test_from_points() {
        let aabb = Aabb::from_points([
            Vec3::new(1.0, -2.0, 0.5),
            Vec3::new(-1.0, 3.0, 0.0),
            Vec3::new(0.0, 0.0, -4.0),
        ])
        .unwrap();

        assert_relative_eq!(aabb.min, Vec3::new(-1.0, -2.0, -4.0), epsilon = EPSILON);
        assert_relative_eq!(aabb.max, Vec3::new(1.0, 3.0, 0.5), epsilon = EPSILON);
    }

    #[test]
    fn test_from_points_empty() {
        assert!(Aabb::from_points(std::iter::empty()).is_none());
    }

    #[test]
    fn test_transformed_translation() {
        let aabb = Aabb::new(Vec3::new(-1.0, -1.0, -1.0), Vec3::new(1.0, 1.0, 1.0));
        let matrix = Mat4::new_translation(&Vec3::new(10.0, 0.0, -5.0));

        let world = aabb.transformed(&matrix);
        assert_relative_eq!(world.min, Vec3::new(9.0, -1.0, -6.0), epsilon = EPSILON);
        assert_relative_eq!(world.max, Vec3::new(11.0, 1.0, -4.0), epsilon = EPSILON);
    }

    #[test]
    fn test_transformed_rotation_is_conservative() {
        // A unit cube rotated 45 degrees around Y must still be fully
        // contained in its re-bound: the re-bound grows, never shrinks.
        let aabb = Aabb::new(Vec3::new(-1.0, -1.0, -1.0), Vec3::new(1.0, 1.0, 1.0));
        let rotation = Mat4::new_rotation(Vec3::new(0.0, std::f32::consts::FRAC_PI_4, 0.0));

        let world = aabb.transformed(&rotation);

        for corner in aabb.corners() {
            let rotated = (rotation * Vec4::new(corner.x, corner.y, corner.z, 1.0)).xyz();
            assert!(rotated.x >= world.min.x - EPSILON && rotated.x <= world.max.x + EPSILON);
            assert!(rotated.y >= world.min.y - EPSILON && rotated.y <= world.max.y + EPSILON);
            assert!(rotated.z >= world.min.z - EPSILON && rotated.z <= world.max.z + EPSILON);
        }

        // Loose by design: the rotated cube's re-bound is wider than the
        // original along X/Z.
        assert!(world.max.x > 1.0 + EPSILON);
        assert!(world.max.z > 1.0 + EPSILON);
    }

    #[test]
    fn test_from_indexed_range() {
        let vertices = vec![
            Vertex::new([0.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0]),
            Vertex::new([5.0, 1.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0]),
            Vertex::new([-3.0, 2.0, 4.0], [0.0, 1.0, 0.0], [0.0, 0.0]),
        ];

        // Only the first two vertices are referenced.
        let aabb = Aabb::from_indexed_range(&vertices, &[0, 1, 1]).unwrap();
        assert_relative_eq!(aabb.min, Vec3::new(0.0, 0.0, 0.0), epsilon = EPSILON);
        assert_relative_eq!(aabb.max, Vec3::new(5.0, 1.0, 0.0), epsilon = EPSILON);
    }
}
