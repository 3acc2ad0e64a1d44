//! CPU frustum culling
//!
//! Extracts the six clip planes from a combined view-projection matrix and
//! classifies transformed bounding boxes against them. Recomputed every
//! frame; holds no state beyond the current frame's planes.

use crate::foundation::math::{Mat4, Vec3, Vec4};
use crate::render::primitives::Aabb;

/// A plane in normal/distance form: `dot(normal, p) + d = 0`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    /// Plane normal, unit length after extraction
    pub normal: Vec3,
    /// Signed distance term
    pub d: f32,
}

impl Plane {
    /// Signed distance from a point to the plane
    pub fn distance_to_point(&self, point: Vec3) -> f32 {
        self.normal.dot(&point) + self.d
    }

    fn from_vec4(v: Vec4) -> Self {
        let normal = v.xyz();
        let len = normal.magnitude();
        Self {
            normal: normal / len,
            d: v.w / len,
        }
    }
}

/// Frustum plane indices
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(usize)]
enum PlaneIndex {
    Left = 0,
    Right,
    Bottom,
    Top,
    Near,
    Far,
}

const PLANE_COUNT: usize = 6;

/// View frustum as six clip planes
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frustum {
    planes: [Plane; PLANE_COUNT],
}

impl Frustum {
    /// Extract the frustum from a view-projection matrix
    ///
    /// Standard Gribb-Hartmann extraction: each plane is a sum or
    /// difference of the matrix's fourth row with one of the other rows,
    /// normalized by the length of its normal. No matrix inversion.
    pub fn from_view_proj(vp: &Mat4) -> Self {
        let row0 = vp.row(0).transpose();
        let row1 = vp.row(1).transpose();
        let row2 = vp.row(2).transpose();
        let row3 = vp.row(3).transpose();

        let mut planes = [Plane {
            normal: Vec3::zeros(),
            d: 0.0,
        }; PLANE_COUNT];

        planes[PlaneIndex::Left as usize] = Plane::from_vec4(row3 + row0);
        planes[PlaneIndex::Right as usize] = Plane::from_vec4(row3 - row0);
        planes[PlaneIndex::Bottom as usize] = Plane::from_vec4(row3 + row1);
        planes[PlaneIndex::Top as usize] = Plane::from_vec4(row3 - row1);
        planes[PlaneIndex::Near as usize] = Plane::from_vec4(row3 + row2);
        planes[PlaneIndex::Far as usize] = Plane::from_vec4(row3 - row2);

        Self { planes }
    }

    /// Test a world-space box against the frustum
    ///
    /// For each plane, the corner maximizing the dot product with the plane
    /// normal is tested; a negative signed distance for that corner means
    /// the whole box is outside and testing stops. Returns true only if no
    /// plane rejects the box.
    pub fn test_world_aabb(&self, aabb: &Aabb) -> bool {
        for plane in &self.planes {
            let p_vertex = Vec3::new(
                if plane.normal.x >= 0.0 { aabb.max.x } else { aabb.min.x },
                if plane.normal.y >= 0.0 { aabb.max.y } else { aabb.min.y },
                if plane.normal.z >= 0.0 { aabb.max.z } else { aabb.min.z },
            );

            if plane.distance_to_point(p_vertex) < 0.0 {
                return false;
            }
        }
        true
    }

    /// Test a local-space box under a model matrix
    ///
    /// Re-bounds the box conservatively in world space (all eight corners
    /// transformed, axis-aligned bounds taken) before classification, so
    /// visible geometry is never rejected. O(1) per test regardless of the
    /// geometry behind the box.
    pub fn test_aabb(&self, local: &Aabb, model_matrix: &Mat4) -> bool {
        self.test_world_aabb(&local.transformed(model_matrix))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// Symmetric orthographic projection looking down -Z, right-handed,
    /// with a [-1, 1] depth range so all six planes are meaningful.
    fn ortho_view_proj(half_extent: f32) -> Mat4 {
        Mat4::new_orthographic(
            -half_extent,
            half_extent,
            -half_extent,
            half_extent,
            -half_extent,
            half_extent,
        )
    }

    fn unit_box_at(center: Vec3) -> Aabb {
        let half = Vec3::new(0.5, 0.5, 0.5);
        Aabb::new(center - half, center + half)
    }

    #[test]
    fn test_plane_normals_are_unit_length() {
        let frustum = Frustum::from_view_proj(&ortho_view_proj(10.0));
        for plane in &frustum.planes {
            assert_relative_eq!(plane.normal.magnitude(), 1.0, epsilon = 1e-5);
        }
    }

    #[test]
    fn test_box_inside_is_accepted() {
        let frustum = Frustum::from_view_proj(&ortho_view_proj(10.0));
        assert!(frustum.test_aabb(&unit_box_at(Vec3::zeros()), &Mat4::identity()));
    }

    #[test]
    fn test_box_outside_each_axis_is_rejected() {
        let frustum = Frustum::from_view_proj(&ortho_view_proj(10.0));
        for center in [
            Vec3::new(20.0, 0.0, 0.0),
            Vec3::new(-20.0, 0.0, 0.0),
            Vec3::new(0.0, 20.0, 0.0),
            Vec3::new(0.0, -20.0, 0.0),
            Vec3::new(0.0, 0.0, 20.0),
            Vec3::new(0.0, 0.0, -20.0),
        ] {
            assert!(
                !frustum.test_aabb(&unit_box_at(center), &Mat4::identity()),
                "box at {center:?} should be culled"
            );
        }
    }

    #[test]
    fn test_straddling_box_is_accepted() {
        // Partially visible geometry must never be culled.
        let frustum = Frustum::from_view_proj(&ortho_view_proj(10.0));
        let straddling = unit_box_at(Vec3::new(10.0, 0.0, 0.0));
        assert!(frustum.test_aabb(&straddling, &Mat4::identity()));
    }

    #[test]
    fn test_translation_moves_box_out() {
        let frustum = Frustum::from_view_proj(&ortho_view_proj(10.0));
        let local = unit_box_at(Vec3::zeros());

        let inside = Mat4::new_translation(&Vec3::new(5.0, 0.0, 0.0));
        let outside = Mat4::new_translation(&Vec3::new(50.0, 0.0, 0.0));

        assert!(frustum.test_aabb(&local, &inside));
        assert!(!frustum.test_aabb(&local, &outside));
    }

    #[test]
    fn test_rotated_box_near_edge_is_conservative() {
        // A box whose re-bound pokes into the frustum after rotation must be
        // accepted even if the tight oriented box would not be. The loose
        // re-bound trades false positives for a guarantee of no false culls.
        let frustum = Frustum::from_view_proj(&ortho_view_proj(10.0));
        let local = Aabb::new(Vec3::new(-2.0, -0.1, -0.1), Vec3::new(2.0, 0.1, 0.1));

        let place = Mat4::new_translation(&Vec3::new(11.0, 0.0, 0.0))
            * Mat4::new_rotation(Vec3::new(0.0, std::f32::consts::FRAC_PI_4, 0.0));

        let world = local.transformed(&place);
        // The re-bound reaches back across the +X plane at x = 10.
        assert!(world.min.x < 10.0);
        assert!(frustum.test_aabb(&local, &place));
    }
}
