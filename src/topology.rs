//! Where the nine children of a sphereflake node sit.
//!
//! Placements are expressed relative to a parent of radius 1 centered at the
//! origin and computed once; the traversal rescales and composes them with the
//! accumulated parent transform at every level.

use glam::{Mat4, Vec3, Vec3A, Vec4};

/// Children per node: a ring of six on the equator plus three near the pole.
pub const CHILD_COUNT: usize = 9;

const EQUATORIAL_CHILDREN: usize = 6;

/// Distance from parent center to child center, in units of the child's
/// parent-relative radius. 4/3 keeps siblings apart while staying dense.
pub const CHILD_SPACING: f32 = 4.0 / 3.0;

const POLAR_LONGITUDE_DEG: f32 = 30.0;

/// Fixed Euler rotations (degrees, applied X then Y then Z) of the polar children.
const POLAR_ROTATIONS_DEG: [Vec3; CHILD_COUNT - EQUATORIAL_CHILDREN] = [
    Vec3::new(0.0, 0.0, 0.0),
    Vec3::new(0.0, 0.0, 0.0),
    Vec3::new(60.0, 0.0, 0.0),
];

/// A rigid placement of one child relative to a unit parent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChildTransform {
    /// Pure rotation; the translation column is always zero.
    rotation: Mat4,
    /// Unit vector from the parent center toward the child center.
    displacement: Vec3A,
}

impl ChildTransform {
    /// Placement from a rotation and a unit displacement. Any translation in `rotation` is dropped.
    pub fn new(rotation: Mat4, displacement: Vec3A) -> Self {
        let mut rotation = rotation;
        rotation.w_axis = Vec4::W;
        Self {
            rotation,
            displacement,
        }
    }

    /// Rotation applied to the child frame.
    pub fn rotation(&self) -> Mat4 {
        self.rotation
    }

    /// Unit direction from the parent center to the child.
    pub fn displacement(&self) -> Vec3A {
        self.displacement
    }

    /// Transform of this child relative to a parent node whose own sphere
    /// has radius `radius`: the rotation with the displacement scaled by
    /// `CHILD_SPACING * radius`.
    #[inline]
    pub fn placed(&self, radius: f32) -> Mat4 {
        let offset = self.displacement * (CHILD_SPACING * radius);
        let mut transform = self.rotation;
        transform.w_axis = offset.extend(1.0);
        transform
    }
}

/// Point on the unit sphere. `longitude` is measured from +Z, `latitude`
/// around Z starting at +X; both in radians.
pub fn spherical_to_world(longitude: f32, latitude: f32) -> Vec3A {
    let sin_lon = longitude.sin();
    Vec3A::new(
        latitude.cos() * sin_lon,
        latitude.sin() * sin_lon,
        longitude.cos(),
    )
}

/// Composite rotation `Rx * Ry * Rz` from angles in degrees.
pub fn rotation_from_degrees(angles: Vec3) -> Mat4 {
    Mat4::from_rotation_x(angles.x.to_radians())
        * Mat4::from_rotation_y(angles.y.to_radians())
        * Mat4::from_rotation_z(angles.z.to_radians())
}

/// The nine child placements: indices 0..6 ring the equator at 60° steps,
/// 6..9 sit at 30° from the pole, 120° apart.
pub fn compute_child_transforms() -> [ChildTransform; CHILD_COUNT] {
    std::array::from_fn(|index| {
        if index < EQUATORIAL_CHILDREN {
            let step = 60.0 * index as f32;
            let displacement = spherical_to_world(90f32.to_radians(), step.to_radians());
            let rotation = rotation_from_degrees(Vec3::new(90.0, 90.0 + step, 0.0));
            ChildTransform::new(rotation, displacement.normalize())
        } else {
            let polar = index - EQUATORIAL_CHILDREN;
            let latitude = 30.0 + 120.0 * polar as f32;
            let displacement = spherical_to_world(
                POLAR_LONGITUDE_DEG.to_radians(),
                latitude.to_radians(),
            );
            let rotation = rotation_from_degrees(POLAR_ROTATIONS_DEG[polar]);
            ChildTransform::new(rotation, displacement.normalize())
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn displacements_are_unit_length() {
        for child in compute_child_transforms() {
            assert_abs_diff_eq!(child.displacement().length(), 1.0, epsilon = 1e-5);
        }
    }

    #[test]
    fn rotation_blocks_are_orthonormal() {
        for child in compute_child_transforms() {
            let r = child.rotation();
            let columns = [r.x_axis.truncate(), r.y_axis.truncate(), r.z_axis.truncate()];
            for (i, a) in columns.iter().enumerate() {
                for (j, b) in columns.iter().enumerate() {
                    let expected = if i == j { 1.0 } else { 0.0 };
                    assert_abs_diff_eq!(a.dot(*b), expected, epsilon = 1e-5);
                }
            }
            assert_abs_diff_eq!(r.determinant(), 1.0, epsilon = 1e-5);
            assert_eq!(r.w_axis, Vec4::W);
        }
    }

    #[test]
    fn composition_keeps_rotations_orthonormal() {
        let children = compute_child_transforms();
        let mut transform = Mat4::IDENTITY;
        let mut radius = 1.0;
        for child in children.iter().cycle().take(12) {
            transform *= child.placed(radius);
            radius /= 3.0;
        }
        let block = glam::Mat3::from_mat4(transform);
        assert_abs_diff_eq!(block.determinant(), 1.0, epsilon = 1e-4);
        assert_abs_diff_eq!(block.x_axis.length(), 1.0, epsilon = 1e-4);
    }

    #[test]
    fn equatorial_ring_lies_in_the_xy_plane() {
        let children = compute_child_transforms();
        for (i, child) in children[..EQUATORIAL_CHILDREN].iter().enumerate() {
            let d = child.displacement();
            assert_abs_diff_eq!(d.z, 0.0, epsilon = 1e-6);
            let angle = d.y.atan2(d.x).to_degrees().rem_euclid(360.0);
            assert_abs_diff_eq!(angle, 60.0 * i as f32, epsilon = 1e-3);
        }
    }

    #[test]
    fn polar_children_sit_above_the_equator() {
        let children = compute_child_transforms();
        for child in &children[EQUATORIAL_CHILDREN..] {
            assert_abs_diff_eq!(
                child.displacement().z,
                POLAR_LONGITUDE_DEG.to_radians().cos(),
                epsilon = 1e-6
            );
        }
    }

    #[test]
    fn placed_scales_translation_only() {
        let child = compute_child_transforms()[2];
        let placed = child.placed(0.75);
        assert_abs_diff_eq!(
            placed.w_axis.truncate().length(),
            CHILD_SPACING * 0.75,
            epsilon = 1e-6
        );
        assert_eq!(placed.x_axis, child.rotation().x_axis);
    }
}
