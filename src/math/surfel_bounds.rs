//! Bounding boxes for oriented disks

use super::Aabb;
use crate::core::types::Vec3;

/// Half-thickness given to the disk along its normal so flat disks still
/// have a non-degenerate box to partition on.
pub const NORMAL_EPSILON: f32 = 0.0001;

/// Bounding box of a disk of `radius` centered at `center` facing `normal`.
///
/// The tangent frame is seeded from the coordinate axis least aligned with
/// the normal, so normals parallel to X (or any axis) still produce a
/// finite box. A zero-length normal falls back to the sphere bound; NaN
/// components are not treated as zero and carry through to the box.
pub fn surfel_bounds(center: Vec3, normal: Vec3, radius: f32) -> Aabb {
    if normal.length_squared() == 0.0 {
        return Aabb::new(center - Vec3::splat(radius), center + Vec3::splat(radius));
    }

    let n = normal.normalize();
    let reference = least_aligned_axis(n);
    let ax0 = n.cross(reference).normalize();
    let ax1 = n.cross(ax0).normalize();

    // The frame points are symmetric about the center
    let half = (radius * ax0)
        .abs()
        .max((radius * ax1).abs())
        .max(n.abs() * NORMAL_EPSILON);
    Aabb::new(center - half, center + half)
}

fn least_aligned_axis(n: Vec3) -> Vec3 {
    let a = n.abs();
    if a.x <= a.y && a.x <= a.z {
        Vec3::X
    } else if a.y <= a.z {
        Vec3::Y
    } else {
        Vec3::Z
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_axis_aligned_normals_are_finite() {
        for n in [Vec3::X, Vec3::NEG_X, Vec3::Y, Vec3::NEG_Y, Vec3::Z, Vec3::NEG_Z] {
            let b = surfel_bounds(Vec3::ONE, n, 0.5);
            assert!(b.is_finite(), "NaN bounds for normal {n}");
        }
    }

    #[test]
    fn test_opposite_normals_same_position() {
        let p = Vec3::new(0.25, 0.5, 0.75);
        let a = surfel_bounds(p, Vec3::X, 0.01);
        let b = surfel_bounds(p, Vec3::NEG_X, 0.01);
        assert!(a.is_finite());
        assert!(b.is_finite());
        assert!(a.contains_point(p));
        assert!(b.contains_point(p));
    }

    #[test]
    fn test_disk_extent() {
        let b = surfel_bounds(Vec3::ZERO, Vec3::Z, 2.0);
        // disk in the XY plane
        assert!((b.size().x - 4.0).abs() < 1e-5);
        assert!((b.size().y - 4.0).abs() < 1e-5);
        assert!((b.size().z - 2.0 * NORMAL_EPSILON).abs() < 1e-6);
    }

    #[test]
    fn test_tilted_normal_contains_center() {
        let c = Vec3::new(3.0, -1.0, 2.0);
        let b = surfel_bounds(c, Vec3::new(1.0, 1.0, 1.0), 0.3);
        assert!(b.is_finite());
        assert!(b.contains_point(c));
        assert!(b.size().max_element() <= 0.6 + 1e-5);
    }

    #[test]
    fn test_zero_normal_falls_back_to_sphere() {
        let b = surfel_bounds(Vec3::ZERO, Vec3::ZERO, 1.0);
        assert_eq!(b, Aabb::new(Vec3::splat(-1.0), Vec3::ONE));
    }

    #[test]
    fn test_nan_normal_propagates() {
        let b = surfel_bounds(Vec3::ZERO, Vec3::new(f32::NAN, 0.0, 1.0), 1.0);
        assert!(b.lower.is_nan());
        assert!(b.upper.is_nan());
        assert_ne!(b, Aabb::new(Vec3::splat(-1.0), Vec3::ONE));
    }

    #[test]
    fn test_nan_position_propagates() {
        let b = surfel_bounds(Vec3::new(0.0, f32::NAN, 0.0), Vec3::Z, 1.0);
        assert!(b.lower.y.is_nan());
        assert!(b.upper.y.is_nan());
        assert!(!b.is_finite());
    }
}
