//! Ray-sphere intersection over packets.
//!
//! Uses the geometric form: project the center onto each ray (`tca`), compare
//! the squared miss distance with the squared radius, then back off by the
//! half chord (`thc`) to reach the near surface. The miss distance is taken
//! from the perpendicular offset directly rather than as `|L|² - tca²`, so
//! spheres far smaller than their distance still classify correctly in f32.

use glam::Vec3A;

use crate::packet::{Lanes, Vec3Packet};
use crate::ray::RayPacket;

/// Sphere defined by center and radius.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sphere {
    /// Center point of the sphere in world coordinates.
    pub center: Vec3A,
    /// Radius of the sphere (always non-negative).
    pub radius: f32,
}

/// Result of intersecting a packet with one sphere.
#[derive(Debug, Clone, Copy)]
pub struct SphereHit<L> {
    /// Lanes whose ray meets the sphere somewhere ahead of its origin.
    pub mask: L,
    /// Near intersection distance. Negative when the origin is inside the
    /// sphere; meaningless in lanes outside `mask`.
    pub t: L,
}

impl Sphere {
    /// Create a new sphere.
    ///
    /// Negative radius values are clamped to 0.0.
    pub fn new(center: Vec3A, radius: f32) -> Self {
        Self {
            center,
            radius: radius.max(0.0),
        }
    }

    /// Intersect every lane of `rays` with this sphere.
    ///
    /// A lane hits when the sphere is ahead of the ray (center projects onto
    /// the positive half-line) or contains the ray origin, and the ray passes
    /// within `radius` of the center. Spheres wholly behind a ray are misses.
    #[inline]
    pub fn intersect<L: Lanes>(&self, rays: &RayPacket<L>) -> SphereHit<L> {
        let radius_sq = L::splat(self.radius * self.radius);
        let to_center = Vec3Packet::splat(self.center) - rays.origin;
        let tca = to_center.dot(&rays.direction);
        let center_dist_sq = to_center.length_squared();

        let ahead = tca.ge_mask(L::splat(0.0));
        let inside = center_dist_sq.le_mask(radius_sq);
        let facing = ahead.or(inside);
        if !facing.any() {
            return SphereHit {
                mask: L::none(),
                t: L::splat(f32::INFINITY),
            };
        }

        // Squared miss distance, measured from the closest point on each ray.
        let d2 = (to_center - rays.direction * tca).length_squared();
        let mask = facing.and(d2.le_mask(radius_sq));
        if !mask.any() {
            return SphereHit {
                mask,
                t: L::splat(f32::INFINITY),
            };
        }

        // Missed lanes have a negative radicand; zero them so NaN stays out.
        let half_chord = mask.and((radius_sq - d2).sqrt());
        SphereHit {
            mask,
            t: tca - half_chord,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ray::Ray;
    use approx::assert_abs_diff_eq;
    use wide::f32x4;

    fn packet(rays: [Ray; 4]) -> RayPacket<f32x4> {
        RayPacket::from_rays(&rays)
    }

    #[test]
    fn hits_misses_and_inside_lanes() {
        let sphere = Sphere::new(Vec3A::ZERO, 1.0);
        let toward = Vec3A::new(0.0, 0.0, -1.0);
        let rays = packet([
            // Straight through the center.
            Ray::new(Vec3A::new(0.0, 0.0, 5.0), toward),
            // Passes beside it.
            Ray::new(Vec3A::new(2.0, 0.0, 5.0), toward),
            // Sphere is behind the origin.
            Ray::new(Vec3A::new(0.0, 0.0, 5.0), -toward),
            // Starts at the center.
            Ray::new(Vec3A::ZERO, toward),
        ]);
        let hit = sphere.intersect(&rays);
        assert_eq!(hit.mask.bitmask(), 0b1001);
        assert_abs_diff_eq!(hit.t.lane(0), 4.0, epsilon = 1e-5);
        assert_abs_diff_eq!(hit.t.lane(3), -1.0, epsilon = 1e-5);
    }

    #[test]
    fn all_miss_returns_empty_mask() {
        let sphere = Sphere::new(Vec3A::new(10.0, 0.0, 0.0), 1.0);
        let ray = Ray::new(Vec3A::ZERO, Vec3A::new(-1.0, 0.0, 0.0));
        let hit = sphere.intersect(&packet([ray; 4]));
        assert!(!hit.mask.any());
    }

    #[test]
    fn tiny_distant_spheres_match_double_precision() {
        let radius = 4e-4_f32;
        let sphere = Sphere::new(Vec3A::ZERO, radius);
        let origin = Vec3A::new(0.0, 0.0, 4.0);
        let mut checked = 0;
        let mut wrong = 0;
        for i in 0..2000 {
            let scale = 0.5 + 1.5 * i as f32 / 1999.0;
            let angle = i as f32 * 2.399_963;
            let target = Vec3A::new(angle.cos(), angle.sin(), 0.0) * (scale * radius);
            let ray = Ray::new(origin, (target - origin).normalize());

            // Perpendicular distance of the f32 ray from the center, in f64.
            let o = [origin.x as f64, origin.y as f64, origin.z as f64];
            let d = [
                ray.direction.x as f64,
                ray.direction.y as f64,
                ray.direction.z as f64,
            ];
            let l = [-o[0], -o[1], -o[2]];
            let cross = [
                l[1] * d[2] - l[2] * d[1],
                l[2] * d[0] - l[0] * d[2],
                l[0] * d[1] - l[1] * d[0],
            ];
            let d_len = (d[0] * d[0] + d[1] * d[1] + d[2] * d[2]).sqrt();
            let miss = (cross[0] * cross[0] + cross[1] * cross[1] + cross[2] * cross[2]).sqrt()
                / d_len;
            let ratio = miss / radius as f64;
            if (ratio - 1.0).abs() < 0.01 {
                continue;
            }

            checked += 1;
            let hit = sphere.intersect(&RayPacket::<f32>::from_rays(&[ray]));
            if hit.mask.any() != (ratio < 1.0) {
                wrong += 1;
            }
        }
        assert!(checked > 1900);
        assert_eq!(wrong, 0, "{wrong}/{checked} rays misclassified");
    }

    #[test]
    fn negative_radius_is_clamped() {
        assert_eq!(Sphere::new(Vec3A::ZERO, -3.0).radius, 0.0);
    }
}
