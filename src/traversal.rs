//! Recursive packet traversal of the sphereflake.
//!
//! The fractal is never stored. Each call derives a node's sphere from the
//! accumulated parent transform and radius, prunes with a bounding sphere that
//! encloses the whole subtree, and recurses into the nine children before
//! testing the node's own sphere. Lanes diverge freely; results are merged with
//! masks so the packet never branches per ray.

use glam::{Mat4, Vec3A};

use crate::packet::{Lanes, Vec3Packet};
use crate::ray::RayPacket;
use crate::sphere::Sphere;
use crate::topology::{CHILD_COUNT, ChildTransform, compute_child_transforms};

/// Accumulated radius passed to the root call; the root sphere itself has
/// radius `ROOT_RADIUS / 3 = 1`.
pub const ROOT_RADIUS: f32 = 3.0;

/// Every descendant of a node lies within this multiple of the node's radius.
const BOUNDING_SCALE: f32 = 2.0;

/// Termination parameters for the traversal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TraversalLimits {
    /// Hard recursion bound. Nodes at this depth are never visited.
    pub max_depth: u32,
    /// A subtree is skipped once `sqrt(distance / radius)` of its bounding
    /// sphere reaches this value for every lane.
    pub cull_threshold: f32,
}

impl Default for TraversalLimits {
    fn default() -> Self {
        Self {
            max_depth: 32,
            cull_threshold: 100.0,
        }
    }
}

/// Per-packet results threaded through the recursion.
#[derive(Debug, Clone, Copy)]
pub struct TraversalState<L> {
    /// Nearest accepted hit distance per lane (+inf if none).
    pub min_t: L,
    /// World-space position of the nearest hit per lane.
    pub position: Vec3Packet<L>,
    /// Unit surface normal of the nearest hit per lane.
    pub normal: Vec3Packet<L>,
    /// Deepest node whose children any lane descended into.
    pub max_depth: u32,
}

impl<L: Lanes> TraversalState<L> {
    /// No hits recorded yet.
    pub fn new() -> Self {
        Self {
            min_t: L::splat(f32::INFINITY),
            position: Vec3Packet::zero(),
            normal: Vec3Packet::zero(),
            max_depth: 0,
        }
    }

    /// Lanes holding a resolved hit.
    pub fn hit_mask(&self) -> L {
        self.min_t.lt_mask(L::splat(f32::INFINITY))
    }

    /// Smallest hit distance over all lanes, if any lane hit.
    pub fn closest_distance(&self) -> Option<f32> {
        (0..L::WIDTH)
            .map(|lane| self.min_t.lane(lane))
            .filter(|t| t.is_finite())
            .reduce(f32::min)
    }
}

impl<L: Lanes> Default for TraversalState<L> {
    fn default() -> Self {
        Self::new()
    }
}

/// The procedural sphereflake: child placements plus termination limits.
#[derive(Debug, Clone)]
pub struct Sphereflake {
    children: [ChildTransform; CHILD_COUNT],
    limits: TraversalLimits,
}

impl Sphereflake {
    /// Fractal with precomputed child placements.
    pub fn new(limits: TraversalLimits) -> Self {
        Self {
            children: compute_child_transforms(),
            limits,
        }
    }

    /// Termination limits this fractal traces with.
    pub fn limits(&self) -> TraversalLimits {
        self.limits
    }

    /// Unit placements of the nine children.
    pub fn children(&self) -> &[ChildTransform; CHILD_COUNT] {
        &self.children
    }

    /// Trace a packet from the root, updating `state` with the nearest hits.
    /// Returns the lanes that hit the root's own sphere.
    pub fn trace<L: Lanes>(&self, rays: &RayPacket<L>, state: &mut TraversalState<L>) -> L {
        self.intersect(rays, &Mat4::IDENTITY, ROOT_RADIUS, 0, state)
    }

    /// Visit one node. `transform` places the node in world space and
    /// `accumulated_radius / 3` is its own radius.
    ///
    /// Returns the lanes whose ray hit this node's own sphere at a positive
    /// distance; the authoritative output is `state`.
    pub fn intersect<L: Lanes>(
        &self,
        rays: &RayPacket<L>,
        transform: &Mat4,
        accumulated_radius: f32,
        depth: u32,
        state: &mut TraversalState<L>,
    ) -> L {
        if depth >= self.limits.max_depth {
            return L::none();
        }

        let radius = accumulated_radius / 3.0;
        let center = Vec3A::from(transform.w_axis.truncate());

        let bound = Sphere::new(center, BOUNDING_SCALE * radius).intersect(rays);
        if !bound.mask.any() {
            return bound.mask;
        }

        // Subtrees that look tiny from every lane are skipped. Lanes starting
        // inside the bound have a negative distance and always descend.
        let apparent = (bound.t / L::splat(radius)).sqrt();
        let visible = apparent.lt_mask(L::splat(self.limits.cull_threshold));
        let inside = bound.t.lt_mask(L::splat(0.0));
        let descend = bound.mask.and(visible.or(inside));

        if descend.any() {
            state.max_depth = state.max_depth.max(depth);
            for child in &self.children {
                let world = *transform * child.placed(radius);
                self.intersect(rays, &world, radius, depth + 1, state);
            }
        }

        let own = Sphere::new(center, radius).intersect(rays);
        let hit = own.mask.and(own.t.gt_mask(L::splat(0.0)));
        let closer = hit.and(own.t.lt_mask(state.min_t));
        if !closer.any() {
            return hit;
        }

        let position = rays.at(own.t);
        let normal = (position - Vec3Packet::splat(center)).normalize();

        state.min_t = closer.select(own.t, state.min_t);
        state.position = Vec3Packet::select(closer, &position, &state.position);
        state.normal = Vec3Packet::select(closer, &normal, &state.normal);
        hit
    }
}

impl Default for Sphereflake {
    fn default() -> Self {
        Self::new(TraversalLimits::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ray::Ray;
    use approx::assert_abs_diff_eq;
    use wide::{f32x4, f32x8};

    const AXIS_ORIGIN: Vec3A = Vec3A::new(0.0, 0.0, -4.0);

    /// Along +z from below the fractal: the root is the first surface hit.
    fn axis_ray() -> Ray {
        Ray::new(AXIS_ORIGIN, Vec3A::Z)
    }

    /// Points straight away from everything.
    fn missing_ray() -> Ray {
        Ray::new(AXIS_ORIGIN, -Vec3A::Z)
    }

    fn lane_zero_packet<L: Lanes>(ray: Ray) -> RayPacket<L> {
        let mut rays = vec![missing_ray(); L::WIDTH];
        rays[0] = ray;
        RayPacket::from_rays(&rays)
    }

    fn trace_lane_zero<L: Lanes>(flake: &Sphereflake, ray: Ray) -> (f32, Vec3A, Vec3A, u32) {
        let rays = lane_zero_packet::<L>(ray);
        let mut state = TraversalState::new();
        flake.trace(&rays, &mut state);
        for lane in 1..L::WIDTH {
            assert_eq!(state.min_t.lane(lane), f32::INFINITY);
        }
        (
            state.min_t.lane(0),
            state.position.extract(0),
            state.normal.extract(0),
            state.hit_mask().bitmask(),
        )
    }

    #[test]
    fn rays_missing_the_root_bound_write_nothing() {
        let flake = Sphereflake::default();
        let rays = RayPacket::<f32x4>::from_rays(&[
            Ray::new(Vec3A::new(0.0, 0.0, 10.0), Vec3A::Z),
            Ray::new(Vec3A::new(5.0, 0.0, 10.0), -Vec3A::Z),
            Ray::new(Vec3A::new(0.0, -2.5, 10.0), -Vec3A::Z),
            Ray::new(Vec3A::new(0.0, 10.0, 0.0), Vec3A::X),
        ]);
        let mut state = TraversalState::new();
        let hit = flake.trace(&rays, &mut state);
        assert!(!hit.any());
        assert!(!state.hit_mask().any());
        for lane in 0..4 {
            assert_eq!(state.position.extract(lane), Vec3A::ZERO);
            assert_eq!(state.normal.extract(lane), Vec3A::ZERO);
        }
        assert_eq!(state.max_depth, 0);
    }

    #[test]
    fn central_ray_hits_the_root_surface() {
        let flake = Sphereflake::default();
        let (t, position, normal, mask) = trace_lane_zero::<f32x4>(&flake, axis_ray());
        assert_eq!(mask, 1);
        assert_abs_diff_eq!(t, 3.0, epsilon = 1e-4);
        assert_abs_diff_eq!(position.distance(AXIS_ORIGIN), 3.0, epsilon = 1e-4);
        assert_abs_diff_eq!(normal, -Vec3A::Z, epsilon = 1e-4);
        assert_abs_diff_eq!(normal.dot(axis_ray().direction), -1.0, epsilon = 1e-4);
    }

    #[test]
    fn packet_width_does_not_change_results() {
        let flake = Sphereflake::default();
        let rays = [
            axis_ray(),
            Ray::new(Vec3A::new(0.0, 0.0, 4.0), Vec3A::new(0.2, 0.1, -1.0).normalize()),
            Ray::new(Vec3A::new(3.0, 2.5, 1.0), Vec3A::new(-0.75, -0.6, -0.3).normalize()),
            Ray::new(Vec3A::new(-4.0, 0.3, 0.2), Vec3A::X),
        ];
        for ray in rays {
            let single = trace_lane_zero::<f32>(&flake, ray);
            for wide in [
                trace_lane_zero::<f32x4>(&flake, ray),
                trace_lane_zero::<f32x8>(&flake, ray),
            ] {
                assert_eq!(single.3, wide.3);
                if single.3 != 0 {
                    assert_abs_diff_eq!(single.0, wide.0, epsilon = 1e-3);
                    assert_abs_diff_eq!(single.1, wide.1, epsilon = 1e-3);
                    assert_abs_diff_eq!(single.2, wide.2, epsilon = 1e-3);
                }
            }
        }
    }

    #[test]
    fn nearer_recorded_hits_are_never_replaced() {
        let flake = Sphereflake::default();
        let rays = lane_zero_packet::<f32x4>(axis_ray());

        let mut state = TraversalState::<f32x4>::new();
        state.min_t = f32x4::splat(0.5);
        let marker = Vec3A::new(9.0, 9.0, 9.0);
        state.position = Vec3Packet::splat(marker);
        flake.trace(&rays, &mut state);
        assert_eq!(state.min_t.lane(0), 0.5);
        assert_eq!(state.position.extract(0), marker);

        let mut fresh = TraversalState::<f32x4>::new();
        flake.trace(&rays, &mut fresh);
        let first = (fresh.min_t.lane(0), fresh.position.extract(0));
        flake.trace(&rays, &mut fresh);
        assert_eq!(fresh.min_t.lane(0), first.0);
        assert_eq!(fresh.position.extract(0), first.1);
    }

    #[test]
    fn hard_depth_bound_stops_everything() {
        let flake = Sphereflake::new(TraversalLimits {
            max_depth: 0,
            cull_threshold: 100.0,
        });
        let rays = lane_zero_packet::<f32x4>(axis_ray());
        let mut state = TraversalState::new();
        assert!(!flake.trace(&rays, &mut state).any());
        assert!(!state.hit_mask().any());
    }

    /// Sweep a grid of rays from (0, 0, 4) across the fractal and return the
    /// deepest recorded level plus every hit position.
    fn sweep(flake: &Sphereflake) -> (u32, Vec<Vec3A>) {
        let origin = Vec3A::new(0.0, 0.0, 4.0);
        let mut deepest = 0;
        let mut hits = Vec::new();
        for i in 0..32 * 32 {
            let x = (i % 32) as f32 / 31.0 - 0.5;
            let y = (i / 32) as f32 / 31.0 - 0.5;
            let target = Vec3A::new(x * 3.0, y * 3.0, 0.0);
            let rays = lane_zero_packet::<f32x4>(Ray::new(origin, (target - origin).normalize()));
            let mut state = TraversalState::new();
            flake.trace(&rays, &mut state);
            deepest = deepest.max(state.max_depth);
            if state.hit_mask().bitmask() & 1 != 0 {
                hits.push(state.position.extract(0));
            }
        }
        (deepest, hits)
    }

    #[test]
    fn hard_depth_bound_limits_recursion_without_culling() {
        let limited = |max_depth| {
            Sphereflake::new(TraversalLimits {
                max_depth,
                cull_threshold: f32::MAX,
            })
        };

        // Depth 2 is the last level visited; its children are never entered.
        let (deepest, hits) = sweep(&limited(3));
        assert_eq!(deepest, 2);
        assert!(hits.iter().any(|p| p.length() > 1.01), "no child sphere hit");

        // With only the root allowed every hit lies on the unit sphere.
        let (deepest, hits) = sweep(&limited(1));
        assert_eq!(deepest, 0);
        assert!(!hits.is_empty());
        for p in hits {
            assert_abs_diff_eq!(p.length(), 1.0, epsilon = 1e-4);
        }
    }

    #[test]
    fn culled_levels_do_not_count_toward_depth() {
        let culled_at = |cull_threshold| {
            Sphereflake::new(TraversalLimits {
                max_depth: 32,
                cull_threshold,
            })
        };

        // The root (apparent size below 2) descends; every child bound seen
        // from (0, 0, 4) is above 2, so the children are tested but not entered.
        let (deepest, hits) = sweep(&culled_at(2.0));
        assert_eq!(deepest, 0);
        assert!(hits.iter().any(|p| p.length() > 1.01));

        let (deepest, _) = sweep(&culled_at(3.0));
        assert!(deepest >= 1);
    }

    #[test]
    fn angular_cutoff_bounds_depth_for_distant_views() {
        let limits = TraversalLimits::default();
        let flake = Sphereflake::new(limits);
        let origin = Vec3A::new(0.0, 0.0, 60.0);
        let mut deepest = 0;
        for i in 0..64 {
            let x = (i % 8) as f32 / 8.0 - 0.5;
            let y = (i / 8) as f32 / 8.0 - 0.5;
            let target = Vec3A::new(x * 3.0, y * 3.0, 0.0);
            let rays = lane_zero_packet::<f32x8>(Ray::new(origin, (target - origin).normalize()));
            let mut state = TraversalState::new();
            flake.trace(&rays, &mut state);
            deepest = deepest.max(state.max_depth);
        }
        assert!(deepest > 0);
        assert!(deepest < limits.max_depth);
    }

    #[test]
    fn lower_threshold_prunes_earlier() {
        let rays = lane_zero_packet::<f32x4>(Ray::new(
            Vec3A::new(0.0, 0.0, 10.0),
            Vec3A::new(0.05, 0.02, -1.0).normalize(),
        ));
        let depth_for = |cull_threshold| {
            let flake = Sphereflake::new(TraversalLimits {
                max_depth: 32,
                cull_threshold,
            });
            let mut state = TraversalState::new();
            flake.trace(&rays, &mut state);
            state.max_depth
        };
        assert!(depth_for(5.0) <= depth_for(100.0));
    }
}
