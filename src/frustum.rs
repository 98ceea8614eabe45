//! The camera frustum shared between the render loop and the workers.

use std::sync::atomic::{AtomicU32, Ordering};

use glam::Vec3A;

use crate::packet::{Lanes, Vec3Packet};

/// Ray origin plus three image-plane corner targets in world space.
///
/// The direction through normalized image coordinates `(u, v)` (origin top
/// left, `v` growing downward) is
/// `top_left + (top_right - top_left) * u + (bottom_left - top_left) * v - origin`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrustumView {
    /// Shared origin of every primary ray.
    pub origin: Vec3A,
    /// Point on the image plane behind pixel (0, 0).
    pub top_left: Vec3A,
    /// Point on the image plane behind the top-right corner.
    pub top_right: Vec3A,
    /// Point on the image plane behind the bottom-left corner.
    pub bottom_left: Vec3A,
}

impl FrustumView {
    /// View from an origin and three image-plane corners.
    pub fn new(origin: Vec3A, top_left: Vec3A, top_right: Vec3A, bottom_left: Vec3A) -> Self {
        Self {
            origin,
            top_left,
            top_right,
            bottom_left,
        }
    }

    /// True when the corners do not span a plane away from the origin.
    /// Such views still render, but produce garbage pixels.
    pub fn is_degenerate(&self) -> bool {
        let right = self.top_right - self.top_left;
        let down = self.bottom_left - self.top_left;
        let plane_normal = right.cross(down);
        let to_plane = self.top_left - self.origin;
        let values = [self.origin, self.top_left, self.top_right, self.bottom_left];
        !values.iter().all(|v| v.is_finite())
            || plane_normal.length_squared() <= f32::EPSILON
            || plane_normal.dot(to_plane).abs() <= f32::EPSILON
    }

    /// Unnormalized direction through image coordinates `(u, v)`.
    pub fn direction(&self, u: f32, v: f32) -> Vec3A {
        self.top_left
            + (self.top_right - self.top_left) * u
            + (self.bottom_left - self.top_left) * v
            - self.origin
    }

    /// Normalized directions for a packet of image coordinates.
    #[inline]
    pub fn directions<L: Lanes>(&self, u: L, v: L) -> Vec3Packet<L> {
        let top_left = Vec3Packet::splat(self.top_left);
        let across = Vec3Packet::splat(self.top_right - self.top_left);
        let down = Vec3Packet::splat(self.bottom_left - self.top_left);
        let target = top_left + across * u + down * v;
        (target - Vec3Packet::splat(self.origin)).normalize()
    }
}

/// Anything that can report the current camera frustum, polled once per frame.
pub trait FrustumSource {
    /// Current view as origin plus image-plane corners.
    fn frustum(&self) -> FrustumView;
}

impl FrustumSource for FrustumView {
    fn frustum(&self) -> FrustumView {
        *self
    }
}

const VIEW_FLOATS: usize = 12;

/// A [`FrustumView`] stored as relaxed atomics.
///
/// Writers and readers never block. A reader racing a writer can observe a
/// mix of old and new components; that costs at most one stale sample.
#[derive(Debug)]
pub struct SharedView {
    components: [AtomicU32; VIEW_FLOATS],
}

impl SharedView {
    /// Shared slot initialised with `view`.
    pub fn new(view: &FrustumView) -> Self {
        let shared = Self {
            components: std::array::from_fn(|_| AtomicU32::new(0)),
        };
        shared.store(view);
        shared
    }

    /// Publish a new view to every worker.
    pub fn store(&self, view: &FrustumView) {
        let vectors = [view.origin, view.top_left, view.top_right, view.bottom_left];
        for (slot, value) in self
            .components
            .iter()
            .zip(vectors.iter().flat_map(|v| v.to_array()))
        {
            slot.store(value.to_bits(), Ordering::Relaxed);
        }
    }

    /// Read the current view; a concurrent store may be seen half applied.
    pub fn load(&self) -> FrustumView {
        let component = |i: usize| f32::from_bits(self.components[i].load(Ordering::Relaxed));
        let vector = |i: usize| Vec3A::new(component(i), component(i + 1), component(i + 2));
        FrustumView {
            origin: vector(0),
            top_left: vector(3),
            top_right: vector(6),
            bottom_left: vector(9),
        }
    }
}
