//! Rays and ray packets.
//!
//! A ray is r(t) = origin + t * direction. The traversal works on packets of
//! independent rays that share control flow; a single [`Ray`] is a convenience
//! for building packets and for reading results back.

use glam::Vec3A;

use crate::packet::{Lanes, MAX_LANES, Vec3Packet};

/// Ray in 3D space defined by origin and direction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    /// Starting point of the ray in world coordinates.
    pub origin: Vec3A,

    /// Direction of the ray. The traversal expects unit length.
    pub direction: Vec3A,
}

impl Ray {
    /// Create a new ray with origin and direction.
    pub fn new(origin: Vec3A, direction: Vec3A) -> Self {
        Self { origin, direction }
    }

    /// Compute a point at parameter t along the ray.
    pub fn at(&self, t: f32) -> Vec3A {
        self.origin + t * self.direction
    }
}

/// `L::WIDTH` rays traced together, one per lane.
#[derive(Debug, Clone, Copy)]
pub struct RayPacket<L> {
    /// Ray origins.
    pub origin: Vec3Packet<L>,
    /// Unit ray directions.
    pub direction: Vec3Packet<L>,
}

impl<L: Lanes> RayPacket<L> {
    /// Packet from origin and direction registers.
    pub fn new(origin: Vec3Packet<L>, direction: Vec3Packet<L>) -> Self {
        Self { origin, direction }
    }

    /// Pack `L::WIDTH` rays. Directions are used as given.
    pub fn from_rays(rays: &[Ray]) -> Self {
        debug_assert_eq!(rays.len(), L::WIDTH);
        let mut origins = [Vec3A::ZERO; MAX_LANES];
        let mut directions = [Vec3A::ZERO; MAX_LANES];
        for (lane, ray) in rays.iter().enumerate() {
            origins[lane] = ray.origin;
            directions[lane] = ray.direction;
        }
        Self {
            origin: Vec3Packet::from_vectors(&origins[..L::WIDTH]),
            direction: Vec3Packet::from_vectors(&directions[..L::WIDTH]),
        }
    }

    /// Rays sharing one origin, as produced by a pinhole camera.
    pub fn from_directions(origin: Vec3A, directions: Vec3Packet<L>) -> Self {
        Self {
            origin: Vec3Packet::splat(origin),
            direction: directions,
        }
    }

    /// Per-lane point at parameter `t`.
    #[inline(always)]
    pub fn at(&self, t: L) -> Vec3Packet<L> {
        self.origin + self.direction * t
    }

    /// Read one lane back as a scalar ray.
    pub fn ray(&self, lane: usize) -> Ray {
        Ray::new(self.origin.extract(lane), self.direction.extract(lane))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wide::f32x4;

    #[test]
    fn packet_lanes_round_trip_rays() {
        let rays: Vec<Ray> = (0..4)
            .map(|i| Ray::new(Vec3A::splat(i as f32), Vec3A::new(0.0, 0.0, -1.0)))
            .collect();
        let packet = RayPacket::<f32x4>::from_rays(&rays);
        for (lane, ray) in rays.iter().enumerate() {
            assert_eq!(packet.ray(lane), *ray);
        }
        let points = packet.at(f32x4::splat(2.0));
        assert_eq!(points.extract(3), rays[3].at(2.0));
    }
}
