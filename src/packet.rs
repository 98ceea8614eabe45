//! SIMD lanes and 3-vector packets.
//!
//! A [`Vec3Packet`] stores each component of N vectors in its own register
//! (structure of arrays), so every operation runs across all lanes at once.
//! Comparisons return lane masks with every bit set for `true`; those masks
//! drive the branch-free [`Lanes::select`] merge that replaces per-ray `if`s.

use std::fmt::Debug;
use std::ops::{Add, Div, Mul, Neg, Sub};

use glam::{Mat4, Vec3A};
use wide::{CmpGe, CmpGt, CmpLe, CmpLt, f32x4, f32x8};

/// Widest packet supported by the crate.
pub const MAX_LANES: usize = 8;

/// A register of `WIDTH` independent `f32` lanes.
///
/// Implemented for [`f32x4`], [`f32x8`] and plain `f32`, the last being a
/// one-lane reference used to check the wide paths against.
pub trait Lanes:
    Copy
    + Debug
    + Send
    + Sync
    + 'static
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Div<Output = Self>
    + Neg<Output = Self>
{
    /// Number of lanes.
    const WIDTH: usize;

    /// Broadcast one value to every lane.
    fn splat(value: f32) -> Self;

    /// Load lanes from a slice of exactly `WIDTH` values.
    fn from_slice(values: &[f32]) -> Self;

    /// Read a single lane.
    fn lane(self, index: usize) -> f32;

    /// Per-lane square root.
    fn sqrt(self) -> Self;

    /// Reciprocal square root; may be a hardware estimate.
    fn rsqrt(self) -> Self;

    /// Mask of lanes where `self < rhs`.
    fn lt_mask(self, rhs: Self) -> Self;
    /// Mask of lanes where `self <= rhs`.
    fn le_mask(self, rhs: Self) -> Self;
    /// Mask of lanes where `self > rhs`.
    fn gt_mask(self, rhs: Self) -> Self;
    /// Mask of lanes where `self >= rhs`.
    fn ge_mask(self, rhs: Self) -> Self;

    /// Bitwise AND of two masks (or a mask and a value).
    fn and(self, rhs: Self) -> Self;

    /// Bitwise OR of two masks.
    fn or(self, rhs: Self) -> Self;

    /// `!self & rhs`: clears the lanes of `rhs` where the mask `self` is set.
    fn and_not(self, rhs: Self) -> Self;

    /// Per-lane `if self { if_true } else { if_false }` without branching.
    fn select(self, if_true: Self, if_false: Self) -> Self;

    /// One bit per lane, taken from the lane's sign bit. Lane 0 is bit 0.
    fn bitmask(self) -> u32;

    /// True if any lane of the mask is set.
    #[inline(always)]
    fn any(self) -> bool {
        self.bitmask() != 0
    }

    /// Mask with no lane set.
    #[inline(always)]
    fn none() -> Self {
        Self::splat(0.0)
    }
}

macro_rules! impl_wide_lanes {
    ($t:ident, $width:literal) => {
        impl Lanes for $t {
            const WIDTH: usize = $width;

            #[inline(always)]
            fn splat(value: f32) -> Self {
                $t::splat(value)
            }

            #[inline(always)]
            fn from_slice(values: &[f32]) -> Self {
                let mut lanes = [0.0; $width];
                lanes.copy_from_slice(values);
                $t::from(lanes)
            }

            #[inline(always)]
            fn lane(self, index: usize) -> f32 {
                self.to_array()[index]
            }

            #[inline(always)]
            fn sqrt(self) -> Self {
                $t::sqrt(self)
            }

            #[inline(always)]
            fn rsqrt(self) -> Self {
                $t::recip_sqrt(self)
            }

            #[inline(always)]
            fn lt_mask(self, rhs: Self) -> Self {
                CmpLt::cmp_lt(self, rhs)
            }

            #[inline(always)]
            fn le_mask(self, rhs: Self) -> Self {
                CmpLe::cmp_le(self, rhs)
            }

            #[inline(always)]
            fn gt_mask(self, rhs: Self) -> Self {
                CmpGt::cmp_gt(self, rhs)
            }

            #[inline(always)]
            fn ge_mask(self, rhs: Self) -> Self {
                CmpGe::cmp_ge(self, rhs)
            }

            #[inline(always)]
            fn and(self, rhs: Self) -> Self {
                self & rhs
            }

            #[inline(always)]
            fn or(self, rhs: Self) -> Self {
                self | rhs
            }

            #[inline(always)]
            fn and_not(self, rhs: Self) -> Self {
                self.blend($t::splat(0.0), rhs)
            }

            #[inline(always)]
            fn select(self, if_true: Self, if_false: Self) -> Self {
                self.blend(if_true, if_false)
            }

            #[inline(always)]
            fn bitmask(self) -> u32 {
                self.move_mask() as u32
            }
        }
    };
}

impl_wide_lanes!(f32x4, 4);
impl_wide_lanes!(f32x8, 8);

#[inline(always)]
fn scalar_mask(set: bool) -> f32 {
    if set { f32::from_bits(u32::MAX) } else { 0.0 }
}

impl Lanes for f32 {
    const WIDTH: usize = 1;

    #[inline(always)]
    fn splat(value: f32) -> Self {
        value
    }

    #[inline(always)]
    fn from_slice(values: &[f32]) -> Self {
        values[0]
    }

    #[inline(always)]
    fn lane(self, _index: usize) -> f32 {
        self
    }

    #[inline(always)]
    fn sqrt(self) -> Self {
        f32::sqrt(self)
    }

    #[inline(always)]
    fn rsqrt(self) -> Self {
        1.0 / f32::sqrt(self)
    }

    #[inline(always)]
    fn lt_mask(self, rhs: Self) -> Self {
        scalar_mask(self < rhs)
    }

    #[inline(always)]
    fn le_mask(self, rhs: Self) -> Self {
        scalar_mask(self <= rhs)
    }

    #[inline(always)]
    fn gt_mask(self, rhs: Self) -> Self {
        scalar_mask(self > rhs)
    }

    #[inline(always)]
    fn ge_mask(self, rhs: Self) -> Self {
        scalar_mask(self >= rhs)
    }

    #[inline(always)]
    fn and(self, rhs: Self) -> Self {
        f32::from_bits(self.to_bits() & rhs.to_bits())
    }

    #[inline(always)]
    fn or(self, rhs: Self) -> Self {
        f32::from_bits(self.to_bits() | rhs.to_bits())
    }

    #[inline(always)]
    fn and_not(self, rhs: Self) -> Self {
        f32::from_bits(!self.to_bits() & rhs.to_bits())
    }

    #[inline(always)]
    fn select(self, if_true: Self, if_false: Self) -> Self {
        let mask = self.to_bits();
        f32::from_bits((mask & if_true.to_bits()) | (!mask & if_false.to_bits()))
    }

    #[inline(always)]
    fn bitmask(self) -> u32 {
        self.to_bits() >> 31
    }
}

/// N three-component vectors, one per lane.
#[derive(Clone, Copy, Debug)]
pub struct Vec3Packet<L> {
    /// X components.
    pub x: L,
    /// Y components.
    pub y: L,
    /// Z components.
    pub z: L,
}

impl<L: Lanes> Vec3Packet<L> {
    /// Packet from its three component registers.
    #[inline(always)]
    pub fn new(x: L, y: L, z: L) -> Self {
        Self { x, y, z }
    }

    /// Every lane set to the zero vector.
    #[inline(always)]
    pub fn zero() -> Self {
        Self::splat(Vec3A::ZERO)
    }

    /// Broadcast one vector to every lane.
    #[inline(always)]
    pub fn splat(v: Vec3A) -> Self {
        Self {
            x: L::splat(v.x),
            y: L::splat(v.y),
            z: L::splat(v.z),
        }
    }

    /// Gather `L::WIDTH` vectors into a packet, lane `i` taking `vectors[i]`.
    pub fn from_vectors(vectors: &[Vec3A]) -> Self {
        debug_assert_eq!(vectors.len(), L::WIDTH);
        let mut xs = [0.0; MAX_LANES];
        let mut ys = [0.0; MAX_LANES];
        let mut zs = [0.0; MAX_LANES];
        for (lane, v) in vectors.iter().enumerate() {
            xs[lane] = v.x;
            ys[lane] = v.y;
            zs[lane] = v.z;
        }
        Self {
            x: L::from_slice(&xs[..L::WIDTH]),
            y: L::from_slice(&ys[..L::WIDTH]),
            z: L::from_slice(&zs[..L::WIDTH]),
        }
    }

    /// Read back the vector held in one lane.
    #[inline]
    pub fn extract(&self, lane: usize) -> Vec3A {
        Vec3A::new(self.x.lane(lane), self.y.lane(lane), self.z.lane(lane))
    }

    /// Per-lane dot product.
    #[inline(always)]
    pub fn dot(&self, rhs: &Self) -> L {
        self.x * rhs.x + self.y * rhs.y + self.z * rhs.z
    }

    /// Per-lane squared length.
    #[inline(always)]
    pub fn length_squared(&self) -> L {
        self.dot(self)
    }

    /// Unit-length copy using the reciprocal square root estimate refined by
    /// one Newton-Raphson step. Zero-length lanes come out as NaN.
    #[inline(always)]
    pub fn normalize(self) -> Self {
        let length_squared = self.length_squared();
        let estimate = length_squared.rsqrt();
        let refined = L::splat(0.5)
            * estimate
            * (L::splat(3.0) - length_squared * estimate * estimate);
        self * refined
    }

    /// Per-lane choice between two packets.
    #[inline(always)]
    pub fn select(mask: L, if_true: &Self, if_false: &Self) -> Self {
        Self {
            x: mask.select(if_true.x, if_false.x),
            y: mask.select(if_true.y, if_false.y),
            z: mask.select(if_true.z, if_false.z),
        }
    }

    /// Keep only the lanes where `mask` is set, zeroing the rest.
    #[inline(always)]
    pub fn and(&self, mask: L) -> Self {
        Self {
            x: mask.and(self.x),
            y: mask.and(self.y),
            z: mask.and(self.z),
        }
    }

    /// Zero the lanes where `mask` is set.
    #[inline(always)]
    pub fn and_not(&self, mask: L) -> Self {
        Self {
            x: mask.and_not(self.x),
            y: mask.and_not(self.y),
            z: mask.and_not(self.z),
        }
    }

    /// Lane-wise bitwise OR, used to merge two disjointly masked packets.
    #[inline(always)]
    pub fn or(&self, rhs: &Self) -> Self {
        Self {
            x: self.x.or(rhs.x),
            y: self.y.or(rhs.y),
            z: self.z.or(rhs.z),
        }
    }

    /// Transform every lane as a point (w = 1) by an affine matrix.
    #[inline]
    pub fn transform_point(&self, m: &Mat4) -> Self {
        let column = |c: glam::Vec4| Vec3Packet::<L>::splat(Vec3A::new(c.x, c.y, c.z));
        let (cx, cy, cz, cw) = (
            column(m.x_axis),
            column(m.y_axis),
            column(m.z_axis),
            column(m.w_axis),
        );
        cx * self.x + cy * self.y + cz * self.z + cw
    }
}

impl<L: Lanes> Add for Vec3Packet<L> {
    type Output = Self;

    #[inline(always)]
    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl<L: Lanes> Sub for Vec3Packet<L> {
    type Output = Self;

    #[inline(always)]
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl<L: Lanes> Mul<L> for Vec3Packet<L> {
    type Output = Self;

    #[inline(always)]
    fn mul(self, scalar: L) -> Self {
        Self::new(self.x * scalar, self.y * scalar, self.z * scalar)
    }
}

impl<L: Lanes> Div<L> for Vec3Packet<L> {
    type Output = Self;

    #[inline(always)]
    fn div(self, scalar: L) -> Self {
        Self::new(self.x / scalar, self.y / scalar, self.z / scalar)
    }
}

impl<L: Lanes> Neg for Vec3Packet<L> {
    type Output = Self;

    #[inline(always)]
    fn neg(self) -> Self {
        Self::new(-self.x, -self.y, -self.z)
    }
}
