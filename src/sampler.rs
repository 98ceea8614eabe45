//! Low-discrepancy pixel selection for the workers.
//!
//! Each worker draws points from its own scrambled 2D Sobol sequence and maps
//! them to a small block of neighboring pixels, one pixel per packet lane.

use rand::Rng;

use crate::frustum::FrustumView;
use crate::packet::{Lanes, MAX_LANES};
use crate::ray::RayPacket;

/// First two dimensions of the Sobol sequence with a random digital shift.
///
/// Dimension 0 is the base-2 radical inverse of the index; dimension 1 uses
/// the direction numbers `v_k = v_{k-1} ^ (v_{k-1} >> 1)`. XOR-ing a scramble
/// into both keeps the stratification of every power-of-two prefix.
pub fn sobol_2d(index: u32, scramble: [u32; 2]) -> [u32; 2] {
    let first = index.reverse_bits();

    let mut second = 0u32;
    let mut bits = index;
    let mut direction = 1u32 << 31;
    while bits != 0 {
        if bits & 1 != 0 {
            second ^= direction;
        }
        bits >>= 1;
        direction ^= direction >> 1;
    }

    [first ^ scramble[0], second ^ scramble[1]]
}

/// Map 32 random bits to `[0, 1)`, keeping the 24 bits an `f32` can hold.
#[inline]
fn unit_interval(bits: u32) -> f32 {
    (bits >> 8) as f32 * (1.0 / (1u32 << 24) as f32)
}

/// One worker's position in its Sobol stream.
#[derive(Debug, Clone)]
pub struct SobolSampler {
    index: u32,
    scramble: [u32; 2],
}

impl SobolSampler {
    /// Start at index 0 with the given per-dimension scramble.
    pub fn new(scramble: [u32; 2]) -> Self {
        Self { index: 0, scramble }
    }

    /// Sampler with a scramble drawn from `rng`.
    pub fn from_rng<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self::new([rng.random(), rng.random()])
    }

    /// Index of the next point.
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Next point in `[0, 1)²`. The index wraps after 2³² samples.
    pub fn next_point(&mut self) -> (f32, f32) {
        let [x, y] = sobol_2d(self.index, self.scramble);
        self.index = self.index.wrapping_add(1);
        (unit_interval(x), unit_interval(y))
    }
}

/// Shape of the pixel block traced by one packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Footprint {
    /// Pixels across.
    pub cols: u32,
    /// Pixels down.
    pub rows: u32,
}

impl Footprint {
    /// 1x1 for a single lane, 2x2 for four, 4x2 for eight.
    pub fn for_lanes(lanes: usize) -> Self {
        match lanes {
            1 => Self { cols: 1, rows: 1 },
            4 => Self { cols: 2, rows: 2 },
            8 => Self { cols: 4, rows: 2 },
            n => Self {
                cols: n as u32,
                rows: 1,
            },
        }
    }

    /// Whether the block fits inside a `width x height` image at all.
    pub fn fits(&self, width: u32, height: u32) -> bool {
        self.cols <= width && self.rows <= height
    }
}

/// Pixels covered by one packet together with their image coordinates.
#[derive(Debug, Clone, Copy)]
pub struct PixelBlock<L> {
    /// Normalized horizontal coordinate of each lane's pixel center.
    pub u: L,
    /// Normalized vertical coordinate, growing downward.
    pub v: L,
    /// Flat G-buffer index per lane; only the first `L::WIDTH` are used.
    pub indices: [usize; MAX_LANES],
}

impl<L: Lanes> PixelBlock<L> {
    /// Place the footprint so a point in `[0, 1)²` picks its top-left pixel.
    /// The block always lies wholly inside the image; returns `None` when the
    /// image is smaller than the footprint.
    pub fn at(point: (f32, f32), width: u32, height: u32) -> Option<Self> {
        let footprint = Footprint::for_lanes(L::WIDTH);
        if !footprint.fits(width, height) {
            return None;
        }
        let span_x = width - footprint.cols;
        let span_y = height - footprint.rows;
        let x0 = ((point.0 * (span_x + 1) as f32) as u32).min(span_x);
        let y0 = ((point.1 * (span_y + 1) as f32) as u32).min(span_y);

        let mut us = [0.0; MAX_LANES];
        let mut vs = [0.0; MAX_LANES];
        let mut indices = [0; MAX_LANES];
        for lane in 0..L::WIDTH {
            let x = x0 + lane as u32 % footprint.cols;
            let y = y0 + lane as u32 / footprint.cols;
            us[lane] = (x as f32 + 0.5) / width as f32;
            vs[lane] = (y as f32 + 0.5) / height as f32;
            indices[lane] = x as usize + y as usize * width as usize;
        }

        Some(Self {
            u: L::from_slice(&us[..L::WIDTH]),
            v: L::from_slice(&vs[..L::WIDTH]),
            indices,
        })
    }

    /// Primary rays through every lane's pixel.
    #[inline]
    pub fn rays(&self, view: &FrustumView) -> RayPacket<L> {
        RayPacket::from_directions(view.origin, view.directions(self.u, self.v))
    }

    /// G-buffer index of each lane, in lane order.
    pub fn indices(&self) -> &[usize] {
        &self.indices[..L::WIDTH]
    }
}
