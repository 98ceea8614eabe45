//! Running render statistics shared by every worker.
//!
//! All counters are relaxed atomics: workers bump them after every packet and
//! the driver reads and resets them once per reporting interval. A reset that
//! races an update may lose that update, which only affects the next report.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Instant;

/// A point-in-time copy of the counters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stats {
    /// Rays traced since the last rays-per-second reset, divided by the time
    /// elapsed since that reset.
    pub rays_per_second: f64,
    /// Rays traced since the last rays-per-second reset.
    pub rays_traced: u64,
    /// Deepest node any packet entered since the last depth reset.
    pub max_depth_reached: u32,
    /// Nearest hit distance seen since the last reset, if any ray hit.
    pub closest_sphere_distance: Option<f32>,
}

/// Lock-free counters updated by the workers.
#[derive(Debug)]
pub struct Counters {
    epoch: Instant,
    rays: AtomicU64,
    /// Nanoseconds after `epoch` at which the ray count was last reset.
    interval_start: AtomicU64,
    max_depth: AtomicU32,
    /// Bits of a non-negative `f32`, so integer order matches float order.
    closest_distance: AtomicU32,
}

impl Default for Counters {
    fn default() -> Self {
        Self::new()
    }
}

impl Counters {
    /// Zeroed counters; the rate interval starts now.
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
            rays: AtomicU64::new(0),
            interval_start: AtomicU64::new(0),
            max_depth: AtomicU32::new(0),
            closest_distance: AtomicU32::new(f32::INFINITY.to_bits()),
        }
    }

    fn now_nanos(&self) -> u64 {
        self.epoch.elapsed().as_nanos() as u64
    }

    /// Count `count` more traced rays.
    #[inline]
    pub fn add_rays(&self, count: u64) {
        self.rays.fetch_add(count, Ordering::Relaxed);
    }

    /// Raise the maximum depth to `depth`.
    #[inline]
    pub fn record_depth(&self, depth: u32) {
        self.max_depth.fetch_max(depth, Ordering::Relaxed);
    }

    /// Keep the smaller of the stored and the given distance. Negative or NaN
    /// distances are ignored.
    #[inline]
    pub fn record_distance(&self, distance: f32) {
        if distance >= 0.0 {
            self.closest_distance
                .fetch_min(distance.to_bits(), Ordering::Relaxed);
        }
    }

    /// Read every counter.
    pub fn snapshot(&self) -> Stats {
        let rays_traced = self.rays.load(Ordering::Relaxed);
        let start = self.interval_start.load(Ordering::Relaxed);
        let elapsed = self.now_nanos().saturating_sub(start) as f64 * 1e-9;
        let rays_per_second = if elapsed > 0.0 {
            rays_traced as f64 / elapsed
        } else {
            0.0
        };
        let closest = f32::from_bits(self.closest_distance.load(Ordering::Relaxed));
        Stats {
            rays_per_second,
            rays_traced,
            max_depth_reached: self.max_depth.load(Ordering::Relaxed),
            closest_sphere_distance: closest.is_finite().then_some(closest),
        }
    }

    /// Zero the ray count and restart the rate interval.
    pub fn reset_rays_per_second(&self) {
        self.rays.store(0, Ordering::Relaxed);
        self.interval_start.store(self.now_nanos(), Ordering::Relaxed);
    }

    /// Forget the deepest level reached.
    pub fn reset_max_depth(&self) {
        self.max_depth.store(0, Ordering::Relaxed);
    }

    /// Forget the closest hit distance.
    pub fn reset_closest_distance(&self) {
        self.closest_distance
            .store(f32::INFINITY.to_bits(), Ordering::Relaxed);
    }

    /// Reset every counter and restart the rate interval.
    pub fn reset(&self) {
        self.reset_rays_per_second();
        self.reset_max_depth();
        self.reset_closest_distance();
    }
}
