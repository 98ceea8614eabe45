//! Random number generation for the worker pool.
//!
//! Every worker owns a ChaCha20 generator. It scrambles the worker's Sobol
//! stream and picks the startup delay, so with a fixed seed each worker's
//! sample sequence is reproducible.

use std::time::Duration;

use rand::{Rng, SeedableRng, rng};
use rand_chacha::ChaCha20Rng;

/// Generator for worker `index`.
///
/// With a seed, workers share the key and differ by ChaCha stream, so their
/// sequences never overlap. Without one, each is seeded from the OS.
pub fn worker_rng(seed: Option<u64>, index: usize) -> ChaCha20Rng {
    match seed {
        Some(seed) => {
            let mut generator = ChaCha20Rng::seed_from_u64(seed);
            generator.set_stream(index as u64);
            generator
        }
        None => ChaCha20Rng::from_rng(&mut rng()),
    }
}

/// Uniform delay in `[0, max_ms]` milliseconds, at microsecond resolution.
pub fn stagger_delay<R: Rng + ?Sized>(rng: &mut R, max_ms: u64) -> Duration {
    if max_ms == 0 {
        return Duration::ZERO;
    }
    Duration::from_micros(rng.random_range(0..=max_ms.saturating_mul(1000)))
}
