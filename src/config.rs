//! Renderer configuration, loadable from TOML.

use std::num::NonZeroUsize;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::traversal::TraversalLimits;

/// SIMD width of the ray packets traced by each worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum PacketWidth {
    /// Four lanes (`f32x4`).
    Four,
    /// Eight lanes (`f32x8`).
    #[default]
    Eight,
}

impl PacketWidth {
    /// Rays per packet.
    pub fn lanes(self) -> usize {
        match self {
            Self::Four => 4,
            Self::Eight => 8,
        }
    }
}

impl TryFrom<u32> for PacketWidth {
    type Error = ConfigError;

    fn try_from(lanes: u32) -> Result<Self, Self::Error> {
        match lanes {
            4 => Ok(Self::Four),
            8 => Ok(Self::Eight),
            other => Err(ConfigError::Invalid(format!(
                "packet_width must be 4 or 8, got {other}"
            ))),
        }
    }
}

impl From<PacketWidth> for u32 {
    fn from(width: PacketWidth) -> Self {
        width.lanes() as u32
    }
}

/// Everything the renderer needs at construction time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TraceConfig {
    /// Output width in pixels.
    pub width: u32,
    /// Output height in pixels.
    pub height: u32,
    /// Rays traced together by each worker.
    pub packet_width: PacketWidth,
    /// Worker count; hardware concurrency when absent.
    pub threads: Option<usize>,
    /// Hard recursion bound.
    pub max_depth: u32,
    /// Angular-size cutoff, see [`TraversalLimits::cull_threshold`].
    pub cull_threshold: f32,
    /// Upper bound of each worker's random startup delay.
    pub startup_stagger_ms: u64,
    /// Fixed seed for the per-worker generators; random when absent.
    pub seed: Option<u64>,
}

impl Default for TraceConfig {
    fn default() -> Self {
        let limits = TraversalLimits::default();
        Self {
            width: 800,
            height: 600,
            packet_width: PacketWidth::default(),
            threads: None,
            max_depth: limits.max_depth,
            cull_threshold: limits.cull_threshold,
            startup_stagger_ms: 10,
            seed: None,
        }
    }
}

impl TraceConfig {
    /// Read a TOML file; missing keys take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text)
    }

    /// Parse a config from TOML text; missing keys take their defaults.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Reject settings the renderer cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.width == 0 || self.height == 0 {
            return Err(ConfigError::Invalid(
                "width and height must be positive".into(),
            ));
        }
        let lanes = self.packet_width.lanes();
        let footprint = crate::sampler::Footprint::for_lanes(lanes);
        if !footprint.fits(self.width, self.height) {
            return Err(ConfigError::Invalid(format!(
                "image must be at least {}x{} for {lanes}-wide packets",
                footprint.cols, footprint.rows
            )));
        }
        if self.threads == Some(0) {
            return Err(ConfigError::Invalid("threads must be at least 1".into()));
        }
        if self.max_depth == 0 {
            return Err(ConfigError::Invalid("max_depth must be at least 1".into()));
        }
        if !(self.cull_threshold.is_finite() && self.cull_threshold > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "cull_threshold must be a positive number, got {}",
                self.cull_threshold
            )));
        }
        Ok(())
    }

    /// Configured thread count, or the hardware concurrency.
    pub fn thread_count(&self) -> usize {
        self.threads.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(NonZeroUsize::get)
                .unwrap_or(1)
        })
    }

    /// Traversal termination settings.
    pub fn limits(&self) -> TraversalLimits {
        TraversalLimits {
            max_depth: self.max_depth,
            cull_threshold: self.cull_threshold,
        }
    }
}
