//! Sphereflake packet ray tracer
//!
//! Traces an infinitely recursive fractal of spheres without storing any
//! geometry. A pool of worker threads samples pixels progressively, walks the
//! procedural sphere tree with 4- or 8-wide SIMD ray packets and writes the
//! nearest hit's position and normal into a shared G-buffer.
//!
//! Start with [`renderer::Renderer`]; the traversal itself lives in
//! [`traversal::Sphereflake`].

#![warn(missing_docs)]
#![warn(rustdoc::broken_intra_doc_links)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod camera;
pub mod config;
pub mod error;
pub mod frustum;
pub mod gbuffer;
pub mod output;
pub mod packet;
pub mod random;
pub mod ray;
pub mod renderer;
pub mod sampler;
pub mod sphere;
pub mod stats;
pub mod topology;
pub mod traversal;

pub use camera::Camera;
pub use config::{PacketWidth, TraceConfig};
pub use error::{ConfigError, RenderError};
pub use frustum::{FrustumSource, FrustumView};
pub use gbuffer::GBufferSnapshot;
pub use renderer::Renderer;
pub use stats::Stats;
