//! Error types for the renderer and its configuration.

use std::io;
use std::path::PathBuf;

/// Ways that loading or checking a [`TraceConfig`](crate::config::TraceConfig) can fail.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("cannot read config file {path}: {source}")]
    Io {
        /// File that was being read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// The config file is not valid TOML for these settings.
    #[error("cannot parse config file: {0}")]
    Parse(#[from] toml::de::Error),
    /// A value is out of range; the message names the field.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Ways that starting or resizing the worker pool can fail.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum RenderError {
    /// The requested settings were rejected.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// The OS refused to create a worker thread. Workers spawned before the
    /// failure have already been stopped and joined.
    #[error("failed to spawn worker {index}: {source}")]
    Spawn {
        /// Position of the worker in the pool.
        index: usize,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// A worker thread panicked; the others were still joined.
    #[error("a worker thread panicked")]
    WorkerPanicked,
}
