use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use glam::Vec3A;
use log::LevelFilter;

use sphereflake::camera::Camera;
use sphereflake::config::{PacketWidth, TraceConfig};
use sphereflake::error::ConfigError;

/// Custom enum for log levels that can be used with clap's ValueEnum
#[derive(Debug, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convert our custom LogLevel enum to log crate's LevelFilter
impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}

/// Command line arguments structure using clap derive macros
#[derive(Parser, Debug)]
#[command(name = "sphereflake")]
#[command(about = "Progressive packet ray tracer for an infinite sphereflake")]
pub struct Args {
    /// TOML file with renderer settings; flags below override it
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Set the logging level (defaults to "info")
    #[arg(long, default_value = "info", help = "Set the logging level")]
    pub debug_level: LogLevel,

    /// Image width in pixels
    #[arg(long, help = "Image width in pixels")]
    pub width: Option<u32>,

    /// Image height in pixels
    #[arg(long, help = "Image height in pixels")]
    pub height: Option<u32>,

    /// How long to render before saving and exiting
    #[arg(long, short = 's', default_value = "5", help = "Seconds to render")]
    pub seconds: f32,

    /// View updates (and TEV uploads) per second
    #[arg(long, default_value = "30")]
    pub fps: u32,

    /// Rays per packet: 4 or 8
    #[arg(long)]
    pub packet_width: Option<u32>,

    /// Worker threads (defaults to hardware concurrency)
    #[arg(long, short = 't')]
    pub threads: Option<usize>,

    #[arg(long)]
    pub max_depth: Option<u32>,

    #[arg(long)]
    pub cull_threshold: Option<f32>,

    /// Seed for reproducible sampling
    #[arg(long)]
    pub seed: Option<u64>,

    /// Camera position as x,y,z
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
    pub eye: Option<Vec<f32>>,

    /// Camera target as x,y,z
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
    pub look_at: Option<Vec<f32>>,

    /// Vertical field of view in degrees
    #[arg(long, default_value = "60")]
    pub vfov: f32,

    /// Orbit speed around the target, in degrees per second
    #[arg(long, default_value = "0", allow_negative_numbers = true)]
    pub orbit: f32,

    /// Send the G-buffer to TEV for real-time visualization
    #[arg(long, help = "Send the G-buffer to TEV for real-time visualization")]
    pub tev: bool,

    /// TEV client IP address and port (automatically enables --tev)
    #[arg(long, help = "TEV client IP address and port (automatically enables --tev)")]
    pub tev_address: Option<String>,

    /// Output file path (.png for encoded normals, .exr for positions and normals)
    #[arg(short, long, default_value = "sphereflake.png")]
    pub output: PathBuf,
}

fn point(values: &[f32], flag: &str) -> Result<Vec3A, ConfigError> {
    match values {
        [x, y, z] => Ok(Vec3A::new(*x, *y, *z)),
        _ => Err(ConfigError::Invalid(format!(
            "--{flag} takes three comma-separated numbers"
        ))),
    }
}

impl Args {
    /// Load the config file if one was given, then apply the flag overrides.
    pub fn trace_config(&self) -> Result<TraceConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => TraceConfig::load(path)?,
            None => TraceConfig::default(),
        };
        self.apply(&mut config)?;
        Ok(config)
    }

    /// Overwrite `config` with every flag that was given.
    pub fn apply(&self, config: &mut TraceConfig) -> Result<(), ConfigError> {
        if let Some(width) = self.width {
            config.width = width;
        }
        if let Some(height) = self.height {
            config.height = height;
        }
        if let Some(lanes) = self.packet_width {
            config.packet_width = PacketWidth::try_from(lanes)?;
        }
        if let Some(threads) = self.threads {
            config.threads = Some(threads);
        }
        if let Some(max_depth) = self.max_depth {
            config.max_depth = max_depth;
        }
        if let Some(cull_threshold) = self.cull_threshold {
            config.cull_threshold = cull_threshold;
        }
        if let Some(seed) = self.seed {
            config.seed = Some(seed);
        }
        Ok(())
    }

    /// Starting camera for an image of the configured size.
    pub fn camera(&self, config: &TraceConfig) -> Result<Camera, ConfigError> {
        let mut camera = Camera::for_image(config.width, config.height);
        camera.vfov = self.vfov;
        if let Some(eye) = &self.eye {
            camera.lookfrom = point(eye, "eye")?;
        }
        if let Some(target) = &self.look_at {
            camera.lookat = point(target, "look-at")?;
        }
        Ok(camera)
    }

    pub fn tev_address(&self) -> Option<&str> {
        match (&self.tev_address, self.tev) {
            (Some(address), _) => Some(address),
            (None, true) => Some("localhost"),
            (None, false) => None,
        }
    }
}
