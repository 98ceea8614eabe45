use std::time::{Duration, Instant};

use anyhow::Context;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info, warn};

mod cli;
mod logger;

use cli::Args;
use logger::init_logger;
use sphereflake::camera::Camera;
use sphereflake::output::{TevDisplay, save_gbuffer};
use sphereflake::renderer::Renderer;

/// Statistics are logged and reset this often.
const REPORT_INTERVAL: Duration = Duration::from_secs(1);

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    init_logger(args.debug_level.clone().into());

    // Log application startup with version information
    info!("Sphereflake - Git Version {} ({})", env!("GIT_HASH"), env!("GIT_DATE"));

    let config = args.trace_config().context("loading configuration")?;
    let mut camera = args.camera(&config).context("reading camera flags")?;
    info!(
        "Image resolution: {}x{}, {}-wide packets, {} threads, max depth {}, cull threshold {}",
        config.width,
        config.height,
        config.packet_width.lanes(),
        config.thread_count(),
        config.max_depth,
        config.cull_threshold
    );

    let mut renderer = Renderer::new(config).context("creating renderer")?;
    renderer.update_camera(&camera);

    let mut tev = args.tev_address().and_then(|address| match TevDisplay::connect(address) {
        Ok(display) => Some(display),
        Err(e) => {
            warn!("Failed to connect to TEV on {}: {}", address, e);
            None
        }
    });

    renderer.initialize().context("starting render pool")?;
    render_loop(&renderer, &mut camera, &args, &mut tev);
    renderer.shutdown().context("stopping render pool")?;

    let snapshot = renderer.gbuffer();
    let pixels = snapshot.positions.len();
    info!(
        "Sphereflake covers {} of {} pixels",
        snapshot.coverage(),
        pixels
    );
    if let Some(display) = tev.as_mut() {
        if let Err(e) = display.update(&snapshot) {
            warn!("Failed to send final G-buffer to TEV: {}", e);
        }
    }
    save_gbuffer(&snapshot, &args.output);
    Ok(())
}

/// Drive the pool for `args.seconds`: push the camera every frame, upload to
/// TEV, and once per interval report and reset the statistics.
fn render_loop(renderer: &Renderer, camera: &mut Camera, args: &Args, tev: &mut Option<TevDisplay>) {
    let frame = Duration::from_secs_f32(1.0 / args.fps.max(1) as f32);
    let total = Duration::from_secs_f32(args.seconds.max(0.0));

    let pb = ProgressBar::new(total.as_millis() as u64);
    match ProgressStyle::default_bar().template("{bar:40} {elapsed}/{duration} {msg}") {
        Ok(style) => pb.set_style(style),
        Err(e) => debug!("Progress bar template rejected: {}", e),
    }

    let start = Instant::now();
    let mut last_frame = start;
    let mut report_start = start;
    let mut frames = 0u32;
    renderer.reset_stats();

    while start.elapsed() < total {
        std::thread::sleep(frame);
        let now = Instant::now();

        if args.orbit != 0.0 {
            let dt = now.duration_since(last_frame).as_secs_f32();
            camera.orbit((args.orbit * dt).to_radians());
        }
        renderer.update_camera(camera);
        last_frame = now;
        frames += 1;

        if let Some(display) = tev.as_mut() {
            if let Err(e) = display.update(&renderer.gbuffer()) {
                warn!("Lost TEV connection to {}: {}", display.address(), e);
                *tev = None;
            }
        }

        let interval = now.duration_since(report_start);
        if interval >= REPORT_INTERVAL {
            let stats = renderer.stats();
            let fps = frames as f64 / interval.as_secs_f64();
            let closest = stats
                .closest_sphere_distance
                .map_or_else(|| "-".to_string(), |d| format!("{d:.3}"));
            let message = format!(
                "{fps:.0} fps, depth {}, closest {closest}, {:.2} Mrays/s",
                stats.max_depth_reached,
                stats.rays_per_second / 1e6
            );
            debug!("{}", message);
            pb.set_message(message);
            renderer.reset_stats();
            report_start = now;
            frames = 0;
        }

        pb.set_position(start.elapsed().as_millis() as u64);
    }

    pb.finish();
    info!("Rendered for {:.2?}", start.elapsed());
}
