//! The worker pool that progressively fills the G-buffer.
//!
//! One OS thread per configured worker, each running an independent loop:
//! draw a Sobol point, trace the pixel block under it, scatter the results,
//! bump the counters, poll the shutdown flag. Workers share a [`RenderState`]
//! through an `Arc`; nothing in it is locked.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};

use glam::Vec4;
use log::{debug, info, warn};
use wide::{f32x4, f32x8};

use crate::camera::Camera;
use crate::config::{PacketWidth, TraceConfig};
use crate::error::RenderError;
use crate::frustum::{FrustumSource, FrustumView, SharedView};
use crate::gbuffer::{GBuffer, GBufferSnapshot};
use crate::packet::Lanes;
use crate::random::{stagger_delay, worker_rng};
use crate::sampler::{PixelBlock, SobolSampler};
use crate::stats::{Counters, Stats};
use crate::traversal::{Sphereflake, TraversalState};

/// Everything the workers and the driver share.
#[derive(Debug)]
pub struct RenderState {
    /// Camera frustum read by every worker at the start of a sample.
    pub view: SharedView,
    /// Nearest hit per pixel.
    pub gbuffer: GBuffer,
    /// Statistics shared by all workers.
    pub counters: Counters,
    shutdown: AtomicBool,
}

impl RenderState {
    /// Cleared state for an image of the given size.
    pub fn new(width: u32, height: u32, view: &FrustumView) -> Self {
        Self {
            view: SharedView::new(view),
            gbuffer: GBuffer::new(width, height),
            counters: Counters::new(),
            shutdown: AtomicBool::new(false),
        }
    }

    /// True once workers have been asked to stop.
    pub fn shutdown_requested(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }
}

/// Trace one pixel block against the current view and publish the results.
///
/// Lanes that miss write a zero position and normal, so a pixel that stops
/// being covered after a camera move is cleared by its next sample.
pub fn trace_block<L: Lanes>(flake: &Sphereflake, state: &RenderState, block: &PixelBlock<L>) {
    let view = state.view.load();
    let rays = block.rays(&view);
    let mut traversal = TraversalState::<L>::new();
    flake.trace(&rays, &mut traversal);

    let hits = traversal.hit_mask().bitmask();
    for (lane, &index) in block.indices().iter().enumerate() {
        let (position, normal) = if hits & (1 << lane) != 0 {
            (
                traversal.position.extract(lane).extend(1.0),
                traversal.normal.extract(lane).extend(0.0),
            )
        } else {
            (Vec4::ZERO, Vec4::ZERO)
        };
        state.gbuffer.write(index, position, normal);
    }

    state.counters.add_rays(L::WIDTH as u64);
    state.counters.record_depth(traversal.max_depth);
    if let Some(distance) = traversal.closest_distance() {
        state.counters.record_distance(distance);
    }
}

struct Worker {
    index: usize,
    seed: Option<u64>,
    stagger_ms: u64,
    flake: Arc<Sphereflake>,
    state: Arc<RenderState>,
}

impl Worker {
    fn run<L: Lanes>(self) {
        let mut rng = worker_rng(self.seed, self.index);
        let mut sampler = SobolSampler::from_rng(&mut rng);
        thread::sleep(stagger_delay(&mut rng, self.stagger_ms));

        let (width, height) = (self.state.gbuffer.width(), self.state.gbuffer.height());
        debug!("worker {} tracing {}-wide packets", self.index, L::WIDTH);
        while !self.state.shutdown_requested() {
            let Some(block) = PixelBlock::<L>::at(sampler.next_point(), width, height) else {
                warn!("worker {}: {width}x{height} image is smaller than one packet", self.index);
                return;
            };
            trace_block(&self.flake, &self.state, &block);
        }
        debug!("worker {} stopped after {} samples", self.index, sampler.index());
    }
}

/// Owns the worker pool and the state it renders into.
#[derive(Debug)]
pub struct Renderer {
    config: TraceConfig,
    flake: Arc<Sphereflake>,
    state: Arc<RenderState>,
    workers: Vec<JoinHandle<()>>,
}

impl Renderer {
    /// Validate `config` and allocate the G-buffer. No threads start until
    /// [`initialize`](Self::initialize). The initial view is
    /// [`Camera::for_image`].
    pub fn new(config: TraceConfig) -> Result<Self, RenderError> {
        config.validate()?;
        let view = Camera::for_image(config.width, config.height).frustum();
        Ok(Self {
            flake: Arc::new(Sphereflake::new(config.limits())),
            state: Arc::new(RenderState::new(config.width, config.height, &view)),
            workers: Vec::new(),
            config,
        })
    }

    /// Settings the pool is running with.
    pub fn config(&self) -> &TraceConfig {
        &self.config
    }

    /// State shared with the workers.
    pub fn state(&self) -> &Arc<RenderState> {
        &self.state
    }

    /// True between `initialize` and `shutdown`.
    pub fn is_running(&self) -> bool {
        !self.workers.is_empty()
    }

    /// Start the worker pool. Does nothing if it is already running.
    ///
    /// If a thread cannot be spawned, the workers already started are
    /// stopped and joined before the error is returned.
    pub fn initialize(&mut self) -> Result<(), RenderError> {
        if self.is_running() {
            warn!("render pool already running");
            return Ok(());
        }
        self.state.shutdown.store(false, Ordering::Relaxed);

        let threads = self.config.thread_count();
        let packet_width = self.config.packet_width;
        for index in 0..threads {
            let worker = Worker {
                index,
                seed: self.config.seed,
                stagger_ms: self.config.startup_stagger_ms,
                flake: Arc::clone(&self.flake),
                state: Arc::clone(&self.state),
            };
            let spawned = thread::Builder::new()
                .name(format!("sphereflake-worker-{index}"))
                .spawn(move || match packet_width {
                    PacketWidth::Four => worker.run::<f32x4>(),
                    PacketWidth::Eight => worker.run::<f32x8>(),
                });
            match spawned {
                Ok(handle) => self.workers.push(handle),
                Err(source) => {
                    warn!("failed to spawn worker {index}: {source}");
                    // A worker panic seen while unwinding is secondary to the spawn error.
                    let _ = self.shutdown();
                    return Err(RenderError::Spawn { index, source });
                }
            }
        }

        info!(
            "render pool started: {threads} workers, {}-wide packets, {}x{}",
            packet_width.lanes(),
            self.config.width,
            self.config.height
        );
        Ok(())
    }

    /// Signal every worker to stop and join them all.
    pub fn shutdown(&mut self) -> Result<(), RenderError> {
        if !self.is_running() {
            return Ok(());
        }
        self.state.shutdown.store(true, Ordering::Relaxed);
        let mut panicked = false;
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                panicked = true;
            }
        }
        info!("render pool stopped");
        if panicked {
            warn!("at least one worker panicked");
            return Err(RenderError::WorkerPanicked);
        }
        Ok(())
    }

    /// Publish a new frustum. Workers pick it up on their next sample.
    pub fn set_view(&self, view: &FrustumView) {
        if view.is_degenerate() {
            debug!("degenerate view: {view:?}");
        }
        self.state.view.store(view);
    }

    /// Pull the frustum from `source` and publish it.
    pub fn update_camera(&self, source: &impl FrustumSource) {
        self.set_view(&source.frustum());
    }

    /// The most recently published view.
    pub fn view(&self) -> FrustumView {
        self.state.view.load()
    }

    /// Copy of the G-buffer as it is right now.
    pub fn gbuffer(&self) -> GBufferSnapshot {
        self.state.gbuffer.snapshot()
    }

    /// Snapshot of the counters.
    pub fn stats(&self) -> Stats {
        self.state.counters.snapshot()
    }

    /// Reset every counter.
    pub fn reset_stats(&self) {
        self.state.counters.reset();
    }

    /// Restart the rays-per-second interval.
    pub fn reset_rays_per_second(&self) {
        self.state.counters.reset_rays_per_second();
    }

    /// Forget the deepest level reached.
    pub fn reset_max_depth(&self) {
        self.state.counters.reset_max_depth();
    }

    /// Forget the closest hit distance.
    pub fn reset_closest_distance(&self) {
        self.state.counters.reset_closest_distance();
    }

    /// Change the output resolution.
    ///
    /// A running pool is stopped, the G-buffer reallocated (cleared, with the
    /// current view kept) and the pool restarted. Counters start over.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<(), RenderError> {
        if (width, height) == (self.config.width, self.config.height) {
            return Ok(());
        }
        let resized = TraceConfig {
            width,
            height,
            ..self.config.clone()
        };
        resized.validate()?;

        let was_running = self.is_running();
        self.shutdown()?;
        let view = self.view();
        self.state = Arc::new(RenderState::new(width, height, &view));
        self.config = resized;
        info!("G-buffer resized to {width}x{height}");

        if was_running {
            self.initialize()?;
        }
        Ok(())
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        if let Err(err) = self.shutdown() {
            warn!("render pool shutdown on drop: {err}");
        }
    }
}
