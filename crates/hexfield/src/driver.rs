use std::time::{Duration, Instant};

use tracing::{debug, info, trace, warn};

use crate::bootstrap::RenderContext;
use crate::error::{BootstrapError, HostError};
use crate::host::{FrameToken, ListenerToken, Surface};
use crate::shader::ShaderSources;

/// Drives one [`RenderContext`] from the host's display-refresh ticks.
///
/// The driver owns its surface. Every tick writes the elapsed time, draws
/// once and asks for the next tick; stale or late ticks are dropped. The
/// loop ends with [`FrameDriver::stop`], or when the driver is dropped.
pub struct FrameDriver<S: Surface> {
    surface: S,
    render: RenderContext<S::Context>,
    started: Instant,
    pending: Option<FrameToken>,
    listener: Option<ListenerToken>,
    stats: FrameStats,
    stopped: bool,
}

impl<S: Surface> FrameDriver<S> {
    /// Bootstraps the program on `surface`, subscribes to resizes, sizes the
    /// viewport once and schedules the first tick. `now` is time zero.
    pub fn start(mut surface: S, sources: &ShaderSources, now: Instant) -> Result<Self, BootstrapError> {
        let mut render = RenderContext::bootstrap(&mut surface, sources)?;
        let listener = surface.add_resize_listener();
        let (width, height) = surface.size();
        render.resize(width, height);
        let pending = surface.request_frame();
        info!(width, height, "frame driver started");

        Ok(Self {
            surface,
            render,
            started: now,
            pending: Some(pending),
            listener: Some(listener),
            stats: FrameStats::new(now),
            stopped: false,
        })
    }

    /// Handles one display-refresh tick.
    ///
    /// Returns `Ok(false)` when `token` is not the tick currently scheduled.
    /// The next tick is requested even when the draw fails so the caller can
    /// recover the surface and keep going.
    pub fn on_frame(&mut self, token: FrameToken, now: Instant) -> Result<bool, HostError> {
        if self.stopped || self.pending != Some(token) {
            trace!(?token, pending = ?self.pending, "ignoring stale frame");
            return Ok(false);
        }

        let seconds = self.elapsed(now).as_secs_f32();
        self.render.set_time(seconds);
        let drawn = self.render.draw();
        self.pending = Some(self.surface.request_frame());
        self.stats.record(now, seconds);
        drawn.map(|()| true)
    }

    /// Forwards a surface resize to the render context.
    pub fn on_resize(&mut self, width: u32, height: u32) {
        if self.stopped {
            return;
        }
        debug!(width, height, "surface resized");
        self.render.resize(width, height);
    }

    /// Cancels the pending tick, drops the resize subscription and releases
    /// every GPU resource. Failures are logged, never returned.
    pub fn stop(mut self) {
        self.release();
    }

    pub fn pending_frame(&self) -> Option<FrameToken> {
        self.pending
    }

    pub fn listener(&self) -> Option<ListenerToken> {
        self.listener
    }

    pub fn resolution(&self) -> (u32, u32) {
        self.render.resolution()
    }

    pub fn frame_count(&self) -> u64 {
        self.stats.frame_count
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    fn elapsed(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.started)
    }

    fn release(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;

        if let Some(token) = self.pending.take() {
            if let Err(err) = self.surface.cancel_frame(token) {
                warn!(?token, error = %err, "failed to cancel pending frame");
            }
        }
        if let Some(listener) = self.listener.take() {
            if let Err(err) = self.surface.remove_resize_listener(listener) {
                warn!(?listener, error = %err, "failed to remove resize listener");
            }
        }
        let failures = self.render.teardown();
        debug!(
            frames = self.stats.frame_count,
            release_failures = failures.len(),
            "frame driver stopped"
        );
    }
}

impl<S: Surface> Drop for FrameDriver<S> {
    fn drop(&mut self) {
        self.release();
    }
}

struct FrameStats {
    frame_count: u64,
    frames_since_last_update: u32,
    last_fps_update: Instant,
    frames_per_second: f32,
}

impl FrameStats {
    fn new(now: Instant) -> Self {
        Self {
            frame_count: 0,
            frames_since_last_update: 0,
            last_fps_update: now,
            frames_per_second: 0.0,
        }
    }

    fn record(&mut self, now: Instant, time: f32) {
        self.frame_count += 1;
        self.frames_since_last_update += 1;
        let elapsed = now.saturating_duration_since(self.last_fps_update);
        if elapsed >= Duration::from_secs(1) {
            self.frames_per_second = self.frames_since_last_update as f32 / elapsed.as_secs_f32();
            self.frames_since_last_update = 0;
            self.last_fps_update = now;
            debug!(
                fps = self.frames_per_second.round(),
                frame_count = self.frame_count,
                time,
                "render stats"
            );
        }
    }
}
