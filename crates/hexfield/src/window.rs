use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use tracing::{debug, error, info, trace, warn};
use winit::dpi::PhysicalSize;
use winit::event::{Event, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::window::{Window, WindowBuilder};

use crate::driver::FrameDriver;
use crate::error::HostError;
use crate::gpu::WgpuContext;
use crate::host::{FrameToken, ListenerToken, Surface};
use crate::shader::ShaderSources;
use crate::types::RendererConfig;

/// Pending redraw bookkeeping for the preview window.
///
/// Holds at most one outstanding token and the instant it becomes due. With
/// an FPS cap every request after the first is due one interval later.
#[derive(Debug)]
pub(crate) struct FrameSchedule {
    interval: Option<Duration>,
    next_token: u64,
    pending: Option<(FrameToken, Instant)>,
    primed: bool,
}

impl FrameSchedule {
    pub(crate) fn new(interval: Option<Duration>) -> Self {
        Self {
            interval,
            next_token: 0,
            pending: None,
            primed: false,
        }
    }

    pub(crate) fn request(&mut self, now: Instant) -> FrameToken {
        self.next_token += 1;
        let token = FrameToken(self.next_token);
        let due = match self.interval {
            Some(interval) if self.primed => now + interval,
            _ => now,
        };
        self.pending = Some((token, due));
        self.primed = true;
        token
    }

    pub(crate) fn cancel(&mut self, token: FrameToken) {
        if matches!(self.pending, Some((pending, _)) if pending == token) {
            self.pending = None;
        }
    }

    /// The pending token once its due time has passed.
    pub(crate) fn ready(&self, now: Instant) -> Option<FrameToken> {
        self.pending
            .filter(|(_, due)| *due <= now)
            .map(|(token, _)| token)
    }

    /// Makes the pending token due at `now` and returns it. Used when the
    /// compositor asks for a redraw outside the cap, e.g. after a resize.
    pub(crate) fn expedite(&mut self, now: Instant) -> Option<FrameToken> {
        let (token, due) = self.pending.as_mut()?;
        *due = (*due).min(now);
        Some(*token)
    }

    pub(crate) fn deadline(&self) -> Option<Instant> {
        self.pending.map(|(_, due)| due)
    }
}

/// [`Surface`] backed by a winit window.
pub struct WindowSurface {
    window: Arc<Window>,
    renderer: RendererConfig,
    schedule: FrameSchedule,
    next_listener: u64,
    listener: Option<ListenerToken>,
}

impl WindowSurface {
    pub fn new(window: Arc<Window>, renderer: RendererConfig) -> Self {
        let schedule = FrameSchedule::new(renderer.frame_interval());
        Self {
            window,
            renderer,
            schedule,
            next_listener: 0,
            listener: None,
        }
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    fn wants_resize_events(&self) -> bool {
        self.listener.is_some()
    }
}

impl Surface for WindowSurface {
    type Context = WgpuContext;

    fn acquire_context(&mut self) -> Result<WgpuContext, HostError> {
        WgpuContext::new(self.window.clone(), &self.renderer)
            .map_err(|err| HostError::Backend(format!("{err:#}")))
    }

    fn size(&self) -> (u32, u32) {
        let size = self.window.inner_size();
        (size.width, size.height)
    }

    fn request_frame(&mut self) -> FrameToken {
        self.schedule.request(Instant::now())
    }

    fn cancel_frame(&mut self, token: FrameToken) -> Result<(), HostError> {
        self.schedule.cancel(token);
        Ok(())
    }

    fn add_resize_listener(&mut self) -> ListenerToken {
        self.next_listener += 1;
        let token = ListenerToken(self.next_listener);
        self.listener = Some(token);
        token
    }

    fn remove_resize_listener(&mut self, token: ListenerToken) -> Result<(), HostError> {
        match self.listener {
            Some(current) if current == token => {
                self.listener = None;
                Ok(())
            }
            _ => Err(HostError::AlreadyReleased("resize listener")),
        }
    }
}

/// Opens a preview window and animates the bundled field until it is closed.
pub fn run_preview(config: RendererConfig) -> Result<()> {
    let event_loop = EventLoop::new().map_err(|err| anyhow!("failed to create event loop: {err}"))?;
    let (width, height) = config.surface_size;
    let window = WindowBuilder::new()
        .with_title(config.title.clone())
        .with_inner_size(PhysicalSize::new(width.max(1), height.max(1)))
        .build(&event_loop)
        .map_err(|err| anyhow!("failed to create preview window: {err}"))?;
    let window = Arc::new(window);

    let surface = WindowSurface::new(window.clone(), config.clone());
    let driver = FrameDriver::start(surface, &ShaderSources::bundled(), Instant::now())
        .context("failed to initialise window renderer")?;
    info!(
        width,
        height,
        fps = ?config.target_fps,
        vsync = config.vsync,
        "preview window running"
    );

    let mut driver = Some(driver);
    let run_result = event_loop.run(move |event, elwt| match event {
        Event::WindowEvent { window_id, event } if window_id == window.id() => match event {
            WindowEvent::CloseRequested | WindowEvent::Destroyed => {
                if let Some(driver) = driver.take() {
                    driver.stop();
                }
                elwt.exit();
            }
            WindowEvent::Resized(new_size) => {
                if let Some(driver) = driver.as_mut() {
                    if driver.surface().wants_resize_events() {
                        driver.on_resize(new_size.width, new_size.height);
                        // Show the new size now rather than at the next capped tick.
                        if driver.surface_mut().schedule.expedite(Instant::now()).is_some() {
                            driver.surface().window().request_redraw();
                        }
                    }
                }
            }
            WindowEvent::RedrawRequested => {
                let Some(active) = driver.as_mut() else {
                    return;
                };
                let now = Instant::now();
                let token = match active.surface().schedule.ready(now) {
                    Some(token) => token,
                    None => {
                        trace!("off-schedule redraw; drawing the pending frame early");
                        let Some(token) = active.surface_mut().schedule.expedite(now) else {
                            return;
                        };
                        token
                    }
                };
                match active.on_frame(token, now) {
                    Ok(_) => {}
                    Err(HostError::SurfaceLost) => {
                        let (width, height) = active.surface().size();
                        active.on_resize(width, height);
                    }
                    Err(HostError::Timeout) => {
                        warn!("surface timeout; retrying next frame");
                    }
                    Err(HostError::OutOfMemory) => {
                        error!("surface out of memory; exiting preview");
                        if let Some(driver) = driver.take() {
                            driver.stop();
                        }
                        elwt.exit();
                    }
                    Err(other) => {
                        warn!(error = %other, "frame failed; retrying next frame");
                    }
                }
            }
            _ => {}
        },
        Event::AboutToWait => {
            let Some(active) = driver.as_ref() else {
                elwt.set_control_flow(ControlFlow::Wait);
                return;
            };
            let schedule = &active.surface().schedule;
            let now = Instant::now();
            if schedule.ready(now).is_some() {
                trace!("scheduler: issuing redraw now");
                active.surface().window().request_redraw();
                elwt.set_control_flow(ControlFlow::Wait);
            } else if let Some(deadline) = schedule.deadline() {
                trace!(
                    deadline_ms = deadline.saturating_duration_since(now).as_millis(),
                    "scheduler: waiting until next frame"
                );
                elwt.set_control_flow(ControlFlow::WaitUntil(deadline));
            } else {
                elwt.set_control_flow(ControlFlow::Wait);
            }
        }
        Event::LoopExiting => {
            if let Some(driver) = driver.take() {
                debug!("event loop exiting; stopping frame driver");
                driver.stop();
            }
        }
        _ => {}
    });

    run_result.map_err(|err| anyhow!("window event loop error: {err}"))
}
