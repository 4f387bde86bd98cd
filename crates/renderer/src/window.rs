use std::sync::Arc;
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use winit::dpi::PhysicalSize;
use winit::event::{Event, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::window::{Window, WindowBuilder};

use crate::device::{DeviceError, RenderDevice};
use crate::frame::{FrameDriver, FrameState, FrameTick, NextTick, Session};
use crate::gpu::GpuState;
use crate::runtime::{time_source_for_policy, BoxedTimeSource, FrameScheduler};
use crate::types::RendererConfig;

/// Per-window state carried through the event loop.
///
/// `gpu` is declared before `window` so the surface is released while the
/// window is still alive.
struct WindowState {
    gpu: GpuState,
    window: Arc<Window>,
    driver: FrameDriver,
    frame: FrameState,
    scheduler: FrameScheduler,
    time_source: BoxedTimeSource,
    redraw_requested: bool,
}

/// Outcome of one redraw callback.
enum FrameOutcome {
    Presented,
    Throttled,
    Fatal,
}

impl WindowState {
    fn new(window: Arc<Window>, config: &RendererConfig) -> Result<Self> {
        let mut gpu = GpuState::new(
            window.as_ref(),
            window.inner_size(),
            config.color_space,
            config.power,
        )?;

        let session = Session::build(&mut gpu, &config.scene)
            .with_context(|| format!("failed to prepare scene `{}`", config.scene.name))?;
        let mut driver = FrameDriver::new();
        driver.start(session)?;

        Ok(Self {
            gpu,
            window,
            driver,
            frame: config.policy.initial_frame_state(),
            scheduler: FrameScheduler::new(config.policy.target_fps()),
            time_source: time_source_for_policy(&config.policy),
            redraw_requested: true,
        })
    }

    fn resize(&mut self, new_size: PhysicalSize<u32>) {
        tracing::debug!(width = new_size.width, height = new_size.height, "surface resized");
        self.gpu.resize(new_size);
    }

    fn render_frame(&mut self) -> FrameOutcome {
        let now = Instant::now();
        if !self.scheduler.ready_for_frame(now) {
            return FrameOutcome::Throttled;
        }

        let tick = FrameTick {
            timestamp_ms: self.time_source.sample_ms(),
            surface_size: self.gpu.surface_size(),
        };
        let (next, plan) = match self.driver.on_frame(self.frame, tick) {
            Ok(result) => result,
            Err(err) => {
                tracing::error!(error = %err, "failed to plan frame");
                return FrameOutcome::Fatal;
            }
        };

        match self.gpu.submit(&plan) {
            Ok(()) => {}
            Err(DeviceError::Surface(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated)) => {
                self.gpu.resize(self.gpu.size());
                return FrameOutcome::Throttled;
            }
            Err(DeviceError::Surface(wgpu::SurfaceError::OutOfMemory)) => {
                tracing::error!("surface out of memory; exiting");
                return FrameOutcome::Fatal;
            }
            Err(DeviceError::Surface(wgpu::SurfaceError::Timeout)) => {
                tracing::warn!("surface timeout; retrying next frame");
                return FrameOutcome::Throttled;
            }
            Err(err) => {
                tracing::warn!(error = %err, "frame submission failed; retrying next frame");
                return FrameOutcome::Throttled;
            }
        }

        self.frame = next;
        self.scheduler.mark_rendered(now);
        self.redraw_requested = plan.next == NextTick::Requested;
        if self.frame.frame_index() == 1 {
            tracing::info!("first frame presented");
        }
        FrameOutcome::Presented
    }
}

/// Opens the window and drives the `winit` event loop until it closes.
///
/// Each redraw samples the time source, asks the [`FrameDriver`] for a plan
/// and submits it; the plan's follow-up request keeps the loop animating.
pub(crate) fn run(config: &RendererConfig) -> Result<()> {
    let event_loop = EventLoop::new().context("failed to initialize event loop")?;
    let window_size = PhysicalSize::new(config.surface_size.0, config.surface_size.1);
    let window = WindowBuilder::new()
        .with_title(config.title.as_str())
        .with_inner_size(window_size)
        .build(&event_loop)
        .context("failed to create window")?;
    let window = Arc::new(window);

    let mut state = WindowState::new(window.clone(), config)?;
    state.window.request_redraw();

    event_loop
        .run(move |event, elwt| {
            elwt.set_control_flow(ControlFlow::Wait);

            match event {
                Event::WindowEvent { window_id, event } if window_id == state.window.id() => {
                    match event {
                        WindowEvent::CloseRequested | WindowEvent::Destroyed => {
                            elwt.exit();
                        }
                        WindowEvent::Resized(new_size) => {
                            state.resize(new_size);
                        }
                        WindowEvent::RedrawRequested => match state.render_frame() {
                            FrameOutcome::Presented | FrameOutcome::Throttled => {}
                            FrameOutcome::Fatal => elwt.exit(),
                        },
                        _ => {}
                    }
                }
                Event::AboutToWait => {
                    if !state.redraw_requested {
                        return;
                    }
                    match state.scheduler.next_deadline() {
                        Some(deadline) if deadline > Instant::now() => {
                            elwt.set_control_flow(ControlFlow::WaitUntil(deadline));
                        }
                        _ => state.window.request_redraw(),
                    }
                }
                Event::NewEvents(winit::event::StartCause::ResumeTimeReached { .. }) => {
                    state.window.request_redraw();
                }
                _ => {}
            }
        })
        .map_err(|err| anyhow!("event loop error: {err}"))
}
