//! Impact - continuous collision between a skinned body and a swept tool
//!
//! Each frame skins the body at the first and last animation frames and the
//! tool at its two captured poses, finds when the tool sweep first touches the
//! body, and holds the displayed blend at that instant.

mod camera;
mod demo;
mod input;
mod settings;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use winit::{
    application::ApplicationHandler,
    dpi::LogicalSize,
    event::{DeviceEvent, DeviceId, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    window::{Window, WindowId},
};

use impact_core::{FrameClock, TimeConfig};
use impact_skinning::{CpuSkinner, SkinningDispatcher};

use demo::{DemoState, FrameReport};
use input::{DemoAction, InputHandler, InputState};
use settings::{DemoSettings, RunSettings, WindowSettings};

/// Window-driven application state
struct DemoApp {
    window_settings: WindowSettings,
    window: Option<Arc<Window>>,
    demo: DemoState,
    input: InputHandler,
    clock: FrameClock,
    last_frame: Instant,
    failure: Option<anyhow::Error>,
}

impl DemoApp {
    fn new(demo: DemoState, window_settings: WindowSettings, run: &RunSettings) -> Self {
        Self {
            window_settings,
            window: None,
            demo,
            input: InputHandler::new(),
            clock: FrameClock::new(time_config(run)),
            last_frame: Instant::now(),
            failure: None,
        }
    }

    fn frame(&mut self, event_loop: &ActiveEventLoop) {
        let now = Instant::now();
        let raw_delta = now.duration_since(self.last_frame).as_secs_f32();
        self.last_frame = now;
        apply_time_controls(&mut self.clock, &self.input.state);
        self.clock.update(raw_delta);

        match self.demo.step(self.clock.delta_time, &self.input.state) {
            Ok(report) => {
                if let Some(window) = &self.window {
                    window.set_title(&window_title(&self.window_settings.title, &report));
                }
                if report.quit {
                    info!("Quit requested");
                    event_loop.exit();
                }
            }
            Err(e) => {
                error!("Frame {} failed: {:#}", self.clock.frame_count, e);
                self.failure = Some(e);
                event_loop.exit();
            }
        }

        self.input.end_frame();
    }
}

impl ApplicationHandler for DemoApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        event_loop.set_control_flow(ControlFlow::Poll);

        let attributes = Window::default_attributes()
            .with_title(self.window_settings.title.clone())
            .with_inner_size(LogicalSize::new(
                self.window_settings.width,
                self.window_settings.height,
            ));
        match event_loop.create_window(attributes) {
            Ok(window) => {
                info!(
                    "Window created ({}x{})",
                    self.window_settings.width, self.window_settings.height
                );
                self.last_frame = Instant::now();
                self.window = Some(Arc::new(window));
            }
            Err(e) => {
                self.failure = Some(anyhow::Error::new(e).context("Failed to create window"));
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, window_id: WindowId, event: WindowEvent) {
        let Some(window) = self.window.clone() else {
            return;
        };
        if window.id() != window_id {
            return;
        }

        match event {
            WindowEvent::CloseRequested => {
                info!("Window close requested");
                event_loop.exit();
            }
            WindowEvent::Focused(focused) => {
                self.input.set_cursor_captured(focused);
            }
            WindowEvent::KeyboardInput { event, .. } => {
                if !event.repeat {
                    self.input.handle_keyboard(event.physical_key, event.state);
                }
            }
            WindowEvent::MouseInput { state, button, .. } => {
                self.input.handle_mouse_button(button, state);
            }
            WindowEvent::RedrawRequested => {
                self.frame(event_loop);
            }
            _ => {}
        }
    }

    fn device_event(&mut self, _event_loop: &ActiveEventLoop, _device_id: DeviceId, event: DeviceEvent) {
        if let DeviceEvent::MouseMotion { delta } = event {
            self.input.handle_mouse_motion(delta);
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }
}

fn time_config(run: &RunSettings) -> TimeConfig {
    TimeConfig {
        time_scale: run.time_scale.max(0.0),
        max_delta_time: run.max_delta_time,
    }
}

/// Pause and time-scale keys act on the clock before it ticks
fn apply_time_controls(clock: &mut FrameClock, input: &InputState) {
    if input.is_just_pressed(DemoAction::Pause) {
        clock.toggle_pause();
        info!("{}", if clock.paused { "Paused" } else { "Resumed" });
    }
    if input.is_just_pressed(DemoAction::SlowerTime) {
        clock.set_time_scale(clock.config.time_scale * 0.5);
        info!("Time scale {:.3}", clock.config.time_scale);
    }
    if input.is_just_pressed(DemoAction::FasterTime) {
        clock.set_time_scale(clock.config.time_scale * 2.0);
        info!("Time scale {:.3}", clock.config.time_scale);
    }
}

fn window_title(title: &str, report: &FrameReport) -> String {
    match report.collision_t {
        Some(contact) => format!("{title} - contact at {contact:.4} - t = {:.3}", report.display_t),
        None => format!("{title} - no contact - t = {:.3}", report.display_t),
    }
}

#[cfg(feature = "gpu")]
fn select_dispatcher(run: &RunSettings) -> Box<dyn SkinningDispatcher> {
    if run.prefer_gpu {
        match impact_skinning::GpuSkinner::new() {
            Ok(gpu) => return Box::new(gpu),
            Err(e) => warn!("GPU skinning unavailable ({}), falling back to the CPU", e),
        }
    }
    Box::new(CpuSkinner::new())
}

#[cfg(not(feature = "gpu"))]
fn select_dispatcher(run: &RunSettings) -> Box<dyn SkinningDispatcher> {
    if run.prefer_gpu {
        warn!("Built without the `gpu` feature, skinning on the CPU");
    }
    Box::new(CpuSkinner::new())
}

/// Run a fixed number of frames without a window
fn run_headless(demo: &mut DemoState, run: &RunSettings, frames: u64) -> Result<Vec<FrameReport>> {
    let mut clock = FrameClock::new(time_config(run));
    let input = InputState::new();
    let mut reports = Vec::with_capacity(frames as usize);

    for _ in 0..frames {
        clock.update(run.fixed_delta);
        let report = demo.step(clock.delta_time, &input)?;
        info!(
            "Frame {}: phase {:.3}, contact {}, shown t = {:.3}",
            report.frame,
            report.phase,
            report
                .collision_t
                .map_or_else(|| "none".to_string(), |t| format!("{t:.4}")),
            report.display_t
        );
        debug!(
            "Skinned {} body and {} tool vertices, {} joint markers",
            report.body.vertex_count(),
            report.tool.vertex_count(),
            report.joints.len()
        );
        reports.push(report);
    }

    Ok(reports)
}

fn main() -> Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("Failed to set subscriber")?;

    info!("Starting impact...");

    let settings_path = std::env::args().nth(1).map(PathBuf::from);
    let settings = DemoSettings::load(settings_path.as_deref());

    let dispatcher = select_dispatcher(&settings.run);
    let mut demo = DemoState::load(&settings, dispatcher).context("Failed to set up the demo scene")?;

    if let Some(frames) = settings.run.headless_frames {
        info!("Running {} frames headless", frames);
        run_headless(&mut demo, &settings.run, frames)?;
        return Ok(());
    }

    let event_loop = EventLoop::new().context("Failed to create event loop")?;
    let mut app = DemoApp::new(demo, settings.window.clone(), &settings.run);
    event_loop.run_app(&mut app).context("Event loop failed")?;

    match app.failure {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
