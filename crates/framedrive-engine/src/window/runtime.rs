use std::sync::Arc;

use anyhow::{Context, Result};
use winit::application::ApplicationHandler;
use winit::dpi::LogicalSize;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowId};

use crate::config::DriverConfig;
use crate::device::{GpuContext, SwapSurface, WgpuBackend};
use crate::error::{ErrorClass, FrameError};
use crate::frame::{FrameSequencer, HostEvent, HostSurface, LoopControl};
use crate::pipeline::WgslCompiler;
use crate::quad;
use crate::resource::Rgba8Decoder;

/// Window configuration.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub title: String,
    pub initial_size: LogicalSize<f64>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            title: "framedrive".to_string(),
            initial_size: LogicalSize::new(1280.0, 720.0),
        }
    }
}

/// Failure that ended the driver, with the class it was reported under.
#[derive(Debug)]
pub struct DriverFailure {
    pub class: ErrorClass,
    pub error: anyhow::Error,
}

impl std::fmt::Display for DriverFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?} error: {:#}", self.class, self.error)
    }
}

impl std::error::Error for DriverFailure {}

/// Entry point for the windowed driver.
pub struct Runtime;

impl Runtime {
    /// Opens the window and renders until it is closed.
    ///
    /// Returns the number of frames rendered.
    pub fn run(config: DriverConfig) -> Result<u64> {
        let event_loop = EventLoop::new().context("failed to create winit EventLoop")?;
        let mut app = DriverApp::new(config);

        event_loop
            .run_app(&mut app)
            .context("winit event loop terminated with error")?;

        match app.failure {
            Some(failure) => Err(failure.into()),
            None => Ok(app.frames),
        }
    }
}

/// Close flag set by window events and observed once per frame.
#[derive(Debug, Default)]
struct WindowHost {
    close_requested: bool,
}

impl HostSurface for WindowHost {
    fn poll_events(&mut self) -> HostEvent {
        if self.close_requested {
            HostEvent::CloseRequested
        } else {
            HostEvent::None
        }
    }
}

struct Running {
    window: Arc<Window>,
    sequencer: FrameSequencer<WgpuBackend>,
}

struct DriverApp {
    config: DriverConfig,
    host: WindowHost,
    running: Option<Running>,
    failure: Option<DriverFailure>,
    frames: u64,
    finished: bool,
}

impl DriverApp {
    fn new(config: DriverConfig) -> Self {
        Self {
            config,
            host: WindowHost::default(),
            running: None,
            failure: None,
            frames: 0,
            finished: false,
        }
    }

    fn start(&self, event_loop: &ActiveEventLoop) -> Result<Running> {
        let rc = &self.config.runtime;
        let attrs = Window::default_attributes()
            .with_title(rc.title.clone())
            .with_inner_size(rc.initial_size);

        let window = Arc::new(
            event_loop
                .create_window(attrs)
                .context("failed to create window")?,
        );

        let init = self.config.gpu_init();
        let instance = GpuContext::create_instance(&init);
        let surface = SwapSurface::create(&instance, window.clone())?;
        let ctx = pollster::block_on(GpuContext::new(instance, Some(&surface), &init))?;
        let swap = SwapSurface::configure(&ctx, window.clone(), surface, &init)?;

        let sequencer = quad::assemble(ctx, swap, &self.config, &WgslCompiler, &Rgba8Decoder)?;
        log::info!("driver initialized");

        Ok(Running { window, sequencer })
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, class: ErrorClass, error: anyhow::Error) {
        log::error!("{class:?} error: {error:#}");
        self.failure = Some(DriverFailure { class, error });
        self.stop(event_loop);
    }

    fn fail_frame(&mut self, event_loop: &ActiveEventLoop, error: FrameError) {
        let class = error.class();
        self.fail(event_loop, class, error.into());
    }

    /// Drains outstanding GPU work, then drops every GPU object before exiting.
    fn stop(&mut self, event_loop: &ActiveEventLoop) {
        if let Some(mut running) = self.running.take() {
            self.frames = running.sequencer.frames();
            if let Err(e) = running.sequencer.shutdown() {
                log::error!("{:?} error during shutdown: {e}", e.class());
                if self.failure.is_none() {
                    self.failure = Some(DriverFailure {
                        class: e.class(),
                        error: e.into(),
                    });
                }
            }
        }
        self.finished = true;
        event_loop.exit();
    }

    fn tick(&mut self, event_loop: &ActiveEventLoop) {
        let Some(running) = self.running.as_mut() else {
            return;
        };
        match running.sequencer.tick(&mut self.host) {
            Ok(LoopControl::Continue) => {}
            Ok(LoopControl::Exit) => {
                log::info!("close requested after {} frames", running.sequencer.frames());
                self.stop(event_loop);
            }
            Err(e) => self.fail_frame(event_loop, e),
        }
    }
}

impl ApplicationHandler for DriverApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.running.is_some() || self.finished {
            return;
        }

        match self.start(event_loop) {
            Ok(running) => {
                running.window.request_redraw();
                self.running = Some(running);
            }
            Err(e) => self.fail(event_loop, ErrorClass::Initialization, e),
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.finished {
            event_loop.exit();
            return;
        }

        event_loop.set_control_flow(ControlFlow::Wait);

        if self.host.close_requested {
            // The sequencer sees the close on its next poll and stops without rendering.
            self.tick(event_loop);
            return;
        }

        if let Some(running) = &self.running {
            running.window.request_redraw();
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        if self.finished {
            return;
        }

        match event {
            WindowEvent::CloseRequested => {
                self.host.close_requested = true;
            }
            WindowEvent::Resized(size) => {
                if let Some(running) = self.running.as_mut() {
                    running.sequencer.backend_mut().resize(size);
                }
            }
            WindowEvent::ScaleFactorChanged { .. } => {
                if let Some(running) = self.running.as_mut() {
                    let size = running.window.inner_size();
                    running.sequencer.backend_mut().resize(size);
                }
            }
            WindowEvent::RedrawRequested => self.tick(event_loop),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_reports_close_once_flagged() {
        let mut host = WindowHost::default();
        assert_eq!(host.poll_events(), HostEvent::None);
        host.close_requested = true;
        assert_eq!(host.poll_events(), HostEvent::CloseRequested);
    }

    #[test]
    fn failure_display_names_the_class() {
        let f = DriverFailure {
            class: ErrorClass::Synchronization,
            error: anyhow::anyhow!("fence stuck"),
        };
        assert_eq!(f.to_string(), "Synchronization error: fence stuck");
    }
}
