// SPDX-License-Identifier: CEPL-1.0
//! The application window, driven by pumping the winit event loop from the
//! frame loop instead of handing control to `run_app`.

use std::time::Duration;

use anyhow::{bail, Result};
use prism_render::{RenderSize, SurfaceProvider};
use tracing::{debug, info};

pub use winit;

use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    error::OsError,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, EventLoop},
    platform::pump_events::{EventLoopExtPumpEvents, PumpStatus},
    raw_window_handle::{
        DisplayHandle, HandleError, HasDisplayHandle, HasWindowHandle, WindowHandle,
    },
    window::{Window, WindowId},
};

#[derive(Clone, Debug)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "prism".into(),
            width: 800,
            height: 600,
        }
    }
}

/// What the event handler has seen since the last query.
struct WindowState {
    cfg: WindowConfig,
    created: Option<Window>,
    error: Option<OsError>,
    id: Option<WindowId>,
    size: RenderSize,
    resized: bool,
    close_requested: bool,
}

impl WindowState {
    fn new(cfg: WindowConfig) -> Self {
        let size = RenderSize::new(cfg.width, cfg.height);
        Self {
            cfg,
            created: None,
            error: None,
            id: None,
            size,
            resized: false,
            close_requested: false,
        }
    }

    fn handle(&mut self, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                info!("CloseRequested");
                self.close_requested = true;
            }
            WindowEvent::Resized(size) => {
                debug!("Resized -> {}x{}", size.width, size.height);
                self.size = RenderSize::new(size.width, size.height);
                self.resized = true;
            }
            _ => {}
        }
    }
}

impl ApplicationHandler for WindowState {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.id.is_some() {
            return;
        }
        let attrs = Window::default_attributes()
            .with_title(self.cfg.title.clone())
            .with_inner_size(PhysicalSize::new(self.cfg.width, self.cfg.height))
            .with_resizable(true);
        match event_loop.create_window(attrs) {
            Ok(window) => {
                let size = window.inner_size();
                self.size = RenderSize::new(size.width, size.height);
                self.id = Some(window.id());
                self.created = Some(window);
            }
            Err(e) => {
                self.error = Some(e);
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, _event_loop: &ActiveEventLoop, id: WindowId, event: WindowEvent) {
        if self.id == Some(id) {
            self.handle(event);
        }
    }
}

pub struct PlatformWindow {
    window: Window,
    state: WindowState,
    event_loop: EventLoop<()>,
}

impl PlatformWindow {
    pub fn new(cfg: WindowConfig) -> Result<Self> {
        let mut event_loop = EventLoop::new()?;
        let mut state = WindowState::new(cfg);

        let window = loop {
            let status = event_loop.pump_app_events(Some(Duration::ZERO), &mut state);
            if let Some(e) = state.error.take() {
                return Err(e.into());
            }
            if let Some(window) = state.created.take() {
                break window;
            }
            if let PumpStatus::Exit(code) = status {
                bail!("event loop exited ({code}) before the window was created");
            }
        };

        info!(
            "window \"{}\" {}x{}",
            state.cfg.title, state.size.width, state.size.height
        );
        Ok(Self {
            window,
            state,
            event_loop,
        })
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    fn pump(&mut self, timeout: Option<Duration>) {
        if let PumpStatus::Exit(_) = self.event_loop.pump_app_events(timeout, &mut self.state) {
            self.state.close_requested = true;
        }
    }
}

impl SurfaceProvider for PlatformWindow {
    fn extent(&self) -> RenderSize {
        self.state.size
    }

    fn should_close(&self) -> bool {
        self.state.close_requested
    }

    fn poll_events(&mut self) {
        self.pump(Some(Duration::ZERO));
    }

    fn wait_events(&mut self) {
        self.pump(None);
    }

    fn was_resized(&self) -> bool {
        self.state.resized
    }

    fn reset_resized_flag(&mut self) {
        self.state.resized = false;
    }
}

impl HasWindowHandle for PlatformWindow {
    fn window_handle(&self) -> Result<WindowHandle<'_>, HandleError> {
        self.window.window_handle()
    }
}

impl HasDisplayHandle for PlatformWindow {
    fn display_handle(&self) -> Result<DisplayHandle<'_>, HandleError> {
        self.window.display_handle()
    }
}
