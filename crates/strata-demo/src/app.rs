use std::sync::Arc;

use anyhow::{Context, Result};
use winit::application::ApplicationHandler;
use winit::dpi::{LogicalSize, PhysicalSize};
use winit::event::{ElementState, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowId};

use strata_engine::coords::Viewport;
use strata_engine::device::{Gpu, GpuInit, WgpuBackend, WgpuBackendConfig};
use strata_engine::scene::{SceneConfig, SceneDriver};
use strata_engine::surface::RenderTarget;
use strata_engine::time::FrameClock;

use crate::scene;

struct DemoWindow {
    window: Arc<Window>,
    driver: SceneDriver,
    clock: FrameClock,
}

impl DemoWindow {
    fn create(event_loop: &ActiveEventLoop) -> Result<Self> {
        let attrs = Window::default_attributes()
            .with_title("strata demo")
            .with_inner_size(LogicalSize::new(960.0, 600.0));
        let window = Arc::new(
            event_loop
                .create_window(attrs)
                .context("failed to create window")?,
        );

        let gpu = pollster::block_on(Gpu::new(Arc::clone(&window), GpuInit::default()))
            .context("GPU initialization failed")?;
        let mut backend = WgpuBackend::new(gpu, WgpuBackendConfig::default());
        let assets = scene::Assets::load(&mut backend).context("failed to upload demo textures")?;

        let config = SceneConfig {
            clear_color: scene::BACKGROUND,
            target: RenderTarget::frame(logical_viewport(&window, window.inner_size())),
            ..SceneConfig::default()
        };
        let mut driver = SceneDriver::new(Box::new(backend), config);
        scene::populate(&mut driver, &assets).context("failed to build demo scene")?;

        Ok(Self {
            window,
            driver,
            clock: FrameClock::new(),
        })
    }

    fn resize(&mut self, size: PhysicalSize<u32>) {
        if let Some(backend) = self.driver.backend_mut::<WgpuBackend>() {
            backend.resize(size.width, size.height);
        }
        if size.width == 0 || size.height == 0 {
            return;
        }
        if let Err(e) = self.driver.resize(logical_viewport(&self.window, size)) {
            log::warn!("resize skipped: {e}");
        }
    }

    fn redraw(&mut self) {
        let time = self.clock.tick();
        if let Err(e) = self.driver.on_frame(&time) {
            log::warn!("frame {} dropped: {e}", time.frame_index);
        }
    }
}

fn logical_viewport(window: &Window, size: PhysicalSize<u32>) -> Viewport {
    let logical: LogicalSize<f32> = size.to_logical(window.scale_factor());
    Viewport::new(logical.width, logical.height)
}

/// winit host: one window, one scene driver, continuous redraw.
#[derive(Default)]
pub struct DemoApp {
    window: Option<DemoWindow>,
    failure: Option<anyhow::Error>,
}

impl DemoApp {
    /// Reports a startup failure recorded inside the event loop.
    pub fn into_result(self) -> Result<()> {
        match self.failure {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl ApplicationHandler for DemoApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        match DemoWindow::create(event_loop) {
            Ok(w) => {
                w.window.request_redraw();
                self.window = Some(w);
            }
            Err(e) => {
                log::error!("failed to create demo window: {e:#}");
                self.failure = Some(e);
                event_loop.exit();
            }
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        event_loop.set_control_flow(ControlFlow::Wait);
        if let Some(w) = &self.window {
            w.window.request_redraw();
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        let Some(w) = self.window.as_mut() else {
            return;
        };

        match event {
            WindowEvent::CloseRequested => {
                self.window = None;
                event_loop.exit();
            }
            WindowEvent::KeyboardInput { event, .. }
                if event.state == ElementState::Pressed
                    && event.physical_key == PhysicalKey::Code(KeyCode::Escape) =>
            {
                self.window = None;
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                w.resize(size);
                w.window.request_redraw();
            }
            WindowEvent::ScaleFactorChanged { .. } => {
                let size = w.window.inner_size();
                w.resize(size);
                w.window.request_redraw();
            }
            WindowEvent::RedrawRequested => w.redraw(),
            _ => {}
        }
    }
}
