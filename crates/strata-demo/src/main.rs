mod app;
mod scene;

use anyhow::{Context, Result};
use winit::event_loop::EventLoop;

use strata_engine::logging::{init_logging, LoggingConfig};

fn main() -> Result<()> {
    init_logging(LoggingConfig::default());

    let event_loop = EventLoop::new().context("failed to create winit EventLoop")?;
    let mut app = app::DemoApp::default();
    event_loop
        .run_app(&mut app)
        .context("winit event loop terminated with error")?;

    app.into_result()
}
