//! strata engine crate.
//!
//! A 2D scene graph of layers painted through a batching [`surface::Surface`]
//! onto any [`backend::GraphicsBackend`]. The pipeline per frame:
//! `SceneDriver::on_frame` → layer traversal → surface state stacks → batch →
//! one backend draw call per run of identical draw state.

pub mod coords;
pub mod paint;

pub mod backend;
pub mod batch;
pub mod surface;

pub mod layer;
pub mod scene;

pub mod device;
pub mod error;
pub mod logging;
pub mod time;

#[cfg(test)]
mod testing;

pub use error::{RenderError, RenderResult};
