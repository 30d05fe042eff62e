//! wgpu device, surface and the hardware backend.
//!
//! [`Gpu`] owns the instance/adapter/device/queue and the window surface.
//! [`WgpuBackend`] wraps it as a [`crate::backend::GraphicsBackend`].

mod gpu;
mod init;
mod pipeline;
mod surface;
mod wgpu_backend;

pub use gpu::Gpu;
pub use init::{GpuInit, WgpuBackendConfig};
pub use wgpu_backend::WgpuBackend;
