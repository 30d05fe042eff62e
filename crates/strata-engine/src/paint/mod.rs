//! Paint model shared between surfaces, batches and backends.
//!
//! Scope:
//! - color representation (linear premultiplied alpha)
//! - blend modes carried as explicit draw state
//!
//! Geometry types remain in `coords`.

pub mod blend;
pub mod color;

pub use blend::BlendMode;
pub use color::Color;
