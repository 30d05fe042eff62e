//! Coordinate and geometry types shared by the layer tree, surfaces and batches.
//!
//! Canonical CPU space:
//! - Logical pixels (DPI-aware)
//! - Origin top-left
//! - +X right, +Y down
//!
//! Batches emit geometry in this space; backends convert to NDC using the
//! viewport of the bound target.

mod rect;
mod transform;
mod vec2;
mod viewport;

pub use rect::Rect;
pub use transform::Transform;
pub use vec2::Vec2;
pub use viewport::Viewport;
