use crate::backend::TargetHandle;
use crate::coords::{Transform, Viewport};

/// Where a surface draws, and how its logical space maps onto it.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct RenderTarget {
    pub handle: TargetHandle,
    /// Logical size of the target.
    pub viewport: Viewport,
    /// Transform every paint pass starts from.
    pub base_transform: Transform,
}

impl RenderTarget {
    /// The window / default framebuffer.
    pub fn frame(viewport: Viewport) -> Self {
        Self {
            handle: TargetHandle::Frame,
            viewport,
            base_transform: Transform::IDENTITY,
        }
    }

    pub fn offscreen(id: u32, viewport: Viewport) -> Self {
        Self {
            handle: TargetHandle::Offscreen(id),
            viewport,
            base_transform: Transform::IDENTITY,
        }
    }

    pub fn with_base_transform(mut self, base: Transform) -> Self {
        self.base_transform = base;
        self
    }

    /// Uniform content scale, e.g. to draw in design units on a HiDPI target.
    pub fn with_scale(self, scale: f32) -> Self {
        let base = self.base_transform * Transform::scale(scale);
        self.with_base_transform(base)
    }
}

impl Default for RenderTarget {
    fn default() -> Self {
        Self::frame(Viewport::new(1.0, 1.0))
    }
}
