use super::{Rect, Vec2};

/// Logical size of a render target.
///
/// The surface draws in this space; backends map it onto the target's
/// physical pixels.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
}

impl Viewport {
    #[inline]
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    #[inline]
    pub fn is_valid(self) -> bool {
        self.width > 0.0 && self.height > 0.0 && self.width.is_finite() && self.height.is_finite()
    }

    /// Full-viewport rect anchored at the origin.
    #[inline]
    pub fn bounds(self) -> Rect {
        Rect::from_size(self.width, self.height)
    }

    /// Physical pixels per logical pixel on a `width`×`height` target.
    ///
    /// An invalid viewport maps 1:1.
    #[inline]
    pub fn scale_to(self, width: u32, height: u32) -> Vec2 {
        if self.is_valid() {
            Vec2::new(width as f32 / self.width, height as f32 / self.height)
        } else {
            Vec2::splat(1.0)
        }
    }
}
