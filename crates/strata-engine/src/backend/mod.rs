//! Backend capability interface.
//!
//! The core never talks to a graphics API directly. Surfaces and batches go
//! through [`GraphicsBackend`], passing every piece of pipeline state
//! (texture, blend mode, scissor) explicitly with each submission so that no
//! ambient backend state leaks between frames.
//!
//! Two implementations ship with the engine:
//! - [`SoftwareBackend`]: CPU rasterizer, used headless and in tests
//! - `device::WgpuBackend`: the hardware path

mod records;
mod software;

use std::any::Any;

use thiserror::Error;

use crate::coords::{Rect, Viewport};
use crate::paint::{BlendMode, Color};

pub use records::{QuadInstance, TriangleVertex, QUAD_CORNERS, QUAD_TRIANGLE_ORDER};
pub use software::{SoftwareBackend, SoftwareStats};

/// Opaque reference to a texture owned by the backend.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct TextureHandle(pub u32);

/// A texture together with its pixel size.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct Image {
    pub texture: TextureHandle,
    pub width: u32,
    pub height: u32,
}

impl Image {
    pub const fn new(texture: TextureHandle, width: u32, height: u32) -> Self {
        Self { texture, width, height }
    }

    /// Natural size in logical pixels, anchored at the origin.
    #[inline]
    pub fn bounds(&self) -> Rect {
        Rect::from_size(self.width as f32, self.height as f32)
    }

    /// Converts a source region in pixels to normalized UVs.
    #[inline]
    pub fn uv_of(&self, region: Rect) -> Rect {
        self.bounds().normalize_within(region)
    }
}

/// Render target selector.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
pub enum TargetHandle {
    /// The window / default framebuffer.
    #[default]
    Frame,
    /// A backend-owned offscreen target.
    Offscreen(u32),
}

/// Optional backend features the core probes for.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Capability {
    /// Instanced draws of per-quad records (required by `UniformBatch`).
    Instancing,
    /// Offscreen render targets.
    OffscreenTargets,
}

/// Static backend limits relevant to batching.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct BackendLimits {
    /// Largest number of quad instances accepted by one instanced draw.
    pub max_instances_per_draw: usize,
    /// Largest texture edge in pixels.
    pub max_texture_size: u32,
}

impl Default for BackendLimits {
    fn default() -> Self {
        Self {
            max_instances_per_draw: 4096,
            max_texture_size: 8192,
        }
    }
}

/// Pipeline state shared by every primitive in one draw call.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct DrawState {
    /// `None` draws untextured (texel = opaque white).
    pub texture: Option<TextureHandle>,
    pub blend: BlendMode,
    /// Screen-space scissor in logical pixels. `None` = whole target.
    pub scissor: Option<Rect>,
}

/// Primitive payload of one draw call.
#[derive(Debug, Copy, Clone)]
pub enum DrawData<'a> {
    /// One record per quad, expanded by the backend (instanced draw).
    Instances(&'a [QuadInstance]),
    /// Pre-transformed triangle list, three vertices per triangle.
    Triangles(&'a [TriangleVertex]),
}

impl DrawData<'_> {
    #[inline]
    pub fn is_empty(&self) -> bool {
        match self {
            DrawData::Instances(v) => v.is_empty(),
            DrawData::Triangles(v) => v.is_empty(),
        }
    }
}

/// One draw call as handed to [`GraphicsBackend::submit_draw`].
#[derive(Debug, Copy, Clone)]
pub struct DrawSubmission<'a> {
    pub data: DrawData<'a>,
    pub state: DrawState,
    /// Quads for `Instances`, triangles for `Triangles`.
    pub primitive_count: usize,
}

/// Failures reported by a backend.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BackendError {
    #[error("capability not supported by this backend")]
    Unsupported,
    #[error("draw call failed: {0}")]
    DrawFailed(String),
    #[error("render target unavailable: {0}")]
    TargetUnavailable(String),
    #[error("unknown texture {0:?}")]
    UnknownTexture(TextureHandle),
    #[error("unknown render target {0:?}")]
    UnknownTarget(TargetHandle),
    #[error("no render target bound")]
    NoTargetBound,
    #[error("invalid resource: {0}")]
    InvalidResource(String),
    #[error("graphics device lost")]
    Lost,
}

/// Converts a logical-pixel scissor rect to physical pixel bounds `(x, y, w, h)`.
///
/// Returns `None` if the clip is zero-area (the draw should be skipped).
/// `clip = None` means "no scissor" and yields the full target.
pub(crate) fn logical_clip_to_pixels(
    clip: Option<Rect>,
    scale_x: f32,
    scale_y: f32,
    target_w: u32,
    target_h: u32,
) -> Option<(u32, u32, u32, u32)> {
    let (x, y, w, h) = match clip {
        None => (0, 0, target_w, target_h),
        Some(r) => {
            let r = r.normalized();
            let x = ((r.origin.x * scale_x).round().max(0.0) as u32).min(target_w);
            let y = ((r.origin.y * scale_y).round().max(0.0) as u32).min(target_h);
            let x2 = (((r.origin.x + r.size.x) * scale_x).round().max(0.0) as u32).min(target_w);
            let y2 = (((r.origin.y + r.size.y) * scale_y).round().max(0.0) as u32).min(target_h);
            (x, y, x2.saturating_sub(x), y2.saturating_sub(y))
        }
    };

    if w == 0 || h == 0 { None } else { Some((x, y, w, h)) }
}

/// Narrow capability interface over a native graphics API.
///
/// All methods are called from the rendering thread only. Resource creation
/// (textures, offscreen targets) is backend-specific and happens outside this
/// trait; the core only references handles.
pub trait GraphicsBackend: Any {
    /// Reports whether `capability` is available.
    ///
    /// Implementations should not panic; callers treat both an `Err` and a
    /// panic as "unsupported".
    fn probe_capability(&self, capability: Capability) -> Result<bool, BackendError>;

    /// Limits used to size batches.
    fn limits(&self) -> BackendLimits {
        BackendLimits::default()
    }

    /// Makes `target` the destination of subsequent clears and draws.
    fn bind_target(&mut self, target: TargetHandle, viewport: Viewport) -> Result<(), BackendError>;

    /// Finishes work on the bound target (submit/present where applicable).
    fn unbind_target(&mut self) -> Result<(), BackendError>;

    /// Clears the whole bound target.
    fn clear(&mut self, color: Color) -> Result<(), BackendError>;

    /// Issues exactly one draw call.
    fn submit_draw(&mut self, draw: DrawSubmission<'_>) -> Result<(), BackendError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_clip_covers_target() {
        assert_eq!(logical_clip_to_pixels(None, 1.0, 1.0, 32, 16), Some((0, 0, 32, 16)));
    }

    #[test]
    fn clip_is_scaled_and_clamped() {
        let clip = Rect::new(-4.0, 2.0, 100.0, 4.0);
        assert_eq!(logical_clip_to_pixels(Some(clip), 2.0, 2.0, 64, 64), Some((0, 4, 64, 8)));
    }

    #[test]
    fn zero_area_clip_is_none() {
        let clip = Rect::new(5.0, 5.0, 0.0, 3.0);
        assert_eq!(logical_clip_to_pixels(Some(clip), 1.0, 1.0, 64, 64), None);
    }
}
