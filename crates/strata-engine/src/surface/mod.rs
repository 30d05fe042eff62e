//! Drawing target with transform, tint and clip stacks.
//!
//! A [`Surface`] owns its backend and its batch. Drawing is only legal between
//! [`Surface::begin`] and [`Surface::end`]; prefer [`Surface::scoped_frame`]
//! and [`Surface::scoped_save`], whose guards run `end` / `restore` on every
//! exit path, unwinding included.

mod guard;
mod target;

use std::any::Any;

use crate::backend::{DrawState, GraphicsBackend, Image, TextureHandle};
use crate::batch::{Batch, BatchKind, BatchStats, Quad, QuadBatch};
use crate::coords::{Rect, Transform, Viewport};
use crate::error::{RenderError, RenderResult};
use crate::paint::{BlendMode, Color};

pub use guard::{SurfaceFrame, SurfaceSave};
pub use target::RenderTarget;

/// One entry of the state stack.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct SurfaceState {
    pub transform: Transform,
    pub alpha: f32,
    pub tint: Color,
    pub blend: BlendMode,
}

impl SurfaceState {
    fn initial(base: Transform) -> Self {
        Self {
            transform: base,
            alpha: 1.0,
            tint: Color::WHITE,
            blend: BlendMode::Normal,
        }
    }

    /// Premultiplied color a draw of `color` ends up with.
    #[inline]
    fn effective(&self, color: Color) -> Color {
        color.multiply(self.tint).scale_alpha(self.alpha)
    }
}

pub struct Surface {
    backend: Box<dyn GraphicsBackend>,
    batch: Batch,
    target: RenderTarget,
    active: bool,

    current: SurfaceState,
    saved: Vec<SurfaceState>,

    /// Screen-space clips, each already intersected with its parent.
    clips: Vec<Rect>,
    /// Clip depth recorded by each `save`.
    clip_marks: Vec<usize>,
    /// Save depth owned by each live `scoped_save`; `restore` never goes below
    /// the innermost one.
    save_floors: Vec<usize>,
    /// Saves issued since `begin`.
    save_count: usize,
}

impl Surface {
    pub fn new(backend: Box<dyn GraphicsBackend>, target: RenderTarget, batch: Batch) -> Self {
        Self {
            backend,
            batch,
            current: SurfaceState::initial(target.base_transform),
            target,
            active: false,
            saved: Vec::new(),
            clips: Vec::new(),
            clip_marks: Vec::new(),
            save_floors: Vec::new(),
            save_count: 0,
        }
    }

    // ── bracketing ────────────────────────────────────────────────────────

    /// Binds the target and resets all stacks to the target's base state.
    pub fn begin(&mut self) -> RenderResult<()> {
        if self.active {
            return Err(RenderError::InvalidState("begin called on an active surface"));
        }
        self.backend.bind_target(self.target.handle, self.target.viewport)?;

        self.batch.begin();
        self.current = SurfaceState::initial(self.target.base_transform);
        self.saved.clear();
        self.clips.clear();
        self.clip_marks.clear();
        self.save_floors.clear();
        self.save_count = 0;
        self.active = true;
        Ok(())
    }

    /// Flushes, unbinds and deactivates, whatever happened during the pass.
    ///
    /// Reports the first of: flush failure, unbind failure, unbalanced saves.
    pub fn end(&mut self) -> RenderResult<()> {
        self.ensure_active("end called on an inactive surface")?;

        let flushed = self.batch.flush(self.backend.as_mut());
        let unbound = self.backend.unbind_target();
        let balanced = self.saved.is_empty();

        self.active = false;
        self.saved.clear();
        self.clips.clear();
        self.clip_marks.clear();
        self.save_floors.clear();

        flushed?;
        unbound?;
        if !balanced {
            return Err(RenderError::Unbalanced("save without matching restore at end of pass"));
        }
        Ok(())
    }

    /// `begin` plus a guard that calls `end` when dropped.
    pub fn scoped_frame(&mut self) -> RenderResult<SurfaceFrame<'_>> {
        self.begin()?;
        Ok(SurfaceFrame::new(self))
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.active
    }

    fn ensure_active(&self, what: &'static str) -> RenderResult<()> {
        if self.active { Ok(()) } else { Err(RenderError::InvalidState(what)) }
    }

    /// Clears the whole target, ignoring clip and tint.
    pub fn clear(&mut self, color: Color) -> RenderResult<()> {
        self.ensure_active("clear outside begin/end")?;
        self.batch.flush(self.backend.as_mut())?;
        self.backend.clear(color)?;
        Ok(())
    }

    /// Issues everything buffered so far.
    pub fn flush(&mut self) -> RenderResult<()> {
        self.ensure_active("flush outside begin/end")?;
        self.batch.flush(self.backend.as_mut())?;
        Ok(())
    }

    // ── state stack ───────────────────────────────────────────────────────

    pub fn save(&mut self) -> RenderResult<()> {
        self.ensure_active("save outside begin/end")?;
        self.saved.push(self.current);
        self.clip_marks.push(self.clips.len());
        self.save_count += 1;
        Ok(())
    }

    /// Pops the innermost save.
    ///
    /// Fails with [`RenderError::Unbalanced`] when nothing is saved, or when
    /// the innermost save belongs to an enclosing [`scoped_save`](Self::scoped_save).
    pub fn restore(&mut self) -> RenderResult<()> {
        self.ensure_active("restore outside begin/end")?;
        let floor = self.save_floors.last().copied().unwrap_or(0);
        if self.saved.len() <= floor {
            return Err(RenderError::Unbalanced("restore without matching save"));
        }
        let (Some(state), Some(mark)) = (self.saved.pop(), self.clip_marks.pop()) else {
            return Err(RenderError::Unbalanced("restore without matching save"));
        };
        self.current = state;
        self.clips.truncate(mark);
        Ok(())
    }

    /// Restores until [`depth`](Self::depth) equals `depth`.
    pub fn restore_to_depth(&mut self, depth: usize) -> RenderResult<()> {
        while self.saved.len() > depth {
            self.restore()?;
        }
        Ok(())
    }

    /// `save` plus a guard that restores to the pre-save depth when dropped.
    pub fn scoped_save(&mut self) -> RenderResult<SurfaceSave<'_>> {
        self.save()?;
        let depth = self.depth();
        self.save_floors.push(depth);
        Ok(SurfaceSave::new(self, depth - 1))
    }

    /// Hands the innermost scoped save back to plain `restore`.
    pub(super) fn release_floor(&mut self) {
        self.save_floors.pop();
    }

    /// Number of outstanding saves.
    #[inline]
    pub fn depth(&self) -> usize {
        self.saved.len()
    }

    /// Saves issued since the last `begin`, scoped ones included.
    #[inline]
    pub fn save_count(&self) -> usize {
        self.save_count
    }

    #[inline]
    pub fn state(&self) -> SurfaceState {
        self.current
    }

    #[inline]
    pub fn transform(&self) -> Transform {
        self.current.transform
    }

    // ── transform ─────────────────────────────────────────────────────────

    /// Replaces the current transform; `transform` is relative to the
    /// target's base transform.
    pub fn set_transform(&mut self, transform: Transform) -> RenderResult<()> {
        self.ensure_active("set_transform outside begin/end")?;
        self.current.transform = self.target.base_transform * transform;
        Ok(())
    }

    /// Composes `transform` onto the current one; it applies first.
    pub fn concat_transform(&mut self, transform: Transform) -> RenderResult<()> {
        self.ensure_active("transform change outside begin/end")?;
        self.current.transform = self.current.transform * transform;
        Ok(())
    }

    pub fn translate(&mut self, x: f32, y: f32) -> RenderResult<()> {
        self.concat_transform(Transform::translate(x, y))
    }

    pub fn scale(&mut self, s: f32) -> RenderResult<()> {
        self.concat_transform(Transform::scale(s))
    }

    pub fn scale_xy(&mut self, sx: f32, sy: f32) -> RenderResult<()> {
        self.concat_transform(Transform::scale_xy(sx, sy))
    }

    pub fn rotate(&mut self, radians: f32) -> RenderResult<()> {
        self.concat_transform(Transform::rotate(radians))
    }

    // ── tint / blend ──────────────────────────────────────────────────────

    pub fn set_alpha(&mut self, alpha: f32) -> RenderResult<()> {
        self.ensure_active("set_alpha outside begin/end")?;
        self.current.alpha = alpha.clamp(0.0, 1.0);
        Ok(())
    }

    pub fn multiply_alpha(&mut self, alpha: f32) -> RenderResult<()> {
        self.ensure_active("multiply_alpha outside begin/end")?;
        self.current.alpha = (self.current.alpha * alpha).clamp(0.0, 1.0);
        Ok(())
    }

    pub fn set_tint(&mut self, tint: Color) -> RenderResult<()> {
        self.ensure_active("set_tint outside begin/end")?;
        self.current.tint = tint;
        Ok(())
    }

    pub fn multiply_tint(&mut self, tint: Color) -> RenderResult<()> {
        self.ensure_active("multiply_tint outside begin/end")?;
        self.current.tint = self.current.tint.multiply(tint);
        Ok(())
    }

    pub fn set_blend_mode(&mut self, blend: BlendMode) -> RenderResult<()> {
        self.ensure_active("set_blend_mode outside begin/end")?;
        self.current.blend = blend;
        Ok(())
    }

    // ── clipping ──────────────────────────────────────────────────────────

    /// Pushes the screen bounds of local `rect`, intersected with the current
    /// clip. Popped by `pop_clip` or by the enclosing `restore`.
    pub fn clip_rect(&mut self, rect: Rect) -> RenderResult<()> {
        self.ensure_active("clip_rect outside begin/end")?;
        let screen = self.current.transform.transform_rect_bounds(rect);
        let clip = match self.clips.last() {
            Some(parent) => parent.intersect_or_empty(screen),
            None => screen,
        };
        self.clips.push(clip);
        Ok(())
    }

    /// Pops a clip pushed since the last `save`.
    pub fn pop_clip(&mut self) -> RenderResult<()> {
        self.ensure_active("pop_clip outside begin/end")?;
        let floor = self.clip_marks.last().copied().unwrap_or(0);
        if self.clips.len() <= floor {
            return Err(RenderError::Unbalanced("pop_clip without matching clip_rect"));
        }
        self.clips.pop();
        Ok(())
    }

    #[inline]
    pub fn current_clip(&self) -> Option<Rect> {
        self.clips.last().copied()
    }

    // ── drawing ───────────────────────────────────────────────────────────

    /// Draws `dest` (local space) textured with the `uv` region of `texture`,
    /// or untextured when `texture` is `None`.
    pub fn draw_quad(
        &mut self,
        texture: Option<TextureHandle>,
        dest: Rect,
        uv: Rect,
        color: Color,
    ) -> RenderResult<()> {
        self.ensure_active("draw outside begin/end")?;

        let tint = self.current.effective(color);
        if tint.to_array().iter().all(|&c| c <= 0.0) {
            return Ok(());
        }
        let scissor = self.current_clip();
        if scissor.is_some_and(|c| c.is_empty()) {
            return Ok(());
        }

        let backend = self.backend.as_mut();
        self.batch.set_state(
            backend,
            DrawState {
                texture,
                blend: self.current.blend,
                scissor,
            },
        )?;
        self.batch.add_quad(
            backend,
            &Quad {
                transform: self.current.transform,
                dest,
                uv,
                tint,
            },
        )?;
        Ok(())
    }

    pub fn fill_rect(&mut self, rect: Rect, color: Color) -> RenderResult<()> {
        self.draw_quad(None, rect, Rect::UNIT, color)
    }

    /// Draws the whole image stretched over `dest`.
    pub fn draw_image(&mut self, image: &Image, dest: Rect) -> RenderResult<()> {
        self.draw_quad(Some(image.texture), dest, Rect::UNIT, Color::WHITE)
    }

    /// Draws the pixel region `src` of the image over `dest`.
    pub fn draw_image_region(&mut self, image: &Image, dest: Rect, src: Rect) -> RenderResult<()> {
        self.draw_quad(Some(image.texture), dest, image.uv_of(src), Color::WHITE)
    }

    // ── target / parts ────────────────────────────────────────────────────

    #[inline]
    pub fn target(&self) -> &RenderTarget {
        &self.target
    }

    /// Retargets the surface. Only legal between passes.
    pub fn set_target(&mut self, target: RenderTarget) -> RenderResult<()> {
        if self.active {
            return Err(RenderError::InvalidState("set_target during a paint pass"));
        }
        self.target = target;
        Ok(())
    }

    /// Changes the logical size of the current target. Only legal between
    /// passes.
    pub fn set_viewport(&mut self, viewport: Viewport) -> RenderResult<()> {
        let target = RenderTarget { viewport, ..self.target };
        self.set_target(target)
    }

    #[inline]
    pub fn batch(&self) -> &Batch {
        &self.batch
    }

    #[inline]
    pub fn batch_kind(&self) -> BatchKind {
        self.batch.kind()
    }

    #[inline]
    pub fn stats(&self) -> BatchStats {
        self.batch.stats()
    }

    #[inline]
    pub fn backend(&self) -> &dyn GraphicsBackend {
        self.backend.as_ref()
    }

    /// Typed view of the backend, for backend-specific resource calls.
    pub fn backend_as<T: GraphicsBackend>(&self) -> Option<&T> {
        let any: &dyn Any = self.backend.as_ref();
        any.downcast_ref::<T>()
    }

    pub fn backend_mut<T: GraphicsBackend>(&mut self) -> Option<&mut T> {
        let any: &mut dyn Any = self.backend.as_mut();
        any.downcast_mut::<T>()
    }
}

impl std::fmt::Debug for Surface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Surface")
            .field("target", &self.target)
            .field("batch", &self.batch.kind())
            .field("active", &self.active)
            .field("depth", &self.saved.len())
            .finish_non_exhaustive()
    }
}
