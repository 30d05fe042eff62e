use std::ops::{Deref, DerefMut};

use crate::error::RenderResult;

use super::Surface;

/// An active paint pass. Dropping it calls [`Surface::end`]; use
/// [`finish`](Self::finish) to observe the result instead of logging it.
#[must_use = "dropping the frame ends the paint pass immediately"]
pub struct SurfaceFrame<'a> {
    surface: &'a mut Surface,
    finished: bool,
}

impl<'a> SurfaceFrame<'a> {
    pub(super) fn new(surface: &'a mut Surface) -> Self {
        Self { surface, finished: false }
    }

    /// Ends the pass and returns what `end` reported.
    pub fn finish(mut self) -> RenderResult<()> {
        self.finished = true;
        self.surface.end()
    }
}

impl Deref for SurfaceFrame<'_> {
    type Target = Surface;

    fn deref(&self) -> &Surface {
        self.surface
    }
}

impl DerefMut for SurfaceFrame<'_> {
    fn deref_mut(&mut self) -> &mut Surface {
        self.surface
    }
}

impl Drop for SurfaceFrame<'_> {
    fn drop(&mut self) {
        if self.finished || !self.surface.is_active() {
            return;
        }
        if let Err(e) = self.surface.end() {
            log::error!("paint pass ended with error: {e}");
        }
    }
}

/// A `save` that is undone when the guard drops.
///
/// Restores to the depth the surface had before the save, so saves leaked by
/// code running under the guard are unwound too.
#[must_use = "dropping the guard restores immediately"]
pub struct SurfaceSave<'a> {
    surface: &'a mut Surface,
    depth: usize,
}

impl<'a> SurfaceSave<'a> {
    pub(super) fn new(surface: &'a mut Surface, depth: usize) -> Self {
        Self { surface, depth }
    }
}

impl Deref for SurfaceSave<'_> {
    type Target = Surface;

    fn deref(&self) -> &Surface {
        self.surface
    }
}

impl DerefMut for SurfaceSave<'_> {
    fn deref_mut(&mut self) -> &mut Surface {
        self.surface
    }
}

impl Drop for SurfaceSave<'_> {
    fn drop(&mut self) {
        if !self.surface.is_active() {
            return;
        }
        self.surface.release_floor();
        if let Err(e) = self.surface.restore_to_depth(self.depth) {
            log::error!("failed to restore surface state: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::panic::{self, AssertUnwindSafe};

    use crate::batch::{select_default_batch, BatchConfig};
    use crate::coords::Viewport;
    use crate::error::RenderError;
    use crate::surface::RenderTarget;
    use crate::testing::RecordingBackend;

    use super::*;

    fn surface() -> Surface {
        let backend = RecordingBackend::new();
        let batch = select_default_batch(&backend, &BatchConfig::default());
        Surface::new(Box::new(backend), RenderTarget::frame(Viewport::new(10.0, 10.0)), batch)
    }

    fn failing_step(s: &mut Surface) -> RenderResult<()> {
        let mut g = s.scoped_save()?;
        g.translate(1.0, 1.0)?;
        g.save()?; // leaked on purpose
        Err(RenderError::Painter("boom".into()))
    }

    #[test]
    fn save_guard_restores_on_error_path() {
        let mut s = surface();
        s.begin().unwrap();
        let before = s.transform();

        assert!(failing_step(&mut s).is_err());
        assert_eq!(s.depth(), 0);
        assert_eq!(s.transform(), before);
        s.end().unwrap();
    }

    #[test]
    fn save_guard_restores_on_panic() {
        let mut s = surface();
        s.begin().unwrap();

        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            let mut g = s.scoped_save().unwrap();
            g.scale(4.0).unwrap();
            panic!("painter blew up");
        }));
        assert!(result.is_err());
        assert_eq!(s.depth(), 0);
        s.end().unwrap();
    }

    #[test]
    fn frame_finish_reports_end_result() {
        let mut s = surface();
        let mut frame = s.scoped_frame().unwrap();
        frame.save().unwrap();
        assert!(matches!(frame.finish(), Err(RenderError::Unbalanced(_))));
        assert!(!s.is_active());
    }

    #[test]
    fn frame_guard_ends_on_panic() {
        let mut s = surface();
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            let _frame = s.scoped_frame().unwrap();
            panic!("mid-frame failure");
        }));
        assert!(result.is_err());
        assert!(!s.is_active());
        assert_eq!(s.backend_as::<RecordingBackend>().unwrap().unbinds, 1);
    }
}
