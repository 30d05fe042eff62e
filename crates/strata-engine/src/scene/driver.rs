use crate::backend::GraphicsBackend;
use crate::batch::{select_default_batch, BatchConfig, BatchKind};
use crate::coords::Viewport;
use crate::error::RenderResult;
use crate::layer::{LayerId, LayerTree};
use crate::paint::Color;
use crate::surface::{RenderTarget, Surface};
use crate::time::FrameTime;

use super::{PaintSignal, Scene, SlotId};

/// Scene driver configuration.
#[derive(Debug, Clone)]
pub struct SceneConfig {
    pub clear_color: Color,
    /// Priority of the scene paint among paint listeners. The default of -1
    /// paints after listeners connected at the default priority 0.
    pub paint_priority: i32,
    pub batch: BatchConfig,
    pub target: RenderTarget,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            clear_color: Color::transparent(),
            paint_priority: -1,
            batch: BatchConfig::default(),
            target: RenderTarget::default(),
        }
    }
}

/// Owns the scene and the default rendering resources and paints once per
/// frame tick.
pub struct SceneDriver {
    scene: Scene,
    surface: Surface,
    signal: PaintSignal<FrameTime, Scene>,
    clear_color: Color,
    paint_priority: i32,
}

impl SceneDriver {
    pub fn new(backend: Box<dyn GraphicsBackend>, config: SceneConfig) -> Self {
        let batch = select_default_batch(backend.as_ref(), &config.batch);
        let surface = Surface::new(backend, config.target, batch);
        log::info!(
            "scene driver ready: {:?} batch, paint priority {}",
            surface.batch_kind(),
            config.paint_priority
        );

        Self {
            scene: Scene::new(),
            surface,
            signal: PaintSignal::new(),
            clear_color: config.clear_color,
            paint_priority: config.paint_priority,
        }
    }

    /// Clears the frame target and paints the whole tree.
    ///
    /// On failure the frame is lost but the surface is ended and the tree is
    /// untouched; the next call starts a fresh pass.
    pub fn paint(&mut self) -> RenderResult<()> {
        paint_scene(&mut self.surface, &self.scene, self.clear_color)
    }

    /// One paint tick: runs listeners by priority and paints the scene at
    /// the configured priority among them.
    pub fn on_frame(&mut self, time: &FrameTime) -> RenderResult<()> {
        let surface = &mut self.surface;
        let clear_color = self.clear_color;
        self.signal.emit_around(time, &mut self.scene, self.paint_priority, |scene| {
            paint_scene(surface, scene, clear_color)
        })
    }

    /// Registers a listener on the paint tick. Listeners may mutate the scene.
    pub fn connect_paint(
        &mut self,
        priority: i32,
        listener: impl FnMut(&FrameTime, &mut Scene) + 'static,
    ) -> SlotId {
        self.signal.connect(priority, listener)
    }

    pub fn disconnect(&mut self, slot: SlotId) -> bool {
        self.signal.disconnect(slot)
    }

    /// Changes the logical size of the frame target. Call between frames.
    pub fn resize(&mut self, viewport: Viewport) -> RenderResult<()> {
        log::debug!("scene viewport resized to {}x{}", viewport.width, viewport.height);
        self.surface.set_viewport(viewport)
    }

    pub fn set_clear_color(&mut self, color: Color) {
        self.clear_color = color;
    }

    #[inline]
    pub fn clear_color(&self) -> Color {
        self.clear_color
    }

    #[inline]
    pub fn paint_priority(&self) -> i32 {
        self.paint_priority
    }

    #[inline]
    pub fn batch_kind(&self) -> BatchKind {
        self.surface.batch_kind()
    }

    #[inline]
    pub fn root(&self) -> LayerId {
        self.scene.root()
    }

    #[inline]
    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    #[inline]
    pub fn scene_mut(&mut self) -> &mut Scene {
        &mut self.scene
    }

    #[inline]
    pub fn tree(&self) -> &LayerTree {
        self.scene.tree()
    }

    #[inline]
    pub fn tree_mut(&mut self) -> &mut LayerTree {
        self.scene.tree_mut()
    }

    #[inline]
    pub fn surface(&self) -> &Surface {
        &self.surface
    }

    #[inline]
    pub fn surface_mut(&mut self) -> &mut Surface {
        &mut self.surface
    }

    /// Typed access to the backend, e.g. to create textures.
    pub fn backend_mut<T: GraphicsBackend>(&mut self) -> Option<&mut T> {
        self.surface.backend_mut::<T>()
    }
}

impl std::fmt::Debug for SceneDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SceneDriver")
            .field("surface", &self.surface)
            .field("layers", &self.scene.tree().len())
            .field("listeners", &self.signal.len())
            .field("paint_priority", &self.paint_priority)
            .finish_non_exhaustive()
    }
}

fn paint_scene(surface: &mut Surface, scene: &Scene, clear_color: Color) -> RenderResult<()> {
    let mut frame = surface.scoped_frame()?;
    frame.clear(clear_color)?;
    scene.tree().paint(scene.root(), &mut frame)?;
    frame.finish()
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::time::Instant;

    use super::*;
    use crate::backend::{BackendError, Capability, SoftwareBackend};
    use crate::coords::Transform;
    use crate::error::RenderError;
    use crate::testing::{ProbeFailing, ProbeFault, RecordingBackend};

    fn frame_time(i: u64) -> FrameTime {
        FrameTime { dt: 1.0 / 60.0, now: Instant::now(), elapsed: i as f32 / 60.0, frame_index: i }
    }

    fn config(w: f32, h: f32) -> SceneConfig {
        SceneConfig {
            target: RenderTarget::frame(Viewport::new(w, h)),
            ..SceneConfig::default()
        }
    }

    fn recorded(d: &SceneDriver) -> &RecordingBackend {
        d.surface().backend_as::<RecordingBackend>().unwrap()
    }

    // ── paint pass ────────────────────────────────────────────────────────

    #[test]
    fn paint_clears_then_draws_and_balances() {
        let mut d = SceneDriver::new(Box::new(RecordingBackend::new()), config(64.0, 64.0));
        d.set_clear_color(Color::BLACK);
        let root = d.root();
        let a = d.tree_mut().create_solid(8.0, 8.0, Color::WHITE);
        d.tree_mut().add(root, a).unwrap();

        d.paint().unwrap();

        let be = recorded(&d);
        assert_eq!(be.clears, vec![Color::BLACK]);
        assert_eq!(be.quad_count(), 1);
        assert_eq!(be.unbinds, 1);
        assert_eq!(d.surface().depth(), 0);
        assert!(!d.surface().is_active());
    }

    #[test]
    fn end_to_end_translate_scale() {
        let mut d = SceneDriver::new(Box::new(RecordingBackend::new()), config(64.0, 64.0));
        let root = d.root();
        let child = d.tree_mut().create_solid(1.0, 1.0, Color::WHITE);
        d.tree_mut()
            .get_mut(child)
            .unwrap()
            .set_transform(Transform::translate(10.0, 20.0) * Transform::scale(2.0));
        d.tree_mut().add(root, child).unwrap();

        d.paint().unwrap();

        let quads = recorded(&d).instances();
        assert_eq!(quads.len(), 1);
        let expected = Transform::translate(10.0, 20.0) * Transform::scale(2.0);
        assert!(quads[0].unit_transform().approx_eq(expected, 1e-5));
    }

    // ── fallback ──────────────────────────────────────────────────────────

    #[test]
    fn failing_probe_selects_triangles_and_still_renders() {
        for fault in [ProbeFault::Error, ProbeFault::Panic] {
            let backend = ProbeFailing { inner: SoftwareBackend::new(16, 16), fault };
            let mut d = SceneDriver::new(Box::new(backend), config(16.0, 16.0));
            assert_eq!(d.batch_kind(), BatchKind::Triangle);

            let root = d.root();
            let a = d.tree_mut().create_solid(4.0, 4.0, Color::WHITE);
            d.tree_mut().get_mut(a).unwrap().set_translation(2.0, 2.0);
            d.tree_mut().add(root, a).unwrap();
            d.paint().unwrap();

            let be = &d.backend_mut::<ProbeFailing<SoftwareBackend>>().unwrap().inner;
            assert_eq!(be.pixel(3, 3), Color::WHITE);
            assert_eq!(be.pixel(6, 6), Color::transparent());
            assert_eq!(be.stats().instanced_draw_calls, 0);
        }
    }

    #[test]
    fn uniform_and_fallback_drivers_render_identically() {
        let build = |backend: SoftwareBackend| {
            let mut d = SceneDriver::new(Box::new(backend), config(32.0, 32.0));
            let root = d.root();
            for i in 0..12 {
                let f = i as f32;
                let color = Color::from_straight(0.2, 0.4 + 0.05 * f, 0.9, 0.7);
                let l = d.tree_mut().create_solid(6.0, 3.0, color);
                d.tree_mut().get_mut(l).unwrap().set_transform(
                    Transform::translate(4.0 + 2.0 * f, 3.0 + f) * Transform::rotate(0.2 * f),
                );
                d.tree_mut().add(root, l).unwrap();
            }
            d.paint().unwrap();
            d
        };

        let mut uniform = build(SoftwareBackend::new(32, 32));
        let mut fallback =
            build(SoftwareBackend::new(32, 32).with_capability(Capability::Instancing, false));
        assert_eq!(uniform.batch_kind(), BatchKind::Uniform);
        assert_eq!(fallback.batch_kind(), BatchKind::Triangle);

        let a = uniform.backend_mut::<SoftwareBackend>().unwrap().frame_pixels().to_vec();
        let b = fallback.backend_mut::<SoftwareBackend>().unwrap().frame_pixels().to_vec();
        assert_eq!(a, b);
    }

    // ── failures ──────────────────────────────────────────────────────────

    #[test]
    fn backend_failure_aborts_frame_and_next_frame_recovers() {
        let mut d = SceneDriver::new(Box::new(RecordingBackend::new()), config(32.0, 32.0));
        let root = d.root();
        let a = d.tree_mut().create_solid(4.0, 4.0, Color::WHITE);
        d.tree_mut().add(root, a).unwrap();

        d.backend_mut::<RecordingBackend>().unwrap().fail_draws = true;
        let err = d.on_frame(&frame_time(0)).unwrap_err();
        assert!(matches!(err, RenderError::Backend(BackendError::DrawFailed(_))));
        assert!(!d.surface().is_active());
        assert_eq!(d.tree().children(root).unwrap(), &[a]);

        d.backend_mut::<RecordingBackend>().unwrap().fail_draws = false;
        d.on_frame(&frame_time(1)).unwrap();
        assert_eq!(recorded(&d).quad_count(), 1);
    }

    #[test]
    fn painter_error_still_ends_the_frame() {
        let mut d = SceneDriver::new(Box::new(RecordingBackend::new()), config(32.0, 32.0));
        let root = d.root();
        let bad = d.tree_mut().create_custom(|_: &mut Surface| -> RenderResult<()> {
            Err(RenderError::Painter("nope".into()))
        });
        d.tree_mut().add(root, bad).unwrap();

        assert!(matches!(d.paint(), Err(RenderError::Painter(_))));
        assert!(!d.surface().is_active());
        assert_eq!(recorded(&d).unbinds, 1);
        assert!(d.paint().is_err());
    }

    #[test]
    fn bind_failure_is_reported() {
        let mut backend = RecordingBackend::new();
        backend.fail_bind = true;
        let mut d = SceneDriver::new(Box::new(backend), config(8.0, 8.0));
        assert!(matches!(d.paint(), Err(RenderError::Backend(BackendError::TargetUnavailable(_)))));
        assert!(!d.surface().is_active());
    }

    // ── listeners ─────────────────────────────────────────────────────────

    #[test]
    fn scene_paints_after_default_priority_listeners() {
        let log = Rc::new(RefCell::new(Vec::<String>::new()));
        let mut d = SceneDriver::new(Box::new(RecordingBackend::new()), config(8.0, 8.0));
        assert_eq!(d.paint_priority(), -1);

        let root = d.root();
        let scene_log = log.clone();
        let marker = d.tree_mut().create_custom(move |_: &mut Surface| -> RenderResult<()> {
            scene_log.borrow_mut().push("scene".into());
            Ok(())
        });
        d.tree_mut().add(root, marker).unwrap();

        for (prio, tag) in [(-5, "late"), (0, "default"), (3, "early"), (-1, "tie")] {
            let log = log.clone();
            d.connect_paint(prio, move |t: &FrameTime, _: &mut Scene| {
                log.borrow_mut().push(format!("{tag}@{}", t.frame_index));
            });
        }

        d.on_frame(&frame_time(9)).unwrap();
        assert_eq!(*log.borrow(), ["early@9", "default@9", "scene", "tie@9", "late@9"]);
    }

    #[test]
    fn listeners_can_mutate_the_scene_before_paint() {
        let mut d = SceneDriver::new(Box::new(RecordingBackend::new()), config(8.0, 8.0));
        let slot = d.connect_paint(0, |_: &FrameTime, scene: &mut Scene| {
            let root = scene.root();
            let layer = scene.tree_mut().create_solid(1.0, 1.0, Color::WHITE);
            scene.tree_mut().add(root, layer).unwrap();
        });

        d.on_frame(&frame_time(0)).unwrap();
        assert_eq!(recorded(&d).quad_count(), 1);

        assert!(d.disconnect(slot));
        d.on_frame(&frame_time(1)).unwrap();
        assert_eq!(d.tree().child_count(d.root()).unwrap(), 1);
    }

    // ── configuration ─────────────────────────────────────────────────────

    #[test]
    fn resize_updates_bound_viewport() {
        let mut d = SceneDriver::new(Box::new(RecordingBackend::new()), config(8.0, 8.0));
        d.resize(Viewport::new(20.0, 10.0)).unwrap();
        d.paint().unwrap();
        assert_eq!(recorded(&d).binds[0].1, Viewport::new(20.0, 10.0));
    }

    #[test]
    fn config_can_force_triangle_batch() {
        let cfg = SceneConfig {
            batch: BatchConfig { prefer_uniform: false, ..BatchConfig::default() },
            ..config(8.0, 8.0)
        };
        let mut d = SceneDriver::new(Box::new(RecordingBackend::new()), cfg);
        assert_eq!(d.batch_kind(), BatchKind::Triangle);

        let root = d.root();
        let a = d.tree_mut().create_solid(2.0, 2.0, Color::WHITE);
        d.tree_mut().add(root, a).unwrap();
        d.paint().unwrap();
        let be = recorded(&d);
        assert_eq!(be.quad_count(), 1);
        assert!(be.draws[0].instances.is_empty());
        assert_eq!(be.draws[0].vertices.len(), 6);
    }
}
