use crate::coords::{Rect, Transform, Vec2};
use crate::error::RenderResult;
use crate::surface::Surface;

use super::{Layer, LayerContent, LayerId, LayerTree};

impl LayerTree {
    /// Paints `id` and its subtree, depth first, children in index order.
    ///
    /// Invisible layers return without touching the surface. Otherwise the
    /// layer's state is pushed with a scoped save, so the surface comes back
    /// at its previous depth on every exit path.
    pub fn paint(&self, id: LayerId, surface: &mut Surface) -> RenderResult<()> {
        let layer = self.get(id)?;
        if !layer.is_drawable() {
            return Ok(());
        }

        let mut s = surface.scoped_save()?;
        s.concat_transform(layer.local_transform())?;
        s.multiply_alpha(layer.alpha)?;
        s.multiply_tint(layer.tint)?;
        if let Some(blend) = layer.blend {
            s.set_blend_mode(blend)?;
        }

        match &layer.content {
            LayerContent::Solid(solid) => {
                s.fill_rect(Rect::from_origin_size(Vec2::zero(), solid.size), solid.color)
            }
            LayerContent::Image(img) => {
                let dest = Rect::from_origin_size(Vec2::zero(), img.size());
                match img.source {
                    Some(src) => s.draw_image_region(&img.image, dest, src),
                    None => s.draw_image(&img.image, dest),
                }
            }
            LayerContent::Custom(painter) => painter.paint(&mut s),
            LayerContent::Group(group) => {
                if let Some(clip) = group.clip {
                    s.clip_rect(Rect::from_origin_size(Vec2::zero(), clip))?;
                }
                for &child in &group.children {
                    self.paint(child, &mut s)?;
                }
                Ok(())
            }
        }
    }

    // ── coordinates ───────────────────────────────────────────────────────

    /// Transform from `id`'s local space to the space of its topmost ancestor.
    pub fn world_transform(&self, id: LayerId) -> RenderResult<Transform> {
        let mut layer = self.get(id)?;
        let mut world = layer.local_transform();
        while let Some(parent) = layer.parent {
            layer = self.get(parent)?;
            world = layer.local_transform() * world;
        }
        Ok(world)
    }

    /// Maps a point in `id`'s local space to root space. `None` for a stale id.
    pub fn layer_to_screen(&self, id: LayerId, point: Vec2) -> Option<Vec2> {
        self.world_transform(id).ok().map(|t| t.apply(point))
    }

    /// Maps a root-space point into `id`'s local space. `None` for a stale id
    /// or when some transform on the way is singular.
    pub fn screen_to_layer(&self, id: LayerId, point: Vec2) -> Option<Vec2> {
        let inverse = self.world_transform(id).ok()?.inverse()?;
        Some(inverse.apply(point))
    }

    // ── hit testing ───────────────────────────────────────────────────────

    /// Topmost visible layer under `point` (in the space `root` is painted
    /// in). Only layers with a known size can be hit; a group's clip also
    /// bounds its children.
    pub fn hit_test(&self, root: LayerId, point: Vec2) -> Option<LayerId> {
        let layer = self.layer(root)?;
        let local = layer.local_transform().inverse()?.apply(point);
        self.hit_local(root, layer, local)
    }

    fn hit_local(&self, id: LayerId, layer: &Layer, local: Vec2) -> Option<LayerId> {
        if !layer.is_drawable() {
            return None;
        }
        let inside = layer
            .size()
            .is_some_and(|size| Rect::from_origin_size(Vec2::zero(), size).contains(local));

        if let LayerContent::Group(group) = &layer.content {
            if group.clip.is_some() && !inside {
                return None;
            }
            for &child in group.children.iter().rev() {
                if let Some(hit) = self.hit_test(child, local) {
                    return Some(hit);
                }
            }
        }
        inside.then_some(id)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::panic::{self, AssertUnwindSafe};
    use std::rc::Rc;

    use super::*;
    use crate::backend::{Image, SoftwareBackend, TextureHandle};
    use crate::batch::{select_default_batch, BatchConfig};
    use crate::coords::Viewport;
    use crate::error::RenderError;
    use crate::paint::{BlendMode, Color};
    use crate::surface::RenderTarget;
    use crate::testing::RecordingBackend;

    const EPS: f32 = 1e-4;

    fn surface_with(backend: RecordingBackend, base: Transform) -> Surface {
        let batch = select_default_batch(&backend, &BatchConfig::default());
        let target = RenderTarget::frame(Viewport::new(100.0, 100.0)).with_base_transform(base);
        Surface::new(Box::new(backend), target, batch)
    }

    fn recording() -> Surface {
        surface_with(RecordingBackend::new(), Transform::IDENTITY)
    }

    fn software(w: u32, h: u32) -> Surface {
        let backend = SoftwareBackend::new(w, h);
        let batch = select_default_batch(&backend, &BatchConfig::default());
        let target = RenderTarget::frame(Viewport::new(w as f32, h as f32));
        Surface::new(Box::new(backend), target, batch)
    }

    fn rec(s: &Surface) -> &RecordingBackend {
        s.backend_as::<RecordingBackend>().unwrap()
    }

    fn paint_pass(tree: &LayerTree, root: LayerId, s: &mut Surface) -> RenderResult<()> {
        let mut frame = s.scoped_frame()?;
        tree.paint(root, &mut frame)?;
        frame.finish()
    }

    // ── end to end ────────────────────────────────────────────────────────

    #[test]
    fn single_child_submits_one_composed_quad() {
        let base = Transform::scale(0.5);
        let mut s = surface_with(RecordingBackend::new(), base);
        let mut tree = LayerTree::new();
        let root = tree.create_group();
        let image = Image::new(TextureHandle(7), 4, 4);
        let child = tree.create_image(image);
        tree.get_mut(child)
            .unwrap()
            .set_transform(Transform::translate(10.0, 20.0) * Transform::scale(2.0));
        tree.add(root, child).unwrap();

        paint_pass(&tree, root, &mut s).unwrap();

        let backend = rec(&s);
        assert_eq!(backend.quad_count(), 1);
        assert_eq!(backend.draws[0].state.texture, Some(TextureHandle(7)));

        let quad = backend.instances()[0];
        let expected = base
            * Transform::translate(10.0, 20.0)
            * Transform::scale(2.0)
            * Transform::scale(4.0);
        assert!(quad.unit_transform().approx_eq(expected, EPS));
        assert_eq!(quad.tint, Color::WHITE.to_array());
        assert_eq!(s.depth(), 0);
    }

    // ── visibility ────────────────────────────────────────────────────────

    #[test]
    fn invisible_group_touches_nothing() {
        let mut s = recording();
        let mut tree = LayerTree::new();
        let root = tree.create_group();
        let hidden = tree.create_group();
        let painter_calls = Rc::new(RefCell::new(0));
        let calls = painter_calls.clone();
        let painter = tree.create_custom(move |_: &mut Surface| -> RenderResult<()> {
            *calls.borrow_mut() += 1;
            Ok(())
        });
        let a = tree.create_solid(5.0, 5.0, Color::WHITE);
        tree.add(root, hidden).unwrap();
        tree.add(hidden, painter).unwrap();
        tree.add(hidden, a).unwrap();

        tree.get_mut(hidden).unwrap().set_visible(false);
        paint_pass(&tree, root, &mut s).unwrap();
        assert_eq!(rec(&s).quad_count(), 0);
        assert_eq!(*painter_calls.borrow(), 0);

        tree.get_mut(hidden).unwrap().set_visible(true).set_alpha(0.0);
        paint_pass(&tree, root, &mut s).unwrap();
        assert_eq!(rec(&s).quad_count(), 0);
        assert_eq!(*painter_calls.borrow(), 0);
    }

    #[test]
    fn invisible_subtree_issues_no_saves() {
        let mut s = recording();
        let mut tree = LayerTree::new();
        let root = tree.create_group();
        let hidden = tree.create_group();
        let nested = tree.create_group();
        let painter = tree.create_custom(|_: &mut Surface| -> RenderResult<()> { Ok(()) });
        let a = tree.create_solid(5.0, 5.0, Color::WHITE);
        let b = tree.create_solid(5.0, 5.0, Color::WHITE);
        tree.add(root, hidden).unwrap();
        tree.add(hidden, nested).unwrap();
        tree.add(nested, painter).unwrap();
        tree.add(hidden, a).unwrap();
        tree.add(root, b).unwrap();

        tree.get_mut(hidden).unwrap().set_visible(false);
        s.begin().unwrap();
        tree.paint(hidden, &mut s).unwrap();
        assert_eq!(s.save_count(), 0);
        tree.paint(root, &mut s).unwrap();
        // root and `b` only
        assert_eq!(s.save_count(), 2);
        s.end().unwrap();
        assert_eq!(rec(&s).quad_count(), 1);

        s.backend_mut::<RecordingBackend>().unwrap().reset();
        tree.get_mut(hidden).unwrap().set_visible(true);
        s.begin().unwrap();
        tree.paint(root, &mut s).unwrap();
        assert_eq!(s.save_count(), 6);
        s.end().unwrap();
        assert_eq!(rec(&s).quad_count(), 2);
    }

    // ── paint order ───────────────────────────────────────────────────────

    #[test]
    fn later_children_overdraw_earlier_ones() {
        let mut s = software(20, 20);
        let mut tree = LayerTree::new();
        let root = tree.create_group();
        let red = Color::from_premul(1.0, 0.0, 0.0, 1.0);
        let green = Color::from_premul(0.0, 1.0, 0.0, 1.0);
        let blue = Color::from_premul(0.0, 0.0, 1.0, 1.0);

        let a = tree.create_solid(4.0, 4.0, red);
        let b = tree.create_solid(10.0, 10.0, green);
        let c = tree.create_solid(10.0, 10.0, blue);
        tree.get_mut(c).unwrap().set_translation(5.0, 5.0);
        tree.add(root, a).unwrap();
        tree.add(root, b).unwrap();
        tree.add(root, c).unwrap();

        paint_pass(&tree, root, &mut s).unwrap();

        let be = s.backend_as::<SoftwareBackend>().unwrap();
        assert_eq!(be.pixel(1, 1), green);
        assert_eq!(be.pixel(7, 7), blue);
        assert_eq!(be.pixel(12, 12), blue);
        assert_eq!(be.pixel(8, 2), green);
        assert_eq!(be.pixel(17, 17), Color::transparent());
    }

    // ── inherited state ───────────────────────────────────────────────────

    #[test]
    fn opacity_and_tint_compose_multiplicatively() {
        let mut s = recording();
        let mut tree = LayerTree::new();
        let root = tree.create_group();
        let g = tree.create_group();
        let leaf = tree.create_solid(1.0, 1.0, Color::WHITE);
        tree.add(root, g).unwrap();
        tree.add(g, leaf).unwrap();

        tree.get_mut(root).unwrap().set_alpha(0.5);
        tree.get_mut(g)
            .unwrap()
            .set_alpha(0.5)
            .set_tint(Color::from_premul(0.0, 1.0, 0.0, 1.0));
        tree.get_mut(leaf).unwrap().set_alpha(0.5);

        paint_pass(&tree, root, &mut s).unwrap();
        assert_eq!(rec(&s).instances()[0].tint, [0.0, 0.125, 0.0, 0.125]);
    }

    #[test]
    fn blend_mode_is_inherited_unless_overridden() {
        let mut s = recording();
        let mut tree = LayerTree::new();
        let root = tree.create_group();
        let a = tree.create_solid(1.0, 1.0, Color::WHITE);
        let b = tree.create_solid(1.0, 1.0, Color::WHITE);
        tree.add(root, a).unwrap();
        tree.add(root, b).unwrap();
        tree.get_mut(root).unwrap().set_blend_mode(Some(BlendMode::Additive));
        tree.get_mut(b).unwrap().set_blend_mode(Some(BlendMode::Multiply));

        paint_pass(&tree, root, &mut s).unwrap();
        let blends: Vec<_> = rec(&s).draws.iter().map(|d| d.state.blend).collect();
        assert_eq!(blends, vec![BlendMode::Additive, BlendMode::Multiply]);
    }

    #[test]
    fn origin_offsets_content_before_transform() {
        let mut s = recording();
        let mut tree = LayerTree::new();
        let a = tree.create_solid(10.0, 10.0, Color::WHITE);
        tree.get_mut(a)
            .unwrap()
            .set_origin(Vec2::new(5.0, 5.0))
            .set_transform(Transform::translate(50.0, 50.0));

        paint_pass(&tree, a, &mut s).unwrap();
        let m = rec(&s).instances()[0].unit_transform();
        assert_eq!(m.apply(Vec2::zero()), Vec2::new(45.0, 45.0));
        assert_eq!(m.apply(Vec2::new(1.0, 1.0)), Vec2::new(55.0, 55.0));
    }

    #[test]
    fn group_clip_bounds_children() {
        let mut s = software(16, 16);
        let mut tree = LayerTree::new();
        let root = tree.create_group();
        tree.set_clip(root, Some(Vec2::new(4.0, 4.0))).unwrap();
        let big = tree.create_solid(16.0, 16.0, Color::WHITE);
        tree.add(root, big).unwrap();

        paint_pass(&tree, root, &mut s).unwrap();
        let be = s.backend_as::<SoftwareBackend>().unwrap();
        assert_eq!(be.pixel(3, 3), Color::WHITE);
        assert_eq!(be.pixel(5, 5), Color::transparent());
    }

    // ── failures ──────────────────────────────────────────────────────────

    #[test]
    fn failing_child_leaves_stack_balanced() {
        let mut s = recording();
        let mut tree = LayerTree::new();
        let root = tree.create_group();
        let inner = tree.create_group();
        let ok = tree.create_solid(1.0, 1.0, Color::WHITE);
        let bad = tree.create_custom(|s: &mut Surface| -> RenderResult<()> {
            s.save()?;
            s.translate(3.0, 3.0)?;
            Err(RenderError::Painter("texture missing".into()))
        });
        let never = tree.create_solid(1.0, 1.0, Color::WHITE);
        tree.add(root, inner).unwrap();
        tree.add(inner, ok).unwrap();
        tree.add(inner, bad).unwrap();
        tree.add(inner, never).unwrap();

        s.begin().unwrap();
        s.save().unwrap();
        let before = (s.depth(), s.transform());
        let err = tree.paint(root, &mut s).unwrap_err();
        assert!(matches!(err, RenderError::Painter(_)));
        assert_eq!((s.depth(), s.transform()), before);
        s.restore().unwrap();
        s.end().unwrap();

        assert_eq!(rec(&s).quad_count(), 1);
    }

    #[test]
    fn over_restoring_painter_cannot_unwind_its_parent() {
        let mut s = recording();
        let mut tree = LayerTree::new();
        let root = tree.create_group();
        tree.get_mut(root).unwrap().set_translation(50.0, 0.0);
        let refused = Rc::new(RefCell::new(0));
        let count = refused.clone();
        let greedy = tree.create_custom(move |s: &mut Surface| -> RenderResult<()> {
            for _ in 0..2 {
                if matches!(s.restore(), Err(RenderError::Unbalanced(_))) {
                    *count.borrow_mut() += 1;
                }
            }
            Ok(())
        });
        let sibling = tree.create_solid(1.0, 1.0, Color::WHITE);
        tree.add(root, greedy).unwrap();
        tree.add(root, sibling).unwrap();

        paint_pass(&tree, root, &mut s).unwrap();
        assert_eq!(*refused.borrow(), 2);
        let origin = rec(&s).instances()[0].unit_transform().apply(Vec2::zero());
        assert_eq!(origin, Vec2::new(50.0, 0.0));
    }

    #[test]
    fn over_restore_error_propagates_from_paint() {
        let mut s = recording();
        let mut tree = LayerTree::new();
        let root = tree.create_group();
        let greedy = tree.create_custom(|s: &mut Surface| -> RenderResult<()> { s.restore() });
        tree.add(root, greedy).unwrap();

        s.begin().unwrap();
        let err = tree.paint(root, &mut s).unwrap_err();
        assert!(matches!(err, RenderError::Unbalanced(_)));
        assert_eq!(s.depth(), 0);
        s.end().unwrap();
    }

    #[test]
    fn panicking_child_leaves_stack_balanced() {
        let mut s = recording();
        let mut tree = LayerTree::new();
        let root = tree.create_group();
        let bad = tree.create_custom(|_: &mut Surface| -> RenderResult<()> {
            panic!("painter bug");
        });
        tree.add(root, bad).unwrap();

        s.begin().unwrap();
        let result = panic::catch_unwind(AssertUnwindSafe(|| tree.paint(root, &mut s)));
        assert!(result.is_err());
        assert_eq!(s.depth(), 0);
        assert_eq!(s.transform(), Transform::IDENTITY);
        s.end().unwrap();
    }

    #[test]
    fn stale_child_is_reported() {
        let mut s = recording();
        let tree = LayerTree::new();
        let mut other = LayerTree::new();
        let ghost = other.create_group();

        s.begin().unwrap();
        assert!(matches!(tree.paint(ghost, &mut s), Err(RenderError::StaleLayer(_))));
        s.end().unwrap();
    }

    // ── coordinates ───────────────────────────────────────────────────────

    #[test]
    fn coordinate_conversion_walks_parents() {
        let mut tree = LayerTree::new();
        let root = tree.create_group();
        let g = tree.create_group();
        let a = tree.create_solid(10.0, 10.0, Color::WHITE);
        tree.add(root, g).unwrap();
        tree.add(g, a).unwrap();
        tree.get_mut(root).unwrap().set_transform(Transform::translate(100.0, 0.0));
        tree.get_mut(g).unwrap().set_transform(Transform::scale(2.0));
        tree.get_mut(a).unwrap().set_translation(5.0, 5.0);

        let screen = tree.layer_to_screen(a, Vec2::new(1.0, 1.0)).unwrap();
        assert_eq!(screen, Vec2::new(112.0, 12.0));
        let local = tree.screen_to_layer(a, screen).unwrap();
        assert!(local.approx_eq(Vec2::new(1.0, 1.0), EPS));
    }

    #[test]
    fn singular_transform_has_no_inverse_mapping() {
        let mut tree = LayerTree::new();
        let a = tree.create_solid(1.0, 1.0, Color::WHITE);
        tree.get_mut(a).unwrap().set_transform(Transform::scale(0.0));
        assert_eq!(tree.screen_to_layer(a, Vec2::zero()), None);
    }

    #[test]
    fn hit_test_finds_topmost() {
        let mut tree = LayerTree::new();
        let root = tree.create_group();
        let a = tree.create_solid(10.0, 10.0, Color::WHITE);
        let b = tree.create_solid(10.0, 10.0, Color::WHITE);
        let hidden = tree.create_solid(10.0, 10.0, Color::WHITE);
        tree.get_mut(b).unwrap().set_translation(5.0, 5.0);
        tree.get_mut(hidden).unwrap().set_visible(false);
        tree.add(root, a).unwrap();
        tree.add(root, b).unwrap();
        tree.add(root, hidden).unwrap();

        assert_eq!(tree.hit_test(root, Vec2::new(2.0, 2.0)), Some(a));
        assert_eq!(tree.hit_test(root, Vec2::new(7.0, 7.0)), Some(b));
        assert_eq!(tree.hit_test(root, Vec2::new(50.0, 50.0)), None);
    }

    #[test]
    fn hit_test_respects_group_clip() {
        let mut tree = LayerTree::new();
        let root = tree.create_group();
        let a = tree.create_solid(10.0, 10.0, Color::WHITE);
        tree.add(root, a).unwrap();
        tree.set_clip(root, Some(Vec2::new(5.0, 5.0))).unwrap();

        assert_eq!(tree.hit_test(root, Vec2::new(2.0, 2.0)), Some(a));
        assert_eq!(tree.hit_test(root, Vec2::new(7.0, 7.0)), None);
    }
}
