//! Scene graph.
//!
//! Layers live in a generational arena ([`LayerTree`]) and refer to each other
//! through [`LayerId`] handles. A group owns the ordered list of its
//! children; the child's parent handle is a non-owning back reference used
//! for reparenting and coordinate conversion, never for traversal.
//!
//! Alpha and tint compose multiplicatively from the root down. Blend mode is
//! inherited unless a layer sets its own.

mod content;
mod id;
mod paint;
mod tree;

use crate::coords::{Transform, Vec2};
use crate::paint::{BlendMode, Color};

pub use content::{Group, ImageLayer, LayerContent, LayerPainter, SolidLayer};
pub use id::LayerId;
pub use tree::LayerTree;

/// One node of the scene graph.
#[derive(Debug)]
pub struct Layer {
    transform: Transform,
    origin: Vec2,
    visible: bool,
    alpha: f32,
    tint: Color,
    blend: Option<BlendMode>,
    name: Option<String>,
    parent: Option<LayerId>,
    content: LayerContent,
}

impl Layer {
    fn new(content: LayerContent) -> Self {
        Self {
            transform: Transform::IDENTITY,
            origin: Vec2::zero(),
            visible: true,
            alpha: 1.0,
            tint: Color::WHITE,
            blend: None,
            name: None,
            parent: None,
            content,
        }
    }

    #[inline]
    pub fn transform(&self) -> Transform {
        self.transform
    }

    pub fn set_transform(&mut self, transform: Transform) -> &mut Self {
        self.transform = transform;
        self
    }

    /// Shorthand for a pure translation.
    pub fn set_translation(&mut self, x: f32, y: f32) -> &mut Self {
        self.transform = self.transform.with_translation(x, y);
        self
    }

    #[inline]
    pub fn origin(&self) -> Vec2 {
        self.origin
    }

    /// Point of the content that the transform pivots around.
    pub fn set_origin(&mut self, origin: Vec2) -> &mut Self {
        self.origin = origin;
        self
    }

    /// `transform ∘ translate(-origin)`.
    #[inline]
    pub fn local_transform(&self) -> Transform {
        self.transform * Transform::translate(-self.origin.x, -self.origin.y)
    }

    #[inline]
    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn set_visible(&mut self, visible: bool) -> &mut Self {
        self.visible = visible;
        self
    }

    #[inline]
    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    /// Clamped to `0.0..=1.0`; NaN counts as fully transparent.
    pub fn set_alpha(&mut self, alpha: f32) -> &mut Self {
        self.alpha = if alpha.is_nan() { 0.0 } else { alpha.clamp(0.0, 1.0) };
        self
    }

    #[inline]
    pub fn tint(&self) -> Color {
        self.tint
    }

    pub fn set_tint(&mut self, tint: Color) -> &mut Self {
        self.tint = tint;
        self
    }

    #[inline]
    pub fn blend_mode(&self) -> Option<BlendMode> {
        self.blend
    }

    /// `None` inherits the parent's blend mode.
    pub fn set_blend_mode(&mut self, blend: Option<BlendMode>) -> &mut Self {
        self.blend = blend;
        self
    }

    #[inline]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn set_name(&mut self, name: impl Into<String>) -> &mut Self {
        self.name = Some(name.into());
        self
    }

    #[inline]
    pub fn parent(&self) -> Option<LayerId> {
        self.parent
    }

    #[inline]
    pub fn content(&self) -> &LayerContent {
        &self.content
    }

    #[inline]
    pub fn is_group(&self) -> bool {
        matches!(self.content, LayerContent::Group(_))
    }

    /// Children in paint order; empty for non-groups.
    pub fn children(&self) -> &[LayerId] {
        match &self.content {
            LayerContent::Group(g) => g.children(),
            _ => &[],
        }
    }

    /// Invisible layers contribute nothing and are skipped entirely.
    #[inline]
    pub fn is_drawable(&self) -> bool {
        self.visible && self.alpha > 0.0
    }

    /// Local size, when the content has one.
    pub fn size(&self) -> Option<Vec2> {
        self.content.size()
    }
}
