use crate::backend::Image;
use crate::coords::{Rect, Vec2};
use crate::error::RenderResult;
use crate::paint::Color;
use crate::surface::Surface;

use super::LayerId;

/// Custom drawing through the [`Surface`] API.
///
/// The surface arrives with the layer's transform, alpha, tint and blend
/// already applied; draw in layer-local coordinates.
pub trait LayerPainter {
    fn paint(&self, surface: &mut Surface) -> RenderResult<()>;

    /// Local size used for hit testing. `None` makes the layer unhittable.
    fn size(&self) -> Option<Vec2> {
        None
    }
}

impl<F> LayerPainter for F
where
    F: Fn(&mut Surface) -> RenderResult<()>,
{
    fn paint(&self, surface: &mut Surface) -> RenderResult<()> {
        self(surface)
    }
}

/// Ordered children of a group layer. Index order is paint order.
#[derive(Debug, Clone, Default)]
pub struct Group {
    pub(super) children: Vec<LayerId>,
    /// Local clip size anchored at the origin.
    pub clip: Option<Vec2>,
}

impl Group {
    #[inline]
    pub fn children(&self) -> &[LayerId] {
        &self.children
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ImageLayer {
    pub image: Image,
    /// Pixel region of the image; `None` draws all of it.
    pub source: Option<Rect>,
    /// Drawn size; `None` uses the source region's (or image's) natural size.
    pub size: Option<Vec2>,
}

impl ImageLayer {
    pub fn new(image: Image) -> Self {
        Self { image, source: None, size: None }
    }

    pub fn size(&self) -> Vec2 {
        self.size
            .or_else(|| self.source.map(|s| s.size))
            .unwrap_or(self.image.bounds().size)
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct SolidLayer {
    pub size: Vec2,
    pub color: Color,
}

/// What a layer draws.
pub enum LayerContent {
    Group(Group),
    Image(ImageLayer),
    Solid(SolidLayer),
    Custom(Box<dyn LayerPainter>),
}

impl LayerContent {
    pub fn group() -> Self {
        LayerContent::Group(Group::default())
    }

    pub fn solid(width: f32, height: f32, color: Color) -> Self {
        LayerContent::Solid(SolidLayer { size: Vec2::new(width, height), color })
    }

    pub fn image(image: Image) -> Self {
        LayerContent::Image(ImageLayer::new(image))
    }

    pub fn custom(painter: impl LayerPainter + 'static) -> Self {
        LayerContent::Custom(Box::new(painter))
    }

    /// Local size, when the content has one.
    pub fn size(&self) -> Option<Vec2> {
        match self {
            LayerContent::Group(g) => g.clip,
            LayerContent::Image(i) => Some(i.size()),
            LayerContent::Solid(s) => Some(s.size),
            LayerContent::Custom(p) => p.size(),
        }
    }
}

impl std::fmt::Debug for LayerContent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LayerContent::Group(g) => f.debug_tuple("Group").field(g).finish(),
            LayerContent::Image(i) => f.debug_tuple("Image").field(i).finish(),
            LayerContent::Solid(s) => f.debug_tuple("Solid").field(s).finish(),
            LayerContent::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}
