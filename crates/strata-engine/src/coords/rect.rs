use super::Vec2;

/// Axis-aligned rectangle in logical pixels (top-left origin).
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct Rect {
    pub origin: Vec2,
    pub size: Vec2,
}

impl Rect {
    #[inline]
    pub const fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self {
            origin: Vec2::new(x, y),
            size: Vec2::new(w, h),
        }
    }

    #[inline]
    pub const fn from_origin_size(origin: Vec2, size: Vec2) -> Self {
        Self { origin, size }
    }

    /// Rect anchored at the origin.
    #[inline]
    pub const fn from_size(w: f32, h: f32) -> Self {
        Self::new(0.0, 0.0, w, h)
    }

    /// The unit square, used as the default UV region.
    pub const UNIT: Rect = Rect::new(0.0, 0.0, 1.0, 1.0);

    #[inline]
    pub fn min(self) -> Vec2 {
        self.origin
    }

    #[inline]
    pub fn max(self) -> Vec2 {
        Vec2::new(self.origin.x + self.size.x, self.origin.y + self.size.y)
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        self.size.x <= 0.0 || self.size.y <= 0.0
    }

    #[inline]
    pub fn is_finite(self) -> bool {
        self.origin.is_finite() && self.size.is_finite()
    }

    /// Rect spanning two corners, in any order.
    #[inline]
    pub fn from_min_max(a: Vec2, b: Vec2) -> Self {
        let min = Vec2::new(a.x.min(b.x), a.y.min(b.y));
        let max = Vec2::new(a.x.max(b.x), a.y.max(b.y));
        Self::from_origin_size(min, max - min)
    }

    /// Same area with non-negative width and height.
    #[inline]
    pub fn normalized(self) -> Self {
        Self::from_min_max(self.min(), self.max())
    }

    /// Half-open containment: `[min, max)`. Used by hit testing, so a point on
    /// a shared edge belongs to exactly one of two adjacent rects.
    #[inline]
    pub fn contains(self, p: Vec2) -> bool {
        let r = self.normalized();
        let max = r.max();
        (r.origin.x..max.x).contains(&p.x) && (r.origin.y..max.y).contains(&p.y)
    }

    /// Overlap of two rects; `None` unless both extents are positive.
    #[inline]
    pub fn intersect(self, other: Rect) -> Option<Rect> {
        let (a, b) = (self.normalized(), other.normalized());
        let (a_max, b_max) = (a.max(), b.max());
        let min = Vec2::new(a.origin.x.max(b.origin.x), a.origin.y.max(b.origin.y));
        let max = Vec2::new(a_max.x.min(b_max.x), a_max.y.min(b_max.y));
        (max.x > min.x && max.y > min.y).then(|| Rect::from_origin_size(min, max - min))
    }
}

impl Rect {
    /// Like [`intersect`](Self::intersect) but yields a zero-area rect at the
    /// origin when there is no overlap, so nested clips stay representable.
    #[inline]
    pub fn intersect_or_empty(self, other: Rect) -> Rect {
        self.intersect(other).unwrap_or(Rect::new(0.0, 0.0, 0.0, 0.0))
    }

    /// Maps `inner` (in pixel units of `self`'s size) into the unit square.
    ///
    /// Used to turn a texture source region into normalized UVs.
    #[inline]
    pub fn normalize_within(self, inner: Rect) -> Rect {
        let w = if self.size.x == 0.0 { 1.0 } else { self.size.x };
        let h = if self.size.y == 0.0 { 1.0 } else { self.size.y };
        Rect::new(
            (inner.origin.x - self.origin.x) / w,
            (inner.origin.y - self.origin.y) / h,
            inner.size.x / w,
            inner.size.y / h,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn r(x: f32, y: f32, w: f32, h: f32) -> Rect { Rect::new(x, y, w, h) }

    // ── normalized / contains ─────────────────────────────────────────────

    #[test]
    fn negative_extents_flip_around_origin() {
        assert_eq!(r(10.0, 10.0, -4.0, -3.0).normalized(), r(6.0, 7.0, 4.0, 3.0));
        assert_eq!(r(1.0, 2.0, 10.0, 20.0).normalized(), r(1.0, 2.0, 10.0, 20.0));
    }

    #[test]
    fn containment_is_half_open() {
        let rect = r(0.0, 0.0, 10.0, 10.0);
        assert!(rect.contains(Vec2::zero()));
        assert!(rect.contains(Vec2::new(9.99, 5.0)));
        assert!(!rect.contains(Vec2::new(10.0, 10.0)));
        assert!(!rect.contains(Vec2::new(-1.0, 5.0)));
    }

    #[test]
    fn flipped_rect_still_contains_its_interior() {
        assert!(r(10.0, 10.0, -10.0, -10.0).contains(Vec2::new(5.0, 5.0)));
    }

    // ── intersect (clip nesting) ──────────────────────────────────────────

    #[test]
    fn overlap_and_containment() {
        let a = r(0.0, 0.0, 10.0, 10.0);
        assert_eq!(a.intersect(r(5.0, 5.0, 10.0, 10.0)), Some(r(5.0, 5.0, 5.0, 5.0)));
        assert_eq!(r(0.0, 0.0, 100.0, 100.0).intersect(a), Some(a));
    }

    #[test]
    fn shared_edge_is_no_intersection() {
        // Zero-width overlap would produce an unusable scissor.
        assert!(r(0.0, 0.0, 10.0, 10.0).intersect(r(10.0, 0.0, 10.0, 10.0)).is_none());
    }

    #[test]
    fn disjoint_clip_collapses_to_empty() {
        let clip = r(0.0, 0.0, 5.0, 5.0).intersect_or_empty(r(20.0, 20.0, 5.0, 5.0));
        assert!(clip.is_empty());
        // Further nesting stays empty.
        assert!(clip.intersect_or_empty(r(0.0, 0.0, 100.0, 100.0)).is_empty());
    }

    // ── normalize_within ──────────────────────────────────────────────────

    #[test]
    fn source_region_maps_to_uv() {
        let tex = Rect::from_size(64.0, 32.0);
        assert_eq!(tex.normalize_within(r(16.0, 8.0, 32.0, 16.0)), r(0.25, 0.25, 0.5, 0.5));
        assert_eq!(tex.normalize_within(tex), Rect::UNIT);
    }

    #[test]
    fn zero_sized_texture_does_not_divide_by_zero() {
        let uv = Rect::from_size(0.0, 0.0).normalize_within(r(1.0, 1.0, 2.0, 2.0));
        assert!(uv.is_finite());
    }
}
