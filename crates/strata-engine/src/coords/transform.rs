use core::ops::Mul;

use super::{Rect, Vec2};

/// 2D affine transform.
///
/// Stored as the upper two rows of a 3×3 matrix:
///
/// ```text
/// | a  c  tx |
/// | b  d  ty |
/// | 0  0  1  |
/// ```
///
/// `p * q` (or `p.then(q)`) is the composition that applies `q` first and then
/// `p`. Descending the layer tree therefore reads `world = parent * local`.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Transform {
    pub a: f32,
    pub b: f32,
    pub c: f32,
    pub d: f32,
    pub tx: f32,
    pub ty: f32,
}

impl Transform {
    pub const IDENTITY: Self = Self::new(1.0, 0.0, 0.0, 1.0, 0.0, 0.0);

    #[inline]
    pub const fn new(a: f32, b: f32, c: f32, d: f32, tx: f32, ty: f32) -> Self {
        Self { a, b, c, d, tx, ty }
    }

    #[inline]
    pub const fn translate(x: f32, y: f32) -> Self {
        Self::new(1.0, 0.0, 0.0, 1.0, x, y)
    }

    #[inline]
    pub const fn scale(s: f32) -> Self {
        Self::scale_xy(s, s)
    }

    #[inline]
    pub const fn scale_xy(sx: f32, sy: f32) -> Self {
        Self::new(sx, 0.0, 0.0, sy, 0.0, 0.0)
    }

    /// Rotation in radians. Positive angles rotate +X towards +Y (clockwise on
    /// a +Y-down screen).
    #[inline]
    pub fn rotate(radians: f32) -> Self {
        let (s, c) = radians.sin_cos();
        Self::new(c, s, -s, c, 0.0, 0.0)
    }

    /// Shear: `x' = x + kx * y`, `y' = y + ky * x`.
    #[inline]
    pub const fn skew(kx: f32, ky: f32) -> Self {
        Self::new(1.0, ky, kx, 1.0, 0.0, 0.0)
    }

    /// Builds `translate ∘ rotate ∘ scale`, the usual sprite decomposition.
    pub fn from_parts(translation: Vec2, rotation: f32, scale: Vec2) -> Self {
        Self::translate(translation.x, translation.y)
            * Self::rotate(rotation)
            * Self::scale_xy(scale.x, scale.y)
    }

    /// Returns `self ∘ other`: `other` is applied first.
    #[inline]
    pub fn then(self, other: Transform) -> Transform {
        Transform {
            a: self.a * other.a + self.c * other.b,
            b: self.b * other.a + self.d * other.b,
            c: self.a * other.c + self.c * other.d,
            d: self.b * other.c + self.d * other.d,
            tx: self.a * other.tx + self.c * other.ty + self.tx,
            ty: self.b * other.tx + self.d * other.ty + self.ty,
        }
    }

    #[inline]
    pub fn translation(self) -> Vec2 {
        Vec2::new(self.tx, self.ty)
    }

    #[inline]
    pub fn with_translation(mut self, x: f32, y: f32) -> Self {
        self.tx = x;
        self.ty = y;
        self
    }

    #[inline]
    pub fn determinant(self) -> f32 {
        self.a * self.d - self.b * self.c
    }

    #[inline]
    pub fn is_finite(self) -> bool {
        self.a.is_finite()
            && self.b.is_finite()
            && self.c.is_finite()
            && self.d.is_finite()
            && self.tx.is_finite()
            && self.ty.is_finite()
    }

    /// Returns the inverse transform, or `None` when the matrix is singular.
    pub fn inverse(self) -> Option<Transform> {
        let det = self.determinant();
        if det == 0.0 || !det.is_finite() {
            return None;
        }
        let inv = 1.0 / det;
        let a = self.d * inv;
        let b = -self.b * inv;
        let c = -self.c * inv;
        let d = self.a * inv;
        Some(Transform {
            a,
            b,
            c,
            d,
            tx: -(a * self.tx + c * self.ty),
            ty: -(b * self.tx + d * self.ty),
        })
    }

    /// Maps a point.
    #[inline]
    pub fn apply(self, p: Vec2) -> Vec2 {
        Vec2::new(
            self.a * p.x + self.c * p.y + self.tx,
            self.b * p.x + self.d * p.y + self.ty,
        )
    }

    /// Maps a direction (ignores translation).
    #[inline]
    pub fn apply_vector(self, v: Vec2) -> Vec2 {
        Vec2::new(self.a * v.x + self.c * v.y, self.b * v.x + self.d * v.y)
    }

    /// Maps the four corners of `rect` and returns their axis-aligned bounds.
    pub fn transform_rect_bounds(self, rect: Rect) -> Rect {
        let r = rect.normalized();
        let corners = [
            self.apply(r.min()),
            self.apply(Vec2::new(r.origin.x + r.size.x, r.origin.y)),
            self.apply(r.max()),
            self.apply(Vec2::new(r.origin.x, r.origin.y + r.size.y)),
        ];

        corners[1..].iter().fold(Rect::from_min_max(corners[0], corners[0]), |acc, &p| {
            Rect::from_min_max(
                Vec2::new(acc.origin.x.min(p.x), acc.origin.y.min(p.y)),
                Vec2::new(acc.max().x.max(p.x), acc.max().y.max(p.y)),
            )
        })
    }

    /// Component-wise comparison with a tolerance; handy after trig.
    pub fn approx_eq(self, other: Transform, eps: f32) -> bool {
        (self.a - other.a).abs() <= eps
            && (self.b - other.b).abs() <= eps
            && (self.c - other.c).abs() <= eps
            && (self.d - other.d).abs() <= eps
            && (self.tx - other.tx).abs() <= eps
            && (self.ty - other.ty).abs() <= eps
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Mul for Transform {
    type Output = Transform;
    #[inline]
    fn mul(self, rhs: Transform) -> Transform {
        self.then(rhs)
    }
}
