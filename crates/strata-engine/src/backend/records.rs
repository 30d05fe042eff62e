use bytemuck::{Pod, Zeroable};

use crate::coords::{Rect, Transform, Vec2};
use crate::paint::Color;

/// Corners of the unit quad, in the order referenced by [`QUAD_TRIANGLE_ORDER`].
pub const QUAD_CORNERS: [Vec2; 4] = [
    Vec2::new(0.0, 0.0),
    Vec2::new(1.0, 0.0),
    Vec2::new(1.0, 1.0),
    Vec2::new(0.0, 1.0),
];

/// Two triangles sharing the 0–2 diagonal.
pub const QUAD_TRIANGLE_ORDER: [usize; 6] = [0, 1, 2, 0, 2, 3];

/// Per-quad record of the instanced path.
///
/// `xform` + `translate` map the unit square onto the quad's screen-space
/// parallelogram; `uv_*` select the texture region; `tint` is premultiplied.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct QuadInstance {
    pub xform: [f32; 4], // a, b, c, d
    pub translate: [f32; 2],
    pub uv_origin: [f32; 2],
    pub uv_size: [f32; 2],
    pub tint: [f32; 4],
}

impl QuadInstance {
    #[inline]
    pub fn new(unit: Transform, uv: Rect, tint: Color) -> Self {
        Self {
            xform: [unit.a, unit.b, unit.c, unit.d],
            translate: [unit.tx, unit.ty],
            uv_origin: [uv.origin.x, uv.origin.y],
            uv_size: [uv.size.x, uv.size.y],
            tint: tint.to_array(),
        }
    }

    #[inline]
    pub fn unit_transform(&self) -> Transform {
        let [a, b, c, d] = self.xform;
        Transform::new(a, b, c, d, self.translate[0], self.translate[1])
    }

    /// Expands the record into the six vertices of its two triangles.
    ///
    /// Both batch strategies and the software backend go through this, so the
    /// instanced and triangle paths produce bit-identical geometry.
    pub fn expand(&self) -> [TriangleVertex; 6] {
        let m = self.unit_transform();
        let mut out = [TriangleVertex::zeroed(); 6];
        for (slot, &corner) in out.iter_mut().zip(QUAD_TRIANGLE_ORDER.iter()) {
            let k = QUAD_CORNERS[corner];
            let p = m.apply(k);
            *slot = TriangleVertex {
                pos: [p.x, p.y],
                uv: [
                    self.uv_origin[0] + k.x * self.uv_size[0],
                    self.uv_origin[1] + k.y * self.uv_size[1],
                ],
                tint: self.tint,
            };
        }
        out
    }
}

/// Vertex of the triangle path. Position is already in target logical pixels.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct TriangleVertex {
    pub pos: [f32; 2],
    pub uv: [f32; 2],
    pub tint: [f32; 4],
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expand_maps_unit_square_through_transform() {
        let unit = Transform::translate(10.0, 20.0) * Transform::scale_xy(4.0, 2.0);
        let verts = QuadInstance::new(unit, Rect::UNIT, Color::WHITE).expand();

        assert_eq!(verts[0].pos, [10.0, 20.0]);
        assert_eq!(verts[1].pos, [14.0, 20.0]);
        assert_eq!(verts[2].pos, [14.0, 22.0]);
        assert_eq!(verts[5].pos, [10.0, 22.0]);
    }

    #[test]
    fn expand_interpolates_uv_region() {
        let uv = Rect::new(0.5, 0.25, 0.5, 0.5);
        let verts = QuadInstance::new(Transform::IDENTITY, uv, Color::WHITE).expand();
        assert_eq!(verts[0].uv, [0.5, 0.25]);
        assert_eq!(verts[2].uv, [1.0, 0.75]);
    }

    #[test]
    fn records_have_no_padding() {
        assert_eq!(std::mem::size_of::<QuadInstance>(), 14 * 4);
        assert_eq!(std::mem::size_of::<TriangleVertex>(), 8 * 4);
    }
}
