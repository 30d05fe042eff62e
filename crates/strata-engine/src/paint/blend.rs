/// How a primitive's premultiplied color combines with the target.
///
/// Blend mode is batch state: switching it between two quads forces a flush,
/// so keep runs of equal modes together where possible.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
pub enum BlendMode {
    /// Premultiplied source-over: `dst = src + dst * (1 - src.a)`.
    #[default]
    Normal,
    /// `dst = src + dst`.
    Additive,
    /// `dst = src * dst + dst * (1 - src.a)`.
    Multiply,
    /// `dst = src + dst * (1 - src)`.
    Screen,
}

impl BlendMode {
    pub const ALL: [BlendMode; 4] = [
        BlendMode::Normal,
        BlendMode::Additive,
        BlendMode::Multiply,
        BlendMode::Screen,
    ];

    /// Blends one premultiplied channel. `src_a` is the source alpha.
    #[inline]
    pub fn blend_channel(self, src: f32, src_a: f32, dst: f32) -> f32 {
        match self {
            BlendMode::Normal => src + dst * (1.0 - src_a),
            BlendMode::Additive => src + dst,
            BlendMode::Multiply => src * dst + dst * (1.0 - src_a),
            BlendMode::Screen => src + dst * (1.0 - src),
        }
    }

    /// Blends the alpha channel. Every mode accumulates coverage the same way.
    #[inline]
    pub fn blend_alpha(self, src_a: f32, dst_a: f32) -> f32 {
        match self {
            BlendMode::Additive => (src_a + dst_a).min(1.0),
            _ => src_a + dst_a * (1.0 - src_a),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normal_opaque_source_replaces_destination() {
        assert_eq!(BlendMode::Normal.blend_channel(0.25, 1.0, 0.9), 0.25);
    }

    #[test]
    fn normal_transparent_source_keeps_destination() {
        assert_eq!(BlendMode::Normal.blend_channel(0.0, 0.0, 0.9), 0.9);
    }

    #[test]
    fn additive_sums() {
        assert_eq!(BlendMode::Additive.blend_channel(0.25, 0.5, 0.5), 0.75);
        assert_eq!(BlendMode::Additive.blend_alpha(0.75, 0.75), 1.0);
    }

    #[test]
    fn multiply_with_white_destination_is_source() {
        assert_eq!(BlendMode::Multiply.blend_channel(0.4, 1.0, 1.0), 0.4);
    }
}
