/// Handle to a layer in a [`LayerTree`](super::LayerTree).
///
/// A handle outlives the layer it names; once the slot is reused the
/// generation no longer matches and lookups report
/// [`RenderError::StaleLayer`](crate::error::RenderError::StaleLayer).
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct LayerId {
    pub(super) idx: u32,
    pub(super) generation: u32,
}

impl LayerId {
    #[inline]
    pub fn index(self) -> u32 {
        self.idx
    }

    #[inline]
    pub fn generation(self) -> u32 {
        self.generation
    }
}
