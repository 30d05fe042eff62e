//! Scene driver.
//!
//! Binds the layer tree to a per-frame paint tick: one root group, one
//! surface for the frame target and one default batch chosen at construction.

mod driver;
mod signal;

use crate::layer::{LayerId, LayerTree};

pub use driver::{SceneConfig, SceneDriver};
pub use signal::{PaintSignal, SlotId};

/// The layer tree together with its root group.
///
/// Destroying the root through [`tree_mut`](Self::tree_mut) makes every later
/// paint fail with `StaleLayer`.
#[derive(Debug)]
pub struct Scene {
    tree: LayerTree,
    root: LayerId,
}

impl Scene {
    pub fn new() -> Self {
        let mut tree = LayerTree::new();
        let root = tree.create_group();
        if let Ok(layer) = tree.get_mut(root) {
            layer.set_name("root");
        }
        Self { tree, root }
    }

    #[inline]
    pub fn root(&self) -> LayerId {
        self.root
    }

    #[inline]
    pub fn tree(&self) -> &LayerTree {
        &self.tree
    }

    #[inline]
    pub fn tree_mut(&mut self) -> &mut LayerTree {
        &mut self.tree
    }
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}
