use crate::coords::Vec2;
use crate::error::{RenderError, RenderResult};

use super::{Layer, LayerContent, LayerId, LayerPainter};
use crate::backend::Image;
use crate::paint::Color;

#[derive(Debug)]
struct Slot {
    generation: u32,
    layer: Option<Layer>,
}

/// Arena of layers.
///
/// Structural edits (`add`, `insert`, `remove`, `detach`, `destroy`) keep the
/// group child lists and parent handles in sync: a layer has at most one
/// parent and appears exactly once in that parent's child list.
#[derive(Debug, Default)]
pub struct LayerTree {
    slots: Vec<Slot>,
    free: Vec<u32>,
    len: usize,
}

impl LayerTree {
    pub fn new() -> Self {
        Self::default()
    }

    // ── lifecycle ─────────────────────────────────────────────────────────

    /// Creates a detached layer.
    pub fn create(&mut self, content: LayerContent) -> LayerId {
        let layer = Layer::new(content);
        self.len += 1;
        match self.free.pop() {
            Some(idx) => {
                let slot = &mut self.slots[idx as usize];
                slot.layer = Some(layer);
                LayerId { idx, generation: slot.generation }
            }
            None => {
                let idx = self.slots.len() as u32;
                self.slots.push(Slot { generation: 0, layer: Some(layer) });
                LayerId { idx, generation: 0 }
            }
        }
    }

    pub fn create_group(&mut self) -> LayerId {
        self.create(LayerContent::group())
    }

    pub fn create_solid(&mut self, width: f32, height: f32, color: Color) -> LayerId {
        self.create(LayerContent::solid(width, height, color))
    }

    pub fn create_image(&mut self, image: Image) -> LayerId {
        self.create(LayerContent::image(image))
    }

    pub fn create_custom(&mut self, painter: impl LayerPainter + 'static) -> LayerId {
        self.create(LayerContent::custom(painter))
    }

    /// Frees `id`. It is detached from its parent; its children (if any)
    /// become detached roots and stay alive.
    pub fn destroy(&mut self, id: LayerId) -> RenderResult<()> {
        self.detach(id)?;
        let children = self.take_children(id)?;
        for child in children {
            if let Some(layer) = self.layer_mut(child) {
                layer.parent = None;
            }
        }
        self.free_slot(id);
        Ok(())
    }

    /// Frees `id` and every descendant.
    pub fn destroy_subtree(&mut self, id: LayerId) -> RenderResult<()> {
        self.detach(id)?;
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            stack.extend(self.take_children(next)?);
            self.free_slot(next);
        }
        Ok(())
    }

    fn free_slot(&mut self, id: LayerId) {
        let slot = &mut self.slots[id.idx as usize];
        slot.layer = None;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.idx);
        self.len -= 1;
    }

    fn take_children(&mut self, id: LayerId) -> RenderResult<Vec<LayerId>> {
        Ok(match &mut self.get_mut(id)?.content {
            LayerContent::Group(g) => std::mem::take(&mut g.children),
            _ => Vec::new(),
        })
    }

    // ── lookup ────────────────────────────────────────────────────────────

    /// Live layers.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_alive(&self, id: LayerId) -> bool {
        self.layer(id).is_some()
    }

    pub fn get(&self, id: LayerId) -> RenderResult<&Layer> {
        self.layer(id).ok_or(RenderError::StaleLayer(id))
    }

    pub fn get_mut(&mut self, id: LayerId) -> RenderResult<&mut Layer> {
        self.layer_mut(id).ok_or(RenderError::StaleLayer(id))
    }

    pub(super) fn layer(&self, id: LayerId) -> Option<&Layer> {
        self.slots
            .get(id.idx as usize)
            .filter(|s| s.generation == id.generation)
            .and_then(|s| s.layer.as_ref())
    }

    fn layer_mut(&mut self, id: LayerId) -> Option<&mut Layer> {
        self.slots
            .get_mut(id.idx as usize)
            .filter(|s| s.generation == id.generation)
            .and_then(|s| s.layer.as_mut())
    }

    pub fn parent(&self, id: LayerId) -> RenderResult<Option<LayerId>> {
        Ok(self.get(id)?.parent)
    }

    pub fn children(&self, group: LayerId) -> RenderResult<&[LayerId]> {
        match &self.get(group)?.content {
            LayerContent::Group(g) => Ok(&g.children),
            _ => Err(RenderError::NotAGroup(group)),
        }
    }

    pub fn child_count(&self, group: LayerId) -> RenderResult<usize> {
        Ok(self.children(group)?.len())
    }

    /// Number of ancestors.
    pub fn depth_of(&self, id: LayerId) -> RenderResult<usize> {
        let mut depth = 0;
        let mut cursor = self.get(id)?.parent;
        while let Some(p) = cursor {
            depth += 1;
            cursor = self.get(p)?.parent;
        }
        Ok(depth)
    }

    /// `true` if `ancestor` is `id` or one of its ancestors.
    pub fn is_ancestor_or_self(&self, ancestor: LayerId, id: LayerId) -> bool {
        let mut cursor = Some(id);
        while let Some(c) = cursor {
            if c == ancestor {
                return true;
            }
            cursor = self.layer(c).and_then(|l| l.parent);
        }
        false
    }

    // ── structure ─────────────────────────────────────────────────────────

    /// Appends `child` on top of `group`'s children.
    pub fn add(&mut self, group: LayerId, child: LayerId) -> RenderResult<()> {
        let count = self.child_count(group)?;
        self.insert(group, count, child)
    }

    /// Inserts `child` at `index` (clamped). A child parented elsewhere, or
    /// already in `group`, is moved.
    pub fn insert(&mut self, group: LayerId, index: usize, child: LayerId) -> RenderResult<()> {
        self.children(group)?;
        self.get(child)?;
        if self.is_ancestor_or_self(child, group) {
            return Err(RenderError::Cycle);
        }

        self.detach(child)?;
        if let LayerContent::Group(g) = &mut self.get_mut(group)?.content {
            let index = index.min(g.children.len());
            g.children.insert(index, child);
        }
        self.get_mut(child)?.parent = Some(group);
        Ok(())
    }

    /// Removes `child` from `group`. Returns `false` if it was not a child.
    pub fn remove(&mut self, group: LayerId, child: LayerId) -> RenderResult<bool> {
        self.children(group)?;
        if self.get(child)?.parent != Some(group) {
            return Ok(false);
        }
        self.detach(child)?;
        Ok(true)
    }

    /// Detaches every child of `group`; they stay alive as roots.
    pub fn remove_all(&mut self, group: LayerId) -> RenderResult<()> {
        self.children(group)?;
        for child in self.take_children(group)? {
            if let Some(layer) = self.layer_mut(child) {
                layer.parent = None;
            }
        }
        Ok(())
    }

    /// Removes `id` from its parent, if any.
    pub fn detach(&mut self, id: LayerId) -> RenderResult<()> {
        let Some(parent) = self.get(id)?.parent else {
            return Ok(());
        };
        if let Some(LayerContent::Group(g)) = self.layer_mut(parent).map(|l| &mut l.content) {
            g.children.retain(|&c| c != id);
        }
        self.get_mut(id)?.parent = None;
        Ok(())
    }

    // ── content ───────────────────────────────────────────────────────────

    /// Replaces what `id` draws. Children of a replaced group are detached.
    pub fn set_content(&mut self, id: LayerId, content: LayerContent) -> RenderResult<()> {
        self.remove_all(id).or_else(|e| match e {
            RenderError::NotAGroup(_) => Ok(()),
            other => Err(other),
        })?;
        self.get_mut(id)?.content = content;
        Ok(())
    }

    /// Sets the local clip size of a group.
    pub fn set_clip(&mut self, group: LayerId, clip: Option<Vec2>) -> RenderResult<()> {
        match &mut self.get_mut(group)?.content {
            LayerContent::Group(g) => {
                g.clip = clip;
                Ok(())
            }
            _ => Err(RenderError::NotAGroup(group)),
        }
    }
}
