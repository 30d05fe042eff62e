use crate::backend::{
    BackendError, DrawData, DrawState, DrawSubmission, GraphicsBackend, TriangleVertex,
};

use super::{grown_capacity, BatchConfig, BatchCore, BatchKind, BatchStats, Quad, QuadBatch};

const VERTICES_PER_QUAD: usize = 6;

/// Fallback strategy: every quad is expanded on the CPU into two triangles
/// and the whole buffer goes out as one plain triangle-list draw.
///
/// Works on any backend; no capability is probed.
#[derive(Debug)]
pub struct TriangleBatch {
    vertices: Vec<TriangleVertex>,
    min_quads: usize,
    core: BatchCore,
}

impl TriangleBatch {
    pub fn new(config: &BatchConfig) -> Self {
        let min_quads = grown_capacity(config.initial_quads, 1);
        Self {
            vertices: Vec::with_capacity(min_quads * VERTICES_PER_QUAD),
            min_quads,
            core: BatchCore::default(),
        }
    }

    /// Current buffer capacity, in quads.
    pub fn capacity(&self) -> usize {
        self.vertices.capacity() / VERTICES_PER_QUAD
    }

    fn ensure_capacity(&mut self, required_quads: usize) {
        if required_quads <= self.capacity() {
            return;
        }
        let new_cap = grown_capacity(required_quads, self.min_quads) * VERTICES_PER_QUAD;
        self.vertices.reserve_exact(new_cap - self.vertices.len());
        log::debug!("triangle batch grown to {} quads", self.capacity());
    }
}

impl QuadBatch for TriangleBatch {
    fn kind(&self) -> BatchKind {
        BatchKind::Triangle
    }

    fn state(&self) -> DrawState {
        self.core.state
    }

    fn pending(&self) -> usize {
        self.vertices.len() / VERTICES_PER_QUAD
    }

    fn stats(&self) -> BatchStats {
        self.core.stats
    }

    fn reset_stats(&mut self) {
        self.core.stats = BatchStats::default();
    }

    fn begin(&mut self) {
        self.vertices.clear();
        self.core.state = DrawState::default();
    }

    fn set_state(
        &mut self,
        backend: &mut dyn GraphicsBackend,
        state: DrawState,
    ) -> Result<(), BackendError> {
        if state == self.core.state {
            return Ok(());
        }
        let flushed = self.flush(backend);
        self.core.state = state;
        flushed
    }

    fn add_quad(
        &mut self,
        _backend: &mut dyn GraphicsBackend,
        quad: &Quad,
    ) -> Result<(), BackendError> {
        if !self.core.accept(quad) {
            return Ok(());
        }
        self.ensure_capacity(self.pending() + 1);
        self.vertices.extend_from_slice(&quad.to_instance().expand());
        Ok(())
    }

    fn flush(&mut self, backend: &mut dyn GraphicsBackend) -> Result<(), BackendError> {
        if self.vertices.is_empty() {
            return Ok(());
        }
        let quads = self.pending();
        let result = backend.submit_draw(DrawSubmission {
            data: DrawData::Triangles(&self.vertices),
            state: self.core.state,
            primitive_count: self.vertices.len() / 3,
        });
        self.vertices.clear();
        self.core.flushed(BatchKind::Triangle, quads, &result);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{Capability, SoftwareBackend, TargetHandle};
    use crate::coords::{Rect, Transform, Viewport};
    use crate::paint::Color;

    #[test]
    fn works_without_instancing() {
        let mut be = SoftwareBackend::new(8, 8).with_capability(Capability::Instancing, false);
        be.bind_target(TargetHandle::Frame, Viewport::new(8.0, 8.0)).unwrap();

        let mut batch = TriangleBatch::new(&BatchConfig::default());
        let q = Quad {
            transform: Transform::IDENTITY,
            dest: Rect::new(0.0, 0.0, 4.0, 4.0),
            uv: Rect::UNIT,
            tint: Color::WHITE,
        };
        batch.add_quad(&mut be, &q).unwrap();
        batch.add_quad(&mut be, &q).unwrap();
        batch.flush(&mut be).unwrap();

        assert_eq!(be.stats().draw_calls, 1);
        assert_eq!(be.stats().instanced_draw_calls, 0);
        assert_eq!(be.stats().primitives, 4);
        assert_eq!(be.pixel(1, 1), Color::WHITE);
    }

    #[test]
    fn buffer_grows_past_initial_capacity() {
        let mut be = SoftwareBackend::new(1, 1);
        let config = BatchConfig { initial_quads: 2, ..BatchConfig::default() };
        let mut batch = TriangleBatch::new(&config);
        let q = Quad {
            transform: Transform::IDENTITY,
            dest: Rect::UNIT,
            uv: Rect::UNIT,
            tint: Color::WHITE,
        };
        for _ in 0..5 {
            batch.add_quad(&mut be, &q).unwrap();
        }
        assert_eq!(batch.pending(), 5);
        assert!(batch.capacity() >= 8);
    }
}
