use crate::backend::{
    BackendError, Capability, DrawData, DrawState, DrawSubmission, GraphicsBackend, QuadInstance,
};

use super::{
    grown_capacity, BatchConfig, BatchCore, BatchInitError, BatchKind, BatchStats, Quad, QuadBatch,
};

/// Instanced strategy: one [`QuadInstance`] per quad, one instanced draw per
/// flush. Reaching the backend's per-draw instance limit flushes early.
#[derive(Debug)]
pub struct UniformBatch {
    instances: Vec<QuadInstance>,
    max_quads: usize,
    min_capacity: usize,
    core: BatchCore,
}

impl UniformBatch {
    /// Probes the backend and sizes the batch from its limits.
    pub fn new(
        backend: &dyn GraphicsBackend,
        config: &BatchConfig,
    ) -> Result<Self, BatchInitError> {
        match backend.probe_capability(Capability::Instancing) {
            Ok(true) => {}
            Ok(false) => return Err(BatchInitError::Unsupported),
            Err(e) => return Err(BatchInitError::Probe(e)),
        }

        let max_quads = backend.limits().max_instances_per_draw;
        if max_quads == 0 || max_quads < config.min_uniform_quads {
            return Err(BatchInitError::Limits {
                available: max_quads,
                required: config.min_uniform_quads.max(1),
            });
        }

        let min_capacity = grown_capacity(config.initial_quads, 1).min(max_quads);
        Ok(Self {
            instances: Vec::with_capacity(min_capacity),
            max_quads,
            min_capacity,
            core: BatchCore::default(),
        })
    }

    /// Largest number of quads issued by one draw.
    pub fn max_quads(&self) -> usize {
        self.max_quads
    }

    /// Current buffer capacity, in quads.
    pub fn capacity(&self) -> usize {
        self.instances.capacity()
    }

    fn ensure_capacity(&mut self, required: usize) {
        if required <= self.instances.capacity() {
            return;
        }
        let new_cap = grown_capacity(required, self.min_capacity).min(self.max_quads);
        self.instances.reserve_exact(new_cap - self.instances.len());
        log::debug!("uniform batch grown to {} quads", self.instances.capacity());
    }
}

impl QuadBatch for UniformBatch {
    fn kind(&self) -> BatchKind {
        BatchKind::Uniform
    }

    fn state(&self) -> DrawState {
        self.core.state
    }

    fn pending(&self) -> usize {
        self.instances.len()
    }

    fn stats(&self) -> BatchStats {
        self.core.stats
    }

    fn reset_stats(&mut self) {
        self.core.stats = BatchStats::default();
    }

    fn begin(&mut self) {
        self.instances.clear();
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
        backend: &mut dyn GraphicsBackend,
        quad: &Quad,
    ) -> Result<(), BackendError> {
        if !self.core.accept(quad) {
            return Ok(());
        }
        if self.instances.len() >= self.max_quads {
            self.flush(backend)?;
        }
        self.ensure_capacity(self.instances.len() + 1);
        self.instances.push(quad.to_instance());
        Ok(())
    }

    fn flush(&mut self, backend: &mut dyn GraphicsBackend) -> Result<(), BackendError> {
        if self.instances.is_empty() {
            return Ok(());
        }
        let count = self.instances.len();
        let result = backend.submit_draw(DrawSubmission {
            data: DrawData::Instances(&self.instances),
            state: self.core.state,
            primitive_count: count,
        });
        self.instances.clear();
        self.core.flushed(BatchKind::Uniform, count, &result);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendLimits, SoftwareBackend, TargetHandle};
    use crate::coords::{Rect, Transform, Viewport};
    use crate::paint::Color;

    fn quad(i: usize) -> Quad {
        Quad {
            transform: Transform::IDENTITY,
            dest: Rect::new(i as f32, 0.0, 1.0, 1.0),
            uv: Rect::UNIT,
            tint: Color::WHITE,
        }
    }

    fn bound(limits: BackendLimits) -> SoftwareBackend {
        let mut b = SoftwareBackend::new(64, 8).with_limits(limits);
        b.bind_target(TargetHandle::Frame, Viewport::new(64.0, 8.0)).unwrap();
        b
    }

    #[test]
    fn buffer_grows_by_doubling() {
        let config = BatchConfig { initial_quads: 4, ..BatchConfig::default() };
        let mut be = bound(BackendLimits::default());
        let mut batch = UniformBatch::new(&be, &config).unwrap();
        assert!(batch.capacity() >= 4);

        for i in 0..9 {
            batch.add_quad(&mut be, &quad(i)).unwrap();
        }
        assert_eq!(batch.pending(), 9);
        assert!(batch.capacity() >= 16);
        assert_eq!(be.stats().draw_calls, 0);
    }

    #[test]
    fn per_draw_limit_splits_flushes() {
        let limits = BackendLimits { max_instances_per_draw: 16, ..BackendLimits::default() };
        let mut be = bound(limits);
        let mut batch = UniformBatch::new(&be, &BatchConfig::default()).unwrap();

        for i in 0..40 {
            batch.add_quad(&mut be, &quad(i)).unwrap();
        }
        batch.flush(&mut be).unwrap();

        // 16 + 16 + 8
        assert_eq!(be.stats().instanced_draw_calls, 3);
        assert_eq!(be.stats().primitives, 40);
    }

    #[test]
    fn small_limits_are_rejected() {
        let limits = BackendLimits { max_instances_per_draw: 4, ..BackendLimits::default() };
        let be = SoftwareBackend::new(1, 1).with_limits(limits);
        let err = UniformBatch::new(&be, &BatchConfig::default()).unwrap_err();
        assert_eq!(err, BatchInitError::Limits { available: 4, required: 16 });
    }

    #[test]
    fn begin_discards_leftovers() {
        let mut be = bound(BackendLimits::default());
        let mut batch = UniformBatch::new(&be, &BatchConfig::default()).unwrap();
        batch.add_quad(&mut be, &quad(0)).unwrap();
        batch.begin();
        assert_eq!(batch.pending(), 0);
        assert_eq!(batch.state(), DrawState::default());
    }
}
