//! Quad batching.
//!
//! A batch accumulates rectangular primitives that share one [`DrawState`]
//! and turns them into as few backend draw calls as possible. Any state change
//! flushes first, so the visible painter's order is never altered: only
//! consecutive primitives with identical state are merged.
//!
//! Two strategies exist, chosen once per surface by [`select_default_batch`]:
//! - [`UniformBatch`]: one instanced draw per flush, needs instancing support
//! - [`TriangleBatch`]: one plain triangle-list draw per flush, always works

mod select;
mod triangle;
mod uniform;

use thiserror::Error;

use crate::backend::{BackendError, DrawState, GraphicsBackend, QuadInstance, TextureHandle};
use crate::coords::{Rect, Transform};
use crate::paint::{BlendMode, Color};

pub use select::select_default_batch;
pub use triangle::TriangleBatch;
pub use uniform::UniformBatch;

/// Batch sizing and strategy preferences.
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Try the instanced strategy before falling back to triangles.
    pub prefer_uniform: bool,
    /// Initial buffer capacity, in quads. Rounded up to a power of two.
    pub initial_quads: usize,
    /// Smallest per-draw instance limit for which the instanced strategy is
    /// considered worthwhile.
    pub min_uniform_quads: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            prefer_uniform: true,
            initial_quads: 64,
            min_uniform_quads: 16,
        }
    }
}

/// One rectangular primitive.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Quad {
    /// Current surface transform.
    pub transform: Transform,
    /// Destination rect in the transform's local space.
    pub dest: Rect,
    /// Normalized texture region.
    pub uv: Rect,
    /// Premultiplied tint, alpha already folded in.
    pub tint: Color,
}

impl Quad {
    /// Transform mapping the unit square onto the destination.
    #[inline]
    pub fn unit_transform(&self) -> Transform {
        self.transform
            * Transform::translate(self.dest.origin.x, self.dest.origin.y)
            * Transform::scale_xy(self.dest.size.x, self.dest.size.y)
    }

    #[inline]
    pub fn is_finite(&self) -> bool {
        self.transform.is_finite()
            && self.dest.is_finite()
            && self.uv.is_finite()
            && self.tint.is_finite()
    }

    #[inline]
    pub fn to_instance(&self) -> QuadInstance {
        QuadInstance::new(self.unit_transform(), self.uv, self.tint)
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum BatchKind {
    Uniform,
    Triangle,
}

/// Counters since creation or the last reset.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct BatchStats {
    /// Non-empty flushes (successful or not).
    pub flushes: u64,
    /// Draw calls accepted by the backend.
    pub draw_calls: u64,
    /// Quads appended.
    pub quads: u64,
}

/// Reasons the instanced strategy could not be built.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BatchInitError {
    #[error("backend reports no instancing support")]
    Unsupported,
    #[error("capability probe failed: {0}")]
    Probe(BackendError),
    #[error("backend allows {available} instances per draw, need at least {required}")]
    Limits { available: usize, required: usize },
}

/// Contract shared by both strategies.
///
/// Every method that may issue a draw takes the backend explicitly; batches
/// never hold on to it between calls.
pub trait QuadBatch {
    fn kind(&self) -> BatchKind;

    /// Currently bound state.
    fn state(&self) -> DrawState;

    /// Quads buffered since the last flush.
    fn pending(&self) -> usize;

    fn stats(&self) -> BatchStats;

    fn reset_stats(&mut self);

    /// Starts a paint pass: drops leftovers and resets the bound state.
    fn begin(&mut self);

    /// Binds `state`, flushing first if quads are pending and the state differs.
    fn set_state(
        &mut self,
        backend: &mut dyn GraphicsBackend,
        state: DrawState,
    ) -> Result<(), BackendError>;

    /// Appends one quad under the bound state.
    fn add_quad(&mut self, backend: &mut dyn GraphicsBackend, quad: &Quad)
        -> Result<(), BackendError>;

    /// Issues buffered quads and empties the buffer, even when the backend
    /// rejects the draw.
    fn flush(&mut self, backend: &mut dyn GraphicsBackend) -> Result<(), BackendError>;

    fn set_texture(
        &mut self,
        backend: &mut dyn GraphicsBackend,
        texture: Option<TextureHandle>,
    ) -> Result<(), BackendError> {
        let state = DrawState { texture, ..self.state() };
        self.set_state(backend, state)
    }

    fn set_blend_mode(
        &mut self,
        backend: &mut dyn GraphicsBackend,
        blend: BlendMode,
    ) -> Result<(), BackendError> {
        let state = DrawState { blend, ..self.state() };
        self.set_state(backend, state)
    }

    fn set_scissor(
        &mut self,
        backend: &mut dyn GraphicsBackend,
        scissor: Option<Rect>,
    ) -> Result<(), BackendError> {
        let state = DrawState { scissor, ..self.state() };
        self.set_state(backend, state)
    }
}

/// The closed set of strategies a surface can own.
#[derive(Debug)]
pub enum Batch {
    Uniform(UniformBatch),
    Triangle(TriangleBatch),
}

macro_rules! dispatch {
    ($self:ident, $b:ident => $e:expr) => {
        match $self {
            Batch::Uniform($b) => $e,
            Batch::Triangle($b) => $e,
        }
    };
}

impl QuadBatch for Batch {
    fn kind(&self) -> BatchKind {
        dispatch!(self, b => b.kind())
    }

    fn state(&self) -> DrawState {
        dispatch!(self, b => b.state())
    }

    fn pending(&self) -> usize {
        dispatch!(self, b => b.pending())
    }

    fn stats(&self) -> BatchStats {
        dispatch!(self, b => b.stats())
    }

    fn reset_stats(&mut self) {
        dispatch!(self, b => b.reset_stats())
    }

    fn begin(&mut self) {
        dispatch!(self, b => b.begin())
    }

    fn set_state(
        &mut self,
        backend: &mut dyn GraphicsBackend,
        state: DrawState,
    ) -> Result<(), BackendError> {
        dispatch!(self, b => b.set_state(backend, state))
    }

    fn add_quad(
        &mut self,
        backend: &mut dyn GraphicsBackend,
        quad: &Quad,
    ) -> Result<(), BackendError> {
        dispatch!(self, b => b.add_quad(backend, quad))
    }

    fn flush(&mut self, backend: &mut dyn GraphicsBackend) -> Result<(), BackendError> {
        dispatch!(self, b => b.flush(backend))
    }
}

impl From<UniformBatch> for Batch {
    fn from(b: UniformBatch) -> Self {
        Batch::Uniform(b)
    }
}

impl From<TriangleBatch> for Batch {
    fn from(b: TriangleBatch) -> Self {
        Batch::Triangle(b)
    }
}

/// Bookkeeping shared by both strategies.
#[derive(Debug, Default)]
struct BatchCore {
    state: DrawState,
    stats: BatchStats,
    warned_non_finite: bool,
}

impl BatchCore {
    /// Returns `false` (and logs once) for quads that cannot be rasterized.
    fn accept(&mut self, quad: &Quad) -> bool {
        if quad.is_finite() {
            self.stats.quads += 1;
            return true;
        }
        if !self.warned_non_finite {
            log::debug!("non-finite quad skipped: {quad:?}");
            self.warned_non_finite = true;
        }
        false
    }

    /// Records the outcome of one flush.
    fn flushed(&mut self, kind: BatchKind, quads: usize, result: &Result<(), BackendError>) {
        self.stats.flushes += 1;
        if result.is_ok() {
            self.stats.draw_calls += 1;
        }
        log::trace!("{kind:?} batch flushed {quads} quads");
    }
}

/// Rounds a quad count up to the next power of two, never below `floor`.
fn grown_capacity(required: usize, floor: usize) -> usize {
    required.next_power_of_two().max(floor.next_power_of_two()).max(1)
}
