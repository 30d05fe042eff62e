use thiserror::Error;

use crate::backend::BackendError;
use crate::layer::LayerId;

/// Errors surfaced by surfaces, the layer tree and the scene driver.
///
/// Capability fallback is never an error; it is handled when the default
/// batch is selected. Degenerate geometry and fully transparent layers are
/// silent no-ops.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RenderError {
    /// A surface operation was called outside its `begin`/`end` bracket, or
    /// `begin` was called twice.
    #[error("invalid surface state: {0}")]
    InvalidState(&'static str),

    /// `restore` without `save`, or a paint pass ended at a different depth
    /// than it began.
    #[error("unbalanced surface stack: {0}")]
    Unbalanced(&'static str),

    /// The backend rejected a draw, clear or target operation. The current
    /// frame is lost; the layer tree is unaffected.
    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("stale layer handle {0:?}")]
    StaleLayer(LayerId),

    #[error("layer {0:?} is not a group")]
    NotAGroup(LayerId),

    #[error("adding the layer would make it its own ancestor")]
    Cycle,

    /// A custom layer painter reported a failure.
    #[error("layer painter failed: {0}")]
    Painter(String),
}

pub type RenderResult<T> = Result<T, RenderError>;
