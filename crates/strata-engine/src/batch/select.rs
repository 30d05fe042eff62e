use std::panic::{self, AssertUnwindSafe};

use crate::backend::GraphicsBackend;

use super::{Batch, BatchConfig, BatchInitError, TriangleBatch, UniformBatch};

/// Picks the best batch strategy the backend supports.
///
/// Never fails: an unsupported capability, a probe error, insufficient
/// limits, or even a panicking probe all end in the triangle fallback.
pub fn select_default_batch(backend: &dyn GraphicsBackend, config: &BatchConfig) -> Batch {
    if config.prefer_uniform {
        let attempt = panic::catch_unwind(AssertUnwindSafe(|| UniformBatch::new(backend, config)));
        match attempt {
            Ok(Ok(batch)) => {
                log::info!("quad batching: uniform (up to {} quads per draw)", batch.max_quads());
                return Batch::Uniform(batch);
            }
            Ok(Err(BatchInitError::Unsupported)) => {
                log::info!("quad batching: instancing unavailable, using triangle batch");
            }
            Ok(Err(e)) => {
                log::warn!("quad batching: uniform batch rejected ({e}), using triangle batch");
            }
            Err(_) => {
                log::warn!("quad batching: capability probe panicked, using triangle batch");
            }
        }
    } else {
        log::info!("quad batching: triangle (uniform disabled by config)");
    }
    Batch::Triangle(TriangleBatch::new(config))
}
