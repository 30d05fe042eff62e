//! Test backends.

use crate::backend::{
    BackendError, BackendLimits, Capability, DrawData, DrawState, DrawSubmission, GraphicsBackend,
    QuadInstance, TargetHandle, TriangleVertex,
};
use crate::coords::Viewport;
use crate::paint::Color;

/// Owned copy of one submission.
#[derive(Debug, Clone)]
pub(crate) struct RecordedDraw {
    pub state: DrawState,
    pub primitive_count: usize,
    pub instances: Vec<QuadInstance>,
    pub vertices: Vec<TriangleVertex>,
}

/// Records everything it is asked to do; pixels are not produced.
#[derive(Debug)]
pub(crate) struct RecordingBackend {
    pub instancing: bool,
    pub limits: BackendLimits,
    pub fail_draws: bool,
    pub fail_bind: bool,

    pub binds: Vec<(TargetHandle, Viewport)>,
    pub unbinds: usize,
    pub clears: Vec<Color>,
    pub draws: Vec<RecordedDraw>,
    bound: bool,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self {
            instancing: true,
            limits: BackendLimits::default(),
            fail_draws: false,
            fail_bind: false,
            binds: Vec::new(),
            unbinds: 0,
            clears: Vec::new(),
            draws: Vec::new(),
            bound: false,
        }
    }

    pub fn without_instancing() -> Self {
        Self { instancing: false, ..Self::new() }
    }

    /// All instanced quads, in submission order.
    pub fn instances(&self) -> Vec<QuadInstance> {
        self.draws.iter().flat_map(|d| d.instances.iter().copied()).collect()
    }

    /// Quads submitted through either path.
    pub fn quad_count(&self) -> usize {
        self.draws
            .iter()
            .map(|d| d.instances.len() + d.vertices.len() / 6)
            .sum()
    }

    pub fn reset(&mut self) {
        self.binds.clear();
        self.unbinds = 0;
        self.clears.clear();
        self.draws.clear();
    }
}

impl GraphicsBackend for RecordingBackend {
    fn probe_capability(&self, capability: Capability) -> Result<bool, BackendError> {
        Ok(match capability {
            Capability::Instancing => self.instancing,
            Capability::OffscreenTargets => true,
        })
    }

    fn limits(&self) -> BackendLimits {
        self.limits
    }

    fn bind_target(
        &mut self,
        target: TargetHandle,
        viewport: Viewport,
    ) -> Result<(), BackendError> {
        if self.fail_bind {
            return Err(BackendError::TargetUnavailable("bind refused".into()));
        }
        self.binds.push((target, viewport));
        self.bound = true;
        Ok(())
    }

    fn unbind_target(&mut self) -> Result<(), BackendError> {
        if !self.bound {
            return Err(BackendError::NoTargetBound);
        }
        self.bound = false;
        self.unbinds += 1;
        Ok(())
    }

    fn clear(&mut self, color: Color) -> Result<(), BackendError> {
        if !self.bound {
            return Err(BackendError::NoTargetBound);
        }
        self.clears.push(color);
        Ok(())
    }

    fn submit_draw(&mut self, draw: DrawSubmission<'_>) -> Result<(), BackendError> {
        if !self.bound {
            return Err(BackendError::NoTargetBound);
        }
        if self.fail_draws {
            return Err(BackendError::DrawFailed("injected failure".into()));
        }
        let (instances, vertices) = match draw.data {
            DrawData::Instances(i) => (i.to_vec(), Vec::new()),
            DrawData::Triangles(v) => (Vec::new(), v.to_vec()),
        };
        self.draws.push(RecordedDraw {
            state: draw.state,
            primitive_count: draw.primitive_count,
            instances,
            vertices,
        });
        Ok(())
    }
}

/// How [`ProbeFailing`] misbehaves.
#[derive(Debug, Copy, Clone, PartialEq)]
pub(crate) enum ProbeFault {
    Error,
    Panic,
}

/// Wraps a backend whose capability probe fails; everything else delegates.
#[derive(Debug)]
pub(crate) struct ProbeFailing<B> {
    pub inner: B,
    pub fault: ProbeFault,
}

impl<B: GraphicsBackend> GraphicsBackend for ProbeFailing<B> {
    fn probe_capability(&self, _capability: Capability) -> Result<bool, BackendError> {
        match self.fault {
            ProbeFault::Error => Err(BackendError::Lost),
            ProbeFault::Panic => panic!("capability probe crashed"),
        }
    }

    fn limits(&self) -> BackendLimits {
        self.inner.limits()
    }

    fn bind_target(
        &mut self,
        target: TargetHandle,
        viewport: Viewport,
    ) -> Result<(), BackendError> {
        self.inner.bind_target(target, viewport)
    }

    fn unbind_target(&mut self) -> Result<(), BackendError> {
        self.inner.unbind_target()
    }

    fn clear(&mut self, color: Color) -> Result<(), BackendError> {
        self.inner.clear(color)
    }

    fn submit_draw(&mut self, draw: DrawSubmission<'_>) -> Result<(), BackendError> {
        self.inner.submit_draw(draw)
    }
}
