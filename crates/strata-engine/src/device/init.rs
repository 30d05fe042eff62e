/// Initialization parameters for the GPU layer.
///
/// Add flags only when a concrete platform or backend requirement exists.
#[derive(Debug, Clone)]
pub struct GpuInit {
    /// Prefer an sRGB surface format when available.
    pub prefer_srgb: bool,

    /// Present mode (swap behavior). FIFO is supported everywhere.
    pub present_mode: wgpu::PresentMode,

    /// Optional alpha mode preference for the surface.
    ///
    /// If provided but unsupported on the current surface, a supported mode is selected.
    pub alpha_mode: Option<wgpu::CompositeAlphaMode>,

    /// Required wgpu features. Empty by default for portability.
    pub required_features: wgpu::Features,

    /// Limits requested from the adapter/device.
    pub required_limits: wgpu::Limits,

    /// Desired maximum frame latency for the surface (hint).
    pub desired_maximum_frame_latency: u32,
}

impl Default for GpuInit {
    fn default() -> Self {
        Self {
            prefer_srgb: true,
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode: None,
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            desired_maximum_frame_latency: 2,
        }
    }
}

/// Options of the hardware backend built on top of a [`super::Gpu`].
#[derive(Debug, Clone)]
pub struct WgpuBackendConfig {
    /// Prefix for every wgpu object label.
    pub label: &'static str,

    /// Texture filtering for magnification and minification.
    pub filter: wgpu::FilterMode,

    /// Upper bound on quads per instanced draw, further capped by the device.
    pub max_instances_per_draw: usize,

    /// Allows disabling the instanced path even when the device supports it.
    pub allow_instancing: bool,
}

impl Default for WgpuBackendConfig {
    fn default() -> Self {
        Self {
            label: "strata",
            filter: wgpu::FilterMode::Linear,
            max_instances_per_draw: 16_384,
            allow_instancing: true,
        }
    }
}
