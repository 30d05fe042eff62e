//! Render pipelines, bind group layouts and GPU-side record layouts.

use std::collections::HashMap;
use std::num::NonZeroU64;

use bytemuck::{Pod, Zeroable};

use crate::backend::{BackendError, QuadInstance, TriangleVertex};
use crate::paint::BlendMode;

// ── blend ─────────────────────────────────────────────────────────────────

/// Fixed-function blend state matching [`BlendMode::blend_channel`] on
/// premultiplied colors.
pub(super) fn blend_state(mode: BlendMode) -> wgpu::BlendState {
    let over_alpha = wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::One,
        dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
        operation: wgpu::BlendOperation::Add,
    };
    let color = match mode {
        BlendMode::Normal => over_alpha,
        BlendMode::Additive => wgpu::BlendComponent {
            src_factor: wgpu::BlendFactor::One,
            dst_factor: wgpu::BlendFactor::One,
            operation: wgpu::BlendOperation::Add,
        },
        BlendMode::Multiply => wgpu::BlendComponent {
            src_factor: wgpu::BlendFactor::Dst,
            dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
            operation: wgpu::BlendOperation::Add,
        },
        BlendMode::Screen => wgpu::BlendComponent {
            src_factor: wgpu::BlendFactor::One,
            dst_factor: wgpu::BlendFactor::OneMinusSrc,
            operation: wgpu::BlendOperation::Add,
        },
    };
    let alpha = match mode {
        BlendMode::Additive => color,
        _ => over_alpha,
    };
    wgpu::BlendState { color, alpha }
}

// ── GPU types ─────────────────────────────────────────────────────────────

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
pub(super) struct ViewportUniform {
    pub size: [f32; 2],
    pub _pad: [f32; 2], // 16-byte alignment
}

const VIEWPORT_UNIFORM_SIZE: NonZeroU64 =
    match NonZeroU64::new(std::mem::size_of::<ViewportUniform>() as u64) {
        Some(size) => size,
        None => panic!("ViewportUniform is not zero-sized"),
    };

/// Instance layout (56 bytes), mirrors [`QuadInstance`]:
///
///  offset  0  xform      [f32; 4]  loc 0
///  offset 16  translate  [f32; 2]  loc 1
///  offset 24  uv_origin  [f32; 2]  loc 2
///  offset 32  uv_size    [f32; 2]  loc 3
///  offset 40  tint       [f32; 4]  loc 4
const INSTANCE_ATTRS: [wgpu::VertexAttribute; 5] = wgpu::vertex_attr_array![
    0 => Float32x4,
    1 => Float32x2,
    2 => Float32x2,
    3 => Float32x2,
    4 => Float32x4
];

const VERTEX_ATTRS: [wgpu::VertexAttribute; 3] = wgpu::vertex_attr_array![
    0 => Float32x2, // pos
    1 => Float32x2, // uv
    2 => Float32x4  // tint
];

fn instance_layout() -> wgpu::VertexBufferLayout<'static> {
    wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<QuadInstance>() as u64,
        step_mode: wgpu::VertexStepMode::Instance,
        attributes: &INSTANCE_ATTRS,
    }
}

fn vertex_layout() -> wgpu::VertexBufferLayout<'static> {
    wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<TriangleVertex>() as u64,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &VERTEX_ATTRS,
    }
}

/// Number of vertex attributes the instanced pipeline needs.
pub(super) const INSTANCE_ATTRIBUTE_COUNT: u32 = INSTANCE_ATTRS.len() as u32;

// ── pipelines ─────────────────────────────────────────────────────────────

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub(super) enum PrimitiveKind {
    Instanced,
    Triangles,
}

/// Every pipeline the backend draws with, keyed by primitive kind and blend mode.
pub(super) struct Pipelines {
    pub viewport_layout: wgpu::BindGroupLayout,
    pub texture_layout: wgpu::BindGroupLayout,
    pipelines: HashMap<(PrimitiveKind, BlendMode), wgpu::RenderPipeline>,
}

impl Pipelines {
    pub fn new(
        device: &wgpu::Device,
        format: wgpu::TextureFormat,
        label: &str,
        instancing: bool,
    ) -> Self {
        let viewport_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some(&format!("{label} viewport bgl")),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: Some(VIEWPORT_UNIFORM_SIZE),
                },
                count: None,
            }],
        });

        let texture_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some(&format!("{label} texture bgl")),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(&format!("{label} pipeline layout")),
            bind_group_layouts: &[&viewport_layout, &texture_layout],
            immediate_size: 0,
        });

        let mut kinds = vec![(
            PrimitiveKind::Triangles,
            include_str!("shaders/triangle.wgsl"),
            vertex_layout(),
        )];
        if instancing {
            kinds.push((
                PrimitiveKind::Instanced,
                include_str!("shaders/quad.wgsl"),
                instance_layout(),
            ));
        }

        let mut pipelines = HashMap::new();
        for (kind, source, buffer) in kinds {
            let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(&format!("{label} {kind:?} shader")),
                source: wgpu::ShaderSource::Wgsl(source.into()),
            });
            for mode in BlendMode::ALL {
                let pipeline = create_pipeline(
                    device,
                    &layout,
                    &shader,
                    buffer.clone(),
                    format,
                    mode,
                    &format!("{label} {kind:?} {mode:?} pipeline"),
                );
                pipelines.insert((kind, mode), pipeline);
            }
        }

        Self {
            viewport_layout,
            texture_layout,
            pipelines,
        }
    }

    pub fn get(&self, kind: PrimitiveKind, mode: BlendMode) -> Option<&wgpu::RenderPipeline> {
        self.pipelines.get(&(kind, mode))
    }
}

fn create_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    shader: &wgpu::ShaderModule,
    buffer: wgpu::VertexBufferLayout<'static>,
    format: wgpu::TextureFormat,
    mode: BlendMode,
    label: &str,
) -> wgpu::RenderPipeline {
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(layout),

        vertex: wgpu::VertexState {
            module: shader,
            entry_point: Some("vs_main"),
            compilation_options: Default::default(),
            buffers: &[buffer],
        },

        fragment: Some(wgpu::FragmentState {
            module: shader,
            entry_point: Some("fs_main"),
            compilation_options: Default::default(),
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: Some(blend_state(mode)),
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),

        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: None,
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },

        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        multiview_mask: None,
        cache: None,
    })
}

// ── growable buffer ───────────────────────────────────────────────────────

const MIN_BUFFER_BYTES: u64 = 4096;

/// Capacity for `required` bytes: the next power of two, capped at `max`.
/// `None` when `required` itself is over `max`.
pub(super) fn grown_capacity(required: u64, max: u64) -> Option<u64> {
    (required <= max).then(|| required.next_power_of_two().max(MIN_BUFFER_BYTES).min(max))
}

/// Vertex buffer that grows to the next power of two on demand.
pub(super) struct GrowableBuffer {
    label: String,
    buffer: Option<wgpu::Buffer>,
    capacity: u64,
}

impl GrowableBuffer {
    pub fn new(label: String) -> Self {
        Self {
            label,
            buffer: None,
            capacity: 0,
        }
    }

    /// Uploads `bytes` at offset 0, growing first if needed.
    ///
    /// Fails when `bytes` does not fit the device's `max_buffer_size`.
    pub fn upload(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        bytes: &[u8],
    ) -> Result<(), BackendError> {
        if bytes.is_empty() {
            return Ok(());
        }
        let required = bytes.len() as u64;
        if self.buffer.is_none() || required > self.capacity {
            let max = device.limits().max_buffer_size;
            let new_cap = grown_capacity(required, max).ok_or_else(|| {
                BackendError::DrawFailed(format!(
                    "{}: {required} bytes exceed the device buffer limit of {max}",
                    self.label
                ))
            })?;
            self.buffer = Some(device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(&self.label),
                size: new_cap,
                usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            }));
            self.capacity = new_cap;
            log::debug!("{} grown to {} bytes", self.label, new_cap);
        }
        if let Some(buffer) = &self.buffer {
            queue.write_buffer(buffer, 0, bytes);
        }
        Ok(())
    }

    pub fn buffer(&self) -> Option<&wgpu::Buffer> {
        self.buffer.as_ref()
    }
}
