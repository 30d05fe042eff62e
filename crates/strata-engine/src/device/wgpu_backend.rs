use std::collections::HashMap;
use std::ops::Range;

use winit::dpi::PhysicalSize;

use super::pipeline::{
    GrowableBuffer, Pipelines, PrimitiveKind, ViewportUniform, INSTANCE_ATTRIBUTE_COUNT,
};
use super::{Gpu, WgpuBackendConfig};
use crate::backend::{
    logical_clip_to_pixels, BackendError, BackendLimits, Capability, DrawData, DrawState,
    DrawSubmission, GraphicsBackend, Image, QuadInstance, TargetHandle, TextureHandle,
    TriangleVertex,
};
use crate::coords::{Vec2, Viewport};
use crate::paint::Color;

/// A sampled texture and its bind group.
struct GpuTexture {
    // Kept alive for the view and bind group.
    _texture: wgpu::Texture,
    bind_group: wgpu::BindGroup,
    width: u32,
    height: u32,
}

struct OffscreenTarget {
    view: wgpu::TextureView,
    width: u32,
    height: u32,
}

enum Op {
    Clear(Color),
    Draw {
        kind: PrimitiveKind,
        range: Range<u32>,
        state: DrawState,
    },
}

/// Everything recorded between `bind_target` and `unbind_target`.
struct Recording {
    target: TargetHandle,
    frame: Option<wgpu::SurfaceTexture>,
    view: wgpu::TextureView,
    width: u32,
    height: u32,
    viewport: Viewport,
    ops: Vec<Op>,
    instances: Vec<QuadInstance>,
    vertices: Vec<TriangleVertex>,
}

impl Recording {
    fn scale(&self) -> Vec2 {
        self.viewport.scale_to(self.width, self.height)
    }

    /// Logical size the shaders map to clip space.
    fn logical_size(&self) -> [f32; 2] {
        if self.viewport.is_valid() {
            [self.viewport.width, self.viewport.height]
        } else {
            [self.width.max(1) as f32, self.height.max(1) as f32]
        }
    }
}

/// Hardware [`GraphicsBackend`] on top of wgpu.
///
/// Clears and draws are recorded on the CPU while a target is bound; the whole
/// binding is uploaded, encoded and submitted in `unbind_target`, which also
/// presents when the target is the window frame.
pub struct WgpuBackend {
    gpu: Gpu,
    config: WgpuBackendConfig,
    instancing: bool,
    pipelines: Pipelines,
    sampler: wgpu::Sampler,
    viewport_ubo: wgpu::Buffer,
    viewport_bind_group: wgpu::BindGroup,
    white: GpuTexture,
    textures: HashMap<u32, GpuTexture>,
    offscreen: HashMap<u32, OffscreenTarget>,
    next_id: u32,
    instance_buffer: GrowableBuffer,
    vertex_buffer: GrowableBuffer,
    recording: Option<Recording>,
}

impl WgpuBackend {
    pub fn new(gpu: Gpu, config: WgpuBackendConfig) -> Self {
        let label = config.label;
        let instancing = config.allow_instancing && supports_instancing(&gpu);
        let device = gpu.device();

        let pipelines = Pipelines::new(device, gpu.surface_format(), label, instancing);

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some(&format!("{label} sampler")),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: config.filter,
            min_filter: config.filter,
            mipmap_filter: wgpu::MipmapFilterMode::Nearest,
            ..Default::default()
        });

        let viewport_ubo = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(&format!("{label} viewport ubo")),
            size: std::mem::size_of::<ViewportUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let viewport_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(&format!("{label} viewport bind group")),
            layout: &pipelines.viewport_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: viewport_ubo.as_entire_binding(),
            }],
        });

        let white = upload_texture(&gpu, &pipelines, &sampler, label, 1, 1, &[255; 4]);

        log::info!(
            "wgpu backend ready: instancing {}, surface {:?}",
            if instancing { "on" } else { "off" },
            gpu.surface_format()
        );

        Self {
            instance_buffer: GrowableBuffer::new(format!("{label} instance vbo")),
            vertex_buffer: GrowableBuffer::new(format!("{label} triangle vbo")),
            gpu,
            config,
            instancing,
            pipelines,
            sampler,
            viewport_ubo,
            viewport_bind_group,
            white,
            textures: HashMap::new(),
            offscreen: HashMap::new(),
            next_id: 1,
            recording: None,
        }
    }

    pub fn gpu(&self) -> &Gpu {
        &self.gpu
    }

    /// Resizes the window surface (physical pixels).
    pub fn resize(&mut self, width: u32, height: u32) {
        self.gpu.resize(PhysicalSize::new(width, height));
    }

    /// Uploads premultiplied RGBA8 pixels, row-major, `width * height * 4` bytes.
    pub fn create_texture_rgba8(
        &mut self,
        width: u32,
        height: u32,
        pixels: &[u8],
    ) -> Result<Image, BackendError> {
        self.check_size(width, height)?;
        let expected = width as usize * height as usize * 4;
        if pixels.len() != expected {
            return Err(BackendError::InvalidResource(format!(
                "expected {expected} bytes for {width}x{height} RGBA8, got {}",
                pixels.len()
            )));
        }

        let texture = upload_texture(
            &self.gpu,
            &self.pipelines,
            &self.sampler,
            self.config.label,
            width,
            height,
            pixels,
        );
        let id = self.alloc_id();
        self.textures.insert(id, texture);
        Ok(Image::new(TextureHandle(id), width, height))
    }

    /// Creates an offscreen target that can also be sampled as a texture.
    ///
    /// Returns the target handle and the image to draw its contents with.
    pub fn create_offscreen_target(
        &mut self,
        width: u32,
        height: u32,
    ) -> Result<(TargetHandle, Image), BackendError> {
        self.check_size(width, height)?;
        let label = self.config.label;
        let device = self.gpu.device();

        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(&format!("{label} offscreen target")),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: self.gpu.surface_format(),
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let bind_group = texture_bind_group(device, &self.pipelines, &self.sampler, &view, label);

        let id = self.alloc_id();
        self.offscreen.insert(id, OffscreenTarget { view, width, height });
        self.textures.insert(
            id,
            GpuTexture {
                _texture: texture,
                bind_group,
                width,
                height,
            },
        );
        Ok((TargetHandle::Offscreen(id), Image::new(TextureHandle(id), width, height)))
    }

    /// Frees a texture (and the offscreen target sharing its id). Returns
    /// `false` for an unknown handle.
    pub fn release_texture(&mut self, handle: TextureHandle) -> bool {
        self.offscreen.remove(&handle.0);
        self.textures.remove(&handle.0).is_some()
    }

    pub fn texture_size(&self, handle: TextureHandle) -> Option<(u32, u32)> {
        self.textures.get(&handle.0).map(|t| (t.width, t.height))
    }

    fn alloc_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn check_size(&self, width: u32, height: u32) -> Result<(), BackendError> {
        let max = self.gpu.device().limits().max_texture_dimension_2d;
        if width == 0 || height == 0 || width > max || height > max {
            return Err(BackendError::InvalidResource(format!(
                "texture size {width}x{height} outside 1..={max}"
            )));
        }
        Ok(())
    }

    fn recording(&mut self) -> Result<&mut Recording, BackendError> {
        self.recording.as_mut().ok_or(BackendError::NoTargetBound)
    }

    /// Uploads and encodes `rec`, then submits (and presents a frame target).
    fn submit_recording(&mut self, rec: Recording) -> Result<(), BackendError> {
        let label = self.config.label;
        let device = self.gpu.device();
        let queue = self.gpu.queue();

        queue.write_buffer(
            &self.viewport_ubo,
            0,
            bytemuck::bytes_of(&ViewportUniform {
                size: rec.logical_size(),
                _pad: [0.0; 2],
            }),
        );
        self.instance_buffer.upload(device, queue, bytemuck::cast_slice(&rec.instances))?;
        self.vertex_buffer.upload(device, queue, bytemuck::cast_slice(&rec.vertices))?;

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some(&format!("{label} frame encoder")),
        });

        let scale = rec.scale();
        let mut passes = 0u32;

        // A clear starts a new pass with a clear load op; draws before the
        // first clear load the existing contents.
        let mut start = 0;
        while start < rec.ops.len() || passes == 0 {
            let (load, first_draw) = match rec.ops.get(start) {
                Some(Op::Clear(c)) => (wgpu::LoadOp::Clear(to_wgpu_color(*c)), start + 1),
                _ => (wgpu::LoadOp::Load, start),
            };
            let end = rec.ops[first_draw.min(rec.ops.len())..]
                .iter()
                .position(|op| matches!(op, Op::Clear(_)))
                .map_or(rec.ops.len(), |i| first_draw + i);

            let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some(&format!("{label} pass")),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &rec.view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load,
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });
            passes += 1;

            rpass.set_bind_group(0, &self.viewport_bind_group, &[]);
            for op in &rec.ops[first_draw.min(end)..end] {
                let Op::Draw { kind, range, state } = op else { continue };
                let Some((x, y, w, h)) =
                    logical_clip_to_pixels(state.scissor, scale.x, scale.y, rec.width, rec.height)
                else {
                    continue;
                };
                let pipeline = self.pipelines.get(*kind, state.blend).ok_or_else(|| {
                    BackendError::DrawFailed(format!("no pipeline for {kind:?} {:?}", state.blend))
                })?;
                let texture = match state.texture {
                    Some(handle) => self
                        .textures
                        .get(&handle.0)
                        .ok_or(BackendError::UnknownTexture(handle))?,
                    None => &self.white,
                };
                let buffer = match kind {
                    PrimitiveKind::Instanced => self.instance_buffer.buffer(),
                    PrimitiveKind::Triangles => self.vertex_buffer.buffer(),
                }
                .ok_or_else(|| BackendError::DrawFailed("vertex data missing".into()))?;

                rpass.set_pipeline(pipeline);
                rpass.set_bind_group(1, &texture.bind_group, &[]);
                rpass.set_vertex_buffer(0, buffer.slice(..));
                rpass.set_scissor_rect(x, y, w, h);
                match kind {
                    PrimitiveKind::Instanced => rpass.draw(0..6, range.clone()),
                    PrimitiveKind::Triangles => rpass.draw(range.clone(), 0..1),
                }
            }
            drop(rpass);

            if end <= start {
                break;
            }
            start = end;
        }

        queue.submit(std::iter::once(encoder.finish()));
        if let Some(frame) = rec.frame {
            frame.present();
        }
        log::trace!("{:?}: {} ops in {} passes", rec.target, rec.ops.len(), passes);
        Ok(())
    }
}

impl GraphicsBackend for WgpuBackend {
    fn probe_capability(&self, capability: Capability) -> Result<bool, BackendError> {
        Ok(match capability {
            Capability::Instancing => self.instancing,
            Capability::OffscreenTargets => true,
        })
    }

    fn limits(&self) -> BackendLimits {
        let device_limits = self.gpu.device().limits();
        let by_buffer = device_limits.max_buffer_size / std::mem::size_of::<QuadInstance>() as u64;
        BackendLimits {
            max_instances_per_draw: self
                .config
                .max_instances_per_draw
                .min(usize::try_from(by_buffer).unwrap_or(usize::MAX)),
            max_texture_size: device_limits.max_texture_dimension_2d,
        }
    }

    fn bind_target(
        &mut self,
        target: TargetHandle,
        viewport: Viewport,
    ) -> Result<(), BackendError> {
        if self.recording.is_some() {
            return Err(BackendError::TargetUnavailable("a target is already bound".into()));
        }

        let (frame, view, width, height) = match target {
            TargetHandle::Frame => {
                let frame = self.gpu.acquire()?;
                let view = frame.texture.create_view(&wgpu::TextureViewDescriptor::default());
                let (w, h) = (frame.texture.width(), frame.texture.height());
                (Some(frame), view, w, h)
            }
            TargetHandle::Offscreen(id) => {
                let t = self.offscreen.get(&id).ok_or(BackendError::UnknownTarget(target))?;
                (None, t.view.clone(), t.width, t.height)
            }
        };

        self.recording = Some(Recording {
            target,
            frame,
            view,
            width,
            height,
            viewport,
            ops: Vec::new(),
            instances: Vec::new(),
            vertices: Vec::new(),
        });
        Ok(())
    }

    fn unbind_target(&mut self) -> Result<(), BackendError> {
        let rec = self.recording.take().ok_or(BackendError::NoTargetBound)?;
        self.submit_recording(rec)
    }

    fn clear(&mut self, color: Color) -> Result<(), BackendError> {
        self.recording()?.ops.push(Op::Clear(color));
        Ok(())
    }

    fn submit_draw(&mut self, draw: DrawSubmission<'_>) -> Result<(), BackendError> {
        if let Some(handle) = draw.state.texture {
            if !self.textures.contains_key(&handle.0) {
                return Err(BackendError::UnknownTexture(handle));
            }
        }
        let instancing = self.instancing;
        let max_instances = self.limits().max_instances_per_draw;
        let max_bytes = self.gpu.device().limits().max_buffer_size;
        let rec = self.recording()?;

        let (kind, range) = match draw.data {
            DrawData::Instances(instances) => {
                if !instancing {
                    return Err(BackendError::Unsupported);
                }
                if instances.len() > max_instances {
                    return Err(BackendError::DrawFailed(format!(
                        "{} instances exceed the per-draw limit of {max_instances}",
                        instances.len()
                    )));
                }
                let recorded = rec.instances.len();
                check_binding_size::<QuadInstance>(recorded, instances.len(), max_bytes)?;
                let start = rec.instances.len() as u32;
                rec.instances.extend_from_slice(instances);
                (PrimitiveKind::Instanced, start..rec.instances.len() as u32)
            }
            DrawData::Triangles(vertices) => {
                let start = rec.vertices.len() as u32;
                let whole = vertices.len() - vertices.len() % 3;
                check_binding_size::<TriangleVertex>(rec.vertices.len(), whole, max_bytes)?;
                rec.vertices.extend_from_slice(&vertices[..whole]);
                (PrimitiveKind::Triangles, start..rec.vertices.len() as u32)
            }
        };

        if !range.is_empty() {
            rec.ops.push(Op::Draw {
                kind,
                range,
                state: draw.state,
            });
        }
        Ok(())
    }
}

/// Everything recorded in one binding shares a vertex buffer, so the running
/// total must fit a single device buffer.
fn check_binding_size<T>(
    recorded: usize,
    added: usize,
    max_bytes: u64,
) -> Result<(), BackendError> {
    let stride = std::mem::size_of::<T>() as u64;
    let bytes = (recorded as u64).saturating_add(added as u64).saturating_mul(stride);
    if bytes > max_bytes {
        return Err(BackendError::DrawFailed(format!(
            "binding would need {bytes} bytes of vertex data, device limit is {max_bytes}"
        )));
    }
    Ok(())
}

/// Instanced quads need per-instance vertex buffers with five attributes and
/// a shader model above the GLES2-class minimum.
fn supports_instancing(gpu: &Gpu) -> bool {
    let downlevel = gpu.adapter().get_downlevel_capabilities();
    let limits = gpu.device().limits();
    !matches!(downlevel.shader_model, wgpu::ShaderModel::Sm2)
        && limits.max_vertex_buffers >= 1
        && limits.max_vertex_attributes >= INSTANCE_ATTRIBUTE_COUNT
}

fn to_wgpu_color(c: Color) -> wgpu::Color {
    wgpu::Color {
        r: c.r as f64,
        g: c.g as f64,
        b: c.b as f64,
        a: c.a as f64,
    }
}

fn texture_bind_group(
    device: &wgpu::Device,
    pipelines: &Pipelines,
    sampler: &wgpu::Sampler,
    view: &wgpu::TextureView,
    label: &str,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some(&format!("{label} texture bind group")),
        layout: &pipelines.texture_layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(view),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::Sampler(sampler),
            },
        ],
    })
}

fn upload_texture(
    gpu: &Gpu,
    pipelines: &Pipelines,
    sampler: &wgpu::Sampler,
    label: &str,
    width: u32,
    height: u32,
    pixels: &[u8],
) -> GpuTexture {
    let size = wgpu::Extent3d {
        width,
        height,
        depth_or_array_layers: 1,
    };
    let texture = gpu.device().create_texture(&wgpu::TextureDescriptor {
        label: Some(&format!("{label} texture")),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8Unorm,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });

    gpu.queue().write_texture(
        wgpu::TexelCopyTextureInfo {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        pixels,
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(width * 4),
            rows_per_image: Some(height),
        },
        size,
    );

    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    let bind_group = texture_bind_group(gpu.device(), pipelines, sampler, &view, label);
    GpuTexture {
        _texture: texture,
        bind_group,
        width,
        height,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clear_color_converts_channel_for_channel() {
        let c = to_wgpu_color(Color::from_premul(0.25, 0.5, 0.0, 0.5));
        assert_eq!((c.r, c.g, c.b, c.a), (0.25, 0.5, 0.0, 0.5));
    }

    #[test]
    fn binding_size_counts_earlier_draws() {
        let stride = std::mem::size_of::<QuadInstance>() as u64;
        assert!(check_binding_size::<QuadInstance>(0, 10, stride * 10).is_ok());
        assert!(check_binding_size::<QuadInstance>(6, 4, stride * 10).is_ok());
        assert!(matches!(
            check_binding_size::<QuadInstance>(6, 5, stride * 10),
            Err(BackendError::DrawFailed(_))
        ));
        assert!(check_binding_size::<TriangleVertex>(usize::MAX, 1, u64::MAX).is_ok());
    }
}
