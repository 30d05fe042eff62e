use std::collections::HashMap;

use crate::coords::{Vec2, Viewport};
use crate::paint::{BlendMode, Color};

use super::{
    logical_clip_to_pixels, BackendError, BackendLimits, Capability, DrawData, DrawSubmission,
    GraphicsBackend, TargetHandle, TextureHandle, TriangleVertex,
};

/// Counters accumulated by [`SoftwareBackend`] since creation or the last
/// [`SoftwareBackend::reset_stats`].
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct SoftwareStats {
    pub binds: u64,
    pub clears: u64,
    pub draw_calls: u64,
    pub instanced_draw_calls: u64,
    /// Quads (instanced) plus triangles (triangle lists) as reported by callers.
    pub primitives: u64,
    pub triangles_rasterized: u64,
}

/// Premultiplied RGBA float pixel grid.
#[derive(Debug, Clone)]
struct Pixmap {
    width: u32,
    height: u32,
    pixels: Vec<Color>,
}

impl Pixmap {
    fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![Color::transparent(); width as usize * height as usize],
        }
    }

    #[inline]
    fn get(&self, x: u32, y: u32) -> Option<Color> {
        if x < self.width && y < self.height {
            Some(self.pixels[(y * self.width + x) as usize])
        } else {
            None
        }
    }

    /// Nearest-neighbour lookup with clamp-to-edge addressing.
    #[inline]
    fn sample(&self, u: f32, v: f32) -> Color {
        if self.width == 0 || self.height == 0 {
            return Color::transparent();
        }
        let x = ((u * self.width as f32).floor().max(0.0) as u32).min(self.width - 1);
        let y = ((v * self.height as f32).floor().max(0.0) as u32).min(self.height - 1);
        self.pixels[(y * self.width + x) as usize]
    }

    #[inline]
    fn blend(&mut self, x: u32, y: u32, src: Color, mode: BlendMode) {
        let i = (y * self.width + x) as usize;
        let dst = self.pixels[i];
        self.pixels[i] = Color::from_premul(
            mode.blend_channel(src.r, src.a, dst.r),
            mode.blend_channel(src.g, src.a, dst.g),
            mode.blend_channel(src.b, src.a, dst.b),
            mode.blend_alpha(src.a, dst.a),
        );
    }
}

#[derive(Debug, Copy, Clone)]
struct Binding {
    target: TargetHandle,
    scale: Vec2,
}

/// CPU reference backend.
///
/// Rasterizes into premultiplied float framebuffers with pixel-center
/// sampling and a top-left fill rule, so quads that share an edge never
/// double-blend. Capabilities and limits are configurable, which makes this
/// backend stand in for weaker devices (e.g. no instancing) in headless runs.
#[derive(Debug)]
pub struct SoftwareBackend {
    frame: Pixmap,
    offscreen: HashMap<u32, Pixmap>,
    textures: HashMap<u32, Pixmap>,
    next_id: u32,

    bound: Option<Binding>,

    instancing: bool,
    offscreen_targets: bool,
    limits: BackendLimits,

    stats: SoftwareStats,
}

impl SoftwareBackend {
    /// Creates a backend whose frame target is `width × height` pixels.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            frame: Pixmap::new(width, height),
            offscreen: HashMap::new(),
            textures: HashMap::new(),
            next_id: 1,
            bound: None,
            instancing: true,
            offscreen_targets: true,
            limits: BackendLimits::default(),
            stats: SoftwareStats::default(),
        }
    }

    /// Overrides what [`GraphicsBackend::probe_capability`] reports.
    pub fn with_capability(mut self, capability: Capability, supported: bool) -> Self {
        match capability {
            Capability::Instancing => self.instancing = supported,
            Capability::OffscreenTargets => self.offscreen_targets = supported,
        }
        self
    }

    pub fn with_limits(mut self, limits: BackendLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Uploads premultiplied pixels (row-major) as a texture.
    pub fn register_texture(
        &mut self,
        width: u32,
        height: u32,
        pixels: Vec<Color>,
    ) -> Result<TextureHandle, BackendError> {
        if pixels.len() != width as usize * height as usize {
            return Err(BackendError::InvalidResource(format!(
                "texture data has {} pixels, expected {}x{}",
                pixels.len(),
                width,
                height
            )));
        }
        if width > self.limits.max_texture_size || height > self.limits.max_texture_size {
            return Err(BackendError::InvalidResource(format!(
                "texture {width}x{height} exceeds max size {}",
                self.limits.max_texture_size
            )));
        }
        let id = self.alloc_id();
        self.textures.insert(id, Pixmap { width, height, pixels });
        Ok(TextureHandle(id))
    }

    /// Creates a transparent offscreen target.
    pub fn create_offscreen_target(
        &mut self,
        width: u32,
        height: u32,
    ) -> Result<TargetHandle, BackendError> {
        if !self.offscreen_targets {
            return Err(BackendError::Unsupported);
        }
        let id = self.alloc_id();
        self.offscreen.insert(id, Pixmap::new(width, height));
        Ok(TargetHandle::Offscreen(id))
    }

    /// Snapshots an offscreen target into a new texture.
    pub fn texture_from_target(
        &mut self,
        target: TargetHandle,
    ) -> Result<TextureHandle, BackendError> {
        let pixmap = match target {
            TargetHandle::Frame => self.frame.clone(),
            TargetHandle::Offscreen(id) => self
                .offscreen
                .get(&id)
                .cloned()
                .ok_or(BackendError::UnknownTarget(target))?,
        };
        let id = self.alloc_id();
        self.textures.insert(id, pixmap);
        Ok(TextureHandle(id))
    }

    /// Reallocates the frame target (contents are discarded).
    pub fn resize_frame(&mut self, width: u32, height: u32) {
        self.frame = Pixmap::new(width, height);
    }

    #[inline]
    pub fn frame_size(&self) -> (u32, u32) {
        (self.frame.width, self.frame.height)
    }

    /// Frame pixel at `(x, y)`; transparent when out of range.
    #[inline]
    pub fn pixel(&self, x: u32, y: u32) -> Color {
        self.frame.get(x, y).unwrap_or_default()
    }

    pub fn target_pixel(&self, target: TargetHandle, x: u32, y: u32) -> Option<Color> {
        match target {
            TargetHandle::Frame => self.frame.get(x, y),
            TargetHandle::Offscreen(id) => self.offscreen.get(&id)?.get(x, y),
        }
    }

    /// Row-major frame pixels.
    #[inline]
    pub fn frame_pixels(&self) -> &[Color] {
        &self.frame.pixels
    }

    #[inline]
    pub fn bound_target(&self) -> Option<TargetHandle> {
        self.bound.map(|b| b.target)
    }

    #[inline]
    pub fn stats(&self) -> SoftwareStats {
        self.stats
    }

    pub fn reset_stats(&mut self) {
        self.stats = SoftwareStats::default();
    }

    fn alloc_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);
        id
    }

    fn pixmap_size(&self, target: TargetHandle) -> Option<(u32, u32)> {
        match target {
            TargetHandle::Frame => Some((self.frame.width, self.frame.height)),
            TargetHandle::Offscreen(id) => self.offscreen.get(&id).map(|p| (p.width, p.height)),
        }
    }
}

impl GraphicsBackend for SoftwareBackend {
    fn probe_capability(&self, capability: Capability) -> Result<bool, BackendError> {
        Ok(match capability {
            Capability::Instancing => self.instancing,
            Capability::OffscreenTargets => self.offscreen_targets,
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
        let (w, h) = self.pixmap_size(target).ok_or(BackendError::UnknownTarget(target))?;
        let scale = viewport.scale_to(w, h);
        self.bound = Some(Binding { target, scale });
        self.stats.binds += 1;
        Ok(())
    }

    fn unbind_target(&mut self) -> Result<(), BackendError> {
        self.bound.take().map(|_| ()).ok_or(BackendError::NoTargetBound)
    }

    fn clear(&mut self, color: Color) -> Result<(), BackendError> {
        let binding = self.bound.ok_or(BackendError::NoTargetBound)?;
        let dst = match binding.target {
            TargetHandle::Frame => &mut self.frame,
            TargetHandle::Offscreen(id) => self
                .offscreen
                .get_mut(&id)
                .ok_or(BackendError::UnknownTarget(binding.target))?,
        };
        dst.pixels.fill(color);
        self.stats.clears += 1;
        Ok(())
    }

    fn submit_draw(&mut self, draw: DrawSubmission<'_>) -> Result<(), BackendError> {
        let binding = self.bound.ok_or(BackendError::NoTargetBound)?;

        if let DrawData::Instances(instances) = draw.data {
            if !self.instancing {
                return Err(BackendError::Unsupported);
            }
            if instances.len() > self.limits.max_instances_per_draw {
                return Err(BackendError::DrawFailed(format!(
                    "{} instances exceed the per-draw limit of {}",
                    instances.len(),
                    self.limits.max_instances_per_draw
                )));
            }
        }

        let texture = match draw.state.texture {
            Some(handle) => Some(
                self.textures
                    .get(&handle.0)
                    .ok_or(BackendError::UnknownTexture(handle))?,
            ),
            None => None,
        };
        let dst = match binding.target {
            TargetHandle::Frame => &mut self.frame,
            TargetHandle::Offscreen(id) => self
                .offscreen
                .get_mut(&id)
                .ok_or(BackendError::UnknownTarget(binding.target))?,
        };

        self.stats.draw_calls += 1;
        self.stats.primitives += draw.primitive_count as u64;

        let Some(bounds) = logical_clip_to_pixels(
            draw.state.scissor,
            binding.scale.x,
            binding.scale.y,
            dst.width,
            dst.height,
        ) else {
            return Ok(());
        };

        let mut raster = Rasterizer {
            dst,
            texture,
            blend: draw.state.blend,
            scale: binding.scale,
            bounds,
            triangles: 0,
        };

        match draw.data {
            DrawData::Instances(instances) => {
                self.stats.instanced_draw_calls += 1;
                for inst in instances {
                    let v = inst.expand();
                    raster.fill_triangle([v[0], v[1], v[2]]);
                    raster.fill_triangle([v[3], v[4], v[5]]);
                }
            }
            DrawData::Triangles(vertices) => {
                for tri in vertices.chunks_exact(3) {
                    raster.fill_triangle([tri[0], tri[1], tri[2]]);
                }
            }
        }

        self.stats.triangles_rasterized += raster.triangles;
        Ok(())
    }
}

// ── rasterization ─────────────────────────────────────────────────────────

struct Rasterizer<'a> {
    dst: &'a mut Pixmap,
    texture: Option<&'a Pixmap>,
    blend: BlendMode,
    scale: Vec2,
    /// Pixel-space clip `(x, y, w, h)`.
    bounds: (u32, u32, u32, u32),
    triangles: u64,
}

impl Rasterizer<'_> {
    fn fill_triangle(&mut self, tri: [TriangleVertex; 3]) {
        let p = tri.map(|v| Vec2::new(v.pos[0] * self.scale.x, v.pos[1] * self.scale.y));
        if !p.iter().all(|q| q.is_finite()) {
            return;
        }

        let (ia, mut ib, mut ic) = (0usize, 1usize, 2usize);
        let mut area = edge(p[ia], p[ib], p[ic]);
        if area == 0.0 {
            return;
        }
        if area < 0.0 {
            core::mem::swap(&mut ib, &mut ic);
            area = -area;
        }
        self.triangles += 1;

        let (pa, pb, pc) = (p[ia], p[ib], p[ic]);
        let (va, vb, vc) = (&tri[ia], &tri[ib], &tri[ic]);

        let (bx, by, bw, bh) = self.bounds;
        let min_x = pa.x.min(pb.x).min(pc.x).floor().max(bx as f32) as u32;
        let min_y = pa.y.min(pb.y).min(pc.y).floor().max(by as f32) as u32;
        let max_x = (pa.x.max(pb.x).max(pc.x).ceil().max(0.0) as u32).min(bx + bw);
        let max_y = (pa.y.max(pb.y).max(pc.y).ceil().max(0.0) as u32).min(by + bh);

        let tl_bc = is_top_left(pb, pc);
        let tl_ca = is_top_left(pc, pa);
        let tl_ab = is_top_left(pa, pb);

        for y in min_y..max_y {
            for x in min_x..max_x {
                let q = Vec2::new(x as f32 + 0.5, y as f32 + 0.5);
                let wa = edge(pb, pc, q);
                let wb = edge(pc, pa, q);
                let wc = edge(pa, pb, q);
                if !covers(wa, tl_bc) || !covers(wb, tl_ca) || !covers(wc, tl_ab) {
                    continue;
                }

                let (la, lb, lc) = (wa / area, wb / area, wc / area);
                let u = la * va.uv[0] + lb * vb.uv[0] + lc * vc.uv[0];
                let v = la * va.uv[1] + lb * vb.uv[1] + lc * vc.uv[1];
                let tint = Color::from_premul(
                    la * va.tint[0] + lb * vb.tint[0] + lc * vc.tint[0],
                    la * va.tint[1] + lb * vb.tint[1] + lc * vc.tint[1],
                    la * va.tint[2] + lb * vb.tint[2] + lc * vc.tint[2],
                    la * va.tint[3] + lb * vb.tint[3] + lc * vc.tint[3],
                );

                let texel = self.texture.map_or(Color::WHITE, |t| t.sample(u, v));
                self.dst.blend(x, y, texel.multiply(tint), self.blend);
            }
        }
    }
}

/// Twice the signed area of `(a, b, p)`; positive when `p` is on the interior
/// side of `a → b` for triangles wound clockwise on a +Y-down screen.
#[inline]
fn edge(a: Vec2, b: Vec2, p: Vec2) -> f32 {
    (b.x - a.x) * (p.y - a.y) - (b.y - a.y) * (p.x - a.x)
}

/// Top edges run horizontally to the right, left edges run upwards.
#[inline]
fn is_top_left(a: Vec2, b: Vec2) -> bool {
    (a.y == b.y && b.x > a.x) || b.y < a.y
}

#[inline]
fn covers(w: f32, top_left: bool) -> bool {
    w > 0.0 || (w == 0.0 && top_left)
}
