//! Demo scene: a rotating group, a pulsing additive image, a clipped slider
//! and a custom-painted grid.

use strata_engine::backend::{BackendError, Image};
use strata_engine::coords::{Rect, Transform, Vec2};
use strata_engine::device::WgpuBackend;
use strata_engine::layer::{LayerId, LayerTree};
use strata_engine::paint::{BlendMode, Color};
use strata_engine::scene::{Scene, SceneDriver};
use strata_engine::surface::Surface;
use strata_engine::RenderResult;

pub const BACKGROUND: Color = Color::from_premul(0.02, 0.02, 0.04, 1.0);

const CHECKER_SIZE: u32 = 8;

pub struct Assets {
    checker: Image,
}

impl Assets {
    pub fn load(backend: &mut WgpuBackend) -> Result<Self, BackendError> {
        let mut pixels = Vec::with_capacity((CHECKER_SIZE * CHECKER_SIZE * 4) as usize);
        for y in 0..CHECKER_SIZE {
            for x in 0..CHECKER_SIZE {
                let texel: [u8; 4] = if (x + y) % 2 == 0 {
                    [255, 200, 64, 255]
                } else {
                    [32, 96, 255, 255]
                };
                pixels.extend_from_slice(&texel);
            }
        }
        let checker = backend.create_texture_rgba8(CHECKER_SIZE, CHECKER_SIZE, &pixels)?;
        Ok(Self { checker })
    }
}

/// Layers the animation listener updates each tick.
struct Animated {
    spinner: LayerId,
    pulse: LayerId,
    slider: LayerId,
}

pub fn populate(driver: &mut SceneDriver, assets: &Assets) -> RenderResult<()> {
    let root = driver.root();
    let animated = build(driver.tree_mut(), root, assets)?;

    driver.connect_paint(0, move |time, scene: &mut Scene| {
        animate(scene.tree_mut(), &animated, time.elapsed);
    });
    Ok(())
}

fn build(tree: &mut LayerTree, root: LayerId, assets: &Assets) -> RenderResult<Animated> {
    // ── spinner ──
    let spinner = tree.create_group();
    tree.get_mut(spinner)?.set_name("spinner").set_translation(240.0, 220.0);
    let colors = [
        Color::from_srgb_u8(235, 87, 87, 255),
        Color::from_srgb_u8(242, 201, 76, 255),
        Color::from_srgb_u8(39, 174, 96, 255),
        Color::from_srgb_u8(47, 128, 237, 255),
    ];
    for (i, color) in colors.into_iter().enumerate() {
        let arm = tree.create_solid(90.0, 24.0, color);
        tree.get_mut(arm)?
            .set_origin(Vec2::new(12.0, 12.0))
            .set_transform(Transform::rotate(i as f32 * std::f32::consts::FRAC_PI_2));
        tree.add(spinner, arm)?;
    }
    tree.get_mut(spinner)?.set_alpha(0.9);
    tree.add(root, spinner)?;

    // ── pulsing image ──
    let pulse = tree.create_image(assets.checker);
    tree.get_mut(pulse)?
        .set_name("pulse")
        .set_origin(Vec2::new(4.0, 4.0))
        .set_transform(Transform::translate(560.0, 220.0) * Transform::scale(20.0))
        .set_blend_mode(Some(BlendMode::Additive));
    tree.add(root, pulse)?;

    // ── clipped slider ──
    let track = tree.create_group();
    tree.get_mut(track)?.set_name("track").set_translation(120.0, 420.0);
    tree.set_clip(track, Some(Vec2::new(240.0, 40.0)))?;
    let rail = tree.create_solid(240.0, 40.0, Color::from_srgb_u8(60, 60, 80, 255));
    let slider = tree.create_solid(60.0, 40.0, Color::WHITE);
    tree.get_mut(slider)?.set_tint(Color::from_srgb_u8(120, 220, 255, 255));
    tree.add(track, rail)?;
    tree.add(track, slider)?;
    tree.add(root, track)?;

    // ── custom-painted grid ──
    let checker = assets.checker;
    let grid = tree.create_custom(move |s: &mut Surface| -> RenderResult<()> {
        for row in 0..8 {
            for col in 0..12 {
                let dest = Rect::new(col as f32 * 18.0, row as f32 * 18.0, 14.0, 14.0);
                if (row + col) % 3 == 0 {
                    s.draw_image_region(&checker, dest, Rect::new(0.0, 0.0, 2.0, 2.0))?;
                } else {
                    let shade = 0.3 + 0.05 * row as f32;
                    s.fill_rect(dest, Color::from_premul(shade, shade, shade, 1.0))?;
                }
            }
        }
        Ok(())
    });
    tree.get_mut(grid)?.set_name("grid").set_translation(520.0, 380.0);
    tree.add(root, grid)?;

    Ok(Animated { spinner, pulse, slider })
}

fn animate(tree: &mut LayerTree, animated: &Animated, t: f32) {
    if let Ok(layer) = tree.get_mut(animated.spinner) {
        let base = layer.transform().translation();
        layer.set_transform(Transform::translate(base.x, base.y) * Transform::rotate(t * 0.8));
    }
    if let Ok(layer) = tree.get_mut(animated.pulse) {
        layer.set_alpha(0.55 + 0.45 * (t * 2.0).sin());
    }
    if let Ok(layer) = tree.get_mut(animated.slider) {
        layer.set_translation((t * 90.0) % 300.0 - 60.0, 0.0);
    }
}
