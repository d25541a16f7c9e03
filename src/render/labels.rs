//! Axis labels rasterized into textures and placed along the grid edges.
//!
//! Each axis gets one strip image. Pixel density is fixed per world unit so
//! glyphs keep their aspect no matter how long the strip is, and so strips
//! for dense grids stay within the texture size limits of WebGL2.

use std::f32::consts::FRAC_PI_2;

use bevy::prelude::*;
use bevy_render::render_resource::{Extent3d, TextureDimension, TextureFormat};
use bevy_asset::RenderAssetUsages;
use font8x8::legacy::BASIC_LEGACY;

use crate::core::{AxisConfig, Color as CellColor, ValueRange};
use crate::render::mesh::{PLANE_SIZE, SurfaceLayout};

pub const PIXELS_PER_UNIT: f32 = 96.0;
/// Short side of a horizontal strip.
pub const STRIP_HEIGHT_PX: u32 = 48;
/// Short side of the vertical (value) strip.
pub const COLUMN_WIDTH_PX: u32 = 128;
/// Subdivisions of the value axis.
pub const Z_STEPS: usize = 10;

const GLYPH_PX: u32 = 8;
const GLYPH_SCALE: u32 = 2;
const TICK_LEN_PX: u32 = 10;
const TICK_HALF_WIDTH: i32 = 1;
const TEXT_GAP_PX: u32 = 6;
/// World gap between a strip and the grid edge.
const EDGE_GAP: f32 = 0.1;

const LABEL_COLOR: CellColor = CellColor::rgb(210.0 / 255.0, 214.0 / 255.0, 222.0 / 255.0);
const TICK_COLOR: CellColor = CellColor::rgb(140.0 / 255.0, 146.0 / 255.0, 158.0 / 255.0);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StripLayout {
    /// Ticks along the top edge, text reading along the strip.
    Row,
    /// Ticks along the right edge, one right-aligned line per tick.
    Column,
}

/// RGBA8 label raster with evenly spaced ticks.
#[derive(Clone, Debug)]
pub struct LabelStrip {
    layout: StripLayout,
    width: u32,
    height: u32,
    pixels: Vec<u8>,
    /// Tick positions in pixels along the strip's long axis.
    ticks: Vec<u32>,
}

impl LabelStrip {
    /// One tick per label, `slot` world units apart, with half a slot of
    /// padding at both ends.
    pub fn rasterize(labels: &[String], slot: f32) -> Self {
        let (length, slot_px, ticks) = tick_positions(labels.len(), slot);
        let mut strip = Self::blank(StripLayout::Row, length, STRIP_HEIGHT_PX, ticks);

        let text_y = (TICK_LEN_PX + TEXT_GAP_PX) as i32;
        let ticks = strip.ticks.clone();
        for (label, &tick) in labels.iter().zip(&ticks) {
            let tick = tick as i32;
            strip.fill_rect(
                tick - TICK_HALF_WIDTH,
                0,
                tick + TICK_HALF_WIDTH,
                TICK_LEN_PX as i32,
                TICK_COLOR.to_rgba8(),
            );

            let text_w = text_width(label) as i32;
            let half_slot = slot_px as i32 / 2;
            let clip = (tick - half_slot, 0, tick + half_slot, strip.height as i32);
            strip.draw_text(label, tick - text_w / 2, text_y, clip);
        }
        strip
    }

    /// Vertical variant used for the value axis: the first label sits at
    /// the top.
    pub fn rasterize_column(labels: &[String], slot: f32) -> Self {
        let (length, slot_px, ticks) = tick_positions(labels.len(), slot);
        let mut strip = Self::blank(StripLayout::Column, COLUMN_WIDTH_PX, length, ticks);

        let w = strip.width as i32;
        let text_right = w - (TICK_LEN_PX + TEXT_GAP_PX) as i32;
        let glyph_h = (GLYPH_PX * GLYPH_SCALE) as i32;
        let ticks = strip.ticks.clone();
        for (label, &tick) in labels.iter().zip(&ticks) {
            let tick = tick as i32;
            strip.fill_rect(
                w - TICK_LEN_PX as i32,
                tick - TICK_HALF_WIDTH,
                w,
                tick + TICK_HALF_WIDTH,
                TICK_COLOR.to_rgba8(),
            );

            let half_slot = slot_px as i32 / 2;
            let clip = (0, tick - half_slot, text_right, tick + half_slot);
            let x = text_right - text_width(label) as i32;
            strip.draw_text(label, x, tick - glyph_h / 2, clip);
        }
        strip
    }

    fn blank(layout: StripLayout, width: u32, height: u32, ticks: Vec<u32>) -> Self {
        Self {
            layout,
            width,
            height,
            pixels: vec![0; (width * height * 4) as usize],
            ticks,
        }
    }

    pub fn layout(&self) -> StripLayout {
        self.layout
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn ticks(&self) -> &[u32] {
        &self.ticks
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = ((y * self.width + x) * 4) as usize;
        self.pixels[i..i + 4].try_into().ok()
    }

    /// Size of the strip in world units.
    pub fn world_size(&self) -> Vec2 {
        Vec2::new(self.width as f32, self.height as f32) / PIXELS_PER_UNIT
    }

    pub fn to_image(&self) -> Image {
        Image::new(
            Extent3d {
                width: self.width,
                height: self.height,
                depth_or_array_layers: 1,
            },
            TextureDimension::D2,
            self.pixels.clone(),
            TextureFormat::Rgba8UnormSrgb,
            RenderAssetUsages::default(),
        )
    }

    /// Fill `[x0, x1) x [y0, y1)`, clipped to the image.
    fn fill_rect(&mut self, x0: i32, y0: i32, x1: i32, y1: i32, color: [u8; 4]) {
        let x0 = x0.max(0) as u32;
        let y0 = y0.max(0) as u32;
        let x1 = (x1.max(0) as u32).min(self.width);
        let y1 = (y1.max(0) as u32).min(self.height);
        for y in y0..y1 {
            for x in x0..x1 {
                let i = ((y * self.width + x) * 4) as usize;
                self.pixels[i..i + 4].copy_from_slice(&color);
            }
        }
    }

    fn draw_text(&mut self, text: &str, x: i32, y: i32, clip: (i32, i32, i32, i32)) {
        let (cx0, cy0, cx1, cy1) = clip;
        let s = GLYPH_SCALE as i32;
        let advance = (GLYPH_PX * GLYPH_SCALE) as i32;

        for (i, ch) in text.chars().enumerate() {
            let gx = x + i as i32 * advance;
            if gx >= cx1 {
                break;
            }
            for (row, bits) in glyph(ch).iter().enumerate() {
                let py = y + row as i32 * s;
                for bit in 0..GLYPH_PX as i32 {
                    if (bits >> bit) & 0x01 == 0 {
                        continue;
                    }
                    let px = gx + bit * s;
                    self.fill_rect(
                        px.max(cx0),
                        py.max(cy0),
                        (px + s).min(cx1),
                        (py + s).min(cy1),
                        LABEL_COLOR.to_rgba8(),
                    );
                }
            }
        }
    }
}

/// Strip length, slot size and tick centres, all in pixels.
fn tick_positions(count: usize, slot: f32) -> (u32, u32, Vec<u32>) {
    let slot_px = slot * PIXELS_PER_UNIT;
    let length = ((count as f32 * slot_px).round() as u32).max(1);
    let ticks = (0..count)
        .map(|i| (((i as f32 + 0.5) * slot_px).round() as u32).min(length - 1))
        .collect();
    (length, slot_px.round() as u32, ticks)
}

fn text_width(text: &str) -> u32 {
    text.chars().count() as u32 * GLYPH_PX * GLYPH_SCALE
}

fn glyph(ch: char) -> [u8; 8] {
    BASIC_LEGACY
        .get(ch as usize)
        .copied()
        .unwrap_or(BASIC_LEGACY[b'?' as usize])
}

/// Compact numeric label for the value axis.
pub fn format_tick(val: f64) -> String {
    if val.abs() < 0.001 && val != 0.0 {
        format!("{:.1e}", val)
    } else if val.abs() >= 1000.0 {
        format!("{:.1e}", val)
    } else if val.fract().abs() < 0.001 {
        format!("{:.0}", val)
    } else if val.abs() < 1.0 {
        format!("{:.2}", val)
    } else {
        format!("{:.1}", val)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LabelAxis {
    X,
    Y,
    Z,
}

/// Where a strip quad goes. The quad is a `size`d rectangle in its local
/// XY plane (facing +Z) before `rotation`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StripPlacement {
    pub center: Vec3,
    pub rotation: Quat,
    pub size: Vec2,
}

impl StripPlacement {
    pub fn transform(&self) -> Transform {
        Transform::from_translation(self.center).with_rotation(self.rotation)
    }

    /// World position of a pixel on the strip.
    pub fn world_point(&self, strip: &LabelStrip, px: Vec2) -> Vec3 {
        let uv = px / Vec2::new(strip.width() as f32, strip.height() as f32);
        let local = Vec3::new((uv.x - 0.5) * self.size.x, (0.5 - uv.y) * self.size.y, 0.0);
        self.transform().transform_point(local)
    }
}

#[derive(Clone, Debug)]
pub struct AxisStrip {
    pub axis: LabelAxis,
    pub strip: LabelStrip,
    pub placement: StripPlacement,
}

#[derive(Clone, Debug)]
pub struct AxisLabels {
    pub x: AxisStrip,
    pub y: AxisStrip,
    pub z: AxisStrip,
}

impl AxisLabels {
    pub fn build(axis: &AxisConfig, range: &ValueRange, layout: &SurfaceLayout) -> Self {
        let half = PLANE_SIZE * 0.5;
        let floor = layout.floor_y();

        // Columns along the front edge, lying flat, ticks towards the grid.
        let strip = LabelStrip::rasterize(&axis.x, category_slot(layout.spacing_x()));
        let size = strip.world_size();
        let x = AxisStrip {
            axis: LabelAxis::X,
            placement: StripPlacement {
                center: Vec3::new(0.0, floor, half + EDGE_GAP + size.y * 0.5),
                rotation: Quat::from_rotation_x(-FRAC_PI_2),
                size,
            },
            strip,
        };

        // Rows along the left edge. The strip reads from back to front, so
        // the last row comes first.
        let rows: Vec<String> = axis.y.iter().rev().cloned().collect();
        let strip = LabelStrip::rasterize(&rows, category_slot(layout.spacing_y()));
        let size = strip.world_size();
        let y = AxisStrip {
            axis: LabelAxis::Y,
            placement: StripPlacement {
                center: Vec3::new(-half - EDGE_GAP - size.y * 0.5, floor, 0.0),
                rotation: Quat::from_rotation_y(-FRAC_PI_2) * Quat::from_rotation_x(-FRAC_PI_2),
                size,
            },
            strip,
        };

        // Values standing up at the back-left corner, highest on top.
        let ticks: Vec<String> = range.ticks(Z_STEPS).into_iter().rev().map(format_tick).collect();
        let elevation = crate::render::mesh::ELEVATION_SCALE;
        let strip = LabelStrip::rasterize_column(&ticks, elevation / Z_STEPS as f32);
        let size = strip.world_size();
        let z = AxisStrip {
            axis: LabelAxis::Z,
            placement: StripPlacement {
                center: Vec3::new(-half - EDGE_GAP - size.x * 0.5, floor + elevation * 0.5, -half),
                rotation: Quat::IDENTITY,
                size,
            },
            strip,
        };

        Self { x, y, z }
    }

    pub fn iter(&self) -> impl Iterator<Item = &AxisStrip> + '_ {
        [&self.x, &self.y, &self.z].into_iter()
    }
}

/// A single category gets the whole plane, centred.
fn category_slot(spacing: f32) -> f32 {
    if spacing > 0.0 { spacing } else { PLANE_SIZE }
}

pub fn label_material(texture: Handle<Image>) -> StandardMaterial {
    StandardMaterial {
        base_color_texture: Some(texture),
        unlit: true,
        alpha_mode: AlphaMode::Blend,
        double_sided: true,
        cull_mode: None,
        ..default()
    }
}
