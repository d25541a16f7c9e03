//! Grid to surface mesh.
//!
//! One mesh vertex per grid cell (`row * width + col`), two triangles per
//! grid quad. The mesh is built in a local plane (x = column, y = row,
//! z = elevation) and laid flat by a single fixed transform on the surface
//! entity, never per vertex.

use std::f32::consts::FRAC_PI_2;

use bevy::prelude::*;
use bevy_asset::RenderAssetUsages;
use bevy_mesh::PrimitiveTopology;

use crate::core::Color as CellColor;
use crate::grid::{CellCoord, GridModel};

/// Side length of the square plane the grid is stretched over.
pub const PLANE_SIZE: f32 = 5.0;
/// World height of a normalized value of 1.
pub const ELEVATION_SCALE: f32 = 2.5;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SurfaceLayout {
    width: usize,
    height: usize,
}

impl SurfaceLayout {
    pub fn new(width: usize, height: usize) -> Self {
        Self { width, height }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn spacing_x(&self) -> f32 {
        spacing(self.width)
    }

    pub fn spacing_y(&self) -> f32 {
        spacing(self.height)
    }

    /// Plane coordinate of a column; a single column sits in the middle.
    pub fn col_offset(&self, col: usize) -> f32 {
        offset(col, self.width)
    }

    pub fn row_offset(&self, row: usize) -> f32 {
        offset(row, self.height)
    }

    pub fn local_position(&self, coord: CellCoord, normalized: f64) -> Vec3 {
        Vec3::new(
            self.col_offset(coord.col),
            self.row_offset(coord.row),
            normalized as f32 * ELEVATION_SCALE,
        )
    }

    /// Lays the local plane flat: local z becomes world up, local y runs
    /// away from the default camera, and the value range is centred
    /// vertically on the origin.
    pub fn surface_transform(&self) -> Transform {
        Transform {
            translation: Vec3::new(0.0, self.floor_y(), 0.0),
            rotation: Quat::from_rotation_x(-FRAC_PI_2),
            ..default()
        }
    }

    pub fn world_position(&self, coord: CellCoord, normalized: f64) -> Vec3 {
        self.surface_transform()
            .transform_point(self.local_position(coord, normalized))
    }

    /// World height of a normalized value of 0.
    pub fn floor_y(&self) -> f32 {
        -ELEVATION_SCALE * 0.5
    }

    fn min_spacing(&self) -> f32 {
        [self.spacing_x(), self.spacing_y()]
            .into_iter()
            .filter(|s| *s > 0.0)
            .fold(PLANE_SIZE, f32::min)
    }

    /// Radius of the invisible sphere used for picking.
    pub fn hit_radius(&self) -> f32 {
        (self.min_spacing() * 0.45).clamp(0.05, 0.3)
    }

    /// Radius of the visible highlight sphere.
    pub fn handle_radius(&self) -> f32 {
        self.hit_radius() * 0.4
    }
}

fn spacing(n: usize) -> f32 {
    if n > 1 {
        PLANE_SIZE / (n - 1) as f32
    } else {
        0.0
    }
}

fn offset(i: usize, n: usize) -> f32 {
    if n > 1 {
        i as f32 * spacing(n) - PLANE_SIZE * 0.5
    } else {
        0.0
    }
}

/// CPU side of the surface: shared vertices plus per-triangle corner colors.
#[derive(Clone, Debug)]
pub struct SurfaceMesh {
    layout: SurfaceLayout,
    /// Local positions, one per cell.
    positions: Vec<Vec3>,
    triangles: Vec<[u32; 3]>,
    corner_colors: Vec<[CellColor; 3]>,
}

impl SurfaceMesh {
    /// Full rebuild from the grid.
    pub fn compute(grid: &GridModel) -> Self {
        let layout = SurfaceLayout::new(grid.width(), grid.height());
        let positions = grid
            .cells()
            .map(|(coord, cell)| layout.local_position(coord, cell.value()))
            .collect();

        let w = grid.width();
        let h = grid.height();
        let mut triangles = Vec::with_capacity(w.saturating_sub(1) * h.saturating_sub(1) * 2);
        for row in 0..h.saturating_sub(1) {
            for col in 0..w.saturating_sub(1) {
                let i0 = (row * w + col) as u32;
                let i1 = i0 + 1;
                let i2 = i0 + w as u32;
                let i3 = i2 + 1;

                // Two triangles per quad, wound so normals face local +z
                triangles.push([i0, i1, i2]);
                triangles.push([i1, i3, i2]);
            }
        }

        let mut mesh = Self {
            layout,
            positions,
            triangles,
            corner_colors: Vec::new(),
        };
        mesh.sync_colors(grid, None);
        mesh
    }

    pub fn layout(&self) -> &SurfaceLayout {
        &self.layout
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    pub fn triangles(&self) -> &[[u32; 3]] {
        &self.triangles
    }

    pub fn corner_colors(&self) -> &[[CellColor; 3]] {
        &self.corner_colors
    }

    pub fn vertex(&self, coord: CellCoord) -> Option<Vec3> {
        (coord.col < self.layout.width)
            .then(|| self.positions.get(coord.row * self.layout.width + coord.col))
            .flatten()
            .copied()
    }

    /// Move a single vertex. Colors are left to [`Self::sync_colors`].
    pub fn set_elevation(&mut self, coord: CellCoord, normalized: f64) {
        if coord.col >= self.layout.width {
            return;
        }
        let index = coord.row * self.layout.width + coord.col;
        if let Some(p) = self.positions.get_mut(index) {
            p.z = normalized as f32 * ELEVATION_SCALE;
        }
    }

    /// Re-derive every triangle corner's color from the grid. With an
    /// emphasised cell, all other cells use their faded color.
    pub fn sync_colors(&mut self, grid: &GridModel, emphasis: Option<CellCoord>) {
        let emphasis = emphasis.and_then(|c| grid.index_of(c));
        let color_of = |index: u32| {
            let Some(coord) = grid.coord_of(index as usize) else {
                return CellColor::BLACK;
            };
            match (grid.cell(coord), emphasis) {
                (Ok(cell), Some(e)) if e != index as usize => cell.faded(),
                (Ok(cell), _) => cell.color(),
                (Err(_), _) => CellColor::BLACK,
            }
        };

        self.corner_colors = self
            .triangles
            .iter()
            .map(|tri| tri.map(&color_of))
            .collect();
    }

    pub fn to_mesh(&self) -> Mesh {
        let mut mesh = Mesh::new(
            PrimitiveTopology::TriangleList,
            RenderAssetUsages::default(),
        );
        self.write_to(&mut mesh);
        mesh
    }

    /// Overwrite the attributes of an existing (non-indexed) Bevy mesh.
    /// Every triangle gets its own three vertices so corner colors and flat
    /// normals are never shared between faces.
    pub fn write_to(&self, mesh: &mut Mesh) {
        let n = self.triangles.len() * 3;
        let mut positions = Vec::with_capacity(n);
        let mut normals = Vec::with_capacity(n);
        let mut colors = Vec::with_capacity(n);

        for (tri, corners) in self.triangles.iter().zip(&self.corner_colors) {
            let p = tri.map(|i| self.positions[i as usize]);
            let normal = (p[1] - p[0]).cross(p[2] - p[0]).normalize_or(Vec3::Z);
            for k in 0..3 {
                positions.push(p[k].to_array());
                normals.push(normal.to_array());
                colors.push(corners[k].to_linear_array());
            }
        }

        mesh.insert_attribute(Mesh::ATTRIBUTE_POSITION, positions);
        mesh.insert_attribute(Mesh::ATTRIBUTE_NORMAL, normals);
        mesh.insert_attribute(Mesh::ATTRIBUTE_COLOR, colors);
    }
}
