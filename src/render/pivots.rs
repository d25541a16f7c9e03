//! Pivot handles: one pickable point per cell, sitting on its mesh vertex.
//!
//! Pivots live in an arena indexed like the grid (`row * width + col`), so
//! a ray-cast hit maps straight back to a cell without any lookup tables.

use bevy_math::bounding::{BoundingSphere, RayCast3d};
use bevy_math::{Ray3d, Vec3};

use crate::grid::{CellCoord, GridModel};
use crate::render::mesh::SurfaceLayout;

/// Rays never need to reach further than this to hit the surface.
const MAX_PICK_DISTANCE: f32 = 1000.0;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Pivot {
    pub coord: CellCoord,
    /// World position, identical to the cell's mesh vertex.
    pub position: Vec3,
    pub highlighted: bool,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PivotHit {
    pub index: usize,
    pub coord: CellCoord,
    /// Distance along the ray.
    pub distance: f32,
    pub point: Vec3,
}

#[derive(Clone, Debug)]
pub struct PivotSet {
    layout: SurfaceLayout,
    pivots: Vec<Pivot>,
    hit_radius: f32,
    highlighted: Option<usize>,
}

impl PivotSet {
    pub fn build(grid: &GridModel) -> Self {
        let layout = SurfaceLayout::new(grid.width(), grid.height());
        let pivots = grid
            .cells()
            .map(|(coord, cell)| Pivot {
                coord,
                position: layout.world_position(coord, cell.value()),
                highlighted: false,
            })
            .collect();
        Self {
            layout,
            hit_radius: layout.hit_radius(),
            pivots,
            highlighted: None,
        }
    }

    pub fn len(&self) -> usize {
        self.pivots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pivots.is_empty()
    }

    pub fn hit_radius(&self) -> f32 {
        self.hit_radius
    }

    pub fn handle_radius(&self) -> f32 {
        self.layout.handle_radius()
    }

    pub fn get(&self, index: usize) -> Option<&Pivot> {
        self.pivots.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Pivot> + '_ {
        self.pivots.iter()
    }

    pub fn index_of(&self, coord: CellCoord) -> Option<usize> {
        (coord.col < self.layout.width() && coord.row < self.layout.height())
            .then_some(coord.row * self.layout.width() + coord.col)
    }

    pub fn coord_of(&self, index: usize) -> Option<CellCoord> {
        self.pivots.get(index).map(|p| p.coord)
    }

    pub fn highlighted(&self) -> Option<CellCoord> {
        self.highlighted.and_then(|i| self.coord_of(i))
    }

    /// Follow a cell's new elevation.
    pub fn reposition(&mut self, coord: CellCoord, normalized: f64) {
        let position = self.layout.world_position(coord, normalized);
        if let Some(pivot) = self.index_of(coord).and_then(|i| self.pivots.get_mut(i)) {
            pivot.position = position;
        }
    }

    /// Every pivot whose hit sphere the ray crosses, nearest first.
    pub fn ray_cast_all(&self, ray: Ray3d) -> Vec<PivotHit> {
        let cast = RayCast3d::from_ray(ray, MAX_PICK_DISTANCE);
        let mut hits: Vec<PivotHit> = self
            .pivots
            .iter()
            .enumerate()
            .filter_map(|(index, pivot)| {
                let sphere = BoundingSphere::new(pivot.position, self.hit_radius);
                let distance = cast.sphere_intersection_at(&sphere)?;
                Some(PivotHit {
                    index,
                    coord: pivot.coord,
                    distance,
                    point: ray.get_point(distance),
                })
            })
            .collect();
        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        hits
    }

    pub fn ray_cast(&self, ray: Ray3d) -> Option<PivotHit> {
        self.ray_cast_all(ray).into_iter().next()
    }

    /// Make `coord` the only highlighted pivot (or clear with `None`).
    /// Returns true when the highlight moved.
    pub fn highlight(&mut self, coord: Option<CellCoord>) -> bool {
        let next = coord.and_then(|c| self.index_of(c));
        if next == self.highlighted {
            return false;
        }
        if let Some(pivot) = self.highlighted.and_then(|i| self.pivots.get_mut(i)) {
            pivot.highlighted = false;
        }
        if let Some(pivot) = next.and_then(|i| self.pivots.get_mut(i)) {
            pivot.highlighted = true;
        }
        self.highlighted = next;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{HueRamp, ValueRange};
    use bevy_math::Dir3;

    fn grid(width: usize, height: usize) -> GridModel {
        let range = ValueRange::new(0.0, 1.0).unwrap();
        GridModel::initialize(width, height, range, HueRamp::default(), None).unwrap()
    }

    fn straight_down_onto(p: Vec3) -> Ray3d {
        Ray3d::new(p + Vec3::Y * 10.0, Dir3::NEG_Y)
    }

    #[test]
    fn pivots_sit_on_vertices() {
        let g = grid(3, 2);
        let pivots = PivotSet::build(&g);
        let layout = SurfaceLayout::new(3, 2);
        assert_eq!(pivots.len(), 6);
        for (coord, _) in g.cells() {
            let index = pivots.index_of(coord).unwrap();
            assert_eq!(pivots.coord_of(index), Some(coord));
            assert_eq!(
                pivots.get(index).unwrap().position,
                layout.world_position(coord, 0.0)
            );
        }
    }

    #[test]
    fn ray_picks_the_pivot_under_it() {
        let g = grid(4, 4);
        let pivots = PivotSet::build(&g);
        let target = CellCoord::new(2, 1);
        let p = pivots.get(pivots.index_of(target).unwrap()).unwrap().position;

        let hit = pivots.ray_cast(straight_down_onto(p)).unwrap();
        assert_eq!(hit.coord, target);
        assert!((hit.point.y - (p.y + pivots.hit_radius())).abs() < 1e-4);
    }

    #[test]
    fn ray_between_pivots_misses() {
        let pivots = PivotSet::build(&grid(2, 2));
        let a = pivots.get(0).unwrap().position;
        let b = pivots.get(1).unwrap().position;
        assert!(pivots.ray_cast(straight_down_onto((a + b) * 0.5)).is_none());
    }

    #[test]
    fn nearest_hit_comes_first() {
        let pivots = PivotSet::build(&grid(3, 1));
        let first = pivots.get(0).unwrap().position;
        // Grazing ray along the row: crosses every pivot, nearest is col 0.
        let ray = Ray3d::new(first - Vec3::X * 5.0, Dir3::X);
        let hits = pivots.ray_cast_all(ray);
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].coord, CellCoord::new(0, 0));
        assert!(hits.windows(2).all(|w| w[0].distance <= w[1].distance));
    }

    #[test]
    fn reposition_follows_elevation() {
        let mut pivots = PivotSet::build(&grid(2, 2));
        let c = CellCoord::new(1, 0);
        let before = pivots.get(1).unwrap().position;
        pivots.reposition(c, 1.0);
        let after = pivots.get(1).unwrap().position;
        assert_eq!(after.x, before.x);
        assert_eq!(after.z, before.z);
        assert!((after.y - before.y - crate::render::mesh::ELEVATION_SCALE).abs() < 1e-5);
    }

    #[test]
    fn at_most_one_highlight() {
        let mut pivots = PivotSet::build(&grid(2, 2));
        assert!(pivots.highlight(Some(CellCoord::new(0, 0))));
        assert!(!pivots.highlight(Some(CellCoord::new(0, 0))));
        assert!(pivots.highlight(Some(CellCoord::new(1, 1))));
        assert_eq!(pivots.iter().filter(|p| p.highlighted).count(), 1);
        assert_eq!(pivots.highlighted(), Some(CellCoord::new(1, 1)));

        assert!(pivots.highlight(None));
        assert_eq!(pivots.iter().filter(|p| p.highlighted).count(), 0);
        assert!(!pivots.highlight(Some(CellCoord::new(5, 5))));
    }
}
