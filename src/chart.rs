//! `SurfaceChart`, the public widget.
//!
//! The chart owns the grid, its derived mesh and pivots, the interaction
//! controller and the camera, and is the only thing that mutates them. The
//! render layer never edits state itself: it feeds input into the entry
//! points below, calls [`SurfaceChart::frame`] once per frame and mirrors
//! whatever the [`Revision`] counters say has changed.

use std::fmt;

use bevy_math::Vec2;
use error_stack::Report;
use tracing::{debug, info, warn};

use crate::container::SurfaceContainer;
use crate::core::{AxisConfig, SurfaceConfig};
use crate::grid::{CellChange, CellCoord, ChangeCallback, ChangeDispatch, GridModel};
use crate::interaction::{InteractionController, InteractionState, PanModifier, PointerAction};
use crate::render::camera::{OrbitCamera, PerspectiveParams};
use crate::render::labels::AxisLabels;
use crate::render::mesh::SurfaceMesh;
use crate::render::pivots::PivotSet;
use crate::{ChartError, Result};

/// Change counters, bumped whenever the matching part of the scene needs
/// to be pushed to the renderer again.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Revision {
    /// Grid replaced: rebuild every entity.
    pub layout: u64,
    /// Elevations, colors or highlight changed.
    pub surface: u64,
    /// Camera or projection changed.
    pub view: u64,
}

pub struct SurfaceChart {
    grid: GridModel,
    axis: AxisConfig,
    mesh: SurfaceMesh,
    pivots: PivotSet,
    labels: AxisLabels,
    controller: InteractionController,
    camera: OrbitCamera,
    projection: PerspectiveParams,
    container: Box<dyn SurfaceContainer>,
    pan_modifier: PanModifier,
    running: bool,
    listening: bool,
    revision: Revision,
}

impl fmt::Debug for SurfaceChart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SurfaceChart")
            .field("width", &self.grid.width())
            .field("height", &self.grid.height())
            .field("container", &self.container.describe())
            .field("interaction", &self.controller.state())
            .field("running", &self.running)
            .field("listening", &self.listening)
            .field("revision", &self.revision)
            .finish_non_exhaustive()
    }
}

impl SurfaceChart {
    pub fn new(config: SurfaceConfig, container: impl SurfaceContainer + 'static) -> Result<Self> {
        let range = config.validate()?;
        let size = container.resolve().ok_or_else(|| {
            Report::new(ChartError::Configuration(format!(
                "{} has no displayable size",
                container.describe()
            )))
        })?;

        let SurfaceConfig {
            axis,
            data,
            colors,
            pan_modifier,
            on_change,
            ..
        } = config;

        let mut grid =
            GridModel::initialize(axis.width(), axis.height(), range, colors, data.as_deref())?;
        grid.set_on_change(on_change);

        let mesh = SurfaceMesh::compute(&grid);
        let pivots = PivotSet::build(&grid);
        let labels = AxisLabels::build(&axis, &range, mesh.layout());

        info!(
            width = grid.width(),
            height = grid.height(),
            min = range.min(),
            max = range.max(),
            "surface chart created"
        );

        Ok(Self {
            grid,
            axis,
            mesh,
            pivots,
            labels,
            controller: InteractionController::new(),
            camera: OrbitCamera::default(),
            projection: PerspectiveParams::from_size(size),
            container: Box::new(container),
            pan_modifier,
            running: true,
            listening: true,
            revision: Revision::default(),
        })
    }

    // ---- read access --------------------------------------------------------

    pub fn grid(&self) -> &GridModel {
        &self.grid
    }

    pub fn axis(&self) -> &AxisConfig {
        &self.axis
    }

    pub fn mesh(&self) -> &SurfaceMesh {
        &self.mesh
    }

    pub fn pivots(&self) -> &PivotSet {
        &self.pivots
    }

    pub fn labels(&self) -> &AxisLabels {
        &self.labels
    }

    pub fn camera(&self) -> &OrbitCamera {
        &self.camera
    }

    pub fn projection(&self) -> &PerspectiveParams {
        &self.projection
    }

    pub fn interaction(&self) -> InteractionState {
        self.controller.state()
    }

    /// Last known pointer position.
    pub fn pointer(&self) -> Option<Vec2> {
        self.controller.pointer()
    }

    /// Cell under the pointer or being dragged.
    pub fn active(&self) -> Option<CellCoord> {
        self.controller.active()
    }

    pub fn pan_modifier(&self) -> PanModifier {
        self.pan_modifier
    }

    pub fn revision(&self) -> Revision {
        self.revision
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn is_listening(&self) -> bool {
        self.listening
    }

    /// Current values in the external domain, `data[row][col]`.
    pub fn data(&self) -> Vec<Vec<f64>> {
        self.grid.to_external_grid()
    }

    pub fn value(&self, col: usize, row: usize) -> Result<f64> {
        self.grid.external_value(CellCoord::new(col, row))
    }

    // ---- change delivery ----------------------------------------------------

    /// Queue edits instead of notifying from inside the call that made them,
    /// for charts behind a lock the observer may want to take.
    pub fn defer_changes(&mut self) {
        self.grid.set_dispatch(ChangeDispatch::Deferred);
    }

    pub fn pending_changes(&self) -> usize {
        self.grid.pending_changes()
    }

    pub fn take_pending_changes(&mut self) -> Vec<CellChange> {
        self.grid.take_pending_changes()
    }

    pub(crate) fn take_on_change(&mut self) -> Option<ChangeCallback> {
        self.grid.take_on_change()
    }

    pub(crate) fn restore_on_change(&mut self, callback: ChangeCallback) {
        self.grid.restore_on_change(callback);
    }

    // ---- public operations --------------------------------------------------

    /// Replace every value. The payload must match the axis lengths exactly;
    /// on mismatch nothing changes.
    pub fn set_data(&mut self, data: &[Vec<f64>]) -> Result<()> {
        self.grid.replace_values(data)?;
        self.rebuild();
        Ok(())
    }

    /// Set one cell from an external value (clamped into range). Returns the
    /// value actually stored, in the external domain.
    pub fn set_value(&mut self, col: usize, row: usize, value: f64) -> Result<f64> {
        let normalized = self.grid.range().to_normalized(value);
        self.apply_normalized(CellCoord::new(col, row), normalized)
    }

    /// Re-read the container size. Call whenever the host surface changes.
    pub fn resize(&mut self) -> Result<()> {
        let Some(size) = self.container.resolve() else {
            let container = self.container.describe();
            warn!(%container, "resize skipped: container has no displayable size");
            return Err(Report::new(ChartError::Configuration(format!(
                "{container} has no displayable size"
            ))));
        };

        let next = PerspectiveParams::from_size(size);
        if next != self.projection {
            debug!(width = size.x, height = size.y, "surface resized");
            self.projection = next;
            self.revision.view += 1;
        }
        Ok(())
    }

    pub fn reset_view(&mut self) {
        self.camera.reset();
        self.revision.view += 1;
    }

    /// Stop the frame task and ignore all further input. Values can still
    /// be read and written through the API.
    pub fn dispose(&mut self) {
        if !self.running && !self.listening {
            return;
        }
        self.running = false;
        self.listening = false;
        self.controller.reset();
        if self.pivots.highlight(None) {
            self.revision.surface += 1;
        }
        info!("surface chart disposed");
    }

    // ---- input entry points -------------------------------------------------

    /// Pointer position in logical pixels, origin top-left.
    pub fn pointer_moved(&mut self, pos: Vec2) {
        if !self.listening {
            return;
        }
        match self.controller.pointer_moved(pos) {
            PointerAction::None => {}
            PointerAction::Drag { coord, delta } => {
                if let Err(e) = self.drag_by(coord, delta) {
                    warn!(col = coord.col, row = coord.row, "drag update failed: {e:?}");
                }
            }
            PointerAction::Orbit(delta) => {
                if self.camera.rotate(delta) {
                    self.revision.view += 1;
                }
            }
            PointerAction::Pan(delta) => {
                if self.camera.pan(delta) {
                    self.revision.view += 1;
                }
            }
        }
    }

    pub fn pointer_pressed(&mut self, pos: Vec2) {
        if !self.listening {
            return;
        }
        if !self.controller.is_pointer_down() {
            self.update_hover(pos);
        }
        if self.controller.pointer_pressed(pos) {
            self.resync_colors();
        }
    }

    pub fn pointer_released(&mut self) {
        if !self.listening {
            return;
        }
        if self.controller.pointer_released().is_some() {
            self.resync_colors();
        }
    }

    pub fn pointer_left(&mut self) {
        if !self.listening {
            return;
        }
        self.controller.pointer_left();
        if !self.controller.is_pointer_down() && self.pivots.highlight(None) {
            self.revision.surface += 1;
        }
    }

    /// The configured pan modifier went down or up.
    pub fn modifier_changed(&mut self, held: bool) {
        if !self.listening {
            return;
        }
        let mode = self.controller.set_modifier(held);
        self.camera.set_mode(mode);
    }

    pub fn wheel(&mut self, scroll: f32) {
        if !self.listening || scroll == 0.0 {
            return;
        }
        self.camera.zoom(scroll);
        self.revision.view += 1;
    }

    // ---- frame task ---------------------------------------------------------

    /// Per-frame hover hit test. Does nothing once disposed, and nothing
    /// while the pointer is down so hover never fights a drag.
    pub fn frame(&mut self) {
        if !self.running || self.controller.is_pointer_down() {
            return;
        }
        if let Some(pos) = self.controller.pointer() {
            self.update_hover(pos);
        }
    }

    // ---- internals ----------------------------------------------------------

    fn update_hover(&mut self, pos: Vec2) {
        let ndc = self.projection.to_ndc(pos);
        let hit = self
            .projection
            .ray(&self.camera, ndc)
            .and_then(|ray| self.pivots.ray_cast(ray))
            .map(|hit| hit.coord);

        self.controller.apply_hover(hit);
        if self.pivots.highlight(hit) {
            self.revision.surface += 1;
        }
    }

    fn drag_by(&mut self, coord: CellCoord, delta: f64) -> Result<f64> {
        let current = self.grid.normalized(coord)?;
        self.apply_normalized(coord, current + delta)
    }

    /// Single-cell edit: grid first (clamp, color, notify), then the one
    /// vertex and pivot that moved, then every triangle color.
    fn apply_normalized(&mut self, coord: CellCoord, normalized: f64) -> Result<f64> {
        let external = self.grid.set_cell_value(coord, normalized)?;
        let stored = self.grid.normalized(coord)?;
        self.mesh.set_elevation(coord, stored);
        self.pivots.reposition(coord, stored);
        self.resync_colors();
        Ok(external)
    }

    fn resync_colors(&mut self) {
        let emphasis = if self.controller.is_dragging() {
            self.controller.active()
        } else {
            None
        };
        self.mesh.sync_colors(&self.grid, emphasis);
        self.revision.surface += 1;
    }

    fn rebuild(&mut self) {
        self.controller.reset();
        self.mesh = SurfaceMesh::compute(&self.grid);
        self.pivots = PivotSet::build(&self.grid);
        self.revision.layout += 1;
        debug!(
            width = self.grid.width(),
            height = self.grid.height(),
            "surface rebuilt"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::{FixedContainer, SharedContainer};
    use bevy_math::UVec2;

    fn config(width: usize, height: usize) -> SurfaceConfig {
        SurfaceConfig::new(0.0, 100.0)
            .x_axis((0..width).map(|i| format!("x{i}")))
            .y_axis((0..height).map(|i| format!("y{i}")))
    }

    fn chart(width: usize, height: usize) -> SurfaceChart {
        SurfaceChart::new(config(width, height), FixedContainer::new(800, 600)).unwrap()
    }

    fn screen_of(chart: &SurfaceChart, coord: CellCoord) -> Vec2 {
        let index = chart.pivots().index_of(coord).unwrap();
        let world = chart.pivots().get(index).unwrap().position;
        chart
            .projection()
            .world_to_screen(chart.camera(), world)
            .unwrap()
    }

    #[test]
    fn unresolvable_container_fails_construction() {
        let err = SurfaceChart::new(config(2, 2), FixedContainer::new(0, 0)).unwrap_err();
        assert!(matches!(err.current_context(), ChartError::Configuration(_)));
    }

    #[test]
    fn mismatched_initial_data_fails_construction() {
        let cfg = config(2, 2).data(vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]]);
        let err = SurfaceChart::new(cfg, FixedContainer::new(10, 10)).unwrap_err();
        assert!(matches!(
            err.current_context(),
            ChartError::DimensionMismatch { .. }
        ));
    }

    #[test]
    fn hover_then_drag_raises_the_value() {
        let mut c = chart(3, 3);
        let target = CellCoord::new(1, 1);
        let at = screen_of(&c, target);

        c.pointer_moved(at);
        c.frame();
        assert_eq!(c.interaction(), InteractionState::Hover(target));
        assert_eq!(c.pivots().highlighted(), Some(target));

        c.pointer_pressed(at);
        assert_eq!(c.interaction(), InteractionState::Dragging(target));

        // 100 px up is +0.1 normalized, i.e. +10 in a 0..100 range
        c.pointer_moved(at - Vec2::new(0.0, 100.0));
        assert_eq!(c.value(1, 1).unwrap(), 10.0);
        let vertex = c.mesh().vertex(target).unwrap();
        assert!((vertex.z - 0.1 * crate::render::mesh::ELEVATION_SCALE).abs() < 1e-5);

        c.pointer_released();
        assert_eq!(c.interaction(), InteractionState::Hover(target));
        assert_eq!(c.data()[0], vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn drag_fades_other_cells_until_release() {
        let mut c = chart(2, 2);
        let target = CellCoord::new(0, 0);
        let at = screen_of(&c, target);
        c.pointer_moved(at);
        c.frame();
        c.pointer_pressed(at);

        let faded = c.grid().faded(CellCoord::new(1, 0)).unwrap();
        let full = c.grid().color(target).unwrap();
        assert_eq!(c.mesh().corner_colors()[0], [full, faded, faded]);

        c.pointer_released();
        let full_other = c.grid().color(CellCoord::new(1, 0)).unwrap();
        assert_eq!(c.mesh().corner_colors()[0][1], full_other);
    }

    #[test]
    fn hover_is_frozen_while_pointer_is_down() {
        let mut c = chart(3, 3);
        // press on empty space: camera gesture, no pivot
        c.pointer_pressed(Vec2::new(5.0, 5.0));
        let over_pivot = screen_of(&c, CellCoord::new(1, 1));
        let view = c.revision().view;
        c.pointer_moved(over_pivot);
        c.frame();
        assert_eq!(c.active(), None);
        assert!(c.revision().view > view);
    }

    #[test]
    fn modifier_switches_drag_to_pan() {
        let mut c = chart(2, 2);
        c.modifier_changed(true);
        c.pointer_pressed(Vec2::new(5.0, 5.0));
        let before = *c.camera();
        c.pointer_moved(Vec2::new(25.0, 5.0));
        assert_ne!(c.camera().target, before.target);
        assert_eq!(c.camera().yaw, before.yaw);
    }

    #[test]
    fn set_data_rebuilds() {
        let mut c = chart(2, 2);
        let layout = c.revision().layout;
        c.set_data(&[vec![10.0, 20.0], vec![30.0, 40.0]]).unwrap();
        assert_eq!(c.revision().layout, layout + 1);
        let vertex = c.mesh().vertex(CellCoord::new(1, 1)).unwrap();
        assert!((vertex.z - 0.4 * crate::render::mesh::ELEVATION_SCALE).abs() < 1e-5);
    }

    #[test]
    fn out_of_range_set_value_is_an_error() {
        let mut c = chart(2, 2);
        let err = c.set_value(2, 0, 10.0).unwrap_err();
        assert!(matches!(err.current_context(), ChartError::OutOfRange { .. }));
        assert_eq!(c.data(), vec![vec![0.0, 0.0], vec![0.0, 0.0]]);
    }

    #[test]
    fn resize_follows_the_container() {
        let host = SharedContainer::new(UVec2::new(800, 600));
        let mut c = SurfaceChart::new(config(2, 2), host.clone()).unwrap();

        c.resize().unwrap();
        let first = *c.projection();
        let view = c.revision().view;
        c.resize().unwrap();
        assert_eq!(*c.projection(), first);
        assert_eq!(c.revision().view, view);

        host.set_size(UVec2::new(400, 400));
        c.resize().unwrap();
        assert_eq!(c.projection().aspect, 1.0);

        host.detach();
        assert!(c.resize().is_err());
        assert_eq!(c.projection().aspect, 1.0);
    }

    #[test]
    fn reset_view_restores_the_camera() {
        let mut c = chart(2, 2);
        c.wheel(2.0);
        c.pointer_pressed(Vec2::ZERO);
        c.pointer_moved(Vec2::new(30.0, 30.0));
        c.pointer_released();
        assert_ne!(*c.camera(), OrbitCamera::default());
        c.reset_view();
        assert_eq!(*c.camera(), OrbitCamera::default());
    }

    #[test]
    fn dispose_stops_frames_and_input() {
        let mut c = chart(3, 3);
        let at = screen_of(&c, CellCoord::new(2, 2));
        c.dispose();
        assert!(!c.is_running());
        assert!(!c.is_listening());

        c.pointer_moved(at);
        c.frame();
        c.pointer_pressed(at);
        c.wheel(1.0);
        assert_eq!(c.active(), None);
        assert_eq!(*c.camera(), OrbitCamera::default());

        assert_eq!(c.set_value(2, 2, 70.0).unwrap(), 70.0);
    }
}
