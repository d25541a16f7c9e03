use bevy::prelude::*;

use crate::render::labels::LabelAxis;

/// Parent of everything rebuilt when the grid is replaced.
#[derive(Component)]
pub struct SurfaceRoot;

#[derive(Component)]
pub struct SurfaceCamera;

/// The surface mesh entity.
#[derive(Component)]
pub struct SurfaceMeshTag;

/// Visible handle of the pivot at `index` in the chart's pivot arena.
#[derive(Component, Clone, Copy, Debug, PartialEq, Eq)]
pub struct PivotHandle {
    pub index: usize,
}

#[derive(Component, Clone, Copy, Debug, PartialEq, Eq)]
pub struct AxisLabelStrip(pub LabelAxis);
