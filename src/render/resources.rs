use std::sync::Arc;

use bevy::prelude::*;
use parking_lot::{Mutex, MutexGuard};

use crate::chart::SurfaceChart;
use crate::container::SharedContainer;

/// The chart as a Bevy resource. Clones share the same chart, so the host
/// keeps a handle to it after the app has taken its copy.
///
/// Edits are queued while the lock is held and handed to the observer by
/// [`SharedChart::flush_changes`], which the render loop calls every frame.
/// The observer may lock the chart itself.
#[derive(Resource, Clone)]
pub struct SharedChart(pub Arc<Mutex<SurfaceChart>>);

impl SharedChart {
    pub fn new(mut chart: SurfaceChart) -> Self {
        chart.defer_changes();
        Self(Arc::new(Mutex::new(chart)))
    }

    pub fn lock(&self) -> MutexGuard<'_, SurfaceChart> {
        self.0.lock()
    }

    /// Notify the observer of every queued edit, with the chart unlocked.
    /// Without an observer the queue is left for someone else to drain.
    /// Returns how many changes were delivered.
    pub fn flush_changes(&self) -> usize {
        let (mut callback, changes) = {
            let mut chart = self.lock();
            if chart.pending_changes() == 0 {
                return 0;
            }
            let Some(callback) = chart.take_on_change() else {
                return 0;
            };
            (callback, chart.take_pending_changes())
        };

        for change in &changes {
            callback.notify(change);
        }
        self.lock().restore_on_change(callback);
        changes.len()
    }
}

/// Container the native runtime keeps in sync with the primary window.
#[derive(Resource, Clone)]
pub struct HostContainer(pub SharedContainer);

/// Parts of [`crate::chart::Revision`] the scene currently reflects. `None` means not
/// built yet.
#[derive(Resource, Default, Debug)]
pub struct SyncedRevision {
    pub layout: Option<u64>,
    pub surface: u64,
    pub view: Option<u64>,
}

/// Assets shared by every rebuild.
#[derive(Resource)]
pub struct SurfaceAssets {
    pub surface_material: Handle<StandardMaterial>,
    /// Unit sphere, scaled per pivot.
    pub handle_mesh: Handle<Mesh>,
    pub handle_idle: Handle<StandardMaterial>,
    pub handle_active: Handle<StandardMaterial>,
}
