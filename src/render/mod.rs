pub mod camera;
pub mod components;
pub mod labels;
pub mod mesh;
pub mod pivots;
pub mod resources;
pub mod systems;

pub use components::*;
pub use resources::*;
use systems::*;

use bevy::prelude::*;

/// Draws a [`SharedChart`] and feeds window input back into it.
#[derive(Default)]
pub struct SurfaceRenderPlugin;

impl Plugin for SurfaceRenderPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<SyncedRevision>()
            .add_systems(Startup, setup_scene)
            .add_systems(
                Update,
                (
                    forward_input.run_if(chart_listening),
                    drive_frame,
                    rebuild_surface,
                    sync_surface,
                    sync_camera,
                )
                    .chain()
                    .run_if(chart_running),
            )
            .add_systems(Update, dispatch_changes.after(sync_camera));
    }
}
