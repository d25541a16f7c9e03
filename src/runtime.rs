use bevy::prelude::*;
use bevy::window::PrimaryWindow;
use bevy_math::UVec2;

use crate::render::{HostContainer, SharedChart, SurfaceRenderPlugin};

const BACKGROUND: Color = Color::srgb(0.05, 0.05, 0.09);

/// Open a window and run the chart until it is closed. `container` must be
/// the container the chart was constructed with; it is kept at the window's
/// logical size.
#[cfg(not(target_arch = "wasm32"))]
pub fn run_surface(chart: SharedChart, container: crate::container::SharedContainer) {
    App::new()
        .insert_resource(ClearColor(BACKGROUND))
        .insert_resource(chart)
        .insert_resource(HostContainer(container))
        .add_plugins((
            DefaultPlugins.set(ImagePlugin::default_nearest()),
            SurfaceRenderPlugin,
        ))
        .add_systems(Update, follow_window_size)
        .run();
}

/// Render into the canvas with the given id (without `#`). The chart should
/// have been constructed with a [`crate::container::CanvasContainer`] for
/// the same element.
#[cfg(target_arch = "wasm32")]
pub fn run_surface(chart: SharedChart, canvas_id: &str) {
    surface_app(chart, canvas_id).run();
}

/// The app [`run_surface`] runs, for hosts that add their own systems first.
#[cfg(target_arch = "wasm32")]
pub fn surface_app(chart: SharedChart, canvas_id: &str) -> App {
    let mut app = App::new();
    app.insert_resource(ClearColor(BACKGROUND))
        .insert_resource(chart)
        .add_plugins((
            DefaultPlugins
                .set(WindowPlugin {
                    primary_window: Some(Window {
                        canvas: Some(format!("#{}", canvas_id)),
                        fit_canvas_to_parent: true,
                        ..default()
                    }),
                    ..default()
                })
                .set(ImagePlugin::default_nearest()),
            SurfaceRenderPlugin,
        ))
        .add_systems(Update, follow_window_size);
    app
}

/// The chart does not watch its container, so call `resize()` whenever the
/// window's logical size actually changes.
fn follow_window_size(
    windows: Query<&Window, (With<PrimaryWindow>, Changed<Window>)>,
    chart: Res<SharedChart>,
    host: Option<Res<HostContainer>>,
    mut last: Local<Option<UVec2>>,
) {
    let Ok(window) = windows.single() else {
        return;
    };
    let size = UVec2::new(window.width() as u32, window.height() as u32);
    if *last == Some(size) {
        return;
    }
    *last = Some(size);

    if let Some(host) = host {
        host.0.set_size(size);
    }
    if let Err(e) = chart.lock().resize() {
        warn!("surface resize failed: {e:?}");
    }
}
