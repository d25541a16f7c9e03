use bevy::input::mouse::{MouseScrollUnit, MouseWheel};
use bevy::prelude::*;
use bevy::window::{CursorLeft, PrimaryWindow};
use bevy_camera::{PerspectiveProjection, Projection};

use super::*;
use crate::render::camera::PerspectiveParams;
use crate::render::labels::label_material;

/// Line-based wheels report whole notches; pixel-based ones (touchpads,
/// browsers) report pixels.
const PIXELS_PER_SCROLL_LINE: f32 = 100.0;

pub fn chart_running(chart: Option<Res<SharedChart>>) -> bool {
    chart.is_some_and(|c| c.lock().is_running())
}

pub fn chart_listening(chart: Option<Res<SharedChart>>) -> bool {
    chart.is_some_and(|c| c.lock().is_listening())
}

/// Camera, lights and the assets every rebuild reuses.
pub fn setup_scene(
    mut commands: Commands,
    chart: Res<SharedChart>,
    mut synced: ResMut<SyncedRevision>,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
) {
    let chart = chart.lock();
    synced.view = Some(chart.revision().view);

    commands.spawn((
        SurfaceCamera,
        Camera3d::default(),
        Projection::from(perspective(chart.projection())),
        chart.camera().transform(),
    ));

    // Key light (main, from top-front-right)
    commands.spawn((
        PointLight {
            intensity: 800000.0,
            range: 100.0,
            color: Color::srgb(1.0, 0.98, 0.95),
            shadows_enabled: false,
            ..default()
        },
        Transform::from_xyz(8.0, 12.0, 8.0),
    ));
    // Fill light (softer, from opposite side)
    commands.spawn((
        PointLight {
            intensity: 350000.0,
            range: 100.0,
            color: Color::srgb(0.9, 0.95, 1.0),
            shadows_enabled: false,
            ..default()
        },
        Transform::from_xyz(-6.0, 8.0, -6.0),
    ));
    // Rim light, from below and behind so the underside stays readable
    commands.spawn((
        PointLight {
            intensity: 200000.0,
            range: 100.0,
            color: Color::srgb(1.0, 1.0, 1.0),
            shadows_enabled: false,
            ..default()
        },
        Transform::from_xyz(0.0, -5.0, -10.0),
    ));
    commands.insert_resource(AmbientLight {
        brightness: 300.0,
        ..default()
    });

    commands.insert_resource(SurfaceAssets {
        // White base so the vertex colors come through untinted
        surface_material: materials.add(StandardMaterial {
            base_color: Color::WHITE,
            perceptual_roughness: 0.35,
            metallic: 0.05,
            reflectance: 0.4,
            cull_mode: None,
            double_sided: true,
            ..default()
        }),
        handle_mesh: meshes.add(Sphere::new(1.0)),
        handle_idle: materials.add(StandardMaterial {
            base_color: Color::srgba(1.0, 1.0, 1.0, 0.0),
            alpha_mode: AlphaMode::Blend,
            unlit: true,
            ..default()
        }),
        handle_active: materials.add(StandardMaterial {
            base_color: Color::WHITE,
            emissive: LinearRgba::rgb(0.6, 0.6, 0.6),
            unlit: true,
            ..default()
        }),
    });
}

/// Window input into the chart's entry points.
pub fn forward_input(
    chart: Res<SharedChart>,
    windows: Query<&Window, With<PrimaryWindow>>,
    mouse: Res<ButtonInput<MouseButton>>,
    keys: Res<ButtonInput<KeyCode>>,
    mut cursor: MessageReader<CursorMoved>,
    mut left: MessageReader<CursorLeft>,
    mut wheel: MessageReader<MouseWheel>,
) {
    let mut chart = chart.lock();

    let modifier = chart.pan_modifier().keys();
    if keys.any_just_pressed(modifier) || keys.any_just_released(modifier) {
        chart.modifier_changed(keys.any_pressed(modifier));
    }

    for event in cursor.read() {
        chart.pointer_moved(event.position);
    }

    if mouse.just_pressed(MouseButton::Left) {
        let pos = windows
            .single()
            .ok()
            .and_then(|w| w.cursor_position())
            .or(chart.pointer());
        if let Some(pos) = pos {
            chart.pointer_pressed(pos);
        }
    }
    if mouse.just_released(MouseButton::Left) {
        chart.pointer_released();
    }

    let scroll: f32 = wheel
        .read()
        .map(|event| match event.unit {
            MouseScrollUnit::Line => event.y,
            MouseScrollUnit::Pixel => event.y / PIXELS_PER_SCROLL_LINE,
        })
        .sum();
    if scroll != 0.0 {
        chart.wheel(scroll);
    }

    // Leave and re-enter can land in the same frame; the window knows
    // where the cursor ended up.
    let inside = windows
        .single()
        .ok()
        .and_then(|w| w.cursor_position())
        .is_some();
    if left.read().count() > 0 && !inside {
        chart.pointer_left();
    }
}

pub fn drive_frame(chart: Res<SharedChart>) {
    chart.lock().frame();
}

/// Runs even after dispose, since API edits still queue changes.
pub fn dispatch_changes(chart: Res<SharedChart>) {
    chart.flush_changes();
}

/// Respawn every surface entity whenever the grid was replaced.
pub fn rebuild_surface(
    mut commands: Commands,
    chart: Res<SharedChart>,
    mut synced: ResMut<SyncedRevision>,
    roots: Query<Entity, With<SurfaceRoot>>,
    assets: Res<SurfaceAssets>,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
    mut images: ResMut<Assets<Image>>,
) {
    let chart = chart.lock();
    let revision = chart.revision();
    if synced.layout == Some(revision.layout) {
        return;
    }

    for root in roots.iter() {
        commands.entity(root).try_despawn();
    }
    let root = commands
        .spawn((SurfaceRoot, Transform::default(), Visibility::default()))
        .id();

    let surface = chart.mesh();
    // A single row or column has no faces, only pivots
    if surface.triangle_count() > 0 {
        let entity = commands
            .spawn((
                SurfaceMeshTag,
                Mesh3d(meshes.add(surface.to_mesh())),
                MeshMaterial3d(assets.surface_material.clone()),
                surface.layout().surface_transform(),
            ))
            .id();
        commands.entity(root).add_child(entity);
    }

    let radius = chart.pivots().handle_radius();
    for (index, pivot) in chart.pivots().iter().enumerate() {
        let material = if pivot.highlighted {
            assets.handle_active.clone()
        } else {
            assets.handle_idle.clone()
        };
        let entity = commands
            .spawn((
                PivotHandle { index },
                Mesh3d(assets.handle_mesh.clone()),
                MeshMaterial3d(material),
                Transform::from_translation(pivot.position).with_scale(Vec3::splat(radius)),
            ))
            .id();
        commands.entity(root).add_child(entity);
    }

    for axis in chart.labels().iter() {
        let size = axis.placement.size;
        let texture = images.add(axis.strip.to_image());
        let entity = commands
            .spawn((
                AxisLabelStrip(axis.axis),
                Mesh3d(meshes.add(Rectangle::new(size.x, size.y))),
                MeshMaterial3d(materials.add(label_material(texture))),
                axis.placement.transform(),
            ))
            .id();
        commands.entity(root).add_child(entity);
    }

    debug!(
        pivots = chart.pivots().len(),
        triangles = surface.triangle_count(),
        "surface entities rebuilt"
    );
    synced.layout = Some(revision.layout);
    synced.surface = revision.surface;
}

/// Push elevation, color and highlight changes into the live entities.
pub fn sync_surface(
    chart: Res<SharedChart>,
    mut synced: ResMut<SyncedRevision>,
    assets: Res<SurfaceAssets>,
    mut meshes: ResMut<Assets<Mesh>>,
    surfaces: Query<&Mesh3d, With<SurfaceMeshTag>>,
    mut handles: Query<(
        &PivotHandle,
        &mut Transform,
        &mut MeshMaterial3d<StandardMaterial>,
    )>,
) {
    let chart = chart.lock();
    let revision = chart.revision();
    if synced.layout.is_none() || synced.surface == revision.surface {
        return;
    }

    for mesh in surfaces.iter() {
        if let Some(mesh) = meshes.get_mut(&mesh.0) {
            chart.mesh().write_to(mesh);
        }
    }

    for (tag, mut transform, mut material) in handles.iter_mut() {
        let Some(pivot) = chart.pivots().get(tag.index) else {
            continue;
        };
        transform.translation = pivot.position;
        let wanted = if pivot.highlighted {
            &assets.handle_active
        } else {
            &assets.handle_idle
        };
        if material.0 != *wanted {
            material.0 = wanted.clone();
        }
    }

    synced.surface = revision.surface;
}

pub fn sync_camera(
    chart: Res<SharedChart>,
    mut synced: ResMut<SyncedRevision>,
    mut cameras: Query<(&mut Transform, &mut Projection), With<SurfaceCamera>>,
) {
    let chart = chart.lock();
    let revision = chart.revision();
    if synced.view == Some(revision.view) {
        return;
    }

    for (mut transform, mut projection) in cameras.iter_mut() {
        *transform = chart.camera().transform();
        *projection = Projection::from(perspective(chart.projection()));
    }
    synced.view = Some(revision.view);
}

fn perspective(params: &PerspectiveParams) -> PerspectiveProjection {
    PerspectiveProjection {
        fov: params.fov,
        aspect_ratio: params.aspect,
        near: params.near,
        far: params.far,
        ..default()
    }
}
