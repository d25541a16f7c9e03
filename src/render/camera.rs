//! Orbit camera and the CPU-side projection used for picking rays.
//!
//! The Bevy camera entity is synced from these values every time they
//! change, so rays computed here line up with what is on screen.

use bevy::prelude::Transform;
use bevy_math::{Dir3, Mat4, Ray3d, UVec2, Vec2, Vec3};

use crate::interaction::CameraMode;

const MIN_PITCH: f32 = -1.5;
const MAX_PITCH: f32 = 1.5;
const MIN_RADIUS: f32 = 2.0;
const MAX_RADIUS: f32 = 60.0;

/// Orbit camera state (target, distance, yaw, pitch) plus which drag
/// gestures are currently allowed.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OrbitCamera {
    pub target: Vec3,
    pub radius: f32,
    pub yaw: f32,
    pub pitch: f32,
    pub rotate_enabled: bool,
    pub pan_enabled: bool,
    pub orbit_speed: f32,
    pub pan_speed: f32,
}

impl Default for OrbitCamera {
    fn default() -> Self {
        Self {
            target: Vec3::ZERO,
            radius: 10.0,
            yaw: 0.6,   // initial horizontal rotation
            pitch: 0.6, // above the surface, looking down
            rotate_enabled: true,
            pan_enabled: false,
            orbit_speed: 0.01,
            pan_speed: 0.0015,
        }
    }
}

impl OrbitCamera {
    pub fn eye(&self) -> Vec3 {
        let (sy, cy) = self.yaw.sin_cos();
        let (sp, cp) = self.pitch.sin_cos();
        self.target + Vec3::new(sy * cp, sp, cy * cp) * self.radius
    }

    pub fn transform(&self) -> Transform {
        Transform::from_translation(self.eye()).looking_at(self.target, Vec3::Y)
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye(), self.target, Vec3::Y)
    }

    pub fn set_mode(&mut self, mode: CameraMode) {
        self.rotate_enabled = mode == CameraMode::Rotate;
        self.pan_enabled = mode == CameraMode::Pan;
    }

    /// Returns false when rotation is currently disabled.
    pub fn rotate(&mut self, delta: Vec2) -> bool {
        if !self.rotate_enabled {
            return false;
        }
        self.yaw -= delta.x * self.orbit_speed;
        self.pitch = (self.pitch + delta.y * self.orbit_speed).clamp(MIN_PITCH, MAX_PITCH);
        true
    }

    /// Returns false when panning is currently disabled.
    pub fn pan(&mut self, delta: Vec2) -> bool {
        if !self.pan_enabled {
            return false;
        }
        let right = Vec3::new(self.yaw.cos(), 0.0, -self.yaw.sin());
        let fwd = Vec3::new(self.yaw.sin(), 0.0, self.yaw.cos());
        self.target += (-right * delta.x + fwd * delta.y) * self.pan_speed * self.radius;
        true
    }

    pub fn zoom(&mut self, scroll: f32) {
        if scroll.abs() > 0.001 {
            self.radius = (self.radius * (1.0 - scroll * 0.1)).clamp(MIN_RADIUS, MAX_RADIUS);
        }
    }

    /// Back to the default orientation and distance. Gesture flags are left
    /// alone since they follow the modifier key.
    pub fn reset(&mut self) {
        *self = Self {
            rotate_enabled: self.rotate_enabled,
            pan_enabled: self.pan_enabled,
            ..Self::default()
        };
    }
}

/// Perspective projection derived from the container's size.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PerspectiveParams {
    pub fov: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
    pub viewport: UVec2,
}

impl PerspectiveParams {
    pub fn from_size(size: UVec2) -> Self {
        let size = size.max(UVec2::ONE);
        Self {
            fov: std::f32::consts::FRAC_PI_4,
            aspect: size.x as f32 / size.y as f32,
            near: 0.1,
            far: 1000.0,
            viewport: size,
        }
    }

    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov, self.aspect, self.near, self.far)
    }

    /// Screen position (origin top-left, y down) to normalized device
    /// coordinates (origin centre, y up).
    pub fn to_ndc(&self, screen: Vec2) -> Vec2 {
        let size = self.viewport.as_vec2();
        Vec2::new(screen.x / size.x * 2.0 - 1.0, 1.0 - screen.y / size.y * 2.0)
    }

    pub fn from_ndc(&self, ndc: Vec2) -> Vec2 {
        let size = self.viewport.as_vec2();
        Vec2::new((ndc.x + 1.0) * 0.5 * size.x, (1.0 - ndc.y) * 0.5 * size.y)
    }

    /// Ray from the camera through an NDC position.
    pub fn ray(&self, camera: &OrbitCamera, ndc: Vec2) -> Option<Ray3d> {
        let inv = (self.projection_matrix() * camera.view_matrix()).inverse();
        let near = inv.project_point3(ndc.extend(0.0));
        let far = inv.project_point3(ndc.extend(1.0));
        let direction = Dir3::new(far - near).ok()?;
        Some(Ray3d::new(near, direction))
    }

    /// Screen position of a world point, `None` when it is behind the camera.
    pub fn world_to_screen(&self, camera: &OrbitCamera, point: Vec3) -> Option<Vec2> {
        let clip = self.projection_matrix() * camera.view_matrix() * point.extend(1.0);
        if clip.w <= f32::EPSILON {
            return None;
        }
        let ndc = clip.truncate() / clip.w;
        Some(self.from_ndc(ndc.truncate()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn distance_to_ray(ray: Ray3d, p: Vec3) -> f32 {
        let v = p - ray.origin;
        (v - *ray.direction * v.dot(*ray.direction)).length()
    }

    #[test]
    fn centre_ray_passes_through_target() {
        let cam = OrbitCamera::default();
        let proj = PerspectiveParams::from_size(UVec2::new(800, 600));
        let ray = proj.ray(&cam, Vec2::ZERO).unwrap();
        assert!(distance_to_ray(ray, cam.target) < 1e-3);
        assert!((ray.origin - cam.eye()).length() < 0.2);
    }

    #[test]
    fn screen_projection_inverts_picking() {
        let cam = OrbitCamera::default();
        let proj = PerspectiveParams::from_size(UVec2::new(1024, 512));
        let point = Vec3::new(1.5, 0.4, -0.8);
        let screen = proj.world_to_screen(&cam, point).unwrap();
        let ray = proj.ray(&cam, proj.to_ndc(screen)).unwrap();
        assert!(distance_to_ray(ray, point) < 1e-3);

        let centre = proj.world_to_screen(&cam, cam.target).unwrap();
        assert!((centre - Vec2::new(512.0, 256.0)).length() < 0.5);
    }

    #[test]
    fn ndc_round_trip() {
        let proj = PerspectiveParams::from_size(UVec2::new(200, 100));
        assert_eq!(proj.to_ndc(Vec2::new(0.0, 0.0)), Vec2::new(-1.0, 1.0));
        assert_eq!(proj.to_ndc(Vec2::new(200.0, 100.0)), Vec2::new(1.0, -1.0));
        assert_eq!(proj.from_ndc(Vec2::ZERO), Vec2::new(100.0, 50.0));
    }

    #[test]
    fn modes_gate_gestures() {
        let mut cam = OrbitCamera::default();
        assert!(!cam.pan(Vec2::new(10.0, 0.0)));
        assert!(cam.rotate(Vec2::new(10.0, 0.0)));

        cam.set_mode(CameraMode::Pan);
        assert!(!cam.rotate(Vec2::new(10.0, 0.0)));
        let before = cam.target;
        assert!(cam.pan(Vec2::new(10.0, 0.0)));
        assert_ne!(cam.target, before);
    }

    #[test]
    fn pitch_is_clamped() {
        let mut cam = OrbitCamera::default();
        cam.rotate(Vec2::new(0.0, 10_000.0));
        assert_eq!(cam.pitch, MAX_PITCH);
        cam.rotate(Vec2::new(0.0, -10_000.0));
        assert_eq!(cam.pitch, MIN_PITCH);
    }

    #[test]
    fn reset_restores_defaults_but_keeps_mode() {
        let mut cam = OrbitCamera::default();
        cam.rotate(Vec2::new(40.0, 20.0));
        cam.zoom(3.0);
        cam.set_mode(CameraMode::Pan);
        cam.pan(Vec2::new(5.0, 5.0));

        cam.reset();
        let default = OrbitCamera::default();
        assert_eq!(cam.target, default.target);
        assert_eq!(cam.radius, default.radius);
        assert_eq!(cam.yaw, default.yaw);
        assert_eq!(cam.pitch, default.pitch);
        assert!(cam.pan_enabled);
        assert!(!cam.rotate_enabled);
    }

    #[test]
    fn degenerate_size_does_not_divide_by_zero() {
        let proj = PerspectiveParams::from_size(UVec2::new(0, 0));
        assert_eq!(proj.aspect, 1.0);
    }
}
