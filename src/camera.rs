//! Orbit camera for the 3D view: rotate, perspective divide, zoom and pan.

use egui::{pos2, Pos2, Rect, Vec2};
use nalgebra as na;

/// Room-space scale before rotation [px/m]
pub const PIXELS_PER_METER_3D: f32 = 60.0;

/// Points closer than this to the camera plane are not drawn
pub const NEAR_CLIP: f32 = 10.0;

pub const ZOOM_MIN: f32 = 0.1;
pub const ZOOM_MAX: f32 = 5.0;

const ORBIT_SENSITIVITY: f32 = 0.01;
const ZOOM_SENSITIVITY: f32 = 0.001;
const ELEVATION_LIMIT: f32 = 1.45;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraDrag {
    Orbit,
    Pan,
}

impl CameraDrag {
    /// Primary drag orbits; secondary drag, or primary with a modifier, pans
    pub fn from_buttons(primary: bool, secondary: bool, modifier: bool) -> Option<Self> {
        match (primary, secondary) {
            (_, true) => Some(CameraDrag::Pan),
            (true, false) if modifier => Some(CameraDrag::Pan),
            (true, false) => Some(CameraDrag::Orbit),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projected {
    pub pos: Pos2,
    /// Post-rotation depth, larger is farther away
    pub depth: f32,
    /// Screen pixels per room-space pixel at this depth
    pub scale: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera3D {
    /// Rotation about the vertical axis [rad]
    pub azimuth: f32,
    /// Tilt above the horizon [rad]
    pub elevation: f32,
    pub distance: f32,
    pub fov: f32,
    pub zoom: f32,
    pub pan: Vec2,
}

impl Default for Camera3D {
    fn default() -> Self {
        Self {
            azimuth: 0.6,
            elevation: 0.35,
            distance: 900.0,
            fov: 700.0,
            zoom: 1.0,
            pan: Vec2::ZERO,
        }
    }
}

impl Camera3D {
    pub fn rotate(&self, p: na::Vector3<f32>) -> na::Vector3<f32> {
        let yaw = na::Rotation3::from_axis_angle(&na::Vector3::y_axis(), self.azimuth);
        let pitch = na::Rotation3::from_axis_angle(&na::Vector3::x_axis(), -self.elevation);
        pitch * (yaw * p)
    }

    /// Projects a room-space point [m], already centered on the orbit target.
    /// Returns `None` when the point falls inside the near clip distance.
    pub fn project(&self, point: na::Vector3<f32>, viewport: Rect) -> Option<Projected> {
        let r = self.rotate(point * PIXELS_PER_METER_3D);
        let depth = r.z;
        if self.distance + depth < NEAR_CLIP {
            return None;
        }

        let scale = self.fov / (self.distance + depth) * self.zoom;
        let center = viewport.center();
        Some(Projected {
            pos: pos2(
                center.x + r.x * scale + self.pan.x,
                center.y - r.y * scale + self.pan.y,
            ),
            depth,
            scale,
        })
    }

    pub fn orbit(&mut self, delta: Vec2) {
        self.azimuth += delta.x * ORBIT_SENSITIVITY;
        self.elevation =
            (self.elevation + delta.y * ORBIT_SENSITIVITY).clamp(-ELEVATION_LIMIT, ELEVATION_LIMIT);
    }

    pub fn pan_by(&mut self, delta: Vec2) {
        self.pan += delta;
    }

    /// Scroll wheel zoom, clamped to `[ZOOM_MIN, ZOOM_MAX]`
    pub fn zoom_by(&mut self, scroll: f32) {
        self.zoom = (self.zoom * (1.0 + scroll * ZOOM_SENSITIVITY)).clamp(ZOOM_MIN, ZOOM_MAX);
    }

    pub fn drag(&mut self, mode: CameraDrag, delta: Vec2) {
        match mode {
            CameraDrag::Orbit => self.orbit(delta),
            CameraDrag::Pan => self.pan_by(delta),
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn viewport() -> Rect {
        Rect::from_min_size(pos2(0.0, 0.0), egui::vec2(800.0, 600.0))
    }

    #[test]
    fn test_origin_projects_to_center() {
        let camera = Camera3D::default();
        let p = camera.project(na::Vector3::zeros(), viewport()).unwrap();
        assert!((p.pos.x - 400.0).abs() < 1e-3);
        assert!((p.pos.y - 300.0).abs() < 1e-3);
    }

    #[test]
    fn test_near_points_are_clipped() {
        let camera = Camera3D {
            azimuth: 0.0,
            elevation: 0.0,
            ..Camera3D::default()
        };
        // z toward the camera by more than its distance
        let behind = na::Vector3::new(0.0, 0.0, -camera.distance / PIXELS_PER_METER_3D);
        assert!(camera.project(behind, viewport()).is_none());
    }

    #[test]
    fn test_zoom_is_clamped() {
        let mut camera = Camera3D::default();
        for _ in 0..100 {
            camera.zoom_by(1000.0);
        }
        assert_eq!(camera.zoom, ZOOM_MAX);
        for _ in 0..100 {
            camera.zoom_by(-900.0);
        }
        assert_eq!(camera.zoom, ZOOM_MIN);
    }

    #[test]
    fn test_far_points_are_smaller() {
        let camera = Camera3D {
            azimuth: 0.0,
            elevation: 0.0,
            ..Camera3D::default()
        };
        let near = camera.project(na::Vector3::new(1.0, 0.0, -2.0), viewport()).unwrap();
        let far = camera.project(na::Vector3::new(1.0, 0.0, 2.0), viewport()).unwrap();
        assert!(far.depth > near.depth);
        assert!(far.scale < near.scale);
    }

    #[test]
    fn test_drag_mode_mapping() {
        assert_eq!(CameraDrag::from_buttons(true, false, false), Some(CameraDrag::Orbit));
        assert_eq!(CameraDrag::from_buttons(true, false, true), Some(CameraDrag::Pan));
        assert_eq!(CameraDrag::from_buttons(false, true, false), Some(CameraDrag::Pan));
        assert_eq!(CameraDrag::from_buttons(false, false, false), None);
    }
}
