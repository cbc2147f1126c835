//! Meter-to-pixel mapping for the elevation and plan views.

use egui::{pos2, Pos2, Rect};

/// Padding around the room rectangle in the plan view [px]
pub const PLAN_PADDING: f32 = 40.0;

/// Maps room coordinates [m] to screen pixels.
///
/// Elevation: `x` is horizontal offset from the diffuser axis, `y` is height
/// above the floor (screen y grows downward, so it is flipped).
/// Plan: `x`/`y` are measured from the room's top-left corner, unflipped.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Layout {
    pub pixels_per_meter: f32,
    pub origin_x: f32,
    pub origin_y: f32,
    flip_y: bool,
}

impl Layout {
    /// Side view: the room height fills the viewport, origin at floor center
    pub fn elevation(viewport: Rect, room_height: f32) -> Self {
        let pixels_per_meter = if room_height > 0.0 {
            viewport.height() / room_height
        } else {
            1.0
        };
        Self {
            pixels_per_meter,
            origin_x: viewport.center().x,
            origin_y: viewport.bottom(),
            flip_y: true,
        }
    }

    /// Top-down view: room fitted inside the padded viewport and centered
    pub fn plan(viewport: Rect, room_width: f32, room_length: f32) -> Self {
        let available_width = (viewport.width() - 2.0 * PLAN_PADDING).max(1.0);
        let available_height = (viewport.height() - 2.0 * PLAN_PADDING).max(1.0);
        let pixels_per_meter = if room_width > 0.0 && room_length > 0.0 {
            (available_width / room_width).min(available_height / room_length)
        } else {
            1.0
        };
        let center = viewport.center();
        Self {
            pixels_per_meter,
            origin_x: center.x - room_width * pixels_per_meter / 2.0,
            origin_y: center.y - room_length * pixels_per_meter / 2.0,
            flip_y: false,
        }
    }

    pub fn to_screen(&self, x: f32, y: f32) -> Pos2 {
        let sy = if self.flip_y { -y } else { y };
        pos2(
            self.origin_x + x * self.pixels_per_meter,
            self.origin_y + sy * self.pixels_per_meter,
        )
    }

    pub fn to_world(&self, pos: Pos2) -> (f32, f32) {
        let x = (pos.x - self.origin_x) / self.pixels_per_meter;
        let y = (pos.y - self.origin_y) / self.pixels_per_meter;
        (x, if self.flip_y { -y } else { y })
    }

    pub fn scale(&self, meters: f32) -> f32 {
        meters * self.pixels_per_meter
    }

    /// Screen rectangle of a room-space box given by two corners
    pub fn rect(&self, x0: f32, y0: f32, x1: f32, y1: f32) -> Rect {
        Rect::from_two_pos(self.to_screen(x0, y0), self.to_screen(x1, y1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_elevation_scale_and_origin() {
        let viewport = Rect::from_min_size(pos2(0.0, 0.0), egui::vec2(800.0, 600.0));
        let layout = Layout::elevation(viewport, 3.0);
        assert_eq!(layout.pixels_per_meter, 200.0);
        assert_eq!(layout.to_screen(0.0, 0.0), pos2(400.0, 600.0));
        assert_eq!(layout.to_screen(1.0, 3.0), pos2(600.0, 0.0));
    }

    #[test]
    fn test_plan_centers_room() {
        let viewport = Rect::from_min_size(pos2(0.0, 0.0), egui::vec2(880.0, 480.0));
        let layout = Layout::plan(viewport, 10.0, 4.0);
        // min(800 / 10, 400 / 4)
        assert_eq!(layout.pixels_per_meter, 80.0);
        let room = layout.rect(0.0, 0.0, 10.0, 4.0);
        assert_eq!(room.center(), viewport.center());
    }

    #[test]
    fn test_world_round_trip() {
        let viewport = Rect::from_min_size(pos2(10.0, 20.0), egui::vec2(640.0, 480.0));
        for layout in [Layout::elevation(viewport, 2.7), Layout::plan(viewport, 5.0, 7.0)] {
            let (x, y) = layout.to_world(layout.to_screen(1.25, 2.5));
            assert!((x - 1.25).abs() < 1e-4);
            assert!((y - 2.5).abs() < 1e-4);
        }
    }
}
