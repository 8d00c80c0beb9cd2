use std::time::Instant;

use eframe::egui;

use twinbrot_render::SurfaceKind;

use crate::app::{TwinbrotApp, MARKER_RADIUS, ZOOM_SPEED};

/// Wheel zoom factor for a scroll of `delta` points (positive scrolls up and zooms in).
pub(crate) fn wheel_zoom_factor(delta: f32) -> f64 {
    (delta as f64 * ZOOM_SPEED).exp()
}

impl TwinbrotApp {
    pub(crate) fn handle_canvas_input(
        &mut self,
        ctx: &egui::Context,
        kind: SurfaceKind,
        response: &egui::Response,
    ) {
        let now = Instant::now();
        let hover = response.hover_pos();
        {
            let pane = self.pane_mut(kind);
            let cursor = hover.map(|pos| {
                let (sx, sy) = pane.local(pos);
                pane.surface.screen_to_world(sx, sy)
            });
            pane.cursor = cursor;
        }

        // Pinch: zoom about the gesture midpoint; held until the fingers lift.
        let touch = ctx.input(|i| i.multi_touch());
        {
            let pane = self.pane_mut(kind);
            match touch {
                Some(touch) if pane.rect.contains(touch.center_pos) => {
                    if !pane.pinching {
                        pane.pinching = true;
                        pane.surface.begin_gesture(now);
                    }
                    let (sx, sy) = pane.local(touch.center_pos);
                    pane.surface.zoom_at(sx, sy, touch.zoom_delta as f64, now);
                    let (dx, dy) = pane.delta(touch.translation_delta);
                    pane.surface.pan_by(dx, dy, now);
                }
                _ if pane.pinching => {
                    pane.pinching = false;
                    pane.surface.end_gesture(now);
                }
                _ => {}
            }
        }

        let scroll_y = ctx.input(|i| i.raw_scroll_delta.y);
        if scroll_y != 0.0 && response.hovered() {
            if let Some(pos) = hover {
                let pane = self.pane_mut(kind);
                let (sx, sy) = pane.local(pos);
                pane.surface.zoom_at(sx, sy, wheel_zoom_factor(scroll_y), now);
            }
        }

        if response.drag_started_by(egui::PointerButton::Primary) {
            let on_marker = kind == SurfaceKind::Mandelbrot
                && response.interact_pointer_pos().is_some_and(|pos| {
                    let marker = self.mandelbrot.to_screen(self.julia.surface.julia_param());
                    marker.distance(pos) <= MARKER_RADIUS * 1.5
                });
            if on_marker {
                self.dragging_marker = true;
            } else {
                let pane = self.pane_mut(kind);
                pane.gesture = true;
                pane.surface.begin_gesture(now);
            }
        }

        if response.dragged_by(egui::PointerButton::Primary) {
            if self.dragging_marker && kind == SurfaceKind::Mandelbrot {
                if let Some(c) = self.mandelbrot.cursor {
                    self.set_julia_param(c);
                }
            } else if self.pane(kind).gesture {
                let pane = self.pane_mut(kind);
                let (dx, dy) = pane.delta(response.drag_delta());
                pane.surface.pan_by(dx, dy, now);
            }
        }

        if response.drag_stopped_by(egui::PointerButton::Primary) {
            if kind == SurfaceKind::Mandelbrot {
                self.dragging_marker = false;
            }
            let pane = self.pane_mut(kind);
            if pane.gesture {
                pane.gesture = false;
                pane.surface.end_gesture(now);
            }
        }

        if kind == SurfaceKind::Mandelbrot && self.follow_cursor && !self.dragging_marker {
            if let Some(c) = self.mandelbrot.cursor {
                self.set_julia_param(c);
            }
        }

        if response.double_clicked() {
            self.reset_view(kind);
        }
    }

    pub(crate) fn handle_keyboard(&mut self, ctx: &egui::Context) {
        if ctx.memory(|m| m.focused().is_some()) {
            return;
        }
        ctx.input(|input| {
            if input.key_pressed(egui::Key::F) {
                self.follow_cursor = !self.follow_cursor;
            }
            if input.key_pressed(egui::Key::Tab) {
                self.show_controls = !self.show_controls;
            }
            if input.key_pressed(egui::Key::R) {
                self.reset_view(SurfaceKind::Mandelbrot);
                self.reset_view(SurfaceKind::Julia);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wheel_up_zooms_in() {
        assert!(wheel_zoom_factor(120.0) > 1.0);
        assert!(wheel_zoom_factor(-120.0) < 1.0);
        assert_eq!(wheel_zoom_factor(0.0), 1.0);
        let round_trip = wheel_zoom_factor(50.0) * wheel_zoom_factor(-50.0);
        assert!((round_trip - 1.0).abs() < 1e-12);
    }
}
