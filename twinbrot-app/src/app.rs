use std::sync::Arc;
use std::time::{Duration, Instant};

use eframe::egui;
use tracing::{info, warn};

use twinbrot_core::Complex;
use twinbrot_render::{ColorConfig, FractalSurface, Notify, RenderState, SurfaceKind};

use crate::preferences::AppPreferences;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Wheel sensitivity: zoom factor is `exp(scroll * ZOOM_SPEED)`.
pub(crate) const ZOOM_SPEED: f64 = 0.001;
/// Pick radius of the Julia marker on the Mandelbrot view, in points.
pub(crate) const MARKER_RADIUS: f32 = 7.0;
/// Space between the two views.
const PANE_GAP: f32 = 4.0;
/// Repaint cadence while a surface is busy and no worker reply is due.
const BUSY_REPAINT: Duration = Duration::from_millis(16);

// ---------------------------------------------------------------------------
// Pane
// ---------------------------------------------------------------------------

/// One on-screen view: a surface plus the GPU texture of its latest frame.
pub(crate) struct Pane {
    pub(crate) surface: FractalSurface,
    texture: Option<egui::TextureHandle>,
    texture_version: u64,
    /// Canvas rectangle from the last layout pass.
    pub(crate) rect: egui::Rect,
    /// World point under the pointer, if hovered.
    pub(crate) cursor: Option<Complex>,
    /// A pan drag or pinch is in progress.
    pub(crate) gesture: bool,
    pub(crate) pinching: bool,
    /// Physical pixels per egui point. The surface works in pixels.
    pixels_per_point: f32,
}

/// Physical pixel size of a canvas of `size` points.
pub(crate) fn canvas_pixels(size: egui::Vec2, pixels_per_point: f32) -> (u32, u32) {
    let px = |v: f32| (v * pixels_per_point).round().max(1.0) as u32;
    (px(size.x), px(size.y))
}

/// A screen-space offset in points, as surface pixels.
pub(crate) fn points_to_pixels(delta: egui::Vec2, pixels_per_point: f32) -> (f64, f64) {
    (
        (delta.x * pixels_per_point) as f64,
        (delta.y * pixels_per_point) as f64,
    )
}

impl Pane {
    fn new(surface: FractalSurface) -> Self {
        Self {
            surface,
            texture: None,
            texture_version: 0,
            rect: egui::Rect::NOTHING,
            cursor: None,
            gesture: false,
            pinching: false,
            pixels_per_point: 1.0,
        }
    }

    pub(crate) fn kind(&self) -> SurfaceKind {
        self.surface.kind()
    }

    /// Canvas pixel coordinates of a screen position.
    pub(crate) fn local(&self, pos: egui::Pos2) -> (f64, f64) {
        points_to_pixels(pos - self.rect.min, self.pixels_per_point)
    }

    /// A screen-space movement in canvas pixels.
    pub(crate) fn delta(&self, delta: egui::Vec2) -> (f64, f64) {
        points_to_pixels(delta, self.pixels_per_point)
    }

    /// Screen position of a world point.
    pub(crate) fn to_screen(&self, p: Complex) -> egui::Pos2 {
        let (sx, sy) = self.surface.world_to_screen(p);
        let ppp = self.pixels_per_point;
        egui::pos2(
            self.rect.min.x + sx as f32 / ppp,
            self.rect.min.y + sy as f32 / ppp,
        )
    }

    fn upload_frame(&mut self, ctx: &egui::Context) {
        let Some(frame) = self.surface.frame() else {
            return;
        };
        let version = self.surface.frame_version();
        if self.texture.is_some() && version == self.texture_version {
            return;
        }
        let image = egui::ColorImage::from_rgba_unmultiplied(
            [frame.buffer.width as usize, frame.buffer.height as usize],
            &frame.buffer.pixels,
        );
        match self.texture.as_mut() {
            Some(tex) => tex.set(image, egui::TextureOptions::LINEAR),
            None => {
                self.texture =
                    Some(ctx.load_texture(self.kind().label(), image, egui::TextureOptions::LINEAR))
            }
        }
        self.texture_version = version;
    }

    /// Draw the presented frame where its world rectangle currently sits,
    /// so a stale frame follows the live pan and zoom until replaced.
    fn paint(&self, painter: &egui::Painter) {
        painter.rect_filled(self.rect, 0.0, egui::Color32::BLACK);
        let (Some(tex), Some(frame)) = (&self.texture, self.surface.frame()) else {
            return;
        };
        let vp = frame.viewport;
        let a = self.to_screen(Complex::new(vp.x_min, vp.y_min));
        let b = self.to_screen(Complex::new(vp.x_max, vp.y_max));
        let uv = egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0));
        painter.image(tex.id(), egui::Rect::from_two_pos(a, b), uv, egui::Color32::WHITE);
    }
}

// ---------------------------------------------------------------------------
// App
// ---------------------------------------------------------------------------

pub(crate) struct TwinbrotApp {
    pub(crate) mandelbrot: Pane,
    pub(crate) julia: Pane,
    /// The Julia marker is being dragged on the Mandelbrot view.
    pub(crate) dragging_marker: bool,
    /// Julia parameter tracks the pointer over the Mandelbrot view.
    pub(crate) follow_cursor: bool,
    pub(crate) show_controls: bool,
    settle_delay: Duration,
}

impl TwinbrotApp {
    pub(crate) fn new(ctx: &egui::Context, prefs: &AppPreferences) -> twinbrot_render::Result<Self> {
        let repaint = ctx.clone();
        let notify: Notify = Arc::new(move || repaint.request_repaint());

        // Real canvas sizes arrive with the first layout pass.
        let (w, h) = canvas_pixels(
            egui::vec2((prefs.window_width - PANE_GAP) / 2.0, prefs.window_height),
            ctx.pixels_per_point(),
        );
        let mandelbrot = FractalSurface::new(
            prefs.surface_config(SurfaceKind::Mandelbrot, w, h),
            Arc::clone(&notify),
        )?;
        let julia = FractalSurface::new(prefs.surface_config(SurfaceKind::Julia, w, h), notify)?;

        Ok(Self {
            mandelbrot: Pane::new(mandelbrot),
            julia: Pane::new(julia),
            dragging_marker: false,
            follow_cursor: false,
            show_controls: true,
            settle_delay: prefs.settle_delay(),
        })
    }

    pub(crate) fn pane_mut(&mut self, kind: SurfaceKind) -> &mut Pane {
        match kind {
            SurfaceKind::Mandelbrot => &mut self.mandelbrot,
            SurfaceKind::Julia => &mut self.julia,
        }
    }

    pub(crate) fn pane(&self, kind: SurfaceKind) -> &Pane {
        match kind {
            SurfaceKind::Mandelbrot => &self.mandelbrot,
            SurfaceKind::Julia => &self.julia,
        }
    }

    /// Push the shared base colour and fill flag to both surfaces.
    pub(crate) fn apply_shared_color(&mut self, base_color: [u8; 3], fill_interior: bool) {
        for pane in [&mut self.mandelbrot, &mut self.julia] {
            let config = ColorConfig {
                base_color,
                fill_interior,
                ..pane.surface.color()
            };
            pane.surface.recolor(config);
        }
    }

    pub(crate) fn set_julia_param(&mut self, c: Complex) {
        self.julia.surface.set_julia_param(c);
    }

    pub(crate) fn reset_view(&mut self, kind: SurfaceKind) {
        if let Err(e) = self.pane_mut(kind).surface.reset_view() {
            warn!(surface = kind.label(), error = %e, "Could not reset view");
        }
    }

    fn draw_canvases(&mut self, ctx: &egui::Context) {
        egui::CentralPanel::default()
            .frame(egui::Frame::NONE)
            .show(ctx, |ui| {
                let full = ui.available_rect_before_wrap();
                let half = ((full.width() - PANE_GAP) / 2.0).max(1.0);
                let left = egui::Rect::from_min_size(full.min, egui::vec2(half, full.height()));
                let right = egui::Rect::from_min_size(
                    egui::pos2(left.max.x + PANE_GAP, full.min.y),
                    egui::vec2(half, full.height()),
                );

                for (kind, rect) in [(SurfaceKind::Mandelbrot, left), (SurfaceKind::Julia, right)] {
                    let response = ui.allocate_rect(rect, egui::Sense::click_and_drag());
                    let pane = self.pane_mut(kind);
                    pane.rect = rect;
                    pane.pixels_per_point = ctx.pixels_per_point();
                    let (w, h) = canvas_pixels(rect.size(), pane.pixels_per_point);
                    pane.surface.resize(w, h);

                    let painter = ui.painter_at(rect);
                    pane.paint(&painter);
                    if kind == SurfaceKind::Mandelbrot {
                        self.paint_julia_marker(&painter);
                    }
                    self.handle_canvas_input(ctx, kind, &response);
                }
            });
    }

    fn paint_julia_marker(&self, painter: &egui::Painter) {
        let pos = self.mandelbrot.to_screen(self.julia.surface.julia_param());
        if !self.mandelbrot.rect.contains(pos) {
            return;
        }
        let color = if self.dragging_marker {
            egui::Color32::from_rgb(255, 200, 80)
        } else {
            egui::Color32::from_rgba_premultiplied(255, 160, 80, 200)
        };
        let stroke = egui::Stroke::new(1.5, color);
        painter.circle_stroke(pos, MARKER_RADIUS, stroke);
        painter.circle_filled(pos, 1.5, color);
    }

    fn schedule_repaint(&self, ctx: &egui::Context) {
        let busy = [&self.mandelbrot, &self.julia]
            .iter()
            .any(|p| p.surface.status().render_state == RenderState::Working);
        let interacting = [&self.mandelbrot, &self.julia]
            .iter()
            .any(|p| p.surface.is_interacting());
        if interacting {
            ctx.request_repaint_after(self.settle_delay.min(BUSY_REPAINT));
        } else if busy {
            ctx.request_repaint_after(BUSY_REPAINT);
        }
    }
}

// ---------------------------------------------------------------------------
// eframe::App
// ---------------------------------------------------------------------------

impl eframe::App for TwinbrotApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        ctx.set_visuals(egui::Visuals::dark());

        let now = Instant::now();
        for pane in [&mut self.mandelbrot, &mut self.julia] {
            pane.surface.tick(now);
            pane.upload_frame(ctx);
        }

        self.show_status_bar(ctx);
        self.show_controls_panel(ctx);
        self.draw_canvases(ctx);
        self.handle_keyboard(ctx);

        self.schedule_repaint(ctx);
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub(crate) fn run() -> eframe::Result {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    info!("Starting Twinbrot");

    let prefs = AppPreferences::load();

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title("Twinbrot")
            .with_inner_size([prefs.window_width, prefs.window_height]),
        ..Default::default()
    };

    eframe::run_native(
        "Twinbrot",
        options,
        Box::new(move |cc| Ok(Box::new(TwinbrotApp::new(&cc.egui_ctx, &prefs)?))),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canvas_is_sized_in_physical_pixels() {
        assert_eq!(canvas_pixels(egui::vec2(400.0, 300.0), 1.0), (400, 300));
        assert_eq!(canvas_pixels(egui::vec2(400.0, 300.0), 2.0), (800, 600));
        assert_eq!(canvas_pixels(egui::vec2(100.3, 0.0), 1.5), (150, 1));
    }

    #[test]
    fn deltas_scale_with_pixel_density() {
        assert_eq!(points_to_pixels(egui::vec2(10.0, -4.0), 2.0), (20.0, -8.0));
        assert_eq!(points_to_pixels(egui::vec2(10.0, -4.0), 1.0), (10.0, -4.0));
    }
}
