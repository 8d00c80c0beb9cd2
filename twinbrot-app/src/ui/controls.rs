use eframe::egui;

use twinbrot_render::{GrayscaleMode, SurfaceKind, MAX_GLOW};

use crate::app::TwinbrotApp;

impl TwinbrotApp {
    pub(crate) fn show_controls_panel(&mut self, ctx: &egui::Context) {
        if !self.show_controls {
            return;
        }

        egui::SidePanel::right("controls")
            .resizable(false)
            .default_width(240.0)
            .show(ctx, |ui| {
                ui.heading("Colour");
                let shared = self.mandelbrot.surface.color();
                let mut base_color = shared.base_color;
                let mut fill_interior = shared.fill_interior;
                ui.horizontal(|ui| {
                    ui.label("Base");
                    ui.color_edit_button_srgb(&mut base_color);
                });
                ui.checkbox(&mut fill_interior, "Fill interior");
                if base_color != shared.base_color || fill_interior != shared.fill_interior {
                    self.apply_shared_color(base_color, fill_interior);
                }

                for kind in [SurfaceKind::Mandelbrot, SurfaceKind::Julia] {
                    ui.separator();
                    self.surface_controls(ui, kind);
                }

                ui.separator();
                ui.heading("Julia parameter");
                let mut c = self.julia.surface.julia_param();
                ui.horizontal(|ui| {
                    ui.label("Re");
                    ui.add(egui::DragValue::new(&mut c.re).speed(0.0005).max_decimals(12));
                });
                ui.horizontal(|ui| {
                    ui.label("Im");
                    ui.add(egui::DragValue::new(&mut c.im).speed(0.0005).max_decimals(12));
                });
                if c != self.julia.surface.julia_param() {
                    self.set_julia_param(c);
                }
                ui.checkbox(&mut self.follow_cursor, "Follow cursor (F)");
                ui.small("Drag the marker on the Mandelbrot view to move c.");
            });
    }

    fn surface_controls(&mut self, ui: &mut egui::Ui, kind: SurfaceKind) {
        let pane = self.pane_mut(kind);
        ui.heading(match kind {
            SurfaceKind::Mandelbrot => "Mandelbrot",
            SurfaceKind::Julia => "Julia",
        });

        let mut config = pane.surface.color();
        ui.add(egui::Slider::new(&mut config.glow, 0..=MAX_GLOW).text("Glow"));
        let mut relative = config.grayscale == GrayscaleMode::Relative;
        ui.checkbox(&mut relative, "Relative contrast");
        config.grayscale = if relative {
            GrayscaleMode::Relative
        } else {
            GrayscaleMode::Absolute
        };
        pane.surface.recolor(config);

        let mut max_iterations = pane.surface.max_iterations();
        ui.horizontal(|ui| {
            ui.label("Iterations");
            ui.add(egui::DragValue::new(&mut max_iterations).range(1..=100_000).speed(5));
        });
        pane.surface.set_max_iterations(max_iterations);

        let mut reset = false;
        ui.horizontal(|ui| {
            if ui
                .button("Normalize once")
                .on_hover_text("Stretch the current frame's contrast without re-rendering")
                .clicked()
            {
                pane.surface.normalize_contrast_once();
            }
            reset = ui.button("Reset view").clicked();
        });
        if reset {
            self.reset_view(kind);
        }
    }
}
