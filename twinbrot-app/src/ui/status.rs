use eframe::egui;

use twinbrot_render::{RenderState, SurfaceKind, SurfaceStatus};

use crate::app::{Pane, TwinbrotApp};

/// One-line summary of a surface's render state.
pub(crate) fn status_line(status: &SurfaceStatus) -> String {
    let mut parts = vec![status.render_state.as_str().to_string()];
    if let Some(stage) = status.stage {
        parts.push(format!("stage {stage}"));
    }
    if let Some(backend) = status.backend {
        parts.push(backend.to_string());
    }
    parts.push(status.grayscale.as_str().to_string());
    parts.join(" · ")
}

fn pane_title(kind: SurfaceKind) -> &'static str {
    match kind {
        SurfaceKind::Mandelbrot => "Mandelbrot",
        SurfaceKind::Julia => "Julia",
    }
}

impl TwinbrotApp {
    pub(crate) fn show_status_bar(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                pane_status(ui, &self.mandelbrot);
                ui.separator();
                pane_status(ui, &self.julia);
            });
        });
    }
}

fn pane_status(ui: &mut egui::Ui, pane: &Pane) {
    let status = pane.surface.status();
    let view = pane.surface.current_view();

    ui.vertical(|ui| {
        ui.style_mut().spacing.item_spacing.y = 2.0;
        let state_color = match status.render_state {
            RenderState::Idle => egui::Color32::from_rgb(100, 255, 100),
            RenderState::Working => egui::Color32::YELLOW,
        };
        ui.horizontal(|ui| {
            ui.strong(pane_title(pane.kind()));
            ui.colored_label(state_color, status_line(&status));
        });
        ui.horizontal(|ui| {
            ui.label(format!(
                "Center: {:.10} {:+.10}i  Zoom: {:.3e}",
                view.center_x, view.center_y, view.effective_zoom
            ));
            if let Some(c) = pane.cursor {
                ui.label(format!("Cursor: {:.8} {:+.8}i", c.re, c.im));
            }
        });
        if pane.kind() == SurfaceKind::Julia {
            let c = pane.surface.julia_param();
            ui.label(format!("c = {:.10} {:+.10}i", c.re, c.im));
        }
        if let Some(ref error) = status.error {
            ui.colored_label(egui::Color32::from_rgb(255, 90, 90), error);
        } else if let Some(ref notice) = status.notice {
            ui.colored_label(egui::Color32::from_rgb(255, 180, 50), notice);
        }
    });
}
