use eframe::egui;
use crate::app::app_core::SenseLinkApp;

pub fn render_error_window(app: &mut SenseLinkApp, ctx: &egui::Context) {
    let Some(message) = app.state.error_popup.clone() else {
        return;
    };

    egui::Window::new("Connection Error")
        .collapsible(false)
        .resizable(false)
        .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
        .show(ctx, |ui| {
            ui.colored_label(egui::Color32::from_rgb(200, 0, 0), message);
            ui.add_space(10.0);
            ui.label("The serial port has been released. Check the device and connect again.");
            ui.add_space(10.0);
            if ui.button("OK").clicked() {
                app.state.dismiss_error();
            }
        });
}
