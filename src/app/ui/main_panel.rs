use eframe::egui;
use crate::app::app_core::SenseLinkApp;
use crate::types::{OutputRate, ScaleRange, SensorKind};

pub fn render_main_panel(app: &mut SenseLinkApp, ctx: &egui::Context) {
    egui::CentralPanel::default().show(ctx, |ui| {
        render_connection_row(app, ui);
        ui.add_space(5.0);
        render_recording_row(app, ui);
        ui.add_space(10.0);

        app.plot.ui(ui, &app.config.get_config().plot);
    });
}

fn render_connection_row(app: &mut SenseLinkApp, ui: &mut egui::Ui) {
    let connected = app.session.is_connected();

    ui.horizontal(|ui| {
        // 连接期间锁定参数
        ui.add_enabled_ui(!connected, |ui| {
            let form = &mut app.state.connection;

            ui.label("Sensor:");
            egui::ComboBox::from_id_salt("sensor_kind")
                .selected_text(form.sensor.name())
                .show_ui(ui, |ui| {
                    for kind in SensorKind::ALL {
                        ui.selectable_value(&mut form.sensor, kind, kind.name());
                    }
                });

            ui.label("Range:");
            egui::ComboBox::from_id_salt("scale_range")
                .selected_text(format!("±{}g", form.scale))
                .show_ui(ui, |ui| {
                    for scale in ScaleRange::ALL {
                        ui.selectable_value(&mut form.scale, scale, format!("±{}g", scale));
                    }
                });

            ui.label("ODR:");
            egui::ComboBox::from_id_salt("output_rate")
                .selected_text(form.rate.to_string())
                .show_ui(ui, |ui| {
                    for rate in OutputRate::ALL {
                        ui.selectable_value(&mut form.rate, rate, rate.to_string());
                    }
                });

            ui.label("Port:");
            ui.add(egui::TextEdit::singleline(&mut form.port)
                .desired_width(140.0)
                .hint_text("/dev/ttyACM0"));
        });

        ui.separator();

        if connected {
            if ui.button("⏹ Disconnect").clicked() {
                app.disconnect();
            }
        } else if ui.button("🔌 Connect").clicked() {
            app.connect();
        }
    });
}

fn render_recording_row(app: &mut SenseLinkApp, ui: &mut egui::Ui) {
    let connected = app.session.is_connected();
    let recording = app.session.is_recording();

    ui.horizontal(|ui| {
        ui.label("Record to:");
        ui.add_enabled(
            !recording,
            egui::TextEdit::singleline(&mut app.state.recording.path)
                .desired_width(260.0)
                .hint_text("data.csv"),
        );

        if recording {
            if ui.button("⏹ Stop Recording").clicked() {
                app.stop_recording();
            }
        } else if ui.add_enabled(connected, egui::Button::new("⏺ Start Recording")).clicked() {
            app.start_recording();
        }
    });
}
