use eframe::egui;
use crate::app::app_core::SenseLinkApp;
use crate::protocol::ProtocolState;
use crate::utils::format_elapsed;

pub fn render_status_bar(app: &mut SenseLinkApp, ctx: &egui::Context) {
    egui::TopBottomPanel::top("status_bar")
        .min_height(40.0)
        .show(ctx, |ui| {
            ui.add_space(5.0);
            ui.horizontal(|ui| {
                ui.label("Status:");

                let state = app.session.state();
                let status_color = match state {
                    ProtocolState::Streaming => egui::Color32::from_rgb(0, 150, 0), // 绿色
                    ProtocolState::Failed(_) => egui::Color32::from_rgb(150, 0, 0), // 红色
                    ProtocolState::Idle => egui::Color32::GRAY,
                    _ => egui::Color32::from_rgb(255, 165, 0), // 橙色
                };
                ui.colored_label(status_color, state.to_string());

                ui.separator();
                ui.label(&app.state.status_message);

                if let Some(config) = app.session.config() {
                    ui.separator();
                    ui.label(format!("ODR: {}", config.rate));
                    ui.separator();
                    ui.label(format!("Range: ±{}g", config.scale));
                }

                if let Some(aggregator) = app.session.aggregator() {
                    ui.separator();
                    ui.label(format!("Decimation: 1/{}", aggregator.factor()));
                    ui.separator();
                    ui.label(format!(
                        "Window: {:.1}s ({} pts)",
                        aggregator.window().horizon().as_secs_f64(),
                        aggregator.window().len()
                    ));
                }

                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    if let Some(elapsed) = app.session.elapsed() {
                        ui.label(format_elapsed(elapsed));
                    }
                    if app.session.is_recording() {
                        ui.colored_label(egui::Color32::from_rgb(200, 0, 0), "● REC");
                    }
                });
            });
            ui.add_space(5.0);
        });

    render_bottom_status_bar(app, ctx);
}

fn render_bottom_status_bar(app: &SenseLinkApp, ctx: &egui::Context) {
    egui::TopBottomPanel::bottom("bottom_status_bar")
        .min_height(25.0)
        .show(ctx, |ui| {
            ui.add_space(3.0);
            ui.horizontal(|ui| {
                match app.session.stats() {
                    Some(stats) => {
                        ui.label(format!("Samples: {}", stats.published()));
                        ui.separator();
                        ui.label(format!("Malformed: {}", stats.malformed()));
                        ui.separator();
                        ui.label(format!("Dropped: {}", stats.dropped()));
                    }
                    None => {
                        ui.label("No active session");
                    }
                }

                if let Some(aggregator) = app.session.aggregator() {
                    ui.separator();
                    ui.label(format!("Out of range: {}", aggregator.rejected()));
                    if let Some(latest) = aggregator.window().last() {
                        ui.separator();
                        ui.label(format!("Latest: {:+.3} {:+.3} {:+.3}", latest.x, latest.y, latest.z));
                    }
                }

                // 右侧：记录状态
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    if !app.state.recording.status.is_empty() {
                        ui.colored_label(egui::Color32::from_rgb(0, 100, 200), &app.state.recording.status);
                    }
                });
            });
            ui.add_space(3.0);
        });
}
