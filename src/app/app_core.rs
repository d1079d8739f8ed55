use std::path::Path;
use std::time::Instant;

use chrono::Local;
use eframe::{egui, Frame};
use log::{error, info, warn};

use super::state::AppState;
use crate::config::ConfigManager;
use crate::error::SessionError;
use crate::plotter::AccelerationPlot;
use crate::session::SessionController;
use crate::types::RecordSummary;
use crate::utils::timestamped_path;

pub struct SenseLinkApp {
    // 统一的状态管理
    pub state: AppState,

    // 配置管理
    pub config: ConfigManager,

    pub session: SessionController,

    pub plot: AccelerationPlot,
}

impl SenseLinkApp {
    pub fn new(config: ConfigManager) -> Self {
        let app_config = config.get_config();
        let defaults = app_config.default_sensor_config();
        let record_path = timestamped_path(Path::new(&app_config.defaults.record_path), Local::now());

        let state = AppState::new(&defaults, record_path.display().to_string());
        let session = SessionController::new(app_config.session_settings());
        let plot = AccelerationPlot::new(
            defaults.scale.limit(),
            app_config.acquisition.display_horizon_seconds,
        );

        info!("应用启动，等待连接传感器...");

        SenseLinkApp {
            state,
            config,
            session,
            plot,
        }
    }

    pub fn connect(&mut self) {
        let sensor = self.state.connection.to_config();
        self.state.status_message = format!("Connecting to {}...", sensor.port);

        match self.session.connect(&sensor) {
            Ok(()) => {
                self.plot.clear();
                self.plot.set_limit(sensor.scale.limit());
                self.state.status_message = format!("Connected to {}", sensor.port);

                // 记住本次成功的选择
                let defaults = &mut self.config.get_config_mut().defaults;
                defaults.sensor = sensor.kind;
                defaults.scale_g = sensor.scale.g();
                defaults.rate_label = sensor.rate.label().to_string();
                defaults.port = sensor.port.clone();
                if let Err(e) = self.config.save() {
                    warn!("Failed to save configuration: {}", e);
                }
            }
            Err(e) => self.report(e),
        }
    }

    pub fn disconnect(&mut self) {
        if let Some(summary) = self.session.stop_recording() {
            self.recording_finished(summary);
        }
        self.session.disconnect();
        self.plot.clear();
        self.state.status_message = "Disconnected".to_string();
    }

    pub fn start_recording(&mut self) {
        let path = self.state.recording.path.trim().to_string();
        if path.is_empty() {
            self.state.recording.status = "Please enter a file name".to_string();
            return;
        }

        match self.session.start_recording(&path) {
            Ok(()) => self.state.recording.status = format!("Recording to {}", path),
            Err(e) => {
                error!("Failed to start recording: {}", e);
                self.state.recording.status = e.to_string();
            }
        }
    }

    pub fn stop_recording(&mut self) {
        if let Some(summary) = self.session.stop_recording() {
            self.recording_finished(summary);
        }
    }

    fn recording_finished(&mut self, summary: RecordSummary) {
        self.state.recording.status = summary.message();
        // 下一次记录使用新的文件名
        let next = timestamped_path(Path::new(&self.config.get_config().defaults.record_path), Local::now());
        self.state.recording.path = next.display().to_string();
    }

    fn report(&mut self, e: SessionError) {
        error!("Session error ({}): {}", e.stage(), e);
        self.state.status_message = format!("Error: {}", e.stage());
        if e.is_fatal() || matches!(e, SessionError::UnsupportedSensor(_)) {
            self.state.show_error(e.to_string());
        } else {
            self.state.status_message = e.to_string();
        }
    }

    fn handle_tick(&mut self) {
        if let Some(e) = self.session.tick(Instant::now()) {
            self.report(e);
            self.plot.clear();
        }
        // 写入线程退出或链路断开时记录已自动结束
        if let Some(summary) = self.session.take_finished_recording() {
            self.recording_finished(summary);
        }
        if self.session.is_connected() {
            self.plot.set_points(self.session.display_points());
        }
    }
}

impl eframe::App for SenseLinkApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut Frame) {
        // 设置明亮模式主题
        ctx.set_visuals(egui::Visuals::light());

        if ctx.input(|i| i.viewport().close_requested()) {
            info!("Window closing, releasing serial port");
            self.disconnect();
        }

        self.handle_tick();

        // 渲染UI组件
        crate::app::ui::render_status_bar(self, ctx);
        crate::app::ui::render_main_panel(self, ctx);
        crate::app::ui::render_error_window(self, ctx);

        ctx.request_repaint_after(self.session.settings().tick_interval);
    }
}
