use dotenv::dotenv;
use eframe::egui;
use log::{error, info};

use sense_link::app::SenseLinkApp;
use sense_link::config::{ConfigManager, CONFIG_ENV_VAR};
use sense_link::logger;

fn main() {
    dotenv().ok(); // 加载 .env 文件
    logger::init_logger();
    info!("Application starting");

    let config = match ConfigManager::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration ({}): {}", CONFIG_ENV_VAR, e);
            std::process::exit(1);
        }
    };

    let window = config.get_config().window.clone();
    let options = eframe::NativeOptions {
        vsync: window.vsync,
        hardware_acceleration: if window.hardware_acceleration {
            eframe::HardwareAcceleration::Preferred // 硬件加速优先模式
        } else {
            eframe::HardwareAcceleration::Off
        },
        renderer: eframe::Renderer::Glow,
        viewport: egui::ViewportBuilder::default()
            .with_title(window.title.clone())
            .with_inner_size([window.width, window.height])
            .with_resizable(window.resizable),
        ..Default::default()
    };

    if let Err(e) = eframe::run_native(
        &window.title,
        options,
        Box::new(|_cc| Ok(Box::new(SenseLinkApp::new(config)))),
    ) {
        error!("GUI failed: {}", e);
        std::process::exit(1);
    }

    // 串口在 SessionController 析构时释放
    info!("GUI closed, application exiting");
}
