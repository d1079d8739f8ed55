pub mod status_bar;
pub mod main_panel;
pub mod error_window;

pub use status_bar::render_status_bar;
pub use main_panel::render_main_panel;
pub use error_window::render_error_window;
