use egui::Color32;
use egui_plot::{Legend, Line, Plot, PlotBounds, PlotPoints};

use crate::config::PlotConfig;
use crate::types::DisplayPoint;

/// 格式化数字为固定宽度的 y 轴标签
fn format_fixed_width_y_label(value: f64) -> String {
    if value.abs() >= 10.0 {
        format!("{:+6.1}", value)
    } else {
        format!("{:+6.2}", value)
    }
}

fn color(rgb: [u8; 3]) -> Color32 {
    Color32::from_rgb(rgb[0], rgb[1], rgb[2])
}

/// 实时加速度曲线，x 轴为会话时间，y 轴固定为 ±量程
#[derive(Debug, Clone)]
pub struct AccelerationPlot {
    points: Vec<DisplayPoint>,
    limit: f64,
    horizon_seconds: f64,
}

impl AccelerationPlot {
    pub fn new(limit: f64, horizon_seconds: f64) -> Self {
        Self {
            points: Vec::new(),
            limit,
            horizon_seconds,
        }
    }

    /// 整体替换显示数据
    pub fn set_points(&mut self, points: Vec<DisplayPoint>) {
        self.points = points;
    }

    pub fn set_limit(&mut self, limit: f64) {
        self.limit = limit;
    }

    pub fn clear(&mut self) {
        self.points.clear();
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// 当前显示的时间范围，最新点在右边缘
    pub fn x_bounds(&self) -> (f64, f64) {
        let end = self
            .points
            .last()
            .map(|p| p.time)
            .unwrap_or(0.0)
            .max(self.horizon_seconds);
        (end - self.horizon_seconds, end)
    }

    fn axis_points(&self, axis: impl Fn(&DisplayPoint) -> f64) -> PlotPoints<'static> {
        self.points.iter().map(|p| [p.time, axis(p)]).collect::<Vec<[f64; 2]>>().into()
    }

    pub fn ui(&self, ui: &mut egui::Ui, config: &PlotConfig) {
        let (x_min, x_max) = self.x_bounds();
        let limit = self.limit;

        let mut plot = Plot::new("acceleration")
            .height(config.plot_height)
            .x_axis_formatter(|v, _| format!("{:.1}s", v.value))
            .y_axis_formatter(|v, _| format_fixed_width_y_label(v.value))
            .allow_drag(config.allow_drag)
            .allow_zoom(config.allow_zoom)
            .allow_scroll(false);
        if config.show_legend {
            plot = plot.legend(Legend::default());
        }

        plot.show(ui, |plot_ui| {
            plot_ui.set_plot_bounds(PlotBounds::from_min_max([x_min, -limit], [x_max, limit]));

            if self.points.is_empty() {
                return;
            }

            plot_ui.line(
                Line::new("X", self.axis_points(|p| p.x))
                    .color(color(config.colors.x_axis))
                    .width(config.line_width),
            );
            plot_ui.line(
                Line::new("Y", self.axis_points(|p| p.y))
                    .color(color(config.colors.y_axis))
                    .width(config.line_width),
            );
            plot_ui.line(
                Line::new("Z", self.axis_points(|p| p.z))
                    .color(color(config.colors.z_axis))
                    .width(config.line_width),
            );
        });
    }
}
