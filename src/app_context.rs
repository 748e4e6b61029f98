use egui::{CentralPanel, Color32, Context, Rect, Sense, TopBottomPanel, Ui, vec2};
use eframe::Frame;
use tracing::warn;

use crate::engine::{EngineMessage, KickEngine};
use crate::kick_detector::Direction;
use crate::session::DisplayFrame;
use crate::settings::Settings;

/// Acceleration (m/s²) that fills half a bar.
const DISPLAY_RANGE: f64 = 20.0;

pub struct AppContext {
    engine: KickEngine,
    overlay: Overlay,
    running: bool,
    frame: DisplayFrame,
    left_kicks: u32,
    right_kicks: u32,
}

enum Overlay {
    Hidden,
    Prompt(String),
    Error(String),
}

impl AppContext {
    pub fn new(settings: Settings) -> Self {
        Self {
            engine: KickEngine::new(settings),
            overlay: Overlay::Prompt("click to start".into()),
            running: false,
            frame: DisplayFrame::default(),
            left_kicks: 0,
            right_kicks: 0,
        }
    }

    fn start(&mut self) {
        self.overlay = Overlay::Prompt("checking for motion sensors...".into());
        if let Err(error) = self.engine.start() {
            warn!(%error, "could not reach kick engine");
            self.overlay = Overlay::Error(format!("engine not available: {}", error));
        }
    }

    fn handle_message(&mut self, message: EngineMessage) {
        match message {
            EngineMessage::Starting => {
                self.running = false;
                self.frame = DisplayFrame::default();
                self.left_kicks = 0;
                self.right_kicks = 0;
            }
            EngineMessage::Started => {
                self.running = true;
                self.overlay = Overlay::Hidden;
            }
            EngineMessage::StartFailed(reason) => {
                self.running = false;
                self.overlay = Overlay::Error(reason);
            }
            EngineMessage::Frame(frame) => self.frame = frame,
            EngineMessage::Kick(kick) => match kick.direction {
                Direction::Left => self.left_kicks += 1,
                Direction::Right => self.right_kicks += 1,
            },
            EngineMessage::Stopped => {
                self.running = false;
                self.overlay = Overlay::Prompt("motion stream stopped, click to restart".into());
            }
        }
    }

    fn draw_overlay(&mut self, ui: &mut Ui) {
        let (text, color) = match &self.overlay {
            Overlay::Hidden => return,
            Overlay::Prompt(text) => (text.clone(), ui.visuals().text_color()),
            Overlay::Error(text) => (text.clone(), Color32::RED),
        };

        let response = ui.allocate_response(ui.available_size(), Sense::click());
        ui.painter().text(
            response.rect.center(),
            egui::Align2::CENTER_CENTER,
            text,
            egui::FontId::proportional(20.0),
            color,
        );

        if response.clicked() {
            self.start();
        }
    }

    fn draw_meters(&mut self, ui: &mut Ui) {
        ui.vertical(|ui| {
            draw_meter(ui, "Acceleration", self.frame.current);
            ui.add_space(10.0);
            draw_meter(ui, "Left peak", self.frame.left_peak);
            ui.add_space(10.0);
            draw_meter(ui, "Right peak", self.frame.right_peak);
            ui.add_space(20.0);

            ui.horizontal(|ui| {
                ui.label(format!("Left kicks: {}", self.left_kicks));
                ui.add_space(20.0);
                ui.label(format!("Right kicks: {}", self.right_kicks));
            });

            ui.add_space(10.0);

            ui.horizontal(|ui| {
                if ui.button("Restart").clicked() {
                    self.start();
                }
                if ui.button("Stop").clicked() {
                    if let Err(error) = self.engine.stop() {
                        warn!(%error, "could not reach kick engine");
                    }
                }
            });
        });
    }
}

impl eframe::App for AppContext {
    fn update(&mut self, ctx: &Context, _frame: &mut Frame) {
        while let Some(message) = self.engine.fetch_message() {
            self.handle_message(message);
        }

        TopBottomPanel::top("title_bar").show(ctx, |ui| {
            ui.heading("KickBox");
        });

        CentralPanel::default().show(ctx, |ui| {
            if self.running {
                self.draw_meters(ui);
            } else {
                self.draw_overlay(ui);
            }
        });

        ctx.request_repaint();
    }
}

fn draw_meter(ui: &mut Ui, label: &str, value: f64) {
    ui.horizontal(|ui| {
        ui.label(label);
        ui.label(format!("{:.2}", value));
    });

    let (rect, _) = ui.allocate_exact_size(vec2(ui.available_width(), 16.0), Sense::hover());
    let painter = ui.painter();
    painter.rect_filled(rect, 2.0, ui.visuals().extreme_bg_color);

    let (left, width) = bi_bar_span(value / DISPLAY_RANGE);
    let bar = Rect::from_min_size(
        rect.min + vec2(rect.width() * left as f32, 0.0),
        vec2(rect.width() * width as f32, rect.height()),
    );
    painter.rect_filled(bar, 2.0, Color32::from_rgb(80, 160, 240));

    let center = rect.center().x;
    painter.line_segment(
        [egui::pos2(center, rect.top()), egui::pos2(center, rect.bottom())],
        egui::Stroke::new(1.0, ui.visuals().text_color()),
    );
}

/// Start offset and width of a bar growing from the centre, as fractions of
/// the full width, for `value` in [-1, 1].
fn bi_bar_span(value: f64) -> (f64, f64) {
    let value = value.clamp(-1.0, 1.0);
    if value >= 0.0 {
        (0.5, 0.5 * value)
    } else {
        (0.5 * (1.0 + value), 0.5 * -value)
    }
}
