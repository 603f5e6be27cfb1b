use crate::config::{APP_VERSION, Rgb, VizConfig};
use crate::metadata::NowPlaying;
use crate::render::{self, FramePlan};
use crate::settings::{self, SettingsDraft};
use crate::state::{RedrawSignal, SharedViz, lock_or_recover};
use eframe::egui;
use log::debug;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

fn color32(c: Rgb) -> egui::Color32 {
    egui::Color32::from_rgb(c.r, c.g, c.b)
}

/// Window level for the overlay: pinned above everything, or pushed
/// down to desktop-widget depth.
pub fn window_level(config: &VizConfig) -> egui::WindowLevel {
    if config.top_most {
        egui::WindowLevel::AlwaysOnTop
    } else {
        egui::WindowLevel::AlwaysOnBottom
    }
}

/// The eframe host for the overlay surface and its settings form.
///
/// All pipeline decisions live in the core modules; this type snapshots
/// shared state, paints the composed frame, and forwards form input to
/// the settings apply path.
pub struct OverlayApp {
    shared: SharedViz,
    now_playing: Arc<Mutex<NowPlaying>>,
    redraw: Arc<RedrawSignal>,
    settings_path: PathBuf,
    settings_open: bool,
    draft: SettingsDraft,
    apply_acknowledged: bool,
    // placement commands to send on the next frame
    pending_placement: Option<VizConfig>,
    // last passthrough state sent, to avoid re-sending every frame
    passthrough: Option<bool>,
}

impl eframe::App for OverlayApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.redraw.take();
        self.apply_pending_placement(ctx);
        self.sync_passthrough(ctx);
        self.handle_shortcuts(ctx);

        let plan = self.compose_frame(ctx);
        self.paint(ctx, &plan);
        self.show_settings_window(ctx);
    }
}

impl OverlayApp {
    pub fn new(
        cc: &eframe::CreationContext<'_>,
        shared: SharedViz,
        now_playing: Arc<Mutex<NowPlaying>>,
        redraw: Arc<RedrawSignal>,
        settings_path: PathBuf,
    ) -> Self {
        debug!("Initializing overlay state...");
        let ctx = cc.egui_ctx.clone();
        redraw.install_waker(move || ctx.request_repaint());

        let config = lock_or_recover(&shared).config.clone();
        let draft = SettingsDraft::from_config(&config);
        Self {
            shared,
            now_playing,
            redraw,
            settings_path,
            settings_open: false,
            draft,
            apply_acknowledged: false,
            pending_placement: Some(config),
            passthrough: None,
        }
    }

    /// Snapshot shared state under short locks, then lay the frame out
    /// without holding any lock.
    fn compose_frame(&self, ctx: &egui::Context) -> FramePlan {
        let rect = ctx.screen_rect();
        let (config, heights) = {
            let state = lock_or_recover(&self.shared);
            (state.config.clone(), state.bars.heights().to_vec())
        };
        let line = lock_or_recover(&self.now_playing).line();
        render::compose(
            rect.width() as i32,
            rect.height() as i32,
            &config,
            &heights,
            line,
        )
    }

    fn paint(&self, ctx: &egui::Context, plan: &FramePlan) {
        egui::CentralPanel::default()
            .frame(
                egui::Frame::default()
                    .fill(color32(plan.background))
                    .inner_margin(0.0),
            )
            .show(ctx, |ui| {
                let painter = ui.painter();
                for bar in &plan.bars {
                    if bar.h <= 0 {
                        continue;
                    }
                    let rect = egui::Rect::from_min_size(
                        egui::pos2(bar.x as f32, bar.y as f32),
                        egui::vec2(bar.w as f32, bar.h as f32),
                    );
                    painter.rect_filled(rect, egui::CornerRadius::ZERO, color32(plan.bar_color));
                }
                if let Some(text) = &plan.text {
                    painter.text(
                        egui::pos2(text.center_x as f32, text.baseline_y as f32),
                        egui::Align2::CENTER_BOTTOM,
                        &text.content,
                        egui::FontId::monospace(18.0),
                        color32(text.color),
                    );
                }
            });
    }

    fn apply_pending_placement(&mut self, ctx: &egui::Context) {
        let Some(config) = self.pending_placement.take() else {
            return;
        };
        ctx.send_viewport_cmd(egui::ViewportCommand::OuterPosition(egui::pos2(
            config.window_pos_x as f32,
            config.window_pos_y as f32,
        )));
        ctx.send_viewport_cmd(egui::ViewportCommand::InnerSize(egui::vec2(
            config.window_width as f32,
            config.window_height as f32,
        )));
        ctx.send_viewport_cmd(egui::ViewportCommand::WindowLevel(window_level(&config)));
    }

    /// Clicks fall through to the desktop while the overlay is
    /// unfocused; focusing it (taskbar or Alt-Tab) makes it clickable
    /// so the settings form can be reached.
    fn sync_passthrough(&mut self, ctx: &egui::Context) {
        let focused = ctx.input(|i| i.viewport().focused.unwrap_or(true));
        let wanted = !focused && !self.settings_open;
        if self.passthrough != Some(wanted) {
            ctx.send_viewport_cmd(egui::ViewportCommand::MousePassthrough(wanted));
            self.passthrough = Some(wanted);
        }
    }

    fn handle_shortcuts(&mut self, ctx: &egui::Context) {
        let open_requested = ctx
            .input(|i| i.pointer.secondary_clicked() || i.key_pressed(egui::Key::S));
        if open_requested && !self.settings_open {
            self.draft = SettingsDraft::from_config(&lock_or_recover(&self.shared).config);
            self.apply_acknowledged = false;
            self.settings_open = true;
            debug!("Settings window opened");
        }
        if ctx.input(|i| i.key_pressed(egui::Key::Escape)) {
            ctx.send_viewport_cmd(egui::ViewportCommand::Close);
        }
    }

    fn apply_disabled(&self) -> bool {
        self.draft == SettingsDraft::from_config(&lock_or_recover(&self.shared).config)
    }

    fn show_settings_window(&mut self, ctx: &egui::Context) {
        if !self.settings_open {
            return;
        }
        let viewport_id = egui::ViewportId::from_hash_of("loopbars_settings");

        ctx.show_viewport_immediate(
            viewport_id,
            egui::ViewportBuilder::default()
                .with_title(format!("loopbars {APP_VERSION} settings"))
                .with_inner_size([320.0, 420.0])
                .with_resizable(false),
            |ctx, _class| {
                if ctx.input(|i| i.viewport().close_requested()) {
                    self.settings_open = false;
                }
                egui::CentralPanel::default().show(ctx, |ui| {
                    self.settings_form(ui);
                });
            },
        );
    }

    fn settings_form(&mut self, ui: &mut egui::Ui) {
        ui.add_space(4.0);
        egui::Grid::new("settings_grid")
            .num_columns(2)
            .spacing([16.0, 6.0])
            .show(ui, |ui| {
                ui.label("Sensitivity:");
                ui.text_edit_singleline(&mut self.draft.sensitivity);
                ui.end_row();

                ui.label("Bar width multiplier:");
                ui.text_edit_singleline(&mut self.draft.bar_width_multiplier);
                ui.end_row();

                ui.label("Bar spread:");
                ui.text_edit_singleline(&mut self.draft.bar_spread);
                ui.end_row();

                ui.label("Bar count:");
                ui.text_edit_singleline(&mut self.draft.bar_count);
                ui.end_row();

                ui.label("Bar color:");
                ui.text_edit_singleline(&mut self.draft.bar_color);
                ui.end_row();

                ui.label("Text color:");
                ui.text_edit_singleline(&mut self.draft.text_color);
                ui.end_row();

                ui.label("Window position X:");
                ui.text_edit_singleline(&mut self.draft.window_pos_x);
                ui.end_row();

                ui.label("Window position Y:");
                ui.text_edit_singleline(&mut self.draft.window_pos_y);
                ui.end_row();

                ui.label("Window width:");
                ui.text_edit_singleline(&mut self.draft.window_width);
                ui.end_row();

                ui.label("Window height:");
                ui.text_edit_singleline(&mut self.draft.window_height);
                ui.end_row();

                ui.label("Always on top:");
                ui.checkbox(&mut self.draft.top_most, "");
                ui.end_row();
            });

        ui.add_space(8.0);
        ui.horizontal(|ui| {
            let apply_enabled = !self.apply_disabled();
            if apply_enabled {
                if ui.button("Apply").clicked() {
                    let applied = settings::apply_and_store(
                        &self.shared,
                        &self.draft,
                        &self.settings_path,
                        &self.redraw,
                    );
                    self.draft = SettingsDraft::from_config(&applied);
                    self.pending_placement = Some(applied);
                    self.apply_acknowledged = true;
                }
            } else {
                ui.add_enabled(false, egui::Button::new("Apply"));
            }

            if ui.button("Reset to defaults").clicked() {
                self.draft = SettingsDraft::from_config(&VizConfig::default());
                self.apply_acknowledged = false;
            }
        });

        if self.apply_acknowledged {
            ui.add_space(4.0);
            ui.colored_label(egui::Color32::GREEN, "Settings applied");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn top_most_flag_picks_the_window_level() {
        let mut config = VizConfig::default();
        assert!(matches!(
            window_level(&config),
            egui::WindowLevel::AlwaysOnBottom
        ));
        config.top_most = true;
        assert!(matches!(
            window_level(&config),
            egui::WindowLevel::AlwaysOnTop
        ));
    }
}
