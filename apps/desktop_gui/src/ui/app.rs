use std::time::Duration;

use client_core::{ConnectionState, FormStatus};
use crossbeam_channel::{Receiver, Sender};
use eframe::egui;
use shared::domain::{
    normalize_max_posts, RunConfig, SelectorField, MAX_POSTS_TO_PROCESS, MIN_POSTS_TO_PROCESS,
};

use crate::backend_bridge::commands::BackendCommand;
use crate::controller::{
    events::{UiError, UiErrorCategory, UiErrorContext, UiEvent},
    orchestration::dispatch_backend_command,
    reducer::{finish_start, AdminView, ConsoleView},
};
use crate::ui::log_view;

const USAGE_WARNING: &str = "Your LinkedIn cookies are sensitive data. This app sends them to \
your local server for automation. Do not use this on a public computer. Automating your account \
is against LinkedIn's ToS and carries a risk of account restriction or banning. Use responsibly.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Screen {
    Control,
    Admin,
}

pub struct ControlPanelApp {
    cmd_tx: Sender<BackendCommand>,
    ui_rx: Receiver<UiEvent>,
    screen: Screen,
    console: ConsoleView,
    admin: AdminView,
    cookie_json: String,
    max_posts_input: String,
    auto_comment: bool,
    auto_like: bool,
    api_key_input: String,
    notice: Option<UiError>,
}

impl ControlPanelApp {
    pub fn new(cmd_tx: Sender<BackendCommand>, ui_rx: Receiver<UiEvent>) -> Self {
        let defaults = RunConfig::default();
        Self {
            cmd_tx,
            ui_rx,
            screen: Screen::Control,
            console: ConsoleView::default(),
            admin: AdminView::default(),
            cookie_json: String::new(),
            max_posts_input: defaults.max_posts_to_process.to_string(),
            auto_comment: defaults.auto_comment,
            auto_like: defaults.auto_like,
            api_key_input: String::new(),
            notice: None,
        }
    }

    fn process_ui_events(&mut self) {
        while let Ok(event) = self.ui_rx.try_recv() {
            match event {
                UiEvent::Console(event) => self.console.apply(event),
                UiEvent::ConsoleResync(snapshot) => self.console.resync(snapshot),
                UiEvent::StartFinished(notice) => {
                    if let Some(notice) = finish_start(&mut self.console, notice) {
                        self.notice = Some(notice);
                    }
                }
                UiEvent::Admin(update) => self.admin.apply(update),
                UiEvent::Error(err) => {
                    tracing::warn!(
                        context = ?err.context(),
                        category = ?err.category(),
                        "{}",
                        err.message()
                    );
                    if err.context() == UiErrorContext::Admin {
                        self.admin.request_pending = false;
                    }
                    self.notice = Some(err);
                }
            }
        }
    }

    fn dispatch(&mut self, cmd: BackendCommand) -> bool {
        match dispatch_backend_command(&self.cmd_tx, cmd) {
            Ok(()) => true,
            Err(err) => {
                self.notice = Some(err);
                false
            }
        }
    }

    fn submit_start(&mut self) {
        let config = RunConfig {
            auto_comment: self.auto_comment,
            auto_like: self.auto_like,
            cookie_json: self.cookie_json.clone(),
            ..RunConfig::default()
        }
        .with_max_posts_input(&self.max_posts_input);
        self.max_posts_input = config.max_posts_to_process.to_string();
        self.notice = None;

        if self.dispatch(BackendCommand::StartRun(config)) {
            self.console.start_pending = true;
        }
    }

    fn submit_unlock(&mut self) {
        let api_key = std::mem::take(&mut self.api_key_input);
        if self.dispatch(BackendCommand::Unlock { api_key }) {
            self.admin.request_pending = true;
        }
    }

    fn submit_admin(&mut self, cmd: BackendCommand) {
        if self.dispatch(cmd) {
            self.admin.request_pending = true;
        }
    }

    fn show_nav(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::top("nav").show(ctx, |ui| {
            ui.add_space(6.0);
            ui.horizontal(|ui| {
                ui.heading("LinkedIn Agent");
                ui.separator();
                ui.selectable_value(&mut self.screen, Screen::Control, "Control Panel");
                ui.selectable_value(&mut self.screen, Screen::Admin, "Admin");
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    ui.label(egui::RichText::new(&self.console.status).weak());
                    ui.label(egui::RichText::new("●").color(connection_color(self.console.state)));
                });
            });
            ui.add_space(4.0);
        });
    }

    fn show_notice(&mut self, ui: &mut egui::Ui) {
        let Some(notice) = &self.notice else {
            return;
        };
        let color = match notice.category() {
            UiErrorCategory::Validation => egui::Color32::from_rgb(202, 138, 4),
            UiErrorCategory::Auth | UiErrorCategory::Transport => {
                egui::Color32::from_rgb(220, 38, 38)
            }
        };
        let mut dismissed = false;
        egui::Frame::NONE
            .fill(color.gamma_multiply(0.12))
            .stroke(egui::Stroke::new(1.0, color))
            .corner_radius(6.0)
            .inner_margin(egui::Margin::symmetric(10, 8))
            .show(ui, |ui| {
                ui.horizontal_wrapped(|ui| {
                    ui.label(egui::RichText::new(notice.message()).color(color));
                    if ui.small_button("Dismiss").clicked() {
                        dismissed = true;
                    }
                });
            });
        if dismissed {
            self.notice = None;
        }
        ui.add_space(8.0);
    }

    fn show_control_screen(&mut self, ctx: &egui::Context) {
        egui::CentralPanel::default().show(ctx, |ui| {
            self.show_notice(ui);

            let amber = egui::Color32::from_rgb(161, 98, 7);
            egui::Frame::NONE
                .fill(egui::Color32::from_rgb(254, 252, 232))
                .stroke(egui::Stroke::new(1.0, egui::Color32::from_rgb(250, 204, 21)))
                .corner_radius(6.0)
                .inner_margin(egui::Margin::symmetric(12, 10))
                .show(ui, |ui| {
                    ui.horizontal_wrapped(|ui| {
                        ui.label(
                            egui::RichText::new("Security & Usage Warning:")
                                .strong()
                                .color(amber),
                        );
                        ui.label(egui::RichText::new(USAGE_WARNING).color(amber));
                    });
                });
            ui.add_space(10.0);

            ui.columns(2, |columns| {
                self.show_controls(&mut columns[0]);
                columns[1].heading("Live Activity Log");
                columns[1].add_space(6.0);
                log_view::show_log(&mut columns[1], &self.console.logs);
            });
        });
    }

    fn show_controls(&mut self, ui: &mut egui::Ui) {
        let running = self.console.is_running();
        ui.heading("Controls");
        ui.add_space(8.0);

        ui.label("LinkedIn Cookie JSON");
        ui.add_enabled(
            !running,
            egui::TextEdit::multiline(&mut self.cookie_json)
                .hint_text("Paste your exported cookie JSON here...")
                .code_editor()
                .desired_rows(10)
                .desired_width(f32::INFINITY),
        );
        ui.add_space(8.0);

        ui.label(format!(
            "Max Posts to Process ({MIN_POSTS_TO_PROCESS}-{MAX_POSTS_TO_PROCESS})"
        ));
        let max_posts = ui.add_enabled(
            !running,
            egui::TextEdit::singleline(&mut self.max_posts_input).desired_width(80.0),
        );
        if max_posts.lost_focus() {
            self.max_posts_input = normalize_max_posts(&self.max_posts_input).to_string();
        }
        ui.add_space(8.0);

        ui.add_enabled(
            !running,
            egui::Checkbox::new(&mut self.auto_comment, "Auto-Comment"),
        );
        ui.add_enabled(!running, egui::Checkbox::new(&mut self.auto_like, "Auto-Like"));
        ui.add_space(12.0);

        let can_start = self.console.can_start(&self.cookie_json);
        ui.horizontal(|ui| {
            if running || self.console.start_pending {
                ui.add_enabled(false, egui::Button::new("Running..."));
                ui.spinner();
            } else if ui
                .add_enabled(can_start, egui::Button::new("Start Agent"))
                .clicked()
            {
                self.submit_start();
            }
        });
        if self.console.state == ConnectionState::Disconnected {
            ui.add_space(6.0);
            ui.weak("The run stream is closed. Restart the control panel to reconnect.");
        }
    }

    fn show_admin_screen(&mut self, ctx: &egui::Context) {
        egui::CentralPanel::default().show(ctx, |ui| {
            self.show_notice(ui);
            if self.admin.authenticated {
                self.show_selector_form(ui);
            } else {
                self.show_unlock_card(ui);
            }
        });
    }

    fn show_unlock_card(&mut self, ui: &mut egui::Ui) {
        ui.vertical_centered(|ui| {
            ui.set_max_width(420.0);
            ui.add_space(40.0);
            ui.heading("Admin Access");
            ui.add_space(12.0);
            show_form_status(ui, &self.admin);

            ui.label("Admin API Key");
            let key_field = ui.add(
                egui::TextEdit::singleline(&mut self.api_key_input)
                    .password(true)
                    .desired_width(f32::INFINITY),
            );
            let submitted =
                key_field.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter));
            ui.add_space(8.0);
            let clicked = ui
                .add_enabled(
                    !self.admin.request_pending && !self.api_key_input.trim().is_empty(),
                    egui::Button::new("Unlock"),
                )
                .clicked();
            if (clicked || submitted) && !self.admin.request_pending {
                self.submit_unlock();
            }
        });
    }

    fn show_selector_form(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            ui.heading("Admin Panel: Update Selectors");
            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                if ui.button("Lock").clicked() {
                    self.submit_admin(BackendCommand::Lock);
                }
                if ui
                    .add_enabled(!self.admin.request_pending, egui::Button::new("Reload"))
                    .clicked()
                {
                    self.submit_admin(BackendCommand::ReloadSelectors);
                }
            });
        });
        ui.weak(
            "Update the CSS selectors used by the automation agent. When the agent runs, \
             it will fetch these values from the database.",
        );
        ui.add_space(10.0);

        egui::Grid::new("selector_grid")
            .num_columns(2)
            .spacing([12.0, 8.0])
            .show(ui, |ui| {
                for field in SelectorField::ALL {
                    ui.label(field.label());
                    ui.add(
                        egui::TextEdit::singleline(self.admin.selectors.get_mut(field))
                            .code_editor()
                            .desired_width(420.0),
                    );
                    ui.end_row();
                }
            });
        ui.add_space(12.0);

        ui.horizontal(|ui| {
            let saving = self.admin.request_pending || self.admin.form.status == FormStatus::Loading;
            let label = if saving { "Saving..." } else { "Save Selectors" };
            if ui
                .add_enabled(!saving, egui::Button::new(label))
                .clicked()
            {
                let edits = self.admin.selectors.clone();
                self.submit_admin(BackendCommand::SaveSelectors(edits));
            }
            show_form_status(ui, &self.admin);
        });
    }
}

fn show_form_status(ui: &mut egui::Ui, admin: &AdminView) {
    let color = match admin.form.status {
        FormStatus::Idle => return,
        FormStatus::Loading => ui.visuals().weak_text_color(),
        FormStatus::Success => egui::Color32::from_rgb(22, 163, 74),
        FormStatus::Error => egui::Color32::from_rgb(220, 38, 38),
    };
    ui.label(egui::RichText::new(&admin.form.message).color(color));
}

fn connection_color(state: ConnectionState) -> egui::Color32 {
    match state {
        ConnectionState::Disconnected => egui::Color32::from_rgb(220, 38, 38),
        ConnectionState::Connecting => egui::Color32::from_rgb(202, 138, 4),
        ConnectionState::Idle => egui::Color32::from_rgb(22, 163, 74),
        ConnectionState::Running => egui::Color32::from_rgb(56, 189, 248),
    }
}

impl eframe::App for ControlPanelApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.process_ui_events();
        self.show_nav(ctx);

        match self.screen {
            Screen::Control => self.show_control_screen(ctx),
            Screen::Admin => self.show_admin_screen(ctx),
        }

        if self.console.is_running() || self.console.start_pending || self.admin.request_pending {
            ctx.request_repaint_after(Duration::from_millis(16));
        } else {
            ctx.request_repaint_after(Duration::from_millis(100));
        }
    }
}
