//! Live activity log rendering.

use chrono::Local;
use eframe::egui;
use shared::domain::{LogEntry, LogKind};

const MUTED: egui::Color32 = egui::Color32::from_rgb(156, 163, 175);
const SKY: egui::Color32 = egui::Color32::from_rgb(56, 189, 248);
const BLUE: egui::Color32 = egui::Color32::from_rgb(96, 165, 250);
const GREEN: egui::Color32 = egui::Color32::from_rgb(74, 222, 128);
const INDIGO: egui::Color32 = egui::Color32::from_rgb(165, 180, 252);
const RED: egui::Color32 = egui::Color32::from_rgb(248, 113, 113);
const TEXT: egui::Color32 = egui::Color32::from_rgb(243, 244, 246);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryStyle {
    pub label: Option<&'static str>,
    pub accent: egui::Color32,
    pub italic: bool,
    /// Result and summary entries render as an accented card.
    pub boxed: bool,
}

pub fn entry_style(entry: &LogEntry) -> EntryStyle {
    let plain = |accent| EntryStyle {
        label: None,
        accent,
        italic: false,
        boxed: false,
    };
    match entry.kind {
        LogKind::Status => EntryStyle {
            italic: true,
            ..plain(MUTED)
        },
        LogKind::Log => plain(SKY),
        LogKind::Result if entry.dry_run => EntryStyle {
            label: Some("Dry Run:"),
            boxed: true,
            ..plain(BLUE)
        },
        LogKind::Result => EntryStyle {
            label: Some("Success:"),
            boxed: true,
            ..plain(GREEN)
        },
        LogKind::Summary => EntryStyle {
            label: Some("Summary:"),
            boxed: true,
            ..plain(INDIGO)
        },
        LogKind::Error => EntryStyle {
            label: Some("Error:"),
            ..plain(RED)
        },
    }
}

pub fn show_log(ui: &mut egui::Ui, logs: &[LogEntry]) {
    egui::Frame::NONE
        .fill(egui::Color32::from_rgb(17, 24, 39))
        .corner_radius(8.0)
        .inner_margin(egui::Margin::symmetric(12, 10))
        .show(ui, |ui| {
            ui.set_min_height(ui.available_height());
            egui::ScrollArea::vertical()
                .auto_shrink([false, false])
                .stick_to_bottom(true)
                .show(ui, |ui| {
                    if logs.is_empty() {
                        ui.label(
                            egui::RichText::new("Agent output will appear here...")
                                .color(MUTED)
                                .monospace(),
                        );
                    }
                    for entry in logs {
                        show_entry(ui, entry);
                    }
                });
        });
}

fn show_entry(ui: &mut egui::Ui, entry: &LogEntry) {
    let style = entry_style(entry);
    let time = entry.received_at.with_timezone(&Local).format("%H:%M:%S");

    let body = |ui: &mut egui::Ui| {
        ui.horizontal_wrapped(|ui| {
            ui.label(egui::RichText::new(time.to_string()).color(MUTED).monospace());
            if let Some(label) = style.label {
                ui.label(egui::RichText::new(label).color(style.accent).strong());
            }
            match entry.kind {
                LogKind::Status => {
                    let mut text = egui::RichText::new(format!("-- {}", entry.message))
                        .color(style.accent)
                        .monospace();
                    if style.italic {
                        text = text.italics();
                    }
                    ui.label(text);
                }
                LogKind::Summary => {}
                LogKind::Log => {
                    ui.label(egui::RichText::new(&entry.message).color(style.accent).monospace());
                }
                _ => {
                    ui.label(egui::RichText::new(&entry.message).color(TEXT).monospace());
                }
            }
        });
        if entry.kind == LogKind::Summary {
            ui.indent(("summary", entry.id), |ui| {
                ui.label(egui::RichText::new(&entry.message).color(TEXT));
            });
        }
        if let Some(comment) = &entry.comment {
            ui.indent(("comment", entry.id), |ui| {
                ui.label(egui::RichText::new(format!("\"{comment}\"")).color(MUTED).italics());
            });
        }
    };

    if style.boxed {
        egui::Frame::NONE
            .fill(style.accent.gamma_multiply(0.12))
            .stroke(egui::Stroke::new(1.0, style.accent.gamma_multiply(0.6)))
            .corner_radius(6.0)
            .inner_margin(egui::Margin::symmetric(8, 6))
            .show(ui, body);
    } else {
        body(ui);
    }
    ui.add_space(2.0);
}
