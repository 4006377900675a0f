//! Plain-text rendering of run log entries.

use chrono::Local;
use shared::domain::{LogEntry, LogKind};

pub fn render_entry(entry: &LogEntry) -> String {
    let time = entry.received_at.with_timezone(&Local).format("%H:%M:%S");
    format!("{time} {}", render_entry_body(entry))
}

pub fn render_entry_body(entry: &LogEntry) -> String {
    match entry.kind {
        LogKind::Status => format!("-- {}", entry.message),
        LogKind::Log => entry.message.clone(),
        LogKind::Result => {
            let label = if entry.dry_run { "Dry Run:" } else { "Success:" };
            match entry.comment.as_deref() {
                Some(comment) => format!("{label} {}\n    \"{comment}\"", entry.message),
                None => format!("{label} {}", entry.message),
            }
        }
        LogKind::Summary => {
            let body = entry
                .message
                .lines()
                .map(|line| format!("    {line}"))
                .collect::<Vec<_>>()
                .join("\n");
            format!("Summary:\n{body}")
        }
        LogKind::Error => format!("Error: {}", entry.message),
    }
}
