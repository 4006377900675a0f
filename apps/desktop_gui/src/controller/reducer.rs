//! View state mirrored from backend events.

use client_core::{
    consumer::STATUS_WAITING, ConnectionState, ConsoleEvent, ConsoleSnapshot, FormState,
};
use shared::domain::{LogEntry, SelectorSet};

use crate::controller::events::{AdminUpdate, UiError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsoleView {
    pub state: ConnectionState,
    pub status: String,
    pub logs: Vec<LogEntry>,
    pub start_pending: bool,
}

impl Default for ConsoleView {
    fn default() -> Self {
        Self {
            state: ConnectionState::Disconnected,
            status: STATUS_WAITING.to_string(),
            logs: Vec::new(),
            start_pending: false,
        }
    }
}

impl ConsoleView {
    pub fn apply(&mut self, event: ConsoleEvent) {
        match event {
            ConsoleEvent::StateChanged(state) => self.state = state,
            ConsoleEvent::StatusChanged(status) => self.status = status,
            ConsoleEvent::LogAppended(entry) => self.logs.push(entry),
            ConsoleEvent::LogsCleared => self.logs.clear(),
        }
    }

    pub fn resync(&mut self, snapshot: ConsoleSnapshot) {
        self.state = snapshot.state;
        self.status = snapshot.status;
        self.logs = snapshot.logs;
        self.start_pending = snapshot.start_in_flight;
    }

    pub fn is_running(&self) -> bool {
        self.state == ConnectionState::Running
    }

    /// The start control is live only on an idle stream with no request outstanding
    /// and some cookie text to send.
    pub fn can_start(&self, cookie_json: &str) -> bool {
        self.state == ConnectionState::Idle && !self.start_pending && !cookie_json.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AdminView {
    pub authenticated: bool,
    /// Editable copy; replaced whenever the backend reports a load or save.
    pub selectors: SelectorSet,
    pub form: FormState,
    pub request_pending: bool,
}

impl AdminView {
    pub fn apply(&mut self, update: AdminUpdate) {
        self.request_pending = false;
        self.authenticated = update.authenticated;
        self.form = update.form;
        // A failed save keeps whatever the operator is editing.
        if update.authenticated || self.selectors == SelectorSet::default() {
            self.selectors = update.selectors;
        }
    }
}

/// Reduces a finished start request; returns the notice to surface, if any.
pub fn finish_start(view: &mut ConsoleView, notice: Option<UiError>) -> Option<UiError> {
    view.start_pending = false;
    notice
}

#[cfg(test)]
mod tests {
    use super::*;
    use client_core::FormStatus;
    use shared::domain::LogKind;

    use crate::controller::events::{UiErrorCategory, UiErrorContext};

    #[test]
    fn mirrors_console_events_in_order() {
        let mut view = ConsoleView::default();
        view.apply(ConsoleEvent::StateChanged(ConnectionState::Idle));
        view.apply(ConsoleEvent::LogAppended(LogEntry::new(1, LogKind::Log, "old")));
        view.apply(ConsoleEvent::LogsCleared);
        view.apply(ConsoleEvent::StatusChanged("Agent starting...".into()));
        view.apply(ConsoleEvent::LogAppended(LogEntry::new(1, LogKind::Status, "go")));
        view.apply(ConsoleEvent::StateChanged(ConnectionState::Running));

        assert!(view.is_running());
        assert_eq!(view.status, "Agent starting...");
        assert_eq!(view.logs.len(), 1);
        assert_eq!(view.logs[0].message, "go");
    }

    #[test]
    fn start_gate_requires_idle_stream_and_cookies() {
        let mut view = ConsoleView::default();
        assert!(!view.can_start("[]"));

        view.apply(ConsoleEvent::StateChanged(ConnectionState::Idle));
        assert!(!view.can_start(""));
        assert!(view.can_start("[]"));

        view.start_pending = true;
        assert!(!view.can_start("[]"));

        let notice = finish_start(
            &mut view,
            Some(UiError::with_category(
                UiErrorCategory::Validation,
                UiErrorContext::StartRun,
                "invalid cookie json",
            )),
        );
        assert!(notice.is_some());
        assert!(view.can_start("[]"));

        view.apply(ConsoleEvent::StateChanged(ConnectionState::Running));
        assert!(!view.can_start("[]"));
    }

    #[test]
    fn resync_replaces_the_whole_view() {
        let mut view = ConsoleView::default();
        view.apply(ConsoleEvent::LogAppended(LogEntry::new(1, LogKind::Log, "stale")));

        view.resync(ConsoleSnapshot {
            state: ConnectionState::Running,
            status: "Scrolling".into(),
            logs: vec![LogEntry::new(7, LogKind::Status, "fresh")],
            start_in_flight: false,
        });

        assert_eq!(view.state, ConnectionState::Running);
        assert_eq!(view.logs.len(), 1);
        assert_eq!(view.logs[0].id, 7);
    }

    #[test]
    fn failed_save_keeps_local_edits() {
        let mut admin = AdminView::default();
        let mut loaded = SelectorSet::default();
        loaded.post_container = "article.post".into();
        admin.apply(AdminUpdate {
            authenticated: true,
            selectors: loaded.clone(),
            form: FormState {
                status: FormStatus::Success,
                message: "Selectors loaded from database.".into(),
            },
        });
        assert_eq!(admin.selectors.post_container, "article.post");

        admin.selectors.like_button = "button.edited".into();
        admin.request_pending = true;
        admin.apply(AdminUpdate {
            authenticated: false,
            selectors: loaded,
            form: FormState {
                status: FormStatus::Error,
                message: "Authentication failed.".into(),
            },
        });

        assert!(!admin.authenticated);
        assert!(!admin.request_pending);
        assert_eq!(admin.selectors.like_button, "button.edited");
        assert_eq!(admin.form.status, FormStatus::Error);
    }
}
