//! UI/backend events and error modeling for desktop GUI controller.

use client_core::{ConsoleEvent, ConsoleSnapshot, FormState};
use shared::domain::SelectorSet;

pub enum UiEvent {
    Console(ConsoleEvent),
    /// Full console state, sent first and again whenever the event feed fell behind.
    ConsoleResync(ConsoleSnapshot),
    /// A start request returned; carries a notice when the operator must act.
    StartFinished(Option<UiError>),
    Admin(AdminUpdate),
    Error(UiError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminUpdate {
    pub authenticated: bool,
    pub selectors: SelectorSet,
    pub form: FormState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiErrorCategory {
    Auth,
    Transport,
    Validation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiErrorContext {
    BackendStartup,
    StartRun,
    Admin,
    General,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UiError {
    category: UiErrorCategory,
    context: UiErrorContext,
    message: String,
}

impl UiError {
    pub fn with_category(
        category: UiErrorCategory,
        context: UiErrorContext,
        message: impl Into<String>,
    ) -> Self {
        Self {
            category,
            context,
            message: message.into(),
        }
    }

    pub fn category(&self) -> UiErrorCategory {
        self.category
    }

    pub fn context(&self) -> UiErrorContext {
        self.context
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_category_context_and_message() {
        let err = UiError::with_category(
            UiErrorCategory::Auth,
            UiErrorContext::Admin,
            "not authenticated",
        );
        assert_eq!(err.category(), UiErrorCategory::Auth);
        assert_eq!(err.context(), UiErrorContext::Admin);
        assert_eq!(err.message(), "not authenticated");
    }
}
