//! API-key gated editor for the agent's selector configuration.

use std::sync::Arc;

use shared::domain::{SelectorField, SelectorSet};
use thiserror::Error;
use tracing::{info, warn};
use zeroize::Zeroizing;

use crate::api::{AgentApi, AgentApiError};

pub const MSG_FETCHING: &str = "Fetching selectors...";
pub const MSG_LOADED: &str = "Selectors loaded from database.";
pub const MSG_FETCH_UNAUTHORIZED: &str = "Authentication failed. Bad API Key?";
pub const MSG_FETCH_FAILED: &str = "Failed to fetch selectors.";
pub const MSG_SAVING: &str = "Saving selectors...";
pub const MSG_SAVED: &str = "Selectors saved successfully!";
pub const MSG_SAVE_UNAUTHORIZED: &str = "Authentication failed.";
pub const MSG_SAVE_FAILED: &str = "Failed to save selectors.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormStatus {
    Idle,
    Loading,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormState {
    pub status: FormStatus,
    pub message: String,
}

impl FormState {
    fn new(status: FormStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl Default for FormState {
    fn default() -> Self {
        Self::new(FormStatus::Idle, "")
    }
}

#[derive(Debug, Error)]
pub enum AdminError {
    #[error("an admin API key is required")]
    MissingApiKey,
    #[error("not authenticated")]
    NotAuthenticated,
    #[error("{message}")]
    Request {
        message: &'static str,
        #[source]
        source: AgentApiError,
    },
}

/// Holds the admin secret only for as long as the session is unlocked.
pub struct AdminSession {
    api: Arc<dyn AgentApi>,
    api_key: Option<Zeroizing<String>>,
    selectors: SelectorSet,
    form: FormState,
}

impl AdminSession {
    pub fn new(api: Arc<dyn AgentApi>) -> Self {
        Self {
            api,
            api_key: None,
            selectors: SelectorSet::default(),
            form: FormState::default(),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.api_key.is_some()
    }

    pub fn selectors(&self) -> &SelectorSet {
        &self.selectors
    }

    pub fn form(&self) -> &FormState {
        &self.form
    }

    /// Accepts the secret and immediately loads the current selectors with it.
    /// Any fetch failure leaves the session locked.
    pub async fn unlock(&mut self, api_key: impl Into<String>) -> Result<(), AdminError> {
        let api_key = Zeroizing::new(api_key.into());
        if api_key.trim().is_empty() {
            return Err(AdminError::MissingApiKey);
        }
        self.api_key = Some(api_key);
        self.reload().await
    }

    pub async fn reload(&mut self) -> Result<(), AdminError> {
        let Some(api_key) = self.api_key.as_ref() else {
            return Err(AdminError::NotAuthenticated);
        };
        self.form = FormState::new(FormStatus::Loading, MSG_FETCHING);

        match self.api.fetch_selectors(api_key).await {
            Ok(selectors) => {
                info!(id = ?selectors.id, "selectors loaded");
                self.selectors = selectors;
                self.form = FormState::new(FormStatus::Success, MSG_LOADED);
                Ok(())
            }
            Err(source) => {
                let message = if source.is_unauthorized() {
                    MSG_FETCH_UNAUTHORIZED
                } else {
                    MSG_FETCH_FAILED
                };
                warn!(error = %source, "selector fetch failed; locking admin session");
                self.form = FormState::new(FormStatus::Error, message);
                self.api_key = None;
                Err(AdminError::Request { message, source })
            }
        }
    }

    pub fn set_field(&mut self, field: SelectorField, value: impl Into<String>) {
        self.selectors.set(field, value);
    }

    /// Persists local edits. Edits survive a failed save.
    pub async fn save(&mut self) -> Result<(), AdminError> {
        let Some(api_key) = self.api_key.as_ref() else {
            return Err(AdminError::NotAuthenticated);
        };
        self.form = FormState::new(FormStatus::Loading, MSG_SAVING);

        match self.api.save_selectors(api_key, &self.selectors).await {
            Ok(saved) => {
                info!(id = ?saved.id, "selectors saved");
                self.selectors = saved;
                self.form = FormState::new(FormStatus::Success, MSG_SAVED);
                Ok(())
            }
            Err(source) => {
                warn!(error = %source, "selector save failed");
                let message = if source.is_unauthorized() {
                    self.api_key = None;
                    MSG_SAVE_UNAUTHORIZED
                } else {
                    MSG_SAVE_FAILED
                };
                self.form = FormState::new(FormStatus::Error, message);
                Err(AdminError::Request { message, source })
            }
        }
    }

    pub fn lock(&mut self) {
        self.api_key = None;
        self.form = FormState::default();
    }
}

#[cfg(test)]
#[path = "tests/admin_tests.rs"]
mod tests;
