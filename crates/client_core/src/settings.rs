use std::{fs, path::Path, time::Duration};

use serde::Deserialize;
use thiserror::Error;
use tracing::warn;
use url::Url;

pub const SETTINGS_FILE: &str = "control_panel.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// HTTP origin of the agent backend, without a trailing slash.
    pub backend_url: String,
    /// Full URL of the run event stream.
    pub stream_url: String,
    pub request_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            backend_url: "http://127.0.0.1:8000".into(),
            stream_url: "ws://127.0.0.1:8000/ws".into(),
            request_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SettingsError {
    #[error("invalid {name} '{value}': {reason}")]
    InvalidUrl {
        name: &'static str,
        value: String,
        reason: String,
    },
    #[error("request timeout must be greater than zero")]
    ZeroTimeout,
}

#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    backend_url: Option<String>,
    stream_url: Option<String>,
    request_timeout_secs: Option<u64>,
}

impl Settings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn validated(mut self) -> Result<Self, SettingsError> {
        self.backend_url = check_url("backend_url", &self.backend_url, &["http", "https"])?
            .trim_end_matches('/')
            .to_string();
        self.stream_url = check_url("stream_url", &self.stream_url, &["ws", "wss"])?;
        if self.request_timeout_secs == 0 {
            return Err(SettingsError::ZeroTimeout);
        }
        Ok(self)
    }
}

/// Defaults, then `control_panel.toml` in the working directory, then environment.
pub fn load_settings() -> Result<Settings, SettingsError> {
    load_settings_from(Path::new(SETTINGS_FILE), |key| std::env::var(key).ok())
}

pub fn load_settings_from(
    file: &Path,
    env: impl Fn(&str) -> Option<String>,
) -> Result<Settings, SettingsError> {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string(file) {
        apply_file_overrides(&mut settings, &raw, file);
    }
    apply_env_overrides(&mut settings, env);

    settings.validated()
}

fn apply_file_overrides(settings: &mut Settings, raw: &str, file: &Path) {
    let file_cfg = match toml::from_str::<FileSettings>(raw) {
        Ok(cfg) => cfg,
        Err(error) => {
            warn!(path = %file.display(), %error, "ignoring unreadable settings file");
            return;
        }
    };
    if let Some(v) = file_cfg.backend_url {
        settings.backend_url = v;
    }
    if let Some(v) = file_cfg.stream_url {
        settings.stream_url = v;
    }
    if let Some(v) = file_cfg.request_timeout_secs {
        settings.request_timeout_secs = v;
    }
}

fn apply_env_overrides(settings: &mut Settings, env: impl Fn(&str) -> Option<String>) {
    if let Some(v) = env("AGENT_BACKEND_URL") {
        settings.backend_url = v;
    }
    if let Some(v) = env("APP__BACKEND_URL") {
        settings.backend_url = v;
    }

    if let Some(v) = env("AGENT_BACKEND_WS") {
        settings.stream_url = v;
    }
    if let Some(v) = env("APP__STREAM_URL") {
        settings.stream_url = v;
    }

    if let Some(v) = env("APP__REQUEST_TIMEOUT_SECS") {
        match v.parse::<u64>() {
            Ok(parsed) => settings.request_timeout_secs = parsed,
            Err(error) => warn!(value = %v, %error, "ignoring APP__REQUEST_TIMEOUT_SECS"),
        }
    }
}

fn check_url(name: &'static str, raw: &str, schemes: &[&str]) -> Result<String, SettingsError> {
    let trimmed = raw.trim();
    let parsed = Url::parse(trimmed).map_err(|err| SettingsError::InvalidUrl {
        name,
        value: raw.to_string(),
        reason: err.to_string(),
    })?;
    if !schemes.contains(&parsed.scheme()) {
        return Err(SettingsError::InvalidUrl {
            name,
            value: raw.to_string(),
            reason: format!("scheme must be one of {}", schemes.join(", ")),
        });
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
#[path = "tests/settings_tests.rs"]
mod tests;
