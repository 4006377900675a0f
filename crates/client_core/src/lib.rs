//! Client side of the agent control panel: backend calls, the run stream
//! consumer, the selector editor, and settings.

pub mod admin;
pub mod api;
pub mod consumer;
pub mod controller;
pub mod settings;
pub mod stream;

pub use admin::{AdminError, AdminSession, FormState, FormStatus};
pub use api::{AgentApi, AgentApiError, HttpAgentApi};
pub use consumer::{ConnectionState, ConsoleEvent, ConsoleSnapshot, RunConsumer, StartRunError};
pub use controller::RunController;
pub use settings::{load_settings, Settings, SettingsError};

#[cfg(test)]
#[path = "tests/mock_backend.rs"]
mod mock_backend;
