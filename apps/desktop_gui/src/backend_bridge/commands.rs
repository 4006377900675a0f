//! Backend commands queued from UI to backend worker.

use shared::domain::{RunConfig, SelectorSet};

pub enum BackendCommand {
    StartRun(RunConfig),
    Unlock { api_key: String },
    ReloadSelectors,
    SaveSelectors(SelectorSet),
    Lock,
}

impl BackendCommand {
    pub fn name(&self) -> &'static str {
        match self {
            BackendCommand::StartRun(_) => "start_run",
            BackendCommand::Unlock { .. } => "unlock",
            BackendCommand::ReloadSelectors => "reload_selectors",
            BackendCommand::SaveSelectors(_) => "save_selectors",
            BackendCommand::Lock => "lock",
        }
    }
}
