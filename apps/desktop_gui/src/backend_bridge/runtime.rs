//! Runtime bridge between UI command queue and backend event intake.

use std::{sync::Arc, thread, time::Duration};

use client_core::{
    load_settings, AdminError, AdminSession, AgentApi, ConnectionState, ConsoleEvent,
    HttpAgentApi, RunController, StartRunError,
};
use crossbeam_channel::{Receiver, Sender, TrySendError};
use shared::domain::SelectorField;
use tokio::sync::broadcast::{self, error::RecvError};

use crate::backend_bridge::commands::BackendCommand;
use crate::controller::events::{AdminUpdate, UiError, UiErrorCategory, UiErrorContext, UiEvent};

const RESYNC_BACKOFF: Duration = Duration::from_millis(200);

pub fn launch(cmd_rx: Receiver<BackendCommand>, ui_tx: Sender<UiEvent>) {
    thread::spawn(move || {
        let runtime = match tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
        {
            Ok(runtime) => runtime,
            Err(err) => {
                let _ = ui_tx.try_send(UiEvent::Error(UiError::with_category(
                    UiErrorCategory::Transport,
                    UiErrorContext::BackendStartup,
                    format!("backend worker startup failure: failed to build runtime: {err}"),
                )));
                tracing::error!("failed to build backend runtime: {err}");
                return;
            }
        };
        runtime.block_on(run_worker(cmd_rx, ui_tx));
    });
}

async fn run_worker(cmd_rx: Receiver<BackendCommand>, ui_tx: Sender<UiEvent>) {
    let settings = match load_settings() {
        Ok(settings) => settings,
        Err(err) => {
            tracing::error!(error = %err, "invalid control panel settings");
            let _ = ui_tx.try_send(UiEvent::Error(UiError::with_category(
                UiErrorCategory::Validation,
                UiErrorContext::BackendStartup,
                format!("Invalid settings: {err}"),
            )));
            return;
        }
    };
    let api: Arc<dyn AgentApi> = match HttpAgentApi::from_settings(&settings) {
        Ok(api) => Arc::new(api),
        Err(err) => {
            tracing::error!(error = %err, "failed to build http client");
            let _ = ui_tx.try_send(UiEvent::Error(UiError::with_category(
                UiErrorCategory::Transport,
                UiErrorContext::BackendStartup,
                format!("backend worker startup failure: {err}"),
            )));
            return;
        }
    };
    tracing::info!(
        backend = %settings.backend_url,
        stream = %settings.stream_url,
        "backend worker ready"
    );

    let controller = RunController::new(Arc::clone(&api));
    let forwarder = tokio::spawn(forward_console_events(
        Arc::clone(&controller),
        ui_tx.clone(),
    ));
    if let Err(err) = controller.mount(&settings.stream_url).await {
        tracing::warn!(error = %err, "could not open run stream");
    }

    let mut admin = AdminSession::new(api);
    while let Ok(cmd) = cmd_rx.recv() {
        tracing::debug!(command = cmd.name(), "backend: handling command");
        match cmd {
            BackendCommand::StartRun(config) => {
                let controller = Arc::clone(&controller);
                let ui_tx = ui_tx.clone();
                tokio::spawn(async move {
                    let notice = controller.start_run(config).await.err().and_then(start_notice);
                    let _ = ui_tx.try_send(UiEvent::StartFinished(notice));
                });
            }
            BackendCommand::Unlock { api_key } => {
                let outcome = admin.unlock(api_key).await;
                publish_admin(&admin, outcome, &ui_tx);
            }
            BackendCommand::ReloadSelectors => {
                let outcome = admin.reload().await;
                publish_admin(&admin, outcome, &ui_tx);
            }
            BackendCommand::SaveSelectors(edits) => {
                for field in SelectorField::ALL {
                    admin.set_field(field, edits.get(field));
                }
                let outcome = admin.save().await;
                publish_admin(&admin, outcome, &ui_tx);
            }
            BackendCommand::Lock => {
                admin.lock();
                publish_admin(&admin, Ok(()), &ui_tx);
            }
        }
    }

    tracing::info!("ui closed; releasing run stream");
    controller.unmount().await;
    forwarder.abort();
}

/// Only failures the console log does not already show need a notice.
fn start_notice(err: StartRunError) -> Option<UiError> {
    match err {
        StartRunError::InvalidConfig(invalid) => Some(UiError::with_category(
            UiErrorCategory::Validation,
            UiErrorContext::StartRun,
            invalid.to_string(),
        )),
        StartRunError::NotReady(ConnectionState::Disconnected | ConnectionState::Connecting) => {
            Some(UiError::with_category(
                UiErrorCategory::Transport,
                UiErrorContext::StartRun,
                err.to_string(),
            ))
        }
        StartRunError::NotReady(_) | StartRunError::AlreadyStarting => {
            Some(UiError::with_category(
                UiErrorCategory::Validation,
                UiErrorContext::StartRun,
                err.to_string(),
            ))
        }
        StartRunError::Rejected(_) => None,
    }
}

fn admin_notice(err: &AdminError) -> Option<UiError> {
    let category = match err {
        AdminError::MissingApiKey => UiErrorCategory::Validation,
        AdminError::NotAuthenticated => UiErrorCategory::Auth,
        AdminError::Request { .. } => return None,
    };
    Some(UiError::with_category(
        category,
        UiErrorContext::Admin,
        err.to_string(),
    ))
}

fn publish_admin(admin: &AdminSession, outcome: Result<(), AdminError>, ui_tx: &Sender<UiEvent>) {
    if let Some(notice) = outcome.err().as_ref().and_then(admin_notice) {
        let _ = ui_tx.try_send(UiEvent::Error(notice));
    }
    let _ = ui_tx.try_send(UiEvent::Admin(AdminUpdate {
        authenticated: admin.is_authenticated(),
        selectors: admin.selectors().clone(),
        form: admin.form().clone(),
    }));
}

async fn forward_console_events(controller: Arc<RunController>, ui_tx: Sender<UiEvent>) {
    let (snapshot, mut events) = controller.subscribe_with_snapshot().await;
    let mut next = Some(UiEvent::ConsoleResync(snapshot));

    loop {
        let event = match next.take() {
            Some(event) => event,
            None => match events.recv().await {
                Ok(event) => UiEvent::Console(event),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "console feed lagged; resynchronising view");
                    resync(&controller, &mut events).await
                }
                Err(RecvError::Closed) => return,
            },
        };

        match ui_tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                tracing::warn!("ui event queue full; resynchronising view");
                tokio::time::sleep(RESYNC_BACKOFF).await;
                next = Some(resync(&controller, &mut events).await);
            }
            Err(TrySendError::Disconnected(_)) => return,
        }
    }
}

async fn resync(
    controller: &RunController,
    events: &mut broadcast::Receiver<ConsoleEvent>,
) -> UiEvent {
    let (snapshot, fresh) = controller.subscribe_with_snapshot().await;
    *events = fresh;
    UiEvent::ConsoleResync(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::error::RunConfigError;

    #[test]
    fn start_notices_carry_the_category_of_each_failure() {
        let invalid = start_notice(RunConfigError::MaxPostsOutOfRange(0).into()).expect("notice");
        assert_eq!(invalid.category(), UiErrorCategory::Validation);
        assert_eq!(invalid.context(), UiErrorContext::StartRun);

        let offline = start_notice(StartRunError::NotReady(ConnectionState::Disconnected))
            .expect("notice");
        assert_eq!(offline.category(), UiErrorCategory::Transport);

        let busy = start_notice(StartRunError::AlreadyStarting).expect("notice");
        assert_eq!(busy.category(), UiErrorCategory::Validation);

        let rejected = StartRunError::Rejected("Agent is already running.".into());
        assert!(start_notice(rejected).is_none());
    }

    #[test]
    fn admin_notices_skip_failures_shown_in_the_form() {
        let missing = admin_notice(&AdminError::MissingApiKey).expect("notice");
        assert_eq!(missing.category(), UiErrorCategory::Validation);
        assert_eq!(missing.context(), UiErrorContext::Admin);

        let locked = admin_notice(&AdminError::NotAuthenticated).expect("notice");
        assert_eq!(locked.category(), UiErrorCategory::Auth);
        assert_eq!(locked.message(), "not authenticated");
    }
}
