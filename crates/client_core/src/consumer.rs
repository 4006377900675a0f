//! Finite-state consumer of the live run stream.
//!
//! `RunConsumer` owns the run log and status and is driven purely by discrete
//! inputs: stream lifecycle signals, decoded frames, and the outcome of a start
//! request. Every observable change is queued as a [`ConsoleEvent`] which the
//! owner drains and publishes to whatever renders it.

use shared::{
    domain::{LogEntry, LogKind, RunConfig},
    error::RunConfigError,
    protocol::{decode_frame, ResultLog, StartRunResponse, StreamEvent},
};
use thiserror::Error;
use tracing::{debug, warn};

pub const STATUS_WAITING: &str = "Idle. Waiting to connect...";
pub const STATUS_CONNECTED: &str = "Connected. Ready to start.";
pub const STATUS_DISCONNECTED: &str = "Disconnected. Please refresh.";
pub const STATUS_STARTING: &str = "Agent starting...";
pub const STATUS_STREAM_ERROR: &str = "WebSocket connection error.";
pub const CONNECTION_LOST_MESSAGE: &str = "Connection to server lost. Please refresh.";
pub const START_FAILED_FALLBACK: &str = "Failed to start agent";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Idle,
    Running,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleEvent {
    StateChanged(ConnectionState),
    StatusChanged(String),
    LogAppended(LogEntry),
    LogsCleared,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StartRunError {
    #[error(transparent)]
    InvalidConfig(#[from] RunConfigError),
    #[error("not ready to start a run (stream is {0:?})")]
    NotReady(ConnectionState),
    #[error("a start request is already in flight")]
    AlreadyStarting,
    #[error("Failed to start agent: {0}")]
    Rejected(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsoleSnapshot {
    pub state: ConnectionState,
    pub status: String,
    pub logs: Vec<LogEntry>,
    pub start_in_flight: bool,
}

#[derive(Debug)]
pub struct RunConsumer {
    state: ConnectionState,
    closed: bool,
    start_in_flight: bool,
    /// Set when the stream reports an error or a finished run before the start ack.
    stopped_during_start: bool,
    status: String,
    logs: Vec<LogEntry>,
    next_log_id: u64,
    outbox: Vec<ConsoleEvent>,
}

impl Default for RunConsumer {
    fn default() -> Self {
        Self::new()
    }
}

impl RunConsumer {
    pub fn new() -> Self {
        Self {
            state: ConnectionState::Disconnected,
            closed: false,
            start_in_flight: false,
            stopped_during_start: false,
            status: STATUS_WAITING.to_string(),
            logs: Vec::new(),
            next_log_id: 1,
            outbox: Vec::new(),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn logs(&self) -> &[LogEntry] {
        &self.logs
    }

    pub fn is_running(&self) -> bool {
        self.state == ConnectionState::Running
    }

    /// True once the stream has closed; the consumer never leaves `Disconnected` afterwards.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn start_in_flight(&self) -> bool {
        self.start_in_flight
    }

    pub fn snapshot(&self) -> ConsoleSnapshot {
        ConsoleSnapshot {
            state: self.state,
            status: self.status.clone(),
            logs: self.logs.clone(),
            start_in_flight: self.start_in_flight,
        }
    }

    pub fn drain_events(&mut self) -> Vec<ConsoleEvent> {
        std::mem::take(&mut self.outbox)
    }

    /// Returns false when the consumer has already been through a close.
    pub fn connect_requested(&mut self) -> bool {
        if self.closed || self.state != ConnectionState::Disconnected {
            return false;
        }
        self.set_state(ConnectionState::Connecting);
        true
    }

    pub fn on_open(&mut self) {
        if self.state != ConnectionState::Connecting {
            debug!(state = ?self.state, "ignoring stream open outside Connecting");
            return;
        }
        self.set_state(ConnectionState::Idle);
        self.set_status(STATUS_CONNECTED);
    }

    pub fn on_transport_error(&mut self, detail: &str) {
        warn!(%detail, "run stream transport error");
        if self.closed {
            return;
        }
        self.set_status(STATUS_STREAM_ERROR);
    }

    pub fn on_close(&mut self) {
        if self.closed {
            return;
        }
        let was_running = self.is_running();
        self.closed = true;
        self.set_state(ConnectionState::Disconnected);
        self.set_status(STATUS_DISCONNECTED);
        if was_running {
            self.append(LogEntry::unnumbered(LogKind::Error, CONNECTION_LOST_MESSAGE));
        }
    }

    /// Decodes and applies one text frame. Frames that fail to decode are dropped.
    pub fn on_frame(&mut self, text: &str) -> Option<&LogEntry> {
        match decode_frame(text) {
            Ok(event) => self.apply(event),
            Err(error) => {
                warn!(%error, "dropping run stream frame");
                None
            }
        }
    }

    pub fn apply(&mut self, event: StreamEvent) -> Option<&LogEntry> {
        if self.closed {
            debug!("ignoring stream event after close");
            return None;
        }
        let finished = event.signals_run_finished();
        let entry = match event {
            StreamEvent::Status { message } => {
                self.set_status(message.clone());
                if finished {
                    self.stop_run();
                }
                LogEntry::unnumbered(LogKind::Status, message)
            }
            StreamEvent::Log { message } => LogEntry::unnumbered(LogKind::Log, message),
            StreamEvent::Error { message } => {
                self.set_status(format!("Error: {message}"));
                self.stop_run();
                LogEntry::unnumbered(LogKind::Error, message)
            }
            StreamEvent::Result { log } => result_entry(log),
            StreamEvent::Summary { message } => LogEntry::unnumbered(LogKind::Summary, message),
        };
        Some(self.append(entry))
    }

    /// Validates the config and resets the log for a new run.
    ///
    /// On error nothing changes and no request must be issued.
    pub fn begin_start(&mut self, config: &RunConfig) -> Result<(), StartRunError> {
        if self.state != ConnectionState::Idle {
            return Err(StartRunError::NotReady(self.state));
        }
        if self.start_in_flight {
            return Err(StartRunError::AlreadyStarting);
        }
        config.validate()?;

        self.start_in_flight = true;
        self.stopped_during_start = false;
        self.logs.clear();
        self.next_log_id = 1;
        self.outbox.push(ConsoleEvent::LogsCleared);
        self.set_status(STATUS_STARTING);
        Ok(())
    }

    /// Records the ack and enters `Running`, unless the run already ended on the stream.
    pub fn start_succeeded(&mut self, ack: &StartRunResponse) {
        self.start_in_flight = false;
        let stopped = std::mem::take(&mut self.stopped_during_start);
        if self.closed {
            warn!("start request succeeded after the run stream closed");
            return;
        }
        self.append(LogEntry::unnumbered(LogKind::Status, ack.message.clone()));
        if stopped {
            debug!("run ended before its start was acknowledged");
            return;
        }
        if self.state == ConnectionState::Idle {
            self.set_state(ConnectionState::Running);
        }
    }

    pub fn start_failed(&mut self, detail: &str) {
        self.start_in_flight = false;
        self.stopped_during_start = false;
        if self.closed {
            warn!(%detail, "start request failed after the run stream closed");
            return;
        }
        self.set_status(format!("Error: {detail}"));
        self.append(LogEntry::unnumbered(
            LogKind::Error,
            format!("Failed to start agent: {detail}"),
        ));
    }

    fn stop_run(&mut self) {
        if self.start_in_flight {
            self.stopped_during_start = true;
        }
        if self.is_running() {
            self.set_state(ConnectionState::Idle);
        }
    }

    fn append(&mut self, mut entry: LogEntry) -> &LogEntry {
        entry.id = self.next_log_id;
        self.next_log_id += 1;
        self.outbox.push(ConsoleEvent::LogAppended(entry.clone()));
        self.logs.push(entry);
        &self.logs[self.logs.len() - 1]
    }

    fn set_state(&mut self, state: ConnectionState) {
        if self.state == state {
            return;
        }
        debug!(from = ?self.state, to = ?state, "run consumer transition");
        self.state = state;
        self.outbox.push(ConsoleEvent::StateChanged(state));
    }

    fn set_status(&mut self, status: impl Into<String>) {
        self.status = status.into();
        self.outbox.push(ConsoleEvent::StatusChanged(self.status.clone()));
    }
}

fn result_entry(log: ResultLog) -> LogEntry {
    let dry_run = !log.posted_to_linkedin;
    let action = if dry_run {
        "Generated (DRY RUN)"
    } else {
        "Successfully POSTED"
    };
    let mut entry = LogEntry::unnumbered(
        LogKind::Result,
        format!("{action} comment for {}'s post.", log.post_author),
    );
    entry.author = Some(log.post_author);
    entry.comment = Some(log.generated_comment);
    entry.dry_run = dry_run;
    entry
}

#[cfg(test)]
#[path = "tests/consumer_tests.rs"]
mod tests;
