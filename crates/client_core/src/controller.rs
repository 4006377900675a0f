use std::{sync::Arc, time::Duration};

use anyhow::{anyhow, Result};
use shared::domain::RunConfig;
use tokio::{
    sync::{broadcast, oneshot, Mutex},
    task::JoinHandle,
};
use tracing::{info, warn};

use crate::{
    api::{AgentApi, AgentApiError},
    consumer::{
        ConsoleEvent, ConsoleSnapshot, RunConsumer, StartRunError, START_FAILED_FALLBACK,
    },
    stream::{self, StreamSignal},
};

const UNMOUNT_GRACE: Duration = Duration::from_secs(5);

struct StreamTask {
    shutdown: oneshot::Sender<()>,
    reader: JoinHandle<()>,
    intake: JoinHandle<()>,
}

/// Owns the run consumer for one mounted view: the stream connection, the
/// start-run call, and fan-out of every state change to subscribers.
pub struct RunController {
    api: Arc<dyn AgentApi>,
    consumer: Mutex<RunConsumer>,
    events: broadcast::Sender<ConsoleEvent>,
    stream: Mutex<Option<StreamTask>>,
}

impl RunController {
    pub fn new(api: Arc<dyn AgentApi>) -> Arc<Self> {
        let (events, _) = broadcast::channel(1024);
        Arc::new(Self {
            api,
            consumer: Mutex::new(RunConsumer::new()),
            events,
            stream: Mutex::new(None),
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ConsoleEvent> {
        self.events.subscribe()
    }

    pub async fn snapshot(&self) -> ConsoleSnapshot {
        self.consumer.lock().await.snapshot()
    }

    /// Events are published while the consumer lock is held, so the returned
    /// receiver sees exactly the events that follow the snapshot.
    pub async fn subscribe_with_snapshot(
        &self,
    ) -> (ConsoleSnapshot, broadcast::Receiver<ConsoleEvent>) {
        let consumer = self.consumer.lock().await;
        (consumer.snapshot(), self.events.subscribe())
    }

    /// Opens the run stream. A consumer that has already been closed cannot be remounted.
    ///
    /// The stream slot stays locked until the reader is registered, so a
    /// concurrent `unmount` waits for the mount and then tears it down.
    pub async fn mount(self: &Arc<Self>, stream_url: &str) -> Result<()> {
        let mut slot = self.stream.lock().await;
        if !self.with_consumer(RunConsumer::connect_requested).await {
            return Err(anyhow!("run stream is already mounted or was closed"));
        }

        let ws_stream = match stream::connect(stream_url).await {
            Ok(ws_stream) => ws_stream,
            Err(err) => {
                let detail = format!("{err:#}");
                self.with_consumer(|consumer| {
                    consumer.on_transport_error(&detail);
                    consumer.on_close();
                })
                .await;
                return Err(err);
            }
        };
        self.with_consumer(RunConsumer::on_open).await;

        let (shutdown, shutdown_rx) = oneshot::channel();
        let (mut signals, reader) = stream::spawn_reader(ws_stream, shutdown_rx);
        let controller = Arc::clone(self);
        let intake = tokio::spawn(async move {
            while let Some(signal) = signals.recv().await {
                let closed = signal == StreamSignal::Closed;
                controller
                    .with_consumer(|consumer| match signal {
                        StreamSignal::Frame(text) => {
                            consumer.on_frame(&text);
                        }
                        StreamSignal::TransportError(detail) => {
                            consumer.on_transport_error(&detail)
                        }
                        StreamSignal::Closed => consumer.on_close(),
                    })
                    .await;
                if closed {
                    break;
                }
            }
            controller.with_consumer(RunConsumer::on_close).await;
        });

        *slot = Some(StreamTask {
            shutdown,
            reader,
            intake,
        });
        Ok(())
    }

    /// Validates locally, then asks the backend to start a run.
    pub async fn start_run(&self, config: RunConfig) -> Result<(), StartRunError> {
        self.with_consumer(|consumer| consumer.begin_start(&config))
            .await?;

        match self.api.start_run(&config).await {
            Ok(ack) => {
                info!(message = %ack.message, "agent run started");
                self.with_consumer(|consumer| consumer.start_succeeded(&ack))
                    .await;
                Ok(())
            }
            Err(err) => {
                let detail = start_failure_detail(&err);
                warn!(%detail, "failed to start agent run");
                self.with_consumer(|consumer| consumer.start_failed(&detail))
                    .await;
                Err(StartRunError::Rejected(detail))
            }
        }
    }

    /// Releases the stream regardless of run state.
    pub async fn unmount(&self) {
        let task = self.stream.lock().await.take();
        if let Some(StreamTask {
            shutdown,
            reader,
            intake,
        }) = task
        {
            let _ = shutdown.send(());
            if tokio::time::timeout(UNMOUNT_GRACE, intake).await.is_err() {
                warn!("run stream did not shut down in time; aborting reader");
                reader.abort();
            }
        }
        self.with_consumer(RunConsumer::on_close).await;
    }

    async fn with_consumer<R>(&self, f: impl FnOnce(&mut RunConsumer) -> R) -> R {
        let mut consumer = self.consumer.lock().await;
        let out = f(&mut consumer);
        for event in consumer.drain_events() {
            let _ = self.events.send(event);
        }
        out
    }
}

fn start_failure_detail(err: &AgentApiError) -> String {
    match err {
        AgentApiError::Transport(source) => source.to_string(),
        AgentApiError::Decode(reason) => format!("invalid response from backend: {reason}"),
        AgentApiError::Unauthorized { .. } | AgentApiError::Rejected { .. } => err
            .detail()
            .unwrap_or(START_FAILED_FALLBACK)
            .to_string(),
    }
}

#[cfg(test)]
#[path = "tests/controller_tests.rs"]
mod tests;
