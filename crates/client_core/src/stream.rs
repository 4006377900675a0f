//! Websocket transport for the run event stream.

use anyhow::{Context, Result};
use futures::{SinkExt, StreamExt};
use tokio::{
    net::TcpStream,
    sync::{mpsc, oneshot},
    task::JoinHandle,
};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info};

pub type RunStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// What the reader task reports; `Closed` is always the last signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamSignal {
    Frame(String),
    TransportError(String),
    Closed,
}

pub async fn connect(stream_url: &str) -> Result<RunStream> {
    let (ws_stream, _) = connect_async(stream_url)
        .await
        .with_context(|| format!("failed to connect run stream: {stream_url}"))?;
    info!(%stream_url, "run stream connected");
    Ok(ws_stream)
}

/// Reads frames until the peer closes, the transport fails, or `shutdown` fires
/// (or its sender is dropped), in which case a close frame is sent first.
pub fn spawn_reader(
    ws_stream: RunStream,
    mut shutdown: oneshot::Receiver<()>,
) -> (mpsc::Receiver<StreamSignal>, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(256);
    let task = tokio::spawn(async move {
        let (mut writer, mut reader) = ws_stream.split();
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    if let Err(err) = writer.send(Message::Close(None)).await {
                        debug!("close frame not delivered: {err}");
                    }
                    break;
                }
                msg = reader.next() => match msg {
                    Some(Ok(Message::Text(text))) => {
                        if tx.send(StreamSignal::Frame(text)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(frame))) => {
                        debug!(?frame, "run stream closed by peer");
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(err)) => {
                        let _ = tx
                            .send(StreamSignal::TransportError(err.to_string()))
                            .await;
                        break;
                    }
                    None => break,
                },
            }
        }
        let _ = tx.send(StreamSignal::Closed).await;
    });
    (rx, task)
}
