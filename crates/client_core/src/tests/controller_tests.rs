use super::*;

use std::sync::atomic::Ordering;

use shared::{domain::LogKind, error::RunConfigError};
use tokio::{net::TcpListener, sync::broadcast};

use crate::{
    api::HttpAgentApi,
    consumer::{
        ConnectionState, CONNECTION_LOST_MESSAGE, STATUS_CONNECTED, STATUS_DISCONNECTED,
        STATUS_STARTING,
    },
    mock_backend::{spawn_mock_backend, MockBackend, MockUrls, StartReply},
};

const WAIT: Duration = Duration::from_secs(5);

async fn mounted() -> (Arc<RunController>, MockUrls, MockBackend) {
    let (urls, backend) = spawn_mock_backend().await.expect("mock backend");
    let controller = RunController::new(Arc::new(HttpAgentApi::new(urls.http.clone())));
    controller.mount(&urls.ws).await.expect("mount");
    (controller, urls, backend)
}

async fn wait_for_event(
    rx: &mut broadcast::Receiver<ConsoleEvent>,
    mut pred: impl FnMut(&ConsoleEvent) -> bool,
) -> ConsoleEvent {
    tokio::time::timeout(WAIT, async {
        loop {
            match rx.recv().await {
                Ok(event) if pred(&event) => return event,
                Ok(_) => {}
                Err(err) => panic!("console events ended: {err}"),
            }
        }
    })
    .await
    .expect("timed out waiting for console event")
}

#[tokio::test]
async fn mount_reaches_idle_with_ready_status() {
    let (controller, _urls, backend) = mounted().await;

    let snapshot = controller.snapshot().await;
    assert_eq!(snapshot.state, ConnectionState::Idle);
    assert_eq!(snapshot.status, STATUS_CONNECTED);
    assert!(snapshot.logs.is_empty());
    assert_eq!(backend.ws_connections.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn full_run_streams_entries_until_finished() {
    let (controller, _urls, backend) = mounted().await;
    let mut rx = controller.subscribe();

    controller
        .start_run(RunConfig::new(r#"[{"name":"li_at"}]"#))
        .await
        .expect("start");
    assert_eq!(controller.snapshot().await.state, ConnectionState::Running);

    backend.push(r#"{"type":"status","message":"Opening feed"}"#);
    backend.push(r#"{"type":"log","message":"Found 3 posts"}"#);
    backend.push("garbage");
    backend.push(
        r#"{"type":"result","log":{"post_author":"Ada","generated_comment":"Insightful!","posted_to_linkedin":false}}"#,
    );
    backend.push(r#"{"type":"summary","message":"1 comment generated"}"#);
    backend.push(r#"{"type":"status","message":"Agent run finished."}"#);

    wait_for_event(&mut rx, |event| {
        *event == ConsoleEvent::StateChanged(ConnectionState::Idle)
    })
    .await;

    let snapshot = controller.snapshot().await;
    let kinds: Vec<LogKind> = snapshot.logs.iter().map(|entry| entry.kind).collect();
    assert_eq!(
        kinds,
        vec![
            LogKind::Status,
            LogKind::Status,
            LogKind::Log,
            LogKind::Result,
            LogKind::Summary,
            LogKind::Status,
        ]
    );
    let ids: Vec<u64> = snapshot.logs.iter().map(|entry| entry.id).collect();
    assert_eq!(ids, vec![1, 2, 3, 4, 5, 6]);
    assert!(snapshot.logs[3].dry_run);
    assert_eq!(snapshot.status, "Agent run finished.");
    assert_eq!(backend.start_hits(), 1);
}

#[tokio::test]
async fn late_subscriber_resumes_from_snapshot() {
    let (controller, _urls, backend) = mounted().await;
    let mut early = controller.subscribe();
    controller
        .start_run(RunConfig::new("[]"))
        .await
        .expect("start");
    backend.push(r#"{"type":"log","message":"first"}"#);
    wait_for_event(&mut early, |event| {
        matches!(event, ConsoleEvent::LogAppended(entry) if entry.message == "first")
    })
    .await;

    let (snapshot, mut late) = controller.subscribe_with_snapshot().await;
    assert_eq!(snapshot.state, ConnectionState::Running);
    assert_eq!(snapshot.logs.last().map(|e| e.message.as_str()), Some("first"));

    backend.push(r#"{"type":"log","message":"second"}"#);
    let next = wait_for_event(&mut late, |_| true).await;
    assert!(matches!(next, ConsoleEvent::LogAppended(entry) if entry.message == "second"));
}

#[tokio::test]
async fn invalid_cookie_payload_never_reaches_backend() {
    let (controller, _urls, backend) = mounted().await;

    let err = controller
        .start_run(RunConfig::new("{not json"))
        .await
        .expect_err("invalid cookie json");

    assert!(matches!(
        err,
        StartRunError::InvalidConfig(RunConfigError::InvalidCookieJson(_))
    ));
    assert_eq!(backend.start_hits(), 0);
    let snapshot = controller.snapshot().await;
    assert_eq!(snapshot.state, ConnectionState::Idle);
    assert!(!snapshot.start_in_flight);
}

#[tokio::test]
async fn rejected_start_logs_backend_detail_and_stays_idle() {
    let (controller, _urls, backend) = mounted().await;
    backend
        .set_start_reply(StartReply::Reject(409, Some("Agent is already running.".into())))
        .await;

    let err = controller
        .start_run(RunConfig::new("{}"))
        .await
        .expect_err("rejected");
    assert_eq!(
        err,
        StartRunError::Rejected("Agent is already running.".into())
    );

    let snapshot = controller.snapshot().await;
    assert_eq!(snapshot.state, ConnectionState::Idle);
    assert_eq!(snapshot.status, "Error: Agent is already running.");
    assert_eq!(snapshot.logs.len(), 1);
    assert_eq!(
        snapshot.logs[0].message,
        "Failed to start agent: Agent is already running."
    );
}

#[tokio::test]
async fn rejected_start_without_detail_uses_fallback() {
    let (controller, _urls, backend) = mounted().await;
    backend.set_start_reply(StartReply::Reject(500, None)).await;

    let err = controller
        .start_run(RunConfig::new("{}"))
        .await
        .expect_err("rejected");
    assert_eq!(err, StartRunError::Rejected(START_FAILED_FALLBACK.into()));
}

#[tokio::test]
async fn peer_close_during_run_appends_one_connection_error() {
    let (controller, _urls, backend) = mounted().await;
    let mut rx = controller.subscribe();
    controller
        .start_run(RunConfig::new("{}"))
        .await
        .expect("start");

    backend.close_stream();
    wait_for_event(&mut rx, |event| {
        *event == ConsoleEvent::StateChanged(ConnectionState::Disconnected)
    })
    .await;

    let snapshot = controller.snapshot().await;
    assert_eq!(snapshot.status, STATUS_DISCONNECTED);
    let errors: Vec<&str> = snapshot
        .logs
        .iter()
        .filter(|entry| entry.kind == LogKind::Error)
        .map(|entry| entry.message.as_str())
        .collect();
    assert_eq!(errors, vec![CONNECTION_LOST_MESSAGE]);

    controller.unmount().await;
    assert_eq!(controller.snapshot().await.logs.len(), snapshot.logs.len());
}

#[tokio::test]
async fn unmount_sends_close_frame_and_disconnects() {
    let (controller, _urls, backend) = mounted().await;

    controller.unmount().await;

    let snapshot = controller.snapshot().await;
    assert_eq!(snapshot.state, ConnectionState::Disconnected);
    assert!(snapshot.logs.is_empty());

    tokio::time::timeout(WAIT, async {
        while backend.client_closes.load(Ordering::SeqCst) == 0 {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("server saw close frame");
}

#[tokio::test]
async fn failed_mount_is_terminal() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);

    let controller = RunController::new(Arc::new(HttpAgentApi::new(format!("http://{addr}"))));
    let stream_url = format!("ws://{addr}/ws");

    controller
        .mount(&stream_url)
        .await
        .expect_err("nothing is listening");
    let snapshot = controller.snapshot().await;
    assert_eq!(snapshot.state, ConnectionState::Disconnected);
    assert_eq!(snapshot.status, STATUS_DISCONNECTED);

    controller
        .mount(&stream_url)
        .await
        .expect_err("no reconnect after close");
    assert!(matches!(
        controller.start_run(RunConfig::new("{}")).await,
        Err(StartRunError::NotReady(ConnectionState::Disconnected))
    ));
}

#[tokio::test]
async fn error_streamed_before_start_ack_ends_the_run() {
    let (controller, _urls, backend) = mounted().await;
    backend
        .set_start_reply(StartReply::Held("Agent run started in the background.".into()))
        .await;
    let mut rx = controller.subscribe();

    let starter = {
        let controller = Arc::clone(&controller);
        tokio::spawn(async move { controller.start_run(RunConfig::new("[]")).await })
    };
    wait_for_event(&mut rx, |event| {
        *event == ConsoleEvent::StatusChanged(STATUS_STARTING.into())
    })
    .await;

    backend.push(r#"{"type":"error","message":"Cookies expired"}"#);
    wait_for_event(&mut rx, |event| {
        matches!(event, ConsoleEvent::LogAppended(entry) if entry.kind == LogKind::Error)
    })
    .await;
    backend.release_start();

    tokio::time::timeout(WAIT, starter)
        .await
        .expect("start returned")
        .expect("start task")
        .expect("start accepted");

    let snapshot = controller.snapshot().await;
    assert_eq!(snapshot.state, ConnectionState::Idle);
    assert!(!snapshot.start_in_flight);
    assert_eq!(snapshot.status, "Error: Cookies expired");
    while let Ok(event) = rx.try_recv() {
        assert_ne!(event, ConsoleEvent::StateChanged(ConnectionState::Running));
    }
}

#[tokio::test]
async fn unmount_racing_mount_still_closes_the_stream() {
    let (urls, backend) = spawn_mock_backend().await.expect("mock backend");
    let controller = RunController::new(Arc::new(HttpAgentApi::new(urls.http.clone())));

    let (mounted, ()) = tokio::join!(controller.mount(&urls.ws), controller.unmount());
    mounted.expect("mount");

    assert_eq!(controller.snapshot().await.state, ConnectionState::Disconnected);
    tokio::time::timeout(WAIT, async {
        while backend.client_closes.load(Ordering::SeqCst) == 0 {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("server saw close frame");
}
