//! Real child processes under the command launcher.
//!
//! Workers are small `/bin/sh` scripts speaking the line-delimited control
//! protocol.

#![cfg(unix)]
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::time::Duration;

use common::control::WorkerControlMessage;
use rc_service::worker::{
    wait_for_exit, CommandLauncher, LaunchConfig, ProcessEvent, ProcessObserver, ProcessReport,
    WorkerLauncher,
};
use serde_json::json;
use tokio::sync::mpsc;

const REPORT_TIMEOUT: Duration = Duration::from_secs(10);

fn config(test_mode: bool) -> LaunchConfig {
    LaunchConfig::builder("room-1", "sess-1")
        .supervisor(Some("alice".to_string()))
        .callback("127.0.0.1", 8080)
        .limits(Duration::from_secs(600), Duration::from_secs(60))
        .test_mode(test_mode)
        .build()
        .unwrap()
}

fn shell(script: &str) -> CommandLauncher {
    CommandLauncher::new("/bin/sh", vec!["-c".to_string(), script.to_string(), "worker".to_string()])
}

async fn next_report(reports: &mut mpsc::Receiver<ProcessReport>) -> ProcessEvent {
    let report = tokio::time::timeout(REPORT_TIMEOUT, reports.recv())
        .await
        .expect("no report")
        .expect("report channel closed");
    assert_eq!(report.session_id, "sess-1");
    report.event
}

#[tokio::test]
async fn test_graceful_shutdown_over_stdin() {
    // Ignore SIGTERM so the stdin command is what ends the script.
    let launcher = shell(
        r#"trap '' TERM
echo "starting up"
echo '{"type":"ready"}'
while read -r line; do
  case "$line" in
    *shutdown*) echo '{"type":"summary","payload":{"turns":3}}'; exit 0 ;;
  esac
done"#,
    );
    let (tx, mut reports) = mpsc::channel(16);
    let handle = launcher
        .launch(&config(false), ProcessObserver::new("room-1", "sess-1", tx))
        .unwrap();
    assert!(handle.pid().is_some());

    // Plain output lines are logged, not reported.
    assert_eq!(
        next_report(&mut reports).await,
        ProcessEvent::Control(WorkerControlMessage::Ready)
    );

    assert!(handle.request_shutdown("room-empty"));
    assert_eq!(
        next_report(&mut reports).await,
        ProcessEvent::Control(WorkerControlMessage::Summary {
            payload: json!({"turns": 3})
        })
    );
    match next_report(&mut reports).await {
        ProcessEvent::Exited(info) => assert!(info.success()),
        other => panic!("expected exit, got {other:?}"),
    }
    tokio::time::timeout(REPORT_TIMEOUT, wait_for_exit(handle.exit_watcher()))
        .await
        .unwrap();
    assert!(handle.has_exited());
}

#[tokio::test]
async fn test_launch_contract_reaches_process() {
    // Echo the contract back as an error payload: "$@" are the appended args.
    let launcher = shell(
        r#"printf '{"type":"error","payload":{"room":"%s","supervisor":"%s","testMode":"%s","url":"%s","args":"%s"}}\n' \
  "$RC_ROOM_ID" "$RC_SUPERVISOR_ID" "$RC_TEST_MODE" "$RC_CALLBACK_URL" "$*""#,
    );
    let (tx, mut reports) = mpsc::channel(16);
    let _handle = launcher
        .launch(&config(true), ProcessObserver::new("room-1", "sess-1", tx))
        .unwrap();

    match next_report(&mut reports).await {
        ProcessEvent::Control(WorkerControlMessage::Error { payload }) => {
            assert_eq!(payload["room"], "room-1");
            assert_eq!(payload["supervisor"], "alice");
            assert_eq!(payload["testMode"], "1");
            assert_eq!(payload["url"], "ws://127.0.0.1:8080/ws/room-1");
            let args = payload["args"].as_str().unwrap();
            assert!(args.starts_with("--room-id room-1 --session-id sess-1"));
            assert!(args.ends_with("--test-mode"));
        }
        other => panic!("expected error report, got {other:?}"),
    }
    match next_report(&mut reports).await {
        ProcessEvent::Exited(info) => assert!(info.success()),
        other => panic!("expected exit, got {other:?}"),
    }
}

#[tokio::test]
async fn test_kill_reports_signal() {
    let launcher = shell("exec sleep 600");
    let (tx, mut reports) = mpsc::channel(16);
    let handle = launcher
        .launch(&config(false), ProcessObserver::new("room-1", "sess-1", tx))
        .unwrap();

    assert!(handle.kill());
    match next_report(&mut reports).await {
        ProcessEvent::Exited(info) => {
            assert!(!info.success());
            assert_eq!(info.signal, Some(9));
        }
        other => panic!("expected exit, got {other:?}"),
    }
}

#[tokio::test]
async fn test_nonzero_exit_is_reported() {
    let launcher = shell("exit 7");
    let (tx, mut reports) = mpsc::channel(16);
    let _handle = launcher
        .launch(&config(false), ProcessObserver::new("room-1", "sess-1", tx))
        .unwrap();

    match next_report(&mut reports).await {
        ProcessEvent::Exited(info) => {
            assert_eq!(info.code, Some(7));
            assert_eq!(info.to_string(), "exit code 7");
        }
        other => panic!("expected exit, got {other:?}"),
    }
}
