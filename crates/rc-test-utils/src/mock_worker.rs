//! Mock worker processes for orchestrator testing.
//!
//! [`MockLauncher`] stands in for the real process launcher. Every launch
//! creates a [`MockWorker`] which tests drive by hand: report readiness,
//! heartbeat, crash, or ignore the graceful shutdown signal.
//!
//! # Example
//!
//! ```rust,ignore
//! use rc_test_utils::{MockLauncher, ShutdownBehavior};
//!
//! let launcher = MockLauncher::new();
//! launcher.set_shutdown_behavior(ShutdownBehavior::Ignore);
//! launcher.fail_next_launches(1);
//! ```

use common::control::WorkerControlMessage;
use rc_service::errors::RcError;
use rc_service::worker::{
    ExitInfo, LaunchConfig, ProcessCommand, ProcessObserver, WorkerHandle, WorkerLauncher,
};
use serde_json::Value;
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, watch};

/// Signal number reported for killed mock workers.
pub const SIGKILL: i32 = 9;

/// How a mock worker reacts to a graceful shutdown command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShutdownBehavior {
    /// Exit with code 0 right away.
    #[default]
    Exit,
    /// Keep running until killed.
    Ignore,
}

#[derive(Debug)]
struct LauncherState {
    launches: Vec<LaunchConfig>,
    workers: Vec<MockWorker>,
    failures_remaining: usize,
    shutdown_behavior: ShutdownBehavior,
    next_pid: u32,
}

/// Launcher that records launch configurations and creates mock workers.
#[derive(Debug)]
pub struct MockLauncher {
    state: Mutex<LauncherState>,
}

impl MockLauncher {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(LauncherState {
                launches: Vec::new(),
                workers: Vec::new(),
                failures_remaining: 0,
                shutdown_behavior: ShutdownBehavior::Exit,
                next_pid: 4000,
            }),
        })
    }

    /// Behavior of workers launched from now on.
    pub fn set_shutdown_behavior(&self, behavior: ShutdownBehavior) {
        self.state.lock().unwrap().shutdown_behavior = behavior;
    }

    /// Make the next `count` launches fail with `SpawnFailure`.
    pub fn fail_next_launches(&self, count: usize) {
        self.state.lock().unwrap().failures_remaining = count;
    }

    /// Every configuration passed to a successful launch, in order.
    #[must_use]
    pub fn launches(&self) -> Vec<LaunchConfig> {
        self.state.lock().unwrap().launches.clone()
    }

    #[must_use]
    pub fn launch_count(&self) -> usize {
        self.state.lock().unwrap().launches.len()
    }

    /// The most recently launched worker for `room_id`.
    #[must_use]
    pub fn worker(&self, room_id: &str) -> Option<MockWorker> {
        self.state
            .lock()
            .unwrap()
            .workers
            .iter()
            .rev()
            .find(|w| w.room_id() == room_id)
            .cloned()
    }

    #[must_use]
    pub fn workers(&self) -> Vec<MockWorker> {
        self.state.lock().unwrap().workers.clone()
    }
}

impl WorkerLauncher for MockLauncher {
    fn launch(
        &self,
        config: &LaunchConfig,
        observer: ProcessObserver,
    ) -> Result<WorkerHandle, RcError> {
        let mut state = self.state.lock().unwrap();
        if state.failures_remaining > 0 {
            state.failures_remaining -= 1;
            return Err(RcError::SpawnFailure("mock launch failure".to_string()));
        }

        let pid = state.next_pid;
        state.next_pid += 1;

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (exit_tx, exit_rx) = watch::channel(false);
        let worker = MockWorker {
            inner: Arc::new(WorkerInner {
                config: config.clone(),
                pid,
                observer,
                exit_tx,
                commands: Mutex::new(Vec::new()),
                shutdown_behavior: state.shutdown_behavior,
            }),
        };

        tokio::spawn(run_commands(worker.clone(), command_rx));

        state.launches.push(config.clone());
        state.workers.push(worker);

        Ok(WorkerHandle::new(Some(pid), command_tx, exit_rx))
    }
}

async fn run_commands(worker: MockWorker, mut commands: mpsc::UnboundedReceiver<ProcessCommand>) {
    while let Some(command) = commands.recv().await {
        worker.inner.commands.lock().unwrap().push(command.clone());
        match command {
            ProcessCommand::Shutdown { .. } => {
                if worker.inner.shutdown_behavior == ShutdownBehavior::Exit {
                    worker.exit_with_code(0).await;
                }
            }
            ProcessCommand::Kill => {
                worker
                    .exit(ExitInfo {
                        code: None,
                        signal: Some(SIGKILL),
                    })
                    .await;
            }
        }
    }
}

#[derive(Debug)]
struct WorkerInner {
    config: LaunchConfig,
    pid: u32,
    observer: ProcessObserver,
    exit_tx: watch::Sender<bool>,
    commands: Mutex<Vec<ProcessCommand>>,
    shutdown_behavior: ShutdownBehavior,
}

/// A scripted worker process.
#[derive(Debug, Clone)]
pub struct MockWorker {
    inner: Arc<WorkerInner>,
}

impl MockWorker {
    #[must_use]
    pub fn config(&self) -> &LaunchConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn room_id(&self) -> &str {
        self.inner.config.room_id()
    }

    #[must_use]
    pub fn session_id(&self) -> &str {
        self.inner.config.session_id()
    }

    #[must_use]
    pub fn pid(&self) -> u32 {
        self.inner.pid
    }

    pub async fn ready(&self) {
        self.control(WorkerControlMessage::Ready).await;
    }

    pub async fn heartbeat(&self) {
        self.control(WorkerControlMessage::Heartbeat).await;
    }

    pub async fn report_error(&self, payload: Value) {
        self.control(WorkerControlMessage::Error { payload }).await;
    }

    pub async fn summary(&self, payload: Value) {
        self.control(WorkerControlMessage::Summary { payload })
            .await;
    }

    pub async fn request_shutdown(&self, reason: &str) {
        self.control(WorkerControlMessage::ShutdownRequest {
            reason: reason.to_string(),
        })
        .await;
    }

    /// Sends a raw control message.
    pub async fn control(&self, message: WorkerControlMessage) {
        assert!(
            self.inner.observer.control(message).await,
            "orchestrator is gone"
        );
    }

    /// Exit with the given code. Only the first exit is reported.
    pub async fn exit_with_code(&self, code: i32) {
        self.exit(ExitInfo {
            code: Some(code),
            signal: None,
        })
        .await;
    }

    /// Exit with `info`. Only the first exit is reported.
    pub async fn exit(&self, info: ExitInfo) {
        let first = self.inner.exit_tx.send_if_modified(|exited| {
            if *exited {
                false
            } else {
                *exited = true;
                true
            }
        });
        if first {
            let _ = self.inner.observer.exited(info).await;
        }
    }

    #[must_use]
    pub fn has_exited(&self) -> bool {
        *self.inner.exit_tx.borrow()
    }

    /// Commands received from the orchestrator so far.
    #[must_use]
    pub fn commands(&self) -> Vec<ProcessCommand> {
        self.inner.commands.lock().unwrap().clone()
    }

    #[must_use]
    pub fn received_shutdown(&self) -> bool {
        self.commands()
            .iter()
            .any(|c| matches!(c, ProcessCommand::Shutdown { .. }))
    }

    #[must_use]
    pub fn was_killed(&self) -> bool {
        self.commands().contains(&ProcessCommand::Kill)
    }
}
