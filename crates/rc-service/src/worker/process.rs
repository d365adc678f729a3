//! Worker process supervision.
//!
//! A launched worker is represented by a [`WorkerHandle`]. The process itself
//! is owned by a monitor task which:
//!
//! - parses stdout lines into control messages for the orchestrator,
//! - logs stderr,
//! - executes shutdown and kill commands,
//! - reports the exit once the process is gone and its output is drained.
//!
//! The orchestrator only sees the handle and a stream of [`ProcessReport`]s,
//! which keeps it testable with scripted fake processes.

use crate::errors::RcError;
use crate::worker::launch::LaunchConfig;
use common::control::{SupervisorCommand, WorkerControlMessage};
use std::fmt;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// How long to keep reading stdout after the process exits.
const OUTPUT_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Commands executed by the monitor task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessCommand {
    /// Write a shutdown line to stdin and send SIGTERM.
    Shutdown { reason: String },
    /// SIGKILL.
    Kill,
}

/// How a worker process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExitInfo {
    pub code: Option<i32>,
    /// Terminating signal, on Unix.
    pub signal: Option<i32>,
}

impl ExitInfo {
    #[must_use]
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

impl From<std::process::ExitStatus> for ExitInfo {
    fn from(status: std::process::ExitStatus) -> Self {
        #[cfg(unix)]
        let signal = {
            use std::os::unix::process::ExitStatusExt;
            status.signal()
        };
        #[cfg(not(unix))]
        let signal = None;

        Self {
            code: status.code(),
            signal,
        }
    }
}

impl fmt::Display for ExitInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.code, self.signal) {
            (Some(code), _) => write!(f, "exit code {code}"),
            (None, Some(signal)) => write!(f, "signal {signal}"),
            (None, None) => f.write_str("unknown exit status"),
        }
    }
}

/// Something a worker process did.
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessEvent {
    Control(WorkerControlMessage),
    Exited(ExitInfo),
}

/// A process event tagged with the session it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessReport {
    pub session_id: String,
    pub event: ProcessEvent,
}

/// Reporting side of a worker, given to the launcher.
#[derive(Debug, Clone)]
pub struct ProcessObserver {
    room_id: String,
    session_id: String,
    reports: mpsc::Sender<ProcessReport>,
}

impl ProcessObserver {
    #[must_use]
    pub fn new(
        room_id: impl Into<String>,
        session_id: impl Into<String>,
        reports: mpsc::Sender<ProcessReport>,
    ) -> Self {
        Self {
            room_id: room_id.into(),
            session_id: session_id.into(),
            reports,
        }
    }

    #[must_use]
    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    #[must_use]
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Forwards a control message. Returns false if the orchestrator is gone.
    pub async fn control(&self, message: WorkerControlMessage) -> bool {
        self.report(ProcessEvent::Control(message)).await
    }

    /// Reports the process exit. Returns false if the orchestrator is gone.
    pub async fn exited(&self, info: ExitInfo) -> bool {
        self.report(ProcessEvent::Exited(info)).await
    }

    async fn report(&self, event: ProcessEvent) -> bool {
        self.reports
            .send(ProcessReport {
                session_id: self.session_id.clone(),
                event,
            })
            .await
            .is_ok()
    }
}

/// Control side of a launched worker.
#[derive(Debug)]
pub struct WorkerHandle {
    pid: Option<u32>,
    commands: mpsc::UnboundedSender<ProcessCommand>,
    exited: watch::Receiver<bool>,
}

impl WorkerHandle {
    /// `exited` must flip to `true` once the process is gone.
    #[must_use]
    pub fn new(
        pid: Option<u32>,
        commands: mpsc::UnboundedSender<ProcessCommand>,
        exited: watch::Receiver<bool>,
    ) -> Self {
        Self {
            pid,
            commands,
            exited,
        }
    }

    #[must_use]
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Asks the worker to exit. Returns false if the monitor is gone.
    pub fn request_shutdown(&self, reason: &str) -> bool {
        self.commands
            .send(ProcessCommand::Shutdown {
                reason: reason.to_string(),
            })
            .is_ok()
    }

    /// Forcibly kills the worker. Returns false if the monitor is gone.
    pub fn kill(&self) -> bool {
        self.commands.send(ProcessCommand::Kill).is_ok()
    }

    #[must_use]
    pub fn has_exited(&self) -> bool {
        *self.exited.borrow()
    }

    /// Receiver that resolves when the process exits; see [`wait_for_exit`].
    #[must_use]
    pub fn exit_watcher(&self) -> watch::Receiver<bool> {
        self.exited.clone()
    }
}

/// Resolves once the watched process has exited.
///
/// A dropped sender counts as exited: the monitor task is gone either way.
pub async fn wait_for_exit(mut exited: watch::Receiver<bool>) {
    let _ = exited.wait_for(|done| *done).await;
}

/// Starts worker processes.
///
/// Called from inside the orchestrator actor, so implementations must not
/// block; long-running work belongs in spawned tasks.
pub trait WorkerLauncher: Send + Sync + 'static {
    /// Launches a worker for `config`, reporting through `observer`.
    ///
    /// # Errors
    ///
    /// Returns `RcError::SpawnFailure` if the process cannot be started.
    fn launch(
        &self,
        config: &LaunchConfig,
        observer: ProcessObserver,
    ) -> Result<WorkerHandle, RcError>;
}

/// Launches workers as local child processes.
#[derive(Debug, Clone)]
pub struct CommandLauncher {
    program: PathBuf,
    base_args: Vec<String>,
}

impl CommandLauncher {
    #[must_use]
    pub fn new(program: impl Into<PathBuf>, base_args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            base_args,
        }
    }
}

impl WorkerLauncher for CommandLauncher {
    fn launch(
        &self,
        config: &LaunchConfig,
        observer: ProcessObserver,
    ) -> Result<WorkerHandle, RcError> {
        let mut command = Command::new(&self.program);
        command
            .args(&self.base_args)
            .args(config.to_args())
            .envs(config.to_env())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = command.spawn().map_err(|e| {
            RcError::SpawnFailure(format!("{}: {e}", self.program.display()))
        })?;
        let pid = child.id();

        info!(
            target: "rc.worker.process",
            room_id = %config.room_id(),
            session_id = %config.session_id(),
            pid = ?pid,
            "Worker process started"
        );

        let stdout_task = child
            .stdout
            .take()
            .map(|stdout| tokio::spawn(forward_stdout(stdout, observer.clone())));

        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(log_stderr(
                stderr,
                config.room_id().to_string(),
                config.session_id().to_string(),
            ));
        }

        let stdin = child.stdin.take();
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (exit_tx, exit_rx) = watch::channel(false);

        tokio::spawn(supervise(
            child,
            stdin,
            command_rx,
            exit_tx,
            stdout_task,
            observer,
        ));

        Ok(WorkerHandle::new(pid, command_tx, exit_rx))
    }
}

async fn supervise(
    mut child: Child,
    mut stdin: Option<ChildStdin>,
    mut commands: mpsc::UnboundedReceiver<ProcessCommand>,
    exit_tx: watch::Sender<bool>,
    stdout_task: Option<JoinHandle<()>>,
    observer: ProcessObserver,
) {
    let pid = child.id();
    let mut commands_open = true;

    let status = loop {
        tokio::select! {
            status = child.wait() => break status,
            command = commands.recv(), if commands_open => match command {
                Some(ProcessCommand::Shutdown { reason }) => {
                    debug!(
                        target: "rc.worker.process",
                        session_id = %observer.session_id(),
                        reason = %reason,
                        "Sending graceful shutdown"
                    );
                    if let Some(pipe) = stdin.as_mut() {
                        write_shutdown(pipe, &reason).await;
                    }
                    send_terminate(pid);
                }
                Some(ProcessCommand::Kill) => {
                    warn!(
                        target: "rc.worker.process",
                        session_id = %observer.session_id(),
                        pid = ?pid,
                        "Killing worker process"
                    );
                    if let Err(e) = child.start_kill() {
                        warn!(target: "rc.worker.process", error = %e, "Kill failed");
                    }
                }
                None => commands_open = false,
            },
        }
    };

    drop(stdin);
    if let Some(task) = stdout_task {
        let _ = tokio::time::timeout(OUTPUT_DRAIN_TIMEOUT, task).await;
    }

    let info = match status {
        Ok(status) => ExitInfo::from(status),
        Err(e) => {
            warn!(target: "rc.worker.process", error = %e, "Failed to read worker exit status");
            ExitInfo::default()
        }
    };

    info!(
        target: "rc.worker.process",
        room_id = %observer.room_id(),
        session_id = %observer.session_id(),
        exit = %info,
        "Worker process exited"
    );

    let _ = exit_tx.send(true);
    observer.exited(info).await;
}

async fn write_shutdown(pipe: &mut ChildStdin, reason: &str) {
    let line = match (SupervisorCommand::Shutdown {
        reason: reason.to_string(),
    })
    .encode_line()
    {
        Ok(line) => line,
        Err(e) => {
            warn!(target: "rc.worker.process", error = %e, "Failed to encode shutdown command");
            return;
        }
    };
    // The worker may have closed stdin already; SIGTERM still follows.
    if let Err(e) = pipe.write_all(line.as_bytes()).await {
        debug!(target: "rc.worker.process", error = %e, "Shutdown line not delivered");
        return;
    }
    let _ = pipe.flush().await;
}

#[cfg(unix)]
fn send_terminate(pid: Option<u32>) {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    let Some(raw) = pid.and_then(|p| i32::try_from(p).ok()) else {
        return;
    };
    if let Err(e) = kill(Pid::from_raw(raw), Signal::SIGTERM) {
        debug!(target: "rc.worker.process", pid = raw, error = %e, "SIGTERM failed");
    }
}

#[cfg(not(unix))]
fn send_terminate(_pid: Option<u32>) {}

async fn forward_stdout<R>(stdout: R, observer: ProcessObserver)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(stdout).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => match WorkerControlMessage::parse_line(&line) {
                Some(message) => {
                    // Keep draining even if nobody listens, so the pipe never fills.
                    let _ = observer.control(message).await;
                }
                None => debug!(
                    target: "rc.worker.output",
                    session_id = %observer.session_id(),
                    line = %line,
                    "Worker output"
                ),
            },
            Ok(None) => break,
            Err(e) => {
                warn!(target: "rc.worker.output", error = %e, "Worker stdout read failed");
                break;
            }
        }
    }
}

async fn log_stderr<R>(stderr: R, room_id: String, session_id: String)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(stderr).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        warn!(
            target: "rc.worker.stderr",
            room_id = %room_id,
            session_id = %session_id,
            line = %line,
            "Worker stderr"
        );
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_info_display() {
        assert_eq!(
            ExitInfo {
                code: Some(0),
                signal: None
            }
            .to_string(),
            "exit code 0"
        );
        assert_eq!(
            ExitInfo {
                code: None,
                signal: Some(9)
            }
            .to_string(),
            "signal 9"
        );
        assert!(!ExitInfo::default().success());
    }

    #[tokio::test]
    async fn test_handle_commands_and_exit_watch() {
        let (command_tx, mut command_rx) = mpsc::unbounded_channel();
        let (exit_tx, exit_rx) = watch::channel(false);
        let handle = WorkerHandle::new(Some(42), command_tx, exit_rx);

        assert!(handle.request_shutdown("room-empty"));
        assert!(handle.kill());
        assert_eq!(
            command_rx.recv().await,
            Some(ProcessCommand::Shutdown {
                reason: "room-empty".to_string()
            })
        );
        assert_eq!(command_rx.recv().await, Some(ProcessCommand::Kill));

        assert!(!handle.has_exited());
        let waiter = tokio::spawn(wait_for_exit(handle.exit_watcher()));
        exit_tx.send(true).unwrap();
        waiter.await.unwrap();
        assert!(handle.has_exited());
    }

    #[tokio::test]
    async fn test_wait_for_exit_resolves_when_sender_dropped() {
        let (exit_tx, exit_rx) = watch::channel(false);
        drop(exit_tx);
        wait_for_exit(exit_rx).await;
    }

    #[tokio::test]
    async fn test_forward_stdout_splits_control_and_output() {
        let (tx, mut rx) = mpsc::channel(8);
        let observer = ProcessObserver::new("room-1", "sess-1", tx);
        let output: &[u8] =
            b"booting\n{\"type\":\"ready\"}\nnot json\n{\"type\":\"heartbeat\"}\n";

        forward_stdout(output, observer).await;

        let first = rx.recv().await.unwrap();
        assert_eq!(first.session_id, "sess-1");
        assert_eq!(
            first.event,
            ProcessEvent::Control(WorkerControlMessage::Ready)
        );
        assert_eq!(
            rx.recv().await.unwrap().event,
            ProcessEvent::Control(WorkerControlMessage::Heartbeat)
        );
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_launch_missing_program_is_spawn_failure() {
        let (tx, _rx) = mpsc::channel(8);
        let config = LaunchConfig::builder("room-1", "sess-1")
            .callback("127.0.0.1", 8080)
            .limits(Duration::from_secs(60), Duration::from_secs(60))
            .build()
            .unwrap();
        let launcher = CommandLauncher::new("/nonexistent/ai-participant", vec![]);

        let err = launcher
            .launch(&config, ProcessObserver::new("room-1", "sess-1", tx))
            .unwrap_err();
        assert!(matches!(err, RcError::SpawnFailure(_)));
    }
}
