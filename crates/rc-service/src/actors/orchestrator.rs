//! `OrchestratorActor` - singleton owner of AI worker processes.
//!
//! The orchestrator:
//! - Spawns at most `max_workers` worker processes, one per room
//! - Tracks room occupancy as reported by the relay and spawns automatically
//!   when the trigger role joins
//! - Terminates workers when their room empties, goes idle, or outlives the
//!   hard lifetime limit
//! - Sweeps heartbeats and terminates hung workers
//! - Force-kills workers that ignore a graceful shutdown
//!
//! # Timers
//!
//! Every deadline lives in one [`TimerWheel`] keyed by slot. A room with a
//! worker has an activity slot (empty-room cleanup or idle timeout) and a
//! lifetime slot. A terminated worker has a force-kill slot until its process
//! is gone. Re-arming a slot replaces the previous deadline.
//!
//! # Worker failure
//!
//! A worker that crashes or is killed frees its capacity immediately. The
//! room carries on without it; nothing here touches relay state. A worker
//! that was told to shut down keeps its capacity until its process exits.

use crate::errors::RcError;
use crate::observability::metrics as prom;
use crate::timers::TimerWheel;
use crate::worker::launch::LaunchConfig;
use crate::worker::process::{
    wait_for_exit, ExitInfo, ProcessEvent, ProcessObserver, ProcessReport, WorkerHandle,
    WorkerLauncher,
};

use super::messages::{
    OrchestratorMessage, OrchestratorStatus, SpawnRequest, TerminationReason, WorkerEvent,
    WorkerInfo, WorkerStatus,
};
use super::metrics::{ActorMetrics, ActorType, MailboxMonitor};

use chrono::{DateTime, Utc};
use common::control::WorkerControlMessage;
use common::types::{ParticipantKind, ParticipantRole};
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

/// Default channel buffer size for the orchestrator mailbox.
const ORCHESTRATOR_CHANNEL_BUFFER: usize = 1000;

/// Buffer for control messages and exit reports from worker processes.
const PROCESS_REPORT_BUFFER: usize = 256;

/// Lifecycle events kept for slow subscribers.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Consecutive missed health intervals before a worker is terminated.
const MAX_MISSED_HEARTBEATS: u32 = 2;

/// Orchestrator policy and limits.
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    /// Global cap on live worker processes, draining ones included.
    pub max_workers: usize,
    /// Hard upper bound on a worker's life.
    pub max_lifetime: Duration,
    /// Termination after this long without participant activity.
    pub idle_timeout: Duration,
    /// Grace period between the last participant leaving and termination.
    pub empty_room_grace: Duration,
    /// Heartbeat sweep period.
    pub health_check_interval: Duration,
    /// Window between graceful shutdown and forced kill.
    pub termination_grace: Duration,
    pub callback_host: String,
    pub callback_port: u16,
    /// Spawn a worker when `spawn_trigger_role` joins a room without one.
    pub auto_spawn: bool,
    pub spawn_trigger_role: ParticipantRole,
    /// Default for spawn requests that don't say.
    pub test_mode: bool,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            max_workers: 5,
            max_lifetime: Duration::from_secs(2 * 60 * 60),
            idle_timeout: Duration::from_secs(30 * 60),
            empty_room_grace: Duration::from_secs(60),
            health_check_interval: Duration::from_secs(30),
            termination_grace: Duration::from_secs(10),
            callback_host: "127.0.0.1".to_string(),
            callback_port: 8080,
            auto_spawn: true,
            spawn_trigger_role: ParticipantRole::OperatorPrimary,
            test_mode: false,
        }
    }
}

/// Handle to the `OrchestratorActor`.
#[derive(Clone, Debug)]
pub struct OrchestratorHandle {
    sender: mpsc::Sender<OrchestratorMessage>,
    cancel_token: CancellationToken,
    events: broadcast::Sender<WorkerEvent>,
}

impl OrchestratorHandle {
    /// Spawn a worker for `room_id`.
    ///
    /// # Errors
    ///
    /// `CapacityExceeded`, `WorkerAlreadyRunning`, `InvalidLaunchConfig`,
    /// `SpawnFailure`, or `Draining` once shutdown has begun. None of them
    /// change orchestrator state.
    pub async fn spawn(&self, room_id: String, request: SpawnRequest) -> Result<WorkerInfo, RcError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(OrchestratorMessage::Spawn {
                room_id,
                request,
                respond_to: tx,
            })
            .await
            .map_err(|e| RcError::Internal(format!("channel send failed: {e}")))?;

        rx.await
            .map_err(|e| RcError::Internal(format!("response receive failed: {e}")))?
    }

    /// Ask the room's worker to exit.
    ///
    /// Returns `false` when the room had no active worker; calling this twice
    /// has exactly one effect.
    pub async fn terminate(&self, room_id: String, reason: TerminationReason) -> Result<bool, RcError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(OrchestratorMessage::Terminate {
                room_id,
                reason,
                respond_to: tx,
            })
            .await
            .map_err(|e| RcError::Internal(format!("channel send failed: {e}")))?;

        rx.await
            .map_err(|e| RcError::Internal(format!("response receive failed: {e}")))
    }

    /// Record that a participant joined a room.
    pub async fn participant_joined(
        &self,
        room_id: String,
        participant_id: String,
        role: ParticipantRole,
        kind: ParticipantKind,
    ) -> Result<(), RcError> {
        self.sender
            .send(OrchestratorMessage::ParticipantJoined {
                room_id,
                participant_id,
                role,
                kind,
            })
            .await
            .map_err(|e| RcError::Internal(format!("channel send failed: {e}")))
    }

    /// Record that a participant left a room.
    pub async fn participant_left(&self, room_id: String, participant_id: String) -> Result<(), RcError> {
        self.sender
            .send(OrchestratorMessage::ParticipantLeft {
                room_id,
                participant_id,
            })
            .await
            .map_err(|e| RcError::Internal(format!("channel send failed: {e}")))
    }

    pub async fn get_worker(&self, room_id: String) -> Result<Option<WorkerInfo>, RcError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(OrchestratorMessage::GetWorker {
                room_id,
                respond_to: tx,
            })
            .await
            .map_err(|e| RcError::Internal(format!("channel send failed: {e}")))?;

        rx.await
            .map_err(|e| RcError::Internal(format!("response receive failed: {e}")))
    }

    pub async fn get_status(&self) -> Result<OrchestratorStatus, RcError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(OrchestratorMessage::GetStatus { respond_to: tx })
            .await
            .map_err(|e| RcError::Internal(format!("channel send failed: {e}")))?;

        rx.await
            .map_err(|e| RcError::Internal(format!("response receive failed: {e}")))
    }

    /// Terminate every worker and wait until all of them have exited.
    ///
    /// Workers that ignore the graceful signal are killed after the
    /// termination grace window.
    pub async fn shutdown(&self) -> Result<(), RcError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(OrchestratorMessage::Shutdown { respond_to: tx })
            .await
            .map_err(|e| RcError::Internal(format!("channel send failed: {e}")))?;

        rx.await
            .map_err(|e| RcError::Internal(format!("response receive failed: {e}")))
    }

    /// Receive lifecycle events from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<WorkerEvent> {
        self.events.subscribe()
    }

    /// Cancel the actor. Workers are still shut down before it stops.
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum TimerKey {
    /// Cleanup or idle deadline for a room.
    Activity(String),
    /// Hard lifetime deadline for a room's worker.
    Lifetime(String),
    /// Forced kill of a draining session.
    ForceKill(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimerAction {
    Cleanup,
    Idle,
    Lifetime,
    ForceKill,
}

/// An active worker, counted against capacity.
struct WorkerRecord {
    room_id: String,
    session_id: String,
    handle: WorkerHandle,
    status: WorkerStatus,
    supervisor_id: Option<String>,
    secondary_id: Option<String>,
    started_at: DateTime<Utc>,
    spawned_at: Instant,
    last_heartbeat: Instant,
    missed_heartbeats: u32,
}

impl WorkerRecord {
    fn info(&self) -> WorkerInfo {
        WorkerInfo {
            room_id: self.room_id.clone(),
            session_id: self.session_id.clone(),
            pid: self.handle.pid(),
            status: self.status,
            supervisor_id: self.supervisor_id.clone(),
            secondary_id: self.secondary_id.clone(),
            started_at: self.started_at.timestamp(),
        }
    }
}

/// A terminated worker whose process has not exited yet.
struct DrainingRecord {
    room_id: String,
    handle: WorkerHandle,
    spawned_at: Instant,
}

/// Orchestrator view of who is in a room.
#[derive(Debug, Default)]
struct TrackedRoom {
    participants: HashMap<String, (ParticipantRole, ParticipantKind)>,
}

impl TrackedRoom {
    /// Everyone present, the worker's own participant included.
    fn occupancy(&self) -> usize {
        self.participants.len()
    }

    fn first_with_role(&self, wanted: ParticipantRole) -> Option<String> {
        let mut ids: Vec<&String> = self
            .participants
            .iter()
            .filter(|(_, (role, _))| *role == wanted)
            .map(|(id, _)| id)
            .collect();
        ids.sort();
        ids.first().map(|id| (*id).clone())
    }
}

/// The `OrchestratorActor` implementation.
pub struct OrchestratorActor {
    rc_id: String,
    receiver: mpsc::Receiver<OrchestratorMessage>,
    cancel_token: CancellationToken,
    settings: OrchestratorSettings,
    launcher: Arc<dyn WorkerLauncher>,
    /// Active workers by room.
    workers: HashMap<String, WorkerRecord>,
    /// Session id to room id for active workers.
    sessions: HashMap<String, String>,
    /// Terminated workers by session, until their process exits.
    draining: HashMap<String, DrainingRecord>,
    rooms: HashMap<String, TrackedRoom>,
    timers: TimerWheel<TimerKey, TimerAction>,
    reports_tx: mpsc::Sender<ProcessReport>,
    reports_rx: mpsc::Receiver<ProcessReport>,
    events: broadcast::Sender<WorkerEvent>,
    accepting_new: bool,
    metrics: Arc<ActorMetrics>,
    mailbox: MailboxMonitor,
}

impl OrchestratorActor {
    /// Spawn the orchestrator and return its handle.
    #[must_use]
    pub fn spawn(
        rc_id: String,
        settings: OrchestratorSettings,
        launcher: Arc<dyn WorkerLauncher>,
        metrics: Arc<ActorMetrics>,
    ) -> (OrchestratorHandle, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(ORCHESTRATOR_CHANNEL_BUFFER);
        let (reports_tx, reports_rx) = mpsc::channel(PROCESS_REPORT_BUFFER);
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let cancel_token = CancellationToken::new();
        let mailbox = MailboxMonitor::new(ActorType::Orchestrator, rc_id.clone());

        let actor = Self {
            rc_id,
            receiver,
            cancel_token: cancel_token.clone(),
            settings,
            launcher,
            workers: HashMap::new(),
            sessions: HashMap::new(),
            draining: HashMap::new(),
            rooms: HashMap::new(),
            timers: TimerWheel::new(),
            reports_tx,
            reports_rx,
            events: events.clone(),
            accepting_new: true,
            metrics,
            mailbox,
        };

        let task_handle = tokio::spawn(actor.run());

        (
            OrchestratorHandle {
                sender,
                cancel_token,
                events,
            },
            task_handle,
        )
    }

    /// Run the actor message loop.
    #[instrument(skip_all, name = "rc.actor.orchestrator", fields(rc_id = %self.rc_id))]
    async fn run(mut self) {
        info!(
            target: "rc.actor.orchestrator",
            rc_id = %self.rc_id,
            max_workers = self.settings.max_workers,
            "OrchestratorActor started"
        );

        let period = self.settings.health_check_interval;
        let mut health_check = tokio::time::interval_at(Instant::now() + period, period);
        health_check.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                () = self.cancel_token.cancelled() => {
                    info!(
                        target: "rc.actor.orchestrator",
                        rc_id = %self.rc_id,
                        "OrchestratorActor received cancellation signal"
                    );
                    self.shutdown_workers().await;
                    break;
                }

                msg = self.receiver.recv() => {
                    match msg {
                        Some(message) => {
                            self.mailbox.observe(self.receiver.len());
                            self.handle_message(message).await;
                        }
                        None => {
                            info!(
                                target: "rc.actor.orchestrator",
                                rc_id = %self.rc_id,
                                "OrchestratorActor channel closed, exiting"
                            );
                            self.shutdown_workers().await;
                            break;
                        }
                    }
                }

                Some(report) = self.reports_rx.recv() => {
                    self.handle_report(report);
                }

                (key, action) = self.timers.expired() => {
                    self.handle_timer(key, action);
                }

                _ = health_check.tick() => {
                    self.check_heartbeats();
                }
            }
        }

        info!(
            target: "rc.actor.orchestrator",
            rc_id = %self.rc_id,
            workers_remaining = self.workers.len() + self.draining.len(),
            messages_processed = self.mailbox.stats().processed,
            "OrchestratorActor stopped"
        );
    }

    async fn handle_message(&mut self, message: OrchestratorMessage) {
        match message {
            OrchestratorMessage::Spawn {
                room_id,
                request,
                respond_to,
            } => {
                let result = self.spawn_worker(&room_id, request);
                if let Err(e) = &result {
                    prom::record_error("spawn", e.error_type(), e.status_code());
                }
                let _ = respond_to.send(result);
            }

            OrchestratorMessage::Terminate {
                room_id,
                reason,
                respond_to,
            } => {
                let terminated = self.terminate(&room_id, reason);
                let _ = respond_to.send(terminated);
            }

            OrchestratorMessage::ParticipantJoined {
                room_id,
                participant_id,
                role,
                kind,
            } => {
                self.track_join(&room_id, participant_id, role, kind);
            }

            OrchestratorMessage::ParticipantLeft {
                room_id,
                participant_id,
            } => {
                self.track_leave(&room_id, &participant_id);
            }

            OrchestratorMessage::GetWorker {
                room_id,
                respond_to,
            } => {
                let info = self.workers.get(&room_id).map(WorkerRecord::info);
                let _ = respond_to.send(info);
            }

            OrchestratorMessage::GetStatus { respond_to } => {
                let _ = respond_to.send(OrchestratorStatus {
                    active_workers: self.workers.len(),
                    draining_workers: self.draining.len(),
                    max_workers: self.settings.max_workers,
                    draining: !self.accepting_new,
                });
            }

            OrchestratorMessage::Shutdown { respond_to } => {
                self.shutdown_workers().await;
                let _ = respond_to.send(());
            }
        }
    }

    /// Processes still alive: active workers plus those draining after a
    /// shutdown request.
    fn live_processes(&self) -> usize {
        self.workers.len() + self.draining.len()
    }

    fn spawn_worker(&mut self, room_id: &str, request: SpawnRequest) -> Result<WorkerInfo, RcError> {
        if !self.accepting_new {
            return Err(RcError::Draining);
        }
        if self.workers.contains_key(room_id) {
            return Err(RcError::WorkerAlreadyRunning(room_id.to_string()));
        }
        let live = self.live_processes();
        if live >= self.settings.max_workers {
            prom::record_worker_spawn("capacity_exceeded");
            warn!(
                target: "rc.actor.orchestrator",
                room_id = %room_id,
                active = self.workers.len(),
                draining = self.draining.len(),
                max_workers = self.settings.max_workers,
                "Worker capacity exceeded"
            );
            return Err(RcError::CapacityExceeded(live));
        }

        let session_id = request
            .session_id
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        if self.sessions.contains_key(&session_id) || self.draining.contains_key(&session_id) {
            return Err(RcError::InvalidLaunchConfig(format!(
                "session id {session_id} is already in use"
            )));
        }

        let config = LaunchConfig::builder(room_id, session_id.clone())
            .supervisor(request.supervisor_id)
            .secondary(request.secondary_id)
            .callback(self.settings.callback_host.clone(), self.settings.callback_port)
            .limits(self.settings.max_lifetime, self.settings.idle_timeout)
            .test_mode(request.test_mode.unwrap_or(self.settings.test_mode))
            .build()
            .inspect_err(|_| prom::record_worker_spawn("invalid_config"))?;

        let launch_started = Instant::now();
        let observer = ProcessObserver::new(room_id, session_id.clone(), self.reports_tx.clone());
        let handle = self.launcher.launch(&config, observer).map_err(|e| {
            prom::record_worker_spawn("error");
            error!(
                target: "rc.actor.orchestrator",
                room_id = %room_id,
                session_id = %session_id,
                error = %e,
                "Worker launch failed"
            );
            e
        })?;
        prom::record_worker_spawn("success");
        prom::record_worker_spawn_duration(launch_started.elapsed());

        let now = Instant::now();
        let record = WorkerRecord {
            room_id: room_id.to_string(),
            session_id: session_id.clone(),
            status: WorkerStatus::Spawning,
            supervisor_id: config.supervisor_id().map(str::to_string),
            secondary_id: config.secondary_id().map(str::to_string),
            started_at: Utc::now(),
            spawned_at: now,
            last_heartbeat: now,
            missed_heartbeats: 0,
            handle,
        };
        let info = record.info();

        self.workers.insert(room_id.to_string(), record);
        self.sessions.insert(session_id.clone(), room_id.to_string());

        self.timers.schedule(
            TimerKey::Lifetime(room_id.to_string()),
            TimerAction::Lifetime,
            self.settings.max_lifetime,
        );
        self.rearm_activity(room_id);
        self.metrics.set_worker_count(self.workers.len());

        info!(
            target: "rc.actor.orchestrator",
            room_id = %room_id,
            session_id = %session_id,
            pid = ?info.pid,
            active = self.workers.len(),
            "Worker spawned"
        );
        self.emit(WorkerEvent::Spawned {
            room_id: room_id.to_string(),
            session_id,
            pid: info.pid,
        });

        Ok(info)
    }

    /// Moves a room's worker to draining. Returns false if there was none.
    fn terminate(&mut self, room_id: &str, reason: TerminationReason) -> bool {
        let Some(record) = self.workers.remove(room_id) else {
            debug!(
                target: "rc.actor.orchestrator",
                room_id = %room_id,
                reason = %reason,
                "No active worker to terminate"
            );
            return false;
        };

        self.sessions.remove(&record.session_id);
        self.timers.cancel(&TimerKey::Activity(room_id.to_string()));
        self.timers.cancel(&TimerKey::Lifetime(room_id.to_string()));

        if !record.handle.request_shutdown(reason.as_str()) {
            debug!(
                target: "rc.actor.orchestrator",
                session_id = %record.session_id,
                "Worker monitor already gone"
            );
        }
        self.timers.schedule(
            TimerKey::ForceKill(record.session_id.clone()),
            TimerAction::ForceKill,
            self.settings.termination_grace,
        );

        prom::record_worker_termination(reason.as_str());
        self.metrics.set_worker_count(self.workers.len());

        let pid = record.handle.pid();
        info!(
            target: "rc.actor.orchestrator",
            room_id = %room_id,
            session_id = %record.session_id,
            pid = ?pid,
            reason = %reason,
            "Worker terminating"
        );
        self.emit(WorkerEvent::Terminated {
            room_id: room_id.to_string(),
            session_id: record.session_id.clone(),
            pid,
            reason,
        });

        self.draining.insert(
            record.session_id,
            DrainingRecord {
                room_id: record.room_id,
                handle: record.handle,
                spawned_at: record.spawned_at,
            },
        );
        self.forget_room_if_idle(room_id);
        true
    }

    fn track_join(
        &mut self,
        room_id: &str,
        participant_id: String,
        role: ParticipantRole,
        kind: ParticipantKind,
    ) {
        let room = self.rooms.entry(room_id.to_string()).or_default();
        room.participants.insert(participant_id.clone(), (role, kind));

        if self.workers.contains_key(room_id) {
            self.rearm_activity(room_id);
            return;
        }

        if self.settings.auto_spawn && self.accepting_new && role == self.settings.spawn_trigger_role
        {
            let secondary_id = self
                .rooms
                .get(room_id)
                .and_then(|room| room.first_with_role(ParticipantRole::OperatorSecondary));
            let request = SpawnRequest {
                session_id: None,
                supervisor_id: Some(participant_id),
                secondary_id,
                test_mode: None,
            };
            if let Err(e) = self.spawn_worker(room_id, request) {
                warn!(
                    target: "rc.actor.orchestrator",
                    room_id = %room_id,
                    error = %e,
                    "Automatic worker spawn failed"
                );
                prom::record_error("auto_spawn", e.error_type(), e.status_code());
                self.emit(WorkerEvent::SpawnFailed {
                    room_id: room_id.to_string(),
                    error: e.to_string(),
                });
            }
        }
    }

    fn track_leave(&mut self, room_id: &str, participant_id: &str) {
        let departed = self
            .rooms
            .get_mut(room_id)
            .and_then(|room| room.participants.remove(participant_id));

        if departed.is_some() && self.workers.contains_key(room_id) {
            self.rearm_activity(room_id);
        }
        self.forget_room_if_idle(room_id);
    }

    /// Arms the room's activity slot: cleanup when the room is empty, idle
    /// timeout otherwise. A room holding only its worker is bounded by idle.
    fn rearm_activity(&mut self, room_id: &str) {
        let occupancy = self.rooms.get(room_id).map_or(0, TrackedRoom::occupancy);
        let (action, after) = if occupancy == 0 {
            (TimerAction::Cleanup, self.settings.empty_room_grace)
        } else {
            (TimerAction::Idle, self.settings.idle_timeout)
        };

        let replaced = self
            .timers
            .schedule(TimerKey::Activity(room_id.to_string()), action, after);

        debug!(
            target: "rc.actor.orchestrator",
            room_id = %room_id,
            action = ?action,
            replaced = ?replaced,
            after_secs = after.as_secs(),
            "Activity timer armed"
        );
    }

    fn forget_room_if_idle(&mut self, room_id: &str) {
        let empty = self
            .rooms
            .get(room_id)
            .is_some_and(|room| room.participants.is_empty());
        if empty && !self.workers.contains_key(room_id) {
            self.rooms.remove(room_id);
        }
    }

    fn handle_timer(&mut self, key: TimerKey, action: TimerAction) {
        match (key, action) {
            (TimerKey::Activity(room_id), TimerAction::Cleanup) => {
                let occupancy = self.rooms.get(&room_id).map_or(0, TrackedRoom::occupancy);
                if occupancy == 0 {
                    self.terminate(&room_id, TerminationReason::RoomEmpty);
                } else {
                    self.rearm_activity(&room_id);
                }
            }
            (TimerKey::Activity(room_id), _) => {
                self.terminate(&room_id, TerminationReason::IdleTimeout);
            }
            (TimerKey::Lifetime(room_id), _) => {
                self.terminate(&room_id, TerminationReason::MaxLifetime);
            }
            (TimerKey::ForceKill(session_id), _) => {
                if let Some(record) = self.draining.get(&session_id) {
                    warn!(
                        target: "rc.actor.orchestrator",
                        room_id = %record.room_id,
                        session_id = %session_id,
                        grace_secs = self.settings.termination_grace.as_secs(),
                        "Worker ignored shutdown, killing"
                    );
                    record.handle.kill();
                    prom::record_force_kill();
                }
            }
        }
    }

    fn check_heartbeats(&mut self) {
        let now = Instant::now();
        let period = self.settings.health_check_interval;
        let mut hung = Vec::new();

        for record in self.workers.values_mut() {
            if now.duration_since(record.last_heartbeat) < period {
                continue;
            }
            record.missed_heartbeats += 1;
            prom::record_heartbeat_miss();

            if record.missed_heartbeats >= MAX_MISSED_HEARTBEATS {
                hung.push(record.room_id.clone());
            } else if record.status != WorkerStatus::Unresponsive {
                record.status = WorkerStatus::Unresponsive;
                warn!(
                    target: "rc.actor.orchestrator",
                    room_id = %record.room_id,
                    session_id = %record.session_id,
                    "Worker missed heartbeat"
                );
                let _ = self.events.send(WorkerEvent::Unresponsive {
                    room_id: record.room_id.clone(),
                    session_id: record.session_id.clone(),
                });
            }
        }

        for room_id in hung {
            let error = RcError::Unresponsive(room_id.clone());
            warn!(target: "rc.actor.orchestrator", error = %error, "Terminating hung worker");
            self.terminate(&room_id, TerminationReason::Unresponsive);
        }
    }

    fn handle_report(&mut self, report: ProcessReport) {
        match report.event {
            ProcessEvent::Control(message) => self.handle_control(&report.session_id, message),
            ProcessEvent::Exited(exit) => self.handle_exit(&report.session_id, exit),
        }
    }

    fn handle_control(&mut self, session_id: &str, message: WorkerControlMessage) {
        let message_type = message.message_type();

        let Some(room_id) = self.sessions.get(session_id).cloned() else {
            // Summaries and errors still matter while a worker drains.
            if let Some(record) = self.draining.get(session_id) {
                let room_id = record.room_id.clone();
                match message {
                    WorkerControlMessage::Summary { payload } => self.emit(WorkerEvent::Summary {
                        room_id,
                        session_id: session_id.to_string(),
                        payload,
                    }),
                    WorkerControlMessage::Error { payload } => self.emit(WorkerEvent::Error {
                        room_id,
                        session_id: session_id.to_string(),
                        payload,
                    }),
                    _ => {}
                }
            } else {
                debug!(
                    target: "rc.actor.orchestrator",
                    session_id = %session_id,
                    message_type = message_type,
                    "Control message for unknown session"
                );
            }
            return;
        };

        let Some(record) = self.workers.get_mut(&room_id) else {
            return;
        };

        match message {
            WorkerControlMessage::Ready => {
                record.status = WorkerStatus::Ready;
                record.last_heartbeat = Instant::now();
                record.missed_heartbeats = 0;
                info!(
                    target: "rc.actor.orchestrator",
                    room_id = %room_id,
                    session_id = %session_id,
                    "Worker ready"
                );
                self.emit(WorkerEvent::Ready {
                    room_id,
                    session_id: session_id.to_string(),
                });
            }
            WorkerControlMessage::Heartbeat => {
                record.last_heartbeat = Instant::now();
                record.missed_heartbeats = 0;
                if record.status == WorkerStatus::Unresponsive {
                    record.status = WorkerStatus::Ready;
                    info!(
                        target: "rc.actor.orchestrator",
                        room_id = %room_id,
                        session_id = %session_id,
                        "Worker responsive again"
                    );
                }
            }
            WorkerControlMessage::Error { payload } => {
                record.status = WorkerStatus::Error;
                warn!(
                    target: "rc.actor.orchestrator",
                    room_id = %room_id,
                    session_id = %session_id,
                    payload = %payload,
                    "Worker reported error"
                );
                self.emit(WorkerEvent::Error {
                    room_id,
                    session_id: session_id.to_string(),
                    payload,
                });
            }
            WorkerControlMessage::Summary { payload } => {
                self.emit(WorkerEvent::Summary {
                    room_id,
                    session_id: session_id.to_string(),
                    payload,
                });
            }
            WorkerControlMessage::ShutdownRequest { reason } => {
                info!(
                    target: "rc.actor.orchestrator",
                    room_id = %room_id,
                    session_id = %session_id,
                    reason = %reason,
                    "Worker requested shutdown"
                );
                self.terminate(&room_id, TerminationReason::WorkerRequested);
            }
        }
    }

    fn handle_exit(&mut self, session_id: &str, exit: ExitInfo) {
        if let Some(record) = self.draining.remove(session_id) {
            self.timers.cancel(&TimerKey::ForceKill(session_id.to_string()));
            prom::record_worker_lifetime(record.spawned_at.elapsed());
            info!(
                target: "rc.actor.orchestrator",
                room_id = %record.room_id,
                session_id = %session_id,
                exit = %exit,
                "Terminated worker exited"
            );
            self.emit(WorkerEvent::Exited {
                room_id: record.room_id,
                session_id: session_id.to_string(),
                exit: exit.to_string(),
            });
            return;
        }

        let Some(room_id) = self.sessions.remove(session_id) else {
            return;
        };
        let Some(record) = self.workers.remove(&room_id) else {
            return;
        };

        self.timers.cancel(&TimerKey::Activity(room_id.clone()));
        self.timers.cancel(&TimerKey::Lifetime(room_id.clone()));
        prom::record_worker_lifetime(record.spawned_at.elapsed());
        self.metrics.set_worker_count(self.workers.len());

        if exit.success() {
            info!(
                target: "rc.actor.orchestrator",
                room_id = %room_id,
                session_id = %session_id,
                "Worker exited on its own"
            );
        } else {
            let error = RcError::ProcessCrash(format!("{session_id}: {exit}"));
            error!(
                target: "rc.actor.orchestrator",
                room_id = %room_id,
                error = %error,
                "Worker crashed, room continues without it"
            );
            prom::record_worker_crash();
            self.emit(WorkerEvent::Crashed {
                room_id: room_id.clone(),
                session_id: session_id.to_string(),
                exit: exit.to_string(),
            });
        }

        self.emit(WorkerEvent::Exited {
            room_id: room_id.clone(),
            session_id: session_id.to_string(),
            exit: exit.to_string(),
        });
        self.forget_room_if_idle(&room_id);
    }

    /// Terminates every worker, waits for their processes, and kills the
    /// ones still running after the grace window.
    async fn shutdown_workers(&mut self) {
        self.accepting_new = false;

        let rooms: Vec<String> = self.workers.keys().cloned().collect();
        for room_id in &rooms {
            self.terminate(room_id, TerminationReason::Shutdown);
        }

        if self.draining.is_empty() {
            return;
        }

        let grace = self.settings.termination_grace;
        let exits = self.draining.values().map(|record| {
            let watcher = record.handle.exit_watcher();
            async move { tokio::time::timeout(grace, wait_for_exit(watcher)).await.is_ok() }
        });
        let graceful = join_all(exits).await.into_iter().filter(|exited| *exited).count();

        let stragglers: Vec<_> = self
            .draining
            .values()
            .filter(|record| !record.handle.has_exited())
            .map(|record| {
                warn!(
                    target: "rc.actor.orchestrator",
                    room_id = %record.room_id,
                    "Killing worker during shutdown"
                );
                record.handle.kill();
                prom::record_force_kill();
                record.handle.exit_watcher()
            })
            .collect();
        let killed = stragglers.len();
        join_all(
            stragglers
                .into_iter()
                .map(|watcher| tokio::time::timeout(grace, wait_for_exit(watcher))),
        )
        .await;

        info!(
            target: "rc.actor.orchestrator",
            rc_id = %self.rc_id,
            graceful = graceful,
            killed = killed,
            "All workers shut down"
        );
    }

    fn emit(&self, event: WorkerEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}
