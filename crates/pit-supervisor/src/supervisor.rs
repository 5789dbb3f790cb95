use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use pit_broker::BrokerGateway;
use pit_config::AccountConfig;
use pit_engine::{run_engine, Clock, EngineControl};
use pit_schemas::{AccountId, EngineExit, EngineMode, EngineStatus};
use pit_strategy::StrategyRegistry;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;

use crate::watchdog::{classify_exit, classify_live};
use crate::{ProcessHealth, ProcessRecord, SupervisorError};

/// How to obtain a broker connection for an account. The transport itself
/// is an external collaborator; the supervisor only knows how to ask for one.
pub type BrokerFactory = Box<dyn Fn(&AccountConfig) -> Box<dyn BrokerGateway> + Send + Sync>;

#[derive(Copy, Clone, Debug)]
pub struct SupervisorConfig {
    /// Watchdog poll cadence.
    pub poll_interval_secs: u64,
    /// Status age past which a live session counts as unresponsive.
    pub unresponsive_after_secs: i64,
    /// How long `stop` waits for OFFLINE before giving up.
    pub stop_timeout_secs: u64,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 5,
            unresponsive_after_secs: 30,
            stop_timeout_secs: 90,
        }
    }
}

/// One spawned engine: its record plus the channel/task handles.
struct ManagedSession {
    record: ProcessRecord,
    control: Option<EngineControl>,
    task: Option<JoinHandle<EngineExit>>,
}

/// The registry owner. All mutation flows through the methods below and the
/// watchdog tick, serialized on one async mutex, so a kill and a
/// poll-detected crash racing on the same record converge without lost
/// updates.
pub struct Supervisor {
    registry: Arc<StrategyRegistry>,
    clock: Arc<dyn Clock>,
    config: SupervisorConfig,
    broker_factory: BrokerFactory,
    sessions: Mutex<BTreeMap<AccountId, ManagedSession>>,
    status_bus: broadcast::Sender<EngineStatus>,
}

impl Supervisor {
    pub fn new(
        registry: Arc<StrategyRegistry>,
        clock: Arc<dyn Clock>,
        config: SupervisorConfig,
        broker_factory: BrokerFactory,
    ) -> Self {
        let (status_bus, _) = broadcast::channel(1024);
        Self {
            registry,
            clock,
            config,
            broker_factory,
            sessions: Mutex::new(BTreeMap::new()),
            status_bus,
        }
    }

    /// Best-effort status feed for viewers (SSE). Consumers must tolerate
    /// gaps and key on the newest `seq`/timestamp.
    pub fn subscribe_status(&self) -> broadcast::Receiver<EngineStatus> {
        self.status_bus.subscribe()
    }

    /// Spawn an engine for this account.
    ///
    /// Fails with [`SupervisorError::AlreadyRunning`] while a live session
    /// exists; a terminated record is replaced by the fresh spawn.
    pub async fn start(&self, config: AccountConfig) -> Result<(), SupervisorError> {
        let account = config.account.clone();
        let mut sessions = self.sessions.lock().await;

        if let Some(existing) = sessions.get(&account) {
            let alive = existing
                .task
                .as_ref()
                .map(|t| !t.is_finished())
                .unwrap_or(false);
            if alive {
                return Err(SupervisorError::AlreadyRunning(account));
            }
        }

        let (control, stop_rx, status_tx) = EngineControl::wiring();
        let broker = (self.broker_factory)(&config);
        let task = tokio::spawn(run_engine(
            config,
            broker,
            Arc::clone(&self.registry),
            Arc::clone(&self.clock),
            status_tx,
            stop_rx,
        ));

        // Forward the engine's watch channel onto the shared bus.
        let mut feed = control.subscribe();
        let bus = self.status_bus.clone();
        tokio::spawn(async move {
            while feed.changed().await.is_ok() {
                let latest = feed.borrow().clone();
                if let Some(status) = latest {
                    let _ = bus.send(status);
                }
            }
        });

        tracing::info!(account = %account, "session spawned");
        sessions.insert(
            account.clone(),
            ManagedSession {
                record: ProcessRecord::spawned(account, self.clock.now()),
                control: Some(control),
                task: Some(task),
            },
        );
        Ok(())
    }

    /// Graceful stop: signal the engine and await its OFFLINE status up to
    /// the configured timeout. On timeout the record is left STOPPING and
    /// the caller chooses whether to escalate to [`Supervisor::kill`].
    pub async fn stop(&self, account: &AccountId) -> Result<(), SupervisorError> {
        let mut status_rx = {
            let mut sessions = self.sessions.lock().await;
            let session = sessions
                .get_mut(account)
                .ok_or_else(|| SupervisorError::UnknownAccount(account.clone()))?;
            // Stopping a terminated session is a no-op.
            if session.record.health.is_terminated() {
                return Ok(());
            }
            let Some(control) = session.control.as_ref() else {
                return Ok(());
            };
            control.request_stop();
            session.record.health = ProcessHealth::Stopping;
            control.subscribe()
        };

        let waited = tokio::time::timeout(
            Duration::from_secs(self.config.stop_timeout_secs),
            async {
                loop {
                    if matches!(&*status_rx.borrow(), Some(s) if s.mode == EngineMode::Offline) {
                        break;
                    }
                    if status_rx.changed().await.is_err() {
                        break; // sender gone; the task is finishing
                    }
                }
            },
        )
        .await;

        if waited.is_err() {
            tracing::warn!(account = %account, "graceful stop timed out");
            return Err(SupervisorError::StopTimeout(account.clone()));
        }

        self.reap(account).await;
        tracing::info!(account = %account, "session stopped");
        Ok(())
    }

    /// Force-terminate unconditionally and mark the record OFFLINE.
    /// Idempotent: killing an already-dead or unknown session is a no-op.
    pub async fn kill(&self, account: &AccountId) {
        let mut sessions = self.sessions.lock().await;
        let Some(session) = sessions.get_mut(account) else {
            return;
        };
        if let Some(task) = session.task.take() {
            if task.is_finished() {
                // Already dead: keep whatever exit it produced.
                if let Ok(exit) = task.await {
                    session.record.exit = Some(exit);
                }
            } else {
                tracing::warn!(account = %account, "force-killing session");
                task.abort();
            }
        }
        // Kill converges on OFFLINE no matter what it found.
        session.record.health = ProcessHealth::Offline;
    }

    /// Operator dismisses a terminated record; the next watchdog tick
    /// removes it from the active list.
    pub async fn acknowledge(&self, account: &AccountId) -> Result<(), SupervisorError> {
        let mut sessions = self.sessions.lock().await;
        let session = sessions
            .get_mut(account)
            .ok_or_else(|| SupervisorError::UnknownAccount(account.clone()))?;
        session.record.acknowledged = true;
        Ok(())
    }

    /// Latest status snapshot for one account.
    pub async fn status(&self, account: &AccountId) -> Option<EngineStatus> {
        let sessions = self.sessions.lock().await;
        let session = sessions.get(account)?;
        session
            .control
            .as_ref()
            .and_then(|c| c.latest_status())
            .or_else(|| session.record.last_status.clone())
    }

    /// Snapshot of all records.
    pub async fn list(&self) -> Vec<ProcessRecord> {
        let sessions = self.sessions.lock().await;
        sessions.values().map(|s| s.record.clone()).collect()
    }

    /// One watchdog pass: refresh statuses, classify every record, sweep
    /// acknowledged terminated records.
    pub async fn watchdog_tick(&self) {
        let now = self.clock.now();
        let mut sessions = self.sessions.lock().await;

        let mut to_remove = Vec::new();
        for (account, session) in sessions.iter_mut() {
            // Pull the newest snapshot off the watch channel.
            if let Some(control) = session.control.as_ref() {
                if let Some(status) = control.latest_status() {
                    session.record.last_status = Some(status);
                }
            }

            // Already classified terminal (e.g. by kill): only sweep.
            if session.record.health.is_terminated() && session.task.is_none() {
                if session.record.acknowledged {
                    to_remove.push(account.clone());
                }
                continue;
            }

            let finished = session
                .task
                .as_ref()
                .map(|t| t.is_finished())
                .unwrap_or(false);
            if finished {
                // Join is immediate for a finished task.
                let exit = match session.task.take() {
                    Some(task) => match task.await {
                        Ok(exit) => exit,
                        Err(join_err) => EngineExit::Failed {
                            reason: if join_err.is_panic() {
                                "engine task panicked".to_string()
                            } else {
                                "engine task cancelled".to_string()
                            },
                        },
                    },
                    None => EngineExit::Normal,
                };
                let health = classify_exit(&exit);
                if health == ProcessHealth::Crashed {
                    tracing::error!(account = %account, ?exit, "session crashed");
                }
                session.record.exit = Some(exit);
                session.record.health = health;
                continue;
            }

            let health = classify_live(
                now,
                session.record.last_status.as_ref(),
                session.record.spawned_at_utc,
                self.config.unresponsive_after_secs,
            );
            if health == ProcessHealth::Unresponsive
                && session.record.health != ProcessHealth::Unresponsive
            {
                tracing::warn!(account = %account, "session unresponsive");
            }
            session.record.health = health;
        }

        for account in to_remove {
            tracing::info!(account = %account, "removing acknowledged terminated record");
            sessions.remove(&account);
        }
    }

    /// Join a finished task and fold its exit into the record.
    async fn reap(&self, account: &AccountId) {
        let mut sessions = self.sessions.lock().await;
        let Some(session) = sessions.get_mut(account) else {
            return;
        };
        let finished = session
            .task
            .as_ref()
            .map(|t| t.is_finished())
            .unwrap_or(false);
        if !finished {
            return;
        }
        if let Some(task) = session.task.take() {
            let exit = task.await.unwrap_or(EngineExit::Failed {
                reason: "engine task panicked".to_string(),
            });
            session.record.health = classify_exit(&exit);
            session.record.exit = Some(exit);
        }
    }

    /// Spawn the periodic watchdog loop.
    pub fn spawn_watchdog(self: Arc<Self>) -> JoinHandle<()> {
        let interval = Duration::from_secs(self.config.poll_interval_secs.max(1));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                self.watchdog_tick().await;
            }
        })
    }
}
