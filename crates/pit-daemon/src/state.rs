//! Shared runtime state for pit-daemon.
//!
//! Handlers receive `State<Arc<AppState>>` from Axum; this module owns
//! nothing async itself beyond the forwarder/heartbeat tasks it spawns.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use pit_schemas::EngineStatus;
use pit_supervisor::Supervisor;
use serde::Serialize;
use tokio::sync::broadcast;

/// Messages broadcast over the internal event bus and surfaced as SSE events.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BusMsg {
    Heartbeat { ts_millis: i64 },
    Status(EngineStatus),
}

/// Static build metadata included in health responses.
#[derive(Clone, Debug, Serialize)]
pub struct BuildInfo {
    pub service: &'static str,
    pub version: &'static str,
}

/// Cloneable (Arc) handle shared across all Axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub supervisor: Arc<Supervisor>,
    pub build: BuildInfo,
    /// Directory of per-account config files (`<account>.yaml`).
    pub config_dir: PathBuf,
    /// Broadcast bus for SSE.
    pub bus: broadcast::Sender<BusMsg>,
}

impl AppState {
    pub fn new(supervisor: Arc<Supervisor>, config_dir: PathBuf) -> Self {
        let (bus, _rx) = broadcast::channel::<BusMsg>(1024);

        // Forward engine statuses from the supervisor bus onto the SSE bus.
        let mut feed = supervisor.subscribe_status();
        let bus_tx = bus.clone();
        tokio::spawn(async move {
            loop {
                match feed.recv().await {
                    Ok(status) => {
                        let _ = bus_tx.send(BusMsg::Status(status));
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        // Best-effort channel: viewers key on the newest
                        // snapshot, so dropped intermediates are fine.
                        tracing::debug!(skipped, "status feed lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        Self {
            supervisor,
            build: BuildInfo {
                service: "pit-daemon",
                version: env!("CARGO_PKG_VERSION"),
            },
            config_dir,
            bus,
        }
    }

    pub fn config_path(&self, account: &str) -> PathBuf {
        self.config_dir.join(format!("{account}.yaml"))
    }
}

/// Periodic keep-alive on the SSE bus so idle streams stay visibly live.
pub fn spawn_heartbeat(bus: broadcast::Sender<BusMsg>, period: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            let _ = bus.send(BusMsg::Heartbeat {
                ts_millis: chrono::Utc::now().timestamp_millis(),
            });
        }
    });
}
