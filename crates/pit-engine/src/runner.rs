//! Async execution context for one engine.
//!
//! The runner owns the tick cadence and the cooperative shutdown protocol.
//! Cross-boundary communication is channels only: a `watch` stop signal in,
//! a `watch` status snapshot out (latest-value-wins, exactly the Status
//! Channel contract). The returned [`EngineExit`] is the distinguishable
//! normal/abnormal exit signal the supervisor classifies on.

use std::sync::Arc;
use std::time::Duration;

use pit_broker::BrokerGateway;
use pit_config::AccountConfig;
use pit_schemas::{EngineExit, EngineStatus};
use pit_strategy::StrategyRegistry;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use crate::{Clock, TradingEngine};

/// Supervisor-side handle for a spawned engine.
pub struct EngineControl {
    stop_tx: watch::Sender<bool>,
    status_rx: watch::Receiver<Option<EngineStatus>>,
}

impl EngineControl {
    /// Build the control/status wiring for one engine. Returns the
    /// supervisor-side handle plus the runner-side ends.
    pub fn wiring() -> (
        Self,
        watch::Receiver<bool>,
        watch::Sender<Option<EngineStatus>>,
    ) {
        let (stop_tx, stop_rx) = watch::channel(false);
        let (status_tx, status_rx) = watch::channel(None);
        (Self { stop_tx, status_rx }, stop_rx, status_tx)
    }

    /// Signal a graceful stop. Safe to call repeatedly.
    pub fn request_stop(&self) {
        let _ = self.stop_tx.send(true);
    }

    /// Latest status snapshot, if the engine emitted any yet.
    pub fn latest_status(&self) -> Option<EngineStatus> {
        self.status_rx.borrow().clone()
    }

    /// A receiver clone for additional consumers (SSE forwarders, tests).
    pub fn subscribe(&self) -> watch::Receiver<Option<EngineStatus>> {
        self.status_rx.clone()
    }
}

/// Run one engine to completion.
///
/// The loop is single-threaded cooperative: one tick = fetch state, risk
/// check, pipeline, status emission, and the next tick only begins after
/// the previous finished (missed ticks delay rather than stack). On stop:
/// close positions bounded by the shutdown timeout, emit the final OFFLINE
/// status, return. A start failure emits nothing further and returns a
/// `Failed` exit; the retry decision belongs to the operator.
pub async fn run_engine(
    config: AccountConfig,
    broker: Box<dyn BrokerGateway>,
    registry: Arc<StrategyRegistry>,
    clock: Arc<dyn Clock>,
    status_tx: watch::Sender<Option<EngineStatus>>,
    mut stop_rx: watch::Receiver<bool>,
) -> EngineExit {
    let tick_secs = config.tick_interval_secs.max(1);
    let shutdown_timeout_secs = config.shutdown_timeout_secs;
    let account = config.account.clone();

    let mut engine = match TradingEngine::start(config, broker, &registry, clock.now()) {
        Ok(engine) => engine,
        Err(e) => {
            tracing::error!(account = %account, error = %e, "engine start failed");
            return EngineExit::Failed {
                reason: e.to_string(),
            };
        }
    };

    let mut interval = tokio::time::interval(Duration::from_secs(tick_secs));
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let status = engine.tick(clock.now());
                let _ = status_tx.send(Some(status));
            }
            changed = stop_rx.changed() => {
                // A dropped sender means the supervisor is gone; stop too.
                if changed.is_err() || *stop_rx.borrow() {
                    break;
                }
            }
        }
    }

    let status = engine.request_stop(clock.now());
    let _ = status_tx.send(Some(status));

    let deadline = tokio::time::Instant::now() + Duration::from_secs(shutdown_timeout_secs);
    loop {
        match engine.close_open_positions() {
            Ok(0) => break,
            Ok(remaining) => {
                tracing::info!(account = %account, remaining, "waiting for positions to close");
            }
            Err(e) => {
                tracing::warn!(account = %account, error = %e, "close-all pass failed");
            }
        }
        if tokio::time::Instant::now() >= deadline {
            tracing::error!(
                account = %account,
                "graceful shutdown timed out; going offline with positions possibly open"
            );
            break;
        }
        tokio::time::sleep(Duration::from_secs(1)).await;
    }

    // Terminal cleanup is unconditional: OFFLINE is always reached and the
    // final status is always emitted.
    let status = engine.finalize_shutdown(clock.now());
    let _ = status_tx.send(Some(status));

    tracing::info!(account = %account, "engine exited normally");
    EngineExit::Normal
}
