//! Supervisor control-surface and watchdog scenarios.
//!
//! Invariants under test:
//! 1. One record per active account: a second start fails AlreadyRunning.
//! 2. Graceful stop reaches OFFLINE with a Normal exit recorded.
//! 3. A start that dies (broker down) is classified CRASHED, never healed
//!    automatically, and can be restarted only after operator action.
//! 4. Kill twice in succession never errors and leaves the record OFFLINE
//!    both times.
//! 5. Acknowledged terminated records are swept on the next watchdog tick.

use std::sync::Arc;

use pit_config::parse_account_config;
use pit_engine::ManualClock;
use pit_schemas::{AccountId, EngineExit, Timeframe};
use pit_strategy::builtin_registry;
use pit_supervisor::{ProcessHealth, Supervisor, SupervisorConfig, SupervisorError};
use pit_testkit::{quiet_bars, weekday, SharedBroker};

const M: i64 = 1_000_000;

const CONFIG: &str = r#"
account: "882140"
broker_path: "/terminals/mt5-a"
tick_interval_secs: 1
shutdown_timeout_secs: 5
risk:
  profit_target: { type: percent, value: 50.0 }
  loss_limit: { type: percent, value: 50.0 }
  drawdown_mode: initial_balance
order_control:
  max_concurrent_trades: 1
  order_cooldown_secs: 0
cooldown:
  mode: duration
  hours: 1
  minutes: 0
pairs:
  - symbol: EURUSD
    timeframe: M5
    magic: 770001
    entry_strategy: { id: explosive_breakout }
    lot_sizing: { mode: fixed, lots: 0.1 }
"#;

fn account() -> AccountId {
    AccountId::new("882140")
}

fn healthy_broker() -> SharedBroker {
    let broker = SharedBroker::new(10_000 * M);
    broker.with(|b| {
        b.set_quote("EURUSD", 1_100_000, 1_100_100, weekday(9, 0));
        b.set_bars("EURUSD", Timeframe::M5, quiet_bars(30));
    });
    broker
}

fn supervisor_over(broker: SharedBroker) -> Arc<Supervisor> {
    Arc::new(Supervisor::new(
        Arc::new(builtin_registry()),
        Arc::new(ManualClock::at(weekday(9, 0))),
        SupervisorConfig::default(),
        Box::new(move |_cfg| broker.gateway()),
    ))
}

async fn settle() {
    // Paused-clock runtimes advance timers instantly; a couple of sleeps
    // let the engine task run its first ticks.
    tokio::time::sleep(std::time::Duration::from_secs(3)).await;
}

#[tokio::test(start_paused = true)]
async fn scenario_start_is_exclusive_per_account() {
    let sup = supervisor_over(healthy_broker());
    sup.start(parse_account_config(CONFIG).unwrap()).await.unwrap();
    settle().await;

    let err = sup
        .start(parse_account_config(CONFIG).unwrap())
        .await
        .expect_err("second start must fail");
    assert_eq!(err, SupervisorError::AlreadyRunning(account()));

    // The watchdog mirrors the engine's reported mode.
    sup.watchdog_tick().await;
    let records = sup.list().await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].health, ProcessHealth::Running);
}

#[tokio::test(start_paused = true)]
async fn scenario_graceful_stop_records_normal_exit() {
    let sup = supervisor_over(healthy_broker());
    sup.start(parse_account_config(CONFIG).unwrap()).await.unwrap();
    settle().await;

    sup.stop(&account()).await.expect("graceful stop");

    let records = sup.list().await;
    assert_eq!(records[0].health, ProcessHealth::Offline);
    assert_eq!(records[0].exit, Some(EngineExit::Normal));

    // A fresh start over the terminated record succeeds.
    sup.start(parse_account_config(CONFIG).unwrap()).await.unwrap();
    settle().await;
    sup.watchdog_tick().await;
    assert_eq!(sup.list().await[0].health, ProcessHealth::Running);
}

#[tokio::test(start_paused = true)]
async fn scenario_dead_broker_start_is_classified_crashed() {
    let broker = healthy_broker();
    broker.with(|b| b.set_connected(false));
    let sup = supervisor_over(broker);

    sup.start(parse_account_config(CONFIG).unwrap()).await.unwrap();
    settle().await;

    sup.watchdog_tick().await;
    let records = sup.list().await;
    assert_eq!(records[0].health, ProcessHealth::Crashed);
    assert!(matches!(
        records[0].exit,
        Some(EngineExit::Failed { .. })
    ));

    // Not self-healed: still crashed on the next poll, until the operator
    // acknowledges (or kills and restarts).
    sup.watchdog_tick().await;
    assert_eq!(sup.list().await[0].health, ProcessHealth::Crashed);
}

#[tokio::test(start_paused = true)]
async fn scenario_kill_twice_is_idempotent() {
    let sup = supervisor_over(healthy_broker());
    sup.start(parse_account_config(CONFIG).unwrap()).await.unwrap();
    settle().await;

    sup.kill(&account()).await;
    assert_eq!(sup.list().await[0].health, ProcessHealth::Offline);

    sup.kill(&account()).await;
    assert_eq!(sup.list().await[0].health, ProcessHealth::Offline);

    // Killing an account nobody ever started is also a no-op.
    sup.kill(&AccountId::new("999999")).await;
}

#[tokio::test(start_paused = true)]
async fn scenario_acknowledged_records_are_swept() {
    let sup = supervisor_over(healthy_broker());
    sup.start(parse_account_config(CONFIG).unwrap()).await.unwrap();
    settle().await;

    sup.kill(&account()).await;
    sup.watchdog_tick().await;
    assert_eq!(sup.list().await.len(), 1, "unacknowledged records stay");

    sup.acknowledge(&account()).await.unwrap();
    sup.watchdog_tick().await;
    assert!(sup.list().await.is_empty());

    // Acknowledging an unknown account is a typed error.
    let err = sup.acknowledge(&account()).await.unwrap_err();
    assert_eq!(err, SupervisorError::UnknownAccount(account()));
}

#[tokio::test(start_paused = true)]
async fn scenario_status_snapshots_flow_to_viewers() {
    let sup = supervisor_over(healthy_broker());
    let mut feed = sup.subscribe_status();

    sup.start(parse_account_config(CONFIG).unwrap()).await.unwrap();
    settle().await;

    let status = feed.recv().await.expect("status on the bus");
    assert_eq!(status.account, account());
    assert!(status.seq >= 1);

    let direct = sup.status(&account()).await.expect("latest status");
    assert_eq!(direct.account, account());
}
