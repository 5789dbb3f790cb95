//! End-to-end risk → cooldown → resume scenario.
//!
//! RiskConfig: $100 amount loss limit, initial_balance drawdown mode,
//! $1,000 starting balance, 1-hour duration cooldown.
//!
//! Invariants under test:
//! 1. A tick sequence driving equity to $895 triggers COOLDOWN with a resume
//!    timestamp computed from the duration policy.
//! 2. The triggering verdict is reproducible from the recorded stats.
//! 3. Equity recovering above $900 before the resume time does NOT re-enter
//!    RUNNING early.
//! 4. Once the resume time passes, the session re-baselines to the current
//!    balance and the engine runs again.

use pit_config::parse_account_config;
use pit_engine::TradingEngine;
use pit_risk::{evaluate, RiskInput, RiskRule};
use pit_schemas::{EngineMode, Timeframe};
use pit_strategy::builtin_registry;
use pit_testkit::{weekday, SharedBroker};

const M: i64 = 1_000_000;

const CONFIG: &str = r#"
account: "882140"
broker_path: "/terminals/mt5-a"
risk:
  profit_target: { type: percent, value: 10.0 }
  loss_limit: { type: amount, value: 100.0 }
  drawdown_mode: initial_balance
order_control:
  max_concurrent_trades: 2
  order_cooldown_secs: 30
cooldown:
  mode: duration
  hours: 1
  minutes: 0
pairs:
  - symbol: EURUSD
    timeframe: M1
    magic: 770001
    entry_strategy: { id: explosive_breakout }
    lot_sizing: { mode: fixed, lots: 0.1 }
"#;

fn quiet_broker() -> SharedBroker {
    let broker = SharedBroker::new(1_000 * M);
    broker.with(|b| {
        b.set_quote("EURUSD", 1_100_000, 1_100_100, weekday(9, 0));
        b.set_bars("EURUSD", Timeframe::M1, Vec::new());
    });
    broker
}

#[test]
fn scenario_drawdown_cooldown_no_early_resume() {
    let config = parse_account_config(CONFIG).unwrap();
    let limits = config.limits.clone();
    let registry = builtin_registry();
    let broker = quiet_broker();

    let mut engine =
        TradingEngine::start(config, broker.gateway(), &registry, weekday(9, 0)).expect("start");
    assert_eq!(engine.mode(), EngineMode::Running);

    // Equity at balance: inside the band.
    let status = engine.tick(weekday(9, 1));
    assert_eq!(status.mode, EngineMode::Running);
    assert_eq!(status.equity_micros, 1_000 * M);

    // Drive equity to $895, below the $900 loss threshold.
    broker.with(|b| b.override_equity(Some(895 * M)));
    let status = engine.tick(weekday(9, 5));
    assert_eq!(status.mode, EngineMode::Cooldown);
    assert_eq!(status.cooldown_until_utc, Some(weekday(10, 5)));

    // The verdict replays exactly from the recorded stats snapshot.
    let trigger = engine.last_trigger().expect("trigger recorded").clone();
    assert_eq!(trigger.rule, RiskRule::LossLimit);
    assert_eq!(trigger.threshold_micros, 900 * M);
    let replay = evaluate(
        &limits,
        engine.session_stats(),
        &RiskInput {
            balance_micros: 1_000 * M,
            equity_micros: trigger.equity_micros,
        },
    );
    assert_eq!(replay.as_ref(), Some(&trigger));

    // Recovery above $900 before the resume time must NOT resume early.
    broker.with(|b| b.override_equity(Some(905 * M)));
    let status = engine.tick(weekday(9, 30));
    assert_eq!(status.mode, EngineMode::Cooldown);
    let status = engine.tick(weekday(10, 4));
    assert_eq!(status.mode, EngineMode::Cooldown);

    // Past the resume time: RUNNING with a fresh session baseline.
    let status = engine.tick(weekday(10, 6));
    assert_eq!(status.mode, EngineMode::Running);
    assert_eq!(status.cooldown_until_utc, None);
    assert_eq!(engine.session_stats().consecutive_losses, 0);
    assert_eq!(engine.session_stats().initial_balance_micros, 1_000 * M);
    assert!(engine.last_trigger().is_none());

    // Healthy equity in the fresh session keeps the engine up.
    broker.with(|b| b.override_equity(Some(1_000 * M)));
    let status = engine.tick(weekday(10, 7));
    assert_eq!(status.mode, EngineMode::Running);
}

#[test]
fn scenario_profit_target_also_ends_the_session() {
    let config = parse_account_config(CONFIG).unwrap();
    let registry = builtin_registry();
    let broker = quiet_broker();

    let mut engine =
        TradingEngine::start(config, broker.gateway(), &registry, weekday(9, 0)).expect("start");

    broker.with(|b| b.override_equity(Some(1_150 * M))); // +15% > +10% target
    let status = engine.tick(weekday(9, 1));
    assert_eq!(status.mode, EngineMode::Cooldown);
    assert_eq!(
        engine.last_trigger().map(|tr| tr.rule),
        Some(RiskRule::ProfitTarget)
    );
}

#[test]
fn scenario_status_seq_is_monotonic() {
    let config = parse_account_config(CONFIG).unwrap();
    let registry = builtin_registry();
    let broker = quiet_broker();

    let mut engine =
        TradingEngine::start(config, broker.gateway(), &registry, weekday(9, 0)).expect("start");

    let mut last_seq = 0;
    for minute in 1..6 {
        let status = engine.tick(weekday(9, minute));
        assert!(status.seq > last_seq, "seq must increase monotonically");
        last_seq = status.seq;
    }
}
