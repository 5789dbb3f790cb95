//! Start-time failure taxonomy.
//!
//! Config and connectivity problems keep the engine OFFLINE with a typed
//! error; a pair-level strategy failure disables that pair only; a start
//! during the weekend succeeds into COOLDOWN until the market opens.

use chrono::{TimeZone, Utc};
use pit_config::parse_account_config;
use pit_engine::{EngineError, TradingEngine};
use pit_schemas::{EngineMode, Timeframe};
use pit_strategy::builtin_registry;
use pit_testkit::{weekday, SharedBroker};

const M: i64 = 1_000_000;

fn config_with_pairs(pairs: &str) -> String {
    format!(
        r#"
account: "882140"
broker_path: "/terminals/mt5-a"
risk:
  profit_target: {{ type: percent, value: 10.0 }}
  loss_limit: {{ type: amount, value: 100.0 }}
  drawdown_mode: initial_balance
order_control:
  max_concurrent_trades: 2
  order_cooldown_secs: 30
cooldown:
  mode: duration
  hours: 1
  minutes: 0
pairs:
{pairs}
"#
    )
}

fn good_broker() -> SharedBroker {
    let broker = SharedBroker::new(1_000 * M);
    broker.with(|b| {
        b.set_quote("EURUSD", 1_100_000, 1_100_100, weekday(9, 0));
        b.set_bars("EURUSD", Timeframe::M1, Vec::new());
    });
    broker
}

const GOOD_PAIR: &str = r#"  - symbol: EURUSD
    timeframe: M1
    magic: 770001
    entry_strategy: { id: explosive_breakout }
    lot_sizing: { mode: fixed, lots: 0.1 }"#;

#[test]
fn scenario_unknown_strategy_everywhere_fails_start() {
    let pairs = r#"  - symbol: EURUSD
    timeframe: M1
    magic: 770001
    entry_strategy: { id: does_not_exist }
    lot_sizing: { mode: fixed, lots: 0.1 }"#;
    let cfg = parse_account_config(&config_with_pairs(pairs)).unwrap();

    let err = TradingEngine::start(cfg, good_broker().gateway(), &builtin_registry(), weekday(9, 0))
        .err()
        .expect("start must fail");
    assert_eq!(err, EngineError::NoStrategies);
}

#[test]
fn scenario_one_bad_pair_disables_only_that_pair() {
    let pairs = format!(
        "{GOOD_PAIR}\n  - symbol: GBPUSD\n    timeframe: M5\n    magic: 770002\n    entry_strategy: {{ id: does_not_exist }}\n    lot_sizing: {{ mode: fixed, lots: 0.1 }}"
    );
    let cfg = parse_account_config(&config_with_pairs(&pairs)).unwrap();
    let broker = good_broker();
    broker.with(|b| {
        b.set_quote("GBPUSD", 1_270_000, 1_270_200, weekday(9, 0));
        b.set_bars("GBPUSD", Timeframe::M5, Vec::new());
    });

    let mut engine =
        TradingEngine::start(cfg, broker.gateway(), &builtin_registry(), weekday(9, 0))
            .expect("one good pair is enough to start");
    let status = engine.tick(weekday(9, 1));
    assert_eq!(status.mode, EngineMode::Running);

    let gbp = status
        .pairs
        .iter()
        .find(|p| p.symbol == "GBPUSD")
        .expect("disabled pair still appears in status");
    let reason = gbp.disabled_reason.as_deref().expect("failure surfaced");
    assert!(reason.contains("does_not_exist"), "{reason}");
    assert!(status.pairs.iter().any(|p| p.disabled_reason.is_none()));
}

#[test]
fn scenario_broker_down_is_a_connectivity_error() {
    let cfg = parse_account_config(&config_with_pairs(GOOD_PAIR)).unwrap();
    let broker = good_broker();
    broker.with(|b| b.set_connected(false));

    let err = TradingEngine::start(cfg, broker.gateway(), &builtin_registry(), weekday(9, 0))
        .err()
        .expect("start must fail");
    assert!(matches!(err, EngineError::Connectivity(_)));
}

#[test]
fn scenario_loss_limit_at_or_above_balance_is_rejected() {
    let yaml = config_with_pairs(GOOD_PAIR).replace("value: 100.0", "value: 1000.0");
    let cfg = parse_account_config(&yaml).unwrap();

    let err = TradingEngine::start(cfg, good_broker().gateway(), &builtin_registry(), weekday(9, 0))
        .err()
        .expect("start must fail");
    assert!(matches!(err, EngineError::Config(_)), "{err}");
}

#[test]
fn scenario_weekend_start_waits_in_cooldown() {
    let cfg = parse_account_config(&config_with_pairs(GOOD_PAIR)).unwrap();
    // Saturday 2026-03-07 12:00 UTC.
    let saturday = Utc.with_ymd_and_hms(2026, 3, 7, 12, 0, 0).unwrap();

    let mut engine =
        TradingEngine::start(cfg, good_broker().gateway(), &builtin_registry(), saturday)
            .expect("weekend start succeeds into cooldown");
    assert_eq!(engine.mode(), EngineMode::Cooldown);

    let status = engine.tick(saturday + chrono::Duration::minutes(1));
    assert_eq!(status.mode, EngineMode::Cooldown);
    // FX open: Sunday 22:00 UTC.
    assert_eq!(
        status.cooldown_until_utc,
        Some(Utc.with_ymd_and_hms(2026, 3, 8, 22, 0, 0).unwrap())
    );

    // After the open, trading begins.
    let status = engine.tick(Utc.with_ymd_and_hms(2026, 3, 8, 22, 1, 0).unwrap());
    assert_eq!(status.mode, EngineMode::Running);
}
