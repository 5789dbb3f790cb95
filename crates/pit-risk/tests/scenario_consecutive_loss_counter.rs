//! Consecutive-loss accounting.
//!
//! Invariants under test:
//! 1. The counter increments on losing trades and resets to zero on any
//!    profitable trade.
//! 2. The governor fires once the counter reaches the configured maximum.
//! 3. A fresh session (RUNNING re-entry after cooldown) starts at zero.

use pit_risk::*;

const M: i64 = 1_000_000;

fn limits_with_loss_stop(max: u32) -> RiskLimits {
    RiskLimits {
        profit_target: Threshold::Percent(500_000),
        loss_limit: Threshold::Percent(500_000),
        equity_stop: Threshold::Amount(0),
        drawdown_mode: DrawdownMode::InitialBalance,
        gradual_stop_frac: None,
        max_consecutive_losses: Some(max),
        rule_priority: RiskLimits::default_priority(),
    }
}

#[test]
fn winning_trade_resets_the_counter() {
    let mut stats = SessionStats::new(0, 1_000 * M, 1_000 * M);

    stats.record_trade_result(-10 * M);
    stats.record_trade_result(-5 * M);
    assert_eq!(stats.consecutive_losses, 2);

    stats.record_trade_result(3 * M);
    assert_eq!(stats.consecutive_losses, 0);
    assert_eq!(stats.trade_count, 3);
    assert_eq!(stats.realized_pnl_micros, -12 * M);
}

#[test]
fn governor_fires_at_the_configured_maximum() {
    let limits = limits_with_loss_stop(3);
    let mut stats = SessionStats::new(0, 1_000 * M, 1_000 * M);
    let inp = RiskInput {
        balance_micros: 1_000 * M,
        equity_micros: 990 * M,
    };

    stats.record_trade_result(-2 * M);
    stats.record_trade_result(-3 * M);
    assert!(evaluate(&limits, &stats, &inp).is_none());

    stats.record_trade_result(-5 * M);
    let t = evaluate(&limits, &stats, &inp).expect("third loss must fire");
    assert_eq!(t.rule, RiskRule::ConsecutiveLoss);
}

#[test]
fn fresh_session_starts_at_zero() {
    let mut stats = SessionStats::new(0, 1_000 * M, 1_000 * M);
    stats.record_trade_result(-2 * M);
    stats.record_trade_result(-3 * M);

    // Cooldown elapsed; the engine re-baselines with a new stats value.
    let stats = SessionStats::new(3_600, 995 * M, 995 * M);
    assert_eq!(stats.consecutive_losses, 0);
    assert_eq!(stats.trade_count, 0);
}
