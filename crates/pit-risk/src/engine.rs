use crate::{
    DrawdownMode, RiskInput, RiskLimits, RiskRule, RiskTrigger, SessionStats, Threshold,
    MICROS_SCALE,
};

/// `value * frac / 1e6` with an i128 intermediate so large balances cannot
/// overflow. Saturates instead of wrapping on absurd inputs.
fn frac_micros(value: i64, frac: i64) -> i64 {
    let v = value as i128 * frac as i128 / MICROS_SCALE as i128;
    if v > i64::MAX as i128 {
        i64::MAX
    } else if v < i64::MIN as i128 {
        i64::MIN
    } else {
        v as i64
    }
}

/// Baseline for percent-expressed drawdown thresholds.
fn drawdown_base(limits: &RiskLimits, stats: &SessionStats) -> i64 {
    match limits.drawdown_mode {
        DrawdownMode::PeakEquity => stats.peak_equity_micros,
        DrawdownMode::InitialBalance => stats.initial_balance_micros,
    }
}

/// Equity level at which the loss limit fires.
///
/// Amount-typed limits are measured from the session's initial balance;
/// percent-typed limits are measured from the drawdown baseline.
pub fn loss_threshold(limits: &RiskLimits, stats: &SessionStats) -> i64 {
    match limits.loss_limit {
        Threshold::Amount(v) => stats.initial_balance_micros.saturating_sub(v),
        Threshold::Percent(p) => frac_micros(drawdown_base(limits, stats), MICROS_SCALE - p),
    }
}

/// Equity level at which the profit target fires. Always measured from the
/// initial balance, independent of the drawdown mode.
pub fn profit_threshold(limits: &RiskLimits, stats: &SessionStats) -> i64 {
    match limits.profit_target {
        Threshold::Amount(v) => stats.initial_balance_micros.saturating_add(v),
        Threshold::Percent(p) => frac_micros(stats.initial_balance_micros, MICROS_SCALE + p),
    }
}

/// Hard equity floor, or `None` when disabled.
fn equity_stop_level(limits: &RiskLimits, stats: &SessionStats) -> Option<i64> {
    if limits.equity_stop.is_disabled() {
        return None;
    }
    Some(match limits.equity_stop {
        Threshold::Amount(v) => v,
        Threshold::Percent(p) => frac_micros(stats.initial_balance_micros, p),
    })
}

/// Equity level at which the configured share of the loss-limit distance has
/// been incurred. Fires strictly above the full loss threshold.
pub fn gradual_stop_threshold(limits: &RiskLimits, stats: &SessionStats, frac: i64) -> i64 {
    let full = loss_threshold(limits, stats);
    let reference = match limits.loss_limit {
        Threshold::Amount(_) => stats.initial_balance_micros,
        Threshold::Percent(_) => drawdown_base(limits, stats),
    };
    let distance = reference.saturating_sub(full);
    reference.saturating_sub(frac_micros(distance, frac))
}

fn trigger(rule: RiskRule, threshold_micros: i64, inp: &RiskInput) -> Option<RiskTrigger> {
    Some(RiskTrigger {
        rule,
        threshold_micros,
        equity_micros: inp.equity_micros,
    })
}

/// Evaluate the session against its limits for one tick.
///
/// Rules run in `limits.rule_priority` order; the first match wins and is
/// returned as the single verdict for the tick. Returns `None` when no rule
/// fires. Negative equity or balance cannot occur in a real account, so a
/// negative input is treated as a fail-closed [`RiskRule::BadInput`] trigger
/// before any rule is consulted.
pub fn evaluate(
    limits: &RiskLimits,
    stats: &SessionStats,
    inp: &RiskInput,
) -> Option<RiskTrigger> {
    if inp.equity_micros < 0 || inp.balance_micros < 0 {
        return trigger(RiskRule::BadInput, 0, inp);
    }

    for rule in &limits.rule_priority {
        match rule {
            RiskRule::EquityStop => {
                if let Some(level) = equity_stop_level(limits, stats) {
                    if inp.equity_micros <= level {
                        return trigger(RiskRule::EquityStop, level, inp);
                    }
                }
            }
            RiskRule::LossLimit => {
                let level = loss_threshold(limits, stats);
                if inp.equity_micros <= level {
                    return trigger(RiskRule::LossLimit, level, inp);
                }
            }
            RiskRule::ProfitTarget => {
                let level = profit_threshold(limits, stats);
                if inp.equity_micros >= level {
                    return trigger(RiskRule::ProfitTarget, level, inp);
                }
            }
            RiskRule::GradualStop => {
                if let Some(frac) = limits.gradual_stop_frac {
                    let level = gradual_stop_threshold(limits, stats, frac);
                    if inp.equity_micros <= level {
                        return trigger(RiskRule::GradualStop, level, inp);
                    }
                }
            }
            RiskRule::ConsecutiveLoss => {
                if let Some(max) = limits.max_consecutive_losses {
                    if max > 0 && stats.consecutive_losses >= max {
                        return trigger(RiskRule::ConsecutiveLoss, 0, inp);
                    }
                }
            }
            // Never configured into the priority list; handled above.
            RiskRule::BadInput => {}
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const M: i64 = MICROS_SCALE;

    fn limits() -> RiskLimits {
        RiskLimits {
            profit_target: Threshold::Amount(200 * M),
            loss_limit: Threshold::Amount(100 * M),
            equity_stop: Threshold::Amount(0),
            drawdown_mode: DrawdownMode::InitialBalance,
            gradual_stop_frac: None,
            max_consecutive_losses: None,
            rule_priority: RiskLimits::default_priority(),
        }
    }

    #[test]
    fn amount_loss_limit_measured_from_initial_balance() {
        let stats = SessionStats::new(0, 1_000 * M, 1_000 * M);
        assert_eq!(loss_threshold(&limits(), &stats), 900 * M);
    }

    #[test]
    fn percent_loss_limit_tracks_peak_equity_baseline() {
        let mut l = limits();
        l.loss_limit = Threshold::Percent(50_000); // 5%
        l.drawdown_mode = DrawdownMode::PeakEquity;
        let mut stats = SessionStats::new(0, 1_000 * M, 1_000 * M);
        stats.observe_equity(1_200 * M);
        assert_eq!(loss_threshold(&l, &stats), 1_140 * M);
    }

    #[test]
    fn profit_target_percent_always_off_initial_balance() {
        let mut l = limits();
        l.profit_target = Threshold::Percent(100_000); // 10%
        l.drawdown_mode = DrawdownMode::PeakEquity;
        let mut stats = SessionStats::new(0, 1_000 * M, 1_000 * M);
        stats.observe_equity(5_000 * M);
        assert_eq!(profit_threshold(&l, &stats), 1_100 * M);
    }

    #[test]
    fn negative_equity_is_bad_input() {
        let stats = SessionStats::new(0, 1_000 * M, 1_000 * M);
        let t = evaluate(
            &limits(),
            &stats,
            &RiskInput {
                balance_micros: 1_000 * M,
                equity_micros: -1,
            },
        )
        .expect("bad input must fire");
        assert_eq!(t.rule, RiskRule::BadInput);
    }

    #[test]
    fn no_rule_fires_inside_the_band() {
        let stats = SessionStats::new(0, 1_000 * M, 1_000 * M);
        let v = evaluate(
            &limits(),
            &stats,
            &RiskInput {
                balance_micros: 1_000 * M,
                equity_micros: 1_050 * M,
            },
        );
        assert!(v.is_none());
    }
}
