/// 1e-6 fixed-point scale (local copy; this crate depends on nothing).
pub const MICROS_SCALE: i64 = 1_000_000;

/// A configured limit value: an absolute account-currency amount or a
/// fraction of the drawdown baseline.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Threshold {
    /// Micros of account currency.
    Amount(i64),
    /// Micros fraction of 1 (50_000 = 5%).
    Percent(i64),
}

impl Threshold {
    pub fn is_disabled(&self) -> bool {
        matches!(self, Threshold::Amount(0) | Threshold::Percent(0))
    }
}

/// Baseline used for percent-expressed thresholds.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DrawdownMode {
    /// Highest equity observed this session.
    PeakEquity,
    /// Balance at session start.
    InitialBalance,
}

/// The individual rules the governor can fire, also used as reason codes.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RiskRule {
    EquityStop,
    LossLimit,
    ProfitTarget,
    GradualStop,
    ConsecutiveLoss,
    /// Input failed sanity validation (negative equity/balance). Checked
    /// before every rule pass; never part of the configured priority order.
    BadInput,
}

impl RiskRule {
    pub fn code(&self) -> &'static str {
        match self {
            RiskRule::EquityStop => "EQUITY_STOP",
            RiskRule::LossLimit => "LOSS_LIMIT",
            RiskRule::ProfitTarget => "PROFIT_TARGET",
            RiskRule::GradualStop => "GRADUAL_STOP",
            RiskRule::ConsecutiveLoss => "CONSECUTIVE_LOSS",
            RiskRule::BadInput => "BAD_INPUT",
        }
    }
}

/// Session risk limits. Built from the account config file; immutable for
/// the lifetime of one engine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RiskLimits {
    pub profit_target: Threshold,
    pub loss_limit: Threshold,
    /// Hard equity floor. Disabled when the configured value is zero.
    pub equity_stop: Threshold,
    pub drawdown_mode: DrawdownMode,
    /// Fraction (micros of 1) of the loss-limit distance that triggers the
    /// gradual stop. `None` disables the rule.
    pub gradual_stop_frac: Option<i64>,
    /// Maximum tolerated consecutive losing trades. `None` disables.
    pub max_consecutive_losses: Option<u32>,
    /// Evaluation order. First matching rule wins.
    pub rule_priority: Vec<RiskRule>,
}

impl RiskLimits {
    /// The documented default precedence:
    /// equity stop > loss limit > profit target > gradual stop > consecutive losses.
    pub fn default_priority() -> Vec<RiskRule> {
        vec![
            RiskRule::EquityStop,
            RiskRule::LossLimit,
            RiskRule::ProfitTarget,
            RiskRule::GradualStop,
            RiskRule::ConsecutiveLoss,
        ]
    }

    pub fn sane_defaults() -> Self {
        Self {
            profit_target: Threshold::Percent(100_000),
            loss_limit: Threshold::Percent(50_000),
            equity_stop: Threshold::Amount(0),
            drawdown_mode: DrawdownMode::InitialBalance,
            gradual_stop_frac: None,
            max_consecutive_losses: None,
            rule_priority: Self::default_priority(),
        }
    }
}

/// Running statistics for one RUNNING period. Reset whenever a fresh session
/// begins after cooldown.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionStats {
    /// Unix seconds at session start.
    pub started_at_unix: i64,
    pub initial_balance_micros: i64,
    pub peak_equity_micros: i64,
    pub realized_pnl_micros: i64,
    pub consecutive_losses: u32,
    pub trade_count: u32,
}

impl SessionStats {
    pub fn new(started_at_unix: i64, balance_micros: i64, equity_micros: i64) -> Self {
        Self {
            started_at_unix,
            initial_balance_micros: balance_micros,
            peak_equity_micros: equity_micros,
            realized_pnl_micros: 0,
            consecutive_losses: 0,
            trade_count: 0,
        }
    }

    /// Peak equity is monotonic within a session.
    pub fn observe_equity(&mut self, equity_micros: i64) {
        if equity_micros > self.peak_equity_micros {
            self.peak_equity_micros = equity_micros;
        }
    }

    /// Record a closed trade. Any profitable trade resets the
    /// consecutive-loss counter; a losing trade increments it.
    pub fn record_trade_result(&mut self, profit_micros: i64) {
        self.trade_count += 1;
        self.realized_pnl_micros += profit_micros;
        if profit_micros < 0 {
            self.consecutive_losses += 1;
        } else {
            self.consecutive_losses = 0;
        }
    }
}

/// Inputs for one risk evaluation tick.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RiskInput {
    pub balance_micros: i64,
    pub equity_micros: i64,
}

/// A fired rule, with enough context to reproduce the verdict from the
/// stats snapshot at the triggering tick.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RiskTrigger {
    pub rule: RiskRule,
    /// The computed level the equity was compared against (0 for rules
    /// that do not compare equity, e.g. consecutive losses).
    pub threshold_micros: i64,
    pub equity_micros: i64,
}

impl std::fmt::Display for RiskTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} (equity {} vs threshold {})",
            self.rule.code(),
            self.equity_micros,
            self.threshold_micros
        )
    }
}
