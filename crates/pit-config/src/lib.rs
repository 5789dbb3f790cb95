//! Account configuration: one YAML file per account, loaded and validated
//! before an engine ever starts.
//!
//! Validation fails fast with a descriptive error chain: a config problem
//! must be reported while the engine is still OFFLINE, never discovered
//! mid-session. The effective config is canonicalized to JSON (sorted keys)
//! and hashed with SHA-256 so status consumers can tell exactly which
//! revision a session runs.

mod hash;
mod raw;

pub use hash::config_hash;
pub use raw::RawAccountConfig;

use anyhow::{bail, Context, Result};
use chrono::NaiveTime;
use chrono_tz::Tz;
use pit_cooldown::CooldownPolicy;
use pit_risk::{DrawdownMode, LotSizing, RiskLimits, RiskRule, Threshold, MICROS_SCALE};
use pit_schemas::{AccountId, Timeframe};
use std::path::Path;

/// Validated, engine-ready account configuration. Immutable once an engine
/// starts; created here, read-only everywhere else.
#[derive(Clone, Debug)]
pub struct AccountConfig {
    pub account: AccountId,
    pub broker_path: String,
    pub timezone: Tz,
    pub tick_interval_secs: u64,
    pub shutdown_timeout_secs: u64,
    pub limits: RiskLimits,
    pub order_control: OrderControl,
    pub cooldown: CooldownPolicy,
    pub pairs: Vec<PairConfig>,
    /// SHA-256 of the canonicalized config content.
    pub config_hash: String,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct OrderControl {
    pub max_concurrent_trades: u32,
    pub order_cooldown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct PairConfig {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub magic: i64,
    pub entry: StrategyRef,
    pub exit: Option<StrategyRef>,
    pub sizing: LotSizing,
    pub contract_size: i64,
}

#[derive(Clone, Debug)]
pub struct StrategyRef {
    pub id: String,
    pub params: serde_json::Value,
}

/// Load and validate an account config file.
pub fn load_account_config(path: &Path) -> Result<AccountConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("read account config: {}", path.display()))?;
    parse_account_config(&content)
        .with_context(|| format!("invalid account config: {}", path.display()))
}

/// Parse and validate account config YAML.
pub fn parse_account_config(yaml: &str) -> Result<AccountConfig> {
    let raw: RawAccountConfig =
        serde_yaml::from_str(yaml).context("parse account config YAML")?;
    validate(raw)
}

fn validate(raw: RawAccountConfig) -> Result<AccountConfig> {
    if raw.account.trim().is_empty() {
        bail!("account id must not be empty");
    }
    if raw.broker_path.trim().is_empty() {
        bail!("broker_path must not be empty");
    }
    let timezone: Tz = raw
        .timezone
        .parse()
        .map_err(|_| anyhow::anyhow!("unknown timezone: {}", raw.timezone))?;
    if raw.tick_interval_secs == 0 {
        bail!("tick_interval_secs must be at least 1");
    }
    if raw.shutdown_timeout_secs == 0 {
        bail!("shutdown_timeout_secs must be at least 1");
    }
    if raw.order_control.max_concurrent_trades == 0 {
        bail!("order_control.max_concurrent_trades must be at least 1");
    }

    let limits = validate_risk(&raw)?;
    let cooldown = validate_cooldown(&raw)?;
    let pairs = validate_pairs(&raw)?;

    let config_hash = config_hash(&raw).context("hash account config")?;

    Ok(AccountConfig {
        account: AccountId::new(raw.account.clone()),
        broker_path: raw.broker_path.clone(),
        timezone,
        tick_interval_secs: raw.tick_interval_secs,
        shutdown_timeout_secs: raw.shutdown_timeout_secs,
        limits,
        order_control: OrderControl {
            max_concurrent_trades: raw.order_control.max_concurrent_trades,
            order_cooldown_secs: raw.order_control.order_cooldown_secs,
        },
        cooldown,
        pairs,
        config_hash,
    })
}

fn to_micros(value: f64) -> i64 {
    (value * MICROS_SCALE as f64).round() as i64
}

fn threshold(raw: &raw::RawThreshold, field: &str, allow_zero: bool) -> Result<Threshold> {
    match raw {
        raw::RawThreshold::Amount { value } => {
            if *value < 0.0 || (!allow_zero && *value == 0.0) {
                bail!("{field}: amount must be positive (got {value})");
            }
            Ok(Threshold::Amount(to_micros(*value)))
        }
        raw::RawThreshold::Percent { value } => {
            if *value <= 0.0 && !allow_zero {
                bail!("{field}: percent must be positive (got {value})");
            }
            if *value < 0.0 || *value >= 100.0 {
                bail!("{field}: percent must be within (0, 100) (got {value})");
            }
            // Percent of 1: 5% → 50_000 micros.
            Ok(Threshold::Percent(to_micros(*value / 100.0)))
        }
    }
}

fn validate_risk(raw: &RawAccountConfig) -> Result<RiskLimits> {
    let profit_target = threshold(&raw.risk.profit_target, "risk.profit_target", false)?;
    let loss_limit = threshold(&raw.risk.loss_limit, "risk.loss_limit", false)?;
    let equity_stop = match &raw.risk.equity_stop {
        Some(t) => threshold(t, "risk.equity_stop", true)?,
        None => Threshold::Amount(0),
    };

    let drawdown_mode = match raw.risk.drawdown_mode.as_str() {
        "peak_equity" => DrawdownMode::PeakEquity,
        "initial_balance" => DrawdownMode::InitialBalance,
        other => bail!("risk.drawdown_mode must be peak_equity or initial_balance (got {other})"),
    };

    let gradual_stop_frac = match &raw.risk.gradual_stop {
        Some(g) if g.enabled => {
            if g.percent <= 0.0 || g.percent >= 100.0 {
                bail!(
                    "risk.gradual_stop.percent must be within (0, 100) (got {})",
                    g.percent
                );
            }
            Some(to_micros(g.percent / 100.0))
        }
        _ => None,
    };

    let max_consecutive_losses = match &raw.risk.consecutive_loss_stop {
        Some(c) if c.enabled => {
            if c.max_losses == 0 {
                bail!("risk.consecutive_loss_stop.max_losses must be at least 1");
            }
            Some(c.max_losses)
        }
        _ => None,
    };

    let rule_priority = match &raw.risk.rule_priority {
        None => RiskLimits::default_priority(),
        Some(names) => parse_priority(names)?,
    };

    Ok(RiskLimits {
        profit_target,
        loss_limit,
        equity_stop,
        drawdown_mode,
        gradual_stop_frac,
        max_consecutive_losses,
        rule_priority,
    })
}

/// The priority list must be a permutation of the five rule names.
fn parse_priority(names: &[String]) -> Result<Vec<RiskRule>> {
    let mut rules = Vec::with_capacity(names.len());
    for name in names {
        let rule = match name.as_str() {
            "equity_stop" => RiskRule::EquityStop,
            "loss_limit" => RiskRule::LossLimit,
            "profit_target" => RiskRule::ProfitTarget,
            "gradual_stop" => RiskRule::GradualStop,
            "consecutive_loss" => RiskRule::ConsecutiveLoss,
            other => bail!("risk.rule_priority: unknown rule {other}"),
        };
        if rules.contains(&rule) {
            bail!("risk.rule_priority: duplicate rule {name}");
        }
        rules.push(rule);
    }
    if rules.len() != RiskLimits::default_priority().len() {
        bail!(
            "risk.rule_priority must list all {} rules",
            RiskLimits::default_priority().len()
        );
    }
    Ok(rules)
}

fn validate_cooldown(raw: &RawAccountConfig) -> Result<CooldownPolicy> {
    let c = &raw.cooldown;
    match c.mode.as_str() {
        "duration" => {
            let hours = c.hours.unwrap_or(0);
            let minutes = c.minutes.unwrap_or(0);
            if hours == 0 && minutes == 0 {
                bail!("cooldown duration must be longer than zero");
            }
            Ok(CooldownPolicy::Duration { hours, minutes })
        }
        "next_day_at" => {
            let time_str = c
                .time
                .as_deref()
                .context("cooldown.time is required for next_day_at mode")?;
            let time = NaiveTime::parse_from_str(time_str, "%H:%M")
                .with_context(|| format!("cooldown.time must be HH:MM (got {time_str})"))?;
            Ok(CooldownPolicy::NextDayAt { time })
        }
        "next_candle" => {
            let tf_str = c
                .timeframe
                .as_deref()
                .context("cooldown.timeframe is required for next_candle mode")?;
            Ok(CooldownPolicy::NextCandle {
                timeframe: parse_timeframe(tf_str)?,
            })
        }
        other => bail!("cooldown.mode must be duration, next_day_at or next_candle (got {other})"),
    }
}

fn parse_timeframe(s: &str) -> Result<Timeframe> {
    Ok(match s {
        "M1" => Timeframe::M1,
        "M5" => Timeframe::M5,
        "M15" => Timeframe::M15,
        "M30" => Timeframe::M30,
        "H1" => Timeframe::H1,
        "H4" => Timeframe::H4,
        "D1" => Timeframe::D1,
        other => bail!("unknown timeframe: {other}"),
    })
}

fn validate_pairs(raw: &RawAccountConfig) -> Result<Vec<PairConfig>> {
    if raw.pairs.is_empty() {
        bail!("at least one pair must be configured");
    }

    let mut pairs = Vec::with_capacity(raw.pairs.len());
    for p in &raw.pairs {
        if p.symbol.trim().is_empty() {
            bail!("pair symbol must not be empty");
        }
        if pairs
            .iter()
            .any(|existing: &PairConfig| existing.symbol == p.symbol)
        {
            bail!("duplicate pair symbol: {}", p.symbol);
        }
        if p.entry_strategy.id.trim().is_empty() {
            bail!("pair {}: entry_strategy.id must not be empty", p.symbol);
        }
        if p.contract_size <= 0 {
            bail!("pair {}: contract_size must be positive", p.symbol);
        }

        let sizing = match &p.lot_sizing {
            raw::RawLotSizing::Fixed { lots } => {
                if *lots <= 0.0 {
                    bail!("pair {}: fixed lots must be positive", p.symbol);
                }
                LotSizing::Fixed {
                    lots_micros: to_micros(*lots),
                }
            }
            raw::RawLotSizing::RiskPercent { percent } => {
                if *percent <= 0.0 || *percent >= 100.0 {
                    bail!(
                        "pair {}: risk percent must be within (0, 100) (got {percent})",
                        p.symbol
                    );
                }
                LotSizing::RiskPercent {
                    risk_frac_micros: to_micros(*percent / 100.0),
                }
            }
        };

        pairs.push(PairConfig {
            symbol: p.symbol.clone(),
            timeframe: parse_timeframe(&p.timeframe)
                .with_context(|| format!("pair {}", p.symbol))?,
            magic: p.magic,
            entry: StrategyRef {
                id: p.entry_strategy.id.clone(),
                params: p.entry_strategy.params.clone(),
            },
            exit: p.exit_strategy.as_ref().map(|e| StrategyRef {
                id: e.id.clone(),
                params: e.params.clone(),
            }),
            sizing,
            contract_size: p.contract_size,
        });
    }
    Ok(pairs)
}
