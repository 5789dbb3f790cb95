//! Serde model of the on-disk account config file (one YAML file per
//! account). This is the unvalidated shape; `lib.rs` converts it into the
//! typed, engine-ready [`crate::AccountConfig`] and rejects bad values with
//! descriptive errors.

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawAccountConfig {
    pub account: String,
    /// Path/identifier of the broker terminal this account trades through.
    pub broker_path: String,
    /// IANA timezone the operator schedules cooldowns in.
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default = "default_tick_interval")]
    pub tick_interval_secs: u64,
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,
    pub risk: RawRisk,
    pub order_control: RawOrderControl,
    pub cooldown: RawCooldown,
    pub pairs: Vec<RawPair>,
}

fn default_timezone() -> String {
    "UTC".to_string()
}

fn default_tick_interval() -> u64 {
    1
}

fn default_shutdown_timeout() -> u64 {
    60
}

/// An amount (account currency) or percent threshold as written in the file.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RawThreshold {
    Amount { value: f64 },
    Percent { value: f64 },
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawRisk {
    pub profit_target: RawThreshold,
    pub loss_limit: RawThreshold,
    /// Absent or zero-valued disables the hard equity floor.
    #[serde(default)]
    pub equity_stop: Option<RawThreshold>,
    pub drawdown_mode: String,
    #[serde(default)]
    pub gradual_stop: Option<RawGradualStop>,
    #[serde(default)]
    pub consecutive_loss_stop: Option<RawConsecutiveLossStop>,
    /// Permutation of the rule names; defaults to the documented order.
    #[serde(default)]
    pub rule_priority: Option<Vec<String>>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawGradualStop {
    pub enabled: bool,
    /// Percent of the loss-limit distance that triggers the stop.
    pub percent: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawConsecutiveLossStop {
    pub enabled: bool,
    pub max_losses: u32,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawOrderControl {
    pub max_concurrent_trades: u32,
    pub order_cooldown_secs: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawCooldown {
    /// "duration" | "next_day_at" | "next_candle"
    pub mode: String,
    #[serde(default)]
    pub hours: Option<u32>,
    #[serde(default)]
    pub minutes: Option<u32>,
    /// "HH:MM" for next_day_at.
    #[serde(default)]
    pub time: Option<String>,
    /// Timeframe label for next_candle.
    #[serde(default)]
    pub timeframe: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawPair {
    pub symbol: String,
    pub timeframe: String,
    pub magic: i64,
    pub entry_strategy: RawStrategyRef,
    #[serde(default)]
    pub exit_strategy: Option<RawStrategyRef>,
    pub lot_sizing: RawLotSizing,
    /// Units of base currency per full lot.
    #[serde(default = "default_contract_size")]
    pub contract_size: i64,
}

fn default_contract_size() -> i64 {
    100_000
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawStrategyRef {
    pub id: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum RawLotSizing {
    Fixed { lots: f64 },
    RiskPercent { percent: f64 },
}
