//! Shared wire types for the PitBoss workspace.
//!
//! Everything here is plain data: serde-serializable, no IO, no behavior
//! beyond small constructors and formatting helpers. The status types are
//! the contract between an engine and every downstream consumer (supervisor,
//! daemon, SSE viewers), so changes here are wire-format changes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 1e-6 fixed-point scale. All money amounts in the workspace are i64 micros
/// (1_000_000 = 1.0 account-currency unit); percentages are micros fractions
/// of 1 (50_000 = 5%).
pub const MICROS_SCALE: i64 = 1_000_000;

/// Stable account identity (broker login number as a string).
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(pub String);

impl AccountId {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for AccountId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Order direction.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn opposite(&self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

/// Chart timeframes supported by pair configs and the next-candle cooldown.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Timeframe {
    M1,
    M5,
    M15,
    M30,
    H1,
    H4,
    D1,
}

impl Timeframe {
    /// Candle length in seconds.
    pub fn secs(&self) -> i64 {
        match self {
            Timeframe::M1 => 60,
            Timeframe::M5 => 300,
            Timeframe::M15 => 900,
            Timeframe::M30 => 1_800,
            Timeframe::H1 => 3_600,
            Timeframe::H4 => 14_400,
            Timeframe::D1 => 86_400,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::M1 => "M1",
            Timeframe::M5 => "M5",
            Timeframe::M15 => "M15",
            Timeframe::M30 => "M30",
            Timeframe::H1 => "H1",
            Timeframe::H4 => "H4",
            Timeframe::D1 => "D1",
        }
    }
}

/// A completed (or forming) price candle.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bar {
    pub end_ts_utc: DateTime<Utc>,
    pub open_micros: i64,
    pub high_micros: i64,
    pub low_micros: i64,
    pub close_micros: i64,
    pub volume: i64,
    /// False for the still-forming current candle.
    pub complete: bool,
}

impl Bar {
    /// Signed body size; positive for a bullish candle.
    pub fn body_micros(&self) -> i64 {
        self.close_micros - self.open_micros
    }

    pub fn is_bullish(&self) -> bool {
        self.close_micros > self.open_micros
    }
}

/// A two-sided top-of-book quote.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    pub symbol: String,
    pub bid_micros: i64,
    pub ask_micros: i64,
    pub ts_utc: DateTime<Utc>,
}

impl Quote {
    pub fn spread_micros(&self) -> i64 {
        self.ask_micros - self.bid_micros
    }
}

/// A broker-side open position mirrored locally.
///
/// Created when `place_order` succeeds; removed when the close is confirmed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub symbol: String,
    pub ticket: u64,
    pub side: Side,
    /// Lot volume in micros (100_000 = 0.1 lots).
    pub volume_micros: i64,
    pub open_price_micros: i64,
    /// 0 = no stop loss attached.
    pub sl_micros: i64,
    /// 0 = no take profit attached.
    pub tp_micros: i64,
    /// Order tag associating the position with one pair/strategy.
    pub magic: i64,
    pub opened_at_utc: DateTime<Utc>,
}

/// Trading Engine lifecycle mode.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineMode {
    Offline,
    Running,
    Cooldown,
    Stopping,
}

impl EngineMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineMode::Offline => "OFFLINE",
            EngineMode::Running => "RUNNING",
            EngineMode::Cooldown => "COOLDOWN",
            EngineMode::Stopping => "STOPPING",
        }
    }
}

impl std::fmt::Display for EngineMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-pair slice of an engine status snapshot.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairStatus {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub entry_strategy: String,
    pub exit_strategy: Option<String>,
    pub bid_micros: i64,
    pub spread_micros: i64,
    pub open_positions: u32,
    /// Set when the pair failed activation or was disabled mid-session.
    pub disabled_reason: Option<String>,
}

/// Point-in-time engine snapshot, emitted at least once per tick and at every
/// mode transition.
///
/// Delivery is best-effort and latest-value-wins: consumers must key on
/// `seq`/`ts_utc` rather than assume they saw every emission. `seq` is
/// monotonically increasing within one account.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineStatus {
    pub account: AccountId,
    pub session_id: Uuid,
    pub seq: u64,
    pub ts_utc: DateTime<Utc>,
    pub mode: EngineMode,
    /// Human-readable one-liner for dashboards.
    pub status_line: String,
    pub uptime_secs: u64,
    pub balance_micros: i64,
    pub equity_micros: i64,
    pub session_pnl_micros: i64,
    /// Resume time while in cooldown.
    pub cooldown_until_utc: Option<DateTime<Utc>>,
    /// Hash of the config revision this session runs.
    pub config_hash: String,
    pub pairs: Vec<PairStatus>,
}

impl EngineStatus {
    /// Terminal snapshot emitted as the last message before an engine exits.
    pub fn offline(account: AccountId, session_id: Uuid, seq: u64, ts_utc: DateTime<Utc>) -> Self {
        Self {
            account,
            session_id,
            seq,
            ts_utc,
            mode: EngineMode::Offline,
            status_line: "Engine offline.".to_string(),
            uptime_secs: 0,
            balance_micros: 0,
            equity_micros: 0,
            session_pnl_micros: 0,
            cooldown_until_utc: None,
            config_hash: String::new(),
            pairs: Vec::new(),
        }
    }
}

/// How an engine execution context ended.
///
/// Returned by the engine task so the supervisor can classify terminated
/// sessions without relying solely on heartbeat age.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EngineExit {
    /// Graceful shutdown completed (positions closed, OFFLINE emitted).
    Normal,
    /// The engine aborted with an error before or during its run.
    Failed { reason: String },
}
