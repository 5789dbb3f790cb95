use pit_schemas::Side;
use serde::{Deserialize, Serialize};

/// Balance/equity snapshot from the broker.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSnapshot {
    pub balance_micros: i64,
    /// Balance plus unrealized P/L of open positions.
    pub equity_micros: i64,
}

/// A market order intent, fully sized and tagged.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub symbol: String,
    pub side: Side,
    /// Lot volume in micros.
    pub volume_micros: i64,
    /// 0 = no stop loss.
    pub sl_micros: i64,
    /// 0 = no take profit.
    pub tp_micros: i64,
    /// Order tag tying the position back to one pair/strategy.
    pub magic: i64,
}

/// Broker confirmation of a filled market order.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacedOrder {
    pub ticket: u64,
    pub fill_price_micros: i64,
}
