//! Broker Gateway contract.
//!
//! The engine treats its broker as an unreliable remote dependency behind
//! this object-safe trait: every call can fail, and failures are per-call
//! (the next tick retries nothing except by virtue of running again).
//!
//! The trait is synchronous by design. A single engine tick is the only
//! caller for its account and ticks never overlap, so adapters that speak a
//! real wire protocol own their own blocking/runtime concerns internally.

mod error;
mod types;

pub use error::BrokerError;
pub use types::{AccountSnapshot, OrderRequest, PlacedOrder};

use pit_schemas::{Bar, Position, Quote, Timeframe};

pub trait BrokerGateway: Send {
    /// Balance and equity as the broker currently reports them.
    fn account(&self) -> Result<AccountSnapshot, BrokerError>;

    /// Current top-of-book quote for a symbol.
    fn quote(&self, symbol: &str) -> Result<Quote, BrokerError>;

    /// Most recent candles, oldest first. The last bar may be incomplete.
    fn recent_bars(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        count: usize,
    ) -> Result<Vec<Bar>, BrokerError>;

    /// Submit a market order. A success means the broker confirmed the fill
    /// and the returned ticket identifies the resulting open position.
    fn place_order(&mut self, req: &OrderRequest) -> Result<PlacedOrder, BrokerError>;

    /// Close an open position. Returns the realized profit in micros once
    /// the broker confirms the close.
    fn close_position(&mut self, ticket: u64) -> Result<i64, BrokerError>;

    /// Open positions, optionally filtered by magic number.
    fn open_positions(&self, magic: Option<i64>) -> Result<Vec<Position>, BrokerError>;

    /// Update the stop-loss attached to an open position.
    fn modify_stop_loss(&mut self, ticket: u64, sl_micros: i64) -> Result<(), BrokerError>;
}
