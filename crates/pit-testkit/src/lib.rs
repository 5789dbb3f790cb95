//! Shared scenario helpers for sibling crates' `tests/` directories.
//!
//! The central piece is [`SharedBroker`]: a cloneable handle over one
//! [`PaperBroker`] so a test can keep scripting quotes/equity/failures
//! while an engine owns its own `Box<dyn BrokerGateway>` view of the same
//! underlying state.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, TimeZone, Utc};
use pit_broker::{AccountSnapshot, BrokerError, BrokerGateway, OrderRequest, PlacedOrder};
use pit_broker_paper::PaperBroker;
use pit_schemas::{Bar, Position, Quote, Timeframe};

/// Cloneable handle over a paper broker. Every clone (and every boxed
/// gateway made from it) sees the same state.
#[derive(Clone)]
pub struct SharedBroker {
    inner: Arc<Mutex<PaperBroker>>,
}

impl SharedBroker {
    pub fn new(balance_micros: i64) -> Self {
        Self {
            inner: Arc::new(Mutex::new(PaperBroker::new(balance_micros))),
        }
    }

    /// A gateway box for handing to an engine.
    pub fn gateway(&self) -> Box<dyn BrokerGateway> {
        Box::new(self.clone())
    }

    /// Script the underlying broker.
    pub fn with<R>(&self, f: impl FnOnce(&mut PaperBroker) -> R) -> R {
        let mut guard = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut guard)
    }
}

impl BrokerGateway for SharedBroker {
    fn account(&self) -> Result<AccountSnapshot, BrokerError> {
        self.with(|b| b.account())
    }

    fn quote(&self, symbol: &str) -> Result<Quote, BrokerError> {
        self.with(|b| b.quote(symbol))
    }

    fn recent_bars(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        count: usize,
    ) -> Result<Vec<Bar>, BrokerError> {
        self.with(|b| b.recent_bars(symbol, timeframe, count))
    }

    fn place_order(&mut self, req: &OrderRequest) -> Result<PlacedOrder, BrokerError> {
        self.with(|b| b.place_order(req))
    }

    fn close_position(&mut self, ticket: u64) -> Result<i64, BrokerError> {
        self.with(|b| b.close_position(ticket))
    }

    fn open_positions(&self, magic: Option<i64>) -> Result<Vec<Position>, BrokerError> {
        self.with(|b| b.open_positions(magic))
    }

    fn modify_stop_loss(&mut self, ticket: u64, sl_micros: i64) -> Result<(), BrokerError> {
        self.with(|b| b.modify_stop_loss(ticket, sl_micros))
    }
}

/// A mid-week instant (Wednesday 2026-03-04) for scenarios that must not
/// collide with weekend market-closure handling.
pub fn weekday(h: u32, mi: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 4, h, mi, 0).unwrap()
}

/// Bars forming an aggressive bullish engulfing on every evaluation: the
/// cheapest way to force an entry signal each tick.
pub fn engulfing_bars() -> Vec<Bar> {
    vec![
        bar(1_100_500, 1_100_600, 1_099_900, 1_100_000),
        bar(1_100_000, 1_100_800, 1_099_950, 1_100_700),
    ]
}

/// Flat, signal-free bars.
pub fn quiet_bars(n: usize) -> Vec<Bar> {
    (0..n).map(|_| bar(1_100_000, 1_100_100, 1_099_900, 1_100_050)).collect()
}

fn bar(open: i64, high: i64, low: i64, close: i64) -> Bar {
    Bar {
        end_ts_utc: weekday(9, 0),
        open_micros: open,
        high_micros: high,
        low_micros: low,
        close_micros: close,
        volume: 100,
        complete: true,
    }
}

