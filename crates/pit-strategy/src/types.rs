use std::collections::BTreeMap;

use pit_schemas::{Bar, Position, Quote, Side, Timeframe};

/// Bounded recent-bars window. Keeps the most recent bars (tail) up to
/// `max_len`; truncation is deterministic.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecentBars {
    max_len: usize,
    bars: Vec<Bar>,
}

impl RecentBars {
    pub fn new(max_len: usize, mut bars: Vec<Bar>) -> Self {
        debug_assert!(max_len > 0);
        if bars.len() > max_len {
            let start = bars.len() - max_len;
            bars = bars.split_off(start);
        }
        Self { max_len, bars }
    }

    pub fn push(&mut self, bar: Bar) {
        self.bars.push(bar);
        if self.bars.len() > self.max_len {
            self.bars.remove(0);
        }
    }

    /// Completed candles only, oldest first.
    pub fn completed(&self) -> impl Iterator<Item = &Bar> {
        self.bars.iter().filter(|b| b.complete)
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn as_slice(&self) -> &[Bar] {
        &self.bars
    }
}

/// Deterministic inputs for one strategy evaluation. No IO handles.
#[derive(Clone, Debug)]
pub struct MarketState {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub quote: Quote,
    pub bars: RecentBars,
    pub open_position_count: u32,
}

/// An entry intent. Prices are micros; volume is sized later by the engine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EntrySignal {
    pub side: Side,
    /// 0 = no stop loss.
    pub sl_micros: i64,
    /// 0 = no take profit.
    pub tp_micros: i64,
    /// Short free-text tag surfaced in logs/status ("aggressive engulfing").
    pub comment: String,
}

/// What an exit strategy wants done with the pair's open positions.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CloseDecision {
    pub close_tickets: Vec<u64>,
    /// ticket → new stop-loss price.
    pub sl_updates: BTreeMap<u64, i64>,
}

impl CloseDecision {
    pub fn is_empty(&self) -> bool {
        self.close_tickets.is_empty() && self.sl_updates.is_empty()
    }
}

/// Entry capability: look at the market, maybe ask for a position.
pub trait EntryStrategy: Send {
    fn name(&self) -> &'static str;

    fn evaluate_entry(&mut self, market: &MarketState) -> Option<EntrySignal>;
}

/// Exit capability: look at the pair's open positions, maybe close or
/// re-protect them.
pub trait ExitStrategy: Send {
    fn name(&self) -> &'static str;

    fn evaluate_exit(
        &mut self,
        positions: &[Position],
        market: &MarketState,
    ) -> Option<CloseDecision>;
}
