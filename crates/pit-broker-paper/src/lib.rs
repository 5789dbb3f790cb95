//! Deterministic in-memory "paper" broker adapter.
//!
//! Design decisions (kept intentionally simple and deterministic):
//! - Tickets are assigned sequentially starting at 1.
//! - Orders fill immediately at the current scripted quote (ask for buys,
//!   bid for sells). No partial fills, no slippage.
//! - Quotes, bars, balance, and failures are scripted through explicit
//!   mutators; nothing advances on its own. BTreeMap state keeps iteration
//!   order stable.
//! - Equity is balance + marked-to-market open P/L, unless a scenario pins
//!   it with [`PaperBroker::override_equity`] to drive risk thresholds
//!   without modeling fills.
//!
//! This adapter backs scenario tests and the CLI dry run; it satisfies the
//! full [`BrokerGateway`] contract.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use pit_broker::{AccountSnapshot, BrokerError, BrokerGateway, OrderRequest, PlacedOrder};
use pit_schemas::{Bar, Position, Quote, Side, Timeframe, MICROS_SCALE};

#[derive(Clone, Debug)]
pub struct PaperBroker {
    connected: bool,
    balance_micros: i64,
    equity_override: Option<i64>,
    next_ticket: u64,
    /// Units of base currency one full lot controls.
    contract_size: i64,
    quotes: BTreeMap<String, Quote>,
    /// Keyed by (symbol, timeframe seconds); oldest bar first.
    bars: BTreeMap<(String, i64), Vec<Bar>>,
    positions: BTreeMap<u64, Position>,
    reject_next_order: Option<String>,
    failing_close_tickets: BTreeSet<u64>,
}

impl PaperBroker {
    pub fn new(balance_micros: i64) -> Self {
        Self {
            connected: true,
            balance_micros,
            equity_override: None,
            next_ticket: 1,
            contract_size: 100_000,
            quotes: BTreeMap::new(),
            bars: BTreeMap::new(),
            positions: BTreeMap::new(),
            reject_next_order: None,
            failing_close_tickets: BTreeSet::new(),
        }
    }

    // -- scenario scripting -------------------------------------------------

    pub fn set_connected(&mut self, connected: bool) {
        self.connected = connected;
    }

    pub fn set_balance(&mut self, balance_micros: i64) {
        self.balance_micros = balance_micros;
    }

    /// Pin reported equity regardless of open positions. `None` restores
    /// marked-to-market behavior.
    pub fn override_equity(&mut self, equity_micros: Option<i64>) {
        self.equity_override = equity_micros;
    }

    pub fn set_quote(&mut self, symbol: &str, bid_micros: i64, ask_micros: i64, ts: DateTime<Utc>) {
        self.quotes.insert(
            symbol.to_string(),
            Quote {
                symbol: symbol.to_string(),
                bid_micros,
                ask_micros,
                ts_utc: ts,
            },
        );
    }

    pub fn set_bars(&mut self, symbol: &str, timeframe: Timeframe, bars: Vec<Bar>) {
        self.bars.insert((symbol.to_string(), timeframe.secs()), bars);
    }

    /// The next `place_order` call fails with this rejection reason.
    pub fn reject_next_order(&mut self, reason: &str) {
        self.reject_next_order = Some(reason.to_string());
    }

    /// Make `close_position` fail for this ticket until cleared.
    pub fn fail_close(&mut self, ticket: u64) {
        self.failing_close_tickets.insert(ticket);
    }

    pub fn clear_close_failures(&mut self) {
        self.failing_close_tickets.clear();
    }

    pub fn open_position_count(&self) -> usize {
        self.positions.len()
    }

    // -- internals ----------------------------------------------------------

    fn quote_for(&self, symbol: &str) -> Result<&Quote, BrokerError> {
        self.quotes
            .get(symbol)
            .ok_or_else(|| BrokerError::UnknownSymbol(symbol.to_string()))
    }

    /// P/L of a position against a closing price, in currency micros.
    fn position_pnl(&self, pos: &Position, close_price_micros: i64) -> i64 {
        let delta = match pos.side {
            Side::Buy => close_price_micros - pos.open_price_micros,
            Side::Sell => pos.open_price_micros - close_price_micros,
        };
        let pnl = delta as i128 * pos.volume_micros as i128 * self.contract_size as i128
            / MICROS_SCALE as i128
            / MICROS_SCALE as i128;
        pnl.clamp(i64::MIN as i128, i64::MAX as i128) as i64
    }

    fn unrealized_pnl(&self) -> i64 {
        self.positions
            .values()
            .map(|pos| match self.quotes.get(&pos.symbol) {
                Some(q) => {
                    let close = match pos.side {
                        Side::Buy => q.bid_micros,
                        Side::Sell => q.ask_micros,
                    };
                    self.position_pnl(pos, close)
                }
                None => 0,
            })
            .sum()
    }
}

impl BrokerGateway for PaperBroker {
    fn account(&self) -> Result<AccountSnapshot, BrokerError> {
        if !self.connected {
            return Err(BrokerError::NotConnected);
        }
        let equity = self
            .equity_override
            .unwrap_or_else(|| self.balance_micros + self.unrealized_pnl());
        Ok(AccountSnapshot {
            balance_micros: self.balance_micros,
            equity_micros: equity,
        })
    }

    fn quote(&self, symbol: &str) -> Result<Quote, BrokerError> {
        if !self.connected {
            return Err(BrokerError::NotConnected);
        }
        self.quote_for(symbol).cloned()
    }

    fn recent_bars(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        count: usize,
    ) -> Result<Vec<Bar>, BrokerError> {
        if !self.connected {
            return Err(BrokerError::NotConnected);
        }
        let bars = self
            .bars
            .get(&(symbol.to_string(), timeframe.secs()))
            .ok_or_else(|| BrokerError::UnknownSymbol(symbol.to_string()))?;
        let start = bars.len().saturating_sub(count);
        Ok(bars[start..].to_vec())
    }

    fn place_order(&mut self, req: &OrderRequest) -> Result<PlacedOrder, BrokerError> {
        if !self.connected {
            return Err(BrokerError::NotConnected);
        }
        if let Some(reason) = self.reject_next_order.take() {
            return Err(BrokerError::Rejected { reason });
        }
        if req.volume_micros <= 0 {
            return Err(BrokerError::Rejected {
                reason: "non-positive volume".to_string(),
            });
        }
        let quote = self.quote_for(&req.symbol)?.clone();
        let fill = match req.side {
            Side::Buy => quote.ask_micros,
            Side::Sell => quote.bid_micros,
        };

        let ticket = self.next_ticket;
        self.next_ticket += 1;
        self.positions.insert(
            ticket,
            Position {
                symbol: req.symbol.clone(),
                ticket,
                side: req.side,
                volume_micros: req.volume_micros,
                open_price_micros: fill,
                sl_micros: req.sl_micros,
                tp_micros: req.tp_micros,
                magic: req.magic,
                opened_at_utc: quote.ts_utc,
            },
        );

        Ok(PlacedOrder {
            ticket,
            fill_price_micros: fill,
        })
    }

    fn close_position(&mut self, ticket: u64) -> Result<i64, BrokerError> {
        if !self.connected {
            return Err(BrokerError::NotConnected);
        }
        if self.failing_close_tickets.contains(&ticket) {
            return Err(BrokerError::Transport(format!(
                "scripted close failure for ticket #{ticket}"
            )));
        }
        let pos = self
            .positions
            .remove(&ticket)
            .ok_or(BrokerError::UnknownTicket(ticket))?;
        let close = match self.quotes.get(&pos.symbol) {
            Some(q) => match pos.side {
                Side::Buy => q.bid_micros,
                Side::Sell => q.ask_micros,
            },
            // Quote script exhausted: flat close at the open price.
            None => pos.open_price_micros,
        };
        let pnl = self.position_pnl(&pos, close);
        self.balance_micros += pnl;
        Ok(pnl)
    }

    fn open_positions(&self, magic: Option<i64>) -> Result<Vec<Position>, BrokerError> {
        if !self.connected {
            return Err(BrokerError::NotConnected);
        }
        Ok(self
            .positions
            .values()
            .filter(|p| magic.map_or(true, |m| p.magic == m))
            .cloned()
            .collect())
    }

    fn modify_stop_loss(&mut self, ticket: u64, sl_micros: i64) -> Result<(), BrokerError> {
        if !self.connected {
            return Err(BrokerError::NotConnected);
        }
        match self.positions.get_mut(&ticket) {
            Some(pos) => {
                pos.sl_micros = sl_micros;
                Ok(())
            }
            None => Err(BrokerError::UnknownTicket(ticket)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pit_schemas::Side;

    const M: i64 = MICROS_SCALE;

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 4, 10, 0, 0).unwrap()
    }

    fn buy(symbol: &str, lots_micros: i64) -> OrderRequest {
        OrderRequest {
            symbol: symbol.to_string(),
            side: Side::Buy,
            volume_micros: lots_micros,
            sl_micros: 0,
            tp_micros: 0,
            magic: 7,
        }
    }

    #[test]
    fn tickets_are_sequential_and_fills_hit_the_ask() {
        let mut b = PaperBroker::new(10_000 * M);
        b.set_quote("EURUSD", 1_104_000, 1_104_200, ts());

        let first = b.place_order(&buy("EURUSD", 100_000)).unwrap();
        let second = b.place_order(&buy("EURUSD", 100_000)).unwrap();
        assert_eq!(first.ticket, 1);
        assert_eq!(second.ticket, 2);
        assert_eq!(first.fill_price_micros, 1_104_200);
    }

    #[test]
    fn close_realizes_pnl_into_balance() {
        let mut b = PaperBroker::new(10_000 * M);
        b.set_quote("EURUSD", 1_100_000, 1_100_000, ts());
        let placed = b.place_order(&buy("EURUSD", M)).unwrap();

        // Price rises 0.001: one lot over 100k units = $100.
        b.set_quote("EURUSD", 1_101_000, 1_101_000, ts());
        let pnl = b.close_position(placed.ticket).unwrap();
        assert_eq!(pnl, 100 * M);
        assert_eq!(b.account().unwrap().balance_micros, 10_100 * M);
        assert_eq!(b.open_position_count(), 0);
    }

    #[test]
    fn equity_marks_open_positions_to_market() {
        let mut b = PaperBroker::new(10_000 * M);
        b.set_quote("EURUSD", 1_100_000, 1_100_000, ts());
        b.place_order(&buy("EURUSD", M)).unwrap();

        b.set_quote("EURUSD", 1_099_000, 1_099_000, ts());
        let snap = b.account().unwrap();
        assert_eq!(snap.balance_micros, 10_000 * M);
        assert_eq!(snap.equity_micros, 9_900 * M);
    }

    #[test]
    fn scripted_rejection_fails_exactly_once() {
        let mut b = PaperBroker::new(10_000 * M);
        b.set_quote("EURUSD", 1_100_000, 1_100_100, ts());
        b.reject_next_order("insufficient margin");

        let err = b.place_order(&buy("EURUSD", M)).unwrap_err();
        assert!(matches!(err, BrokerError::Rejected { .. }));
        assert!(b.place_order(&buy("EURUSD", M)).is_ok());
    }

    #[test]
    fn closing_an_unknown_ticket_is_an_error() {
        let mut b = PaperBroker::new(10_000 * M);
        assert_eq!(
            b.close_position(99).unwrap_err(),
            BrokerError::UnknownTicket(99)
        );
    }
}
