//! Profit-protecting exit: break-even move, ATR trailing stop, stop-hit close.
//!
//! Level 1: once price moves `breakeven_rr` x the initial risk in the
//! trade's favor, the stop is moved to the entry price (applied once per
//! ticket).
//! Level 2: after break-even, the stop ratchets behind price at
//! `atr_multiplier` x ATR; it only ever tightens.
//! Level 3: a position whose stop has been crossed is closed outright.

use std::collections::{BTreeMap, BTreeSet};

use pit_schemas::{Position, Side, MICROS_SCALE};
use serde::Deserialize;
use serde_json::Value;

use crate::{CloseDecision, ExitStrategy, MarketState, StrategyError};

#[derive(Deserialize)]
#[serde(default, deny_unknown_fields)]
struct Params {
    /// Multiple of the initial risk that arms the break-even move.
    breakeven_rr: f64,
    /// ATR lookback in completed candles.
    atr_period: usize,
    /// Trailing distance in ATRs.
    atr_multiplier: f64,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            breakeven_rr: 1.0,
            atr_period: 14,
            atr_multiplier: 3.0,
        }
    }
}

pub struct ProfitProtector {
    breakeven_rr_micros: i64,
    atr_period: usize,
    atr_multiplier_micros: i64,
    breakeven_applied: BTreeSet<u64>,
}

impl ProfitProtector {
    pub fn from_params(params: &Value) -> Result<Self, StrategyError> {
        let p: Params = if params.is_null() {
            Params::default()
        } else {
            serde_json::from_value(params.clone()).map_err(|e| StrategyError::BadParams {
                id: "profit_protector".to_string(),
                reason: e.to_string(),
            })?
        };
        if p.atr_period == 0 || p.atr_multiplier <= 0.0 || p.breakeven_rr <= 0.0 {
            return Err(StrategyError::BadParams {
                id: "profit_protector".to_string(),
                reason: "atr_period, atr_multiplier and breakeven_rr must be positive".to_string(),
            });
        }
        Ok(Self {
            breakeven_rr_micros: (p.breakeven_rr * MICROS_SCALE as f64) as i64,
            atr_period: p.atr_period,
            atr_multiplier_micros: (p.atr_multiplier * MICROS_SCALE as f64) as i64,
            breakeven_applied: BTreeSet::new(),
        })
    }

    /// Average true range over the last `atr_period` completed candles.
    fn atr(&self, market: &MarketState) -> Option<i64> {
        let completed: Vec<_> = market.bars.completed().collect();
        if completed.len() < self.atr_period + 1 {
            return None;
        }
        let window = &completed[completed.len() - self.atr_period..];
        let mut prev_close = completed[completed.len() - self.atr_period - 1].close_micros;
        let mut sum: i64 = 0;
        for bar in window {
            let tr = (bar.high_micros - bar.low_micros)
                .max((bar.high_micros - prev_close).abs())
                .max((bar.low_micros - prev_close).abs());
            sum += tr;
            prev_close = bar.close_micros;
        }
        Some(sum / self.atr_period as i64)
    }
}

fn times_frac(value: i64, frac_micros: i64) -> i64 {
    (value as i128 * frac_micros as i128 / MICROS_SCALE as i128) as i64
}

impl ExitStrategy for ProfitProtector {
    fn name(&self) -> &'static str {
        "profit_protector"
    }

    fn evaluate_exit(
        &mut self,
        positions: &[Position],
        market: &MarketState,
    ) -> Option<CloseDecision> {
        if positions.is_empty() {
            return None;
        }

        let atr = self.atr(market);
        let mut close_tickets = Vec::new();
        let mut sl_updates: BTreeMap<u64, i64> = BTreeMap::new();

        for pos in positions {
            let mark = match pos.side {
                Side::Buy => market.quote.bid_micros,
                Side::Sell => market.quote.ask_micros,
            };

            // Level 3: stop crossed → close.
            if pos.sl_micros > 0 {
                let stop_hit = match pos.side {
                    Side::Buy => mark <= pos.sl_micros,
                    Side::Sell => mark >= pos.sl_micros,
                };
                if stop_hit {
                    close_tickets.push(pos.ticket);
                    self.breakeven_applied.remove(&pos.ticket);
                    continue;
                }
            }

            // Level 1: break-even, once per ticket. Needs an initial stop to
            // define the risk unit.
            if !self.breakeven_applied.contains(&pos.ticket) {
                if pos.sl_micros == 0 {
                    continue;
                }
                let initial_risk = (pos.open_price_micros - pos.sl_micros).abs();
                let armed_at = times_frac(initial_risk, self.breakeven_rr_micros);
                let armed = match pos.side {
                    Side::Buy => mark >= pos.open_price_micros + armed_at,
                    Side::Sell => mark <= pos.open_price_micros - armed_at,
                };
                if armed {
                    sl_updates.insert(pos.ticket, pos.open_price_micros);
                    self.breakeven_applied.insert(pos.ticket);
                }
                continue;
            }

            // Level 2: ATR trail, tightening only.
            let Some(atr) = atr else { continue };
            let trail = times_frac(atr, self.atr_multiplier_micros);
            let proposed = match pos.side {
                Side::Buy => mark - trail,
                Side::Sell => mark + trail,
            };
            let tightens = match pos.side {
                Side::Buy => proposed > pos.sl_micros,
                Side::Sell => pos.sl_micros == 0 || proposed < pos.sl_micros,
            };
            if tightens {
                sl_updates.insert(pos.ticket, proposed);
            }
        }

        let decision = CloseDecision {
            close_tickets,
            sl_updates,
        };
        if decision.is_empty() {
            None
        } else {
            Some(decision)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};
    use pit_schemas::{Bar, Quote, Timeframe};

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 4, 10, 0, 0).unwrap()
    }

    fn flat_bars(n: usize, around: i64) -> Vec<Bar> {
        (0..n)
            .map(|_| Bar {
                end_ts_utc: ts(),
                open_micros: around,
                high_micros: around + 100,
                low_micros: around - 100,
                close_micros: around,
                volume: 10,
                complete: true,
            })
            .collect()
    }

    fn market_at(bid: i64) -> MarketState {
        MarketState {
            symbol: "EURUSD".to_string(),
            timeframe: Timeframe::M5,
            quote: Quote {
                symbol: "EURUSD".to_string(),
                bid_micros: bid,
                ask_micros: bid + 100,
                ts_utc: ts(),
            },
            bars: crate::RecentBars::new(64, flat_bars(20, bid)),
            open_position_count: 1,
        }
    }

    fn long_position(open: i64, sl: i64) -> Position {
        Position {
            symbol: "EURUSD".to_string(),
            ticket: 11,
            side: Side::Buy,
            volume_micros: 100_000,
            open_price_micros: open,
            sl_micros: sl,
            tp_micros: 0,
            magic: 7,
            opened_at_utc: ts(),
        }
    }

    #[test]
    fn breakeven_moves_stop_to_entry_after_one_r() {
        let mut x = ProfitProtector::from_params(&Value::Null).unwrap();
        let pos = long_position(1_100_000, 1_099_000); // 0.001 risk

        // +1R reached: stop to entry.
        let d = x
            .evaluate_exit(&[pos.clone()], &market_at(1_101_000))
            .expect("breakeven fires");
        assert_eq!(d.sl_updates.get(&11), Some(&1_100_000));
        assert!(d.close_tickets.is_empty());
    }

    #[test]
    fn trailing_only_tightens_after_breakeven() {
        let mut x = ProfitProtector::from_params(
            &serde_json::json!({ "atr_period": 5, "atr_multiplier": 1.0 }),
        )
        .unwrap();
        let mut pos = long_position(1_100_000, 1_099_000);

        // Arm break-even first.
        let d = x
            .evaluate_exit(&[pos.clone()], &market_at(1_101_000))
            .unwrap();
        pos.sl_micros = *d.sl_updates.get(&11).unwrap();

        // Flat bars have true range 200; trail = 200 below bid.
        let d = x
            .evaluate_exit(&[pos.clone()], &market_at(1_102_000))
            .expect("trail fires");
        assert_eq!(d.sl_updates.get(&11), Some(&(1_102_000 - 200)));

        // Price retreats but stays above the stop: the proposed stop would
        // loosen, so no update.
        pos.sl_micros = 1_102_000 - 200;
        assert!(x.evaluate_exit(&[pos], &market_at(1_101_900)).is_none());
    }

    #[test]
    fn crossed_stop_closes_the_position() {
        let mut x = ProfitProtector::from_params(&Value::Null).unwrap();
        let pos = long_position(1_100_000, 1_099_000);

        let d = x
            .evaluate_exit(&[pos], &market_at(1_098_500))
            .expect("stop hit closes");
        assert_eq!(d.close_tickets, vec![11]);
    }
}
