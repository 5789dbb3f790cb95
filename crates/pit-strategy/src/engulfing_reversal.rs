//! Engulfing-pattern reversal entry.
//!
//! Two-candle pattern on completed bars: a bearish candle followed by a
//! bullish one (or the mirror) where the second body engulfs the first.
//! "Aggressive" engulfing closes beyond the previous candle's extreme;
//! "normal" engulfing only closes beyond the previous open. The aggressive
//! form is checked first.

use pit_schemas::{Bar, Side, MICROS_SCALE};
use serde::Deserialize;
use serde_json::Value;

use crate::{EntrySignal, EntryStrategy, MarketState, StrategyError};

#[derive(Deserialize)]
#[serde(default, deny_unknown_fields)]
struct Params {
    /// Take-profit distance as a multiple of the stop distance.
    rr_ratio: f64,
    /// Only take aggressive engulfings (close beyond the prior extreme).
    aggressive_only: bool,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            rr_ratio: 1.5,
            aggressive_only: false,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Grade {
    Normal,
    Aggressive,
}

pub struct EngulfingReversal {
    rr_micros: i64,
    aggressive_only: bool,
}

impl EngulfingReversal {
    pub fn from_params(params: &Value) -> Result<Self, StrategyError> {
        let p: Params = if params.is_null() {
            Params::default()
        } else {
            serde_json::from_value(params.clone()).map_err(|e| StrategyError::BadParams {
                id: "engulfing_reversal".to_string(),
                reason: e.to_string(),
            })?
        };
        if p.rr_ratio <= 0.0 {
            return Err(StrategyError::BadParams {
                id: "engulfing_reversal".to_string(),
                reason: "rr_ratio must be positive".to_string(),
            });
        }
        Ok(Self {
            rr_micros: (p.rr_ratio * MICROS_SCALE as f64) as i64,
            aggressive_only: p.aggressive_only,
        })
    }
}

fn engulfing(previous: &Bar, current: &Bar, side: Side) -> Option<Grade> {
    match side {
        Side::Buy => {
            // Previous bearish, current bullish.
            if !(previous.open_micros >= previous.close_micros && current.is_bullish()) {
                return None;
            }
            if current.close_micros > previous.high_micros {
                Some(Grade::Aggressive)
            } else if current.close_micros > previous.open_micros {
                Some(Grade::Normal)
            } else {
                None
            }
        }
        Side::Sell => {
            // Previous bullish, current bearish.
            if !(previous.open_micros <= previous.close_micros && !current.is_bullish()) {
                return None;
            }
            if current.close_micros < previous.low_micros {
                Some(Grade::Aggressive)
            } else if current.close_micros < previous.open_micros {
                Some(Grade::Normal)
            } else {
                None
            }
        }
    }
}

impl EntryStrategy for EngulfingReversal {
    fn name(&self) -> &'static str {
        "engulfing_reversal"
    }

    fn evaluate_entry(&mut self, market: &MarketState) -> Option<EntrySignal> {
        let completed: Vec<_> = market.bars.completed().collect();
        if completed.len() < 2 {
            return None;
        }
        let previous = completed[completed.len() - 2];
        let current = completed[completed.len() - 1];

        for side in [Side::Buy, Side::Sell] {
            let Some(grade) = engulfing(previous, current, side) else {
                continue;
            };
            if self.aggressive_only && grade == Grade::Normal {
                continue;
            }

            let (entry, sl) = match side {
                Side::Buy => (
                    market.quote.ask_micros,
                    previous.low_micros.min(current.low_micros),
                ),
                Side::Sell => (
                    market.quote.bid_micros,
                    previous.high_micros.max(current.high_micros),
                ),
            };
            let risk = (entry - sl).abs();
            if risk == 0 {
                return None;
            }
            let reward = risk as i128 * self.rr_micros as i128 / MICROS_SCALE as i128;
            let tp = match side {
                Side::Buy => entry + reward as i64,
                Side::Sell => entry - reward as i64,
            };
            let comment = match grade {
                Grade::Aggressive => "aggressive engulfing",
                Grade::Normal => "normal engulfing",
            };
            return Some(EntrySignal {
                side,
                sl_micros: sl,
                tp_micros: tp,
                comment: comment.to_string(),
            });
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use pit_schemas::{Quote, Timeframe};

    fn bar(open: i64, high: i64, low: i64, close: i64) -> Bar {
        Bar {
            end_ts_utc: Utc.with_ymd_and_hms(2026, 3, 4, 10, 0, 0).unwrap(),
            open_micros: open,
            high_micros: high,
            low_micros: low,
            close_micros: close,
            volume: 100,
            complete: true,
        }
    }

    fn market(bars: Vec<Bar>) -> MarketState {
        MarketState {
            symbol: "EURUSD".to_string(),
            timeframe: Timeframe::M5,
            quote: Quote {
                symbol: "EURUSD".to_string(),
                bid_micros: 1_100_000,
                ask_micros: 1_100_100,
                ts_utc: Utc.with_ymd_and_hms(2026, 3, 4, 10, 0, 0).unwrap(),
            },
            bars: crate::RecentBars::new(16, bars),
            open_position_count: 0,
        }
    }

    #[test]
    fn bullish_aggressive_engulfing_signals_buy() {
        // Bearish candle, then a bullish close above its high.
        let bars = vec![
            bar(1_100_500, 1_100_600, 1_099_900, 1_100_000),
            bar(1_100_000, 1_100_800, 1_099_950, 1_100_700),
        ];
        let mut s = EngulfingReversal::from_params(&Value::Null).unwrap();
        let sig = s.evaluate_entry(&market(bars)).expect("must fire");
        assert_eq!(sig.side, Side::Buy);
        assert_eq!(sig.comment, "aggressive engulfing");
        assert_eq!(sig.sl_micros, 1_099_900);
    }

    #[test]
    fn normal_engulfing_filtered_when_aggressive_only() {
        // Bullish close above the prior open but below its high.
        let bars = vec![
            bar(1_100_500, 1_100_900, 1_099_900, 1_100_000),
            bar(1_100_000, 1_100_700, 1_099_950, 1_100_600),
        ];
        let mut s =
            EngulfingReversal::from_params(&serde_json::json!({ "aggressive_only": true }))
                .unwrap();
        assert!(s.evaluate_entry(&market(bars.clone())).is_none());

        let mut s = EngulfingReversal::from_params(&Value::Null).unwrap();
        let sig = s.evaluate_entry(&market(bars)).expect("normal fires");
        assert_eq!(sig.comment, "normal engulfing");
    }

    #[test]
    fn two_bullish_candles_are_not_engulfing() {
        let bars = vec![
            bar(1_100_000, 1_100_600, 1_099_900, 1_100_500),
            bar(1_100_500, 1_101_000, 1_100_400, 1_100_900),
        ];
        let mut s = EngulfingReversal::from_params(&Value::Null).unwrap();
        assert!(s.evaluate_entry(&market(bars)).is_none());
    }
}
