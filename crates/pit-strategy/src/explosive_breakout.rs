//! Explosive-candle breakout entry.
//!
//! Fires when the last completed candle has an unusually large body relative
//! to the recent average AND volume expands past its recent average. The
//! trade goes in the candle's direction with the stop at the candle's
//! opposite extreme and the target at a configured risk/reward multiple.

use pit_schemas::{Side, MICROS_SCALE};
use serde::Deserialize;
use serde_json::Value;

use crate::{EntrySignal, EntryStrategy, MarketState, StrategyError};

#[derive(Deserialize)]
#[serde(default, deny_unknown_fields)]
struct Params {
    /// Trigger body must exceed `body_factor` × average body.
    body_factor: f64,
    /// Trigger volume must exceed `volume_factor` × average volume.
    volume_factor: f64,
    /// Number of completed candles the averages are taken over.
    lookback: usize,
    /// Take-profit distance as a multiple of the stop distance.
    rr_ratio: f64,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            body_factor: 2.5,
            volume_factor: 1.5,
            lookback: 20,
            rr_ratio: 1.5,
        }
    }
}

pub struct ExplosiveBreakout {
    body_factor_micros: i64,
    volume_factor_micros: i64,
    lookback: usize,
    rr_micros: i64,
}

impl ExplosiveBreakout {
    pub fn from_params(params: &Value) -> Result<Self, StrategyError> {
        let p: Params = if params.is_null() {
            Params::default()
        } else {
            serde_json::from_value(params.clone()).map_err(|e| StrategyError::BadParams {
                id: "explosive_breakout".to_string(),
                reason: e.to_string(),
            })?
        };
        if p.lookback == 0 || p.body_factor <= 0.0 || p.rr_ratio <= 0.0 {
            return Err(StrategyError::BadParams {
                id: "explosive_breakout".to_string(),
                reason: "lookback, body_factor and rr_ratio must be positive".to_string(),
            });
        }
        Ok(Self {
            body_factor_micros: (p.body_factor * MICROS_SCALE as f64) as i64,
            volume_factor_micros: (p.volume_factor * MICROS_SCALE as f64) as i64,
            lookback: p.lookback,
            rr_micros: (p.rr_ratio * MICROS_SCALE as f64) as i64,
        })
    }
}

fn times_frac(value: i64, frac_micros: i64) -> i64 {
    (value as i128 * frac_micros as i128 / MICROS_SCALE as i128) as i64
}

impl EntryStrategy for ExplosiveBreakout {
    fn name(&self) -> &'static str {
        "explosive_breakout"
    }

    fn evaluate_entry(&mut self, market: &MarketState) -> Option<EntrySignal> {
        let completed: Vec<_> = market.bars.completed().collect();
        if completed.len() < self.lookback + 1 {
            return None;
        }

        let trigger = completed[completed.len() - 1];
        let window = &completed[completed.len() - 1 - self.lookback..completed.len() - 1];

        let avg_body = window.iter().map(|b| b.body_micros().abs()).sum::<i64>()
            / self.lookback as i64;
        let avg_volume = window.iter().map(|b| b.volume).sum::<i64>() / self.lookback as i64;

        let body = trigger.body_micros().abs();
        if avg_body == 0 || body < times_frac(avg_body, self.body_factor_micros) {
            return None;
        }
        if avg_volume > 0 && trigger.volume < times_frac(avg_volume, self.volume_factor_micros) {
            return None;
        }

        let (side, entry, sl) = if trigger.is_bullish() {
            (Side::Buy, market.quote.ask_micros, trigger.low_micros)
        } else {
            (Side::Sell, market.quote.bid_micros, trigger.high_micros)
        };
        let risk = (entry - sl).abs();
        if risk == 0 {
            return None;
        }
        let tp = match side {
            Side::Buy => entry + times_frac(risk, self.rr_micros),
            Side::Sell => entry - times_frac(risk, self.rr_micros),
        };

        Some(EntrySignal {
            side,
            sl_micros: sl,
            tp_micros: tp,
            comment: "explosive candle".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use pit_schemas::{Bar, Quote, Timeframe};

    fn bar(open: i64, close: i64, volume: i64) -> Bar {
        Bar {
            end_ts_utc: Utc.with_ymd_and_hms(2026, 3, 4, 10, 0, 0).unwrap(),
            open_micros: open,
            high_micros: open.max(close) + 50,
            low_micros: open.min(close) - 50,
            close_micros: close,
            volume,
            complete: true,
        }
    }

    fn market(bars: Vec<Bar>) -> MarketState {
        MarketState {
            symbol: "EURUSD".to_string(),
            timeframe: Timeframe::M1,
            quote: Quote {
                symbol: "EURUSD".to_string(),
                bid_micros: 1_100_000,
                ask_micros: 1_100_100,
                ts_utc: Utc.with_ymd_and_hms(2026, 3, 4, 10, 0, 0).unwrap(),
            },
            bars: crate::RecentBars::new(64, bars),
            open_position_count: 0,
        }
    }

    #[test]
    fn quiet_market_produces_no_signal() {
        let bars: Vec<_> = (0..25).map(|_| bar(1_100_000, 1_100_100, 100)).collect();
        let mut s = ExplosiveBreakout::from_params(&Value::Null).unwrap();
        assert!(s.evaluate_entry(&market(bars)).is_none());
    }

    #[test]
    fn explosive_bullish_candle_with_volume_surge_signals_buy() {
        let mut bars: Vec<_> = (0..24).map(|_| bar(1_100_000, 1_100_100, 100)).collect();
        // Body 10× average, volume 3× average.
        bars.push(bar(1_100_000, 1_101_000, 300));

        let mut s = ExplosiveBreakout::from_params(&Value::Null).unwrap();
        let sig = s.evaluate_entry(&market(bars)).expect("must fire");
        assert_eq!(sig.side, Side::Buy);
        assert!(sig.sl_micros < 1_100_000);
        assert!(sig.tp_micros > 1_100_100);
    }

    #[test]
    fn volume_filter_suppresses_body_only_spikes() {
        let mut bars: Vec<_> = (0..24).map(|_| bar(1_100_000, 1_100_100, 100)).collect();
        bars.push(bar(1_100_000, 1_101_000, 100)); // big body, flat volume

        let mut s = ExplosiveBreakout::from_params(&Value::Null).unwrap();
        assert!(s.evaluate_entry(&market(bars)).is_none());
    }

    #[test]
    fn bad_params_are_a_typed_error() {
        let err = ExplosiveBreakout::from_params(&serde_json::json!({ "lookback": 0 }));
        assert!(matches!(err, Err(StrategyError::BadParams { .. })));
    }
}
