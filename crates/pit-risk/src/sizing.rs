use crate::MICROS_SCALE;

/// Lot sizing policy for a pair.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LotSizing {
    /// Always trade this many lots (micros; 100_000 = 0.1 lots).
    Fixed { lots_micros: i64 },
    /// Risk this fraction (micros of 1) of the current balance against the
    /// signal's stop-loss distance.
    RiskPercent { risk_frac_micros: i64 },
}

/// Broker minimum; orders below this are meaningless.
pub const MIN_LOTS_MICROS: i64 = 10_000; // 0.01 lots

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SizingError {
    /// Entry and stop-loss coincide; risk-based sizing would divide by zero.
    StopDistanceZero,
    /// The computed volume rounds below the broker minimum.
    BelowMinimumLot { computed_micros: i64 },
}

impl std::fmt::Display for SizingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SizingError::StopDistanceZero => {
                write!(f, "stop-loss distance is zero; cannot size by risk")
            }
            SizingError::BelowMinimumLot { computed_micros } => write!(
                f,
                "computed volume {computed_micros} micros is below the minimum lot"
            ),
        }
    }
}

impl std::error::Error for SizingError {}

/// Compute the order volume in lot micros.
///
/// For [`LotSizing::RiskPercent`], one full lot is assumed to move
/// `contract_size` account-currency units per price unit (the standard
/// 100_000 for FX majors), so:
///
/// `lots = (balance * risk_frac) / (|entry - sl| * contract_size)`
pub fn size_position(
    sizing: LotSizing,
    balance_micros: i64,
    entry_micros: i64,
    sl_micros: i64,
    contract_size: i64,
) -> Result<i64, SizingError> {
    match sizing {
        LotSizing::Fixed { lots_micros } => Ok(lots_micros),
        LotSizing::RiskPercent { risk_frac_micros } => {
            let distance = (entry_micros - sl_micros).abs();
            if distance == 0 || sl_micros == 0 {
                return Err(SizingError::StopDistanceZero);
            }
            let risk_amount = balance_micros as i128 * risk_frac_micros as i128
                / MICROS_SCALE as i128;
            // distance is price micros; one lot loses distance * contract_size
            // micros over that move.
            let per_lot = distance as i128 * contract_size as i128;
            let lots = risk_amount * MICROS_SCALE as i128 / per_lot;
            let lots = if lots > i64::MAX as i128 {
                i64::MAX
            } else {
                lots as i64
            };
            if lots < MIN_LOTS_MICROS {
                return Err(SizingError::BelowMinimumLot {
                    computed_micros: lots,
                });
            }
            Ok(lots)
        }
    }
}
