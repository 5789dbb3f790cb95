//! Order placement gates.
//!
//! Two account-level gates run before any placement: the order cooldown
//! (minimum seconds between two successful placements) and the concurrency
//! cap (open positions never exceed the configured maximum). No lock is
//! needed; only one tick context ever runs for an account.

/// A refused placement, with the reason surfaced in logs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GateRefusal {
    CooldownActive { remaining_secs: u64 },
    MaxConcurrent { cap: u32 },
}

impl std::fmt::Display for GateRefusal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GateRefusal::CooldownActive { remaining_secs } => {
                write!(f, "order cooldown active ({remaining_secs}s remaining)")
            }
            GateRefusal::MaxConcurrent { cap } => {
                write!(f, "concurrent position cap reached ({cap})")
            }
        }
    }
}

#[derive(Clone, Debug)]
pub struct OrderGate {
    cooldown_secs: u64,
    max_concurrent: u32,
    last_order_at_unix: Option<i64>,
}

impl OrderGate {
    pub fn new(cooldown_secs: u64, max_concurrent: u32) -> Self {
        Self {
            cooldown_secs,
            max_concurrent,
            last_order_at_unix: None,
        }
    }

    pub fn check(&self, now_unix: i64, open_positions: u32) -> Result<(), GateRefusal> {
        if open_positions >= self.max_concurrent {
            return Err(GateRefusal::MaxConcurrent {
                cap: self.max_concurrent,
            });
        }
        if let Some(last) = self.last_order_at_unix {
            let elapsed = now_unix - last;
            if elapsed < self.cooldown_secs as i64 {
                return Err(GateRefusal::CooldownActive {
                    remaining_secs: (self.cooldown_secs as i64 - elapsed).max(0) as u64,
                });
            }
        }
        Ok(())
    }

    /// Called only after the broker confirmed a placement.
    pub fn record_placement(&mut self, now_unix: i64) {
        self.last_order_at_unix = Some(now_unix);
    }

    /// A fresh session does not inherit the previous session's cooldown.
    pub fn reset(&mut self) {
        self.last_order_at_unix = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_signals_inside_the_window_yield_one_placement() {
        let mut gate = OrderGate::new(30, 5);
        assert!(gate.check(1_000, 0).is_ok());
        gate.record_placement(1_000);

        // Second signal 10s later: refused.
        assert_eq!(
            gate.check(1_010, 1),
            Err(GateRefusal::CooldownActive { remaining_secs: 20 })
        );

        // After the window: allowed again.
        assert!(gate.check(1_030, 1).is_ok());
    }

    #[test]
    fn concurrency_cap_wins_over_cooldown() {
        let gate = OrderGate::new(0, 2);
        assert!(gate.check(1_000, 1).is_ok());
        assert_eq!(
            gate.check(1_000, 2),
            Err(GateRefusal::MaxConcurrent { cap: 2 })
        );
    }

    #[test]
    fn reset_clears_the_window() {
        let mut gate = OrderGate::new(60, 5);
        gate.record_placement(1_000);
        assert!(gate.check(1_001, 0).is_err());
        gate.reset();
        assert!(gate.check(1_001, 0).is_ok());
    }
}
