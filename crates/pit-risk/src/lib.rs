//! Risk Governor for a single trading session.
//!
//! Deliberately dependency-free and deterministic: `evaluate` is a pure
//! function of (limits, session stats, tick input), so any verdict can be
//! reproduced exactly from the stats snapshot recorded at the triggering
//! tick. All mutation of [`SessionStats`] happens through explicit methods
//! called by the engine on tick boundaries.

mod engine;
mod sizing;
mod types;

pub use engine::{evaluate, gradual_stop_threshold, loss_threshold, profit_threshold};
pub use sizing::{size_position, LotSizing, SizingError};
pub use types::{
    DrawdownMode, RiskInput, RiskLimits, RiskRule, RiskTrigger, SessionStats, Threshold,
    MICROS_SCALE,
};
