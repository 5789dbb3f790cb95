//! Strategy capability surface + plugin registry.
//!
//! Strategies are polymorphic over two small capabilities: entries produce
//! an [`EntrySignal`] from market state, exits produce a [`CloseDecision`]
//! for the pair's open positions. Selection is registry-based: string ids
//! map to metadata plus factory closures, so the engine can enumerate,
//! validate, and instantiate strategies per pair without open-ended dynamic
//! dispatch. A pair whose strategy id is unknown or whose params fail
//! validation is disabled on its own, never the whole engine.

mod engulfing_reversal;
mod explosive_breakout;
mod profit_protector;
mod registry;
mod types;

pub use engulfing_reversal::EngulfingReversal;
pub use explosive_breakout::ExplosiveBreakout;
pub use profit_protector::ProfitProtector;
pub use registry::{builtin_registry, StrategyError, StrategyMeta, StrategyRegistry};
pub use types::{
    CloseDecision, EntrySignal, EntryStrategy, ExitStrategy, MarketState, RecentBars,
};
