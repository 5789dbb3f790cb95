use pit_config::PairConfig;
use pit_strategy::{EntryStrategy, ExitStrategy, StrategyRegistry};

/// Live state for one configured pair.
///
/// A pair that fails activation (unknown strategy id, bad params) is carried
/// disabled with the failure text surfaced in status; the rest of the
/// engine keeps trading.
pub struct PairRuntime {
    pub config: PairConfig,
    pub entry: Option<Box<dyn EntryStrategy>>,
    pub exit: Option<Box<dyn ExitStrategy>>,
    pub disabled_reason: Option<String>,
    /// Last observed quote and position count, for status display.
    pub last_bid_micros: i64,
    pub last_spread_micros: i64,
    pub last_open_positions: u32,
}

impl PairRuntime {
    pub fn is_active(&self) -> bool {
        self.disabled_reason.is_none() && self.entry.is_some()
    }

    pub fn disable(&mut self, reason: String) {
        tracing::warn!(symbol = %self.config.symbol, %reason, "disabling pair");
        self.disabled_reason = Some(reason);
    }
}

/// Instantiate strategies for every configured pair.
///
/// Failures disable the affected pair only; the caller decides whether an
/// engine with zero active pairs may start (it may not).
pub fn activate_pairs(registry: &StrategyRegistry, configs: &[PairConfig]) -> Vec<PairRuntime> {
    configs
        .iter()
        .map(|cfg| {
            let mut runtime = PairRuntime {
                config: cfg.clone(),
                entry: None,
                exit: None,
                disabled_reason: None,
                last_bid_micros: 0,
                last_spread_micros: 0,
                last_open_positions: 0,
            };

            match registry.instantiate_entry(&cfg.entry.id, &cfg.entry.params) {
                Ok(entry) => {
                    tracing::info!(
                        symbol = %cfg.symbol,
                        strategy = %cfg.entry.id,
                        "entry strategy loaded"
                    );
                    runtime.entry = Some(entry);
                }
                Err(e) => {
                    runtime.disable(format!("entry strategy failed to load: {e}"));
                    return runtime;
                }
            }

            if let Some(exit_ref) = &cfg.exit {
                match registry.instantiate_exit(&exit_ref.id, &exit_ref.params) {
                    Ok(exit) => {
                        tracing::info!(
                            symbol = %cfg.symbol,
                            strategy = %exit_ref.id,
                            "exit strategy enabled"
                        );
                        runtime.exit = Some(exit);
                    }
                    // An unusable exit strategy loses smart exits only; the
                    // pair still trades entries.
                    Err(e) => {
                        tracing::warn!(
                            symbol = %cfg.symbol,
                            strategy = %exit_ref.id,
                            error = %e,
                            "exit strategy failed to load; continuing without it"
                        );
                    }
                }
            }

            runtime
        })
        .collect()
}
