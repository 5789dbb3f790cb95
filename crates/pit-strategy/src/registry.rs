//! Registry of available strategies.
//!
//! The registry is the step before instantiation: a catalogue of entry and
//! exit strategies, each a [`StrategyMeta`] plus a `Send + Sync` factory
//! that builds a fresh boxed instance from its JSON params. Insertion order
//! is preserved in listings; factories validate their own params and fail
//! with a typed error that disables the requesting pair only.

use serde_json::Value;

use crate::{EntryStrategy, ExitStrategy};

/// Static metadata for a registered strategy.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StrategyMeta {
    /// Registry key. Non-empty, ASCII alphanumerics/underscores.
    pub id: String,
    pub version: String,
    pub description: String,
}

impl StrategyMeta {
    pub fn new(
        id: impl Into<String>,
        version: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        let id = id.into();
        debug_assert!(!id.trim().is_empty(), "strategy id must not be empty");
        Self {
            id,
            version: version.into(),
            description: description.into(),
        }
    }
}

/// Errors from registry operations and factory invocations.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StrategyError {
    DuplicateId(String),
    UnknownId(String),
    BadParams { id: String, reason: String },
}

impl std::fmt::Display for StrategyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StrategyError::DuplicateId(id) => write!(f, "strategy id already registered: {id}"),
            StrategyError::UnknownId(id) => write!(f, "unknown strategy id: {id}"),
            StrategyError::BadParams { id, reason } => {
                write!(f, "invalid params for strategy {id}: {reason}")
            }
        }
    }
}

impl std::error::Error for StrategyError {}

pub type EntryFactory =
    Box<dyn Fn(&Value) -> Result<Box<dyn EntryStrategy>, StrategyError> + Send + Sync>;
pub type ExitFactory =
    Box<dyn Fn(&Value) -> Result<Box<dyn ExitStrategy>, StrategyError> + Send + Sync>;

pub struct StrategyRegistry {
    entries: Vec<(StrategyMeta, EntryFactory)>,
    exits: Vec<(StrategyMeta, ExitFactory)>,
}

impl StrategyRegistry {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            exits: Vec::new(),
        }
    }

    pub fn register_entry(
        &mut self,
        meta: StrategyMeta,
        factory: EntryFactory,
    ) -> Result<(), StrategyError> {
        if self.entries.iter().any(|(m, _)| m.id == meta.id) {
            return Err(StrategyError::DuplicateId(meta.id));
        }
        self.entries.push((meta, factory));
        Ok(())
    }

    pub fn register_exit(
        &mut self,
        meta: StrategyMeta,
        factory: ExitFactory,
    ) -> Result<(), StrategyError> {
        if self.exits.iter().any(|(m, _)| m.id == meta.id) {
            return Err(StrategyError::DuplicateId(meta.id));
        }
        self.exits.push((meta, factory));
        Ok(())
    }

    pub fn instantiate_entry(
        &self,
        id: &str,
        params: &Value,
    ) -> Result<Box<dyn EntryStrategy>, StrategyError> {
        let (_, factory) = self
            .entries
            .iter()
            .find(|(m, _)| m.id == id)
            .ok_or_else(|| StrategyError::UnknownId(id.to_string()))?;
        factory(params)
    }

    pub fn instantiate_exit(
        &self,
        id: &str,
        params: &Value,
    ) -> Result<Box<dyn ExitStrategy>, StrategyError> {
        let (_, factory) = self
            .exits
            .iter()
            .find(|(m, _)| m.id == id)
            .ok_or_else(|| StrategyError::UnknownId(id.to_string()))?;
        factory(params)
    }

    pub fn list_entries(&self) -> Vec<&StrategyMeta> {
        self.entries.iter().map(|(m, _)| m).collect()
    }

    pub fn list_exits(&self) -> Vec<&StrategyMeta> {
        self.exits.iter().map(|(m, _)| m).collect()
    }
}

impl Default for StrategyRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Registry with every built-in strategy registered.
pub fn builtin_registry() -> StrategyRegistry {
    let mut reg = StrategyRegistry::new();

    // Registration of built-ins cannot collide; ids are distinct literals.
    let _ = reg.register_entry(
        StrategyMeta::new(
            "explosive_breakout",
            "1.0.0",
            "Large-bodied candle with a volume surge, traded in its direction",
        ),
        Box::new(|params| Ok(Box::new(crate::ExplosiveBreakout::from_params(params)?))),
    );
    let _ = reg.register_entry(
        StrategyMeta::new(
            "engulfing_reversal",
            "1.0.0",
            "Bullish/bearish engulfing pattern reversal",
        ),
        Box::new(|params| Ok(Box::new(crate::EngulfingReversal::from_params(params)?))),
    );
    let _ = reg.register_exit(
        StrategyMeta::new(
            "profit_protector",
            "1.0.0",
            "Break-even move plus ATR trailing stop",
        ),
        Box::new(|params| Ok(Box::new(crate::ProfitProtector::from_params(params)?))),
    );

    reg
}
