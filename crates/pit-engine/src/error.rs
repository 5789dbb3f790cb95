use pit_broker::BrokerError;

/// Failures that keep (or put) an engine OFFLINE.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EngineError {
    /// No pair produced a usable strategy; the engine refuses to start.
    NoStrategies,
    /// A balance-dependent config check failed at start (e.g. an amount
    /// loss limit at or above the account balance).
    Config(String),
    /// The broker was unreachable during start. Retry policy belongs to the
    /// caller, not the engine.
    Connectivity(BrokerError),
    /// A statically-legal transition was refused; indicates a bug.
    Internal(String),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::NoStrategies => {
                write!(f, "no pair strategies could be activated")
            }
            EngineError::Config(msg) => write!(f, "config rejected at start: {msg}"),
            EngineError::Connectivity(e) => write!(f, "broker connectivity failure: {e}"),
            EngineError::Internal(msg) => write!(f, "engine invariant violation: {msg}"),
        }
    }
}

impl std::error::Error for EngineError {}

impl From<BrokerError> for EngineError {
    fn from(e: BrokerError) -> Self {
        EngineError::Connectivity(e)
    }
}
