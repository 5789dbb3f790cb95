/// Failures surfaced by a broker adapter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BrokerError {
    /// The adapter has no live connection to its terminal/endpoint.
    NotConnected,
    /// The symbol is not tradeable on this account.
    UnknownSymbol(String),
    /// The broker refused the request (insufficient margin, bad volume, ...).
    Rejected { reason: String },
    /// No open position with this ticket.
    UnknownTicket(u64),
    /// The transport failed mid-call; the true outcome is unknown.
    Transport(String),
}

impl std::fmt::Display for BrokerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BrokerError::NotConnected => write!(f, "broker not connected"),
            BrokerError::UnknownSymbol(sym) => write!(f, "unknown symbol: {sym}"),
            BrokerError::Rejected { reason } => write!(f, "order rejected: {reason}"),
            BrokerError::UnknownTicket(t) => write!(f, "no open position with ticket #{t}"),
            BrokerError::Transport(msg) => write!(f, "broker transport failure: {msg}"),
        }
    }
}

impl std::error::Error for BrokerError {}
