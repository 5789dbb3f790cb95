//! Engine mode state machine.
//!
//! Explicit transitions only. Every lifecycle event is applied via
//! [`apply`], which enforces two rules:
//!
//! 1. **Legal transitions only.** Illegal events return
//!    [`TransitionError`]; callers treat that as a bug worth surfacing, not
//!    a condition to paper over.
//! 2. **Idempotent stop.** `StopRequested` while already `Stopping` (or
//!    `Offline`) is a silent no-op: the mode does not change and no error
//!    is returned.
//!
//! ```text
//!             Started
//!   OFFLINE ──────────► RUNNING ◄──────────┐
//!      │                   │               │ CooldownElapsed
//!      │ MarketClosed      │ RiskTriggered │
//!      └───────────► COOLDOWN ─────────────┘
//!                        │
//!      RUNNING/COOLDOWN  │ StopRequested
//!                        ▼
//!                    STOPPING ── ShutdownComplete ──► OFFLINE
//! ```

use pit_schemas::EngineMode;

/// Events that drive engine mode transitions.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum EngineEvent {
    /// Start succeeded: broker connected, at least one pair active.
    Started,
    /// Start attempted while the market is closed; wait for the open.
    MarketClosed,
    /// The Risk Governor (or a start-time closure check) ended the session.
    RiskTriggered,
    /// The cooldown resume time has passed.
    CooldownElapsed,
    /// Operator asked for a graceful stop.
    StopRequested,
    /// Graceful shutdown finished (or timed out); terminal cleanup done.
    ShutdownComplete,
}

/// Returned when an event cannot legally be applied in the current mode.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransitionError {
    pub from: EngineMode,
    pub event: &'static str,
}

impl std::fmt::Display for TransitionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "illegal engine transition: {} + {}", self.from, self.event)
    }
}

impl std::error::Error for TransitionError {}

/// Apply one event to the current mode, returning the next mode.
pub fn apply(mode: EngineMode, event: EngineEvent) -> Result<EngineMode, TransitionError> {
    use EngineEvent::*;
    use EngineMode::*;

    let next = match (mode, event) {
        (Offline, Started) => Running,
        (Offline, MarketClosed) => Cooldown,
        (Running, RiskTriggered) => Cooldown,
        (Cooldown, CooldownElapsed) => Running,
        (Running, StopRequested) | (Cooldown, StopRequested) => Stopping,
        // Idempotent stop: repeating the request changes nothing.
        (Stopping, StopRequested) => Stopping,
        (Offline, StopRequested) => Offline,
        (Stopping, ShutdownComplete) => Offline,
        (from, event) => {
            return Err(TransitionError {
                from,
                event: event_name(event),
            })
        }
    };
    Ok(next)
}

fn event_name(event: EngineEvent) -> &'static str {
    match event {
        EngineEvent::Started => "Started",
        EngineEvent::MarketClosed => "MarketClosed",
        EngineEvent::RiskTriggered => "RiskTriggered",
        EngineEvent::CooldownElapsed => "CooldownElapsed",
        EngineEvent::StopRequested => "StopRequested",
        EngineEvent::ShutdownComplete => "ShutdownComplete",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pit_schemas::EngineMode::*;

    #[test]
    fn happy_path_cycle() {
        let m = apply(Offline, EngineEvent::Started).unwrap();
        assert_eq!(m, Running);
        let m = apply(m, EngineEvent::RiskTriggered).unwrap();
        assert_eq!(m, Cooldown);
        let m = apply(m, EngineEvent::CooldownElapsed).unwrap();
        assert_eq!(m, Running);
        let m = apply(m, EngineEvent::StopRequested).unwrap();
        assert_eq!(m, Stopping);
        let m = apply(m, EngineEvent::ShutdownComplete).unwrap();
        assert_eq!(m, Offline);
    }

    #[test]
    fn stop_is_idempotent_while_stopping() {
        let m = apply(Stopping, EngineEvent::StopRequested).unwrap();
        assert_eq!(m, Stopping);
        let m = apply(Offline, EngineEvent::StopRequested).unwrap();
        assert_eq!(m, Offline);
    }

    #[test]
    fn illegal_transitions_are_errors() {
        let err = apply(Running, EngineEvent::Started).unwrap_err();
        assert_eq!(err.from, Running);
        assert!(apply(Offline, EngineEvent::CooldownElapsed).is_err());
        assert!(apply(Running, EngineEvent::ShutdownComplete).is_err());
    }

    #[test]
    fn market_closed_start_enters_cooldown() {
        assert_eq!(apply(Offline, EngineEvent::MarketClosed).unwrap(), Cooldown);
    }
}
