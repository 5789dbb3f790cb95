//! Liveness classification.
//!
//! Pure decision rules, exercised by the supervisor's poll loop:
//! - no execution context anymore → classify from the exit kind
//!   (normal → OFFLINE, failed/panicked → CRASHED);
//! - context alive but the newest status is older than the unresponsive
//!   threshold → UNRESPONSIVE;
//! - context alive with a fresh status → mirror the engine's reported mode.

use chrono::{DateTime, Utc};
use pit_schemas::{EngineExit, EngineStatus};

use crate::ProcessHealth;

/// Classify a session whose execution context has terminated.
pub fn classify_exit(exit: &EngineExit) -> ProcessHealth {
    match exit {
        EngineExit::Normal => ProcessHealth::Offline,
        EngineExit::Failed { .. } => ProcessHealth::Crashed,
    }
}

/// Classify a session whose execution context is still alive.
///
/// A session that has not emitted any status yet is judged on its spawn
/// age: engines emit on their first tick, so a silent session past the
/// threshold is as unresponsive as a stalled one.
pub fn classify_live(
    now: DateTime<Utc>,
    last_status: Option<&EngineStatus>,
    spawned_at: DateTime<Utc>,
    unresponsive_after_secs: i64,
) -> ProcessHealth {
    let reference = last_status.map(|s| s.ts_utc).unwrap_or(spawned_at);
    let age_secs = (now - reference).num_seconds();
    if age_secs > unresponsive_after_secs {
        return ProcessHealth::Unresponsive;
    }
    match last_status {
        Some(status) => ProcessHealth::from_mode(status.mode),
        None => ProcessHealth::Running,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pit_schemas::{AccountId, EngineMode};
    use uuid::Uuid;

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_790_000_000 + secs, 0).unwrap()
    }

    fn status_at(ts: DateTime<Utc>, mode: EngineMode) -> EngineStatus {
        let mut s = EngineStatus::offline(AccountId::new("1"), Uuid::nil(), 1, ts);
        s.mode = mode;
        s
    }

    #[test]
    fn normal_exit_is_offline_failed_exit_is_crashed() {
        assert_eq!(classify_exit(&EngineExit::Normal), ProcessHealth::Offline);
        assert_eq!(
            classify_exit(&EngineExit::Failed {
                reason: "boom".into()
            }),
            ProcessHealth::Crashed
        );
    }

    #[test]
    fn fresh_status_mirrors_the_reported_mode() {
        let s = status_at(t(95), EngineMode::Cooldown);
        assert_eq!(
            classify_live(t(100), Some(&s), t(0), 30),
            ProcessHealth::Cooldown
        );
    }

    #[test]
    fn stale_status_is_unresponsive() {
        let s = status_at(t(10), EngineMode::Running);
        assert_eq!(
            classify_live(t(100), Some(&s), t(0), 30),
            ProcessHealth::Unresponsive
        );
    }

    #[test]
    fn silent_session_goes_unresponsive_on_spawn_age() {
        assert_eq!(classify_live(t(10), None, t(0), 30), ProcessHealth::Running);
        assert_eq!(
            classify_live(t(100), None, t(0), 30),
            ProcessHealth::Unresponsive
        );
    }
}
