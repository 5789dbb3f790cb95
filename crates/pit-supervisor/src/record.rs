use chrono::{DateTime, Utc};
use pit_schemas::{AccountId, EngineExit, EngineMode, EngineStatus};
use serde::Serialize;

/// Watchdog classification of one managed session.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessHealth {
    Running,
    Cooldown,
    Stopping,
    Offline,
    Crashed,
    Unresponsive,
}

impl ProcessHealth {
    /// Mirror a live engine's reported mode.
    pub fn from_mode(mode: EngineMode) -> Self {
        match mode {
            EngineMode::Running => ProcessHealth::Running,
            EngineMode::Cooldown => ProcessHealth::Cooldown,
            EngineMode::Stopping => ProcessHealth::Stopping,
            EngineMode::Offline => ProcessHealth::Offline,
        }
    }

    /// Terminated states: the session is gone and only operator action
    /// (acknowledge, or kill+start) moves things forward.
    pub fn is_terminated(&self) -> bool {
        matches!(self, ProcessHealth::Offline | ProcessHealth::Crashed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessHealth::Running => "RUNNING",
            ProcessHealth::Cooldown => "COOLDOWN",
            ProcessHealth::Stopping => "STOPPING",
            ProcessHealth::Offline => "OFFLINE",
            ProcessHealth::Crashed => "CRASHED",
            ProcessHealth::Unresponsive => "UNRESPONSIVE",
        }
    }
}

impl std::fmt::Display for ProcessHealth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Supervisor-owned view of one account's session.
#[derive(Clone, Debug, Serialize)]
pub struct ProcessRecord {
    pub account: AccountId,
    pub health: ProcessHealth,
    pub spawned_at_utc: DateTime<Utc>,
    /// Latest status snapshot received over the Status Channel.
    pub last_status: Option<EngineStatus>,
    /// How the execution context ended, once it has.
    pub exit: Option<EngineExit>,
    /// Operator has dismissed this terminated record; the next watchdog
    /// tick removes it.
    pub acknowledged: bool,
}

impl ProcessRecord {
    pub fn spawned(account: AccountId, now: DateTime<Utc>) -> Self {
        Self {
            account,
            health: ProcessHealth::Running,
            spawned_at_utc: now,
            last_status: None,
            exit: None,
            acknowledged: false,
        }
    }
}
