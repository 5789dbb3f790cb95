use pit_schemas::AccountId;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SupervisorError {
    /// A live session already exists for this account.
    AlreadyRunning(AccountId),
    /// No record for this account.
    UnknownAccount(AccountId),
    /// The engine did not reach OFFLINE inside the stop timeout; the record
    /// stays STOPPING and escalation to kill is the caller's decision.
    StopTimeout(AccountId),
}

impl std::fmt::Display for SupervisorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SupervisorError::AlreadyRunning(id) => {
                write!(f, "account {id} already has a running session")
            }
            SupervisorError::UnknownAccount(id) => write!(f, "no session record for account {id}"),
            SupervisorError::StopTimeout(id) => {
                write!(f, "account {id} did not stop within the timeout")
            }
        }
    }
}

impl std::error::Error for SupervisorError {}
