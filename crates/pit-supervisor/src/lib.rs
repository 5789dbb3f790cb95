//! Process Supervisor / Watchdog.
//!
//! Owns the registry of active accounts: spawns one isolated engine
//! execution context per account, polls liveness, classifies failures, and
//! exposes start/stop/kill with idempotent semantics. External viewers only
//! ever see snapshots; nothing outside this crate mutates a record.

mod error;
mod record;
mod supervisor;
mod watchdog;

pub use error::SupervisorError;
pub use record::{ProcessHealth, ProcessRecord};
pub use supervisor::{BrokerFactory, Supervisor, SupervisorConfig};
pub use watchdog::{classify_exit, classify_live};
