use chrono::{DateTime, Utc};
use pit_broker::AccountSnapshot;
use pit_risk::SessionStats;
use uuid::Uuid;

/// One RUNNING period: identity plus the stats the Risk Governor reads.
///
/// A new session begins at engine start and again every time cooldown ends;
/// the balance baseline and peak equity re-seed from the broker snapshot at
/// that moment, and the consecutive-loss counter starts at zero.
#[derive(Clone, Debug)]
pub struct Session {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    pub stats: SessionStats,
}

impl Session {
    pub fn fresh(now: DateTime<Utc>, snapshot: AccountSnapshot) -> Self {
        Self {
            id: Uuid::new_v4(),
            started_at: now,
            stats: SessionStats::new(
                now.timestamp(),
                snapshot.balance_micros,
                snapshot.equity_micros,
            ),
        }
    }
}
