//! Cooldown Scheduler.
//!
//! Pure timestamp math: given a cooldown policy and "now", compute the next
//! eligible resume time, and detect weekend market closure. Everything takes
//! `now` as an argument and is deterministic and idempotent; callers own
//! the clock.
//!
//! Policy semantics:
//! - `Duration`: now + hours/minutes.
//! - `NextDayAt`: tomorrow at a fixed local time in the operator timezone.
//! - `NextCandle`: the next timeframe boundary in epoch seconds.
//!
//! Any resume time landing on a weekend is shifted to the following Monday
//! preserving the local time-of-day. Weekend detection and the "next market
//! open" override are separate checks run before every RUNNING start attempt.

use chrono::{DateTime, Datelike, Days, LocalResult, NaiveTime, TimeZone, Timelike, Utc};
use chrono_tz::Tz;
use pit_schemas::Timeframe;
use serde::{Deserialize, Serialize};

/// How long a session stays in cooldown after a risk-triggered stop.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum CooldownPolicy {
    /// Resume tomorrow at this local time.
    NextDayAt { time: NaiveTime },
    /// Resume after a fixed duration.
    Duration { hours: u32, minutes: u32 },
    /// Resume at the next candle boundary of the given timeframe.
    NextCandle { timeframe: Timeframe },
}

/// FX week opens Sunday 22:00 UTC.
const MARKET_OPEN_UTC_HOUR: u32 = 22;

/// Resolve a local wall-clock datetime, stepping over DST gaps.
///
/// Ambiguous times (clocks rolled back) resolve to the earlier instant; a
/// nonexistent time (clocks rolled forward) is pushed one hour later.
fn resolve_local(tz: Tz, naive: chrono::NaiveDateTime) -> DateTime<Tz> {
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => dt,
        LocalResult::Ambiguous(earliest, _) => earliest,
        LocalResult::None => {
            let shifted = naive + chrono::Duration::hours(1);
            match tz.from_local_datetime(&shifted) {
                LocalResult::Single(dt) => dt,
                LocalResult::Ambiguous(earliest, _) => earliest,
                // Two adjacent DST gaps do not occur in tzdata; fall back to
                // interpreting the wall time as UTC rather than panicking.
                LocalResult::None => Utc
                    .from_utc_datetime(&shifted)
                    .with_timezone(&tz),
            }
        }
    }
}

/// Shift a weekend-landing resume time to the following Monday, preserving
/// the local time-of-day.
fn skip_weekend(local: DateTime<Tz>) -> DateTime<Tz> {
    let weekday = local.weekday().num_days_from_monday(); // Mon=0 .. Sun=6
    if weekday < 5 {
        return local;
    }
    let days_to_monday = 7 - weekday;
    let monday = local.date_naive() + Days::new(days_to_monday as u64);
    resolve_local(local.timezone(), monday.and_time(local.time()))
}

/// Compute the next eligible resume timestamp for a cooldown starting now.
///
/// Deterministic and idempotent: repeated evaluation with the same inputs
/// yields the same instant.
pub fn resume_at(policy: &CooldownPolicy, now_utc: DateTime<Utc>, tz: Tz) -> DateTime<Utc> {
    let local_now = now_utc.with_timezone(&tz);

    let initial = match policy {
        CooldownPolicy::Duration { hours, minutes } => {
            local_now
                + chrono::Duration::hours(*hours as i64)
                + chrono::Duration::minutes(*minutes as i64)
        }
        CooldownPolicy::NextDayAt { time } => {
            let next_day = local_now.date_naive() + Days::new(1);
            resolve_local(tz, next_day.and_time(*time))
        }
        CooldownPolicy::NextCandle { timeframe } => {
            let tf = timeframe.secs();
            let next_boundary = (now_utc.timestamp() / tf + 1) * tf;
            // In range for any plausible wall clock; fall back to now on a
            // degenerate timestamp rather than panicking.
            DateTime::<Utc>::from_timestamp(next_boundary, 0)
                .unwrap_or(now_utc)
                .with_timezone(&tz)
        }
    };

    skip_weekend(initial).with_timezone(&Utc)
}

/// Weekend market-closure check.
///
/// The FX week runs Sunday 22:00 UTC to Friday 22:00 UTC; anything in
/// between is closed regardless of the operator timezone. (Holidays beyond
/// the weekend are left to the operator's own scheduling.)
pub fn market_closed(now_utc: DateTime<Utc>) -> bool {
    let weekday = now_utc.weekday().num_days_from_monday(); // Mon=0 .. Sun=6
    match weekday {
        5 => true,                                                  // Saturday
        6 => now_utc.time().hour() < MARKET_OPEN_UTC_HOUR,          // Sunday pre-open
        4 => now_utc.time().hour() >= MARKET_OPEN_UTC_HOUR,         // Friday post-close
        _ => false,
    }
}

/// Resume point for a start attempt made while the market is closed.
///
/// For a `NextDayAt` policy the session waits for Monday at the configured
/// time; every other policy resumes at the FX week open (Sunday 22:00 UTC).
/// This override applies to the single blocked start attempt only; the
/// configured policy governs all later cooldowns.
pub fn next_market_open(
    now_utc: DateTime<Utc>,
    tz: Tz,
    policy: &CooldownPolicy,
) -> DateTime<Utc> {
    let local_now = now_utc.with_timezone(&tz);
    let weekday = local_now.weekday().num_days_from_monday();

    if let CooldownPolicy::NextDayAt { time } = policy {
        let days_to_monday = 7 - weekday;
        let monday = local_now.date_naive() + Days::new(days_to_monday as u64);
        return resolve_local(tz, monday.and_time(*time)).with_timezone(&Utc);
    }

    // Upcoming Sunday, 22:00 UTC.
    let days_to_sunday = 6 - weekday;
    let sunday = (local_now + chrono::Duration::days(days_to_sunday as i64)).date_naive();
    let open = sunday
        .and_hms_opt(MARKET_OPEN_UTC_HOUR, 0, 0)
        .expect("22:00:00 is a valid wall time");
    Utc.from_utc_datetime(&open)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono_tz::Tz;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    #[test]
    fn duration_cooldown_is_exact_and_idempotent() {
        // Wednesday 2026-03-04 10:00 UTC + 1h30m.
        let now = utc(2026, 3, 4, 10, 0);
        let policy = CooldownPolicy::Duration {
            hours: 1,
            minutes: 30,
        };
        let first = resume_at(&policy, now, Tz::UTC);
        assert_eq!(first, utc(2026, 3, 4, 11, 30));
        assert_eq!(resume_at(&policy, now, Tz::UTC), first);
    }

    #[test]
    fn next_candle_rounds_up_to_the_boundary() {
        let now = utc(2026, 3, 4, 10, 7);
        let policy = CooldownPolicy::NextCandle {
            timeframe: Timeframe::M15,
        };
        assert_eq!(resume_at(&policy, now, Tz::UTC), utc(2026, 3, 4, 10, 15));
    }

    #[test]
    fn weekend_landing_shifts_to_monday_same_time() {
        // Friday 2026-03-06 23:00 UTC + 4h lands Saturday 03:00.
        let now = utc(2026, 3, 6, 23, 0);
        let policy = CooldownPolicy::Duration {
            hours: 4,
            minutes: 0,
        };
        // Monday 2026-03-09 03:00.
        assert_eq!(resume_at(&policy, now, Tz::UTC), utc(2026, 3, 9, 3, 0));
    }

    #[test]
    fn closure_window_tracks_the_fx_week() {
        assert!(market_closed(utc(2026, 3, 7, 12, 0))); // Saturday
        assert!(market_closed(utc(2026, 3, 6, 23, 0))); // Friday post-close
        assert!(market_closed(utc(2026, 3, 8, 12, 0))); // Sunday pre-open
        assert!(!market_closed(utc(2026, 3, 8, 22, 30))); // Sunday post-open
        assert!(!market_closed(utc(2026, 3, 4, 12, 0))); // Wednesday
    }
}
