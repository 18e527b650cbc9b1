//! Wall-clock pacing for the daily cycle.
use chrono::{Days, NaiveDateTime};
use std::time::Duration;

/// Time until the next instant at `target_hour:00:00` local.
/// If `now` is at or past that instant today, the target rolls to the same
/// hour tomorrow. Pure; no side effects.
pub fn seconds_until_hour(now: NaiveDateTime, target_hour: u32) -> Duration {
    let today = now.date();
    let Some(mut target) = today.and_hms_opt(target_hour, 0, 0) else {
        // Out-of-range hour; config validation keeps this unreachable.
        return Duration::from_secs(60);
    };

    if now >= target {
        let tomorrow = today.checked_add_days(Days::new(1)).unwrap_or(today);
        let Some(next) = tomorrow.and_hms_opt(target_hour, 0, 0) else {
            return Duration::from_secs(60);
        };
        target = next;
    }

    (target - now)
        .to_std()
        .unwrap_or_else(|_| Duration::from_secs(60))
}
