use chrono::NaiveDate;

use super::types::Status;

/// Fewer days than this left is critical.
pub const CRITICAL_DAYS: i64 = 30;
/// Fewer days than this left is a warning.
pub const WARNING_DAYS: i64 = 90;

pub fn classify(days_remaining: i64) -> Status {
    if days_remaining < 0 {
        Status::Expired
    } else if days_remaining < CRITICAL_DAYS {
        Status::Critical
    } else if days_remaining < WARNING_DAYS {
        Status::Warning
    } else {
        Status::Good
    }
}

/// Whole days from `today` until `expiration`, negative once it has passed.
pub fn days_remaining(expiration: NaiveDate, today: NaiveDate) -> i64 {
    (expiration - today).num_days()
}
