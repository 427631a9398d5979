//! Expiry status classification
//!
//! Turns a resolved expiration date into a display tier and carries the
//! per-domain result record the resolver hands back to callers.

mod classifier;
mod types;

pub use classifier::{classify, days_remaining, CRITICAL_DAYS, WARNING_DAYS};
pub use types::{ResolutionResult, Status, UNKNOWN_REGISTRAR};
