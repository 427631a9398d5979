use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::LapseError;
use crate::source::SourceKind;

/// Registrar shown when a source resolved the date but named no registrar.
pub const UNKNOWN_REGISTRAR: &str = "Unknown";

/// Display tier for a resolved domain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Expired,
    Critical,
    Warning,
    Good,
    Unknown,
    Timeout,
    Error,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Expired => "expired",
            Status::Critical => "critical",
            Status::Warning => "warning",
            Status::Good => "good",
            Status::Unknown => "unknown",
            Status::Timeout => "timeout",
            Status::Error => "error",
        }
    }

    /// True for the tiers that mean resolution did not produce a date.
    pub fn is_failure(&self) -> bool {
        matches!(self, Status::Unknown | Status::Timeout | Status::Error)
    }

    /// Urgency rank of the date-derived tiers, higher is more urgent.
    pub fn severity(&self) -> u8 {
        match self {
            Status::Good => 0,
            Status::Warning => 1,
            Status::Critical => 2,
            Status::Expired => 3,
            Status::Unknown | Status::Timeout | Status::Error => 4,
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of resolving a single domain.
///
/// Either `expiration_date` or `error` is set, never both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolutionResult {
    pub domain: String,
    pub expiration_date: Option<NaiveDate>,
    pub registrar: Option<String>,
    pub days_remaining: Option<i64>,
    pub status: Status,
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<SourceKind>,
}

impl ResolutionResult {
    pub fn resolved(
        domain: impl Into<String>,
        source: SourceKind,
        expiration_date: NaiveDate,
        registrar: Option<String>,
        days_remaining: i64,
        status: Status,
    ) -> Self {
        Self {
            domain: domain.into(),
            expiration_date: Some(expiration_date),
            registrar: Some(registrar.unwrap_or_else(|| UNKNOWN_REGISTRAR.to_string())),
            days_remaining: Some(days_remaining),
            status,
            error: None,
            source: Some(source),
        }
    }

    pub fn failed(domain: impl Into<String>, source: Option<SourceKind>, error: &LapseError) -> Self {
        Self {
            domain: domain.into(),
            expiration_date: None,
            registrar: None,
            days_remaining: None,
            status: error.status(),
            error: Some(error.to_string()),
            source,
        }
    }

    pub fn is_settled(&self) -> bool {
        self.expiration_date.is_some() != self.error.is_some()
    }
}
