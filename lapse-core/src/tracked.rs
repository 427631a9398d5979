//! Tracked domain lists and the per-domain status report built from them.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{LapseError, Result};
use crate::resolver::{ProgressCallback, Resolver};
use crate::status::{ResolutionResult, Status};

/// Domains watched when no list is supplied.
pub const DEFAULT_DOMAINS: &[&str] = &[
    "google.com",
    "example.com",
    "stackoverflow.com",
    "github.com",
    "openai.com",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedDomain {
    pub id: u64,
    pub domain: String,
}

/// Source of the domains to report on, in display order.
#[async_trait]
pub trait TrackedDomains: Send + Sync {
    async fn list_tracked_domains(&self) -> Result<Vec<TrackedDomain>>;
}

/// A fixed, in-memory domain list.
#[derive(Debug, Clone)]
pub struct MemoryTrackedDomains {
    domains: Vec<TrackedDomain>,
}

impl MemoryTrackedDomains {
    pub fn new<I, S>(domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let domains = domains
            .into_iter()
            .zip(1u64..)
            .map(|(domain, id)| TrackedDomain {
                id,
                domain: domain.into(),
            })
            .collect();
        Self { domains }
    }
}

impl Default for MemoryTrackedDomains {
    fn default() -> Self {
        Self::new(DEFAULT_DOMAINS.iter().copied())
    }
}

#[async_trait]
impl TrackedDomains for MemoryTrackedDomains {
    async fn list_tracked_domains(&self) -> Result<Vec<TrackedDomain>> {
        Ok(self.domains.clone())
    }
}

/// A domain list file, re-read on every listing.
///
/// One domain per line; blank lines and `#` comments are skipped and for
/// CSV lines only the first column is used.
#[derive(Debug, Clone)]
pub struct FileTrackedDomains {
    path: PathBuf,
}

impl FileTrackedDomains {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl TrackedDomains for FileTrackedDomains {
    async fn list_tracked_domains(&self) -> Result<Vec<TrackedDomain>> {
        let content = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            LapseError::Configuration(format!("Cannot read {}: {}", self.path.display(), e))
        })?;
        let domains = parse_domains_from_file(&content);
        debug!(path = %self.path.display(), count = domains.len(), "Loaded tracked domains");
        Ok(MemoryTrackedDomains::new(domains).domains)
    }
}

pub fn parse_domains_from_file(content: &str) -> Vec<String> {
    content
        .lines()
        .map(|line| line.trim())
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|line| line.split(',').next().unwrap_or(line).trim().to_string())
        .filter(|domain| !domain.is_empty())
        .collect()
}

/// One row of the status report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainReport {
    pub id: u64,
    pub domain: String,
    pub expiration_date: Option<NaiveDate>,
    pub days_left: Option<i64>,
    pub registrar: Option<String>,
    pub status: Status,
    pub error: Option<String>,
}

impl DomainReport {
    pub fn new(id: u64, result: ResolutionResult) -> Self {
        Self {
            id,
            domain: result.domain,
            expiration_date: result.expiration_date,
            days_left: result.days_remaining,
            registrar: result.registrar,
            status: result.status,
            error: result.error,
        }
    }
}

/// Lists the store's domains and reports on them.
pub async fn build_report(
    store: &dyn TrackedDomains,
    resolver: &Resolver,
    today: Option<NaiveDate>,
    progress: Option<ProgressCallback>,
) -> Result<Vec<DomainReport>> {
    let tracked = store.list_tracked_domains().await?;
    Ok(report_on(tracked, resolver, today, progress).await)
}

/// Resolves an already listed set of domains and pairs the results with
/// their ids, one row per entry.
pub async fn report_on(
    tracked: Vec<TrackedDomain>,
    resolver: &Resolver,
    today: Option<NaiveDate>,
    progress: Option<ProgressCallback>,
) -> Vec<DomainReport> {
    let names = tracked.iter().map(|t| t.domain.clone()).collect();
    let results = resolver.resolve_all(names, today, progress).await;

    tracked
        .into_iter()
        .zip(results)
        .map(|(t, result)| DomainReport::new(t.id, result))
        .collect()
}
