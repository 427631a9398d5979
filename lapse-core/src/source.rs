//! Registration data sources.
//!
//! Every source implements [`SourceAdapter`]: fetch whatever the source has
//! for one domain and return it untouched, or fail with a typed error.
//! Extraction happens later in the resolver.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::config::ResolverConfig;
use crate::error::{LapseError, Result};
use crate::rdap::RdapClient;
use crate::validation::DomainName;
use crate::whois::{ShellWhoisClient, WhoisClient};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Port 43 WHOIS queries
    Whois,
    /// RDAP over HTTPS
    #[default]
    Rdap,
    /// The system `whois` command
    Shell,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Whois => "whois",
            SourceKind::Rdap => "rdap",
            SourceKind::Shell => "shell",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = LapseError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "whois" | "native" => Ok(SourceKind::Whois),
            "rdap" => Ok(SourceKind::Rdap),
            "shell" | "command" => Ok(SourceKind::Shell),
            _ => Err(LapseError::Configuration(format!("Unknown source: {}", s))),
        }
    }
}

/// Fields a source already parsed out of its own response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParsedFields {
    pub expiration_date: Option<NaiveDate>,
    pub registrar: Option<String>,
}

/// Raw payload as returned by a source.
#[derive(Debug, Clone, PartialEq)]
pub enum RawSourceResponse {
    Text {
        source: SourceKind,
        body: String,
        parsed: Option<ParsedFields>,
    },
    Structured {
        source: SourceKind,
        body: serde_json::Value,
    },
}

impl RawSourceResponse {
    pub fn text(source: SourceKind, body: impl Into<String>) -> Self {
        RawSourceResponse::Text {
            source,
            body: body.into(),
            parsed: None,
        }
    }

    pub fn source(&self) -> SourceKind {
        match self {
            RawSourceResponse::Text { source, .. } => *source,
            RawSourceResponse::Structured { source, .. } => *source,
        }
    }
}

#[async_trait]
pub trait SourceAdapter: Send + Sync {
    fn kind(&self) -> SourceKind;

    /// Fetches registration data for `domain`, bounded by the source's own deadline.
    async fn fetch_raw(&self, domain: &DomainName) -> Result<RawSourceResponse>;
}

/// Builds the adapter selected by `config.source`.
pub fn adapter_from_config(config: &ResolverConfig) -> Result<Arc<dyn SourceAdapter>> {
    let adapter: Arc<dyn SourceAdapter> = match config.source {
        SourceKind::Whois => Arc::new(WhoisClient::from_config(&config.whois)),
        SourceKind::Rdap => Arc::new(RdapClient::from_config(&config.rdap)?),
        SourceKind::Shell => Arc::new(ShellWhoisClient::from_config(&config.shell)),
    };
    Ok(adapter)
}
