//! Resolver configuration.
//!
//! Everything a resolver reads is in [`ResolverConfig`]; there is no global
//! state. Every field has a default so an empty TOML document is valid.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{LapseError, Result};
use crate::source::SourceKind;

pub const DEFAULT_RDAP_ENDPOINT: &str = "https://rdap.org";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResolverConfig {
    /// Which source every domain is resolved against
    pub source: SourceKind,
    /// Domains resolved at once within a batch
    pub concurrency: usize,
    /// Adapter calls in flight at once across all batches
    pub adapter_concurrency: usize,
    pub whois: WhoisConfig,
    pub rdap: RdapConfig,
    pub shell: ShellConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WhoisConfig {
    /// Query this server (`host` or `host:port`) instead of the TLD table
    pub server: Option<String>,
    pub timeout_secs: u64,
    pub follow_referrals: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RdapConfig {
    /// Base URL; requests go to `{endpoint}/domain/{domain}`
    pub endpoint: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ShellConfig {
    pub program: String,
    /// Arguments placed before the domain
    pub args: Vec<String>,
    pub timeout_secs: u64,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            source: SourceKind::default(),
            concurrency: 5,
            adapter_concurrency: 4,
            whois: WhoisConfig::default(),
            rdap: RdapConfig::default(),
            shell: ShellConfig::default(),
        }
    }
}

impl Default for WhoisConfig {
    fn default() -> Self {
        Self {
            server: None,
            timeout_secs: 10,
            follow_referrals: true,
        }
    }
}

impl Default for RdapConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_RDAP_ENDPOINT.to_string(),
            timeout_secs: 10,
        }
    }
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            program: "whois".to_string(),
            args: Vec::new(),
            timeout_secs: 15,
        }
    }
}

impl WhoisConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl RdapConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl ShellConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl ResolverConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: ResolverConfig = toml::from_str(content)
            .map_err(|e| LapseError::Configuration(format!("Invalid config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            LapseError::Configuration(format!("Cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn with_source(mut self, source: SourceKind) -> Self {
        self.source = source;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 || self.adapter_concurrency == 0 {
            return Err(LapseError::Configuration(
                "concurrency limits must be at least 1".to_string(),
            ));
        }
        if !self.rdap.endpoint.starts_with("http://") && !self.rdap.endpoint.starts_with("https://")
        {
            return Err(LapseError::Configuration(format!(
                "RDAP endpoint must be an http(s) URL: {}",
                self.rdap.endpoint
            )));
        }
        if self.shell.program.trim().is_empty() {
            return Err(LapseError::Configuration(
                "shell program must not be empty".to_string(),
            ));
        }
        for (name, secs) in [
            ("whois", self.whois.timeout_secs),
            ("rdap", self.rdap.timeout_secs),
            ("shell", self.shell.timeout_secs),
        ] {
            if secs == 0 {
                return Err(LapseError::Configuration(format!(
                    "{} timeout must be at least one second",
                    name
                )));
            }
        }
        Ok(())
    }
}
