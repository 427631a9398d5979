use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tracing::{debug, instrument};

use crate::config::{RdapConfig, DEFAULT_RDAP_ENDPOINT};
use crate::error::{LapseError, Result};
use crate::source::{RawSourceResponse, SourceAdapter, SourceKind};
use crate::validation::DomainName;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
const USER_AGENT: &str = concat!("lapse/", env!("CARGO_PKG_VERSION"), " (RDAP Client)");

/// RDAP client for a single lookup service.
#[derive(Debug, Clone)]
pub struct RdapClient {
    http: Client,
    endpoint: String,
    timeout: Duration,
}

impl RdapClient {
    pub fn new() -> Result<Self> {
        Self::with_endpoint(DEFAULT_RDAP_ENDPOINT, DEFAULT_TIMEOUT)
    }

    pub fn from_config(config: &RdapConfig) -> Result<Self> {
        Self::with_endpoint(&config.endpoint, config.timeout())
    }

    pub fn with_endpoint(endpoint: &str, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| LapseError::Configuration(format!("Cannot build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            timeout,
        })
    }

    pub fn domain_url(&self, domain: &DomainName) -> String {
        format!("{}/domain/{}", self.endpoint, domain)
    }

    /// Fetches the RDAP domain object as untyped JSON.
    #[instrument(skip(self), fields(domain = %domain))]
    pub async fn lookup_domain(&self, domain: &DomainName) -> Result<serde_json::Value> {
        let url = self.domain_url(domain);
        debug!(url = %url, "Querying RDAP");

        let response = self
            .http
            .get(&url)
            .header("Accept", "application/rdap+json, application/json")
            .send()
            .await
            .map_err(|e| self.transport_error(domain, e))?;

        match response.status() {
            StatusCode::OK => {}
            StatusCode::NOT_FOUND => {
                return Err(LapseError::NotRegistered(domain.to_string()));
            }
            status => {
                return Err(LapseError::HttpStatus {
                    domain: domain.to_string(),
                    status: status.as_u16(),
                });
            }
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| self.transport_error(domain, e))?;

        serde_json::from_slice(&body).map_err(|e| {
            LapseError::MalformedResponse(format!("RDAP body for {} is not JSON: {}", domain, e))
        })
    }

    fn transport_error(&self, domain: &DomainName, error: reqwest::Error) -> LapseError {
        if error.is_timeout() {
            LapseError::Timeout(format!(
                "RDAP lookup for {} exceeded {}s",
                domain,
                self.timeout.as_secs()
            ))
        } else {
            LapseError::HttpError(error)
        }
    }
}

#[async_trait]
impl SourceAdapter for RdapClient {
    fn kind(&self) -> SourceKind {
        SourceKind::Rdap
    }

    async fn fetch_raw(&self, domain: &DomainName) -> Result<RawSourceResponse> {
        let body = self.lookup_domain(domain).await?;
        Ok(RawSourceResponse::Structured {
            source: SourceKind::Rdap,
            body,
        })
    }
}
