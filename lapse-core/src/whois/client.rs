use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, instrument, warn};

use super::parser::parse_labeled_fields;
use super::servers::{get_whois_server, IANA_WHOIS_SERVER};
use crate::config::WhoisConfig;
use crate::error::{LapseError, Result};
use crate::source::{RawSourceResponse, SourceAdapter, SourceKind};
use crate::validation::DomainName;

const WHOIS_PORT: u16 = 43;
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_RESPONSE_SIZE: usize = 1024 * 1024; // 1MB
const MAX_REFERRAL_DEPTH: u8 = 3;

static REFERRAL_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?im)^\s*Registrar WHOIS Server:[ \t]*(\S+)",
        r"(?im)^\s*Whois Server:[ \t]*(\S+)",
        r"(?im)^\s*refer:[ \t]*(\S+)",
        r"(?im)^\s*ReferralServer:[ \t]*whois://(\S+)",
    ]
    .iter()
    .filter_map(|p| Regex::new(p).ok())
    .collect()
});

/// Port 43 WHOIS client.
#[derive(Debug, Clone)]
pub struct WhoisClient {
    timeout: Duration,
    server: Option<String>,
    follow_referrals: bool,
}

impl Default for WhoisClient {
    fn default() -> Self {
        Self::new()
    }
}

impl WhoisClient {
    pub fn new() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            server: None,
            follow_referrals: true,
        }
    }

    pub fn from_config(config: &WhoisConfig) -> Self {
        Self {
            timeout: config.timeout(),
            server: config.server.clone(),
            follow_referrals: config.follow_referrals,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Always start at `server` (`host` or `host:port`).
    pub fn with_server(mut self, server: impl Into<String>) -> Self {
        self.server = Some(server.into());
        self
    }

    pub fn follow_referrals(mut self, follow: bool) -> Self {
        self.follow_referrals = follow;
        self
    }

    /// Returns the raw text of the most specific server that answered.
    #[instrument(skip(self), fields(domain = %domain))]
    pub async fn lookup(&self, domain: &DomainName) -> Result<String> {
        let server = self.initial_server(domain)?;

        timeout(self.timeout, self.lookup_with_referrals(domain, server))
            .await
            .map_err(|_| {
                LapseError::Timeout(format!(
                    "WHOIS lookup for {} exceeded {}s",
                    domain,
                    self.timeout.as_secs()
                ))
            })?
    }

    fn initial_server(&self, domain: &DomainName) -> Result<String> {
        if let Some(server) = &self.server {
            return Ok(server.clone());
        }
        match get_whois_server(domain.tld()) {
            Some(server) => Ok(server.to_string()),
            None if self.follow_referrals => Ok(IANA_WHOIS_SERVER.to_string()),
            None => Err(LapseError::Configuration(format!(
                "No WHOIS server known for .{}",
                domain.tld()
            ))),
        }
    }

    async fn lookup_with_referrals(&self, domain: &DomainName, server: String) -> Result<String> {
        let mut visited = HashSet::new();
        let mut server = server;
        let mut last_response: Option<String> = None;

        for depth in 0..=MAX_REFERRAL_DEPTH {
            visited.insert(server.to_lowercase());
            debug!(whois_server = %server, depth = depth, "Querying WHOIS server");

            let response = match self.query_server(&server, domain.as_str()).await {
                Ok(response) => response,
                // A registrar server failing is not fatal once the registry answered
                Err(e) => match last_response {
                    Some(previous) => {
                        warn!(server = %server, error = %e, "Referral query failed, using previous response");
                        return Ok(previous);
                    }
                    None => return Err(e),
                },
            };

            let referral = if self.follow_referrals && depth < MAX_REFERRAL_DEPTH {
                extract_referral(&response).filter(|r| !visited.contains(r))
            } else {
                None
            };

            match referral {
                Some(next) => {
                    debug!(referral = %next, "Following referral");
                    last_response = Some(response);
                    server = next;
                }
                None => return Ok(response),
            }
        }

        last_response.ok_or_else(|| {
            LapseError::WhoisError("Maximum WHOIS referral depth exceeded".to_string())
        })
    }

    async fn query_server(&self, server: &str, query: &str) -> Result<String> {
        let addr = if server.contains(':') {
            server.to_string()
        } else {
            format!("{}:{}", server, WHOIS_PORT)
        };

        let mut stream = TcpStream::connect(&addr)
            .await
            .map_err(|e| LapseError::WhoisError(format!("Failed to connect to {}: {}", server, e)))?;

        stream
            .write_all(format!("{}\r\n", query).as_bytes())
            .await
            .map_err(|e| LapseError::WhoisError(format!("Failed to send query: {}", e)))?;

        let mut response = Vec::new();
        let mut buf = [0u8; 4096];

        loop {
            match stream.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => {
                    response.extend_from_slice(&buf[..n]);
                    if response.len() > MAX_RESPONSE_SIZE {
                        return Err(LapseError::WhoisError("Response too large".to_string()));
                    }
                }
                Err(e) => return Err(LapseError::WhoisError(format!("Read error: {}", e))),
            }
        }

        if response.is_empty() {
            return Err(LapseError::WhoisError(format!(
                "Empty response from {}",
                server
            )));
        }

        // Try UTF-8, fall back to Latin-1
        Ok(String::from_utf8(response)
            .unwrap_or_else(|e| e.into_bytes().iter().map(|&c| c as char).collect()))
    }
}

#[async_trait]
impl SourceAdapter for WhoisClient {
    fn kind(&self) -> SourceKind {
        SourceKind::Whois
    }

    async fn fetch_raw(&self, domain: &DomainName) -> Result<RawSourceResponse> {
        let body = self.lookup(domain).await?;
        let parsed = parse_labeled_fields(&body);
        Ok(RawSourceResponse::Text {
            source: SourceKind::Whois,
            body,
            parsed: Some(parsed),
        })
    }
}

fn extract_referral(response: &str) -> Option<String> {
    for re in REFERRAL_PATTERNS.iter() {
        if let Some(m) = re.captures(response).and_then(|caps| caps.get(1)) {
            let server = m.as_str().trim().trim_end_matches('/').to_lowercase();
            if !server.is_empty() && server.contains('.') {
                return Some(server);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tokio::io::AsyncBufReadExt;
    use tokio::net::TcpListener;

    /// Serves one canned response per connection and reports the query it got.
    async fn serve(response: &'static str) -> (String, tokio::sync::mpsc::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let (tx, rx) = tokio::sync::mpsc::channel(4);

        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let tx = tx.clone();
                tokio::spawn(async move {
                    let mut reader = tokio::io::BufReader::new(stream);
                    let mut line = String::new();
                    reader.read_line(&mut line).await.unwrap();
                    let _ = tx.send(line).await;
                    reader.get_mut().write_all(response.as_bytes()).await.unwrap();
                });
            }
        });

        (addr, rx)
    }

    #[test]
    fn test_extract_referral() {
        assert_eq!(
            extract_referral("   Registrar WHOIS Server: whois.markmonitor.com\n"),
            Some("whois.markmonitor.com".to_string())
        );
        assert_eq!(
            extract_referral("refer:        whois.nic.xyz\n"),
            Some("whois.nic.xyz".to_string())
        );
        assert_eq!(
            extract_referral("ReferralServer: whois://whois.arin.net/\n"),
            Some("whois.arin.net".to_string())
        );
        assert_eq!(extract_referral("Registrar WHOIS Server: \n"), None);
    }

    #[test]
    fn test_unknown_tld_without_referrals_is_configuration_error() {
        let client = WhoisClient::new().follow_referrals(false);
        let domain = DomainName::parse("example.invalidtld").unwrap();
        assert!(matches!(
            client.initial_server(&domain),
            Err(LapseError::Configuration(_))
        ));

        let client = WhoisClient::new();
        assert_eq!(client.initial_server(&domain).unwrap(), IANA_WHOIS_SERVER);
    }

    #[tokio::test]
    async fn test_fetch_raw_from_local_server() {
        let (addr, mut queries) = serve(
            "Domain Name: EXAMPLE.COM\r\nRegistry Expiry Date: 2030-01-01T00:00:00Z\r\nRegistrar: Example Registrar\r\n",
        )
        .await;
        let client = WhoisClient::new()
            .with_server(addr)
            .follow_referrals(false);

        let domain = DomainName::parse("example.com").unwrap();
        let raw = client.fetch_raw(&domain).await.unwrap();

        assert_eq!(queries.recv().await.unwrap(), "example.com\r\n");
        match raw {
            RawSourceResponse::Text {
                source,
                body,
                parsed,
            } => {
                assert_eq!(source, SourceKind::Whois);
                assert!(body.contains("EXAMPLE.COM"));
                let parsed = parsed.unwrap();
                assert_eq!(
                    parsed.expiration_date,
                    NaiveDate::from_ymd_opt(2030, 1, 1)
                );
                assert_eq!(parsed.registrar.as_deref(), Some("Example Registrar"));
            }
            other => panic!("unexpected payload: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_follows_referral_once() {
        let (registrar_addr, _rx) = serve("Registrar: Referred Registrar\nExpiry Date: 2031-02-03\n").await;
        let registry_response: &'static str = Box::leak(
            format!("Domain Name: EXAMPLE.COM\nRegistrar WHOIS Server: {}\n", registrar_addr)
                .into_boxed_str(),
        );
        let (registry_addr, _rx2) = serve(registry_response).await;

        let client = WhoisClient::new().with_server(registry_addr);
        let domain = DomainName::parse("example.com").unwrap();
        let body = client.lookup(&domain).await.unwrap();
        assert!(body.contains("Referred Registrar"));
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        let client = WhoisClient::new().with_server(addr).follow_referrals(false);
        let domain = DomainName::parse("example.com").unwrap();
        let err = client.fetch_raw(&domain).await.unwrap_err();
        assert!(matches!(err, LapseError::WhoisError(_)));
    }

    #[tokio::test]
    async fn test_silent_server_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        tokio::spawn(async move {
            let (_stream, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(30)).await;
        });

        let client = WhoisClient::new()
            .with_server(addr)
            .with_timeout(Duration::from_millis(200));
        let domain = DomainName::parse("example.com").unwrap();
        let err = client.fetch_raw(&domain).await.unwrap_err();
        assert!(matches!(err, LapseError::Timeout(_)));
    }
}
