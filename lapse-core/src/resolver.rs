//! Per-domain resolution: fetch, extract, classify.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use futures::stream::{self, StreamExt};
use futures::FutureExt;
use tokio::sync::Semaphore;
use tracing::{debug, instrument, warn};

use crate::config::ResolverConfig;
use crate::error::{LapseError, Result};
use crate::rdap::RdapResponse;
use crate::source::{adapter_from_config, RawSourceResponse, SourceAdapter, SourceKind};
use crate::status::{classify, days_remaining, ResolutionResult};
use crate::validation::DomainName;
use crate::whois::{extract_expiry, extract_registrar, is_unregistered};

pub type ProgressCallback = Box<dyn Fn(usize, usize, &str) + Send + Sync>;

/// Expiry data pulled out of a raw source response.
#[derive(Debug, Clone, PartialEq)]
pub struct Extracted {
    pub expiration_date: NaiveDate,
    pub registrar: Option<String>,
}

/// Resolves domains against one configured source.
///
/// Resolution never fails: every error, including a panic inside an
/// adapter or extractor, is folded into the returned [`ResolutionResult`].
#[derive(Clone)]
pub struct Resolver {
    adapter: Arc<dyn SourceAdapter>,
    permits: Arc<Semaphore>,
    concurrency: usize,
}

impl std::fmt::Debug for Resolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolver")
            .field("source", &self.adapter.kind())
            .field("concurrency", &self.concurrency)
            .field("available_permits", &self.permits.available_permits())
            .finish()
    }
}

impl Resolver {
    pub fn new(config: ResolverConfig) -> Result<Self> {
        config.validate()?;
        let adapter = adapter_from_config(&config)?;
        Ok(Self::with_adapter(adapter, &config))
    }

    /// Uses `adapter` in place of the one `config.source` would select.
    pub fn with_adapter(adapter: Arc<dyn SourceAdapter>, config: &ResolverConfig) -> Self {
        Self {
            adapter,
            permits: Arc::new(Semaphore::new(config.adapter_concurrency.max(1))),
            concurrency: config.concurrency.max(1),
        }
    }

    pub fn source(&self) -> SourceKind {
        self.adapter.kind()
    }

    pub async fn resolve(&self, domain: &DomainName) -> ResolutionResult {
        self.resolve_as_of(domain, None).await
    }

    /// Resolves with days counted from `today` instead of the current date.
    pub async fn resolve_on(&self, domain: &DomainName, today: NaiveDate) -> ResolutionResult {
        self.resolve_as_of(domain, Some(today)).await
    }

    /// Validates `input` first; invalid names become `error` results.
    pub async fn resolve_str(&self, input: &str, today: Option<NaiveDate>) -> ResolutionResult {
        match DomainName::parse(input) {
            Ok(domain) => self.resolve_as_of(&domain, today).await,
            Err(e) => {
                warn!(input = %input, error = %e, "Skipping invalid domain");
                ResolutionResult::failed(input.trim(), None, &e)
            }
        }
    }

    /// Resolves a batch, at most `concurrency` at a time, keeping input order.
    pub async fn resolve_all(
        &self,
        domains: Vec<String>,
        today: Option<NaiveDate>,
        progress: Option<ProgressCallback>,
    ) -> Vec<ResolutionResult> {
        let total = domains.len();
        let completed = AtomicUsize::new(0);

        debug!(
            total = total,
            concurrency = self.concurrency,
            source = %self.source(),
            "Starting batch resolution"
        );

        stream::iter(domains)
            .map(|input| {
                let completed = &completed;
                let progress = progress.as_ref();
                async move {
                    let result = self.resolve_str(&input, today).await;
                    let count = completed.fetch_add(1, Ordering::Relaxed) + 1;
                    if let Some(progress) = progress {
                        progress(count, total, &result.domain);
                    }
                    result
                }
            })
            .buffered(self.concurrency)
            .collect()
            .await
    }

    #[instrument(skip(self, today), fields(domain = %domain, source = %self.adapter.kind()))]
    async fn resolve_as_of(&self, domain: &DomainName, today: Option<NaiveDate>) -> ResolutionResult {
        let source = self.adapter.kind();

        let raw = match self.fetch(domain).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = %e, "Source lookup failed");
                return ResolutionResult::failed(domain.as_str(), Some(source), &e);
            }
        };

        let extracted = std::panic::catch_unwind(AssertUnwindSafe(|| extract(domain, &raw)))
            .unwrap_or_else(|_| {
                Err(LapseError::Unknown(
                    "Failed to interpret registration data".to_string(),
                ))
            });

        match extracted {
            Ok(Extracted {
                expiration_date,
                registrar,
            }) => {
                let today = today.unwrap_or_else(|| Utc::now().date_naive());
                let days = days_remaining(expiration_date, today);
                let status = classify(days);
                debug!(expiration = %expiration_date, days = days, status = %status, "Resolved");
                ResolutionResult::resolved(
                    domain.as_str(),
                    source,
                    expiration_date,
                    registrar,
                    days,
                    status,
                )
            }
            Err(e) => {
                warn!(error = %e, "No usable expiry data");
                ResolutionResult::failed(domain.as_str(), Some(source), &e)
            }
        }
    }

    async fn fetch(&self, domain: &DomainName) -> Result<RawSourceResponse> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| LapseError::Unknown("Resolver is shutting down".to_string()))?;

        AssertUnwindSafe(self.adapter.fetch_raw(domain))
            .catch_unwind()
            .await
            .unwrap_or_else(|_| {
                Err(LapseError::Unknown(
                    "Source lookup failed unexpectedly".to_string(),
                ))
            })
    }
}

/// Pulls the expiration date and registrar out of a raw response.
pub fn extract(domain: &DomainName, raw: &RawSourceResponse) -> Result<Extracted> {
    let (expiration_date, registrar, unregistered) = match raw {
        RawSourceResponse::Text { body, parsed, .. } => {
            let parsed = parsed.clone().unwrap_or_default();
            let expiration_date = match parsed.expiration_date {
                Some(date) => Some(date),
                None => extract_expiry(body)?,
            };
            let registrar = parsed.registrar.or_else(|| extract_registrar(body));
            (expiration_date, registrar, is_unregistered(body))
        }
        RawSourceResponse::Structured { body, .. } => {
            let response = RdapResponse::from_value(body.clone())?;
            (response.expiration_date()?, response.get_registrar(), false)
        }
    };

    match expiration_date {
        Some(expiration_date) => Ok(Extracted {
            expiration_date,
            registrar,
        }),
        None if unregistered => Err(LapseError::NotRegistered(domain.to_string())),
        None => Err(LapseError::NoExpiryField(domain.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::ParsedFields;
    use crate::status::{Status, UNKNOWN_REGISTRAR};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;
    use std::time::Duration;

    type Reply = Box<dyn Fn(&DomainName) -> Result<RawSourceResponse> + Send + Sync>;

    struct FakeAdapter {
        kind: SourceKind,
        reply: Reply,
    }

    #[async_trait]
    impl SourceAdapter for FakeAdapter {
        fn kind(&self) -> SourceKind {
            self.kind
        }

        async fn fetch_raw(&self, domain: &DomainName) -> Result<RawSourceResponse> {
            (self.reply)(domain)
        }
    }

    fn resolver(
        kind: SourceKind,
        reply: impl Fn(&DomainName) -> Result<RawSourceResponse> + Send + Sync + 'static,
    ) -> Resolver {
        let adapter = FakeAdapter {
            kind,
            reply: Box::new(reply),
        };
        Resolver::with_adapter(Arc::new(adapter), &ResolverConfig::default())
    }

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn example() -> DomainName {
        DomainName::parse("example.com").unwrap()
    }

    fn rdap_body(date: &str) -> serde_json::Value {
        json!({
            "objectClassName": "domain",
            "ldhName": "example.com",
            "events": [{"eventAction": "expiration", "eventDate": date}]
        })
    }

    #[tokio::test]
    async fn test_rdap_end_to_end() {
        let resolver = resolver(SourceKind::Rdap, |_| {
            Ok(RawSourceResponse::Structured {
                source: SourceKind::Rdap,
                body: rdap_body("2030-01-01T00:00:00Z"),
            })
        });

        let result = resolver.resolve_on(&example(), ymd(2025, 1, 1)).await;
        assert_eq!(result.expiration_date, Some(ymd(2030, 1, 1)));
        assert_eq!(result.days_remaining, Some(1826));
        assert_eq!(result.status, Status::Good);
        assert_eq!(result.registrar.as_deref(), Some(UNKNOWN_REGISTRAR));
        assert_eq!(result.error, None);
        assert_eq!(result.source, Some(SourceKind::Rdap));
    }

    #[tokio::test]
    async fn test_time_of_day_is_ignored() {
        let resolver = resolver(SourceKind::Rdap, |_| {
            Ok(RawSourceResponse::Structured {
                source: SourceKind::Rdap,
                body: rdap_body("2025-01-31T23:59:59-05:00"),
            })
        });

        let result = resolver.resolve_on(&example(), ymd(2025, 1, 1)).await;
        assert_eq!(result.days_remaining, Some(30));
        assert_eq!(result.status, Status::Warning);
    }

    #[tokio::test]
    async fn test_text_without_keyword_is_unknown() {
        let resolver = resolver(SourceKind::Shell, |_| {
            Ok(RawSourceResponse::text(
                SourceKind::Shell,
                "Domain Name: EXAMPLE.COM\nName Server: A.IANA-SERVERS.NET\n",
            ))
        });

        let result = resolver.resolve_on(&example(), ymd(2025, 1, 1)).await;
        assert_eq!(result.status, Status::Unknown);
        assert_eq!(result.expiration_date, None);
        assert_eq!(
            result.error.as_deref(),
            Some("No expiration date found for example.com")
        );
        assert!(result.is_settled());
    }

    #[tokio::test]
    async fn test_unregistered_text_is_unknown() {
        let resolver = resolver(SourceKind::Whois, |_| {
            Ok(RawSourceResponse::text(
                SourceKind::Whois,
                "No match for \"EXAMPLE.COM\".\n>>> Last update of whois database: 2025-01-01 <<<\n",
            ))
        });

        let result = resolver.resolve(&example()).await;
        assert_eq!(result.status, Status::Unknown);
        assert_eq!(
            result.error.as_deref(),
            Some("Domain is not registered: example.com")
        );
    }

    #[tokio::test]
    async fn test_parsed_fields_preferred_over_keyword_scan() {
        let resolver = resolver(SourceKind::Whois, |_| {
            Ok(RawSourceResponse::Text {
                source: SourceKind::Whois,
                body: "Expiration Date: 2026-06-01\nRegistrar: Text Registrar\n".to_string(),
                parsed: Some(ParsedFields {
                    expiration_date: Some(ymd(2027, 6, 1)),
                    registrar: None,
                }),
            })
        });

        let result = resolver.resolve_on(&example(), ymd(2027, 5, 1)).await;
        assert_eq!(result.expiration_date, Some(ymd(2027, 6, 1)));
        assert_eq!(result.days_remaining, Some(31));
        assert_eq!(result.registrar.as_deref(), Some("Text Registrar"));
    }

    #[tokio::test]
    async fn test_classification_tiers() {
        let cases = [
            (ymd(2024, 12, 31), Status::Expired, -1),
            (ymd(2025, 1, 1), Status::Critical, 0),
            (ymd(2025, 1, 30), Status::Critical, 29),
            (ymd(2025, 1, 31), Status::Warning, 30),
            (ymd(2025, 4, 1), Status::Good, 90),
        ];

        for (expiry, status, days) in cases {
            let text = format!("Registry Expiry Date: {}\n", expiry.format("%Y-%m-%d"));
            let resolver = resolver(SourceKind::Shell, move |_| {
                Ok(RawSourceResponse::text(SourceKind::Shell, text.clone()))
            });
            let result = resolver.resolve_on(&example(), ymd(2025, 1, 1)).await;
            assert_eq!(result.status, status, "expiry {}", expiry);
            assert_eq!(result.days_remaining, Some(days));
        }
    }

    #[tokio::test]
    async fn test_adapter_errors_map_to_status() {
        let cases: [(SourceKind, fn() -> LapseError, Status); 7] = [
            (SourceKind::Whois, || LapseError::Timeout("connect".into()), Status::Timeout),
            (SourceKind::Rdap, || LapseError::Timeout("rdap".into()), Status::Timeout),
            (SourceKind::Shell, || LapseError::Timeout("whois".into()), Status::Timeout),
            (
                SourceKind::Rdap,
                || LapseError::NotRegistered("example.com".into()),
                Status::Unknown,
            ),
            (
                SourceKind::Rdap,
                || LapseError::HttpStatus {
                    domain: "example.com".into(),
                    status: 500,
                },
                Status::Error,
            ),
            (
                SourceKind::Shell,
                || LapseError::Configuration("whois missing".into()),
                Status::Error,
            ),
            (
                SourceKind::Shell,
                || LapseError::CommandFailed {
                    code: "exit code 1".into(),
                    output: "fgets: Connection reset by peer".into(),
                },
                Status::Error,
            ),
        ];

        for (kind, make_error, status) in cases {
            let resolver = resolver(kind, move |_| Err(make_error()));
            let result = resolver.resolve(&example()).await;
            assert_eq!(result.status, status);
            assert!(result.error.is_some());
            assert!(result.expiration_date.is_none());
            assert!(result.days_remaining.is_none());
            assert_eq!(result.source, Some(kind));
        }
    }

    #[tokio::test]
    async fn test_malformed_payloads_are_settled() {
        let payloads = vec![
            RawSourceResponse::Structured {
                source: SourceKind::Rdap,
                body: json!({"events": {"eventAction": "expiration"}}),
            },
            RawSourceResponse::Structured {
                source: SourceKind::Rdap,
                body: rdap_body("tomorrow-ish"),
            },
            RawSourceResponse::text(SourceKind::Whois, "Expiry Date: 2025-02-31\n"),
            RawSourceResponse::text(SourceKind::Shell, "\u{0}\u{1}garbage\nexpires: ??/??/????\n"),
        ];

        for payload in payloads {
            let kind = payload.source();
            let expected = payload.clone();
            let resolver = resolver(kind, move |_| Ok(expected.clone()));
            let result = resolver.resolve(&example()).await;
            assert!(result.status.is_failure(), "payload {:?}", payload);
            assert!(result.error.is_some());
            assert!(result.is_settled());
        }
    }

    #[tokio::test]
    async fn test_adapter_panic_is_contained() {
        let resolver = resolver(SourceKind::Rdap, |_| panic!("adapter bug"));
        let result = resolver.resolve(&example()).await;
        assert_eq!(result.status, Status::Error);
        assert_eq!(
            result.error.as_deref(),
            Some("Unexpected error: Source lookup failed unexpectedly")
        );
    }

    #[tokio::test]
    async fn test_invalid_input_is_error_result() {
        let resolver = resolver(SourceKind::Rdap, |_| unreachable!("not called"));
        let result = resolver.resolve_str("not a domain", None).await;
        assert_eq!(result.status, Status::Error);
        assert_eq!(result.domain, "not a domain");
        assert!(result.error.unwrap().starts_with("Invalid domain name"));
    }

    struct SlowAdapter {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl SourceAdapter for SlowAdapter {
        fn kind(&self) -> SourceKind {
            SourceKind::Whois
        }

        async fn fetch_raw(&self, domain: &DomainName) -> Result<RawSourceResponse> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);

            let delay = if domain.as_str().starts_with("slow") { 300 } else { 20 };
            tokio::time::sleep(Duration::from_millis(delay)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if domain.as_str().starts_with("slow") {
                return Err(LapseError::Timeout(format!("{} stalled", domain)));
            }
            Ok(RawSourceResponse::text(
                SourceKind::Whois,
                "Registry Expiry Date: 2030-01-01\n",
            ))
        }
    }

    #[tokio::test]
    async fn test_resolve_all_keeps_order_and_bounds_concurrency() {
        let adapter = Arc::new(SlowAdapter {
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        });
        let config = ResolverConfig {
            concurrency: 5,
            adapter_concurrency: 2,
            ..ResolverConfig::default()
        };
        let resolver = Resolver::with_adapter(adapter.clone(), &config);

        let domains: Vec<String> = vec![
            "slow.com".into(),
            "a.com".into(),
            "bad input".into(),
            "b.com".into(),
            "c.com".into(),
        ];
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_in_callback = seen.clone();
        let progress: ProgressCallback = Box::new(move |done, total, domain| {
            seen_in_callback
                .lock()
                .unwrap()
                .push((done, total, domain.to_string()));
        });

        let results = resolver
            .resolve_all(domains, Some(ymd(2025, 1, 1)), Some(progress))
            .await;

        let names: Vec<&str> = results.iter().map(|r| r.domain.as_str()).collect();
        assert_eq!(names, vec!["slow.com", "a.com", "bad input", "b.com", "c.com"]);
        assert_eq!(results[0].status, Status::Timeout);
        assert_eq!(results[1].status, Status::Good);
        assert_eq!(results[2].status, Status::Error);
        assert_eq!(results[4].status, Status::Good);

        assert!(adapter.peak.load(Ordering::SeqCst) <= 2);
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 5);
        assert!(seen.iter().all(|(_, total, _)| *total == 5));
        // The stalled domain finishes last without holding up the rest
        assert_eq!(seen.last().unwrap().2, "slow.com");
    }

    #[test]
    fn test_extract_structured_partial() {
        let raw = RawSourceResponse::Structured {
            source: SourceKind::Rdap,
            body: json!({
                "events": [{"eventAction": "registration", "eventDate": "2000-01-01"}],
                "entities": [{"roles": ["registrar"], "handle": "R-1"}]
            }),
        };
        assert!(matches!(
            extract(&example(), &raw),
            Err(LapseError::NoExpiryField(_))
        ));
    }
}
