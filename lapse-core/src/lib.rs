//! Domain registration expiry resolution.
//!
//! A [`Resolver`] fetches registration data for a domain from one
//! configured source (port 43 WHOIS, RDAP, or the system `whois` command),
//! extracts the expiration date and registrar, and classifies how much of
//! the registration term is left.

pub mod colors;
pub mod config;
pub mod date;
pub mod error;
pub mod output;
pub mod rdap;
pub mod resolver;
pub mod source;
pub mod status;
pub mod tracked;
pub mod validation;
pub mod whois;

pub use error::{ErrorKind, LapseError, Result};
pub use validation::{normalize_domain, DomainName};

pub use config::ResolverConfig;
pub use date::normalize_date;
pub use rdap::{RdapClient, RdapResponse};
pub use resolver::{ProgressCallback, Resolver};
pub use source::{RawSourceResponse, SourceAdapter, SourceKind};
pub use status::{classify, ResolutionResult, Status};
pub use tracked::{
    build_report, report_on, DomainReport, FileTrackedDomains, MemoryTrackedDomains, TrackedDomain,
    TrackedDomains,
};
pub use whois::{ShellWhoisClient, WhoisClient};

pub use output::{OutputFormat, OutputFormatter};
