mod display;

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use lapse_core::colors::CatppuccinExt;
use lapse_core::output::{get_formatter, OutputFormat};
use lapse_core::{
    normalize_date, report_on, FileTrackedDomains, MemoryTrackedDomains, Resolver, ResolverConfig,
    SourceKind, TrackedDomains,
};
use tracing_subscriber::EnvFilter;

use display::{ProgressWriterFactory, ReportProgress, Spinner};

#[derive(Parser)]
#[command(name = "lapse")]
#[command(about = "Domain expiry monitor - WHOIS, RDAP, or the system whois command")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format (human or json)
    #[arg(short, long, default_value = "human", global = true)]
    format: String,

    /// Lookup source: rdap, whois, or shell
    #[arg(short, long, global = true)]
    source: Option<String>,

    /// TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Number of domains resolved at once
    #[arg(long, global = true)]
    concurrency: Option<usize>,

    /// RDAP base URL (e.g., https://rdap.org)
    #[arg(long, global = true)]
    rdap_endpoint: Option<String>,

    /// WHOIS server to query instead of the TLD default
    #[arg(long, global = true)]
    whois_server: Option<String>,

    /// Compute days remaining as of this date instead of today
    #[arg(long, global = true, value_parser = parse_as_of)]
    as_of: Option<NaiveDate>,
}

#[derive(Subcommand)]
enum Commands {
    /// Check the expiration of one or more domains
    Check {
        /// Domain names to check
        #[arg(required = true)]
        domains: Vec<String>,
    },
    /// Build the status report for the tracked domain list
    Report {
        /// File containing domains: one per line, # for comments, or CSV (uses first column)
        #[arg(long)]
        file: Option<PathBuf>,
    },
}

fn parse_as_of(value: &str) -> Result<NaiveDate, String> {
    normalize_date(value).map_err(|e| e.to_string())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(ProgressWriterFactory)
        .init();

    let cli = Cli::parse();

    let config = match build_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{} {}", "Error:".ctp_red(), e);
            std::process::exit(2);
        }
    };

    let output_format: OutputFormat = cli.format.parse().unwrap_or_default();
    let resolver = match Resolver::new(config) {
        Ok(resolver) => resolver,
        Err(e) => {
            eprintln!("{} {}", "Error:".ctp_red(), e);
            std::process::exit(2);
        }
    };

    execute_command(cli.command, &resolver, output_format, cli.as_of).await
}

/// File config first, then command-line overrides on top.
fn build_config(cli: &Cli) -> anyhow::Result<ResolverConfig> {
    let mut config = match &cli.config {
        Some(path) => ResolverConfig::load(path)?,
        None => ResolverConfig::default(),
    };

    if let Some(source) = &cli.source {
        config = config.with_source(source.parse::<SourceKind>()?);
    }
    if let Some(concurrency) = cli.concurrency {
        config = config.with_concurrency(concurrency);
    }
    if let Some(endpoint) = &cli.rdap_endpoint {
        config.rdap.endpoint = endpoint.clone();
    }
    if let Some(server) = &cli.whois_server {
        config.whois.server = Some(server.clone());
    }

    config.validate()?;
    tracing::debug!(
        source = %config.source,
        concurrency = config.concurrency,
        adapter_concurrency = config.adapter_concurrency,
        "Loaded configuration"
    );
    Ok(config)
}

async fn execute_command(
    command: Commands,
    resolver: &Resolver,
    output_format: OutputFormat,
    as_of: Option<NaiveDate>,
) -> anyhow::Result<()> {
    let formatter = get_formatter(output_format);
    let interactive = output_format == OutputFormat::Human;

    match command {
        Commands::Check { domains } => {
            let results = if domains.len() == 1 {
                let _spinner = interactive.then(|| {
                    Spinner::new(&format!("Checking {} via {}...", domains[0], resolver.source()))
                });
                vec![resolver.resolve_str(&domains[0], as_of).await]
            } else {
                let progress = interactive.then(|| ReportProgress::new(domains.len()));
                let callback = progress.as_ref().map(ReportProgress::callback);
                resolver.resolve_all(domains, as_of, callback).await
            };

            for result in &results {
                println!("{}", formatter.format_result(result));
            }
        }
        Commands::Report { file } => {
            let store: Box<dyn TrackedDomains> = match file {
                Some(path) => Box::new(FileTrackedDomains::new(path)),
                None => Box::new(MemoryTrackedDomains::default()),
            };

            let tracked = match store.list_tracked_domains().await {
                Ok(tracked) => tracked,
                Err(e) => {
                    eprintln!("{} {}", "Error:".ctp_red(), e);
                    std::process::exit(1);
                }
            };
            if tracked.is_empty() {
                eprintln!(
                    "{} No valid domains found. Expected format: one domain per line, # for comments, or CSV (first column)",
                    "Error:".ctp_red()
                );
                std::process::exit(1);
            }

            let progress = interactive.then(|| ReportProgress::new(tracked.len()));
            let callback = progress.as_ref().map(ReportProgress::callback);
            let rows = report_on(tracked, resolver, as_of, callback).await;
            drop(progress);

            println!("{}", formatter.format_report(&rows));
        }
    }

    Ok(())
}
