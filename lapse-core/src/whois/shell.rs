use std::io::ErrorKind;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, instrument};

use crate::config::ShellConfig;
use crate::error::{LapseError, Result};
use crate::source::{RawSourceResponse, SourceAdapter, SourceKind};
use crate::validation::DomainName;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Runs the system `whois` command and captures its output.
#[derive(Debug, Clone)]
pub struct ShellWhoisClient {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl Default for ShellWhoisClient {
    fn default() -> Self {
        Self::new()
    }
}

impl ShellWhoisClient {
    pub fn new() -> Self {
        Self {
            program: "whois".to_string(),
            args: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn from_config(config: &ShellConfig) -> Self {
        Self {
            program: config.program.clone(),
            args: config.args.clone(),
            timeout: config.timeout(),
        }
    }

    pub fn with_program(mut self, program: impl Into<String>, args: Vec<String>) -> Self {
        self.program = program.into();
        self.args = args;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[instrument(skip(self), fields(domain = %domain, program = %self.program))]
    pub async fn run(&self, domain: &DomainName) -> Result<String> {
        let child = Command::new(&self.program)
            .args(&self.args)
            .arg(domain.as_str())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound | ErrorKind::PermissionDenied => LapseError::Configuration(
                    format!("whois client '{}' is not available: {}", self.program, e),
                ),
                _ => LapseError::CommandFailed {
                    code: "spawn".to_string(),
                    output: e.to_string(),
                },
            })?;

        // Dropping the output future on timeout kills the child
        let output = timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| {
                LapseError::Timeout(format!(
                    "{} {} did not finish within {}s",
                    self.program,
                    domain,
                    self.timeout.as_secs()
                ))
            })?
            .map_err(|e| LapseError::CommandFailed {
                code: "io".to_string(),
                output: e.to_string(),
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let code = output
                .status
                .code()
                .map(|c| format!("exit code {}", c))
                .unwrap_or_else(|| "terminated by signal".to_string());
            return Err(LapseError::CommandFailed {
                code,
                output: if stderr.is_empty() {
                    stdout.trim().to_string()
                } else {
                    stderr
                },
            });
        }

        debug!(bytes = stdout.len(), "whois command finished");
        Ok(stdout)
    }
}

#[async_trait]
impl SourceAdapter for ShellWhoisClient {
    fn kind(&self) -> SourceKind {
        SourceKind::Shell
    }

    async fn fetch_raw(&self, domain: &DomainName) -> Result<RawSourceResponse> {
        let body = self.run(domain).await?;
        Ok(RawSourceResponse::text(SourceKind::Shell, body))
    }
}
