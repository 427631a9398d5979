use thiserror::Error;

use crate::status::Status;

#[derive(Error, Debug)]
pub enum LapseError {
    #[error("Invalid domain name: {0}")]
    InvalidDomain(String),

    #[error("Domain is not registered: {0}")]
    NotRegistered(String),

    #[error("No expiration date found for {0}")]
    NoExpiryField(String),

    #[error("Unrecognized date: {0}")]
    FormatError(String),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("WHOIS lookup failed: {0}")]
    WhoisError(String),

    #[error("RDAP server returned HTTP {status} for {domain}")]
    HttpStatus { domain: String, status: u16 },

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("whois command failed ({code}): {output}")]
    CommandFailed { code: String, output: String },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Unexpected error: {0}")]
    Unknown(String),
}

/// Failure taxonomy that every [`LapseError`] belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotRegistered,
    NoExpiryField,
    FormatError,
    Transport { timeout: bool },
    Configuration,
    Unknown,
}

impl LapseError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LapseError::NotRegistered(_) => ErrorKind::NotRegistered,
            LapseError::NoExpiryField(_) => ErrorKind::NoExpiryField,
            LapseError::InvalidDomain(_)
            | LapseError::FormatError(_)
            | LapseError::MalformedResponse(_) => ErrorKind::FormatError,
            LapseError::Timeout(_) => ErrorKind::Transport { timeout: true },
            LapseError::HttpError(e) => ErrorKind::Transport {
                timeout: e.is_timeout(),
            },
            LapseError::WhoisError(_)
            | LapseError::HttpStatus { .. }
            | LapseError::CommandFailed { .. } => ErrorKind::Transport { timeout: false },
            LapseError::Configuration(_) => ErrorKind::Configuration,
            LapseError::Unknown(_) => ErrorKind::Unknown,
        }
    }

    /// The display tier a failed resolution is reported under.
    pub fn status(&self) -> Status {
        match self.kind() {
            ErrorKind::NotRegistered | ErrorKind::NoExpiryField => Status::Unknown,
            ErrorKind::Transport { timeout: true } => Status::Timeout,
            _ => Status::Error,
        }
    }
}

pub type Result<T> = std::result::Result<T, LapseError>;
