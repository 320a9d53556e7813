use thiserror::Error;

use crate::dns::ParseError;

/// Transport-level failures. None of these stop the server; they are logged
/// and the offending message or connection is dropped.
#[derive(Error, Debug, Clone)]
pub enum DnsError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Timed out: {0}")]
    Timeout(String),
}

impl From<std::io::Error> for DnsError {
    fn from(err: std::io::Error) -> Self {
        DnsError::Io(err.to_string())
    }
}

impl From<ParseError> for DnsError {
    fn from(err: ParseError) -> Self {
        DnsError::Parse(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, DnsError>;

/// Startup configuration errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid bind address: {0}")]
    InvalidBindAddress(String),

    #[error("Invalid HTTP bind address: {0}")]
    InvalidHttpBindAddress(String),

    #[error("Invalid server name: {0}")]
    InvalidServerName(String),

    #[error("Invalid timeout: {0}")]
    InvalidTimeout(String),

    #[error("Invalid network: {0} (expected udp, tcp or both)")]
    InvalidNetwork(String),
}
