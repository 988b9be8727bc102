//! Error types for porkbun-dns.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for porkbun-dns.
pub type Result<T> = std::result::Result<T, PorkbunError>;

/// Porkbun client error types.
#[derive(Error, Debug)]
pub enum PorkbunError {
    /// Missing or invalid setting.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Connection failure, timeout or malformed response.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Well-formed envelope with a non-success status.
    #[error("API error: {message}")]
    Api { message: String },

    /// Directory creation or file write failed.
    #[error("Filesystem error ({}): {source}", path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// One address family could not be resolved.
    #[error("Could not resolve a public {family} address")]
    Resolution { family: &'static str },
}

impl PorkbunError {
    /// Wrap an IO error with the path it happened on.
    pub fn filesystem(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PorkbunError::Filesystem {
            path: path.into(),
            source,
        }
    }

    /// Process exit code for this error kind.
    pub fn exit_code(&self) -> u8 {
        match self {
            PorkbunError::Config(_) => 2,
            PorkbunError::Transport(_) => 3,
            PorkbunError::Api { .. } => 4,
            PorkbunError::Filesystem { .. } => 5,
            PorkbunError::Resolution { .. } => 6,
        }
    }
}

impl From<reqwest::Error> for PorkbunError {
    fn from(e: reqwest::Error) -> Self {
        PorkbunError::Transport(e.to_string())
    }
}

impl From<toml::de::Error> for PorkbunError {
    fn from(e: toml::de::Error) -> Self {
        PorkbunError::Config(e.to_string())
    }
}

impl From<toml::ser::Error> for PorkbunError {
    fn from(e: toml::ser::Error) -> Self {
        PorkbunError::Config(e.to_string())
    }
}

impl From<serde_json::Error> for PorkbunError {
    fn from(e: serde_json::Error) -> Self {
        PorkbunError::Transport(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_are_distinct() {
        let errors = [
            PorkbunError::Config("x".to_string()),
            PorkbunError::Transport("x".to_string()),
            PorkbunError::Api {
                message: "x".to_string(),
            },
            PorkbunError::filesystem("/tmp/x", std::io::Error::other("x")),
            PorkbunError::Resolution { family: "IPv6" },
        ];
        let mut codes: Vec<u8> = errors.iter().map(|e| e.exit_code()).collect();
        codes.sort();
        codes.dedup();
        assert_eq!(codes.len(), 5);
        assert!(codes.iter().all(|c| *c != 0));
    }

    #[test]
    fn test_api_error_keeps_message() {
        let err = PorkbunError::Api {
            message: "Invalid API key. (002)".to_string(),
        };
        assert_eq!(err.to_string(), "API error: Invalid API key. (002)");
    }
}
