//! Error types for HPCBridge
//!
//! Every failure of the translation pipeline and of its collaborators is a
//! variant of [`HpcError`]. Errors are returned to the caller unchanged;
//! nothing in the crate retries or substitutes a default value.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for HPCBridge operations
#[derive(Error, Debug)]
pub enum HpcError {
    /// Job script (or config file) could not be opened or read
    #[error("I/O error at '{}': {source}", path.display())]
    Io {
        /// Path being accessed (`<stdin>` for standard input)
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Directive or command line syntax is malformed
    #[error("{0}")]
    Parse(String),

    /// A resource string could not be decoded
    #[error("invalid {field} request '{value}': {reason}")]
    Decode {
        /// Option or resource name the value came from
        field: String,
        /// Offending input
        value: String,
        /// Why it was rejected
        reason: String,
    },

    /// Requested scale does not fit the queue
    #[error("node scale {requested} outside queue limits (1-{limit})")]
    Resource {
        /// Requested node count
        requested: i64,
        /// Queue machine scale limit
        limit: u32,
    },

    /// Remote API answered with a non-success status
    #[error("HTTP {status}{}", message.as_deref().filter(|m| !m.is_empty()).map(|m| format!(": {m}")).unwrap_or_default())]
    Http {
        /// HTTP status code
        status: u16,
        /// Message from a `{"error": "..."}` body, verbatim
        message: Option<String>,
    },

    /// Network-level failure talking to the remote API
    #[error("transport error: {0}")]
    Transport(String),

    /// Unknown cluster, queue or credentials
    #[error("cannot find {what} '{name}'")]
    NotFound {
        /// Kind of thing looked up
        what: &'static str,
        /// Name that was looked up
        name: String,
    },

    /// Cluster configuration is unreadable or invalid
    #[error("configuration error: {0}")]
    Config(String),
}

impl HpcError {
    /// Create an I/O error with path context
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a parse error
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse(message.into())
    }

    /// Create a decode error for a resource field
    pub fn decode(
        field: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::Decode {
            field: field.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// Create a not-found error
    pub fn not_found(what: &'static str, name: impl Into<String>) -> Self {
        Self::NotFound {
            what,
            name: name.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Whether the error happened after reaching the remote service
    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Http { .. } | Self::Transport(_))
    }
}

/// Result type alias for HPCBridge operations
pub type Result<T> = std::result::Result<T, HpcError>;

impl From<std::io::Error> for HpcError {
    fn from(err: std::io::Error) -> Self {
        HpcError::Io {
            path: PathBuf::new(),
            source: err,
        }
    }
}

impl From<serde_json::Error> for HpcError {
    fn from(err: serde_json::Error) -> Self {
        HpcError::Config(err.to_string())
    }
}

impl From<reqwest::Error> for HpcError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => HpcError::Http {
                status: status.as_u16(),
                message: None,
            },
            None => HpcError::Transport(err.to_string()),
        }
    }
}

/// Extension trait for adding path context to std::io::Result
pub trait IoResultExt<T> {
    /// Add path context to an I/O error
    fn with_path(self, path: impl Into<PathBuf>) -> Result<T>;
}

impl<T> IoResultExt<T> for std::io::Result<T> {
    fn with_path(self, path: impl Into<PathBuf>) -> Result<T> {
        self.map_err(|e| HpcError::io(path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_with_path() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Result<()> = Err(io_err).with_path("/jobs/run.sh");
        let msg = err.unwrap_err().to_string();
        assert!(msg.contains("/jobs/run.sh"));
        assert!(msg.contains("file not found"));
    }

    #[test]
    fn test_http_error_message_is_verbatim() {
        let err = HpcError::Http {
            status: 400,
            message: Some("Invalid machine type: n9".to_string()),
        };
        assert_eq!(err.to_string(), "HTTP 400: Invalid machine type: n9");

        let bare = HpcError::Http {
            status: 502,
            message: None,
        };
        assert_eq!(bare.to_string(), "HTTP 502");
        assert!(bare.is_remote());

        let empty = HpcError::Http {
            status: 400,
            message: Some(String::new()),
        };
        assert_eq!(empty.to_string(), "HTTP 400");
    }

    #[test]
    fn test_resource_error_display() {
        let err = HpcError::Resource {
            requested: 10,
            limit: 8,
        };
        assert_eq!(err.to_string(), "node scale 10 outside queue limits (1-8)");
        assert!(!err.is_remote());
    }
}
