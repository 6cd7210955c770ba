//! Error types for sequence ingestion

use std::fmt;
use std::io;
use thiserror::Error;

/// Main error type for ingestion operations
#[derive(Error, Debug)]
pub enum ImportError {
    #[error("Transport error: {message}{}", StatusSuffix(.status))]
    Transport {
        status: Option<u16>,
        message: String,
    },

    #[error("Format violation: {0}")]
    FormatViolation(String),

    #[error("Storage error: {context}: {source}{}", CleanupSuffix(.cleanup))]
    Storage {
        context: String,
        #[source]
        source: io::Error,
        /// Failure of the best-effort cleanup that followed the primary error
        cleanup: Option<io::Error>,
    },

    #[error("Wait interrupted: {0}")]
    InterruptedWait(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Result type alias for ingestion operations
pub type ImportResult<T> = Result<T, ImportError>;

impl ImportError {
    pub fn transport(message: impl Into<String>) -> Self {
        ImportError::Transport {
            status: None,
            message: message.into(),
        }
    }

    pub fn storage(context: impl Into<String>, source: io::Error) -> Self {
        ImportError::Storage {
            context: context.into(),
            source,
            cleanup: None,
        }
    }

    /// Attach a secondary cleanup failure without replacing the primary error.
    ///
    /// Only storage errors carry a slot for the secondary. Every other variant
    /// is returned unchanged and the cleanup failure is logged.
    pub fn with_cleanup_failure(self, cleanup_err: io::Error) -> Self {
        match self {
            ImportError::Storage {
                context,
                source,
                cleanup: None,
            } => ImportError::Storage {
                context,
                source,
                cleanup: Some(cleanup_err),
            },
            other => {
                tracing::warn!(
                    "Cleanup after failure also failed: {} (primary error: {})",
                    cleanup_err,
                    other
                );
                other
            }
        }
    }

    /// Secondary cleanup error, if one was attached
    pub fn cleanup_failure(&self) -> Option<&io::Error> {
        match self {
            ImportError::Storage { cleanup, .. } => cleanup.as_ref(),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for ImportError {
    fn from(err: serde_json::Error) -> Self {
        ImportError::Serialization(err.to_string())
    }
}

impl From<reqwest::Error> for ImportError {
    fn from(err: reqwest::Error) -> Self {
        ImportError::Transport {
            status: err.status().map(|s| s.as_u16()),
            message: err.to_string(),
        }
    }
}

struct StatusSuffix<'a>(&'a Option<u16>);

impl fmt::Display for StatusSuffix<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(code) => write!(f, " (status {})", code),
            None => Ok(()),
        }
    }
}

struct CleanupSuffix<'a>(&'a Option<io::Error>);

impl fmt::Display for CleanupSuffix<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(err) => write!(f, " (cleanup also failed: {})", err),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let transport = ImportError::Transport {
            status: Some(503),
            message: "service unavailable".to_string(),
        };
        assert_eq!(
            format!("{}", transport),
            "Transport error: service unavailable (status 503)"
        );

        let no_status = ImportError::transport("connection refused");
        assert_eq!(format!("{}", no_status), "Transport error: connection refused");

        let format = ImportError::FormatViolation("multi-FASTA".to_string());
        assert_eq!(format!("{}", format), "Format violation: multi-FASTA");

        let wait = ImportError::InterruptedWait("drain".to_string());
        assert_eq!(format!("{}", wait), "Wait interrupted: drain");
    }

    #[test]
    fn test_cleanup_failure_is_secondary() {
        let primary = ImportError::storage(
            "writing staged file",
            io::Error::new(io::ErrorKind::Other, "disk full"),
        );
        let err = primary.with_cleanup_failure(io::Error::new(
            io::ErrorKind::PermissionDenied,
            "cannot delete",
        ));

        match &err {
            ImportError::Storage { source, cleanup, .. } => {
                assert_eq!(source.to_string(), "disk full");
                assert_eq!(
                    cleanup.as_ref().map(|e| e.kind()),
                    Some(io::ErrorKind::PermissionDenied)
                );
            }
            _ => panic!("Expected Storage variant"),
        }
        let text = err.to_string();
        assert!(text.contains("disk full"));
        assert!(text.contains("cleanup also failed: cannot delete"));
    }

    #[test]
    fn test_cleanup_failure_keeps_format_violation() {
        let err = ImportError::FormatViolation("second header".to_string())
            .with_cleanup_failure(io::Error::new(io::ErrorKind::Other, "busy"));
        assert!(matches!(err, ImportError::FormatViolation(_)));
        assert!(err.cleanup_failure().is_none());
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "missing");
        let err: ImportError = io_err.into();
        match err {
            ImportError::Io(e) => assert_eq!(e.kind(), io::ErrorKind::NotFound),
            _ => panic!("Expected Io variant"),
        }
    }
}
