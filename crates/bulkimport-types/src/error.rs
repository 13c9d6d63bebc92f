//! Error types for the import system

use std::io;
use thiserror::Error;

use crate::item::Version;

/// Result type for import operations
pub type ImportResult<T> = Result<T, ImportError>;

/// Invalid or missing source configuration, detected before enumeration starts
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    /// A mandatory parameter was not supplied
    #[error("Missing mandatory parameter: {0}")]
    MissingParameter(String),

    /// A parameter was supplied with an unusable value
    #[error("Invalid value for parameter '{name}': {message}")]
    InvalidParameter { name: String, message: String },

    /// The parameter set itself could not be decoded
    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    /// The target container reference is unusable
    #[error("Invalid target container: {0}")]
    InvalidTarget(String),
}

impl ConfigurationError {
    pub fn invalid(name: impl Into<String>, message: impl Into<String>) -> Self {
        ConfigurationError::InvalidParameter {
            name: name.into(),
            message: message.into(),
        }
    }
}

/// A single item could not be enumerated; the stream continues past it
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Failed to enumerate {reference}: {message}")]
pub struct EnumerationError {
    /// Reference to the offending entry (usually its path in the source)
    pub reference: String,
    pub message: String,
}

impl EnumerationError {
    pub fn new(reference: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            reference: reference.into(),
            message: message.into(),
        }
    }
}

/// Classified failure of a repository write or content delivery
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WriteError {
    /// Expected to succeed on retry (contention, interrupted I/O, timeouts)
    #[error("Transient write error: {0}")]
    Transient(String),

    /// Will not succeed on retry (malformed data, missing target, permissions)
    #[error("Permanent write error: {0}")]
    Permanent(String),
}

impl WriteError {
    pub fn transient(message: impl Into<String>) -> Self {
        WriteError::Transient(message.into())
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        WriteError::Permanent(message.into())
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, WriteError::Transient(_))
    }

    pub fn message(&self) -> &str {
        match self {
            WriteError::Transient(msg) | WriteError::Permanent(msg) => msg,
        }
    }

    /// Classify an I/O error. Interruptions and timeouts are transient,
    /// everything else is permanent.
    pub fn from_io(err: &io::Error, context: impl std::fmt::Display) -> Self {
        let message = format!("{}: {}", context, err);
        match err.kind() {
            io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => {
                WriteError::Transient(message)
            }
            _ => WriteError::Permanent(message),
        }
    }
}

/// Errors that can occur during an import
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ImportError {
    /// Source configuration rejected before enumeration
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    /// No source registered under the requested name
    #[error("Unknown import source: {0}")]
    UnknownSource(String),

    /// Enumeration of a single item failed
    #[error(transparent)]
    Enumeration(#[from] EnumerationError),

    /// An item arrived with a version lower than one already released
    #[error("Version {version} of '{identity}' arrived after version {latest}")]
    VersionOrder {
        identity: String,
        version: Version,
        latest: Version,
    },

    /// Writing an item failed
    #[error(transparent)]
    Write(#[from] WriteError),

    /// Transient write failures persisted past the retry budget
    #[error("Gave up after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: WriteError },

    /// The run was cancelled
    #[error("Import cancelled")]
    Cancelled,

    /// Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ImportError {
    /// Whether this error aborts a whole run rather than a single item
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ImportError::Configuration(_) | ImportError::UnknownSource(_) | ImportError::Cancelled
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_errors_are_classified() {
        let interrupted = io::Error::new(io::ErrorKind::Interrupted, "signal");
        let missing = io::Error::new(io::ErrorKind::NotFound, "gone");
        let timed_out = io::Error::new(io::ErrorKind::TimedOut, "slow disk");

        assert!(WriteError::from_io(&interrupted, "copy").is_transient());
        assert!(WriteError::from_io(&timed_out, "copy").is_transient());

        let permanent = WriteError::from_io(&missing, "/data/a.txt");
        assert!(!permanent.is_transient());
        assert_eq!(permanent.message(), "/data/a.txt: gone");
    }

    #[test]
    fn test_only_run_level_errors_are_fatal() {
        assert!(ImportError::UnknownSource("ftp".to_string()).is_fatal());
        assert!(ImportError::Cancelled.is_fatal());
        assert!(ImportError::from(ConfigurationError::MissingParameter(
            "source-directory".to_string()
        ))
        .is_fatal());

        assert!(!ImportError::from(EnumerationError::new("a", "b")).is_fatal());
        assert!(!ImportError::from(WriteError::permanent("nope")).is_fatal());
        assert!(!ImportError::VersionOrder {
            identity: "report.txt".to_string(),
            version: Version::new(1),
            latest: Version::new(2),
        }
        .is_fatal());
    }

    #[test]
    fn test_error_messages() {
        let err = ConfigurationError::invalid("version-scheme", "expected 'infix' or 'suffix'");
        assert_eq!(
            err.to_string(),
            "Invalid value for parameter 'version-scheme': expected 'infix' or 'suffix'"
        );

        let err = EnumerationError::new("/data/docs/b.txt", "permission denied");
        assert_eq!(
            err.to_string(),
            "Failed to enumerate /data/docs/b.txt: permission denied"
        );
    }
}
