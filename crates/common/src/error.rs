//! Common error types for hostinfo.

use thiserror::Error;

/// Common error type for hostinfo operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Source unavailable: {source_name} - {reason}")]
    SourceUnavailable { source_name: String, reason: String },

    #[error("Command execution failed: {cmd} - {reason}")]
    CommandExecution { cmd: String, reason: String },

    #[error("Command timed out: {cmd}")]
    CommandTimeout { cmd: String },

    #[error("Emission failed: {0}")]
    Emission(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Whether the error means the source is absent rather than broken.
    pub fn is_unavailable(&self) -> bool {
        match self {
            Error::SourceUnavailable { .. } => true,
            Error::Io(e) => e.kind() == std::io::ErrorKind::NotFound,
            _ => false,
        }
    }
}

/// Result type alias using common Error.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_io_is_unavailable() {
        let err = Error::from(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"));
        assert!(err.is_unavailable());

        let err = Error::from(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "nope",
        ));
        assert!(!err.is_unavailable());
    }

    #[test]
    fn test_display_names_command() {
        let err = Error::CommandExecution {
            cmd: "yum list installed".to_string(),
            reason: "exit status 1".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Command execution failed: yum list installed - exit status 1"
        );
    }
}
