//! Error types for overlay resolution.
//!
//! Only the fatal tier lives here. Everything else the engine encounters
//! (unresolved targets, ambiguous actions, unknown placeholder variables)
//! is a warning `String` carried in stage return values and reported after
//! the run completes.

use std::path::PathBuf;
use thiserror::Error;

/// Fatal errors that abort a resolution run before output is produced.
#[derive(Debug, Error)]
pub enum EngineError {
    // IO errors (exit code 3)
    #[error("spec path not found: {path}")]
    SpecPathNotFound { path: PathBuf },

    #[error("overlay path not found: {path}")]
    OverlayPathNotFound { path: PathBuf },

    #[error("env file not found: {path}")]
    EnvFileNotFound { path: PathBuf },

    #[error("cannot read {path}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot write {path}: {source}")]
    WriteError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Parse/serialize errors (exit code 2)
    #[error("invalid YAML in {path}: {message}")]
    InvalidYaml { path: PathBuf, message: String },

    #[error("invalid YAML: {message}")]
    InvalidYamlStr { message: String },

    #[error("cannot serialize document: {message}")]
    SerializeError { message: String },
}

impl EngineError {
    /// Returns the process exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            EngineError::SpecPathNotFound { .. }
            | EngineError::OverlayPathNotFound { .. }
            | EngineError::EnvFileNotFound { .. }
            | EngineError::ReadError { .. }
            | EngineError::WriteError { .. } => 3,
            EngineError::InvalidYaml { .. }
            | EngineError::InvalidYamlStr { .. }
            | EngineError::SerializeError { .. } => 2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_errors_exit_code() {
        let err = EngineError::SpecPathNotFound {
            path: PathBuf::from("specs"),
        };
        assert_eq!(err.exit_code(), 3);

        let err = EngineError::OverlayPathNotFound {
            path: PathBuf::from("overlays"),
        };
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn parse_errors_exit_code() {
        let err = EngineError::InvalidYaml {
            path: PathBuf::from("api.yaml"),
            message: "mapping values are not allowed here".into(),
        };
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn display_includes_path() {
        let err = EngineError::SpecPathNotFound {
            path: PathBuf::from("missing/specs"),
        };
        assert!(err.to_string().contains("missing/specs"));
    }
}
