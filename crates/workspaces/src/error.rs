//! Error types for workspace operations.

use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for workspace operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during workspace operations.
#[derive(Error, Debug, Diagnostic)]
pub enum Error {
    /// Manifest file not found.
    #[error("Manifest file not found at path: {path}")]
    #[diagnostic(
        code(grove::workspaces::manifest_not_found),
        help("Ensure the directory contains a 'package.json' manifest")
    )]
    ManifestNotFound {
        /// The path where the manifest was expected.
        path: PathBuf,
    },

    /// Manifest parsed but is missing required information.
    #[error("Invalid manifest at {path}: {message}")]
    #[diagnostic(
        code(grove::workspaces::invalid_manifest),
        help("Check the manifest for missing required fields such as 'name'")
    )]
    InvalidManifest {
        /// Path to the invalid manifest.
        path: PathBuf,
        /// Description of what is invalid.
        message: String,
    },

    /// A glob pattern could not be compiled.
    #[error("Invalid glob pattern '{pattern}': {message}")]
    #[diagnostic(
        code(grove::workspaces::invalid_pattern),
        help("Check the pattern syntax, e.g. 'packages/*' or '@scope/*'")
    )]
    InvalidPattern {
        /// The offending pattern.
        pattern: String,
        /// Description of the compile error.
        message: String,
    },

    /// I/O error occurred.
    #[error("I/O error during {operation}{}: {source}", path.as_ref().map(|p| format!(" at {}", p.display())).unwrap_or_default())]
    #[diagnostic(
        code(grove::workspaces::io_error),
        help("Check that the referenced paths exist and that you have permission to read them")
    )]
    Io {
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
        /// Optional path where the error occurred.
        path: Option<PathBuf>,
        /// Description of the operation being performed.
        operation: String,
    },

    /// JSON parsing error.
    #[error("JSON parsing error{}: {source}", path.as_ref().map(|p| format!(" in {}", p.display())).unwrap_or_default())]
    #[diagnostic(
        code(grove::workspaces::json_error),
        help("Ensure the manifest is valid JSON")
    )]
    Json {
        /// The underlying JSON error.
        #[source]
        source: serde_json::Error,
        /// Optional path to the file being parsed.
        path: Option<PathBuf>,
    },
}

impl Error {
    pub(crate) fn invalid_pattern(pattern: &str, err: impl std::fmt::Display) -> Self {
        Self::InvalidPattern {
            pattern: pattern.to_string(),
            message: err.to_string(),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(source: std::io::Error) -> Self {
        Self::Io {
            source,
            path: None,
            operation: "file operation".to_string(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(source: serde_json::Error) -> Self {
        Self::Json { source, path: None }
    }
}
