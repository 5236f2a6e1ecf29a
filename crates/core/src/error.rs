//! Error types for scheduling and linking.

use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

/// Boxed error returned by caller-supplied tasks and collaborators.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type for grove-core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the scheduler and the dependency linker.
#[derive(Error, Debug, Diagnostic)]
pub enum Error {
    /// Linking was attempted against a graph with unresolved internal edges.
    #[error("Cannot link dependencies of '{package}': the workspace dependency graph is invalid ({count} unresolved edge(s))")]
    #[diagnostic(
        code(grove::core::graph_invalid),
        help("Fix the version ranges or release channels reported above so every workspace dependency resolves to a sibling package")
    )]
    GraphInvalid {
        /// The package being linked.
        package: String,
        /// Number of rejected candidates in the graph.
        count: usize,
    },

    /// An entry of the project shim directory is not a symlink.
    #[error("Expected '{path}' to be a symlink")]
    #[diagnostic(
        code(grove::core::shim_not_link),
        help("Remove the file and reinstall the project's dependencies")
    )]
    ShimNotLink {
        /// The offending entry.
        path: PathBuf,
    },

    /// A per-package task failed.
    #[error("Task failed for package '{package}': {source}")]
    #[diagnostic(code(grove::core::task_failed))]
    TaskFailed {
        /// Name of the package whose task failed.
        package: String,
        /// The task's error.
        #[source]
        source: BoxError,
    },

    /// Creating a link failed.
    #[error("Failed to link {} -> {}: {source}", dest.display(), src.display())]
    #[diagnostic(
        code(grove::core::link_failed),
        help("Check that the destination directory is writable")
    )]
    Link {
        /// Link target.
        src: PathBuf,
        /// Link location.
        dest: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The external installer failed.
    #[error("Failed to install dependencies of '{package}': {source}")]
    #[diagnostic(code(grove::core::install_failed))]
    Install {
        /// The package being installed.
        package: String,
        /// The installer's error.
        #[source]
        source: BoxError,
    },

    /// A lifecycle hook failed.
    #[error("Lifecycle hook '{hook}' failed for '{package}': {source}")]
    #[diagnostic(code(grove::core::lifecycle_failed))]
    Lifecycle {
        /// The package running the hook.
        package: String,
        /// Hook name.
        hook: String,
        /// The hook's error.
        #[source]
        source: BoxError,
    },

    /// Error from workspace loading or filtering.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Workspaces(#[from] grove_workspaces::Error),

    /// Error from the task graph.
    #[error(transparent)]
    #[diagnostic(transparent)]
    TaskGraph(#[from] grove_task_graph::Error),

    /// I/O error occurred.
    #[error("I/O error during {operation}{}: {source}", path.as_ref().map(|p| format!(" at {}", p.display())).unwrap_or_default())]
    #[diagnostic(code(grove::core::io_error))]
    Io {
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
        /// Optional path where the error occurred.
        path: Option<PathBuf>,
        /// Description of the operation being performed.
        operation: String,
    },
}

impl Error {
    /// Whether this error is a configuration problem rather than a task or
    /// I/O failure.
    #[must_use]
    pub const fn is_configuration(&self) -> bool {
        matches!(self, Self::GraphInvalid { .. } | Self::ShimNotLink { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_graph_invalid_is_configuration() {
        let error = Error::GraphInvalid {
            package: "web".to_string(),
            count: 2,
        };
        assert!(error.is_configuration());
        assert!(error.to_string().contains("2 unresolved edge(s)"));
        assert_eq!(
            error.code().map(|c| c.to_string()),
            Some("grove::core::graph_invalid".to_string())
        );
    }

    #[test]
    fn test_task_failed_keeps_source() {
        let error = Error::TaskFailed {
            package: "web".to_string(),
            source: "exit code 1".into(),
        };
        assert!(!error.is_configuration());
        assert!(error.to_string().contains("exit code 1"));
        assert!(std::error::Error::source(&error).is_some());
    }

    #[test]
    fn test_workspace_errors_convert() {
        let inner = grove_workspaces::Error::InvalidPattern {
            pattern: "[".to_string(),
            message: "unclosed".to_string(),
        };
        let error: Error = inner.into();
        assert!(matches!(error, Error::Workspaces(_)));
    }
}
