//! Error types for task graph operations.

use miette::Diagnostic;
use thiserror::Error;

/// Result type for task graph operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during task graph operations.
#[derive(Error, Debug, Clone, Diagnostic)]
pub enum Error {
    /// A dependency cycle was detected in the graph.
    #[error("Cycle detected in task graph: {message}")]
    #[diagnostic(
        code(grove::task_graph::cycle),
        help("Break the cycle between the listed packages, or schedule them without graph ordering")
    )]
    CycleDetected {
        /// Human-readable description of the cycle.
        message: String,
    },

    /// Tasks depend on other tasks that are not in the graph.
    #[error("Missing dependencies: {}", format_missing(.missing))]
    #[diagnostic(code(grove::task_graph::missing_dependencies))]
    MissingDependencies {
        /// List of (task, missing_dependency) pairs.
        missing: Vec<(String, String)>,
    },

    /// Failed to perform topological sort.
    #[error("Failed to sort tasks topologically: {reason}")]
    #[diagnostic(code(grove::task_graph::toposort_failed))]
    TopologicalSortFailed {
        /// Reason for the failure.
        reason: String,
    },

    /// A task name was reported that the graph does not contain.
    #[error("Unknown task '{name}'")]
    #[diagnostic(code(grove::task_graph::unknown_task))]
    UnknownTask {
        /// The unknown task name.
        name: String,
    },
}

fn format_missing(missing: &[(String, String)]) -> String {
    missing
        .iter()
        .map(|(task, dep)| format!("Task '{task}' depends on missing task '{dep}'"))
        .collect::<Vec<_>>()
        .join(", ")
}
