//! Validation utilities for task graphs.

use crate::{Error, TaskGraph, TaskNodeData};

/// Result of graph validation.
#[derive(Debug, Clone)]
pub struct ValidationResult {
    /// Whether the graph is free of cycles.
    pub is_valid: bool,
    /// One error per cycle found.
    pub errors: Vec<Error>,
}

impl ValidationResult {
    /// Create a valid result.
    #[must_use]
    pub const fn valid() -> Self {
        Self {
            is_valid: true,
            errors: vec![],
        }
    }

    /// Create an invalid result with errors.
    #[must_use]
    pub const fn invalid(errors: Vec<Error>) -> Self {
        Self {
            is_valid: false,
            errors,
        }
    }
}

impl<T: TaskNodeData> TaskGraph<T> {
    /// Validate the graph structure.
    ///
    /// Missing dependencies are rejected by `add_dependency_edges()`, so this
    /// reports cycles only, one [`Error::CycleDetected`] per cycle.
    #[must_use]
    pub fn validate(&self) -> ValidationResult {
        let errors: Vec<Error> = self
            .cycles()
            .into_iter()
            .map(|cycle| Error::CycleDetected {
                message: cycle.join(" -> "),
            })
            .collect();

        if errors.is_empty() {
            ValidationResult::valid()
        } else {
            ValidationResult::invalid(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Debug, Default)]
    struct TestTask {
        depends_on: Vec<String>,
    }

    impl TaskNodeData for TestTask {
        fn dependency_names(&self) -> impl Iterator<Item = &str> {
            self.depends_on.iter().map(String::as_str)
        }
    }

    fn task(deps: &[&str]) -> TestTask {
        TestTask {
            depends_on: deps.iter().map(|s| (*s).to_string()).collect(),
        }
    }

    #[test]
    fn test_validate_empty_graph() {
        let graph: TaskGraph<TestTask> = TaskGraph::new();
        let result = graph.validate();
        assert!(result.is_valid);
        assert!(result.errors.is_empty());
    }

    #[test]
    fn test_validate_valid_graph() {
        let mut graph = TaskGraph::new();
        graph.add_task("a", task(&[])).unwrap();
        graph.add_task("b", task(&["a"])).unwrap();
        graph.add_dependency_edges().unwrap();

        assert!(graph.validate().is_valid);
    }

    #[test]
    fn test_validate_reports_each_cycle() {
        let mut graph = TaskGraph::new();
        graph.add_task("a", task(&["b"])).unwrap();
        graph.add_task("b", task(&["a"])).unwrap();
        graph.add_task("c", task(&["d"])).unwrap();
        graph.add_task("d", task(&["c"])).unwrap();
        graph.add_dependency_edges().unwrap();

        let result = graph.validate();
        assert!(!result.is_valid);
        assert_eq!(result.errors.len(), 2);
        assert!(result.errors[0].to_string().contains("a -> b"));
        assert!(result.errors[1].to_string().contains("c -> d"));
    }
}
