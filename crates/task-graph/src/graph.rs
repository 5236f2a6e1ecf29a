//! Task graph builder using petgraph.
//!
//! This module builds directed graphs from per-package task definitions to
//! determine execution order. Edges point from a dependency to the task that
//! depends on it.

use crate::{Error, ParallelGroups, ReadyQueue, Result, TaskNodeData, TopologicalOrder};
use petgraph::algo::{is_cyclic_directed, tarjan_scc, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::IntoNodeReferences;
use std::collections::HashMap;
use tracing::debug;

/// A node in the task graph.
#[derive(Debug, Clone)]
pub struct GraphNode<T> {
    /// Name of the task.
    pub name: String,
    /// The task data.
    pub task: T,
}

/// Task graph for dependency resolution and execution ordering.
///
/// Node indices follow insertion order, which is also the order used to
/// break ties whenever several tasks become runnable at once.
pub struct TaskGraph<T: TaskNodeData> {
    /// The directed graph of tasks.
    graph: DiGraph<GraphNode<T>, ()>,
    /// Map from task names to node indices.
    name_to_node: HashMap<String, NodeIndex>,
}

impl<T: TaskNodeData> Default for TaskGraph<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: TaskNodeData> TaskGraph<T> {
    /// Create a new empty task graph.
    #[must_use]
    pub fn new() -> Self {
        Self {
            graph: DiGraph::new(),
            name_to_node: HashMap::new(),
        }
    }

    /// Add a single task to the graph.
    ///
    /// If a task with the same name already exists, returns the existing node index.
    ///
    /// # Errors
    ///
    /// Currently infallible, but returns `Result` for API consistency.
    pub fn add_task(&mut self, name: &str, task: T) -> Result<NodeIndex> {
        if let Some(&node) = self.name_to_node.get(name) {
            return Ok(node);
        }

        let node = GraphNode {
            name: name.to_string(),
            task,
        };

        let node_index = self.graph.add_node(node);
        self.name_to_node.insert(name.to_string(), node_index);
        debug!("Added task node '{}'", name);

        Ok(node_index)
    }

    /// Add dependency edges after all tasks have been added.
    ///
    /// # Errors
    ///
    /// Returns an error if any task depends on a non-existent task.
    pub fn add_dependency_edges(&mut self) -> Result<()> {
        let mut missing_deps = Vec::new();
        let mut edges_to_add = Vec::new();

        for (node_index, node) in self.graph.node_references() {
            for dep_name in node.task.dependency_names() {
                if let Some(&dep_node_index) = self.name_to_node.get(dep_name) {
                    edges_to_add.push((dep_node_index, node_index));
                } else {
                    missing_deps.push((node.name.clone(), dep_name.to_string()));
                }
            }
        }

        if !missing_deps.is_empty() {
            return Err(Error::MissingDependencies {
                missing: missing_deps,
            });
        }

        for (from, to) in edges_to_add {
            if self.graph.find_edge(from, to).is_none() {
                self.graph.add_edge(from, to, ());
            }
        }

        Ok(())
    }

    /// Check if the graph has cycles.
    #[must_use]
    pub fn has_cycles(&self) -> bool {
        is_cyclic_directed(&self.graph)
    }

    /// Names of the tasks taking part in each cycle.
    ///
    /// Every strongly connected component with more than one member, or with
    /// a self edge, is reported. Members are listed in insertion order and the
    /// cycles themselves are ordered by their first member.
    #[must_use]
    pub fn cycles(&self) -> Vec<Vec<String>> {
        let mut cycles: Vec<Vec<NodeIndex>> = tarjan_scc(&self.graph)
            .into_iter()
            .filter(|component| {
                component.len() > 1
                    || component
                        .first()
                        .is_some_and(|&idx| self.graph.find_edge(idx, idx).is_some())
            })
            .map(|mut component| {
                component.sort();
                component
            })
            .collect();
        cycles.sort_by_key(|component| component.first().copied());

        cycles
            .into_iter()
            .map(|component| {
                component
                    .into_iter()
                    .map(|idx| self.graph[idx].name.clone())
                    .collect()
            })
            .collect()
    }

    /// Get topologically sorted list of tasks.
    ///
    /// # Errors
    ///
    /// Returns an error if the graph contains cycles.
    pub fn topological_sort(&self) -> Result<TopologicalOrder<T>> {
        if self.has_cycles() {
            return Err(Error::CycleDetected {
                message: self.describe_cycles(),
            });
        }

        match toposort(&self.graph, None) {
            Ok(sorted_indices) => Ok(sorted_indices
                .into_iter()
                .map(|idx| self.graph[idx].clone())
                .collect()),
            Err(_) => Err(Error::TopologicalSortFailed {
                reason: "petgraph toposort failed".to_string(),
            }),
        }
    }

    /// Get all tasks that can run in parallel (no dependencies between them).
    ///
    /// Returns a vector of parallel groups, where each group contains tasks
    /// that can execute concurrently. Groups are ordered by dependency level.
    ///
    /// # Errors
    ///
    /// Returns an error if the graph contains cycles.
    pub fn get_parallel_groups(&self) -> Result<ParallelGroups<T>> {
        let sorted = self.topological_sort()?;

        if sorted.is_empty() {
            return Ok(vec![]);
        }

        let mut groups: Vec<Vec<GraphNode<T>>> = vec![];
        let mut processed: HashMap<String, usize> = HashMap::new();

        for task in sorted {
            let mut level = 0;
            for dep in task.task.dependency_names() {
                if let Some(&dep_level) = processed.get(dep) {
                    level = level.max(dep_level + 1);
                }
            }

            if level >= groups.len() {
                groups.resize(level + 1, vec![]);
            }
            groups[level].push(task.clone());
            processed.insert(task.name.clone(), level);
        }

        Ok(groups)
    }

    /// Build a [`ReadyQueue`] over the current nodes and edges.
    #[must_use]
    pub fn ready_queue(&self) -> ReadyQueue {
        let names = self
            .graph
            .node_references()
            .map(|(_, node)| node.name.clone())
            .collect();
        let edges = self
            .graph
            .edge_indices()
            .filter_map(|edge| self.graph.edge_endpoints(edge))
            .map(|(from, to)| (from.index(), to.index()));
        ReadyQueue::new(names, edges)
    }

    /// Get the number of tasks in the graph.
    #[must_use]
    pub fn task_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Check if a task exists in the graph.
    #[must_use]
    pub fn contains_task(&self, name: &str) -> bool {
        self.name_to_node.contains_key(name)
    }

    fn describe_cycles(&self) -> String {
        self.cycles()
            .iter()
            .map(|cycle| cycle.join(" -> "))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Debug, Default)]
    struct TestTask {
        depends_on: Vec<String>,
    }

    impl TestTask {
        fn new(deps: &[&str]) -> Self {
            Self {
                depends_on: deps.iter().map(|s| (*s).to_string()).collect(),
            }
        }
    }

    impl TaskNodeData for TestTask {
        fn dependency_names(&self) -> impl Iterator<Item = &str> {
            self.depends_on.iter().map(String::as_str)
        }
    }

    fn graph_of(tasks: &[(&str, &[&str])]) -> TaskGraph<TestTask> {
        let mut graph = TaskGraph::new();
        for (name, deps) in tasks {
            graph.add_task(name, TestTask::new(deps)).unwrap();
        }
        graph.add_dependency_edges().unwrap();
        graph
    }

    #[test]
    fn test_task_graph_new() {
        let graph: TaskGraph<TestTask> = TaskGraph::new();
        assert_eq!(graph.task_count(), 0);
        assert!(!graph.has_cycles());
    }

    #[test]
    fn test_add_single_task() {
        let mut graph = TaskGraph::new();

        let node = graph.add_task("utils", TestTask::new(&[])).unwrap();
        assert!(graph.contains_task("utils"));
        assert_eq!(graph.task_count(), 1);

        let node2 = graph.add_task("utils", TestTask::new(&[])).unwrap();
        assert_eq!(node, node2);
        assert_eq!(graph.task_count(), 1);
    }

    #[test]
    fn test_chain_sorts_dependencies_first() {
        let graph = graph_of(&[("c", &["b"]), ("b", &["a"]), ("a", &[])]);

        let sorted = graph.topological_sort().unwrap();
        let positions: HashMap<String, usize> = sorted
            .iter()
            .enumerate()
            .map(|(i, node)| (node.name.clone(), i))
            .collect();

        assert!(positions["a"] < positions["b"]);
        assert!(positions["b"] < positions["c"]);
    }

    #[test]
    fn test_cycle_detection() {
        let graph = graph_of(&[("a", &["c"]), ("b", &["a"]), ("c", &["b"]), ("d", &[])]);

        assert!(graph.has_cycles());
        assert_eq!(
            graph.cycles(),
            vec![vec!["a".to_string(), "b".to_string(), "c".to_string()]]
        );

        let err = graph.topological_sort().unwrap_err();
        assert!(matches!(err, Error::CycleDetected { .. }));
        assert!(err.to_string().contains("a -> b -> c"));
    }

    #[test]
    fn test_self_dependency_is_a_cycle() {
        let graph = graph_of(&[("a", &["a"])]);
        assert!(graph.has_cycles());
        assert_eq!(graph.cycles(), vec![vec!["a".to_string()]]);
    }

    #[test]
    fn test_parallel_groups() {
        let graph = graph_of(&[
            ("a", &[]),
            ("b", &[]),
            ("c", &["a", "b"]),
            ("d", &["c"]),
        ]);

        let groups = graph.get_parallel_groups().unwrap();
        assert_eq!(groups.len(), 3);
        assert_eq!(groups[0].len(), 2);
        assert_eq!(groups[1][0].name, "c");
        assert_eq!(groups[2][0].name, "d");
    }

    #[test]
    fn test_missing_dependency() {
        let mut graph = TaskGraph::new();
        graph.add_task("app", TestTask::new(&["ghost"])).unwrap();

        let err = graph.add_dependency_edges().unwrap_err();
        match err {
            Error::MissingDependencies { missing } => {
                assert_eq!(missing, vec![("app".to_string(), "ghost".to_string())]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_duplicate_dependencies_add_one_edge() {
        let graph = graph_of(&[("a", &[]), ("b", &["a", "a"])]);
        let mut queue = graph.ready_queue();

        assert_eq!(queue.take_ready(), vec!["a".to_string()]);
        queue.complete("a").unwrap();
        assert_eq!(queue.take_ready(), vec!["b".to_string()]);
    }

    #[test]
    fn test_empty_graph() {
        let graph: TaskGraph<TestTask> = TaskGraph::new();
        assert!(graph.topological_sort().unwrap().is_empty());
        assert!(graph.get_parallel_groups().unwrap().is_empty());
        assert!(graph.ready_queue().is_finished());
    }
}
