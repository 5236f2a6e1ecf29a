//! Task graph DAG algorithms and ready-set scheduling for grove.
//!
//! This crate provides a directed graph of per-package tasks built on
//! petgraph, along with the [`ReadyQueue`] used to drive dependency-ordered
//! execution.
//!
//! # Key Types
//!
//! - [`TaskGraph`]: The graph structure for building and querying task dependencies
//! - [`TaskNodeData`]: Trait that task types must implement to be stored in the graph
//! - [`GraphNode`]: A node in the graph containing the task name and data
//! - [`ReadyQueue`]: Tracks which tasks may start, and breaks cycles on demand
//!
//! # Example
//!
//! ```ignore
//! use grove_task_graph::{TaskGraph, TaskNodeData};
//!
//! struct PackageTask {
//!     depends_on: Vec<String>,
//! }
//!
//! impl TaskNodeData for PackageTask {
//!     fn dependency_names(&self) -> impl Iterator<Item = &str> {
//!         self.depends_on.iter().map(String::as_str)
//!     }
//! }
//!
//! let mut graph = TaskGraph::new();
//! graph.add_task("utils@1.0.0", PackageTask { depends_on: vec![] })?;
//! graph.add_task("app@1.0.0", PackageTask { depends_on: vec!["utils@1.0.0".into()] })?;
//! graph.add_dependency_edges()?;
//!
//! let mut queue = graph.ready_queue();
//! assert_eq!(queue.take_ready(), vec!["utils@1.0.0".to_string()]);
//! ```

mod error;
mod graph;
mod ready;
mod traversal;
mod validation;

pub use error::{Error, Result};
pub use graph::{GraphNode, TaskGraph};
pub use ready::ReadyQueue;
pub use traversal::{ParallelGroups, TopologicalOrder};
pub use validation::ValidationResult;

/// Trait for task data that can be stored in the task graph.
///
/// Implement this trait for your task type to enable it to be stored
/// in a [`TaskGraph`] and participate in dependency resolution.
pub trait TaskNodeData: Clone {
    /// Returns the names of tasks this task depends on.
    fn dependency_names(&self) -> impl Iterator<Item = &str>;
}
