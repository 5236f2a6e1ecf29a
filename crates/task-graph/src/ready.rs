//! Ready-set tracking for dependency-ordered execution.

use crate::{Error, Result};
use std::collections::{BTreeSet, HashMap, VecDeque};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NodeState {
    Pending,
    Running,
    Done,
}

/// Tracks which nodes may start given the nodes that have completed.
///
/// A node becomes ready once every node it depends on has completed. Nodes
/// are handed out in insertion order. When nothing is ready and nothing is
/// running, [`ReadyQueue::force_next`] starts the pending node with the
/// lowest insertion index so that cyclic graphs still make progress.
#[derive(Debug, Clone)]
pub struct ReadyQueue {
    names: Vec<String>,
    index_by_name: HashMap<String, usize>,
    dependents: Vec<Vec<usize>>,
    remaining: Vec<usize>,
    state: Vec<NodeState>,
    ready: BTreeSet<usize>,
    running: usize,
    forced: usize,
}

impl ReadyQueue {
    /// Create a queue over `names`, with `edges` given as
    /// `(dependency, dependent)` index pairs into `names`.
    ///
    /// Duplicate edges and out-of-range indices are ignored.
    pub fn new(names: Vec<String>, edges: impl IntoIterator<Item = (usize, usize)>) -> Self {
        let len = names.len();
        let mut dependents: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); len];
        for (from, to) in edges {
            if from < len && to < len {
                dependents[from].insert(to);
            }
        }

        let mut remaining = vec![0; len];
        for targets in &dependents {
            for &to in targets {
                remaining[to] += 1;
            }
        }

        let ready = (0..len).filter(|&idx| remaining[idx] == 0).collect();
        let index_by_name = names
            .iter()
            .enumerate()
            .map(|(idx, name)| (name.clone(), idx))
            .collect();

        Self {
            names,
            index_by_name,
            dependents: dependents
                .into_iter()
                .map(|targets| targets.into_iter().collect())
                .collect(),
            remaining,
            state: vec![NodeState::Pending; len],
            ready,
            running: 0,
            forced: 0,
        }
    }

    /// Take every node that is currently ready, marking them as running.
    pub fn take_ready(&mut self) -> Vec<String> {
        let ready = std::mem::take(&mut self.ready);
        let mut taken = Vec::with_capacity(ready.len());
        for idx in ready {
            self.state[idx] = NodeState::Running;
            self.running += 1;
            taken.push(self.names[idx].clone());
        }
        taken
    }

    /// Record that `name` has finished, releasing its dependents.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownTask`] if `name` is not in the queue.
    pub fn complete(&mut self, name: &str) -> Result<()> {
        let idx = *self
            .index_by_name
            .get(name)
            .ok_or_else(|| Error::UnknownTask {
                name: name.to_string(),
            })?;

        match self.state[idx] {
            NodeState::Done => return Ok(()),
            NodeState::Running => self.running -= 1,
            NodeState::Pending => {
                self.ready.remove(&idx);
            }
        }
        self.state[idx] = NodeState::Done;

        for position in 0..self.dependents[idx].len() {
            let dependent = self.dependents[idx][position];
            self.remaining[dependent] = self.remaining[dependent].saturating_sub(1);
            if self.remaining[dependent] == 0 && self.state[dependent] == NodeState::Pending {
                self.ready.insert(dependent);
            }
        }

        Ok(())
    }

    /// Start the pending node with the lowest insertion index, ignoring its
    /// unfinished dependencies.
    ///
    /// Returns `None` when a node is ready or running, or nothing is pending.
    pub fn force_next(&mut self) -> Option<String> {
        if !self.ready.is_empty() || self.running > 0 {
            return None;
        }

        let idx = self
            .state
            .iter()
            .position(|state| *state == NodeState::Pending)?;
        self.state[idx] = NodeState::Running;
        self.running += 1;
        self.forced += 1;
        Some(self.names[idx].clone())
    }

    /// Whether every node has completed.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.state.iter().all(|state| *state == NodeState::Done)
    }

    /// Number of nodes that have not started yet.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.state
            .iter()
            .filter(|state| **state == NodeState::Pending)
            .count()
    }

    /// Number of nodes currently running.
    #[must_use]
    pub const fn running_count(&self) -> usize {
        self.running
    }

    /// Number of nodes started through [`ReadyQueue::force_next`].
    #[must_use]
    pub const fn forced_count(&self) -> usize {
        self.forced
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn test_independent_nodes_are_ready_in_insertion_order() {
        let mut queue = ReadyQueue::new(names(&["c", "a", "b"]), []);
        assert_eq!(queue.take_ready(), names(&["c", "a", "b"]));
        assert!(queue.take_ready().is_empty());
        assert_eq!(queue.running_count(), 3);
    }

    #[test]
    fn test_dependent_waits_for_all_dependencies() {
        // a -> c, b -> c
        let mut queue = ReadyQueue::new(names(&["a", "b", "c"]), [(0, 2), (1, 2)]);
        assert_eq!(queue.take_ready(), names(&["a", "b"]));

        queue.complete("a").unwrap();
        assert!(queue.take_ready().is_empty());

        queue.complete("b").unwrap();
        assert_eq!(queue.take_ready(), names(&["c"]));

        queue.complete("c").unwrap();
        assert!(queue.is_finished());
        assert_eq!(queue.forced_count(), 0);
    }

    #[test]
    fn test_force_next_breaks_cycle_at_lowest_index() {
        // x <-> y, z depends on y
        let mut queue = ReadyQueue::new(names(&["z", "x", "y"]), [(1, 2), (2, 1), (2, 0)]);
        assert!(queue.take_ready().is_empty());

        assert_eq!(queue.force_next(), Some("z".to_string()));
        assert_eq!(queue.force_next(), None, "z is still running");
        queue.complete("z").unwrap();

        assert_eq!(queue.force_next(), Some("x".to_string()));
        queue.complete("x").unwrap();
        assert_eq!(queue.take_ready(), names(&["y"]));
        queue.complete("y").unwrap();

        assert!(queue.is_finished());
        assert_eq!(queue.forced_count(), 2);
    }

    #[test]
    fn test_complete_unknown_name_fails() {
        let mut queue = ReadyQueue::new(names(&["a"]), []);
        let err = queue.complete("ghost").unwrap_err();
        assert!(matches!(err, Error::UnknownTask { name } if name == "ghost"));
    }

    #[test]
    fn test_complete_is_idempotent() {
        let mut queue = ReadyQueue::new(names(&["a", "b"]), [(0, 1), (0, 1)]);
        queue.take_ready();
        queue.complete("a").unwrap();
        queue.complete("a").unwrap();
        assert_eq!(queue.take_ready(), names(&["b"]));
        assert_eq!(queue.pending_count(), 0);
    }
}
