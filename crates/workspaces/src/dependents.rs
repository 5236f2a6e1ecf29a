//! Inverse dependency view: who depends on each package.

use crate::graph::PackageGraph;
use crate::package::Package;
use std::collections::{BTreeMap, HashSet, VecDeque};
use std::sync::Arc;

/// A package and the names of the packages that depend on it.
#[derive(Debug, Clone)]
pub struct DependentsNode {
    /// The package.
    pub package: Arc<Package>,
    /// Names of packages with a resolved internal dependency on it.
    pub dependents: Vec<String>,
}

/// Dependents of every package, keyed by package name.
#[derive(Debug, Clone)]
pub struct DependentsGraph {
    /// Passed through from the underlying [`PackageGraph`] build.
    pub valid: bool,
    /// Package name to its dependents.
    pub graph: BTreeMap<String, DependentsNode>,
}

impl DependentsGraph {
    /// Build the dependency graph once and invert its resolved edges.
    #[must_use]
    pub fn invert(root: &Arc<Package>, packages: &[Arc<Package>]) -> Self {
        let result = PackageGraph::build(root, packages);

        // Same-named packages share one entry, held by the first enumerated.
        let mut graph: BTreeMap<String, DependentsNode> = result
            .packages_by_name
            .iter()
            .filter_map(|(name, packages)| {
                let package = packages.first()?;
                Some((
                    name.clone(),
                    DependentsNode {
                        package: Arc::clone(package),
                        dependents: Vec::new(),
                    },
                ))
            })
            .collect();

        for package in result.packages_by_name.values().flatten() {
            let name = package.name();
            for dependency in result.dependencies_of(&package.id()) {
                if let Some(entry) = graph.get_mut(dependency)
                    && !entry.dependents.iter().any(|d| d == name)
                {
                    entry.dependents.push(name.to_string());
                }
            }
        }

        Self {
            valid: result.valid,
            graph,
        }
    }

    /// Direct dependents of `name`.
    #[must_use]
    pub fn dependents_of(&self, name: &str) -> &[String] {
        self.graph
            .get(name)
            .map(|node| node.dependents.as_slice())
            .unwrap_or_default()
    }

    /// Every package that depends on `name`, directly or transitively, in
    /// breadth-first order. `name` itself is not included.
    #[must_use]
    pub fn transitive_dependents(&self, name: &str) -> Vec<String> {
        let mut seen: HashSet<&str> = HashSet::from([name]);
        let mut queue: VecDeque<&str> = VecDeque::from([name]);
        let mut result = Vec::new();

        while let Some(current) = queue.pop_front() {
            for dependent in self.dependents_of(current) {
                if seen.insert(dependent.as_str()) {
                    result.push(dependent.clone());
                    queue.push_back(dependent.as_str());
                }
            }
        }

        result
    }
}
