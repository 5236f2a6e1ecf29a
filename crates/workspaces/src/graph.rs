//! Dependency graph between workspace packages.
//!
//! An edge from a package to a same-named sibling is resolved only when the
//! sibling satisfies the declared range and its release channel is not
//! disjoint from the dependent's. Rejected edges do not abort the build:
//! they mark the result invalid and leave one [`GraphDiagnostic`] per
//! rejected candidate.

use crate::package::{Package, PackageId};
use crate::range::{Range, channels_disjoint};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// A package and the names of its internally resolved dependencies.
#[derive(Debug, Clone)]
pub struct GraphNode {
    /// The package.
    pub package: Arc<Package>,
    /// Names of dependencies resolved to a sibling workspace package.
    pub dependencies: Vec<String>,
}

/// Parent identity to (dependency name to selected sibling).
pub type LinkMap = HashMap<PackageId, BTreeMap<String, Arc<Package>>>;

/// Package name to every package carrying it, in enumeration order.
pub type PackagesByName = BTreeMap<String, Vec<Arc<Package>>>;

/// Why a candidate was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiagnosticKind {
    /// The candidate's version does not satisfy the declared range.
    SemverMismatch {
        /// Range declared by the dependent.
        range: String,
        /// Version of the candidate.
        version: String,
    },
    /// The candidate's release channel is disjoint from the dependent's.
    ChannelDisjoint {
        /// Channel of the dependent.
        expected: String,
        /// Channel of the candidate.
        actual: String,
    },
}

/// One rejected candidate for a dependency edge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphDiagnostic {
    /// The dependent package.
    pub package: PackageId,
    /// Name of the dependency.
    pub dependency: String,
    /// The rejected sibling.
    pub candidate: PackageId,
    /// Why it was rejected.
    pub kind: DiagnosticKind,
}

impl fmt::Display for GraphDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            DiagnosticKind::SemverMismatch { range, version } => write!(
                f,
                "{} depends on {}@{range}, but the workspace package {} has version {version}",
                self.package, self.dependency, self.candidate
            ),
            DiagnosticKind::ChannelDisjoint { expected, actual } => write!(
                f,
                "{} is on release channel {expected}, but the workspace package {} for dependency {} is on channel {actual}",
                self.package, self.candidate, self.dependency
            ),
        }
    }
}

/// Output of [`PackageGraph::build`].
#[derive(Debug, Clone)]
pub struct GraphResult {
    /// One node per input package, keyed by identity.
    pub graph: HashMap<PackageId, GraphNode>,
    /// Selected sibling for every resolved edge.
    pub links: LinkMap,
    /// Every package grouped by name, root first.
    pub packages_by_name: PackagesByName,
    /// `false` when at least one internal edge could not be resolved.
    pub valid: bool,
    /// One entry per rejected candidate.
    pub diagnostics: Vec<GraphDiagnostic>,
}

impl GraphResult {
    /// Node for `id`.
    #[must_use]
    pub fn node(&self, id: &PackageId) -> Option<&GraphNode> {
        self.graph.get(id)
    }

    /// Names of the resolved internal dependencies of `id`.
    #[must_use]
    pub fn dependencies_of(&self, id: &PackageId) -> &[String] {
        self.graph
            .get(id)
            .map(|node| node.dependencies.as_slice())
            .unwrap_or_default()
    }

    /// Selected siblings of `id`, by dependency name.
    #[must_use]
    pub fn links_of(&self, id: &PackageId) -> Option<&BTreeMap<String, Arc<Package>>> {
        self.links.get(id)
    }

    /// Siblings selected for `id`'s internal dependencies, in dependency order.
    #[must_use]
    pub fn dependency_packages(&self, id: &PackageId) -> Vec<&Arc<Package>> {
        let Some(links) = self.links.get(id) else {
            return Vec::new();
        };
        self.dependencies_of(id)
            .iter()
            .filter_map(|name| links.get(name))
            .collect()
    }

    /// Identities of the siblings selected for `id`'s internal dependencies.
    #[must_use]
    pub fn dependency_ids(&self, id: &PackageId) -> Vec<PackageId> {
        self.dependency_packages(id)
            .into_iter()
            .map(|package| package.id())
            .collect()
    }

    /// Forward every diagnostic to `tracing` as a warning.
    pub fn emit_diagnostics(&self) {
        for diagnostic in &self.diagnostics {
            match &diagnostic.kind {
                DiagnosticKind::SemverMismatch { range, version } => warn!(
                    package = %diagnostic.package,
                    dependency = %diagnostic.dependency,
                    candidate = %diagnostic.candidate,
                    expected = %range,
                    actual = %version,
                    "{diagnostic}"
                ),
                DiagnosticKind::ChannelDisjoint { expected, actual } => warn!(
                    package = %diagnostic.package,
                    dependency = %diagnostic.dependency,
                    candidate = %diagnostic.candidate,
                    expected = %expected,
                    actual = %actual,
                    "{diagnostic}"
                ),
            }
        }
    }
}

/// Builder for [`GraphResult`].
#[derive(Debug, Clone, Copy, Default)]
pub struct PackageGraph;

impl PackageGraph {
    /// Build the dependency graph over `root` and `packages`.
    ///
    /// A package in `packages` sharing the root's directory is treated as the
    /// root itself.
    #[must_use]
    pub fn build(root: &Arc<Package>, packages: &[Arc<Package>]) -> GraphResult {
        let members: Vec<&Arc<Package>> = std::iter::once(root)
            .chain(packages.iter().filter(|p| p.dir() != root.dir()))
            .collect();

        let mut packages_by_name = PackagesByName::new();
        for package in &members {
            packages_by_name
                .entry(package.name().to_string())
                .or_default()
                .push(Arc::clone(package));
        }

        let mut graph = HashMap::with_capacity(members.len());
        let mut links = LinkMap::new();
        let mut diagnostics = Vec::new();

        for package in &members {
            let id = package.id();
            let mut dependencies = Vec::new();

            for (dep_name, range) in package.merged_dependencies() {
                let Some(candidates) = packages_by_name.get(&dep_name) else {
                    continue;
                };

                match select_candidate(package, &dep_name, &range, candidates) {
                    Ok(selected) => {
                        debug!(
                            package = %id,
                            dependency = %dep_name,
                            selected = %selected.id(),
                            "Resolved internal dependency"
                        );
                        links
                            .entry(id.clone())
                            .or_default()
                            .insert(dep_name.clone(), Arc::clone(selected));
                        dependencies.push(dep_name);
                    }
                    Err(rejected) => diagnostics.extend(rejected),
                }
            }

            graph.insert(
                id,
                GraphNode {
                    package: Arc::clone(package),
                    dependencies,
                },
            );
        }

        GraphResult {
            graph,
            links,
            packages_by_name,
            valid: diagnostics.is_empty(),
            diagnostics,
        }
    }
}

/// First candidate that satisfies `range` and shares a release track with
/// `package`, or one diagnostic per candidate.
fn select_candidate<'a>(
    package: &Package,
    dep_name: &str,
    range: &str,
    candidates: &'a [Arc<Package>],
) -> Result<&'a Arc<Package>, Vec<GraphDiagnostic>> {
    let parsed = Range::parse(range).ok();
    let mut rejected = Vec::new();

    for candidate in candidates {
        let satisfies = parsed.as_ref().is_some_and(|range| {
            candidate
                .semver()
                .is_some_and(|version| range.satisfies(&version))
        });
        if !satisfies {
            rejected.push(GraphDiagnostic {
                package: package.id(),
                dependency: dep_name.to_string(),
                candidate: candidate.id(),
                kind: DiagnosticKind::SemverMismatch {
                    range: range.to_string(),
                    version: candidate.version().to_string(),
                },
            });
            continue;
        }

        if channels_disjoint(package.channel(), candidate.channel()) {
            rejected.push(GraphDiagnostic {
                package: package.id(),
                dependency: dep_name.to_string(),
                candidate: candidate.id(),
                kind: DiagnosticKind::ChannelDisjoint {
                    expected: package.channel().map(ToString::to_string).unwrap_or_default(),
                    actual: candidate.channel().map(ToString::to_string).unwrap_or_default(),
                },
            });
            continue;
        }

        return Ok(candidate);
    }

    Err(rejected)
}
