//! Workspace packages, version ranges and dependency graphs for grove.
//!
//! # Key Types
//!
//! - [`Package`] and [`Project`]: manifests and workspace enumeration
//! - [`Range`] and [`ReleaseChannel`]: npm-style ranges and release tracks
//! - [`PackageGraph`]: validated dependency graph between workspace packages
//! - [`DependentsGraph`]: the inverse, who-depends-on-me view
//! - [`PackageFilter`]: name and path glob filtering
//!
//! # Example
//!
//! ```rust,ignore
//! use grove_workspaces::{PackageGraph, Project};
//! use std::path::Path;
//!
//! let project = Project::load(Path::new("."))?;
//! let packages = project.packages()?;
//! let result = PackageGraph::build(project.root(), &packages);
//! result.emit_diagnostics();
//! if !result.valid {
//!     // at least one internal dependency could not be resolved
//! }
//! ```

pub mod dependents;
pub mod error;
pub mod filter;
pub mod graph;
pub mod package;
pub mod project;
pub mod range;

pub use dependents::{DependentsGraph, DependentsNode};
pub use error::{Error, Result};
pub use filter::{FilterSpec, PackageFilter};
pub use graph::{
    DiagnosticKind, GraphDiagnostic, GraphNode, GraphResult, LinkMap, PackageGraph, PackagesByName,
};
pub use package::{DependencyKind, MANIFEST_FILE, Package, PackageBuilder, PackageId, ShimSpec};
pub use project::Project;
pub use range::{Range, RangeError, ReleaseChannel};
