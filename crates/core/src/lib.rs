//! Scheduling and dependency linking for grove workspaces.
//!
//! This crate builds on [`grove_workspaces`] for packages and dependency graphs
//! and on [`grove_task_graph`] for dependency-ordered execution.
//!
//! # Key Types
//!
//! - [`TaskScheduler`]: runs a task per package in serial, parallel, CI-sharded
//!   or dependency order
//! - [`DependencyLinker`]: links internal and external dependencies into a
//!   package's `node_modules`
//! - [`RunOptions`] and [`CiNodes`]: scheduler configuration
//!
//! # Example
//!
//! ```rust,ignore
//! use grove_core::{RunOptions, TaskScheduler};
//! use grove_workspaces::Project;
//!
//! let project = Project::load(std::path::Path::new("."))?;
//! let packages = project.packages()?;
//! TaskScheduler::new(project.root().clone())
//!     .run(&packages, |package| async move { build(package).await }, &RunOptions::default())
//!     .await?;
//! ```

pub mod ci;
pub mod config;
pub mod error;
pub mod linker;
pub mod scheduler;
pub mod tracing;

pub use ci::{CiNodes, chunk, natural_cmp};
pub use config::{OrderMode, RunOptions};
pub use error::{BoxError, Error, Result};
pub use linker::{
    CommandInstaller, DependencyLinker, HostFs, InstallPlan, InstallRequest, Installer,
    LifecycleHook, LifecycleRunner, LinkFs, LinkKind, PlannedLink, ScriptRunner,
};
pub use scheduler::TaskScheduler;
