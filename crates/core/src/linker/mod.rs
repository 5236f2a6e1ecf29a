//! Linking a package's dependencies into its `node_modules`.
//!
//! [`DependencyLinker::plan`] decides, without touching the filesystem beyond
//! reading the project's shim directory, which directories to create, which
//! links to make and which dependencies need a real install.
//! [`DependencyLinker::apply`] carries the plan out around the package's
//! lifecycle hooks.
//!
//! External dependencies are linked from the project root when the root's
//! range and the package's range intersect, and installed otherwise. Internal
//! dependencies always link to the sibling package selected by the
//! [`GraphResult`]. Executable shims are linked from the project's shim
//! directory first, then from the siblings' `bin` declarations.

pub mod fs;
pub mod hooks;

pub use fs::{HostFs, LinkFs, LinkKind};
pub use hooks::{
    CommandInstaller, InstallRequest, Installer, LifecycleHook, LifecycleRunner, ScriptRunner,
};

use crate::error::{Error, Result};
use futures::future::try_join_all;
use grove_workspaces::range::intersects;
use grove_workspaces::{DependencyKind, GraphResult, Package, Project, ShimSpec};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// A link the linker will create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedLink {
    /// Link target.
    pub src: PathBuf,
    /// Link location.
    pub dest: PathBuf,
    /// Directory or executable.
    pub kind: LinkKind,
}

/// Everything [`DependencyLinker::apply`] will do for one package.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallPlan {
    /// Directories to create.
    pub directories: Vec<PathBuf>,
    /// Links to create. No two share a destination.
    pub links: Vec<PlannedLink>,
    /// External dependencies the root cannot provide.
    pub installs: Vec<InstallRequest>,
}

impl InstallPlan {
    /// The link with destination `dest`.
    #[must_use]
    pub fn link_at(&self, dest: &Path) -> Option<&PlannedLink> {
        self.links.iter().find(|link| link.dest == dest)
    }

    fn push_link(&mut self, link: PlannedLink, index: &mut HashMap<PathBuf, usize>) -> bool {
        if index.contains_key(&link.dest) {
            return false;
        }
        index.insert(link.dest.clone(), self.links.len());
        self.links.push(link);
        true
    }

    fn replace_link(&mut self, link: PlannedLink, index: &mut HashMap<PathBuf, usize>) {
        if let Some(&existing) = index.get(&link.dest) {
            self.links[existing] = link;
        } else {
            self.push_link(link, index);
        }
    }
}

/// Links dependencies into workspace packages.
#[derive(Clone)]
pub struct DependencyLinker {
    fs: Arc<dyn LinkFs>,
    installer: Arc<dyn Installer>,
    lifecycle: Arc<dyn LifecycleRunner>,
}

impl std::fmt::Debug for DependencyLinker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DependencyLinker").finish_non_exhaustive()
    }
}

impl DependencyLinker {
    /// Linker over the given collaborators.
    #[must_use]
    pub fn new(
        fs: Arc<dyn LinkFs>,
        installer: Arc<dyn Installer>,
        lifecycle: Arc<dyn LifecycleRunner>,
    ) -> Self {
        Self {
            fs,
            installer,
            lifecycle,
        }
    }

    /// Linker on the host filesystem running lifecycle scripts with `sh`.
    #[must_use]
    pub fn on_host(installer: Arc<dyn Installer>) -> Self {
        Self::new(
            Arc::new(HostFs),
            installer,
            Arc::new(ScriptRunner::default()),
        )
    }

    /// Plan the links and installs for `dependency_names` of `package`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::GraphInvalid`] when `graph` is invalid, before any
    /// filesystem access, and [`Error::ShimNotLink`] when the project's shim
    /// directory holds something other than a link.
    #[instrument(skip_all, fields(package = %package.name()))]
    pub async fn plan(
        &self,
        project: &Project,
        package: &Package,
        dependency_names: &[String],
        all_packages: &[Arc<Package>],
        graph: &GraphResult,
    ) -> Result<InstallPlan> {
        if !graph.valid {
            return Err(Error::GraphInvalid {
                package: package.name().to_string(),
                count: graph.diagnostics.len(),
            });
        }

        let root = project.root();
        let id = package.id();
        let empty = BTreeMap::new();
        let internal = graph.links_of(&id).unwrap_or(&empty);

        let mut requested: Vec<&str> = Vec::new();
        for name in dependency_names {
            if !requested.contains(&name.as_str()) {
                requested.push(name);
            }
        }

        let modules = package.node_modules();
        let bin_dir = package.bin_dir();
        let mut plan = InstallPlan::default();
        let mut by_dest = HashMap::new();

        for &name in &requested {
            if internal.contains_key(name) {
                continue;
            }
            let Some(range) = package.dependency_range(name) else {
                warn!(dependency = %name, "Requested dependency is not declared, skipping");
                continue;
            };

            let from_root = root
                .dependency_range(name)
                .is_some_and(|root_range| intersects(root_range, range) == Some(true));

            if from_root {
                plan.push_link(
                    PlannedLink {
                        src: root.node_modules().join(name),
                        dest: modules.join(name),
                        kind: LinkKind::Directory,
                    },
                    &mut by_dest,
                );
            } else {
                debug!(dependency = %name, range = %range, "Root cannot provide dependency");
                plan.installs.push(InstallRequest {
                    name: name.to_string(),
                    range: range.to_string(),
                });
            }
        }

        for name in graph.dependencies_of(&id) {
            if let Some(sibling) = internal.get(name) {
                plan.push_link(
                    PlannedLink {
                        src: sibling.dir().to_path_buf(),
                        dest: modules.join(name),
                        kind: LinkKind::Directory,
                    },
                    &mut by_dest,
                );
            }
        }

        let workspace_names: HashSet<&str> = all_packages.iter().map(|p| p.name()).collect();
        let project_shims = self.project_shims(root).await?;
        for (shim, owner, target) in project_shims {
            let wanted = requested.contains(&owner.as_str())
                && !internal.contains_key(&owner)
                && !workspace_names.contains(owner.as_str());
            if wanted {
                plan.push_link(
                    PlannedLink {
                        src: target,
                        dest: bin_dir.join(&shim),
                        kind: LinkKind::Shim,
                    },
                    &mut by_dest,
                );
            }
        }

        for (name, sibling) in internal {
            if !requested.contains(&name.as_str()) {
                continue;
            }
            match sibling.bin() {
                Some(ShimSpec::Single(path)) => {
                    let shim = name.rsplit('/').next().unwrap_or(name);
                    plan.replace_link(
                        PlannedLink {
                            src: sibling.dir().join(path),
                            dest: bin_dir.join(shim),
                            kind: LinkKind::Shim,
                        },
                        &mut by_dest,
                    );
                }
                Some(ShimSpec::Named(shims)) => {
                    for (shim, path) in shims {
                        plan.push_link(
                            PlannedLink {
                                src: sibling.dir().join(path),
                                dest: bin_dir.join(shim),
                                kind: LinkKind::Shim,
                            },
                            &mut by_dest,
                        );
                    }
                }
                None => {}
            }
        }

        plan.directories.push(modules.clone());
        plan.directories.push(bin_dir);
        for link in &plan.links {
            if link.kind == LinkKind::Directory
                && let Some(parent) = link.dest.parent()
                && parent != modules
                && !plan.directories.iter().any(|dir| dir == parent)
            {
                plan.directories.push(parent.to_path_buf());
            }
        }

        debug!(
            directories = plan.directories.len(),
            links = plan.links.len(),
            installs = plan.installs.len(),
            "Planned dependency links"
        );
        Ok(plan)
    }

    /// Entries of the project's shim directory as `(shim, owner, target)`.
    async fn project_shims(&self, root: &Package) -> Result<Vec<(String, String, PathBuf)>> {
        let bin_dir = root.bin_dir();
        let modules = root.node_modules();
        let entries = self.fs.read_dir(&bin_dir).await.map_err(|source| Error::Io {
            source,
            path: Some(bin_dir.clone()),
            operation: "read project shim directory".to_string(),
        })?;

        let mut shims = Vec::with_capacity(entries.len());
        for entry in entries {
            let path = bin_dir.join(&entry);
            let target = self
                .fs
                .read_link(&path)
                .await
                .map_err(|source| Error::Io {
                    source,
                    path: Some(path.clone()),
                    operation: "read shim link".to_string(),
                })?
                .ok_or_else(|| Error::ShimNotLink { path: path.clone() })?;

            let resolved = normalize(&bin_dir.join(target));
            match owner_of(&modules, &resolved) {
                Some(owner) => shims.push((entry, owner, resolved)),
                None => debug!(shim = %path.display(), "Shim target is outside node_modules"),
            }
        }
        Ok(shims)
    }

    /// Carry out `plan` for `package`.
    ///
    /// # Errors
    ///
    /// Returns the first hook, installer, directory or link failure. Later
    /// steps do not run after a failure.
    #[instrument(skip_all, fields(package = %package.name()))]
    pub async fn apply(&self, package: &Package, plan: &InstallPlan) -> Result<()> {
        self.run_hook(package, LifecycleHook::Preinstall).await?;

        if !plan.installs.is_empty() {
            self.installer
                .install(package, &plan.installs, DependencyKind::Regular)
                .await
                .map_err(|source| Error::Install {
                    package: package.name().to_string(),
                    source,
                })?;
        }

        try_join_all(plan.directories.iter().map(|dir| async move {
            self.fs
                .create_dir_all(dir)
                .await
                .map_err(|source| Error::Io {
                    source,
                    path: Some(dir.clone()),
                    operation: "create dependency directory".to_string(),
                })
        }))
        .await?;

        try_join_all(plan.links.iter().map(|link| async move {
            self.fs
                .symlink(&link.src, &link.dest, link.kind)
                .await
                .map_err(|source| Error::Link {
                    src: link.src.clone(),
                    dest: link.dest.clone(),
                    source,
                })
        }))
        .await?;

        for hook in LifecycleHook::AFTER_LINK {
            self.run_hook(package, hook).await?;
        }

        info!(links = plan.links.len(), installs = plan.installs.len(), "Linked dependencies");
        Ok(())
    }

    /// [`plan`](Self::plan) then [`apply`](Self::apply). Returns the plan.
    ///
    /// # Errors
    ///
    /// See [`plan`](Self::plan) and [`apply`](Self::apply).
    pub async fn resolve(
        &self,
        project: &Project,
        package: &Package,
        dependency_names: &[String],
        all_packages: &[Arc<Package>],
        graph: &GraphResult,
    ) -> Result<InstallPlan> {
        let plan = self
            .plan(project, package, dependency_names, all_packages, graph)
            .await?;
        self.apply(package, &plan).await?;
        Ok(plan)
    }

    async fn run_hook(&self, package: &Package, hook: LifecycleHook) -> Result<()> {
        if !package.has_script(hook.as_str()) {
            return Ok(());
        }
        self.lifecycle
            .run(package, hook)
            .await
            .map_err(|source| Error::Lifecycle {
                package: package.name().to_string(),
                hook: hook.to_string(),
                source,
            })
    }
}

/// Resolve `.` and `..` without touching the filesystem.
fn normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other),
        }
    }
    normalized
}

/// Name of the package under `modules` that owns `path`.
fn owner_of(modules: &Path, path: &Path) -> Option<String> {
    let mut parts = path
        .strip_prefix(modules)
        .ok()?
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => part.to_str(),
            _ => None,
        });
    let first = parts.next()?;
    if first.starts_with('@') {
        parts.next().map(|second| format!("{first}/{second}"))
    } else {
        Some(first.to_string())
    }
}
