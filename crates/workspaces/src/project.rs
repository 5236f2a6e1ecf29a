//! The project root and workspace enumeration.

use crate::error::{Error, Result};
use crate::package::{MANIFEST_FILE, Package};
use std::collections::{HashSet, VecDeque};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// The root package of a monorepo.
#[derive(Debug, Clone)]
pub struct Project {
    root: Arc<Package>,
}

impl Project {
    /// Wrap an already loaded root package.
    #[must_use]
    pub const fn new(root: Arc<Package>) -> Self {
        Self { root }
    }

    /// Load the project whose root manifest lives in `dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if the root manifest cannot be read.
    pub fn load(dir: &Path) -> Result<Self> {
        Ok(Self::new(Arc::new(Package::from_dir(dir)?)))
    }

    /// The root package.
    #[must_use]
    pub const fn root(&self) -> &Arc<Package> {
        &self.root
    }

    /// Enumerate every workspace package reachable from the root.
    ///
    /// Workspace patterns are expanded breadth-first: the root's patterns
    /// first, then the patterns of each discovered package that declares
    /// nested workspaces. Patterns prefixed with `!` exclude matches of the
    /// same declaring package. Directories without a manifest and anything
    /// under `node_modules` are skipped. Each directory is returned once.
    ///
    /// # Errors
    ///
    /// Returns an error if a pattern is invalid or a matched manifest cannot
    /// be read.
    pub fn packages(&self) -> Result<Vec<Arc<Package>>> {
        let mut packages = Vec::new();
        let mut seen: HashSet<PathBuf> = HashSet::from([self.root.dir().to_path_buf()]);
        let mut queue: VecDeque<Arc<Package>> = VecDeque::from([Arc::clone(&self.root)]);

        while let Some(owner) = queue.pop_front() {
            for dir in expand_patterns(owner.dir(), owner.workspaces())? {
                if !seen.insert(dir.clone()) {
                    continue;
                }
                if !dir.join(MANIFEST_FILE).is_file() {
                    debug!(dir = %dir.display(), "Skipping workspace directory without manifest");
                    continue;
                }

                let package = Arc::new(Package::from_dir(&dir)?);
                debug!(package = %package.name(), dir = %dir.display(), "Discovered workspace package");
                if !package.workspaces().is_empty() {
                    queue.push_back(Arc::clone(&package));
                }
                packages.push(package);
            }
        }

        Ok(packages)
    }
}

/// Expand workspace patterns relative to `base` into matching directories.
fn expand_patterns(base: &Path, patterns: &[String]) -> Result<Vec<PathBuf>> {
    let mut exclusions = Vec::new();
    let mut inclusions = Vec::new();
    for pattern in patterns {
        if let Some(negated) = pattern.strip_prefix('!') {
            exclusions.push(
                glob::Pattern::new(negated.trim_start_matches("./"))
                    .map_err(|e| Error::invalid_pattern(pattern, e))?,
            );
        } else {
            inclusions.push(pattern.trim_start_matches("./"));
        }
    }

    let escaped_base = glob::Pattern::escape(&base.to_string_lossy());
    let mut dirs = Vec::new();
    for pattern in inclusions {
        let full = format!("{escaped_base}/{pattern}");
        let matches = glob::glob(&full).map_err(|e| Error::invalid_pattern(pattern, e))?;
        for path in matches.filter_map(std::result::Result::ok) {
            let Ok(rel) = path.strip_prefix(base) else {
                continue;
            };
            if !path.is_dir() || in_node_modules(rel) {
                continue;
            }
            let excluded = exclusions.iter().any(|p| p.matches_path(rel));
            if !excluded && !dirs.contains(&path) {
                dirs.push(path);
            }
        }
    }
    Ok(dirs)
}

fn in_node_modules(path: &Path) -> bool {
    path.components()
        .any(|c| matches!(c, Component::Normal(name) if name == "node_modules"))
}
