//! Narrowing package lists by name and path globs.

use crate::error::{Error, Result};
use crate::package::Package;
use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::Deserialize;
use std::path::{Component, Path};
use std::sync::Arc;
use tracing::warn;

/// Include and exclude globs for package names and root-relative paths.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct FilterSpec {
    /// Names to keep. Empty keeps every name.
    pub include_names: Vec<String>,
    /// Names to drop.
    pub exclude_names: Vec<String>,
    /// Paths to keep, relative to the root with `/` separators.
    pub include_paths: Vec<String>,
    /// Paths to drop.
    pub exclude_paths: Vec<String>,
}

impl FilterSpec {
    /// Whether this filter keeps every package.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.include_names.is_empty()
            && self.exclude_names.is_empty()
            && self.include_paths.is_empty()
            && self.exclude_paths.is_empty()
    }
}

struct Matcher {
    include: Option<GlobSet>,
    exclude: Option<GlobSet>,
}

impl Matcher {
    fn new(include: &[String], exclude: &[String]) -> Result<Self> {
        Ok(Self {
            include: build_glob_set(include)?,
            exclude: build_glob_set(exclude)?,
        })
    }

    fn passes(&self, candidate: &str) -> bool {
        self.include.as_ref().is_none_or(|set| set.is_match(candidate))
            && !self.exclude.as_ref().is_some_and(|set| set.is_match(candidate))
    }
}

fn build_glob_set(patterns: &[String]) -> Result<Option<GlobSet>> {
    if patterns.is_empty() {
        return Ok(None);
    }
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern).map_err(|e| Error::invalid_pattern(pattern, e))?);
    }
    let set = builder
        .build()
        .map_err(|e| Error::invalid_pattern(&patterns.join(", "), e))?;
    Ok(Some(set))
}

/// Filters package lists with a [`FilterSpec`].
#[derive(Debug, Clone, Copy, Default)]
pub struct PackageFilter;

impl PackageFilter {
    /// Keep the packages that pass both the name and the path filter, in
    /// input order.
    ///
    /// An empty result is logged as a warning and returned as is.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPattern`] if any glob fails to compile.
    pub fn filter(
        root: &Package,
        packages: &[Arc<Package>],
        spec: &FilterSpec,
    ) -> Result<Vec<Arc<Package>>> {
        let names = Matcher::new(&spec.include_names, &spec.exclude_names)?;
        let paths = Matcher::new(&spec.include_paths, &spec.exclude_paths)?;

        let kept: Vec<Arc<Package>> = packages
            .iter()
            .filter(|package| {
                names.passes(package.name())
                    && paths.passes(&relative_path(root.dir(), package.dir()))
            })
            .cloned()
            .collect();

        if kept.is_empty() {
            warn!(
                include_names = ?spec.include_names,
                exclude_names = ?spec.exclude_names,
                include_paths = ?spec.include_paths,
                exclude_paths = ?spec.exclude_paths,
                "No packages matched the filter"
            );
        }

        Ok(kept)
    }
}

/// `dir` relative to `root`, joined with `/`.
fn relative_path(root: &Path, dir: &Path) -> String {
    let relative = dir.strip_prefix(root).unwrap_or(dir);
    relative
        .components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}
