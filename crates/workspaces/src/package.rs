//! Workspace packages and their manifests.

use crate::error::{Error, Result};
use crate::range::ReleaseChannel;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// File name of a package manifest.
pub const MANIFEST_FILE: &str = "package.json";

/// Unique identity of a package: `name@version`, plus `#channel` when the
/// package carries a release-channel marker.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PackageId(String);

impl PackageId {
    /// Identity for the given parts.
    #[must_use]
    pub fn new(name: &str, version: &str, channel: Option<&ReleaseChannel>) -> Self {
        match channel {
            Some(channel) => Self(format!("{name}@{version}#{channel}")),
            None => Self(format!("{name}@{version}")),
        }
    }

    /// The identity as a string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PackageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Executable shims declared by a package (`bin` in the manifest).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum ShimSpec {
    /// One executable, named after the package.
    Single(PathBuf),
    /// Executables keyed by shim name.
    Named(BTreeMap<String, PathBuf>),
}

/// The kind of a dependency declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DependencyKind {
    /// `dependencies`
    Regular,
    /// `devDependencies`
    Dev,
    /// `optionalDependencies`
    Optional,
    /// `peerDependencies`
    Peer,
}

impl DependencyKind {
    /// Manifest field holding this kind of dependency.
    #[must_use]
    pub const fn manifest_field(self) -> &'static str {
        match self {
            Self::Regular => "dependencies",
            Self::Dev => "devDependencies",
            Self::Optional => "optionalDependencies",
            Self::Peer => "peerDependencies",
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Manifest {
    name: Option<String>,
    version: Option<String>,
    #[serde(default)]
    dependencies: BTreeMap<String, String>,
    #[serde(default)]
    dev_dependencies: BTreeMap<String, String>,
    #[serde(default)]
    optional_dependencies: BTreeMap<String, String>,
    #[serde(default)]
    peer_dependencies: BTreeMap<String, String>,
    bin: Option<ShimSpec>,
    #[serde(default)]
    scripts: BTreeMap<String, String>,
    workspaces: Option<WorkspacesField>,
    grove: Option<GroveSection>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WorkspacesField {
    List(Vec<String>),
    Object {
        #[serde(default)]
        packages: Vec<String>,
    },
}

#[derive(Debug, Default, Deserialize)]
struct GroveSection {
    channel: Option<String>,
}

/// A workspace member or the project root.
///
/// Packages are immutable once built and are shared as `Arc<Package>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Package {
    name: String,
    version: String,
    channel: Option<ReleaseChannel>,
    dir: PathBuf,
    manifest_path: PathBuf,
    dependencies: BTreeMap<String, String>,
    dev_dependencies: BTreeMap<String, String>,
    optional_dependencies: BTreeMap<String, String>,
    peer_dependencies: BTreeMap<String, String>,
    bin: Option<ShimSpec>,
    scripts: BTreeMap<String, String>,
    workspaces: Vec<String>,
}

impl Package {
    /// Start building a package in memory.
    #[must_use]
    pub fn builder(
        name: impl Into<String>,
        version: impl Into<String>,
        dir: impl Into<PathBuf>,
    ) -> PackageBuilder {
        let dir = dir.into();
        PackageBuilder {
            package: Self {
                name: name.into(),
                version: version.into(),
                channel: None,
                manifest_path: dir.join(MANIFEST_FILE),
                dir,
                dependencies: BTreeMap::new(),
                dev_dependencies: BTreeMap::new(),
                optional_dependencies: BTreeMap::new(),
                peer_dependencies: BTreeMap::new(),
                bin: None,
                scripts: BTreeMap::new(),
                workspaces: Vec::new(),
            },
        }
    }

    /// Read a package from its `package.json`.
    ///
    /// Unknown fields are ignored. A missing `version` reads as `0.0.0`.
    ///
    /// # Errors
    ///
    /// Returns an error if the manifest is missing, is not valid JSON, or has
    /// no `name`.
    pub fn from_manifest(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(Error::ManifestNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|source| Error::Io {
            source,
            path: Some(path.to_path_buf()),
            operation: "reading manifest".to_string(),
        })?;
        let manifest: Manifest = serde_json::from_str(&content).map_err(|source| Error::Json {
            source,
            path: Some(path.to_path_buf()),
        })?;

        let name = manifest.name.ok_or_else(|| Error::InvalidManifest {
            path: path.to_path_buf(),
            message: "missing 'name' field".to_string(),
        })?;
        let dir = path
            .parent()
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf);

        let workspaces = match manifest.workspaces {
            Some(WorkspacesField::List(patterns) | WorkspacesField::Object { packages: patterns }) => {
                patterns
            }
            None => Vec::new(),
        };

        Ok(Self {
            name,
            version: manifest.version.unwrap_or_else(|| "0.0.0".to_string()),
            channel: manifest
                .grove
                .and_then(|section| section.channel)
                .map(ReleaseChannel::new),
            dir,
            manifest_path: path.to_path_buf(),
            dependencies: manifest.dependencies,
            dev_dependencies: manifest.dev_dependencies,
            optional_dependencies: manifest.optional_dependencies,
            peer_dependencies: manifest.peer_dependencies,
            bin: manifest.bin,
            scripts: manifest.scripts,
            workspaces,
        })
    }

    /// Read the package whose manifest lives in `dir`.
    ///
    /// # Errors
    ///
    /// See [`Package::from_manifest`].
    pub fn from_dir(dir: &Path) -> Result<Self> {
        Self::from_manifest(&dir.join(MANIFEST_FILE))
    }

    /// Unique identity of this package.
    #[must_use]
    pub fn id(&self) -> PackageId {
        PackageId::new(&self.name, &self.version, self.channel.as_ref())
    }

    /// Package name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Version as written in the manifest.
    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Parsed version, if it is valid semver.
    #[must_use]
    pub fn semver(&self) -> Option<semver::Version> {
        semver::Version::parse(self.version.trim_start_matches('v')).ok()
    }

    /// Release-channel marker.
    #[must_use]
    pub fn channel(&self) -> Option<&ReleaseChannel> {
        self.channel.as_ref()
    }

    /// Directory holding the manifest.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the manifest file.
    #[must_use]
    pub fn manifest_path(&self) -> &Path {
        &self.manifest_path
    }

    /// `<dir>/node_modules`
    #[must_use]
    pub fn node_modules(&self) -> PathBuf {
        self.dir.join("node_modules")
    }

    /// `<dir>/node_modules/.bin`
    #[must_use]
    pub fn bin_dir(&self) -> PathBuf {
        self.node_modules().join(".bin")
    }

    /// Dependencies of one kind.
    #[must_use]
    pub const fn dependencies(&self, kind: DependencyKind) -> &BTreeMap<String, String> {
        match kind {
            DependencyKind::Regular => &self.dependencies,
            DependencyKind::Dev => &self.dev_dependencies,
            DependencyKind::Optional => &self.optional_dependencies,
            DependencyKind::Peer => &self.peer_dependencies,
        }
    }

    /// All declared dependencies, merged peer, optional, dev, then regular.
    /// Later kinds override earlier ones for the same name.
    #[must_use]
    pub fn merged_dependencies(&self) -> BTreeMap<String, String> {
        let mut merged = BTreeMap::new();
        for kind in [
            DependencyKind::Peer,
            DependencyKind::Optional,
            DependencyKind::Dev,
            DependencyKind::Regular,
        ] {
            for (name, range) in self.dependencies(kind) {
                merged.insert(name.clone(), range.clone());
            }
        }
        merged
    }

    /// Declared range for `name`, from the merged dependency sets.
    #[must_use]
    pub fn dependency_range(&self, name: &str) -> Option<&str> {
        [
            DependencyKind::Regular,
            DependencyKind::Dev,
            DependencyKind::Optional,
            DependencyKind::Peer,
        ]
        .into_iter()
        .find_map(|kind| self.dependencies(kind).get(name))
        .map(String::as_str)
    }

    /// Declared executable shims.
    #[must_use]
    pub const fn bin(&self) -> Option<&ShimSpec> {
        self.bin.as_ref()
    }

    /// Declared scripts.
    #[must_use]
    pub const fn scripts(&self) -> &BTreeMap<String, String> {
        &self.scripts
    }

    /// Whether the package declares the named script.
    #[must_use]
    pub fn has_script(&self, name: &str) -> bool {
        self.scripts.contains_key(name)
    }

    /// Workspace glob patterns declared by this package.
    #[must_use]
    pub fn workspaces(&self) -> &[String] {
        &self.workspaces
    }
}

/// Builder for in-memory packages.
#[derive(Debug, Clone)]
pub struct PackageBuilder {
    package: Package,
}

impl PackageBuilder {
    /// Add a dependency of the given kind.
    #[must_use]
    pub fn dependency_of_kind(
        mut self,
        kind: DependencyKind,
        name: impl Into<String>,
        range: impl Into<String>,
    ) -> Self {
        let set = match kind {
            DependencyKind::Regular => &mut self.package.dependencies,
            DependencyKind::Dev => &mut self.package.dev_dependencies,
            DependencyKind::Optional => &mut self.package.optional_dependencies,
            DependencyKind::Peer => &mut self.package.peer_dependencies,
        };
        set.insert(name.into(), range.into());
        self
    }

    /// Add a regular dependency.
    #[must_use]
    pub fn dependency(self, name: impl Into<String>, range: impl Into<String>) -> Self {
        self.dependency_of_kind(DependencyKind::Regular, name, range)
    }

    /// Add a dev dependency.
    #[must_use]
    pub fn dev_dependency(self, name: impl Into<String>, range: impl Into<String>) -> Self {
        self.dependency_of_kind(DependencyKind::Dev, name, range)
    }

    /// Set the release-channel marker.
    #[must_use]
    pub fn channel(mut self, marker: impl Into<String>) -> Self {
        self.package.channel = Some(ReleaseChannel::new(marker));
        self
    }

    /// Set the executable shims.
    #[must_use]
    pub fn bin(mut self, bin: ShimSpec) -> Self {
        self.package.bin = Some(bin);
        self
    }

    /// Declare a script.
    #[must_use]
    pub fn script(mut self, name: impl Into<String>, command: impl Into<String>) -> Self {
        self.package.scripts.insert(name.into(), command.into());
        self
    }

    /// Set the workspace patterns.
    #[must_use]
    pub fn workspaces<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.package.workspaces = patterns.into_iter().map(Into::into).collect();
        self
    }

    /// Finish building.
    #[must_use]
    pub fn build(self) -> Package {
        self.package
    }
}
