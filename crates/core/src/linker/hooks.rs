//! Collaborators the linker calls out to: the installer for external
//! dependencies and the runner for lifecycle scripts.

use crate::error::BoxError;
use async_trait::async_trait;
use grove_workspaces::{DependencyKind, Package};
use std::ffi::OsString;
use std::fmt;
use std::path::Path;
use tokio::process::Command;
use tracing::{debug, info};

/// An external dependency the linker could not satisfy from the project root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallRequest {
    /// Dependency name.
    pub name: String,
    /// Range declared by the package.
    pub range: String,
}

impl InstallRequest {
    /// `name@range`, the form package managers accept on the command line.
    #[must_use]
    pub fn spec(&self) -> String {
        format!("{}@{}", self.name, self.range)
    }
}

/// Lifecycle scripts the linker runs around linking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleHook {
    /// Before anything is installed or linked.
    Preinstall,
    /// After linking.
    Postinstall,
    /// After `postinstall`.
    Prepublish,
    /// Last.
    Prepare,
}

impl LifecycleHook {
    /// Hooks run after linking, in order.
    pub const AFTER_LINK: [Self; 3] = [Self::Postinstall, Self::Prepublish, Self::Prepare];

    /// Script name in the manifest.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Preinstall => "preinstall",
            Self::Postinstall => "postinstall",
            Self::Prepublish => "prepublish",
            Self::Prepare => "prepare",
        }
    }
}

impl fmt::Display for LifecycleHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Installs external dependencies into a package.
#[async_trait]
pub trait Installer: Send + Sync {
    /// Install `requests` into `package` as dependencies of `kind`.
    async fn install(
        &self,
        package: &Package,
        requests: &[InstallRequest],
        kind: DependencyKind,
    ) -> Result<(), BoxError>;
}

/// Runs a package's lifecycle script.
#[async_trait]
pub trait LifecycleRunner: Send + Sync {
    /// Run `hook` for `package`. Only called when the package declares it.
    async fn run(&self, package: &Package, hook: LifecycleHook) -> Result<(), BoxError>;
}

/// Runs lifecycle scripts through a shell in the package directory, with the
/// package's `node_modules/.bin` first on `PATH`.
#[derive(Debug, Clone)]
pub struct ScriptRunner {
    shell: String,
}

impl Default for ScriptRunner {
    fn default() -> Self {
        Self::new("sh")
    }
}

impl ScriptRunner {
    /// Runner using `shell -c <script>`.
    #[must_use]
    pub fn new(shell: impl Into<String>) -> Self {
        Self {
            shell: shell.into(),
        }
    }
}

#[async_trait]
impl LifecycleRunner for ScriptRunner {
    async fn run(&self, package: &Package, hook: LifecycleHook) -> Result<(), BoxError> {
        let Some(script) = package.scripts().get(hook.as_str()) else {
            return Ok(());
        };

        info!(package = %package.name(), hook = %hook, "Running lifecycle script");
        debug!(script = %script, shell = %self.shell, "Lifecycle command");

        let status = Command::new(&self.shell)
            .arg("-c")
            .arg(script)
            .current_dir(package.dir())
            .env("PATH", path_with_bin_dir(&package.bin_dir()))
            .env("npm_lifecycle_event", hook.as_str())
            .status()
            .await?;

        if status.success() {
            Ok(())
        } else {
            Err(format!("`{script}` exited with {status}").into())
        }
    }
}

/// Installs dependencies by running an external package manager in the
/// package directory with one `name@range` argument per request.
#[derive(Debug, Clone)]
pub struct CommandInstaller {
    program: String,
    args: Vec<String>,
    dev_flag: Option<String>,
}

impl CommandInstaller {
    /// Installer invoking `program args... specs...`.
    #[must_use]
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            dev_flag: None,
        }
    }

    /// Flag appended when installing anything other than regular dependencies.
    #[must_use]
    pub fn with_dev_flag(mut self, flag: impl Into<String>) -> Self {
        self.dev_flag = Some(flag.into());
        self
    }
}

#[async_trait]
impl Installer for CommandInstaller {
    async fn install(
        &self,
        package: &Package,
        requests: &[InstallRequest],
        kind: DependencyKind,
    ) -> Result<(), BoxError> {
        let specs: Vec<String> = requests.iter().map(InstallRequest::spec).collect();
        info!(
            package = %package.name(),
            count = specs.len(),
            kind = kind.manifest_field(),
            "Installing external dependencies"
        );

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        if kind != DependencyKind::Regular
            && let Some(flag) = &self.dev_flag
        {
            cmd.arg(flag);
        }
        let status = cmd.args(&specs).current_dir(package.dir()).status().await?;

        if status.success() {
            Ok(())
        } else {
            Err(format!("{} exited with {status}", self.program).into())
        }
    }
}

fn path_with_bin_dir(bin_dir: &Path) -> OsString {
    let mut paths = vec![bin_dir.to_path_buf()];
    if let Some(existing) = std::env::var_os("PATH") {
        paths.extend(std::env::split_paths(&existing));
    }
    std::env::join_paths(paths).unwrap_or_else(|_| bin_dir.as_os_str().to_os_string())
}
