//! Planning and applying dependency links against an in-memory filesystem,
//! plus one run on the host filesystem.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use async_trait::async_trait;
use grove_core::{
    BoxError, DependencyLinker, Error, InstallRequest, Installer, LifecycleHook, LifecycleRunner,
    LinkFs, LinkKind,
};
use grove_workspaces::{DependencyKind, GraphResult, Package, PackageGraph, Project, ShimSpec};
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

type Events = Arc<Mutex<Vec<String>>>;

/// Filesystem holding pre-existing entries (`Some(target)` for links) and
/// recording every operation.
#[derive(Default)]
struct MemoryFs {
    entries: Mutex<BTreeMap<PathBuf, Option<PathBuf>>>,
    events: Events,
}

impl MemoryFs {
    fn with_events(events: &Events) -> Self {
        Self {
            entries: Mutex::default(),
            events: Arc::clone(events),
        }
    }

    fn add_link(&self, path: &str, target: &str) {
        self.entries
            .lock()
            .unwrap()
            .insert(PathBuf::from(path), Some(PathBuf::from(target)));
    }

    fn add_file(&self, path: &str) {
        self.entries.lock().unwrap().insert(PathBuf::from(path), None);
    }
}

#[async_trait]
impl LinkFs for MemoryFs {
    async fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        self.events
            .lock()
            .unwrap()
            .push(format!("dir:{}", path.display()));
        Ok(())
    }

    async fn symlink(&self, src: &Path, dest: &Path, kind: LinkKind) -> io::Result<()> {
        self.events.lock().unwrap().push(format!(
            "link:{kind:?}:{}->{}",
            dest.display(),
            src.display()
        ));
        Ok(())
    }

    async fn read_link(&self, path: &Path) -> io::Result<Option<PathBuf>> {
        self.events
            .lock()
            .unwrap()
            .push(format!("read_link:{}", path.display()));
        self.entries
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| io::Error::from(io::ErrorKind::NotFound))
    }

    async fn read_dir(&self, path: &Path) -> io::Result<Vec<String>> {
        self.events
            .lock()
            .unwrap()
            .push(format!("read_dir:{}", path.display()));
        Ok(self
            .entries
            .lock()
            .unwrap()
            .keys()
            .filter(|entry| entry.parent() == Some(path))
            .filter_map(|entry| entry.file_name())
            .map(|name| name.to_string_lossy().into_owned())
            .collect())
    }
}

struct Recorder {
    events: Events,
}

#[async_trait]
impl Installer for Recorder {
    async fn install(
        &self,
        package: &Package,
        requests: &[InstallRequest],
        kind: DependencyKind,
    ) -> Result<(), BoxError> {
        let specs: Vec<String> = requests.iter().map(InstallRequest::spec).collect();
        self.events.lock().unwrap().push(format!(
            "install:{}:{}:{}",
            package.name(),
            kind.manifest_field(),
            specs.join(",")
        ));
        Ok(())
    }
}

#[async_trait]
impl LifecycleRunner for Recorder {
    async fn run(&self, package: &Package, hook: LifecycleHook) -> Result<(), BoxError> {
        self.events
            .lock()
            .unwrap()
            .push(format!("hook:{}:{hook}", package.name()));
        Ok(())
    }
}

struct Workspace {
    project: Project,
    packages: Vec<Arc<Package>>,
    app: Arc<Package>,
}

impl Workspace {
    fn graph(&self) -> GraphResult {
        PackageGraph::build(self.project.root(), &self.packages)
    }
}

/// Root, two internal libraries with shims and an app depending on both.
fn workspace(foo_range: &str) -> Workspace {
    let root = Arc::new(
        Package::builder("monorepo", "0.0.0", "/ws")
            .dependency("bar", "^1.0.0")
            .dependency("eslint", "^8.0.0")
            .dependency("foo-legacy", "^1.0.0")
            .build(),
    );
    let foo = Arc::new(
        Package::builder("foo", "1.0.0", "/ws/packages/foo")
            .bin(ShimSpec::Single(PathBuf::from("bin/foo.js")))
            .build(),
    );
    let util = Arc::new(
        Package::builder("@acme/util", "1.0.0", "/ws/packages/util")
            .bin(ShimSpec::Named(BTreeMap::from([
                ("eslint".to_string(), PathBuf::from("fake-eslint.js")),
                ("util".to_string(), PathBuf::from("cli.js")),
            ])))
            .build(),
    );
    let app = Arc::new(
        Package::builder("app", "1.0.0", "/ws/packages/app")
            .dependency("foo", foo_range)
            .dependency("@acme/util", "^1.0.0")
            .dependency("bar", "^2.0.0")
            .dependency("eslint", "^8.1.0")
            .dependency("foo-legacy", "1.2.x")
            .script("preinstall", "echo pre")
            .script("postinstall", "echo post")
            .script("prepare", "echo prepare")
            .build(),
    );

    Workspace {
        project: Project::new(root),
        packages: vec![foo, util, Arc::clone(&app)],
        app,
    }
}

fn project_shims(fs: &MemoryFs) {
    fs.add_link("/ws/node_modules/.bin/eslint", "../eslint/bin/eslint.js");
    fs.add_link("/ws/node_modules/.bin/babel", "../@babel/cli/bin/babel.js");
    fs.add_link("/ws/node_modules/.bin/foo", "../foo-legacy/bin/foo");
}

fn requested() -> Vec<String> {
    ["foo", "@acme/util", "bar", "eslint", "foo-legacy", "not-declared"]
        .iter()
        .map(ToString::to_string)
        .collect()
}

fn linker(fs: MemoryFs, events: &Events) -> DependencyLinker {
    let recorder = Arc::new(Recorder {
        events: Arc::clone(events),
    });
    DependencyLinker::new(Arc::new(fs), recorder.clone(), recorder)
}

fn src_of(plan: &grove_core::InstallPlan, dest: &str) -> Option<PathBuf> {
    plan.link_at(Path::new(dest)).map(|link| link.src.clone())
}

#[tokio::test]
async fn plan_links_installs_and_shims() {
    let ws = workspace("^1.0.0");
    let events = Events::default();
    let fs = MemoryFs::with_events(&events);
    project_shims(&fs);
    let linker = linker(fs, &events);

    let graph = ws.graph();
    assert!(graph.valid);
    let plan = linker
        .plan(&ws.project, &ws.app, &requested(), &ws.packages, &graph)
        .await
        .unwrap();

    // bar: root ^1 and app ^2 do not intersect.
    assert_eq!(
        plan.installs,
        vec![InstallRequest {
            name: "bar".to_string(),
            range: "^2.0.0".to_string(),
        }]
    );

    // External dependencies the root can provide.
    assert_eq!(
        src_of(&plan, "/ws/packages/app/node_modules/eslint"),
        Some(PathBuf::from("/ws/node_modules/eslint"))
    );
    assert_eq!(
        src_of(&plan, "/ws/packages/app/node_modules/foo-legacy"),
        Some(PathBuf::from("/ws/node_modules/foo-legacy"))
    );

    // Internal dependencies link to the sibling directories.
    assert_eq!(
        src_of(&plan, "/ws/packages/app/node_modules/foo"),
        Some(PathBuf::from("/ws/packages/foo"))
    );
    assert_eq!(
        src_of(&plan, "/ws/packages/app/node_modules/@acme/util"),
        Some(PathBuf::from("/ws/packages/util"))
    );

    // Project shim kept, workspace `Single` shim overrides the project one,
    // `Named` shims skip names already queued.
    assert_eq!(
        src_of(&plan, "/ws/packages/app/node_modules/.bin/eslint"),
        Some(PathBuf::from("/ws/node_modules/eslint/bin/eslint.js"))
    );
    assert_eq!(
        src_of(&plan, "/ws/packages/app/node_modules/.bin/foo"),
        Some(PathBuf::from("/ws/packages/foo/bin/foo.js"))
    );
    assert_eq!(
        src_of(&plan, "/ws/packages/app/node_modules/.bin/util"),
        Some(PathBuf::from("/ws/packages/util/cli.js"))
    );
    assert!(plan.link_at(Path::new("/ws/packages/app/node_modules/.bin/babel")).is_none());
    assert_eq!(plan.links.len(), 7);

    let mut dests: Vec<&Path> = plan.links.iter().map(|l| l.dest.as_path()).collect();
    dests.sort();
    dests.dedup();
    assert_eq!(dests.len(), plan.links.len());

    assert_eq!(
        plan.directories,
        vec![
            PathBuf::from("/ws/packages/app/node_modules"),
            PathBuf::from("/ws/packages/app/node_modules/.bin"),
            PathBuf::from("/ws/packages/app/node_modules/@acme"),
        ]
    );
}

#[tokio::test]
async fn apply_runs_hooks_installer_and_links_in_order() {
    let ws = workspace("^1.0.0");
    let events = Events::default();
    let fs = MemoryFs::with_events(&events);
    project_shims(&fs);
    let linker = linker(fs, &events);

    let graph = ws.graph();
    let plan = linker
        .plan(&ws.project, &ws.app, &requested(), &ws.packages, &graph)
        .await
        .unwrap();
    events.lock().unwrap().clear();

    linker.apply(&ws.app, &plan).await.unwrap();

    let events = events.lock().unwrap().clone();
    let kind = |event: &String| event.split(':').next().unwrap_or_default().to_string();
    let kinds: Vec<String> = events.iter().map(kind).collect();

    assert_eq!(events[0], "hook:app:preinstall");
    assert_eq!(events[1], "install:app:dependencies:bar@^2.0.0");
    let first_link = kinds.iter().position(|k| k == "link").unwrap();
    let last_dir = kinds.iter().rposition(|k| k == "dir").unwrap();
    assert!(last_dir < first_link);
    assert_eq!(kinds.iter().filter(|k| *k == "dir").count(), 3);
    assert_eq!(kinds.iter().filter(|k| *k == "link").count(), 7);
    assert_eq!(
        &events[events.len() - 2..],
        ["hook:app:postinstall".to_string(), "hook:app:prepare".to_string()]
    );
}

#[tokio::test]
async fn invalid_graph_fails_before_touching_the_filesystem() {
    let ws = workspace("^2.0.0");
    let events = Events::default();
    let fs = MemoryFs::with_events(&events);
    project_shims(&fs);
    let linker = linker(fs, &events);

    let graph = ws.graph();
    assert!(!graph.valid);
    let err = linker
        .resolve(&ws.project, &ws.app, &requested(), &ws.packages, &graph)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::GraphInvalid { ref package, .. } if package == "app"));
    assert!(err.is_configuration());
    assert!(events.lock().unwrap().is_empty());
}

#[tokio::test]
async fn non_link_shim_is_fatal() {
    let ws = workspace("^1.0.0");
    let events = Events::default();
    let fs = MemoryFs::with_events(&events);
    fs.add_file("/ws/node_modules/.bin/stray");
    let linker = linker(fs, &events);

    let graph = ws.graph();
    let err = linker
        .resolve(&ws.project, &ws.app, &requested(), &ws.packages, &graph)
        .await
        .unwrap_err();

    assert!(
        matches!(err, Error::ShimNotLink { ref path } if path == Path::new("/ws/node_modules/.bin/stray"))
    );
    let events = events.lock().unwrap();
    assert!(events.iter().all(|e| e.starts_with("read_")));
}

#[tokio::test]
async fn no_installer_call_without_install_requests() {
    let ws = workspace("^1.0.0");
    let events = Events::default();
    let linker = linker(MemoryFs::with_events(&events), &events);
    let graph = ws.graph();

    linker
        .resolve(
            &ws.project,
            &ws.app,
            &["eslint".to_string()],
            &ws.packages,
            &graph,
        )
        .await
        .unwrap();

    let events = events.lock().unwrap();
    assert!(!events.iter().any(|e| e.starts_with("install:")));
}

#[cfg(unix)]
#[tokio::test]
async fn resolve_on_host_filesystem() {
    use grove_core::HostFs;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;

    let tmp = tempfile::TempDir::new().unwrap();
    let base = tmp.path();
    fs::create_dir_all(base.join("node_modules/eslint/bin")).unwrap();
    fs::write(base.join("node_modules/eslint/bin/eslint.js"), "").unwrap();
    fs::create_dir_all(base.join("node_modules/.bin")).unwrap();
    std::os::unix::fs::symlink(
        "../eslint/bin/eslint.js",
        base.join("node_modules/.bin/eslint"),
    )
    .unwrap();
    fs::create_dir_all(base.join("packages/lib")).unwrap();
    fs::write(base.join("packages/lib/cli.js"), "").unwrap();

    let root = Arc::new(
        Package::builder("monorepo", "0.0.0", base)
            .dependency("eslint", "^8.2.0")
            .build(),
    );
    let lib = Arc::new(
        Package::builder("lib", "1.0.0", base.join("packages/lib"))
            .bin(ShimSpec::Single(PathBuf::from("cli.js")))
            .build(),
    );
    let app = Arc::new(
        Package::builder("app", "1.0.0", base.join("packages/app"))
            .dependency("lib", "^1.0.0")
            .dependency("eslint", "^8.0.0")
            .build(),
    );
    let packages = vec![Arc::clone(&lib), Arc::clone(&app)];
    let project = Project::new(Arc::clone(&root));
    let graph = PackageGraph::build(&root, &packages);

    let events = Events::default();
    let recorder = Arc::new(Recorder {
        events: Arc::clone(&events),
    });
    let linker = DependencyLinker::new(Arc::new(HostFs), recorder.clone(), recorder);
    linker
        .resolve(
            &project,
            &app,
            &["lib".to_string(), "eslint".to_string()],
            &packages,
            &graph,
        )
        .await
        .unwrap();

    let modules = base.join("packages/app/node_modules");
    assert_eq!(
        fs::read_link(modules.join("eslint")).unwrap(),
        base.join("node_modules/eslint")
    );
    assert_eq!(fs::read_link(modules.join("lib")).unwrap(), base.join("packages/lib"));
    assert_eq!(
        fs::read_link(modules.join(".bin/eslint")).unwrap(),
        base.join("node_modules/eslint/bin/eslint.js")
    );
    assert_eq!(
        fs::read_link(modules.join(".bin/lib")).unwrap(),
        base.join("packages/lib/cli.js")
    );
    let mode = fs::metadata(base.join("packages/lib/cli.js"))
        .unwrap()
        .permissions()
        .mode();
    assert_eq!(mode & 0o111, 0o111);
    assert!(events.lock().unwrap().is_empty());
}
