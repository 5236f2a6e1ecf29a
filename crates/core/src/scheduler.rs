//! Running a per-package task across a workspace.
//!
//! [`TaskScheduler::run`] spawns one task per package onto a [`JoinSet`] and
//! decides when each starts according to the [`OrderMode`]. Every selected
//! task is started and awaited; failures are collected per package and the
//! first one in input order is raised at the end when `bail` is set.

use crate::ci::natural_cmp;
use crate::config::{OrderMode, RunOptions};
use crate::error::{BoxError, Error, Result};
use crate::tracing::package_span;
use grove_task_graph::{TaskGraph, TaskNodeData};
use grove_workspaces::{Package, PackageGraph};
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;
use tokio::task::{self, JoinError, JoinSet};
use tracing::{Instrument, debug, error, info, warn};

type Outcome = std::result::Result<(), BoxError>;

/// Tasks in flight, keyed back to their package's input index.
struct InFlight {
    set: JoinSet<Outcome>,
    indices: HashMap<task::Id, usize>,
}

impl InFlight {
    fn new() -> Self {
        Self {
            set: JoinSet::new(),
            indices: HashMap::new(),
        }
    }

    fn spawn<Fut, T, E>(&mut self, index: usize, package: &Package, future: Fut)
    where
        Fut: Future<Output = std::result::Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Into<BoxError> + Send + 'static,
    {
        let span = package_span(package.name());
        let handle = self.set.spawn(
            async move { future.await.map(|_| ()).map_err(Into::into) }.instrument(span),
        );
        self.indices.insert(handle.id(), index);
    }

    fn is_empty(&self) -> bool {
        self.set.is_empty()
    }

    /// Wait for the next task to settle. A panic counts as a failure.
    async fn next(&mut self) -> Option<(usize, Outcome)> {
        while let Some(joined) = self.set.join_next_with_id().await {
            let (id, outcome) = match joined {
                Ok((id, outcome)) => (id, outcome),
                Err(err) => (err.id(), Err(panicked(err))),
            };
            if let Some(index) = self.indices.remove(&id) {
                return Some((index, outcome));
            }
        }
        None
    }
}

fn panicked(err: JoinError) -> BoxError {
    if err.is_panic() {
        format!("task panicked: {err}").into()
    } else {
        Box::new(err)
    }
}

#[derive(Debug, Clone)]
struct PackageNode {
    dependencies: Vec<String>,
}

impl TaskNodeData for PackageNode {
    fn dependency_names(&self) -> impl Iterator<Item = &str> {
        self.dependencies.iter().map(String::as_str)
    }
}

/// Runs a task for each package of a workspace.
#[derive(Debug, Clone)]
pub struct TaskScheduler {
    root: Arc<Package>,
}

impl TaskScheduler {
    /// Scheduler for the workspace rooted at `root`.
    #[must_use]
    pub const fn new(root: Arc<Package>) -> Self {
        Self { root }
    }

    /// Run `task` for `packages` in the order given by `options`.
    ///
    /// In graph-parallel mode a package directory listed more than once runs
    /// its task once.
    ///
    /// # Errors
    ///
    /// With `bail` set, returns [`Error::TaskFailed`] for the first failed
    /// package in input order once every task has settled. Returns
    /// [`Error::TaskGraph`] if the graph-parallel task graph cannot be built.
    pub async fn run<F, Fut, T, E>(
        &self,
        packages: &[Arc<Package>],
        task: F,
        options: &RunOptions,
    ) -> Result<()>
    where
        F: Fn(Arc<Package>) -> Fut,
        Fut: Future<Output = std::result::Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Into<BoxError> + Send + 'static,
    {
        info!(
            order = %options.order,
            packages = packages.len(),
            bail = options.bail,
            "Running package tasks"
        );

        let outcomes = match options.order {
            OrderMode::Serial => run_serial(packages, &task).await,
            OrderMode::Parallel => run_parallel(packages, 0..packages.len(), &task).await,
            OrderMode::ParallelNodes => {
                let selected = shard(packages, options);
                run_parallel(packages, selected, &task).await
            }
            OrderMode::GraphParallel => self.run_graph(packages, &task).await?,
        };

        finish(packages, outcomes, options.bail)
    }

    async fn run_graph<F, Fut, T, E>(
        &self,
        packages: &[Arc<Package>],
        task: &F,
    ) -> Result<Vec<(usize, Outcome)>>
    where
        F: Fn(Arc<Package>) -> Fut,
        Fut: Future<Output = std::result::Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Into<BoxError> + Send + 'static,
    {
        let result = PackageGraph::build(&self.root, packages);
        result.emit_diagnostics();

        let keys: Vec<String> = packages.iter().map(|p| task_key(p)).collect();
        let scheduled: HashSet<&str> = keys.iter().map(String::as_str).collect();
        let mut index_by_key: HashMap<&str, usize> = HashMap::new();

        let mut graph = TaskGraph::new();
        for (index, package) in packages.iter().enumerate() {
            let key = keys[index].as_str();
            if index_by_key.contains_key(key) {
                warn!(
                    package = %package.name(),
                    dir = %key,
                    "Package listed twice, running its task once"
                );
                continue;
            }
            index_by_key.insert(key, index);

            let dependencies = result
                .dependency_packages(&package.id())
                .into_iter()
                .map(|sibling| task_key(sibling))
                .filter(|sibling| scheduled.contains(sibling.as_str()))
                .collect();
            graph.add_task(key, PackageNode { dependencies })?;
        }
        graph.add_dependency_edges()?;

        for cycle in graph.validate().errors {
            warn!(
                error = %cycle,
                "Tasks in the cycle will run in forced order and the run is unsafe"
            );
        }

        let mut queue = graph.ready_queue();
        let mut in_flight = InFlight::new();
        let mut outcomes = Vec::with_capacity(index_by_key.len());

        loop {
            for key in queue.take_ready() {
                if let Some(&index) = index_by_key.get(key.as_str()) {
                    let package = &packages[index];
                    debug!(package = %package.name(), "Starting task");
                    in_flight.spawn(index, package, task(Arc::clone(package)));
                }
            }

            if in_flight.is_empty() {
                if queue.is_finished() {
                    break;
                }
                let Some(key) = queue.force_next() else {
                    break;
                };
                if let Some(&index) = index_by_key.get(key.as_str()) {
                    let package = &packages[index];
                    warn!(
                        package = %package.name(),
                        pending = queue.pending_count(),
                        "No package is ready, forcing the next one; the run is unsafe"
                    );
                    in_flight.spawn(index, package, task(Arc::clone(package)));
                }
                continue;
            }

            if let Some((index, outcome)) = in_flight.next().await {
                queue.complete(&keys[index])?;
                outcomes.push((index, outcome));
            }
        }

        Ok(outcomes)
    }
}

async fn run_serial<F, Fut, T, E>(packages: &[Arc<Package>], task: &F) -> Vec<(usize, Outcome)>
where
    F: Fn(Arc<Package>) -> Fut,
    Fut: Future<Output = std::result::Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: Into<BoxError> + Send + 'static,
{
    let mut in_flight = InFlight::new();
    let mut outcomes = Vec::with_capacity(packages.len());
    for (index, package) in packages.iter().enumerate() {
        in_flight.spawn(index, package, task(Arc::clone(package)));
        if let Some(settled) = in_flight.next().await {
            outcomes.push(settled);
        }
    }
    outcomes
}

async fn run_parallel<F, Fut, T, E>(
    packages: &[Arc<Package>],
    selected: impl IntoIterator<Item = usize>,
    task: &F,
) -> Vec<(usize, Outcome)>
where
    F: Fn(Arc<Package>) -> Fut,
    Fut: Future<Output = std::result::Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: Into<BoxError> + Send + 'static,
{
    let mut in_flight = InFlight::new();
    for index in selected {
        let package = &packages[index];
        in_flight.spawn(index, package, task(Arc::clone(package)));
    }

    let mut outcomes = Vec::new();
    while let Some(settled) = in_flight.next().await {
        outcomes.push(settled);
    }
    outcomes
}

/// Graph-parallel task key. Packages are told apart by directory, so
/// same-named copies in different directories each get their own task.
fn task_key(package: &Package) -> String {
    package.dir().to_string_lossy().into_owned()
}

/// Input indices of this CI node's share, in natural directory order.
fn shard(packages: &[Arc<Package>], options: &RunOptions) -> Vec<usize> {
    let mut sorted: Vec<usize> = (0..packages.len()).collect();
    sorted.sort_by(|&a, &b| {
        natural_cmp(
            &packages[a].dir().to_string_lossy(),
            &packages[b].dir().to_string_lossy(),
        )
    });

    match options.ci_nodes {
        Some(nodes) if nodes.total == 0 => {
            warn!(
                index = nodes.index,
                "CI node total is 0, running every package on this node"
            );
            sorted
        }
        Some(nodes) => {
            let selected = nodes.select(&sorted).to_vec();
            info!(
                index = nodes.index,
                total = nodes.total,
                selected = selected.len(),
                "Running this CI node's share of packages"
            );
            selected
        }
        None => sorted,
    }
}

fn finish(
    packages: &[Arc<Package>],
    mut outcomes: Vec<(usize, Outcome)>,
    bail: bool,
) -> Result<()> {
    outcomes.sort_by_key(|(index, _)| *index);

    let mut first_failure = None;
    for (index, outcome) in outcomes {
        if let Err(source) = outcome {
            let package = packages[index].name().to_string();
            error!(package = %package, error = %source, "Task failed");
            if first_failure.is_none() {
                first_failure = Some(Error::TaskFailed { package, source });
            }
        }
    }

    match first_failure {
        Some(failure) if bail => Err(failure),
        _ => Ok(()),
    }
}
