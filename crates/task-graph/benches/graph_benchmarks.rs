//! Benchmarks for task graph operations
//!
//! Run with: cargo bench -p grove-task-graph

#![allow(clippy::unwrap_used)]

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use grove_task_graph::{TaskGraph, TaskNodeData};
use std::hint::black_box;

#[derive(Debug, Clone)]
struct BenchTask {
    deps: Vec<String>,
}

impl TaskNodeData for BenchTask {
    fn dependency_names(&self) -> impl Iterator<Item = &str> {
        self.deps.iter().map(String::as_str)
    }
}

/// Many leaf packages all depending on one shared utility package.
fn fan_in_workspace(count: usize) -> TaskGraph<BenchTask> {
    let mut graph = TaskGraph::new();
    graph.add_task("utils@1.0.0", BenchTask { deps: vec![] }).unwrap();
    for i in 0..count {
        graph
            .add_task(
                &format!("app-{i}@1.0.0"),
                BenchTask {
                    deps: vec!["utils@1.0.0".to_string()],
                },
            )
            .unwrap();
    }
    graph.add_dependency_edges().unwrap();
    graph
}

/// Layers of packages where each layer depends on every package below it.
fn layered_workspace(width: usize, depth: usize) -> TaskGraph<BenchTask> {
    let mut graph = TaskGraph::new();
    let mut below: Vec<String> = Vec::new();
    for layer in 0..depth {
        let mut current = Vec::with_capacity(width);
        for w in 0..width {
            let name = format!("layer{layer}-pkg{w}@1.0.0");
            graph
                .add_task(&name, BenchTask { deps: below.clone() })
                .unwrap();
            current.push(name);
        }
        below = current;
    }
    graph.add_dependency_edges().unwrap();
    graph
}

fn drain_ready_queue(graph: &TaskGraph<BenchTask>) -> usize {
    let mut queue = graph.ready_queue();
    let mut completed = 0;
    loop {
        let ready = queue.take_ready();
        if ready.is_empty() {
            break;
        }
        for name in ready {
            queue.complete(&name).unwrap();
            completed += 1;
        }
    }
    completed
}

fn benchmark_parallel_groups(c: &mut Criterion) {
    let mut group = c.benchmark_group("parallel_groups");
    for count in [50, 200, 500] {
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            let graph = fan_in_workspace(count);
            b.iter(|| black_box(graph.get_parallel_groups().unwrap()));
        });
    }
    group.finish();
}

fn benchmark_ready_queue(c: &mut Criterion) {
    let mut group = c.benchmark_group("ready_queue_drain");
    for (width, depth) in [(5, 5), (10, 10), (20, 10)] {
        let label = format!("w{width}_d{depth}");
        group.bench_with_input(
            BenchmarkId::from_parameter(&label),
            &(width, depth),
            |b, &(width, depth)| {
                let graph = layered_workspace(width, depth);
                b.iter(|| black_box(drain_ready_queue(&graph)));
            },
        );
    }
    group.finish();
}

fn benchmark_cycle_detection(c: &mut Criterion) {
    let mut group = c.benchmark_group("cycle_detection");
    for count in [100, 1000] {
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            let graph = fan_in_workspace(count);
            b.iter(|| black_box(graph.cycles()));
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    benchmark_parallel_groups,
    benchmark_ready_queue,
    benchmark_cycle_detection,
);

criterion_main!(benches);
