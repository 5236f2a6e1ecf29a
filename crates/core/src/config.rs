//! Run options for the task scheduler.

use crate::ci::CiNodes;
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

/// How per-package tasks are ordered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OrderMode {
    /// One at a time, in input order.
    Serial,
    /// Everything at once.
    Parallel,
    /// Everything at once, over this CI node's share of the packages.
    ParallelNodes,
    /// Each package after its internal dependencies.
    #[default]
    GraphParallel,
}

impl OrderMode {
    /// Kebab-case name of the mode.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Serial => "serial",
            Self::Parallel => "parallel",
            Self::ParallelNodes => "parallel-nodes",
            Self::GraphParallel => "graph-parallel",
        }
    }
}

impl fmt::Display for OrderMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "serial" => Ok(Self::Serial),
            "parallel" => Ok(Self::Parallel),
            "parallel-nodes" => Ok(Self::ParallelNodes),
            "graph-parallel" => Ok(Self::GraphParallel),
            other => Err(format!(
                "unknown order mode '{other}', expected one of: serial, parallel, parallel-nodes, graph-parallel"
            )),
        }
    }
}

/// Options for [`TaskScheduler::run`](crate::TaskScheduler::run).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct RunOptions {
    /// Task ordering.
    pub order: OrderMode,
    /// Raise the first task failure once every task has settled.
    pub bail: bool,
    /// CI shard for [`OrderMode::ParallelNodes`].
    pub ci_nodes: Option<CiNodes>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            order: OrderMode::default(),
            bail: true,
            ci_nodes: None,
        }
    }
}

impl RunOptions {
    /// Options with the given order and defaults otherwise.
    #[must_use]
    pub fn with_order(order: OrderMode) -> Self {
        Self {
            order,
            ..Self::default()
        }
    }
}
