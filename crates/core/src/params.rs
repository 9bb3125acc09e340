//! Execution parameter planning
//!
//! Derives job sizing from the declared worker pool and per-task resource
//! requirements. Pure computation; runs before any cluster exists.

use crate::config::{ActorOptions, WorkerPoolOptions};
use crate::error::{DocqError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Derived sizing values consumed by the job dispatcher
///
/// Never mutated after planning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionParameters {
    pub worker_count: u32,
}

impl ExecutionParameters {
    /// Flat metadata view for the audit sidecar.
    pub fn metadata(&self) -> BTreeMap<String, String> {
        BTreeMap::from([("worker_count".to_string(), self.worker_count.to_string())])
    }
}

/// Plan execution parameters from worker pool and actor options.
///
/// The worker count is `floor(total_pool_cpu / cpu_per_task)` where the
/// total pool CPU is `replicas * cpu_per_replica`, clamped to at least 1 so
/// a pool of small replicas still makes progress. Invalid options fail with
/// a configuration error; callers must not proceed to cluster creation on
/// that failure.
pub fn compute_execution_params(
    workers: &WorkerPoolOptions,
    actor: &ActorOptions,
) -> Result<ExecutionParameters> {
    workers.validate()?;
    actor.validate()?;

    let total_cpu = workers.replicas as f64 * workers.cpu_cores;
    let worker_count = (total_cpu / actor.cpu_per_task).floor();
    if !worker_count.is_finite() {
        return Err(DocqError::Configuration(format!(
            "cannot derive worker count from replicas={} cpu_cores={} cpu_per_task={}",
            workers.replicas, workers.cpu_cores, actor.cpu_per_task
        )));
    }

    Ok(ExecutionParameters {
        worker_count: (worker_count as u32).max(1),
    })
}
