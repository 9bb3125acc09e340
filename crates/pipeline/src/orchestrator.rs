//! Pipeline orchestrator
//!
//! Runs one annotation job end to end: plan sizing, acquire an ephemeral
//! cluster, dispatch the job, and always release the cluster. The cluster
//! acquisition is scoped, so teardown runs whether the dispatch stage
//! succeeds, fails, times out, or is cancelled from the outside. Timeouts
//! that expire while a stage is in flight are delivered through the
//! stage's own deadline rather than by dropping its future, which is what
//! keeps the cleanup guarantee intact.

use docq_cluster::api::ClusterApi;
use docq_cluster::dispatcher::{JobDispatcher, JobReport};
use docq_cluster::lifecycle::ClusterLifecycle;
use docq_core::{compute_execution_params, ExecutionParameters, JobConfig, Result, RunId};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::info;

/// Outcome of one pipeline run, with the audit metadata sidecar.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub run_id: RunId,
    pub params: ExecutionParameters,
    pub job: JobReport,
    /// Flat key/value view of the planner and transform inputs.
    pub metadata: BTreeMap<String, String>,
}

pub struct PipelineOrchestrator {
    api: Arc<dyn ClusterApi>,
    config: JobConfig,
}

impl PipelineOrchestrator {
    pub fn new(api: Arc<dyn ClusterApi>, config: JobConfig) -> Self {
        Self { api, config }
    }

    /// Run the pipeline without an external cancellation source.
    pub async fn run(&self) -> Result<PipelineReport> {
        let (_tx, rx) = watch::channel(false);
        self.run_with_shutdown(rx).await
    }

    /// Run the pipeline, aborting the dispatch stage when `shutdown`
    /// flips to true. Cancellation still tears the cluster down.
    pub async fn run_with_shutdown(
        &self,
        shutdown: watch::Receiver<bool>,
    ) -> Result<PipelineReport> {
        self.config.validate()?;
        let timeouts = &self.config.timeouts;
        let pipeline_deadline = Instant::now() + timeouts.pipeline();

        let params = compute_execution_params(&self.config.workers, &self.config.actor)?;
        info!(
            worker_count = params.worker_count,
            "planned execution parameters"
        );

        let mut lifecycle = ClusterLifecycle::new(self.api.clone(), &self.config);
        let dispatcher = JobDispatcher::new(self.api.clone(), self.config.waits.clone());

        let create_timeout = remaining(pipeline_deadline).min(timeouts.cluster_create());
        let wall_clock = remaining(pipeline_deadline).min(timeouts.execute());
        let dispatcher = &dispatcher;
        let params_ref = &params;
        let config = &self.config;
        let job = lifecycle
            .run_scoped_with_shutdown(create_timeout, shutdown, |handle| async move {
                dispatcher.submit(&handle, params_ref, config, wall_clock).await
            })
            .await?;

        info!(job_id = %job.job_id, "pipeline run finished");
        Ok(PipelineReport {
            run_id: self.config.run_id,
            params,
            job,
            metadata: self.metadata(&params),
        })
    }

    /// Sidecar holds the planner inputs alongside the derived sizing, so a
    /// run can be audited without the submitting configuration at hand.
    fn metadata(&self, params: &ExecutionParameters) -> BTreeMap<String, String> {
        let mut metadata = params.metadata();
        metadata.extend(self.config.transform.metadata());
        metadata.insert(
            "worker_replicas".to_string(),
            self.config.workers.replicas.to_string(),
        );
        metadata.insert(
            "worker_cpu_cores".to_string(),
            self.config.workers.cpu_cores.to_string(),
        );
        metadata.insert(
            "cpu_per_task".to_string(),
            self.config.actor.cpu_per_task.to_string(),
        );
        metadata.insert("pipeline_id".to_string(), self.config.pipeline_id.clone());
        metadata.insert("cluster_name".to_string(), self.config.cluster_name.clone());
        metadata.insert("max_files".to_string(), self.config.max_files.to_string());
        metadata
    }
}

fn remaining(deadline: Instant) -> Duration {
    deadline.saturating_duration_since(Instant::now())
}
