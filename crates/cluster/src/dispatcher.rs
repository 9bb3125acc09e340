//! Job dispatch against a running cluster
//!
//! Builds the submission payload from planner output and static
//! configuration, submits it with bounded retries, then polls the remote
//! job to completion. All waits are bounded: the job must leave pending
//! within `wait_job_ready_tmout`, and the whole execution is capped by a
//! wall-clock bound (one week by default). On either timeout the remote
//! job is cancelled before the error is returned.

use crate::api::{ClusterApi, ClusterHandle, JobState, JobSubmission};
use crate::retry::with_retries;
use chrono::{DateTime, Utc};
use docq_core::{DocqError, ExecutionParameters, JobConfig, Result, WaitOptions};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, warn};

/// Outcome of one dispatched job
#[derive(Debug, Clone, Serialize)]
pub struct JobReport {
    pub job_id: String,
    pub state: JobState,
    /// Attempts consumed by the submission call, including the success.
    pub submit_attempts: u32,
    pub submitted_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Submits and supervises the annotation job on a live cluster
pub struct JobDispatcher {
    api: Arc<dyn ClusterApi>,
    waits: WaitOptions,
}

impl JobDispatcher {
    pub fn new(api: Arc<dyn ClusterApi>, waits: WaitOptions) -> Self {
        Self { api, waits }
    }

    /// Submit the job and wait for a terminal state.
    ///
    /// `wall_clock` caps the whole execution; the job is cancelled remotely
    /// when it is exceeded. A failed remote job surfaces as a transform
    /// error; cancellation observed remotely surfaces as `Cancelled`.
    pub async fn submit(
        &self,
        handle: &ClusterHandle,
        params: &ExecutionParameters,
        config: &JobConfig,
        wall_clock: Duration,
    ) -> Result<JobReport> {
        let submission = JobSubmission::build(handle, params, config);
        let submitted_at = Utc::now();

        let (submitted, submit_attempts) = with_retries(
            "job submission",
            self.waits.http_retries,
            self.waits.wait_interval(),
            || self.api.submit_job(&submission),
        )
        .await;
        let job_id = submitted.map_err(|e| e.into_docq(submit_attempts))?;
        info!(
            "submitted job {} to cluster {} ({} worker(s))",
            job_id, handle, params.worker_count
        );

        let start = Instant::now();
        let ready_deadline = start + self.waits.job_ready_timeout();
        let wall_deadline = start + wall_clock;
        let mut last_print = start;
        let mut last_state = JobState::Pending;

        loop {
            let (polled, attempts) = with_retries(
                "job status",
                self.waits.http_retries,
                self.waits.wait_interval(),
                || self.api.job_state(&handle.cluster_name, &job_id),
            )
            .await;
            let state = polled.map_err(|e| e.into_docq(attempts))?;

            if state != last_state {
                info!("job {} is {}", job_id, state);
                last_state = state.clone();
            }

            match state {
                JobState::Succeeded => {
                    return Ok(JobReport {
                        job_id,
                        state: JobState::Succeeded,
                        submit_attempts,
                        submitted_at,
                        finished_at: Utc::now(),
                    });
                }
                JobState::Failed { message } => {
                    return Err(DocqError::Transform(format!(
                        "remote job {} failed: {}",
                        job_id, message
                    )));
                }
                JobState::Cancelled => return Err(DocqError::Cancelled),
                JobState::Pending if Instant::now() >= ready_deadline => {
                    return self.cancel_with_timeout(handle, &job_id, start).await;
                }
                JobState::Pending | JobState::Running => {}
            }

            if Instant::now() >= wall_deadline {
                return self.cancel_with_timeout(handle, &job_id, start).await;
            }

            if Instant::now().duration_since(last_print) >= self.waits.print_interval() {
                info!(
                    "job {} still {} after {}s",
                    job_id,
                    last_state,
                    start.elapsed().as_secs()
                );
                last_print = Instant::now();
            }

            tokio::time::sleep(self.waits.wait_interval()).await;
        }
    }

    async fn cancel_with_timeout<T>(
        &self,
        handle: &ClusterHandle,
        job_id: &str,
        start: Instant,
    ) -> Result<T> {
        warn!(
            "job {} exceeded its time bound after {}s, cancelling",
            job_id,
            start.elapsed().as_secs()
        );
        if let Err(e) = self.api.cancel_job(&handle.cluster_name, job_id).await {
            warn!("failed to cancel job {}: {}", job_id, e);
        }
        Err(DocqError::JobTimeout {
            job_id: job_id.to_string(),
            waited_secs: start.elapsed().as_secs(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockClusterApi;

    fn sample_config() -> JobConfig {
        JobConfig::from_json(include_str!("../tests/data/job_config.json")).unwrap()
    }

    fn handle(config: &JobConfig) -> ClusterHandle {
        ClusterHandle {
            cluster_name: config.cluster_name.clone(),
            run_id: config.run_id,
        }
    }

    fn params() -> ExecutionParameters {
        ExecutionParameters { worker_count: 5 }
    }

    const ONE_WEEK: Duration = Duration::from_secs(7 * 24 * 3600);

    #[tokio::test(start_paused = true)]
    async fn successful_job_produces_report() {
        let config = sample_config();
        let api = Arc::new(MockClusterApi::new().job_progress(1, 3));
        let dispatcher = JobDispatcher::new(api.clone(), config.waits.clone());

        let report = dispatcher
            .submit(&handle(&config), &params(), &config, ONE_WEEK)
            .await
            .unwrap();

        assert_eq!(report.state, JobState::Succeeded);
        assert_eq!(report.submit_attempts, 1);
        assert_eq!(api.submit_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn three_transient_failures_then_success_takes_four_attempts() {
        let config = sample_config();
        let api = Arc::new(MockClusterApi::new().failing_submissions(3));
        let dispatcher = JobDispatcher::new(api.clone(), config.waits.clone());

        let report = dispatcher
            .submit(&handle(&config), &params(), &config, ONE_WEEK)
            .await
            .unwrap();

        assert_eq!(report.submit_attempts, 4);
        assert_eq!(api.submit_calls(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn retry_budget_exhaustion_escalates() {
        let config = sample_config();
        let api = Arc::new(MockClusterApi::new().failing_submissions(10));
        let dispatcher = JobDispatcher::new(api.clone(), config.waits.clone());

        let result = dispatcher
            .submit(&handle(&config), &params(), &config, ONE_WEEK)
            .await;

        assert!(matches!(result, Err(DocqError::Api { attempts: 5, .. })));
        assert_eq!(api.submit_calls(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_remote_job_is_a_transform_error() {
        let config = sample_config();
        let api = Arc::new(MockClusterApi::new().job_outcome(JobState::Failed {
            message: "worker oom".to_string(),
        }));
        let dispatcher = JobDispatcher::new(api.clone(), config.waits.clone());

        let result = dispatcher
            .submit(&handle(&config), &params(), &config, ONE_WEEK)
            .await;

        match result {
            Err(DocqError::Transform(message)) => assert!(message.contains("worker oom")),
            other => panic!("unexpected outcome: {:?}", other.err()),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn job_stuck_pending_is_cancelled_and_times_out() {
        let config = sample_config();
        // Job never leaves pending.
        let api = Arc::new(MockClusterApi::new().job_progress(u32::MAX, u32::MAX));
        let dispatcher = JobDispatcher::new(api.clone(), config.waits.clone());

        let result = dispatcher
            .submit(&handle(&config), &params(), &config, ONE_WEEK)
            .await;

        assert!(matches!(result, Err(DocqError::JobTimeout { .. })));
        assert_eq!(api.cancel_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn wall_clock_bound_cancels_running_job() {
        let config = sample_config();
        // Job starts running but never finishes.
        let api = Arc::new(MockClusterApi::new().job_progress(1, u32::MAX));
        let dispatcher = JobDispatcher::new(api.clone(), config.waits.clone());

        let result = dispatcher
            .submit(&handle(&config), &params(), &config, Duration::from_secs(120))
            .await;

        assert!(matches!(result, Err(DocqError::JobTimeout { .. })));
        assert_eq!(api.cancel_calls(), 1);
    }
}
