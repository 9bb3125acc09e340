//! Mock cluster API with fault injection
//!
//! In-memory backend used by unit and integration tests: readiness and job
//! completion are scripted in units of poll calls, transient submission
//! failures can be injected, and every operation is counted so tests can
//! assert exactly-once properties.

use crate::api::{ApiError, ClusterApi, ClusterSpec, ClusterState, JobState, JobSubmission};
use async_trait::async_trait;
use dashmap::DashMap;
use docq_core::RunId;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

/// Scriptable in-memory cluster API
pub struct MockClusterApi {
    clusters: DashMap<String, ClusterState>,
    jobs: DashMap<String, JobState>,
    /// Number of cluster-state polls before the cluster reports ready;
    /// `u32::MAX` means never.
    ready_after_polls: u32,
    /// Number of job-state polls before the job leaves pending.
    job_running_after_polls: u32,
    /// Number of job-state polls before the job reaches its outcome.
    job_terminal_after_polls: u32,
    outcome: Mutex<JobState>,
    submit_failures: AtomicU32,
    create_calls: AtomicU32,
    delete_calls: AtomicU32,
    submit_calls: AtomicU32,
    cluster_state_calls: AtomicU32,
    job_state_calls: AtomicU32,
    cancel_calls: AtomicU32,
}

impl Default for MockClusterApi {
    fn default() -> Self {
        Self::new()
    }
}

impl MockClusterApi {
    pub fn new() -> Self {
        Self {
            clusters: DashMap::new(),
            jobs: DashMap::new(),
            ready_after_polls: 1,
            job_running_after_polls: 1,
            job_terminal_after_polls: 2,
            outcome: Mutex::new(JobState::Succeeded),
            submit_failures: AtomicU32::new(0),
            create_calls: AtomicU32::new(0),
            delete_calls: AtomicU32::new(0),
            submit_calls: AtomicU32::new(0),
            cluster_state_calls: AtomicU32::new(0),
            job_state_calls: AtomicU32::new(0),
            cancel_calls: AtomicU32::new(0),
        }
    }

    /// Cluster reports ready after this many state polls.
    pub fn ready_after_polls(mut self, polls: u32) -> Self {
        self.ready_after_polls = polls;
        self
    }

    /// Cluster never reports ready.
    pub fn never_ready(mut self) -> Self {
        self.ready_after_polls = u32::MAX;
        self
    }

    /// First `count` submissions fail with a transport error.
    pub fn failing_submissions(self, count: u32) -> Self {
        self.submit_failures.store(count, Ordering::SeqCst);
        self
    }

    /// Script the job's terminal outcome.
    pub fn job_outcome(self, outcome: JobState) -> Self {
        *self.outcome.lock().unwrap() = outcome;
        self
    }

    /// Script how many job polls reach running / terminal state.
    pub fn job_progress(mut self, running_after: u32, terminal_after: u32) -> Self {
        self.job_running_after_polls = running_after;
        self.job_terminal_after_polls = terminal_after;
        self
    }

    pub fn create_calls(&self) -> u32 {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn delete_calls(&self) -> u32 {
        self.delete_calls.load(Ordering::SeqCst)
    }

    pub fn submit_calls(&self) -> u32 {
        self.submit_calls.load(Ordering::SeqCst)
    }

    pub fn cancel_calls(&self) -> u32 {
        self.cancel_calls.load(Ordering::SeqCst)
    }

    fn cluster_key(name: &str, run_id: &RunId) -> String {
        format!("{}/{}", name, run_id)
    }
}

#[async_trait]
impl ClusterApi for MockClusterApi {
    async fn create_cluster(&self, spec: &ClusterSpec) -> Result<(), ApiError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        self.clusters.insert(
            Self::cluster_key(&spec.name, &spec.run_id),
            ClusterState::Provisioning,
        );
        Ok(())
    }

    async fn cluster_state(&self, name: &str, run_id: &RunId) -> Result<ClusterState, ApiError> {
        let polls = self.cluster_state_calls.fetch_add(1, Ordering::SeqCst) + 1;
        let key = Self::cluster_key(name, run_id);
        if !self.clusters.contains_key(&key) {
            return Ok(ClusterState::Absent);
        }
        if polls >= self.ready_after_polls {
            self.clusters.insert(key, ClusterState::Ready);
            Ok(ClusterState::Ready)
        } else {
            Ok(ClusterState::Provisioning)
        }
    }

    async fn delete_cluster(&self, name: &str, run_id: &RunId) -> Result<(), ApiError> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        // Deleting an absent cluster is a no-op, mirroring the real API.
        self.clusters.remove(&Self::cluster_key(name, run_id));
        Ok(())
    }

    async fn submit_job(&self, submission: &JobSubmission) -> Result<String, ApiError> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);
        let remaining = self.submit_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.submit_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(ApiError::Transport("connection refused".to_string()));
        }
        let job_id = format!("{}-job-{}", submission.cluster_name, submission.run_id);
        self.jobs.insert(job_id.clone(), JobState::Pending);
        Ok(job_id)
    }

    async fn job_state(&self, _name: &str, job_id: &str) -> Result<JobState, ApiError> {
        let polls = self.job_state_calls.fetch_add(1, Ordering::SeqCst) + 1;
        let Some(current) = self.jobs.get(job_id).map(|s| s.clone()) else {
            return Err(ApiError::Rejected {
                status: 404,
                message: format!("job {} not found", job_id),
            });
        };
        if current.is_terminal() {
            return Ok(current);
        }
        let next = if polls >= self.job_terminal_after_polls {
            self.outcome.lock().unwrap().clone()
        } else if polls >= self.job_running_after_polls {
            JobState::Running
        } else {
            JobState::Pending
        };
        self.jobs.insert(job_id.to_string(), next.clone());
        Ok(next)
    }

    async fn cancel_job(&self, _name: &str, job_id: &str) -> Result<(), ApiError> {
        self.cancel_calls.fetch_add(1, Ordering::SeqCst);
        self.jobs.insert(job_id.to_string(), JobState::Cancelled);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docq_core::{ExecutionParameters, JobConfig};

    fn sample_config() -> JobConfig {
        JobConfig::from_json(include_str!("../tests/data/job_config.json")).unwrap()
    }

    #[tokio::test]
    async fn cluster_becomes_ready_after_scripted_polls() {
        let api = MockClusterApi::new().ready_after_polls(3);
        let config = sample_config();
        let spec = ClusterSpec::from_config(&config);
        api.create_cluster(&spec).await.unwrap();

        let run_id = config.run_id;
        assert_eq!(
            api.cluster_state(&config.cluster_name, &run_id).await.unwrap(),
            ClusterState::Provisioning
        );
        assert_eq!(
            api.cluster_state(&config.cluster_name, &run_id).await.unwrap(),
            ClusterState::Provisioning
        );
        assert_eq!(
            api.cluster_state(&config.cluster_name, &run_id).await.unwrap(),
            ClusterState::Ready
        );
    }

    #[tokio::test]
    async fn absent_cluster_reports_absent() {
        let api = MockClusterApi::new();
        let run_id = docq_core::RunId::new();
        assert_eq!(
            api.cluster_state("nope", &run_id).await.unwrap(),
            ClusterState::Absent
        );
    }

    #[tokio::test]
    async fn scripted_submission_failures_then_success() {
        let api = MockClusterApi::new().failing_submissions(2);
        let config = sample_config();
        let handle = crate::api::ClusterHandle {
            cluster_name: config.cluster_name.clone(),
            run_id: config.run_id,
        };
        let params = ExecutionParameters { worker_count: 5 };
        let submission = JobSubmission::build(&handle, &params, &config);

        assert!(api.submit_job(&submission).await.is_err());
        assert!(api.submit_job(&submission).await.is_err());
        assert!(api.submit_job(&submission).await.is_ok());
        assert_eq!(api.submit_calls(), 3);
    }
}
