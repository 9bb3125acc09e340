//! Cluster API abstraction
//!
//! Trait and data types for the provisioning backend. How the backend
//! actually stands up nodes is out of scope; everything here is the wire
//! contract the lifecycle orchestrator and dispatcher program against.

use async_trait::async_trait;
use docq_core::{
    DocqError, ExecutionParameters, HeadNodeOptions, JobConfig, RunId, WorkerPoolOptions,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors surfaced by a cluster API backend
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("server error (status {status}): {message}")]
    Server { status: u16, message: String },

    #[error("request rejected (status {status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("unexpected response payload: {0}")]
    Decode(String),
}

impl ApiError {
    /// Network failures and 5xx responses are worth retrying; 4xx and
    /// malformed payloads indicate a bad request and never are.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ApiError::Transport(_) | ApiError::Server { .. })
    }

    pub fn into_docq(self, attempts: u32) -> DocqError {
        DocqError::Api {
            message: self.to_string(),
            attempts,
        }
    }
}

/// Remote cluster state as reported by the API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClusterState {
    Absent,
    Provisioning,
    Ready,
    Failed,
}

impl std::fmt::Display for ClusterState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClusterState::Absent => write!(f, "absent"),
            ClusterState::Provisioning => write!(f, "provisioning"),
            ClusterState::Ready => write!(f, "ready"),
            ClusterState::Failed => write!(f, "failed"),
        }
    }
}

/// Remote job state as reported by the API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Pending,
    Running,
    Succeeded,
    Failed { message: String },
    Cancelled,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobState::Succeeded | JobState::Failed { .. } | JobState::Cancelled
        )
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobState::Pending => write!(f, "pending"),
            JobState::Running => write!(f, "running"),
            JobState::Succeeded => write!(f, "succeeded"),
            JobState::Failed { message } => write!(f, "failed: {}", message),
            JobState::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Provisioning request for one ephemeral cluster
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterSpec {
    pub name: String,
    pub run_id: RunId,
    pub head: HeadNodeOptions,
    pub workers: WorkerPoolOptions,
}

impl ClusterSpec {
    pub fn from_config(config: &JobConfig) -> Self {
        Self {
            name: config.cluster_name.clone(),
            run_id: config.run_id,
            head: config.head.clone(),
            workers: config.workers.clone(),
        }
    }
}

/// Handle to a live cluster instance
///
/// Cleanup is keyed by (name, run id) alone so it stays replayable from
/// just these two identifiers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterHandle {
    pub cluster_name: String,
    pub run_id: RunId,
}

impl std::fmt::Display for ClusterHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.cluster_name, self.run_id)
    }
}

/// Credentialed storage scope inside a job submission
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageScope {
    pub input_folder: String,
    pub output_folder: String,
    pub secret_name: String,
    #[serde(default)]
    pub env_prefix: Option<String>,
}

/// Transform parameters shipped with the submission
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformParams {
    pub language: String,
    pub drop_column_if_existed: bool,
    pub text_column: String,
    pub annotation_column: String,
    pub annotation_source_url_column: String,
    pub denylist_path: String,
}

/// Full job submission payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSubmission {
    pub cluster_name: String,
    pub run_id: RunId,
    pub pipeline_id: String,
    pub num_workers: u32,
    pub max_files: i64,
    pub storage: StorageScope,
    #[serde(default)]
    pub reference_storage: Option<StorageScope>,
    pub transform: TransformParams,
}

impl JobSubmission {
    /// Assemble the payload from planner output plus static configuration.
    pub fn build(
        handle: &ClusterHandle,
        params: &ExecutionParameters,
        config: &JobConfig,
    ) -> Self {
        let reference_storage = match (&config.reference_storage, &config.reference_storage_secret)
        {
            (Some(location), Some(secret)) => Some(StorageScope {
                input_folder: location.input_folder.clone(),
                output_folder: location.output_folder.clone(),
                secret_name: secret.secret_name.clone(),
                env_prefix: secret.env_prefix.clone(),
            }),
            _ => None,
        };

        Self {
            cluster_name: handle.cluster_name.clone(),
            run_id: handle.run_id,
            pipeline_id: config.pipeline_id.clone(),
            num_workers: params.worker_count,
            max_files: config.max_files,
            storage: StorageScope {
                input_folder: config.storage.input_folder.clone(),
                output_folder: config.storage.output_folder.clone(),
                secret_name: config.storage_secret.secret_name.clone(),
                env_prefix: config.storage_secret.env_prefix.clone(),
            },
            reference_storage,
            transform: TransformParams {
                language: config.transform.language.to_string(),
                drop_column_if_existed: config.transform.drop_column_if_existed,
                text_column: config.transform.text_column.clone(),
                annotation_column: config.transform.annotation_column.clone(),
                annotation_source_url_column: config.transform.source_url_column.clone(),
                denylist_path: config.transform.denylist_path.clone(),
            },
        }
    }
}

/// Provisioning and job execution backend
#[async_trait]
pub trait ClusterApi: Send + Sync {
    /// Request cluster provisioning. Returns once the request is accepted,
    /// not once the cluster is ready.
    async fn create_cluster(&self, spec: &ClusterSpec) -> Result<(), ApiError>;

    /// Current cluster state.
    async fn cluster_state(&self, name: &str, run_id: &RunId) -> Result<ClusterState, ApiError>;

    /// Tear the cluster down. Deleting an absent cluster is not an error.
    async fn delete_cluster(&self, name: &str, run_id: &RunId) -> Result<(), ApiError>;

    /// Submit the annotation job; returns the remote job id.
    async fn submit_job(&self, submission: &JobSubmission) -> Result<String, ApiError>;

    /// Current remote job state.
    async fn job_state(&self, name: &str, job_id: &str) -> Result<JobState, ApiError>;

    /// Cancel a running remote job.
    async fn cancel_job(&self, name: &str, job_id: &str) -> Result<(), ApiError>;
}
