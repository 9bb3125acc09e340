//! HTTP cluster API client
//!
//! Thin reqwest client against the cluster API server. Retries live one
//! layer up (lifecycle/dispatcher); this client only classifies failures
//! so callers can tell retryable transport/server errors from rejections.

use crate::api::{ApiError, ClusterApi, ClusterSpec, ClusterState, JobState, JobSubmission};
use async_trait::async_trait;
use docq_core::RunId;
use serde::Deserialize;
use std::time::Duration;

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Client for the cluster API server
#[derive(Debug, Clone)]
pub struct HttpClusterApi {
    client: reqwest::Client,
    endpoint: String,
}

#[derive(Debug, Deserialize)]
struct ClusterStatusResponse {
    state: ClusterState,
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    job_id: String,
}

#[derive(Debug, Deserialize)]
struct JobStatusResponse {
    state: String,
    #[serde(default)]
    message: Option<String>,
}

impl HttpClusterApi {
    pub fn new(endpoint: impl Into<String>) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ApiError::Transport(format!("failed to build http client: {}", e)))?;
        Ok(Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
        })
    }

    fn cluster_url(&self, name: &str, run_id: &RunId) -> String {
        format!("{}/apis/v1/clusters/{}?run_id={}", self.endpoint, name, run_id)
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().await.unwrap_or_default();
        if status.is_server_error() {
            Err(ApiError::Server {
                status: status.as_u16(),
                message,
            })
        } else {
            Err(ApiError::Rejected {
                status: status.as_u16(),
                message,
            })
        }
    }

    fn transport(e: reqwest::Error) -> ApiError {
        ApiError::Transport(e.to_string())
    }
}

#[async_trait]
impl ClusterApi for HttpClusterApi {
    async fn create_cluster(&self, spec: &ClusterSpec) -> Result<(), ApiError> {
        let response = self
            .client
            .post(format!("{}/apis/v1/clusters", self.endpoint))
            .json(spec)
            .send()
            .await
            .map_err(Self::transport)?;
        Self::check_status(response).await.map(|_| ())
    }

    async fn cluster_state(&self, name: &str, run_id: &RunId) -> Result<ClusterState, ApiError> {
        let response = self
            .client
            .get(self.cluster_url(name, run_id))
            .send()
            .await
            .map_err(Self::transport)?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(ClusterState::Absent);
        }
        let response = Self::check_status(response).await?;
        let status: ClusterStatusResponse = response
            .json()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()))?;
        Ok(status.state)
    }

    async fn delete_cluster(&self, name: &str, run_id: &RunId) -> Result<(), ApiError> {
        let response = self
            .client
            .delete(self.cluster_url(name, run_id))
            .send()
            .await
            .map_err(Self::transport)?;
        // Deleting an absent cluster is not an error; cleanup is replayable.
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(());
        }
        Self::check_status(response).await.map(|_| ())
    }

    async fn submit_job(&self, submission: &JobSubmission) -> Result<String, ApiError> {
        let response = self
            .client
            .post(format!("{}/apis/v1/jobs", self.endpoint))
            .json(submission)
            .send()
            .await
            .map_err(Self::transport)?;
        let response = Self::check_status(response).await?;
        let submitted: SubmitResponse = response
            .json()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()))?;
        Ok(submitted.job_id)
    }

    async fn job_state(&self, name: &str, job_id: &str) -> Result<JobState, ApiError> {
        let response = self
            .client
            .get(format!(
                "{}/apis/v1/clusters/{}/jobs/{}",
                self.endpoint, name, job_id
            ))
            .send()
            .await
            .map_err(Self::transport)?;
        let response = Self::check_status(response).await?;
        let status: JobStatusResponse = response
            .json()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()))?;
        match status.state.as_str() {
            "pending" => Ok(JobState::Pending),
            "running" => Ok(JobState::Running),
            "succeeded" => Ok(JobState::Succeeded),
            "failed" => Ok(JobState::Failed {
                message: status.message.unwrap_or_default(),
            }),
            "cancelled" => Ok(JobState::Cancelled),
            other => Err(ApiError::Decode(format!("unknown job state: {}", other))),
        }
    }

    async fn cancel_job(&self, name: &str, job_id: &str) -> Result<(), ApiError> {
        let response = self
            .client
            .post(format!(
                "{}/apis/v1/clusters/{}/jobs/{}/cancel",
                self.endpoint, name, job_id
            ))
            .send()
            .await
            .map_err(Self::transport)?;
        Self::check_status(response).await.map(|_| ())
    }
}
