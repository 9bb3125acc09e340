//! Cluster provisioning and job dispatch
//!
//! This crate talks to the compute-cluster API on behalf of a pipeline run:
//! - `ClusterApi` trait abstracting the provisioning backend
//! - HTTP implementation against the cluster API server
//! - Mock implementation with fault injection for tests
//! - Cluster lifecycle orchestration with a scoped cleanup guarantee
//! - Job dispatch with bounded retries, progress polling, and timeouts

pub mod api;
pub mod dispatcher;
pub mod http;
pub mod lifecycle;
pub mod mock;
pub mod retry;

pub use api::{ApiError, ClusterApi, ClusterHandle, ClusterSpec, ClusterState, JobState, JobSubmission};
pub use dispatcher::{JobDispatcher, JobReport};
pub use http::HttpClusterApi;
pub use lifecycle::{wait_for_shutdown, ClusterLifecycle, LifecyclePhase};
pub use mock::MockClusterApi;
