//! Cluster lifecycle orchestration
//!
//! Owns one ephemeral cluster for the duration of a pipeline run:
//! provision, wait for readiness, and guarantee teardown on every exit
//! path. Cleanup is modeled as scoped acquisition rather than an exit
//! hook: `run_scoped` acquires the cluster, runs the body, and always
//! releases, whether the body succeeds, fails, or times out.

use crate::api::{ClusterApi, ClusterHandle, ClusterSpec, ClusterState};
use crate::retry::with_retries;
use docq_core::{DocqError, JobConfig, Result, RunId, WaitOptions};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{info, warn};

/// Lifecycle phase of the managed cluster
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecyclePhase {
    Absent,
    Creating,
    Ready,
    Cleaning,
    Gone,
    Failed,
}

impl std::fmt::Display for LifecyclePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LifecyclePhase::Absent => write!(f, "Absent"),
            LifecyclePhase::Creating => write!(f, "Creating"),
            LifecyclePhase::Ready => write!(f, "Ready"),
            LifecyclePhase::Cleaning => write!(f, "Cleaning"),
            LifecyclePhase::Gone => write!(f, "Gone"),
            LifecyclePhase::Failed => write!(f, "Failed"),
        }
    }
}

/// Single-owner manager for one cluster instance
///
/// Phase transitions are only performed by this instance; nothing else
/// mutates the lifecycle concurrently.
pub struct ClusterLifecycle {
    api: Arc<dyn ClusterApi>,
    spec: ClusterSpec,
    waits: WaitOptions,
    cleanup_timeout: Duration,
    phase: LifecyclePhase,
    cleanup_done: bool,
}

impl ClusterLifecycle {
    pub fn new(api: Arc<dyn ClusterApi>, config: &JobConfig) -> Self {
        Self {
            api,
            spec: ClusterSpec::from_config(config),
            waits: config.waits.clone(),
            cleanup_timeout: config.timeouts.cleanup(),
            phase: LifecyclePhase::Absent,
            cleanup_done: false,
        }
    }

    pub fn phase(&self) -> LifecyclePhase {
        self.phase
    }

    pub fn handle(&self) -> ClusterHandle {
        ClusterHandle {
            cluster_name: self.spec.name.clone(),
            run_id: self.spec.run_id,
        }
    }

    /// Request provisioning and poll until the cluster is ready.
    ///
    /// The cluster must leave `Absent` within `wait_cluster_up_tmout` and
    /// reach `Ready` within `wait_cluster_ready_tmout`, polled at
    /// `wait_interval`. Timeout transitions the lifecycle to `Failed` and
    /// returns a provisioning timeout error.
    pub async fn create(&mut self) -> Result<ClusterHandle> {
        self.phase = LifecyclePhase::Creating;
        info!("provisioning cluster {}", self.handle());

        let (created, attempts) = with_retries(
            "cluster creation",
            self.waits.http_retries,
            self.waits.wait_interval(),
            || self.api.create_cluster(&self.spec),
        )
        .await;
        if let Err(e) = created {
            self.phase = LifecyclePhase::Failed;
            return Err(e.into_docq(attempts));
        }

        let start = Instant::now();
        let up_deadline = start + Duration::from_secs(self.waits.wait_cluster_up_tmout_secs);
        let ready_deadline = start + self.waits.cluster_ready_timeout();

        loop {
            match self
                .api
                .cluster_state(&self.spec.name, &self.spec.run_id)
                .await
            {
                Ok(ClusterState::Ready) => {
                    self.phase = LifecyclePhase::Ready;
                    info!(
                        "cluster {} ready after {:?}",
                        self.handle(),
                        start.elapsed()
                    );
                    return Ok(self.handle());
                }
                Ok(ClusterState::Failed) => {
                    self.phase = LifecyclePhase::Failed;
                    return Err(DocqError::Api {
                        message: format!("cluster {} entered failed state", self.handle()),
                        attempts: 1,
                    });
                }
                Ok(ClusterState::Absent) if Instant::now() >= up_deadline => {
                    return self.provisioning_timeout(start);
                }
                Ok(_) => {}
                // Transient status failures count against the deadline,
                // not against the run.
                Err(e) => warn!("cluster state poll failed: {}", e),
            }

            if Instant::now() >= ready_deadline {
                return self.provisioning_timeout(start);
            }
            tokio::time::sleep(self.waits.wait_interval()).await;
        }
    }

    fn provisioning_timeout(&mut self, start: Instant) -> Result<ClusterHandle> {
        self.phase = LifecyclePhase::Failed;
        Err(DocqError::ProvisioningTimeout {
            cluster: self.spec.name.clone(),
            waited_secs: start.elapsed().as_secs(),
        })
    }

    /// Tear the cluster down. Idempotent: the first call releases, every
    /// later call is a no-op. Safe to call from any phase, including after
    /// a failed or never-started provisioning. Failures are logged, not
    /// escalated, so cleanup can never block pipeline termination.
    pub async fn cleanup(&mut self) {
        if self.cleanup_done {
            return;
        }
        self.cleanup_done = true;
        self.phase = LifecyclePhase::Cleaning;

        cleanup_cluster(
            self.api.as_ref(),
            &self.spec.name,
            &self.spec.run_id,
            self.cleanup_timeout,
        )
        .await;
        self.phase = LifecyclePhase::Gone;
    }

    /// Scoped acquisition: provision (bounded by `create_timeout`), run the
    /// body against the live cluster, and release unconditionally.
    ///
    /// If provisioning fails the body is never entered, but cleanup still
    /// runs; teardown must be safe on an absent or partial cluster.
    pub async fn run_scoped<T, F, Fut>(&mut self, create_timeout: Duration, body: F) -> Result<T>
    where
        F: FnOnce(ClusterHandle) -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        // Sender kept alive for the whole call, so shutdown never fires.
        let (_tx, rx) = watch::channel(false);
        self.run_scoped_with_shutdown(create_timeout, rx, body).await
    }

    /// Like `run_scoped`, but abandons provisioning or the body as soon as
    /// the shutdown channel flips to `true`. Cancellation takes the same
    /// exit path as any other failure: cleanup still runs.
    pub async fn run_scoped_with_shutdown<T, F, Fut>(
        &mut self,
        create_timeout: Duration,
        mut shutdown: watch::Receiver<bool>,
        body: F,
    ) -> Result<T>
    where
        F: FnOnce(ClusterHandle) -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let cluster_name = self.spec.name.clone();
        let created = tokio::select! {
            outcome = tokio::time::timeout(create_timeout, self.create()) => match outcome {
                Ok(result) => result,
                Err(_) => Err(DocqError::ProvisioningTimeout {
                    cluster: cluster_name,
                    waited_secs: create_timeout.as_secs(),
                }),
            },
            _ = wait_for_shutdown(&mut shutdown) => {
                warn!("shutdown requested while provisioning {}", cluster_name);
                Err(DocqError::Cancelled)
            }
        };
        if created.is_err() {
            self.phase = LifecyclePhase::Failed;
        }

        let result = match created {
            Ok(handle) => {
                tokio::select! {
                    outcome = body(handle) => outcome,
                    _ = wait_for_shutdown(&mut shutdown) => {
                        warn!("shutdown requested, abandoning scoped work");
                        Err(DocqError::Cancelled)
                    }
                }
            }
            Err(e) => Err(e),
        };

        self.cleanup().await;
        result
    }
}

/// Resolves once the shutdown channel flips to `true`. Pends forever when
/// the sender is gone, so a dropped signal task never reads as a shutdown.
pub async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow() {
            return;
        }
        if shutdown.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Standalone teardown keyed by (cluster name, run id) only, so it stays
/// replayable from just those two identifiers.
pub async fn cleanup_cluster(
    api: &dyn ClusterApi,
    name: &str,
    run_id: &RunId,
    cleanup_timeout: Duration,
) {
    info!("cleaning up cluster {}/{}", name, run_id);
    let deletion = tokio::time::timeout(cleanup_timeout, async {
        api.delete_cluster(name, run_id).await
    })
    .await;
    match deletion {
        Ok(Ok(())) => info!("cluster {}/{} deleted", name, run_id),
        Ok(Err(e)) => warn!("cluster {}/{} cleanup failed: {}", name, run_id, e),
        Err(_) => warn!(
            "cluster {}/{} cleanup timed out after {:?}",
            name, run_id, cleanup_timeout
        ),
    }
}
