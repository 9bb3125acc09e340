//! Job configuration schema
//!
//! Typed configuration for a pipeline run, validated once at the pipeline
//! boundary. Every numeric knob has an explicit default and a validation
//! rule; the stringified option maps of earlier deployments are gone.

use crate::error::{DocqError, Result};
use crate::RunId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

const ONE_HOUR_SEC: u64 = 3600;
const ONE_WEEK_SEC: u64 = 7 * 24 * ONE_HOUR_SEC;

/// Language tag for the transform ("en", "ja", ...)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LanguageTag(String);

impl LanguageTag {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Japanese input activates two additional heuristic columns.
    pub fn is_japanese(&self) -> bool {
        self.0 == "ja"
    }
}

impl Default for LanguageTag {
    fn default() -> Self {
        Self("en".to_string())
    }
}

impl std::fmt::Display for LanguageTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Head node sizing options
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeadNodeOptions {
    pub cpu_cores: f64,
    pub memory_gb: f64,
    pub image: String,
    #[serde(default)]
    pub image_pull_secret: Option<String>,
}

impl HeadNodeOptions {
    pub fn validate(&self) -> Result<()> {
        if self.image.is_empty() {
            return Err(DocqError::Configuration(
                "head node image cannot be empty".to_string(),
            ));
        }
        if !(self.cpu_cores.is_finite() && self.cpu_cores > 0.0) {
            return Err(DocqError::Configuration(
                "head node cpu_cores must be a positive number".to_string(),
            ));
        }
        if !(self.memory_gb.is_finite() && self.memory_gb > 0.0) {
            return Err(DocqError::Configuration(
                "head node memory_gb must be a positive number".to_string(),
            ));
        }
        Ok(())
    }
}

/// Worker pool sizing options
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerPoolOptions {
    pub replicas: u32,
    pub min_replicas: u32,
    pub max_replicas: u32,
    pub cpu_cores: f64,
    pub memory_gb: f64,
    pub image: String,
    #[serde(default)]
    pub image_pull_secret: Option<String>,
}

impl WorkerPoolOptions {
    pub fn validate(&self) -> Result<()> {
        if self.image.is_empty() {
            return Err(DocqError::Configuration(
                "worker image cannot be empty".to_string(),
            ));
        }
        if self.replicas == 0 {
            return Err(DocqError::Configuration(
                "worker replicas must be at least 1".to_string(),
            ));
        }
        if self.min_replicas > self.replicas || self.replicas > self.max_replicas {
            return Err(DocqError::Configuration(format!(
                "worker replicas {} outside [{}, {}]",
                self.replicas, self.min_replicas, self.max_replicas
            )));
        }
        if !(self.cpu_cores.is_finite() && self.cpu_cores > 0.0) {
            return Err(DocqError::Configuration(
                "worker cpu_cores must be a positive number".to_string(),
            ));
        }
        if !(self.memory_gb.is_finite() && self.memory_gb > 0.0) {
            return Err(DocqError::Configuration(
                "worker memory_gb must be a positive number".to_string(),
            ));
        }
        Ok(())
    }
}

/// Per-task resource requirement for scoring actors
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActorOptions {
    pub cpu_per_task: f64,
}

impl ActorOptions {
    pub fn validate(&self) -> Result<()> {
        if !(self.cpu_per_task.is_finite() && self.cpu_per_task > 0.0) {
            return Err(DocqError::Configuration(
                "actor cpu_per_task must be a positive number".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for ActorOptions {
    fn default() -> Self {
        Self { cpu_per_task: 0.8 }
    }
}

/// Wait/retry tunables for cluster API interaction
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WaitOptions {
    pub wait_interval_secs: u64,
    pub wait_cluster_up_tmout_secs: u64,
    pub wait_cluster_ready_tmout_secs: u64,
    pub wait_job_ready_tmout_secs: u64,
    pub wait_print_tmout_secs: u64,
    pub http_retries: u32,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            wait_interval_secs: 2,
            wait_cluster_up_tmout_secs: 300,
            wait_cluster_ready_tmout_secs: 400,
            wait_job_ready_tmout_secs: 400,
            wait_print_tmout_secs: 30,
            http_retries: 5,
        }
    }
}

impl WaitOptions {
    pub fn wait_interval(&self) -> Duration {
        Duration::from_secs(self.wait_interval_secs)
    }

    pub fn cluster_ready_timeout(&self) -> Duration {
        Duration::from_secs(self.wait_cluster_ready_tmout_secs)
    }

    pub fn job_ready_timeout(&self) -> Duration {
        Duration::from_secs(self.wait_job_ready_tmout_secs)
    }

    pub fn print_interval(&self) -> Duration {
        Duration::from_secs(self.wait_print_tmout_secs)
    }
}

/// Per-stage and pipeline-wide time bounds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StageTimeouts {
    pub compute_params_secs: u64,
    pub cluster_create_secs: u64,
    pub execute_secs: u64,
    pub cleanup_secs: u64,
    pub pipeline_secs: u64,
}

impl Default for StageTimeouts {
    fn default() -> Self {
        Self {
            compute_params_secs: 2 * ONE_HOUR_SEC,
            cluster_create_secs: 2 * ONE_HOUR_SEC,
            execute_secs: ONE_WEEK_SEC,
            cleanup_secs: 60,
            pipeline_secs: ONE_WEEK_SEC,
        }
    }
}

impl StageTimeouts {
    pub fn compute_params(&self) -> Duration {
        Duration::from_secs(self.compute_params_secs)
    }

    pub fn cluster_create(&self) -> Duration {
        Duration::from_secs(self.cluster_create_secs)
    }

    pub fn execute(&self) -> Duration {
        Duration::from_secs(self.execute_secs)
    }

    pub fn cleanup(&self) -> Duration {
        Duration::from_secs(self.cleanup_secs)
    }

    pub fn pipeline(&self) -> Duration {
        Duration::from_secs(self.pipeline_secs)
    }
}

/// Object storage input/output locations for one credential scope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageLocation {
    pub input_folder: String,
    pub output_folder: String,
}

impl StorageLocation {
    pub fn validate(&self) -> Result<()> {
        if self.input_folder.is_empty() || self.output_folder.is_empty() {
            return Err(DocqError::Configuration(
                "storage input/output folders cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Reference to a credential secret, with an optional env namespace prefix
/// so the primary and auxiliary scopes never collide.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecretRef {
    pub secret_name: String,
    #[serde(default)]
    pub env_prefix: Option<String>,
}

impl SecretRef {
    pub fn validate(&self) -> Result<()> {
        if self.secret_name.is_empty() {
            return Err(DocqError::Configuration(
                "credential secret name cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Transform-specific parameters shipped to every worker
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformOptions {
    /// Language of the corpus; decides the active feature column set.
    #[serde(default)]
    pub language: LanguageTag,
    /// Drop pre-existing feature columns instead of failing the batch.
    #[serde(default = "default_true")]
    pub drop_column_if_existed: bool,
    /// Column holding the document text.
    #[serde(default = "default_text_column")]
    pub text_column: String,
    /// Column the remote job writes its denylist annotation into.
    #[serde(default = "default_annotation_column")]
    pub annotation_column: String,
    /// Column carrying the document source URL, for audit joins downstream.
    #[serde(default = "default_source_url_column")]
    pub source_url_column: String,
    /// Storage path of the denylisted-vocabulary resource.
    pub denylist_path: String,
}

fn default_true() -> bool {
    true
}

fn default_text_column() -> String {
    "text".to_string()
}

fn default_annotation_column() -> String {
    "blocklisted".to_string()
}

fn default_source_url_column() -> String {
    "title".to_string()
}

impl TransformOptions {
    pub fn validate(&self) -> Result<()> {
        if self.text_column.is_empty() {
            return Err(DocqError::Configuration(
                "text column name cannot be empty".to_string(),
            ));
        }
        if self.annotation_column.is_empty() {
            return Err(DocqError::Configuration(
                "annotation column name cannot be empty".to_string(),
            ));
        }
        if self.denylist_path.is_empty() {
            return Err(DocqError::Configuration(
                "denylist path cannot be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Flat metadata view for the audit sidecar.
    pub fn metadata(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            ("language".to_string(), self.language.to_string()),
            (
                "drop_column_if_existed".to_string(),
                self.drop_column_if_existed.to_string(),
            ),
            ("text_column".to_string(), self.text_column.clone()),
            (
                "annotation_column".to_string(),
                self.annotation_column.clone(),
            ),
            (
                "source_url_column".to_string(),
                self.source_url_column.clone(),
            ),
            ("denylist_path".to_string(), self.denylist_path.clone()),
        ])
    }
}

/// Immutable configuration for one pipeline run
///
/// Constructed once at pipeline start and read-only thereafter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobConfig {
    pub cluster_name: String,
    #[serde(default)]
    pub run_id: RunId,
    pub api_endpoint: String,
    pub head: HeadNodeOptions,
    pub workers: WorkerPoolOptions,
    #[serde(default)]
    pub actor: ActorOptions,
    #[serde(default)]
    pub waits: WaitOptions,
    #[serde(default)]
    pub timeouts: StageTimeouts,
    pub storage: StorageLocation,
    pub storage_secret: SecretRef,
    #[serde(default)]
    pub reference_storage: Option<StorageLocation>,
    #[serde(default)]
    pub reference_storage_secret: Option<SecretRef>,
    /// Maximum number of input partitions to process; -1 means all.
    #[serde(default = "default_max_files")]
    pub max_files: i64,
    pub pipeline_id: String,
    pub transform: TransformOptions,
}

fn default_max_files() -> i64 {
    -1
}

impl JobConfig {
    pub fn validate(&self) -> Result<()> {
        if self.cluster_name.is_empty() {
            return Err(DocqError::Configuration(
                "cluster name cannot be empty".to_string(),
            ));
        }
        if self.api_endpoint.is_empty() {
            return Err(DocqError::Configuration(
                "api endpoint cannot be empty".to_string(),
            ));
        }
        self.head.validate()?;
        self.workers.validate()?;
        self.actor.validate()?;
        self.storage.validate()?;
        self.storage_secret.validate()?;
        if let Some(reference) = &self.reference_storage {
            reference.validate()?;
            match &self.reference_storage_secret {
                Some(secret) => secret.validate()?,
                None => {
                    return Err(DocqError::Configuration(
                        "reference storage configured without its credential secret".to_string(),
                    ))
                }
            }
        }
        self.transform.validate()?;
        Ok(())
    }

    /// Parse and validate a configuration document.
    pub fn from_json(raw: &str) -> Result<Self> {
        let config: JobConfig = serde_json::from_str(raw)
            .map_err(|e| DocqError::Configuration(format!("invalid job config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) fn sample_config() -> JobConfig {
        JobConfig {
            cluster_name: "docq-kfp-ray".to_string(),
            run_id: RunId::new(),
            api_endpoint: "http://apiserver.cluster.local:8888".to_string(),
            head: HeadNodeOptions {
                cpu_cores: 1.0,
                memory_gb: 4.0,
                image: "registry.local/docq:latest".to_string(),
                image_pull_secret: Some("registry-pull".to_string()),
            },
            workers: WorkerPoolOptions {
                replicas: 2,
                min_replicas: 2,
                max_replicas: 2,
                cpu_cores: 2.0,
                memory_gb: 4.0,
                image: "registry.local/docq:latest".to_string(),
                image_pull_secret: Some("registry-pull".to_string()),
            },
            actor: ActorOptions::default(),
            waits: WaitOptions::default(),
            timeouts: StageTimeouts::default(),
            storage: StorageLocation {
                input_folder: "corpus/input/dataset=text/".to_string(),
                output_folder: "corpus/output/docq/".to_string(),
            },
            storage_secret: SecretRef {
                secret_name: "cos-access".to_string(),
                env_prefix: None,
            },
            reference_storage: Some(StorageLocation {
                input_folder: "corpus/resources/".to_string(),
                output_folder: "corpus/resources/".to_string(),
            }),
            reference_storage_secret: Some(SecretRef {
                secret_name: "cos-access-aux".to_string(),
                env_prefix: Some("docq".to_string()),
            }),
            max_files: -1,
            pipeline_id: "docq-annotation".to_string(),
            transform: TransformOptions {
                language: LanguageTag::default(),
                drop_column_if_existed: true,
                text_column: "text".to_string(),
                annotation_column: "blocklisted".to_string(),
                source_url_column: "title".to_string(),
                denylist_path: "corpus/resources/ldnoobw/en".to_string(),
            },
        }
    }

    #[test]
    fn valid_config_passes_validation() {
        assert!(sample_config().validate().is_ok());
    }

    #[test]
    fn empty_cluster_name_is_rejected() {
        let mut config = sample_config();
        config.cluster_name = String::new();
        assert!(matches!(
            config.validate(),
            Err(DocqError::Configuration(_))
        ));
    }

    #[test]
    fn replicas_outside_bounds_are_rejected() {
        let mut config = sample_config();
        config.workers.replicas = 5;
        config.workers.max_replicas = 2;
        assert!(config.validate().is_err());
    }

    #[test]
    fn reference_storage_requires_its_own_secret() {
        let mut config = sample_config();
        config.reference_storage_secret = None;
        assert!(matches!(
            config.validate(),
            Err(DocqError::Configuration(_))
        ));
    }

    #[test]
    fn empty_annotation_column_is_rejected() {
        let mut config = sample_config();
        config.transform.annotation_column = String::new();
        assert!(matches!(
            config.validate(),
            Err(DocqError::Configuration(_))
        ));
    }

    #[test]
    fn transform_metadata_names_the_annotation_columns() {
        let meta = sample_config().transform.metadata();
        assert_eq!(meta.get("annotation_column").unwrap(), "blocklisted");
        assert_eq!(meta.get("source_url_column").unwrap(), "title");
    }

    #[test]
    fn from_json_rejects_malformed_payload() {
        let result = JobConfig::from_json("{\"cluster_name\": 42}");
        assert!(matches!(result, Err(DocqError::Configuration(_))));
    }

    #[test]
    fn wait_defaults_match_deployment_tunables() {
        let waits = WaitOptions::default();
        assert_eq!(waits.wait_interval_secs, 2);
        assert_eq!(waits.wait_cluster_ready_tmout_secs, 400);
        assert_eq!(waits.http_retries, 5);
    }
}
