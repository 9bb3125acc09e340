//! Docq Core - Shared Domain Types
//!
//! This crate contains the typed job configuration schema, run identifiers,
//! execution parameter planning, and the error taxonomy shared by the
//! cluster, transform, and pipeline crates.

pub mod config;
pub mod error;
pub mod params;

pub use crate::config::{
    ActorOptions, HeadNodeOptions, JobConfig, LanguageTag, SecretRef, StageTimeouts,
    StorageLocation, TransformOptions, WaitOptions, WorkerPoolOptions,
};
pub use crate::error::{DocqError, Result};
pub use crate::params::{compute_execution_params, ExecutionParameters};

pub use chrono::{DateTime, Utc};
pub use uuid::Uuid;

use serde::{Deserialize, Serialize};

/// Identifier binding a pipeline run to its ephemeral cluster and job names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(pub Uuid);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for RunId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
