//! Pipeline orchestration for document quality annotation runs
//!
//! Features:
//! - Stage sequencing: plan execution parameters, provision the cluster,
//!   dispatch the annotation job
//! - Scoped cluster acquisition with a cleanup guarantee on every exit
//!   path, including cancellation
//! - Pipeline-wide and per-stage time bounds
//! - Flat metadata sidecar for downstream audit

pub mod orchestrator;

pub use orchestrator::{PipelineOrchestrator, PipelineReport};
