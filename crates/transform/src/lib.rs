//! Partition transform engine for document quality annotation
//!
//! Features:
//! - Deterministic feature column set derived from the language tag
//! - Pure per-record scoring functions (word stats, sentence counts,
//!   pattern ratios, denylist flags, perplexity)
//! - Columnar batch transform over Arrow record batches with a
//!   column-collision policy

pub mod columns;
pub mod engine;
pub mod perplexity;
pub mod scoring;

pub use columns::{feature_columns, FeatureColumn};
pub use engine::PartitionTransformEngine;
pub use perplexity::{PerplexityModel, UnigramPerplexityModel};
