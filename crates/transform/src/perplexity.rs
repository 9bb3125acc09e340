//! Perplexity scoring model
//!
//! The language-model scorer is an external collaborator behind a trait.
//! A model handle is loaded once per engine instance and reused across
//! all records that instance scores; handles are never shared between
//! worker instances.

use docq_core::{DocqError, Result};
use std::collections::HashMap;
use std::path::Path;

/// Per-record perplexity scorer. Loaded before any batch is processed;
/// scoring itself is infallible once the handle exists.
pub trait PerplexityModel: Send {
    fn perplexity(&self, text: &str) -> f64;
}

/// Unigram log-probability table backed by a whitespace-delimited
/// `token log10_prob` resource file.
#[derive(Debug, Clone)]
pub struct UnigramPerplexityModel {
    log_probs: HashMap<String, f64>,
    unknown_log_prob: f64,
}

impl UnigramPerplexityModel {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            DocqError::ScoringModelInit(format!(
                "cannot read model table {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::parse(&raw)
    }

    pub fn parse(raw: &str) -> Result<Self> {
        let mut log_probs = HashMap::new();
        let mut unknown_log_prob = f64::NEG_INFINITY;
        for (line_no, line) in raw.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (token, value) = line.split_once(char::is_whitespace).ok_or_else(|| {
                DocqError::ScoringModelInit(format!(
                    "model table line {} is not `token log_prob`",
                    line_no + 1
                ))
            })?;
            let log_prob: f64 = value.trim().parse().map_err(|e| {
                DocqError::ScoringModelInit(format!(
                    "model table line {}: bad log probability: {}",
                    line_no + 1,
                    e
                ))
            })?;
            unknown_log_prob = unknown_log_prob.min(log_prob);
            log_probs.insert(token.to_lowercase(), log_prob);
        }
        if log_probs.is_empty() {
            return Err(DocqError::ScoringModelInit(
                "model table contains no entries".to_string(),
            ));
        }
        Ok(Self {
            log_probs,
            unknown_log_prob,
        })
    }
}

impl PerplexityModel for UnigramPerplexityModel {
    fn perplexity(&self, text: &str) -> f64 {
        let tokens: Vec<String> = text
            .split_whitespace()
            .map(|t| t.to_lowercase())
            .collect();
        if tokens.is_empty() {
            return 0.0;
        }
        let total: f64 = tokens
            .iter()
            .map(|t| {
                self.log_probs
                    .get(t)
                    .copied()
                    .unwrap_or(self.unknown_log_prob)
            })
            .sum();
        10f64.powf(-total / tokens.len() as f64)
    }
}
