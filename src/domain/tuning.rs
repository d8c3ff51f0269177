//! Outcome of a weight-tuning run.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::NodeError;

const BLEU_MARKER: &str = "# BLEU";
const WEIGHT_SECTION: &str = "[weight]";

/// Final BLEU score and the optimized decoder weights
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TuningResult {
    pub bleu_score: f64,
    pub weights: BTreeMap<String, Vec<f64>>,
}

impl TuningResult {
    /// Parse the optimizer's resulting decoder configuration.
    ///
    /// `# BLEU <n> <score>` carries the score; every non-blank line after
    /// the `[weight]` header is a `name= w1 w2 ...` record.
    pub fn parse(content: &str) -> Result<Self> {
        let mut result = TuningResult::default();
        let mut in_weights = false;

        for line in content.lines().map(str::trim) {
            if line.is_empty() {
                continue;
            }

            if in_weights {
                let mut tokens = line.split_whitespace();
                let name = tokens
                    .next()
                    .map(|t| t.trim_end_matches('='))
                    .unwrap_or_default();
                let values = tokens
                    .map(|t| {
                        t.parse::<f64>().map_err(|_| {
                            NodeError::MalformedResult(format!(
                                "invalid weight '{}' for feature '{}'",
                                t, name
                            ))
                        })
                    })
                    .collect::<Result<Vec<f64>, _>>()?;
                result.weights.insert(name.to_string(), values);
            } else if line.starts_with(BLEU_MARKER) {
                let score = line.split_whitespace().nth(2).ok_or_else(|| {
                    NodeError::MalformedResult(format!("BLEU line without score: {}", line))
                })?;
                result.bleu_score = score.parse().map_err(|_| {
                    NodeError::MalformedResult(format!("invalid BLEU score: {}", score))
                })?;
            } else if line == WEIGHT_SECTION {
                in_weights = true;
            }
        }

        Ok(result)
    }

    /// Read and parse a result file
    pub async fn from_file(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read optimizer result: {}", path.display()))?;

        Self::parse(&content)
    }
}
