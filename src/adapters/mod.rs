//! Adapter interfaces for external systems.
//!
//! Adapters wrap everything the supervisor talks to but does not own: the
//! node's management API, the tokenizer and the weight optimizer. The
//! orchestration code only sees the traits below, so it can be driven by
//! fakes in tests.

pub mod api;
pub mod optimizer;
pub mod tokenizer;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

use crate::domain::{Corpus, Domain, ImportJob};

pub use api::ApiClient;
pub use optimizer::{MertOptimizer, OptimizerJob};
pub use tokenizer::CommandTokenizer;

/// Management operations the orchestration layer needs from a node
#[async_trait]
pub trait ManagementApi: Send + Sync {
    /// Port the node's API listens on
    fn port(&self) -> u16;

    /// Replace the decoder weights
    async fn update_features(&self, features: &BTreeMap<String, Vec<f64>>) -> Result<Option<Value>>;

    async fn create_domain(&self, name: &str) -> Result<Domain>;

    /// Append one parallel sentence pair to a domain
    async fn append_to_domain(&self, domain: i64, source: &str, target: &str) -> Result<Option<Value>>;

    /// Start importing a TMX file into a domain
    async fn import_into_domain(&self, domain: i64, tmx: &Path) -> Result<ImportJob>;

    async fn get_import_job(&self, id: i64) -> Result<ImportJob>;

    async fn get_all_domains(&self) -> Result<Vec<Domain>>;
}

/// Text tokenizer run as an external transform
#[async_trait]
pub trait Tokenizer: Send + Sync {
    /// Tokenize the `lang` document of every corpus into `output_dir`,
    /// returning the tokenized corpora in input order
    async fn process_corpora(
        &self,
        corpora: &[Corpus],
        lang: &str,
        output_dir: &Path,
    ) -> Result<Vec<Corpus>>;
}

/// Iterative weight optimizer run as a batch job
#[async_trait]
pub trait Optimizer: Send + Sync {
    /// Run to completion and return the path of the result configuration
    async fn optimize(&self, job: &OptimizerJob) -> Result<PathBuf>;
}
