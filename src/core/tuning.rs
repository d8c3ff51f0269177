//! End-to-end decoder weight tuning against a running node.
//!
//! Four stages, each announced and timed:
//! 1. tokenize the reference (target-language) documents
//! 2. merge sources and references into one file each
//! 3. run the external optimizer against the node's translation API
//! 4. parse the optimizer result and push the weights to the node
//!
//! The engine's temp space is cleared before the run and again on the way
//! out, success or failure, unless `debug` is set.

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use tracing::{info, instrument, warn};

use super::supervisor::ClusterNode;
use crate::adapters::{
    CommandTokenizer, ManagementApi, MertOptimizer, Optimizer, OptimizerJob, Tokenizer,
};
use crate::config::ToolsConfig;
use crate::domain::corpus::{merge_files, write_document_list};
use crate::domain::{Corpus, Engine, TuningResult};
use crate::error::NodeError;

/// Folder under the engine's data path holding development corpora
pub const DEV_FOLDER_NAME: &str = "dev";

const SCRATCH_NAME: &str = "tuning";
const OPTIMIZER_LOG: &str = "mert";
const STAGES: usize = 4;

/// Knobs for one tuning run
#[derive(Debug, Clone)]
pub struct TuningOptions {
    /// Development corpora; discovered under `<data>/dev` when `None`
    pub corpora: Option<Vec<Corpus>>,

    /// Keep the scratch directory for inspection
    pub debug: bool,

    /// Let the decoder analyse each document's context
    pub context_enabled: bool,

    /// Seed the optimizer randomly instead of predictably
    pub random_seeds: bool,

    /// Optimizer iteration cap; zero or negative disables it
    pub max_iterations: i32,

    /// Optimizer threads; defaults to the available parallelism
    pub threads: Option<usize>,
}

impl Default for TuningOptions {
    fn default() -> Self {
        Self {
            corpora: None,
            debug: false,
            context_enabled: true,
            random_seeds: false,
            max_iterations: 25,
            threads: None,
        }
    }
}

fn default_threads() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Scratch directory under the engine's temp root, cleared when dropped
/// unless kept for debugging
struct ScratchDir<'a> {
    engine: &'a Engine,
    path: PathBuf,
    keep: bool,
}

impl<'a> ScratchDir<'a> {
    fn create(engine: &'a Engine, keep: bool) -> Result<Self> {
        engine.clear_temp()?;
        let path = engine.temp_dir(SCRATCH_NAME)?;
        Ok(Self { engine, path, keep })
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchDir<'_> {
    fn drop(&mut self) {
        if self.keep {
            info!(path = %self.path.display(), "Keeping tuning directory");
            return;
        }
        if let Err(e) = self.engine.clear_temp() {
            warn!(path = %self.path.display(), error = %e, "Failed to clear temp directory");
        }
    }
}

/// Announces stages as "(i of n) name" and reports their duration
struct StageReporter {
    current: usize,
}

struct Stage {
    name: &'static str,
    started: Instant,
}

impl StageReporter {
    fn start(engine: &Engine, corpora: &[Corpus]) -> Self {
        let folder = corpora
            .first()
            .map(|c| c.folder().display().to_string())
            .unwrap_or_default();

        info!(
            engine = %engine.name,
            corpora = %folder,
            documents = corpora.len(),
            langs = %format!("{} > {}", engine.source_lang, engine.target_lang),
            "Tuning started"
        );

        Self { current: 0 }
    }

    fn stage(&mut self, name: &'static str) -> Stage {
        self.current += 1;
        info!("({} of {}) {}...", self.current, STAGES, name);
        Stage {
            name,
            started: Instant::now(),
        }
    }

    fn completed(&self, bleu: f64, api_port: u16) {
        info!(bleu = %format!("{:.2}", bleu * 100.0), "Tuning succeeded");
        info!(
            "You can try the API with: curl \"http://localhost:{}/translate?q=hello+world\"",
            api_port
        );
    }
}

impl Stage {
    fn done(self) {
        info!(
            stage = self.name,
            elapsed_secs = self.started.elapsed().as_secs(),
            "DONE"
        );
    }
}

/// Drives one tuning pass for a node
pub struct TuningOrchestrator<'a> {
    node: &'a ClusterNode,
    api: &'a dyn ManagementApi,
    tokenizer: Box<dyn Tokenizer + 'a>,
    optimizer: Box<dyn Optimizer + 'a>,
}

impl<'a> TuningOrchestrator<'a> {
    pub fn new(
        node: &'a ClusterNode,
        api: &'a dyn ManagementApi,
        tokenizer: impl Tokenizer + 'a,
        optimizer: impl Optimizer + 'a,
    ) -> Self {
        Self {
            node,
            api,
            tokenizer: Box::new(tokenizer),
            optimizer: Box::new(optimizer),
        }
    }

    /// Orchestrator using the node's own API and the configured tools
    pub fn with_tools(node: &'a ClusterNode, tools: &ToolsConfig) -> Self {
        Self::new(
            node,
            node.api(),
            CommandTokenizer::new(&tools.tokenizer),
            MertOptimizer::from_config(tools),
        )
    }

    fn resolve_corpora(&self, corpora: Option<Vec<Corpus>>) -> Result<Vec<Corpus>> {
        match corpora {
            Some(corpora) => Ok(corpora),
            None => {
                let engine = self.node.engine();
                Corpus::list(
                    &engine.data_path().join(DEV_FOLDER_NAME),
                    &engine.source_lang,
                    &engine.target_lang,
                )
            }
        }
    }

    /// Run the whole pipeline and apply the optimized weights
    #[instrument(skip(self, options), fields(engine = %self.node.engine().name))]
    pub async fn tune(&self, options: TuningOptions) -> Result<TuningResult> {
        let corpora = self.resolve_corpora(options.corpora.clone())?;
        if corpora.is_empty() {
            return Err(NodeError::illegal_argument("empty corpora").into());
        }

        if !self.node.is_running() {
            return Err(NodeError::illegal_state(
                "no node process running, start the engine first",
            )
            .into());
        }

        let engine = self.node.engine();
        let source_lang = engine.source_lang.as_str();
        let target_lang = engine.target_lang.as_str();

        let source_corpora: Vec<Corpus> = corpora.iter().map(|c| c.in_lang(source_lang)).collect();
        let reference_corpora: Vec<Corpus> =
            corpora.iter().map(|c| c.in_lang(target_lang)).collect();

        let mut reporter = StageReporter::start(engine, &corpora);
        let scratch = ScratchDir::create(engine, options.debug)?;
        let working_dir = scratch.path();

        let stage = reporter.stage("Corpora tokenization");
        let tokenized_dir = working_dir.join("reference_corpora");
        tokio::fs::create_dir_all(&tokenized_dir)
            .await
            .with_context(|| format!("Failed to create {}", tokenized_dir.display()))?;
        let reference_corpora = self
            .tokenizer
            .process_corpora(&reference_corpora, target_lang, &tokenized_dir)
            .await
            .context("Corpora tokenization failed")?;
        stage.done();

        let stage = reporter.stage("Merging corpus");
        let source_merged = working_dir.join(format!("corpus.{}", source_lang));
        let source_documents: Vec<PathBuf> =
            source_corpora.iter().map(|c| c.file(source_lang)).collect();
        write_document_list(&source_documents, &source_merged).await?;

        let target_merged = working_dir.join(format!("corpus.{}", target_lang));
        let reference_documents: Vec<PathBuf> =
            reference_corpora.iter().map(|c| c.file(target_lang)).collect();
        merge_files(&reference_documents, &target_merged).await?;
        stage.done();

        let stage = reporter.stage("Tuning");
        let job = OptimizerJob {
            source_corpus: source_merged,
            reference_corpus: target_merged,
            working_dir: working_dir.join("mert"),
            api_port: self.api.port(),
            context_enabled: options.context_enabled,
            threads: options.threads.unwrap_or_else(default_threads),
            max_iterations: options.max_iterations,
            random_seeds: options.random_seeds,
            log_file: engine.log_file(OPTIMIZER_LOG, true)?,
        };
        let result_file = self.optimizer.optimize(&job).await?;
        stage.done();

        let stage = reporter.stage("Applying changes");
        let result = TuningResult::from_file(&result_file).await?;
        self.api
            .update_features(&result.weights)
            .await
            .context("Failed to apply tuned weights")?;
        stage.done();

        reporter.completed(result.bleu_score, self.api.port());
        Ok(result)
    }
}
