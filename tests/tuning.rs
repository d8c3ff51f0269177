//! Tuning Integration Tests
//!
//! Runs the tuning pipeline against a live fake node, with the tokenizer,
//! optimizer and management API replaced by in-process fakes.

mod common;

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use common::{fake_node_script, test_node, FakeApi, Tail};
use mtnode::adapters::{Optimizer, OptimizerJob, Tokenizer};
use mtnode::core::DEV_FOLDER_NAME;
use mtnode::{ClusterNode, Corpus, NodeError, TuningOptions, TuningOrchestrator};
use tempfile::TempDir;

/// Upper-cases documents instead of tokenizing them
#[derive(Clone, Default)]
struct FakeTokenizer {
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl Tokenizer for FakeTokenizer {
    async fn process_corpora(
        &self,
        corpora: &[Corpus],
        lang: &str,
        output_dir: &Path,
    ) -> Result<Vec<Corpus>> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let mut out = Vec::new();
        for corpus in corpora {
            let content = std::fs::read_to_string(corpus.file(lang))?;
            let tokenized = Corpus::make_parallel(corpus.name.clone(), output_dir, &[lang]);
            std::fs::write(tokenized.file(lang), content.to_uppercase())?;
            out.push(tokenized);
        }
        Ok(out)
    }
}

/// What the optimizer saw while the scratch directory still existed
#[derive(Debug, Clone)]
struct Seen {
    job: OptimizerJob,
    source_merged: String,
    target_merged: String,
}

#[derive(Clone)]
struct FakeOptimizer {
    result: Option<&'static str>,
    seen: Arc<Mutex<Option<Seen>>>,
}

impl FakeOptimizer {
    fn producing(result: &'static str) -> Self {
        Self {
            result: Some(result),
            seen: Arc::default(),
        }
    }

    fn failing() -> Self {
        Self {
            result: None,
            seen: Arc::default(),
        }
    }
}

#[async_trait]
impl Optimizer for FakeOptimizer {
    async fn optimize(&self, job: &OptimizerJob) -> Result<PathBuf> {
        *self.seen.lock().unwrap() = Some(Seen {
            job: job.clone(),
            source_merged: std::fs::read_to_string(&job.source_corpus)?,
            target_merged: std::fs::read_to_string(&job.reference_corpus)?,
        });

        let Some(result) = self.result else {
            return Err(NodeError::ToolFailed {
                tool: "optimizer".to_string(),
                code: 2,
                log_file: job.log_file.clone(),
            }
            .into());
        };

        std::fs::create_dir_all(&job.working_dir)?;
        let path = job.working_dir.join("moses.ini");
        std::fs::write(&path, result)?;
        Ok(path)
    }
}

const RESULT: &str = "\
# BLEU 4 0.3125
[weight]
LM= 0.1 0.2 0.3
WordPenalty0= -1
";

fn write_dev_corpora(node: &ClusterNode) -> PathBuf {
    let dev = node.engine().data_path().join(DEV_FOLDER_NAME);
    std::fs::create_dir_all(&dev).unwrap();
    std::fs::write(dev.join("a.en"), "hello world\n").unwrap();
    std::fs::write(dev.join("a.it"), "ciao mondo\n").unwrap();
    std::fs::write(dev.join("b.en"), "good night\n").unwrap();
    std::fs::write(dev.join("b.it"), "buona notte\n").unwrap();
    dev
}

async fn running_node(temp: &TempDir) -> ClusterNode {
    let script = fake_node_script(temp.path(), &["READY"], 0.1, Tail::Linger);
    let node = test_node(temp.path(), script);
    node.start().await.unwrap();
    node
}

#[tokio::test]
async fn test_tuning_pipeline_applies_weights() {
    let temp = TempDir::new().unwrap();
    let node = running_node(&temp).await;
    let dev = write_dev_corpora(&node);

    let api = FakeApi::default();
    let tokenizer = FakeTokenizer::default();
    let optimizer = FakeOptimizer::producing(RESULT);

    let result = TuningOrchestrator::new(&node, &api, tokenizer.clone(), optimizer.clone())
        .tune(TuningOptions {
            threads: Some(3),
            ..Default::default()
        })
        .await
        .unwrap();

    assert_eq!(result.bleu_score, 0.3125);
    assert_eq!(result.weights["LM"], vec![0.1, 0.2, 0.3]);
    assert_eq!(result.weights["WordPenalty0"], vec![-1.0]);

    // Weights were pushed to the node exactly once
    let pushed = api.features.lock().unwrap();
    assert_eq!(pushed.len(), 1);
    assert_eq!(pushed[0], result.weights);

    assert_eq!(tokenizer.calls.load(Ordering::SeqCst), 1);

    let seen = optimizer.seen.lock().unwrap().clone().unwrap();
    assert_eq!(seen.job.api_port, 8045);
    assert_eq!(seen.job.threads, 3);
    assert_eq!(seen.job.max_iterations, 25);
    assert!(seen.job.context_enabled);
    assert!(!seen.job.random_seeds);
    assert!(seen.job.log_file.ends_with("runtime/logs/mert.log"));

    // Sources are listed by path, references are tokenized and concatenated
    assert_eq!(
        seen.source_merged,
        format!(
            "{}\n{}\n",
            dev.join("a.en").display(),
            dev.join("b.en").display()
        )
    );
    assert_eq!(seen.target_merged, "CIAO MONDO\nBUONA NOTTE\n");

    // Scratch space is gone
    assert!(!seen.job.working_dir.exists());
    assert!(!node.engine().temp_root().join("tuning").exists());

    node.stop().await.unwrap();
}

#[tokio::test]
async fn test_tuning_clears_engine_temp_space() {
    let temp = TempDir::new().unwrap();
    let node = running_node(&temp).await;
    write_dev_corpora(&node);

    let leftover = node.engine().temp_root().join("previous-run");
    std::fs::create_dir_all(&leftover).unwrap();
    std::fs::write(leftover.join("partial.txt"), "x").unwrap();

    let api = FakeApi::default();
    TuningOrchestrator::new(
        &node,
        &api,
        FakeTokenizer::default(),
        FakeOptimizer::producing(RESULT),
    )
    .tune(TuningOptions::default())
    .await
    .unwrap();

    assert!(!node.engine().temp_root().exists());

    node.stop().await.unwrap();
}

#[tokio::test]
async fn test_failed_optimizer_aborts_and_cleans_up() {
    let temp = TempDir::new().unwrap();
    let node = running_node(&temp).await;
    write_dev_corpora(&node);

    let api = FakeApi::default();
    let optimizer = FakeOptimizer::failing();

    let err = TuningOrchestrator::new(&node, &api, FakeTokenizer::default(), optimizer.clone())
        .tune(TuningOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<NodeError>(),
        Some(NodeError::ToolFailed { code: 2, .. })
    ));
    assert!(api.features.lock().unwrap().is_empty());
    assert!(!node.engine().temp_root().exists());

    node.stop().await.unwrap();
}

#[tokio::test]
async fn test_debug_keeps_scratch_directory() {
    let temp = TempDir::new().unwrap();
    let node = running_node(&temp).await;
    write_dev_corpora(&node);

    let api = FakeApi::default();
    TuningOrchestrator::new(
        &node,
        &api,
        FakeTokenizer::default(),
        FakeOptimizer::producing(RESULT),
    )
    .tune(TuningOptions {
        debug: true,
        context_enabled: false,
        max_iterations: 0,
        ..Default::default()
    })
    .await
    .unwrap();

    let scratch = node.engine().temp_root().join("tuning");
    assert!(scratch.join("mert").join("moses.ini").exists());
    assert!(scratch.join("corpus.en").exists());
    assert!(scratch.join("reference_corpora").join("a.it").exists());

    node.stop().await.unwrap();
}

#[tokio::test]
async fn test_empty_corpora_rejected_before_any_tool_runs() {
    let temp = TempDir::new().unwrap();
    let node = test_node(temp.path(), PathBuf::from("/nonexistent"));

    let api = FakeApi::default();
    let tokenizer = FakeTokenizer::default();
    let optimizer = FakeOptimizer::producing(RESULT);

    let err = TuningOrchestrator::new(&node, &api, tokenizer.clone(), optimizer.clone())
        .tune(TuningOptions {
            corpora: Some(Vec::new()),
            ..Default::default()
        })
        .await
        .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<NodeError>(),
        Some(NodeError::IllegalArgument(_))
    ));
    assert_eq!(tokenizer.calls.load(Ordering::SeqCst), 0);
    assert!(optimizer.seen.lock().unwrap().is_none());

    // No dev folder at all behaves the same
    let err = TuningOrchestrator::new(&node, &api, tokenizer.clone(), optimizer)
        .tune(TuningOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<NodeError>(),
        Some(NodeError::IllegalArgument(_))
    ));
}

#[tokio::test]
async fn test_tuning_requires_running_node() {
    let temp = TempDir::new().unwrap();
    let node = test_node(temp.path(), PathBuf::from("/nonexistent"));
    write_dev_corpora(&node);

    let api = FakeApi::default();
    let tokenizer = FakeTokenizer::default();

    let err = TuningOrchestrator::new(&node, &api, tokenizer.clone(), FakeOptimizer::producing(RESULT))
        .tune(TuningOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<NodeError>(),
        Some(NodeError::IllegalState(_))
    ));
    assert_eq!(tokenizer.calls.load(Ordering::SeqCst), 0);
}
