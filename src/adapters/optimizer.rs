//! Weight optimizer adapter.
//!
//! Runs the external iterative optimizer as a foreground batch process. The
//! optimizer translates the dev set through the node's API on every
//! iteration and leaves its best configuration in `<working_dir>/moses.ini`.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tempfile::NamedTempFile;
use tokio::process::Command;
use tracing::{info, warn};

use super::Optimizer;
use crate::config::ToolsConfig;
use crate::error::NodeError;

/// Size of the n-best list scored on every iteration
pub const NBEST_SIZE: u32 = 100;

/// Name of the result configuration inside the working directory
pub const RESULT_FILE: &str = "moses.ini";

/// Inputs of one optimizer run
#[derive(Debug, Clone)]
pub struct OptimizerJob {
    /// Merged source file (one document path per line)
    pub source_corpus: PathBuf,

    /// Merged, tokenized reference translations
    pub reference_corpus: PathBuf,

    /// Scratch directory owned by the optimizer
    pub working_dir: PathBuf,

    /// Port of the node's translation API
    pub api_port: u16,

    /// When false, the decoder skips context analysis
    pub context_enabled: bool,

    pub threads: usize,

    /// Iteration cap; zero or negative means unbounded
    pub max_iterations: i32,

    /// Use random instead of predictable seeds
    pub random_seeds: bool,

    /// Receives the optimizer's stdout and stderr
    pub log_file: PathBuf,
}

/// Optimizer driven through its perl front-end script
pub struct MertOptimizer {
    script: PathBuf,
    decoder_interface: PathBuf,
    bin_dir: PathBuf,
}

impl MertOptimizer {
    pub fn new(
        script: impl Into<PathBuf>,
        decoder_interface: impl Into<PathBuf>,
        bin_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            script: script.into(),
            decoder_interface: decoder_interface.into(),
            bin_dir: bin_dir.into(),
        }
    }

    pub fn from_config(tools: &ToolsConfig) -> Self {
        Self::new(
            &tools.optimizer,
            &tools.decoder_interface,
            &tools.optimizer_bin_dir,
        )
    }

    /// Command-line arguments for `job`, excluding the script itself
    pub fn build_args(&self, job: &OptimizerJob, runtime_config: &Path) -> Vec<OsString> {
        let mut decoder_flags = format!("--port {}", job.api_port);
        if !job.context_enabled {
            decoder_flags.push_str(" --skip-context-analysis 1");
        }

        let mut args: Vec<OsString> = vec![
            job.source_corpus.clone().into(),
            job.reference_corpus.clone().into(),
            self.decoder_interface.clone().into(),
            runtime_config.into(),
            "--threads".into(),
            job.threads.to_string().into(),
            "--mertdir".into(),
            self.bin_dir.clone().into(),
            "--mertargs".into(),
            "--binary --sctype BLEU".into(),
            "--working-dir".into(),
            job.working_dir.clone().into(),
            "--nbest".into(),
            NBEST_SIZE.to_string().into(),
            "--decoder-flags".into(),
            decoder_flags.into(),
            "--nonorm".into(),
            "--closest".into(),
            "--no-filter-phrase-table".into(),
        ];

        if !job.random_seeds {
            args.push("--predictable-seeds".into());
        }
        if job.max_iterations > 0 {
            args.push(format!("--maximum-iterations={}", job.max_iterations).into());
        }

        args
    }
}

#[async_trait]
impl Optimizer for MertOptimizer {
    async fn optimize(&self, job: &OptimizerJob) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&job.working_dir)
            .await
            .with_context(|| {
                format!("Failed to create optimizer directory: {}", job.working_dir.display())
            })?;

        // Throwaway decoder config the optimizer rewrites between iterations
        let runtime_config = NamedTempFile::new().context("Failed to create runtime config")?;

        let log = std::fs::File::create(&job.log_file)
            .with_context(|| format!("Failed to create {}", job.log_file.display()))?;
        let log_err = log.try_clone().context("Failed to clone log handle")?;

        info!(
            threads = job.threads,
            max_iterations = job.max_iterations,
            log = %job.log_file.display(),
            "Running optimizer"
        );

        let status = Command::new(&self.script)
            .args(self.build_args(job, runtime_config.path()))
            .stdin(Stdio::null())
            .stdout(Stdio::from(log))
            .stderr(Stdio::from(log_err))
            .status()
            .await
            .with_context(|| format!("Failed to run optimizer {}", self.script.display()))?;

        if !status.success() {
            let code = status.code().unwrap_or(-1);
            warn!(code, "Optimizer exited unsuccessfully");
            return Err(NodeError::ToolFailed {
                tool: "optimizer".to_string(),
                code,
                log_file: job.log_file.clone(),
            }
            .into());
        }

        Ok(job.working_dir.join(RESULT_FILE))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job() -> OptimizerJob {
        OptimizerJob {
            source_corpus: PathBuf::from("/tmp/t/corpus.en"),
            reference_corpus: PathBuf::from("/tmp/t/corpus.it"),
            working_dir: PathBuf::from("/tmp/t/mert"),
            api_port: 8045,
            context_enabled: true,
            threads: 8,
            max_iterations: 25,
            random_seeds: false,
            log_file: PathBuf::from("/tmp/logs/mert.log"),
        }
    }

    fn optimizer() -> MertOptimizer {
        MertOptimizer::new("/opt/mert-moses.perl", "/opt/mertinterface.py", "/opt/bin")
    }

    fn strings(args: Vec<OsString>) -> Vec<String> {
        args.into_iter()
            .map(|a| a.to_string_lossy().to_string())
            .collect()
    }

    #[test]
    fn test_default_arguments() {
        let args = strings(optimizer().build_args(&job(), Path::new("/tmp/runtime.ini")));

        assert_eq!(
            &args[..4],
            &[
                "/tmp/t/corpus.en",
                "/tmp/t/corpus.it",
                "/opt/mertinterface.py",
                "/tmp/runtime.ini"
            ]
        );
        let flags = args.iter().position(|a| a == "--decoder-flags").unwrap();
        assert_eq!(args[flags + 1], "--port 8045");
        let nbest = args.iter().position(|a| a == "--nbest").unwrap();
        assert_eq!(args[nbest + 1], "100");
        assert!(args.contains(&"--predictable-seeds".to_string()));
        assert!(args.contains(&"--maximum-iterations=25".to_string()));
        assert!(args.contains(&"--no-filter-phrase-table".to_string()));
    }

    #[test]
    fn test_optional_flags() {
        let job = OptimizerJob {
            context_enabled: false,
            random_seeds: true,
            max_iterations: 0,
            ..job()
        };
        let args = strings(optimizer().build_args(&job, Path::new("/tmp/runtime.ini")));

        let flags = args.iter().position(|a| a == "--decoder-flags").unwrap();
        assert_eq!(args[flags + 1], "--port 8045 --skip-context-analysis 1");
        assert!(!args.contains(&"--predictable-seeds".to_string()));
        assert!(!args.iter().any(|a| a.starts_with("--maximum-iterations")));
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_fatal() {
        let temp = tempfile::TempDir::new().unwrap();
        let job = OptimizerJob {
            working_dir: temp.path().join("mert"),
            log_file: temp.path().join("mert.log"),
            ..job()
        };

        let err = MertOptimizer::new("/bin/false", "x", "y")
            .optimize(&job)
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<NodeError>(),
            Some(NodeError::ToolFailed { code: 1, .. })
        ));
    }
}
