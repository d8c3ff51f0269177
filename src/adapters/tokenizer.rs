//! Tokenizer adapter.
//!
//! Shells out to an external tokenizer that reads plain text on stdin and
//! writes tokenized text on stdout: `<tokenizer> <lang> < in > out`.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use super::Tokenizer;
use crate::domain::Corpus;

/// Tokenizer backed by an external executable
pub struct CommandTokenizer {
    binary_path: PathBuf,
}

impl CommandTokenizer {
    pub fn new(binary_path: impl Into<PathBuf>) -> Self {
        Self {
            binary_path: binary_path.into(),
        }
    }

    async fn tokenize_file(&self, lang: &str, input: &Path, output: &Path) -> Result<()> {
        let stdin = std::fs::File::open(input)
            .with_context(|| format!("Failed to open {}", input.display()))?;
        let stdout = std::fs::File::create(output)
            .with_context(|| format!("Failed to create {}", output.display()))?;

        let child = Command::new(&self.binary_path)
            .arg(lang)
            .stdin(Stdio::from(stdin))
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| {
                format!("Failed to spawn tokenizer {}", self.binary_path.display())
            })?;

        let result = child
            .wait_with_output()
            .await
            .context("Failed to wait for tokenizer")?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            anyhow::bail!(
                "Tokenizer failed on {} with exit code {}: {}",
                input.display(),
                result.status.code().unwrap_or(-1),
                stderr.trim()
            );
        }

        Ok(())
    }
}

#[async_trait]
impl Tokenizer for CommandTokenizer {
    async fn process_corpora(
        &self,
        corpora: &[Corpus],
        lang: &str,
        output_dir: &Path,
    ) -> Result<Vec<Corpus>> {
        let mut tokenized = Vec::with_capacity(corpora.len());

        for corpus in corpora {
            let output = Corpus::make_parallel(corpus.name.clone(), output_dir, &[lang]);
            debug!(corpus = %corpus.name, lang, "Tokenizing");

            self.tokenize_file(lang, &corpus.file(lang), &output.file(lang))
                .await?;
            tokenized.push(output);
        }

        Ok(tokenized)
    }
}
