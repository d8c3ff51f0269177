//! Bilingual document collections.
//!
//! A corpus named `news` in folder `dev/` with languages `en` and `it` is
//! the pair of files `dev/news.en` and `dev/news.it`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use glob::{glob, Pattern};
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;

/// A named document available in one or more languages
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Corpus {
    pub name: String,
    folder: PathBuf,
    pub langs: Vec<String>,
}

impl Corpus {
    /// Describe a corpus restricted to the given languages
    pub fn make_parallel(
        name: impl Into<String>,
        folder: impl Into<PathBuf>,
        langs: &[&str],
    ) -> Self {
        Self {
            name: name.into(),
            folder: folder.into(),
            langs: langs.iter().map(|l| l.to_string()).collect(),
        }
    }

    pub fn folder(&self) -> &Path {
        &self.folder
    }

    /// Path of the document in `lang`
    pub fn file(&self, lang: &str) -> PathBuf {
        self.folder.join(format!("{}.{}", self.name, lang))
    }

    /// Same corpus, restricted to a single language
    pub fn in_lang(&self, lang: &str) -> Self {
        Self::make_parallel(self.name.clone(), self.folder.clone(), &[lang])
    }

    /// Discover every corpus in `folder` that has both a `source` and a
    /// `target` document. Missing folders yield an empty list.
    pub fn list(folder: &Path, source: &str, target: &str) -> Result<Vec<Corpus>> {
        if !folder.is_dir() {
            return Ok(Vec::new());
        }

        // The folder itself is literal; only the file name is a pattern
        let pattern = format!("{}/*.*", Pattern::escape(&folder.to_string_lossy()));

        let mut langs_by_name: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for entry in glob(&pattern).context("Invalid corpus glob pattern")? {
            let path = entry.context("Failed to read corpus folder entry")?;
            if !path.is_file() {
                continue;
            }
            let (Some(stem), Some(ext)) = (path.file_stem(), path.extension()) else {
                continue;
            };
            langs_by_name
                .entry(stem.to_string_lossy().to_string())
                .or_default()
                .push(ext.to_string_lossy().to_string());
        }

        let corpora = langs_by_name
            .into_iter()
            .filter(|(_, langs)| {
                langs.iter().any(|l| l == source) && langs.iter().any(|l| l == target)
            })
            .map(|(name, _)| Corpus::make_parallel(name, folder, &[source, target]))
            .collect();

        Ok(corpora)
    }
}

/// Write one document path per line into `output`
pub async fn write_document_list(documents: &[PathBuf], output: &Path) -> Result<()> {
    let mut out = File::create(output)
        .await
        .with_context(|| format!("Failed to create {}", output.display()))?;

    for document in documents {
        out.write_all(format!("{}\n", document.display()).as_bytes())
            .await?;
    }
    out.flush().await?;

    Ok(())
}

/// Concatenate the contents of `inputs`, in order, into `output`
pub async fn merge_files(inputs: &[PathBuf], output: &Path) -> Result<()> {
    let mut out = File::create(output)
        .await
        .with_context(|| format!("Failed to create {}", output.display()))?;

    for input in inputs {
        let content = fs::read(input)
            .await
            .with_context(|| format!("Failed to read {}", input.display()))?;
        out.write_all(&content).await?;
    }
    out.flush().await?;

    Ok(())
}
