//! Static description of a configured translation engine.
//!
//! An engine lives in its own directory:
//!
//! ```text
//! <engines>/<name>/engine.yaml
//! <engines>/<name>/data/          models and dev corpora
//! <engines>/<name>/runtime/       pid file, status file
//! <engines>/<name>/runtime/logs/
//! <engines>/<name>/runtime/tmp/   scratch space, cleared after tuning
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Contents of `engine.yaml`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub source_lang: String,
    pub target_lang: String,

    /// Path prefix of the REST API (e.g. `/api`), if the node serves one
    #[serde(default)]
    pub api_root: Option<String>,
}

/// A configured translation engine. Read-only for the whole session.
#[derive(Debug, Clone)]
pub struct Engine {
    pub name: String,
    pub source_lang: String,
    pub target_lang: String,
    pub config: EngineConfig,
    root: PathBuf,
}

impl Engine {
    /// Describe an engine rooted at `root`
    pub fn new(name: impl Into<String>, root: impl Into<PathBuf>, config: EngineConfig) -> Self {
        Self {
            name: name.into(),
            source_lang: config.source_lang.clone(),
            target_lang: config.target_lang.clone(),
            config,
            root: root.into(),
        }
    }

    /// Load `<engines_dir>/<name>/engine.yaml`
    pub fn load(engines_dir: &Path, name: &str) -> Result<Self> {
        let root = engines_dir.join(name);
        let path = root.join("engine.yaml");

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read engine config: {}", path.display()))?;
        let config: EngineConfig = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse engine config: {}", path.display()))?;

        Ok(Self::new(name, root, config))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn data_path(&self) -> PathBuf {
        self.root.join("data")
    }

    pub fn runtime_path(&self) -> PathBuf {
        self.root.join("runtime")
    }

    pub fn logs_path(&self) -> PathBuf {
        self.runtime_path().join("logs")
    }

    /// Path of `<logs>/<name>.log`, creating the logs directory if `ensure`
    pub fn log_file(&self, name: &str, ensure: bool) -> Result<PathBuf> {
        let logs = self.logs_path();
        if ensure {
            std::fs::create_dir_all(&logs)
                .with_context(|| format!("Failed to create logs directory: {}", logs.display()))?;
        }
        Ok(logs.join(format!("{}.log", name)))
    }

    pub fn temp_root(&self) -> PathBuf {
        self.runtime_path().join("tmp")
    }

    /// Create (if needed) and return a named scratch directory
    pub fn temp_dir(&self, name: &str) -> Result<PathBuf> {
        let dir = self.temp_root().join(name);
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create temp directory: {}", dir.display()))?;
        Ok(dir)
    }

    /// Remove every scratch directory of this engine
    pub fn clear_temp(&self) -> Result<()> {
        let root = self.temp_root();
        if root.exists() {
            std::fs::remove_dir_all(&root)
                .with_context(|| format!("Failed to remove temp directory: {}", root.display()))?;
        }
        Ok(())
    }
}
