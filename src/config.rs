//! Configuration for the node supervisor.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variable (MTNODE_HOME)
//! 2. Config file (.mtnode/config.yaml)
//! 3. Defaults (~/.mtnode)
//!
//! Config file discovery:
//! - Searches current directory and parents for .mtnode/config.yaml
//! - Paths in config file are relative to the .mtnode/ directory

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Settings for one supervised node process
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// REST API port (default: 8045)
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Cluster membership port (default: 5016)
    #[serde(default = "default_cluster_port")]
    pub cluster_port: u16,

    /// Datastream port (default: 9092)
    #[serde(default = "default_datastream_port")]
    pub datastream_port: u16,

    /// Database port (default: 9042)
    #[serde(default = "default_db_port")]
    pub db_port: u16,

    /// Start the REST API alongside the node (default: true)
    #[serde(default = "default_rest")]
    pub rest: bool,

    /// Host of an existing cluster member to join
    #[serde(default)]
    pub sibling: Option<String>,

    /// Node log verbosity
    #[serde(default)]
    pub verbosity: Option<u8>,

    /// Node launcher executable
    #[serde(default = "default_executable")]
    pub executable: PathBuf,

    /// Status/liveness polling interval in milliseconds (default: 1000)
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Liveness checks after spawning before giving up (default: 5)
    #[serde(default = "default_start_attempts")]
    pub start_attempts: u32,

    /// Seconds between SIGTERM and SIGKILL on stop (default: 10)
    #[serde(default = "default_stop_grace_seconds")]
    pub stop_grace_seconds: u64,
}

fn default_api_port() -> u16 {
    8045
}
fn default_cluster_port() -> u16 {
    5016
}
fn default_datastream_port() -> u16 {
    9092
}
fn default_db_port() -> u16 {
    9042
}
fn default_rest() -> bool {
    true
}
fn default_executable() -> PathBuf {
    PathBuf::from("mmt-node")
}
fn default_poll_interval_ms() -> u64 {
    1000
}
fn default_start_attempts() -> u32 {
    5
}
fn default_stop_grace_seconds() -> u64 {
    10
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            api_port: default_api_port(),
            cluster_port: default_cluster_port(),
            datastream_port: default_datastream_port(),
            db_port: default_db_port(),
            rest: default_rest(),
            sibling: None,
            verbosity: None,
            executable: default_executable(),
            poll_interval_ms: default_poll_interval_ms(),
            start_attempts: default_start_attempts(),
            stop_grace_seconds: default_stop_grace_seconds(),
        }
    }
}

impl NodeConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn stop_grace(&self) -> Duration {
        Duration::from_secs(self.stop_grace_seconds)
    }
}

/// External tools used by the tuning pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Tokenizer executable, invoked as `<tokenizer> <lang>`
    #[serde(default = "default_tokenizer")]
    pub tokenizer: PathBuf,

    /// Optimizer driver script
    #[serde(default = "default_optimizer")]
    pub optimizer: PathBuf,

    /// Decoder interface the optimizer calls to translate
    #[serde(default = "default_decoder_interface")]
    pub decoder_interface: PathBuf,

    /// Directory holding the optimizer's native binaries
    #[serde(default = "default_optimizer_bin_dir")]
    pub optimizer_bin_dir: PathBuf,
}

fn default_tokenizer() -> PathBuf {
    PathBuf::from("mmt-tokenize")
}
fn default_optimizer() -> PathBuf {
    PathBuf::from("mert-moses.perl")
}
fn default_decoder_interface() -> PathBuf {
    PathBuf::from("mertinterface.py")
}
fn default_optimizer_bin_dir() -> PathBuf {
    PathBuf::from("/usr/local/bin")
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            tokenizer: default_tokenizer(),
            optimizer: default_optimizer(),
            decoder_interface: default_decoder_interface(),
            optimizer_bin_dir: default_optimizer_bin_dir(),
        }
    }
}

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    pub version: String,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub node: NodeConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathsConfig {
    /// Supervisor home directory (relative to .mtnode/)
    pub home: Option<String>,
    /// Engines directory (relative to .mtnode/)
    pub engines: Option<String>,
}

/// Resolved configuration with absolute paths
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// Supervisor home directory
    pub home: PathBuf,
    /// Directory containing one sub-directory per engine
    pub engines: PathBuf,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
    pub node: NodeConfig,
    pub tools: ToolsConfig,
}

/// Find config file by searching `start` and its parents
fn find_config_file(start: &Path) -> Option<PathBuf> {
    let mut current = start.to_path_buf();

    loop {
        let config_path = current.join(".mtnode").join("config.yaml");
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a path that may be relative to `base`
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
    }
}

/// Resolve configuration starting the config-file search at `start`
pub fn load_config_from(start: &Path) -> Result<ResolvedConfig> {
    let default_home = dirs::home_dir()
        .context("Failed to determine home directory")?
        .join(".mtnode");
    let env_home = std::env::var("MTNODE_HOME").ok().map(PathBuf::from);

    let config_file = find_config_file(start);

    let Some(ref config_path) = config_file else {
        let home = env_home.unwrap_or(default_home);
        return Ok(ResolvedConfig {
            engines: home.join("engines"),
            home,
            config_file: None,
            node: NodeConfig::default(),
            tools: ToolsConfig::default(),
        });
    };

    let config = load_config_file(config_path)?;
    let base_dir = config_path.parent().unwrap_or(Path::new("."));

    let home = match (env_home, config.paths.home.as_deref()) {
        (Some(home), _) => home,
        (None, Some(home)) => resolve_path(base_dir, home),
        (None, None) => default_home,
    };

    let engines = match config.paths.engines.as_deref() {
        Some(engines) => resolve_path(base_dir, engines),
        None => home.join("engines"),
    };

    Ok(ResolvedConfig {
        home,
        engines,
        config_file,
        node: config.node,
        tools: config.tools,
    })
}

/// Resolve configuration from the current directory
pub fn load_config() -> Result<ResolvedConfig> {
    let cwd = std::env::current_dir().context("Failed to determine current directory")?;
    load_config_from(&cwd)
}
