//! mtnode - supervisor for a translation-engine cluster node
//!
//! Starts and stops the node's backing process, exposes its lifecycle as an
//! ordered state machine callers can wait on, tunes the node's decoder
//! weights against a development corpus, and tracks domain imports.
//!
//! # Architecture
//!
//! The node process is a black box observed through two files:
//! - `runtime/node.pid`: written by the supervisor, the liveness token
//! - `runtime/node.status`: written by the node, its lifecycle status
//!
//! Everything else goes through the node's HTTP management API.
//!
//! # Modules
//!
//! - `adapters`: External systems (management API, tokenizer, optimizer)
//! - `core`: Supervision and orchestration (ClusterNode, tuning, imports)
//! - `domain`: Data structures (Engine, NodeStatus, Corpus, TuningResult)
//! - `config`: Node defaults and config-file resolution
//! - `error`: Classified failures
//!
//! # Usage
//!
//! ```rust,ignore
//! let config = mtnode::config::load_config()?;
//! let engine = Engine::load(&config.engines, "default")?;
//! let node = ClusterNode::new(engine, config.node.clone())?;
//!
//! node.start().await?;
//! node.wait(NodeStatus::Ready).await?;
//! let result = node.tune(&config.tools, TuningOptions::default()).await?;
//! ```

pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod error;

// Re-export main types at crate root for convenience
pub use adapters::{ApiClient, ManagementApi};
pub use config::{NodeConfig, ToolsConfig};
pub use self::core::{ClusterNode, DomainJobs, TuningOptions, TuningOrchestrator};
pub use domain::{
    ContextScore, Corpus, Domain, Engine, EngineConfig, ImportJob, NodeState, NodeStatus,
    TuningResult,
};
pub use error::NodeError;
