//! Domain types for the node supervisor.
//!
//! This module contains the core data structures:
//! - Engine: static engine descriptor and its directory layout
//! - Status: lifecycle status order and the status-file decoder
//! - Corpus: bilingual documents used for tuning
//! - Tuning: optimizer result parsing
//! - Memory: translation domains, import jobs, context vectors

pub mod corpus;
pub mod engine;
pub mod memory;
pub mod status;
pub mod tuning;

// Re-export commonly used types
pub use corpus::Corpus;
pub use engine::{Engine, EngineConfig};
pub use memory::{encode_context, ContextScore, Domain, DomainRef, ImportJob};
pub use status::{NodeState, NodeStatus};
pub use tuning::TuningResult;
