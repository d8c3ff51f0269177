//! Translation domains, import jobs and context vectors.

use serde::{Deserialize, Serialize};

/// A named collection of translation memory on the node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Domain {
    pub id: i64,
    pub name: String,
}

/// Asynchronous import running on the node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportJob {
    pub id: i64,

    /// Completion in `[0.0, 1.0]`; the job is done at exactly 1.0
    pub progress: f64,

    #[serde(default)]
    pub domain: Option<i64>,
}

impl ImportJob {
    pub fn is_complete(&self) -> bool {
        self.progress == 1.0
    }
}

/// Either a bare domain id or a domain object carrying one
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DomainRef {
    Id(i64),
    Domain { id: i64 },
}

impl DomainRef {
    pub fn id(&self) -> i64 {
        match self {
            DomainRef::Id(id) => *id,
            DomainRef::Domain { id } => *id,
        }
    }
}

impl From<i64> for DomainRef {
    fn from(id: i64) -> Self {
        DomainRef::Id(id)
    }
}

impl From<&Domain> for DomainRef {
    fn from(domain: &Domain) -> Self {
        DomainRef::Domain { id: domain.id }
    }
}

/// One entry of a context vector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextScore {
    pub domain: DomainRef,
    pub score: f64,
}

impl ContextScore {
    pub fn new(domain: impl Into<DomainRef>, score: f64) -> Self {
        Self {
            domain: domain.into(),
            score,
        }
    }
}

/// Encode a context vector as `<id>:<score>` tokens joined by commas.
///
/// Order is preserved and scores always carry six decimals.
pub fn encode_context(context: &[ContextScore]) -> String {
    context
        .iter()
        .map(|entry| format!("{}:{:.6}", entry.domain.id(), entry.score))
        .collect::<Vec<_>>()
        .join(",")
}
