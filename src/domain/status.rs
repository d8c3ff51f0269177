//! Node lifecycle status and the status-file decoder.
//!
//! The supervised process reports its progress by rewriting a flat
//! `key=value` file. The supervisor never writes it; it only decodes the
//! latest snapshot into a [`NodeState`].

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Lifecycle status of a cluster node.
///
/// The regular states form a strict total order. `Error` is a sentinel that
/// is not part of that progression: it compares equal only to itself and is
/// unordered with respect to every other state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeStatus {
    None,
    Created,
    Joining,
    Joined,
    Synchronizing,
    Synchronized,
    Loading,
    Loaded,
    Updating,
    Updated,
    Ready,
    Shutdown,
    Terminated,
    Error,
}

impl NodeStatus {
    /// All states of the regular progression, in order
    pub const PROGRESSION: [NodeStatus; 13] = [
        NodeStatus::None,
        NodeStatus::Created,
        NodeStatus::Joining,
        NodeStatus::Joined,
        NodeStatus::Synchronizing,
        NodeStatus::Synchronized,
        NodeStatus::Loading,
        NodeStatus::Loaded,
        NodeStatus::Updating,
        NodeStatus::Updated,
        NodeStatus::Ready,
        NodeStatus::Shutdown,
        NodeStatus::Terminated,
    ];

    /// Wire ordinal of this status
    pub fn ordinal(self) -> u32 {
        match self {
            NodeStatus::None => 0,
            NodeStatus::Created => 100,
            NodeStatus::Joining => 200,
            NodeStatus::Joined => 300,
            NodeStatus::Synchronizing => 400,
            NodeStatus::Synchronized => 500,
            NodeStatus::Loading => 600,
            NodeStatus::Loaded => 700,
            NodeStatus::Updating => 800,
            NodeStatus::Updated => 900,
            NodeStatus::Ready => 1000,
            NodeStatus::Shutdown => 1100,
            NodeStatus::Terminated => 1200,
            NodeStatus::Error => 9999,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            NodeStatus::None => "NONE",
            NodeStatus::Created => "CREATED",
            NodeStatus::Joining => "JOINING",
            NodeStatus::Joined => "JOINED",
            NodeStatus::Synchronizing => "SYNCHRONIZING",
            NodeStatus::Synchronized => "SYNCHRONIZED",
            NodeStatus::Loading => "LOADING",
            NodeStatus::Loaded => "LOADED",
            NodeStatus::Updating => "UPDATING",
            NodeStatus::Updated => "UPDATED",
            NodeStatus::Ready => "READY",
            NodeStatus::Shutdown => "SHUTDOWN",
            NodeStatus::Terminated => "TERMINATED",
            NodeStatus::Error => "ERROR",
        }
    }

    pub fn is_error(self) -> bool {
        self == NodeStatus::Error
    }

    /// True if this status is at or past `target` in the progression.
    ///
    /// Always false when either side is `Error`.
    pub fn has_reached(self, target: NodeStatus) -> bool {
        matches!(
            self.partial_cmp(&target),
            Some(Ordering::Greater | Ordering::Equal)
        ) && !self.is_error()
    }
}

impl PartialOrd for NodeStatus {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self.is_error(), other.is_error()) {
            (true, true) => Some(Ordering::Equal),
            (false, false) => Some(self.ordinal().cmp(&other.ordinal())),
            _ => None,
        }
    }
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::PROGRESSION
            .iter()
            .chain(std::iter::once(&NodeStatus::Error))
            .copied()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("Unknown node status: {}", s))
    }
}

/// Decoded snapshot of the node's status file
#[derive(Debug, Clone, PartialEq)]
pub struct NodeState {
    /// Lifecycle status (`None` when the key is missing or unrecognized)
    pub status: NodeStatus,

    /// Every key/value pair found in the file, `status` included
    pub properties: HashMap<String, String>,
}

impl NodeState {
    /// Decode the `key=value` status format.
    ///
    /// Blank lines and `#` comments are skipped, lines without `=` are
    /// ignored, and only the first `=` separates key from value.
    pub fn parse(content: &str) -> Self {
        let properties: HashMap<String, String> = content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .filter_map(|line| line.split_once('='))
            .map(|(key, value)| (key.trim().to_string(), value.trim().to_string()))
            .collect();

        let status = properties
            .get("status")
            .and_then(|value| value.parse().ok())
            .unwrap_or(NodeStatus::None);

        Self { status, properties }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progression_is_strictly_increasing() {
        for pair in NodeStatus::PROGRESSION.windows(2) {
            assert!(pair[0] < pair[1], "{} should precede {}", pair[0], pair[1]);
            assert!(pair[1].has_reached(pair[0]));
            assert!(!pair[0].has_reached(pair[1]));
        }
    }

    #[test]
    fn test_error_is_unordered() {
        assert_eq!(NodeStatus::Error.partial_cmp(&NodeStatus::Ready), None);
        assert_eq!(NodeStatus::None.partial_cmp(&NodeStatus::Error), None);
        assert!(!NodeStatus::Error.has_reached(NodeStatus::None));
        assert!(!NodeStatus::Terminated.has_reached(NodeStatus::Error));
    }

    #[test]
    fn test_ordinals_match_wire_values() {
        assert_eq!(NodeStatus::None.ordinal(), 0);
        assert_eq!(NodeStatus::Ready.ordinal(), 1000);
        assert_eq!(NodeStatus::Terminated.ordinal(), 1200);
        assert_eq!(NodeStatus::Error.ordinal(), 9999);
    }

    #[test]
    fn test_status_names_round_trip() {
        assert_eq!("SYNCHRONIZED".parse::<NodeStatus>(), Ok(NodeStatus::Synchronized));
        assert_eq!("ERROR".parse::<NodeStatus>(), Ok(NodeStatus::Error));
        assert!("ready".parse::<NodeStatus>().is_err());
    }

    #[test]
    fn test_parse_status_file() {
        let state = NodeState::parse(
            "# written by node\n\nstatus=LOADED\nembedded_cluster_port=5016\nurl=a=b\n",
        );
        assert_eq!(state.status, NodeStatus::Loaded);
        assert_eq!(state.get("embedded_cluster_port"), Some("5016"));
        assert_eq!(state.get("url"), Some("a=b"));
    }

    #[test]
    fn test_missing_or_unknown_status_defaults_to_none() {
        assert_eq!(NodeState::parse("port=1\n").status, NodeStatus::None);
        assert_eq!(NodeState::parse("status=BOOTING\n").status, NodeStatus::None);
        assert_eq!(NodeState::parse("").status, NodeStatus::None);
    }
}
