//! Shared fixtures: a scripted fake node and an in-memory management API.

#![allow(dead_code)]

use std::collections::{BTreeMap, VecDeque};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

use mtnode::{ClusterNode, Domain, Engine, EngineConfig, ImportJob, ManagementApi, NodeConfig};

/// How the fake node behaves once it has written all its statuses
pub enum Tail {
    /// Keep running
    Linger,
    /// Keep running and ignore SIGTERM
    IgnoreTerm,
    /// Exit
    Exit,
}

/// Write a `/bin/sh` fake node that walks `statuses` one every `step_secs`.
///
/// The script records its own pid next to itself, see [`fake_node_pid`].
pub fn fake_node_script(dir: &Path, statuses: &[&str], step_secs: f32, tail: Tail) -> PathBuf {
    let tail = match tail {
        Tail::Linger => "exec sleep 30",
        Tail::IgnoreTerm => "trap '' TERM\nexec sleep 30",
        Tail::Exit => "exit 0",
    };

    let script = format!(
        r#"#!/bin/sh
echo $$ > "$0.pid"
STATUS_FILE=""
while [ $# -gt 0 ]; do
  case "$1" in
    --status-file) STATUS_FILE="$2"; shift ;;
  esac
  shift
done
for s in {statuses}; do
  echo "status=$s" > "$STATUS_FILE.tmp"
  mv "$STATUS_FILE.tmp" "$STATUS_FILE"
  sleep {step}
done
{tail}
"#,
        statuses = statuses.join(" "),
        step = step_secs,
        tail = tail,
    );

    let path = dir.join("fake-node.sh");
    std::fs::write(&path, script).unwrap();
    let mut perms = std::fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).unwrap();
    path
}

/// Pid the fake node recorded for itself, once it has got that far
pub fn fake_node_pid(script: &Path) -> Option<u32> {
    let mut path = script.as_os_str().to_owned();
    path.push(".pid");
    std::fs::read_to_string(path).ok()?.trim().parse().ok()
}

pub fn test_engine(root: &Path) -> Engine {
    Engine::new(
        "default",
        root.join("engines").join("default"),
        EngineConfig {
            source_lang: "en".to_string(),
            target_lang: "it".to_string(),
            api_root: None,
        },
    )
}

/// Fast-polling node config running `executable`
pub fn test_config(executable: PathBuf) -> NodeConfig {
    NodeConfig {
        executable,
        rest: false,
        poll_interval_ms: 100,
        stop_grace_seconds: 2,
        ..Default::default()
    }
}

pub fn test_node(root: &Path, executable: PathBuf) -> ClusterNode {
    ClusterNode::new(test_engine(root), test_config(executable)).unwrap()
}

/// In-memory management API
#[derive(Default)]
pub struct FakeApi {
    pub domains: Vec<Domain>,

    /// Progress values served in order: first on submission, then per poll
    pub job_progress: Mutex<VecDeque<f64>>,

    pub features: Mutex<Vec<BTreeMap<String, Vec<f64>>>>,
    pub appended: Mutex<Vec<(i64, String, String)>>,
    pub polls: AtomicUsize,
}

impl FakeApi {
    pub fn with_domains(domains: &[(i64, &str)]) -> Self {
        Self {
            domains: domains
                .iter()
                .map(|(id, name)| Domain {
                    id: *id,
                    name: name.to_string(),
                })
                .collect(),
            ..Default::default()
        }
    }

    pub fn with_job_progress(progress: &[f64]) -> Self {
        Self {
            job_progress: Mutex::new(progress.iter().copied().collect()),
            ..Default::default()
        }
    }

    fn next_job(&self, domain: Option<i64>) -> Result<ImportJob> {
        let progress = self
            .job_progress
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| anyhow::anyhow!("import job polled past completion"))?;

        Ok(ImportJob {
            id: 42,
            progress,
            domain,
        })
    }
}

#[async_trait]
impl ManagementApi for FakeApi {
    fn port(&self) -> u16 {
        8045
    }

    async fn update_features(&self, features: &BTreeMap<String, Vec<f64>>) -> Result<Option<Value>> {
        self.features.lock().unwrap().push(features.clone());
        Ok(None)
    }

    async fn create_domain(&self, name: &str) -> Result<Domain> {
        Ok(Domain {
            id: self.domains.len() as i64 + 1,
            name: name.to_string(),
        })
    }

    async fn append_to_domain(&self, domain: i64, source: &str, target: &str) -> Result<Option<Value>> {
        self.appended
            .lock()
            .unwrap()
            .push((domain, source.to_string(), target.to_string()));
        Ok(None)
    }

    async fn import_into_domain(&self, domain: i64, _tmx: &Path) -> Result<ImportJob> {
        self.next_job(Some(domain))
    }

    async fn get_import_job(&self, id: i64) -> Result<ImportJob> {
        assert_eq!(id, 42);
        self.polls.fetch_add(1, Ordering::SeqCst);
        self.next_job(None)
    }

    async fn get_all_domains(&self) -> Result<Vec<Domain>> {
        Ok(self.domains.clone())
    }
}
