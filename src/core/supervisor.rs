//! Supervisor for one local cluster node process.
//!
//! The node drives its own lifecycle by rewriting `runtime/node.status`
//! with ever higher statuses. The supervisor launches the process, records
//! its pid, and observes that file, translating "process is gone" into
//! [`NodeStatus::Error`]. It never moves the state machine itself.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{Context, Result};
use nix::sys::signal::Signal;
use tokio::process::{Child, Command};
use tracing::{debug, error, info, instrument, warn};

use super::imports::DomainJobs;
use super::process::{self, PidFile};
use super::tuning::{TuningOptions, TuningOrchestrator};
use crate::adapters::ApiClient;
use crate::config::{NodeConfig, ToolsConfig};
use crate::domain::{Domain, Engine, NodeState, NodeStatus, TuningResult};
use crate::error::NodeError;

const LOG_NAME: &str = "node";
const PID_FILE: &str = "node.pid";
const STATUS_FILE: &str = "node.status";

/// How often `stop()` re-checks a process it has signalled
const EXIT_POLL: Duration = Duration::from_millis(100);

/// How long to wait for a SIGKILLed process to disappear
const KILL_WAIT: Duration = Duration::from_secs(1);

/// A cluster node running on this machine
pub struct ClusterNode {
    engine: Engine,
    config: NodeConfig,
    api: ApiClient,
    pid_file: PidFile,
    status_file: PathBuf,
    log_file: PathBuf,

    /// Handle of the process this instance spawned, kept so it can be reaped
    child: Mutex<Option<Child>>,
}

impl ClusterNode {
    pub fn new(engine: Engine, config: NodeConfig) -> Result<Self> {
        let api = ApiClient::local(config.api_port, engine.config.api_root.as_deref())?;
        let runtime = engine.runtime_path();
        let log_file = engine.log_file(LOG_NAME, false)?;

        Ok(Self {
            pid_file: PidFile::new(runtime.join(PID_FILE)),
            status_file: runtime.join(STATUS_FILE),
            log_file,
            engine,
            config,
            api,
            child: Mutex::new(None),
        })
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    /// Client for this node's management API
    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn log_file(&self) -> &Path {
        &self.log_file
    }

    pub fn status_file(&self) -> &Path {
        &self.status_file
    }

    pub fn pid_file(&self) -> &PidFile {
        &self.pid_file
    }

    /// Collect our own child if it has exited, so it stops looking alive
    fn reap_child(&self) {
        let Ok(mut guard) = self.child.lock() else {
            return;
        };

        if let Some(child) = guard.as_mut() {
            if let Ok(Some(status)) = child.try_wait() {
                debug!(%status, "Node process exited");
                *guard = None;
            }
        }
    }

    /// True iff a pid is on record and that process is alive
    pub fn is_running(&self) -> bool {
        self.reap_child();

        let pid = self.pid_file.read();
        pid != 0 && process::is_alive(pid)
    }

    /// Arguments passed to the node launcher
    pub fn launch_args(&self) -> Vec<OsString> {
        let config = &self.config;
        let logs = self.engine.logs_path();

        let mut args: Vec<OsString> = vec![
            "-e".into(),
            self.engine.name.clone().into(),
            "-p".into(),
            config.cluster_port.to_string().into(),
            "--datastream-port".into(),
            config.datastream_port.to_string().into(),
            "--db-port".into(),
            config.db_port.to_string().into(),
            "--status-file".into(),
            self.status_file.clone().into(),
            "--logs".into(),
            logs.into(),
        ];

        if config.rest {
            args.push("-a".into());
            args.push(config.api_port.to_string().into());
        }

        if let Some(verbosity) = config.verbosity {
            args.push("-v".into());
            args.push(verbosity.to_string().into());
        }

        if let Some(ref sibling) = config.sibling {
            args.push("--member".into());
            args.push(format!("{}:{}", sibling, config.cluster_port).into());
        }

        args
    }

    async fn spawn_process(&self) -> Result<Child> {
        let runtime = self.engine.runtime_path();
        tokio::fs::create_dir_all(&runtime)
            .await
            .with_context(|| format!("Failed to create {}", runtime.display()))?;
        self.engine.log_file(LOG_NAME, true)?;

        // A previous run's status must never be observed by this one
        if self.status_file.exists() {
            tokio::fs::remove_file(&self.status_file)
                .await
                .with_context(|| format!("Failed to remove {}", self.status_file.display()))?;
        }

        Command::new(&self.config.executable)
            .args(self.launch_args())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .with_context(|| {
                format!(
                    "Failed to spawn node process {}",
                    self.config.executable.display()
                )
            })
    }

    /// Launch the node and wait until its process is live.
    ///
    /// Does not wait for the node to become READY; see [`ClusterNode::wait`].
    #[instrument(skip(self), fields(engine = %self.engine.name))]
    pub async fn start(&self) -> Result<()> {
        if self.is_running() {
            return Err(NodeError::illegal_state("node process is already running").into());
        }

        let child = self.spawn_process().await?;
        let pid = child.id().unwrap_or(0);
        if let Ok(mut guard) = self.child.lock() {
            *guard = Some(child);
        }

        let mut success = false;
        if pid > 0 {
            // Without a pid record the process could never be stopped
            if let Err(e) = self.pid_file.write(pid) {
                self.kill_child().await;
                return Err(e);
            }

            for attempt in 1..=self.config.start_attempts {
                success = self.is_running();
                if success {
                    break;
                }
                debug!(attempt, "Node process not live yet");
                tokio::time::sleep(self.config.poll_interval()).await;
            }
        }

        if !success {
            error!(log = %self.log_file.display(), "Node process failed to start");
            return Err(NodeError::Startup {
                log_file: self.log_file.clone(),
            }
            .into());
        }

        info!(pid, "Node process started");
        Ok(())
    }

    /// Poll until the process is gone or `timeout` elapses
    async fn wait_for_exit(&self, timeout: Duration) -> bool {
        let exited = async {
            while self.is_running() {
                tokio::time::sleep(EXIT_POLL).await;
            }
        };
        tokio::time::timeout(timeout, exited).await.is_ok()
    }

    /// Kill and reap the process this instance spawned, if any
    async fn kill_child(&self) {
        let child = self.child.lock().ok().and_then(|mut guard| guard.take());
        if let Some(mut child) = child {
            if let Err(e) = child.kill().await {
                warn!(error = %e, "Failed to kill node process");
            }
        }
    }

    /// Terminate the node, escalating to SIGKILL after the grace period.
    ///
    /// A stale pid record (process already gone) is a no-op.
    #[instrument(skip(self), fields(engine = %self.engine.name))]
    pub async fn stop(&self) -> Result<()> {
        let pid = self.pid_file.read();

        if !self.is_running() {
            debug!(pid, "No live node process to stop");
            return Ok(());
        }

        info!(pid, "Stopping node process");
        process::send_signal(pid, Signal::SIGTERM)?;

        if self.wait_for_exit(self.config.stop_grace()).await {
            info!(pid, "Node process stopped");
            return Ok(());
        }

        warn!(
            pid,
            grace_secs = self.config.stop_grace_seconds,
            "Node ignored SIGTERM, killing"
        );
        process::send_signal(pid, Signal::SIGKILL)?;

        if !self.wait_for_exit(KILL_WAIT).await {
            anyhow::bail!("Node process {} is still alive after SIGKILL", pid);
        }

        Ok(())
    }

    /// Decoded status file, if the file exists and the node is alive.
    ///
    /// A status file left behind by a dead process is never returned.
    pub async fn get_state(&self) -> Result<Option<NodeState>> {
        if !self.status_file.exists() || !self.is_running() {
            return Ok(None);
        }

        let content = match tokio::fs::read_to_string(&self.status_file).await {
            Ok(content) => content,
            // Removed between the existence check and the read
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("Failed to read status file: {}", self.status_file.display())
                })
            }
        };

        Ok(Some(NodeState::parse(&content)))
    }

    /// Current lifecycle status; `Error` whenever the process is not alive
    pub async fn status(&self) -> Result<NodeStatus> {
        if !self.is_running() {
            return Ok(NodeStatus::Error);
        }

        Ok(self
            .get_state()
            .await?
            .map(|state| state.status)
            .unwrap_or(NodeStatus::None))
    }

    /// Wait until the node reaches `target` (or any later status).
    ///
    /// Fails as soon as the node is observed dead. There is no built-in
    /// deadline: wrap the future in `tokio::time::timeout` to bound it, or
    /// drop it to cancel.
    #[instrument(skip(self), fields(engine = %self.engine.name, target = %target))]
    pub async fn wait(&self, target: NodeStatus) -> Result<NodeStatus> {
        if target.is_error() {
            return Err(NodeError::illegal_argument("cannot wait for the ERROR status").into());
        }

        let mut current = self.status().await?;
        let mut last_seen = current;

        loop {
            if current.is_error() {
                error!(log = %self.log_file.display(), last = %last_seen, "Node died while waiting");
                return Err(NodeError::Startup {
                    log_file: self.log_file.clone(),
                }
                .into());
            }

            if current != last_seen {
                debug!(status = %current, "Node status advanced");
                last_seen = current;
            }

            if current.has_reached(target) {
                info!(status = %current, "Node reached target status");
                return Ok(current);
            }

            tokio::time::sleep(self.config.poll_interval()).await;
            current = self.status().await?;
        }
    }

    /// Domain management through this node's API
    pub fn domains(&self) -> DomainJobs<'_> {
        DomainJobs::new(&self.api)
    }

    pub async fn new_domain(&self, name: &str) -> Result<Domain> {
        self.domains().new_domain(name).await
    }

    /// Tune decoder weights with the configured external tools
    pub async fn tune(&self, tools: &ToolsConfig, options: TuningOptions) -> Result<TuningResult> {
        TuningOrchestrator::with_tools(self, tools)
            .tune(options)
            .await
    }
}
