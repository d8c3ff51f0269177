//! Domain management and progress-tracked imports.

use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use serde_json::Value;
use tracing::{debug, info, instrument};

use crate::adapters::ManagementApi;
use crate::domain::{Domain, ImportJob};
use crate::error::NodeError;

/// Default interval between import-job polls
pub const DEFAULT_REFRESH: Duration = Duration::from_secs(1);

/// Domain operations layered on a node's management API
pub struct DomainJobs<'a> {
    api: &'a dyn ManagementApi,
}

impl<'a> DomainJobs<'a> {
    pub fn new(api: &'a dyn ManagementApi) -> Self {
        Self { api }
    }

    pub async fn new_domain(&self, name: &str) -> Result<Domain> {
        let domain = self.api.create_domain(name).await?;
        info!(id = domain.id, name = %domain.name, "Domain created");
        Ok(domain)
    }

    /// Import a TMX file and poll the job until it completes
    pub async fn import_tmx(&self, domain: i64, tmx: &Path, interval: Duration) -> Result<ImportJob> {
        self.import_tmx_with_progress(domain, tmx, interval, |_| {})
            .await
    }

    /// Import a TMX file, reporting every job snapshot to `callback`.
    ///
    /// The callback runs once after submission and once after every poll.
    /// Polling stops exactly when progress reaches 1.0; a job that never
    /// completes is polled until the future is dropped.
    #[instrument(skip(self, tmx, callback), fields(tmx = %tmx.display()))]
    pub async fn import_tmx_with_progress<F>(
        &self,
        domain: i64,
        tmx: &Path,
        interval: Duration,
        mut callback: F,
    ) -> Result<ImportJob>
    where
        F: FnMut(&ImportJob) + Send,
    {
        let mut job = self.api.import_into_domain(domain, tmx).await?;
        info!(job = job.id, "Import submitted");
        callback(&job);

        while !job.is_complete() {
            tokio::time::sleep(interval).await;
            job = self.api.get_import_job(job.id).await?;
            debug!(job = job.id, progress = job.progress, "Import progress");
            callback(&job);
        }

        info!(job = job.id, "Import completed");
        Ok(job)
    }

    /// Resolve a numeric id or an exact domain name to a domain id
    pub async fn resolve_domain(&self, domain: &str) -> Result<i64> {
        if let Ok(id) = domain.parse::<i64>() {
            return Ok(id);
        }

        let ids: Vec<i64> = self
            .api
            .get_all_domains()
            .await?
            .into_iter()
            .filter(|d| d.name == domain)
            .map(|d| d.id)
            .collect();

        match ids.as_slice() {
            [] => Err(NodeError::illegal_argument(format!(
                "unable to find domain \"{}\"",
                domain
            ))
            .into()),
            [id] => Ok(*id),
            _ => Err(NodeError::illegal_argument(format!(
                "ambiguous domain name \"{}\", choose one of the following ids: {:?}",
                domain, ids
            ))
            .into()),
        }
    }

    /// Append a parallel sentence pair to a domain given by id or name
    pub async fn append_to_domain(
        &self,
        domain: &str,
        source: &str,
        target: &str,
    ) -> Result<Option<Value>> {
        let id = self.resolve_domain(domain).await?;
        self.api.append_to_domain(id, source, target).await
    }
}
