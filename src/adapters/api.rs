//! HTTP client for the node's management API.
//!
//! Every response is a JSON envelope `{ "data": ... }`; the client unwraps
//! it and returns the `data` payload (absent when the key is missing).
//! Non-success statuses fail with [`NodeError::Http`] and are never retried.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::ManagementApi;
use crate::domain::{encode_context, ContextScore, Domain, ImportJob};
use crate::error::NodeError;

/// Some operations (imports, feature updates) are long running
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60 * 60);

pub const DEFAULT_API_PORT: u16 = 8045;

#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: DeserializeOwned"))]
struct Envelope<T> {
    #[serde(default)]
    data: Option<T>,
}

/// Typed client for one node's management endpoint
#[derive(Debug, Clone)]
pub struct ApiClient {
    host: String,
    port: u16,
    root: Option<String>,
    client: reqwest::Client,
}

impl ApiClient {
    /// Create a client for `host`.
    ///
    /// `host` may be `name`, `name:port` or `http://name:port`; a port in
    /// the host string wins over `port`, which defaults to 8045.
    pub fn new(host: &str, port: Option<u16>, root: Option<&str>) -> Result<Self> {
        let host = host.strip_prefix("http://").unwrap_or(host);

        let (host, port) = match host.split_once(':') {
            Some((name, port_str)) => {
                let port = port_str
                    .parse::<u16>()
                    .with_context(|| format!("Invalid port in API address: {}", port_str))?;
                (name.to_string(), port)
            }
            None => (host.to_string(), port.unwrap_or(DEFAULT_API_PORT)),
        };

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            host,
            port,
            root: root.map(|r| r.trim_end_matches('/').to_string()),
            client,
        })
    }

    /// Client for a node on this machine
    pub fn local(port: u16, root: Option<&str>) -> Result<Self> {
        Self::new("localhost", Some(port), root)
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Full URL of an endpoint
    pub fn url(&self, endpoint: &str) -> String {
        format!(
            "http://{}:{}{}/{}",
            self.host,
            self.port,
            self.root.as_deref().unwrap_or(""),
            endpoint
        )
    }

    async fn unpack<T: DeserializeOwned>(response: reqwest::Response) -> Result<Option<T>> {
        let status = response.status();
        if !status.is_success() {
            return Err(NodeError::Http {
                status: status.as_u16(),
                url: response.url().to_string(),
            }
            .into());
        }

        let url = response.url().to_string();
        let envelope: Envelope<T> = response
            .json()
            .await
            .with_context(|| format!("Failed to decode response from {}", url))?;

        Ok(envelope.data)
    }

    async fn get<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
    ) -> Result<Option<T>> {
        let url = self.url(endpoint);
        debug!(%url, "GET");

        let response = self
            .client
            .get(&url)
            .query(params)
            .send()
            .await
            .with_context(|| format!("Failed to send GET {}", url))?;

        Self::unpack(response).await
    }

    async fn delete<T: DeserializeOwned>(&self, endpoint: &str) -> Result<Option<T>> {
        let url = self.url(endpoint);
        debug!(%url, "DELETE");

        let response = self
            .client
            .delete(&url)
            .send()
            .await
            .with_context(|| format!("Failed to send DELETE {}", url))?;

        Self::unpack(response).await
    }

    async fn put_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        endpoint: &str,
        body: &B,
    ) -> Result<Option<T>> {
        let url = self.url(endpoint);
        debug!(%url, "PUT (json)");

        let response = self
            .client
            .put(&url)
            .json(body)
            .send()
            .await
            .with_context(|| format!("Failed to send PUT {}", url))?;

        Self::unpack(response).await
    }

    async fn put_form<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
    ) -> Result<Option<T>> {
        let url = self.url(endpoint);
        debug!(%url, "PUT (form)");

        let response = self
            .client
            .put(&url)
            .form(params)
            .send()
            .await
            .with_context(|| format!("Failed to send PUT {}", url))?;

        Self::unpack(response).await
    }

    async fn post_form<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
    ) -> Result<Option<T>> {
        let url = self.url(endpoint);
        debug!(%url, "POST (form)");

        let response = self
            .client
            .post(&url)
            .form(params)
            .send()
            .await
            .with_context(|| format!("Failed to send POST {}", url))?;

        Self::unpack(response).await
    }

    /// Node statistics
    pub async fn stats(&self) -> Result<Option<Value>> {
        self.get("_stat", &[]).await
    }

    /// Replace the decoder feature weights
    pub async fn update_features(
        &self,
        features: &BTreeMap<String, Vec<f64>>,
    ) -> Result<Option<Value>> {
        self.put_json("decoder/features", features).await
    }

    /// Current decoder feature weights
    pub async fn get_features(&self) -> Result<Option<BTreeMap<String, Vec<f64>>>> {
        self.get("decoder/features", &[]).await
    }

    /// Context vector of a document readable by the node
    pub async fn get_context_for_file(
        &self,
        document: &Path,
        limit: Option<usize>,
    ) -> Result<Option<Vec<ContextScore>>> {
        let mut params = vec![("local_file", document.display().to_string())];
        if let Some(limit) = limit {
            params.push(("limit", limit.to_string()));
        }
        self.get("context-vector", &params).await
    }

    /// Context vector of inline text
    pub async fn get_context_for_text(
        &self,
        text: &str,
        limit: Option<usize>,
    ) -> Result<Option<Vec<ContextScore>>> {
        let mut params = vec![("text", text.to_string())];
        if let Some(limit) = limit {
            params.push(("limit", limit.to_string()));
        }
        self.get("context-vector", &params).await
    }

    /// Translate `source`, optionally biased by a context vector
    pub async fn translate(
        &self,
        source: &str,
        context: Option<&[ContextScore]>,
        nbest: Option<usize>,
    ) -> Result<Option<Value>> {
        let mut params = vec![("q", source.to_string())];
        if let Some(nbest) = nbest {
            params.push(("nbest", nbest.to_string()));
        }
        if let Some(context) = context {
            params.push(("context_vector", encode_context(context)));
        }
        self.get("translate", &params).await
    }

    pub async fn create_domain(&self, name: &str) -> Result<Domain> {
        let domain = self.post_form("domains", &[("name", name.to_string())]).await?;
        require(domain, "domains")
    }

    pub async fn delete_domain(&self, id: i64) -> Result<Option<Value>> {
        self.delete(&format!("domains/{}", id)).await
    }

    pub async fn append_to_domain(
        &self,
        domain: i64,
        source: &str,
        target: &str,
    ) -> Result<Option<Value>> {
        let params = [("source", source.to_string()), ("target", target.to_string())];
        self.put_form(&format!("domains/{}/corpus", domain), &params)
            .await
    }

    pub async fn import_into_domain(&self, domain: i64, tmx: &Path) -> Result<ImportJob> {
        let endpoint = format!("domains/{}/corpus", domain);
        let params = [
            ("content_type", "tmx".to_string()),
            ("local_file", tmx.display().to_string()),
        ];
        let job = self.put_form(&endpoint, &params).await?;
        require(job, &endpoint)
    }

    pub async fn get_import_job(&self, id: i64) -> Result<ImportJob> {
        let endpoint = format!("domains/imports/{}", id);
        let job = self.get(&endpoint, &[]).await?;
        require(job, &endpoint)
    }

    pub async fn get_all_domains(&self) -> Result<Vec<Domain>> {
        Ok(self.get("domains", &[]).await?.unwrap_or_default())
    }
}

fn require<T>(data: Option<T>, endpoint: &str) -> Result<T> {
    data.with_context(|| format!("Empty response from {}", endpoint))
}

#[async_trait]
impl ManagementApi for ApiClient {
    fn port(&self) -> u16 {
        self.port
    }

    async fn update_features(&self, features: &BTreeMap<String, Vec<f64>>) -> Result<Option<Value>> {
        ApiClient::update_features(self, features).await
    }

    async fn create_domain(&self, name: &str) -> Result<Domain> {
        ApiClient::create_domain(self, name).await
    }

    async fn append_to_domain(&self, domain: i64, source: &str, target: &str) -> Result<Option<Value>> {
        ApiClient::append_to_domain(self, domain, source, target).await
    }

    async fn import_into_domain(&self, domain: i64, tmx: &Path) -> Result<ImportJob> {
        ApiClient::import_into_domain(self, domain, tmx).await
    }

    async fn get_import_job(&self, id: i64) -> Result<ImportJob> {
        ApiClient::get_import_job(self, id).await
    }

    async fn get_all_domains(&self) -> Result<Vec<Domain>> {
        ApiClient::get_all_domains(self).await
    }
}
