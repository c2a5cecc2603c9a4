// ABOUTME: HTTP implementation of the host round-trips
// GET /files for the tree and GET /files/content?path= for file text

use crate::config::HostConfig;
use crate::host::api::HostApi;
use crate::host::error::HostError;
use crate::workspace::WorkspaceNode;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{debug, warn};

#[derive(Debug, Deserialize)]
struct TreeResponse {
    tree: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ContentResponse {
    content: String,
}

/// [`HostApi`] over the host's HTTP routes.
#[derive(Debug, Clone)]
pub struct HttpHostClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpHostClient {
    /// Build a client from the `[host]` section.
    pub fn new(config: &HostConfig) -> Result<Self, HostError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| HostError::HostUnreachable(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.http_url.trim_end_matches('/').to_string(),
        })
    }

    /// Base URL requests are made against.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get(&self, url: &str, query: &[(&str, &str)], what: &str) -> Result<reqwest::Response, HostError> {
        debug!("GET {} {:?}", url, query);
        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|e| {
                warn!("Request for {} failed: {}", what, e);
                HostError::HostUnreachable(e.to_string())
            })?;

        match response.status() {
            status if status.is_success() => Ok(response),
            StatusCode::NOT_FOUND => Err(HostError::NotFound(what.to_string())),
            status => {
                warn!("Host answered {} for {}", status, what);
                Err(HostError::HostUnreachable(format!("HTTP {status} for {what}")))
            }
        }
    }
}

fn decode_error(e: &reqwest::Error) -> HostError {
    if e.is_decode() {
        HostError::InvalidResponse(e.to_string())
    } else {
        HostError::HostUnreachable(e.to_string())
    }
}

#[async_trait]
impl HostApi for HttpHostClient {
    async fn fetch_tree(&self) -> Result<WorkspaceNode, HostError> {
        let url = format!("{}/files", self.base_url);
        let body: TreeResponse = self
            .get(&url, &[], "workspace tree")
            .await?
            .json()
            .await
            .map_err(|e| decode_error(&e))?;

        let tree = WorkspaceNode::from_json(&body.tree)?;
        debug!("Fetched tree with {} nodes", tree.descendant_count());
        Ok(tree)
    }

    async fn fetch_content(&self, path: &str) -> Result<String, HostError> {
        let url = format!("{}/files/content", self.base_url);
        let body: ContentResponse = self
            .get(&url, &[("path", path)], path)
            .await?
            .json()
            .await
            .map_err(|e| decode_error(&e))?;

        debug!("Fetched {} ({} bytes)", path, body.content.len());
        Ok(body.content)
    }
}
