// ABOUTME: Request/response operations the client issues to the session host
// Tree and content fetches sit behind an async trait so transports can vary

use crate::host::error::HostError;
use crate::workspace::WorkspaceNode;
use async_trait::async_trait;

/// Round-trips to the host. Each call is a single request and response.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HostApi: Send + Sync {
    /// Full hierarchical workspace structure, rooted at the implicit root.
    async fn fetch_tree(&self) -> Result<WorkspaceNode, HostError>;

    /// Whole text of the file at `path`.
    async fn fetch_content(&self, path: &str) -> Result<String, HostError>;
}
