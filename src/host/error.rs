// ABOUTME: Error types for host round-trips
// Distinguishes unreachable hosts, missing paths, and undecodable responses

use crate::workspace::TreeFormatError;
use thiserror::Error;

/// Failures of host round-trips.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostError {
    /// The round-trip failed or timed out. Keep showing last-known state.
    #[error("Host unreachable: {0}")]
    HostUnreachable(String),

    /// No file at the requested path.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The host answered with something that does not decode.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl HostError {
    /// Whether the host reported the path as missing.
    pub fn is_not_found(&self) -> bool {
        matches!(self, HostError::NotFound(_))
    }
}

impl From<TreeFormatError> for HostError {
    fn from(err: TreeFormatError) -> Self {
        HostError::InvalidResponse(err.to_string())
    }
}
