// ABOUTME: Host round-trips for workspace structure and file content

/// The host round-trip trait.
pub mod api;
/// Host errors.
pub mod error;
/// HTTP implementation.
pub mod http;

pub use api::HostApi;
#[cfg(test)]
pub use api::MockHostApi;
pub use error::HostError;
pub use http::HttpHostClient;
