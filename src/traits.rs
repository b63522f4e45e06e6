//! Trait definitions with mockall annotations for testing
//!
//! Seams for the two external collaborators the harness cannot control in
//! tests: the read-only packaged asset storage and the HTTP transport used
//! by the readiness prober.

use crate::error::ProbeError;
use tokio::io::AsyncRead;

/// Read-only access to the packaged bundle tree.
///
/// Paths are relative to the asset root, `/`-separated. The filesystem
/// implementation answers `is_dir` from real metadata; constrained sources
/// (archive- or asset-manager-backed) may fall back to an open/not-found
/// probe behind the same contract.
#[mockall::automock]
#[async_trait::async_trait]
pub trait AssetSource: Send + Sync {
    /// List entry names directly under `dir` (empty string for the root)
    async fn list(&self, dir: &str) -> std::io::Result<Vec<String>>;

    /// Whether `path` names a directory rather than a file
    async fn is_dir(&self, path: &str) -> std::io::Result<bool>;

    /// Open a file for streamed reading
    async fn open(&self, path: &str)
        -> std::io::Result<Box<dyn AsyncRead + Send + Unpin>>;
}

/// A single readiness request against the health endpoint.
///
/// `Ok(())` means HTTP 200; anything else is a `ProbeError` and drives the
/// prober's retry loop, never propagation.
#[mockall::automock]
#[async_trait::async_trait]
pub trait HealthCheck: Send + Sync {
    async fn check(&self, url: &str) -> Result<(), ProbeError>;
}
