//! Harness for a bundled Node.js server runtime
//!
//! Supervises the runtime shipped read-only with the application:
//! materializes the versioned bundle into writable storage, bootstraps the
//! entry binary's execute permission, runs it as a child process with a
//! custom environment and drained output, and gates UI activation on a
//! bounded-retry health probe against the local server.

pub mod config;
pub mod error;
pub mod harness;
pub mod logging;
pub mod services;
pub mod traits;

// Re-export commonly used types
pub use config::HarnessConfig;
pub use error::{
    HarnessError, HarnessResult, MaterializeError, PermissionError, ProbeError, SpawnError,
    StopError,
};
pub use harness::Harness;
pub use services::{
    AssetMaterializer, DirAssetSource, HttpHealthCheck, LaunchSpec, MaterializeOutcome,
    NodeSupervisor, ProbeEvent, ReadinessProber,
};
pub use traits::{AssetSource, HealthCheck};
