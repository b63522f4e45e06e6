//! Service implementations
//!
//! Production implementations of the harness components: asset access,
//! bundle materialization, permission bootstrap, process supervision and
//! readiness probing.

pub mod assets;
pub mod materializer;
pub mod permissions;
pub mod prober;
pub mod supervisor;

// Re-export all service implementations
pub use assets::DirAssetSource;
pub use materializer::{AssetMaterializer, MaterializeOutcome, COMPLETE_MARKER, VERSION_MARKER};
pub use permissions::ensure_executable;
pub use prober::{HttpHealthCheck, ProbeEvent, ProbeHandle, ReadinessProber};
pub use supervisor::{LaunchSpec, NodeSupervisor};
