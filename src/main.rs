//! Main entry point for the harness binary
//!
//! Plays the host-application role: boot the supervised runtime on launch,
//! report readiness, stop the runtime on Ctrl+C.

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use url::Url;

use node_harness::{
    logging, services::DirAssetSource, Harness, HarnessConfig, HarnessError, HarnessResult,
};

/// Supervises a bundled Node.js server runtime behind a local web UI
#[derive(Parser)]
#[command(name = "node-harness")]
#[command(about = "Runs the bundled server runtime and waits for it to become reachable")]
pub struct Args {
    /// Read-only packaged asset directory containing the bundle
    #[arg(long, default_value = "./assets")]
    pub asset_root: PathBuf,

    /// Writable private storage directory
    #[arg(long, default_value = "./data")]
    pub data_dir: PathBuf,

    /// Bundle directory name under the asset root
    #[arg(long, default_value = "trilium")]
    pub bundle: String,

    /// Local base address the runtime serves on
    #[arg(long, default_value = "http://127.0.0.1:8080")]
    pub base_url: String,

    /// Delay between readiness probe attempts, in milliseconds
    #[arg(long, default_value = "2000")]
    pub probe_interval_ms: u64,

    /// Probe attempts before giving up
    #[arg(long, default_value = "10")]
    pub probe_attempts: u32,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

#[tokio::main]
async fn main() -> HarnessResult<()> {
    let args = Args::parse();

    logging::init_tracing_with_level(Some(&args.log_level));
    logging::log_startup("node-harness");

    let base_url = Url::parse(&args.base_url)
        .map_err(|e| HarnessError::config(format!("Invalid base url: {e}")))?;

    let config = HarnessConfig {
        asset_root: args.asset_root.clone(),
        data_dir: args.data_dir,
        bundle_name: args.bundle,
        base_url,
        probe_interval: Duration::from_millis(args.probe_interval_ms),
        probe_max_attempts: args.probe_attempts,
        ..HarnessConfig::default()
    };

    let source = Arc::new(DirAssetSource::new(args.asset_root));
    let mut harness = Harness::new(config, source);

    // Set up graceful shutdown
    let shutdown_sender = harness.get_shutdown_sender();
    tokio::spawn(async move {
        match signal::ctrl_c().await {
            Ok(()) => {
                logging::log_shutdown("Received Ctrl+C signal");
                let _ = shutdown_sender.send(()).await;
            }
            Err(err) => {
                tracing::error!("Signal handling failed: {err}");
            }
        }
    });

    harness.boot().await?;
    harness.run().await?;

    tracing::info!("✅ Harness stopped gracefully");
    Ok(())
}
