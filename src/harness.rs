//! Main harness implementation
//!
//! Coordinates the boot pipeline the host application drives on launch:
//! materialize the bundle into private storage, bootstrap the runtime
//! binary's execute permission, start the supervised process, then gate
//! "service ready" on the readiness probe. Teardown stops the runtime.

use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::{
    config::HarnessConfig,
    error::HarnessResult,
    services::{
        ensure_executable, AssetMaterializer, HttpHealthCheck, LaunchSpec, NodeSupervisor,
        ProbeEvent, ProbeHandle, ReadinessProber,
    },
    traits::AssetSource,
};

/// Ties materializer, bootstrapper, supervisor and prober together for the
/// host application lifecycle
pub struct Harness {
    config: HarnessConfig,
    materializer: AssetMaterializer,
    supervisor: Arc<NodeSupervisor>,
    prober: ReadinessProber,

    /// Shutdown signal
    shutdown_tx: mpsc::Sender<()>,
    shutdown_rx: mpsc::Receiver<()>,
}

impl Harness {
    /// Create a harness over a packaged asset source
    pub fn new(config: HarnessConfig, source: Arc<dyn AssetSource>) -> Self {
        let materializer = AssetMaterializer::new(source);
        let supervisor =
            Arc::new(NodeSupervisor::new().with_stop_timeout(config.stop_timeout));
        let prober = ReadinessProber::new(
            Arc::new(HttpHealthCheck::new(config.probe_request_timeout)),
            config.probe_interval,
            config.probe_max_attempts,
        );
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        Self {
            config,
            materializer,
            supervisor,
            prober,
            shutdown_tx,
            shutdown_rx,
        }
    }

    /// Run the boot pipeline. Materialization and permission failures are
    /// logged but do not abort: a genuinely broken install surfaces as a
    /// loud missing-binary spawn failure instead of being double-reported.
    pub async fn boot(&self) -> HarnessResult<()> {
        let install_root = self.config.install_root();

        match self
            .materializer
            .materialize(&self.config.bundle_name, &install_root)
            .await
        {
            Ok(outcome) => info!("📦 Bundle sync: {outcome:?}"),
            Err(e) => error!("Bundle materialization failed: {e}"),
        }

        let binary = self.config.binary_path();
        if let Err(e) = ensure_executable(&binary).await {
            warn!("Permission bootstrap failed: {e}");
        }

        let spec = LaunchSpec {
            binary,
            script: self.config.script_path(),
            env: self.config.env_overrides(),
        };
        self.supervisor.start(&spec).await?;
        Ok(())
    }

    /// Start the readiness probe against the configured health endpoint
    pub fn watch_readiness(&self) -> ProbeHandle {
        self.prober.probe(self.config.health_url())
    }

    /// Consume probe events and wait for shutdown, then stop the runtime.
    /// Ready announces the content URL; GaveUp is the user-visible
    /// service-not-ready notice.
    pub async fn run(&mut self) -> HarnessResult<()> {
        let mut probe = self.watch_readiness();
        let mut probe_done = false;

        loop {
            tokio::select! {
                event = probe.events.recv(), if !probe_done => {
                    match event {
                        Some(ProbeEvent::Retrying { attempt, max_attempts }) => {
                            info!("⏳ Service not ready, retry {attempt}/{max_attempts}");
                        }
                        Some(ProbeEvent::Ready) => {
                            info!("🌐 Service ready, load {}", self.config.base_url);
                        }
                        Some(ProbeEvent::GaveUp) => {
                            warn!("⚠️ Service not ready after maximum retries");
                        }
                        None => {
                            // Probe reached a terminal state; keep running
                            // until the host tears us down.
                            probe_done = true;
                        }
                    }
                }
                Some(_) = self.shutdown_rx.recv() => {
                    info!("🛑 Shutdown requested");
                    probe.cancel();
                    break;
                }
            }
        }

        self.supervisor.stop().await?;
        info!("✅ Runtime stopped");
        Ok(())
    }

    /// Get shutdown sender for external shutdown requests
    pub fn get_shutdown_sender(&self) -> mpsc::Sender<()> {
        self.shutdown_tx.clone()
    }

    /// Supervisor accessor for host-level restart hooks
    pub fn supervisor(&self) -> Arc<NodeSupervisor> {
        Arc::clone(&self.supervisor)
    }
}
