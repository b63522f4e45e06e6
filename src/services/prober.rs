//! Readiness prober
//!
//! Bounded-retry health check gating UI activation: HEAD the local health
//! endpoint until it answers 200, re-arming after a fixed interval, and
//! give up after a fixed number of attempts. Ready and GaveUp are terminal;
//! no request is issued after either. Cancellation stops armed retries
//! outright.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::error::ProbeError;
use crate::traits::HealthCheck;

/// Events emitted by the probe loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeEvent {
    /// Attempt failed; the loop re-arms after the interval
    Retrying { attempt: u32, max_attempts: u32 },
    /// Service answered 200; terminal
    Ready,
    /// Retry budget exhausted without success; terminal
    GaveUp,
}

/// Running probe: an event stream plus a cancellation switch
pub struct ProbeHandle {
    pub events: mpsc::Receiver<ProbeEvent>,
    cancel: watch::Sender<bool>,
}

impl ProbeHandle {
    /// Stop the loop at its next transition; armed retries are dropped and
    /// the event stream closes.
    pub fn cancel(&self) {
        let _ = self.cancel.send(true);
    }
}

/// Polls the health endpoint on a fixed cadence with a bounded attempt count
pub struct ReadinessProber {
    checker: Arc<dyn HealthCheck>,
    interval: Duration,
    max_attempts: u32,
}

impl ReadinessProber {
    pub fn new(checker: Arc<dyn HealthCheck>, interval: Duration, max_attempts: u32) -> Self {
        Self {
            checker,
            interval,
            max_attempts,
        }
    }

    /// Start probing `url`. The loop runs on its own task; events arrive on
    /// the returned handle until a terminal event or cancellation.
    pub fn probe(&self, url: String) -> ProbeHandle {
        let (event_tx, event_rx) = mpsc::channel(16);
        let (cancel_tx, mut cancel_rx) = watch::channel(false);

        let checker = Arc::clone(&self.checker);
        let interval = self.interval;
        let max_attempts = self.max_attempts;

        tokio::spawn(async move {
            let mut attempts = 0u32;

            loop {
                // The in-flight request races cancellation so a hung
                // connection cannot outlive the owner's teardown.
                let result = tokio::select! {
                    result = checker.check(&url) => result,
                    _ = cancel_rx.changed() => {
                        debug!("Probe cancelled for {url}");
                        return;
                    }
                };

                match result {
                    Ok(()) => {
                        info!("✅ Service ready at {url}");
                        let _ = event_tx.send(ProbeEvent::Ready).await;
                        return;
                    }
                    Err(e) => {
                        attempts += 1;
                        match e {
                            ProbeError::Transport { ref message } => {
                                debug!("Probe {attempts}/{max_attempts} failed: {message}")
                            }
                            ProbeError::Status { status } => {
                                debug!("Probe {attempts}/{max_attempts} got status {status}")
                            }
                        }
                        let _ = event_tx
                            .send(ProbeEvent::Retrying {
                                attempt: attempts,
                                max_attempts,
                            })
                            .await;

                        if attempts >= max_attempts {
                            warn!("⚠️ Service not ready after {max_attempts} attempts, giving up");
                            let _ = event_tx.send(ProbeEvent::GaveUp).await;
                            return;
                        }
                    }
                }

                tokio::select! {
                    _ = sleep(interval) => {}
                    _ = cancel_rx.changed() => {
                        debug!("Probe cancelled for {url}");
                        return;
                    }
                }
            }
        });

        ProbeHandle {
            events: event_rx,
            cancel: cancel_tx,
        }
    }
}

/// HEAD-request health check over HTTP with short per-request timeouts,
/// independent of the poll interval
pub struct HttpHealthCheck {
    client: reqwest::Client,
}

impl HttpHealthCheck {
    pub fn new(request_timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(request_timeout)
            .timeout(request_timeout)
            .build()
            .unwrap_or_default();
        Self { client }
    }
}

#[async_trait::async_trait]
impl HealthCheck for HttpHealthCheck {
    async fn check(&self, url: &str) -> Result<(), ProbeError> {
        let response = self
            .client
            .head(url)
            .send()
            .await
            .map_err(|e| ProbeError::Transport {
                message: e.to_string(),
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::OK {
            Ok(())
        } else {
            Err(ProbeError::Status {
                status: status.as_u16(),
            })
        }
    }
}
