//! End-to-end tests for the harness pipeline
//!
//! Exercises the real component chain: materialize a bundle from a staged
//! asset directory, bootstrap permissions, spawn the runtime and drain its
//! output, and probe readiness over real local HTTP.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use node_harness::{
    AssetMaterializer, DirAssetSource, HarnessConfig, HealthCheck, HttpHealthCheck, LaunchSpec,
    MaterializeOutcome, NodeSupervisor, ProbeError, ProbeEvent, ReadinessProber,
};

/// Stage a bundle whose "runtime binary" is a shell script that runs the
/// entry script, mirroring `node main.cjs`.
async fn stage_bundle(asset_root: &Path, script_body: &str) {
    let bundle = asset_root.join("trilium");
    fs::create_dir_all(bundle.join("node/bin")).await.unwrap();
    fs::create_dir_all(bundle.join("node/lib")).await.unwrap();
    fs::write(bundle.join("version.txt"), "17.2.1\n").await.unwrap();
    fs::write(bundle.join("main.cjs"), script_body).await.unwrap();
    fs::write(
        bundle.join("node/bin/node"),
        "#!/bin/sh\nexec /bin/sh \"$1\"\n",
    )
    .await
    .unwrap();
    fs::write(bundle.join("node/bin/openssl.cnf"), "").await.unwrap();
}

#[cfg(unix)]
#[tokio::test]
async fn test_materialize_bootstrap_spawn_drain_stop() {
    let temp = TempDir::new().unwrap();
    let asset_root = temp.path().join("assets");
    stage_bundle(&asset_root, "echo runtime-started\necho \"home=$HOME\"\n").await;

    let config = HarnessConfig {
        asset_root: asset_root.clone(),
        data_dir: temp.path().join("files"),
        ..HarnessConfig::default()
    };

    // Materialize into private storage
    let materializer = AssetMaterializer::new(Arc::new(DirAssetSource::new(&asset_root)));
    let outcome = materializer
        .materialize(&config.bundle_name, &config.install_root())
        .await
        .unwrap();
    assert_eq!(outcome, MaterializeOutcome::Copied);

    // The copy drops the execute bit; bootstrap restores it
    node_harness::services::ensure_executable(&config.binary_path())
        .await
        .unwrap();

    // Spawn with the bundle environment and observe drained output
    let (tap_tx, mut tap_rx) = mpsc::channel(16);
    let supervisor = NodeSupervisor::new()
        .with_stop_timeout(Duration::from_secs(5))
        .with_line_tap(tap_tx);
    let spec = LaunchSpec {
        binary: config.binary_path(),
        script: config.script_path(),
        env: config.env_overrides(),
    };
    supervisor.start(&spec).await.unwrap();

    let first = tokio::time::timeout(Duration::from_secs(5), tap_rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first, "runtime-started");

    let second = tokio::time::timeout(Duration::from_secs(5), tap_rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        second,
        format!("home={}", config.data_dir.to_string_lossy())
    );

    supervisor.stop().await.unwrap();
    assert!(!supervisor.is_running().await);
}

#[cfg(unix)]
#[tokio::test]
async fn test_second_boot_skips_copy() {
    let temp = TempDir::new().unwrap();
    let asset_root = temp.path().join("assets");
    stage_bundle(&asset_root, "true\n").await;

    let install_root = temp.path().join("files").join("trilium");
    let materializer = AssetMaterializer::new(Arc::new(DirAssetSource::new(&asset_root)));

    let first = materializer.materialize("trilium", &install_root).await.unwrap();
    let second = materializer.materialize("trilium", &install_root).await.unwrap();
    assert_eq!(first, MaterializeOutcome::Copied);
    assert_eq!(second, MaterializeOutcome::UpToDate);
}

/// Minimal HTTP responder: answers every request on the listener with the
/// given status line until dropped.
async fn spawn_http_responder(listener: TcpListener, statuses: Vec<&'static str>) {
    tokio::spawn(async move {
        let mut responses = statuses.into_iter();
        let mut last = "200 OK";
        loop {
            let Ok((mut stream, _)) = listener.accept().await else {
                return;
            };
            let status = responses.next().unwrap_or(last);
            last = status;
            let mut buf = [0u8; 1024];
            let _ = stream.read(&mut buf).await;
            let response =
                format!("HTTP/1.1 {status}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n");
            let _ = stream.write_all(response.as_bytes()).await;
        }
    });
}

#[tokio::test]
async fn test_health_check_accepts_only_200() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    spawn_http_responder(listener, vec!["503 Service Unavailable", "200 OK"]).await;

    let check = HttpHealthCheck::new(Duration::from_secs(3));
    let url = format!("http://{addr}/api/health-check");

    let first = check.check(&url).await;
    assert!(matches!(first, Err(ProbeError::Status { status: 503 })));

    let second = check.check(&url).await;
    assert!(second.is_ok());
}

#[tokio::test]
async fn test_health_check_reports_transport_failure() {
    // Bind then drop to get a port nothing listens on
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let check = HttpHealthCheck::new(Duration::from_secs(1));
    let url = format!("http://{addr}/api/health-check");
    let result = check.check(&url).await;
    assert!(matches!(result, Err(ProbeError::Transport { .. })));
}

#[tokio::test]
async fn test_prober_over_real_http_fails_then_ready() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    spawn_http_responder(
        listener,
        vec!["503 Service Unavailable", "503 Service Unavailable", "200 OK"],
    )
    .await;

    let prober = ReadinessProber::new(
        Arc::new(HttpHealthCheck::new(Duration::from_secs(3))),
        Duration::from_millis(10),
        10,
    );
    let mut handle = prober.probe(format!("http://{addr}/api/health-check"));

    let mut events = Vec::new();
    while let Some(event) = handle.events.recv().await {
        events.push(event);
    }
    assert_eq!(
        events,
        vec![
            ProbeEvent::Retrying {
                attempt: 1,
                max_attempts: 10
            },
            ProbeEvent::Retrying {
                attempt: 2,
                max_attempts: 10
            },
            ProbeEvent::Ready,
        ]
    );
}
