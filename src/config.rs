//! Harness configuration
//!
//! Bundle layout, runtime invocation details and probe cadence for the
//! supervised Node.js runtime. Defaults mirror the shipped Trilium bundle:
//! `<bundle>/node/bin/node <bundle>/main.cjs` serving on 127.0.0.1:8080.

use std::path::PathBuf;
use std::time::Duration;
use url::Url;

/// Full harness configuration with bundle layout and probe settings
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    /// Read-only packaged asset root containing the bundle
    pub asset_root: PathBuf,

    /// Writable private storage; the bundle is installed under it and it
    /// becomes the runtime's HOME
    pub data_dir: PathBuf,

    /// Bundle directory name under both asset root and data dir
    pub bundle_name: String,

    /// Entry binary, relative to the installed bundle root
    pub runtime_subpath: PathBuf,

    /// Entry script, relative to the installed bundle root
    pub script_name: String,

    /// OpenSSL config the runtime is pointed at, relative to the bundle root
    pub openssl_conf_subpath: PathBuf,

    /// Shared-library search dir, relative to the bundle root
    pub lib_subpath: PathBuf,

    /// Local base address the runtime serves on
    pub base_url: Url,

    /// Health endpoint path under the base address
    pub health_path: String,

    /// Delay between readiness probe attempts
    pub probe_interval: Duration,

    /// Probe attempts before giving up
    pub probe_max_attempts: u32,

    /// Per-request connect/read timeout for probe requests
    pub probe_request_timeout: Duration,

    /// How long stop waits for the runtime to exit before escalating
    pub stop_timeout: Duration,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            asset_root: PathBuf::from("./assets"),
            data_dir: PathBuf::from("./data"),
            bundle_name: "trilium".to_string(),
            runtime_subpath: PathBuf::from("node/bin/node"),
            script_name: "main.cjs".to_string(),
            openssl_conf_subpath: PathBuf::from("node/bin/openssl.cnf"),
            lib_subpath: PathBuf::from("node/lib"),
            base_url: Url::parse("http://127.0.0.1:8080").expect("static url"),
            health_path: "/api/health-check".to_string(),
            probe_interval: Duration::from_millis(2000),
            probe_max_attempts: 10,
            probe_request_timeout: Duration::from_secs(3),
            stop_timeout: Duration::from_secs(10),
        }
    }
}

impl HarnessConfig {
    /// Installed bundle root inside writable storage
    pub fn install_root(&self) -> PathBuf {
        self.data_dir.join(&self.bundle_name)
    }

    /// Absolute path of the installed runtime binary
    pub fn binary_path(&self) -> PathBuf {
        self.install_root().join(&self.runtime_subpath)
    }

    /// Absolute path of the installed entry script
    pub fn script_path(&self) -> PathBuf {
        self.install_root().join(&self.script_name)
    }

    /// Health endpoint URL polled by the readiness prober
    pub fn health_url(&self) -> String {
        format!(
            "{}{}",
            self.base_url.as_str().trim_end_matches('/'),
            self.health_path
        )
    }

    /// Environment overrides for the runtime process, all pointing inside
    /// the installed bundle (merged over the inherited environment)
    pub fn env_overrides(&self) -> Vec<(String, String)> {
        let root = self.install_root();
        vec![
            (
                "OPENSSL_CONF".to_string(),
                root.join(&self.openssl_conf_subpath)
                    .to_string_lossy()
                    .into_owned(),
            ),
            (
                "LD_LIBRARY_PATH".to_string(),
                root.join(&self.lib_subpath).to_string_lossy().into_owned(),
            ),
            (
                "HOME".to_string(),
                self.data_dir.to_string_lossy().into_owned(),
            ),
        ]
    }
}
