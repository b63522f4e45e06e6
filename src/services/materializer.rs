//! Asset materializer
//!
//! Copies the versioned bundle from read-only packaged storage into
//! writable private storage. A completion marker written after the full
//! tree lands is the durability signal; a version marker compared against
//! the source decides whether an existing install can be trusted as-is.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, info, warn};

use crate::error::MaterializeError;
use crate::traits::AssetSource;

/// Opaque version token, compared by exact text equality after trimming
pub const VERSION_MARKER: &str = "version.txt";
/// Zero-byte sentinel written last; its presence marks a trustworthy copy
pub const COMPLETE_MARKER: &str = "copy_complete.flag";

const COPY_CHUNK_BYTES: usize = 4096;

/// What a `materialize` call actually did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaterializeOutcome {
    /// Markers present and versions matched; no I/O performed
    UpToDate,
    /// Bundle was (re-)copied in full
    Copied,
}

/// Materializes the packaged bundle into writable storage
pub struct AssetMaterializer {
    source: Arc<dyn AssetSource>,
}

impl AssetMaterializer {
    pub fn new(source: Arc<dyn AssetSource>) -> Self {
        Self { source }
    }

    /// Synchronize `bundle` (a directory name under the asset root) into
    /// `install_root`. Idempotent fast path when the installed version
    /// marker matches the source and the completion marker is present.
    ///
    /// Does not retry internally; retry policy belongs to the caller.
    pub async fn materialize(
        &self,
        bundle: &str,
        install_root: &Path,
    ) -> Result<MaterializeOutcome, MaterializeError> {
        if install_root.exists() {
            if self.installed_is_current(bundle, install_root).await {
                debug!("📦 Bundle '{bundle}' up to date at {}", install_root.display());
                return Ok(MaterializeOutcome::UpToDate);
            }

            debug!("📦 Bundle '{bundle}' stale or incomplete, re-copying");
            fs::remove_dir_all(install_root)
                .await
                .map_err(|e| MaterializeError::Cleanup {
                    path: install_root.to_path_buf(),
                    source: e,
                })?;
        }

        if let Err(e) = self.copy_tree(bundle, install_root).await {
            // Never leave a half-written tree that a later run could
            // mistake for complete.
            if let Err(cleanup) = fs::remove_dir_all(install_root).await {
                warn!(
                    "Failed to clean up partial install at {}: {cleanup}",
                    install_root.display()
                );
            }
            return Err(e);
        }

        // Marker last: everything before this point is untrusted.
        let marker = install_root.join(COMPLETE_MARKER);
        fs::write(&marker, b"")
            .await
            .map_err(|e| MaterializeError::DestinationWrite {
                path: marker,
                source: e,
            })?;

        info!("📦 Materialized bundle '{bundle}' into {}", install_root.display());
        Ok(MaterializeOutcome::Copied)
    }

    /// Installed-and-valid check: both markers exist and the installed
    /// version token equals the source's. Any read failure forces a re-copy.
    async fn installed_is_current(&self, bundle: &str, install_root: &Path) -> bool {
        let version_path = install_root.join(VERSION_MARKER);
        let marker_path = install_root.join(COMPLETE_MARKER);
        if !version_path.exists() || !marker_path.exists() {
            debug!("📦 Missing version or completion marker under {}", install_root.display());
            return false;
        }

        let installed = match fs::read_to_string(&version_path).await {
            Ok(text) => text.trim().to_string(),
            Err(e) => {
                warn!("Failed to read installed version marker: {e}");
                return false;
            }
        };

        let source = match self.read_source_version(bundle).await {
            Some(version) => version,
            None => return false,
        };

        if installed != source {
            debug!("📦 Version changed (source: {source}, installed: {installed})");
            return false;
        }
        true
    }

    async fn read_source_version(&self, bundle: &str) -> Option<String> {
        let entry = format!("{bundle}/{VERSION_MARKER}");
        let mut reader = match self.source.open(&entry).await {
            Ok(reader) => reader,
            Err(e) => {
                warn!("Failed to open source version marker '{entry}': {e}");
                return None;
            }
        };
        let mut text = String::new();
        match reader.read_to_string(&mut text).await {
            Ok(_) => Some(text.trim().to_string()),
            Err(e) => {
                warn!("Failed to read source version marker '{entry}': {e}");
                None
            }
        }
    }

    /// Walk the source bundle depth-first, mirroring directories and
    /// streaming file contents in fixed-size chunks.
    async fn copy_tree(&self, bundle: &str, install_root: &Path) -> Result<(), MaterializeError> {
        let mut pending: Vec<(String, PathBuf)> =
            vec![(bundle.to_string(), install_root.to_path_buf())];

        while let Some((dir, target_dir)) = pending.pop() {
            fs::create_dir_all(&target_dir)
                .await
                .map_err(|e| MaterializeError::DestinationWrite {
                    path: target_dir.clone(),
                    source: e,
                })?;

            let names = self
                .source
                .list(&dir)
                .await
                .map_err(|e| MaterializeError::SourceRead {
                    entry: dir.clone(),
                    source: e,
                })?;

            for name in names {
                let entry = format!("{dir}/{name}");
                let target = target_dir.join(&name);

                let is_dir = self
                    .source
                    .is_dir(&entry)
                    .await
                    .map_err(|e| MaterializeError::SourceRead {
                        entry: entry.clone(),
                        source: e,
                    })?;

                if is_dir {
                    pending.push((entry, target));
                } else {
                    self.copy_file(&entry, &target).await?;
                }
            }
        }

        Ok(())
    }

    async fn copy_file(&self, entry: &str, target: &Path) -> Result<(), MaterializeError> {
        let mut reader =
            self.source
                .open(entry)
                .await
                .map_err(|e| MaterializeError::SourceRead {
                    entry: entry.to_string(),
                    source: e,
                })?;

        let mut file = fs::File::create(target)
            .await
            .map_err(|e| MaterializeError::DestinationWrite {
                path: target.to_path_buf(),
                source: e,
            })?;

        let mut buffer = [0u8; COPY_CHUNK_BYTES];
        loop {
            let read = reader
                .read(&mut buffer)
                .await
                .map_err(|e| MaterializeError::SourceRead {
                    entry: entry.to_string(),
                    source: e,
                })?;
            if read == 0 {
                break;
            }
            file.write_all(&buffer[..read])
                .await
                .map_err(|e| MaterializeError::DestinationWrite {
                    path: target.to_path_buf(),
                    source: e,
                })?;
        }

        file.flush()
            .await
            .map_err(|e| MaterializeError::DestinationWrite {
                path: target.to_path_buf(),
                source: e,
            })?;

        Ok(())
    }
}
