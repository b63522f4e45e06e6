//! Filesystem-backed asset source
//!
//! Serves the packaged read-only bundle from a plain directory. Directory
//! detection uses real metadata; listings are sorted for deterministic
//! copy order.

use std::path::PathBuf;
use tokio::fs;
use tokio::io::AsyncRead;

use crate::traits::AssetSource;

/// Asset source rooted at a directory on disk
pub struct DirAssetSource {
    root: PathBuf,
}

impl DirAssetSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        if path.is_empty() {
            self.root.clone()
        } else {
            path.split('/').fold(self.root.clone(), |p, seg| p.join(seg))
        }
    }
}

#[async_trait::async_trait]
impl AssetSource for DirAssetSource {
    async fn list(&self, dir: &str) -> std::io::Result<Vec<String>> {
        let mut entries = fs::read_dir(self.resolve(dir)).await?;
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        Ok(names)
    }

    async fn is_dir(&self, path: &str) -> std::io::Result<bool> {
        Ok(fs::metadata(self.resolve(path)).await?.is_dir())
    }

    async fn open(&self, path: &str) -> std::io::Result<Box<dyn AsyncRead + Send + Unpin>> {
        let file = fs::File::open(self.resolve(path)).await?;
        Ok(Box::new(file))
    }
}
