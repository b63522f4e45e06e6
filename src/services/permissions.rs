//! Executable-permission bootstrapping
//!
//! The materializer copies file contents only, so the extracted runtime
//! binary lands without its execute bit. Failures here are reportable but
//! non-fatal: a spawn attempt against a non-executable binary surfaces the
//! real problem loudly.

use std::path::Path;
use tokio::fs;
use tracing::debug;

use crate::error::PermissionError;

/// Grant owner/group/other execute on `path` (mode 0755).
pub async fn ensure_executable(path: &Path) -> Result<(), PermissionError> {
    let metadata = fs::metadata(path)
        .await
        .map_err(|_| PermissionError::Missing {
            path: path.to_path_buf(),
        })?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;

        let mut permissions = metadata.permissions();
        permissions.set_mode(0o755);
        fs::set_permissions(path, permissions)
            .await
            .map_err(|e| PermissionError::Chmod {
                path: path.to_path_buf(),
                source: e,
            })?;
        debug!("🔑 Set execute permission on {}", path.display());
    }

    #[cfg(not(unix))]
    {
        let _ = metadata;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_missing_file_is_an_error() {
        let temp = TempDir::new().unwrap();
        let result = ensure_executable(&temp.path().join("no-such-binary")).await;
        assert!(matches!(result, Err(PermissionError::Missing { .. })));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_sets_execute_bits() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let binary = temp.path().join("node");
        fs::write(&binary, b"#!binary").await.unwrap();

        ensure_executable(&binary).await.unwrap();

        let mode = fs::metadata(&binary).await.unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
    }
}
