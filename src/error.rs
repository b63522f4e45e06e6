//! Harness-specific error types

use std::path::PathBuf;
use thiserror::Error;

/// Errors from bundle materialization into writable storage
#[derive(Error, Debug)]
pub enum MaterializeError {
    #[error("failed to read source bundle entry '{entry}': {source}")]
    SourceRead {
        entry: String,
        source: std::io::Error,
    },

    #[error("failed to write '{path}': {source}")]
    DestinationWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to delete stale install tree '{path}': {source}")]
    Cleanup {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Errors from executable-permission bootstrapping
#[derive(Error, Debug)]
pub enum PermissionError {
    #[error("file does not exist: {path}")]
    Missing { path: PathBuf },

    #[error("failed to set execute permission on '{path}': {source}")]
    Chmod {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Errors from starting the supervised child process
#[derive(Error, Debug)]
pub enum SpawnError {
    #[error("runtime binary does not exist: {path}")]
    BinaryMissing { path: PathBuf },

    #[error("entry script does not exist: {path}")]
    ScriptMissing { path: PathBuf },

    #[error("failed to spawn runtime process: {source}")]
    Spawn { source: std::io::Error },
}

/// Errors from stopping the supervised child process
#[derive(Error, Debug)]
pub enum StopError {
    #[error("timed out waiting for runtime (pid {pid}) to exit")]
    WaitTimeout { pid: u32 },
}

/// Probe transport/status failures. These drive the retry loop and are
/// never propagated out of the prober.
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("transport error: {message}")]
    Transport { message: String },

    #[error("unexpected status: {status}")]
    Status { status: u16 },
}

/// Top-level error for the harness binary
#[derive(Error, Debug)]
pub enum HarnessError {
    #[error("configuration error: {message}")]
    Config { message: String },

    #[error(transparent)]
    Materialize(#[from] MaterializeError),

    #[error(transparent)]
    Permission(#[from] PermissionError),

    #[error(transparent)]
    Spawn(#[from] SpawnError),

    #[error(transparent)]
    Stop(#[from] StopError),
}

impl HarnessError {
    pub fn config(message: impl Into<String>) -> Self {
        HarnessError::Config {
            message: message.into(),
        }
    }
}

pub type HarnessResult<T> = Result<T, HarnessError>;
