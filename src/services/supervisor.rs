//! Runtime process supervisor
//!
//! Owns the single live child process: spawn with merged environment,
//! asynchronous output draining, exit-code recording, and graceful
//! SIGTERM-then-SIGKILL shutdown. The live handle is never exposed; all
//! access goes through `start`/`stop` behind one lock.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::error::{SpawnError, StopError};

/// Invocation for the supervised runtime: `<binary> <script>` with
/// environment overrides merged over the inherited host environment.
#[derive(Debug, Clone)]
pub struct LaunchSpec {
    pub binary: PathBuf,
    pub script: PathBuf,
    pub env: Vec<(String, String)>,
}

/// Tracked state for the live child. The waiter task owns the `Child`
/// itself; the handle only carries what stop needs.
struct ProcessHandle {
    pid: u32,
    exit: watch::Receiver<Option<i32>>,
}

/// Supervisor for the bundled runtime process
pub struct NodeSupervisor {
    /// At most one live child per supervisor instance
    active: Mutex<Option<ProcessHandle>>,

    /// Exit code of the most recently exited child, for diagnostics
    last_exit: Arc<Mutex<Option<i32>>>,

    /// Bound on each wait-for-exit phase during stop
    stop_timeout: Duration,

    /// Optional tap receiving every drained output line, in order
    line_tap: Option<mpsc::Sender<String>>,
}

impl NodeSupervisor {
    pub fn new() -> Self {
        Self {
            active: Mutex::new(None),
            last_exit: Arc::new(Mutex::new(None)),
            stop_timeout: Duration::from_secs(10),
            line_tap: None,
        }
    }

    /// Configure the stop wait bound (fluent API)
    pub fn with_stop_timeout(mut self, stop_timeout: Duration) -> Self {
        self.stop_timeout = stop_timeout;
        self
    }

    /// Mirror drained output lines into a channel (fluent API)
    pub fn with_line_tap(mut self, tap: mpsc::Sender<String>) -> Self {
        self.line_tap = Some(tap);
        self
    }

    /// Spawn the runtime. If a child is already live, it is stopped first;
    /// two untracked children can never exist.
    pub async fn start(&self, spec: &LaunchSpec) -> Result<(), SpawnError> {
        let mut active = self.active.lock().await;

        if let Some(handle) = active.take() {
            if handle.exit.borrow().is_none() {
                debug!("Runtime already live (pid {}), stopping before restart", handle.pid);
                if let Err(e) = self.terminate(handle).await {
                    warn!("Stop before restart failed: {e}");
                }
            }
        }

        if !spec.binary.exists() {
            return Err(SpawnError::BinaryMissing {
                path: spec.binary.clone(),
            });
        }
        if !spec.script.exists() {
            return Err(SpawnError::ScriptMissing {
                path: spec.script.clone(),
            });
        }

        let mut cmd = Command::new(&spec.binary);
        cmd.arg(&spec.script);
        for (name, value) in &spec.env {
            cmd.env(name, value);
        }
        cmd.stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .stdin(Stdio::null());

        let mut child = cmd.spawn().map_err(|e| SpawnError::Spawn { source: e })?;
        let pid = child.id().unwrap_or(0);

        // Drain both streams into the logging sink so the child's output
        // buffers can never fill up and block it. The tasks end at EOF.
        let stdout_task = Self::drain(child.stdout.take(), self.line_tap.clone());
        let stderr_task = Self::drain(child.stderr.take(), self.line_tap.clone());

        let (exit_tx, exit_rx) = watch::channel(None);
        let last_exit = Arc::clone(&self.last_exit);
        tokio::spawn(async move {
            // Streams hit EOF at child exit, so joining the drain tasks
            // first guarantees every line is observed before the exit code
            // is recorded.
            let _ = stdout_task.await;
            let _ = stderr_task.await;

            let code = match child.wait().await {
                Ok(status) => {
                    let code = status.code().unwrap_or(-1);
                    debug!("Runtime (pid {pid}) exited: {status}");
                    code
                }
                Err(e) => {
                    error!("Failed waiting on runtime (pid {pid}): {e}");
                    -1
                }
            };
            *last_exit.lock().await = Some(code);
            let _ = exit_tx.send(Some(code));
        });

        info!("🚀 Spawned runtime (pid {pid}): {} {}", spec.binary.display(), spec.script.display());
        *active = Some(ProcessHandle { pid, exit: exit_rx });
        Ok(())
    }

    /// Stop the runtime if one is tracked. Idempotent: with no live child
    /// this is a no-op success and performs no OS calls. The tracked handle
    /// is cleared even when the wait fails.
    pub async fn stop(&self) -> Result<(), StopError> {
        let mut active = self.active.lock().await;
        match active.take() {
            None => Ok(()),
            Some(handle) => {
                debug!("🛑 Stopping runtime (pid {})", handle.pid);
                self.terminate(handle).await
            }
        }
    }

    /// Stop any live runtime and spawn a fresh one
    pub async fn restart(&self, spec: &LaunchSpec) -> Result<(), SpawnError> {
        if let Err(e) = self.stop().await {
            warn!("Stop during restart failed: {e}");
        }
        self.start(spec).await
    }

    /// Whether a tracked child is still live
    pub async fn is_running(&self) -> bool {
        let active = self.active.lock().await;
        matches!(active.as_ref(), Some(handle) if handle.exit.borrow().is_none())
    }

    /// Exit code of the most recently exited child
    pub async fn last_exit_code(&self) -> Option<i32> {
        *self.last_exit.lock().await
    }

    /// Request termination and wait (bounded) for the waiter task to
    /// confirm exit, escalating to SIGKILL once.
    async fn terminate(&self, mut handle: ProcessHandle) -> Result<(), StopError> {
        if handle.exit.borrow().is_some() {
            return Ok(());
        }

        Self::signal(handle.pid, false);
        match timeout(self.stop_timeout, handle.exit.changed()).await {
            Ok(_) => {
                debug!("Runtime (pid {}) stopped", handle.pid);
                Ok(())
            }
            Err(_) => {
                warn!("Runtime (pid {}) ignored termination request, killing", handle.pid);
                Self::signal(handle.pid, true);
                match timeout(self.stop_timeout, handle.exit.changed()).await {
                    Ok(_) => Ok(()),
                    Err(_) => Err(StopError::WaitTimeout { pid: handle.pid }),
                }
            }
        }
    }

    #[cfg(unix)]
    fn signal(pid: u32, force: bool) {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        // pid 0 would signal the whole process group
        if pid == 0 {
            return;
        }
        let signal = if force { Signal::SIGKILL } else { Signal::SIGTERM };
        if let Err(e) = kill(Pid::from_raw(pid as i32), signal) {
            // ESRCH just means the child already exited
            debug!("Signal {signal} to pid {pid} failed: {e}");
        }
    }

    #[cfg(not(unix))]
    fn signal(_pid: u32, _force: bool) {}

    /// Forward one piped stream line-by-line to the logging sink (and the
    /// optional tap), terminating naturally on EOF.
    fn drain<R>(
        stream: Option<R>,
        tap: Option<mpsc::Sender<String>>,
    ) -> tokio::task::JoinHandle<()>
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        tokio::spawn(async move {
            let Some(stream) = stream else {
                return;
            };
            let mut lines = BufReader::new(stream).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                info!(target: "runtime", "{line}");
                if let Some(ref tap) = tap {
                    let _ = tap.send(line).await;
                }
            }
        })
    }
}

impl Default for NodeSupervisor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use tempfile::TempDir;
    use tokio::fs;

    async fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, body).await.unwrap();
        path
    }

    fn sh_spec(script: PathBuf) -> LaunchSpec {
        LaunchSpec {
            binary: PathBuf::from("/bin/sh"),
            script,
            env: Vec::new(),
        }
    }

    async fn wait_until_exited(supervisor: &NodeSupervisor) {
        for _ in 0..200 {
            if !supervisor.is_running().await {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("runtime did not exit in time");
    }

    #[tokio::test]
    async fn test_stop_without_start_is_noop() {
        let supervisor = NodeSupervisor::new();
        assert!(supervisor.stop().await.is_ok());
        assert!(supervisor.stop().await.is_ok());
    }

    #[tokio::test]
    async fn test_start_missing_binary() {
        let temp = TempDir::new().unwrap();
        let script = write_script(temp.path(), "main.cjs", "").await;
        let supervisor = NodeSupervisor::new();

        let spec = LaunchSpec {
            binary: temp.path().join("no-such-binary"),
            script,
            env: Vec::new(),
        };
        let result = supervisor.start(&spec).await;
        assert!(matches!(result, Err(SpawnError::BinaryMissing { .. })));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_start_missing_script() {
        let temp = TempDir::new().unwrap();
        let supervisor = NodeSupervisor::new();

        let spec = LaunchSpec {
            binary: PathBuf::from("/bin/sh"),
            script: temp.path().join("missing.sh"),
            env: Vec::new(),
        };
        let result = supervisor.start(&spec).await;
        assert!(matches!(result, Err(SpawnError::ScriptMissing { .. })));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_output_drained_in_order_before_exit_recorded() {
        let temp = TempDir::new().unwrap();
        let script =
            write_script(temp.path(), "emit.sh", "echo one\necho two\necho three\n").await;

        let (tap_tx, mut tap_rx) = mpsc::channel(16);
        let supervisor = NodeSupervisor::new().with_line_tap(tap_tx);
        supervisor.start(&sh_spec(script)).await.unwrap();

        wait_until_exited(&supervisor).await;
        assert_eq!(supervisor.last_exit_code().await, Some(0));

        // Exit was recorded, so every line must already be in the tap.
        let mut lines = Vec::new();
        while let Ok(line) = tap_rx.try_recv() {
            lines.push(line);
        }
        assert_eq!(lines, vec!["one", "two", "three"]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_stderr_is_captured_too() {
        let temp = TempDir::new().unwrap();
        let script = write_script(temp.path(), "err.sh", "echo oops 1>&2\n").await;

        let (tap_tx, mut tap_rx) = mpsc::channel(16);
        let supervisor = NodeSupervisor::new().with_line_tap(tap_tx);
        supervisor.start(&sh_spec(script)).await.unwrap();

        wait_until_exited(&supervisor).await;
        assert_eq!(tap_rx.try_recv().unwrap(), "oops");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_env_overrides_merge_over_inherited() {
        let temp = TempDir::new().unwrap();
        let script = write_script(
            temp.path(),
            "env.sh",
            "echo \"$HARNESS_OVERRIDDEN:$HARNESS_INHERITED\"\n",
        )
        .await;

        std::env::set_var("HARNESS_OVERRIDDEN", "parent");
        std::env::set_var("HARNESS_INHERITED", "inherited");

        let (tap_tx, mut tap_rx) = mpsc::channel(16);
        let supervisor = NodeSupervisor::new().with_line_tap(tap_tx);
        let mut spec = sh_spec(script);
        spec.env
            .push(("HARNESS_OVERRIDDEN".to_string(), "child".to_string()));
        supervisor.start(&spec).await.unwrap();

        wait_until_exited(&supervisor).await;
        assert_eq!(tap_rx.try_recv().unwrap(), "child:inherited");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_stop_live_process_and_stop_again() {
        let temp = TempDir::new().unwrap();
        let script = write_script(temp.path(), "sleep.sh", "sleep 30\n").await;

        let supervisor = NodeSupervisor::new().with_stop_timeout(Duration::from_secs(5));
        supervisor.start(&sh_spec(script)).await.unwrap();
        assert!(supervisor.is_running().await);

        assert!(supervisor.stop().await.is_ok());
        assert!(!supervisor.is_running().await);
        assert!(supervisor.stop().await.is_ok());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_start_while_running_replaces_child() {
        let temp = TempDir::new().unwrap();
        let script = write_script(temp.path(), "sleep.sh", "sleep 30\n").await;

        let supervisor = NodeSupervisor::new().with_stop_timeout(Duration::from_secs(5));
        let spec = sh_spec(script);
        supervisor.start(&spec).await.unwrap();
        supervisor.start(&spec).await.unwrap();
        assert!(supervisor.is_running().await);

        assert!(supervisor.stop().await.is_ok());
        assert!(!supervisor.is_running().await);
    }
}
