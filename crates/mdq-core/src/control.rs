//! Control over running downloader processes.
//!
//! Each active job's record holds a `ProcessHandle`. Cancelling takes the handle
//! out of the record and fires its signal; the launcher waiting on the child
//! sees the signal and terminates the process (SIGTERM, then kill after a grace
//! period on unix).

use std::io;
use std::path::PathBuf;
use std::process::ExitStatus;
use std::time::Duration;

use tokio::process::Child;
use tokio::sync::oneshot;

/// How long a child gets to exit after SIGTERM before it is killed.
pub const TERMINATE_GRACE: Duration = Duration::from_secs(5);

/// Receiving side of a cancellation request, held by the launcher.
pub type CancelSignal = oneshot::Receiver<()>;

/// Non-persisted handle to a live downloader process.
#[derive(Debug)]
pub struct ProcessHandle {
    pid: Option<u32>,
    cancel_tx: oneshot::Sender<()>,
}

impl ProcessHandle {
    pub fn new(pid: Option<u32>) -> (Self, CancelSignal) {
        let (cancel_tx, cancel_rx) = oneshot::channel();
        (Self { pid, cancel_tx }, cancel_rx)
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Asks the launcher to stop the process. Returns false if the launcher already let go.
    pub fn request_cancel(self) -> bool {
        self.cancel_tx.send(()).is_ok()
    }
}

/// Stops `child`: SIGTERM first (unix), hard kill if it is still alive after `grace`.
pub async fn terminate_child(child: &mut Child, grace: Duration) -> io::Result<ExitStatus> {
    #[cfg(unix)]
    if let Some(pid) = child.id() {
        // SAFETY: plain kill(2) on a pid we spawned and have not yet reaped.
        let rc = unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) };
        if rc == 0 {
            if let Ok(status) = tokio::time::timeout(grace, child.wait()).await {
                return status;
            }
            tracing::debug!(pid, "child ignored SIGTERM, killing");
        }
    }
    #[cfg(not(unix))]
    let _ = grace;

    child.kill().await?;
    child.wait().await
}

/// Default path for the daemon's control socket (same XDG state dir as the jobs).
pub fn default_control_socket_path() -> io::Result<PathBuf> {
    let dir = xdg::BaseDirectories::with_prefix("mdq")?.get_state_home();
    Ok(dir.join("control.sock"))
}
