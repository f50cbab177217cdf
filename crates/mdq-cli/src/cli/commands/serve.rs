//! `mdq serve` – run the queue daemon until SIGINT/SIGTERM.

use anyhow::{Context, Result};
use mdq_core::config::MdqConfig;
use mdq_core::JobQueue;
use std::path::Path;
use std::sync::Arc;

use crate::cli::control_socket;

pub async fn run_serve(cfg: &MdqConfig, socket: &Path) -> Result<()> {
    // Recovery finishes inside start(); only then does the socket accept submissions.
    let queue = Arc::new(JobQueue::start(cfg).await?);
    let server = control_socket::spawn_control_listener(Arc::clone(&queue), socket)?;
    println!("mdq serving on {}", socket.display());

    shutdown_signal().await?;
    tracing::info!("shutting down; running downloads will be resumable after restart");
    server.abort();
    if let Err(e) = std::fs::remove_file(socket) {
        tracing::debug!(path = %socket.display(), "could not remove control socket: {}", e);
    }
    Ok(())
}

#[cfg(unix)]
async fn shutdown_signal() -> Result<()> {
    use tokio::signal::unix::{signal, SignalKind};
    let mut term = signal(SignalKind::terminate()).context("install SIGTERM handler")?;
    tokio::select! {
        res = tokio::signal::ctrl_c() => res.context("wait for ctrl-c")?,
        _ = term.recv() => {}
    }
    Ok(())
}

#[cfg(not(unix))]
async fn shutdown_signal() -> Result<()> {
    tokio::signal::ctrl_c().await.context("wait for ctrl-c")
}
