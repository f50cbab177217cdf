//! Job launcher: one detached task per run.
//!
//! A run spawns the downloader, drains stdout and stderr on two reader tasks,
//! feeds every line through the rule table into the store, and applies the
//! completion policy once the process exits. All write-backs go through
//! `JobStore::mutate` and are dropped when the run no longer owns the job
//! (cancelled, or superseded by a later resume).

mod args;
mod finish;
mod process;

pub use args::{build_args, LaunchPlan, PLAYLIST_TEMPLATE, SINGLE_TEMPLATE};
pub use finish::{resolve_outcome, FinishInput, Outcome, BUNDLE_EXT, NO_OUTPUT_MESSAGE};
pub use process::{spawn_downloader, spawn_reader, Stream};

use std::io;
use std::path::PathBuf;
use std::process::ExitStatus;
use std::sync::Arc;
use std::time::Instant;

use tokio::process::Child;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinHandle;

use crate::archive::Archiver;
use crate::config::DownloaderConfig;
use crate::control::{terminate_child, CancelSignal, ProcessHandle, TERMINATE_GRACE};
use crate::extractor::{condense_error_line, RuleSet};
use crate::job::{JobId, JobStatus};
use crate::persist::Write;
use crate::queue::CANCELLED_MESSAGE;
use crate::store::JobStore;

/// Prefix of the failure message when the downloader cannot be started.
pub const SPAWN_FAILED_PREFIX: &str = "Failed to start downloader";

pub struct Launcher {
    store: JobStore,
    downloader: DownloaderConfig,
    archiver: Arc<dyn Archiver>,
    rules: Arc<RuleSet>,
    limiter: Option<Arc<Semaphore>>,
}

/// State handed from the locked start step to the unlocked wait step.
struct Running {
    plan: LaunchPlan,
    child: Child,
    cancel_rx: CancelSignal,
}

enum Ownership {
    Owned,
    Cancelled,
    Superseded,
}

enum Waited {
    Exited(io::Result<ExitStatus>),
    Cancelled,
}

impl Launcher {
    pub fn new(
        store: JobStore,
        downloader: DownloaderConfig,
        archiver: Arc<dyn Archiver>,
        max_concurrent: Option<usize>,
    ) -> Self {
        Self {
            store,
            downloader,
            archiver,
            rules: Arc::new(RuleSet::standard()),
            limiter: max_concurrent
                .filter(|n| *n > 0)
                .map(|n| Arc::new(Semaphore::new(n))),
        }
    }

    /// Starts a run for `id` on its own task.
    pub fn dispatch(self: &Arc<Self>, id: JobId, resume: bool) -> JoinHandle<()> {
        let this = Arc::clone(self);
        tokio::spawn(async move { this.run_job(id, resume).await })
    }

    /// Drives one run to its end. Only a `pending` job is started.
    pub async fn run_job(&self, id: JobId, resume: bool) {
        let _permit = match &self.limiter {
            Some(sem) => match Arc::clone(sem).acquire_owned().await {
                Ok(p) => Some(p),
                Err(_) => return,
            },
            None => None,
        };

        let Some(running) = self.start(&id, resume).await else {
            return;
        };
        let Running {
            plan,
            mut child,
            mut cancel_rx,
        } = running;

        let (tx, rx) = mpsc::unbounded_channel();
        let mut readers = Vec::with_capacity(2);
        if let Some(out) = child.stdout.take() {
            readers.push(spawn_reader(out, Stream::Stdout, tx.clone()));
        }
        if let Some(err) = child.stderr.take() {
            readers.push(spawn_reader(err, Stream::Stderr, tx.clone()));
        }
        drop(tx);
        let consumer = tokio::spawn(consume_lines(
            self.store.clone(),
            Arc::clone(&self.rules),
            id.clone(),
            plan.generation,
            rx,
        ));

        let waited = tokio::select! {
            status = child.wait() => Waited::Exited(status),
            Ok(()) = &mut cancel_rx => Waited::Cancelled,
        };

        let exit = match waited {
            Waited::Cancelled => {
                match terminate_child(&mut child, TERMINATE_GRACE).await {
                    Ok(status) => tracing::info!(job_id = %id, %status, "downloader stopped after cancel"),
                    Err(e) => tracing::warn!(job_id = %id, "could not stop downloader: {}", e),
                }
                join_all(readers).await;
                let _ = consumer.await;
                // The child may have written more files after cancel removed the directory.
                if let Err(e) = self.store.persistence().remove_job_dir(&id).await {
                    tracing::warn!(job_id = %id, "cleanup after cancel failed: {}", e);
                }
                return;
            }
            Waited::Exited(status) => status,
        };

        join_all(readers).await;
        let last_error = consumer.await.unwrap_or_default();
        match &exit {
            Ok(status) => tracing::info!(job_id = %id, %status, "downloader exited"),
            Err(e) => tracing::warn!(job_id = %id, "waiting on downloader failed: {}", e),
        }

        // Playlist title as the extractor left it, and whether we still own the job.
        let title = self
            .store
            .mutate(&id, |rec| {
                let owned = if rec.is_run_current(plan.generation) {
                    Ownership::Owned
                } else if rec.run_generation == plan.generation
                    && rec.error_message.as_deref() == Some(CANCELLED_MESSAGE)
                {
                    Ownership::Cancelled
                } else {
                    Ownership::Superseded
                };
                ((owned, rec.playlist.playlist_title.clone()), Write::None)
            })
            .await;
        let playlist_title = match title {
            Some((Ownership::Owned, t)) => t,
            Some((Ownership::Cancelled, _)) => {
                // Cancelled while the child was exiting; it may have written after the first delete.
                tracing::debug!(job_id = %id, "run cancelled before finish; removing leftovers");
                if let Err(e) = self.store.persistence().remove_job_dir(&id).await {
                    tracing::warn!(job_id = %id, "cleanup after cancel failed: {}", e);
                }
                return;
            }
            _ => {
                tracing::debug!(job_id = %id, "run superseded before finish; dropping result");
                return;
            }
        };

        let dir = self.store.persistence().job_dir(&id);
        let outcome = resolve_outcome(
            FinishInput {
                dir: &dir,
                format: plan.format,
                is_playlist: plan.is_playlist,
                playlist_title: playlist_title.as_deref(),
                last_error,
            },
            self.archiver.as_ref(),
        )
        .await;

        let applied = self
            .store
            .mutate(&id, |rec| {
                if !rec.is_run_current(plan.generation) {
                    return (false, Write::None);
                }
                match &outcome {
                    Outcome::Completed(path) => rec.finish_completed(path.clone()),
                    Outcome::Failed(msg) => rec.finish_failed(msg.clone()),
                }
                (true, Write::Both)
            })
            .await
            .unwrap_or(false);

        if !applied {
            tracing::debug!(job_id = %id, "job changed while finishing; result dropped");
            return;
        }
        match outcome {
            Outcome::Completed(path) => {
                tracing::info!(job_id = %id, output = %path.display(), "job completed")
            }
            Outcome::Failed(msg) => tracing::warn!(job_id = %id, error = %msg, "job failed"),
        }
    }

    /// Under the job lock: pending → running with a live child, or → failed if
    /// the spawn fails. Returns None when there is nothing to run.
    async fn start(&self, id: &JobId, resume: bool) -> Option<Running> {
        let dir = self.store.persistence().job_dir(id);
        let cookies = self.cookie_file().await;

        let started = self
            .store
            .mutate(id, |rec| {
                if rec.status != JobStatus::Pending {
                    tracing::debug!(job_id = %rec.id, status = %rec.status, "not pending; launch skipped");
                    return (None, Write::None);
                }
                let plan = LaunchPlan::from_record(rec);
                let args = build_args(&plan, &self.downloader, &dir, resume, cookies.as_deref());
                tracing::debug!(job_id = %rec.id, program = %self.downloader.binary, ?args, "spawning downloader");
                match spawn_downloader(&self.downloader.binary, &args, &dir) {
                    Ok(child) => {
                        let (handle, cancel_rx) = ProcessHandle::new(child.id());
                        rec.start_run(handle);
                        tracing::info!(
                            job_id = %rec.id,
                            pid = ?child.id(),
                            playlist = plan.is_playlist,
                            resume,
                            "download started"
                        );
                        (
                            Some(Running {
                                plan,
                                child,
                                cancel_rx,
                            }),
                            Write::Both,
                        )
                    }
                    Err(e) => {
                        tracing::warn!(job_id = %rec.id, "spawn failed: {}", e);
                        rec.finish_failed(format!("{SPAWN_FAILED_PREFIX}: {e}"));
                        (None, Write::Both)
                    }
                }
            })
            .await;
        started.flatten()
    }

    async fn cookie_file(&self) -> Option<PathBuf> {
        let path = self.downloader.cookies_file.as_ref()?;
        if tokio::fs::try_exists(path).await.unwrap_or(false) {
            Some(path.clone())
        } else {
            tracing::debug!(path = %path.display(), "cookie file not found; not passed");
            None
        }
    }
}

/// Classifies lines from both readers into the job. Returns the last condensed error line.
async fn consume_lines(
    store: JobStore,
    rules: Arc<RuleSet>,
    id: JobId,
    generation: u64,
    mut rx: mpsc::UnboundedReceiver<(Stream, String)>,
) -> Option<String> {
    let throttle = store.status_throttle();
    let mut last_error = None;
    while let Some((stream, line)) = rx.recv().await {
        tracing::trace!(job_id = %id, stream = stream.as_str(), "{}", line);
        if let Some(err) = condense_error_line(&line) {
            last_error = Some(err);
        }
        let Some(event) = rules.classify(&line) else {
            continue;
        };
        store
            .mutate(&id, |rec| {
                if !rec.is_run_current(generation) {
                    return ((), Write::None);
                }
                ((), rec.apply_event(event, Instant::now(), throttle))
            })
            .await;
    }
    last_error
}

async fn join_all(handles: Vec<JoinHandle<()>>) {
    for h in handles {
        let _ = h.await;
    }
}
