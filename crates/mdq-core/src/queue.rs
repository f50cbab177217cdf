//! Public queue API: submit, list, cancel, resume, remove, sweep, and artifact reads.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::task::JoinHandle;

use crate::archive::{Archiver, CommandArchiver};
use crate::artifact::{self, ArtifactError, ArtifactRead};
use crate::cleanup::CleanupScheduler;
use crate::config::MdqConfig;
use crate::error::QueueError;
use crate::job::{
    unix_timestamp, url_has_playlist_param, JobId, JobRecord, JobStatus, JobSummary,
    SubmitRequest,
};
use crate::launcher::Launcher;
use crate::persist::{self, Persistence, Write};
use crate::store::JobStore;

pub const CANCELLED_MESSAGE: &str = "Cancelled by user";

/// Running queue. Dropping it stops the periodic cleanup loop; launched
/// downloads keep running on their own tasks.
pub struct JobQueue {
    store: JobStore,
    launcher: Arc<Launcher>,
    cleanup: CleanupScheduler,
    periodic: Option<JoinHandle<()>>,
}

impl JobQueue {
    /// Recovers persisted jobs and starts the queue with the platform archiver.
    pub async fn start(cfg: &MdqConfig) -> Result<Self> {
        let jobs_dir = cfg.resolve_jobs_dir()?;
        let archiver = Arc::new(CommandArchiver::from_config(&cfg.archiver));
        Self::start_with(cfg, jobs_dir, archiver).await
    }

    /// Like `start` with an explicit jobs directory and archiver.
    /// Recovery completes before this returns, so nothing can be submitted earlier.
    pub async fn start_with(
        cfg: &MdqConfig,
        jobs_dir: PathBuf,
        archiver: Arc<dyn Archiver>,
    ) -> Result<Self> {
        tokio::fs::create_dir_all(&jobs_dir)
            .await
            .with_context(|| format!("create jobs dir {}", jobs_dir.display()))?;
        let persistence = Persistence::new(&jobs_dir);
        let report = persist::recover(&persistence, cfg.purge_on_startup)
            .await
            .with_context(|| format!("recover jobs from {}", jobs_dir.display()))?;
        for name in &report.unreadable {
            tracing::warn!(dir = %name, "job directory skipped during recovery");
        }

        let store = JobStore::from_records(persistence, cfg.status_write_interval(), report.jobs);
        let launcher = Arc::new(Launcher::new(
            store.clone(),
            cfg.downloader.clone(),
            archiver,
            cfg.max_concurrent_jobs,
        ));
        let cleanup = CleanupScheduler::new(store.clone(), cfg.cleanup.clone(), cfg.purge_on_startup);
        let periodic = cleanup.spawn_periodic();
        tracing::info!(jobs_dir = %jobs_dir.display(), jobs = store.len().await, "job queue started");

        Ok(Self {
            store,
            launcher,
            cleanup,
            periodic,
        })
    }

    pub fn store(&self) -> &JobStore {
        &self.store
    }

    pub fn cleanup(&self) -> &CleanupScheduler {
        &self.cleanup
    }

    /// Creates a pending job, persists it and dispatches the download. Returns at once.
    pub async fn submit(&self, req: SubmitRequest) -> Result<JobId, QueueError> {
        let req = validate(req)?;
        let is_playlist = req
            .playlist_hint
            .unwrap_or_else(|| url_has_playlist_param(&req.url));
        let rec = JobRecord::new(JobId::new(), &req, is_playlist, unix_timestamp());
        let id = rec.id.clone();
        self.store.insert(rec).await;

        if let Err(e) = self.store.persistence().create_job_dir(&id).await {
            tracing::warn!(job_id = %id, "could not create job dir: {}", e);
            let _ = self.store.remove_job(&id, |_| Ok(())).await;
            return Err(QueueError::Io(e));
        }
        self.store.mutate(&id, |_| ((), Write::Both)).await;

        tracing::info!(
            job_id = %id,
            url = %req.url,
            format = req.format.as_str(),
            quality = %req.quality,
            playlist = is_playlist,
            "job submitted"
        );
        self.launcher.dispatch(id.clone(), false);
        Ok(id)
    }

    pub async fn list(&self) -> Vec<JobSummary> {
        self.store.list().await
    }

    pub async fn get(&self, id: &JobId) -> Result<JobSummary, QueueError> {
        self.store
            .summary(id)
            .await
            .ok_or_else(|| QueueError::NotFound(id.clone()))
    }

    /// Stops a pending or running job: signals the process, deletes the job
    /// directory, and marks the job failed with "Cancelled by user".
    pub async fn cancel(&self, id: &JobId) -> Result<(), QueueError> {
        let (signalled, pid) = self
            .store
            .mutate(id, |rec| {
                if !(rec.status.is_active() || rec.status == JobStatus::Pending) {
                    return (
                        Err(QueueError::invalid_state(&rec.id, rec.status, "cancel")),
                        Write::None,
                    );
                }
                let signal = match rec.process.take() {
                    Some(p) => {
                        let pid = p.pid();
                        (p.request_cancel(), pid)
                    }
                    None => (false, None),
                };
                rec.finish_failed(CANCELLED_MESSAGE);
                (Ok(signal), Write::None)
            })
            .await
            .ok_or_else(|| QueueError::NotFound(id.clone()))??;

        if let Err(e) = self.store.persistence().remove_job_dir(id).await {
            tracing::warn!(job_id = %id, "could not delete cancelled job dir: {}", e);
        }
        tracing::info!(job_id = %id, signalled, pid = ?pid, "job cancelled");
        Ok(())
    }

    /// Restarts an interrupted job with the downloader's continue flag.
    pub async fn resume(&self, id: &JobId) -> Result<(), QueueError> {
        self.store
            .mutate(id, |rec| {
                if rec.status != JobStatus::Interrupted {
                    return (
                        Err(QueueError::invalid_state(&rec.id, rec.status, "resume")),
                        Write::None,
                    );
                }
                rec.reset_for_resume();
                (Ok(()), Write::Both)
            })
            .await
            .ok_or_else(|| QueueError::NotFound(id.clone()))??;

        tracing::info!(job_id = %id, "job resumed");
        self.launcher.dispatch(id.clone(), true);
        Ok(())
    }

    /// Deletes a completed or failed job and its directory.
    pub async fn remove(&self, id: &JobId) -> Result<(), QueueError> {
        self.store
            .remove_job(id, |rec| {
                if rec.status.is_terminal() {
                    Ok(())
                } else {
                    Err(QueueError::invalid_state(&rec.id, rec.status, "remove"))
                }
            })
            .await
    }

    /// Manual sweep; returns how many jobs and orphan directories were removed.
    pub async fn sweep(&self) -> usize {
        self.cleanup.manual_sweep().await
    }

    /// Opens a completed job's artifact, optionally limited to an HTTP-style byte range.
    pub async fn open_artifact(
        &self,
        id: &JobId,
        range: Option<&str>,
    ) -> Result<ArtifactRead, ArtifactError> {
        let handle = self
            .store
            .get(id)
            .await
            .ok_or_else(|| ArtifactError::NotFound(id.clone()))?;
        let path = {
            let rec = handle.lock().await;
            match (&rec.output_path, rec.status) {
                (Some(p), JobStatus::Completed) => p.clone(),
                _ => {
                    return Err(ArtifactError::NotCompleted {
                        id: id.clone(),
                        status: rec.status,
                    })
                }
            }
        };
        artifact::open_range(&path, range).await
    }

    /// Records that the artifact was delivered; schedules the deferred cleanup.
    /// Returns false when nothing was scheduled.
    pub async fn mark_served(&self, id: &JobId) -> Result<bool, QueueError> {
        let summary = self.get(id).await?;
        if summary.status != JobStatus::Completed {
            return Err(QueueError::invalid_state(id, summary.status, "mark served"));
        }
        Ok(self.cleanup.schedule_deferred(id.clone()).is_some())
    }
}

impl Drop for JobQueue {
    fn drop(&mut self) {
        if let Some(h) = self.periodic.take() {
            h.abort();
        }
    }
}

fn validate(mut req: SubmitRequest) -> Result<SubmitRequest, QueueError> {
    req.url = req.url.trim().to_string();
    let parsed = url::Url::parse(&req.url)
        .map_err(|e| QueueError::InvalidRequest(format!("bad url {:?}: {}", req.url, e)))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(QueueError::InvalidRequest(format!(
            "unsupported url scheme {:?}",
            parsed.scheme()
        )));
    }
    req.quality = req.quality.trim().to_string();
    if req.quality.is_empty() {
        req.quality = "best".to_string();
    }
    Ok(req)
}
