//! Time-based removal of finished jobs and orphaned job directories.
//!
//! Three entry points share the store's per-job locking:
//! - periodic sweep: completed jobs older than `max_age`, plus orphan
//!   directories when purge-on-startup is configured
//! - deferred cleanup: one-shot removal `max_age` after an artifact was served
//! - manual sweep: every terminal job and every orphan, right now

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::config::CleanupConfig;
use crate::error::QueueError;
use crate::job::{unix_timestamp, JobId, JobStatus};
use crate::store::JobStore;

#[derive(Clone)]
pub struct CleanupScheduler {
    store: JobStore,
    cfg: CleanupConfig,
    orphan_sweep: bool,
    deferred: Arc<Mutex<HashSet<JobId>>>,
}

impl CleanupScheduler {
    /// `orphan_sweep` lets the periodic pass delete unknown directories.
    pub fn new(store: JobStore, cfg: CleanupConfig, orphan_sweep: bool) -> Self {
        Self {
            store,
            cfg,
            orphan_sweep,
            deferred: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn config(&self) -> &CleanupConfig {
        &self.cfg
    }

    /// Background loop; None when cleanup is disabled. The first sweep runs
    /// one interval after start.
    pub fn spawn_periodic(&self) -> Option<JoinHandle<()>> {
        if !self.cfg.enabled {
            tracing::info!("periodic cleanup disabled");
            return None;
        }
        let this = self.clone();
        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(this.cfg.interval());
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let removed = this.periodic_sweep(unix_timestamp()).await;
                if removed > 0 {
                    tracing::info!(removed, "periodic cleanup");
                }
            }
        }))
    }

    pub async fn periodic_sweep(&self, now: i64) -> usize {
        let mut removed = self.sweep_expired(now).await;
        if self.orphan_sweep {
            removed += self.sweep_orphans().await;
        }
        removed
    }

    /// Removes completed jobs created at least `max_age` before `now`.
    pub async fn sweep_expired(&self, now: i64) -> usize {
        let max_age = self.cfg.max_age_secs as i64;
        let expired = |status: JobStatus, created_at: i64| {
            status == JobStatus::Completed && now.saturating_sub(created_at) >= max_age
        };
        let mut removed = 0;
        for job in self.store.list().await {
            if !expired(job.status, job.created_at) {
                continue;
            }
            let res = self
                .store
                .remove_job(&job.id, |rec| {
                    if expired(rec.status, rec.created_at) {
                        Ok(())
                    } else {
                        Err(QueueError::invalid_state(&rec.id, rec.status, "expire"))
                    }
                })
                .await;
            match res {
                Ok(()) => removed += 1,
                Err(e) => tracing::debug!(job_id = %job.id, "expiry skipped: {}", e),
            }
        }
        removed
    }

    /// Deletes job directories with no matching record.
    pub async fn sweep_orphans(&self) -> usize {
        let dirs = match self.store.persistence().list_job_dirs().await {
            Ok(d) => d,
            Err(e) => {
                tracing::warn!("orphan scan failed: {}", e);
                return 0;
            }
        };
        let mut removed = 0;
        for (name, path) in dirs {
            let known = match JobId::parse(&name) {
                Some(id) => self.store.contains(&id).await,
                None => false,
            };
            if known {
                continue;
            }
            match tokio::fs::remove_dir_all(&path).await {
                Ok(()) => {
                    tracing::info!(dir = %name, "removed orphan job directory");
                    removed += 1;
                }
                Err(e) => tracing::warn!(dir = %name, "orphan removal failed: {}", e),
            }
        }
        removed
    }

    /// Operator sweep: every completed or failed job and every orphan. Ignores `enabled`.
    pub async fn manual_sweep(&self) -> usize {
        let mut removed = 0;
        for job in self.store.list().await {
            if !job.status.is_terminal() {
                continue;
            }
            let res = self
                .store
                .remove_job(&job.id, |rec| {
                    if rec.status.is_terminal() {
                        Ok(())
                    } else {
                        Err(QueueError::invalid_state(&rec.id, rec.status, "sweep"))
                    }
                })
                .await;
            match res {
                Ok(()) => removed += 1,
                Err(e) => tracing::debug!(job_id = %job.id, "sweep skipped: {}", e),
            }
        }
        removed += self.sweep_orphans().await;
        tracing::info!(removed, "manual sweep");
        removed
    }

    /// Schedules one removal of `id` after `max_age`. At most one per job;
    /// None when cleanup is disabled or one is already pending.
    pub fn schedule_deferred(&self, id: JobId) -> Option<JoinHandle<()>> {
        if !self.cfg.enabled {
            return None;
        }
        if !self.lock_deferred().insert(id.clone()) {
            return None;
        }
        let this = self.clone();
        let delay = self.cfg.max_age();
        tracing::debug!(job_id = %id, delay_secs = delay.as_secs(), "deferred cleanup scheduled");
        Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let res = this
                .store
                .remove_job(&id, |rec| {
                    if rec.status == JobStatus::Completed {
                        Ok(())
                    } else {
                        Err(QueueError::invalid_state(&rec.id, rec.status, "expire"))
                    }
                })
                .await;
            match res {
                Ok(()) => tracing::info!(job_id = %id, "deferred cleanup removed job"),
                Err(e) => tracing::debug!(job_id = %id, "deferred cleanup skipped: {}", e),
            }
            this.lock_deferred().remove(&id);
        }))
    }

    fn lock_deferred(&self) -> std::sync::MutexGuard<'_, HashSet<JobId>> {
        // The set holds plain ids; a poisoned guard is still usable.
        self.deferred.lock().unwrap_or_else(|e| e.into_inner())
    }
}
