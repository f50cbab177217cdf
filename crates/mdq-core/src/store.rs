//! Authoritative in-memory job map.
//!
//! The map itself sits behind an `RwLock` held only long enough to look up or
//! swap entries; each record has its own `Mutex`. Every mutation of a job
//! (extractor updates, launcher completion, cancel/resume/remove, cleanup)
//! goes through that per-job lock, and the matching disk write happens while
//! the lock is held, so the documents on disk follow the same order as the
//! in-memory changes.
//!
//! Lock order is always record, then map. Nobody waits on a record lock
//! while holding the map lock.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, RwLock};

use crate::error::QueueError;
use crate::job::{JobId, JobRecord, JobSummary};
use crate::persist::{Persistence, Write};

/// Shared handle to one job record.
pub type JobHandle = Arc<Mutex<JobRecord>>;

#[derive(Clone)]
pub struct JobStore {
    inner: Arc<Inner>,
}

struct Inner {
    jobs: RwLock<HashMap<JobId, JobHandle>>,
    persist: Persistence,
    status_throttle: Duration,
}

impl JobStore {
    pub fn new(persist: Persistence, status_throttle: Duration) -> Self {
        Self::from_records(persist, status_throttle, Vec::new())
    }

    /// Store pre-filled with recovered records.
    pub fn from_records(
        persist: Persistence,
        status_throttle: Duration,
        records: Vec<JobRecord>,
    ) -> Self {
        let jobs = records
            .into_iter()
            .map(|rec| (rec.id.clone(), Arc::new(Mutex::new(rec))))
            .collect();
        Self {
            inner: Arc::new(Inner {
                jobs: RwLock::new(jobs),
                persist,
                status_throttle,
            }),
        }
    }

    pub fn persistence(&self) -> &Persistence {
        &self.inner.persist
    }

    pub fn status_throttle(&self) -> Duration {
        self.inner.status_throttle
    }

    pub async fn insert(&self, rec: JobRecord) -> JobHandle {
        let id = rec.id.clone();
        let handle = Arc::new(Mutex::new(rec));
        self.inner.jobs.write().await.insert(id, Arc::clone(&handle));
        handle
    }

    pub async fn get(&self, id: &JobId) -> Option<JobHandle> {
        self.inner.jobs.read().await.get(id).cloned()
    }

    pub async fn contains(&self, id: &JobId) -> bool {
        self.inner.jobs.read().await.contains_key(id)
    }

    pub async fn len(&self) -> usize {
        self.inner.jobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Snapshot of every job, oldest first. No side effects.
    pub async fn list(&self) -> Vec<JobSummary> {
        let handles: Vec<JobHandle> = self.inner.jobs.read().await.values().cloned().collect();
        let mut out = Vec::with_capacity(handles.len());
        for h in handles {
            out.push(h.lock().await.summary());
        }
        out.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        out
    }

    pub async fn summary(&self, id: &JobId) -> Option<JobSummary> {
        let handle = self.get(id).await?;
        let rec = handle.lock().await;
        Some(rec.summary())
    }

    /// Runs `f` under the job's lock and persists whatever it asks for.
    /// Returns None if the job is unknown.
    pub async fn mutate<R>(
        &self,
        id: &JobId,
        f: impl FnOnce(&mut JobRecord) -> (R, Write),
    ) -> Option<R> {
        let handle = self.get(id).await?;
        let mut rec = handle.lock().await;
        let (out, what) = f(&mut rec);
        self.write_locked(&mut rec, what).await;
        Some(out)
    }

    /// Persists `rec` (already locked by the caller).
    pub async fn write_locked(&self, rec: &mut JobRecord, what: Write) {
        if what == Write::None {
            return;
        }
        self.inner.persist.persist(rec, what).await;
        if matches!(what, Write::Status | Write::Both) {
            rec.last_status_write = Some(Instant::now());
        }
    }

    /// Deletes the job's directory and record if `check` allows it.
    pub async fn remove_job<F>(&self, id: &JobId, check: F) -> Result<(), QueueError>
    where
        F: FnOnce(&JobRecord) -> Result<(), QueueError>,
    {
        let handle = self
            .get(id)
            .await
            .ok_or_else(|| QueueError::NotFound(id.clone()))?;
        let rec = handle.lock().await;
        // Lost a race with another removal while waiting for the lock.
        if !self.holds(id, &handle).await {
            return Err(QueueError::NotFound(id.clone()));
        }
        check(&rec)?;
        self.inner.persist.remove_job_dir(id).await?;
        self.inner.jobs.write().await.remove(id);
        tracing::info!(job_id = %id, status = %rec.status, "job removed");
        Ok(())
    }

    async fn holds(&self, id: &JobId, handle: &JobHandle) -> bool {
        self.inner
            .jobs
            .read()
            .await
            .get(id)
            .is_some_and(|h| Arc::ptr_eq(h, handle))
    }
}
