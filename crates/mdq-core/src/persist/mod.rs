//! Per-job persistence: one directory per job under the jobs root, holding
//! `metadata.json` and `status.json`.
//!
//! Writes go to a `.tmp` sibling and are renamed into place, so a crash never
//! leaves a torn document. Writes never create the job directory: once a job's
//! directory is deleted (cancel, cleanup), late writes fail with NotFound and
//! are dropped.

mod documents;
mod recovery;

pub use documents::{MetadataDoc, StatusDoc, StoredStatus, METADATA_FILE, STATUS_FILE};
pub use recovery::{recover, RecoveryReport, MISSING_OUTPUT_MESSAGE};

use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::job::{JobId, JobRecord};

/// Which documents a mutation needs rewritten.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Write {
    None,
    Status,
    Metadata,
    Both,
}

impl Write {
    fn status(self) -> bool {
        matches!(self, Write::Status | Write::Both)
    }

    fn metadata(self) -> bool {
        matches!(self, Write::Metadata | Write::Both)
    }
}

/// Job directory layout rooted at the configured jobs dir.
#[derive(Debug, Clone)]
pub struct Persistence {
    root: PathBuf,
}

impl Persistence {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn job_dir(&self, id: &JobId) -> PathBuf {
        self.root.join(id.as_str())
    }

    /// Creates the job directory (and the root if needed).
    pub async fn create_job_dir(&self, id: &JobId) -> io::Result<PathBuf> {
        let dir = self.job_dir(id);
        tokio::fs::create_dir_all(&dir).await?;
        Ok(dir)
    }

    pub async fn write_metadata(&self, rec: &JobRecord) -> io::Result<()> {
        let doc = MetadataDoc::from_record(rec);
        write_json(&self.job_dir(&rec.id), METADATA_FILE, &doc).await
    }

    pub async fn write_status(&self, rec: &JobRecord) -> io::Result<()> {
        let doc = StatusDoc::from_record(rec);
        write_json(&self.job_dir(&rec.id), STATUS_FILE, &doc).await
    }

    /// Best-effort write of the requested documents. Failures are logged, never returned.
    /// Metadata goes first so the status document never runs ahead of it.
    pub async fn persist(&self, rec: &JobRecord, what: Write) {
        if what.metadata() {
            if let Err(e) = self.write_metadata(rec).await {
                log_write_error(&rec.id, METADATA_FILE, &e);
            }
        }
        if what.status() {
            if let Err(e) = self.write_status(rec).await {
                log_write_error(&rec.id, STATUS_FILE, &e);
            }
        }
    }

    /// Deletes the job directory. Returns false if it did not exist.
    pub async fn remove_job_dir(&self, id: &JobId) -> io::Result<bool> {
        remove_dir_if_exists(&self.job_dir(id)).await
    }

    /// Subdirectories of the jobs root as (name, path). Missing root = empty.
    pub async fn list_job_dirs(&self) -> io::Result<Vec<(String, PathBuf)>> {
        let mut out = Vec::new();
        let mut rd = match tokio::fs::read_dir(&self.root).await {
            Ok(rd) => rd,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(out),
            Err(e) => return Err(e),
        };
        while let Some(entry) = rd.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                out.push((
                    entry.file_name().to_string_lossy().into_owned(),
                    entry.path(),
                ));
            }
        }
        out.sort();
        Ok(out)
    }

    /// Deletes every job directory. Returns how many were removed.
    pub async fn purge_all(&self) -> io::Result<usize> {
        let mut removed = 0;
        for (name, path) in self.list_job_dirs().await? {
            match remove_dir_if_exists(&path).await {
                Ok(true) => removed += 1,
                Ok(false) => {}
                Err(e) => tracing::warn!(dir = %name, "purge failed: {}", e),
            }
        }
        Ok(removed)
    }
}

async fn write_json<T: Serialize>(dir: &Path, file: &str, doc: &T) -> io::Result<()> {
    let json = serde_json::to_vec_pretty(doc).map_err(io::Error::other)?;
    let path = dir.join(file);
    let tmp = dir.join(format!("{file}.tmp"));
    tokio::fs::write(&tmp, json).await?;
    tokio::fs::rename(&tmp, &path).await
}

async fn remove_dir_if_exists(path: &Path) -> io::Result<bool> {
    match tokio::fs::remove_dir_all(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

fn log_write_error(id: &JobId, file: &str, e: &io::Error) {
    if e.kind() == io::ErrorKind::NotFound {
        tracing::debug!(job_id = %id, file, "job dir gone, dropping write");
    } else {
        tracing::warn!(job_id = %id, file, "persist failed: {}", e);
    }
}
