//! Startup recovery: rebuild job records from job directories.

use std::io;
use std::path::{Path, PathBuf};

use super::{MetadataDoc, Persistence, StatusDoc, StoredStatus, Write, METADATA_FILE, STATUS_FILE};
use crate::job::{JobId, JobRecord, JobStatus, PlaylistState, Progress};
use crate::outputs;

pub const MISSING_OUTPUT_MESSAGE: &str = "Output file missing after restart";

/// Outcome of a recovery pass.
#[derive(Debug, Default)]
pub struct RecoveryReport {
    pub jobs: Vec<JobRecord>,
    /// Directories deleted because purge-on-startup is enabled.
    pub purged: usize,
    /// Directories that could not be turned into a job (left on disk).
    pub unreadable: Vec<String>,
    /// Jobs found mid-download and reclassified `interrupted`.
    pub interrupted: usize,
    /// Completed jobs downgraded to `failed` because their output is gone.
    pub downgraded: usize,
}

/// Rebuilds job records from disk, or purges every job directory when `purge` is set.
///
/// A single bad directory never aborts recovery of the others.
pub async fn recover(p: &Persistence, purge: bool) -> io::Result<RecoveryReport> {
    let mut report = RecoveryReport::default();
    if purge {
        report.purged = p.purge_all().await?;
        tracing::info!(purged = report.purged, "purged job directories on startup");
        return Ok(report);
    }

    for (name, dir) in p.list_job_dirs().await? {
        match load_job(&name, &dir).await {
            Ok(Some(loaded)) => {
                let mut rec = loaded.record;
                let changed = reconcile(&mut rec, loaded.stored, &dir).await;
                match (loaded.stored, rec.status) {
                    (StoredStatus::Queued | StoredStatus::Downloading, JobStatus::Interrupted) => {
                        report.interrupted += 1;
                    }
                    (StoredStatus::Complete, JobStatus::Failed) => report.downgraded += 1,
                    _ => {}
                }
                if changed {
                    p.persist(&rec, Write::Both).await;
                }
                tracing::debug!(job_id = %rec.id, status = %rec.status, "recovered job");
                report.jobs.push(rec);
            }
            Ok(None) => report.unreadable.push(name),
            Err(e) => {
                tracing::warn!(dir = %dir.display(), "could not read job dir: {}", e);
                report.unreadable.push(name);
            }
        }
    }

    report.jobs.sort_by(|a, b| {
        a.created_at
            .cmp(&b.created_at)
            .then_with(|| a.id.cmp(&b.id))
    });
    tracing::info!(
        jobs = report.jobs.len(),
        interrupted = report.interrupted,
        downgraded = report.downgraded,
        unreadable = report.unreadable.len(),
        "job recovery finished"
    );
    Ok(report)
}

struct LoadedJob {
    record: JobRecord,
    stored: StoredStatus,
}

async fn load_job(dir_name: &str, dir: &Path) -> io::Result<Option<LoadedJob>> {
    let meta_bytes = match tokio::fs::read(dir.join(METADATA_FILE)).await {
        Ok(b) => b,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            tracing::warn!(dir = %dir.display(), "job dir has no metadata");
            return Ok(None);
        }
        Err(e) => return Err(e),
    };
    let meta: MetadataDoc = match serde_json::from_slice(&meta_bytes) {
        Ok(m) => m,
        Err(e) => {
            tracing::warn!(dir = %dir.display(), "invalid metadata: {}", e);
            return Ok(None);
        }
    };
    let id = match JobId::parse(&meta.id) {
        Some(id) if id.as_str() == dir_name => id,
        _ => {
            tracing::warn!(dir = %dir.display(), id = %meta.id, "metadata id does not match dir");
            return Ok(None);
        }
    };

    // A missing or unreadable status document means the job never got past submission.
    let status = match tokio::fs::read(dir.join(STATUS_FILE)).await {
        Ok(b) => serde_json::from_slice::<StatusDoc>(&b).ok(),
        Err(e) if e.kind() == io::ErrorKind::NotFound => None,
        Err(e) => return Err(e),
    }
    .unwrap_or(StatusDoc {
        status: StoredStatus::Queued,
        progress: 0.0,
        error: None,
    });

    let output_path = meta.output_path.as_deref().map(PathBuf::from);
    let output_name = output_path
        .as_ref()
        .and_then(|p| p.file_name())
        .map(|n| n.to_string_lossy().into_owned());
    let record = JobRecord {
        id,
        status: match status.status {
            StoredStatus::Complete => JobStatus::Completed,
            StoredStatus::Failed => JobStatus::Failed,
            _ => JobStatus::Interrupted,
        },
        url: meta.url,
        format: meta.format,
        quality: meta.quality,
        is_playlist: meta.is_playlist,
        created_at: meta.created_at,
        progress: Progress {
            percent: status.progress.clamp(0.0, 100.0),
            ..Progress::default()
        },
        playlist: PlaylistState {
            playlist_title: meta.playlist_title,
            total_tracks: meta.total_tracks,
            current_track_index: meta.current_track_index,
            track_titles: meta.track_titles,
            skipped_titles: meta.skipped_titles,
        },
        current_title: if meta.is_playlist { None } else { meta.title },
        output_path,
        output_name,
        error_message: status.error,
        process: None,
        run_generation: 0,
        last_status_write: None,
    };
    Ok(Some(LoadedJob {
        record,
        stored: status.status,
    }))
}

/// Applies the restart rules to a freshly loaded record.
/// Returns true when the on-disk documents no longer match the record.
async fn reconcile(rec: &mut JobRecord, stored: StoredStatus, dir: &Path) -> bool {
    match stored {
        StoredStatus::Interrupted => {
            rec.status = JobStatus::Interrupted;
            false
        }
        StoredStatus::Queued | StoredStatus::Downloading => {
            rec.status = JobStatus::Interrupted;
            true
        }
        StoredStatus::Failed => {
            rec.status = JobStatus::Failed;
            if rec.error_message.is_none() {
                rec.error_message = Some("Failed before restart".to_string());
            }
            false
        }
        StoredStatus::Complete => {
            let claimed_ok = match &rec.output_path {
                Some(p) => tokio::fs::metadata(p)
                    .await
                    .map(|m| m.is_file())
                    .unwrap_or(false),
                None => false,
            };
            if claimed_ok {
                rec.progress.percent = 100.0;
                return false;
            }
            match outputs::find_media_file(dir, rec.format, rec.is_playlist).await {
                Some(found) => {
                    tracing::info!(job_id = %rec.id, path = %found.display(), "re-linked output after restart");
                    rec.output_name = found
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned());
                    rec.output_path = Some(found);
                    rec.progress.percent = 100.0;
                    rec.status = JobStatus::Completed;
                }
                None => {
                    tracing::warn!(job_id = %rec.id, "completed job lost its output");
                    rec.status = JobStatus::Failed;
                    rec.error_message = Some(MISSING_OUTPUT_MESSAGE.to_string());
                    rec.output_path = None;
                    rec.output_name = None;
                }
            }
            true
        }
    }
}
