//! State transitions and extractor event application on `JobRecord`.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use super::types::{JobRecord, JobStatus, Progress};
use crate::control::ProcessHandle;
use crate::extractor::ProgressEvent;
use crate::persist::Write;

impl JobRecord {
    /// Applies one extractor event and reports which documents need writing.
    ///
    /// Plain progress is throttled to one status write per `throttle`;
    /// milestones (track boundary, playlist name) always write.
    pub fn apply_event(&mut self, event: ProgressEvent, now: Instant, throttle: Duration) -> Write {
        match event {
            ProgressEvent::Progress {
                percent,
                size_label,
                speed,
                eta,
            } => {
                let percent = percent.clamp(0.0, 100.0);
                // Within one file, a lower figure is the next stream starting over; keep the high mark.
                if percent >= self.progress.percent {
                    self.progress.percent = percent;
                }
                if size_label.is_some() {
                    self.progress.size_label = size_label;
                }
                self.progress.speed = speed;
                self.progress.eta = eta;
                if self.status_write_due(now, throttle) {
                    Write::Status
                } else {
                    Write::None
                }
            }
            ProgressEvent::TrackBoundary { index, total } => {
                self.playlist.current_track_index = Some(index);
                self.playlist.total_tracks = Some(total);
                self.progress = Progress::default();
                self.current_title = None;
                Write::Both
            }
            ProgressEvent::Destination { title } => {
                let mut what = Write::None;
                if self.current_title.as_deref() != Some(title.as_str()) {
                    self.current_title = Some(title.clone());
                    what = Write::Metadata;
                }
                if !self.playlist.track_titles.contains(&title) {
                    self.playlist.track_titles.push(title);
                    what = Write::Metadata;
                }
                what
            }
            ProgressEvent::PlaylistName { title } => {
                self.playlist.playlist_title = Some(title);
                Write::Both
            }
            ProgressEvent::Skipped { reason } => {
                let name = self.skipped_item_name();
                tracing::debug!(job_id = %self.id, item = %name, %reason, "item skipped");
                if self.playlist.skipped_titles.contains(&name) {
                    Write::None
                } else {
                    self.playlist.skipped_titles.push(name);
                    Write::Metadata
                }
            }
        }
    }

    fn skipped_item_name(&self) -> String {
        if let Some(title) = &self.current_title {
            return title.clone();
        }
        match self.playlist.current_track_index {
            Some(n) => format!("Track {n}"),
            None => "Unknown item".to_string(),
        }
    }

    fn status_write_due(&self, now: Instant, throttle: Duration) -> bool {
        match self.last_status_write {
            Some(last) => now.saturating_duration_since(last) >= throttle,
            None => true,
        }
    }

    /// Pending → processing / playlist-processing, attaching the live process.
    pub fn start_run(&mut self, handle: ProcessHandle) {
        self.status = if self.is_playlist {
            JobStatus::PlaylistProcessing
        } else {
            JobStatus::Processing
        };
        self.process = Some(handle);
        self.error_message = None;
    }

    pub fn finish_completed(&mut self, output: PathBuf) {
        self.status = JobStatus::Completed;
        self.process = None;
        self.progress.percent = 100.0;
        self.progress.speed = None;
        self.progress.eta = None;
        self.output_name = output
            .file_name()
            .map(|n| n.to_string_lossy().into_owned());
        self.output_path = Some(output);
        self.error_message = None;
    }

    pub fn finish_failed(&mut self, message: impl Into<String>) {
        self.status = JobStatus::Failed;
        self.process = None;
        self.progress.speed = None;
        self.progress.eta = None;
        self.error_message = Some(message.into());
    }

    /// Interrupted → pending for a new run; stale launchers of older runs are fenced off.
    pub fn reset_for_resume(&mut self) {
        self.status = JobStatus::Pending;
        self.run_generation += 1;
        self.progress = Progress::default();
        self.current_title = None;
        self.error_message = None;
        self.last_status_write = None;
    }

    /// The launcher for `generation` still owns this job.
    pub fn is_run_current(&self, generation: u64) -> bool {
        self.run_generation == generation && self.status.is_active()
    }
}
