//! Job record, status and summary types.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use crate::control::ProcessHandle;

/// Job identifier: a UUID v4 string, also used as the job's directory name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    pub fn new() -> Self {
        JobId(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Accepts only strings that are safe to use as a single directory name.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        let valid = !s.is_empty()
            && s.len() <= 64
            && s
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        valid.then(|| JobId(s.to_string()))
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Requested media kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaFormat {
    Audio,
    Video,
}

impl MediaFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            MediaFormat::Audio => "audio",
            MediaFormat::Video => "video",
        }
    }
}

impl FromStr for MediaFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "audio" => Ok(MediaFormat::Audio),
            "video" => Ok(MediaFormat::Video),
            other => Err(format!("unknown format: {other}")),
        }
    }
}

/// In-memory job status.
///
/// `pending → {processing | playlist-processing} → {completed | failed}`;
/// `interrupted` only comes out of startup recovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobStatus {
    Pending,
    Processing,
    PlaylistProcessing,
    Completed,
    Failed,
    Interrupted,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::PlaylistProcessing => "playlist-processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Interrupted => "interrupted",
        }
    }

    /// A downloader process is (or should be) running.
    pub fn is_active(self) -> bool {
        matches!(self, JobStatus::Processing | JobStatus::PlaylistProcessing)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parameters of a submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitRequest {
    pub url: String,
    pub format: MediaFormat,
    pub quality: String,
    /// Explicit playlist choice; None = detect from the URL's `list` parameter.
    #[serde(default)]
    pub playlist_hint: Option<bool>,
}

/// Live progress of the current download (or current track).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Progress {
    pub percent: f64,
    pub speed: Option<String>,
    pub eta: Option<String>,
    pub size_label: Option<String>,
}

/// Playlist bookkeeping, filled in by the extractor.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlaylistState {
    pub playlist_title: Option<String>,
    pub total_tracks: Option<u32>,
    pub current_track_index: Option<u32>,
    pub track_titles: Vec<String>,
    /// Insertion-ordered, duplicate-free.
    pub skipped_titles: Vec<String>,
}

/// Authoritative in-memory record of one job.
#[derive(Debug)]
pub struct JobRecord {
    pub id: JobId,
    pub status: JobStatus,
    pub url: String,
    pub format: MediaFormat,
    pub quality: String,
    pub is_playlist: bool,
    /// Unix seconds.
    pub created_at: i64,
    pub progress: Progress,
    pub playlist: PlaylistState,
    /// Display title of the track currently downloading.
    pub current_title: Option<String>,
    pub output_path: Option<PathBuf>,
    pub output_name: Option<String>,
    pub error_message: Option<String>,
    /// Present iff the status is active.
    pub process: Option<ProcessHandle>,
    /// Bumped by every dispatch so a stale launcher can't write back into a newer run.
    pub run_generation: u64,
    pub last_status_write: Option<Instant>,
}

impl JobRecord {
    pub fn new(id: JobId, req: &SubmitRequest, is_playlist: bool, created_at: i64) -> Self {
        Self {
            id,
            status: JobStatus::Pending,
            url: req.url.clone(),
            format: req.format,
            quality: req.quality.clone(),
            is_playlist,
            created_at,
            progress: Progress::default(),
            playlist: PlaylistState::default(),
            current_title: None,
            output_path: None,
            output_name: None,
            error_message: None,
            process: None,
            run_generation: 0,
            last_status_write: None,
        }
    }

    /// Title shown to users: playlist title for playlists, else the current track title.
    pub fn display_title(&self) -> Option<&str> {
        if self.is_playlist {
            if let Some(t) = self.playlist.playlist_title.as_deref() {
                return Some(t);
            }
        }
        self.current_title
            .as_deref()
            .or(self.output_name.as_deref())
    }

    pub fn summary(&self) -> JobSummary {
        JobSummary {
            id: self.id.clone(),
            status: self.status,
            url: self.url.clone(),
            format: self.format,
            quality: self.quality.clone(),
            is_playlist: self.is_playlist,
            created_at: self.created_at,
            title: self.display_title().map(str::to_string),
            percent: self.progress.percent,
            speed: self.progress.speed.clone(),
            eta: self.progress.eta.clone(),
            size_label: self.progress.size_label.clone(),
            playlist_title: self.playlist.playlist_title.clone(),
            total_tracks: self.playlist.total_tracks,
            current_track_index: self.playlist.current_track_index,
            track_titles: self.playlist.track_titles.clone(),
            skipped_titles: self.playlist.skipped_titles.clone(),
            output_name: self.output_name.clone(),
            error_message: self.error_message.clone(),
        }
    }
}

/// Read-only snapshot returned by `list()`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSummary {
    pub id: JobId,
    pub status: JobStatus,
    pub url: String,
    pub format: MediaFormat,
    pub quality: String,
    pub is_playlist: bool,
    pub created_at: i64,
    pub title: Option<String>,
    pub percent: f64,
    pub speed: Option<String>,
    pub eta: Option<String>,
    pub size_label: Option<String>,
    pub playlist_title: Option<String>,
    pub total_tracks: Option<u32>,
    pub current_track_index: Option<u32>,
    pub track_titles: Vec<String>,
    pub skipped_titles: Vec<String>,
    pub output_name: Option<String>,
    pub error_message: Option<String>,
}

/// Current time as Unix seconds.
pub fn unix_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

/// True when the URL carries a `list` query parameter (playlist link).
pub fn url_has_playlist_param(raw: &str) -> bool {
    url::Url::parse(raw)
        .map(|u| u.query_pairs().any(|(k, v)| k == "list" && !v.is_empty()))
        .unwrap_or(false)
}
