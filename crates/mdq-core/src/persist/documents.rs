//! On-disk documents: `metadata.json` (slow-changing fields) and `status.json`
//! (status + numeric progress, rewritten often).

use serde::{Deserialize, Serialize};

use crate::job::{JobRecord, JobStatus, MediaFormat};

pub const METADATA_FILE: &str = "metadata.json";
pub const STATUS_FILE: &str = "status.json";

/// Status vocabulary of `status.json`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoredStatus {
    Queued,
    Downloading,
    Complete,
    Failed,
    Interrupted,
}

impl From<JobStatus> for StoredStatus {
    fn from(s: JobStatus) -> Self {
        match s {
            JobStatus::Pending => StoredStatus::Queued,
            JobStatus::Processing | JobStatus::PlaylistProcessing => StoredStatus::Downloading,
            JobStatus::Completed => StoredStatus::Complete,
            JobStatus::Failed => StoredStatus::Failed,
            JobStatus::Interrupted => StoredStatus::Interrupted,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataDoc {
    pub id: String,
    pub url: String,
    #[serde(default)]
    pub title: Option<String>,
    pub created_at: i64,
    #[serde(default)]
    pub output_path: Option<String>,
    pub format: MediaFormat,
    pub quality: String,
    #[serde(default)]
    pub is_playlist: bool,
    #[serde(default)]
    pub playlist_title: Option<String>,
    #[serde(default)]
    pub total_tracks: Option<u32>,
    #[serde(default)]
    pub current_track_index: Option<u32>,
    #[serde(default)]
    pub track_titles: Vec<String>,
    #[serde(default)]
    pub skipped_titles: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusDoc {
    pub status: StoredStatus,
    /// 0-100.
    pub progress: f64,
    /// Failure reason, kept so a failed job still explains itself after a restart.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl MetadataDoc {
    pub fn from_record(rec: &JobRecord) -> Self {
        Self {
            id: rec.id.to_string(),
            url: rec.url.clone(),
            title: rec.display_title().map(str::to_string),
            created_at: rec.created_at,
            output_path: rec
                .output_path
                .as_ref()
                .map(|p| p.to_string_lossy().into_owned()),
            format: rec.format,
            quality: rec.quality.clone(),
            is_playlist: rec.is_playlist,
            playlist_title: rec.playlist.playlist_title.clone(),
            total_tracks: rec.playlist.total_tracks,
            current_track_index: rec.playlist.current_track_index,
            track_titles: rec.playlist.track_titles.clone(),
            skipped_titles: rec.playlist.skipped_titles.clone(),
        }
    }
}

impl StatusDoc {
    pub fn from_record(rec: &JobRecord) -> Self {
        Self {
            status: rec.status.into(),
            progress: rec.progress.percent.clamp(0.0, 100.0),
            error: rec.error_message.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{JobId, SubmitRequest};

    #[test]
    fn active_statuses_store_as_downloading() {
        assert_eq!(
            StoredStatus::from(JobStatus::Processing),
            StoredStatus::Downloading
        );
        assert_eq!(
            StoredStatus::from(JobStatus::PlaylistProcessing),
            StoredStatus::Downloading
        );
        assert_eq!(StoredStatus::from(JobStatus::Pending), StoredStatus::Queued);
    }

    #[test]
    fn metadata_uses_camel_case_keys() {
        let req = SubmitRequest {
            url: "https://example.com/watch?v=1".to_string(),
            format: MediaFormat::Audio,
            quality: "best".to_string(),
            playlist_hint: None,
        };
        let rec = JobRecord::new(JobId::new(), &req, false, 1_700_000_000);
        let json = serde_json::to_value(MetadataDoc::from_record(&rec)).unwrap();
        for key in [
            "id",
            "url",
            "title",
            "createdAt",
            "outputPath",
            "format",
            "quality",
            "isPlaylist",
            "playlistTitle",
            "totalTracks",
            "currentTrackIndex",
            "trackTitles",
            "skippedTitles",
        ] {
            assert!(json.get(key).is_some(), "missing {key}");
        }
        assert_eq!(json["format"], "audio");
    }

    #[test]
    fn status_doc_shape() {
        let doc: StatusDoc = serde_json::from_str(r#"{"status":"downloading","progress":42.5}"#).unwrap();
        assert_eq!(doc.status, StoredStatus::Downloading);
        assert_eq!(doc.progress, 42.5);
        assert!(doc.error.is_none());
        let out = serde_json::to_string(&doc).unwrap();
        assert!(!out.contains("error"));
    }
}
