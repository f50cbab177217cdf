//! Completion policy: what a finished run produced, independent of its exit code.

use std::path::{Path, PathBuf};

use crate::archive::Archiver;
use crate::job::MediaFormat;
use crate::naming::bundle_file_name;
use crate::outputs::{is_media_file, scan_candidates};

pub const NO_OUTPUT_MESSAGE: &str = "Download failed: no output files were produced";

/// Bundle extension for playlist artifacts.
pub const BUNDLE_EXT: &str = "zip";

/// Result of a run, ready to be written back to the record.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Completed(PathBuf),
    Failed(String),
}

/// What the finish step needs to know about the job.
#[derive(Debug, Clone)]
pub struct FinishInput<'a> {
    pub dir: &'a Path,
    pub format: MediaFormat,
    pub is_playlist: bool,
    pub playlist_title: Option<&'a str>,
    /// Last condensed `ERROR:` line seen on either stream.
    pub last_error: Option<String>,
}

/// Scans the job directory and decides the outcome.
///
/// Any candidate file means success, even after a non-zero exit. No
/// candidates means failure with the last error line (or a generic message).
/// Playlists are bundled; a bundling failure fails the job.
pub async fn resolve_outcome(input: FinishInput<'_>, archiver: &dyn Archiver) -> Outcome {
    let archive_name = bundle_file_name(input.playlist_title, BUNDLE_EXT);
    let exclude: Vec<&str> = if input.is_playlist {
        vec![archive_name.as_str()]
    } else {
        Vec::new()
    };

    let candidates = match scan_candidates(input.dir, &exclude).await {
        Ok(c) => c,
        Err(e) => {
            tracing::warn!(dir = %input.dir.display(), "output scan failed: {}", e);
            Vec::new()
        }
    };
    if candidates.is_empty() {
        return Outcome::Failed(
            input
                .last_error
                .unwrap_or_else(|| NO_OUTPUT_MESSAGE.to_string()),
        );
    }

    if !input.is_playlist {
        let chosen = candidates
            .iter()
            .find(|p| is_media_file(p, input.format, false))
            .unwrap_or(&candidates[0])
            .clone();
        return Outcome::Completed(chosen);
    }

    tracing::debug!(files = candidates.len(), archive = %archive_name, "bundling playlist output");
    match archiver.bundle(input.dir, &candidates, &archive_name).await {
        Ok(path) => Outcome::Completed(path),
        Err(e) => Outcome::Failed(format!("Failed to create archive: {e}")),
    }
}
