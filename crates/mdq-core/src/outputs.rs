//! Output file discovery inside a job directory.

use std::io;
use std::path::{Path, PathBuf};

use crate::job::MediaFormat;
use crate::persist::{METADATA_FILE, STATUS_FILE};

/// Suffixes of files the downloader is still writing or has abandoned.
const PARTIAL_SUFFIXES: &[&str] = &[".part", ".ytdl", ".temp", ".tmp"];

const AUDIO_EXTENSIONS: &[&str] = &["mp3", "m4a", "aac", "opus", "ogg", "flac", "wav", "webm"];
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mkv", "webm", "mov", "avi", "m4v"];
const BUNDLE_EXTENSIONS: &[&str] = &["zip", "7z", "tar", "tgz", "gz"];

/// Infixes the postprocessors put before the real extension (`Clip.temp.mp4`).
const PARTIAL_STEM_SUFFIXES: &[&str] = &[".temp", ".part", ".tmp"];

fn is_partial(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    if PARTIAL_SUFFIXES.iter().any(|s| lower.ends_with(s)) || lower.contains(".part-frag") {
        return true;
    }
    let stem = lower.rsplit_once('.').map_or(lower.as_str(), |(stem, _)| stem);
    PARTIAL_STEM_SUFFIXES.iter().any(|s| stem.ends_with(s))
}

fn is_bookkeeping(name: &str) -> bool {
    name == METADATA_FILE || name == STATUS_FILE || name.starts_with('.')
}

/// Well-formed output files in `dir`, sorted by file name: regular, non-empty,
/// not partial/temporary, not the job's own documents, and not in `exclude`.
pub async fn scan_candidates(dir: &Path, exclude: &[&str]) -> io::Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    let mut rd = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = rd.next_entry().await? {
        let name = entry.file_name().to_string_lossy().into_owned();
        if is_bookkeeping(&name) || is_partial(&name) || exclude.contains(&name.as_str()) {
            continue;
        }
        let meta = match entry.metadata().await {
            Ok(m) => m,
            Err(e) => {
                tracing::debug!(file = %name, "skipping unreadable entry: {}", e);
                continue;
            }
        };
        if meta.is_file() && meta.len() > 0 {
            out.push(entry.path());
        }
    }
    out.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(out)
}

/// Whether `path` looks like the final artifact of a job with this shape.
pub fn is_media_file(path: &Path, format: MediaFormat, is_playlist: bool) -> bool {
    let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
        return false;
    };
    let ext = ext.to_ascii_lowercase();
    let allowed = if is_playlist {
        BUNDLE_EXTENSIONS
    } else {
        match format {
            MediaFormat::Audio => AUDIO_EXTENSIONS,
            MediaFormat::Video => VIDEO_EXTENSIONS,
        }
    };
    allowed.contains(&ext.as_str())
}

/// Best-effort lookup of a finished artifact, used when the recorded output path is gone.
pub async fn find_media_file(
    dir: &Path,
    format: MediaFormat,
    is_playlist: bool,
) -> Option<PathBuf> {
    let candidates = scan_candidates(dir, &[]).await.ok()?;
    candidates
        .into_iter()
        .find(|p| is_media_file(p, format, is_playlist))
}
