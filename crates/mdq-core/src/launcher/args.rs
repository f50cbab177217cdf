//! Downloader command line.

use std::path::Path;

use crate::config::DownloaderConfig;
use crate::job::{JobRecord, MediaFormat};

/// Output template for playlists: zero-padded index keeps on-disk order = playback order.
pub const PLAYLIST_TEMPLATE: &str = "%(playlist_index)03d - %(title)s.%(ext)s";
pub const SINGLE_TEMPLATE: &str = "%(title)s.%(ext)s";

/// Immutable snapshot of what one run needs, taken under the job lock.
#[derive(Debug, Clone, PartialEq)]
pub struct LaunchPlan {
    pub generation: u64,
    pub url: String,
    pub format: MediaFormat,
    pub quality: String,
    pub is_playlist: bool,
}

impl LaunchPlan {
    pub fn from_record(rec: &JobRecord) -> Self {
        Self {
            generation: rec.run_generation,
            url: rec.url.clone(),
            format: rec.format,
            quality: rec.quality.clone(),
            is_playlist: rec.is_playlist,
        }
    }
}

/// Builds the argument list (program excluded). `cookies` is the cookie file
/// to pass, already checked for existence by the caller.
pub fn build_args(
    plan: &LaunchPlan,
    cfg: &DownloaderConfig,
    job_dir: &Path,
    resume: bool,
    cookies: Option<&Path>,
) -> Vec<String> {
    let mut args: Vec<String> = vec!["--newline".into(), "--no-colors".into()];
    args.push(if resume { "--continue" } else { "--no-continue" }.into());

    match plan.format {
        MediaFormat::Audio => {
            args.extend([
                "-x".to_string(),
                "--audio-format".to_string(),
                cfg.audio_format.clone(),
                "--audio-quality".to_string(),
                audio_quality(&plan.quality),
            ]);
        }
        MediaFormat::Video => {
            args.extend([
                "-f".to_string(),
                video_selector(&plan.quality),
                "--merge-output-format".to_string(),
                cfg.video_container.clone(),
            ]);
        }
    }

    let template = if plan.is_playlist {
        args.push("--yes-playlist".into());
        args.push("--ignore-errors".into());
        PLAYLIST_TEMPLATE
    } else {
        args.push("--no-playlist".into());
        SINGLE_TEMPLATE
    };
    args.push("-o".into());
    args.push(job_dir.join(template).to_string_lossy().into_owned());

    if let Some(ffmpeg) = &cfg.ffmpeg_location {
        args.push("--ffmpeg-location".into());
        args.push(ffmpeg.to_string_lossy().into_owned());
    }
    if let Some(cookies) = cookies {
        args.push("--cookies".into());
        args.push(cookies.to_string_lossy().into_owned());
    }
    args.extend(cfg.extra_args.iter().cloned());
    args.push(plan.url.clone());
    args
}

/// `best` → `0` (VBR best); a bitrate like `192` or `192k` → `192K`.
fn audio_quality(quality: &str) -> String {
    let q = quality.trim();
    if q.is_empty() || q.eq_ignore_ascii_case("best") {
        return "0".to_string();
    }
    let digits = q.trim_end_matches(['k', 'K']);
    if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) {
        format!("{digits}K")
    } else {
        q.to_string()
    }
}

/// `best` → best streams; a height like `720` or `720p` caps the video height.
fn video_selector(quality: &str) -> String {
    let q = quality.trim();
    let height = q.trim_end_matches(['p', 'P']);
    if !height.is_empty() && height.chars().all(|c| c.is_ascii_digit()) {
        format!("bestvideo[height<={height}]+bestaudio/best[height<={height}]")
    } else {
        "bestvideo+bestaudio/best".to_string()
    }
}
