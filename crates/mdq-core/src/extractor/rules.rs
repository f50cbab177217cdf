//! Concrete line rules for yt-dlp style output.

use regex::Regex;
use std::sync::LazyLock;

use super::{LineRule, ProgressEvent};

static PROGRESS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\[download\]\s+(?P<pct>\d{1,3}(?:\.\d+)?)%(?:\s+of\s+~?\s*(?P<size>\S+))?(?:\s+in\s+\S+)?(?:\s+at\s+(?P<speed>\S+))?(?:\s+ETA\s+(?P<eta>\S+))?",
    )
    .expect("progress regex")
});

static TRACK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\[download\]\s+Downloading (?:item|video) (?P<n>\d+) of (?P<m>\d+)")
        .expect("track regex")
});

static DESTINATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"^\[(?:download|ExtractAudio|VideoConvertor|Merger)\]\s+(?:Destination:\s+(?P<dest>.+)|Merging formats into "(?P<merged>.+)"|(?P<done>.+?) has already been downloaded)"#,
    )
    .expect("destination regex")
});

static PLAYLIST_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\[download\]\s+Downloading playlist:\s*(?P<title>.+)$").expect("playlist regex")
});

/// `[extractor] id: ` prefix in front of an error message.
static ERROR_TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\[[^\]]+\]\s+(?:[\w-]+:\s+)?").expect("error tag regex"));

static FORMAT_SUFFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\.f\d+(?:-\d+)?$").expect("format suffix regex"));

static INDEX_PREFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{2,}\s+-\s+").expect("index prefix regex"));

/// Substrings (lowercase) that mark an item as skipped rather than the whole job failing.
const SKIP_MARKERS: &[&str] = &[
    "video unavailable",
    "is unavailable",
    "not available in your country",
    "geo-blocked",
    "geo restricted",
    "georestricted",
    "blocked it in your country",
    "private video",
    "has been removed",
    "members-only",
    "sign in to confirm your age",
];

fn optional_field(value: Option<regex::Match<'_>>) -> Option<String> {
    let v = value?.as_str().trim();
    match v {
        "" | "Unknown" | "N/A" => None,
        v => Some(v.to_string()),
    }
}

/// Rule 1: `[download]  42.1% of 3.20MiB at 1.00MiB/s ETA 00:02`.
pub struct ProgressLineRule;

impl LineRule for ProgressLineRule {
    fn name(&self) -> &'static str {
        "progress"
    }

    fn classify(&self, line: &str) -> Option<ProgressEvent> {
        let caps = PROGRESS_RE.captures(line)?;
        let pct = caps.name("pct")?;
        if !is_progress_tail(&line[pct.end() + 1..]) {
            return None;
        }
        let percent: f64 = pct.as_str().parse().ok()?;
        Some(ProgressEvent::Progress {
            percent: percent.clamp(0.0, 100.0),
            size_label: optional_field(caps.name("size")),
            speed: optional_field(caps.name("speed")),
            eta: optional_field(caps.name("eta")),
        })
    }
}

/// After the `%`: nothing, or a progress keyword. Rejects file names such as `50% Off.mp3`.
fn is_progress_tail(tail: &str) -> bool {
    if tail.trim().is_empty() {
        return true;
    }
    if !tail.starts_with(char::is_whitespace) {
        return false;
    }
    matches!(
        tail.split_whitespace().next(),
        Some("of" | "in" | "at" | "ETA")
    )
}

/// Rule 2: `[download] Downloading item 3 of 12`.
pub struct TrackBoundaryRule;

impl LineRule for TrackBoundaryRule {
    fn name(&self) -> &'static str {
        "track-boundary"
    }

    fn classify(&self, line: &str) -> Option<ProgressEvent> {
        let caps = TRACK_RE.captures(line)?;
        let index = caps.name("n")?.as_str().parse().ok()?;
        let total = caps.name("m")?.as_str().parse().ok()?;
        Some(ProgressEvent::TrackBoundary { index, total })
    }
}

/// Rule 3: destination / merge / already-downloaded announcements.
pub struct DestinationRule;

impl LineRule for DestinationRule {
    fn name(&self) -> &'static str {
        "destination"
    }

    fn classify(&self, line: &str) -> Option<ProgressEvent> {
        let caps = DESTINATION_RE.captures(line)?;
        let path = caps
            .name("dest")
            .or_else(|| caps.name("merged"))
            .or_else(|| caps.name("done"))?
            .as_str();
        let title = display_title_from_path(path)?;
        Some(ProgressEvent::Destination { title })
    }
}

/// Rule 4: `[download] Downloading playlist: Road Trip`.
pub struct PlaylistNameRule;

impl LineRule for PlaylistNameRule {
    fn name(&self) -> &'static str {
        "playlist-name"
    }

    fn classify(&self, line: &str) -> Option<ProgressEvent> {
        let caps = PLAYLIST_RE.captures(line)?;
        let title = caps.name("title")?.as_str().trim();
        if title.is_empty() {
            return None;
        }
        Some(ProgressEvent::PlaylistName {
            title: title.to_string(),
        })
    }
}

/// Rule 5: error lines naming an unavailable item. Heuristic; only `ERROR:` lines qualify.
pub struct SkipMarkerRule;

impl LineRule for SkipMarkerRule {
    fn name(&self) -> &'static str {
        "skip-marker"
    }

    fn classify(&self, line: &str) -> Option<ProgressEvent> {
        let reason = condense_error_line(line)?;
        let lower = reason.to_lowercase();
        SKIP_MARKERS
            .iter()
            .any(|m| lower.contains(m))
            .then_some(ProgressEvent::Skipped { reason })
    }
}

/// For `ERROR:` lines, returns the message without the marker and the `[extractor] id:` tag.
pub fn condense_error_line(line: &str) -> Option<String> {
    let (_, rest) = line.split_once("ERROR:")?;
    let msg = ERROR_TAG_RE.replace(rest.trim(), "");
    let msg = msg.trim();
    (!msg.is_empty()).then(|| msg.to_string())
}

/// Display title for an output path: file name without extension, format id
/// suffix (`.f137`) or zero-padded playlist index prefix (`003 - `).
pub fn display_title_from_path(path: &str) -> Option<String> {
    let path = path.trim().trim_matches('"');
    let file_name = path.rsplit(['/', '\\']).next().unwrap_or(path);
    let stem = match file_name.rsplit_once('.') {
        Some((stem, ext))
            if !stem.is_empty()
                && !ext.is_empty()
                && ext.len() <= 5
                && ext.chars().all(|c| c.is_ascii_alphanumeric()) =>
        {
            stem
        }
        _ => file_name,
    };
    let stem = FORMAT_SUFFIX_RE.replace(stem, "");
    let stem = INDEX_PREFIX_RE.replace(&stem, "");
    let title = stem.trim();
    (!title.is_empty()).then(|| title.to_string())
}
