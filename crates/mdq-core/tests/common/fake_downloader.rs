//! Shell script standing in for the external downloader.
//!
//! Behaviour is picked from the URL (last argument), so tests running in
//! parallel never share state. The script records its arguments in `.args`
//! inside the job directory (dotfiles are never treated as output).

use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;
use std::sync::OnceLock;

const SCRIPT: &str = r#"#!/bin/sh
all="$*"
out=""
url=""
while [ $# -gt 0 ]; do
  case "$1" in
    -o) out="$2"; shift ;;
  esac
  url="$1"
  shift
done
dir=$(dirname "$out")
printf '%s\n' "$all" > "$dir/.args"

case "$url" in
  *single-ok*)
    echo "[youtube] Extracting URL: $url"
    echo "[download] Destination: $dir/Song Title.webm"
    echo "[download]  50.0% of 3.00MiB at 1.00MiB/s ETA 00:02"
    echo "[download] 100% of 3.00MiB in 00:03"
    echo "[ExtractAudio] Destination: $dir/Song Title.mp3"
    printf 'audio-bytes' > "$dir/Song Title.mp3"
    exit 0
    ;;
  *playlist-partial*)
    echo "[download] Downloading playlist: Road Trip"
    echo "[download] Downloading item 1 of 3"
    echo "[download] Destination: $dir/001 - First Song.mp3"
    echo "[download] 100% of 1.00MiB in 00:01"
    printf 'one' > "$dir/001 - First Song.mp3"
    echo "[download] Downloading item 2 of 3"
    echo "ERROR: [youtube] abc123: Video unavailable" >&2
    echo "[download] Downloading item 3 of 3"
    echo "[download] Destination: $dir/003 - Third Song.mp3"
    echo "[download] 100% of 2.00MiB in 00:01"
    printf 'three' > "$dir/003 - Third Song.mp3"
    exit 1
    ;;
  *playlist-empty*)
    echo "[download] Downloading playlist: Nothing Here"
    echo "ERROR: [youtube:tab] PLx: This playlist does not exist" >&2
    exit 1
    ;;
  *no-output*)
    echo "[youtube] Extracting URL: $url"
    exit 0
    ;;
  *linger*)
    # Exits at once, but a child keeps the pipes open and writes late.
    echo "[download] Destination: $dir/Late Track.mp3"
    ( sleep 1; mkdir -p "$dir"; printf 'late' > "$dir/Late Track.mp3" ) &
    exit 0
    ;;
  *slow*)
    trap 'exit 143' TERM
    echo "[download] Destination: $dir/Long Mix.mp3"
    printf 'partial' > "$dir/Long Mix.mp3.part"
    i=0
    while [ $i -lt 600 ]; do
      echo "[download]   1.0% of 9.00MiB at 1.00KiB/s ETA 99:00"
      sleep 0.1
      i=$((i+1))
    done
    exit 0
    ;;
  *)
    echo "ERROR: unknown test url $url" >&2
    exit 2
    ;;
esac
"#;

/// Path to the fake downloader, written once per test binary.
///
/// Installing before any test spawns a child keeps the write fd from leaking
/// into a concurrently forked process (ETXTBSY).
pub fn path() -> PathBuf {
    static PATH: OnceLock<PathBuf> = OnceLock::new();
    PATH.get_or_init(|| {
        let dir = std::env::temp_dir().join(format!("mdq-fake-dl-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("fake-yt-dlp");
        std::fs::write(&path, SCRIPT).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    })
    .clone()
}
