use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

/// External downloader settings (`[downloader]` section in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloaderConfig {
    /// Downloader executable name or path.
    pub binary: String,
    /// Remuxer location handed to the downloader; the core never runs it directly.
    pub ffmpeg_location: Option<PathBuf>,
    /// Session cookie file; only passed when the file exists at launch time.
    pub cookies_file: Option<PathBuf>,
    /// Target audio codec for audio jobs (e.g. "mp3", "m4a", "opus").
    pub audio_format: String,
    /// Container used when merging video and audio streams.
    pub video_container: String,
    /// Extra arguments inserted before the URL.
    pub extra_args: Vec<String>,
}

impl Default for DownloaderConfig {
    fn default() -> Self {
        Self {
            binary: "yt-dlp".to_string(),
            ffmpeg_location: None,
            cookies_file: None,
            audio_format: "mp3".to_string(),
            video_container: "mp4".to_string(),
            extra_args: Vec::new(),
        }
    }
}

/// Playlist bundling settings (`[archiver]` section).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiverConfig {
    /// Override for the archive program. None = platform default (`zip` / PowerShell).
    pub program: Option<String>,
}

/// Time-based cleanup of finished jobs (`[cleanup]` section).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CleanupConfig {
    /// Master switch for periodic and deferred cleanup. Manual sweeps always work.
    pub enabled: bool,
    /// Seconds between periodic sweeps.
    pub interval_secs: u64,
    /// Age in seconds after which a completed job is removed.
    pub max_age_secs: u64,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 3600,
            max_age_secs: 86_400,
        }
    }
}

impl CleanupConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }

    pub fn max_age(&self) -> Duration {
        Duration::from_secs(self.max_age_secs)
    }
}

/// Global configuration loaded from `~/.config/mdq/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MdqConfig {
    /// Root holding one directory per job. None = `~/.local/state/mdq/jobs`.
    #[serde(default)]
    pub jobs_dir: Option<PathBuf>,
    /// Delete every job directory at startup instead of recovering jobs.
    #[serde(default)]
    pub purge_on_startup: bool,
    /// Minimum milliseconds between throttled status document writes.
    #[serde(default = "default_status_write_interval_ms")]
    pub status_write_interval_ms: u64,
    /// Optional cap on simultaneously running downloader processes (None = no cap).
    #[serde(default)]
    pub max_concurrent_jobs: Option<usize>,
    /// Control socket path for `mdq serve`. None = `~/.local/state/mdq/control.sock`.
    #[serde(default)]
    pub control_socket: Option<PathBuf>,
    #[serde(default)]
    pub downloader: DownloaderConfig,
    #[serde(default)]
    pub archiver: ArchiverConfig,
    #[serde(default)]
    pub cleanup: CleanupConfig,
}

fn default_status_write_interval_ms() -> u64 {
    1500
}

impl Default for MdqConfig {
    fn default() -> Self {
        Self {
            jobs_dir: None,
            purge_on_startup: false,
            status_write_interval_ms: default_status_write_interval_ms(),
            max_concurrent_jobs: None,
            control_socket: None,
            downloader: DownloaderConfig::default(),
            archiver: ArchiverConfig::default(),
            cleanup: CleanupConfig::default(),
        }
    }
}

impl MdqConfig {
    pub fn status_write_interval(&self) -> Duration {
        Duration::from_millis(self.status_write_interval_ms)
    }

    /// Job root from config, or the XDG state default.
    pub fn resolve_jobs_dir(&self) -> Result<PathBuf> {
        match &self.jobs_dir {
            Some(dir) => Ok(dir.clone()),
            None => {
                let xdg_dirs = xdg::BaseDirectories::with_prefix("mdq")?;
                Ok(xdg_dirs.get_state_home().join("jobs"))
            }
        }
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("mdq")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<MdqConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = MdqConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: MdqConfig = toml::from_str(&data)?;
    Ok(cfg)
}
