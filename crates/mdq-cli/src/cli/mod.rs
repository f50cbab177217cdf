//! CLI for the MDQ media download queue.

mod commands;
mod control_socket;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use mdq_core::config;
use mdq_core::MediaFormat;
use std::path::PathBuf;

use commands::{
    run_add, run_cancel, run_remove, run_resume, run_serve, run_status, run_sweep, AddArgs,
};

/// Top-level CLI for the MDQ media download queue.
#[derive(Debug, Parser)]
#[command(name = "mdq")]
#[command(about = "MDQ: media download job queue", long_about = None)]
pub struct Cli {
    /// Control socket path (defaults to the config value, then the XDG state dir).
    #[arg(long, global = true, value_name = "PATH")]
    pub socket: Option<PathBuf>,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FormatArg {
    Audio,
    Video,
}

impl From<FormatArg> for MediaFormat {
    fn from(f: FormatArg) -> Self {
        match f {
            FormatArg::Audio => MediaFormat::Audio,
            FormatArg::Video => MediaFormat::Video,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Run the daemon: recover jobs, then accept requests on the control socket.
    Serve,

    /// Submit a download job.
    Add {
        /// Media page or playlist URL.
        url: String,
        /// Extract audio or keep video.
        #[arg(long, value_enum, default_value = "audio")]
        format: FormatArg,
        /// "best", an audio bitrate in kbps (e.g. 192) or a video height (e.g. 720).
        #[arg(long, default_value = "best")]
        quality: String,
        /// Treat the URL as a playlist.
        #[arg(long, conflicts_with = "no_playlist")]
        playlist: bool,
        /// Download only the single item even if the URL names a playlist.
        #[arg(long)]
        no_playlist: bool,
    },

    /// Show all jobs, or one job in detail.
    Status {
        /// Job identifier.
        id: Option<String>,
        /// Print raw JSON.
        #[arg(long)]
        json: bool,
    },

    /// Cancel a running job, or a pending one still waiting for a slot (its files are deleted).
    Cancel {
        /// Job identifier.
        id: String,
    },

    /// Resume a job interrupted by a restart.
    Resume {
        /// Job identifier.
        id: String,
    },

    /// Remove a completed or failed job and its files.
    Remove {
        /// Job identifier.
        id: String,
    },

    /// Remove every finished job and orphaned job directory now.
    Sweep,
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);
        let socket = match cli.socket.or_else(|| cfg.control_socket.clone()) {
            Some(p) => p,
            None => mdq_core::control::default_control_socket_path()?,
        };

        match cli.command {
            CliCommand::Serve => run_serve(&cfg, &socket).await?,
            CliCommand::Add {
                url,
                format,
                quality,
                playlist,
                no_playlist,
            } => {
                let args = AddArgs {
                    url,
                    format: format.into(),
                    quality,
                    playlist_hint: playlist_hint(playlist, no_playlist),
                };
                run_add(&socket, args).await?
            }
            CliCommand::Status { id, json } => run_status(&socket, id, json).await?,
            CliCommand::Cancel { id } => run_cancel(&socket, id).await?,
            CliCommand::Resume { id } => run_resume(&socket, id).await?,
            CliCommand::Remove { id } => run_remove(&socket, id).await?,
            CliCommand::Sweep => run_sweep(&socket).await?,
        }

        Ok(())
    }
}

/// `--playlist` / `--no-playlist` → explicit hint; neither → detect from the URL.
pub fn playlist_hint(playlist: bool, no_playlist: bool) -> Option<bool> {
    match (playlist, no_playlist) {
        (true, _) => Some(true),
        (_, true) => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests;
