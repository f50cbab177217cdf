//! `mdq status [id]` – show jobs known to the daemon.

use anyhow::{bail, Result};
use mdq_core::JobSummary;
use std::path::Path;

use super::call;
use crate::cli::control_socket::{Request, Response};

pub async fn run_status(socket: &Path, id: Option<String>, json: bool) -> Result<()> {
    match id {
        Some(id) => {
            let job = match call(socket, Request::Get { id }).await? {
                Response::Job { job } => job,
                other => bail!("unexpected reply: {other:?}"),
            };
            if json {
                println!("{}", serde_json::to_string_pretty(&job)?);
            } else {
                print_detail(&job);
            }
        }
        None => {
            let jobs = match call(socket, Request::List).await? {
                Response::Jobs { jobs } => jobs,
                other => bail!("unexpected reply: {other:?}"),
            };
            if json {
                println!("{}", serde_json::to_string_pretty(&jobs)?);
            } else if jobs.is_empty() {
                println!("No jobs.");
            } else {
                println!("{:<36} {:<19} {:>6} {}", "ID", "STATUS", "PCT", "TITLE");
                for j in &jobs {
                    println!("{}", format_row(j));
                }
            }
        }
    }
    Ok(())
}

fn format_row(j: &JobSummary) -> String {
    let title = j
        .playlist_title
        .as_deref()
        .or(j.title.as_deref())
        .unwrap_or(&j.url);
    format!(
        "{:<36} {:<19} {:>5.1}% {}",
        j.id.as_str(),
        j.status.as_str(),
        j.percent,
        title
    )
}

fn print_detail(j: &JobSummary) {
    println!("id:        {}", j.id);
    println!("status:    {}", j.status);
    println!("url:       {}", j.url);
    println!("format:    {} ({})", j.format.as_str(), j.quality);
    println!("progress:  {:.1}%", j.percent);
    if let Some(speed) = &j.speed {
        println!("speed:     {speed}");
    }
    if let Some(eta) = &j.eta {
        println!("eta:       {eta}");
    }
    if let Some(title) = &j.title {
        println!("title:     {title}");
    }
    if j.is_playlist {
        println!(
            "playlist:  {} (track {} of {})",
            j.playlist_title.as_deref().unwrap_or("?"),
            j.current_track_index.map_or("?".to_string(), |n| n.to_string()),
            j.total_tracks.map_or("?".to_string(), |n| n.to_string()),
        );
        if !j.skipped_titles.is_empty() {
            println!("skipped:   {}", j.skipped_titles.join(", "));
        }
    }
    if let Some(name) = &j.output_name {
        println!("output:    {name}");
    }
    if let Some(err) = &j.error_message {
        println!("error:     {err}");
    }
}
